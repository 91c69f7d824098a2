//! Route table and access guards.
//!
//! SYSTEM CONTEXT
//! ==============
//! `table` maps paths to components and their requirements. `guard` wraps
//! one requirement and the shared session, re-evaluating the access decision
//! whenever the session changes and navigating away on denial.

pub mod guard;
pub mod storefront;
pub mod table;
