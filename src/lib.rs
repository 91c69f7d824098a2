//! # session-gate
//!
//! Session-validity monitor and route access control for the storefront
//! client.
//!
//! The crate watches the signed-in user's account record for a server-held
//! "blocked" flag, forces sign-out and redirection the moment it flips, and
//! decides which routes the current session may see. Pages, cart state, and
//! rendering live outside; they plug in through the traits in [`providers`]
//! and the opaque component type carried by [`routes::table::RouteTable`].

pub mod access;
pub mod app;
pub mod config;
pub mod memory;
pub mod providers;
pub mod routes;
pub mod services;
pub mod session;
