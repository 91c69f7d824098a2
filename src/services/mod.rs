//! Session services driven by the external providers.
//!
//! ARCHITECTURE
//! ============
//! `subscription` owns one realtime watch on an account record;
//! `monitor` owns the auth listener and the state machine that opens,
//! replaces, and closes those watches and enforces blocks.

pub mod monitor;
pub mod subscription;
