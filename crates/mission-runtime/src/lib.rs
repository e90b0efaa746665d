//! Runtime layer for Mission Control.
//!
//! Owns the streaming channel to the orchestrator, routes inbound frames into
//! the live [`session::Session`], and publishes snapshots to observers.

pub mod connection;
pub mod router;
pub mod session;
pub mod transport;

pub use mission_core as core;
