//! Domain model and state holders for the mission control client.
//!
//! Everything here is synchronous and I/O free apart from reading mission
//! specs and the last-used settings file; the runtime crate drives these
//! types from the streaming connection.

pub mod error;
pub mod formatting;
pub mod frame;
pub mod intervention;
pub mod mission;
pub mod models;
pub mod settings;
pub mod time_utils;
pub mod transcript;
pub mod usage;

pub use error::{MissionError, Result};
