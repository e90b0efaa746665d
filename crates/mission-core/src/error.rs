use std::path::PathBuf;
use thiserror::Error;

/// All errors produced by the mission control crates.
#[derive(Error, Debug)]
pub enum MissionError {
    /// A mission specification file could not be read from disk.
    #[error("Failed to read mission spec {path}: {source}")]
    SpecRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A mission specification was readable but not launchable.
    #[error("Invalid mission spec: {0}")]
    InvalidSpec(String),

    /// A JSON document could not be parsed.
    #[error("Failed to parse JSON: {0}")]
    JsonParse(#[from] serde_json::Error),

    /// An inbound frame was well-formed JSON but not a protocol message.
    #[error("Malformed frame: {0}")]
    MalformedFrame(String),

    /// An inbound frame of a recognised kind lacked a required field.
    #[error("{kind} frame is missing required field '{field}'")]
    MissingField { kind: String, field: &'static str },

    /// A mission launch was attempted while another one is still running.
    #[error("A mission session is already running")]
    SessionActive,

    /// The streaming channel failed to open or broke while in use.
    #[error("Transport error: {0}")]
    Transport(String),

    /// A configuration value is missing or invalid.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Pass-through for any raw I/O error that does not carry a path.
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// Catch-all for errors from third-party crates via `anyhow`.
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Convenience alias used throughout the mission crates.
pub type Result<T> = std::result::Result<T, MissionError>;
