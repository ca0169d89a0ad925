use serde_json::{json, Value};
use std::io;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ReconError {
    #[error("Missing binary: {0}")]
    MissingBinary(String),
    #[error("Failed to start {tool}")]
    Spawn {
        tool: String,
        #[source]
        source: io::Error,
    },
    #[error("Failed to create {tool} {stream} pipe")]
    Pipe { tool: String, stream: &'static str },
    #[error("Output stream failed")]
    Output(#[source] io::Error),
    #[error("Invalid configuration: {0}")]
    Config(String),
}

impl ReconError {
    /// Human-readable detail for the `message` field of the fatal JSON object.
    pub fn message(&self) -> String {
        match self {
            ReconError::MissingBinary(_) => "Please install required tools in PATH".into(),
            ReconError::Spawn { source, .. } | ReconError::Output(source) => source.to_string(),
            ReconError::Pipe { .. } => "the child process did not expose the expected pipe".into(),
            ReconError::Config(_) => "check command-line flags and the config file".into(),
        }
    }

    /// Single-line `{error, message}` object printed on fatal startup failure.
    pub fn to_json(&self) -> Value {
        json!({ "error": self.to_string(), "message": self.message() })
    }
}
