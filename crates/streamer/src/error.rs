//! Error types for streamers and session replay

use std::path::PathBuf;

use devices::TransportError;
use thiserror::Error;

/// Streamer-level errors
#[derive(Error, Debug)]
pub enum StreamerError {
    #[error("Unknown stream type: {0}")]
    UnknownStream(String),

    #[error("Connection error: {0}")]
    Connection(#[source] TransportError),

    #[error("No device named '{0}' found during scan")]
    DeviceNotFound(String),

    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    #[error("Cannot {operation} while {state}")]
    InvalidState {
        operation: &'static str,
        state: &'static str,
    },

    #[error("Stream '{stream}' expects rows of {expected} values, got {actual}")]
    ShapeMismatch {
        stream: String,
        expected: usize,
        actual: usize,
    },

    #[error("No replay file for subscribed stream '{0}'")]
    MissingReplayFile(String),

    #[error("Outlet for stream '{0}' is closed")]
    OutletClosed(String),

    #[error("Worker threads did not stop in time: {}", .0.join(", "))]
    StopTimeout(Vec<String>),

    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),

    #[error("Replay error: {0}")]
    Replay(#[from] ReplayError),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for streamer operations
pub type StreamerResult<T> = Result<T, StreamerError>;

/// Errors raised while validating, discovering or reading recorded sessions.
#[derive(Error, Debug)]
pub enum ReplayError {
    #[error("Not an existing directory: {}", .0.display())]
    InvalidPath(PathBuf),

    #[error("Filename does not match the session pattern: {0}")]
    InvalidFilename(String),

    #[error("Expected a .{expected} file, got {filename}")]
    WrongFileType {
        filename: String,
        expected: &'static str,
    },

    #[error("File {filename} holds stream '{found}', not '{requested}'")]
    StreamTypeMismatch {
        filename: String,
        requested: String,
        found: String,
    },

    #[error("File not found: {}", .0.display())]
    FileNotFound(PathBuf),

    #[error("No data in {}", .0.display())]
    EmptyData(PathBuf),

    #[error("Malformed data in {}: {message}", .path.display())]
    MalformedData { path: PathBuf, message: String },

    #[error("Insufficient files for session: found {csv} CSV and {json} JSON, need {required} of each")]
    InsufficientFiles {
        csv: usize,
        json: usize,
        required: usize,
    },

    #[error("Stream '{0}' appears more than once in the session")]
    DuplicateStream(String),

    #[error("No recorded sessions found under {}", .0.display())]
    NoSessions(PathBuf),

    #[error("No valid session chosen after {0} attempt(s)")]
    SelectionAborted(u32),

    #[error("Session {index} does not exist ({available} found)")]
    InvalidSelection { index: usize, available: usize },

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for replay operations
pub type ReplayResult<T> = Result<T, ReplayError>;
