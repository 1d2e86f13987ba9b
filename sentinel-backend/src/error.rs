//! Error taxonomy for the status pipeline and the rating intake.
//!
//! None of these escape a poll cycle or a rating submission; call sites
//! log them and degrade (offline render, bot-error presence, ignored vote).

use thiserror::Error;

/// Failure talking to the game server (Unreachable)
#[derive(Debug, Error)]
pub enum QueryError {
    #[error("query I/O failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("query timed out after {0} seconds")]
    Timeout(u64),

    #[error("malformed response: {0}")]
    Malformed(String),
}

/// Side-channel roster export could not be used (DataCorruption)
#[derive(Debug, Error)]
pub enum RosterError {
    #[error("failed to read roster export {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse roster export: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("roster export is missing field '{0}'")]
    MissingField(&'static str),

    #[error("roster export field '{0}' has the wrong shape")]
    InvalidField(&'static str),

    #[error("roster entry '{key}' is not a plain string")]
    NonStringPlayer { key: String },
}

/// Messaging surface rejected an operation (PublishFailure)
#[derive(Debug, Error)]
pub enum SurfaceError {
    #[error("message {0} not found")]
    NotFound(String),

    #[error("request failed: {0}")]
    Http(String),

    #[error("unexpected status {status}: {body}")]
    Status { status: u16, body: String },
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum RatingError {
    #[error("'{0}' is not a rating value")]
    InvalidValue(String),
}
