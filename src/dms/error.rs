//! Error types for the Dead Man's Snitch client

use thiserror::Error;

#[derive(Error, Debug)]
pub enum DmsError {
    /// Transport-level failure talking to the API
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// The API answered with a non-success status
    #[error("API returned status {status}: {body}")]
    Api { status: u16, body: String },

    /// The API answered with a body that is not the expected JSON
    #[error("Failed to decode response: {0}")]
    Decode(String),

    /// The client was constructed with an unusable setting
    #[error("Invalid client configuration: {0}")]
    Config(String),
}

pub type Result<T> = std::result::Result<T, DmsError>;
