//! Error types for the benchmark harness.

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias using our custom error.
pub type Result<T> = std::result::Result<T, BenchError>;

/// Errors that can occur while answering, judging or persisting a batch.
#[derive(Error, Debug)]
pub enum BenchError {
    /// Error reading or writing files.
    #[error("I/O error for path '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Error during serialization/deserialization.
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Malformed CSV input or output.
    #[error("CSV error: {0}")]
    Csv(String),

    /// The dataset path does not exist.
    #[error("Dataset not found at '{0}'")]
    DatasetNotFound(PathBuf),

    /// Missing or invalid configuration. Fatal before any batch work starts.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Network or endpoint failure talking to the chat-completion API.
    #[error("Judge transport error: {0}")]
    JudgeTransport(String),

    /// Every attempt against the judge endpoint failed.
    #[error("Judge unavailable after {attempts} attempt(s): {last_error}")]
    JudgeUnavailable { attempts: u32, last_error: String },

    /// Judge reply did not contain a decodable score payload.
    #[error("Malformed judge response: {0}")]
    JudgeResponseMalformed(String),

    /// Any other failure inside a single item's pipeline.
    #[error("Item processing failed: {0}")]
    ItemProcessing(String),

    /// The RAG agent failed to answer.
    #[error("Agent error: {0}")]
    Agent(String),
}

impl BenchError {
    /// Create an I/O error with path context.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

impl From<reqwest::Error> for BenchError {
    fn from(err: reqwest::Error) -> Self {
        BenchError::JudgeTransport(err.to_string())
    }
}

impl From<serde_json::Error> for BenchError {
    fn from(err: serde_json::Error) -> Self {
        BenchError::Serialization(err.to_string())
    }
}

impl From<csv::Error> for BenchError {
    fn from(err: csv::Error) -> Self {
        BenchError::Csv(err.to_string())
    }
}
