//! Error types for the narration pipeline

use std::path::PathBuf;
use thiserror::Error;

use crate::text::ChunkId;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Chunking stalled in section {section} at byte {offset}: no separator found and the split offset collapsed to zero")]
    ChunkingStall { section: usize, offset: usize },

    #[error("Synthesis failed for {chunk} after {attempts} attempt(s): {source}")]
    Synthesis {
        chunk: ChunkId,
        attempts: u32,
        #[source]
        source: Box<Error>,
    },

    #[error("Speech API error (HTTP {status}): {message}")]
    Api { status: u16, message: String },

    #[error("Task failed: {0}")]
    Task(String),

    #[error("Mux error: {0}")]
    Mux(String),

    #[error("Duration probe failed for {path:?}: {reason}")]
    DurationProbe { path: PathBuf, reason: String },

    #[error("Timeline error: {0}")]
    Timeline(String),

    #[error("Audio encoding error: {0}")]
    Encoding(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Pattern matching failed: {0}")]
    Pattern(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
}

pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Whether a failed synthesis attempt is worth repeating.
    ///
    /// Only local configuration problems and rejected credentials fail
    /// fast; every other API status is retried.
    pub fn is_retryable(&self) -> bool {
        match self {
            Error::Http(_) | Error::Io(_) => true,
            Error::Api { status, .. } => !matches!(status, 401 | 403),
            _ => false,
        }
    }

    /// Pipeline stage the error belongs to, used in user-facing reports.
    pub fn stage(&self) -> &'static str {
        match self {
            Error::ChunkingStall { .. } | Error::Pattern(_) => "chunking",
            Error::Synthesis { .. } | Error::Api { .. } | Error::Http(_) | Error::Task(_) => {
                "synthesis"
            }
            Error::Mux(_) => "reassembly",
            Error::DurationProbe { .. } | Error::Timeline(_) => "timeline",
            Error::Encoding(_) | Error::Config(_) => "configuration",
            Error::Io(_) | Error::Serialization(_) => "io",
        }
    }
}
