//! Error types for Innsikt.

use thiserror::Error;

/// Library-level error type for Innsikt operations.
#[derive(Error, Debug)]
pub enum InnsiktError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Authentication failed: {0}")]
    Auth(String),

    #[error("Access denied: {0}")]
    Forbidden(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Upload incomplete, missing chunks: {}", format_indices(.0))]
    MissingChunks(Vec<u32>),

    #[error("Operation already in progress: {0}")]
    Conflict(String),

    #[error("Media storage error: {0}")]
    Storage(String),

    #[error("Transcription failed: {0}")]
    Transcription(String),

    #[error("Analysis failed: {0}")]
    Analysis(String),

    #[error("Chat failed: {0}")]
    Chat(String),

    #[error("Record store error: {0}")]
    RecordStore(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML parse error: {0}")]
    TomlParse(#[from] toml::de::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("OpenAI API error: {0}")]
    OpenAI(String),
}

impl InnsiktError {
    /// Whether the error originated in an upstream service timing out.
    pub fn is_timeout(&self) -> bool {
        match self {
            InnsiktError::Http(e) => e.is_timeout(),
            InnsiktError::OpenAI(msg) | InnsiktError::Transcription(msg) => {
                msg.contains("timed out") || msg.contains("timeout")
            }
            _ => false,
        }
    }
}

fn format_indices(indices: &[u32]) -> String {
    indices
        .iter()
        .map(|i| i.to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

/// Result type alias for Innsikt operations.
pub type Result<T> = std::result::Result<T, InnsiktError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_chunks_lists_every_index() {
        let err = InnsiktError::MissingChunks(vec![1, 4, 7]);
        let msg = err.to_string();
        assert!(msg.contains("1, 4, 7"));
    }

    #[test]
    fn test_timeout_detection_from_message() {
        let err = InnsiktError::OpenAI("request timed out after 120s".to_string());
        assert!(err.is_timeout());

        let err = InnsiktError::OpenAI("rate limit exceeded".to_string());
        assert!(!err.is_timeout());
    }
}
