//! Error types for the harvester
//!
//! This module defines the error hierarchy for the whole crate.
//! All public APIs return `Result<T, Error>` where Error is defined here.
//!
//! Errors fall into four classes that decide how far a failure propagates:
//!
//! - transport failures and exhausted rate-limit retries fail a single work unit
//! - processing failures are recorded per item and never leave the iterator
//! - persistence failures and corrupt checkpoints are fatal to the run
//! - configuration and setup failures stop a command before any work starts

use std::path::Path;
use thiserror::Error;

/// The main error type for the harvester
#[derive(Error, Debug)]
pub enum Error {
    // ============================================================================
    // Configuration Errors
    // ============================================================================
    #[error("Configuration error: {message}")]
    Config { message: String },

    #[error("Invalid config value for '{field}': {message}")]
    InvalidConfigValue { field: String, message: String },

    #[error("Failed to parse YAML: {0}")]
    YamlParse(#[from] serde_yaml::Error),

    #[error("Failed to parse JSON: {0}")]
    JsonParse(#[from] serde_json::Error),

    #[error("Template error: {message}")]
    Template { message: String },

    // ============================================================================
    // Transport Errors (fail the enclosing work unit)
    // ============================================================================
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("HTTP {status}: {body}")]
    HttpStatus { status: u16, body: String },

    #[error("Transport error: {message}")]
    Transport { message: String },

    #[error("Failed to decode response: {message}")]
    Decode { message: String },

    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    #[error("Rate limit exceeded after {attempts} attempts")]
    RateLimitExceeded { attempts: u32 },

    // ============================================================================
    // Item Errors (isolated, recorded in the checkpoint)
    // ============================================================================
    #[error("Processing failed for key '{key}': {message}")]
    Processing { key: String, message: String },

    // ============================================================================
    // Durability Errors (fatal)
    // ============================================================================
    #[error("Persistence failed: {message}")]
    Persistence { message: String },

    #[error("Corrupt checkpoint at {path}: {message}")]
    CorruptCheckpoint { path: String, message: String },

    // ============================================================================
    // Output / I/O Errors
    // ============================================================================
    #[error("Output error: {message}")]
    Output { message: String },

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    // ============================================================================
    // Generic Errors
    // ============================================================================
    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Create a config error
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Create an invalid config value error
    pub fn invalid_value(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidConfigValue {
            field: field.into(),
            message: message.into(),
        }
    }

    /// Create an HTTP status error
    pub fn http_status(status: u16, body: impl Into<String>) -> Self {
        Self::HttpStatus {
            status,
            body: body.into(),
        }
    }

    /// Create a transport error
    pub fn transport(message: impl Into<String>) -> Self {
        Self::Transport {
            message: message.into(),
        }
    }

    /// Create a decode error
    pub fn decode(message: impl Into<String>) -> Self {
        Self::Decode {
            message: message.into(),
        }
    }

    /// Create a template error
    pub fn template(message: impl Into<String>) -> Self {
        Self::Template {
            message: message.into(),
        }
    }

    /// Create a processing error for one item
    pub fn processing(key: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Processing {
            key: key.into(),
            message: message.into(),
        }
    }

    /// Create a persistence error
    pub fn persistence(message: impl Into<String>) -> Self {
        Self::Persistence {
            message: message.into(),
        }
    }

    /// Create a corrupt checkpoint error
    pub fn corrupt_checkpoint(path: &Path, message: impl Into<String>) -> Self {
        Self::CorruptCheckpoint {
            path: path.display().to_string(),
            message: message.into(),
        }
    }

    /// Create an output error
    pub fn output(message: impl Into<String>) -> Self {
        Self::Output {
            message: message.into(),
        }
    }

    /// Whether this error must abort the whole run.
    ///
    /// Only durability failures qualify: once the checkpoint or the sink can
    /// no longer be flushed, resuming from the checkpoint would be unsound.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Error::Persistence { .. } | Error::CorruptCheckpoint { .. }
        )
    }

    /// Whether this error fails a single work unit while the run continues
    pub fn is_unit_failure(&self) -> bool {
        matches!(
            self,
            Error::Http(_)
                | Error::HttpStatus { .. }
                | Error::Transport { .. }
                | Error::Decode { .. }
                | Error::InvalidUrl(_)
                | Error::RateLimitExceeded { .. }
                | Error::Template { .. }
        )
    }

    /// Short label used in logs and run reports
    pub fn kind(&self) -> &'static str {
        match self {
            Error::RateLimitExceeded { .. } => "rate_limit_exceeded",
            Error::Processing { .. } => "processing",
            Error::Persistence { .. } => "persistence",
            Error::CorruptCheckpoint { .. } => "corrupt_checkpoint",
            e if e.is_unit_failure() => "transport",
            _ => "other",
        }
    }
}

/// Result type alias for the harvester
pub type Result<T> = std::result::Result<T, Error>;

/// Extension trait for adding context to errors
pub trait ResultExt<T> {
    /// Add context to an error
    fn context(self, message: impl Into<String>) -> Result<T>;

    /// Add context with a closure (lazy evaluation)
    fn with_context<F: FnOnce() -> String>(self, f: F) -> Result<T>;
}

impl<T, E: Into<Error>> ResultExt<T> for std::result::Result<T, E> {
    fn context(self, message: impl Into<String>) -> Result<T> {
        self.map_err(|e| {
            let inner = e.into();
            Error::Other(format!("{}: {}", message.into(), inner))
        })
    }

    fn with_context<F: FnOnce() -> String>(self, f: F) -> Result<T> {
        self.map_err(|e| {
            let inner = e.into();
            Error::Other(format!("{}: {}", f(), inner))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = Error::config("test message");
        assert_eq!(err.to_string(), "Configuration error: test message");

        let err = Error::RateLimitExceeded { attempts: 5 };
        assert_eq!(err.to_string(), "Rate limit exceeded after 5 attempts");

        let err = Error::corrupt_checkpoint(Path::new("/tmp/job.json"), "EOF");
        assert_eq!(err.to_string(), "Corrupt checkpoint at /tmp/job.json: EOF");
    }

    #[test]
    fn test_is_fatal() {
        assert!(Error::persistence("disk full").is_fatal());
        assert!(Error::corrupt_checkpoint(Path::new("x"), "bad").is_fatal());

        assert!(!Error::RateLimitExceeded { attempts: 5 }.is_fatal());
        assert!(!Error::http_status(500, "").is_fatal());
        assert!(!Error::processing("k", "boom").is_fatal());
    }

    #[test]
    fn test_is_unit_failure() {
        assert!(Error::RateLimitExceeded { attempts: 1 }.is_unit_failure());
        assert!(Error::http_status(503, "").is_unit_failure());
        assert!(Error::transport("connection reset").is_unit_failure());
        assert!(Error::decode("expected value").is_unit_failure());

        assert!(!Error::persistence("x").is_unit_failure());
        assert!(!Error::config("x").is_unit_failure());
    }

    #[test]
    fn test_kind() {
        assert_eq!(Error::RateLimitExceeded { attempts: 2 }.kind(), "rate_limit_exceeded");
        assert_eq!(Error::http_status(404, "").kind(), "transport");
        assert_eq!(Error::persistence("x").kind(), "persistence");
        assert_eq!(Error::config("x").kind(), "other");
    }

    #[test]
    fn test_result_context() {
        let result: Result<()> = Err(Error::config("inner"));
        let with_context = result.context("outer");
        assert!(with_context
            .unwrap_err()
            .to_string()
            .contains("outer: Configuration error: inner"));
    }
}
