// src/core/errors.rs

//! Defines the primary error type for the entire client.

use crate::core::language::Language;
use std::path::PathBuf;
use std::sync::Arc;
use thiserror::Error;

/// The main error enum, representing every way a submission can fail.
/// Using `thiserror` allows for clean error definitions and automatic `From` trait implementations.
#[derive(Error, Debug)]
pub enum MossError {
    /// Connecting, writing or reading failed, or a transport timeout expired.
    #[error("Connection error: {0}")]
    Connection(Arc<std::io::Error>),

    /// The service answered "no" to the `language` header.
    #[error("Unsupported language: {0}")]
    UnsupportedLanguage(Language),

    /// A file could not be opened or read while it was being uploaded.
    #[error("Cannot read file '{}': {source}", path.display())]
    FileAccess {
        path: PathBuf,
        #[source]
        source: Arc<std::io::Error>,
    },

    #[error("File not found: {}", .0.display())]
    FileNotFound(PathBuf),

    #[error("Not a regular file: {}", .0.display())]
    NotAFile(PathBuf),

    #[error("Invalid glob pattern '{pattern}': {reason}")]
    InvalidPattern { pattern: String, reason: String },

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Operation not allowed in the current session state: {0}")]
    InvalidState(String),
}

impl MossError {
    /// Wraps a file I/O failure together with the path that caused it.
    pub fn file_access(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        MossError::FileAccess {
            path: path.into(),
            source: Arc::new(source),
        }
    }

    /// Builds a connection error for an expired transport timeout.
    pub fn timed_out(what: &str) -> Self {
        MossError::Connection(Arc::new(std::io::Error::new(
            std::io::ErrorKind::TimedOut,
            format!("{what} timed out"),
        )))
    }

    /// Returns true for transport-level failures.
    pub fn is_connection_error(&self) -> bool {
        matches!(self, MossError::Connection(_))
    }
}

// Manual implementation of Clone because `std::io::Error` is not cloneable.
// The I/O errors are wrapped in an Arc so cloning stays cheap.
impl Clone for MossError {
    fn clone(&self) -> Self {
        match self {
            MossError::Connection(e) => MossError::Connection(Arc::clone(e)),
            MossError::UnsupportedLanguage(l) => MossError::UnsupportedLanguage(*l),
            MossError::FileAccess { path, source } => MossError::FileAccess {
                path: path.clone(),
                source: Arc::clone(source),
            },
            MossError::FileNotFound(p) => MossError::FileNotFound(p.clone()),
            MossError::NotAFile(p) => MossError::NotAFile(p.clone()),
            MossError::InvalidPattern { pattern, reason } => MossError::InvalidPattern {
                pattern: pattern.clone(),
                reason: reason.clone(),
            },
            MossError::InvalidConfig(s) => MossError::InvalidConfig(s.clone()),
            MossError::InvalidState(s) => MossError::InvalidState(s.clone()),
        }
    }
}

impl PartialEq for MossError {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (MossError::Connection(e1), MossError::Connection(e2)) => {
                e1.kind() == e2.kind() && e1.to_string() == e2.to_string()
            }
            (MossError::UnsupportedLanguage(l1), MossError::UnsupportedLanguage(l2)) => l1 == l2,
            (
                MossError::FileAccess { path: p1, .. },
                MossError::FileAccess { path: p2, .. },
            ) => p1 == p2,
            (MossError::FileNotFound(p1), MossError::FileNotFound(p2)) => p1 == p2,
            (MossError::NotAFile(p1), MossError::NotAFile(p2)) => p1 == p2,
            (
                MossError::InvalidPattern { pattern: p1, .. },
                MossError::InvalidPattern { pattern: p2, .. },
            ) => p1 == p2,
            (MossError::InvalidConfig(s1), MossError::InvalidConfig(s2)) => s1 == s2,
            (MossError::InvalidState(s1), MossError::InvalidState(s2)) => s1 == s2,
            _ => false,
        }
    }
}

// --- From trait implementations for easy error conversion ---

impl From<std::io::Error> for MossError {
    fn from(e: std::io::Error) -> Self {
        MossError::Connection(Arc::new(e))
    }
}
