// src/lib.rs

pub mod config;
pub mod connection;
pub mod core;

// Re-export
pub use crate::config::{SubmissionConfig, SubmissionConfigBuilder, TransportLimits};
pub use crate::connection::{MossClient, SessionState};
pub use crate::core::{Language, MossError};
