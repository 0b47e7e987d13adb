// src/core/mod.rs

//! Core types shared by the configuration and the session: errors, the
//! language set, file sets and the wire protocol.

pub mod errors;
pub mod files;
pub mod language;
pub mod protocol;

pub use errors::MossError;
pub use files::FileSet;
pub use language::Language;
