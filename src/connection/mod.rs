// src/connection/mod.rs

//! Owns the connection to the service and drives a single submission session
//! through the protocol.

mod session;
mod state;

// Publicly re-export the primary types from the sub-modules.
pub use session::{MossClient, file_label, tag_file_indices};
pub use state::SessionState;
