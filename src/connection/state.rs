// src/connection/state.rs

//! The states a submission session moves through.

use std::fmt;

/// Position of a session in the protocol. Transitions only move forward; any
/// failure jumps straight to `Closed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum SessionState {
    Disconnected,
    Connected,
    HeadersSent,
    FilesUploaded,
    QuerySent,
    ResponseReceived,
    Closed,
}

impl SessionState {
    /// True if `next` is a legal successor of `self`.
    pub fn can_transition_to(self, next: SessionState) -> bool {
        use SessionState::*;
        matches!(
            (self, next),
            (Disconnected, Connected)
                | (Connected, HeadersSent)
                | (HeadersSent, FilesUploaded)
                | (FilesUploaded, QuerySent)
                | (QuerySent, ResponseReceived)
        ) || next == Closed
    }

    /// True while the connection is held open.
    pub fn is_open(self) -> bool {
        !matches!(self, SessionState::Disconnected | SessionState::Closed)
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SessionState::Disconnected => "disconnected",
            SessionState::Connected => "connected",
            SessionState::HeadersSent => "headers-sent",
            SessionState::FilesUploaded => "files-uploaded",
            SessionState::QuerySent => "query-sent",
            SessionState::ResponseReceived => "response-received",
            SessionState::Closed => "closed",
        };
        f.write_str(name)
    }
}
