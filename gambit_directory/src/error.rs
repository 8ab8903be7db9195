// Directory error vocabulary, shared by the in-process registry and the
// RPC client. The string forms double as the wire `error` field values.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum DirectoryError {
    #[error("not-found")]
    NotFound,
    #[error("session-full")]
    SessionFull,
    #[error("forbidden")]
    Forbidden,
    #[error("conflict")]
    Conflict,
    #[error("unauthorized")]
    Auth,
    #[error("bad-request: {0}")]
    BadRequest(String),
    #[error("directory unreachable: {0}")]
    Transport(String),
}

impl DirectoryError {
    /// Map a wire `error` string back to the typed kind.
    pub fn from_wire(error: &str) -> Self {
        match error {
            "not-found" => Self::NotFound,
            "session-full" => Self::SessionFull,
            "forbidden" => Self::Forbidden,
            "conflict" => Self::Conflict,
            "unauthorized" => Self::Auth,
            other => Self::BadRequest(other.to_owned()),
        }
    }
}
