//! Client error types.

use thiserror::Error;

/// Why a target argument failed local validation. Callers can branch on
/// the cause (a "not found" kick reads differently from an "already
/// banned" ban).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum TargetError {
    #[error("not found or invalid")]
    NotFound,
    #[error("is already banned")]
    AlreadyBanned,
    #[error("is not banned")]
    NotBanned,
    #[error("is already an op")]
    AlreadyOp,
    #[error("is not an op")]
    NotOp,
}

#[derive(Debug, Error)]
pub enum ClientError {
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// The broker rejected the configured password.
    #[error("authentication rejected by broker")]
    BadPassword,

    /// The broker closed the connection (or the child exited).
    #[error("connection closed by broker")]
    ConnectionClosed,

    /// A target failed validation against the local cache; nothing was
    /// sent over the wire.
    #[error("{target} {reason}")]
    InvalidTarget { target: String, reason: TargetError },
}

impl ClientError {
    pub(crate) fn invalid(target: &str, reason: TargetError) -> ClientError {
        ClientError::InvalidTarget {
            target: target.to_string(),
            reason,
        }
    }
}
