use std::time::Duration;

use thiserror::Error;

use crate::protocol::codec::FrameError;

/// Failure of a call against a motion unit or skeleton access, local or remote.
///
/// Control failures reported by the unit itself are *not* errors; they come back as a
/// [`BoolResponse`](crate::model::BoolResponse) with `successful == false`.
#[derive(Debug, Error)]
pub enum AccessError {
    #[error("not connected")]
    NotConnected,
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("frame error: {0}")]
    Frame(#[from] FrameError),
    #[error("request timed out after {0:?}")]
    Timeout(Duration),
    #[error("remote fault: {0}")]
    Remote(String),
    /// The reply carried another request's id; the stream is out of step.
    #[error("reply to {operation} carried id {received}, expected {expected}")]
    ReplyMismatch {
        operation: &'static str,
        expected: u64,
        received: u64,
    },
    #[error("unexpected response to {operation}: {received}")]
    UnexpectedResponse {
        operation: &'static str,
        received: String,
    },
    #[error("unit failure: {0}")]
    Unit(String),
}

impl AccessError {
    pub fn unit(message: impl Into<String>) -> Self {
        AccessError::Unit(message.into())
    }

    /// True when the failure came from the network path rather than the unit.
    pub fn is_transport(&self) -> bool {
        matches!(
            self,
            AccessError::NotConnected
                | AccessError::Io(_)
                | AccessError::Frame(_)
                | AccessError::Timeout(_)
                | AccessError::ReplyMismatch { .. }
        )
    }
}

pub type AccessResult<T> = Result<T, AccessError>;
