use chat_protocol::ClientError;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Broad error category used for caller-facing handling and retry decisions.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum CoreErrorCategory {
    /// Requested room/user/event/segment does not exist.
    NotFound,
    /// Transient network or protocol failure; original state is preserved.
    Network,
    /// Per-event decryption failure.
    Decryption,
    /// Operation rejected synchronously because a precondition does not hold.
    Precondition,
    /// Internal invariant break.
    Internal,
}

/// Stable error payload surfaced by core operations.
///
/// Nothing here is fatal to the application; every failure is local and
/// recoverable by caller retry.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Error)]
#[error("{category:?}:{code}: {message}")]
pub struct CoreError {
    /// High-level category.
    pub category: CoreErrorCategory,
    /// Stable machine-readable code.
    pub code: String,
    /// Human-readable message.
    pub message: String,
}

impl CoreError {
    /// Construct a new core error.
    pub fn new(
        category: CoreErrorCategory,
        code: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            category,
            code: code.into(),
            message: message.into(),
        }
    }

    /// Timeline store has not completed an initial load yet.
    pub fn not_ready() -> Self {
        Self::new(
            CoreErrorCategory::Precondition,
            "not_ready",
            "timeline has not been loaded yet",
        )
    }

    /// A pagination request is already in flight.
    pub fn pagination_in_flight() -> Self {
        Self::new(
            CoreErrorCategory::Precondition,
            "pagination_in_flight",
            "another pagination request is already in flight",
        )
    }

    /// The chain boundary has no more data in the requested direction.
    pub fn end_of_timeline() -> Self {
        Self::new(
            CoreErrorCategory::Precondition,
            "end_of_timeline",
            "no more events in the requested direction",
        )
    }
}

impl From<ClientError> for CoreError {
    fn from(err: ClientError) -> Self {
        match err {
            ClientError::NotFound(what) => Self::new(
                CoreErrorCategory::NotFound,
                "not_found",
                format!("not found: {what}"),
            ),
            ClientError::Network(message) => {
                Self::new(CoreErrorCategory::Network, "network_error", message)
            }
            ClientError::Decryption(message) => {
                Self::new(CoreErrorCategory::Decryption, "decryption_error", message)
            }
        }
    }
}
