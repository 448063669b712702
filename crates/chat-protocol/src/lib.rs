//! Narrow capability contract toward the wrapped chat protocol SDK.
//!
//! This crate defines the raw event/segment data model, the room-scoped
//! notification stream, the [`ProtocolClient`] trait consumed by the core,
//! and an in-memory reference client used by tests and smoke tooling.

/// Client capability trait and error taxonomy.
pub mod client;
/// Raw event payloads and media references.
pub mod event;
/// Scripted in-memory client implementation.
pub mod memory;
/// Push-style notification kinds.
pub mod notify;
/// Linked history segments and pagination tokens.
pub mod segment;

pub use client::{ClientError, NotificationStream, ProtocolClient};
pub use event::{
    ChatEvent, EncryptedFileSource, EventPayload, MediaSource, Membership, MessageContent,
    Relation, RelationKind, blob_safe_mimetype,
};
pub use memory::InMemoryClient;
pub use notify::ClientNotification;
pub use segment::{Direction, SegmentId, SegmentSnapshot};

/// Snapshot of a room as known to the protocol client.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct RoomSnapshot {
    /// Room identifier.
    pub room_id: String,
    /// Best-effort display name.
    pub name: String,
    /// Topic, empty when unset.
    pub topic: String,
    /// Explicit room avatar, when one is set.
    pub avatar: Option<MediaSource>,
    /// Avatar of the fallback member (DM peer heuristics).
    pub fallback_member_avatar: Option<MediaSource>,
    /// The other member when the room is a direct message, `None` otherwise.
    pub direct_peer: Option<String>,
    /// Whether events in this room are end-to-end encrypted.
    pub encrypted: bool,
    /// Unread notification count reported by the SDK.
    pub unread_notifications: u64,
    /// Timestamp of the last room activity in milliseconds.
    pub last_active_ms: u64,
}

/// Snapshot of a user as known to the protocol client.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct UserSnapshot {
    /// User identifier.
    pub user_id: String,
    /// Profile display name, when set.
    pub display_name: Option<String>,
    /// Profile avatar, when set.
    pub avatar: Option<MediaSource>,
    /// Presence state string reported by the SDK (`online`, `offline`, ...).
    pub presence: Option<String>,
    /// Free-form status message.
    pub status_message: Option<String>,
}

/// One device attached to a user's account.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct DeviceInfo {
    /// Device identifier.
    pub device_id: String,
    /// Human-readable device name, when set.
    pub display_name: Option<String>,
}
