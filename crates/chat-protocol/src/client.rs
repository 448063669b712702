use thiserror::Error;
use tokio::sync::broadcast;

use crate::{
    DeviceInfo, RoomSnapshot, UserSnapshot,
    event::{ChatEvent, EncryptedFileSource, MediaSource},
    notify::ClientNotification,
    segment::{Direction, SegmentId, SegmentSnapshot},
};

/// Broadcast stream of client notifications.
pub type NotificationStream = broadcast::Receiver<ClientNotification>;

/// Failures surfaced by the protocol client.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ClientError {
    /// Requested room/user/event/segment is unknown locally and remotely.
    #[error("not found: {0}")]
    NotFound(String),
    /// Transient network or protocol-level failure.
    #[error("network failure: {0}")]
    Network(String),
    /// Per-event decryption attempt failed.
    #[error("decryption failure: {0}")]
    Decryption(String),
}

/// Capability contract toward the wrapped protocol SDK.
///
/// Everything the core consumes from the SDK goes through this trait: entity
/// resolution, segment-chain access, pagination, decryption, media transport,
/// and the push notification stream. Implementations share state behind
/// cheap clones, like SDK client handles do.
#[allow(async_fn_in_trait)]
pub trait ProtocolClient: Clone + Send + Sync + 'static {
    /// The logged-in user's id.
    fn user_id(&self) -> String;

    /// Resolve a room snapshot; fails when the room is unknown.
    fn room(&self, room_id: &str) -> Result<RoomSnapshot, ClientError>;

    /// Resolve a user snapshot; fails when the user is unknown.
    fn user(&self, user_id: &str) -> Result<UserSnapshot, ClientError>;

    /// Devices attached to a user's account.
    async fn user_devices(&self, user_id: &str) -> Result<Vec<DeviceInfo>, ClientError>;

    /// The room's live segment (the chain's append-only tail).
    fn live_segment(&self, room_id: &str) -> Result<SegmentId, ClientError>;

    /// Snapshot of one segment.
    fn segment(&self, id: SegmentId) -> Result<SegmentSnapshot, ClientError>;

    /// Resolve the segment containing an event, fetching from the remote
    /// when it is not known locally.
    async fn segment_containing(
        &self,
        room_id: &str,
        event_id: &str,
    ) -> Result<SegmentId, ClientError>;

    /// Extend the chain from a segment's boundary in the given direction,
    /// fetching up to `limit` more events.
    async fn paginate_segment(
        &self,
        id: SegmentId,
        direction: Direction,
        limit: u16,
    ) -> Result<(), ClientError>;

    /// Whether events in the room are end-to-end encrypted.
    fn is_room_encrypted(&self, room_id: &str) -> bool;

    /// Attempt decryption of a single event in place.
    ///
    /// Idempotent; individual failures leave the event as ciphertext.
    async fn attempt_decryption(&self, room_id: &str, event_id: &str) -> Result<(), ClientError>;

    /// Resolve a media source to a fetchable HTTP URL.
    fn media_url(&self, source: &MediaSource) -> Option<String>;

    /// Fetch raw media bytes.
    async fn fetch_media(&self, url: &str) -> Result<Vec<u8>, ClientError>;

    /// Decrypt fetched attachment bytes.
    async fn decrypt_attachment(
        &self,
        data: &[u8],
        file: &EncryptedFileSource,
    ) -> Result<Vec<u8>, ClientError>;

    /// Event id a user has read up to in a room, when known.
    fn read_up_to(&self, room_id: &str, user_id: &str) -> Option<String>;

    /// Users whose read marker currently points at the given event.
    fn users_read_up_to(&self, room_id: &str, event_id: &str) -> Vec<String>;

    /// Events of a room's live segment, oldest first.
    fn live_events(&self, room_id: &str) -> Result<Vec<ChatEvent>, ClientError> {
        let live = self.live_segment(room_id)?;
        Ok(self.segment(live)?.events)
    }

    /// Subscribe to the push notification stream.
    fn subscribe(&self) -> NotificationStream;
}
