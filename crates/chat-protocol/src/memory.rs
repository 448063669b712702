use std::{
    collections::HashMap,
    sync::Arc,
};

use parking_lot::RwLock;
use tokio::sync::{Notify, broadcast};
use uuid::Uuid;

use crate::{
    DeviceInfo, RoomSnapshot, UserSnapshot,
    client::{ClientError, NotificationStream, ProtocolClient},
    event::{ChatEvent, EncryptedFileSource, EventPayload, MediaSource},
    notify::ClientNotification,
    segment::{Direction, SegmentId, SegmentSnapshot},
};

const NOTIFICATION_BUFFER: usize = 256;
const BACKFILL_TOKEN: &str = "backfill";

#[derive(Debug, Default)]
struct MemoryState {
    rooms: HashMap<String, RoomSnapshot>,
    users: HashMap<String, UserSnapshot>,
    devices: HashMap<String, Vec<DeviceInfo>>,
    segments: HashMap<SegmentId, SegmentSnapshot>,
    segment_rooms: HashMap<SegmentId, String>,
    live_segments: HashMap<String, SegmentId>,
    /// Remote history not yet fetched, keyed by room and direction.
    /// Backward queues are oldest-first and drained from the tail.
    fill_queues: HashMap<(String, Direction), Vec<ChatEvent>>,
    staged_decryptions: HashMap<String, EventPayload>,
    media: HashMap<String, Vec<u8>>,
    attachments_clear: HashMap<String, Vec<u8>>,
    read_markers: HashMap<(String, String), String>,
    fail_next_paginate: bool,
    paginate_calls: usize,
    next_segment: u64,
}

/// Scripted in-memory protocol client.
///
/// Shares state behind an `Arc` so clones behave like SDK client handles.
/// Tests and the smoke app script rooms, segments, staged decryptions, and
/// remote history, then drive the core through the public trait surface.
#[derive(Clone)]
pub struct InMemoryClient {
    own_user_id: String,
    base_url: String,
    state: Arc<RwLock<MemoryState>>,
    notifications: broadcast::Sender<ClientNotification>,
    pagination_gate: Arc<RwLock<Option<Arc<Notify>>>>,
}

impl InMemoryClient {
    /// Create a client logged in as `own_user_id`.
    pub fn new(own_user_id: impl Into<String>) -> Self {
        let (notifications, _) = broadcast::channel(NOTIFICATION_BUFFER);
        Self {
            own_user_id: own_user_id.into(),
            base_url: "https://chat.example.org".to_owned(),
            state: Arc::new(RwLock::new(MemoryState::default())),
            notifications,
            pagination_gate: Arc::new(RwLock::new(None)),
        }
    }

    /// Register a user profile.
    pub fn add_user(&self, user: UserSnapshot) {
        let mut state = self.state.write();
        state.users.insert(user.user_id.clone(), user);
    }

    /// Register a user's device list.
    pub fn set_devices(&self, user_id: &str, devices: Vec<DeviceInfo>) {
        let mut state = self.state.write();
        state.devices.insert(user_id.to_owned(), devices);
    }

    /// Register a room with an empty live segment; returns the live segment id.
    pub fn add_room(&self, room: RoomSnapshot) -> SegmentId {
        let mut state = self.state.write();
        let room_id = room.room_id.clone();
        let id = SegmentId(state.next_segment);
        state.next_segment += 1;
        state.segments.insert(
            id,
            SegmentSnapshot {
                id,
                events: Vec::new(),
                prev: None,
                next: None,
                prev_token: None,
                next_token: None,
            },
        );
        state.segment_rooms.insert(id, room_id.clone());
        state.live_segments.insert(room_id.clone(), id);
        state.rooms.insert(room_id, room);
        id
    }

    /// Append an event to a segment without emitting a notification.
    pub fn seed_event(&self, segment: SegmentId, event: ChatEvent) {
        let mut state = self.state.write();
        if let Some(snapshot) = state.segments.get_mut(&segment) {
            snapshot.events.push(event);
        }
    }

    /// Link a new segment before the room's current earliest segment.
    ///
    /// `events` are oldest-first; `prev_token` becomes the new chain
    /// boundary token.
    pub fn link_backward_segment(
        &self,
        room_id: &str,
        events: Vec<ChatEvent>,
        prev_token: Option<String>,
    ) -> SegmentId {
        let mut state = self.state.write();
        let mut earliest = match state.live_segments.get(room_id) {
            Some(id) => *id,
            None => return SegmentId(u64::MAX),
        };
        while let Some(prev) = state.segments.get(&earliest).and_then(|s| s.prev) {
            earliest = prev;
        }

        let id = SegmentId(state.next_segment);
        state.next_segment += 1;
        state.segments.insert(
            id,
            SegmentSnapshot {
                id,
                events,
                prev: None,
                next: Some(earliest),
                prev_token,
                next_token: Some("linked".to_owned()),
            },
        );
        state.segment_rooms.insert(id, room_id.to_owned());
        if let Some(snapshot) = state.segments.get_mut(&earliest) {
            snapshot.prev = Some(id);
        }
        id
    }

    /// Register an unlinked historical segment (resolved by
    /// `segment_containing` for timeline jumps).
    pub fn add_detached_segment(
        &self,
        room_id: &str,
        events: Vec<ChatEvent>,
        prev_token: Option<String>,
        next_token: Option<String>,
    ) -> SegmentId {
        let mut state = self.state.write();
        let id = SegmentId(state.next_segment);
        state.next_segment += 1;
        state.segments.insert(
            id,
            SegmentSnapshot {
                id,
                events,
                prev: None,
                next: None,
                prev_token,
                next_token,
            },
        );
        state.segment_rooms.insert(id, room_id.to_owned());
        id
    }

    /// Queue remote history served by future pagination calls.
    ///
    /// `events` are oldest-first. The room's current boundary segment in the
    /// given direction gets a non-null token so callers see data available.
    pub fn queue_fill(&self, room_id: &str, direction: Direction, events: Vec<ChatEvent>) {
        let mut state = self.state.write();
        let Some(live) = state.live_segments.get(room_id).copied() else {
            return;
        };
        let mut boundary = live;
        while let Some(next) = state
            .segments
            .get(&boundary)
            .and_then(|s| s.neighbor(direction))
        {
            boundary = next;
        }
        if let Some(snapshot) = state.segments.get_mut(&boundary) {
            match direction {
                Direction::Backward => snapshot.prev_token = Some(BACKFILL_TOKEN.to_owned()),
                Direction::Forward => snapshot.next_token = Some(BACKFILL_TOKEN.to_owned()),
            }
        }
        state
            .fill_queues
            .entry((room_id.to_owned(), direction))
            .or_default()
            .extend(events);
    }

    /// Make the next pagination call fail with a network error.
    pub fn fail_next_paginate(&self) {
        self.state.write().fail_next_paginate = true;
    }

    /// Number of pagination calls that reached the client.
    pub fn paginate_calls(&self) -> usize {
        self.state.read().paginate_calls
    }

    /// Hold future pagination calls open until [`Self::release_pagination`].
    pub fn gate_pagination(&self) {
        *self.pagination_gate.write() = Some(Arc::new(Notify::new()));
    }

    /// Release one gated pagination call.
    pub fn release_pagination(&self) {
        if let Some(gate) = self.pagination_gate.read().as_ref() {
            gate.notify_one();
        }
    }

    /// Stage the clear payload revealed when an event decrypts.
    pub fn stage_decryption(&self, event_id: &str, payload: EventPayload) {
        self.state
            .write()
            .staged_decryptions
            .insert(event_id.to_owned(), payload);
    }

    /// Stage fetchable media bytes for a resolved URL.
    pub fn stage_media(&self, url: &str, bytes: Vec<u8>) {
        self.state.write().media.insert(url.to_owned(), bytes);
    }

    /// Stage the cleartext for an encrypted attachment URL.
    pub fn stage_attachment_clear(&self, url: &str, bytes: Vec<u8>) {
        self.state
            .write()
            .attachments_clear
            .insert(url.to_owned(), bytes);
    }

    /// Set a user's read marker in a room.
    pub fn set_read_marker(&self, room_id: &str, user_id: &str, event_id: &str) {
        self.state
            .write()
            .read_markers
            .insert((room_id.to_owned(), user_id.to_owned()), event_id.to_owned());
    }

    /// Append an event to the live segment and notify subscribers.
    pub fn push_live_event(&self, event: ChatEvent) {
        let room_id = event.room_id.clone();
        {
            let mut state = self.state.write();
            if let Some(live) = state.live_segments.get(&room_id).copied()
                && let Some(snapshot) = state.segments.get_mut(&live)
            {
                snapshot.events.push(event.clone());
            }
        }
        let _ = self.notifications.send(ClientNotification::TimelineEvent {
            room_id,
            event,
            live: true,
        });
    }

    /// Complete a staged decryption in place and notify subscribers.
    pub fn complete_decryption(&self, event_id: &str) {
        let decrypted = {
            let mut state = self.state.write();
            let Some(payload) = state.staged_decryptions.remove(event_id) else {
                return;
            };
            let mut found = None;
            for snapshot in state.segments.values_mut() {
                if let Some(event) = snapshot
                    .events
                    .iter_mut()
                    .find(|event| event.event_id == event_id)
                {
                    event.payload = payload.clone();
                    found = Some(event.clone());
                    break;
                }
            }
            found
        };

        if let Some(event) = decrypted {
            let room_id = event.room_id.clone();
            let _ = self
                .notifications
                .send(ClientNotification::Decrypted { room_id, event });
        }
    }

    /// Redact an event in place and notify subscribers.
    pub fn redact_event(&self, room_id: &str, sender: &str, redacts: &str) {
        {
            let mut state = self.state.write();
            for snapshot in state.segments.values_mut() {
                if let Some(event) = snapshot
                    .events
                    .iter_mut()
                    .find(|event| event.event_id == redacts)
                {
                    event.redacted = true;
                }
            }
        }
        let redaction = ChatEvent {
            event_id: format!("${}", Uuid::new_v4()),
            room_id: room_id.to_owned(),
            sender: sender.to_owned(),
            timestamp_ms: 0,
            payload: EventPayload::State {
                kind: "m.room.redaction".to_owned(),
            },
            relation: None,
            redacted: false,
        };
        let _ = self.notifications.send(ClientNotification::Redaction {
            room_id: room_id.to_owned(),
            event: redaction,
            redacts: redacts.to_owned(),
        });
    }

    /// Notify a typing state change.
    pub fn send_typing(&self, room_id: &str, user_id: &str, typing: bool) {
        let _ = self.notifications.send(ClientNotification::Typing {
            room_id: room_id.to_owned(),
            user_id: user_id.to_owned(),
            typing,
        });
    }

    /// Notify a read-receipt update.
    pub fn send_receipt(&self, room_id: &str, receipts: HashMap<String, Vec<String>>) {
        let _ = self.notifications.send(ClientNotification::Receipt {
            room_id: room_id.to_owned(),
            receipts,
        });
    }
}

impl ProtocolClient for InMemoryClient {
    fn user_id(&self) -> String {
        self.own_user_id.clone()
    }

    fn room(&self, room_id: &str) -> Result<RoomSnapshot, ClientError> {
        self.state
            .read()
            .rooms
            .get(room_id)
            .cloned()
            .ok_or_else(|| ClientError::NotFound(format!("room {room_id}")))
    }

    fn user(&self, user_id: &str) -> Result<UserSnapshot, ClientError> {
        self.state
            .read()
            .users
            .get(user_id)
            .cloned()
            .ok_or_else(|| ClientError::NotFound(format!("user {user_id}")))
    }

    async fn user_devices(&self, user_id: &str) -> Result<Vec<DeviceInfo>, ClientError> {
        Ok(self
            .state
            .read()
            .devices
            .get(user_id)
            .cloned()
            .unwrap_or_default())
    }

    fn live_segment(&self, room_id: &str) -> Result<SegmentId, ClientError> {
        self.state
            .read()
            .live_segments
            .get(room_id)
            .copied()
            .ok_or_else(|| ClientError::NotFound(format!("room {room_id}")))
    }

    fn segment(&self, id: SegmentId) -> Result<SegmentSnapshot, ClientError> {
        self.state
            .read()
            .segments
            .get(&id)
            .cloned()
            .ok_or_else(|| ClientError::NotFound(format!("segment {id:?}")))
    }

    async fn segment_containing(
        &self,
        room_id: &str,
        event_id: &str,
    ) -> Result<SegmentId, ClientError> {
        let state = self.state.read();
        state
            .segments
            .iter()
            .filter(|(id, _)| state.segment_rooms.get(id).map(String::as_str) == Some(room_id))
            .find(|(_, snapshot)| snapshot.events.iter().any(|e| e.event_id == event_id))
            .map(|(id, _)| *id)
            .ok_or_else(|| ClientError::NotFound(format!("event {event_id}")))
    }

    async fn paginate_segment(
        &self,
        id: SegmentId,
        direction: Direction,
        limit: u16,
    ) -> Result<(), ClientError> {
        let gate = self.pagination_gate.read().clone();
        if let Some(gate) = gate {
            gate.notified().await;
        }

        let mut state = self.state.write();
        state.paginate_calls += 1;
        if state.fail_next_paginate {
            state.fail_next_paginate = false;
            return Err(ClientError::Network("paginate failed".to_owned()));
        }

        let room_id = state
            .segment_rooms
            .get(&id)
            .cloned()
            .ok_or_else(|| ClientError::NotFound(format!("segment {id:?}")))?;

        let queue = state
            .fill_queues
            .entry((room_id.clone(), direction))
            .or_default();
        let take = usize::from(limit).min(queue.len());
        let batch: Vec<ChatEvent> = match direction {
            // Backward pagination serves the newest remaining history.
            Direction::Backward => queue.split_off(queue.len() - take),
            Direction::Forward => queue.drain(..take).collect(),
        };
        let more = !queue.is_empty();

        let new_id = SegmentId(state.next_segment);
        state.next_segment += 1;
        let token = more.then(|| BACKFILL_TOKEN.to_owned());

        let new_segment = match direction {
            Direction::Backward => SegmentSnapshot {
                id: new_id,
                events: batch,
                prev: None,
                next: Some(id),
                prev_token: token,
                next_token: Some("linked".to_owned()),
            },
            Direction::Forward => SegmentSnapshot {
                id: new_id,
                events: batch,
                prev: Some(id),
                next: None,
                prev_token: Some("linked".to_owned()),
                next_token: token,
            },
        };
        state.segments.insert(new_id, new_segment);
        state.segment_rooms.insert(new_id, room_id);
        if let Some(boundary) = state.segments.get_mut(&id) {
            match direction {
                Direction::Backward => {
                    boundary.prev = Some(new_id);
                    boundary.prev_token = Some("linked".to_owned());
                }
                Direction::Forward => {
                    boundary.next = Some(new_id);
                    boundary.next_token = Some("linked".to_owned());
                }
            }
        }
        Ok(())
    }

    fn is_room_encrypted(&self, room_id: &str) -> bool {
        self.state
            .read()
            .rooms
            .get(room_id)
            .map(|room| room.encrypted)
            .unwrap_or(false)
    }

    async fn attempt_decryption(&self, _room_id: &str, event_id: &str) -> Result<(), ClientError> {
        let mut state = self.state.write();
        let Some(payload) = state.staged_decryptions.remove(event_id) else {
            return Err(ClientError::Decryption(format!(
                "no session for event {event_id}"
            )));
        };
        for snapshot in state.segments.values_mut() {
            if let Some(event) = snapshot
                .events
                .iter_mut()
                .find(|event| event.event_id == event_id)
            {
                event.payload = payload.clone();
            }
        }
        Ok(())
    }

    fn media_url(&self, source: &MediaSource) -> Option<String> {
        let url = source.url();
        url.strip_prefix("mxc://")
            .map(|path| format!("{}/media/{path}", self.base_url))
    }

    async fn fetch_media(&self, url: &str) -> Result<Vec<u8>, ClientError> {
        self.state
            .read()
            .media
            .get(url)
            .cloned()
            .ok_or_else(|| ClientError::NotFound(format!("media {url}")))
    }

    async fn decrypt_attachment(
        &self,
        _data: &[u8],
        file: &EncryptedFileSource,
    ) -> Result<Vec<u8>, ClientError> {
        self.state
            .read()
            .attachments_clear
            .get(&file.url)
            .cloned()
            .ok_or_else(|| ClientError::Decryption(format!("attachment {}", file.url)))
    }

    fn read_up_to(&self, room_id: &str, user_id: &str) -> Option<String> {
        self.state
            .read()
            .read_markers
            .get(&(room_id.to_owned(), user_id.to_owned()))
            .cloned()
    }

    fn users_read_up_to(&self, room_id: &str, event_id: &str) -> Vec<String> {
        let state = self.state.read();
        let mut users: Vec<String> = state
            .read_markers
            .iter()
            .filter(|((room, _), marker)| room == room_id && marker.as_str() == event_id)
            .map(|((_, user), _)| user.clone())
            .collect();
        users.sort();
        users
    }

    fn subscribe(&self) -> NotificationStream {
        self.notifications.subscribe()
    }
}
