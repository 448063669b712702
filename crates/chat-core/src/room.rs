use chat_protocol::{ChatEvent, Direction, MessageContent, ProtocolClient, RoomSnapshot};

use crate::{chain::SegmentChain, error::CoreError, event::Message};

/// Deterministic room placeholder avatar keyed by room name.
fn room_placeholder_url(seed: &str) -> String {
    format!("https://api.dicebear.com/6.x/initials/svg?seed={seed}&chars=1")
}

/// Read-only room façade.
///
/// Construction validates that the id resolves to a known room; accessors
/// re-read the client's current view and never mutate shared state.
#[derive(Clone)]
pub struct Room<C: ProtocolClient> {
    client: C,
    room_id: String,
}

impl<C: ProtocolClient> std::fmt::Debug for Room<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Room").field("room_id", &self.room_id).finish()
    }
}

impl<C: ProtocolClient> Room<C> {
    /// Wrap a room id; fails when the client does not know the room.
    pub fn new(room_id: impl Into<String>, client: C) -> Result<Self, CoreError> {
        let room_id = room_id.into();
        client.room(&room_id)?;
        Ok(Self { client, room_id })
    }

    /// Room identifier.
    pub fn id(&self) -> &str {
        &self.room_id
    }

    fn snapshot(&self) -> Option<RoomSnapshot> {
        self.client.room(&self.room_id).ok()
    }

    /// Best-effort display name, falling back to the room id.
    pub fn name(&self) -> String {
        self.snapshot()
            .map(|room| room.name)
            .unwrap_or_else(|| self.room_id.clone())
    }

    /// Room topic, empty when unset.
    pub fn topic(&self) -> String {
        self.snapshot().map(|room| room.topic).unwrap_or_default()
    }

    /// Whether events in the room are end-to-end encrypted.
    pub fn is_encrypted(&self) -> bool {
        self.client.is_room_encrypted(&self.room_id)
    }

    /// The other member when the room is a direct message.
    pub fn direct_peer(&self) -> Option<String> {
        self.snapshot().and_then(|room| room.direct_peer)
    }

    /// Unread notification count reported by the client.
    pub fn unread_count(&self) -> u64 {
        self.snapshot()
            .map(|room| room.unread_notifications)
            .unwrap_or(0)
    }

    /// Timestamp of the last room activity in milliseconds.
    pub fn last_active_ms(&self) -> u64 {
        self.snapshot().map(|room| room.last_active_ms).unwrap_or(0)
    }

    /// Avatar URL resolution chain: explicit room avatar, then the fallback
    /// member's avatar, then a generated placeholder keyed by the name.
    pub fn avatar_url(&self) -> String {
        let snapshot = self.snapshot();
        snapshot
            .as_ref()
            .and_then(|room| room.avatar.as_ref())
            .and_then(|source| self.client.media_url(source))
            .or_else(|| {
                snapshot
                    .as_ref()
                    .and_then(|room| room.fallback_member_avatar.as_ref())
                    .and_then(|source| self.client.media_url(source))
            })
            .unwrap_or_else(|| room_placeholder_url(&self.name()))
    }

    /// All events of the live chain in reverse-chronological order.
    pub fn last_events(&self) -> Result<Vec<ChatEvent>, CoreError> {
        let live = self.client.live_segment(&self.room_id)?;
        let mut events = SegmentChain::new(&self.client).collect_events(live)?;
        events.sort_by(|a, b| b.timestamp_ms.cmp(&a.timestamp_ms));
        Ok(events)
    }

    /// Most recent text message from the live segment or its backward
    /// neighbor, when one exists.
    pub fn last_text_message(&self) -> Result<Option<Message<C>>, CoreError> {
        let live = self.client.live_segment(&self.room_id)?;
        let live_snapshot = self.client.segment(live)?;

        let mut candidates: Vec<ChatEvent> =
            live_snapshot.events.iter().rev().cloned().collect();
        if let Some(prev) = live_snapshot.neighbor(Direction::Backward) {
            let prev_snapshot = self.client.segment(prev)?;
            candidates.extend(prev_snapshot.events.iter().rev().cloned());
        }

        Ok(candidates
            .into_iter()
            .find(|event| {
                matches!(
                    event.payload,
                    chat_protocol::EventPayload::Message(MessageContent::Text { .. })
                )
            })
            .map(|event| Message::new(event, self.client.clone())))
    }
}

#[cfg(test)]
mod tests {
    use chat_protocol::{EventPayload, InMemoryClient, MediaSource};

    use super::*;

    fn snapshot(room_id: &str) -> RoomSnapshot {
        RoomSnapshot {
            room_id: room_id.to_owned(),
            name: "Ferris Fans".to_owned(),
            topic: "crab talk".to_owned(),
            avatar: None,
            fallback_member_avatar: None,
            direct_peer: None,
            encrypted: false,
            unread_notifications: 3,
            last_active_ms: 1_731_000_000,
        }
    }

    fn text_event(event_id: &str, ts: u64) -> ChatEvent {
        ChatEvent {
            event_id: event_id.to_owned(),
            room_id: "!r:example.org".to_owned(),
            sender: "@alice:example.org".to_owned(),
            timestamp_ms: ts,
            payload: EventPayload::Message(MessageContent::Text {
                body: format!("body {event_id}"),
            }),
            relation: None,
            redacted: false,
        }
    }

    #[test]
    fn constructor_rejects_unknown_rooms() {
        let client = InMemoryClient::new("@me:example.org");
        let err = Room::new("!nope:example.org", client).expect_err("unknown room");
        assert_eq!(err.code, "not_found");
    }

    #[test]
    fn avatar_resolution_walks_the_fallback_chain() {
        let client = InMemoryClient::new("@me:example.org");
        let mut room_snapshot = snapshot("!r:example.org");
        room_snapshot.fallback_member_avatar = Some(MediaSource::Plain {
            url: "mxc://example.org/member".to_owned(),
        });
        client.add_room(room_snapshot);

        let room = Room::new("!r:example.org", client.clone()).expect("room");
        assert_eq!(
            room.avatar_url(),
            "https://chat.example.org/media/example.org/member"
        );
    }

    #[test]
    fn avatar_resolution_generates_placeholder_when_nothing_is_set() {
        let client = InMemoryClient::new("@me:example.org");
        client.add_room(snapshot("!r:example.org"));

        let room = Room::new("!r:example.org", client).expect("room");
        assert_eq!(
            room.avatar_url(),
            "https://api.dicebear.com/6.x/initials/svg?seed=Ferris Fans&chars=1"
        );
    }

    #[test]
    fn last_events_spans_the_chain_newest_first() {
        let client = InMemoryClient::new("@me:example.org");
        let live = client.add_room(snapshot("!r:example.org"));
        client.seed_event(live, text_event("$l1", 40));
        client.seed_event(live, text_event("$l2", 50));
        client.link_backward_segment(
            "!r:example.org",
            vec![text_event("$h1", 10), text_event("$h2", 20)],
            None,
        );

        let room = Room::new("!r:example.org", client).expect("room");
        let ids: Vec<String> = room
            .last_events()
            .expect("events")
            .into_iter()
            .map(|event| event.event_id)
            .collect();
        assert_eq!(ids, ["$l2", "$l1", "$h2", "$h1"]);
    }

    #[test]
    fn last_text_message_checks_live_then_backward_neighbor() {
        let client = InMemoryClient::new("@me:example.org");
        let live = client.add_room(snapshot("!r:example.org"));
        let mut reaction = text_event("$react", 60);
        reaction.payload = EventPayload::Reaction { key: "👍".into() };
        client.seed_event(live, reaction);
        client.link_backward_segment("!r:example.org", vec![text_event("$old", 10)], None);

        let room = Room::new("!r:example.org", client).expect("room");
        let last = room
            .last_text_message()
            .expect("lookup")
            .expect("found one");
        assert_eq!(last.event().event_id, "$old");
    }
}
