//! Scripted end-to-end exercise of the timeline store against the in-memory
//! client. Useful for eyeballing signal flow with `CHAT_SMOKE_LOG=trace`.

mod logging;

use std::time::Duration;

use chat_core::{RoomTimeline, TimelineConfig, TimelineSignal};
use chat_protocol::{ChatEvent, EventPayload, InMemoryClient, MessageContent, RoomSnapshot};
use tokio::time::timeout;
use tracing::info;

const ROOM: &str = "!smoke:chat.example.org";

fn text_event(event_id: &str, sender: &str, ts: u64, body: &str) -> ChatEvent {
    ChatEvent {
        event_id: event_id.to_owned(),
        room_id: ROOM.to_owned(),
        sender: sender.to_owned(),
        timestamp_ms: ts,
        payload: EventPayload::Message(MessageContent::Text {
            body: body.to_owned(),
        }),
        relation: None,
        redacted: false,
    }
}

fn scripted_client() -> InMemoryClient {
    let client = InMemoryClient::new("@smoke:chat.example.org");
    let live = client.add_room(RoomSnapshot {
        room_id: ROOM.to_owned(),
        name: "Smoke Test Room".to_owned(),
        topic: "scripted fixture".to_owned(),
        avatar: None,
        fallback_member_avatar: None,
        direct_peer: None,
        encrypted: false,
        unread_notifications: 0,
        last_active_ms: 0,
    });
    client.seed_event(live, text_event("$l1", "@alice:chat.example.org", 40, "hello"));
    client.seed_event(live, text_event("$l2", "@bob:chat.example.org", 50, "hi there"));
    client.queue_fill(
        ROOM,
        chat_protocol::Direction::Backward,
        vec![
            text_event("$h1", "@alice:chat.example.org", 10, "older"),
            text_event("$h2", "@bob:chat.example.org", 20, "still old"),
            text_event("$h3", "@alice:chat.example.org", 30, "recent-ish"),
        ],
    );
    client
}

#[tokio::main]
async fn main() {
    logging::init();

    let client = scripted_client();
    let store = match RoomTimeline::new(ROOM, client.clone(), TimelineConfig::default()) {
        Ok(store) => store,
        Err(err) => {
            eprintln!("Failed to build timeline store: {err}");
            std::process::exit(1);
        }
    };
    let mut signals = store.subscribe();

    if let Err(err) = store.load_live_timeline().await {
        eprintln!("Failed to load live timeline: {err}");
        std::process::exit(1);
    }
    info!(room = %store.room().name(), events = store.timeline().len(), "live timeline loaded");

    match store.paginate(true, 30).await {
        Ok(loaded) => info!(loaded, "backward pagination finished"),
        Err(err) => info!(%err, "backward pagination stopped"),
    }

    client.push_live_event(text_event("$live", "@bob:chat.example.org", 60, "fresh"));
    client.send_typing(ROOM, "@alice:chat.example.org", true);

    let deadline = Duration::from_secs(2);
    while let Ok(Ok(signal)) = timeout(deadline, signals.recv()).await {
        match signal {
            TimelineSignal::Event(event) => {
                info!(event_id = event.event_id, "live event appended");
            }
            TimelineSignal::TypingMembersUpdated(members) => {
                info!(?members, "typing members changed");
                break;
            }
            other => info!(?other, "signal"),
        }
    }

    for event in store.timeline() {
        let body = match &event.payload {
            EventPayload::Message(content) => content.body().unwrap_or("<attachment>"),
            _ => "<non-message>",
        };
        println!("{:>13}  {:<28}  {}", event.timestamp_ms, event.sender, body);
    }

    store.detach().await;
}
