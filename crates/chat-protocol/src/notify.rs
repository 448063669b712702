use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::event::ChatEvent;

/// Push-style notification delivered by the protocol client.
///
/// Every variant carries the room id it applies to; consumers are expected
/// to drop notifications for rooms they do not track.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ClientNotification {
    /// A new event arrived on a room timeline.
    TimelineEvent {
        /// Room the event belongs to.
        room_id: String,
        /// The event itself.
        event: ChatEvent,
        /// `true` when appended to the live segment in real time, `false`
        /// for backfilled history.
        live: bool,
    },
    /// An event was redacted.
    Redaction {
        /// Room the redaction applies to.
        room_id: String,
        /// The redaction event.
        event: ChatEvent,
        /// Id of the event being redacted.
        redacts: String,
    },
    /// A previously encrypted event finished decrypting.
    Decrypted {
        /// Room the event belongs to.
        room_id: String,
        /// The event with clear content.
        event: ChatEvent,
    },
    /// A member started or stopped typing.
    Typing {
        /// Room the typing state applies to.
        room_id: String,
        /// The member.
        user_id: String,
        /// New typing state.
        typing: bool,
    },
    /// Read receipts changed.
    Receipt {
        /// Room the receipts apply to.
        room_id: String,
        /// Event id to list of users who marked it read.
        receipts: HashMap<String, Vec<String>>,
    },
}

impl ClientNotification {
    /// Room id the notification is scoped to.
    pub fn room_id(&self) -> &str {
        match self {
            ClientNotification::TimelineEvent { room_id, .. }
            | ClientNotification::Redaction { room_id, .. }
            | ClientNotification::Decrypted { room_id, .. }
            | ClientNotification::Typing { room_id, .. }
            | ClientNotification::Receipt { room_id, .. } => room_id,
        }
    }
}
