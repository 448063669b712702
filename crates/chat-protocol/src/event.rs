use serde::{Deserialize, Serialize};

/// MIME types considered safe to hand to a renderer as a blob.
const ALLOWED_BLOB_MIMETYPES: &[&str] = &[
    "image/jpeg",
    "image/gif",
    "image/png",
    "image/apng",
    "image/webp",
    "image/avif",
    "video/mp4",
    "video/webm",
    "video/ogg",
    "video/quicktime",
    "audio/mp4",
    "audio/webm",
    "audio/aac",
    "audio/mpeg",
    "audio/ogg",
    "audio/wave",
    "audio/wav",
    "audio/x-wav",
    "audio/x-pn-wav",
    "audio/flac",
    "audio/x-flac",
];

/// Clamp an attachment MIME type to the blob-safe allow-list.
///
/// Unknown or parameterized types degrade to `application/octet-stream`;
/// `video/quicktime` is rewritten to `video/mp4` for renderer compatibility.
pub fn blob_safe_mimetype(mimetype: &str) -> &'static str {
    let bare = mimetype.split(';').next().unwrap_or_default().trim();
    if !ALLOWED_BLOB_MIMETYPES.contains(&bare) {
        return "application/octet-stream";
    }
    if bare == "video/quicktime" {
        return "video/mp4";
    }
    ALLOWED_BLOB_MIMETYPES
        .iter()
        .find(|candidate| **candidate == bare)
        .copied()
        .unwrap_or("application/octet-stream")
}

/// Reference to an encrypted attachment; key material stays inside the SDK.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EncryptedFileSource {
    /// Content URI of the ciphertext payload.
    pub url: String,
    /// Declared MIME type of the decrypted payload.
    pub mimetype: Option<String>,
}

/// Where an attachment's bytes live.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum MediaSource {
    /// Plain content URI, fetchable directly.
    Plain {
        /// Content URI (`mxc://`-style, resolved by the client).
        url: String,
    },
    /// Encrypted attachment that must be decrypted after fetching.
    Encrypted {
        /// Ciphertext reference.
        file: EncryptedFileSource,
    },
}

impl MediaSource {
    /// Content URI regardless of encryption.
    pub fn url(&self) -> &str {
        match self {
            MediaSource::Plain { url } => url,
            MediaSource::Encrypted { file } => &file.url,
        }
    }
}

/// Structured message content, one variant per message kind.
///
/// Unknown kinds map to [`MessageContent::Other`] on construction instead of
/// failing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum MessageContent {
    /// Plain text message.
    Text {
        /// Message body.
        body: String,
    },
    /// Image attachment.
    Image {
        /// Caption/alt body.
        body: String,
        /// Attachment bytes location.
        source: MediaSource,
    },
    /// Video attachment.
    Video {
        /// Caption/alt body.
        body: String,
        /// Attachment bytes location.
        source: MediaSource,
    },
    /// Audio attachment.
    Audio {
        /// Caption/alt body.
        body: String,
        /// Attachment bytes location.
        source: MediaSource,
    },
    /// Generic file attachment.
    File {
        /// File name body.
        body: String,
        /// Attachment bytes location.
        source: MediaSource,
    },
    /// Marker for content that failed to decrypt permanently.
    BadEncryption,
    /// Fallback for message kinds outside the closed set.
    Other {
        /// Original message kind tag.
        msgtype: String,
        /// Best-effort body.
        body: String,
    },
}

impl MessageContent {
    /// Build content from a raw kind tag, falling back to `Other`.
    pub fn from_parts(msgtype: &str, body: String, source: Option<MediaSource>) -> Self {
        match (msgtype, source) {
            ("m.text", _) => MessageContent::Text { body },
            ("m.image", Some(source)) => MessageContent::Image { body, source },
            ("m.video", Some(source)) => MessageContent::Video { body, source },
            ("m.audio", Some(source)) => MessageContent::Audio { body, source },
            ("m.file", Some(source)) => MessageContent::File { body, source },
            ("m.bad.encryption", _) => MessageContent::BadEncryption,
            (other, _) => MessageContent::Other {
                msgtype: other.to_owned(),
                body,
            },
        }
    }

    /// Attachment source for media-bearing variants.
    pub fn source(&self) -> Option<&MediaSource> {
        match self {
            MessageContent::Image { source, .. }
            | MessageContent::Video { source, .. }
            | MessageContent::Audio { source, .. }
            | MessageContent::File { source, .. } => Some(source),
            _ => None,
        }
    }

    /// Display body, when the variant carries one.
    pub fn body(&self) -> Option<&str> {
        match self {
            MessageContent::Text { body }
            | MessageContent::Image { body, .. }
            | MessageContent::Video { body, .. }
            | MessageContent::Audio { body, .. }
            | MessageContent::File { body, .. }
            | MessageContent::Other { body, .. } => Some(body),
            MessageContent::BadEncryption => None,
        }
    }
}

/// Membership change carried by a member event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Membership {
    /// User joined the room.
    Join,
    /// User left or was removed.
    Leave,
    /// User was invited.
    Invite,
    /// User was banned.
    Ban,
}

/// Event payload, tagged by event kind.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EventPayload {
    /// Conversation message.
    Message(MessageContent),
    /// Reaction to another event.
    Reaction {
        /// Reaction key (usually an emoji).
        key: String,
    },
    /// Room membership change.
    Member {
        /// New membership state.
        membership: Membership,
        /// Display name at the time of the event.
        display_name: Option<String>,
        /// Avatar at the time of the event.
        avatar: Option<MediaSource>,
    },
    /// Room creation event, always the chain's first event.
    Create,
    /// Any other room state event.
    State {
        /// Raw state event kind tag.
        kind: String,
    },
    /// Ciphertext payload that has not been decrypted yet.
    Encrypted,
}

/// How an event relates to another event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RelationKind {
    /// Replaces the target's content (an edit).
    Replace,
    /// Annotates the target (a reaction).
    Annotation,
}

/// Relation from one event to a target event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Relation {
    /// Event id being related to.
    pub target_event_id: String,
    /// Relation kind.
    pub kind: RelationKind,
}

/// Immutable record of one room event.
///
/// Redaction is one-way: once `redacted` is set it is never cleared within
/// this client's view. Decryption is monotonic: an [`EventPayload::Encrypted`]
/// payload may be replaced by clear content, never the reverse.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatEvent {
    /// Unique event id.
    pub event_id: String,
    /// Room the event belongs to.
    pub room_id: String,
    /// Sender user id.
    pub sender: String,
    /// Origin timestamp in milliseconds since the Unix epoch.
    pub timestamp_ms: u64,
    /// Structured payload.
    pub payload: EventPayload,
    /// Relation to another event, when present.
    pub relation: Option<Relation>,
    /// Whether the event has been redacted.
    pub redacted: bool,
}

impl ChatEvent {
    /// Whether the payload is still ciphertext.
    pub fn is_encrypted(&self) -> bool {
        matches!(self.payload, EventPayload::Encrypted)
    }

    /// Target event id of this event's relation, when present.
    pub fn relates_to(&self) -> Option<&str> {
        self.relation
            .as_ref()
            .map(|relation| relation.target_event_id.as_str())
    }

    /// Whether this event is a `Replace` edit of another event.
    pub fn is_edit(&self) -> bool {
        matches!(
            self.relation,
            Some(Relation {
                kind: RelationKind::Replace,
                ..
            })
        )
    }

    /// Whether this event is a reaction.
    pub fn is_reaction(&self) -> bool {
        matches!(self.payload, EventPayload::Reaction { .. })
    }
}
