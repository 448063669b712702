use chat_protocol::{
    ChatEvent, EventPayload, MediaSource, MessageContent, ProtocolClient, blob_safe_mimetype,
};

use crate::error::{CoreError, CoreErrorCategory};

/// Deterministic placeholder avatar keyed by a display-name seed.
pub(crate) fn initials_avatar_url(seed: &str) -> String {
    format!("https://api.dicebear.com/6.x/initials/svg?seed={seed}&fontWeight=900")
}

/// Read-only message façade over a raw event plus a client handle.
///
/// Accessors derive everything from the wrapped event's stored type/content
/// tags and never mutate shared state.
#[derive(Clone)]
pub struct Message<C: ProtocolClient> {
    event: ChatEvent,
    client: C,
}

impl<C: ProtocolClient> std::fmt::Debug for Message<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Message").field("event", &self.event).finish()
    }
}

impl<C: ProtocolClient> Message<C> {
    /// Wrap a raw event.
    pub fn new(event: ChatEvent, client: C) -> Self {
        Self { event, client }
    }

    /// The wrapped raw event.
    pub fn event(&self) -> &ChatEvent {
        &self.event
    }

    /// Message content, when the event is a conversation message.
    pub fn content(&self) -> Option<&MessageContent> {
        match &self.event.payload {
            EventPayload::Message(content) => Some(content),
            _ => None,
        }
    }

    pub fn is_text(&self) -> bool {
        matches!(self.content(), Some(MessageContent::Text { .. }))
    }

    pub fn is_image(&self) -> bool {
        matches!(self.content(), Some(MessageContent::Image { .. }))
    }

    pub fn is_video(&self) -> bool {
        matches!(self.content(), Some(MessageContent::Video { .. }))
    }

    pub fn is_redacted(&self) -> bool {
        self.event.redacted
    }

    /// Whether the payload is still undecrypted ciphertext.
    pub fn is_encrypted(&self) -> bool {
        self.event.is_encrypted()
    }

    pub fn is_member_event(&self) -> bool {
        matches!(self.event.payload, EventPayload::Member { .. })
    }

    /// Whether this is a room state event rather than conversation content.
    pub fn is_room_event(&self) -> bool {
        matches!(
            self.event.payload,
            EventPayload::Member { .. } | EventPayload::Create | EventPayload::State { .. }
        )
    }

    /// Display allow-list for the conversation view: text, image, video, and
    /// the bad-encryption marker; redacted events are never shown.
    pub fn should_show(&self) -> bool {
        if self.is_redacted() {
            return false;
        }
        matches!(
            self.content(),
            Some(
                MessageContent::Text { .. }
                    | MessageContent::Image { .. }
                    | MessageContent::Video { .. }
                    | MessageContent::BadEncryption
            )
        )
    }

    /// Sender display name, falling back to the sender id.
    pub fn sender_display_name(&self) -> String {
        self.client
            .user(&self.event.sender)
            .ok()
            .and_then(|user| user.display_name)
            .unwrap_or_else(|| self.event.sender.clone())
    }

    /// Sender avatar URL: profile avatar when resolvable, placeholder
    /// keyed by the display name otherwise.
    pub fn sender_avatar_url(&self) -> String {
        self.client
            .user(&self.event.sender)
            .ok()
            .and_then(|user| user.avatar)
            .and_then(|source| self.client.media_url(&source))
            .unwrap_or_else(|| initials_avatar_url(&self.sender_display_name()))
    }

    /// Blob-safe MIME type of the attachment, when the message carries one.
    pub fn attachment_mimetype(&self) -> Option<&'static str> {
        let source = self.content()?.source()?;
        match source {
            MediaSource::Plain { .. } => None,
            MediaSource::Encrypted { file } => {
                Some(blob_safe_mimetype(file.mimetype.as_deref().unwrap_or("")))
            }
        }
    }

    /// Fetch the attachment's bytes, decrypting when the source is encrypted.
    ///
    /// Safe to call concurrently and repeatedly; no memoization.
    pub async fn attachment_bytes(&self) -> Result<Vec<u8>, CoreError> {
        let source = self
            .content()
            .and_then(MessageContent::source)
            .ok_or_else(|| {
                CoreError::new(
                    CoreErrorCategory::NotFound,
                    "no_attachment",
                    format!("event {} carries no attachment", self.event.event_id),
                )
            })?;

        let url = self.client.media_url(source).ok_or_else(|| {
            CoreError::new(
                CoreErrorCategory::NotFound,
                "unresolvable_media",
                format!("cannot resolve media url for event {}", self.event.event_id),
            )
        })?;

        let data = self.client.fetch_media(&url).await?;
        match source {
            MediaSource::Plain { .. } => Ok(data),
            MediaSource::Encrypted { file } => {
                Ok(self.client.decrypt_attachment(&data, file).await?)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use chat_protocol::{EncryptedFileSource, InMemoryClient, Membership, UserSnapshot};

    use super::*;

    fn raw_event(payload: EventPayload) -> ChatEvent {
        ChatEvent {
            event_id: "$e1".to_owned(),
            room_id: "!r:example.org".to_owned(),
            sender: "@alice:example.org".to_owned(),
            timestamp_ms: 1_731_000_000,
            payload,
            relation: None,
            redacted: false,
        }
    }

    fn text_message(client: &InMemoryClient) -> Message<InMemoryClient> {
        Message::new(
            raw_event(EventPayload::Message(MessageContent::Text {
                body: "hello".into(),
            })),
            client.clone(),
        )
    }

    #[test]
    fn classification_follows_content_tags() {
        let client = InMemoryClient::new("@me:example.org");
        let text = text_message(&client);
        assert!(text.is_text());
        assert!(!text.is_image());
        assert!(!text.is_member_event());
        assert!(!text.is_room_event());
        assert!(text.should_show());

        let member = Message::new(
            raw_event(EventPayload::Member {
                membership: Membership::Join,
                display_name: None,
                avatar: None,
            }),
            client.clone(),
        );
        assert!(member.is_member_event());
        assert!(member.is_room_event());
        assert!(!member.should_show());

        let bad = Message::new(
            raw_event(EventPayload::Message(MessageContent::BadEncryption)),
            client,
        );
        assert!(bad.should_show());
    }

    #[test]
    fn redacted_events_are_never_shown() {
        let client = InMemoryClient::new("@me:example.org");
        let mut event = raw_event(EventPayload::Message(MessageContent::Text {
            body: "gone".into(),
        }));
        event.redacted = true;
        let message = Message::new(event, client);
        assert!(!message.should_show());
    }

    #[test]
    fn sender_avatar_falls_back_to_placeholder() {
        let client = InMemoryClient::new("@me:example.org");
        client.add_user(UserSnapshot {
            user_id: "@alice:example.org".to_owned(),
            display_name: Some("Alice".to_owned()),
            avatar: None,
            presence: None,
            status_message: None,
        });

        let message = text_message(&client);
        assert_eq!(message.sender_display_name(), "Alice");
        assert_eq!(
            message.sender_avatar_url(),
            "https://api.dicebear.com/6.x/initials/svg?seed=Alice&fontWeight=900"
        );
    }

    #[tokio::test]
    async fn fetches_and_decrypts_encrypted_attachments() {
        let client = InMemoryClient::new("@me:example.org");
        let file = EncryptedFileSource {
            url: "mxc://example.org/cipher".to_owned(),
            mimetype: Some("image/png".to_owned()),
        };
        client.stage_media(
            "https://chat.example.org/media/example.org/cipher",
            b"cipher".to_vec(),
        );
        client.stage_attachment_clear("mxc://example.org/cipher", b"clear".to_vec());

        let message = Message::new(
            raw_event(EventPayload::Message(MessageContent::Image {
                body: "pic".into(),
                source: MediaSource::Encrypted { file },
            })),
            client,
        );

        assert_eq!(message.attachment_mimetype(), Some("image/png"));
        let bytes = message.attachment_bytes().await.expect("attachment");
        assert_eq!(bytes, b"clear");
    }

    #[tokio::test]
    async fn attachment_on_text_event_is_a_not_found_failure() {
        let client = InMemoryClient::new("@me:example.org");
        let message = text_message(&client);
        let err = message.attachment_bytes().await.expect_err("no attachment");
        assert_eq!(err.code, "no_attachment");
    }
}
