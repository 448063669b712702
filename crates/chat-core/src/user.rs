use chat_protocol::{DeviceInfo, ProtocolClient};
use sha2::{Digest, Sha256};

use crate::error::CoreError;

/// Deterministic user palette derived from a display-name hash.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UserColor {
    Green,
    Yellow,
    Blue,
    Orange,
    Purple,
    Red,
    Gray,
    Pink,
}

impl UserColor {
    const PALETTE: [UserColor; 8] = [
        UserColor::Green,
        UserColor::Yellow,
        UserColor::Blue,
        UserColor::Orange,
        UserColor::Purple,
        UserColor::Red,
        UserColor::Gray,
        UserColor::Pink,
    ];

    fn from_seed(seed: &str) -> Self {
        let digest = Sha256::digest(seed.as_bytes());
        Self::PALETTE[usize::from(digest[0]) % Self::PALETTE.len()]
    }

    /// CSS utility class for the color.
    pub fn css_class(self) -> &'static str {
        match self {
            UserColor::Green => "text-green-400",
            UserColor::Yellow => "text-yellow-400",
            UserColor::Blue => "text-blue-400",
            UserColor::Orange => "text-orange-400",
            UserColor::Purple => "text-purple-400",
            UserColor::Red => "text-red-400",
            UserColor::Gray => "text-gray-400",
            UserColor::Pink => "text-pink-400",
        }
    }
}

/// Deterministic user placeholder avatar keyed by display name.
fn user_placeholder_url(seed: &str) -> String {
    format!("https://api.dicebear.com/6.x/initials/svg?seed={seed}&fontWeight=900&chars=1")
}

/// Read-only user façade.
#[derive(Clone)]
pub struct User<C: ProtocolClient> {
    client: C,
    user_id: String,
}

impl<C: ProtocolClient> std::fmt::Debug for User<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("User").field("user_id", &self.user_id).finish()
    }
}

impl<C: ProtocolClient> User<C> {
    /// Wrap a user id; fails when the client does not know the user.
    pub fn new(user_id: impl Into<String>, client: C) -> Result<Self, CoreError> {
        let user_id = user_id.into();
        client.user(&user_id)?;
        Ok(Self { client, user_id })
    }

    /// User identifier.
    pub fn id(&self) -> &str {
        &self.user_id
    }

    /// Profile display name, when set.
    pub fn display_name(&self) -> Option<String> {
        self.client
            .user(&self.user_id)
            .ok()
            .and_then(|user| user.display_name)
    }

    /// Presence state string, when known.
    pub fn presence(&self) -> Option<String> {
        self.client
            .user(&self.user_id)
            .ok()
            .and_then(|user| user.presence)
    }

    /// Free-form status message, when set.
    pub fn status_message(&self) -> Option<String> {
        self.client
            .user(&self.user_id)
            .ok()
            .and_then(|user| user.status_message)
    }

    /// Avatar URL, falling back to a generated placeholder.
    pub fn avatar_url(&self) -> String {
        self.client
            .user(&self.user_id)
            .ok()
            .and_then(|user| user.avatar)
            .and_then(|source| self.client.media_url(&source))
            .unwrap_or_else(|| {
                user_placeholder_url(&self.display_name().unwrap_or_default())
            })
    }

    /// Deterministic color bucket from the display name (or user id).
    ///
    /// Pure CPU hashing; idempotent and safe to call repeatedly.
    pub fn color(&self) -> UserColor {
        let seed = self
            .display_name()
            .unwrap_or_else(|| self.user_id.clone());
        UserColor::from_seed(&seed)
    }

    /// Devices attached to the user's account.
    pub async fn devices(&self) -> Result<Vec<DeviceInfo>, CoreError> {
        Ok(self.client.user_devices(&self.user_id).await?)
    }
}
