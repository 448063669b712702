//! Client-side room, user and timeline state built on a protocol client.
//!
//! This crate wraps an SDK-level [`chat_protocol::ProtocolClient`] with
//! display-oriented entity accessors and a per-room timeline store that keeps
//! a local, ordered projection of events consistent under pagination, live
//! delivery, decryption and redaction.

/// Segment chain traversal helpers.
pub mod chain;
/// Stable core error types.
pub mod error;
/// Message wrapper and attachment resolution.
pub mod event;
/// Room entity wrapper.
pub mod room;
/// Timeline signal types and broadcast hub.
pub mod signal;
/// Timeline store lifecycle state machine.
pub mod state;
/// The per-room timeline store.
pub mod timeline;
/// User entity wrapper and display colors.
pub mod user;

pub use chain::SegmentChain;
pub use error::{CoreError, CoreErrorCategory};
pub use event::Message;
pub use room::Room;
pub use signal::{SignalHub, SignalStream, TimelineSignal};
pub use state::TimelinePhase;
pub use timeline::{RoomTimeline, TimelineConfig};
pub use user::{User, UserColor};
