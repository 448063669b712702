use serde::{Deserialize, Serialize};

use crate::event::ChatEvent;

/// Opaque identifier of one history segment within a room's chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SegmentId(pub u64);

/// Pagination direction along the segment chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    /// Toward older history.
    Backward,
    /// Toward newer history.
    Forward,
}

impl Direction {
    /// The opposite direction.
    pub fn reversed(self) -> Self {
        match self {
            Direction::Backward => Direction::Forward,
            Direction::Forward => Direction::Backward,
        }
    }
}

/// Snapshot of one segment: its events, neighbor links, and boundary tokens.
///
/// A `None` token is the "no more data in that direction" sentinel; a
/// `Some` token means more history may exist and a fetch is worth trying.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SegmentSnapshot {
    /// Segment identifier.
    pub id: SegmentId,
    /// Events in natural order, oldest first.
    pub events: Vec<ChatEvent>,
    /// Older neighbor, when linked.
    pub prev: Option<SegmentId>,
    /// Newer neighbor, when linked.
    pub next: Option<SegmentId>,
    /// Backward pagination token.
    pub prev_token: Option<String>,
    /// Forward pagination token.
    pub next_token: Option<String>,
}

impl SegmentSnapshot {
    /// Neighbor link in the given direction.
    pub fn neighbor(&self, direction: Direction) -> Option<SegmentId> {
        match direction {
            Direction::Backward => self.prev,
            Direction::Forward => self.next,
        }
    }

    /// Pagination token in the given direction.
    pub fn token(&self, direction: Direction) -> Option<&str> {
        match direction {
            Direction::Backward => self.prev_token.as_deref(),
            Direction::Forward => self.next_token.as_deref(),
        }
    }
}
