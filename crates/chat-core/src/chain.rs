use chat_protocol::{ChatEvent, Direction, ProtocolClient, SegmentId, SegmentSnapshot};

use crate::error::CoreError;

/// Directional walks over a room's linked segments.
///
/// Segments form a doubly linked chain owned by the protocol client; this
/// type names the traversals the store needs instead of repeating pointer
/// chasing at every call site.
pub struct SegmentChain<'a, C: ProtocolClient> {
    client: &'a C,
}

impl<'a, C: ProtocolClient> SegmentChain<'a, C> {
    /// Wrap a client handle.
    pub fn new(client: &'a C) -> Self {
        Self { client }
    }

    /// Walk neighbor links from `from` to the chain's end in `direction`.
    pub fn boundary(
        &self,
        from: SegmentId,
        direction: Direction,
    ) -> Result<SegmentSnapshot, CoreError> {
        let mut current = self.client.segment(from)?;
        while let Some(next) = current.neighbor(direction) {
            current = self.client.segment(next)?;
        }
        Ok(current)
    }

    /// The chain's oldest segment reachable from `from`.
    pub fn first_backward(&self, from: SegmentId) -> Result<SegmentSnapshot, CoreError> {
        self.boundary(from, Direction::Backward)
    }

    /// The chain's newest segment reachable from `from`.
    pub fn last_forward(&self, from: SegmentId) -> Result<SegmentSnapshot, CoreError> {
        self.boundary(from, Direction::Forward)
    }

    /// All events of the chain containing `from`, oldest segment first,
    /// each segment in natural order.
    pub fn collect_events(&self, from: SegmentId) -> Result<Vec<ChatEvent>, CoreError> {
        let mut events = Vec::new();
        let mut current = Some(self.first_backward(from)?);
        while let Some(snapshot) = current {
            events.extend(snapshot.events.iter().cloned());
            current = match snapshot.neighbor(Direction::Forward) {
                Some(next) => Some(self.client.segment(next)?),
                None => None,
            };
        }
        Ok(events)
    }

    /// Whether `target` belongs to the chain containing `from`.
    pub fn is_linked(&self, from: SegmentId, target: SegmentId) -> Result<bool, CoreError> {
        let mut current = Some(self.first_backward(from)?);
        while let Some(snapshot) = current {
            if snapshot.id == target {
                return Ok(true);
            }
            current = match snapshot.neighbor(Direction::Forward) {
                Some(next) => Some(self.client.segment(next)?),
                None => None,
            };
        }
        Ok(false)
    }
}
