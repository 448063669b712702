use std::{
    collections::{HashMap, HashSet},
    sync::Arc,
};

use chat_protocol::{
    ChatEvent, ClientNotification, Direction, EventPayload, ProtocolClient, SegmentId,
};
use futures::future::join_all;
use parking_lot::Mutex;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace, warn};

use crate::{
    chain::SegmentChain,
    error::CoreError,
    room::Room,
    signal::{SignalHub, SignalStream, TimelineSignal},
    state::TimelinePhase,
};

/// Runtime tuning for a timeline store.
#[derive(Debug, Clone, Copy)]
pub struct TimelineConfig {
    /// Signal broadcast buffer capacity.
    pub signal_buffer: usize,
    /// Pagination limit used when callers pass zero.
    pub default_paginate_limit: u16,
    /// Hard cap applied to requested pagination limits.
    pub pagination_limit_cap: u16,
}

impl Default for TimelineConfig {
    fn default() -> Self {
        Self {
            signal_buffer: 512,
            default_paginate_limit: 30,
            pagination_limit_cap: 100,
        }
    }
}

impl TimelineConfig {
    /// Clamp a requested pagination limit; the result is always in `1..=cap`.
    pub fn bounded_paginate_limit(&self, requested: u16) -> u16 {
        let requested = if requested == 0 {
            self.default_paginate_limit
        } else {
            requested
        };
        requested.max(1).min(self.pagination_limit_cap.max(1))
    }
}

/// Member events that should be hidden from the conversation view.
///
/// Currently nothing is suppressed; the hook exists so the classification
/// precedence keeps its slot for membership filtering.
fn suppress_member_event(_event: &ChatEvent) -> bool {
    false
}

/// Which channel an event lands in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Placement {
    Dropped,
    Reaction,
    Edit,
    Main,
}

/// Classify an event into exactly one channel.
///
/// Precedence: suppressed member events and redacted events are dropped,
/// then reactions, then edits, then the main sequence.
fn classify(event: &ChatEvent) -> Placement {
    if matches!(event.payload, EventPayload::Member { .. }) && suppress_member_event(event) {
        return Placement::Dropped;
    }
    if event.redacted {
        return Placement::Dropped;
    }
    if event.is_reaction() {
        return Placement::Reaction;
    }
    if event.is_edit() {
        return Placement::Edit;
    }
    Placement::Main
}

/// Insert a relation event into a per-target map, rejecting duplicate ids.
fn add_to_relation_map(map: &mut HashMap<String, Vec<ChatEvent>>, event: ChatEvent) {
    let Some(target) = event.relates_to().map(ToOwned::to_owned) else {
        return;
    };
    let entries = map.entry(target).or_default();
    if entries.iter().any(|existing| existing.event_id == event.event_id) {
        return;
    }
    entries.push(event);
}

#[derive(Debug, Default)]
struct TimelineChannels {
    timeline: Vec<ChatEvent>,
    edits: HashMap<String, Vec<ChatEvent>>,
    reactions: HashMap<String, Vec<ChatEvent>>,
}

impl TimelineChannels {
    fn add(&mut self, event: ChatEvent) {
        match classify(&event) {
            Placement::Dropped => {}
            Placement::Reaction => add_to_relation_map(&mut self.reactions, event),
            Placement::Edit => add_to_relation_map(&mut self.edits, event),
            Placement::Main => self.timeline.push(event),
        }
    }
}

struct TimelineInner {
    phase: TimelinePhase,
    active: SegmentId,
    channels: TimelineChannels,
    typing: HashSet<String>,
    pending_decryption: HashSet<String>,
}

#[derive(Debug)]
struct ListenerTask {
    stop: CancellationToken,
    task: JoinHandle<()>,
}

/// Ordered, mutable local projection of one room's events.
///
/// Owns three channels (main sequence, edits-by-target, reactions-by-target)
/// plus the active-segment pointer, and is their sole mutator. Pull updates
/// come from `paginate`; push updates arrive through the client notification
/// stream via a forwarding task attached on the first successful load.
/// Clones share state, like the SDK client handles they wrap.
#[derive(Clone)]
pub struct RoomTimeline<C: ProtocolClient> {
    client: C,
    room: Room<C>,
    config: TimelineConfig,
    signals: SignalHub,
    inner: Arc<Mutex<TimelineInner>>,
    listener: Arc<Mutex<Option<ListenerTask>>>,
}

impl<C: ProtocolClient> RoomTimeline<C> {
    /// Create a store for one room; fails when the room is unknown.
    pub fn new(room_id: impl Into<String>, client: C, config: TimelineConfig) -> Result<Self, CoreError> {
        let room = Room::new(room_id, client.clone())?;
        let live = client.live_segment(room.id())?;
        Ok(Self {
            client,
            room,
            config,
            signals: SignalHub::new(config.signal_buffer),
            inner: Arc::new(Mutex::new(TimelineInner {
                phase: TimelinePhase::Uninitialized,
                active: live,
                channels: TimelineChannels::default(),
                typing: HashSet::new(),
                pending_decryption: HashSet::new(),
            })),
            listener: Arc::new(Mutex::new(None)),
        })
    }

    /// The wrapped room.
    pub fn room(&self) -> &Room<C> {
        &self.room
    }

    /// Subscribe to store signals.
    pub fn subscribe(&self) -> SignalStream {
        self.signals.subscribe()
    }

    /// Current lifecycle phase.
    pub fn phase(&self) -> TimelinePhase {
        self.inner.lock().phase
    }

    /// Snapshot of the main sequence in display order.
    pub fn timeline(&self) -> Vec<ChatEvent> {
        self.inner.lock().channels.timeline.clone()
    }

    /// Edit events recorded against a target event, insertion order.
    pub fn edits_for(&self, target_event_id: &str) -> Vec<ChatEvent> {
        self.inner
            .lock()
            .channels
            .edits
            .get(target_event_id)
            .cloned()
            .unwrap_or_default()
    }

    /// Reaction events recorded against a target event, insertion order.
    pub fn reactions_for(&self, target_event_id: &str) -> Vec<ChatEvent> {
        self.inner
            .lock()
            .channels
            .reactions
            .get(target_event_id)
            .cloned()
            .unwrap_or_default()
    }

    /// Snapshot of members currently typing.
    pub fn typing_members(&self) -> HashSet<String> {
        self.inner.lock().typing.clone()
    }

    /// Whether the active chain's forward tail is the live segment.
    pub fn is_serving_live(&self) -> bool {
        let active = self.inner.lock().active;
        self.serves_live(active)
    }

    /// Whether backward pagination could yield more events.
    ///
    /// A leading room-create event means history is complete regardless of
    /// tokens.
    pub fn can_paginate_backward(&self) -> bool {
        let inner = self.inner.lock();
        if matches!(
            inner.channels.timeline.first().map(|event| &event.payload),
            Some(EventPayload::Create)
        ) {
            return false;
        }
        let active = inner.active;
        drop(inner);

        SegmentChain::new(&self.client)
            .first_backward(active)
            .map(|boundary| boundary.token(Direction::Backward).is_some())
            .unwrap_or(false)
    }

    /// Forward pagination only makes sense while browsing history.
    pub fn can_paginate_forward(&self) -> bool {
        !self.is_serving_live()
    }

    /// Index of an event in the main sequence.
    pub fn event_index(&self, event_id: &str) -> Option<usize> {
        self.inner
            .lock()
            .channels
            .timeline
            .iter()
            .position(|event| event.event_id == event_id)
    }

    /// Main-sequence event by id.
    pub fn find_event_by_id(&self, event_id: &str) -> Option<ChatEvent> {
        let inner = self.inner.lock();
        inner
            .channels
            .timeline
            .iter()
            .find(|event| event.event_id == event_id)
            .cloned()
    }

    /// Remove an event from the main sequence by id.
    pub fn delete_from_timeline(&self, event_id: &str) -> Option<ChatEvent> {
        let mut inner = self.inner.lock();
        let index = inner
            .channels
            .timeline
            .iter()
            .position(|event| event.event_id == event_id)?;
        Some(inner.channels.timeline.remove(index))
    }

    /// Whether an event belongs to the chain currently being viewed.
    pub async fn has_event_in_chain(&self, event_id: &str) -> bool {
        let Ok(found) = self.client.segment_containing(self.room.id(), event_id).await else {
            return false;
        };
        let active = self.inner.lock().active;
        SegmentChain::new(&self.client)
            .is_linked(active, found)
            .unwrap_or(false)
    }

    /// Event id the logged-in user has read up to.
    pub fn read_up_to(&self) -> Option<String> {
        self.client.read_up_to(self.room.id(), &self.client.user_id())
    }

    /// Index of the first main-sequence event newer than a read marker.
    pub async fn unread_event_index(&self, read_up_to_event_id: &str) -> Option<usize> {
        if !self.has_event_in_chain(read_up_to_event_id).await {
            return None;
        }
        let active = self.inner.lock().active;
        let chain_events = SegmentChain::new(&self.client).collect_events(active).ok()?;
        let read_ts = chain_events
            .iter()
            .find(|event| event.event_id == read_up_to_event_id)?
            .timestamp_ms;

        self.inner
            .lock()
            .channels
            .timeline
            .iter()
            .position(|event| event.timestamp_ms > read_ts)
    }

    /// Users who have read at least up to the given live event.
    pub fn event_readers(&self, event_id: &str) -> Vec<String> {
        let Ok(live_events) = self.client.live_events(self.room.id()) else {
            return Vec::new();
        };
        let mut readers: Vec<String> = Vec::new();
        for event in live_events.iter().rev() {
            for user in self.client.users_read_up_to(self.room.id(), &event.event_id) {
                if !readers.contains(&user) {
                    readers.push(user);
                }
            }
            if event.event_id == event_id {
                break;
            }
        }
        readers
    }

    /// Readers of the latest visible live event.
    pub fn live_readers(&self) -> Vec<String> {
        let Ok(live_events) = self.client.live_events(self.room.id()) else {
            return Vec::new();
        };
        let latest_visible = live_events
            .iter()
            .rev()
            .find(|event| classify(event) == Placement::Main)
            .or_else(|| live_events.last());
        match latest_visible {
            Some(event) => self.event_readers(&event.event_id),
            None => Vec::new(),
        }
    }

    /// Point the store at the live segment and rebuild all channels.
    ///
    /// Emits `Ready` with no event id. Attaches the notification listener on
    /// the first successful load.
    pub async fn load_live_timeline(&self) -> Result<(), CoreError> {
        let live = self.client.live_segment(self.room.id())?;
        self.reset_to(live, None).await
    }

    /// Jump to the segment containing an event and rebuild all channels.
    ///
    /// Resolution failure returns an error without side effects. On success
    /// emits `Ready` carrying the event id.
    pub async fn load_event_timeline(&self, event_id: &str) -> Result<(), CoreError> {
        let target = self
            .client
            .segment_containing(self.room.id(), event_id)
            .await?;
        self.reset_to(target, Some(event_id.to_owned())).await
    }

    /// Extend the active chain by up to `limit` events and rebuild.
    ///
    /// Rejected synchronously when the store is not ready or another
    /// pagination is in flight. A `None` boundary token short-circuits with
    /// a zero-loaded `Paginated` signal and no network call. Returns the net
    /// main-sequence growth on success.
    pub async fn paginate(&self, backwards: bool, limit: u16) -> Result<usize, CoreError> {
        let direction = if backwards {
            Direction::Backward
        } else {
            Direction::Forward
        };

        let (active, old_len) = {
            let mut inner = self.inner.lock();
            inner.phase.begin_pagination()?;
            (inner.active, inner.channels.timeline.len())
        };

        let boundary = match SegmentChain::new(&self.client).boundary(active, direction) {
            Ok(boundary) => boundary,
            Err(err) => {
                return Err(self.fail_pagination(backwards, err));
            }
        };

        if boundary.token(direction).is_none() {
            debug!(room = self.room.id(), ?direction, "chain boundary has no more data");
            self.signals.emit(TimelineSignal::Paginated {
                backwards,
                loaded: 0,
            });
            self.inner.lock().phase.end_pagination();
            return Err(CoreError::end_of_timeline());
        }

        let limit = self.config.bounded_paginate_limit(limit);
        if let Err(err) = self
            .client
            .paginate_segment(boundary.id, direction, limit)
            .await
        {
            return Err(self.fail_pagination(backwards, err.into()));
        }

        if self.room.is_encrypted() {
            self.decrypt_chain(active).await;
        }

        let events = match SegmentChain::new(&self.client).collect_events(active) {
            Ok(events) => events,
            Err(err) => {
                return Err(self.fail_pagination(backwards, err));
            }
        };

        let loaded = {
            let mut inner = self.inner.lock();
            inner.channels.timeline.clear();
            // The rebuild covers anything that was awaiting decryption;
            // straggler Decrypted notifications must not append twice.
            inner.pending_decryption.clear();
            for event in events {
                inner.channels.add(event);
            }
            inner.phase.end_pagination();
            inner.channels.timeline.len().saturating_sub(old_len)
        };

        debug!(room = self.room.id(), ?direction, loaded, "pagination complete");
        self.signals.emit(TimelineSignal::Paginated { backwards, loaded });
        Ok(loaded)
    }

    /// Detach the notification listener. Call once when discarding the store.
    pub async fn detach(&self) {
        let running = self.listener.lock().take();
        let Some(running) = running else {
            return;
        };
        running.stop.cancel();
        let _ = running.task.await;
    }

    /// Fold one client notification into the store.
    ///
    /// Handlers never perform network I/O; notifications for other rooms are
    /// ignored. This is the same entry the attached listener task drives.
    pub fn handle_notification(&self, notification: ClientNotification) {
        if notification.room_id() != self.room.id() {
            return;
        }
        match notification {
            ClientNotification::TimelineEvent { event, live, .. } => {
                self.handle_timeline_event(event, live);
            }
            ClientNotification::Decrypted { event, .. } => self.handle_decrypted(event),
            ClientNotification::Redaction { event, redacts, .. } => {
                self.handle_redaction(event, redacts);
            }
            ClientNotification::Typing {
                user_id, typing, ..
            } => self.handle_typing(user_id, typing),
            ClientNotification::Receipt { receipts, .. } => self.handle_receipt(receipts),
        }
    }

    fn serves_live(&self, active: SegmentId) -> bool {
        let chain = SegmentChain::new(&self.client);
        match (
            chain.last_forward(active),
            self.client.live_segment(self.room.id()),
        ) {
            (Ok(tail), Ok(live)) => tail.id == live,
            _ => false,
        }
    }

    fn fail_pagination(&self, backwards: bool, err: CoreError) -> CoreError {
        warn!(room = self.room.id(), error = %err, "pagination failed");
        self.signals.emit(TimelineSignal::Paginated {
            backwards,
            loaded: 0,
        });
        self.inner.lock().phase.end_pagination();
        err
    }

    async fn reset_to(
        &self,
        target: SegmentId,
        ready_event_id: Option<String>,
    ) -> Result<(), CoreError> {
        let (was_initialized, prior_active) = {
            let mut inner = self.inner.lock();
            let was = inner.phase.is_initialized();
            inner.phase.begin_load()?;
            let prior = inner.active;
            inner.active = target;
            (was, prior)
        };

        if self.room.is_encrypted() {
            self.decrypt_chain(target).await;
        }

        let events = match SegmentChain::new(&self.client).collect_events(target) {
            Ok(events) => events,
            Err(err) => {
                let mut inner = self.inner.lock();
                inner.active = prior_active;
                inner.phase.finish_load(was_initialized);
                return Err(err);
            }
        };

        {
            let mut inner = self.inner.lock();
            inner.channels.timeline.clear();
            inner.pending_decryption.clear();
            for event in events {
                inner.channels.add(event);
            }
            inner.phase.finish_load(true);
        }

        self.attach_listener();
        self.signals.emit(TimelineSignal::Ready {
            event_id: ready_event_id,
        });
        Ok(())
    }

    /// Fan out decryption attempts over every encrypted event in the chain.
    ///
    /// Individual failures are tolerated: the event stays ciphertext and is
    /// picked up by a later retry.
    async fn decrypt_chain(&self, from: SegmentId) {
        let Ok(events) = SegmentChain::new(&self.client).collect_events(from) else {
            return;
        };
        let attempts = events
            .into_iter()
            .filter(ChatEvent::is_encrypted)
            .map(|event| {
                let client = self.client.clone();
                let room_id = self.room.id().to_owned();
                async move {
                    let outcome = client.attempt_decryption(&room_id, &event.event_id).await;
                    (event.event_id, outcome)
                }
            });

        for (event_id, outcome) in join_all(attempts).await {
            if let Err(err) = outcome {
                trace!(event_id = %event_id, error = %err, "decryption attempt failed");
            }
        }
    }

    /// Attach the notification forwarding task exactly once.
    fn attach_listener(&self) {
        let mut guard = self.listener.lock();
        if guard.is_some() {
            return;
        }

        let stop = CancellationToken::new();
        let stop_child = stop.child_token();
        let mut notifications = self.client.subscribe();
        let store = self.clone();
        let task = tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = stop_child.cancelled() => break,
                    received = notifications.recv() => match received {
                        Ok(notification) => store.handle_notification(notification),
                        Err(tokio::sync::broadcast::error::RecvError::Lagged(skipped)) => {
                            warn!(skipped, "notification stream lagged");
                        }
                        Err(tokio::sync::broadcast::error::RecvError::Closed) => break,
                    },
                }
            }
        });

        *guard = Some(ListenerTask { stop, task });
    }

    fn handle_timeline_event(&self, event: ChatEvent, live: bool) {
        let mut inner = self.inner.lock();
        if inner.phase == TimelinePhase::Paginating {
            // The pagination rebuild will pick this event up from the chain.
            trace!(event_id = %event.event_id, "dropping live event during pagination");
            return;
        }

        // While browsing history only relation events are folded in; new
        // main-sequence content stays out of the paused view.
        if !self.serves_live(inner.active) && !event.is_reaction() && !event.is_edit() {
            return;
        }

        if !live {
            return;
        }

        if event.is_encrypted() {
            inner.pending_decryption.insert(event.event_id.clone());
            return;
        }

        inner.channels.add(event.clone());
        drop(inner);
        self.signals.emit(TimelineSignal::Event(event));
    }

    fn handle_decrypted(&self, event: ChatEvent) {
        let mut inner = self.inner.lock();
        if inner.phase == TimelinePhase::Paginating {
            return;
        }
        if !inner.pending_decryption.remove(&event.event_id) {
            // Backfill decryption; a rebuild already covers it.
            trace!(event_id = %event.event_id, "ignoring non-pending decryption");
            return;
        }

        inner.channels.add(event.clone());
        drop(inner);
        self.signals.emit(TimelineSignal::Event(event));
    }

    fn handle_redaction(&self, event: ChatEvent, redacts: String) {
        {
            let mut inner = self.inner.lock();
            // Relation maps are cleared immediately; an already-appended
            // main-sequence item survives until the next full rebuild
            // reclassifies it as dropped.
            inner.channels.edits.remove(&redacts);
            inner.channels.reactions.remove(&redacts);
        }
        self.signals.emit(TimelineSignal::EventRedacted(event));
    }

    fn handle_typing(&self, user_id: String, typing: bool) {
        let snapshot = {
            let mut inner = self.inner.lock();
            if typing {
                inner.typing.insert(user_id);
            } else {
                inner.typing.remove(&user_id);
            }
            inner.typing.clone()
        };
        self.signals.emit(TimelineSignal::TypingMembersUpdated(snapshot));
    }

    fn handle_receipt(&self, receipts: HashMap<String, Vec<String>>) {
        let Ok(live_events) = self.client.live_events(self.room.id()) else {
            return;
        };
        let Some(latest) = live_events.last() else {
            return;
        };
        // Only the latest-message receipt matters here; broad per-event read
        // state is out of scope.
        if receipts
            .get(&latest.event_id)
            .is_some_and(|readers| !readers.is_empty())
        {
            self.signals.emit(TimelineSignal::LiveReceipt);
        }
    }
}
