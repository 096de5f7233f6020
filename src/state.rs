//! Episode tracking for "phone present" and "phone held".
//!
//! Two independent debounced states are driven once per frame. Each changes only
//! on an edge, and each edge produces exactly one event. There is no minimum
//! episode length: a single held frame is a full episode.

use serde::Serialize;

use crate::Timestamp;

/// A completed "phone held" episode.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ViolationRecord {
    pub start: Timestamp,
    pub end: Timestamp,
    /// `end - start` in seconds, never negative.
    pub duration_seconds: f64,
}

impl ViolationRecord {
    pub fn new(start: Timestamp, end: Timestamp) -> Self {
        Self {
            start,
            end,
            duration_seconds: seconds_between(start, end),
        }
    }
}

/// Seconds from `start` to `end`, clamped at zero if the wall clock stepped back.
pub fn seconds_between(start: Timestamp, end: Timestamp) -> f64 {
    let delta = end.signed_duration_since(start);
    let micros = delta
        .num_microseconds()
        .unwrap_or_else(|| delta.num_milliseconds().saturating_mul(1000));
    (micros.max(0) as f64) / 1_000_000.0
}

/// Transition emitted by `ViolationStateMachine::update`.
#[derive(Clone, Debug, PartialEq)]
pub enum ViolationEvent {
    PhoneStart { at: Timestamp },
    PhoneEnd { since: Timestamp, at: Timestamp },
    OverlapStart { at: Timestamp },
    OverlapEnd(ViolationRecord),
}

/// Boolean condition with the time it last became true.
///
/// `since` is `Some` exactly while the condition is active.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct DebouncedState {
    since: Option<Timestamp>,
}

#[derive(Clone, Copy, Debug, PartialEq)]
enum Edge {
    Rising(Timestamp),
    Falling { since: Timestamp, at: Timestamp },
}

impl DebouncedState {
    pub fn is_active(&self) -> bool {
        self.since.is_some()
    }

    pub fn since(&self) -> Option<Timestamp> {
        self.since
    }

    fn observe(&mut self, present: bool, now: Timestamp) -> Option<Edge> {
        match (present, self.since) {
            (true, None) => {
                self.since = Some(now);
                Some(Edge::Rising(now))
            }
            (false, Some(since)) => {
                self.since = None;
                Some(Edge::Falling { since, at: now })
            }
            _ => None,
        }
    }
}

#[derive(Clone, Debug, Default)]
pub struct ViolationStateMachine {
    phone: DebouncedState,
    overlap: DebouncedState,
}

impl ViolationStateMachine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn phone(&self) -> DebouncedState {
        self.phone
    }

    pub fn overlap(&self) -> DebouncedState {
        self.overlap
    }

    /// Feed one frame's classification. Returns 0 to 2 events, phone first.
    pub fn update(
        &mut self,
        now: Timestamp,
        phone_present: bool,
        overlap_present: bool,
    ) -> Vec<ViolationEvent> {
        let mut events = Vec::with_capacity(2);

        match self.phone.observe(phone_present, now) {
            Some(Edge::Rising(at)) => events.push(ViolationEvent::PhoneStart { at }),
            Some(Edge::Falling { since, at }) => events.push(ViolationEvent::PhoneEnd { since, at }),
            None => {}
        }

        match self.overlap.observe(overlap_present, now) {
            Some(Edge::Rising(at)) => events.push(ViolationEvent::OverlapStart { at }),
            Some(Edge::Falling { since, at }) => {
                events.push(ViolationEvent::OverlapEnd(ViolationRecord::new(since, at)))
            }
            None => {}
        }

        events
    }
}
