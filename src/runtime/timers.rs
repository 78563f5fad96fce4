//! Owner-scoped delayed events.

use crate::core::{Event, NodeId, TimerId};
use std::collections::BTreeMap;
use std::time::Duration;

#[derive(Clone, Debug, PartialEq)]
pub struct PendingTimer {
    pub owner: NodeId,
    pub delay: Duration,
    pub event: Event,
    pub send_id: Option<String>,
}

/// Book-keeping for timers scheduled by the interpreter.
///
/// Only the record lives here; the runtime owns the actual clock. A timer is
/// live until it fires or its owner exits.
#[derive(Clone, Debug, Default)]
pub struct TimerService {
    next: u64,
    pending: BTreeMap<TimerId, PendingTimer>,
}

impl TimerService {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn schedule(
        &mut self,
        owner: NodeId,
        delay: Duration,
        event: Event,
        send_id: Option<String>,
    ) -> TimerId {
        self.next += 1;
        let id = TimerId(self.next);
        self.pending.insert(
            id,
            PendingTimer {
                owner,
                delay,
                event,
                send_id,
            },
        );
        id
    }

    /// Consume a fired timer. `None` means the timer is no longer live.
    pub fn fire(&mut self, id: TimerId) -> Option<Event> {
        self.pending.remove(&id).map(|timer| timer.event)
    }

    /// Cancel every timer owned by `owner`.
    pub fn cancel_all(&mut self, owner: NodeId) -> Vec<TimerId> {
        self.drain_where(|timer| timer.owner == owner)
    }

    /// Cancel every timer scheduled with `send_id`.
    pub fn cancel_send(&mut self, send_id: &str) -> Vec<TimerId> {
        self.drain_where(|timer| timer.send_id.as_deref() == Some(send_id))
    }

    fn drain_where(&mut self, predicate: impl Fn(&PendingTimer) -> bool) -> Vec<TimerId> {
        let cancelled: Vec<TimerId> = self
            .pending
            .iter()
            .filter(|(_, timer)| predicate(timer))
            .map(|(id, _)| *id)
            .collect();
        for id in &cancelled {
            self.pending.remove(id);
        }
        cancelled
    }

    pub fn is_live(&self, id: TimerId) -> bool {
        self.pending.contains_key(&id)
    }

    pub fn get(&self, id: TimerId) -> Option<&PendingTimer> {
        self.pending.get(&id)
    }

    pub fn owned_by(&self, owner: NodeId) -> Vec<TimerId> {
        self.pending
            .iter()
            .filter(|(_, timer)| timer.owner == owner)
            .map(|(id, _)| *id)
            .collect()
    }

    /// Live timer ids, oldest first.
    pub fn ids(&self) -> impl Iterator<Item = TimerId> + '_ {
        self.pending.keys().copied()
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }
}
