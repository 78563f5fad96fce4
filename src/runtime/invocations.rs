//! Supervision of asynchronous invocations.

use crate::core::{InvocationId, NodeId};
use chrono::{DateTime, Utc};
use std::collections::HashMap;

#[derive(Clone, Debug, PartialEq)]
pub struct PendingInvocation {
    pub owner: NodeId,
    pub src: String,
    pub started_at: DateTime<Utc>,
}

/// Live invocations, keyed by id.
///
/// An id stops being live when its completion is settled or its owner
/// exits; completions for ids that are not live are stale.
#[derive(Clone, Debug, Default)]
pub struct InvocationSupervisor {
    live: HashMap<InvocationId, PendingInvocation>,
}

impl InvocationSupervisor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a fresh invocation for `owner`.
    ///
    /// Returns the new id and the id it replaced, if the owner still had one.
    pub fn invoke(
        &mut self,
        owner: NodeId,
        src: impl Into<String>,
    ) -> (InvocationId, Option<InvocationId>) {
        let replaced = self.owned_by(owner);
        if let Some(old) = replaced {
            self.live.remove(&old);
        }
        let id = InvocationId::new();
        self.live.insert(
            id,
            PendingInvocation {
                owner,
                src: src.into(),
                started_at: Utc::now(),
            },
        );
        (id, replaced)
    }

    /// Consume a completion. `None` means the id is stale.
    pub fn settle(&mut self, id: InvocationId) -> Option<PendingInvocation> {
        self.live.remove(&id)
    }

    /// Cancel the invocation owned by `owner`.
    pub fn cancel(&mut self, owner: NodeId) -> Option<InvocationId> {
        let id = self.owned_by(owner)?;
        self.live.remove(&id);
        Some(id)
    }

    pub fn owned_by(&self, owner: NodeId) -> Option<InvocationId> {
        self.live
            .iter()
            .find(|(_, pending)| pending.owner == owner)
            .map(|(id, _)| *id)
    }

    pub fn is_live(&self, id: InvocationId) -> bool {
        self.live.contains_key(&id)
    }

    pub fn get(&self, id: InvocationId) -> Option<&PendingInvocation> {
        self.live.get(&id)
    }

    pub fn ids(&self) -> impl Iterator<Item = InvocationId> + '_ {
        self.live.keys().copied()
    }

    pub fn len(&self) -> usize {
        self.live.len()
    }

    pub fn is_empty(&self) -> bool {
        self.live.is_empty()
    }
}
