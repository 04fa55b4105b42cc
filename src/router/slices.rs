//! Time-sorted slice requests

use std::collections::VecDeque;

use crate::core::types::{EntityId, Time};
use crate::message::SliceRequest;

/// Registered slice requests, ascending by next delivery time
#[derive(Debug, Default)]
pub struct SliceSchedule {
    entries: VecDeque<SliceRequest>,
}

impl SliceSchedule {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `owner`, replacing any earlier request it had
    pub fn enable(&mut self, owner: EntityId, delay: Time, now: Time) {
        self.disable(owner);
        self.insert(SliceRequest::new(owner, delay, now));
    }

    pub fn disable(&mut self, owner: EntityId) -> bool {
        let before = self.entries.len();
        self.entries.retain(|req| req.owner() != owner);
        before != self.entries.len()
    }

    pub(crate) fn insert(&mut self, request: SliceRequest) {
        let pos = self
            .entries
            .iter()
            .position(|req| req.next_delivery() > request.next_delivery())
            .unwrap_or(self.entries.len());
        self.entries.insert(pos, request);
    }

    pub(crate) fn pop_front(&mut self) -> Option<SliceRequest> {
        self.entries.pop_front()
    }

    /// How many requests are due at `now`
    pub fn due_count(&self, now: Time) -> usize {
        self.entries.iter().take_while(|req| req.is_due(now)).count()
    }

    pub fn is_enabled(&self, owner: EntityId) -> bool {
        self.entries.iter().any(|req| req.owner() == owner)
    }

    pub fn iter(&self) -> impl Iterator<Item = &SliceRequest> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
