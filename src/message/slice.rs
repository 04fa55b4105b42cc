//! Periodic slice requests

use crate::core::types::{EntityId, Time};

/// Ticket for periodic, load-balanced delivery of `Event::Slice` to an entity
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SliceRequest {
    owner: EntityId,
    delay: Time,
    next_delivery: Time,
}

impl SliceRequest {
    pub fn new(owner: EntityId, delay: Time, now: Time) -> Self {
        Self {
            owner,
            delay: delay.max(0.0),
            next_delivery: now + delay.max(0.0),
        }
    }

    pub fn owner(&self) -> EntityId {
        self.owner
    }

    pub fn delay(&self) -> Time {
        self.delay
    }

    pub fn next_delivery(&self) -> Time {
        self.next_delivery
    }

    pub fn is_due(&self, now: Time) -> bool {
        self.next_delivery <= now
    }

    /// The request for the following period
    ///
    /// Returns a new value; the schedule removes the old entry and inserts this
    /// one so the list stays sorted.
    pub fn rescheduled(&self, now: Time) -> Self {
        Self {
            next_delivery: now + self.delay,
            ..*self
        }
    }
}
