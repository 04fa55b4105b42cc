//! Time-sorted list of delayed messages

use std::collections::VecDeque;

use crate::core::types::Time;
use crate::message::Message;

/// Delayed messages, ascending by delivery time, FIFO among equal times
#[derive(Debug, Default)]
pub struct PendingQueue {
    entries: VecDeque<Message>,
}

impl PendingQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert unless an identical message is already waiting
    ///
    /// Returns false when the message was suppressed as a duplicate.
    pub fn insert(&mut self, msg: Message) -> bool {
        if self.entries.iter().any(|pending| msg.is_duplicate_of(pending)) {
            return false;
        }

        let pos = self
            .entries
            .iter()
            .position(|pending| pending.delivery_time() > msg.delivery_time())
            .unwrap_or(self.entries.len());
        self.entries.insert(pos, msg);
        true
    }

    /// Next message whose delivery time has been reached
    pub fn pop_due(&mut self, now: Time) -> Option<Message> {
        if self.entries.front()?.delivery_time() <= now {
            self.entries.pop_front()
        } else {
            None
        }
    }

    /// Drop every message matching `pred`, returning how many went
    pub fn remove_where(&mut self, mut pred: impl FnMut(&Message) -> bool) -> usize {
        let before = self.entries.len();
        self.entries.retain(|msg| !pred(msg));
        before - self.entries.len()
    }

    pub fn next_delivery_time(&self) -> Option<Time> {
        self.entries.front().map(Message::delivery_time)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Message> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
