//! Bounded history of previously active states

use std::collections::VecDeque;

use crate::core::types::StateId;

/// Past states for `pop_state`, oldest dropped when full
#[derive(Debug, Clone)]
pub struct History {
    states: VecDeque<StateId>,
    depth: usize,
}

impl History {
    pub fn new(depth: usize) -> Self {
        Self {
            states: VecDeque::with_capacity(depth),
            depth: depth.max(1),
        }
    }

    pub fn push(&mut self, state: StateId) {
        if self.states.len() == self.depth {
            self.states.pop_front();
        }
        self.states.push_back(state);
    }

    pub fn pop(&mut self) -> Option<StateId> {
        self.states.pop_back()
    }

    pub fn peek(&self) -> Option<StateId> {
        self.states.back().copied()
    }

    pub fn clear(&mut self) {
        self.states.clear();
    }

    pub fn len(&self) -> usize {
        self.states.len()
    }

    pub fn is_empty(&self) -> bool {
        self.states.is_empty()
    }

    pub fn depth(&self) -> usize {
        self.depth
    }
}
