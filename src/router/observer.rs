//! Dispatch diagnostics side channel

use std::cell::RefCell;
use std::rc::Rc;

use crate::behavior::Event;
use crate::core::types::{EntityId, LaneId, StateId, SubstateId};

/// One event offered to one behavior
#[derive(Debug, Clone, PartialEq)]
pub struct DispatchRecord {
    pub entity: EntityId,
    pub lane: LaneId,
    pub behavior: &'static str,
    pub state: StateId,
    pub state_name: Option<&'static str>,
    pub substate: Option<SubstateId>,
    pub substate_name: Option<&'static str>,
    pub event: Event,
    pub handled: bool,
}

/// Receives every dispatch record; must not feed back into scheduling
pub trait DispatchObserver {
    fn on_dispatch(&mut self, record: &DispatchRecord);
}

/// Keeps every record; clones share the same buffer
///
/// Hand one clone to the router and read the records back through another.
#[derive(Debug, Clone, Default)]
pub struct DispatchLog {
    records: Rc<RefCell<Vec<DispatchRecord>>>,
}

impl DispatchLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn records(&self) -> Vec<DispatchRecord> {
        self.records.borrow().clone()
    }

    pub fn len(&self) -> usize {
        self.records.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.borrow().is_empty()
    }

    pub fn clear(&self) {
        self.records.borrow_mut().clear();
    }
}

impl DispatchObserver for DispatchLog {
    fn on_dispatch(&mut self, record: &DispatchRecord) {
        self.records.borrow_mut().push(record.clone());
    }
}
