//! The dispatch seam between the scheduler and concrete behaviors

use crate::behavior::machine::Machine;
use crate::core::types::{StateId, SubstateId};
use crate::message::{Message, MessageName};

/// Something that happened to a behavior
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Event {
    Enter,
    Exit,
    Update,
    Message(MessageName),
    /// Observational copy of a message addressed to someone else
    CarbonCopy(MessageName),
    Slice,
}

impl Event {
    pub fn name(&self) -> &'static str {
        match self {
            Event::Enter => "Enter",
            Event::Exit => "Exit",
            Event::Update => "Update",
            Event::Message(name) | Event::CarbonCopy(name) => name.as_str(),
            Event::Slice => "Slice",
        }
    }
}

/// Handler level, tried in this order: substate, state, machine-global
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Level {
    Substate(StateId, SubstateId),
    State(StateId),
    Global,
}

/// Result of offering an event to one handler level
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Handled {
    Yes,
    No,
}

impl From<bool> for Handled {
    fn from(handled: bool) -> Self {
        if handled {
            Handled::Yes
        } else {
            Handled::No
        }
    }
}

/// A concrete behavior's state table
///
/// `handle` is called once per level until a level reports `Handled::Yes`.
/// Implementations usually `match (level, event)` and fall through to
/// `Handled::No`.
pub trait StateTable {
    fn name(&self) -> &'static str;

    /// State entered on initialize and reset
    fn initial_state(&self) -> StateId {
        0
    }

    fn state_name(&self, _state: StateId) -> Option<&'static str> {
        None
    }

    fn substate_name(&self, _state: StateId, _substate: SubstateId) -> Option<&'static str> {
        None
    }

    fn handle(
        &mut self,
        machine: &mut Machine<'_, '_>,
        level: Level,
        event: Event,
        msg: Option<&Message>,
    ) -> Handled;
}
