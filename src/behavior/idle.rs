use crate::behavior::machine::Machine;
use crate::behavior::table::{Event, Handled, Level, StateTable};
use crate::message::Message;

/// Permanent bottom entry of every lane; handles nothing
#[derive(Debug, Clone, Copy, Default)]
pub struct IdleBehavior;

impl StateTable for IdleBehavior {
    fn name(&self) -> &'static str {
        "Idle"
    }

    fn handle(
        &mut self,
        _machine: &mut Machine<'_, '_>,
        _level: Level,
        _event: Event,
        _msg: Option<&Message>,
    ) -> Handled {
        Handled::No
    }
}
