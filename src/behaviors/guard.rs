//! Guard behaviors used by the headless frame simulation
//!
//! Lane 0 patrols and investigates noises; lane 1 runs a lookout that raises
//! the alarm from its slice.

use rand::Rng;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;

use crate::behavior::{Behavior, Event, Handled, Level, Machine, StateTable};
use crate::core::types::{EntityKind, StateId, SubstateId, Time};
use crate::message::{Message, MessageName, Payload, ScopeRule};

pub const GUARD: EntityKind = EntityKind::new(1);

pub const NOISE: MessageName = MessageName::new("Noise");
pub const SCAN: MessageName = MessageName::new("Scan");

pub const MOVEMENT_LANE: usize = 0;
pub const LOOKOUT_LANE: usize = 1;

/// Walks a beat, stops to look left and right, then walks on
#[derive(Debug, Clone)]
pub struct Patrol {
    walk_time: Time,
    glance_time: Time,
    pub laps: u32,
}

impl Patrol {
    pub const WALK: StateId = 0;
    pub const LOOK: StateId = 1;

    pub const LEFT: SubstateId = 0;
    pub const RIGHT: SubstateId = 1;

    pub fn new(walk_time: Time, glance_time: Time) -> Self {
        Self {
            walk_time,
            glance_time,
            laps: 0,
        }
    }
}

impl StateTable for Patrol {
    fn name(&self) -> &'static str {
        "Patrol"
    }

    fn state_name(&self, state: StateId) -> Option<&'static str> {
        match state {
            Self::WALK => Some("Walk"),
            Self::LOOK => Some("Look"),
            _ => None,
        }
    }

    fn substate_name(&self, _state: StateId, substate: SubstateId) -> Option<&'static str> {
        match substate {
            Self::LEFT => Some("Left"),
            Self::RIGHT => Some("Right"),
            _ => None,
        }
    }

    fn handle(
        &mut self,
        m: &mut Machine<'_, '_>,
        level: Level,
        event: Event,
        _msg: Option<&Message>,
    ) -> Handled {
        match (level, event) {
            (Level::State(Self::WALK), Event::Enter) => {
                self.laps += 1;
                m.change_state_delayed(self.walk_time, Self::LOOK);
                Handled::Yes
            }
            (Level::State(Self::LOOK), Event::Enter) => {
                m.change_substate(Self::LEFT);
                Handled::Yes
            }
            (Level::Substate(Self::LOOK, Self::LEFT), Event::Enter) => {
                m.change_substate_delayed(self.glance_time, Self::RIGHT);
                Handled::Yes
            }
            (Level::Substate(Self::LOOK, Self::RIGHT), Event::Enter) => {
                m.change_state_delayed(self.glance_time, Self::WALK);
                Handled::Yes
            }
            (Level::Global, Event::Message(NOISE)) => {
                // Several lookouts can raise the same alarm in one frame
                if !m.has_pending_behavior_change(MOVEMENT_LANE) {
                    m.push_behavior(MOVEMENT_LANE, Behavior::new(Investigate::new(3)), true);
                }
                Handled::Yes
            }
            _ => Handled::No,
        }
    }
}

/// Walks over to a noise, scans a few times, then hands back to whatever was below
#[derive(Debug, Clone)]
pub struct Investigate {
    scans_wanted: u32,
    scans_done: u32,
}

impl Investigate {
    pub const APPROACH: StateId = 0;
    pub const SEARCH: StateId = 1;

    const APPROACH_TIME: Time = 1.0;
    const SCAN_INTERVAL: Time = 0.25;

    pub fn new(scans_wanted: u32) -> Self {
        Self {
            scans_wanted,
            scans_done: 0,
        }
    }
}

impl StateTable for Investigate {
    fn name(&self) -> &'static str {
        "Investigate"
    }

    fn state_name(&self, state: StateId) -> Option<&'static str> {
        match state {
            Self::APPROACH => Some("Approach"),
            Self::SEARCH => Some("Search"),
            _ => None,
        }
    }

    fn handle(
        &mut self,
        m: &mut Machine<'_, '_>,
        level: Level,
        event: Event,
        _msg: Option<&Message>,
    ) -> Handled {
        match (level, event) {
            (Level::State(Self::APPROACH), Event::Enter) => {
                self.scans_done = 0;
                m.change_state_delayed(Self::APPROACH_TIME, Self::SEARCH);
                Handled::Yes
            }
            (Level::State(Self::SEARCH), Event::Enter) => {
                m.set_timer(Self::SCAN_INTERVAL, SCAN, ScopeRule::State);
                Handled::Yes
            }
            (Level::State(Self::SEARCH), Event::Message(SCAN)) => {
                self.scans_done += 1;
                if self.scans_done >= self.scans_wanted {
                    m.stop_timer(SCAN);
                    m.pop_behavior(MOVEMENT_LANE);
                }
                Handled::Yes
            }
            // Already on it
            (Level::Global, Event::Message(NOISE)) => Handled::Yes,
            _ => Handled::No,
        }
    }
}

/// Raises the alarm for every other guard now and then
#[derive(Debug, Clone)]
pub struct Lookout {
    rng: ChaCha8Rng,
    alarm_chance: f64,
    slice_delay: Time,
}

impl Lookout {
    pub const WATCH: StateId = 0;

    pub fn new(seed: u64, alarm_chance: f64, slice_delay: Time) -> Self {
        Self {
            rng: ChaCha8Rng::seed_from_u64(seed),
            alarm_chance,
            slice_delay,
        }
    }
}

impl StateTable for Lookout {
    fn name(&self) -> &'static str {
        "Lookout"
    }

    fn state_name(&self, _state: StateId) -> Option<&'static str> {
        Some("Watch")
    }

    fn handle(
        &mut self,
        m: &mut Machine<'_, '_>,
        level: Level,
        event: Event,
        _msg: Option<&Message>,
    ) -> Handled {
        match (level, event) {
            (Level::State(Self::WATCH), Event::Enter) => {
                m.enable_slice(self.slice_delay);
                Handled::Yes
            }
            (Level::State(Self::WATCH), Event::Slice) => {
                if self.rng.gen_bool(self.alarm_chance) {
                    tracing::debug!("Guard {} heard something", m.owner());
                    m.broadcast(NOISE, MOVEMENT_LANE, Some(GUARD), Payload::None);
                }
                Handled::Yes
            }
            _ => Handled::No,
        }
    }
}
