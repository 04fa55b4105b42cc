//! Per-frame engine loop

use serde::Serialize;

use crate::core::clock::{Clock, FrameClock};
use crate::core::config::SchedulerConfig;
use crate::core::types::{EntityId, EntityKind, Time};
use crate::ecs::world::World;
use crate::message::Message;
use crate::router::MessageRouter;

/// What happened during one frame
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct FrameReport {
    pub frame: u64,
    pub time: Time,
    pub messages_routed: usize,
    pub slices_delivered: usize,
    pub entities_updated: usize,
    pub entities_removed: usize,
}

/// Run one frame: delayed messages, then slices, then every entity's update.
///
/// Entities marked for deletion during the frame are removed at the end and
/// the router forgets anything still addressed to them.
pub fn run_frame(router: &mut MessageRouter, world: &mut World, clock: &dyn Clock) -> FrameReport {
    let messages_routed = router.deliver_delayed_messages(world, clock);
    let slices_delivered = router.deliver_slices(world, clock);
    let entities_updated = router.update_all(world, clock);

    let removed = world.remove_marked();
    for id in &removed {
        router.forget_entity(*id);
    }
    if !removed.is_empty() {
        tracing::debug!("Removed {} entities at frame {}", removed.len(), world.current_frame);
    }

    let report = FrameReport {
        frame: world.current_frame,
        time: clock.now(),
        messages_routed,
        slices_delivered,
        entities_updated,
        entities_removed: removed.len(),
    };
    world.tick();
    report
}

/// Router, world and clock bundled for driving a whole simulation
pub struct Simulation {
    pub router: MessageRouter,
    pub world: World,
    pub clock: FrameClock,
}

impl Simulation {
    pub fn new(config: SchedulerConfig) -> Self {
        Self {
            router: MessageRouter::new(config.clone()),
            world: World::with_config(config),
            clock: FrameClock::new(),
        }
    }

    pub fn spawn(&mut self, kind: EntityKind, name: impl Into<String>) -> EntityId {
        self.world.spawn(kind, name)
    }

    pub fn now(&self) -> Time {
        self.clock.now()
    }

    /// Run a frame at the current time
    pub fn run_frame(&mut self) -> FrameReport {
        run_frame(&mut self.router, &mut self.world, &self.clock)
    }

    /// Advance the clock by `dt`, then run a frame
    pub fn step(&mut self, dt: Time) -> FrameReport {
        self.clock.advance(dt);
        self.run_frame()
    }

    /// Step `frames` times, collecting the reports
    pub fn run_frames(&mut self, frames: usize, dt: Time) -> Vec<FrameReport> {
        (0..frames).map(|_| self.step(dt)).collect()
    }

    /// Send from outside any behavior, e.g. game code or input handling
    pub fn send_msg(&mut self, delay: Time, msg: Message) {
        self.router
            .send_msg(&mut self.world, &self.clock, delay, msg);
    }

    pub fn broadcast(&mut self, msg: Message, kind: Option<EntityKind>) {
        self.router
            .send_msg_broadcast(&mut self.world, &self.clock, msg, kind);
    }

    pub fn enable_slice(&mut self, delay: Time, owner: EntityId) {
        self.router.enable_slice(&self.clock, delay, owner);
    }
}
