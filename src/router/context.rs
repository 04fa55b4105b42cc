//! Borrowed scheduler context handed down through dispatch

use crate::core::clock::Clock;
use crate::core::config::SchedulerConfig;
use crate::core::types::{EntityId, EntityKind, LaneId, Time};
use crate::ecs::EntityRegistry;
use crate::message::{Message, MessageName};
use crate::router::{DispatchRecord, MessageRouter};

/// Router, registry and clock for the duration of one dispatch
pub struct Context<'a> {
    router: &'a mut MessageRouter,
    registry: &'a mut dyn EntityRegistry,
    clock: &'a dyn Clock,
}

impl<'a> Context<'a> {
    pub fn new(
        router: &'a mut MessageRouter,
        registry: &'a mut dyn EntityRegistry,
        clock: &'a dyn Clock,
    ) -> Self {
        Self {
            router,
            registry,
            clock,
        }
    }

    pub fn now(&self) -> Time {
        self.clock.now()
    }

    pub fn config(&self) -> &SchedulerConfig {
        self.router.config()
    }

    pub fn router(&self) -> &MessageRouter {
        &*self.router
    }

    pub fn registry(&self) -> &dyn EntityRegistry {
        &*self.registry
    }

    pub fn send_msg(&mut self, delay: Time, msg: Message) {
        self.router
            .send_msg(&mut *self.registry, self.clock, delay, msg);
    }

    pub fn broadcast(&mut self, msg: Message, kind: Option<EntityKind>) {
        self.router
            .send_msg_broadcast(&mut *self.registry, self.clock, msg, kind);
    }

    pub fn remove_msg(
        &mut self,
        name: MessageName,
        receiver: EntityId,
        sender: EntityId,
        is_timer: bool,
    ) -> usize {
        self.router.remove_msg(name, receiver, sender, is_timer)
    }

    pub fn purge_scoped_msg(&mut self, receiver: EntityId) -> usize {
        self.router.purge_scoped_msg(receiver)
    }

    pub fn purge_scoped_msg_on_lane(&mut self, receiver: EntityId, lane: LaneId) -> usize {
        self.router.purge_scoped_msg_on_lane(receiver, lane)
    }

    pub fn enable_slice(&mut self, delay: Time, owner: EntityId) {
        self.router.enable_slice(self.clock, delay, owner);
    }

    pub fn disable_slice(&mut self, owner: EntityId) {
        self.router.disable_slice(owner);
    }

    pub(crate) fn is_observed(&self) -> bool {
        self.router.is_observed()
    }

    pub(crate) fn observe(&mut self, record: &DispatchRecord) {
        self.router.observe(record);
    }
}
