//! Message router
//!
//! Owns the delayed-message list and the slice schedule. Every frame the engine
//! loop calls [`MessageRouter::deliver_delayed_messages`], then
//! [`MessageRouter::deliver_slices`], then updates each entity.
//!
//! Delivery is scope-checked: a message scoped to a state or substate is
//! silently dropped once the receiver's live scope counter has moved past the
//! value captured at send time. That is the only cancellation most messages need.
//!
//! The router is single-threaded. Managers are checked out of the registry
//! while they dispatch; an immediate message to an entity that is checked out
//! waits on the deferred queue and is routed as soon as the outermost dispatch
//! returns.

pub mod context;
pub mod observer;
pub mod pending;
pub mod slices;

use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::time::Instant;

use crate::behavior::Event;
use crate::core::clock::Clock;
use crate::core::config::{SchedulerConfig, SlicePolicy};
use crate::core::types::{EntityId, EntityKind, LaneId, Time};
use crate::ecs::EntityRegistry;
use crate::message::{Message, MessageName, ScopeRule};

pub use context::Context;
pub use observer::{DispatchLog, DispatchObserver, DispatchRecord};
pub use pending::PendingQueue;
pub use slices::SliceSchedule;

/// Running counters for diagnostics
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RouterStats {
    pub sent: u64,
    pub delivered: u64,
    pub duplicates_suppressed: u64,
    pub scope_dropped: u64,
    pub unresolved: u64,
    pub deferred: u64,
    pub removed: u64,
    pub slices_delivered: u64,
}

/// Scheduler for messages and slices between entity behaviors
pub struct MessageRouter {
    config: SchedulerConfig,
    pending: PendingQueue,
    slices: SliceSchedule,
    deferred: VecDeque<Message>,
    dispatch_depth: usize,
    flushing: bool,
    stats: RouterStats,
    observer: Option<Box<dyn DispatchObserver>>,
}

impl MessageRouter {
    pub fn new(config: SchedulerConfig) -> Self {
        Self {
            config,
            pending: PendingQueue::new(),
            slices: SliceSchedule::new(),
            deferred: VecDeque::new(),
            dispatch_depth: 0,
            flushing: false,
            stats: RouterStats::default(),
            observer: None,
        }
    }

    pub fn config(&self) -> &SchedulerConfig {
        &self.config
    }

    pub fn set_slice_policy(&mut self, policy: SlicePolicy) {
        self.config.slices = policy;
    }

    pub fn stats(&self) -> RouterStats {
        self.stats
    }

    pub fn pending(&self) -> &PendingQueue {
        &self.pending
    }

    pub fn slices(&self) -> &SliceSchedule {
        &self.slices
    }

    pub fn set_observer(&mut self, observer: impl DispatchObserver + 'static) {
        self.observer = Some(Box::new(observer));
    }

    pub fn clear_observer(&mut self) {
        self.observer = None;
    }

    pub(crate) fn is_observed(&self) -> bool {
        self.observer.is_some() || tracing::enabled!(tracing::Level::TRACE)
    }

    pub(crate) fn observe(&mut self, record: &DispatchRecord) {
        tracing::trace!(
            entity = %record.entity,
            lane = record.lane,
            behavior = record.behavior,
            state = record.state_name.unwrap_or("?"),
            substate = record.substate_name.unwrap_or("-"),
            event = record.event.name(),
            handled = record.handled,
            "dispatch"
        );
        if let Some(observer) = self.observer.as_mut() {
            observer.on_dispatch(record);
        }
    }

    // --- sending ---

    /// Route now when `delay <= 0`, otherwise queue for `now + delay`
    pub fn send_msg(
        &mut self,
        registry: &mut dyn EntityRegistry,
        clock: &dyn Clock,
        delay: Time,
        msg: Message,
    ) {
        if !delay.is_finite() {
            tracing::warn!(
                "Rejected {} for entity {}: delay {} is not finite",
                msg.name(),
                msg.receiver(),
                delay
            );
            return;
        }
        self.stats.sent += 1;
        let now = clock.now();
        if delay <= 0.0 {
            self.route_msg(registry, clock, msg.deliver_at(now));
        } else {
            self.enqueue(msg.deliver_at(now + delay));
        }
    }

    fn enqueue(&mut self, msg: Message) {
        let name = msg.name();
        let receiver = msg.receiver();
        if !self.pending.insert(msg) {
            self.stats.duplicates_suppressed += 1;
            tracing::trace!("Suppressed duplicate {} for entity {}", name, receiver);
        }
    }

    /// Deliver `msg` to every entity of `kind` (every entity if `None`) except the sender
    ///
    /// Copies are machine-scoped: the sender's scope counters mean nothing to
    /// other receivers.
    pub fn send_msg_broadcast(
        &mut self,
        registry: &mut dyn EntityRegistry,
        clock: &dyn Clock,
        msg: Message,
        kind: Option<EntityKind>,
    ) {
        let now = clock.now();
        for id in registry.entity_ids() {
            if id == msg.sender() {
                continue;
            }
            if let Some(kind) = kind {
                if registry.kind_of(id) != Some(kind) {
                    continue;
                }
            }
            let copy = msg
                .readdressed(id)
                .scoped(ScopeRule::Machine, 0)
                .deliver_at(now);
            self.stats.sent += 1;
            self.route_msg(registry, clock, copy);
        }
    }

    /// Deliver one message to its receiver if the scope still holds
    pub fn route_msg(
        &mut self,
        registry: &mut dyn EntityRegistry,
        clock: &dyn Clock,
        mut msg: Message,
    ) {
        let receiver = msg.receiver();
        if !registry.contains(receiver) || registry.is_marked_for_deletion(receiver) {
            self.stats.unresolved += 1;
            tracing::debug!("Dropping {} for unresolved entity {}", msg.name(), receiver);
            return;
        }

        let Some(mut manager) = registry.take_manager(receiver) else {
            // Receiver is mid-dispatch further up the stack
            self.stats.deferred += 1;
            self.deferred.push_back(msg);
            return;
        };

        if msg.is_scope_checked() || manager.accepts(&msg) {
            if let Some(interval) = msg.timer_interval() {
                // Re-arm before dispatch so the timer survives whatever the handler does
                self.enqueue(msg.next_period().deliver_at(clock.now() + interval));
            }
            msg.mark_delivered();
            self.stats.delivered += 1;

            self.dispatch_depth += 1;
            let mut cx = Context::new(self, &mut *registry, clock);
            manager.receive(&msg, &mut cx);
            self.dispatch_depth -= 1;
        } else {
            self.stats.scope_dropped += 1;
            tracing::trace!(
                "Dropping {} for entity {}: scope {:?} {} no longer live",
                msg.name(),
                receiver,
                msg.scope_rule(),
                msg.scope()
            );
        }

        registry.restore_manager(receiver, manager);
        if self.dispatch_depth == 0 {
            self.flush_deferred(registry, clock);
        }
    }

    fn flush_deferred(&mut self, registry: &mut dyn EntityRegistry, clock: &dyn Clock) {
        if self.flushing {
            return;
        }
        self.flushing = true;
        while let Some(msg) = self.deferred.pop_front() {
            self.route_msg(registry, clock, msg);
        }
        self.flushing = false;
    }

    /// Route every pending message that has come due, oldest first
    pub fn deliver_delayed_messages(
        &mut self,
        registry: &mut dyn EntityRegistry,
        clock: &dyn Clock,
    ) -> usize {
        let now = clock.now();
        let mut routed = 0;
        while let Some(msg) = self.pending.pop_due(now) {
            self.route_msg(registry, clock, msg);
            routed += 1;
        }
        routed
    }

    // --- explicit cancellation ---

    /// Drop matching messages that are still waiting
    pub fn remove_msg(
        &mut self,
        name: MessageName,
        receiver: EntityId,
        sender: EntityId,
        is_timer: bool,
    ) -> usize {
        let removed = self.pending.remove_where(|msg| {
            !msg.is_delivered()
                && msg.name() == name
                && msg.receiver() == receiver
                && msg.sender() == sender
                && msg.is_timer() == is_timer
        });
        self.stats.removed += removed as u64;
        removed
    }

    /// Drop every waiting state- or substate-scoped message addressed to `receiver`
    pub fn purge_scoped_msg(&mut self, receiver: EntityId) -> usize {
        let removed = self.pending.remove_where(|msg| {
            !msg.is_delivered()
                && msg.receiver() == receiver
                && msg.scope_rule() != ScopeRule::Machine
        });
        self.stats.removed += removed as u64;
        removed
    }

    /// Like [`purge_scoped_msg`](Self::purge_scoped_msg), limited to one lane
    ///
    /// Other lanes run their own behaviors whose scopes did not move.
    pub fn purge_scoped_msg_on_lane(&mut self, receiver: EntityId, lane: LaneId) -> usize {
        let removed = self.pending.remove_where(|msg| {
            !msg.is_delivered()
                && msg.receiver() == receiver
                && msg.lane() == lane
                && msg.scope_rule() != ScopeRule::Machine
        });
        self.stats.removed += removed as u64;
        removed
    }

    /// Forget everything addressed to or owned by an entity that is going away
    pub fn forget_entity(&mut self, id: EntityId) {
        let removed = self.pending.remove_where(|msg| msg.receiver() == id);
        self.deferred.retain(|msg| msg.receiver() != id);
        self.slices.disable(id);
        self.stats.removed += removed as u64;
    }

    // --- slices ---

    pub fn enable_slice(&mut self, clock: &dyn Clock, delay: Time, owner: EntityId) {
        if !delay.is_finite() {
            tracing::warn!(
                "Rejected slice for entity {}: delay {} is not finite",
                owner,
                delay
            );
            return;
        }
        self.slices.enable(owner, delay, clock.now());
    }

    pub fn disable_slice(&mut self, owner: EntityId) -> bool {
        self.slices.disable(owner)
    }

    /// Deliver due slices within the configured budget
    ///
    /// Each delivered request is removed and re-inserted at `now + delay`.
    /// Requests left over when the budget runs out stay due for the next call.
    pub fn deliver_slices(
        &mut self,
        registry: &mut dyn EntityRegistry,
        clock: &dyn Clock,
    ) -> usize {
        let now = clock.now();
        let total = self.slices.len();
        let due = self.slices.due_count(now);
        let started = Instant::now();
        let mut delivered = 0;

        for _ in 0..due {
            if !self.slices.iter().next().is_some_and(|req| req.is_due(now)) {
                break;
            }
            let Some(request) = self.slices.pop_front() else {
                break;
            };
            let owner = request.owner();
            if !registry.contains(owner) {
                tracing::debug!("Dropping slice for unresolved entity {}", owner);
                continue;
            }
            self.slices.insert(request.rescheduled(now));
            if registry.is_marked_for_deletion(owner) {
                continue;
            }

            self.deliver_slice(registry, clock, owner);
            delivered += 1;

            if self.slice_budget_spent(delivered, total, started) {
                break;
            }
        }

        self.stats.slices_delivered += delivered as u64;
        delivered
    }

    fn slice_budget_spent(&self, delivered: usize, total: usize, started: Instant) -> bool {
        match self.config.slices {
            SlicePolicy::None => false,
            SlicePolicy::ConstrainByTime(budget) => started.elapsed().as_secs_f64() > budget,
            SlicePolicy::ConstrainByProportion(fraction) => {
                total > 0 && delivered as f64 / total as f64 > fraction
            }
            SlicePolicy::ConstrainByCount(count) => delivered >= count,
        }
    }

    fn deliver_slice(&mut self, registry: &mut dyn EntityRegistry, clock: &dyn Clock, owner: EntityId) {
        let Some(mut manager) = registry.take_manager(owner) else {
            return;
        };

        self.dispatch_depth += 1;
        let mut cx = Context::new(self, &mut *registry, clock);
        manager.process_all_lanes(Event::Slice, &mut cx);
        self.dispatch_depth -= 1;

        registry.restore_manager(owner, manager);
        if self.dispatch_depth == 0 {
            self.flush_deferred(registry, clock);
        }
    }

    // --- per-frame entity updates ---

    /// Run one manager update for `id`
    pub fn update_entity(
        &mut self,
        registry: &mut dyn EntityRegistry,
        clock: &dyn Clock,
        id: EntityId,
    ) -> bool {
        if registry.is_marked_for_deletion(id) {
            return false;
        }
        let Some(mut manager) = registry.take_manager(id) else {
            return false;
        };

        self.dispatch_depth += 1;
        let mut cx = Context::new(self, &mut *registry, clock);
        manager.update(&mut cx);
        self.dispatch_depth -= 1;

        registry.restore_manager(id, manager);
        if self.dispatch_depth == 0 {
            self.flush_deferred(registry, clock);
        }
        true
    }

    /// Update every entity in registry order
    pub fn update_all(&mut self, registry: &mut dyn EntityRegistry, clock: &dyn Clock) -> usize {
        let mut updated = 0;
        for id in registry.entity_ids() {
            if self.update_entity(registry, clock, id) {
                updated += 1;
            }
        }
        updated
    }
}

impl Default for MessageRouter {
    fn default() -> Self {
        Self::new(SchedulerConfig::default())
    }
}
