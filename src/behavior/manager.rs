//! Per-entity lanes of behavior stacks
//!
//! Structural changes are only requested while behaviors run and are applied at
//! the start of the lane's next update, so a behavior never destroys itself
//! while one of its handlers is still on the stack.

use crate::behavior::idle::IdleBehavior;
use crate::behavior::machine::Behavior;
use crate::behavior::table::Event;
use crate::core::config::SchedulerConfig;
use crate::core::error::{fault, Fault};
use crate::core::types::{EntityId, LaneId};
use crate::message::{Message, RESET_BEHAVIOR};
use crate::router::Context;

/// A change to a lane's stack, applied at the next update boundary
#[derive(Debug)]
pub enum StructuralChange {
    /// Re-initialize the top behavior and fire Enter
    Reset,
    /// Destroy the top behavior and start this one in its place
    Replace(Behavior),
    /// Run this one after the current top pops
    Queue(Behavior),
    /// Send the current top behind the rest of the stack
    Requeue,
    /// Put a behavior on top, optionally firing Enter right away
    Push { behavior: Behavior, enter: bool },
    /// Destroy the top behavior and resume the one below
    Pop,
}

impl StructuralChange {
    fn label(&self) -> &'static str {
        match self {
            StructuralChange::Reset => "reset",
            StructuralChange::Replace(_) => "replace",
            StructuralChange::Queue(_) => "queue",
            StructuralChange::Requeue => "requeue",
            StructuralChange::Push { .. } => "push",
            StructuralChange::Pop => "pop",
        }
    }
}

/// One pending structural change slot per lane
#[derive(Debug)]
pub struct LaneRequests {
    owner: EntityId,
    slots: Vec<Option<StructuralChange>>,
}

impl LaneRequests {
    pub(crate) fn new(owner: EntityId, lane_count: usize) -> Self {
        Self {
            owner,
            slots: (0..lane_count).map(|_| None).collect(),
        }
    }

    pub fn request(&mut self, lane: LaneId, change: StructuralChange) {
        let Some(slot) = self.slots.get_mut(lane) else {
            tracing::warn!(
                "Entity {} requested {} on missing lane {}",
                self.owner,
                change.label(),
                lane
            );
            return;
        };
        if slot.is_some() {
            fault(Fault::DoubleStructuralChange {
                entity: self.owner,
                lane,
            });
            return;
        }
        *slot = Some(change);
    }

    pub fn is_pending(&self, lane: LaneId) -> bool {
        self.slots.get(lane).is_some_and(Option::is_some)
    }

    fn take(&mut self, lane: LaneId) -> Option<StructuralChange> {
        self.slots.get_mut(lane).and_then(Option::take)
    }
}

/// Owns every behavior of one entity
#[derive(Debug)]
pub struct BehaviorManager {
    owner: EntityId,
    lanes: Vec<Vec<Behavior>>,
    requests: LaneRequests,
    history_depth: usize,
}

impl BehaviorManager {
    pub fn new(owner: EntityId, config: &SchedulerConfig) -> Self {
        let lane_count = config.lane_count.max(1);
        let lanes = (0..lane_count)
            .map(|lane| {
                let mut idle = Behavior::new(IdleBehavior);
                idle.install(owner, lane, config.history_depth);
                vec![idle]
            })
            .collect();

        Self {
            owner,
            lanes,
            requests: LaneRequests::new(owner, lane_count),
            history_depth: config.history_depth,
        }
    }

    pub fn owner(&self) -> EntityId {
        self.owner
    }

    pub fn lane_count(&self) -> usize {
        self.lanes.len()
    }

    /// Number of behaviors stacked on `lane`, idle base included
    pub fn depth(&self, lane: LaneId) -> usize {
        self.lanes.get(lane).map_or(0, Vec::len)
    }

    /// The live behavior of `lane`
    pub fn top(&self, lane: LaneId) -> Option<&Behavior> {
        self.lanes.get(lane).and_then(|stack| stack.last())
    }

    /// Bottom to top
    pub fn behaviors(&self, lane: LaneId) -> &[Behavior] {
        self.lanes.get(lane).map_or(&[], Vec::as_slice)
    }

    pub fn has_pending_change(&self, lane: LaneId) -> bool {
        self.requests.is_pending(lane)
    }

    pub fn request(&mut self, lane: LaneId, change: StructuralChange) {
        self.requests.request(lane, change);
    }

    pub fn request_reset(&mut self, lane: LaneId) {
        self.request(lane, StructuralChange::Reset);
    }

    pub fn request_replace(&mut self, lane: LaneId, behavior: Behavior) {
        self.request(lane, StructuralChange::Replace(behavior));
    }

    pub fn request_queue(&mut self, lane: LaneId, behavior: Behavior) {
        self.request(lane, StructuralChange::Queue(behavior));
    }

    pub fn request_requeue(&mut self, lane: LaneId) {
        self.request(lane, StructuralChange::Requeue);
    }

    pub fn request_push(&mut self, lane: LaneId, behavior: Behavior, enter: bool) {
        self.request(lane, StructuralChange::Push { behavior, enter });
    }

    pub fn request_pop(&mut self, lane: LaneId) {
        self.request(lane, StructuralChange::Pop);
    }

    /// Would the live behavior on the message's lane accept it?
    pub fn accepts(&self, msg: &Message) -> bool {
        self.top(msg.lane()).is_some_and(|top| top.accepts(msg))
    }

    /// Hand a routed message to the addressed lane
    pub fn receive(&mut self, msg: &Message, cx: &mut Context<'_>) {
        if msg.name() == RESET_BEHAVIOR {
            let lane = msg.lane();
            if self.requests.is_pending(lane) {
                // One structural change per lane per update
                tracing::debug!(
                    "Entity {} lane {}: reset skipped, change already pending",
                    self.owner,
                    lane
                );
            } else {
                self.request_reset(lane);
            }
            return;
        }
        let event = if msg.is_carbon_copy() {
            Event::CarbonCopy(msg.name())
        } else {
            Event::Message(msg.name())
        };
        self.process(msg.lane(), event, Some(msg), cx);
    }

    /// Dispatch an event to the top behavior of `lane`
    pub fn process(
        &mut self,
        lane: LaneId,
        event: Event,
        msg: Option<&Message>,
        cx: &mut Context<'_>,
    ) {
        let Self {
            lanes, requests, ..
        } = self;
        if let Some(top) = lanes.get_mut(lane).and_then(|stack| stack.last_mut()) {
            top.process(event, msg, cx, requests);
        }
    }

    /// Dispatch an event to the top behavior of every lane
    pub fn process_all_lanes(&mut self, event: Event, cx: &mut Context<'_>) {
        for lane in 0..self.lanes.len() {
            self.process(lane, event, None, cx);
        }
    }

    /// Apply pending structural changes, then update every lane's top behavior
    pub fn update(&mut self, cx: &mut Context<'_>) {
        for lane in 0..self.lanes.len() {
            self.resolve_requests(lane, cx);
            let Self {
                lanes, requests, ..
            } = self;
            if let Some(top) = lanes[lane].last_mut() {
                top.update(cx, requests);
            }
        }
    }

    fn resolve_requests(&mut self, lane: LaneId, cx: &mut Context<'_>) {
        let limit = cx.config().max_structural_changes;
        let mut applied = 0;

        while let Some(change) = self.requests.take(lane) {
            applied += 1;
            if applied > limit {
                fault(Fault::StructuralChangeOverflow {
                    entity: self.owner,
                    lane,
                    limit,
                });
                return;
            }
            self.apply(lane, change, cx);
        }
    }

    fn apply(&mut self, lane: LaneId, change: StructuralChange, cx: &mut Context<'_>) {
        if matches!(change, StructuralChange::Pop) && self.lanes[lane].len() <= 1 {
            fault(Fault::PopLastBehavior {
                entity: self.owner,
                lane,
            });
            return;
        }

        tracing::debug!(
            "Entity {} lane {}: applying {}",
            self.owner,
            lane,
            change.label()
        );

        match change {
            StructuralChange::Reset => {}
            StructuralChange::Replace(mut behavior) => {
                behavior.install(self.owner, lane, self.history_depth);
                let stack = &mut self.lanes[lane];
                if stack.len() > 1 {
                    stack.pop();
                }
                stack.push(behavior);
            }
            StructuralChange::Queue(mut behavior) => {
                behavior.install(self.owner, lane, self.history_depth);
                let stack = &mut self.lanes[lane];
                if stack.len() > 1 {
                    // The live behavior keeps running untouched
                    let below_top = stack.len() - 1;
                    stack.insert(below_top, behavior);
                    return;
                }
                stack.push(behavior);
            }
            StructuralChange::Requeue => {
                let stack = &mut self.lanes[lane];
                if stack.len() > 2 {
                    if let Some(top) = stack.pop() {
                        // Slot 0 stays the idle base
                        stack.insert(1, top);
                    }
                }
            }
            StructuralChange::Push {
                mut behavior,
                enter,
            } => {
                behavior.install(self.owner, lane, self.history_depth);
                if !enter {
                    self.purge_scoped(lane, cx);
                    behavior.initialize();
                    self.lanes[lane].push(behavior);
                    return;
                }
                self.lanes[lane].push(behavior);
            }
            StructuralChange::Pop => {
                self.lanes[lane].pop();
            }
        }

        // Purge before the new top's Enter so the messages it sends survive
        self.purge_scoped(lane, cx);
        self.reset_top(lane, cx);
    }

    /// Scoped messages addressed to this lane refer to a behavior that is no
    /// longer live
    fn purge_scoped(&self, lane: LaneId, cx: &mut Context<'_>) {
        let purged = cx.purge_scoped_msg_on_lane(self.owner, lane);
        if purged > 0 {
            tracing::trace!(
                "Purged {} scoped messages for entity {} lane {}",
                purged,
                self.owner,
                lane
            );
        }
    }

    fn reset_top(&mut self, lane: LaneId, cx: &mut Context<'_>) {
        let Self {
            lanes, requests, ..
        } = self;
        if let Some(top) = lanes[lane].last_mut() {
            top.reset(cx, requests);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::behavior::{Handled, Level, Machine, StateTable};
    use crate::core::types::EntityKind;
    use crate::simulation::Simulation;
    use std::cell::RefCell;
    use std::rc::Rc;

    type Journal = Rc<RefCell<Vec<String>>>;

    /// Logs "<name>:<event>" for Enter and Update
    struct Named {
        name: &'static str,
        journal: Journal,
    }

    impl StateTable for Named {
        fn name(&self) -> &'static str {
            self.name
        }

        fn handle(
            &mut self,
            _m: &mut Machine<'_, '_>,
            level: Level,
            event: Event,
            _msg: Option<&Message>,
        ) -> Handled {
            match (level, event) {
                (Level::State(_), Event::Enter | Event::Update) => {
                    self.journal
                        .borrow_mut()
                        .push(format!("{}:{}", self.name, event.name()));
                    Handled::Yes
                }
                _ => Handled::No,
            }
        }
    }

    const PING: crate::message::MessageName = crate::message::MessageName::new("Ping");

    /// Sends itself a state-scoped Ping a second out on Enter
    struct Armed;

    impl StateTable for Armed {
        fn name(&self) -> &'static str {
            "Armed"
        }

        fn handle(
            &mut self,
            m: &mut Machine<'_, '_>,
            level: Level,
            event: Event,
            _msg: Option<&Message>,
        ) -> Handled {
            match (level, event) {
                (Level::State(0), Event::Enter) => {
                    m.send_to_self(
                        1.0,
                        PING,
                        crate::message::ScopeRule::State,
                        crate::message::Payload::None,
                    );
                    Handled::Yes
                }
                _ => Handled::No,
            }
        }
    }

    fn named(name: &'static str, journal: &Journal) -> Behavior {
        Behavior::new(Named {
            name,
            journal: journal.clone(),
        })
    }

    fn setup() -> (Simulation, EntityId, Journal) {
        let mut sim = Simulation::new(SchedulerConfig::default());
        let id = sim.spawn(EntityKind::new(1), "subject");
        (sim, id, Journal::default())
    }

    fn manager(sim: &mut Simulation, id: EntityId) -> &mut BehaviorManager {
        sim.world.manager_mut(id).unwrap()
    }

    fn names(sim: &Simulation, id: EntityId) -> Vec<&'static str> {
        sim.world
            .manager(id)
            .unwrap()
            .behaviors(0)
            .iter()
            .map(Behavior::name)
            .collect()
    }

    fn enters(journal: &Journal) -> Vec<String> {
        journal
            .borrow()
            .iter()
            .filter(|entry| entry.ends_with(":Enter"))
            .cloned()
            .collect()
    }

    #[test]
    fn test_new_manager_has_idle_base_per_lane() {
        let manager = BehaviorManager::new(EntityId::new(), &SchedulerConfig::new().with_lanes(3));
        assert_eq!(manager.lane_count(), 3);
        for lane in 0..3 {
            assert_eq!(manager.depth(lane), 1);
            assert_eq!(manager.top(lane).unwrap().name(), "Idle");
        }
        assert!(manager.top(3).is_none());
    }

    #[test]
    fn test_push_then_pop_re_enters_previous() {
        let (mut sim, id, journal) = setup();

        manager(&mut sim, id).request_push(0, named("A", &journal), true);
        sim.run_frame();
        manager(&mut sim, id).request_push(0, named("B", &journal), true);
        sim.run_frame();
        manager(&mut sim, id).request_pop(0);
        sim.run_frame();

        assert_eq!(enters(&journal), vec!["A:Enter", "B:Enter", "A:Enter"]);
        assert_eq!(names(&sim, id), vec!["Idle", "A"]);
    }

    #[test]
    fn test_push_without_enter_only_initializes() {
        let (mut sim, id, journal) = setup();

        manager(&mut sim, id).request_push(0, named("A", &journal), false);
        sim.run_frame();

        assert!(enters(&journal).is_empty());
        assert_eq!(*journal.borrow(), vec!["A:Update"]);
        let top = sim.world.manager(id).unwrap().top(0).unwrap();
        assert_eq!(top.scope_state(), 1);
    }

    #[test]
    fn test_replace_swaps_the_top() {
        let (mut sim, id, journal) = setup();

        manager(&mut sim, id).request_push(0, named("A", &journal), true);
        sim.run_frame();
        manager(&mut sim, id).request_replace(0, named("C", &journal));
        sim.run_frame();

        assert_eq!(names(&sim, id), vec!["Idle", "C"]);
        assert_eq!(enters(&journal), vec!["A:Enter", "C:Enter"]);
    }

    #[test]
    fn test_queue_runs_after_current_top() {
        let (mut sim, id, journal) = setup();

        manager(&mut sim, id).request_push(0, named("A", &journal), true);
        sim.run_frame();
        manager(&mut sim, id).request_queue(0, named("B", &journal));
        sim.run_frame();

        assert_eq!(names(&sim, id), vec!["Idle", "B", "A"]);
        assert_eq!(enters(&journal), vec!["A:Enter"]);

        manager(&mut sim, id).request_pop(0);
        sim.run_frame();
        assert_eq!(enters(&journal), vec!["A:Enter", "B:Enter"]);
    }

    #[test]
    fn test_queue_on_idle_lane_starts_immediately() {
        let (mut sim, id, journal) = setup();

        manager(&mut sim, id).request_queue(0, named("A", &journal));
        sim.run_frame();

        assert_eq!(names(&sim, id), vec!["Idle", "A"]);
        assert_eq!(enters(&journal), vec!["A:Enter"]);
    }

    #[test]
    fn test_requeue_sends_top_to_the_back() {
        let (mut sim, id, journal) = setup();

        manager(&mut sim, id).request_push(0, named("A", &journal), true);
        sim.run_frame();
        manager(&mut sim, id).request_push(0, named("B", &journal), true);
        sim.run_frame();
        manager(&mut sim, id).request_requeue(0);
        sim.run_frame();

        assert_eq!(names(&sim, id), vec!["Idle", "B", "A"]);
        assert_eq!(enters(&journal), vec!["A:Enter", "B:Enter", "A:Enter"]);
    }

    #[test]
    fn test_reset_message_re_enters_top() {
        let (mut sim, id, journal) = setup();

        manager(&mut sim, id).request_push(0, named("A", &journal), true);
        sim.run_frame();
        sim.send_msg(0.0, Message::new(RESET_BEHAVIOR, id, id));
        assert!(sim.world.manager(id).unwrap().has_pending_change(0));
        sim.run_frame();

        assert_eq!(enters(&journal), vec!["A:Enter", "A:Enter"]);
        assert_eq!(sim.world.manager(id).unwrap().top(0).unwrap().scope_state(), 2);
    }

    #[test]
    fn test_lanes_are_independent() {
        let (mut sim, id, journal) = setup();

        manager(&mut sim, id).request_push(0, named("Walk", &journal), true);
        manager(&mut sim, id).request_push(1, named("Look", &journal), true);
        sim.run_frame();

        let manager = sim.world.manager(id).unwrap();
        assert_eq!(manager.top(0).unwrap().name(), "Walk");
        assert_eq!(manager.top(1).unwrap().name(), "Look");
        assert_eq!(manager.top(1).unwrap().lane(), 1);
    }

    #[test]
    fn test_change_on_one_lane_keeps_other_lanes_messages() {
        let (mut sim, id, journal) = setup();

        manager(&mut sim, id).request_push(0, Behavior::new(Armed), true);
        sim.run_frame();
        assert_eq!(sim.router.pending().len(), 1);

        manager(&mut sim, id).request_push(1, named("Look", &journal), true);
        sim.run_frame();
        assert_eq!(sim.router.pending().len(), 1);
        assert_eq!(sim.router.stats().removed, 0);

        // A change on the owning lane still voids it
        manager(&mut sim, id).request_push(0, named("Walk", &journal), true);
        sim.run_frame();
        assert!(sim.router.pending().is_empty());
    }

    #[test]
    fn test_reset_message_waits_for_pending_change() {
        let (mut sim, id, journal) = setup();

        manager(&mut sim, id).request_push(0, named("A", &journal), true);
        sim.send_msg(0.0, Message::new(RESET_BEHAVIOR, id, id));
        sim.run_frame();

        assert_eq!(enters(&journal), vec!["A:Enter"]);
        assert_eq!(names(&sim, id), vec!["Idle", "A"]);
        assert!(!sim.world.manager(id).unwrap().has_pending_change(0));
    }

    #[test]
    fn test_request_on_missing_lane_is_ignored() {
        let (mut sim, id, journal) = setup();
        manager(&mut sim, id).request_push(7, named("A", &journal), true);
        assert!(!manager(&mut sim, id).has_pending_change(7));
    }

    #[test]
    #[cfg(debug_assertions)]
    #[should_panic(expected = "cannot pop the last behavior")]
    fn test_pop_last_behavior_faults() {
        let (mut sim, id, _journal) = setup();
        manager(&mut sim, id).request_pop(0);
        sim.run_frame();
    }

    #[test]
    #[cfg(debug_assertions)]
    #[should_panic(expected = "already pending")]
    fn test_second_request_on_lane_faults() {
        let (mut sim, id, journal) = setup();
        manager(&mut sim, id).request_push(0, named("A", &journal), true);
        manager(&mut sim, id).request_pop(0);
    }
}
