//! Hierarchical state machine driving one lane of one entity
//!
//! A [`Behavior`] pairs the scheduler-owned bookkeeping ([`MachineCore`]) with
//! a concrete [`StateTable`]. Tables only ever see the core through
//! [`Machine`], which also carries the router context so handlers can send
//! messages and request transitions.
//!
//! Transitions requested during a dispatch are applied right after it, one at a
//! time: Exit on what is left, history push, apply, bump scope counters, Enter
//! on what is entered. Bumping the counters is what voids scoped messages that
//! are still in flight.

use crate::behavior::history::History;
use crate::behavior::manager::{LaneRequests, StructuralChange};
use crate::behavior::table::{Event, Handled, Level, StateTable};
use crate::core::error::{fault, Fault};
use crate::core::types::{EntityId, EntityKind, LaneId, StateId, SubstateId, Time};
use crate::message::{
    Message, MessageName, Payload, ScopeRule, CHANGE_STATE_DELAYED, CHANGE_SUBSTATE_DELAYED,
};
use crate::router::{Context, DispatchRecord};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Transition {
    State(StateId),
    Substate(SubstateId),
    Pop,
}

/// Scheduler-side state of a behavior
#[derive(Debug, Clone)]
pub struct MachineCore {
    owner: EntityId,
    lane: LaneId,
    behavior: &'static str,
    state: StateId,
    substate: Option<SubstateId>,
    scope_state: u32,
    scope_substate: u32,
    history: History,
    pending: Option<Transition>,
    change_allowed: bool,
}

impl MachineCore {
    fn new(behavior: &'static str, initial: StateId) -> Self {
        Self {
            owner: EntityId::default(),
            lane: 0,
            behavior,
            state: initial,
            substate: None,
            scope_state: 0,
            scope_substate: 0,
            history: History::new(10),
            pending: None,
            change_allowed: true,
        }
    }

    fn scope_for(&self, rule: ScopeRule) -> u32 {
        match rule {
            ScopeRule::Substate => self.scope_substate,
            ScopeRule::State => self.scope_state,
            ScopeRule::Machine => 0,
        }
    }

    fn request(&mut self, transition: Transition) {
        if !self.change_allowed {
            fault(Fault::ChangeDuringExit {
                entity: self.owner,
                behavior: self.behavior,
            });
            return;
        }
        if self.pending.is_some() {
            fault(Fault::DoubleStateChange {
                entity: self.owner,
                behavior: self.behavior,
            });
            return;
        }
        if transition == Transition::Pop && self.history.is_empty() {
            fault(Fault::EmptyHistory {
                entity: self.owner,
                behavior: self.behavior,
            });
            return;
        }
        self.pending = Some(transition);
    }

    fn accepts(&self, msg: &Message) -> bool {
        match msg.scope_rule() {
            ScopeRule::Machine => true,
            rule => msg.scope() == self.scope_for(rule),
        }
    }

    fn self_message(&self, name: MessageName, rule: ScopeRule) -> Message {
        Message::new(name, self.owner, self.owner)
            .scoped(rule, self.scope_for(rule))
            .on_lane(self.lane)
    }
}

/// Handle given to state tables while they process an event
pub struct Machine<'m, 'cx> {
    core: &'m mut MachineCore,
    cx: &'m mut Context<'cx>,
    requests: &'m mut LaneRequests,
}

impl<'m, 'cx> Machine<'m, 'cx> {
    pub fn owner(&self) -> EntityId {
        self.core.owner
    }

    pub fn lane(&self) -> LaneId {
        self.core.lane
    }

    pub fn state(&self) -> StateId {
        self.core.state
    }

    pub fn substate(&self) -> Option<SubstateId> {
        self.core.substate
    }

    pub fn previous_state(&self) -> Option<StateId> {
        self.core.history.peek()
    }

    pub fn now(&self) -> Time {
        self.cx.now()
    }

    /// Router context, for anything the helpers below don't cover
    pub fn context(&mut self) -> &mut Context<'cx> {
        &mut *self.cx
    }

    // --- transitions ---

    /// Leave the current state for `state` once this dispatch returns
    pub fn change_state(&mut self, state: StateId) {
        self.core.request(Transition::State(state));
    }

    /// Switch substate within the current state once this dispatch returns
    pub fn change_substate(&mut self, substate: SubstateId) {
        self.core.request(Transition::Substate(substate));
    }

    /// Return to the state that was active before the current one
    pub fn pop_state(&mut self) {
        self.core.request(Transition::Pop);
    }

    /// Change state after `delay` seconds unless any transition happens first
    pub fn change_state_delayed(&mut self, delay: Time, state: StateId) {
        if delay <= 0.0 {
            self.change_state(state);
            return;
        }
        self.send_to_self(
            delay,
            CHANGE_STATE_DELAYED,
            ScopeRule::Substate,
            Payload::Int(state as i64),
        );
    }

    /// Change substate after `delay` seconds unless any transition happens first
    pub fn change_substate_delayed(&mut self, delay: Time, substate: SubstateId) {
        if delay <= 0.0 {
            self.change_substate(substate);
            return;
        }
        self.send_to_self(
            delay,
            CHANGE_SUBSTATE_DELAYED,
            ScopeRule::Substate,
            Payload::Int(substate as i64),
        );
    }

    // --- messaging ---

    /// Immediate messages to this lane are scope-checked now, before any
    /// transition requested later in the same handler can move the counters
    fn send(&mut self, delay: Time, msg: Message) {
        let to_self = msg.receiver() == self.core.owner && msg.lane() == self.core.lane;
        if delay <= 0.0 && to_self {
            if !self.core.accepts(&msg) {
                tracing::trace!(
                    "Dropping {} for entity {}: scope already gone",
                    msg.name(),
                    self.core.owner
                );
                return;
            }
            self.cx.send_msg(delay, msg.mark_scope_checked());
        } else {
            self.cx.send_msg(delay, msg);
        }
    }

    /// Message this behavior, scoped to the current state, substate or machine
    pub fn send_to_self(&mut self, delay: Time, name: MessageName, rule: ScopeRule, data: Payload) {
        let msg = self.core.self_message(name, rule).with_data(data);
        self.send(delay, msg);
    }

    /// Periodic self-message that lives as long as `rule` allows
    pub fn set_timer(&mut self, interval: Time, name: MessageName, rule: ScopeRule) {
        if !interval.is_finite() || interval <= 0.0 {
            tracing::warn!(
                "{} on entity {} asked for a timer with interval {}; ignored",
                self.core.behavior,
                self.core.owner,
                interval
            );
            return;
        }
        let msg = self.core.self_message(name, rule).as_timer(interval);
        self.cx.send_msg(interval, msg);
    }

    pub fn stop_timer(&mut self, name: MessageName) -> usize {
        let owner = self.core.owner;
        self.cx.remove_msg(name, owner, owner, true)
    }

    /// Machine-scoped message to another entity's behavior on `lane`
    pub fn send_msg(
        &mut self,
        delay: Time,
        name: MessageName,
        receiver: EntityId,
        lane: LaneId,
        data: Payload,
    ) {
        let msg = Message::new(name, self.core.owner, receiver)
            .on_lane(lane)
            .with_data(data);
        self.send(delay, msg);
    }

    /// Send a fully built message
    pub fn post(&mut self, delay: Time, msg: Message) {
        self.send(delay, msg);
    }

    /// Forward an observational copy of `msg` to `observer`
    pub fn send_cc_msg(&mut self, delay: Time, observer: EntityId, msg: &Message) {
        let copy = msg.readdressed(observer).as_carbon_copy();
        self.send(delay, copy);
    }

    /// Deliver `name` right now to `lane` of every entity of `kind` (all kinds if `None`)
    pub fn broadcast(
        &mut self,
        name: MessageName,
        lane: LaneId,
        kind: Option<EntityKind>,
        data: Payload,
    ) {
        let owner = self.core.owner;
        let msg = Message::new(name, owner, owner)
            .on_lane(lane)
            .with_data(data);
        self.cx.broadcast(msg, kind);
    }

    pub fn enable_slice(&mut self, delay: Time) {
        let owner = self.core.owner;
        self.cx.enable_slice(delay, owner);
    }

    pub fn disable_slice(&mut self) {
        let owner = self.core.owner;
        self.cx.disable_slice(owner);
    }

    // --- structural changes on this entity's lanes ---

    pub fn has_pending_behavior_change(&self, lane: LaneId) -> bool {
        self.requests.is_pending(lane)
    }

    pub fn push_behavior(&mut self, lane: LaneId, behavior: Behavior, enter: bool) {
        self.requests
            .request(lane, StructuralChange::Push { behavior, enter });
    }

    pub fn pop_behavior(&mut self, lane: LaneId) {
        self.requests.request(lane, StructuralChange::Pop);
    }

    pub fn replace_behavior(&mut self, lane: LaneId, behavior: Behavior) {
        self.requests
            .request(lane, StructuralChange::Replace(behavior));
    }

    pub fn queue_behavior(&mut self, lane: LaneId, behavior: Behavior) {
        self.requests.request(lane, StructuralChange::Queue(behavior));
    }

    pub fn requeue_behavior(&mut self, lane: LaneId) {
        self.requests.request(lane, StructuralChange::Requeue);
    }

    pub fn reset_behavior(&mut self, lane: LaneId) {
        self.requests.request(lane, StructuralChange::Reset);
    }
}

/// One state machine instance on one lane of one entity
pub struct Behavior {
    core: MachineCore,
    table: Box<dyn StateTable>,
}

impl std::fmt::Debug for Behavior {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Behavior")
            .field("name", &self.core.behavior)
            .field("state", &self.core.state)
            .field("substate", &self.core.substate)
            .finish()
    }
}

impl Behavior {
    pub fn new(table: impl StateTable + 'static) -> Self {
        Self::from_box(Box::new(table))
    }

    pub fn from_box(table: Box<dyn StateTable>) -> Self {
        let core = MachineCore::new(table.name(), table.initial_state());
        Self { core, table }
    }

    pub(crate) fn install(&mut self, owner: EntityId, lane: LaneId, history_depth: usize) {
        self.core.owner = owner;
        self.core.lane = lane;
        self.core.history = History::new(history_depth);
    }

    pub fn name(&self) -> &'static str {
        self.core.behavior
    }

    pub fn owner(&self) -> EntityId {
        self.core.owner
    }

    pub fn lane(&self) -> LaneId {
        self.core.lane
    }

    pub fn state(&self) -> StateId {
        self.core.state
    }

    pub fn substate(&self) -> Option<SubstateId> {
        self.core.substate
    }

    pub fn scope_state(&self) -> u32 {
        self.core.scope_state
    }

    pub fn scope_substate(&self) -> u32 {
        self.core.scope_substate
    }

    pub fn history_len(&self) -> usize {
        self.core.history.len()
    }

    pub fn has_pending_change(&self) -> bool {
        self.core.pending.is_some()
    }

    /// Is `msg` still valid for this behavior's live scope counters?
    pub fn accepts(&self, msg: &Message) -> bool {
        self.core.accepts(msg)
    }

    /// Back to the initial state with a clean history
    ///
    /// Both scope counters move so anything scoped to the old run is void.
    pub fn initialize(&mut self) {
        self.core.state = self.table.initial_state();
        self.core.substate = None;
        self.core.history.clear();
        self.core.pending = None;
        self.core.change_allowed = true;
        self.core.scope_state = self.core.scope_state.wrapping_add(1);
        self.core.scope_substate = self.core.scope_substate.wrapping_add(1);
    }

    /// Initialize and fire Enter
    pub fn reset(&mut self, cx: &mut Context<'_>, requests: &mut LaneRequests) {
        self.initialize();
        self.process(Event::Enter, None, cx, requests);
    }

    pub fn update(&mut self, cx: &mut Context<'_>, requests: &mut LaneRequests) {
        self.process(Event::Update, None, cx, requests);
    }

    /// Dispatch one event, then apply whatever transitions it requested
    pub fn process(
        &mut self,
        event: Event,
        msg: Option<&Message>,
        cx: &mut Context<'_>,
        requests: &mut LaneRequests,
    ) {
        if !self.intercept(event, msg) {
            self.dispatch(event, msg, cx, requests);
        }
        self.perform_state_changes(cx, requests);
    }

    fn intercept(&mut self, event: Event, msg: Option<&Message>) -> bool {
        let (Event::Message(name), Some(msg)) = (event, msg) else {
            return false;
        };
        let Some(target) = msg.data().as_int() else {
            return false;
        };
        if name == CHANGE_STATE_DELAYED {
            self.core.request(Transition::State(target as StateId));
            true
        } else if name == CHANGE_SUBSTATE_DELAYED {
            self.core.request(Transition::Substate(target as SubstateId));
            true
        } else {
            false
        }
    }

    fn dispatch(
        &mut self,
        event: Event,
        msg: Option<&Message>,
        cx: &mut Context<'_>,
        requests: &mut LaneRequests,
    ) -> Handled {
        let state = self.core.state;
        let substate = self.core.substate.map(|sub| Level::Substate(state, sub));
        let levels = substate
            .into_iter()
            .chain([Level::State(state), Level::Global]);
        self.dispatch_levels(levels, event, msg, cx, requests)
    }

    fn dispatch_levels(
        &mut self,
        levels: impl IntoIterator<Item = Level>,
        event: Event,
        msg: Option<&Message>,
        cx: &mut Context<'_>,
        requests: &mut LaneRequests,
    ) -> Handled {
        let mut handled = Handled::No;
        for level in levels {
            let mut machine = Machine {
                core: &mut self.core,
                cx: &mut *cx,
                requests: &mut *requests,
            };
            if self.table.handle(&mut machine, level, event, msg) == Handled::Yes {
                handled = Handled::Yes;
                break;
            }
        }
        self.observe(event, handled, cx);
        handled
    }

    fn observe(&self, event: Event, handled: Handled, cx: &mut Context<'_>) {
        if !cx.is_observed() {
            return;
        }
        let state = self.core.state;
        let record = DispatchRecord {
            entity: self.core.owner,
            lane: self.core.lane,
            behavior: self.core.behavior,
            state,
            state_name: self.table.state_name(state),
            substate: self.core.substate,
            substate_name: self
                .core
                .substate
                .and_then(|sub| self.table.substate_name(state, sub)),
            event,
            handled: handled == Handled::Yes,
        };
        cx.observe(&record);
    }

    fn perform_state_changes(&mut self, cx: &mut Context<'_>, requests: &mut LaneRequests) {
        let limit = cx.config().max_state_changes;
        let mut iterations = 0;

        while let Some(transition) = self.core.pending.take() {
            iterations += 1;
            if iterations > limit {
                fault(Fault::StateChangeOverflow {
                    entity: self.core.owner,
                    behavior: self.core.behavior,
                    limit,
                });
                return;
            }

            self.fire_exit(transition, cx, requests);

            match transition {
                Transition::State(next) => {
                    self.core.history.push(self.core.state);
                    self.core.state = next;
                    self.core.substate = None;
                    self.core.scope_state = self.core.scope_state.wrapping_add(1);
                }
                Transition::Substate(sub) => {
                    self.core.substate = Some(sub);
                }
                Transition::Pop => match self.core.history.pop() {
                    Some(parent) => {
                        self.core.state = parent;
                        self.core.substate = None;
                        self.core.scope_state = self.core.scope_state.wrapping_add(1);
                    }
                    None => {
                        fault(Fault::EmptyHistory {
                            entity: self.core.owner,
                            behavior: self.core.behavior,
                        });
                        continue;
                    }
                },
            }
            self.core.scope_substate = self.core.scope_substate.wrapping_add(1);

            let state = self.core.state;
            match transition {
                Transition::Substate(sub) => {
                    self.dispatch_levels(
                        [Level::Substate(state, sub)],
                        Event::Enter,
                        None,
                        cx,
                        requests,
                    );
                }
                _ => {
                    self.dispatch(Event::Enter, None, cx, requests);
                }
            }
        }
    }

    fn fire_exit(
        &mut self,
        transition: Transition,
        cx: &mut Context<'_>,
        requests: &mut LaneRequests,
    ) {
        self.core.change_allowed = false;
        let state = self.core.state;
        let substate = self.core.substate;

        if let Some(sub) = substate {
            self.dispatch_levels([Level::Substate(state, sub)], Event::Exit, None, cx, requests);
        }
        if !matches!(transition, Transition::Substate(_)) {
            self.dispatch_levels(
                [Level::State(state), Level::Global],
                Event::Exit,
                None,
                cx,
                requests,
            );
        }

        self.core.change_allowed = true;
    }
}
