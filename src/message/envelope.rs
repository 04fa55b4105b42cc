//! Message envelope
//!
//! A message is built once with the builder methods below and then handed to
//! the router. Only the router touches it afterwards (delivery time, delivered
//! flag).

use ordered_float::OrderedFloat;
use std::fmt;

use crate::core::types::{EntityId, LaneId, Time};

/// Symbolic message identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MessageName(&'static str);

impl MessageName {
    pub const fn new(name: &'static str) -> Self {
        Self(name)
    }

    pub fn as_str(&self) -> &'static str {
        self.0
    }
}

impl fmt::Display for MessageName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.0)
    }
}

/// Self-addressed by `change_state_delayed`; payload is the target state
pub const CHANGE_STATE_DELAYED: MessageName = MessageName::new("ChangeStateDelayed");

/// Self-addressed by `change_substate_delayed`; payload is the target substate
pub const CHANGE_SUBSTATE_DELAYED: MessageName = MessageName::new("ChangeSubstateDelayed");

/// Asks the receiving manager to reset the top behavior of the addressed lane
pub const RESET_BEHAVIOR: MessageName = MessageName::new("ResetBehavior");

/// How long a message stays valid once its sender or receiver changes state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ScopeRule {
    /// Void after any state or substate transition of the receiver
    Substate,
    /// Void after a full state transition of the receiver
    State,
    /// Valid for the lifetime of the receiving behavior
    #[default]
    Machine,
}

/// Opaque handle carried by a message payload
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Handle(pub u64);

/// Message payload
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Payload {
    #[default]
    None,
    Int(i64),
    Real(OrderedFloat<f64>),
    Ref(Handle),
}

impl Payload {
    pub fn real(value: f64) -> Self {
        Payload::Real(OrderedFloat(value))
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            Payload::Int(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_real(&self) -> Option<f64> {
        match self {
            Payload::Real(v) => Some(v.into_inner()),
            _ => None,
        }
    }

    pub fn as_handle(&self) -> Option<Handle> {
        match self {
            Payload::Ref(h) => Some(*h),
            _ => None,
        }
    }

    pub fn is_none(&self) -> bool {
        matches!(self, Payload::None)
    }
}

/// A message between two entities' behaviors
#[derive(Debug, Clone, PartialEq)]
pub struct Message {
    name: MessageName,
    sender: EntityId,
    receiver: EntityId,
    scope_rule: ScopeRule,
    scope: u32,
    lane: LaneId,
    delivery_time: Time,
    data: Payload,
    timer_interval: Option<Time>,
    carbon_copy: bool,
    delivered: bool,
    scope_checked: bool,
}

impl Message {
    /// Machine-scoped message on lane 0 with no payload
    pub fn new(name: MessageName, sender: EntityId, receiver: EntityId) -> Self {
        Self {
            name,
            sender,
            receiver,
            scope_rule: ScopeRule::Machine,
            scope: 0,
            lane: 0,
            delivery_time: 0.0,
            data: Payload::None,
            timer_interval: None,
            carbon_copy: false,
            delivered: false,
            scope_checked: false,
        }
    }

    pub fn scoped(mut self, rule: ScopeRule, scope: u32) -> Self {
        self.scope_rule = rule;
        self.scope = if rule == ScopeRule::Machine { 0 } else { scope };
        self
    }

    pub fn on_lane(mut self, lane: LaneId) -> Self {
        self.lane = lane;
        self
    }

    pub fn with_data(mut self, data: Payload) -> Self {
        self.data = data;
        self
    }

    /// Re-deliver every `interval` seconds for as long as the scope holds
    pub fn as_timer(mut self, interval: Time) -> Self {
        self.timer_interval = Some(interval);
        self
    }

    pub fn as_carbon_copy(mut self) -> Self {
        self.carbon_copy = true;
        self
    }

    /// Same message addressed to someone else
    pub fn readdressed(&self, receiver: EntityId) -> Self {
        Self {
            receiver,
            delivered: false,
            scope_checked: false,
            ..self.clone()
        }
    }

    pub(crate) fn deliver_at(mut self, time: Time) -> Self {
        self.delivery_time = time;
        self
    }

    pub(crate) fn mark_delivered(&mut self) {
        self.delivered = true;
    }

    /// Fresh copy for the next timer period
    pub(crate) fn next_period(&self) -> Self {
        Self {
            delivered: false,
            scope_checked: false,
            ..self.clone()
        }
    }

    /// Scope was verified against the receiver when it was sent
    ///
    /// Set on immediate self-messages so a transition in the same handler
    /// does not void them before they are routed.
    pub(crate) fn mark_scope_checked(mut self) -> Self {
        self.scope_checked = true;
        self
    }

    pub(crate) fn is_scope_checked(&self) -> bool {
        self.scope_checked
    }

    pub fn name(&self) -> MessageName {
        self.name
    }

    pub fn sender(&self) -> EntityId {
        self.sender
    }

    pub fn receiver(&self) -> EntityId {
        self.receiver
    }

    pub fn scope_rule(&self) -> ScopeRule {
        self.scope_rule
    }

    pub fn scope(&self) -> u32 {
        self.scope
    }

    pub fn lane(&self) -> LaneId {
        self.lane
    }

    pub fn delivery_time(&self) -> Time {
        self.delivery_time
    }

    pub fn data(&self) -> Payload {
        self.data
    }

    pub fn is_timer(&self) -> bool {
        self.timer_interval.is_some()
    }

    pub fn timer_interval(&self) -> Option<Time> {
        self.timer_interval
    }

    pub fn is_carbon_copy(&self) -> bool {
        self.carbon_copy
    }

    pub fn is_delivered(&self) -> bool {
        self.delivered
    }

    /// Would this message be a redundant copy of an already pending one?
    ///
    /// Delivery time takes part in the comparison, so the same logical message
    /// sent in two different frames is kept twice.
    pub fn is_duplicate_of(&self, pending: &Message) -> bool {
        self.name == pending.name
            && self.receiver == pending.receiver
            && self.sender == pending.sender
            && self.scope_rule == pending.scope_rule
            && self.scope == pending.scope
            && self.lane == pending.lane
            && self.is_timer() == pending.is_timer()
            && self.data == pending.data
            && self.delivery_time == pending.delivery_time
    }
}
