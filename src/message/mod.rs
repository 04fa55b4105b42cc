//! Messages and slice requests exchanged through the router

pub mod envelope;
pub mod slice;

pub use envelope::{
    Handle, Message, MessageName, Payload, ScopeRule, CHANGE_STATE_DELAYED,
    CHANGE_SUBSTATE_DELAYED, RESET_BEHAVIOR,
};
pub use slice::SliceRequest;
