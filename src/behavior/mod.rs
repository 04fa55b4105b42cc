//! Hierarchical state machines and the per-entity lanes that own them

pub mod history;
pub mod idle;
pub mod machine;
pub mod manager;
pub mod table;

pub use history::History;
pub use idle::IdleBehavior;
pub use machine::{Behavior, Machine, MachineCore};
pub use manager::{BehaviorManager, LaneRequests, StructuralChange};
pub use table::{Event, Handled, Level, StateTable};
