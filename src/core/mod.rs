pub mod clock;
pub mod config;
pub mod error;
pub mod types;

pub use clock::{Clock, FrameClock};
pub use config::{SchedulerConfig, SlicePolicy};
pub use error::{fault, Error, Fault, Result};
pub use types::{EntityId, EntityKind, LaneId, StateId, SubstateId, Time};
