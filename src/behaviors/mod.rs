//! Concrete behaviors shipped with the crate

pub mod guard;

pub use guard::{Investigate, Lookout, Patrol, GUARD, NOISE, SCAN};
