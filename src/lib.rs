//! Statecraft - frame-driven hierarchical state machines with scoped message routing

pub mod behavior;
pub mod behaviors;
pub mod core;
pub mod ecs;
pub mod message;
pub mod router;
pub mod simulation;
