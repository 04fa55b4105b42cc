pub mod frame;

pub use frame::{run_frame, FrameReport, Simulation};
