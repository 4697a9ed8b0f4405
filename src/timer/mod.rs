//! Growing-time policy and the crop lifecycle timer.

pub mod duration;
pub mod machine;
pub mod stage;
pub mod state;

pub use machine::{StageMachine, TimerUpdate};
pub use stage::{Stage, TimeLeft, TimerAlert};
pub use state::TimerSnapshot;
