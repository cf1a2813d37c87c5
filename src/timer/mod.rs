pub mod commands;
pub mod controller;
pub mod state;

pub use commands::{CommandOutcome, TimerCommand};
pub use controller::TimerController;
pub use state::{ClockState, DisplayUpdate, SwitchOutcome, Tick, TimerStatus, TrackingSession};
