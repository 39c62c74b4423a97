//! Signal generation and tick orchestration.
//!
//! The signal layer turns each pair's statistical baseline into a
//! classified z-score signal; the controller wires signals, risk gating
//! and position management into one non-overlapping tick loop.

mod controller;
mod signal;

pub use controller::{StrategyController, TickReport};
pub use signal::{Signal, SignalGenerator, SignalKind, SpreadDirection};
