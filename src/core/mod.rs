//! Core module - readiness loop, event multiplexer and the manager facade

mod event_loop;
mod manager;
mod multiplexer;

pub use event_loop::{DispatchFn, ReadinessLoop};
pub use manager::{ManagerState, SensorManager};
pub use multiplexer::EventMultiplexer;

use std::time::Duration;

/// Sampling period requested for every sensor (5 Hz)
pub const SAMPLING_PERIOD: Duration = Duration::from_micros(200_000);
