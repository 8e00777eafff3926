// Copyright (c) 2026 bad-antics
// Licensed under the MIT License. See LICENSE file in the project root.

//! IMU Bridge - motion sensor access for managed host runtimes
//!
//! Discovers the device's accelerometer, gyroscope and magnetometer, keeps one
//! subscription per logical sensor on a single readiness loop and delivers
//! every event to a listener living in a foreign runtime.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                       Sensor Manager                         │
//! ├──────────────────────────────────────────────────────────────┤
//! │  ┌──────────┐   ┌──────────┐   ┌─────────────┐               │
//! │  │ Platform │ → │ Catalog  │ → │ Multiplexer │ ← last values │
//! │  │ (seam)   │   │ (dedup)  │   │ (queues)    │               │
//! │  └──────────┘   └──────────┘   └─────────────┘               │
//! │                                     ↑ ready tokens           │
//! │                            ┌─────────────────┐               │
//! │                            │ Readiness Loop  │               │
//! │                            └─────────────────┘               │
//! │                                     ↓ events                 │
//! │  ┌───────────────────────────────────────────────────────┐   │
//! │  │ Callback Bridge → attach / call / detach → host        │   │
//! │  └───────────────────────────────────────────────────────┘   │
//! └──────────────────────────────────────────────────────────────┘
//! ```
//!
//! Hosts that can't link Rust use the C ABI in [`bridge::ffi`].

pub mod bridge;
pub mod config;
pub mod core;
pub mod error;
pub mod sensors;

// Re-exports for convenience
pub use bridge::{CallbackBridge, CallbackHandle, EventSink, HostRuntime};
pub use config::Config;
pub use core::{ManagerState, SensorManager, SAMPLING_PERIOD};
pub use error::{BridgeError, ImuError, Result};
pub use sensors::{SensorEvent, SensorInfo, SensorPlatform, SensorReading, SensorType, SimulatedPlatform};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Crate name
pub const NAME: &str = "IMU Bridge";
