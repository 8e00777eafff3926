// Copyright (c) 2026 bad-antics
// Licensed under the MIT License. See LICENSE file in the project root.

//! Sensor traits and common types

use std::time::Duration;

use chrono::{DateTime, Utc};
use crossbeam::channel::Sender;
use nalgebra::Vector3;
use serde::{Deserialize, Serialize};

use crate::error::Result;

/// Motion sensor types tracked by the bridge.
///
/// Discriminants match the platform's own type enumeration, so they are
/// bitfield-style rather than sequential.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(i32)]
pub enum SensorType {
    Accelerometer = 1,
    MagneticField = 2,
    Gyroscope = 4,
}

impl SensorType {
    /// Every type the catalog keeps
    pub const ALL: [SensorType; 3] = [
        SensorType::Accelerometer,
        SensorType::MagneticField,
        SensorType::Gyroscope,
    ];

    /// Map a platform type code, `None` for anything we don't track
    pub fn from_code(code: i32) -> Option<Self> {
        match code {
            1 => Some(SensorType::Accelerometer),
            2 => Some(SensorType::MagneticField),
            4 => Some(SensorType::Gyroscope),
            _ => None,
        }
    }

    pub fn code(self) -> i32 {
        self as i32
    }

    /// Unit of the reported axis values
    pub fn unit(self) -> &'static str {
        match self {
            SensorType::Accelerometer => "m/s²",
            SensorType::Gyroscope => "rad/s",
            SensorType::MagneticField => "µT",
        }
    }
}

/// A sensor as enumerated by the platform. Not owned by the bridge.
#[derive(Debug, Clone, PartialEq)]
pub struct RawSensorDescriptor<H> {
    /// Platform type code (may be a type we don't track)
    pub type_code: i32,
    pub name: String,
    /// Opaque reference to the platform sensor object
    pub handle: H,
}

impl<H> RawSensorDescriptor<H> {
    pub fn new(type_code: i32, name: impl Into<String>, handle: H) -> Self {
        Self {
            type_code,
            name: name.into(),
            handle,
        }
    }
}

/// An event as delivered by a platform queue.
///
/// `values` holds the first three data words of the platform event. Their
/// meaning depends on `type_code`: acceleration, angular rate or magnetic
/// field, each as an (x, y, z) triple.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PlatformEvent {
    pub type_code: i32,
    /// Platform monotonic clock
    pub timestamp_ns: i64,
    pub values: [f32; 3],
}

impl PlatformEvent {
    /// Axis triple for `expected`, or `None` if this event carries another type
    pub fn axes(&self, expected: SensorType) -> Option<Vector3<f32>> {
        // acceleration, angular rate and magnetic field share the same layout
        (self.type_code == expected.code()).then(|| Vector3::from(self.values))
    }
}

/// A dispatched sample, as handed to the host callback
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SensorEvent {
    pub name: String,
    pub sensor_type: SensorType,
    pub values: Vector3<f32>,
    pub timestamp_ns: i64,
    pub received_at: DateTime<Utc>,
}

/// `(name, type)` projection of a tracked sensor
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SensorInfo {
    pub name: String,
    pub sensor_type: Option<SensorType>,
}

impl SensorInfo {
    /// Platform type code, 0 for the empty projection
    pub fn type_code(&self) -> i32 {
        self.sensor_type.map(SensorType::code).unwrap_or(0)
    }
}

/// Snapshot row for one tracked sensor
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SensorReading {
    pub name: String,
    pub sensor_type: SensorType,
    pub unit: String,
    pub values: Vector3<f32>,
    pub event_count: u64,
    pub enabled: bool,
}

/// Identifies which subscription a readiness signal belongs to.
///
/// The wrapped value is the sensor's index in the multiplexer's active set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionToken(pub usize);

/// Wakes the readiness loop for one subscription
#[derive(Debug, Clone)]
pub struct ReadySignal {
    token: SubscriptionToken,
    tx: Sender<SubscriptionToken>,
}

impl ReadySignal {
    pub fn new(token: SubscriptionToken, tx: Sender<SubscriptionToken>) -> Self {
        Self { token, tx }
    }

    pub fn token(&self) -> SubscriptionToken {
        self.token
    }

    /// Returns false once the readiness loop is gone
    pub fn notify(&self) -> bool {
        self.tx.send(self.token).is_ok()
    }
}

/// Platform sensor service.
///
/// Implementations own the concrete readiness mechanism; the bridge only sees
/// queues that raise a [`ReadySignal`] when events are waiting.
pub trait SensorPlatform: Send {
    /// Opaque per-sensor reference
    type Handle: Clone + Send + 'static;

    /// Live event queue for one sensor
    type Queue: SensorQueue + 'static;

    /// Enumerate every sensor the platform exposes.
    ///
    /// Fails with [`crate::ImuError::SensorServiceUnavailable`] when the
    /// service itself cannot be reached.
    fn enumerate(&mut self) -> Result<Vec<RawSensorDescriptor<Self::Handle>>>;

    /// Create a queue for `handle` that notifies `signal` whenever events are
    /// waiting. Dropping the queue destroys the subscription.
    fn subscribe(&mut self, handle: &Self::Handle, signal: ReadySignal) -> Result<Self::Queue>;
}

/// Platform event queue for one sensor
pub trait SensorQueue: Send {
    /// Turn on delivery
    fn enable(&mut self) -> Result<()>;

    /// Request a sampling period; only meaningful once enabled
    fn set_event_rate(&mut self, period: Duration) -> Result<()>;

    /// Turn off delivery
    fn disable(&mut self) -> Result<()>;

    /// Pop the next queued event without blocking
    fn next_event(&mut self) -> Option<PlatformEvent>;
}
