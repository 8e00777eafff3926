// Copyright (c) 2026 bad-antics
// Licensed under the MIT License. See LICENSE file in the project root.

//! Error types

use thiserror::Error;

/// Errors raised by the sensor side of the bridge
#[derive(Debug, Error)]
pub enum ImuError {
    /// The platform sensor service could not be obtained
    #[error("sensor service unavailable: {0}")]
    SensorServiceUnavailable(String),

    /// The readiness loop could not be started
    #[error("readiness loop unavailable: {0}")]
    ReadinessLoopUnavailable(String),

    /// No motion sensor survived discovery and subscription
    #[error("no usable motion sensors")]
    NoSensors,

    /// Creating the event queue for a sensor failed
    #[error("failed to subscribe to {sensor}: {reason}")]
    Subscribe { sensor: String, reason: String },

    /// Enabling delivery (or setting the event rate) failed
    #[error("failed to enable {sensor}: {reason}")]
    Enable { sensor: String, reason: String },

    /// Disabling delivery failed
    #[error("failed to disable {sensor}: {reason}")]
    Disable { sensor: String, reason: String },

    /// Any other platform failure
    #[error("platform error: {0}")]
    Platform(String),
}

/// Errors raised while delivering an event to the host
#[derive(Debug, Error)]
pub enum BridgeError {
    /// The current thread could not be attached to the host runtime
    #[error("failed to attach thread to host runtime: {0}")]
    Attach(String),

    /// An argument could not be converted for the host
    #[error("failed to marshal argument: {0}")]
    Marshal(String),

    /// The host entry point reported a failure
    #[error("host callback failed: {0}")]
    Invoke(String),
}

/// Result alias for sensor operations
pub type Result<T, E = ImuError> = std::result::Result<T, E>;
