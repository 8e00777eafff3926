// Copyright (c) 2026 bad-antics
// Licensed under the MIT License. See LICENSE file in the project root.

//! Sensor manager - lifecycle facade over the catalog, multiplexer and bridge
//!
//! One `SensorManager` is the whole context of a bridge instance; nothing is
//! kept in globals. The lifecycle is
//!
//! ```text
//! Uninitialized ── initialize ──▶ Initialized ── start ──▶ Listening
//!       ▲                                                    │  ▲
//!       └──────────── cleanup (from any state) ───── stop ▼  │ start
//!                                                        Stopped
//! ```

use std::sync::Arc;
use std::time::Duration;

use nalgebra::Vector3;
use parking_lot::Mutex;
use tracing::{debug, info, warn};

use super::event_loop::{DispatchFn, ReadinessLoop};
use super::multiplexer::EventMultiplexer;
use super::SAMPLING_PERIOD;
use crate::bridge::{CallbackBridge, EventSink};
use crate::config::EventLoopConfig;
use crate::error::{ImuError, Result};
use crate::sensors::{discover, SensorInfo, SensorPlatform, SensorQueue, SensorReading, SubscriptionToken};

/// Manager lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ManagerState {
    Uninitialized,
    Initialized,
    Listening,
    Stopped,
}

/// State reachable from the readiness loop
struct Shared<Q: SensorQueue> {
    mux: Mutex<EventMultiplexer<Q>>,
    bridge: CallbackBridge,
}

impl<Q: SensorQueue> Shared<Q> {
    fn dispatch(&self, token: SubscriptionToken) -> usize {
        // listeners may query the manager, so the multiplexer is unlocked here
        let events = self.mux.lock().drain(token);
        for event in &events {
            self.bridge.invoke(event);
        }
        events.len()
    }
}

/// Motion sensor manager
pub struct SensorManager<P: SensorPlatform> {
    platform: P,
    config: EventLoopConfig,
    state: ManagerState,
    shared: Arc<Shared<P::Queue>>,
    event_loop: Option<ReadinessLoop>,
}

impl<P: SensorPlatform> SensorManager<P> {
    pub fn new(platform: P, config: EventLoopConfig) -> Self {
        Self {
            platform,
            config,
            state: ManagerState::Uninitialized,
            shared: Arc::new(Shared {
                mux: Mutex::new(EventMultiplexer::new()),
                bridge: CallbackBridge::new(),
            }),
            event_loop: None,
        }
    }

    /// Discover sensors, start the readiness loop and subscribe.
    ///
    /// A no-op once initialized. On failure nothing is left behind and the
    /// manager stays uninitialized.
    pub fn initialize(&mut self) -> Result<()> {
        if self.state != ManagerState::Uninitialized {
            debug!("Sensor manager already initialized");
            return Ok(());
        }

        let raw = self.platform.enumerate()?;
        let sensors = discover(&raw);
        info!("Discovered {} motion sensors among {} platform sensors", sensors.len(), raw.len());
        if sensors.is_empty() {
            return Err(ImuError::NoSensors);
        }

        let shared = Arc::clone(&self.shared);
        let dispatch: Arc<DispatchFn> = Arc::new(move |token| shared.dispatch(token));
        let event_loop = ReadinessLoop::start(&self.config, dispatch)?;

        let attached = self
            .shared
            .mux
            .lock()
            .attach(&mut self.platform, sensors, event_loop.sender());
        if attached == 0 {
            event_loop.shutdown();
            return Err(ImuError::NoSensors);
        }

        self.event_loop = Some(event_loop);
        self.state = ManagerState::Initialized;
        info!("Sensor manager initialized with {} sensors", attached);
        Ok(())
    }

    /// Turn on delivery at the fixed 5 Hz rate
    pub fn start_listening(&mut self) {
        match self.state {
            ManagerState::Initialized | ManagerState::Stopped => {
                self.shared.mux.lock().enable(SAMPLING_PERIOD);
                self.state = ManagerState::Listening;
                info!("Started listening");
            }
            ManagerState::Listening => debug!("Already listening"),
            ManagerState::Uninitialized => warn!("start_listening before initialize ignored"),
        }
    }

    pub fn stop_listening(&mut self) {
        if self.state != ManagerState::Listening {
            return;
        }
        self.shared.mux.lock().disable();
        self.state = ManagerState::Stopped;
        info!("Stopped listening");
    }

    /// Register the listener for dispatched events, replacing (and
    /// releasing) any previous one. `None` turns delivery off.
    pub fn set_event_callback(&self, sink: Option<Box<dyn EventSink>>) {
        self.shared.bridge.set_callback(sink);
    }

    /// Release every subscription and the listener. Safe in any state and
    /// safe to repeat; the manager can be initialized again afterwards.
    pub fn cleanup(&mut self) {
        self.shared.mux.lock().detach_all();
        self.shared.bridge.release();
        if let Some(event_loop) = self.event_loop.take() {
            event_loop.shutdown();
        }

        if self.state != ManagerState::Uninitialized {
            info!("Sensor manager cleaned up");
        }
        self.state = ManagerState::Uninitialized;
    }

    /// Dispatch ready events on the calling thread (manual loop mode).
    ///
    /// Waits at most `timeout`; returns the number of events dispatched.
    pub fn poll(&self, timeout: Duration) -> usize {
        self.event_loop
            .as_ref()
            .map(|event_loop| event_loop.poll(timeout))
            .unwrap_or(0)
    }

    /// [`poll`](Self::poll) with the configured timeout
    pub fn poll_default(&self) -> usize {
        self.poll(self.config.poll_timeout())
    }

    pub fn state(&self) -> ManagerState {
        self.state
    }

    pub fn sensor_count(&self) -> usize {
        self.shared.mux.lock().len()
    }

    /// Name and type of sensor `index`, empty when out of range
    pub fn sensor_info(&self, index: usize) -> SensorInfo {
        self.shared.mux.lock().info(index).unwrap_or_default()
    }

    /// Last value of sensor `index`, zero when out of range
    pub fn sensor_data(&self, index: usize) -> Vector3<f32> {
        self.shared
            .mux
            .lock()
            .last_value(index)
            .unwrap_or_else(Vector3::zeros)
    }

    pub fn snapshot(&self) -> Vec<SensorReading> {
        self.shared.mux.lock().readings()
    }

    pub fn callback_registered(&self) -> bool {
        self.shared.bridge.is_registered()
    }
}

impl<P: SensorPlatform> Drop for SensorManager<P> {
    fn drop(&mut self) {
        self.cleanup();
    }
}
