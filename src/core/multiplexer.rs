// Copyright (c) 2026 bad-antics
// Licensed under the MIT License. See LICENSE file in the project root.

//! Event multiplexer - one platform queue per logical sensor, one readiness loop
//!
//! Every queue is created with a [`ReadySignal`] whose token is the sensor's
//! index in the active set, so a readiness wake-up maps straight back to the
//! slot that owns the queue.

use std::time::Duration;

use chrono::Utc;
use crossbeam::channel::Sender;
use nalgebra::Vector3;
use tracing::{debug, info, trace, warn};

use crate::sensors::{
    LogicalSensor, ReadySignal, SensorEvent, SensorInfo, SensorPlatform, SensorQueue, SensorReading,
    SensorType, SubscriptionToken,
};

struct SensorSlot<Q> {
    name: String,
    sensor_type: SensorType,
    queue: Q,
    last_value: Vector3<f32>,
    enabled: bool,
    event_count: u64,
}

/// Active set of subscribed sensors
pub struct EventMultiplexer<Q: SensorQueue> {
    slots: Vec<SensorSlot<Q>>,
}

impl<Q: SensorQueue> Default for EventMultiplexer<Q> {
    fn default() -> Self {
        Self { slots: Vec::new() }
    }
}

impl<Q: SensorQueue> EventMultiplexer<Q> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Subscribe every sensor against the readiness loop behind `ready`.
    ///
    /// Sensors whose queue can't be created are logged and left out. Returns
    /// the size of the active set.
    pub fn attach<P>(
        &mut self,
        platform: &mut P,
        sensors: Vec<LogicalSensor<P::Handle>>,
        ready: &Sender<SubscriptionToken>,
    ) -> usize
    where
        P: SensorPlatform<Queue = Q>,
    {
        for sensor in sensors {
            let token = SubscriptionToken(self.slots.len());
            let signal = ReadySignal::new(token, ready.clone());

            match platform.subscribe(&sensor.handle, signal) {
                Ok(queue) => {
                    debug!("Subscribed {:?} ({:?}) as {:?}", sensor.name, sensor.sensor_type, token);
                    self.slots.push(SensorSlot {
                        name: sensor.name,
                        sensor_type: sensor.sensor_type,
                        queue,
                        last_value: Vector3::zeros(),
                        enabled: false,
                        event_count: 0,
                    });
                }
                Err(e) => warn!("Skipping {:?}: {}", sensor.name, e),
            }
        }

        self.slots.len()
    }

    /// Turn on delivery at `period` for every active sensor.
    ///
    /// A sensor that fails stays off; the others are still enabled. Returns
    /// how many sensors are delivering.
    pub fn enable(&mut self, period: Duration) -> usize {
        for slot in &mut self.slots {
            let result = slot
                .queue
                .enable()
                .and_then(|()| slot.queue.set_event_rate(period));

            match result {
                Ok(()) => slot.enabled = true,
                Err(e) => {
                    warn!("Sensor {:?} will not deliver: {}", slot.name, e);
                    slot.enabled = false;
                }
            }
        }

        let enabled = self.slots.iter().filter(|s| s.enabled).count();
        info!("Enabled {}/{} sensors at {:?}", enabled, self.slots.len(), period);
        enabled
    }

    /// Turn off delivery everywhere. Never fails.
    pub fn disable(&mut self) {
        for slot in &mut self.slots {
            if let Err(e) = slot.queue.disable() {
                warn!("Failed to disable {:?}: {}", slot.name, e);
            }
            slot.enabled = false;
        }
    }

    /// Disable and destroy every subscription
    pub fn detach_all(&mut self) {
        self.disable();
        let count = self.slots.len();
        self.slots.clear();
        if count > 0 {
            debug!("Destroyed {} subscriptions", count);
        }
    }

    /// Empty the queue behind `token`, updating its last value.
    ///
    /// Returns the events to hand to the callback, in queue order. Events of a
    /// type the slot wasn't created for are dropped.
    pub fn drain(&mut self, token: SubscriptionToken) -> Vec<SensorEvent> {
        let Some(slot) = self.slots.get_mut(token.0) else {
            trace!("Readiness for unknown {:?}", token);
            return Vec::new();
        };

        let mut events = Vec::new();
        while let Some(raw) = slot.queue.next_event() {
            let Some(values) = raw.axes(slot.sensor_type) else {
                debug!("Ignoring type {} event on {:?}", raw.type_code, slot.name);
                continue;
            };

            slot.last_value = values;
            slot.event_count += 1;
            events.push(SensorEvent {
                name: slot.name.clone(),
                sensor_type: slot.sensor_type,
                values,
                timestamp_ns: raw.timestamp_ns,
                received_at: Utc::now(),
            });
        }

        events
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    pub fn info(&self, index: usize) -> Option<SensorInfo> {
        self.slots.get(index).map(|s| SensorInfo {
            name: s.name.clone(),
            sensor_type: Some(s.sensor_type),
        })
    }

    pub fn last_value(&self, index: usize) -> Option<Vector3<f32>> {
        self.slots.get(index).map(|s| s.last_value)
    }

    pub fn readings(&self) -> Vec<SensorReading> {
        self.slots
            .iter()
            .map(|s| SensorReading {
                name: s.name.clone(),
                sensor_type: s.sensor_type,
                unit: s.sensor_type.unit().to_string(),
                values: s.last_value,
                event_count: s.event_count,
                enabled: s.enabled,
            })
            .collect()
    }
}
