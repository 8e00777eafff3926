// Copyright (c) 2026 bad-antics
// Licensed under the MIT License. See LICENSE file in the project root.

//! Simulated sensor platform for demo/testing
//!
//! Mimics a typical handset: every motion sensor is listed twice (wake and
//! non-wake variants) next to a handful of sensors the bridge ignores. Queues
//! either generate samples on their own thread at the requested period, or
//! stay silent until a test pushes events through a [`SimulatedFeed`].

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use crossbeam::channel::{self, RecvTimeoutError, Sender};
use parking_lot::Mutex;
use rand::prelude::*;
use rand_distr::Normal;
use tracing::{debug, trace, warn};

use super::{PlatformEvent, RawSensorDescriptor, ReadySignal, SensorPlatform, SensorQueue, SensorType};
use crate::config::SimulatorConfig;
use crate::error::{ImuError, Result};

/// Index into the simulated device profile
pub type SimHandle = usize;

/// Standard gravity, m/s²
const GRAVITY: f32 = 9.806_65;

/// Local geomagnetic field in µT (roughly mid-latitude, device lying flat)
const EARTH_FIELD: [f32; 3] = [22.0, 5.0, -42.0];

/// Sensor list of the simulated handset
pub fn default_profile() -> Vec<(i32, &'static str)> {
    vec![
        (1, "LSM6DSO Accelerometer Non-wakeup"),
        (1, "LSM6DSO Accelerometer Wakeup"),
        (4, "LSM6DSO Gyroscope Non-wakeup"),
        (4, "LSM6DSO Gyroscope Wakeup"),
        (2, "AK09918 Magnetometer Non-wakeup"),
        (2, "AK09918 Magnetometer Wakeup"),
        (5, "TCS3701 Light Non-wakeup"),
        (6, "BMP380 Pressure Non-wakeup"),
        (10, "Linear Acceleration"),
        (14, "AK09918 Magnetometer-Uncalibrated Non-wakeup"),
    ]
}

#[derive(Debug, Default, Clone)]
struct FailurePlan {
    service_unavailable: bool,
    subscribe: HashSet<String>,
    enable: HashSet<String>,
    disable: HashSet<String>,
}

#[derive(Debug)]
struct QueueState {
    name: String,
    type_code: i32,
    events: VecDeque<PlatformEvent>,
    enabled: bool,
    enable_calls: usize,
    period: Duration,
}

struct Registered {
    state: Arc<Mutex<QueueState>>,
    signal: ReadySignal,
}

type Registry = Arc<Mutex<HashMap<SimHandle, Registered>>>;

/// Simulated sensor service
pub struct SimulatedPlatform {
    descriptors: Vec<RawSensorDescriptor<SimHandle>>,
    threaded: bool,
    noise_std_dev: f32,
    vibration_probability: f64,
    seed: Option<u64>,
    failures: FailurePlan,
    registry: Registry,
    disables: Arc<AtomicUsize>,
    clock: Instant,
}

impl SimulatedPlatform {
    pub fn new(config: &SimulatorConfig) -> Self {
        Self::with_descriptors(&default_profile()).configure(config)
    }

    /// Platform exposing exactly `sensors`, as `(type code, name)` pairs
    pub fn with_descriptors(sensors: &[(i32, &str)]) -> Self {
        let descriptors = sensors
            .iter()
            .enumerate()
            .map(|(handle, (code, name))| RawSensorDescriptor::new(*code, *name, handle))
            .collect();
        let defaults = SimulatorConfig::default();

        Self {
            descriptors,
            threaded: true,
            noise_std_dev: defaults.noise_std_dev,
            vibration_probability: defaults.vibration_probability,
            seed: defaults.seed,
            failures: FailurePlan::default(),
            registry: Arc::new(Mutex::new(HashMap::new())),
            disables: Arc::new(AtomicUsize::new(0)),
            clock: Instant::now(),
        }
    }

    pub fn configure(mut self, config: &SimulatorConfig) -> Self {
        self.noise_std_dev = config.noise_std_dev;
        self.vibration_probability = config.vibration_probability;
        self.seed = config.seed;
        self
    }

    /// Queues never generate on their own; events come from [`SimulatedFeed`]
    pub fn manual(mut self) -> Self {
        self.threaded = false;
        self
    }

    /// Enumeration fails as if the sensor service were missing
    pub fn unavailable(mut self) -> Self {
        self.failures.service_unavailable = true;
        self
    }

    /// Queue creation fails for the named sensor
    pub fn fail_subscribe(mut self, name: &str) -> Self {
        self.failures.subscribe.insert(name.to_string());
        self
    }

    /// Enabling fails for the named sensor
    pub fn fail_enable(mut self, name: &str) -> Self {
        self.failures.enable.insert(name.to_string());
        self
    }

    /// Disabling fails for the named sensor
    pub fn fail_disable(mut self, name: &str) -> Self {
        self.failures.disable.insert(name.to_string());
        self
    }

    /// Handle for pushing events into (and inspecting) live queues
    pub fn feed(&self) -> SimulatedFeed {
        SimulatedFeed {
            registry: Arc::clone(&self.registry),
            disables: Arc::clone(&self.disables),
            clock: self.clock,
        }
    }
}

impl SensorPlatform for SimulatedPlatform {
    type Handle = SimHandle;
    type Queue = SimulatedQueue;

    fn enumerate(&mut self) -> Result<Vec<RawSensorDescriptor<SimHandle>>> {
        if self.failures.service_unavailable {
            return Err(ImuError::SensorServiceUnavailable("simulated outage".to_string()));
        }
        Ok(self.descriptors.clone())
    }

    fn subscribe(&mut self, handle: &SimHandle, signal: ReadySignal) -> Result<SimulatedQueue> {
        let descriptor = self
            .descriptors
            .get(*handle)
            .ok_or_else(|| ImuError::Platform(format!("unknown sensor handle {}", handle)))?;

        if self.failures.subscribe.contains(&descriptor.name) {
            return Err(ImuError::Subscribe {
                sensor: descriptor.name.clone(),
                reason: "simulated failure".to_string(),
            });
        }

        let state = Arc::new(Mutex::new(QueueState {
            name: descriptor.name.clone(),
            type_code: descriptor.type_code,
            events: VecDeque::new(),
            enabled: false,
            enable_calls: 0,
            period: Duration::from_millis(200),
        }));

        self.registry.lock().insert(
            *handle,
            Registered {
                state: Arc::clone(&state),
                signal: signal.clone(),
            },
        );
        debug!("Created queue for {:?} (token {:?})", descriptor.name, signal.token());

        let seed = self.seed.map(|s| s.wrapping_add(*handle as u64));
        Ok(SimulatedQueue {
            handle: *handle,
            state,
            signal,
            registry: Arc::clone(&self.registry),
            generator: None,
            threaded: self.threaded,
            fail_enable: self.failures.enable.contains(&descriptor.name),
            fail_disable: self.failures.disable.contains(&descriptor.name),
            disables: Arc::clone(&self.disables),
            model: SampleModel::new(self.noise_std_dev, self.vibration_probability, seed),
            clock: self.clock,
        })
    }
}

struct Generator {
    stop: Sender<()>,
    join: JoinHandle<()>,
}

/// Event queue of one simulated sensor
pub struct SimulatedQueue {
    handle: SimHandle,
    state: Arc<Mutex<QueueState>>,
    signal: ReadySignal,
    registry: Registry,
    generator: Option<Generator>,
    threaded: bool,
    fail_enable: bool,
    fail_disable: bool,
    disables: Arc<AtomicUsize>,
    model: SampleModel,
    clock: Instant,
}

impl SimulatedQueue {
    fn spawn_generator(&mut self) -> Result<Generator> {
        let (stop, stop_rx) = channel::bounded::<()>(1);
        let state = Arc::clone(&self.state);
        let signal = self.signal.clone();
        let mut model = self.model.clone();
        let clock = self.clock;
        let name = self.state.lock().name.clone();

        let join = thread::Builder::new()
            .name(format!("sim-{}", self.handle))
            .spawn(move || loop {
                let period = state.lock().period;
                match stop_rx.recv_timeout(period) {
                    Err(RecvTimeoutError::Timeout) => {}
                    _ => break,
                }

                {
                    let mut state = state.lock();
                    if !state.enabled {
                        continue;
                    }
                    let event = PlatformEvent {
                        type_code: state.type_code,
                        timestamp_ns: clock.elapsed().as_nanos() as i64,
                        values: model.sample(state.type_code),
                    };
                    state.events.push_back(event);
                }

                if !signal.notify() {
                    trace!("Readiness loop gone, stopping generator for {:?}", name);
                    break;
                }
            })
            .map_err(|e| ImuError::Platform(e.to_string()))?;

        Ok(Generator { stop, join })
    }

    fn stop_generator(&mut self) {
        if let Some(generator) = self.generator.take() {
            let _ = generator.stop.send(());
            if generator.join.join().is_err() {
                warn!("Generator thread for sensor {} panicked", self.handle);
            }
        }
    }
}

impl SensorQueue for SimulatedQueue {
    fn enable(&mut self) -> Result<()> {
        let name = {
            let mut state = self.state.lock();
            if self.fail_enable {
                return Err(ImuError::Enable {
                    sensor: state.name.clone(),
                    reason: "simulated failure".to_string(),
                });
            }
            state.enabled = true;
            state.enable_calls += 1;
            state.name.clone()
        };

        if self.threaded && self.generator.is_none() {
            self.generator = Some(self.spawn_generator()?);
        }
        debug!("Enabled {:?}", name);
        Ok(())
    }

    fn set_event_rate(&mut self, period: Duration) -> Result<()> {
        let mut state = self.state.lock();
        if period.is_zero() {
            return Err(ImuError::Enable {
                sensor: state.name.clone(),
                reason: "zero sampling period".to_string(),
            });
        }
        state.period = period;
        Ok(())
    }

    fn disable(&mut self) -> Result<()> {
        self.disables.fetch_add(1, Ordering::SeqCst);
        if self.fail_disable {
            return Err(ImuError::Disable {
                sensor: self.state.lock().name.clone(),
                reason: "simulated failure".to_string(),
            });
        }
        self.state.lock().enabled = false;
        self.stop_generator();
        Ok(())
    }

    fn next_event(&mut self) -> Option<PlatformEvent> {
        self.state.lock().events.pop_front()
    }
}

impl Drop for SimulatedQueue {
    fn drop(&mut self) {
        self.state.lock().enabled = false;
        self.stop_generator();
        self.registry.lock().remove(&self.handle);
    }
}

/// Test/demo access to the live simulated queues
#[derive(Clone)]
pub struct SimulatedFeed {
    registry: Registry,
    disables: Arc<AtomicUsize>,
    clock: Instant,
}

impl SimulatedFeed {
    /// Queue a sample on the named sensor, typed as that sensor.
    ///
    /// Returns false if no live queue has that name or delivery is disabled.
    pub fn emit(&self, name: &str, values: [f32; 3]) -> bool {
        self.push(name, None, values)
    }

    /// Queue a sample carrying an arbitrary type code
    pub fn emit_typed(&self, name: &str, type_code: i32, values: [f32; 3]) -> bool {
        self.push(name, Some(type_code), values)
    }

    fn push(&self, name: &str, type_code: Option<i32>, values: [f32; 3]) -> bool {
        let registry = self.registry.lock();
        let Some(entry) = registry.values().find(|r| r.state.lock().name == name) else {
            return false;
        };

        {
            let mut state = entry.state.lock();
            if !state.enabled {
                return false;
            }
            let event = PlatformEvent {
                type_code: type_code.unwrap_or(state.type_code),
                timestamp_ns: self.clock.elapsed().as_nanos() as i64,
                values,
            };
            state.events.push_back(event);
        }
        entry.signal.notify()
    }

    /// Total `disable` calls made on this platform's queues
    pub fn disable_calls(&self) -> usize {
        self.disables.load(Ordering::SeqCst)
    }

    /// Number of live queues
    pub fn subscriptions(&self) -> usize {
        self.registry.lock().len()
    }

    pub fn is_enabled(&self, name: &str) -> bool {
        self.with_state(name, |s| s.enabled).unwrap_or(false)
    }

    /// How many times delivery was turned on for the named sensor
    pub fn enable_calls(&self, name: &str) -> usize {
        self.with_state(name, |s| s.enable_calls).unwrap_or(0)
    }

    /// Requested sampling period of the named sensor
    pub fn period(&self, name: &str) -> Option<Duration> {
        self.with_state(name, |s| s.period)
    }

    fn with_state<T>(&self, name: &str, f: impl Fn(&QueueState) -> T) -> Option<T> {
        self.registry.lock().values().find_map(|r| {
            let state = r.state.lock();
            (state.name == name).then(|| f(&state))
        })
    }
}

/// Raw sample generator: resting device plus sensor noise and the odd bump
#[derive(Clone)]
struct SampleModel {
    rng: StdRng,
    noise: Option<Normal<f32>>,
    vibration_probability: f64,
}

impl SampleModel {
    fn new(noise_std_dev: f32, vibration_probability: f64, seed: Option<u64>) -> Self {
        let rng = match seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        let noise = Normal::new(0.0, noise_std_dev).ok();
        if noise.is_none() {
            warn!("Invalid simulator noise level {}, generating clean samples", noise_std_dev);
        }

        Self {
            rng,
            noise,
            vibration_probability: vibration_probability.clamp(0.0, 1.0),
        }
    }

    fn sample(&mut self, type_code: i32) -> [f32; 3] {
        let mut values = match SensorType::from_code(type_code) {
            Some(SensorType::Accelerometer) => [0.0, 0.0, GRAVITY],
            Some(SensorType::MagneticField) => EARTH_FIELD,
            Some(SensorType::Gyroscope) | None => [0.0; 3],
        };

        if let Some(noise) = self.noise {
            for v in values.iter_mut() {
                *v += self.rng.sample(noise);
            }
        }

        // Table knock
        if type_code != SensorType::MagneticField.code() && self.rng.gen_bool(self.vibration_probability) {
            let axis = self.rng.gen_range(0..3usize);
            values[axis] += self.rng.gen_range(-0.5f32..0.5);
        }

        values
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sensors::SubscriptionToken;

    fn signal() -> (ReadySignal, channel::Receiver<SubscriptionToken>) {
        let (tx, rx) = channel::unbounded();
        (ReadySignal::new(SubscriptionToken(0), tx), rx)
    }

    #[test]
    fn test_default_profile_enumerates() {
        let mut platform = SimulatedPlatform::new(&SimulatorConfig::default());
        let sensors = platform.enumerate().unwrap();
        assert_eq!(sensors.len(), default_profile().len());
        assert_eq!(sensors[0].handle, 0);
    }

    #[test]
    fn test_unavailable_service() {
        let mut platform = SimulatedPlatform::new(&SimulatorConfig::default()).unavailable();
        assert!(matches!(platform.enumerate(), Err(ImuError::SensorServiceUnavailable(_))));
    }

    #[test]
    fn test_feed_requires_enabled_queue() {
        let mut platform = SimulatedPlatform::with_descriptors(&[(1, "Accel")]).manual();
        let feed = platform.feed();
        let (signal, rx) = signal();

        let mut queue = platform.subscribe(&0, signal).unwrap();
        assert_eq!(feed.subscriptions(), 1);
        assert!(!feed.emit("Accel", [1.0, 2.0, 3.0]));

        queue.enable().unwrap();
        assert!(feed.emit("Accel", [1.0, 2.0, 3.0]));
        assert_eq!(rx.try_recv().unwrap(), SubscriptionToken(0));

        let event = queue.next_event().unwrap();
        assert_eq!(event.type_code, 1);
        assert_eq!(event.values, [1.0, 2.0, 3.0]);
        assert!(queue.next_event().is_none());

        drop(queue);
        assert_eq!(feed.subscriptions(), 0);
    }

    #[test]
    fn test_threaded_generation() {
        let config = SimulatorConfig {
            seed: Some(7),
            ..SimulatorConfig::default()
        };
        let mut platform = SimulatedPlatform::with_descriptors(&[(1, "Accel")]).configure(&config);
        let (signal, rx) = signal();

        let mut queue = platform.subscribe(&0, signal).unwrap();
        queue.enable().unwrap();
        queue.set_event_rate(Duration::from_millis(5)).unwrap();

        assert!(rx.recv_timeout(Duration::from_secs(2)).is_ok());
        let event = queue.next_event().unwrap();
        assert!((event.values[2] - GRAVITY).abs() < 1.5);

        queue.disable().unwrap();
        while queue.next_event().is_some() {}
        std::thread::sleep(Duration::from_millis(30));
        assert!(queue.next_event().is_none());
    }

    #[test]
    fn test_injected_failures() {
        let mut platform = SimulatedPlatform::with_descriptors(&[(1, "A"), (4, "G")])
            .manual()
            .fail_subscribe("A")
            .fail_enable("G");
        let (signal, _rx) = signal();

        assert!(matches!(platform.subscribe(&0, signal.clone()), Err(ImuError::Subscribe { .. })));
        let mut queue = platform.subscribe(&1, signal).unwrap();
        assert!(matches!(queue.enable(), Err(ImuError::Enable { .. })));
    }
}
