//! Sensor module - platform seam, catalog and simulation

mod catalog;
mod simulator;
mod traits;

pub use catalog::{discover, split_wake_suffix, LogicalSensor};
pub use simulator::{default_profile, SimHandle, SimulatedFeed, SimulatedPlatform, SimulatedQueue};
pub use traits::{
    PlatformEvent, RawSensorDescriptor, ReadySignal, SensorEvent, SensorInfo, SensorPlatform, SensorQueue,
    SensorReading, SensorType, SubscriptionToken,
};
