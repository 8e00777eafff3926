// Copyright (c) 2026 bad-antics
// Licensed under the MIT License. See LICENSE file in the project root.

//! Sensor catalog - collapses the platform's raw sensor list into logical sensors
//!
//! Phones commonly expose each physical motion sensor twice: once as a
//! wake-up sensor and once as a non-wake-up sensor, with names that differ only
//! in a `" Wakeup"` / `" Non-wakeup"` suffix. The catalog keeps one entry per
//! `(type, base name)` and prefers the non-wake variant.
//!
//! When several candidates compete for the same slot (two non-wake variants, or
//! only wake variants) the first one in enumeration order wins. That rule is
//! arbitrary and depends on the platform's enumeration order; nothing else
//! should be read into it.

use std::collections::HashMap;

use tracing::debug;

use super::{RawSensorDescriptor, SensorType};

const NON_WAKE_SUFFIX: &str = " Non-wakeup";
const WAKE_SUFFIX: &str = " Wakeup";

/// A deduplicated sensor the bridge tracks
#[derive(Debug, Clone, PartialEq)]
pub struct LogicalSensor<H> {
    pub sensor_type: SensorType,
    /// Display name of the chosen descriptor, suffix included
    pub name: String,
    base_name: String,
    pub handle: H,
}

impl<H> LogicalSensor<H> {
    /// Grouping key; not part of the query interface
    pub(crate) fn base_name(&self) -> &str {
        &self.base_name
    }
}

/// Split a display name into `(base name, is non-wake)`.
///
/// Matching is exact and case-sensitive. A name with neither suffix is its own
/// base name and counts as a wake candidate.
pub fn split_wake_suffix(name: &str) -> (&str, bool) {
    if let Some(base) = name.strip_suffix(NON_WAKE_SUFFIX) {
        (base, true)
    } else if let Some(base) = name.strip_suffix(WAKE_SUFFIX) {
        (base, false)
    } else {
        (name, false)
    }
}

/// Build the logical sensor list from the platform's raw list.
///
/// Groups are emitted in order of first appearance. Returns an empty list when
/// nothing of interest is present; deciding whether that is fatal is up to the
/// caller.
pub fn discover<H: Clone>(raw: &[RawSensorDescriptor<H>]) -> Vec<LogicalSensor<H>> {
    // (chosen descriptor, chosen is non-wake)
    let mut groups: Vec<(SensorType, &str, &RawSensorDescriptor<H>, bool)> = Vec::new();
    let mut index: HashMap<(SensorType, &str), usize> = HashMap::new();

    for descriptor in raw {
        let Some(sensor_type) = SensorType::from_code(descriptor.type_code) else {
            debug!("Skipping sensor {:?} (type {})", descriptor.name, descriptor.type_code);
            continue;
        };
        let (base_name, non_wake) = split_wake_suffix(&descriptor.name);

        match index.get(&(sensor_type, base_name)) {
            Some(&slot) => {
                let group = &mut groups[slot];
                if non_wake && !group.3 {
                    debug!("Preferring {:?} over {:?}", descriptor.name, group.2.name);
                    group.2 = descriptor;
                    group.3 = true;
                }
            }
            None => {
                index.insert((sensor_type, base_name), groups.len());
                groups.push((sensor_type, base_name, descriptor, non_wake));
            }
        }
    }

    groups
        .into_iter()
        .map(|(sensor_type, base_name, descriptor, _)| LogicalSensor {
            sensor_type,
            name: descriptor.name.clone(),
            base_name: base_name.to_string(),
            handle: descriptor.handle.clone(),
        })
        .collect()
}
