// Copyright (c) 2026 bad-antics
// Licensed under the MIT License. See LICENSE file in the project root.

//! Callback bridge - delivers sensor events to the registered host listener

mod runtime;
pub mod ffi;

pub use runtime::{Attachment, CallbackHandle, ExecutionScope, HostRuntime};

use std::thread::{self, ThreadId};

use parking_lot::Mutex;
use tracing::{debug, warn};

use crate::error::BridgeError;
use crate::sensors::SensorEvent;

/// Anything that can receive dispatched sensor events
pub trait EventSink: Send + Sync {
    fn deliver(&self, event: &SensorEvent) -> Result<(), BridgeError>;
}

impl<F> EventSink for F
where
    F: Fn(&SensorEvent) + Send + Sync,
{
    fn deliver(&self, event: &SensorEvent) -> Result<(), BridgeError> {
        self(event);
        Ok(())
    }
}

/// Holder of the single registered listener.
///
/// The slot stays locked while a delivery is in flight, so `release` (and
/// replacement) from another thread waits for it and nothing is delivered to a
/// released listener. A replacement requested by the listener itself, on the
/// delivering thread, takes effect once its `deliver` returns.
#[derive(Default)]
pub struct CallbackBridge {
    slot: Mutex<Option<Box<dyn EventSink>>>,
    reentry: Mutex<Reentry>,
}

/// Replacement requested from inside a delivery
#[derive(Default)]
struct Reentry {
    delivering: Option<ThreadId>,
    pending: Option<Option<Box<dyn EventSink>>>,
}

impl CallbackBridge {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the registered listener; `None` turns delivery off
    pub fn set_callback(&self, sink: Option<Box<dyn EventSink>>) {
        {
            let mut reentry = self.reentry.lock();
            if reentry.delivering == Some(thread::current().id()) {
                debug!("Event callback replaced from inside delivery, deferring");
                reentry.pending = Some(sink);
                return;
            }
        }

        let mut slot = self.slot.lock();
        if slot.take().is_some() {
            debug!("Released previous event callback");
        }
        *slot = sink;
    }

    pub fn is_registered(&self) -> bool {
        {
            let reentry = self.reentry.lock();
            if reentry.delivering == Some(thread::current().id()) {
                return reentry.pending.as_ref().map_or(true, |p| p.is_some());
            }
        }
        self.slot.lock().is_some()
    }

    /// Deliver to the current listener, if any. Failures are logged and
    /// dropped; the caller keeps processing.
    pub fn invoke(&self, event: &SensorEvent) -> bool {
        if self.reentry.lock().delivering == Some(thread::current().id()) {
            warn!("Nested delivery of {:?} skipped", event.name);
            return false;
        }

        let mut slot = self.slot.lock();
        let Some(sink) = slot.as_ref() else {
            return false;
        };

        self.reentry.lock().delivering = Some(thread::current().id());
        let result = sink.deliver(event);
        let pending = {
            let mut reentry = self.reentry.lock();
            reentry.delivering = None;
            reentry.pending.take()
        };

        if let Some(replacement) = pending {
            // previous listener is dropped (and released) here, slot still held
            drop(slot.take());
            debug!("Released previous event callback");
            *slot = replacement;
        }

        match result {
            Ok(()) => true,
            Err(e) => {
                warn!("Dropping event from {:?}: {}", event.name, e);
                false
            }
        }
    }

    /// Drop the registered listener
    pub fn release(&self) {
        self.set_callback(None);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sensors::SensorType;
    use chrono::Utc;
    use crossbeam::channel;
    use nalgebra::Vector3;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::time::Duration;

    fn event() -> SensorEvent {
        SensorEvent {
            name: "Accel".to_string(),
            sensor_type: SensorType::Accelerometer,
            values: Vector3::new(0.0, 0.0, 9.8),
            timestamp_ns: 0,
            received_at: Utc::now(),
        }
    }

    struct Tracked {
        drops: Arc<AtomicUsize>,
        calls: Arc<AtomicUsize>,
    }

    impl EventSink for Tracked {
        fn deliver(&self, _event: &SensorEvent) -> Result<(), BridgeError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    impl Drop for Tracked {
        fn drop(&mut self) {
            self.drops.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[test]
    fn test_no_callback_is_silent() {
        let bridge = CallbackBridge::new();
        assert!(!bridge.invoke(&event()));
    }

    #[test]
    fn test_replace_releases_previous() {
        let bridge = CallbackBridge::new();
        let drops = Arc::new(AtomicUsize::new(0));
        let calls = Arc::new(AtomicUsize::new(0));

        bridge.set_callback(Some(Box::new(Tracked {
            drops: Arc::clone(&drops),
            calls: Arc::clone(&calls),
        })));
        assert!(bridge.invoke(&event()));

        bridge.set_callback(Some(Box::new(|_: &SensorEvent| {})));
        assert_eq!(drops.load(Ordering::SeqCst), 1);
        assert!(bridge.invoke(&event()));
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        bridge.release();
        bridge.release();
        assert!(!bridge.is_registered());
        assert!(!bridge.invoke(&event()));
    }

    #[test]
    fn test_failed_delivery_is_not_fatal() {
        struct Failing;
        impl EventSink for Failing {
            fn deliver(&self, _event: &SensorEvent) -> Result<(), BridgeError> {
                Err(BridgeError::Invoke("listener threw".into()))
            }
        }

        let bridge = CallbackBridge::new();
        bridge.set_callback(Some(Box::new(Failing)));
        assert!(!bridge.invoke(&event()));
        assert!(bridge.is_registered());
    }

    #[test]
    fn test_release_waits_for_in_flight_delivery() {
        let bridge = Arc::new(CallbackBridge::new());
        let (entered_tx, entered_rx) = channel::bounded::<()>(1);
        let (resume_tx, resume_rx) = channel::bounded::<()>(1);
        let calls = Arc::new(AtomicUsize::new(0));

        let counter = Arc::clone(&calls);
        bridge.set_callback(Some(Box::new(move |_: &SensorEvent| {
            counter.fetch_add(1, Ordering::SeqCst);
            let _ = entered_tx.send(());
            let _ = resume_rx.recv();
        })));

        let dispatcher = {
            let bridge = Arc::clone(&bridge);
            std::thread::spawn(move || bridge.invoke(&event()))
        };
        entered_rx.recv_timeout(Duration::from_secs(2)).unwrap();

        let (released_tx, released_rx) = channel::bounded::<()>(1);
        let releaser = {
            let bridge = Arc::clone(&bridge);
            std::thread::spawn(move || {
                bridge.release();
                let _ = released_tx.send(());
            })
        };

        assert!(released_rx.recv_timeout(Duration::from_millis(100)).is_err());
        resume_tx.send(()).unwrap();
        released_rx.recv_timeout(Duration::from_secs(2)).unwrap();

        assert!(dispatcher.join().unwrap());
        releaser.join().unwrap();

        assert!(!bridge.invoke(&event()));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_listener_can_release_itself() {
        let bridge = Arc::new(CallbackBridge::new());
        let drops = Arc::new(AtomicUsize::new(0));
        let calls = Arc::new(AtomicUsize::new(0));

        struct SelfReleasing {
            bridge: Arc<CallbackBridge>,
            inner: Tracked,
        }

        impl EventSink for SelfReleasing {
            fn deliver(&self, event: &SensorEvent) -> Result<(), BridgeError> {
                self.inner.deliver(event)?;
                self.bridge.release();
                assert!(!self.bridge.is_registered());
                Ok(())
            }
        }

        bridge.set_callback(Some(Box::new(SelfReleasing {
            bridge: Arc::clone(&bridge),
            inner: Tracked {
                drops: Arc::clone(&drops),
                calls: Arc::clone(&calls),
            },
        })));

        let worker = Arc::clone(&bridge);
        std::thread::spawn(move || worker.invoke(&event()))
            .join()
            .unwrap();

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(drops.load(Ordering::SeqCst), 1);
        assert!(!bridge.is_registered());
        assert!(!bridge.invoke(&event()));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
