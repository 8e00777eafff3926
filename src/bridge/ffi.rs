// Copyright (c) 2026 bad-antics
// Licensed under the MIT License. See LICENSE file in the project root.

//! C ABI for host integration
//!
//! Hosts load the library, create a bridge with `imu_bridge_create()` and
//! register a listener through a table of host functions
//! ([`ImuHostCallbacks`]). The table tells the bridge how to attach the
//! readiness-loop thread to the host runtime, how to call the listener and how
//! to drop the host's reference to it.
//!
//! Memory Safety:
//! - The bridge must be freed with `imu_bridge_destroy()`
//! - NULL checks are performed on all pointer inputs
//!
//! Thread Safety:
//! - Control calls on one bridge must come from one thread at a time.
//! - `on_sensor_event` is called from the readiness-loop thread. It may call
//!   `imu_bridge_set_event_callback()` on its own bridge; the change applies
//!   once it returns.
//!
//! The bridge handed out here runs on the simulated sensor platform, so the
//! values it reports are synthetic. Device backends implement
//! [`crate::sensors::SensorPlatform`] and drive [`SensorManager`] directly.

use std::ffi::{CStr, CString};
use std::ptr;
use std::sync::Arc;

use libc::{c_char, c_int, c_void};
use nalgebra::Vector3;
use tracing::{error, warn};
use tracing_subscriber::EnvFilter;

use super::{Attachment, CallbackHandle, ExecutionScope, HostRuntime};
use crate::config::Config;
use crate::core::SensorManager;
use crate::error::BridgeError;
use crate::sensors::{SensorEvent, SimulatedPlatform};

/// Host function table.
///
/// `attach_current_thread` returns 0 if the thread was already attached, 1 if
/// it attached it now and a negative value on failure. A missing attach
/// function means every thread may call the host directly.
/// `on_sensor_event` returns 0 on success.
#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct ImuHostCallbacks {
    /// Host runtime context, passed back on every call
    pub context: *mut c_void,
    pub attach_current_thread: Option<unsafe extern "C" fn(context: *mut c_void) -> c_int>,
    pub detach_current_thread: Option<unsafe extern "C" fn(context: *mut c_void)>,
    /// Returns the listener's event entry point, or NULL
    pub resolve_entry_point:
        Option<unsafe extern "C" fn(context: *mut c_void, listener: *mut c_void) -> *const c_void>,
    pub on_sensor_event: Option<
        unsafe extern "C" fn(
            context: *mut c_void,
            listener: *mut c_void,
            entry_point: *const c_void,
            name: *const c_char,
            sensor_type: c_int,
            x: f32,
            y: f32,
            z: f32,
        ) -> c_int,
    >,
    pub release_listener: Option<unsafe extern "C" fn(context: *mut c_void, listener: *mut c_void)>,
}

/// Host listener reference
#[derive(Debug, Clone, Copy)]
pub struct ListenerPtr(*mut c_void);

/// Resolved host entry point
#[derive(Debug, Clone, Copy)]
pub struct EntryPtr(*const c_void);

// The host owns these pointers and guarantees they are usable from any
// attached thread until released.
unsafe impl Send for ListenerPtr {}
unsafe impl Sync for ListenerPtr {}
unsafe impl Send for EntryPtr {}
unsafe impl Sync for EntryPtr {}

/// [`HostRuntime`] backed by an [`ImuHostCallbacks`] table
pub struct CHostRuntime {
    callbacks: ImuHostCallbacks,
}

unsafe impl Send for CHostRuntime {}
unsafe impl Sync for CHostRuntime {}

impl CHostRuntime {
    pub fn new(callbacks: ImuHostCallbacks) -> Self {
        Self { callbacks }
    }
}

impl HostRuntime for CHostRuntime {
    type Listener = ListenerPtr;
    type EntryPoint = EntryPtr;

    fn resolve_entry_point(&self, listener: &ListenerPtr) -> Option<EntryPtr> {
        if self.callbacks.on_sensor_event.is_none() {
            return None;
        }
        match self.callbacks.resolve_entry_point {
            Some(resolve) => {
                let entry = unsafe { resolve(self.callbacks.context, listener.0) };
                (!entry.is_null()).then_some(EntryPtr(entry))
            }
            None => Some(EntryPtr(ptr::null())),
        }
    }

    fn attach_current_thread(&self) -> Result<Attachment, BridgeError> {
        let Some(attach) = self.callbacks.attach_current_thread else {
            return Ok(Attachment::Existing);
        };
        match unsafe { attach(self.callbacks.context) } {
            0 => Ok(Attachment::Existing),
            1 => Ok(Attachment::Attached),
            code => Err(BridgeError::Attach(format!("host returned {}", code))),
        }
    }

    fn detach_current_thread(&self) {
        if let Some(detach) = self.callbacks.detach_current_thread {
            unsafe { detach(self.callbacks.context) };
        }
    }

    fn call(
        &self,
        _scope: &ExecutionScope<'_, Self>,
        listener: &ListenerPtr,
        entry: EntryPtr,
        event: &SensorEvent,
    ) -> Result<(), BridgeError> {
        let Some(on_event) = self.callbacks.on_sensor_event else {
            return Ok(());
        };
        let name = CString::new(event.name.as_str()).map_err(|e| BridgeError::Marshal(e.to_string()))?;

        let code = unsafe {
            on_event(
                self.callbacks.context,
                listener.0,
                entry.0,
                name.as_ptr(),
                event.sensor_type.code(),
                event.values.x,
                event.values.y,
                event.values.z,
            )
        };
        if code != 0 {
            return Err(BridgeError::Invoke(format!("listener returned {}", code)));
        }
        Ok(())
    }

    fn release(&self, listener: ListenerPtr) {
        if let Some(release) = self.callbacks.release_listener {
            unsafe { release(self.callbacks.context, listener.0) };
        }
    }
}

// ============================================================================
// BRIDGE LIFECYCLE
// ============================================================================

/// Opaque handle to a bridge instance
pub struct ImuBridge {
    manager: SensorManager<SimulatedPlatform>,
}

fn init_logging(level: &str) {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(level))
        .with_target(false)
        .try_init();
}

/// Create a bridge.
///
/// # Safety
/// - `config_path` must be NULL or a valid null-terminated C string.
///
/// # Returns
/// - Pointer to ImuBridge, to be freed with `imu_bridge_destroy()`.
/// - NULL if the configuration file can't be read.
#[no_mangle]
pub unsafe extern "C" fn imu_bridge_create(config_path: *const c_char) -> *mut ImuBridge {
    let config = if config_path.is_null() {
        Config::default()
    } else {
        let path = match CStr::from_ptr(config_path).to_str() {
            Ok(p) => p,
            Err(_) => return ptr::null_mut(),
        };
        match Config::load(std::path::Path::new(path)) {
            Ok(config) => config,
            Err(e) => {
                error!("Failed to load {}: {}", path, e);
                return ptr::null_mut();
            }
        }
    };
    init_logging(&config.log_level);

    let platform = SimulatedPlatform::new(&config.simulator);
    let bridge = Box::new(ImuBridge {
        manager: SensorManager::new(platform, config.event_loop),
    });
    Box::into_raw(bridge)
}

/// Destroy a bridge, releasing everything it holds.
///
/// # Safety
/// - `bridge` must come from `imu_bridge_create()` and not be used afterwards.
#[no_mangle]
pub unsafe extern "C" fn imu_bridge_destroy(bridge: *mut ImuBridge) {
    if !bridge.is_null() {
        drop(Box::from_raw(bridge));
    }
}

/// # Safety
/// - `bridge` must be NULL or a live bridge pointer.
#[no_mangle]
pub unsafe extern "C" fn imu_bridge_initialize(bridge: *mut ImuBridge) -> bool {
    let Some(bridge) = bridge.as_mut() else {
        return false;
    };
    match bridge.manager.initialize() {
        Ok(()) => true,
        Err(e) => {
            error!("Initialization failed: {}", e);
            false
        }
    }
}

/// # Safety
/// - `bridge` must be NULL or a live bridge pointer.
#[no_mangle]
pub unsafe extern "C" fn imu_bridge_start_listening(bridge: *mut ImuBridge) {
    if let Some(bridge) = bridge.as_mut() {
        bridge.manager.start_listening();
    }
}

/// # Safety
/// - `bridge` must be NULL or a live bridge pointer.
#[no_mangle]
pub unsafe extern "C" fn imu_bridge_stop_listening(bridge: *mut ImuBridge) {
    if let Some(bridge) = bridge.as_mut() {
        bridge.manager.stop_listening();
    }
}

/// Register `listener`, releasing any previous one. A NULL `listener` or
/// `callbacks` turns delivery off.
///
/// # Safety
/// - `bridge` must be NULL or a live bridge pointer.
/// - `callbacks` must be NULL or point to a valid table whose functions stay
///   callable until the listener is released.
#[no_mangle]
pub unsafe extern "C" fn imu_bridge_set_event_callback(
    bridge: *mut ImuBridge,
    callbacks: *const ImuHostCallbacks,
    listener: *mut c_void,
) {
    let Some(bridge) = bridge.as_mut() else {
        return;
    };
    let Some(callbacks) = callbacks.as_ref() else {
        bridge.manager.set_event_callback(None);
        return;
    };
    if listener.is_null() {
        bridge.manager.set_event_callback(None);
        return;
    }

    let runtime = Arc::new(CHostRuntime::new(*callbacks));
    let handle = CallbackHandle::new(runtime, ListenerPtr(listener));
    if !handle.is_deliverable() {
        warn!("Registered listener will not receive events");
    }
    bridge.manager.set_event_callback(Some(Box::new(handle)));
}

/// # Safety
/// - `bridge` must be NULL or a live bridge pointer.
#[no_mangle]
pub unsafe extern "C" fn imu_bridge_sensor_count(bridge: *const ImuBridge) -> c_int {
    bridge
        .as_ref()
        .map(|b| b.manager.sensor_count() as c_int)
        .unwrap_or(0)
}

/// Copy the name of sensor `index` into `name_buf` (always NUL-terminated,
/// truncated to `capacity`) and its type code into `type_out`.
///
/// Out of range indices yield an empty name and type 0.
///
/// # Safety
/// - `bridge` must be NULL or a live bridge pointer.
/// - `name_buf` must be NULL or valid for `capacity` bytes.
/// - `type_out` must be NULL or valid for one write.
///
/// # Returns
/// - Length of the full name in bytes, excluding the terminator.
#[no_mangle]
pub unsafe extern "C" fn imu_bridge_sensor_info(
    bridge: *const ImuBridge,
    index: c_int,
    name_buf: *mut c_char,
    capacity: usize,
    type_out: *mut c_int,
) -> c_int {
    let info = match (bridge.as_ref(), usize::try_from(index)) {
        (Some(bridge), Ok(index)) => bridge.manager.sensor_info(index),
        _ => Default::default(),
    };

    if !type_out.is_null() {
        *type_out = info.type_code();
    }
    if !name_buf.is_null() && capacity > 0 {
        let bytes = info.name.as_bytes();
        let len = bytes.len().min(capacity - 1);
        ptr::copy_nonoverlapping(bytes.as_ptr(), name_buf as *mut u8, len);
        *name_buf.add(len) = 0;
    }

    c_int::try_from(info.name.len()).unwrap_or(c_int::MAX)
}

/// Write the last value of sensor `index` to `out[0..3]`.
///
/// # Safety
/// - `bridge` must be NULL or a live bridge pointer.
/// - `out` must be NULL or valid for three `f32` writes.
///
/// # Returns
/// - false (and zeros) for out of range indices.
#[no_mangle]
pub unsafe extern "C" fn imu_bridge_sensor_data(bridge: *const ImuBridge, index: c_int, out: *mut f32) -> bool {
    if out.is_null() {
        return false;
    }

    let (values, in_range) = match (bridge.as_ref(), usize::try_from(index)) {
        (Some(bridge), Ok(index)) if index < bridge.manager.sensor_count() => (bridge.manager.sensor_data(index), true),
        _ => (Vector3::zeros(), false),
    };

    let out = std::slice::from_raw_parts_mut(out, 3);
    out.copy_from_slice(values.as_slice());
    in_range
}

/// Release every subscription and the listener. Safe to call repeatedly.
///
/// # Safety
/// - `bridge` must be NULL or a live bridge pointer.
#[no_mangle]
pub unsafe extern "C" fn imu_bridge_cleanup(bridge: *mut ImuBridge) {
    if let Some(bridge) = bridge.as_mut() {
        bridge.manager.cleanup();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sensors::SensorType;
    use chrono::Utc;
    use std::sync::atomic::{AtomicPtr, AtomicUsize, Ordering};
    use std::time::{Duration, Instant};

    #[derive(Default)]
    struct Host {
        attaches: AtomicUsize,
        detaches: AtomicUsize,
        events: AtomicUsize,
        bad_types: AtomicUsize,
        releases: AtomicUsize,
        bridge: AtomicPtr<ImuBridge>,
    }

    unsafe fn host<'a>(context: *mut c_void) -> &'a Host {
        &*(context as *const Host)
    }

    unsafe extern "C" fn attach(context: *mut c_void) -> c_int {
        host(context).attaches.fetch_add(1, Ordering::SeqCst);
        1
    }

    unsafe extern "C" fn detach(context: *mut c_void) {
        host(context).detaches.fetch_add(1, Ordering::SeqCst);
    }

    unsafe extern "C" fn resolve(_context: *mut c_void, listener: *mut c_void) -> *const c_void {
        listener as *const c_void
    }

    unsafe extern "C" fn resolve_nothing(_context: *mut c_void, _listener: *mut c_void) -> *const c_void {
        ptr::null()
    }

    unsafe extern "C" fn on_event(
        context: *mut c_void,
        _listener: *mut c_void,
        entry: *const c_void,
        name: *const c_char,
        sensor_type: c_int,
        _x: f32,
        _y: f32,
        _z: f32,
    ) -> c_int {
        let host = host(context);
        assert!(!entry.is_null());
        assert!(!CStr::from_ptr(name).to_bytes().is_empty());
        if !matches!(sensor_type, 1 | 2 | 4) {
            host.bad_types.fetch_add(1, Ordering::SeqCst);
        }
        host.events.fetch_add(1, Ordering::SeqCst);
        0
    }

    unsafe extern "C" fn on_event_unregister(
        context: *mut c_void,
        _listener: *mut c_void,
        _entry: *const c_void,
        _name: *const c_char,
        _sensor_type: c_int,
        _x: f32,
        _y: f32,
        _z: f32,
    ) -> c_int {
        let host = host(context);
        host.events.fetch_add(1, Ordering::SeqCst);
        imu_bridge_set_event_callback(host.bridge.load(Ordering::SeqCst), ptr::null(), ptr::null_mut());
        0
    }

    unsafe extern "C" fn release(context: *mut c_void, _listener: *mut c_void) {
        host(context).releases.fetch_add(1, Ordering::SeqCst);
    }

    fn table(host: &Host) -> ImuHostCallbacks {
        ImuHostCallbacks {
            context: host as *const Host as *mut c_void,
            attach_current_thread: Some(attach),
            detach_current_thread: Some(detach),
            resolve_entry_point: Some(resolve),
            on_sensor_event: Some(on_event),
            release_listener: Some(release),
        }
    }

    #[test]
    fn test_null_bridge_is_harmless() {
        unsafe {
            let null = ptr::null_mut();
            assert!(!imu_bridge_initialize(null));
            imu_bridge_start_listening(null);
            imu_bridge_stop_listening(null);
            imu_bridge_set_event_callback(null, ptr::null(), ptr::null_mut());
            assert_eq!(imu_bridge_sensor_count(null), 0);
            let mut out = [1.0f32; 3];
            assert!(!imu_bridge_sensor_data(null, 0, out.as_mut_ptr()));
            assert_eq!(out, [0.0; 3]);
            imu_bridge_cleanup(null);
            imu_bridge_destroy(null);
        }
    }

    #[test]
    fn test_lifecycle_through_c_abi() {
        unsafe {
            let bridge = imu_bridge_create(ptr::null());
            assert!(!bridge.is_null());
            assert!(imu_bridge_initialize(bridge));
            assert!(imu_bridge_initialize(bridge));
            assert_eq!(imu_bridge_sensor_count(bridge), 3);

            let mut name = [0 as c_char; 64];
            let mut sensor_type: c_int = -1;
            let len = imu_bridge_sensor_info(bridge, 0, name.as_mut_ptr(), name.len(), &mut sensor_type);
            let expected = "LSM6DSO Accelerometer Non-wakeup";
            assert_eq!(len as usize, expected.len());
            assert_eq!(CStr::from_ptr(name.as_ptr()).to_str().unwrap(), expected);
            assert_eq!(sensor_type, 1);

            let mut short = [0 as c_char; 8];
            imu_bridge_sensor_info(bridge, 0, short.as_mut_ptr(), short.len(), ptr::null_mut());
            assert_eq!(CStr::from_ptr(short.as_ptr()).to_str().unwrap(), "LSM6DSO");

            assert_eq!(imu_bridge_sensor_info(bridge, -1, name.as_mut_ptr(), name.len(), &mut sensor_type), 0);
            assert_eq!(sensor_type, 0);

            imu_bridge_cleanup(bridge);
            imu_bridge_cleanup(bridge);
            assert_eq!(imu_bridge_sensor_count(bridge), 0);
            let mut out = [5.0f32; 3];
            assert!(!imu_bridge_sensor_data(bridge, 0, out.as_mut_ptr()));
            assert_eq!(out, [0.0; 3]);

            imu_bridge_destroy(bridge);
        }
    }

    #[test]
    fn test_events_reach_host_with_paired_attach() {
        let host = Host::default();
        let callbacks = table(&host);
        let mut listener = 0u8;

        unsafe {
            let bridge = imu_bridge_create(ptr::null());
            assert!(imu_bridge_initialize(bridge));
            imu_bridge_set_event_callback(bridge, &callbacks, &mut listener as *mut u8 as *mut c_void);
            imu_bridge_start_listening(bridge);

            let deadline = Instant::now() + Duration::from_secs(5);
            while host.events.load(Ordering::SeqCst) < 3 && Instant::now() < deadline {
                std::thread::sleep(Duration::from_millis(20));
            }

            imu_bridge_cleanup(bridge);
            imu_bridge_destroy(bridge);
        }

        assert!(host.events.load(Ordering::SeqCst) >= 3);
        assert_eq!(host.bad_types.load(Ordering::SeqCst), 0);
        assert_eq!(host.attaches.load(Ordering::SeqCst), host.detaches.load(Ordering::SeqCst));
        assert_eq!(host.releases.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_replacing_listener_releases_previous() {
        let host = Host::default();
        let callbacks = table(&host);
        let mut first = 0u8;
        let mut second = 0u8;

        unsafe {
            let bridge = imu_bridge_create(ptr::null());
            imu_bridge_set_event_callback(bridge, &callbacks, &mut first as *mut u8 as *mut c_void);
            imu_bridge_set_event_callback(bridge, &callbacks, &mut second as *mut u8 as *mut c_void);
            assert_eq!(host.releases.load(Ordering::SeqCst), 1);

            imu_bridge_set_event_callback(bridge, &callbacks, ptr::null_mut());
            assert_eq!(host.releases.load(Ordering::SeqCst), 2);
            imu_bridge_destroy(bridge);
        }
        assert_eq!(host.releases.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_unresolved_listener_never_fires() {
        let host = Host::default();
        let callbacks = ImuHostCallbacks {
            resolve_entry_point: Some(resolve_nothing),
            ..table(&host)
        };
        let runtime = Arc::new(CHostRuntime::new(callbacks));
        let mut listener = 0u8;
        let handle = CallbackHandle::new(runtime, ListenerPtr(&mut listener as *mut u8 as *mut c_void));
        assert!(!handle.is_deliverable());
    }

    #[test]
    fn test_marshal_failure_still_detaches() {
        use crate::bridge::EventSink;

        let host = Host::default();
        let runtime = Arc::new(CHostRuntime::new(table(&host)));
        let mut listener = 0u8;
        let handle = CallbackHandle::new(runtime, ListenerPtr(&mut listener as *mut u8 as *mut c_void));

        let event = SensorEvent {
            name: "bad\0name".to_string(),
            sensor_type: SensorType::Accelerometer,
            values: Vector3::zeros(),
            timestamp_ns: 0,
            received_at: Utc::now(),
        };
        assert!(matches!(handle.deliver(&event), Err(BridgeError::Marshal(_))));
        assert_eq!(host.attaches.load(Ordering::SeqCst), 1);
        assert_eq!(host.detaches.load(Ordering::SeqCst), 1);
        assert_eq!(host.events.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_listener_unregistering_itself() {
        let host = Host::default();
        let callbacks = ImuHostCallbacks {
            on_sensor_event: Some(on_event_unregister),
            ..table(&host)
        };
        let mut listener = 0u8;

        unsafe {
            let bridge = imu_bridge_create(ptr::null());
            host.bridge.store(bridge, Ordering::SeqCst);
            assert!(imu_bridge_initialize(bridge));
            imu_bridge_set_event_callback(bridge, &callbacks, &mut listener as *mut u8 as *mut c_void);
            imu_bridge_start_listening(bridge);

            let deadline = Instant::now() + Duration::from_secs(5);
            while host.releases.load(Ordering::SeqCst) == 0 && Instant::now() < deadline {
                std::thread::sleep(Duration::from_millis(20));
            }
            assert_eq!(host.releases.load(Ordering::SeqCst), 1);

            // later samples find no listener
            std::thread::sleep(Duration::from_millis(450));
            imu_bridge_cleanup(bridge);
            imu_bridge_destroy(bridge);
        }

        assert_eq!(host.events.load(Ordering::SeqCst), 1);
        assert_eq!(host.releases.load(Ordering::SeqCst), 1);
        assert_eq!(host.attaches.load(Ordering::SeqCst), host.detaches.load(Ordering::SeqCst));
    }
}
