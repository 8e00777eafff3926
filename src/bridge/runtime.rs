// Copyright (c) 2026 bad-antics
// Licensed under the MIT License. See LICENSE file in the project root.

//! Host runtime seam and scoped thread attachment
//!
//! Events are dispatched on the readiness-loop thread, which the host runtime
//! has usually never seen. Before a listener can be called the thread has to
//! be registered with the runtime, and it must be unregistered again if (and
//! only if) the registration happened for that call.

use std::sync::Arc;

use tracing::{debug, warn};

use super::EventSink;
use crate::error::BridgeError;
use crate::sensors::SensorEvent;

/// Outcome of asking the host runtime for an execution context
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Attachment {
    /// The thread was already registered with the runtime
    Existing,
    /// The thread was registered by this request
    Attached,
}

/// A foreign runtime that listeners live in
pub trait HostRuntime: Send + Sync + 'static {
    /// Reference to a host-side listener object
    type Listener: Send + Sync;

    /// Resolved listener entry point
    type EntryPoint: Copy + Send + Sync;

    /// Look up the `(name, type, x, y, z)` entry point on `listener`
    fn resolve_entry_point(&self, listener: &Self::Listener) -> Option<Self::EntryPoint>;

    /// Register the current thread with the runtime if it isn't already
    fn attach_current_thread(&self) -> Result<Attachment, BridgeError>;

    /// Undo an [`Attachment::Attached`] registration
    fn detach_current_thread(&self);

    /// Marshal `event` and invoke `entry` on `listener`
    fn call(
        &self,
        scope: &ExecutionScope<'_, Self>,
        listener: &Self::Listener,
        entry: Self::EntryPoint,
        event: &SensorEvent,
    ) -> Result<(), BridgeError>
    where
        Self: Sized;

    /// Drop the runtime's reference to `listener`
    fn release(&self, listener: Self::Listener);
}

/// Proof that the current thread may call into a [`HostRuntime`].
///
/// Detaches on drop when it was the one that attached.
pub struct ExecutionScope<'r, R: HostRuntime> {
    runtime: &'r R,
    attachment: Attachment,
}

impl<'r, R: HostRuntime> ExecutionScope<'r, R> {
    pub fn acquire(runtime: &'r R) -> Result<Self, BridgeError> {
        let attachment = runtime.attach_current_thread()?;
        Ok(Self { runtime, attachment })
    }

    pub fn attachment(&self) -> Attachment {
        self.attachment
    }
}

impl<R: HostRuntime> Drop for ExecutionScope<'_, R> {
    fn drop(&mut self) {
        if self.attachment == Attachment::Attached {
            self.runtime.detach_current_thread();
        }
    }
}

/// Registered host listener: listener reference, its entry point and the
/// runtime needed to reach it. Releases the listener on drop.
pub struct CallbackHandle<R: HostRuntime> {
    runtime: Arc<R>,
    listener: Option<R::Listener>,
    entry: Option<R::EntryPoint>,
}

impl<R: HostRuntime> CallbackHandle<R> {
    /// Wrap `listener`. An unresolvable entry point leaves the handle inert.
    pub fn new(runtime: Arc<R>, listener: R::Listener) -> Self {
        let entry = runtime.resolve_entry_point(&listener);
        if entry.is_none() {
            warn!("Listener has no sensor event entry point, delivery disabled");
        }
        Self {
            runtime,
            listener: Some(listener),
            entry,
        }
    }

    pub fn is_deliverable(&self) -> bool {
        self.entry.is_some()
    }
}

impl<R: HostRuntime> EventSink for CallbackHandle<R> {
    fn deliver(&self, event: &SensorEvent) -> Result<(), BridgeError> {
        let (Some(listener), Some(entry)) = (self.listener.as_ref(), self.entry) else {
            return Ok(());
        };

        let scope = ExecutionScope::acquire(self.runtime.as_ref())?;
        self.runtime.call(&scope, listener, entry, event)
    }
}

impl<R: HostRuntime> Drop for CallbackHandle<R> {
    fn drop(&mut self) {
        if let Some(listener) = self.listener.take() {
            debug!("Releasing host listener");
            self.runtime.release(listener);
        }
    }
}
