// Copyright (c) 2026 bad-antics
// Licensed under the MIT License. See LICENSE file in the project root.

//! Readiness loop - turns queue wake-ups into dispatch calls

use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crossbeam::channel::{self, Receiver, Sender};
use crossbeam::select;
use tracing::{debug, info, warn};

use crate::config::EventLoopConfig;
use crate::error::{ImuError, Result};
use crate::sensors::SubscriptionToken;

/// Drains one subscription, returning the number of events dispatched
pub type DispatchFn = dyn Fn(SubscriptionToken) -> usize + Send + Sync;

enum Driver {
    Dedicated {
        shutdown: Sender<()>,
        join: Option<JoinHandle<()>>,
    },
    Manual {
        ready_rx: Receiver<SubscriptionToken>,
        dispatch: Arc<DispatchFn>,
    },
}

/// The single loop every subscription is registered with
pub struct ReadinessLoop {
    ready_tx: Sender<SubscriptionToken>,
    driver: Driver,
}

impl ReadinessLoop {
    pub fn start(config: &EventLoopConfig, dispatch: Arc<DispatchFn>) -> Result<Self> {
        let (ready_tx, ready_rx) = channel::unbounded();

        let driver = if config.dedicated_thread {
            let (shutdown, shutdown_rx) = channel::bounded::<()>(1);
            let join = thread::Builder::new()
                .name(config.thread_name.clone())
                .spawn(move || run(ready_rx, shutdown_rx, dispatch))
                .map_err(|e| ImuError::ReadinessLoopUnavailable(e.to_string()))?;

            info!("Readiness loop running on {:?}", config.thread_name);
            Driver::Dedicated {
                shutdown,
                join: Some(join),
            }
        } else {
            debug!("Readiness loop in manual mode");
            Driver::Manual { ready_rx, dispatch }
        };

        Ok(Self { ready_tx, driver })
    }

    /// Sender that subscriptions signal readiness on
    pub fn sender(&self) -> &Sender<SubscriptionToken> {
        &self.ready_tx
    }

    /// Wait up to `timeout` for readiness, then dispatch everything that is
    /// ready. Only does work in manual mode.
    pub fn poll(&self, timeout: Duration) -> usize {
        let Driver::Manual { ready_rx, dispatch } = &self.driver else {
            return 0;
        };

        let Ok(first) = ready_rx.recv_timeout(timeout) else {
            return 0;
        };

        let mut dispatched = dispatch(first);
        for token in ready_rx.try_iter() {
            dispatched += dispatch(token);
        }
        dispatched
    }

    /// Stop dispatching and wait for the loop thread
    pub fn shutdown(mut self) {
        self.stop();
    }

    fn stop(&mut self) {
        let Driver::Dedicated { shutdown, join } = &mut self.driver else {
            return;
        };
        let Some(join) = join.take() else {
            return;
        };

        let _ = shutdown.send(());
        if join.thread().id() == thread::current().id() {
            // shut down from inside a callback; the loop exits once it returns
            return;
        }
        if join.join().is_err() {
            warn!("Readiness loop thread panicked");
        }
        debug!("Readiness loop stopped");
    }
}

impl Drop for ReadinessLoop {
    fn drop(&mut self) {
        self.stop();
    }
}

fn run(ready_rx: Receiver<SubscriptionToken>, shutdown_rx: Receiver<()>, dispatch: Arc<DispatchFn>) {
    loop {
        select! {
            recv(ready_rx) -> token => match token {
                Ok(token) => {
                    dispatch(token);
                }
                Err(_) => break,
            },
            recv(shutdown_rx) -> _ => break,
        }
    }
}
