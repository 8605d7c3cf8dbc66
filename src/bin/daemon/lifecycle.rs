//! Lifecycle Module
//!
//! Owns the daemon's main loop. Server events and timer ticks are handled on
//! one task, so every registry change and receiver table write is serialized.
//! Termination signals cancel a [`ShutdownToken`]; the loop notices it within
//! one tick, marks every receiver offline and returns.

use async_std::channel::Receiver;
use async_std::task;
use futures::{FutureExt, StreamExt};
use signal_hook::consts::{SIGINT, SIGTERM};
use signal_hook_async_std::{Handle, Signals};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};

use crate::config::LifecycleConfig;
use crate::receiver::coordinator::{ConnectionControl, Coordinator};
use crate::server::ServerEvent;
use crate::store::DeviceStore;
use crate::utils::error::Result;

/// Cooperative shutdown request shared between the signal task and the driver
#[derive(Debug, Clone, Default)]
pub struct ShutdownToken {
    cancelled: Arc<AtomicBool>,
}

impl ShutdownToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }
}

/// Cancel `token` when SIGINT or SIGTERM arrives
///
/// # Returns
/// * `Handle` - Closes the signal stream when the daemon is done with it
pub fn listen_for_signals(token: ShutdownToken) -> Result<Handle> {
    let mut signals = Signals::new([SIGINT, SIGTERM])?;
    let handle = signals.handle();

    task::spawn(async move {
        while let Some(signal) = signals.next().await {
            info!("Received signal {}, shutting down", signal);
            token.cancel();
        }
    });

    Ok(handle)
}

/// Periodic driver for event dispatch, heartbeat and shutdown
pub struct LifecycleDriver {
    tick_interval: Duration,
    heartbeat_interval: Option<Duration>,
    token: ShutdownToken,
}

impl LifecycleDriver {
    pub fn new(config: &LifecycleConfig, token: ShutdownToken) -> Self {
        Self {
            tick_interval: config.tick_interval(),
            heartbeat_interval: config.heartbeat_interval(),
            token,
        }
    }

    /// Run until shutdown is requested or the event stream ends
    ///
    /// Either way every receiver is marked offline before returning. Open
    /// connections are not drained.
    pub async fn run<S, C>(
        &self,
        coordinator: &mut Coordinator<S, C>,
        events: Receiver<ServerEvent>,
    ) -> Result<()>
    where
        S: DeviceStore,
        C: ConnectionControl,
    {
        let mut last_heartbeat = Instant::now();

        loop {
            // A steady event stream never lets the sleep arm fire
            if self.token.is_cancelled() {
                info!("Shutdown requested");
                break;
            }

            futures::select! {
                event = events.recv().fuse() => match event {
                    Ok(event) => coordinator.dispatch(event).await,
                    Err(_) => {
                        warn!("Command server event stream ended");
                        break;
                    }
                },
                _ = task::sleep(self.tick_interval).fuse() => {
                    if let Some(interval) = self.heartbeat_interval {
                        if last_heartbeat.elapsed() >= interval {
                            last_heartbeat = Instant::now();
                            match coordinator.store().ping().await {
                                Ok(()) => debug!(
                                    "Database heartbeat ok, {} receivers registered",
                                    coordinator.registry().len()
                                ),
                                Err(e) => error!("Database heartbeat failed: {}", e),
                            }
                        }
                    }
                }
            }
        }

        coordinator.reset_all_offline().await
    }
}
