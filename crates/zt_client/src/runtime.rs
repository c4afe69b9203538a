//! Periodic tasks. Each schedule runs on its own task so a slow decrypt
//! batch never delays a presence or typing tick.

use std::future::Future;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{self, MissedTickBehavior};
use tracing::{debug, error, info, warn};

use crate::config::ClientConfig;
use crate::presence::PresenceTracker;
use crate::sync::MessageSync;
use crate::typing::TypingNotifier;

/// Consecutive poll failures after which the warning escalates.
const PERSISTENT_FAILURE_THRESHOLD: u32 = 5;

fn spawn_periodic<F, Fut>(
    name: &'static str,
    period: Duration,
    mut shutdown: watch::Receiver<bool>,
    mut on_tick: F,
) -> JoinHandle<()>
where
    F: FnMut() -> Fut + Send + 'static,
    Fut: Future<Output = ()> + Send + 'static,
{
    tokio::spawn(async move {
        let mut ticker = time::interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            tokio::select! {
                _ = ticker.tick() => on_tick().await,
                _ = shutdown.changed() => break,
            }
            if *shutdown.borrow() {
                break;
            }
        }
        debug!(target: "zt_client", event = "task_stopped", task = name);
    })
}

/// Handle over the running session. `shutdown` stops every task
/// deterministically; dropping the handle aborts them.
pub struct SyncHandle {
    shutdown_tx: watch::Sender<bool>,
    handles: Vec<JoinHandle<()>>,
    typing: Arc<TypingNotifier>,
}

impl SyncHandle {
    pub async fn shutdown(mut self) {
        let _ = self.shutdown_tx.send(true);
        for handle in std::mem::take(&mut self.handles) {
            if let Err(e) = handle.await {
                warn!(target: "zt_client", event = "task_join_failed", error = %e);
            }
        }
        if self.typing.is_typing() {
            self.typing.message_sent().await;
        }
        info!(target: "zt_client", event = "sync_stopped");
    }
}

impl Drop for SyncHandle {
    fn drop(&mut self) {
        for handle in &self.handles {
            handle.abort();
        }
    }
}

pub fn spawn_sync(
    config: &ClientConfig,
    sync: Arc<MessageSync>,
    presence: Arc<PresenceTracker>,
    typing: Arc<TypingNotifier>,
) -> SyncHandle {
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let mut handles = Vec::with_capacity(4);

    let failures = Arc::new(AtomicU32::new(0));
    handles.push(spawn_periodic(
        "message_poll",
        config.message_poll_interval(),
        shutdown_rx.clone(),
        move || {
            let sync = sync.clone();
            let failures = failures.clone();
            async move {
                match sync.tick().await {
                    Ok(_) => {
                        failures.store(0, Ordering::Relaxed);
                    }
                    Err(e) => {
                        let n = failures.fetch_add(1, Ordering::Relaxed) + 1;
                        if n == PERSISTENT_FAILURE_THRESHOLD {
                            error!(target: "zt_client", event = "poll_failing", failures = n, error = %e);
                        } else {
                            warn!(target: "zt_client", event = "poll_failed", failures = n, error = %e);
                        }
                    }
                }
            }
        },
    ));

    let online = presence.clone();
    handles.push(spawn_periodic(
        "presence_poll",
        config.presence_poll_interval(),
        shutdown_rx.clone(),
        move || {
            let presence = online.clone();
            async move {
                if let Err(e) = presence.refresh_online().await {
                    warn!(target: "zt_client", event = "presence_failed", error = %e);
                }
            }
        },
    ));

    handles.push(spawn_periodic(
        "typing_poll",
        config.typing_poll_interval(),
        shutdown_rx.clone(),
        move || {
            let presence = presence.clone();
            async move {
                if let Err(e) = presence.refresh_typing().await {
                    warn!(target: "zt_client", event = "typing_status_failed", error = %e);
                }
            }
        },
    ));

    let idle = typing.clone();
    handles.push(spawn_periodic(
        "typing_idle",
        config.typing_check_interval(),
        shutdown_rx,
        move || {
            let typing = idle.clone();
            async move { typing.check_idle().await }
        },
    ));

    info!(target: "zt_client", event = "sync_started", tasks = handles.len());
    SyncHandle {
        shutdown_tx,
        handles,
        typing,
    }
}
