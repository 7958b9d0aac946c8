//! Process shutdown and drain helpers
//!
//! [`Shutdown`] turns SIGINT/SIGTERM/SIGHUP into one stop request that any
//! number of tasks can await. A second signal while the managers are still
//! draining exits the process with status 130.
//!
//! Managers drain with [`wait_until`]: their in-flight counters are plain
//! atomics, so completion is polled instead of awaited.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;
use tokio::time::Instant;

/// Poll interval used while draining
pub const DRAIN_POLL_INTERVAL: Duration = Duration::from_millis(20);

/// Exit status used when a second signal cuts the drain short
const FORCED_EXIT: i32 = 130;

/// Cloneable stop request shared by the runtime and the signal listeners
#[derive(Clone)]
pub struct Shutdown {
    notify: broadcast::Sender<()>,
    requested: Arc<AtomicBool>,
    signals: Arc<AtomicUsize>,
}

impl Default for Shutdown {
    fn default() -> Self {
        Self::new()
    }
}

impl Shutdown {
    pub fn new() -> Self {
        let (notify, _) = broadcast::channel(4);
        Self {
            notify,
            requested: Arc::new(AtomicBool::new(false)),
            signals: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Ask everything awaiting [`Shutdown::requested`] to stop
    pub fn request(&self, source: &str) {
        if !self.requested.swap(true, Ordering::AcqRel) {
            log::info!("Shutdown requested by {}", source);
        }
        let _ = self.notify.send(());
    }

    pub fn is_requested(&self) -> bool {
        self.requested.load(Ordering::Acquire)
    }

    /// Resolves once a stop has been requested, including before the call
    pub async fn requested(&self) {
        let mut rx = self.notify.subscribe();
        if self.is_requested() {
            return;
        }
        // Lagged still means at least one request was sent
        let _ = rx.recv().await;
    }

    /// Spawn one listener per termination signal. Must run inside a runtime.
    pub fn install_signal_handlers(&self) {
        #[cfg(unix)]
        {
            use tokio::signal::unix::{signal, SignalKind};

            // Writes to a closed pipe should kill us like any other CLI
            unsafe {
                libc::signal(libc::SIGPIPE, libc::SIG_DFL);
            }

            let kinds = [
                ("SIGINT", SignalKind::interrupt()),
                ("SIGTERM", SignalKind::terminate()),
                ("SIGHUP", SignalKind::hangup()),
            ];
            for (name, kind) in kinds {
                let mut stream = match signal(kind) {
                    Ok(stream) => stream,
                    Err(e) => {
                        log::warn!("Cannot listen for {}: {}", name, e);
                        continue;
                    }
                };
                let shutdown = self.clone();
                tokio::spawn(async move {
                    while stream.recv().await.is_some() {
                        shutdown.on_signal(name);
                    }
                });
            }
        }

        #[cfg(not(unix))]
        {
            let shutdown = self.clone();
            tokio::spawn(async move {
                while tokio::signal::ctrl_c().await.is_ok() {
                    shutdown.on_signal("Ctrl-C");
                }
            });
        }
    }

    fn on_signal(&self, name: &str) {
        if self.signals.fetch_add(1, Ordering::AcqRel) > 0 {
            log::warn!("{} received while draining; exiting", name);
            std::process::exit(FORCED_EXIT);
        }
        self.request(name);
    }
}

/// Poll `condition` every [`DRAIN_POLL_INTERVAL`] until it holds or
/// `timeout` elapses. Returns whether the condition was met.
pub async fn wait_until<F>(mut condition: F, timeout: Duration) -> bool
where
    F: FnMut() -> bool,
{
    let deadline = Instant::now() + timeout;
    while !condition() {
        if Instant::now() >= deadline {
            return false;
        }
        tokio::time::sleep(DRAIN_POLL_INTERVAL).await;
    }
    true
}
