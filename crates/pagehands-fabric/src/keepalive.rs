//! Reference-counted keep-alive heartbeat.
//!
//! The host evicts idle background workers after roughly 30 seconds; a
//! long model call would let that happen mid-turn. Each active agent run
//! holds a guard; the first guard arms a recurring timer whose firing
//! alone keeps the worker alive, and the last guard dropped clears it.

use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::task::JoinHandle;
use tracing::{debug, trace};

/// Default heartbeat period, safely under the eviction threshold.
pub const DEFAULT_KEEPALIVE_PERIOD: Duration = Duration::from_secs(24);

pub struct KeepAlive {
    inner: Arc<Inner>,
}

struct Inner {
    period: Duration,
    count: Mutex<usize>,
    heartbeat: Mutex<Option<JoinHandle<()>>>,
}

impl KeepAlive {
    pub fn new(period: Duration) -> Self {
        Self {
            inner: Arc::new(Inner {
                period,
                count: Mutex::new(0),
                heartbeat: Mutex::new(None),
            }),
        }
    }

    /// Take a keep-alive reference. The heartbeat runs while at least one
    /// guard is alive.
    pub fn acquire(&self) -> KeepAliveGuard {
        let mut count = self.inner.count.lock();
        *count += 1;
        if *count == 1 {
            let period = self.inner.period;
            let handle = tokio::spawn(async move {
                let mut interval = tokio::time::interval(period);
                loop {
                    interval.tick().await;
                    trace!("keep-alive heartbeat");
                }
            });
            *self.inner.heartbeat.lock() = Some(handle);
            debug!("keep-alive armed");
        }
        KeepAliveGuard {
            inner: self.inner.clone(),
        }
    }

    pub fn active(&self) -> bool {
        *self.inner.count.lock() > 0
    }
}

impl Default for KeepAlive {
    fn default() -> Self {
        Self::new(DEFAULT_KEEPALIVE_PERIOD)
    }
}

pub struct KeepAliveGuard {
    inner: Arc<Inner>,
}

impl Drop for KeepAliveGuard {
    fn drop(&mut self) {
        let mut count = self.inner.count.lock();
        *count = count.saturating_sub(1);
        if *count == 0 {
            if let Some(handle) = self.inner.heartbeat.lock().take() {
                handle.abort();
                debug!("keep-alive cleared");
            }
        }
    }
}
