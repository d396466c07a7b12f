use crate::application_port::TokenRefresher;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError, Weak};
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

const DEFAULT_RATIO: f64 = 0.8;

struct ScheduledRefresh {
    generation: u64,
    lifetime: Duration,
    cancel: CancellationToken,
}

/// Single cancellable timer that refreshes the token before it expires.
///
/// Arming always replaces the previous timer. A timer that was replaced or
/// cancelled never calls its refresher, even if its delay already elapsed.
pub struct RefreshScheduler {
    ratio: f64,
    slot: Arc<Mutex<Option<ScheduledRefresh>>>,
    generation: AtomicU64,
}

impl RefreshScheduler {
    pub fn new(ratio: f64) -> Self {
        Self {
            ratio: if ratio.is_finite() {
                ratio.clamp(0.0, 1.0)
            } else {
                DEFAULT_RATIO
            },
            slot: Arc::new(Mutex::new(None)),
            generation: AtomicU64::new(0),
        }
    }

    /// Fire `refresher` after `ratio × lifetime` and return the timer's
    /// generation. Must be called within a Tokio runtime.
    pub fn arm(&self, lifetime: Duration, refresher: Weak<dyn TokenRefresher>) -> u64 {
        let delay = lifetime.mul_f64(self.ratio);
        let generation = self.generation.fetch_add(1, Ordering::Relaxed) + 1;
        let cancel = CancellationToken::new();

        let previous = self
            .slot
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .replace(ScheduledRefresh {
                generation,
                lifetime,
                cancel: cancel.clone(),
            });
        if let Some(previous) = previous {
            previous.cancel.cancel();
        }
        debug!(generation, ?delay, "proactive refresh armed");

        let slot = Arc::clone(&self.slot);
        tokio::spawn(async move {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    debug!(generation, "proactive refresh cancelled");
                    return;
                }
                _ = tokio::time::sleep(delay) => {}
            }

            // Release the slot before refreshing: a successful refresh re-arms.
            {
                let mut slot = slot.lock().unwrap_or_else(PoisonError::into_inner);
                match slot.as_ref() {
                    Some(current) if current.generation == generation => *slot = None,
                    _ => return,
                }
            }

            let Some(refresher) = refresher.upgrade() else {
                return;
            };
            info!(generation, "proactive refresh firing");
            if let Err(e) = refresher.ensure_fresh_token().await {
                warn!(generation, "proactive refresh failed: {e}");
            }
        });
        generation
    }

    pub fn cancel(&self) {
        let previous = self
            .slot
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(previous) = previous {
            debug!(generation = previous.generation, "cancelling proactive refresh");
            previous.cancel.cancel();
        }
    }

    /// Cancel the timer only if it is still the one armed as `generation`.
    pub fn cancel_generation(&self, generation: u64) {
        let mut slot = self.slot.lock().unwrap_or_else(PoisonError::into_inner);
        if slot.as_ref().is_some_and(|s| s.generation == generation) {
            if let Some(previous) = slot.take() {
                debug!(generation, "cancelling proactive refresh");
                previous.cancel.cancel();
            }
        }
    }

    pub fn is_armed(&self) -> bool {
        self.slot
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .is_some()
    }

    /// Lifetime the current timer was armed with.
    pub fn armed_lifetime(&self) -> Option<Duration> {
        self.slot
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .map(|s| s.lifetime)
    }
}

impl Drop for RefreshScheduler {
    fn drop(&mut self) {
        self.cancel();
    }
}
