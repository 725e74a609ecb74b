//! Single-slot auto-refresh timer.
//!
//! At most one video is refreshed at a time, whichever was armed last.
//! Arming replaces (and cancels) whatever was armed before, regardless of
//! video. An armed slot ticks every `interval` and expires on its own after
//! `lifetime`.

use crate::types::VideoId;
use parking_lot::Mutex;
use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Default period between refreshes.
pub const DEFAULT_REFRESH_INTERVAL: Duration = Duration::from_secs(30);

/// Default time after which an armed refresh stops by itself.
pub const DEFAULT_REFRESH_LIFETIME: Duration = Duration::from_secs(40 * 60);

/// Deadline used when `start + lifetime` does not fit in an `Instant`.
const FAR_FUTURE: Duration = Duration::from_secs(86400 * 365 * 30);

#[derive(Debug)]
struct ArmedSlot {
    video_id: VideoId,
    generation: u64,
    token: CancellationToken,
}

/// The one refresh timer of a coordinator.
#[derive(Debug)]
pub struct RefreshTimer {
    slot: Arc<Mutex<Option<ArmedSlot>>>,
    generation: AtomicU64,
    interval: Duration,
    lifetime: Duration,
}

impl RefreshTimer {
    pub fn new(interval: Duration, lifetime: Duration) -> Self {
        Self {
            slot: Arc::new(Mutex::new(None)),
            generation: AtomicU64::new(0),
            interval,
            lifetime,
        }
    }

    /// Arm the timer for `video_id`, cancelling any previously armed video.
    ///
    /// `on_tick` runs every interval until the lifetime elapses or the slot
    /// is cancelled or re-armed. Must be called inside a tokio runtime.
    /// A timer with a zero interval never arms.
    pub fn arm<F, Fut>(&self, video_id: VideoId, on_tick: F)
    where
        F: Fn(VideoId) -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        if self.interval.is_zero() {
            warn!("Auto-refresh for {} not armed: refresh interval is zero", video_id);
            return;
        }

        let generation = self.generation.fetch_add(1, Ordering::Relaxed) + 1;
        let token = CancellationToken::new();

        let previous = self.slot.lock().replace(ArmedSlot {
            video_id: video_id.clone(),
            generation,
            token: token.clone(),
        });
        if let Some(previous) = previous {
            previous.token.cancel();
            debug!("Auto-refresh for {} replaced by {}", previous.video_id, video_id);
        }

        info!(
            "Auto-refresh armed for {} (every {:?}, stops after {:?})",
            video_id, self.interval, self.lifetime
        );

        let slot = Arc::clone(&self.slot);
        let interval = self.interval;
        let lifetime = self.lifetime;
        let start = Instant::now();
        let deadline = start
            .checked_add(lifetime)
            .unwrap_or_else(|| start + FAR_FUTURE);
        let first_tick = start.checked_add(interval).unwrap_or(deadline);

        tokio::spawn(async move {
            let expiry = tokio::time::sleep_until(deadline);
            tokio::pin!(expiry);

            let mut ticker = tokio::time::interval_at(first_tick, interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                tokio::select! {
                    biased;
                    _ = token.cancelled() => return,
                    _ = &mut expiry => break,
                    _ = ticker.tick() => {
                        tokio::select! {
                            biased;
                            _ = token.cancelled() => return,
                            _ = on_tick(video_id.clone()) => {}
                        }
                    }
                }
            }

            let mut slot = slot.lock();
            if slot.as_ref().is_some_and(|armed| armed.generation == generation) {
                *slot = None;
                info!("Auto-refresh for {} stopped after {:?}", video_id, lifetime);
            }
        });
    }

    /// Cancel the armed slot, returning the video it was armed for.
    pub fn cancel(&self) -> Option<VideoId> {
        let armed = self.slot.lock().take()?;
        armed.token.cancel();
        debug!("Auto-refresh for {} cancelled", armed.video_id);
        Some(armed.video_id)
    }

    /// Video currently being refreshed, if any.
    pub fn armed_video(&self) -> Option<VideoId> {
        self.slot.lock().as_ref().map(|armed| armed.video_id.clone())
    }

    pub fn is_armed(&self) -> bool {
        self.slot.lock().is_some()
    }
}

impl Default for RefreshTimer {
    fn default() -> Self {
        Self::new(DEFAULT_REFRESH_INTERVAL, DEFAULT_REFRESH_LIFETIME)
    }
}

impl Drop for RefreshTimer {
    fn drop(&mut self) {
        if let Some(armed) = self.slot.lock().take() {
            armed.token.cancel();
        }
    }
}
