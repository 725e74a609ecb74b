//! Segment lookups with caching, request de-duplication and auto-refresh.
//!
//! [`FetchCoordinator::get_segments_for_video`] is the single entry point.
//! It serves from the [`SegmentCache`] when it can, joins an in-flight
//! request for the same video when one exists, and otherwise starts exactly
//! one server lookup. When the page shows a fresh video playing (premiere,
//! live stream, just uploaded), it also arms the [`RefreshTimer`] so the
//! segments are re-fetched every interval while new submissions come in.

use crate::cache::SegmentCache;
use crate::client::{SegmentClient, SkipSegmentsQuery, TRIMMED_UUID_LEN};
use crate::config::{Config, LocalConfig};
use crate::error::{Result, SegmentError};
use crate::freshness::{DEFAULT_FRESH_WINDOW, FreshnessHeuristic, LocaleMarkers};
use crate::hash::hash_prefix;
use crate::metrics;
use crate::page::PageView;
use crate::refresh::RefreshTimer;
use crate::types::{
    SegmentResponse, SegmentUpdate, SponsorSourceType, SponsorTime, VideoId, VideoSegments,
};
use chrono::{TimeDelta, Utc};
use futures_util::future::{BoxFuture, FutureExt, Shared};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use tokio::sync::broadcast;
use tracing::{debug, error, info, warn};

/// Buffered refresh updates per subscriber before old ones are dropped.
const UPDATE_CHANNEL_CAPACITY: usize = 16;

type FetchResult = std::result::Result<SegmentResponse, Arc<SegmentError>>;
type SharedFetch = Shared<BoxFuture<'static, FetchResult>>;

/// An outstanding lookup that later callers can join.
struct PendingFetch {
    generation: u64,
    fetch: SharedFetch,
}

/// Removes a pending entry when its fetch task ends, however it ends.
struct PendingGuard {
    inner: Arc<Inner>,
    video_id: VideoId,
    generation: u64,
}

impl Drop for PendingGuard {
    fn drop(&mut self) {
        self.inner.finish_pending(&self.video_id, self.generation);
    }
}

struct Inner {
    client: SegmentClient,
    cache: SegmentCache,
    local: Arc<LocalConfig>,
    page: Arc<dyn PageView>,
    heuristic: Arc<dyn FreshnessHeuristic>,
    pending: Mutex<HashMap<VideoId, PendingFetch>>,
    next_generation: AtomicU64,
    timer: RefreshTimer,
    updates: broadcast::Sender<SegmentUpdate>,
}

/// Cached, de-duplicated access to skip segments.
///
/// Cloning is cheap; clones share cache, pending lookups and refresh timer.
#[derive(Clone)]
pub struct FetchCoordinator {
    inner: Arc<Inner>,
}

/// Builder for [`FetchCoordinator`].
pub struct FetchCoordinatorBuilder {
    config: Config,
    page: Arc<dyn PageView>,
    heuristic: Option<Arc<dyn FreshnessHeuristic>>,
    local: Option<Arc<LocalConfig>>,
}

impl FetchCoordinatorBuilder {
    /// Replace the default English/Russian freshness markers.
    pub fn heuristic(mut self, heuristic: Arc<dyn FreshnessHeuristic>) -> Self {
        self.heuristic = Some(heuristic);
        self
    }

    /// Use this local state instead of loading `config.local_config_path`.
    pub fn local_config(mut self, local: Arc<LocalConfig>) -> Self {
        self.local = Some(local);
        self
    }

    pub fn build(self) -> Result<FetchCoordinator> {
        self.config.validate()?;
        let client = SegmentClient::new(&self.config)?;

        let local = match self.local {
            Some(local) => local,
            None => Arc::new(self.config.load_local()?),
        };

        let heuristic = self.heuristic.unwrap_or_else(|| {
            let window = TimeDelta::from_std(self.config.fresh_window).unwrap_or(DEFAULT_FRESH_WINDOW);
            Arc::new(LocaleMarkers::default().with_fresh_window(window))
        });

        let (updates, _) = broadcast::channel(UPDATE_CHANNEL_CAPACITY);

        Ok(FetchCoordinator {
            inner: Arc::new(Inner {
                client,
                cache: SegmentCache::new(self.config.cache_capacity),
                local,
                page: self.page,
                heuristic,
                pending: Mutex::new(HashMap::new()),
                next_generation: AtomicU64::new(0),
                timer: RefreshTimer::new(self.config.refresh_interval, self.config.refresh_lifetime),
                updates,
            }),
        })
    }
}

impl FetchCoordinator {
    pub fn builder(config: Config, page: Arc<dyn PageView>) -> FetchCoordinatorBuilder {
        FetchCoordinatorBuilder {
            config,
            page,
            heuristic: None,
            local: None,
        }
    }

    /// Coordinator with default heuristic and local state from `config`.
    pub fn new(config: Config, page: Arc<dyn PageView>) -> Result<Self> {
        Self::builder(config, page).build()
    }

    /// Segments for `video_id`, from cache unless `ignore_cache` is set.
    ///
    /// Never fails: transport and parse errors come back as a response with
    /// no segments and a stringified [`ResponseStatus::Error`](crate::types::ResponseStatus::Error).
    /// Concurrent calls for the same video share one server request.
    pub async fn get_segments_for_video(
        &self,
        video_id: &VideoId,
        ignore_cache: bool,
    ) -> SegmentResponse {
        self.check_freshness(video_id);
        self.inner.lookup(video_id, ignore_cache).await
    }

    /// Arm auto-refresh when a fresh video is actively playing.
    fn check_freshness(&self, video_id: &VideoId) {
        let page = &self.inner.page;
        if !page.playback().is_some_and(|playback| playback.is_active()) {
            return;
        }

        self.inner.timer.cancel();

        let Some(label) = page.upload_date_label().filter(|label| !label.trim().is_empty()) else {
            return;
        };

        let freshness = self.inner.heuristic.classify(&label, Utc::now());
        if !freshness.is_fresh() {
            debug!("{} is not fresh ({:?}): {:?}", video_id, freshness, label.trim());
            return;
        }

        info!("{} looks fresh ({:?}), enabling auto-refresh", video_id, freshness);

        let weak: Weak<Inner> = Arc::downgrade(&self.inner);
        self.inner.timer.arm(video_id.clone(), move |video_id| {
            let weak = weak.clone();
            async move {
                if let Some(inner) = weak.upgrade() {
                    inner.refresh(&video_id).await;
                }
            }
        });
    }

    /// Cached response for `video_id`, without fetching or touching recency.
    pub fn cached(&self, video_id: &VideoId) -> Option<SegmentResponse> {
        self.inner.cache.peek(video_id)
    }

    /// Forget the cached response and any in-flight lookup for `video_id`.
    pub fn invalidate(&self, video_id: &VideoId) {
        self.inner.invalidate(video_id);
    }

    pub fn is_pending(&self, video_id: &VideoId) -> bool {
        self.inner.pending.lock().contains_key(video_id)
    }

    /// Receive the result of every auto-refresh.
    pub fn subscribe(&self) -> broadcast::Receiver<SegmentUpdate> {
        self.inner.updates.subscribe()
    }

    /// Video currently being auto-refreshed, if any.
    pub fn refresh_state(&self) -> Option<VideoId> {
        self.inner.timer.armed_video()
    }

    pub fn stop_auto_refresh(&self) -> Option<VideoId> {
        self.inner.timer.cancel()
    }
}

impl Inner {
    async fn lookup(self: &Arc<Self>, video_id: &VideoId, ignore_cache: bool) -> SegmentResponse {
        if !ignore_cache {
            if let Some(cached) = self.cache.get(video_id) {
                return cached;
            }
        }

        match self.pending_or_start(video_id).await {
            Ok(response) => response,
            Err(e) => {
                error!("Caught error while fetching segments for {}: {}", video_id, e);
                SegmentResponse::failed(e.to_string())
            }
        }
    }

    /// Join the in-flight lookup for `video_id`, or start one.
    fn pending_or_start(self: &Arc<Self>, video_id: &VideoId) -> SharedFetch {
        let mut pending = self.pending.lock();
        if let Some(existing) = pending.get(video_id) {
            debug!("Joining in-flight lookup for {}", video_id);
            return existing.fetch.clone();
        }

        let generation = self.next_generation.fetch_add(1, Ordering::Relaxed) + 1;
        let guard = PendingGuard {
            inner: Arc::clone(self),
            video_id: video_id.clone(),
            generation,
        };

        // The entry is inserted before the lock is released, so the task's
        // cleanup can never run ahead of the insert.
        let task = tokio::spawn(async move {
            let result = guard.inner.fetch_segments_for_video(&guard.video_id).await;
            drop(guard);
            result
        });

        let fetch = async move {
            match task.await {
                Ok(result) => result.map_err(Arc::new),
                Err(join_error) => Err(Arc::new(SegmentError::Task(join_error.to_string()))),
            }
        }
        .boxed()
        .shared();

        pending.insert(
            video_id.clone(),
            PendingFetch {
                generation,
                fetch: fetch.clone(),
            },
        );
        fetch
    }

    /// Drop the pending entry, unless it has already been replaced.
    fn finish_pending(&self, video_id: &VideoId, generation: u64) {
        let mut pending = self.pending.lock();
        if pending
            .get(video_id)
            .is_some_and(|entry| entry.generation == generation)
        {
            pending.remove(video_id);
        }
    }

    fn invalidate(&self, video_id: &VideoId) {
        self.cache.invalidate(video_id);
        self.pending.lock().remove(video_id);
    }

    /// One auto-refresh tick: forget everything about the video and refetch.
    async fn refresh(self: &Arc<Self>, video_id: &VideoId) {
        info!("Auto-refreshing segments for {}", video_id);
        metrics::record_refresh_tick();

        self.invalidate(video_id);
        let response = self.lookup(video_id, true).await;

        // No subscribers is fine
        let _ = self.updates.send(SegmentUpdate {
            video_id: video_id.clone(),
            response,
        });
    }

    async fn fetch_segments_for_video(&self, video_id: &VideoId) -> Result<SegmentResponse> {
        let hash_prefix = hash_prefix(video_id);
        let trim_uuids = if self.local.has_downvoted_segments(&hash_prefix) {
            None
        } else {
            Some(TRIMMED_UUID_LEN)
        };

        let query = SkipSegmentsQuery {
            hash_prefix,
            trim_uuids,
            required_segment: self.page.hash_params().required_segment,
        };

        let response = self.client.skip_segments(&query).await?;
        metrics::record_fetch(&response.status.to_string());

        if response.is_success() {
            let bundles: Vec<VideoSegments> = serde_json::from_str(&response.body)?;
            let segments = select_segments(bundles, video_id);

            if !segments.is_empty() {
                debug!("Received {} segments for {}", segments.len(), video_id);
                let result = SegmentResponse::found(segments, response.status);
                self.cache.set(video_id.clone(), result.clone());
                return Ok(result);
            }

            self.cache.set(video_id.clone(), SegmentResponse::default());
        } else if response.status != 404 {
            warn!(
                "[SB] Server responded with {} while fetching skip segments for {}: {}",
                response.status, video_id, response.body
            );
        }

        Ok(SegmentResponse::empty(response.status))
    }
}

/// Segments of `video_id` from a prefix lookup, tagged and sorted by start.
fn select_segments(bundles: Vec<VideoSegments>, video_id: &VideoId) -> Vec<SponsorTime> {
    let mut segments: Vec<SponsorTime> = bundles
        .into_iter()
        .find(|bundle| &bundle.video_id == video_id)
        .map(|bundle| bundle.segments)
        .unwrap_or_default();

    for segment in &mut segments {
        segment.source = SponsorSourceType::Server;
    }
    segments.sort_by(|a, b| a.start().total_cmp(&b.start()));
    segments
}
