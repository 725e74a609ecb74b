//! Bounded per-video segment cache.
//!
//! Holds the last few lookups so that repeated requests for the video being
//! watched (and the ones just before it) never hit the server. Failed lookups
//! are never stored here, so every miss is a chance to retry.

use crate::metrics;
use crate::types::{SegmentResponse, VideoId};
use lru::LruCache;
use parking_lot::Mutex;
use std::num::NonZeroUsize;
use std::sync::Arc;
use tracing::debug;

/// Default number of videos kept in the cache.
pub const DEFAULT_CAPACITY: usize = 5;

/// Thread-safe LRU cache of segment responses keyed by video.
#[derive(Clone, Debug)]
pub struct SegmentCache {
    entries: Arc<Mutex<LruCache<VideoId, SegmentResponse>>>,
}

impl SegmentCache {
    /// Create a cache holding at most `capacity` videos (minimum 1).
    pub fn new(capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            entries: Arc::new(Mutex::new(LruCache::new(capacity))),
        }
    }

    /// Look up a cached response and mark it as recently used.
    pub fn get(&self, video_id: &VideoId) -> Option<SegmentResponse> {
        let mut entries = self.entries.lock();
        match entries.get(video_id) {
            Some(response) => {
                debug!("Segment cache HIT for {}", video_id);
                metrics::record_cache_lookup(true);
                Some(response.clone())
            }
            None => {
                debug!("Segment cache MISS for {}", video_id);
                metrics::record_cache_lookup(false);
                None
            }
        }
    }

    /// Look up without touching recency or metrics.
    pub fn peek(&self, video_id: &VideoId) -> Option<SegmentResponse> {
        self.entries.lock().peek(video_id).cloned()
    }

    /// Insert or overwrite, evicting the least recently used video when full.
    pub fn set(&self, video_id: VideoId, response: SegmentResponse) {
        if let Some((evicted, _)) = self.entries.lock().push(video_id.clone(), response)
            && evicted != video_id
        {
            debug!("Segment cache evicted {}", evicted);
        }
    }

    /// Drop the entry for `video_id`. No-op if absent.
    pub fn invalidate(&self, video_id: &VideoId) {
        if self.entries.lock().pop(video_id).is_some() {
            debug!("Segment cache invalidated {}", video_id);
        }
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn capacity(&self) -> usize {
        self.entries.lock().cap().get()
    }
}

impl Default for SegmentCache {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ResponseStatus;

    fn id(value: &str) -> VideoId {
        VideoId::from(value)
    }

    #[test]
    fn cache_hit_after_set() {
        let cache = SegmentCache::default();
        cache.set(id("a"), SegmentResponse::empty(200));

        assert_eq!(cache.get(&id("a")), Some(SegmentResponse::empty(200)));
    }

    #[test]
    fn cache_miss_for_unknown_video() {
        let cache = SegmentCache::default();
        assert_eq!(cache.get(&id("unknown")), None);
    }

    #[test]
    fn set_overwrites_existing_entry() {
        let cache = SegmentCache::default();
        cache.set(id("a"), SegmentResponse::empty(200));
        cache.set(id("a"), SegmentResponse::empty(404));

        assert_eq!(
            cache.get(&id("a")).map(|r| r.status),
            Some(ResponseStatus::Code(404))
        );
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn holds_at_most_capacity_entries() {
        let cache = SegmentCache::default();
        for n in 0..8 {
            cache.set(id(&format!("video-{}", n)), SegmentResponse::default());
        }

        assert_eq!(cache.len(), DEFAULT_CAPACITY);
        assert!(cache.peek(&id("video-0")).is_none(), "Oldest entry should be evicted");
        assert!(cache.peek(&id("video-7")).is_some());
    }

    #[test]
    fn get_protects_entry_from_eviction() {
        let cache = SegmentCache::new(2);
        cache.set(id("a"), SegmentResponse::default());
        cache.set(id("b"), SegmentResponse::default());

        // Touch "a" so "b" becomes least recently used
        assert!(cache.get(&id("a")).is_some());
        cache.set(id("c"), SegmentResponse::default());

        assert!(cache.peek(&id("a")).is_some());
        assert!(cache.peek(&id("b")).is_none());
    }

    #[test]
    fn invalidate_removes_entry_and_tolerates_missing() {
        let cache = SegmentCache::default();
        cache.set(id("a"), SegmentResponse::default());

        cache.invalidate(&id("a"));
        cache.invalidate(&id("never-cached"));

        assert!(cache.is_empty());
    }

    #[test]
    fn zero_capacity_is_clamped() {
        let cache = SegmentCache::new(0);
        assert_eq!(cache.capacity(), 1);
    }
}
