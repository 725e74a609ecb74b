//! Counters for cache effectiveness, server traffic and auto-refresh.
//!
//! Only the `metrics` facade is used; the embedding application installs
//! whatever recorder it wants.

use metrics::counter;

pub fn record_cache_lookup(hit: bool) {
    let result = if hit { "hit" } else { "miss" };
    counter!("skip_segments_cache_total", "result" => result).increment(1);
}

pub fn record_fetch(status: &str) {
    counter!("skip_segments_fetch_total", "status" => status.to_string()).increment(1);
}

pub fn record_refresh_tick() {
    counter!("skip_segments_refresh_ticks_total").increment(1);
}
