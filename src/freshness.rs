//! Upload-date heuristics deciding whether a video is worth polling.
//!
//! Live streams, premieres and videos uploaded in the last few hours tend to
//! collect new segments quickly, so the coordinator refreshes them on a
//! timer. The page only exposes a human-readable, localized label
//! ("Premiered 5 minutes ago", "Стрим начался 2 часа назад", "Oct 16, 2026"),
//! so classification is substring matching over per-locale marker lists,
//! with an absolute date parse as the last resort.

use chrono::{DateTime, NaiveDate, TimeDelta, Utc};

/// Default age below which a parsed upload date counts as fresh.
pub const DEFAULT_FRESH_WINDOW: TimeDelta = TimeDelta::hours(3);

/// Largest "N hours ago" that still counts as fresh.
const MAX_FRESH_HOURS: u64 = 3;

const DATE_FORMATS: [&str; 5] = ["%b %d, %Y", "%B %d, %Y", "%d %b %Y", "%d %B %Y", "%Y-%m-%d"];

/// Classification of an upload-date label.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Freshness {
    /// Premiere, live stream or stream replay.
    Live,
    /// Uploaded within the freshness window.
    Recent,
    /// Older, or nothing in the label could be understood.
    Stale,
}

impl Freshness {
    pub fn is_fresh(&self) -> bool {
        matches!(self, Freshness::Live | Freshness::Recent)
    }
}

/// Pluggable freshness classification.
pub trait FreshnessHeuristic: Send + Sync {
    fn classify(&self, label: &str, now: DateTime<Utc>) -> Freshness;
}

/// Marker groups understood by [`LocaleMarkers`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MarkerKind {
    /// Premiere/live/stream words.
    Live,
    /// Seconds/minutes words; any match is fresh.
    Recent,
    /// Hour words; fresh only when the label's number is 1 to 3.
    Hour,
}

/// Substring-based heuristic with English and Russian markers by default.
///
/// Matching is done on the trimmed, lower-cased label. Markers are stems
/// ("минут", "minute") so that plural and case forms all match.
#[derive(Debug, Clone)]
pub struct LocaleMarkers {
    live: Vec<String>,
    recent: Vec<String>,
    hour: Vec<String>,
    fresh_window: TimeDelta,
}

impl LocaleMarkers {
    /// A heuristic with no markers; only absolute dates are understood.
    pub fn empty() -> Self {
        Self {
            live: Vec::new(),
            recent: Vec::new(),
            hour: Vec::new(),
            fresh_window: DEFAULT_FRESH_WINDOW,
        }
    }

    /// Add markers of the given kind. Markers are lower-cased.
    pub fn with_markers<I, S>(mut self, kind: MarkerKind, markers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let target = match kind {
            MarkerKind::Live => &mut self.live,
            MarkerKind::Recent => &mut self.recent,
            MarkerKind::Hour => &mut self.hour,
        };
        target.extend(markers.into_iter().map(|m| m.as_ref().to_lowercase()));
        self
    }

    pub fn with_fresh_window(mut self, window: TimeDelta) -> Self {
        self.fresh_window = window;
        self
    }

    fn contains_any(text: &str, markers: &[String]) -> bool {
        markers.iter().any(|marker| text.contains(marker.as_str()))
    }
}

impl Default for LocaleMarkers {
    fn default() -> Self {
        Self::empty()
            .with_markers(MarkerKind::Live, ["premier", "live", "stream", "премьер", "стрим"])
            .with_markers(MarkerKind::Recent, ["second", "minute", "секунд", "минут"])
            .with_markers(MarkerKind::Hour, ["hour", "час"])
    }
}

impl FreshnessHeuristic for LocaleMarkers {
    fn classify(&self, label: &str, now: DateTime<Utc>) -> Freshness {
        let text = label.trim().to_lowercase();
        if text.is_empty() {
            return Freshness::Stale;
        }

        if Self::contains_any(&text, &self.live) {
            return Freshness::Live;
        }

        if Self::contains_any(&text, &self.recent) {
            return Freshness::Recent;
        }

        if Self::contains_any(&text, &self.hour) {
            return match stated_hours(&text) {
                Some(hours) if hours <= MAX_FRESH_HOURS => Freshness::Recent,
                _ => Freshness::Stale,
            };
        }

        match parse_upload_date(label) {
            Some(uploaded) if now - uploaded < self.fresh_window => Freshness::Recent,
            _ => Freshness::Stale,
        }
    }
}

/// Hours stated by the first run of ASCII digits in `text`.
///
/// No digits means one hour ("an hour ago", "час назад"); digits too large
/// for a `u64` yield `None`.
fn stated_hours(text: &str) -> Option<u64> {
    let Some(start) = text.find(|c: char| c.is_ascii_digit()) else {
        return Some(1);
    };
    let digits: String = text[start..]
        .chars()
        .take_while(|c| c.is_ascii_digit())
        .collect();
    digits.parse().ok()
}

/// Parse an absolute upload timestamp out of a date label.
///
/// Accepts RFC 3339 timestamps and a handful of date-only layouts, optionally
/// preceded by words ("Uploaded on Oct 16, 2026"). Date-only labels resolve
/// to midnight UTC.
pub fn parse_upload_date(label: &str) -> Option<DateTime<Utc>> {
    let label = label.trim();
    if let Ok(timestamp) = DateTime::parse_from_rfc3339(label) {
        return Some(timestamp.with_timezone(&Utc));
    }

    let words: Vec<&str> = label.split_whitespace().collect();
    (0..words.len()).find_map(|skip| {
        let candidate = words[skip..].join(" ");
        DATE_FORMATS
            .iter()
            .find_map(|format| NaiveDate::parse_from_str(&candidate, format).ok())
            .and_then(|date| date.and_hms_opt(0, 0, 0))
            .map(|midnight| midnight.and_utc())
    })
}
