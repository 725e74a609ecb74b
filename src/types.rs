//! Wire and cache types for skip-segment lookups.
//!
//! Field names follow the server's JSON (`videoID`, `UUID`, `actionType`, ...).

use serde::{Deserialize, Serialize};
use std::fmt;

/// Opaque identifier of a video.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct VideoId(String);

impl VideoId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for VideoId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for VideoId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl From<String> for VideoId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

/// What the player should do with a segment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ActionType {
    Skip,
    Mute,
    Chapter,
    Full,
    Poi,
}

impl ActionType {
    /// Every action type the client understands, in request order.
    pub const ALL: [ActionType; 5] = [
        ActionType::Skip,
        ActionType::Mute,
        ActionType::Chapter,
        ActionType::Full,
        ActionType::Poi,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ActionType::Skip => "skip",
            ActionType::Mute => "mute",
            ActionType::Chapter => "chapter",
            ActionType::Full => "full",
            ActionType::Poi => "poi",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|action| action.as_str().eq_ignore_ascii_case(value.trim()))
    }
}

/// Where a segment came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SponsorSourceType {
    Local,
    #[default]
    Server,
    YouTube,
    Autogenerated,
}

/// A single crowd-sourced segment.
///
/// Only `segment` is required; every other field the server sends is kept,
/// unknown ones in `extra`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SponsorTime {
    /// `[start, end]` in seconds.
    pub segment: [f64; 2],
    #[serde(rename = "UUID", default)]
    pub uuid: String,
    #[serde(default)]
    pub category: String,
    #[serde(rename = "actionType", default = "default_action_type")]
    pub action_type: ActionType,
    #[serde(default)]
    pub locked: i32,
    #[serde(default)]
    pub votes: i32,
    #[serde(rename = "videoDuration", default)]
    pub video_duration: f64,
    #[serde(rename = "userID", default)]
    pub user_id: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub source: SponsorSourceType,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

fn default_action_type() -> ActionType {
    ActionType::Skip
}

impl SponsorTime {
    pub fn start(&self) -> f64 {
        self.segment[0]
    }

    pub fn end(&self) -> f64 {
        self.segment[1]
    }
}

/// One entry of the `/api/skipSegments/{prefix}` response array.
///
/// A hash prefix matches many videos, so the server returns one bundle per
/// video sharing the prefix.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VideoSegments {
    #[serde(rename = "videoID")]
    pub video_id: VideoId,
    #[serde(default)]
    pub hash: String,
    #[serde(default)]
    pub segments: Vec<SponsorTime>,
}

/// Outcome marker of a lookup: an HTTP status or a stringified error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResponseStatus {
    Code(u16),
    Error(String),
}

impl ResponseStatus {
    pub fn code(&self) -> Option<u16> {
        match self {
            ResponseStatus::Code(code) => Some(*code),
            ResponseStatus::Error(_) => None,
        }
    }
}

impl fmt::Display for ResponseStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResponseStatus::Code(code) => write!(f, "{}", code),
            ResponseStatus::Error(message) => f.write_str(message),
        }
    }
}

/// Result of a segment lookup.
///
/// `segments` is `None` both for "the server knows no segments" and for
/// failures; `status` tells them apart. When present the list is sorted by
/// start time.
#[derive(Debug, Clone, PartialEq)]
pub struct SegmentResponse {
    pub segments: Option<Vec<SponsorTime>>,
    pub status: ResponseStatus,
}

impl SegmentResponse {
    pub fn found(segments: Vec<SponsorTime>, status: u16) -> Self {
        Self {
            segments: Some(segments),
            status: ResponseStatus::Code(status),
        }
    }

    /// No segments, with the given HTTP status.
    pub fn empty(status: u16) -> Self {
        Self {
            segments: None,
            status: ResponseStatus::Code(status),
        }
    }

    pub fn failed(message: impl Into<String>) -> Self {
        Self {
            segments: None,
            status: ResponseStatus::Error(message.into()),
        }
    }

    pub fn segment_count(&self) -> usize {
        self.segments.as_ref().map_or(0, Vec::len)
    }
}

impl Default for SegmentResponse {
    /// The "looked up, nothing there" marker stored in the cache.
    fn default() -> Self {
        Self::empty(200)
    }
}

/// Published on every auto-refresh.
#[derive(Debug, Clone)]
pub struct SegmentUpdate {
    pub video_id: VideoId,
    pub response: SegmentResponse,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deserializes_server_bundle_and_keeps_unknown_fields() {
        let json = r#"[{
            "videoID": "dQw4w9WgXcQ",
            "hash": "abcdef",
            "segments": [{
                "segment": [1.5, 10.0],
                "UUID": "uuid-1",
                "category": "sponsor",
                "actionType": "skip",
                "locked": 1,
                "votes": 4,
                "videoDuration": 212.0,
                "userID": "user",
                "description": "",
                "timeSubmitted": 1700000000
            }]
        }]"#;

        let bundles: Vec<VideoSegments> = serde_json::from_str(json).unwrap();
        assert_eq!(bundles.len(), 1);
        assert_eq!(bundles[0].video_id, VideoId::from("dQw4w9WgXcQ"));

        let segment = &bundles[0].segments[0];
        assert_eq!(segment.start(), 1.5);
        assert_eq!(segment.end(), 10.0);
        assert_eq!(segment.uuid, "uuid-1");
        assert_eq!(segment.action_type, ActionType::Skip);
        assert_eq!(segment.extra["timeSubmitted"], 1700000000);
    }

    #[test]
    fn minimal_segment_uses_defaults() {
        let segment: SponsorTime = serde_json::from_str(r#"{"segment": [0, 5]}"#).unwrap();
        assert_eq!(segment.action_type, ActionType::Skip);
        assert_eq!(segment.source, SponsorSourceType::Server);
        assert!(segment.uuid.is_empty());
    }

    #[test]
    fn action_type_parse_is_case_insensitive() {
        assert_eq!(ActionType::parse("MUTE"), Some(ActionType::Mute));
        assert_eq!(ActionType::parse(" poi "), Some(ActionType::Poi));
        assert_eq!(ActionType::parse("rewind"), None);
    }

    #[test]
    fn default_response_is_cached_empty_marker() {
        let response = SegmentResponse::default();
        assert!(response.segments.is_none());
        assert_eq!(response.status, ResponseStatus::Code(200));
    }

    #[test]
    fn status_display() {
        assert_eq!(ResponseStatus::Code(404).to_string(), "404");
        assert_eq!(ResponseStatus::Error("boom".into()).to_string(), "boom");
        assert_eq!(ResponseStatus::Error("boom".into()).code(), None);
    }
}
