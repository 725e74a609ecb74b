use crate::cache::DEFAULT_CAPACITY;
use crate::error::{Result, SegmentError};
use crate::freshness::DEFAULT_FRESH_WINDOW;
use crate::hash::{DOWNVOTE_PREFIX_LEN, get_hash};
use crate::refresh::{DEFAULT_REFRESH_INTERVAL, DEFAULT_REFRESH_LIFETIME};
use crate::types::{ActionType, VideoId};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::env;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;
use tracing::info;
use url::Url;

/// Public segment server.
pub const DEFAULT_SERVER_URL: &str = "https://sponsor.ajay.app";

/// Every category requested from the server unless configured otherwise.
pub const DEFAULT_CATEGORIES: [&str; 12] = [
    "sponsor",
    "selfpromo",
    "exclusive_access",
    "interaction",
    "intro",
    "outro",
    "preview",
    "hook",
    "music_offtopic",
    "filler",
    "poi_highlight",
    "chapter",
];

/// Longest auto-refresh lifetime accepted.
pub const MAX_REFRESH_LIFETIME: Duration = Duration::from_secs(24 * 3600);

/// Client configuration loaded from environment variables
#[derive(Clone, Debug)]
pub struct Config {
    /// Base URL of the segment server
    pub server_url: Url,
    /// Categories sent as `categories`
    pub categories: Vec<String>,
    /// Action types sent as `actionTypes`
    pub action_types: Vec<ActionType>,
    /// Value of the `X-CLIENT-NAME` header
    pub client_name: String,
    /// Number of videos kept in the segment cache
    pub cache_capacity: usize,
    /// Period of the auto-refresh timer
    pub refresh_interval: Duration,
    /// How long an armed auto-refresh keeps running
    pub refresh_lifetime: Duration,
    /// Upload age below which a parsed upload date counts as fresh
    pub fresh_window: Duration,
    /// Per-request timeout
    pub request_timeout: Duration,
    /// Optional JSON file with local state (downvoted segments)
    pub local_config_path: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server_url: Url::parse(DEFAULT_SERVER_URL).expect("default server URL is valid"),
            categories: DEFAULT_CATEGORIES.iter().map(|c| c.to_string()).collect(),
            action_types: ActionType::ALL.to_vec(),
            client_name: default_client_name(),
            cache_capacity: DEFAULT_CAPACITY,
            refresh_interval: DEFAULT_REFRESH_INTERVAL,
            refresh_lifetime: DEFAULT_REFRESH_LIFETIME,
            fresh_window: DEFAULT_FRESH_WINDOW
                .to_std()
                .expect("default fresh window is positive"),
            request_timeout: Duration::from_secs(10),
            local_config_path: None,
        }
    }
}

fn default_client_name() -> String {
    format!("{}/v{}", env!("CARGO_PKG_NAME"), env!("CARGO_PKG_VERSION"))
}

/// Parse an optional variable, failing loudly on garbage.
fn parse_var<T: FromStr>(name: &str) -> Result<Option<T>> {
    match env::var(name) {
        Ok(value) => value
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| SegmentError::Config(format!("{} has an invalid value: {}", name, value))),
        Err(_) => Ok(None),
    }
}

/// Split a comma-separated list, dropping empty items.
fn parse_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(|item| item.trim().to_lowercase())
        .filter(|item| !item.is_empty())
        .collect()
}

impl Config {
    /// Load configuration from environment variables.
    /// Every variable is optional; unset ones fall back to [`Config::default`].
    pub fn from_env() -> Result<Self> {
        let defaults = Config::default();

        let server_url = match env::var("SB_SERVER_URL") {
            Ok(url) => Url::parse(url.trim())?,
            Err(_) => defaults.server_url,
        };

        let categories = env::var("SB_CATEGORIES")
            .map(|value| parse_list(&value))
            .unwrap_or(defaults.categories);

        let action_types = match env::var("SB_ACTION_TYPES") {
            Ok(value) => parse_list(&value)
                .iter()
                .map(|item| {
                    ActionType::parse(item)
                        .ok_or_else(|| SegmentError::Config(format!("Unknown action type: {}", item)))
                })
                .collect::<Result<Vec<_>>>()?,
            Err(_) => defaults.action_types,
        };

        let client_name = env::var("SB_CLIENT_NAME").unwrap_or(defaults.client_name);

        let cache_capacity = parse_var("SB_CACHE_CAPACITY")?.unwrap_or(defaults.cache_capacity);

        let refresh_interval = parse_var("SB_REFRESH_INTERVAL_SECS")?
            .map(Duration::from_secs)
            .unwrap_or(defaults.refresh_interval);

        let refresh_lifetime = parse_var("SB_REFRESH_LIFETIME_SECS")?
            .map(Duration::from_secs)
            .unwrap_or(defaults.refresh_lifetime);

        let fresh_window = parse_var("SB_FRESH_WINDOW_SECS")?
            .map(Duration::from_secs)
            .unwrap_or(defaults.fresh_window);

        let request_timeout = parse_var("SB_REQUEST_TIMEOUT_SECS")?
            .map(Duration::from_secs)
            .unwrap_or(defaults.request_timeout);

        let local_config_path = env::var("SB_LOCAL_CONFIG").ok().map(PathBuf::from);

        let config = Config {
            server_url,
            categories,
            action_types,
            client_name,
            cache_capacity,
            refresh_interval,
            refresh_lifetime,
            fresh_window,
            request_timeout,
            local_config_path,
        };
        config.validate()?;
        Ok(config)
    }

    /// Reject refresh timings the timer cannot run with.
    pub fn validate(&self) -> Result<()> {
        if self.refresh_interval.is_zero() {
            return Err(SegmentError::Config(
                "Refresh interval must be greater than zero".to_string(),
            ));
        }
        if self.refresh_lifetime > MAX_REFRESH_LIFETIME {
            return Err(SegmentError::Config(format!(
                "Refresh lifetime {:?} exceeds the maximum of {:?}",
                self.refresh_lifetime, MAX_REFRESH_LIFETIME
            )));
        }
        Ok(())
    }

    /// Load the local state file if one is configured, or start empty.
    pub fn load_local(&self) -> Result<LocalConfig> {
        match &self.local_config_path {
            Some(path) => LocalConfig::load(path),
            None => Ok(LocalConfig::default()),
        }
    }
}

/// A segment the user voted down.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DownvotedSegment {
    pub uuid: String,
    #[serde(default)]
    pub hidden: bool,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DownvotedVideo {
    #[serde(default)]
    pub segments: Vec<DownvotedSegment>,
}

#[derive(Debug, Default, Deserialize)]
struct LocalConfigFile {
    #[serde(rename = "downvotedSegments", default)]
    downvoted_segments: HashMap<String, DownvotedVideo>,
}

/// User-local state consulted during lookups.
///
/// Downvotes are keyed by the first four hex characters of the video hash.
/// When a prefix has downvotes, lookups ask the server for full UUIDs so
/// the downvoted segments can be matched exactly.
#[derive(Debug, Default)]
pub struct LocalConfig {
    downvoted_segments: DashMap<String, DownvotedVideo>,
}

impl LocalConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path).map_err(|e| {
            SegmentError::Config(format!("Failed to read {}: {}", path.display(), e))
        })?;
        let file: LocalConfigFile = serde_json::from_str(&contents)?;
        info!(
            "Loaded {} downvoted hash prefixes from {}",
            file.downvoted_segments.len(),
            path.display()
        );

        Ok(Self {
            downvoted_segments: file.downvoted_segments.into_iter().collect(),
        })
    }

    pub fn has_downvoted_segments(&self, hash_prefix: &str) -> bool {
        let key = hash_prefix.get(..DOWNVOTE_PREFIX_LEN).unwrap_or(hash_prefix);
        self.downvoted_segments.contains_key(key)
    }

    /// Remember a downvote for a segment of `video_id`.
    pub fn record_downvote(&self, video_id: &VideoId, uuid: impl Into<String>, hidden: bool) {
        let mut prefix = get_hash(video_id.as_str(), 1);
        prefix.truncate(DOWNVOTE_PREFIX_LEN);

        let uuid = uuid.into();
        let mut entry = self.downvoted_segments.entry(prefix).or_default();
        match entry.segments.iter_mut().find(|segment| segment.uuid == uuid) {
            Some(existing) => existing.hidden = hidden,
            None => entry.segments.push(DownvotedSegment { uuid, hidden }),
        }
    }

    pub fn downvoted(&self, hash_prefix: &str) -> Option<DownvotedVideo> {
        let key = hash_prefix.get(..DOWNVOTE_PREFIX_LEN).unwrap_or(hash_prefix);
        self.downvoted_segments.get(key).map(|entry| entry.clone())
    }
}
