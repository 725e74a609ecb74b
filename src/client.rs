//! HTTP access to the segment server.
//!
//! One GET per lookup, no retries: a failed lookup is simply not cached, so
//! the next call for the same video tries again.

use crate::config::Config;
use crate::error::Result;
use crate::types::ActionType;
use reqwest::Client;
use std::time::Duration;
use tracing::debug;
use url::Url;

/// Header identifying the client to the server.
pub const CLIENT_NAME_HEADER: &str = "X-CLIENT-NAME";

/// Number of UUID characters the server returns when trimming is requested.
pub const TRIMMED_UUID_LEN: u32 = 5;

/// Query of a single `/api/skipSegments/{prefix}` request.
#[derive(Debug, Clone, PartialEq)]
pub struct SkipSegmentsQuery {
    pub hash_prefix: String,
    /// `Some(n)` asks the server to shorten UUIDs to `n` characters.
    pub trim_uuids: Option<u32>,
    pub required_segment: Option<String>,
}

/// Raw server answer: status plus body text.
#[derive(Debug, Clone)]
pub struct ServerResponse {
    pub status: u16,
    pub body: String,
}

impl ServerResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Segment server client sharing one connection pool.
#[derive(Debug, Clone)]
pub struct SegmentClient {
    http: Client,
    server_url: Url,
    client_name: String,
    categories_json: String,
    action_types_json: String,
}

impl SegmentClient {
    pub fn new(config: &Config) -> Result<Self> {
        let http = Client::builder()
            .pool_idle_timeout(Duration::from_secs(90))
            .timeout(config.request_timeout)
            .build()?;

        let action_types: Vec<&str> = config.action_types.iter().map(ActionType::as_str).collect();

        Ok(Self {
            http,
            server_url: config.server_url.clone(),
            client_name: config.client_name.clone(),
            categories_json: serde_json::to_string(&config.categories)?,
            action_types_json: serde_json::to_string(&action_types)?,
        })
    }

    fn skip_segments_url(&self, hash_prefix: &str) -> Result<Url> {
        let base = self.server_url.as_str().trim_end_matches('/');
        Ok(Url::parse(&format!("{}/api/skipSegments/{}", base, hash_prefix))?)
    }

    /// Issue one skip-segments lookup.
    ///
    /// Any HTTP status is returned as a [`ServerResponse`]; only transport
    /// failures are errors.
    ///
    /// # Errors
    ///
    /// Returns [`SegmentError::Http`](crate::error::SegmentError::Http) when
    /// the request cannot be sent or the body cannot be read.
    pub async fn skip_segments(&self, query: &SkipSegmentsQuery) -> Result<ServerResponse> {
        let url = self.skip_segments_url(&query.hash_prefix)?;

        let trim_uuids = query
            .trim_uuids
            .map_or_else(|| "null".to_string(), |n| n.to_string());

        let mut params: Vec<(&str, &str)> = vec![
            ("categories", self.categories_json.as_str()),
            ("actionTypes", self.action_types_json.as_str()),
            ("trimUUIDs", trim_uuids.as_str()),
        ];
        if let Some(required) = &query.required_segment {
            params.push(("requiredSegment", required.as_str()));
        }

        debug!("Requesting skip segments for prefix {}", query.hash_prefix);

        let response = self
            .http
            .get(url)
            .query(&params)
            .header(CLIENT_NAME_HEADER, &self.client_name)
            .send()
            .await?;

        let status = response.status().as_u16();
        let body = response.text().await?;

        Ok(ServerResponse { status, body })
    }
}
