use thiserror::Error;

/// Errors raised while looking up skip segments.
///
/// None of these reach callers of
/// [`FetchCoordinator::get_segments_for_video`](crate::coordinator::FetchCoordinator::get_segments_for_video):
/// the coordinator converts them into a stringified
/// [`ResponseStatus::Error`](crate::types::ResponseStatus::Error).
#[derive(Error, Debug)]
pub enum SegmentError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Invalid segment response body: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Invalid server URL: {0}")]
    InvalidServerUrl(#[from] url::ParseError),

    #[error("Fetch task failed: {0}")]
    Task(String),

    #[error("Configuration error: {0}")]
    Config(String),
}

pub type Result<T> = std::result::Result<T, SegmentError>;
