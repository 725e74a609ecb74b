//! Cached, de-duplicated skip-segment lookups for the video being watched,
//! with timed auto-refresh for premieres, live streams and fresh uploads.

pub mod cache;
pub mod client;
pub mod config;
pub mod coordinator;
pub mod error;
pub mod freshness;
pub mod hash;
pub mod metrics;
pub mod page;
pub mod refresh;
pub mod types;

pub use coordinator::FetchCoordinator;
pub use error::{Result, SegmentError};
pub use types::{SegmentResponse, VideoId};
