//! Read-only view of the watch page.
//!
//! The coordinator only needs three things from the page: the upload/air
//! date label, the state of the playing video element, and the parameters
//! carried in the URL fragment. Hosts implement [`PageView`] over whatever
//! document model they have; [`StaticPage`] is an in-memory implementation.

use parking_lot::RwLock;
use std::sync::Arc;

/// Playback flags of the page's video element.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PlaybackState {
    pub paused: bool,
    pub ended: bool,
    pub seeking: bool,
}

impl PlaybackState {
    /// A video that is currently playing.
    pub fn playing() -> Self {
        Self::default()
    }

    pub fn is_active(&self) -> bool {
        !self.paused && !self.ended && !self.seeking
    }
}

/// Parameters carried in the page URL fragment (`#requiredSegment=...`).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HashParams {
    pub required_segment: Option<String>,
}

impl HashParams {
    /// Parse a URL fragment, with or without the leading `#`.
    ///
    /// Values that are JSON strings (`"abc"`) are unquoted; anything else is
    /// taken verbatim.
    pub fn parse(fragment: &str) -> Self {
        let fragment = fragment.strip_prefix('#').unwrap_or(fragment);
        let mut params = HashParams::default();

        for (key, value) in url::form_urlencoded::parse(fragment.as_bytes()) {
            if key == "requiredSegment" && !value.is_empty() {
                let value = serde_json::from_str::<String>(&value)
                    .unwrap_or_else(|_| value.into_owned());
                params.required_segment = Some(value);
            }
        }

        params
    }
}

/// Page access used by the coordinator. Every query may come back empty.
pub trait PageView: Send + Sync {
    /// Text of the upload/air date label, if the element exists.
    fn upload_date_label(&self) -> Option<String>;

    /// State of the page's video element, if there is one.
    fn playback(&self) -> Option<PlaybackState>;

    fn hash_params(&self) -> HashParams {
        HashParams::default()
    }
}

#[derive(Debug, Default)]
struct PageState {
    upload_date_label: Option<String>,
    playback: Option<PlaybackState>,
    hash_params: HashParams,
}

/// In-memory page whose contents can be changed at any time.
#[derive(Debug, Clone, Default)]
pub struct StaticPage {
    state: Arc<RwLock<PageState>>,
}

impl StaticPage {
    /// A page with no video element and no date label.
    pub fn new() -> Self {
        Self::default()
    }

    /// A page playing a video with the given date label.
    pub fn playing(label: impl Into<String>) -> Self {
        let page = Self::new();
        page.set_upload_date_label(Some(label.into()));
        page.set_playback(Some(PlaybackState::playing()));
        page
    }

    pub fn set_upload_date_label(&self, label: Option<String>) {
        self.state.write().upload_date_label = label;
    }

    pub fn set_playback(&self, playback: Option<PlaybackState>) {
        self.state.write().playback = playback;
    }

    pub fn set_fragment(&self, fragment: &str) {
        self.state.write().hash_params = HashParams::parse(fragment);
    }
}

impl PageView for StaticPage {
    fn upload_date_label(&self) -> Option<String> {
        self.state.read().upload_date_label.clone()
    }

    fn playback(&self) -> Option<PlaybackState> {
        self.state.read().playback
    }

    fn hash_params(&self) -> HashParams {
        self.state.read().hash_params.clone()
    }
}
