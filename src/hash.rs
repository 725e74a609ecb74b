//! Privacy-preserving video id hashing.
//!
//! The server is queried with a short prefix of the id's SHA-256 so it never
//! learns which video is being watched.

use crate::types::VideoId;
use sha2::{Digest, Sha256};

/// Length of the prefix sent to the server.
pub const HASH_PREFIX_LEN: usize = 5;

/// Length of the prefix used to key local downvote state.
pub const DOWNVOTE_PREFIX_LEN: usize = 4;

/// Hex-encoded SHA-256 of `value`, re-hashed `times` times (minimum 1).
pub fn get_hash(value: &str, times: usize) -> String {
    let mut output = value.to_string();
    for _ in 0..times.max(1) {
        let mut hasher = Sha256::new();
        hasher.update(output.as_bytes());
        output = hex::encode(hasher.finalize());
    }
    output
}

/// The 5-character lookup prefix for `video_id`.
pub fn hash_prefix(video_id: &VideoId) -> String {
    let mut hash = get_hash(video_id.as_str(), 1);
    hash.truncate(HASH_PREFIX_LEN);
    hash
}
