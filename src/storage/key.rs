use std::fmt;

use rand::rngs::OsRng;
use rand::RngCore;

use crate::core::types::Orientation;

/// Random bytes per key identifier: 256 bits of entropy.
pub const KEY_RANDOM_BYTES: usize = 32;

/// Fixed extension for stored video objects.
pub const VIDEO_EXTENSION: &str = "mp4";

// ---------------------------------------------------------------------------
// Key deriver
// ---------------------------------------------------------------------------

/// An object key of the form `{orientation}/{64 lowercase hex chars}.mp4`.
///
/// Keys are never derived from user input and never reused: every call to
/// `derive` draws fresh OS randomness. If the randomness source itself fails
/// the process aborts; that is not a recoverable per-request condition.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct StorageKey(String);

impl StorageKey {
    pub fn derive(orientation: Orientation) -> Self {
        let mut buf = [0u8; KEY_RANDOM_BYTES];
        OsRng.fill_bytes(&mut buf);
        Self(format!(
            "{}/{}.{}",
            orientation.as_str(),
            hex::encode(buf),
            VIDEO_EXTENSION
        ))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for StorageKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
