//! Seek gating by download progress
//!
//! Seeking past the downloaded frontier makes the renderer fail to decode, so
//! seeks stay locked until nearly the whole file is present.

use crate::models::{Notice, PlaybackSession};

/// Default unlock threshold in percent
pub const SEEK_UNLOCK_PERCENT: f64 = 95.0;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SeekGuard {
    unlock_percent: f64,
}

impl SeekGuard {
    pub fn new(unlock_percent: f64) -> Self {
        Self { unlock_percent }
    }

    pub fn unlock_percent(&self) -> f64 {
        self.unlock_percent
    }

    pub fn is_seek_allowed(&self, session: &PlaybackSession) -> bool {
        session.progress_percent >= self.unlock_percent
    }

    /// Notice shown when a seek is rejected
    pub fn rejection_notice(&self, session: &PlaybackSession) -> Notice {
        Notice::info(
            "Seeking Locked",
            format!(
                "Downloaded {:.1}% so far. Seeking unlocks at {:.0}%.",
                session.progress_percent, self.unlock_percent
            ),
        )
    }
}

impl Default for SeekGuard {
    fn default() -> Self {
        Self::new(SEEK_UNLOCK_PERCENT)
    }
}
