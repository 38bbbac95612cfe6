//! Renderer fault classification
//!
//! Renderer errors arrive as opaque text. A fault counts as seek-related when
//! the detail contains one of the markers below, matched case-insensitively.
//! The list is heuristic: a generic decoder failure unrelated to seeking will
//! also match. Deployments can replace it through `playback.fault_markers`.

use crate::config::PlaybackConfig;

/// Bumped whenever `SEEK_FAULT_MARKERS` changes
pub const FAULT_MARKERS_VERSION: u32 = 1;

/// Decoder/container faults seen when playback jumps into missing data
pub const SEEK_FAULT_MARKERS: &[&str] = &[
    "seek",
    "demux",
    "decoder",
    "invalid data found when processing input",
    "moov atom not found",
    "ebml header",
    "corrupt",
    "unexpected end of file",
    "premature end",
    "timestamp discontinuity",
];

/// Classification of a renderer error
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FaultClass {
    /// Caused by reading undownloaded data; recoverable
    SeekFault,
    /// Anything else; fatal
    RendererFailure,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FaultClassifier {
    markers: Vec<String>,
}

impl FaultClassifier {
    pub fn new<I, S>(markers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            markers: markers
                .into_iter()
                .map(|m| m.as_ref().trim().to_lowercase())
                .filter(|m| !m.is_empty())
                .collect(),
        }
    }

    pub fn from_config(config: &PlaybackConfig) -> Self {
        match &config.fault_markers {
            Some(markers) => Self::new(markers),
            None => Self::default(),
        }
    }

    /// First marker found in `detail`
    pub fn matched_marker(&self, detail: &str) -> Option<&str> {
        let detail = detail.to_lowercase();
        self.markers
            .iter()
            .find(|m| detail.contains(m.as_str()))
            .map(String::as_str)
    }

    pub fn classify(&self, detail: &str) -> FaultClass {
        if self.matched_marker(detail).is_some() {
            FaultClass::SeekFault
        } else {
            FaultClass::RendererFailure
        }
    }

    pub fn markers(&self) -> &[String] {
        &self.markers
    }
}

impl Default for FaultClassifier {
    fn default() -> Self {
        Self::new(SEEK_FAULT_MARKERS)
    }
}
