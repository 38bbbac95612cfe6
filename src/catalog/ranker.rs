//! Candidate scoring, deduplication and ordering
//!
//! The score is seeders per GiB, so a small, well-seeded release beats a huge
//! one with the same swarm. Unknown size means no size penalty.

use std::collections::HashMap;

use crate::catalog::{magnet, parser};
use crate::models::{CandidateStream, RawStream};

const GIB: f64 = 1024.0 * 1024.0 * 1024.0;

/// Quality filter label meaning "no filter"
pub const ALL_QUALITIES: &str = "All";

/// Quality filter chosen by the caller
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum QualityFilter {
    #[default]
    All,
    Exact(String),
}

impl QualityFilter {
    /// "All" (any case) disables filtering, anything else is an exact label
    pub fn from_label(label: &str) -> Self {
        if label.eq_ignore_ascii_case(ALL_QUALITIES) {
            QualityFilter::All
        } else {
            QualityFilter::Exact(label.to_string())
        }
    }

    pub fn matches(&self, quality: &str) -> bool {
        match self {
            QualityFilter::All => true,
            QualityFilter::Exact(q) => q == quality,
        }
    }
}

/// Convert a size label ("11.27 GB") to bytes; anything unreadable is 0
pub fn size_to_bytes(label: Option<&str>) -> u64 {
    let Some(label) = label else {
        return 0;
    };
    let pattern = format!(r"(?i)^\s*({})\s*(KB|MB|GB)\s*$", parser::SIZE_NUMBER);
    let Some(re) = regex::Regex::new(&pattern).ok() else {
        return 0;
    };
    let Some(caps) = re.captures(label) else {
        return 0;
    };

    let value: Option<f64> = caps.get(1).and_then(|m| m.as_str().parse().ok());
    match (value, caps.get(2)) {
        (Some(value), Some(unit)) => parser::size_in_bytes(value, unit.as_str()).unwrap_or(0),
        _ => 0,
    }
}

/// Seeders normalized by size in GiB
pub fn score(seeders: Option<u32>, size_bytes: u64) -> f64 {
    let seeders = f64::from(seeders.unwrap_or(0));
    if size_bytes > 0 {
        seeders / (size_bytes as f64 / GIB)
    } else {
        seeders
    }
}

/// Build a candidate from one raw record
pub fn build_candidate(raw: &RawStream) -> CandidateStream {
    let parsed = parser::parse(&raw.title, &raw.name);
    let size_bytes = size_to_bytes(parsed.size_label.as_deref());
    let filename = raw
        .behavior_hints
        .as_ref()
        .and_then(|h| h.filename.clone());
    let display_name = filename.as_deref().unwrap_or(&parsed.clean_title);
    let playback_uri = magnet::generate_launch_uri(&raw.info_hash, display_name);

    CandidateStream {
        score: score(parsed.seeders, size_bytes),
        info_hash: raw.info_hash.clone(),
        quality: parsed.quality,
        title: parsed.clean_title,
        size_label: parsed.size_label,
        size_bytes,
        seeder_count: parsed.seeders,
        source: parsed.source,
        languages: parsed.languages,
        filename,
        file_idx: raw.file_idx,
        playback_uri,
    }
}

/// Keep the best-scoring candidate per info hash, in first-seen order
pub fn deduplicate(candidates: Vec<CandidateStream>) -> Vec<CandidateStream> {
    let mut index: HashMap<String, usize> = HashMap::new();
    let mut unique: Vec<CandidateStream> = Vec::new();

    for candidate in candidates {
        match index.get(&candidate.info_hash) {
            Some(&i) => {
                if candidate.score > unique[i].score {
                    unique[i] = candidate;
                }
            }
            None => {
                index.insert(candidate.info_hash.clone(), unique.len());
                unique.push(candidate);
            }
        }
    }

    unique
}

/// Parse, deduplicate and order by descending score
pub fn rank(raw: &[RawStream]) -> Vec<CandidateStream> {
    let mut ranked = deduplicate(raw.iter().map(build_candidate).collect());
    // Stable sort: equal scores keep encounter order
    ranked.sort_by(|a, b| b.score.total_cmp(&a.score));
    ranked
}

/// Rank and keep only candidates matching the filter
pub fn rank_filtered(raw: &[RawStream], filter: &QualityFilter) -> Vec<CandidateStream> {
    let mut ranked = rank(raw);
    ranked.retain(|c| filter.matches(&c.quality));
    ranked
}

/// Distinct quality labels in display order, for filter chips
pub fn available_qualities(candidates: &[CandidateStream]) -> Vec<String> {
    let mut qualities: Vec<String> = Vec::new();
    for c in candidates {
        if !qualities.contains(&c.quality) {
            qualities.push(c.quality.clone());
        }
    }
    qualities
}
