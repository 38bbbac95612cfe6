//! Release title/name metadata extraction
//!
//! Torrentio packs everything into two free-text fields:
//!
//! ```text
//! name:  "Torrentio\n1080p"
//! title: "War.Of.The.Worlds.2025.1080p\n👤 38 💾 11.27 GB ⚙️ 1337x\nMulti Audio / 🇬🇧 / 🇮🇹"
//! ```
//!
//! Parsing is best-effort: a field that cannot be read is left out.

use serde::{Deserialize, Serialize};

/// Quality used when the name carries no second line
pub const UNKNOWN_QUALITY: &str = "Unknown";

/// Recognized language flags and their ISO 639-1 codes
pub const LANGUAGE_FLAGS: &[(&str, &str)] = &[
    ("🇬🇧", "en"),
    ("🇮🇹", "it"),
    ("🇫🇷", "fr"),
    ("🇪🇸", "es"),
    ("🇵🇱", "pl"),
    ("🇵🇹", "pt"),
    ("🇲🇽", "es-MX"),
    ("🇩🇪", "de"),
    ("🇷🇺", "ru"),
    ("🇳🇱", "nl"),
    ("🇯🇵", "ja"),
    ("🇰🇷", "ko"),
    ("🇨🇳", "zh"),
    ("🇮🇳", "hi"),
];

/// Metadata extracted from one raw stream
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ParsedMetadata {
    pub quality: String,
    pub clean_title: String,
    pub seeders: Option<u32>,
    pub size_label: Option<String>,
    pub source: Option<String>,
    pub languages: Vec<String>,
}

/// Parse a raw title/name pair
pub fn parse(title: &str, name: &str) -> ParsedMetadata {
    ParsedMetadata {
        quality: parse_quality(name),
        clean_title: clean_title(title).to_string(),
        seeders: parse_seeders(title),
        size_label: parse_size_label(title),
        source: parse_source(title),
        languages: parse_languages(title),
    }
}

/// Second line of the name, e.g. "Torrentio\n4k HDR" -> "4k HDR"
pub fn parse_quality(name: &str) -> String {
    name.split('\n')
        .nth(1)
        .map(str::trim)
        .filter(|q| !q.is_empty())
        .unwrap_or(UNKNOWN_QUALITY)
        .to_string()
}

/// Release name without the metadata lines
pub fn clean_title(title: &str) -> &str {
    title.split('\n').next().unwrap_or_default()
}

/// Seeders from "👤 38"
pub fn parse_seeders(title: &str) -> Option<u32> {
    let re = regex::Regex::new(r"👤\s*(\d+)").ok()?;
    re.captures(title)?.get(1)?.as_str().parse().ok()
}

/// Decimal number accepted in size labels
pub(crate) const SIZE_NUMBER: &str = r"\d+(?:\.\d+)?";

/// Bytes for `value` of `unit` (KB, MB or GB, any case)
pub(crate) fn size_in_bytes(value: f64, unit: &str) -> Option<u64> {
    let multiplier: f64 = match unit.to_uppercase().as_str() {
        "KB" => 1024.0,
        "MB" => 1024.0 * 1024.0,
        "GB" => 1024.0 * 1024.0 * 1024.0,
        _ => return None,
    };
    Some((value * multiplier) as u64)
}

/// Size label from "💾 11.27 GB", normalized to "<number> <UNIT>"
///
/// A label is produced only when it converts to a non-zero byte count.
pub fn parse_size_label(title: &str) -> Option<String> {
    let re = regex::Regex::new(&format!(r"💾\s*({})\s*([A-Za-z]+)", SIZE_NUMBER)).ok()?;
    let caps = re.captures(title)?;
    let number = caps.get(1)?.as_str();
    let unit = caps.get(2)?.as_str().to_uppercase();

    let value: f64 = number.parse().ok()?;
    let bytes = size_in_bytes(value, &unit)?;
    (bytes > 0).then(|| format!("{} {}", number, unit))
}

/// Source from "⚙️ 1337x" up to end of line
pub fn parse_source(title: &str) -> Option<String> {
    let re = regex::Regex::new(r"⚙\x{FE0F}?[ \t]*([^\n]+)").ok()?;
    let source = re.captures(title)?.get(1)?.as_str().trim();
    (!source.is_empty()).then(|| source.to_string())
}

/// Recognized flags in order of first appearance, deduplicated
///
/// Flags are regional-indicator pairs, so the title is walked pair by pair to
/// avoid matching across two adjacent flags.
pub fn parse_languages(title: &str) -> Vec<String> {
    let mut languages: Vec<String> = Vec::new();
    let mut chars = title.chars().peekable();

    while let Some(c) = chars.next() {
        if !is_regional_indicator(c) {
            continue;
        }
        let Some(&next) = chars.peek() else {
            break;
        };
        if !is_regional_indicator(next) {
            continue;
        }
        chars.next();

        let flag: String = [c, next].iter().collect();
        if LANGUAGE_FLAGS.iter().any(|(f, _)| *f == flag) && !languages.contains(&flag) {
            languages.push(flag);
        }
    }

    languages
}

/// ISO code for a recognized flag
pub fn language_code(flag: &str) -> Option<&'static str> {
    LANGUAGE_FLAGS
        .iter()
        .find(|(f, _)| *f == flag)
        .map(|(_, code)| *code)
}

fn is_regional_indicator(c: char) -> bool {
    ('\u{1F1E6}'..='\u{1F1FF}').contains(&c)
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE_TITLE: &str = "X\n👤 38 💾 11.27 GB ⚙️ 1337x\nMulti / 🇬🇧 / 🇮🇹";

    #[test]
    fn test_parse_sample() {
        let parsed = parse(SAMPLE_TITLE, "Label\n1080p");
        assert_eq!(parsed.quality, "1080p");
        assert_eq!(parsed.clean_title, "X");
        assert_eq!(parsed.seeders, Some(38));
        assert_eq!(parsed.size_label.as_deref(), Some("11.27 GB"));
        assert_eq!(parsed.source.as_deref(), Some("1337x"));
        assert_eq!(parsed.languages, vec!["🇬🇧", "🇮🇹"]);
    }

    #[test]
    fn test_quality_missing_line() {
        assert_eq!(parse_quality("Torrentio"), "Unknown");
        assert_eq!(parse_quality("Torrentio\n"), "Unknown");
        assert_eq!(parse_quality("Torrentio\n4k HDR"), "4k HDR");
    }

    #[test]
    fn test_title_without_markers() {
        let parsed = parse("Plain.Release.Name", "Torrentio\n720p");
        assert_eq!(parsed.clean_title, "Plain.Release.Name");
        assert_eq!(parsed.quality, "720p");
        assert!(parsed.seeders.is_none());
        assert!(parsed.size_label.is_none());
        assert!(parsed.source.is_none());
        assert!(parsed.languages.is_empty());
    }

    #[test]
    fn test_size_case_insensitive_unit() {
        assert_eq!(parse_size_label("💾 500mb").as_deref(), Some("500 MB"));
        assert_eq!(parse_size_label("💾 3 kb").as_deref(), Some("3 KB"));
    }

    #[test]
    fn test_size_malformed_dropped() {
        assert!(parse_size_label("💾 1.2.3 GB").is_none());
        assert!(parse_size_label("💾 12 TB").is_none());
        assert!(parse_size_label("💾 bad").is_none());
        assert!(parse_size_label("💾 1. GB").is_none());
        assert!(parse_size_label("💾 .5 GB").is_none());
        assert!(parse_size_label("💾 1,5 GB").is_none());
    }

    #[test]
    fn test_size_zero_dropped() {
        assert!(parse_size_label("💾 0 GB").is_none());
        assert!(parse_size_label("💾 0.0001 KB").is_none());
        assert_eq!(parse_size_label("💾 0.5 KB").as_deref(), Some("0.5 KB"));
    }

    #[test]
    fn test_size_requires_marker() {
        assert!(parse_size_label("Movie 4.2 GB").is_none());
    }

    #[test]
    fn test_source_without_variation_selector() {
        assert_eq!(parse_source("a\n⚙ ThePirateBay \nnext").as_deref(), Some("ThePirateBay"));
    }

    #[test]
    fn test_languages_deduplicated_in_order() {
        let langs = parse_languages("🇮🇹 / 🇬🇧 / 🇮🇹 / 🇫🇷");
        assert_eq!(langs, vec!["🇮🇹", "🇬🇧", "🇫🇷"]);
    }

    #[test]
    fn test_languages_adjacent_flags() {
        assert_eq!(parse_languages("🇪🇸🇲🇽"), vec!["🇪🇸", "🇲🇽"]);
    }

    #[test]
    fn test_languages_ignores_unknown_flags() {
        assert!(parse_languages("🇧🇷 only").is_empty());
    }

    #[test]
    fn test_language_code() {
        assert_eq!(language_code("🇬🇧"), Some("en"));
        assert_eq!(language_code("??"), None);
    }
}
