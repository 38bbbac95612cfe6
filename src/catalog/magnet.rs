//! Launch URI generation

/// Bumped whenever `ANNOUNCE_ENDPOINTS` changes
pub const ANNOUNCE_LIST_VERSION: u32 = 1;

/// Trackers appended to every generated magnet link
pub const ANNOUNCE_ENDPOINTS: &[&str] = &[
    "udp://tracker.opentrackr.org:1337/announce",
    "udp://public.demonoid.ch:6969/announce",
    "udp://open.demonoid.ch:6969/announce",
    "udp://open.demonii.com:1337/announce",
    "udp://open-tracker.demonoid.ch:6969/announce",
    "udp://open.stealth.si:80/announce",
    "udp://explodie.org:6969/announce",
    "udp://wepzone.net:6969/announce",
    "udp://tracker2.dler.org:80/announce",
    "udp://tracker.therarbg.to:6969/announce",
    "udp://tracker.theoks.net:6969/announce",
    "udp://tracker.srv00.com:6969/announce",
    "udp://tracker.qu.ax:6969/announce",
    "udp://tracker.filemail.com:6969/announce",
    "udp://tracker.dler.org:6969/announce",
    "udp://tracker-udp.gbitt.info:80/announce",
    "udp://run.publictracker.xyz:6969/announce",
    "udp://retracker01-msk-virt.corbina.net:80/announce",
    "udp://public.tracker.vraphim.com:6969/announce",
    "udp://p4p.arenabg.com:1337/announce",
];

/// Build a magnet URI from an info hash and display name
pub fn generate_launch_uri(info_hash: &str, display_name: &str) -> String {
    let trackers = ANNOUNCE_ENDPOINTS
        .iter()
        .map(|t| format!("tr={}", urlencoding::encode(t)))
        .collect::<Vec<_>>()
        .join("&");

    format!(
        "magnet:?xt=urn:btih:{}&dn={}&{}",
        info_hash,
        urlencoding::encode(display_name),
        trackers
    )
}

/// Extract the info hash from a magnet URI
pub fn info_hash_from_uri(uri: &str) -> Option<&str> {
    const BTIH: &str = "xt=urn:btih:";
    let start = uri.strip_prefix("magnet:?")?.find(BTIH)? + "magnet:?".len() + BTIH.len();
    let rest = &uri[start..];
    let hash = rest.split('&').next()?;
    (!hash.is_empty()).then_some(hash)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_launch_uri_prefix() {
        let uri = generate_launch_uri("abc123def456", "Movie Name");
        assert!(uri.starts_with("magnet:?xt=urn:btih:abc123def456&dn=Movie%20Name&tr="));
    }

    #[test]
    fn test_launch_uri_encodes_every_tracker() {
        let uri = generate_launch_uri("abc", "x");
        assert_eq!(uri.matches("&tr=").count(), ANNOUNCE_ENDPOINTS.len());
        assert!(uri.contains("tr=udp%3A%2F%2Ftracker.opentrackr.org%3A1337%2Fannounce"));
    }

    #[test]
    fn test_launch_uri_is_deterministic() {
        assert_eq!(generate_launch_uri("h", "Test & Movie"), generate_launch_uri("h", "Test & Movie"));
    }

    #[test]
    fn test_info_hash_from_uri() {
        let uri = generate_launch_uri("deadbeef", "x");
        assert_eq!(info_hash_from_uri(&uri), Some("deadbeef"));
        assert_eq!(info_hash_from_uri("https://example.com"), None);
        assert_eq!(info_hash_from_uri("magnet:?xt=urn:btih:"), None);
    }
}
