//! Torrentio Client Tests
//!
//! Tests for the Torrentio Stremio addon client against a mocked addon.

use mockito::Server;
use flickstream::api::torrentio::TorrentioClient;
use flickstream::catalog;

const MOVIE_BODY: &str = r#"{
    "streams": [
        {
            "name": "Torrentio\n1080p",
            "title": "The.Batman.2022.1080p.WEB-DL\n👤 142 💾 2 GB ⚙️ YTS\n🇬🇧 / 🇫🇷",
            "infoHash": "aaaa",
            "fileIdx": 0,
            "behaviorHints": { "bingeGroup": "torrentio|1080p", "filename": "The.Batman.2022.mkv" }
        },
        {
            "name": "Torrentio\n4k HDR",
            "title": "The.Batman.2022.2160p.HDR\n👤 80 💾 20 GB ⚙️ 1337x",
            "infoHash": "bbbb"
        },
        {
            "name": "Torrentio\n1080p",
            "title": "The.Batman.2022.1080p.WEB-DL\n👤 300 💾 2 GB ⚙️ RARBG",
            "infoHash": "aaaa"
        }
    ],
    "cacheMaxAge": 3600
}"#;

/// Test: Movie request hits /stream/movie/<id>.json
#[tokio::test]
async fn test_movie_streams_request() {
    let mut server = Server::new_async().await;

    let mock = server
        .mock("GET", "/stream/movie/tt1877830.json")
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(MOVIE_BODY)
        .create_async()
        .await;

    let client = TorrentioClient::with_base_url(server.url());
    let streams = client.movie_streams("tt1877830").await.unwrap();

    mock.assert_async().await;

    assert_eq!(streams.len(), 3);
    assert_eq!(streams[0].info_hash, "aaaa");
    assert_eq!(streams[0].file_idx, Some(0));
    assert_eq!(
        streams[0]
            .behavior_hints
            .as_ref()
            .and_then(|h| h.filename.as_deref()),
        Some("The.Batman.2022.mkv")
    );
    assert_eq!(streams[1].file_idx, None);
}

/// Test: Series request uses imdb:season:episode
#[tokio::test]
async fn test_series_streams_format() {
    let mut server = Server::new_async().await;

    let mock = server
        .mock("GET", "/stream/series/tt0903747:1:1.json")
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(r#"{"streams": [{"name": "Torrentio\n720p", "title": "Breaking.Bad.S01E01", "infoHash": "cccc"}]}"#)
        .create_async()
        .await;

    let client = TorrentioClient::with_base_url(server.url());
    let streams = client.episode_streams("tt0903747", 1, 1).await.unwrap();

    mock.assert_async().await;
    assert_eq!(streams.len(), 1);
    assert_eq!(streams[0].name, "Torrentio\n720p");
}

/// Test: Addon options become a path segment before /stream
#[tokio::test]
async fn test_options_segment() {
    let mut server = Server::new_async().await;

    let mock = server
        .mock("GET", "/sort=qualitysize/stream/movie/tt1877830.json")
        .with_status(200)
        .with_body(r#"{"streams": []}"#)
        .create_async()
        .await;

    let client = TorrentioClient::with_base_url(server.url()).with_options("sort=qualitysize");
    let streams = client.movie_streams("tt1877830").await.unwrap();

    mock.assert_async().await;
    assert!(streams.is_empty());
}

/// Test: Fetched records rank into unique candidates
#[tokio::test]
async fn test_fetched_streams_rank() {
    let mut server = Server::new_async().await;

    let _mock = server
        .mock("GET", "/stream/movie/tt1877830.json")
        .with_status(200)
        .with_body(MOVIE_BODY)
        .create_async()
        .await;

    let client = TorrentioClient::with_base_url(server.url());
    let raw = client.movie_streams("tt1877830").await.unwrap();
    let ranked = catalog::rank(&raw);

    assert_eq!(ranked.len(), 2);
    // 300 seeders / 2 GiB beats 142 / 2 GiB for the same hash, and both beat 80 / 20 GiB
    assert_eq!(ranked[0].info_hash, "aaaa");
    assert_eq!(ranked[0].seeder_count, Some(300));
    assert_eq!(ranked[0].score, 150.0);
    assert_eq!(ranked[1].quality, "4k HDR");
}

/// Test: Empty streams array returns empty Vec, no error
#[tokio::test]
async fn test_handles_empty_streams() {
    let mut server = Server::new_async().await;

    let mock = server
        .mock("GET", "/stream/movie/tt0000000.json")
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(r#"{"streams": []}"#)
        .create_async()
        .await;

    let client = TorrentioClient::with_base_url(server.url());
    let streams = client.movie_streams("tt0000000").await.unwrap();

    mock.assert_async().await;
    assert!(streams.is_empty());
}

/// Test: Missing streams key is treated as empty
#[tokio::test]
async fn test_handles_missing_streams_key() {
    let mut server = Server::new_async().await;

    let _mock = server
        .mock("GET", "/stream/movie/tt0000001.json")
        .with_status(200)
        .with_body("{}")
        .create_async()
        .await;

    let client = TorrentioClient::with_base_url(server.url());
    assert!(client.movie_streams("tt0000001").await.unwrap().is_empty());
}

/// Test: Malformed JSON returns an error, not panic
#[tokio::test]
async fn test_handles_malformed_response() {
    let mut server = Server::new_async().await;

    let mock = server
        .mock("GET", "/stream/movie/tt9999999.json")
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(r#"{"streams": not valid json"#)
        .create_async()
        .await;

    let client = TorrentioClient::with_base_url(server.url());
    let result = client.movie_streams("tt9999999").await;

    mock.assert_async().await;

    let err = result.unwrap_err();
    assert!(
        err.to_string().to_lowercase().contains("json"),
        "Expected JSON parse error, got: {}",
        err
    );
}

/// Test: HTTP errors surface the status code
#[tokio::test]
async fn test_handles_http_error() {
    let mut server = Server::new_async().await;

    let _mock = server
        .mock("GET", "/stream/movie/tt1877830.json")
        .with_status(503)
        .create_async()
        .await;

    let client = TorrentioClient::with_base_url(server.url());
    let err = client.movie_streams("tt1877830").await.unwrap_err();
    assert!(err.to_string().contains("503"));
}

/// Test: Network error is handled gracefully
#[tokio::test]
async fn test_handles_network_error() {
    let client = TorrentioClient::with_base_url("http://localhost:59999");
    let result = client.movie_streams("tt1877830").await;
    assert!(result.is_err());
}
