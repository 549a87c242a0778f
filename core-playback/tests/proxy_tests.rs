//! Integration tests for the loopback streaming proxy, driven with reqwest.

mod common;

use bridge_traits::remote::ByteRange;
use common::{audio, eventually, FakeRemote, Harness};
use core_library::models::TrackRef;
use core_library::repositories::CacheStore;
use core_playback::{PlaybackError, StreamingProxy};
use std::sync::Arc;

async fn running_proxy(h: &Harness) -> Arc<StreamingProxy> {
    let proxy = Arc::new(StreamingProxy::new(h.cache.clone()));
    proxy.start().await.unwrap();
    proxy
}

fn client() -> reqwest::Client {
    reqwest::Client::new()
}

fn header(response: &reqwest::Response, name: &str) -> Option<String> {
    response
        .headers()
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string)
}

#[tokio::test]
async fn test_start_is_idempotent_and_stop_releases() {
    let h = Harness::with_remote(FakeRemote::new()).await;
    let proxy = StreamingProxy::new(h.cache.clone());

    assert!(!proxy.is_running());
    assert!(matches!(
        proxy.stream_url("abc", ".mp3"),
        Err(PlaybackError::ProxyNotRunning)
    ));

    let first = proxy.start().await.unwrap();
    let second = proxy.start().await.unwrap();
    assert_eq!(first, second);
    assert!(first.ip().is_loopback());
    assert!(proxy.is_running());
    assert_eq!(
        proxy.stream_url("abc", ".mp3").unwrap(),
        format!("http://127.0.0.1:{}/abc.mp3", first.port())
    );

    proxy.stop();
    assert!(!proxy.is_running());
    assert_eq!(proxy.port(), None);

    let refused = eventually(|| std::net::TcpStream::connect(first).is_err()).await;
    assert!(refused);
}

#[tokio::test]
async fn test_range_from_cache() {
    let remote = FakeRemote::new().with_file("song", audio(1000));
    let h = Harness::with_remote(remote).await;
    h.cache
        .download_and_cache(&TrackRef::new("song", ".mp3", 1000))
        .await
        .unwrap();
    let proxy = running_proxy(&h).await;

    let response = client()
        .get(proxy.stream_url("song", ".mp3").unwrap())
        .header("Range", "bytes=100-199")
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), 206);
    assert_eq!(
        header(&response, "content-range").as_deref(),
        Some("bytes 100-199/1000")
    );
    assert_eq!(header(&response, "accept-ranges").as_deref(), Some("bytes"));
    assert_eq!(header(&response, "content-type").as_deref(), Some("audio/mpeg"));

    let body = response.bytes().await.unwrap();
    assert_eq!(body.len(), 100);
    assert_eq!(&body[..], &audio(1000)[100..200]);
    assert_eq!(h.remote.fetch_count("song"), 1);
}

#[tokio::test]
async fn test_open_ended_range_and_full_file_from_cache() {
    let remote = FakeRemote::new().with_file("song", audio(1000));
    let h = Harness::with_remote(remote).await;
    h.cache
        .download_and_cache(&TrackRef::new("song", ".mp3", 1000))
        .await
        .unwrap();
    let proxy = running_proxy(&h).await;
    let url = proxy.stream_url("song", ".mp3").unwrap();

    let tail = client()
        .get(&url)
        .header("Range", "bytes=900-")
        .send()
        .await
        .unwrap();
    assert_eq!(tail.status(), 206);
    assert_eq!(
        header(&tail, "content-range").as_deref(),
        Some("bytes 900-999/1000")
    );
    assert_eq!(tail.bytes().await.unwrap().len(), 100);

    let full = client().get(&url).send().await.unwrap();
    assert_eq!(full.status(), 200);
    assert_eq!(header(&full, "content-length").as_deref(), Some("1000"));
    assert_eq!(full.bytes().await.unwrap().to_vec(), audio(1000));
}

#[tokio::test]
async fn test_suffix_range_from_cache() {
    let remote = FakeRemote::new().with_file("song", audio(1000));
    let h = Harness::with_remote(remote).await;
    h.cache
        .download_and_cache(&TrackRef::new("song", ".mp3", 1000))
        .await
        .unwrap();
    let proxy = running_proxy(&h).await;

    let response = client()
        .get(proxy.stream_url("song", ".mp3").unwrap())
        .header("Range", "bytes=-100")
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), 206);
    assert_eq!(
        header(&response, "content-range").as_deref(),
        Some("bytes 900-999/1000")
    );
    assert_eq!(header(&response, "content-length").as_deref(), Some("100"));
    assert_eq!(&response.bytes().await.unwrap()[..], &audio(1000)[900..]);
    assert_eq!(h.remote.fetch_count("song"), 1);
}

#[tokio::test]
async fn test_unsatisfiable_range_falls_back_to_full_body() {
    let remote = FakeRemote::new().with_file("song", audio(1000));
    let h = Harness::with_remote(remote).await;
    h.cache
        .download_and_cache(&TrackRef::new("song", ".mp3", 1000))
        .await
        .unwrap();
    let proxy = running_proxy(&h).await;

    for range in ["bytes=500-2000", "bytes=300-100", "items=0-1", "garbage"] {
        let response = client()
            .get(proxy.stream_url("song", ".mp3").unwrap())
            .header("Range", range)
            .send()
            .await
            .unwrap();

        assert_eq!(response.status(), 200, "range {}", range);
        assert!(header(&response, "content-range").is_none());
        assert_eq!(response.bytes().await.unwrap().len(), 1000);
    }
}

#[tokio::test]
async fn test_relay_writes_through_to_cache() {
    let remote = FakeRemote::new().with_file("fresh", audio(1000));
    let h = Harness::with_remote(remote).await;
    let proxy = running_proxy(&h).await;

    let response = client()
        .get(proxy.stream_url("fresh", ".mp3").unwrap())
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), 200);
    assert_eq!(header(&response, "accept-ranges").as_deref(), Some("bytes"));
    assert_eq!(header(&response, "content-type").as_deref(), Some("audio/mpeg"));
    let body = response.bytes().await.unwrap();
    assert_eq!(body.to_vec(), audio(1000));

    let cache = h.cache.clone();
    let mut cached = false;
    for _ in 0..100 {
        if cache.get_cached_path("fresh").await.unwrap().is_some() {
            cached = true;
            break;
        }
        tokio::time::sleep(std::time::Duration::from_millis(10)).await;
    }
    assert!(cached);
    assert_eq!(h.cache.cache_size().await.unwrap(), 1000);
    assert_eq!(h.remote.fetch_count("fresh"), 1);

    // Served from cache now.
    let again = client()
        .get(proxy.stream_url("fresh", ".mp3").unwrap())
        .send()
        .await
        .unwrap();
    assert_eq!(again.bytes().await.unwrap().len(), 1000);
    assert_eq!(h.remote.fetch_count("fresh"), 1);
}

#[tokio::test]
async fn test_range_relay_is_not_cached() {
    let remote = FakeRemote::new().with_file("fresh", audio(1000));
    let h = Harness::with_remote(remote).await;
    let proxy = running_proxy(&h).await;

    let response = client()
        .get(proxy.stream_url("fresh", ".mp3").unwrap())
        .header("Range", "bytes=100-199")
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), 206);
    assert_eq!(
        header(&response, "content-range").as_deref(),
        Some("bytes 100-199/1000")
    );
    assert_eq!(&response.bytes().await.unwrap()[..], &audio(1000)[100..200]);

    assert_eq!(
        h.remote.ranges(),
        vec![Some(ByteRange::Bounded { start: 100, end: 199 })]
    );
    tokio::time::sleep(std::time::Duration::from_millis(50)).await;
    assert!(!h.cache.is_cached("fresh").await.unwrap());
    assert!(h.cache_files().is_empty());
}

#[tokio::test]
async fn test_request_waits_for_running_download() {
    let remote = FakeRemote::new().with_file("slow", audio(1000)).gated();
    let h = Harness::with_remote(remote).await;
    let proxy = running_proxy(&h).await;

    assert!(h.cache.spawn_precache(TrackRef::new("slow", ".mp3", 1000)));
    assert!(eventually(|| h.remote.fetch_count("slow") == 1).await);
    assert!(h.cache.is_downloading("slow"));

    let url = proxy.stream_url("slow", ".mp3").unwrap();
    let request = tokio::spawn(async move { client().get(url).send().await });
    tokio::time::sleep(std::time::Duration::from_millis(20)).await;
    h.remote.open_gate();

    let response = request.await.unwrap().unwrap();
    assert_eq!(response.status(), 200);
    assert_eq!(response.bytes().await.unwrap().to_vec(), audio(1000));
    assert_eq!(h.remote.fetch_count("slow"), 1);
}

#[tokio::test]
async fn test_queued_download_does_not_hold_request() {
    let mut remote = FakeRemote::new();
    for id in ["a", "b", "c", "queued"] {
        remote = remote.with_file(id, audio(1000));
    }
    let h = Harness::with_remote(remote).await;
    for id in ["a", "b", "c"] {
        h.remote.hold(id);
        assert!(h.cache.spawn_precache(TrackRef::new(id, ".mp3", 1000)));
    }
    assert!(eventually(|| h.remote.total_fetches() == 3).await);
    assert!(h.cache.spawn_precache(TrackRef::new("queued", ".mp3", 1000)));
    let proxy = running_proxy(&h).await;

    let response = tokio::time::timeout(
        std::time::Duration::from_secs(2),
        client().get(proxy.stream_url("queued", ".mp3").unwrap()).send(),
    )
    .await
    .expect("request held behind a queued download")
    .unwrap();

    assert_eq!(response.status(), 200);
    assert_eq!(response.bytes().await.unwrap().to_vec(), audio(1000));
    assert_eq!(h.remote.fetch_count("queued"), 1);
    assert!(h.cache.is_in_flight("queued"));

    h.remote.open_gate();
    assert!(h.cache.wait_for_in_flight("queued").await.unwrap().is_some());
}

#[tokio::test]
async fn test_relay_failing_mid_stream_caches_nothing() {
    let remote = FakeRemote::new()
        .with_file("broken", audio(1000))
        .fail_after("broken", 500);
    let h = Harness::with_remote(remote).await;
    let proxy = running_proxy(&h).await;

    let response = client()
        .get(proxy.stream_url("broken", ".mp3").unwrap())
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), 200);
    assert_eq!(header(&response, "content-length").as_deref(), Some("1000"));
    assert!(response.bytes().await.is_err());

    assert!(eventually(|| !h.cache.is_in_flight("broken")).await);
    assert!(eventually(|| h.cache_files().is_empty()).await);
    assert!(h.store.lookup("broken").await.unwrap().is_none());
    assert!(!h.cache.is_cached("broken").await.unwrap());
}

#[tokio::test]
async fn test_stalled_relay_times_out_and_caches_nothing() {
    let remote = FakeRemote::new()
        .with_file("stalled", audio(1000))
        .stall_after("stalled", 300);
    let h = Harness::with_remote(remote).await;
    let proxy = Arc::new(
        StreamingProxy::new(h.cache.clone())
            .with_relay_timeout(std::time::Duration::from_millis(200)),
    );
    proxy.start().await.unwrap();

    let response = client()
        .get(proxy.stream_url("stalled", ".mp3").unwrap())
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 200);

    let body = tokio::time::timeout(std::time::Duration::from_secs(5), response.bytes())
        .await
        .expect("stalled relay was never cut off");
    assert!(body.is_err());

    assert!(eventually(|| !h.cache.is_in_flight("stalled")).await);
    assert!(eventually(|| h.cache_files().is_empty()).await);
    assert!(h.store.lookup("stalled").await.unwrap().is_none());
}

#[tokio::test]
async fn test_malformed_paths_are_rejected() {
    let h = Harness::with_remote(FakeRemote::new()).await;
    let proxy = running_proxy(&h).await;
    let base = format!("http://{}", proxy.local_addr().unwrap());

    for path in ["/", "/.mp3", "/a/b.mp3", "/..%2Fetc.mp3"] {
        let response = client().get(format!("{}{}", base, path)).send().await.unwrap();
        assert_eq!(response.status(), 400, "path {}", path);
    }
    assert_eq!(h.remote.total_fetches(), 0);
}

#[tokio::test]
async fn test_rejected_credentials_map_to_401() {
    let remote = FakeRemote::new().with_file("song", audio(10));
    remote.reject_credentials();
    let h = Harness::with_remote(remote).await;
    let proxy = running_proxy(&h).await;

    let response = client()
        .get(proxy.stream_url("song", ".mp3").unwrap())
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), 401);
    assert!(!h.cache.is_cached("song").await.unwrap());
}

#[tokio::test]
async fn test_remote_status_is_mirrored() {
    let h = Harness::with_remote(FakeRemote::new()).await;
    let proxy = running_proxy(&h).await;

    let response = client()
        .get(proxy.stream_url("missing", ".mp3").unwrap())
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), 404);
    assert!(response.bytes().await.unwrap().is_empty());
    assert!(h.cache_files().is_empty());
}

#[tokio::test]
async fn test_one_request_does_not_block_another() {
    let remote = FakeRemote::new()
        .with_file("stuck", audio(100))
        .with_file("ready", audio(100));
    let h = Harness::with_remote(remote).await;
    h.cache
        .download_and_cache(&TrackRef::new("ready", ".mp3", 100))
        .await
        .unwrap();
    let proxy = running_proxy(&h).await;

    // The relay for "stuck" hangs at the remote fetch.
    h.remote.close_gate();
    let slow_url = proxy.stream_url("stuck", ".mp3").unwrap();
    let _pending = tokio::spawn(async move { client().get(slow_url).send().await });
    assert!(eventually(|| h.remote.fetch_count("stuck") == 1).await);

    let response = tokio::time::timeout(
        std::time::Duration::from_secs(5),
        client().get(proxy.stream_url("ready", ".mp3").unwrap()).send(),
    )
    .await
    .expect("cached request should not wait on another connection")
    .unwrap();

    assert_eq!(response.status(), 200);
    assert_eq!(response.bytes().await.unwrap().to_vec(), audio(100));
    h.remote.open_gate();
}
