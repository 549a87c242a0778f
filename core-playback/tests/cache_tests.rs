//! Integration tests for the cache manager over a real SQLite index and
//! scratch directory.

mod common;

use common::{audio, eventually, FakeRemote, Harness};
use core_library::models::TrackRef;
use core_library::repositories::CacheStore;
use core_playback::cache::CacheConfig;
use core_playback::PlaybackError;
use core_runtime::events::{CacheEvent, CoreEvent};
use std::time::{Duration, Instant};

fn track(id: &str, size: u64) -> TrackRef {
    TrackRef::new(id, ".mp3", size)
}

#[tokio::test]
async fn test_concurrent_downloads_share_one_fetch() {
    let remote = FakeRemote::new().with_file("song", audio(1000)).gated();
    let h = Harness::with_remote(remote).await;

    let mut handles = Vec::new();
    for _ in 0..8 {
        let cache = h.cache.clone();
        handles.push(tokio::spawn(async move {
            cache.download_and_cache(&track("song", 1000)).await
        }));
    }

    assert!(eventually(|| h.remote.fetch_count("song") == 1).await);
    assert!(h.cache.is_downloading("song"));
    tokio::time::sleep(Duration::from_millis(20)).await;
    h.remote.open_gate();

    let mut paths = Vec::new();
    for handle in handles {
        paths.push(handle.await.unwrap().unwrap());
    }

    assert_eq!(h.remote.fetch_count("song"), 1);
    assert!(paths.windows(2).all(|pair| pair[0] == pair[1]));
    assert_eq!(std::fs::read(&paths[0]).unwrap(), audio(1000));
    assert!(!h.cache.is_in_flight("song"));
}

#[tokio::test]
async fn test_download_slots_bound_concurrent_fetches() {
    let mut remote = FakeRemote::new();
    for i in 0..5 {
        remote = remote.with_file(&format!("song{}", i), audio(100));
    }
    let h = Harness::with_remote(remote.gated()).await;

    let mut handles = Vec::new();
    for i in 0..5 {
        let cache = h.cache.clone();
        handles.push(tokio::spawn(async move {
            cache.download_and_cache(&track(&format!("song{}", i), 100)).await
        }));
    }

    assert!(eventually(|| h.remote.total_fetches() == 3).await);
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(h.remote.total_fetches(), 3);

    h.remote.open_gate();
    for handle in handles {
        handle.await.unwrap().unwrap();
    }
    assert_eq!(h.remote.total_fetches(), 5);
}

#[tokio::test]
async fn test_cached_file_is_not_fetched_again() {
    let remote = FakeRemote::new().with_file("song", audio(500));
    let h = Harness::with_remote(remote).await;

    let first = h.cache.download_and_cache(&track("song", 500)).await.unwrap();
    let second = h.cache.download_and_cache(&track("song", 500)).await.unwrap();

    assert_eq!(first, second);
    assert_eq!(h.remote.fetch_count("song"), 1);
    assert!(first.ends_with("song.mp3"));
    assert!(h.cache.is_cached("song").await.unwrap());
}

#[tokio::test]
async fn test_budget_never_exceeded() {
    let mut remote = FakeRemote::new();
    for i in 0..6 {
        remote = remote.with_file(&format!("t{}", i), audio(1000));
    }
    let config = CacheConfig::new().with_max_size(2500);
    let h = Harness::new(config, remote).await;

    for i in 0..6 {
        h.cache
            .download_and_cache(&track(&format!("t{}", i), 1000))
            .await
            .unwrap();
        tokio::time::sleep(Duration::from_millis(5)).await;

        assert!(h.cache.cache_size().await.unwrap() <= 2500);
        assert!(h.cache_files().len() <= 2);
    }

    assert!(h.cache.is_cached("t5").await.unwrap());
    assert!(h.cache.is_cached("t4").await.unwrap());
    assert!(!h.cache.is_cached("t0").await.unwrap());
}

#[tokio::test]
async fn test_eviction_follows_access_order() {
    let remote = FakeRemote::new()
        .with_file("a", audio(1000))
        .with_file("b", audio(1000))
        .with_file("c", audio(1000))
        .with_file("d", audio(1000));
    let config = CacheConfig::new().with_max_size(3000);
    let h = Harness::new(config, remote).await;

    for id in ["a", "b", "c"] {
        h.cache.download_and_cache(&track(id, 1000)).await.unwrap();
        tokio::time::sleep(Duration::from_millis(5)).await;
    }

    // Touching "a" makes "b" the least recently used.
    assert!(h.cache.get_cached_path("a").await.unwrap().is_some());
    let store = h.store.clone();
    let mut touched = false;
    for _ in 0..100 {
        let order = store.list_all_by_last_access_ascending().await.unwrap();
        if order.last().map(|r| r.remote_id.as_str()) == Some("a") {
            touched = true;
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    assert!(touched);

    h.cache.download_and_cache(&track("d", 1000)).await.unwrap();

    let remaining: Vec<String> = h
        .store
        .list_all_by_last_access_ascending()
        .await
        .unwrap()
        .into_iter()
        .map(|r| r.remote_id)
        .collect();
    assert_eq!(remaining.len(), 3);
    assert!(!remaining.contains(&"b".to_string()));
    assert!(remaining.contains(&"a".to_string()));
}

#[tokio::test]
async fn test_explicit_eviction_to_target() {
    let remote = FakeRemote::new()
        .with_file("a", audio(100))
        .with_file("b", audio(100))
        .with_file("c", audio(100));
    let h = Harness::with_remote(remote).await;

    for id in ["a", "b", "c"] {
        h.cache.download_and_cache(&track(id, 100)).await.unwrap();
        tokio::time::sleep(Duration::from_millis(5)).await;
    }

    let evicted = h.cache.evict_least_recently_used(150).await.unwrap();
    assert_eq!(evicted, 2);
    assert_eq!(h.cache.cache_size().await.unwrap(), 100);
    assert!(h.cache.is_cached("c").await.unwrap());

    assert_eq!(h.cache.evict_least_recently_used(1000).await.unwrap(), 0);
}

#[tokio::test]
async fn test_stale_record_self_heals() {
    let remote = FakeRemote::new().with_file("song", audio(300));
    let h = Harness::with_remote(remote).await;

    let path = h.cache.download_and_cache(&track("song", 300)).await.unwrap();
    std::fs::remove_file(&path).unwrap();

    assert_eq!(h.cache.get_cached_path("song").await.unwrap(), None);
    assert!(h.store.lookup("song").await.unwrap().is_none());

    // The next download fetches again.
    h.cache.download_and_cache(&track("song", 300)).await.unwrap();
    assert_eq!(h.remote.fetch_count("song"), 2);
}

#[tokio::test]
async fn test_missing_remote_file_commits_nothing() {
    let h = Harness::with_remote(FakeRemote::new()).await;

    let error = h
        .cache
        .download_and_cache(&track("gone", 100))
        .await
        .unwrap_err();

    assert!(matches!(error, PlaybackError::SourceUnavailable(_)));
    assert!(h.store.lookup("gone").await.unwrap().is_none());
    assert!(h.cache_files().is_empty());
    assert!(!h.cache.is_in_flight("gone"));
}

#[tokio::test]
async fn test_rejected_credentials_surface_as_not_authenticated() {
    let remote = FakeRemote::new().with_file("song", audio(100));
    remote.reject_credentials();
    let h = Harness::with_remote(remote).await;

    let error = h
        .cache
        .download_and_cache(&track("song", 100))
        .await
        .unwrap_err();

    assert!(error.is_authentication_error());
}

#[tokio::test]
async fn test_track_larger_than_budget_is_rejected() {
    let remote = FakeRemote::new().with_file("huge", audio(100));
    let h = Harness::new(CacheConfig::new().with_max_size(50), remote).await;

    let error = h
        .cache
        .download_and_cache(&track("huge", 100))
        .await
        .unwrap_err();

    assert!(matches!(error, PlaybackError::CacheFull { .. }));
    assert_eq!(h.remote.fetch_count("huge"), 0);
}

#[tokio::test]
async fn test_invalid_track_is_rejected() {
    let h = Harness::with_remote(FakeRemote::new()).await;

    let error = h
        .cache
        .download_and_cache(&track("../escape", 10))
        .await
        .unwrap_err();

    assert!(matches!(error, PlaybackError::InvalidRequest(_)));
}

#[tokio::test]
async fn test_clear_all_removes_files_and_records() {
    let remote = FakeRemote::new()
        .with_file("a", audio(100))
        .with_file("b", audio(100));
    let h = Harness::with_remote(remote).await;
    let mut events = h.events.subscribe();

    h.cache.download_and_cache(&track("a", 100)).await.unwrap();
    h.cache.download_and_cache(&track("b", 100)).await.unwrap();

    assert_eq!(h.cache.clear_all().await.unwrap(), 2);
    assert_eq!(h.cache.cache_size().await.unwrap(), 0);
    assert!(h.cache_files().is_empty());

    let mut seen = Vec::new();
    while let Ok(event) = events.try_recv() {
        seen.push(event);
    }
    assert!(seen.contains(&CoreEvent::Cache(CacheEvent::Cached {
        remote_id: "a".to_string(),
        size_bytes: 100,
    })));
    assert_eq!(
        seen.last(),
        Some(&CoreEvent::Cache(CacheEvent::Cleared { removed: 2 }))
    );
}

#[tokio::test]
async fn test_write_through_commit_and_exclusivity() {
    let h = Harness::with_remote(FakeRemote::new()).await;

    let mut writer = h
        .cache
        .begin_write_through("song", ".flac")
        .await
        .unwrap()
        .expect("lock should be free");
    assert!(h.cache.is_in_flight("song"));
    assert!(!h.cache.is_downloading("song"));
    assert!(h.cache.begin_write_through("song", ".flac").await.unwrap().is_none());

    writer.write(&audio(64)).await.unwrap();
    writer.write(&audio(36)).await.unwrap();
    assert_eq!(writer.bytes_written(), 100);

    let path = writer.commit().await.unwrap();
    assert!(path.ends_with("song.flac"));
    assert_eq!(h.cache.get_cached_path("song").await.unwrap(), Some(path));
    assert_eq!(h.cache.cache_size().await.unwrap(), 100);
    assert!(!h.cache.is_in_flight("song"));
}

#[tokio::test]
async fn test_dropped_write_through_leaves_nothing() {
    let h = Harness::with_remote(FakeRemote::new()).await;

    let mut writer = h
        .cache
        .begin_write_through("song", ".mp3")
        .await
        .unwrap()
        .unwrap();
    writer.write(&audio(10)).await.unwrap();
    drop(writer);

    assert!(eventually(|| h.cache_files().is_empty()).await);
    assert!(h.store.lookup("song").await.unwrap().is_none());
    assert!(!h.cache.is_in_flight("song"));
}

#[tokio::test]
async fn test_spawn_precache_marks_in_flight_immediately() {
    let remote = FakeRemote::new().with_file("next", audio(200)).gated();
    let h = Harness::with_remote(remote).await;

    assert!(h.cache.spawn_precache(track("next", 200)));
    assert!(h.cache.is_in_flight("next"));
    assert!(!h.cache.spawn_precache(track("next", 200)));
    assert!(eventually(|| h.cache.is_downloading("next")).await);

    h.remote.open_gate();
    let path = h.cache.wait_for_in_flight("next").await.unwrap();

    assert!(path.is_some());
    assert_eq!(h.remote.fetch_count("next"), 1);
}

#[tokio::test]
async fn test_queued_download_is_not_waited_on() {
    let remote = FakeRemote::new()
        .with_file("a", audio(100))
        .with_file("b", audio(100))
        .with_file("c", audio(100))
        .with_file("next", audio(100));
    let h = Harness::with_remote(remote).await;
    for id in ["a", "b", "c"] {
        h.remote.hold(id);
        assert!(h.cache.spawn_precache(track(id, 100)));
    }
    assert!(eventually(|| h.remote.total_fetches() == 3).await);

    assert!(h.cache.spawn_precache(track("next", 100)));
    tokio::time::sleep(Duration::from_millis(20)).await;
    assert!(h.cache.is_in_flight("next"));
    assert!(!h.cache.is_downloading("next"));

    let started = Instant::now();
    assert_eq!(h.cache.cached_or_active_download("next").await.unwrap(), None);
    assert!(started.elapsed() < Duration::from_millis(500));

    h.remote.open_gate();
    assert!(h.cache.wait_for_in_flight("next").await.unwrap().is_some());
}

#[tokio::test]
async fn test_active_download_wait_is_capped() {
    let remote = FakeRemote::new().with_file("song", audio(100)).gated();
    let config = CacheConfig::new().with_download_wait(Duration::from_millis(100));
    let h = Harness::new(config, remote).await;

    assert!(h.cache.spawn_precache(track("song", 100)));
    assert!(eventually(|| h.cache.is_downloading("song")).await);

    let started = Instant::now();
    assert_eq!(h.cache.cached_or_active_download("song").await.unwrap(), None);
    let waited = started.elapsed();
    assert!(waited >= Duration::from_millis(90));
    assert!(waited < Duration::from_secs(1));

    h.remote.open_gate();
    assert!(h.cache.wait_for_in_flight("song").await.unwrap().is_some());
    assert!(h.cache.cached_or_active_download("song").await.unwrap().is_some());
}

#[tokio::test]
async fn test_active_download_finishing_in_time_is_used() {
    let remote = FakeRemote::new().with_file("song", audio(100)).gated();
    let h = Harness::with_remote(remote).await;

    assert!(h.cache.spawn_precache(track("song", 100)));
    assert!(eventually(|| h.cache.is_downloading("song")).await);

    let remote = h.remote.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(50)).await;
        remote.open_gate();
    });

    let path = h.cache.cached_or_active_download("song").await.unwrap();
    assert!(path.unwrap().ends_with("song.mp3"));
    assert_eq!(h.remote.fetch_count("song"), 1);
}

#[tokio::test]
async fn test_initialize_removes_partial_files() {
    let remote = FakeRemote::new().with_file("keep", audio(100));
    let h = Harness::with_remote(remote).await;
    let kept = h.cache.download_and_cache(&track("keep", 100)).await.unwrap();

    let dir = h.cache.cache_directory().unwrap();
    let leftover = dir.join("lost.0b5e4c.part");
    std::fs::write(&leftover, audio(40)).unwrap();

    h.cache.initialize().await.unwrap();

    assert!(!leftover.exists());
    assert_eq!(h.cache_files(), vec![kept.clone()]);
    assert_eq!(h.cache.get_cached_path("keep").await.unwrap(), Some(kept));
}

#[tokio::test]
async fn test_wait_for_in_flight_without_work() {
    let h = Harness::with_remote(FakeRemote::new()).await;
    assert_eq!(h.cache.wait_for_in_flight("nothing").await.unwrap(), None);
}
