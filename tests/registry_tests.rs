// Image registry tests
// Author: kelexine (https://github.com/kelexine)

mod common;

use async_trait::async_trait;
use bytes::Bytes;
use common::{png, MapFetcher};
use pic_prompt::error::{ImageStage, PicPromptError, Result};
use pic_prompt::images::{FetchedImage, ImageData, ImageFetcher, ImageRegistry};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;

/// Fails the first fetch, succeeds afterwards.
struct FlakyFetcher {
    calls: AtomicUsize,
}

#[async_trait]
impl ImageFetcher for FlakyFetcher {
    async fn fetch(&self, source: &str) -> Result<FetchedImage> {
        if self.calls.fetch_add(1, Ordering::SeqCst) == 0 {
            return Err(PicPromptError::image(source, ImageStage::Timeout, "timed out"));
        }
        Ok(FetchedImage {
            bytes: Bytes::from(png(2, 2)),
            mime_type: "image/png".to_string(),
        })
    }
}

/// Holds fetches of `slow.png` until a permit is released.
struct GatedFetcher {
    gate: Semaphore,
}

#[async_trait]
impl ImageFetcher for GatedFetcher {
    async fn fetch(&self, source: &str) -> Result<FetchedImage> {
        if source == "slow.png" {
            let _permit = self
                .gate
                .acquire()
                .await
                .map_err(|e| PicPromptError::image(source, ImageStage::Read, e.to_string()))?;
        }
        Ok(FetchedImage {
            bytes: Bytes::from(png(1, 1)),
            mime_type: "image/png".to_string(),
        })
    }
}

#[tokio::test]
async fn test_repeated_resolves_fetch_once() {
    let fetcher = Arc::new(MapFetcher::new().with_image("a.png", png(4, 4), "image/png"));
    let registry = ImageRegistry::with_fetcher(fetcher.clone());

    let first = registry.resolve("a.png").await.unwrap();
    for _ in 0..10 {
        let again = registry.resolve("a.png").await.unwrap();
        assert!(Arc::ptr_eq(&first, &again));
    }

    assert_eq!(fetcher.calls("a.png"), 1);
    let stats = registry.stats();
    assert_eq!(stats.fetches, 1);
    assert_eq!(stats.hits, 10);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_resolves_fetch_once() {
    let fetcher = Arc::new(
        MapFetcher::new()
            .with_image("a.png", png(4, 4), "image/png")
            .with_delay(Duration::from_millis(50)),
    );
    let registry = ImageRegistry::with_fetcher(fetcher.clone());

    let handles: Vec<_> = (0..16)
        .map(|_| {
            let registry = registry.clone();
            tokio::spawn(async move { registry.resolve("a.png").await })
        })
        .collect();

    let mut resolved = Vec::new();
    for handle in handles {
        resolved.push(handle.await.unwrap().unwrap());
    }

    assert_eq!(fetcher.calls("a.png"), 1);
    assert!(resolved.iter().all(|d| Arc::ptr_eq(d, &resolved[0])));
    assert_eq!(registry.len(), 1);
}

#[tokio::test]
async fn test_failures_are_not_cached() {
    let fetcher = Arc::new(FlakyFetcher {
        calls: AtomicUsize::new(0),
    });
    let registry = ImageRegistry::with_fetcher(fetcher.clone());

    let err = registry.resolve("a.png").await.unwrap_err();
    assert!(matches!(
        err,
        PicPromptError::ImageProcessing {
            stage: ImageStage::Timeout,
            ..
        }
    ));
    assert!(!registry.contains("a.png"));
    assert!(!registry.is_fetching("a.png"));

    registry.resolve("a.png").await.unwrap();
    assert_eq!(fetcher.calls.load(Ordering::SeqCst), 2);

    let stats = registry.stats();
    assert_eq!(stats.fetches, 2);
    assert_eq!(stats.failures, 1);
}

#[tokio::test]
async fn test_waiters_share_one_failure() {
    let fetcher = Arc::new(MapFetcher::new().with_delay(Duration::from_millis(20)));
    let registry = ImageRegistry::with_fetcher(fetcher.clone());

    let (a, b) = tokio::join!(registry.resolve("gone.png"), registry.resolve("gone.png"));

    assert_eq!(a.unwrap_err(), b.unwrap_err());
    assert_eq!(fetcher.total_calls(), 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_unrelated_sources_not_blocked() {
    let fetcher = Arc::new(GatedFetcher {
        gate: Semaphore::new(0),
    });
    let registry = ImageRegistry::with_fetcher(fetcher.clone());

    let slow = {
        let registry = registry.clone();
        tokio::spawn(async move { registry.resolve("slow.png").await })
    };
    tokio::time::sleep(Duration::from_millis(20)).await;
    assert!(registry.is_fetching("slow.png"));

    let fast = tokio::time::timeout(Duration::from_secs(2), registry.resolve("fast.png"))
        .await
        .expect("unrelated source was blocked by an in-flight fetch");
    assert!(fast.is_ok());

    fetcher.gate.add_permits(1);
    slow.await.unwrap().unwrap();
    assert_eq!(registry.sources(), vec!["fast.png", "slow.png"]);
}

#[tokio::test]
async fn test_abandoned_resolve_still_populates() {
    let fetcher = Arc::new(
        MapFetcher::new()
            .with_image("a.png", png(4, 4), "image/png")
            .with_delay(Duration::from_millis(100)),
    );
    let registry = ImageRegistry::with_fetcher(fetcher.clone());

    let abandoned =
        tokio::time::timeout(Duration::from_millis(10), registry.resolve("a.png")).await;
    assert!(abandoned.is_err());

    tokio::time::sleep(Duration::from_millis(300)).await;

    assert!(registry.contains("a.png"));
    registry.resolve("a.png").await.unwrap();
    assert_eq!(fetcher.calls("a.png"), 1);
}

#[tokio::test]
async fn test_clones_share_cache() {
    let fetcher = Arc::new(MapFetcher::new().with_image("a.png", png(4, 4), "image/png"));
    let registry = ImageRegistry::with_fetcher(fetcher.clone());
    let other = registry.clone();

    registry.resolve("a.png").await.unwrap();
    assert!(other.get("a.png").is_some());
    other.resolve("a.png").await.unwrap();

    assert_eq!(fetcher.calls("a.png"), 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_register_during_fetch_keeps_single_instance() {
    let fetcher = Arc::new(GatedFetcher {
        gate: Semaphore::new(0),
    });
    let registry = ImageRegistry::with_fetcher(fetcher.clone());

    let pending = {
        let registry = registry.clone();
        tokio::spawn(async move { registry.resolve("slow.png").await })
    };
    tokio::time::sleep(Duration::from_millis(20)).await;
    assert!(registry.is_fetching("slow.png"));

    let upload = ImageData::from_bytes("slow.png", png(3, 3), "image/png").unwrap();
    let err = registry.register(upload).unwrap_err();
    assert!(matches!(err, PicPromptError::ImageProcessing { .. }));
    assert!(registry.is_fetching("slow.png"));

    fetcher.gate.add_permits(1);
    let fetched = pending.await.unwrap().unwrap();

    let cached = registry.get("slow.png").unwrap();
    assert!(Arc::ptr_eq(&fetched, &cached));
    let again = registry.resolve("slow.png").await.unwrap();
    assert!(Arc::ptr_eq(&fetched, &again));
}
