// Image registry - deduplicating, fetch-once image cache
// Author: kelexine (https://github.com/kelexine)

use super::data::ImageData;
use super::downloader::{ImageDownloader, ImageFetcher};
use crate::config::DownloaderConfig;
use crate::error::{ImageStage, PicPromptError, Result};
use crate::metrics;
use crate::utils::logging::sanitize_source;
use futures::future::{BoxFuture, FutureExt, Shared};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{debug, info};

type PendingFetch = Shared<BoxFuture<'static, Result<Arc<ImageData>>>>;

/// Resolution state of one source reference.
enum Slot {
    /// A fetch task is running; every resolver awaits the same shared result.
    Fetching {
        generation: u64,
        pending: PendingFetch,
    },
    Ready(Arc<ImageData>),
}

/// Counters describing registry activity.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct RegistryStats {
    /// Resolutions answered from a ready entry.
    pub hits: u64,
    /// Resolutions that joined a fetch already in flight.
    pub joins: u64,
    /// Fetches started.
    pub fetches: u64,
    /// Fetches that failed.
    pub failures: u64,
}

/// Shared cache of images keyed by source reference.
///
/// Cloning is cheap and every clone sees the same cache, so one registry can
/// back any number of prompt builds. Each distinct source is fetched at most
/// once for the registry's lifetime: concurrent resolvers of the same source
/// await a single in-flight fetch, while unrelated sources proceed
/// independently. Fetches run as spawned tasks, so a caller that gives up
/// waiting does not cancel the fetch; its result still lands in the cache.
///
/// Failures are never cached. Every waiter receives the error and the next
/// `resolve` for that source starts a fresh fetch.
#[derive(Clone)]
pub struct ImageRegistry {
    inner: Arc<RegistryInner>,
}

struct RegistryInner {
    fetcher: Arc<dyn ImageFetcher>,
    slots: Mutex<HashMap<String, Slot>>,
    stats: Mutex<RegistryStats>,
    next_generation: AtomicU64,
}

impl ImageRegistry {
    /// Registry backed by the default [`ImageDownloader`].
    pub fn new(config: &DownloaderConfig) -> Result<Self> {
        Ok(Self::with_fetcher(Arc::new(ImageDownloader::new(config)?)))
    }

    /// Registry backed by a custom fetcher.
    pub fn with_fetcher(fetcher: Arc<dyn ImageFetcher>) -> Self {
        Self {
            inner: Arc::new(RegistryInner {
                fetcher,
                slots: Mutex::new(HashMap::new()),
                stats: Mutex::new(RegistryStats::default()),
                next_generation: AtomicU64::new(0),
            }),
        }
    }

    /// Image for `source`, fetching it on first use.
    ///
    /// Must be called from within a tokio runtime.
    pub async fn resolve(&self, source: &str) -> Result<Arc<ImageData>> {
        let pending = {
            let mut slots = self.inner.slots.lock();
            match slots.get(source) {
                Some(Slot::Ready(data)) => {
                    self.inner.stats.lock().hits += 1;
                    metrics::record_image_cache("hit");
                    return Ok(data.clone());
                }
                Some(Slot::Fetching { pending, .. }) => {
                    debug!("Joining in-flight fetch for {}", sanitize_source(source));
                    self.inner.stats.lock().joins += 1;
                    metrics::record_image_cache("join");
                    pending.clone()
                }
                None => {
                    let generation = self.inner.next_generation.fetch_add(1, Ordering::Relaxed);
                    let pending = self.start_fetch(source, generation);
                    slots.insert(
                        source.to_string(),
                        Slot::Fetching {
                            generation,
                            pending: pending.clone(),
                        },
                    );
                    self.inner.stats.lock().fetches += 1;
                    metrics::record_image_cache("miss");
                    pending
                }
            }
        };

        pending.await
    }

    fn start_fetch(&self, source: &str, generation: u64) -> PendingFetch {
        debug!("Starting fetch for {}", sanitize_source(source));

        let inner = Arc::clone(&self.inner);
        let task_source = source.to_string();
        let handle = tokio::spawn(inner.clone().run_fetch(task_source, generation));

        let source = source.to_string();
        async move {
            match handle.await {
                Ok(outcome) => outcome,
                Err(e) => {
                    inner.settle_failure(&source, generation);
                    Err(PicPromptError::image(
                        source,
                        ImageStage::Read,
                        format!("fetch task did not complete: {}", e),
                    ))
                }
            }
        }
        .boxed()
        .shared()
    }

    /// Ready image for `source`, without fetching.
    pub fn get(&self, source: &str) -> Option<Arc<ImageData>> {
        match self.inner.slots.lock().get(source) {
            Some(Slot::Ready(data)) => Some(data.clone()),
            _ => None,
        }
    }

    /// Add an image the caller already holds. An existing ready entry wins;
    /// registering while a fetch for the same source is in flight fails.
    pub fn register(&self, data: ImageData) -> Result<Arc<ImageData>> {
        if !data.is_fetched() {
            return Err(PicPromptError::image(
                data.source(),
                ImageStage::Read,
                "only populated images can be registered",
            ));
        }

        let mut slots = self.inner.slots.lock();
        match slots.get(data.source()) {
            Some(Slot::Ready(existing)) => return Ok(existing.clone()),
            Some(Slot::Fetching { .. }) => {
                return Err(PicPromptError::image(
                    data.source(),
                    ImageStage::Read,
                    "a fetch for this source is already in flight",
                ));
            }
            None => {}
        }

        let data = Arc::new(data);
        slots.insert(data.source().to_string(), Slot::Ready(data.clone()));
        Ok(data)
    }

    /// Whether `source` has a ready entry.
    pub fn contains(&self, source: &str) -> bool {
        matches!(self.inner.slots.lock().get(source), Some(Slot::Ready(_)))
    }

    /// Whether a fetch for `source` is currently in flight.
    pub fn is_fetching(&self, source: &str) -> bool {
        matches!(
            self.inner.slots.lock().get(source),
            Some(Slot::Fetching { .. })
        )
    }

    /// Number of ready entries.
    pub fn len(&self) -> usize {
        self.inner
            .slots
            .lock()
            .values()
            .filter(|s| matches!(s, Slot::Ready(_)))
            .count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Sources with ready entries, sorted.
    pub fn sources(&self) -> Vec<String> {
        let mut sources: Vec<String> = self
            .inner
            .slots
            .lock()
            .iter()
            .filter(|(_, s)| matches!(s, Slot::Ready(_)))
            .map(|(k, _)| k.clone())
            .collect();
        sources.sort();
        sources
    }

    pub fn stats(&self) -> RegistryStats {
        self.inner.stats.lock().clone()
    }

    /// Drop every entry. Fetches still in flight finish for their waiters but
    /// are not stored.
    pub fn clear(&self) {
        let mut slots = self.inner.slots.lock();
        let dropped = slots.len();
        slots.clear();
        info!("Image registry cleared ({} entries)", dropped);
    }
}

impl RegistryInner {
    async fn run_fetch(self: Arc<Self>, source: String, generation: u64) -> Result<Arc<ImageData>> {
        let data = Arc::new(ImageData::new(source.clone()));
        let outcome = match self.fetcher.fetch(&source).await {
            Ok(fetched) => data.populate(fetched).map(|_| data),
            Err(e) => Err(e),
        };

        match &outcome {
            Ok(data) => {
                let mut slots = self.slots.lock();
                if Self::is_current(&slots, &source, generation) {
                    slots.insert(source.clone(), Slot::Ready(data.clone()));
                    debug!("Cached {}", sanitize_source(&source));
                } else {
                    debug!(
                        "Registry was cleared while fetching {}; not caching",
                        sanitize_source(&source)
                    );
                }
            }
            Err(_) => self.settle_failure(&source, generation),
        }

        outcome
    }

    /// Forget a failed fetch so the next resolve retries it.
    fn settle_failure(&self, source: &str, generation: u64) {
        let mut slots = self.slots.lock();
        if Self::is_current(&slots, source, generation) {
            slots.remove(source);
        }
        self.stats.lock().failures += 1;
    }

    fn is_current(slots: &HashMap<String, Slot>, source: &str, generation: u64) -> bool {
        matches!(
            slots.get(source),
            Some(Slot::Fetching { generation: g, .. }) if *g == generation
        )
    }
}

impl fmt::Debug for ImageRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ImageRegistry")
            .field("ready", &self.len())
            .field("stats", &self.stats())
            .finish()
    }
}
