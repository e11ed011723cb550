use std::{
    collections::HashMap,
    future::Future,
    sync::{Arc, Mutex, MutexGuard, PoisonError},
};

use tokio::sync::watch;

use super::{lru::LruOrder, ThumbnailError};

/// Produces and frees the textures a `ThumbnailCache` holds.
pub trait ThumbnailLoader: Send + Sync + 'static {
    type Texture: Clone + Send + Sync + 'static;

    fn load(&self, url: &str) -> impl Future<Output = Result<Self::Texture, ThumbnailError>> + Send;

    /// Frees the GPU side of an evicted texture. Called once per eviction.
    fn release(&self, texture: &Self::Texture);
}

/// `None` until the load settles, then `Some(None)` on failure.
type Outcome<T> = Option<Option<T>>;

pub enum CacheEntry<T> {
    /// A load in flight. Every caller for the URL waits on the same channel.
    Pending(watch::Receiver<Outcome<T>>),
    Ready(T),
}

impl<T> CacheEntry<T> {
    pub fn is_ready(&self) -> bool {
        matches!(self, CacheEntry::Ready(_))
    }
}

struct Store<T> {
    entries: HashMap<String, CacheEntry<T>>,
    /// Ready entries only. Pending loads are never eviction candidates.
    recency: LruOrder<String>,
}

impl<T> Store<T> {
    fn evict_over_limit(&mut self, limit: usize) -> Vec<T> {
        let mut evicted = Vec::new();
        while self.recency.len() > limit {
            let Some(url) = self.recency.pop_oldest() else {
                break;
            };
            if let Some(CacheEntry::Ready(texture)) = self.entries.remove(&url) {
                evicted.push(texture);
            }
        }
        evicted
    }
}

struct Shared<L: ThumbnailLoader> {
    label: &'static str,
    limit: usize,
    loader: L,
    store: Mutex<Store<L::Texture>>,
}

impl<L: ThumbnailLoader> Shared<L> {
    fn lock(&self) -> MutexGuard<'_, Store<L::Texture>> {
        self.store.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn settle(&self, url: &str, outcome: Option<L::Texture>) {
        let evicted = {
            let mut store = self.lock();
            match outcome {
                Some(texture) => {
                    let key = url.to_owned();
                    store.recency.touch(&key);
                    store.entries.insert(key, CacheEntry::Ready(texture));
                    store.evict_over_limit(self.limit)
                }
                None => {
                    store.entries.remove(url);
                    Vec::new()
                }
            }
        };
        if !evicted.is_empty() {
            log::debug!("{} cache evicted {} thumbnail(s)", self.label, evicted.len());
        }
        for texture in &evicted {
            self.loader.release(texture);
        }
    }
}

enum Claim<T> {
    Hit(T),
    Wait(watch::Receiver<Outcome<T>>),
}

/// Bounded, deduplicating thumbnail cache keyed by URL.
///
/// Loads run as detached tasks on the ambient tokio runtime: dropping a `get`
/// future never cancels the load, so other waiters still see its result and
/// the texture is still cached.
pub struct ThumbnailCache<L: ThumbnailLoader> {
    shared: Arc<Shared<L>>,
}

impl<L: ThumbnailLoader> Clone for ThumbnailCache<L> {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
        }
    }
}

impl<L: ThumbnailLoader> ThumbnailCache<L> {
    /// `limit` is clamped to at least one ready entry.
    pub fn new(label: &'static str, loader: L, limit: usize) -> Self {
        Self {
            shared: Arc::new(Shared {
                label,
                limit: limit.max(1),
                loader,
                store: Mutex::new(Store {
                    entries: HashMap::new(),
                    recency: LruOrder::default(),
                }),
            }),
        }
    }

    pub fn limit(&self) -> usize {
        self.shared.limit
    }

    /// Resolves to the texture for `url`, or `None` if loading failed. A
    /// failed URL is forgotten, so the next call loads it again.
    pub async fn get(&self, url: &str) -> Option<L::Texture> {
        let mut pending = match self.claim(url) {
            Claim::Hit(texture) => return Some(texture),
            Claim::Wait(pending) => pending,
        };
        let outcome = pending.wait_for(Option::is_some).await.ok()?;
        (*outcome).clone().flatten()
    }

    /// Number of ready textures held.
    pub fn ready_len(&self) -> usize {
        self.shared.lock().recency.len()
    }

    pub fn is_ready(&self, url: &str) -> bool {
        self.shared
            .lock()
            .entries
            .get(url)
            .is_some_and(CacheEntry::is_ready)
    }

    pub fn is_pending(&self, url: &str) -> bool {
        matches!(self.shared.lock().entries.get(url), Some(CacheEntry::Pending(_)))
    }

    /// Least recently used first.
    pub fn ready_urls(&self) -> Vec<String> {
        self.shared.lock().recency.iter().cloned().collect()
    }

    fn claim(&self, url: &str) -> Claim<L::Texture> {
        let mut store = self.shared.lock();
        match store.entries.get(url) {
            Some(CacheEntry::Ready(texture)) => {
                let texture = texture.clone();
                store.recency.touch(&url.to_owned());
                return Claim::Hit(texture);
            }
            // A load task that died without settling leaves a closed channel
            // behind; replace it rather than waiting forever.
            Some(CacheEntry::Pending(pending)) if pending.has_changed().is_ok() => {
                return Claim::Wait(pending.clone());
            }
            _ => {}
        }

        let (sender, receiver) = watch::channel(None);
        store
            .entries
            .insert(url.to_owned(), CacheEntry::Pending(receiver.clone()));
        drop(store);

        self.spawn_load(url.to_owned(), sender);
        Claim::Wait(receiver)
    }

    fn spawn_load(&self, url: String, sender: watch::Sender<Outcome<L::Texture>>) {
        let shared = Arc::clone(&self.shared);
        tokio::spawn(async move {
            let outcome = match shared.loader.load(&url).await {
                Ok(texture) => Some(texture),
                Err(error) => {
                    log::warn!("{} thumbnail for {url} failed: {error}", shared.label);
                    None
                }
            };
            shared.settle(&url, outcome.clone());
            sender.send_replace(Some(outcome));
        });
    }
}
