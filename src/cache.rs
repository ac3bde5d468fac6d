use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;
use tracing::debug;

struct Entry<V> {
    value: V,
    stored_at: Instant,
    ttl: Duration,
    /// Whether a successful fetch has ever produced this entry. Placeholder
    /// values written before the first success stay unwarmed so a default
    /// zero is never mistaken for a real, freshly fetched zero.
    warmed: bool,
}

impl<V> Entry<V> {
    fn is_fresh(&self) -> bool {
        self.stored_at.elapsed() <= self.ttl
    }
}

/// In-memory TTL cache, one entry per key, overwritten wholesale on refresh.
///
/// Shared across all concurrent queries; concurrent misses for the same key
/// may each fetch upstream and the last writer wins on insertion. Entries
/// are never deleted, only superseded or left to go stale.
#[derive(Clone)]
pub struct TtlCache<V>
where
    V: Clone + Send + Sync + 'static,
{
    inner: Arc<Mutex<HashMap<String, Entry<V>>>>,
    ttl: Duration,
}

impl<V> TtlCache<V>
where
    V: Clone + Send + Sync,
{
    pub fn new(ttl: Duration) -> Self {
        Self {
            inner: Arc::new(Mutex::new(HashMap::new())),
            ttl,
        }
    }

    /// Fresh hit only: entry exists, within its TTL, and warmed. Returns the
    /// value together with the entry's remaining lifetime, so a hit late in
    /// the TTL window is not advertised as good for the full window again.
    pub async fn get(&self, key: &str) -> Option<(V, Duration)> {
        let cache = self.inner.lock().await;
        match cache.get(key) {
            Some(entry) if entry.is_fresh() && entry.warmed => {
                debug!("Cache HIT for key: {key}");
                let remaining = entry.ttl.saturating_sub(entry.stored_at.elapsed());
                Some((entry.value.clone(), remaining))
            }
            Some(entry) if !entry.warmed => {
                debug!("Cache entry unwarmed for key: {key}");
                None
            }
            Some(_) => {
                debug!("Cache entry expired for key: {key}");
                None
            }
            None => {
                debug!("Cache MISS for key: {key}");
                None
            }
        }
    }

    /// Emergency fallback: a warmed entry at any age. Used only when a
    /// refresh has totally failed and serving stale beats serving nothing.
    pub async fn get_stale(&self, key: &str) -> Option<V> {
        let cache = self.inner.lock().await;
        cache
            .get(key)
            .filter(|entry| entry.warmed)
            .map(|entry| entry.value.clone())
    }

    /// Stores a successfully fetched value under the default TTL.
    pub async fn put(&self, key: &str, value: V) {
        self.put_with_ttl(key, value, self.ttl).await;
    }

    /// Stores a successfully fetched value with an explicit TTL (degraded
    /// aggregates use a shorter window than clean ones).
    pub async fn put_with_ttl(&self, key: &str, value: V, ttl: Duration) {
        let mut cache = self.inner.lock().await;
        debug!("Cache PUT for key: {key}");
        cache.insert(
            key.to_string(),
            Entry {
                value,
                stored_at: Instant::now(),
                ttl,
                warmed: true,
            },
        );
    }

    /// Stores a default value that no successful fetch has backed yet.
    /// Unwarmed entries are invisible to both [`Self::get`] and
    /// [`Self::get_stale`]: the write records that the key was attempted and,
    /// by refusing to clobber a warmed entry, keeps any stale value available
    /// for the emergency fallback until a real fetch supersedes it.
    pub async fn put_placeholder(&self, key: &str, value: V) {
        let mut cache = self.inner.lock().await;
        // A placeholder must not clobber a previously warmed entry.
        if cache.get(key).is_some_and(|entry| entry.warmed) {
            debug!("Skipping placeholder over warmed entry for key: {key}");
            return;
        }
        debug!("Cache PUT (placeholder) for key: {key}");
        cache.insert(
            key.to_string(),
            Entry {
                value,
                stored_at: Instant::now(),
                ttl: self.ttl,
                warmed: false,
            },
        );
    }
}
