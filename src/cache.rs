//! Generational key/value cache over named buckets
//!
//! Keys are a bucket name plus ordered named parameters. Invalidation
//! matches on the parameter subset that is bound: invalidating a bucket with
//! no parameters clears every entry in it, invalidating with `project = x`
//! clears every entry whose `project` parameter is `x` regardless of its
//! other parameters.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

/// Ceiling applied to every entry's TTL, matching the 30-day maximum of the
/// shared cache backend the original deployment used.
pub const MAX_CACHE_TTL: Duration = Duration::from_secs(2_591_999);

/// A bucket plus ordered named parameters. Two keys are equal iff the bucket
/// and every parameter value match.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    bucket: String,
    params: Vec<(String, String)>,
}

impl CacheKey {
    pub fn new(bucket: impl Into<String>) -> Self {
        Self {
            bucket: bucket.into(),
            params: Vec::new(),
        }
    }

    pub fn with(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.params.push((name.into(), value.into()));
        self
    }

    pub fn bucket(&self) -> &str {
        &self.bucket
    }

    /// Whether `self` (a possibly partial key) selects `entry`: same bucket,
    /// and every parameter bound on `self` present on `entry` with the same
    /// value.
    fn selects(&self, entry: &CacheKey) -> bool {
        self.bucket == entry.bucket
            && self
                .params
                .iter()
                .all(|(name, value)| entry.params.iter().any(|(n, v)| n == name && v == value))
    }
}

/// Durable cache contract. Implementations must tolerate concurrent readers;
/// writes are last-writer-wins and re-setting the same key is always safe.
pub trait Cache: Send + Sync {
    fn get(&self, key: &CacheKey) -> Option<String>;

    /// Store a value. `ttl` is clamped to [`MAX_CACHE_TTL`]; `None` means
    /// "as long as allowed".
    fn set(&self, key: &CacheKey, value: String, ttl: Option<Duration>);

    /// Remove every entry the (possibly partial) key selects.
    fn invalidate(&self, key: &CacheKey);
}

struct Entry {
    value: String,
    expires_at: Instant,
}

/// In-process cache with TTL expiry and subset invalidation
#[derive(Default)]
pub struct MemoryCache {
    entries: Mutex<HashMap<CacheKey, Entry>>,
}

impl MemoryCache {
    pub fn new() -> Self {
        Self::default()
    }

    #[cfg(test)]
    pub fn len(&self) -> usize {
        self.entries.lock().unwrap().len()
    }
}

impl Cache for MemoryCache {
    fn get(&self, key: &CacheKey) -> Option<String> {
        let mut entries = self.entries.lock().unwrap();
        match entries.get(key) {
            Some(entry) if entry.expires_at > Instant::now() => Some(entry.value.clone()),
            Some(_) => {
                entries.remove(key);
                None
            }
            None => None,
        }
    }

    fn set(&self, key: &CacheKey, value: String, ttl: Option<Duration>) {
        let ttl = ttl.unwrap_or(MAX_CACHE_TTL).min(MAX_CACHE_TTL);
        let entry = Entry {
            value,
            expires_at: Instant::now() + ttl,
        };
        self.entries.lock().unwrap().insert(key.clone(), entry);
    }

    fn invalidate(&self, key: &CacheKey) {
        self.entries
            .lock()
            .unwrap()
            .retain(|entry_key, _| !key.selects(entry_key));
    }
}

/// Cache that stores nothing: `get` always misses, `set`/`invalidate` are
/// no-ops. Used to disable caching entirely without touching call sites.
pub struct NoopCache;

impl Cache for NoopCache {
    fn get(&self, _key: &CacheKey) -> Option<String> {
        None
    }

    fn set(&self, _key: &CacheKey, _value: String, _ttl: Option<Duration>) {}

    fn invalidate(&self, _key: &CacheKey) {}
}
