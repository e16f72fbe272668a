//! Caches for memoized flows, structures, probes and whole repositories.
//!
//! Values are opaque text blobs (JSON produced by serde); entries carry an
//! absolute expiry and are evicted lazily when read after it.

use std::collections::HashMap;
use std::fmt::{Debug, Formatter};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, PoisonError, RwLock};
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::{debug, warn};

use crate::SdmxError;

/// Key/value store with per-entry time to live.
pub trait Cache: Send + Sync {
    fn get(&self, key: &str) -> Option<String>;

    fn put(&self, key: &str, value: String, ttl: Duration);
}

/// Reads a JSON value; undecodable entries count as misses.
pub fn get_json<T: DeserializeOwned>(cache: &dyn Cache, key: &str) -> Option<T> {
    let text = cache.get(key)?;
    match serde_json::from_str(&text) {
        Ok(value) => Some(value),
        Err(error) => {
            debug!(key, error = %error, "ignoring undecodable cache entry");
            None
        }
    }
}

/// Stores a JSON value; values that fail to serialize are not cached.
pub fn put_json<T: Serialize>(cache: &dyn Cache, key: &str, value: &T, ttl: Duration) {
    match serde_json::to_string(value) {
        Ok(text) => cache.put(key, text, ttl),
        Err(error) => debug!(key, error = %error, "value not cached"),
    }
}

#[derive(Debug, Clone)]
struct Entry {
    value: String,
    expires_at: Instant,
}

/// Thread-safe in-memory cache with evict-on-read expiry.
#[derive(Debug, Clone, Default)]
pub struct TtlCache {
    map: Arc<RwLock<HashMap<String, Entry>>>,
}

impl TtlCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored entries, expired ones included.
    pub fn len(&self) -> usize {
        self.map.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&self) {
        self.map.write().unwrap_or_else(PoisonError::into_inner).clear();
    }
}

impl Cache for TtlCache {
    fn get(&self, key: &str) -> Option<String> {
        let now = Instant::now();
        {
            let map = self.map.read().unwrap_or_else(PoisonError::into_inner);
            match map.get(key) {
                None => return None,
                Some(entry) if now < entry.expires_at => return Some(entry.value.clone()),
                Some(_) => {}
            }
        }

        let mut map = self.map.write().unwrap_or_else(PoisonError::into_inner);
        if map.get(key).is_some_and(|entry| now >= entry.expires_at) {
            map.remove(key);
        }
        None
    }

    fn put(&self, key: &str, value: String, ttl: Duration) {
        let expires_at = Instant::now() + ttl;
        self.map
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(key.to_owned(), Entry { value, expires_at });
    }
}

/// Cache that stores nothing.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopCache;

impl Cache for NoopCache {
    fn get(&self, _key: &str) -> Option<String> {
        None
    }

    fn put(&self, _key: &str, _value: String, _ttl: Duration) {}
}

type HitListener = Box<dyn Fn(&str, bool) + Send + Sync>;

/// Reports hits and misses of a delegate cache without changing its results.
pub struct VerboseCache<C> {
    inner: C,
    listener: Option<HitListener>,
}

impl<C: Cache> VerboseCache<C> {
    pub fn new(inner: C) -> Self {
        Self {
            inner,
            listener: None,
        }
    }

    /// Also calls `listener(key, hit)` on every read.
    pub fn with_listener<F>(mut self, listener: F) -> Self
    where
        F: Fn(&str, bool) + Send + Sync + 'static,
    {
        self.listener = Some(Box::new(listener));
        self
    }

    pub fn inner(&self) -> &C {
        &self.inner
    }
}

impl<C> Debug for VerboseCache<C>
where
    C: Debug,
{
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VerboseCache")
            .field("inner", &self.inner)
            .finish_non_exhaustive()
    }
}

impl<C: Cache> Cache for VerboseCache<C> {
    fn get(&self, key: &str) -> Option<String> {
        let value = self.inner.get(key);
        let hit = value.is_some();
        debug!(key, hit, "cache read");
        if let Some(listener) = &self.listener {
            listener(key, hit);
        }
        value
    }

    fn put(&self, key: &str, value: String, ttl: Duration) {
        debug!(key, ttl_ms = millis(ttl), "cache write");
        self.inner.put(key, value, ttl);
    }
}

type ErrorCallback = Arc<dyn Fn(&SdmxError) + Send + Sync>;

#[derive(Debug, Serialize, Deserialize)]
struct FileEntry {
    key: String,
    expires_at_ms: u64,
    value: String,
}

/// Cache persisting one JSON file per entry under a directory.
///
/// Read and write failures are handed to the error callback and behave as a
/// miss or a skipped write.
#[derive(Clone)]
pub struct FileCache {
    root: PathBuf,
    on_error: ErrorCallback,
}

impl Debug for FileCache {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FileCache")
            .field("root", &self.root)
            .finish_non_exhaustive()
    }
}

impl FileCache {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            on_error: Arc::new(|error: &SdmxError| warn!(error = %error, "file cache failure")),
        }
    }

    pub fn with_error_callback<F>(mut self, on_error: F) -> Self
    where
        F: Fn(&SdmxError) + Send + Sync + 'static,
    {
        self.on_error = Arc::new(on_error);
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn path_of(&self, key: &str) -> PathBuf {
        self.root.join(format!("{}.json", entry_name(key)))
    }

    fn read(&self, path: &Path, key: &str) -> Result<Option<String>, SdmxError> {
        if !path.exists() {
            return Ok(None);
        }
        let text = fs::read_to_string(path)?;
        let entry: FileEntry = serde_json::from_str(&text).map_err(|error| {
            SdmxError::io_caused_by(format!("corrupt cache entry '{}'", path.display()), error)
        })?;
        if entry.key != key {
            return Ok(None);
        }
        if entry.expires_at_ms <= now_ms() {
            fs::remove_file(path)?;
            return Ok(None);
        }
        Ok(Some(entry.value))
    }

    fn write(&self, path: &Path, entry: &FileEntry) -> Result<(), SdmxError> {
        fs::create_dir_all(&self.root)?;
        let text = serde_json::to_string(entry).map_err(|error| {
            SdmxError::io_caused_by("cannot serialize cache entry", error)
        })?;
        fs::write(path, text)?;
        Ok(())
    }
}

impl Cache for FileCache {
    fn get(&self, key: &str) -> Option<String> {
        let path = self.path_of(key);
        self.read(&path, key).unwrap_or_else(|error| {
            (self.on_error)(&error);
            None
        })
    }

    fn put(&self, key: &str, value: String, ttl: Duration) {
        let entry = FileEntry {
            key: key.to_owned(),
            expires_at_ms: now_ms().saturating_add(millis(ttl)),
            value,
        };
        if let Err(error) = self.write(&self.path_of(key), &entry) {
            (self.on_error)(&error);
        }
    }
}

fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(millis)
        .unwrap_or_default()
}

fn millis(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}

/// Hex SHA-256 of the key, used as entry file name.
fn entry_name(key: &str) -> String {
    hex::encode(Sha256::digest(key.as_bytes()))
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::thread;

    use super::*;

    #[test]
    fn ttl_cache_evicts_on_read() {
        let cache = TtlCache::new();
        cache.put("k", String::from("v"), Duration::from_millis(100));
        assert_eq!(cache.get("k"), Some(String::from("v")));

        thread::sleep(Duration::from_millis(150));
        assert_eq!(cache.get("k"), None);
        assert_eq!(cache.len(), 0);
        assert_eq!(cache.get("k"), None);
    }

    #[test]
    fn ttl_cache_overwrites() {
        let cache = TtlCache::new();
        cache.put("k", String::from("v1"), Duration::from_secs(60));
        cache.put("k", String::from("v2"), Duration::from_secs(60));
        assert_eq!(cache.get("k"), Some(String::from("v2")));
        assert_eq!(cache.get("missing"), None);
    }

    #[test]
    fn noop_cache_never_hits() {
        let cache = NoopCache;
        cache.put("k", String::from("v"), Duration::from_secs(60));
        assert_eq!(cache.get("k"), None);
    }

    #[test]
    fn verbose_cache_reports_and_passes_through() {
        let hits = Arc::new(AtomicUsize::new(0));
        let misses = Arc::new(AtomicUsize::new(0));
        let (hit_counter, miss_counter) = (Arc::clone(&hits), Arc::clone(&misses));
        let cache = VerboseCache::new(TtlCache::new()).with_listener(move |_, hit| {
            if hit {
                hit_counter.fetch_add(1, Ordering::SeqCst);
            } else {
                miss_counter.fetch_add(1, Ordering::SeqCst);
            }
        });

        assert_eq!(cache.get("k"), None);
        cache.put("k", String::from("v"), Duration::from_secs(60));
        assert_eq!(cache.get("k"), Some(String::from("v")));
        assert_eq!(hits.load(Ordering::SeqCst), 1);
        assert_eq!(misses.load(Ordering::SeqCst), 1);
        assert_eq!(cache.inner().len(), 1);
    }

    #[test]
    fn json_helpers_round_trip_and_ignore_garbage() {
        let cache = TtlCache::new();
        put_json(&cache, "numbers", &vec![1, 2, 3], Duration::from_secs(60));
        assert_eq!(get_json::<Vec<i32>>(&cache, "numbers"), Some(vec![1, 2, 3]));

        cache.put("garbage", String::from("{"), Duration::from_secs(60));
        assert_eq!(get_json::<Vec<i32>>(&cache, "garbage"), None);
    }

    #[test]
    fn file_cache_persists_and_expires() {
        let dir = tempfile::tempdir().expect("temp dir");
        let cache = FileCache::new(dir.path());

        cache.put("flows", String::from("[]"), Duration::from_secs(60));
        assert_eq!(FileCache::new(dir.path()).get("flows"), Some(String::from("[]")));

        cache.put("short", String::from("x"), Duration::ZERO);
        assert_eq!(cache.get("short"), None);
    }

    #[test]
    fn ttl_cache_survives_a_panicking_writer() {
        let cache = TtlCache::new();
        cache.put("kept", String::from("v"), Duration::from_secs(60));

        let shared = cache.clone();
        let outcome = thread::spawn(move || {
            let _guard = shared.map.write().unwrap_or_else(PoisonError::into_inner);
            panic!("writer crashed");
        })
        .join();
        assert!(outcome.is_err());
        assert!(cache.map.is_poisoned());

        assert_eq!(cache.get("kept"), Some(String::from("v")));
        cache.put("after", String::from("w"), Duration::from_secs(60));
        assert_eq!(cache.len(), 2);
    }

    #[test]
    fn file_cache_names_entries_by_key_digest() {
        let dir = tempfile::tempdir().expect("temp dir");
        let cache = FileCache::new(dir.path());

        let path = cache.path_of("sdmx:web:flows");
        let name = path.file_stem().and_then(|stem| stem.to_str()).expect("utf-8 name");
        assert_eq!(name.len(), 64);
        assert!(name.chars().all(|c| c.is_ascii_hexdigit()));
        assert_eq!(path, cache.path_of("sdmx:web:flows"));
        assert_ne!(path, cache.path_of("sdmx:web:flow"));
        assert_eq!(
            entry_name(""),
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
    }

    #[test]
    fn file_cache_reports_errors_and_degrades_to_miss() {
        let dir = tempfile::tempdir().expect("temp dir");
        let errors = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&errors);
        let cache = FileCache::new(dir.path()).with_error_callback(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        fs::write(cache.path_of("k"), "not json").expect("write garbage");
        assert_eq!(cache.get("k"), None);
        assert_eq!(errors.load(Ordering::SeqCst), 1);
    }
}
