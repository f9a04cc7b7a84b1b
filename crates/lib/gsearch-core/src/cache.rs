//! File-backed search result cache.
//!
//! The whole cache lives in one JSON document. Every read or write takes an
//! advisory lock on a sibling `.lock` file for just that operation, so several
//! processes can share a cache path. Reads never fail loudly: lock contention,
//! I/O errors and corrupt documents all degrade to a miss.

use std::collections::BTreeMap;
use std::error::Error;
use std::fmt;
use std::fs::{self, File, OpenOptions};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::Utc;
use fs2::FileExt;
use gsearch_store::{CacheEntry, CacheKey, SearchResult};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

const CACHE_FORMAT_VERSION: u32 = 1;

/// Configuration for the on-disk result cache.
#[derive(Debug, Clone)]
pub struct CacheConfig {
    pub path: PathBuf,
    pub lock_timeout: Duration,
    pub lock_poll_interval: Duration,
    pub ttl: Option<Duration>,
    pub max_entries: Option<usize>,
}

impl CacheConfig {
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock_timeout: Duration::from_secs(2),
            lock_poll_interval: Duration::from_millis(25),
            ttl: None,
            max_entries: None,
        }
    }

    #[must_use]
    pub const fn with_lock_timeout(mut self, lock_timeout: Duration) -> Self {
        self.lock_timeout = lock_timeout;
        self
    }

    #[must_use]
    pub const fn with_lock_poll_interval(mut self, lock_poll_interval: Duration) -> Self {
        self.lock_poll_interval = lock_poll_interval;
        self
    }

    #[must_use]
    pub const fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = Some(ttl);
        self
    }

    #[must_use]
    pub const fn with_max_entries(mut self, max_entries: usize) -> Self {
        self.max_entries = Some(max_entries);
        self
    }
}

#[derive(Debug)]
pub enum CacheError {
    Io(io::Error),
    Serialize(serde_json::Error),
    LockTimeout { path: PathBuf, waited: Duration },
}

impl fmt::Display for CacheError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Io(err) => write!(f, "cache I/O error: {err}"),
            Self::Serialize(err) => write!(f, "cache serialization error: {err}"),
            Self::LockTimeout { path, waited } => write!(
                f,
                "timed out after {}ms waiting for cache lock {}",
                waited.as_millis(),
                path.display()
            ),
        }
    }
}

impl Error for CacheError {}

impl From<io::Error> for CacheError {
    fn from(err: io::Error) -> Self {
        Self::Io(err)
    }
}

impl From<serde_json::Error> for CacheError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialize(err)
    }
}

pub type CacheResult<T> = Result<T, CacheError>;

#[derive(Debug, Serialize, Deserialize)]
struct CacheDocument {
    version: u32,
    #[serde(default)]
    entries: BTreeMap<CacheKey, CacheEntry>,
}

impl Default for CacheDocument {
    fn default() -> Self {
        Self {
            version: CACHE_FORMAT_VERSION,
            entries: BTreeMap::new(),
        }
    }
}

#[derive(Clone, Copy)]
enum LockMode {
    Shared,
    Exclusive,
}

/// Holds the advisory lock until dropped.
struct LockGuard {
    file: File,
}

impl Drop for LockGuard {
    fn drop(&mut self) {
        let _ = FileExt::unlock(&self.file);
    }
}

/// Key-value cache of search results persisted to a single file.
///
/// Clones share configuration; all coordination happens through the lock
/// file, so independent instances pointing at the same path are safe too.
#[derive(Debug, Clone)]
pub struct ResultCache {
    config: Arc<CacheConfig>,
    lock_path: PathBuf,
    scratch_path: PathBuf,
}

impl ResultCache {
    /// Opens a cache rooted at `config.path`, creating the parent directory.
    ///
    /// # Errors
    /// Returns `CacheError::Io` if the parent directory cannot be created.
    pub fn open(config: CacheConfig) -> CacheResult<Self> {
        if let Some(parent) = config.path.parent().filter(|dir| !dir.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        let lock_path = sibling_path(&config.path, "lock");
        let scratch_path = sibling_path(&config.path, "tmp");
        debug!(path = %config.path.display(), "opened result cache");
        Ok(Self {
            config: Arc::new(config),
            lock_path,
            scratch_path,
        })
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.config.path
    }

    #[must_use]
    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    /// Looks up fresh results for `key`. Any failure is logged and reported as a miss.
    #[must_use]
    pub fn get(&self, key: &CacheKey) -> Option<Vec<SearchResult>> {
        match self.lookup(key) {
            Ok(results) => results,
            Err(err) => {
                warn!(key = %key, error = %err, "cache read failed; treating as miss");
                None
            }
        }
    }

    /// Stores `entry`, replacing any previous results for its key.
    ///
    /// Expired entries are pruned and, when a capacity is configured, the
    /// oldest entries are evicted. A corrupt document is replaced.
    ///
    /// # Errors
    /// Returns `CacheError` if the lock cannot be acquired in time or the
    /// document cannot be written.
    pub fn put(&self, entry: CacheEntry) -> CacheResult<()> {
        let _guard = self.acquire(LockMode::Exclusive)?;
        let mut document = self.read_document().unwrap_or_else(|err| {
            warn!(error = %err, "discarding unreadable cache document");
            CacheDocument::default()
        });

        let now = Utc::now();
        let ttl = self.config.ttl;
        document.entries.retain(|_, existing| existing.is_fresh(ttl, now));

        let key = entry.key.clone();
        document.entries.insert(key.clone(), entry);

        if let Some(max_entries) = self.config.max_entries {
            evict_oldest(&mut document.entries, max_entries.max(1));
        }

        self.write_document(&document)?;
        debug!(key = %key, entries = document.entries.len(), "cache entry written");
        Ok(())
    }

    /// Number of entries currently stored, fresh or not.
    ///
    /// # Errors
    /// Returns `CacheError` if the document cannot be locked or read.
    pub fn len(&self) -> CacheResult<usize> {
        let _guard = self.acquire(LockMode::Shared)?;
        Ok(self.read_document()?.entries.len())
    }

    /// # Errors
    /// Returns `CacheError` if the document cannot be locked or read.
    pub fn is_empty(&self) -> CacheResult<bool> {
        Ok(self.len()? == 0)
    }

    /// Removes every entry.
    ///
    /// # Errors
    /// Returns `CacheError` if the lock cannot be acquired or the write fails.
    pub fn clear(&self) -> CacheResult<()> {
        let _guard = self.acquire(LockMode::Exclusive)?;
        self.write_document(&CacheDocument::default())
    }

    fn lookup(&self, key: &CacheKey) -> CacheResult<Option<Vec<SearchResult>>> {
        let _guard = self.acquire(LockMode::Shared)?;
        let mut document = self.read_document()?;
        let Some(entry) = document.entries.remove(key) else {
            return Ok(None);
        };
        if !entry.is_fresh(self.config.ttl, Utc::now()) {
            debug!(key = %key, "cache entry expired");
            return Ok(None);
        }
        Ok(Some(entry.results))
    }

    fn acquire(&self, mode: LockMode) -> CacheResult<LockGuard> {
        let file = OpenOptions::new()
            .create(true)
            .read(true)
            .write(true)
            .truncate(false)
            .open(&self.lock_path)?;
        let started = Instant::now();
        let contended = fs2::lock_contended_error().kind();
        loop {
            let attempt = match mode {
                LockMode::Shared => FileExt::try_lock_shared(&file),
                LockMode::Exclusive => FileExt::try_lock_exclusive(&file),
            };
            match attempt {
                Ok(()) => return Ok(LockGuard { file }),
                Err(err) if err.kind() == contended => {
                    let waited = started.elapsed();
                    if waited >= self.config.lock_timeout {
                        return Err(CacheError::LockTimeout {
                            path: self.lock_path.clone(),
                            waited,
                        });
                    }
                    std::thread::sleep(self.config.lock_poll_interval);
                }
                Err(err) => return Err(CacheError::Io(err)),
            }
        }
    }

    fn read_document(&self) -> CacheResult<CacheDocument> {
        let raw = match fs::read_to_string(&self.config.path) {
            Ok(raw) => raw,
            Err(err) if err.kind() == io::ErrorKind::NotFound => {
                return Ok(CacheDocument::default());
            }
            Err(err) => return Err(err.into()),
        };
        if raw.trim().is_empty() {
            return Ok(CacheDocument::default());
        }
        Ok(serde_json::from_str(&raw)?)
    }

    fn write_document(&self, document: &CacheDocument) -> CacheResult<()> {
        let payload = serde_json::to_vec(document)?;
        fs::write(&self.scratch_path, payload)?;
        fs::rename(&self.scratch_path, &self.config.path)?;
        Ok(())
    }
}

fn sibling_path(path: &Path, extension: &str) -> PathBuf {
    let mut name = path.file_name().map(ToOwned::to_owned).unwrap_or_default();
    name.push(".");
    name.push(extension);
    path.with_file_name(name)
}

fn evict_oldest(entries: &mut BTreeMap<CacheKey, CacheEntry>, max_entries: usize) {
    if entries.len() <= max_entries {
        return;
    }
    let mut by_age: Vec<_> = entries
        .iter()
        .map(|(key, entry)| (entry.cached_at, key.clone()))
        .collect();
    by_age.sort();
    let excess = entries.len() - max_entries;
    for (_, key) in by_age.into_iter().take(excess) {
        entries.remove(&key);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gsearch_store::SearchRequest;

    fn request(query: &str) -> SearchRequest {
        SearchRequest::new(query, 3, true, true).expect("valid request")
    }

    fn results(prefix: &str) -> Vec<SearchResult> {
        (1..=3)
            .map(|rank| {
                SearchResult::new(format!("{prefix} {rank}"), format!("https://{prefix}.test/{rank}"))
                    .with_description(format!("snippet {rank}"))
            })
            .collect()
    }

    fn open_cache(dir: &tempfile::TempDir) -> ResultCache {
        ResultCache::open(
            CacheConfig::new(dir.path().join("nested").join("cache.json"))
                .with_lock_timeout(Duration::from_millis(100))
                .with_lock_poll_interval(Duration::from_millis(5)),
        )
        .expect("open cache")
    }

    #[test]
    fn missing_file_is_a_miss() {
        let dir = tempfile::tempdir().expect("tempdir");
        let cache = open_cache(&dir);
        assert!(cache.get(&request("rust").cache_key()).is_none());
        assert!(cache.path().parent().expect("parent").is_dir());
    }

    #[test]
    fn put_then_get_preserves_order() {
        let dir = tempfile::tempdir().expect("tempdir");
        let cache = open_cache(&dir);
        let request = request("rust");
        let fetched = results("rust");

        cache
            .put(CacheEntry::new(&request, fetched.clone()))
            .expect("put");

        assert_eq!(cache.get(&request.cache_key()), Some(fetched));
        assert_eq!(cache.len().expect("len"), 1);
    }

    #[test]
    fn put_overwrites_previous_results() {
        let dir = tempfile::tempdir().expect("tempdir");
        let cache = open_cache(&dir);
        let request = request("rust");

        cache.put(CacheEntry::new(&request, results("old"))).expect("put");
        cache.put(CacheEntry::new(&request, results("new"))).expect("put");

        assert_eq!(cache.get(&request.cache_key()), Some(results("new")));
        assert_eq!(cache.len().expect("len"), 1);
    }

    #[test]
    fn corrupt_document_is_a_miss_and_is_repaired_on_put() {
        let dir = tempfile::tempdir().expect("tempdir");
        let cache = open_cache(&dir);
        fs::write(cache.path(), b"{ not json").expect("write garbage");
        let request = request("rust");

        assert!(cache.get(&request.cache_key()).is_none());

        cache.put(CacheEntry::new(&request, results("rust"))).expect("put");
        assert_eq!(cache.get(&request.cache_key()), Some(results("rust")));
    }

    #[test]
    fn expired_entries_miss_and_are_pruned() {
        let dir = tempfile::tempdir().expect("tempdir");
        let cache = ResultCache::open(
            CacheConfig::new(dir.path().join("cache.json")).with_ttl(Duration::from_secs(60)),
        )
        .expect("open cache");

        let stale_request = request("stale");
        let mut stale = CacheEntry::new(&stale_request, results("stale"));
        stale.cached_at = Utc::now() - chrono::Duration::seconds(600);
        cache.put(stale).expect("put stale");
        assert!(cache.get(&stale_request.cache_key()).is_none());

        let fresh_request = request("fresh");
        cache
            .put(CacheEntry::new(&fresh_request, results("fresh")))
            .expect("put fresh");
        assert_eq!(cache.len().expect("len"), 1);
        assert!(cache.get(&fresh_request.cache_key()).is_some());
    }

    #[test]
    fn capacity_evicts_oldest_entries() {
        let dir = tempfile::tempdir().expect("tempdir");
        let cache = ResultCache::open(
            CacheConfig::new(dir.path().join("cache.json")).with_max_entries(2),
        )
        .expect("open cache");

        let now = Utc::now();
        for (age, query) in [(30, "first"), (20, "second"), (10, "third")] {
            let mut entry = CacheEntry::new(&request(query), results(query));
            entry.cached_at = now - chrono::Duration::seconds(age);
            cache.put(entry).expect("put");
        }

        assert_eq!(cache.len().expect("len"), 2);
        assert!(cache.get(&request("first").cache_key()).is_none());
        assert!(cache.get(&request("second").cache_key()).is_some());
        assert!(cache.get(&request("third").cache_key()).is_some());
    }

    #[test]
    fn held_lock_degrades_reads_to_misses_and_fails_writes() {
        let dir = tempfile::tempdir().expect("tempdir");
        let cache = open_cache(&dir);
        let request = request("rust");
        cache.put(CacheEntry::new(&request, results("rust"))).expect("put");

        let holder = OpenOptions::new()
            .create(true)
            .read(true)
            .write(true)
            .truncate(false)
            .open(&cache.lock_path)
            .expect("open lock file");
        FileExt::lock_exclusive(&holder).expect("hold lock");

        assert!(cache.get(&request.cache_key()).is_none());
        let err = cache
            .put(CacheEntry::new(&request, results("other")))
            .unwrap_err();
        assert!(matches!(err, CacheError::LockTimeout { .. }));

        FileExt::unlock(&holder).expect("release lock");
        assert_eq!(cache.get(&request.cache_key()), Some(results("rust")));
    }

    #[test]
    fn clear_removes_everything() {
        let dir = tempfile::tempdir().expect("tempdir");
        let cache = open_cache(&dir);
        cache
            .put(CacheEntry::new(&request("rust"), results("rust")))
            .expect("put");
        cache.clear().expect("clear");
        assert!(cache.is_empty().expect("is_empty"));
    }

    #[test]
    fn sibling_paths_keep_the_original_name() {
        let path = Path::new("/tmp/cache/google_cache.json");
        assert_eq!(
            sibling_path(path, "lock"),
            PathBuf::from("/tmp/cache/google_cache.json.lock")
        );
    }
}
