use lru::LruCache;
use std::num::NonZeroUsize;
use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock};
use tracing::{debug, warn};

use crate::config::IndexOptions;
use crate::error::Result;
use crate::index::ArchiveIndex;

const DEFAULT_CAPACITY: NonZeroUsize = NonZeroUsize::new(100).unwrap();

/// In-memory cache for archive indexes.
///
/// Entries are keyed by archive path and rebuilt when the archive's
/// modification time changes. Two threads missing on the same archive at the
/// same time will both build it; the later insert wins.
pub struct IndexCache {
    /// LRU cache mapping archive paths to indexes
    cache: Arc<RwLock<LruCache<PathBuf, Arc<ArchiveIndex>>>>,
    options: IndexOptions,
}

impl IndexCache {
    /// Create a new index cache with a maximum number of entries
    pub fn new(capacity: usize) -> Self {
        let cache = LruCache::new(NonZeroUsize::new(capacity).unwrap_or(DEFAULT_CAPACITY));
        IndexCache {
            cache: Arc::new(RwLock::new(cache)),
            options: IndexOptions::default(),
        }
    }

    /// Options used for indexes this cache builds
    pub fn with_options(mut self, options: IndexOptions) -> Self {
        self.options = options;
        self
    }

    /// Get an index from the cache, without checking whether it is stale
    pub fn get<P: AsRef<Path>>(&self, archive_path: P) -> Option<Arc<ArchiveIndex>> {
        let mut cache = self.cache.write().ok()?;
        cache.get(archive_path.as_ref()).cloned()
    }

    /// Put an index into the cache under its archive path
    pub fn put(&self, index: Arc<ArchiveIndex>) {
        if let Ok(mut cache) = self.cache.write() {
            cache.put(index.archive_path().to_path_buf(), index);
        }
    }

    /// Drop the cached index for one archive
    pub fn invalidate<P: AsRef<Path>>(&self, archive_path: P) {
        if let Ok(mut cache) = self.cache.write() {
            cache.pop(archive_path.as_ref());
        }
    }

    /// Return the cached index for `archive_path`, building it if it is
    /// missing or the archive changed since it was built
    pub fn get_or_build<P: AsRef<Path>>(&self, archive_path: P) -> Result<Arc<ArchiveIndex>> {
        let archive_path = archive_path.as_ref();

        if let Some(index) = self.get(archive_path) {
            if !index.is_stale()? {
                debug!("index cache hit for {}", archive_path.display());
                return Ok(index);
            }
            debug!("cached index for {} is stale", archive_path.display());
        }

        let index = Arc::new(ArchiveIndex::build_with(archive_path, self.options)?);
        self.put(Arc::clone(&index));
        Ok(index)
    }

    /// Like [`get_or_build`](Self::get_or_build), but backed by a snapshot
    /// file.
    ///
    /// A snapshot at `index_path` is used when it was built from the same
    /// archive and the archive has not been modified since. Otherwise the
    /// archive is re-indexed and the snapshot rewritten.
    pub fn load_or_build<P, Q>(&self, archive_path: P, index_path: Q) -> Result<Arc<ArchiveIndex>>
    where
        P: AsRef<Path>,
        Q: AsRef<Path>,
    {
        let archive_path = archive_path.as_ref();
        let index_path = index_path.as_ref();

        if let Some(index) = self.get(archive_path) {
            if !index.is_stale()? {
                return Ok(index);
            }
        }

        if index_path.exists() {
            match ArchiveIndex::load(index_path) {
                Ok(index) if index.archive_path() == archive_path => {
                    if !index.is_stale()? {
                        debug!("loaded index snapshot {}", index_path.display());
                        let index = Arc::new(index);
                        self.put(Arc::clone(&index));
                        return Ok(index);
                    }
                    debug!("snapshot {} is out of date", index_path.display());
                }
                Ok(index) => {
                    debug!(
                        "snapshot {} belongs to {}, not {}",
                        index_path.display(),
                        index.archive_path().display(),
                        archive_path.display()
                    );
                }
                Err(e) => {
                    warn!("ignoring unreadable snapshot {}: {e}", index_path.display());
                }
            }
        }

        let index = Arc::new(ArchiveIndex::build_with(archive_path, self.options)?);
        index.save(index_path)?;
        self.put(Arc::clone(&index));
        Ok(index)
    }

    /// Clear the cache
    pub fn clear(&self) {
        if let Ok(mut cache) = self.cache.write() {
            cache.clear();
        }
    }

    /// Get cache statistics
    pub fn len(&self) -> usize {
        self.cache.read().ok().map(|c| c.len()).unwrap_or(0)
    }

    /// Check if cache is empty
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Clone for IndexCache {
    fn clone(&self) -> Self {
        IndexCache {
            cache: Arc::clone(&self.cache),
            options: self.options,
        }
    }
}
