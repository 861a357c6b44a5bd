//! In-memory implementation of the Store trait.
//!
//! Same semantics as SQLite, no persistence. Used by tests and by nodes that
//! only need a transient view of the chain.

use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use async_trait::async_trait;
use headex_core::{ExtendedHeader, HeaderHash};

use crate::error::{Result, StoreError};
use crate::traits::Store;

/// In-memory store implementation.
///
/// Thread-safe via RwLock. The head height is mirrored in an atomic so that
/// [`Store::height`] never takes the lock.
pub struct MemoryStore {
    inner: RwLock<MemoryStoreInner>,
    head_height: AtomicU64,
}

#[derive(Default)]
struct MemoryStoreInner {
    /// Headers indexed by hash.
    headers: HashMap<HeaderHash, ExtendedHeader>,

    /// Height index: height -> hash.
    heights: BTreeMap<u64, HeaderHash>,
}

impl MemoryStore {
    /// Create a new empty in-memory store.
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(MemoryStoreInner::default()),
            head_height: AtomicU64::new(0),
        }
    }

    /// Create a store pre-populated with `headers`.
    pub fn with_headers(headers: impl IntoIterator<Item = ExtendedHeader>) -> Result<Self> {
        let store = Self::new();
        {
            let mut inner = store.write()?;
            let headers: Vec<_> = headers.into_iter().collect();
            let top = inner.insert_all(&headers)?;
            store.head_height.fetch_max(top, Ordering::SeqCst);
        }
        Ok(store)
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, MemoryStoreInner>> {
        self.inner.read().map_err(|_| StoreError::LockPoisoned)
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, MemoryStoreInner>> {
        self.inner.write().map_err(|_| StoreError::LockPoisoned)
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStoreInner {
    /// Insert every header not already present. Returns the highest height
    /// inserted (0 if none were new).
    fn insert_all(&mut self, headers: &[ExtendedHeader]) -> Result<u64> {
        // Validate the whole batch first so a conflict leaves nothing behind.
        let mut fresh: BTreeMap<u64, (HeaderHash, &ExtendedHeader)> = BTreeMap::new();
        for header in headers {
            let hash = header.hash();
            if self.headers.contains_key(&hash) {
                continue;
            }
            let height = header.height();
            let taken = self
                .heights
                .get(&height)
                .copied()
                .or_else(|| fresh.get(&height).map(|(h, _)| *h));
            match taken {
                Some(existing) if existing == hash => continue,
                Some(existing) => {
                    return Err(StoreError::Conflict {
                        height,
                        existing: existing.to_hex(),
                    })
                }
                None => {
                    fresh.insert(height, (hash, header));
                }
            }
        }

        let top = fresh.keys().next_back().copied().unwrap_or(0);
        for (height, (hash, header)) in fresh {
            self.heights.insert(height, hash);
            self.headers.insert(hash, header.clone());
        }
        Ok(top)
    }

    fn by_height(&self, height: u64) -> Option<&ExtendedHeader> {
        self.heights.get(&height).and_then(|hash| self.headers.get(hash))
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn init(&self, initial: &ExtendedHeader) -> Result<()> {
        let mut inner = self.write()?;
        if !inner.headers.is_empty() {
            return Err(StoreError::AlreadyInitialized);
        }
        let top = inner.insert_all(std::slice::from_ref(initial))?;
        self.head_height.store(top, Ordering::SeqCst);
        Ok(())
    }

    async fn head(&self) -> Result<ExtendedHeader> {
        let inner = self.read()?;
        let height = self.head_height.load(Ordering::SeqCst);
        inner
            .by_height(height)
            .cloned()
            .ok_or_else(|| StoreError::NotFound("store is empty".into()))
    }

    fn height(&self) -> u64 {
        self.head_height.load(Ordering::SeqCst)
    }

    async fn get(&self, hash: &HeaderHash) -> Result<ExtendedHeader> {
        let inner = self.read()?;
        inner
            .headers
            .get(hash)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(format!("hash {}", hash)))
    }

    async fn get_by_height(&self, height: u64) -> Result<ExtendedHeader> {
        let inner = self.read()?;
        inner
            .by_height(height)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(format!("height {}", height)))
    }

    async fn get_range_by_height(&self, from: u64, to: u64) -> Result<Vec<ExtendedHeader>> {
        if to <= from {
            return Err(StoreError::InvalidRange { from, to });
        }
        if to - 1 > self.height() {
            return Err(StoreError::NotFound(format!("height {}", to - 1)));
        }

        let inner = self.read()?;
        (from..to)
            .map(|height| {
                inner
                    .by_height(height)
                    .cloned()
                    .ok_or_else(|| StoreError::NotFound(format!("height {}", height)))
            })
            .collect()
    }

    async fn has(&self, hash: &HeaderHash) -> Result<bool> {
        Ok(self.read()?.headers.contains_key(hash))
    }

    async fn append(&self, headers: &[ExtendedHeader]) -> Result<usize> {
        let mut inner = self.write()?;
        let before = inner.headers.len();
        let top = inner.insert_all(headers)?;
        self.head_height.fetch_max(top, Ordering::SeqCst);
        Ok(inner.headers.len() - before)
    }
}
