// src/hierarchy/cache.rs
use std::collections::HashMap;
use std::ops::Deref;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use serde::{Serialize, Serializer};

use crate::error::{Error, Result};
use crate::types::PageId;

/// Ancestor titles of a page, root first. The page's own title is not included.
///
/// Backed by a shared slice so handing an entry out of the cache is a refcount bump.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Breadcrumb(Arc<[String]>);

impl Breadcrumb {
    /// Breadcrumb of a root page.
    pub fn root() -> Self {
        Self(Arc::from(Vec::new()))
    }

    /// Breadcrumb of a child whose parent has this breadcrumb and `parent_title`.
    ///
    /// Copies the ancestor titles into a new slice, so the cost grows with depth.
    /// It never reads the store; the saving is the avoided parent-link walk.
    pub fn extend(&self, parent_title: &str) -> Self {
        let mut titles = Vec::with_capacity(self.0.len() + 1);
        titles.extend_from_slice(&self.0);
        titles.push(parent_title.to_string());
        Self(titles.into())
    }

    pub fn titles(&self) -> &[String] {
        &self.0
    }

    pub fn to_vec(&self) -> Vec<String> {
        self.0.to_vec()
    }
}

impl Default for Breadcrumb {
    fn default() -> Self {
        Self::root()
    }
}

impl Deref for Breadcrumb {
    type Target = [String];

    fn deref(&self) -> &[String] {
        &self.0
    }
}

impl From<Vec<String>> for Breadcrumb {
    fn from(titles: Vec<String>) -> Self {
        Self(titles.into())
    }
}

impl Serialize for Breadcrumb {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_seq(self.0.iter())
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CacheStats {
    pub entries: usize,
    pub hits: u64,
    pub misses: u64,
    pub evictions: u64,
}

/// Process-wide breadcrumb map. Owned by whoever composes the service and
/// shared with the engine through an `Arc`; nothing here is static.
#[derive(Debug, Default)]
pub struct BreadcrumbCache {
    entries: RwLock<HashMap<PageId, Breadcrumb>>,
    hits: AtomicU64,
    misses: AtomicU64,
    evictions: AtomicU64,
}

impl BreadcrumbCache {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, HashMap<PageId, Breadcrumb>>> {
        self.entries
            .read()
            .map_err(|_| Error::Poisoned("breadcrumb cache"))
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, HashMap<PageId, Breadcrumb>>> {
        self.entries
            .write()
            .map_err(|_| Error::Poisoned("breadcrumb cache"))
    }

    /// Reader-facing lookup; counts toward hit/miss stats.
    pub fn lookup(&self, id: PageId) -> Result<Option<Breadcrumb>> {
        let found = self.read()?.get(&id).cloned();
        let counter = if found.is_some() {
            &self.hits
        } else {
            &self.misses
        };
        counter.fetch_add(1, Ordering::Relaxed);
        Ok(found)
    }

    /// Lookup used internally by derivation and verification; not counted.
    pub fn peek(&self, id: PageId) -> Result<Option<Breadcrumb>> {
        Ok(self.read()?.get(&id).cloned())
    }

    pub fn contains(&self, id: PageId) -> Result<bool> {
        Ok(self.read()?.contains_key(&id))
    }

    pub fn insert(&self, id: PageId, crumb: Breadcrumb) -> Result<()> {
        self.write()?.insert(id, crumb);
        Ok(())
    }

    /// Insert unless an entry already exists. Returns whether it inserted.
    pub fn insert_if_absent(&self, id: PageId, crumb: Breadcrumb) -> Result<bool> {
        let mut map = self.write()?;
        if map.contains_key(&id) {
            return Ok(false);
        }
        map.insert(id, crumb);
        Ok(true)
    }

    /// Drop the given ids; returns how many were actually cached.
    pub fn remove_many(&self, ids: &[PageId]) -> Result<usize> {
        let mut map = self.write()?;
        let removed = ids.iter().filter(|id| map.remove(*id).is_some()).count();
        drop(map);
        self.evictions.fetch_add(removed as u64, Ordering::Relaxed);
        Ok(removed)
    }

    pub fn clear(&self) -> Result<usize> {
        let mut map = self.write()?;
        let removed = map.len();
        map.clear();
        drop(map);
        self.evictions.fetch_add(removed as u64, Ordering::Relaxed);
        Ok(removed)
    }

    pub fn len(&self) -> Result<usize> {
        Ok(self.read()?.len())
    }

    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.read()?.is_empty())
    }

    /// Cached ids in ascending order.
    pub fn cached_ids(&self) -> Result<Vec<PageId>> {
        let mut ids: Vec<PageId> = self.read()?.keys().copied().collect();
        ids.sort();
        Ok(ids)
    }

    pub fn stats(&self) -> Result<CacheStats> {
        Ok(CacheStats {
            entries: self.len()?,
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            evictions: self.evictions.load(Ordering::Relaxed),
        })
    }
}
