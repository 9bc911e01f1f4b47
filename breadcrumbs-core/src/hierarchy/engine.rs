// src/hierarchy/engine.rs
//! Breadcrumb engine.
//!
//! - On create: extend the parent's cached breadcrumb by the parent's title (no walk).
//! - On read: serve the cached entry; on a miss, climb parent links through the store
//!   until a root or an already-cached ancestor, then fill in the entry.
//! - On structural change: evict the changed page's subtree so the next read re-derives it.
//!
//! The store is the source of truth for the hierarchy. The engine never writes to it.

use std::collections::{HashSet, VecDeque};
use std::sync::Arc;

use crate::error::{Error, Result};
use crate::hierarchy::cache::{Breadcrumb, BreadcrumbCache};
use crate::services::PageStore;
use crate::types::{PageId, PageRecord};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CacheOptions {
    /// On a miss, also cache every ancestor visited by the walk.
    pub backfill_ancestors: bool,
    /// Derive every breadcrumb when the service opens.
    pub prewarm: bool,
}

impl Default for CacheOptions {
    fn default() -> Self {
        Self {
            backfill_ancestors: true,
            prewarm: false,
        }
    }
}

/// Outcome of comparing one cached entry against a fresh walk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verification {
    Uncached,
    Consistent,
    Healed { stale: Breadcrumb, fresh: Breadcrumb },
}

pub struct BreadcrumbEngine {
    cache: Arc<BreadcrumbCache>,
    options: CacheOptions,
}

/// Result of climbing from a page towards the root.
struct Climb {
    /// Ancestors visited, nearest parent first.
    ancestors: Vec<PageRecord>,
    /// Breadcrumb of the topmost visited ancestor (empty when it is a root).
    base: Breadcrumb,
}

impl BreadcrumbEngine {
    pub fn new(cache: Arc<BreadcrumbCache>, options: CacheOptions) -> Self {
        Self { cache, options }
    }

    pub fn cache(&self) -> &BreadcrumbCache {
        &self.cache
    }

    /// Derive and cache the breadcrumb of a freshly stored page.
    ///
    /// A parent with no cache entry (cold start, or evicted by an earlier edit) is
    /// resolved through `get` first; that is the only case that touches more than the
    /// parent's own record.
    pub fn derive_on_create<S: PageStore + ?Sized>(
        &self,
        store: &S,
        page: PageId,
        parent: Option<PageId>,
    ) -> Result<Breadcrumb> {
        let crumb = match parent {
            None => Breadcrumb::root(),
            Some(parent) => {
                let parent_rec = store.get(parent)?.ok_or(Error::NotFound(parent))?;
                let base = match self.cache.peek(parent)? {
                    Some(base) => base,
                    None => {
                        tracing::debug!(
                            "parent {} of new page {} has no cached breadcrumb; resolving",
                            parent,
                            page
                        );
                        self.get(store, parent)?
                    }
                };
                base.extend(&parent_rec.title)
            }
        };
        self.cache.insert(page, crumb.clone())?;
        Ok(crumb)
    }

    /// Cached breadcrumb of `page`, rebuilding it from parent links on a miss.
    pub fn get<S: PageStore + ?Sized>(&self, store: &S, page: PageId) -> Result<Breadcrumb> {
        if let Some(crumb) = self.cache.lookup(page)? {
            return Ok(crumb);
        }
        let record = store.get(page)?.ok_or(Error::NotFound(page))?;
        let climb = self.climb(store, &record, true)?;
        tracing::debug!(
            "breadcrumb miss for page {}: walked {} ancestor(s)",
            page,
            climb.ancestors.len()
        );

        let mut crumb = climb.base;
        for ancestor in climb.ancestors.iter().rev() {
            if self.options.backfill_ancestors {
                self.cache.insert_if_absent(ancestor.id, crumb.clone())?;
            }
            crumb = crumb.extend(&ancestor.title);
        }
        self.cache.insert(page, crumb.clone())?;
        Ok(crumb)
    }

    /// Evict `page` and every transitive descendant. Returns the number of entries dropped.
    pub fn invalidate_subtree<S: PageStore + ?Sized>(&self, store: &S, page: PageId) -> Result<usize> {
        let mut ids = vec![page];
        ids.extend(descendants(store, page)?);
        let removed = self.cache.remove_many(&ids)?;
        tracing::debug!("invalidated subtree of page {}: {} entries evicted", page, removed);
        Ok(removed)
    }

    /// Evict the descendants of `page` but keep its own entry.
    ///
    /// A retitle changes what descendants see, not the page's own breadcrumb.
    pub fn invalidate_descendants<S: PageStore + ?Sized>(
        &self,
        store: &S,
        page: PageId,
    ) -> Result<usize> {
        let ids = descendants(store, page)?;
        let removed = self.cache.remove_many(&ids)?;
        tracing::debug!("invalidated descendants of page {}: {} entries evicted", page, removed);
        Ok(removed)
    }

    /// Drop everything and derive every reachable page top-down from the roots.
    pub fn rebuild<S: PageStore + ?Sized>(&self, store: &S) -> Result<usize> {
        self.cache.clear()?;
        let mut queue: VecDeque<(PageId, Breadcrumb)> = store
            .roots()?
            .into_iter()
            .map(|id| (id, Breadcrumb::root()))
            .collect();
        let mut seen = HashSet::new();
        let mut derived = 0usize;

        while let Some((id, crumb)) = queue.pop_front() {
            if !seen.insert(id) {
                continue;
            }
            let record = store.get(id)?.ok_or(Error::NotFound(id))?;
            self.cache.insert(id, crumb.clone())?;
            derived += 1;

            let child_crumb = crumb.extend(&record.title);
            for child in store.children(id)? {
                queue.push_back((child, child_crumb.clone()));
            }
        }
        tracing::info!("breadcrumb cache rebuilt: {} entries", derived);
        Ok(derived)
    }

    /// Compare the cached entry for `page` with a fresh walk, replacing it if stale.
    pub fn verify<S: PageStore + ?Sized>(&self, store: &S, page: PageId) -> Result<Verification> {
        let Some(cached) = self.cache.peek(page)? else {
            return Ok(Verification::Uncached);
        };
        let record = store.get(page)?.ok_or(Error::NotFound(page))?;
        let climb = self.climb(store, &record, false)?;
        let fresh: Breadcrumb = climb
            .ancestors
            .iter()
            .rev()
            .map(|a| a.title.clone())
            .collect::<Vec<_>>()
            .into();

        if fresh == cached {
            return Ok(Verification::Consistent);
        }
        tracing::error!(
            "stale breadcrumb for page {}: cached {:?}, store says {:?}; recomputing",
            page,
            cached.titles(),
            fresh.titles()
        );
        self.cache.insert(page, fresh.clone())?;
        Ok(Verification::Healed {
            stale: cached,
            fresh,
        })
    }

    /// Walk parent links from `start`. With `stop_at_cached`, stop at the first ancestor
    /// that already has an entry and use it as the base.
    fn climb<S: PageStore + ?Sized>(
        &self,
        store: &S,
        start: &PageRecord,
        stop_at_cached: bool,
    ) -> Result<Climb> {
        let mut ancestors: Vec<PageRecord> = Vec::new();
        let mut seen = HashSet::from([start.id]);
        let mut next = start.parent_id;
        let mut child = start.id;

        while let Some(parent) = next {
            if !seen.insert(parent) {
                tracing::error!("parent links of page {} loop back to page {}", start.id, parent);
                return Err(Error::inconsistency(
                    start.id,
                    format!("parent links loop back to page {parent}"),
                ));
            }
            let Some(record) = store.get(parent)? else {
                tracing::error!("page {} points at missing parent {}", child, parent);
                return Err(Error::inconsistency(
                    child,
                    format!("parent {parent} does not exist"),
                ));
            };
            next = record.parent_id;
            child = record.id;
            ancestors.push(record);

            if stop_at_cached {
                if let Some(base) = self.cache.peek(parent)? {
                    return Ok(Climb { ancestors, base });
                }
            }
        }
        Ok(Climb {
            ancestors,
            base: Breadcrumb::root(),
        })
    }
}

/// Every transitive descendant of `page`, breadth first. `page` itself is excluded.
pub fn descendants<S: PageStore + ?Sized>(store: &S, page: PageId) -> Result<Vec<PageId>> {
    let mut seen = HashSet::from([page]);
    let mut queue = VecDeque::from([page]);
    let mut out = Vec::new();

    while let Some(current) = queue.pop_front() {
        for child in store.children(current)? {
            if seen.insert(child) {
                queue.push_back(child);
                out.push(child);
            }
        }
    }
    Ok(out)
}

/// Ancestor ids of `page`, nearest parent first, read straight from the store.
pub fn ancestor_ids<S: PageStore + ?Sized>(store: &S, page: PageId) -> Result<Vec<PageId>> {
    let record = store.get(page)?.ok_or(Error::NotFound(page))?;
    let mut seen = HashSet::from([page]);
    let mut out = Vec::new();
    let mut next = record.parent_id;
    while let Some(parent) = next {
        if !seen.insert(parent) {
            return Err(Error::inconsistency(
                page,
                format!("parent links loop back to page {parent}"),
            ));
        }
        out.push(parent);
        next = store
            .get(parent)?
            .ok_or_else(|| Error::inconsistency(page, format!("parent {parent} does not exist")))?
            .parent_id;
    }
    Ok(out)
}
