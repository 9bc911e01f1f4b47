// src/commands/api.rs
use std::path::Path;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use anyhow::Context;
use serde::Serialize;
use serde_json::json;

use crate::config::CoreConfig;
use crate::error::{Error, Result};
use crate::hierarchy::engine::{ancestor_ids, descendants};
use crate::hierarchy::{Breadcrumb, BreadcrumbCache, BreadcrumbEngine, CacheOptions, CacheStats, Verification};
use crate::services::{PageStore, SqlitePageStore};
use crate::types::{NewPage, PageId, PageRecord, PageView};
use crate::utils::logbook::Logbook;

/// Composition root: one page store, one breadcrumb cache, one engine.
///
/// Reads share the hierarchy lock; every mutation holds it exclusively, so a
/// cache-miss walk never interleaves with an invalidation.
pub struct Pages<S: PageStore = SqlitePageStore> {
    store: S,
    cache: Arc<BreadcrumbCache>,
    engine: BreadcrumbEngine,
    hierarchy: RwLock<()>,
    logbook: Option<Logbook>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CheckReport {
    pub checked: usize,
    /// Entries that were stale and have been recomputed (or dropped, for deleted pages).
    pub healed: Vec<PageId>,
    /// Entries whose parent chain is corrupt in the store; evicted, not recomputed.
    pub broken: Vec<PageId>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TreeLine {
    pub depth: usize,
    pub id: PageId,
    pub title: String,
}

impl Pages<SqlitePageStore> {
    /// Open the workspace at `root` (reads `root/config.toml` if present).
    pub fn open(root: &Path) -> anyhow::Result<Self> {
        let cfg = CoreConfig::load(root)?;
        Self::open_with_config(&cfg)
    }

    pub fn open_with_config(cfg: &CoreConfig) -> anyhow::Result<Self> {
        let store = SqlitePageStore::open(&cfg.store.db_path)
            .with_context(|| format!("opening page store {}", cfg.store.db_path.display()))?;
        let mut pages = Self::with_store(store, cfg.cache.options());
        if cfg.logbook.enabled {
            pages = pages.with_logbook(Logbook::new(&cfg.logbook.path));
        }
        if cfg.cache.prewarm {
            pages.rebuild().context("prewarming breadcrumb cache")?;
        }
        tracing::info!(
            "opened workspace '{}' at {}",
            cfg.system.name,
            cfg.store.db_path.display()
        );
        Ok(pages)
    }
}

impl<S: PageStore> Pages<S> {
    pub fn with_store(store: S, options: CacheOptions) -> Self {
        let cache = Arc::new(BreadcrumbCache::new());
        let engine = BreadcrumbEngine::new(Arc::clone(&cache), options);
        Self {
            store,
            cache,
            engine,
            hierarchy: RwLock::new(()),
            logbook: None,
        }
    }

    pub fn with_logbook(mut self, logbook: Logbook) -> Self {
        self.logbook = Some(logbook);
        self
    }

    pub fn cache(&self) -> &Arc<BreadcrumbCache> {
        &self.cache
    }

    fn shared(&self) -> Result<RwLockReadGuard<'_, ()>> {
        self.hierarchy
            .read()
            .map_err(|_| Error::Poisoned("hierarchy"))
    }

    fn exclusive(&self) -> Result<RwLockWriteGuard<'_, ()>> {
        self.hierarchy
            .write()
            .map_err(|_| Error::Poisoned("hierarchy"))
    }

    fn log_event(&self, event: &str, data: serde_json::Value) {
        if let Some(book) = &self.logbook {
            book.record(event, data);
        }
    }

    /// Store a new page and derive its breadcrumb from the parent's.
    pub fn create(&self, parent: Option<PageId>, title: &str, content: &str) -> Result<PageId> {
        validate_title(title)?;
        let _guard = self.exclusive()?;
        let id = self.store.create(&NewPage {
            title,
            content,
            parent,
        })?;
        let crumb = self.engine.derive_on_create(&self.store, id, parent)?;
        tracing::info!("created page {} (depth {})", id, crumb.len());
        self.log_event(
            "page_created",
            json!({"id": id, "parent": parent, "title": title, "depth": crumb.len()}),
        );
        Ok(id)
    }

    pub fn read(&self, id: PageId) -> Result<PageView> {
        let _guard = self.shared()?;
        let record = self.store.get(id)?.ok_or(Error::NotFound(id))?;
        let child_ids = self.store.children(id)?;
        let breadcrumb = self.engine.get(&self.store, id)?;
        Ok(PageView {
            id: record.id,
            title: record.title,
            content: record.content,
            parent_id: record.parent_id,
            child_ids,
            breadcrumb,
        })
    }

    /// The stored row for `id`, read without consulting or filling the cache.
    pub fn record(&self, id: PageId) -> Result<PageRecord> {
        let _guard = self.shared()?;
        self.store.get(id)?.ok_or(Error::NotFound(id))
    }

    pub fn page_count(&self) -> Result<usize> {
        let _guard = self.shared()?;
        self.store.count()
    }

    pub fn breadcrumb(&self, id: PageId) -> Result<Breadcrumb> {
        let _guard = self.shared()?;
        self.engine.get(&self.store, id)
    }

    /// Retitle a page. Descendants lose their cached breadcrumbs.
    pub fn rename(&self, id: PageId, title: &str) -> Result<()> {
        validate_title(title)?;
        let _guard = self.exclusive()?;
        self.store.set_title(id, title)?;
        let evicted = self.engine.invalidate_descendants(&self.store, id)?;
        tracing::info!("renamed page {} ({} cached breadcrumbs evicted)", id, evicted);
        self.log_event("page_renamed", json!({"id": id, "title": title, "evicted": evicted}));
        Ok(())
    }

    pub fn edit_content(&self, id: PageId, content: &str) -> Result<()> {
        let _guard = self.exclusive()?;
        self.store.set_content(id, content)?;
        self.log_event("page_edited", json!({"id": id, "len": content.len()}));
        Ok(())
    }

    /// Re-parent `id` under `new_parent` (or make it a root).
    pub fn move_page(&self, id: PageId, new_parent: Option<PageId>) -> Result<()> {
        let _guard = self.exclusive()?;
        let record = self.store.get(id)?.ok_or(Error::NotFound(id))?;
        if let Some(parent) = new_parent {
            if parent == id {
                return Err(Error::Cycle { page: id, parent });
            }
            if self.store.get(parent)?.is_none() {
                return Err(Error::NotFound(parent));
            }
            if ancestor_ids(&self.store, parent)?.contains(&id) {
                return Err(Error::Cycle { page: id, parent });
            }
        }
        if record.parent_id == new_parent {
            return Ok(());
        }

        self.store.set_parent(id, new_parent)?;
        let evicted = self.engine.invalidate_subtree(&self.store, id)?;
        tracing::info!(
            "moved page {} from {:?} to {:?} ({} cached breadcrumbs evicted)",
            id,
            record.parent_id,
            new_parent,
            evicted
        );
        self.log_event(
            "page_moved",
            json!({"id": id, "from": record.parent_id, "to": new_parent, "evicted": evicted}),
        );
        Ok(())
    }

    /// Delete a page. With `recursive`, its whole subtree goes too; without it,
    /// a page that still has children is refused. Returns the removed ids.
    pub fn delete(&self, id: PageId, recursive: bool) -> Result<Vec<PageId>> {
        let _guard = self.exclusive()?;
        if self.store.get(id)?.is_none() {
            return Err(Error::NotFound(id));
        }
        let below = descendants(&self.store, id)?;
        if !below.is_empty() && !recursive {
            return Err(Error::HasChildren(id));
        }

        self.engine.invalidate_subtree(&self.store, id)?;
        // Breadth-first order lists parents before children; delete leaves first.
        let mut doomed = Vec::with_capacity(below.len() + 1);
        doomed.push(id);
        doomed.extend(below);
        doomed.reverse();
        self.store.delete_pages(&doomed)?;

        tracing::info!("deleted page {} ({} pages removed)", id, doomed.len());
        self.log_event("page_deleted", json!({"id": id, "removed": doomed}));
        Ok(doomed)
    }

    pub fn roots(&self) -> Result<Vec<PageId>> {
        let _guard = self.shared()?;
        self.store.roots()
    }

    /// Depth-first listing of every page reachable from a root.
    pub fn tree(&self) -> Result<Vec<TreeLine>> {
        let _guard = self.shared()?;
        let mut out = Vec::new();
        let mut stack: Vec<(usize, PageId)> =
            self.store.roots()?.into_iter().rev().map(|id| (0, id)).collect();
        while let Some((depth, id)) = stack.pop() {
            let record = self.store.get(id)?.ok_or(Error::NotFound(id))?;
            for child in self.store.children(id)?.into_iter().rev() {
                stack.push((depth + 1, child));
            }
            out.push(TreeLine {
                depth,
                id,
                title: record.title,
            });
        }
        Ok(out)
    }

    /// Throw the cache away and derive every breadcrumb again from the store.
    pub fn rebuild(&self) -> Result<usize> {
        let _guard = self.exclusive()?;
        let derived = self.engine.rebuild(&self.store)?;
        self.log_event("cache_rebuilt", json!({"entries": derived}));
        Ok(derived)
    }

    /// Compare every cached breadcrumb with the store and repair the stale ones.
    ///
    /// An entry whose parent chain is corrupt is evicted and reported in `broken`;
    /// the remaining entries are still checked.
    pub fn check(&self) -> Result<CheckReport> {
        let _guard = self.exclusive()?;
        let mut report = CheckReport::default();
        for id in self.cache.cached_ids()? {
            report.checked += 1;
            if self.store.get(id)?.is_none() {
                tracing::error!("cached breadcrumb for deleted page {}; evicting", id);
                self.cache.remove_many(&[id])?;
                self.log_event("cache_inconsistency", json!({"id": id, "reason": "page missing"}));
                report.healed.push(id);
                continue;
            }
            match self.engine.verify(&self.store, id) {
                Ok(Verification::Healed { stale, fresh }) => {
                    self.log_event(
                        "cache_inconsistency",
                        json!({"id": id, "stale": stale, "fresh": fresh}),
                    );
                    report.healed.push(id);
                }
                Ok(_) => {}
                Err(Error::Inconsistency { detail, .. }) => {
                    // Nothing correct to recompute from; reads of this id now fail.
                    self.cache.remove_many(&[id])?;
                    self.log_event("cache_inconsistency", json!({"id": id, "reason": detail}));
                    report.broken.push(id);
                }
                Err(e) => return Err(e),
            }
        }
        Ok(report)
    }

    pub fn cache_stats(&self) -> Result<CacheStats> {
        self.cache.stats()
    }
}

fn validate_title(title: &str) -> Result<()> {
    if title.trim().is_empty() {
        return Err(Error::InvalidInput("page title must not be blank".to_string()));
    }
    Ok(())
}
