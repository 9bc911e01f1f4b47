// src/services/pages.rs
//! Single-writer page store.
//!
//! - Owns one SQLite connection (WAL) behind a mutex; nothing else writes `pages`.
//! - Stores title, content and a nullable `parent_id` per page.
//! - Knows nothing about breadcrumbs. The hierarchy engine only reads parent links
//!   and titles through the `PageStore` trait.

use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use chrono::Utc;
use rusqlite::{Connection, OptionalExtension, Row};

use crate::error::{Error, Result};
use crate::types::{NewPage, PageId, PageRecord};

/// What the breadcrumb engine and the `Pages` facade need from persistence.
///
/// `get` returns `Ok(None)` for unknown ids; callers turn that into
/// `Error::NotFound` where the id was expected to exist.
pub trait PageStore: Send + Sync {
    /// Insert a page. Fails with `NotFound` if `parent` is set and missing.
    fn create(&self, page: &NewPage<'_>) -> Result<PageId>;

    fn get(&self, id: PageId) -> Result<Option<PageRecord>>;

    /// Direct children, ascending by id.
    fn children(&self, id: PageId) -> Result<Vec<PageId>>;

    /// Pages without a parent, ascending by id.
    fn roots(&self) -> Result<Vec<PageId>>;

    fn set_title(&self, id: PageId, title: &str) -> Result<()>;

    fn set_content(&self, id: PageId, content: &str) -> Result<()>;

    fn set_parent(&self, id: PageId, parent: Option<PageId>) -> Result<()>;

    /// Delete the given pages in one transaction, in the order given.
    /// Callers pass children before their parents.
    fn delete_pages(&self, ids: &[PageId]) -> Result<()>;

    fn count(&self) -> Result<usize>;
}

pub struct SqlitePageStore {
    db: Mutex<Connection>,
}

const SCHEMA: &str = r#"
    PRAGMA journal_mode = WAL;
    PRAGMA foreign_keys = ON;

    CREATE TABLE IF NOT EXISTS pages (
      page_id     INTEGER PRIMARY KEY AUTOINCREMENT,
      title       TEXT NOT NULL,
      content     TEXT NOT NULL,
      parent_id   INTEGER REFERENCES pages(page_id),  -- NULL marks a root
      created_at  TEXT NOT NULL,                      -- RFC3339 UTC
      updated_at  TEXT NOT NULL                       -- RFC3339 UTC
    );

    CREATE INDEX IF NOT EXISTS idx_pages_parent ON pages(parent_id);
"#;

impl SqlitePageStore {
    /// Open/create the database file and ensure the schema.
    ///
    /// Creates the parent directory if missing.
    pub fn open(db_path: &Path) -> Result<Self> {
        if let Some(parent) = db_path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        Self::from_connection(Connection::open(db_path)?)
    }

    /// Private in-memory database; gone when the store is dropped.
    pub fn open_in_memory() -> Result<Self> {
        Self::from_connection(Connection::open_in_memory()?)
    }

    fn from_connection(db: Connection) -> Result<Self> {
        db.execute_batch(SCHEMA)?;
        Ok(Self { db: Mutex::new(db) })
    }

    fn conn(&self) -> Result<MutexGuard<'_, Connection>> {
        self.db.lock().map_err(|_| Error::Poisoned("page store"))
    }
}

fn page_from_row(row: &Row<'_>) -> rusqlite::Result<PageRecord> {
    Ok(PageRecord {
        id: row.get(0)?,
        title: row.get(1)?,
        content: row.get(2)?,
        parent_id: row.get(3)?,
        created_at: row.get(4)?,
        updated_at: row.get(5)?,
    })
}

fn exists(db: &Connection, id: PageId) -> Result<bool> {
    let found = db
        .query_row("SELECT 1 FROM pages WHERE page_id=?1", [id], |_| Ok(()))
        .optional()?;
    Ok(found.is_some())
}

fn ids(db: &Connection, sql: &str, params: impl rusqlite::Params) -> Result<Vec<PageId>> {
    let mut stmt = db.prepare(sql)?;
    let rows = stmt.query_map(params, |row| row.get::<_, PageId>(0))?;
    let mut out = Vec::new();
    for id in rows {
        out.push(id?);
    }
    Ok(out)
}

impl PageStore for SqlitePageStore {
    fn create(&self, page: &NewPage<'_>) -> Result<PageId> {
        let mut db = self.conn()?;
        let tx = db.transaction()?;
        if let Some(parent) = page.parent {
            if !exists(&tx, parent)? {
                return Err(Error::NotFound(parent));
            }
        }
        let now = Utc::now().to_rfc3339();
        tx.execute(
            r#"
            INSERT INTO pages(title, content, parent_id, created_at, updated_at)
            VALUES (?1, ?2, ?3, ?4, ?4)
            "#,
            (page.title, page.content, page.parent, &now),
        )?;
        let id = PageId::new(tx.last_insert_rowid());
        tx.commit()?;
        Ok(id)
    }

    fn get(&self, id: PageId) -> Result<Option<PageRecord>> {
        let db = self.conn()?;
        let page = db
            .query_row(
                "SELECT page_id, title, content, parent_id, created_at, updated_at
                 FROM pages WHERE page_id=?1",
                [id],
                page_from_row,
            )
            .optional()?;
        Ok(page)
    }

    fn children(&self, id: PageId) -> Result<Vec<PageId>> {
        let db = self.conn()?;
        ids(
            &db,
            "SELECT page_id FROM pages WHERE parent_id=?1 ORDER BY page_id",
            [id],
        )
    }

    fn roots(&self) -> Result<Vec<PageId>> {
        let db = self.conn()?;
        ids(
            &db,
            "SELECT page_id FROM pages WHERE parent_id IS NULL ORDER BY page_id",
            rusqlite::params![],
        )
    }

    fn set_title(&self, id: PageId, title: &str) -> Result<()> {
        let db = self.conn()?;
        let changed = db.execute(
            "UPDATE pages SET title=?1, updated_at=?2 WHERE page_id=?3",
            (title, Utc::now().to_rfc3339(), id),
        )?;
        if changed == 0 {
            return Err(Error::NotFound(id));
        }
        Ok(())
    }

    fn set_content(&self, id: PageId, content: &str) -> Result<()> {
        let db = self.conn()?;
        let changed = db.execute(
            "UPDATE pages SET content=?1, updated_at=?2 WHERE page_id=?3",
            (content, Utc::now().to_rfc3339(), id),
        )?;
        if changed == 0 {
            return Err(Error::NotFound(id));
        }
        Ok(())
    }

    fn set_parent(&self, id: PageId, parent: Option<PageId>) -> Result<()> {
        let mut db = self.conn()?;
        let tx = db.transaction()?;
        if let Some(p) = parent {
            if !exists(&tx, p)? {
                return Err(Error::NotFound(p));
            }
        }
        let changed = tx.execute(
            "UPDATE pages SET parent_id=?1, updated_at=?2 WHERE page_id=?3",
            (parent, Utc::now().to_rfc3339(), id),
        )?;
        if changed == 0 {
            return Err(Error::NotFound(id));
        }
        tx.commit()?;
        Ok(())
    }

    fn delete_pages(&self, ids: &[PageId]) -> Result<()> {
        let mut db = self.conn()?;
        let tx = db.transaction()?;
        {
            let mut stmt = tx.prepare("DELETE FROM pages WHERE page_id=?1")?;
            for id in ids {
                if stmt.execute([*id])? == 0 {
                    return Err(Error::NotFound(*id));
                }
            }
        }
        tx.commit()?;
        Ok(())
    }

    fn count(&self) -> Result<usize> {
        let db = self.conn()?;
        let n: i64 = db.query_row("SELECT COUNT(*) FROM pages", [], |row| row.get(0))?;
        Ok(usize::try_from(n).unwrap_or(0))
    }
}
