// src/error.rs
//! Library error type.
//!
//! Everything below the `Pages` facade returns `Result<T, Error>`. Bootstrapping
//! (config, init, opening a workspace) stays on `anyhow` like the rest of the
//! binary-facing code.

use thiserror::Error;

use crate::types::PageId;

#[derive(Debug, Error)]
pub enum Error {
    /// The referenced page does not exist in the store.
    #[error("no such page: {0}")]
    NotFound(PageId),

    /// The store and the breadcrumb cache disagree, or parent links are corrupt.
    #[error("breadcrumb inconsistency at page {page}: {detail}")]
    Inconsistency { page: PageId, detail: String },

    /// Re-parenting would make a page its own ancestor.
    #[error("cannot move page {page} under {parent}: {parent} is the page itself or one of its descendants")]
    Cycle { page: PageId, parent: PageId },

    #[error("page {0} still has child pages; delete them first or delete recursively")]
    HasChildren(PageId),

    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("storage error: {0}")]
    Storage(#[from] rusqlite::Error),

    /// Filesystem work around the store, e.g. creating its directory.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("{0} lock poisoned")]
    Poisoned(&'static str),
}

impl Error {
    pub fn is_not_found(&self) -> bool {
        matches!(self, Error::NotFound(_))
    }

    pub(crate) fn inconsistency(page: PageId, detail: impl Into<String>) -> Self {
        Error::Inconsistency {
            page,
            detail: detail.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
