// src/services/mod.rs

pub mod pages;        // the ONLY SQLite writer

// Public API
pub use pages::{PageStore, SqlitePageStore};
