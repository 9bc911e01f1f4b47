// src/lib.rs
//! Breadcrumbs-Core: hierarchical pages and their ancestor-title trails.
//!
//! - `services::pages` is the SQLite page store (the only writer).
//! - `hierarchy` derives, caches and invalidates breadcrumbs.
//! - `commands` wires both together behind the `Pages` facade.

pub mod commands;
pub mod config;
pub mod error;
pub mod hierarchy;
pub mod services;
pub mod types;
pub mod utils;

pub use commands::{CheckReport, Pages};
pub use error::{Error, Result};
pub use hierarchy::{Breadcrumb, BreadcrumbCache, BreadcrumbEngine, CacheOptions, CacheStats};
pub use services::{PageStore, SqlitePageStore};
pub use types::{NewPage, PageId, PageRecord, PageView};
