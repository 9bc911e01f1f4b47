// src/hierarchy/mod.rs
//! Breadcrumb derivation over the page tree.
//!
//! - `cache`: the id -> breadcrumb map plus hit/miss counters.
//! - `engine`: derives entries on create, walks parent links on a miss and
//!   evicts subtrees when the hierarchy above them changes.

pub mod cache;
pub mod engine;

pub use cache::{Breadcrumb, BreadcrumbCache, CacheStats};
pub use engine::{BreadcrumbEngine, CacheOptions, Verification};
