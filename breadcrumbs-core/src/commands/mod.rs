// src/commands/mod.rs
pub mod init;
mod api;

pub use api::{CheckReport, Pages, TreeLine};

pub use init::{DEFAULT_ROOT, InitReport, ensure_initialized};
