// breadcrumbs-core/src/commands/init.rs

use anyhow::{Context, Result};
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone)]
pub struct InitReport {
    pub root: PathBuf,
    pub created: Vec<String>,
    pub existed: Vec<String>,
}

/// Default workspace root when neither `--root` nor `CRUMBS_ROOT` is given.
pub const DEFAULT_ROOT: &str = ".crumbs";

/// Lay out a workspace under `root`. Idempotent; existing files are left alone.
pub fn ensure_initialized(root: &Path) -> Result<InitReport> {
    let mut created = Vec::new();
    let mut existed = Vec::new();

    ensure_dir(root, "", &mut created, &mut existed)?;
    ensure_dir(root, "logbook", &mut created, &mut existed)?;
    ensure_file(
        root,
        "config.toml",
        Some(DEFAULT_CONFIG_TOML),
        &mut created,
        &mut existed,
    )?;

    Ok(InitReport {
        root: root.to_path_buf(),
        created,
        existed,
    })
}

fn ensure_dir(
    base: &Path,
    rel: &str,
    created: &mut Vec<String>,
    existed: &mut Vec<String>,
) -> Result<()> {
    let p = if rel.is_empty() { base.to_path_buf() } else { base.join(rel) };
    if p.exists() {
        existed.push(if rel.is_empty() { ".".to_string() } else { rel.to_string() });
        return Ok(());
    }
    fs::create_dir_all(&p).with_context(|| format!("create_dir_all({:?})", p))?;
    created.push(if rel.is_empty() { ".".to_string() } else { rel.to_string() });
    Ok(())
}

fn ensure_file(
    base: &Path,
    rel_file: &str,
    content_if_absent: Option<&str>,
    created: &mut Vec<String>,
    existed: &mut Vec<String>,
) -> Result<()> {
    let p = base.join(rel_file);
    if p.exists() {
        existed.push(rel_file.to_string());
        return Ok(());
    }
    write_atomic(&p, content_if_absent.unwrap_or_default().as_bytes())?;
    created.push(rel_file.to_string());
    Ok(())
}

fn write_atomic(path: &Path, bytes: &[u8]) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).with_context(|| format!("create_dir_all({:?})", parent))?;
    }
    let tmp = path.with_extension("tmp");
    {
        let mut f = OpenOptions::new()
            .create(true)
            .truncate(true)
            .write(true)
            .open(&tmp)
            .with_context(|| format!("open temp file {:?}", tmp))?;
        f.write_all(bytes)?;
        f.flush()?;
    }
    fs::rename(&tmp, path).with_context(|| format!("rename {:?} -> {:?}", tmp, path))?;
    Ok(())
}

// ---------- defaults ----------

const DEFAULT_CONFIG_TOML: &str = r#"[system]
name = "crumbs"

[store]
# Relative paths resolve against the workspace root.
db_path = "pages.db"

[cache]
# Derive every breadcrumb when the workspace opens instead of lazily on first read.
prewarm = false
# On a cache miss, also cache each ancestor visited by the parent walk.
backfill_ancestors = true

[logbook]
enabled = true
path = "logbook/events.jsonl"
"#;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::CoreConfig;

    #[test]
    fn init_is_idempotent() {
        let tmp = tempfile::tempdir().unwrap();
        let root = tmp.path().join("ws");

        let first = ensure_initialized(&root).unwrap();
        assert!(first.created.contains(&"config.toml".to_string()));
        assert!(first.created.contains(&"logbook".to_string()));

        let second = ensure_initialized(&root).unwrap();
        assert!(second.created.is_empty());
        assert!(second.existed.contains(&"config.toml".to_string()));
    }

    #[test]
    fn default_config_parses() {
        let tmp = tempfile::tempdir().unwrap();
        ensure_initialized(tmp.path()).unwrap();
        let cfg = CoreConfig::load(tmp.path()).unwrap();
        assert_eq!(cfg.store.db_path, tmp.path().join("pages.db"));
        assert!(!cfg.cache.prewarm);
        assert!(cfg.logbook.enabled);
    }
}
