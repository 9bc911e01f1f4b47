use std::path::{Path, PathBuf};

use anyhow::{ensure, Context, Result};
use clap::{Parser, Subcommand};
use serde_json::{json, Value};

use breadcrumbs_core::commands::{ensure_initialized, DEFAULT_ROOT};
use breadcrumbs_core::config::CoreConfig;
use breadcrumbs_core::{PageId, Pages};

mod logging;

#[derive(Parser)]
#[command(
    name = "crumbs",
    version,
    about = "Hierarchical pages with cached ancestor breadcrumbs"
)]
struct Cli {
    /// Workspace directory (created on first use)
    #[arg(long, env = "CRUMBS_ROOT", default_value = DEFAULT_ROOT, global = true)]
    root: PathBuf,
    /// Debug-level logs on stderr
    #[arg(short, long, global = true, conflicts_with = "quiet")]
    verbose: bool,
    /// Errors only on stderr
    #[arg(short, long, global = true)]
    quiet: bool,
    #[command(subcommand)]
    cmd: Cmd,
}

#[derive(Subcommand)]
enum Cmd {
    /// Lay out the workspace directory and default config
    Init,
    /// Create a page, optionally under a parent
    Create {
        #[arg(long)]
        title: String,
        #[arg(long)]
        parent: Option<PageId>,
        #[arg(long, default_value = "")]
        content: String,
    },
    /// Show a page with its children and breadcrumb
    Read { id: PageId },
    /// Show only the breadcrumb of a page
    Breadcrumb { id: PageId },
    /// Change a page's title
    Rename { id: PageId, title: String },
    /// Replace a page's content
    Edit {
        id: PageId,
        #[arg(long)]
        content: String,
    },
    /// Re-parent a page
    Move {
        id: PageId,
        #[arg(long, conflicts_with = "to_root", required_unless_present = "to_root")]
        parent: Option<PageId>,
        #[arg(long)]
        to_root: bool,
    },
    /// Delete a page (and with --recursive, everything below it)
    Delete {
        id: PageId,
        #[arg(long)]
        recursive: bool,
    },
    /// Print the whole hierarchy as an indented outline
    Tree,
    /// Derive every breadcrumb and verify the cache against the store
    Check,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    logging::initialize_logging(cli.verbose, cli.quiet)?;

    if let Cmd::Init = cli.cmd {
        let report = ensure_initialized(&cli.root)?;
        let cfg = CoreConfig::load(&cli.root)?;
        return print_json(&json!({
            "name": cfg.system.name,
            "root": report.root,
            "created": report.created,
            "existed": report.existed,
        }));
    }

    let pages = open(&cli.root)?;
    match cli.cmd {
        Cmd::Init => Ok(()),
        Cmd::Create {
            title,
            parent,
            content,
        } => {
            let id = pages.create(parent, &title, &content)?;
            let crumb = pages.breadcrumb(id)?;
            print_json(&json!({ "id": id, "breadcrumb": crumb }))
        }
        Cmd::Read { id } => print_json(&serde_json::to_value(pages.read(id)?)?),
        Cmd::Breadcrumb { id } => print_json(&serde_json::to_value(pages.breadcrumb(id)?)?),
        Cmd::Rename { id, title } => {
            pages.rename(id, &title)?;
            print_json(&json!({ "id": id, "title": title }))
        }
        Cmd::Edit { id, content } => {
            pages.edit_content(id, &content)?;
            print_json(&json!({ "id": id, "bytes": content.len() }))
        }
        Cmd::Move {
            id,
            parent,
            to_root,
        } => {
            let target = if to_root { None } else { parent };
            pages.move_page(id, target)?;
            let crumb = pages.breadcrumb(id)?;
            print_json(&json!({ "id": id, "parent": target, "breadcrumb": crumb }))
        }
        Cmd::Delete { id, recursive } => {
            let removed = pages.delete(id, recursive)?;
            print_json(&json!({ "removed": removed }))
        }
        Cmd::Tree => {
            for line in pages.tree()? {
                println!("{}{} (#{})", "  ".repeat(line.depth), line.title, line.id);
            }
            Ok(())
        }
        Cmd::Check => check(&pages),
    }
}

fn open(root: &Path) -> Result<Pages> {
    let init = ensure_initialized(root)?;
    if !init.created.is_empty() {
        tracing::info!("initialized workspace {} ({:?})", root.display(), init.created);
    }
    let pages =
        Pages::open(root).with_context(|| format!("opening workspace {}", root.display()))?;
    tracing::debug!("workspace {} holds {} page(s)", root.display(), pages.page_count()?);
    Ok(pages)
}

/// A fresh process starts with a cold cache, so derive everything first, then
/// verify. Pages not reachable from any root mean broken parent links.
fn check(pages: &Pages) -> Result<()> {
    let derived = pages.rebuild()?;
    let total = pages.page_count()?;
    let report = pages.check()?;
    print_json(&json!({
        "pages": total,
        "derived": derived,
        "checked": report.checked,
        "healed": report.healed,
        "broken": report.broken,
    }))?;
    ensure!(
        derived == total,
        "{} page(s) are not reachable from any root",
        total - derived
    );
    ensure!(
        report.broken.is_empty(),
        "{} page(s) have corrupt parent links",
        report.broken.len()
    );
    Ok(())
}

fn print_json(value: &Value) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
