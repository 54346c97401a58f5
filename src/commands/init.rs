//! `tkmap init`: write a default `tkmap.conf` in the current directory.

use std::fs;
use std::path::Path;

use anyhow::{Context, Result, bail};
use crossterm::style::Stylize;

use crate::parser::config::{self, Config};
use crate::workspace::CONFIG_FILE;

// ---------------------------------------------------------------------------
// Public entry points
// ---------------------------------------------------------------------------

/// Entry point called from `main`.
pub fn run(map_id: Option<String>) -> Result<()> {
    let root = std::env::current_dir()?;
    run_in(&root, map_id)
}

/// Run init inside `root`. `map_id` overrides the default MAPID.
pub fn run_in(root: &Path, map_id: Option<String>) -> Result<()> {
    let path = root.join(CONFIG_FILE);
    if path.exists() {
        bail!("{CONFIG_FILE} already exists in {}", root.display());
    }

    let mut cfg = Config::default();
    if let Some(id) = map_id {
        if id.trim().is_empty() {
            bail!("MAPID must not be empty");
        }
        cfg.map_id = id.trim().to_string();
    }

    fs::write(&path, config::serialize(&cfg))
        .with_context(|| format!("failed to write {}", path.display()))?;
    println!("  {} {}", "Created".green().bold(), CONFIG_FILE);
    println!(
        "  {} {}",
        "MAPID".cyan().bold(),
        cfg.map_id.as_str().dark_grey()
    );
    Ok(())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
