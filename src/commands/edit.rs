//! `tkmap edit`: open a text map in an editor.

use std::path::Path;
use std::process::{Command, Stdio};

use anyhow::{Context, Result, bail};
use crossterm::style::Stylize;

use crate::parser::map;
use crate::workspace::{self, Workspace};

pub fn run(map_path: &Path) -> Result<()> {
    let ws = Workspace::load()?;
    let editor = resolve_editor(ws.config.editor.clone());
    launch(&editor, map_path)?;

    if map_path.exists() {
        let parsed = map::parse(&workspace::read_map_text(map_path)?);
        println!(
            "  {} {} ({} cities, {} relays)",
            "Parsed".green().bold(),
            map_path.display(),
            parsed.graph.city_count(),
            parsed.graph.len() - parsed.graph.city_count()
        );
    }
    Ok(())
}

/// Run `editor` (a command line, split on whitespace) on `path` and wait.
pub(crate) fn launch(editor: &str, path: &Path) -> Result<()> {
    let mut parts = editor.split_whitespace();
    let program = parts
        .next()
        .ok_or_else(|| anyhow::anyhow!("no editor configured for `tkmap edit`"))?;
    let args: Vec<String> = parts.map(ToString::to_string).collect();

    let status = Command::new(program)
        .args(&args)
        .arg(path)
        .stdin(Stdio::inherit())
        .stdout(Stdio::inherit())
        .stderr(Stdio::inherit())
        .status()
        .with_context(|| {
            format!("failed to launch editor {:?} for {}", editor, path.display())
        })?;

    if !status.success() {
        bail!("editor exited with status {}", status);
    }
    Ok(())
}

pub(crate) fn resolve_editor(config_editor: Option<String>) -> String {
    let from_env = |key: &str| std::env::var(key).ok().filter(|v| !v.trim().is_empty());
    if let Some(e) = config_editor.filter(|v| !v.trim().is_empty()) {
        return e;
    }
    if let Some(e) = from_env("TKMAP_EDITOR")
        .or_else(|| from_env("VISUAL"))
        .or_else(|| from_env("EDITOR"))
    {
        return e;
    }
    if cfg!(windows) {
        "notepad".to_string()
    } else {
        "vi".to_string()
    }
}
