//! Config discovery, export file naming and file I/O helpers.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use tempfile::NamedTempFile;
use tracing::debug;

use crate::error::MapError;
use crate::parser::config::{self, Config};

pub const CONFIG_FILE: &str = "tkmap.conf";

/// Walk upward from `start` to the nearest `tkmap.conf`.
pub fn find_config_from(start: &Path) -> Option<PathBuf> {
    let mut dir = start;
    loop {
        let candidate = dir.join(CONFIG_FILE);
        if candidate.is_file() {
            return Some(candidate);
        }
        dir = dir.parent()?;
    }
}

/// Loaded configuration plus the directory relative paths resolve against.
#[derive(Debug, Clone)]
pub struct Workspace {
    pub root: PathBuf,
    pub config: Config,
}

impl Workspace {
    /// Load the nearest config above `start`, or defaults rooted at `start`.
    pub fn load_from(start: &Path) -> Result<Self, MapError> {
        let Some(config_path) = find_config_from(start) else {
            return Ok(Self {
                root: start.to_path_buf(),
                config: Config::default(),
            });
        };
        let content = read_text(&config_path)?;
        let config = config::parse(&content)?;
        let root = config_path
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| start.to_path_buf());
        debug!(config = %config_path.display(), map_id = %config.map_id, "config loaded");
        Ok(Self { root, config })
    }

    pub fn load() -> anyhow::Result<Self> {
        let cwd = std::env::current_dir()?;
        Ok(Self::load_from(&cwd)?)
    }

    pub fn export_dir(&self) -> PathBuf {
        self.root.join(&self.config.export_dir)
    }
}

/// First `MAP_<map_id>_<n>.erb` in `dir` that does not exist yet, `n >= 1`.
pub fn next_export_path(dir: &Path, map_id: &str) -> PathBuf {
    let mut n = 1usize;
    loop {
        let candidate = dir.join(format!("MAP_{map_id}_{n}.erb"));
        if !candidate.exists() {
            return candidate;
        }
        n += 1;
    }
}

pub fn read_text(path: &Path) -> Result<String, MapError> {
    fs::read_to_string(path).map_err(|e| MapError::io(path, e))
}

/// Drop the single line terminator editors append at end of file, so it
/// does not become an extra empty map line.
pub fn trim_final_newline(text: &str) -> &str {
    text.strip_suffix("\r\n")
        .or_else(|| text.strip_suffix('\n'))
        .unwrap_or(text)
}

pub fn read_map_text(path: &Path) -> Result<String, MapError> {
    read_text(path).map(|t| trim_final_newline(&t).to_string())
}

pub fn write_map_text(path: &Path, text: &str) -> Result<(), MapError> {
    write_replace(path, &format!("{text}\n"))
}

/// Write `contents` to a temporary file next to `path`, then move it into
/// place without replacing an existing file.
pub fn write_new_file(path: &Path, contents: &str) -> Result<(), MapError> {
    let dir = path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or(Path::new("."));
    let mut tmp = NamedTempFile::new_in(dir).map_err(|e| MapError::io(dir, e))?;
    tmp.write_all(contents.as_bytes())
        .and_then(|_| tmp.flush())
        .map_err(|e| MapError::io(tmp.path(), e))?;
    tmp.persist_noclobber(path)
        .map_err(|e| MapError::io(path, e.error))?;
    Ok(())
}

/// Replace `path` with `contents` through a temporary file.
pub fn write_replace(path: &Path, contents: &str) -> Result<(), MapError> {
    let dir = path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or(Path::new("."));
    let mut tmp = NamedTempFile::new_in(dir).map_err(|e| MapError::io(dir, e))?;
    tmp.write_all(contents.as_bytes())
        .and_then(|_| tmp.flush())
        .map_err(|e| MapError::io(tmp.path(), e))?;
    tmp.persist(path).map_err(|e| MapError::io(path, e.error))?;
    Ok(())
}
