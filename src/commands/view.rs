use std::path::PathBuf;

use anyhow::Result;

use crate::tui::canvas;

pub fn run(map_path: Option<PathBuf>, import: Option<PathBuf>, demo: bool) -> Result<()> {
    canvas::run(map_path, import, demo)
}
