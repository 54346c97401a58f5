//! `tkmap export`: turn a text map into a `MAP_<MAPID>_<n>.erb` script.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use crossterm::style::Stylize;

use crate::editor::MapEditor;
use crate::error::MapError;
use crate::parser::script;
use crate::workspace::{self, Workspace};

#[derive(Debug, Clone, Default)]
pub struct ExportOptions {
    pub map_id: Option<String>,
    pub out_dir: Option<PathBuf>,
    /// Export even if relays still carry the default name.
    pub yes: bool,
}

pub fn run(map_path: &Path, options: ExportOptions) -> Result<()> {
    let ws = Workspace::load()?;
    run_with(&ws, map_path, options).map(|_| ())
}

pub fn run_with(ws: &Workspace, map_path: &Path, options: ExportOptions) -> Result<PathBuf> {
    let map_id = options
        .map_id
        .unwrap_or_else(|| ws.config.map_id.clone());
    if map_id.trim().is_empty() {
        bail!("MAPID must not be empty");
    }
    let out_dir = options.out_dir.unwrap_or_else(|| ws.export_dir());
    if !out_dir.is_dir() {
        bail!("export directory {} does not exist", out_dir.display());
    }

    let text = workspace::read_map_text(map_path)
        .with_context(|| format!("failed to read map text {}", map_path.display()))?;
    let editor = MapEditor::from_text(&text, &out_dir);

    let warnings = editor.export_warnings();
    if !warnings.is_empty() {
        println!(
            "  {} {} relay(s) still use the default name",
            "Warning".yellow().bold(),
            warnings.len()
        );
        for line in script::displayed_warnings(&warnings) {
            println!("    {}", line.dark_grey());
        }
    }
    let confirmed = options.yes || !ws.config.confirm_default_relays;

    match editor.export(&map_id, confirmed) {
        Ok(path) => {
            println!("  {} {}", "Exported".green().bold(), path.display());
            Ok(path)
        }
        Err(MapError::ExportAborted { warnings }) => bail!(
            "export aborted: {} relay(s) still use the default name (name them or pass --yes)",
            warnings.len()
        ),
        Err(err) => Err(err.into()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::config::Config;
    use std::fs;
    use tempfile::TempDir;

    fn workspace(root: &Path, config: Config) -> Workspace {
        Workspace {
            root: root.to_path_buf(),
            config,
        }
    }

    #[test]
    fn exports_city_only_map_into_export_dir() {
        let dir = TempDir::new().unwrap();
        let map = dir.path().join("east.txt");
        fs::write(&map, "A -- B\n").unwrap();
        let ws = workspace(dir.path(), Config::default());

        let path = run_with(&ws, &map, ExportOptions::default()).unwrap();
        assert_eq!(path, dir.path().join("MAP_NEWMAP_1.erb"));
        let content = fs::read_to_string(&path).unwrap();
        assert!(content.contains("CALL DRAWMAP_LINE(\"A -- B\", 1,2)"));
        assert!(content.contains("CITY_NUM = 2"));
    }

    #[test]
    fn default_relays_abort_without_yes() {
        let dir = TempDir::new().unwrap();
        let map = dir.path().join("east.txt");
        fs::write(&map, "A◇B\n").unwrap();
        let ws = workspace(dir.path(), Config::default());

        let err = run_with(&ws, &map, ExportOptions::default()).unwrap_err();
        assert!(err.to_string().contains("aborted"));
        assert!(!dir.path().join("MAP_NEWMAP_1.erb").exists());

        let options = ExportOptions {
            map_id: Some("EAST".into()),
            yes: true,
            ..ExportOptions::default()
        };
        let path = run_with(&ws, &map, options).unwrap();
        assert_eq!(path, dir.path().join("MAP_EAST_1.erb"));
    }

    #[test]
    fn config_can_disable_relay_confirmation() {
        let dir = TempDir::new().unwrap();
        let map = dir.path().join("east.txt");
        fs::write(&map, "A◇B\n").unwrap();
        let config = Config {
            confirm_default_relays: false,
            ..Config::default()
        };
        let ws = workspace(dir.path(), config);
        assert!(run_with(&ws, &map, ExportOptions::default()).is_ok());
    }

    #[test]
    fn missing_out_dir_is_an_error() {
        let dir = TempDir::new().unwrap();
        let map = dir.path().join("east.txt");
        fs::write(&map, "A\n").unwrap();
        let ws = workspace(dir.path(), Config::default());
        let options = ExportOptions {
            out_dir: Some(dir.path().join("nope")),
            ..ExportOptions::default()
        };
        assert!(run_with(&ws, &map, options).is_err());
    }
}
