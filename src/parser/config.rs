//! `tkmap.conf`: `key: value` lines, `#` comments.

use crate::error::MapError;

pub const DEFAULT_MAP_ID: &str = "NEWMAP";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// MAPID offered when exporting.
    pub map_id: String,
    /// Where exported scripts are written, relative to the config file.
    pub export_dir: String,
    /// Require confirmation before exporting relays with the default name.
    pub confirm_default_relays: bool,
    pub editor: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            map_id: DEFAULT_MAP_ID.to_string(),
            export_dir: ".".to_string(),
            confirm_default_relays: true,
            editor: None,
        }
    }
}

pub fn parse(content: &str) -> Result<Config, MapError> {
    let mut cfg = Config::default();
    for (idx, raw) in content.lines().enumerate() {
        let line = raw.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let Some((key, value)) = line.split_once(':') else {
            return Err(invalid(idx, format!("expected `key: value`, got {line:?}")));
        };
        let value = value.trim();
        match key.trim() {
            "map_id" => {
                if value.is_empty() {
                    return Err(invalid(idx, "map_id must not be empty".to_string()));
                }
                cfg.map_id = value.to_string();
            }
            "export_dir" => {
                cfg.export_dir = if value.is_empty() { "." } else { value }.to_string();
            }
            "confirm_default_relays" => {
                cfg.confirm_default_relays = parse_bool(idx, value)?;
            }
            "editor" => {
                cfg.editor = (!value.is_empty()).then(|| value.to_string());
            }
            other => return Err(invalid(idx, format!("unknown key {other:?}"))),
        }
    }
    Ok(cfg)
}

pub fn serialize(config: &Config) -> String {
    format!(
        "\
# tkmap configuration
# Edit manually or regenerate with: tkmap init

# MAPID suggested when exporting (used in block names and file names)
map_id: {}

# Directory receiving MAP_<MAPID>_<n>.erb files
export_dir: {}

# Ask before exporting relays that still carry the default name
confirm_default_relays: {}

# Preferred editor for `tkmap edit` (falls back to $TKMAP_EDITOR, $VISUAL, $EDITOR)
editor: {}
",
        config.map_id,
        config.export_dir,
        config.confirm_default_relays,
        config.editor.clone().unwrap_or_default()
    )
}

fn parse_bool(idx: usize, value: &str) -> Result<bool, MapError> {
    match value {
        "true" | "yes" | "on" => Ok(true),
        "false" | "no" | "off" => Ok(false),
        _ => Err(invalid(idx, format!("expected true or false, got {value:?}"))),
    }
}

fn invalid(idx: usize, message: String) -> MapError {
    MapError::InvalidConfig {
        line: idx + 1,
        message,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_contents_parse_to_default() {
        let cfg = parse(&serialize(&Config::default())).unwrap();
        assert_eq!(cfg, Config::default());
    }

    #[test]
    fn parses_all_keys() {
        let cfg = parse(
            "# comment\nmap_id: EAST\nexport_dir: out\nconfirm_default_relays: no\neditor: nvim -p\n",
        )
        .unwrap();
        assert_eq!(cfg.map_id, "EAST");
        assert_eq!(cfg.export_dir, "out");
        assert!(!cfg.confirm_default_relays);
        assert_eq!(cfg.editor.as_deref(), Some("nvim -p"));
    }

    #[test]
    fn unknown_key_reports_line() {
        let err = parse("map_id: A\n\ncolour: red\n").unwrap_err();
        match err {
            MapError::InvalidConfig { line, message } => {
                assert_eq!(line, 3);
                assert!(message.contains("colour"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn malformed_bool_is_rejected() {
        assert!(parse("confirm_default_relays: maybe").is_err());
        assert!(parse("just words").is_err());
    }
}
