pub mod check;
pub mod edit;
pub mod export;
pub mod import;
pub mod init;
pub mod list;
pub mod view;

use std::path::Path;

use anyhow::{Context, Result};

use crate::parser::map::{self, ParsedMap};
use crate::parser::script;
use crate::workspace;

/// Load a text map, or an `.erb` export when the extension says so.
pub(crate) fn load_map(path: &Path) -> Result<ParsedMap> {
    let is_script = path
        .extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("erb"));
    if is_script {
        let content = workspace::read_text(path)?;
        return Ok(script::import(&content).into_parsed());
    }
    let text = workspace::read_map_text(path)
        .with_context(|| format!("failed to read map text {}", path.display()))?;
    Ok(map::parse(&text))
}
