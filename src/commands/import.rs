//! `tkmap import`: rebuild a text map from an `.erb` export.

use std::path::Path;

use anyhow::{Context, Result};
use crossterm::style::Stylize;

use crate::graph::model::MapGraph;
use crate::parser::script;
use crate::workspace;

pub fn run(script_path: &Path, text_out: Option<&Path>) -> Result<()> {
    let content = workspace::read_text(script_path)?;
    let imported = script::import(&content);
    let map_id = imported.map_id.clone();
    let stats = imported.stats;
    let parsed = imported.into_parsed();

    println!(
        "  {} {} (MAPID {}, {} lines, {} nodes, {} ignored)",
        "Imported".green().bold(),
        script_path.display(),
        map_id.as_deref().unwrap_or("?"),
        stats.map_lines,
        stats.nodes,
        stats.ignored_lines
    );

    match text_out {
        Some(path) => {
            workspace::write_map_text(path, &parsed.text())
                .with_context(|| format!("failed to write map text {}", path.display()))?;
            println!("  {} {}", "Wrote".green().bold(), path.display());
        }
        None => {
            println!();
            for line in &parsed.lines {
                println!("{line}");
            }
            println!();
        }
    }

    for row in node_table(&parsed.graph) {
        println!("  {row}");
    }
    Ok(())
}

/// One row per node: id, kind, short name, full name, economy, guard.
fn node_table(graph: &MapGraph) -> Vec<String> {
    let width = graph
        .nodes
        .iter()
        .map(|n| n.full_name.chars().count())
        .max()
        .unwrap_or(0)
        .max("fullName".len());
    let mut rows = vec![format!(
        "{:>4}  {:<5}  {:<width$}  {:>8}  {:>6}",
        "id", "kind", "fullName", "economy", "guard"
    )];
    for node in &graph.nodes {
        let kind = if node.is_city() { "city" } else { "relay" };
        let pad = width.saturating_sub(node.full_name.chars().count());
        rows.push(format!(
            "{:>4}  {:<5}  {}{}  {:>8}  {:>6}",
            node.id,
            kind,
            node.full_name,
            " ".repeat(pad),
            node.economy,
            node.guard
        ));
    }
    rows
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::map;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn node_table_lists_every_node() {
        let parsed = map::parse("A◇B");
        let rows = node_table(&parsed.graph);
        assert_eq!(rows.len(), 4);
        assert!(rows[0].contains("fullName"));
        assert!(rows[3].trim_start().starts_with("3  relay"));
    }

    #[test]
    fn writes_text_out() {
        let dir = TempDir::new().unwrap();
        let parsed = map::parse("A -- B\n\n◇");
        let erb = dir.path().join("MAP_X_1.erb");
        fs::write(&erb, script::export(&parsed, "X")).unwrap();

        let out = dir.path().join("x.txt");
        run(&erb, Some(&out)).unwrap();
        assert_eq!(fs::read_to_string(&out).unwrap(), "A -- B\n\n◇\n");
    }

    #[test]
    fn missing_script_is_an_error() {
        let dir = TempDir::new().unwrap();
        assert!(run(&dir.path().join("none.erb"), None).is_err());
    }
}
