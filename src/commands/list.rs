//! `tkmap list`: print every route once, ordered by node id.

use std::path::Path;

use anyhow::Result;

use crate::commands::load_map;
use crate::graph::model::MapGraph;

pub fn run(path: &Path) -> Result<()> {
    let parsed = load_map(path)?;
    let lines = list_routes(&parsed.graph);
    if lines.is_empty() {
        println!("  No routes.");
    } else {
        for line in lines {
            println!("  {}", line);
        }
    }
    Ok(())
}

fn list_routes(g: &MapGraph) -> Vec<String> {
    let mut nodes: Vec<_> = g.iter().collect();
    nodes.sort_by_key(|(_, n)| n.id);
    let mut lines = Vec::new();
    for (idx, node) in nodes {
        for other in g.neighbors(idx) {
            if other.id > node.id {
                lines.push(format!(
                    "#{} {} -- #{} {}",
                    node.id, node.full_name, other.id, other.full_name
                ));
            }
        }
    }
    lines
}
