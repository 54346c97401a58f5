//! `tkmap check`: report problems an export would run into (read-only).

use std::path::Path;

use anyhow::Result;
use crossterm::style::Stylize;

use crate::commands::load_map;
use crate::graph::model::MapGraph;
use crate::parser::map::{self, ParsedMap};
use crate::parser::script;

// ---------------------------------------------------------------------------
// Public entry points
// ---------------------------------------------------------------------------

pub fn run(path: &Path) -> Result<()> {
    let parsed = load_map(path)?;
    let report = compute(&parsed);
    print_report(path, &report);
    Ok(())
}

// ---------------------------------------------------------------------------
// Computation (testable, no I/O)
// ---------------------------------------------------------------------------

#[derive(Debug, Default)]
pub struct CheckReport {
    pub cities: usize,
    pub relays: usize,
    pub routes: usize,
    /// Relays still named with the glyph.
    pub relay_warnings: Vec<String>,
    /// Nodes without any route, as `#id fullName`.
    pub isolated: Vec<String>,
    /// Full names shared by several nodes; routes between them cannot be
    /// told apart after an import.
    pub duplicate_full_names: Vec<String>,
    /// Summary of reparsing the map's own text against itself.
    pub reparse_summary: String,
}

impl CheckReport {
    pub fn is_clean(&self) -> bool {
        self.relay_warnings.is_empty()
            && self.isolated.is_empty()
            && self.duplicate_full_names.is_empty()
    }
}

pub fn compute(parsed: &ParsedMap) -> CheckReport {
    let graph = &parsed.graph;
    let cities = graph.city_count();
    let reparsed = map::reconcile(&parsed.text(), graph);

    CheckReport {
        cities,
        relays: graph.len() - cities,
        routes: route_count(graph),
        relay_warnings: script::relay_warnings(parsed),
        isolated: graph
            .nodes
            .iter()
            .filter(|n| n.connections.is_empty())
            .map(|n| format!("#{} {}", n.id, n.full_name))
            .collect(),
        duplicate_full_names: duplicate_full_names(graph),
        reparse_summary: reparsed.report.summary(),
    }
}

fn route_count(graph: &MapGraph) -> usize {
    graph.nodes.iter().map(|n| n.connections.len()).sum::<usize>() / 2
}

fn duplicate_full_names(graph: &MapGraph) -> Vec<String> {
    let mut names: Vec<&str> = graph.nodes.iter().map(|n| n.full_name.as_str()).collect();
    names.sort_unstable();
    let mut dupes: Vec<String> = names
        .windows(2)
        .filter(|w| w[0] == w[1])
        .map(|w| w[0].to_string())
        .collect();
    dupes.dedup();
    dupes
}

// ---------------------------------------------------------------------------
// Output
// ---------------------------------------------------------------------------

fn print_report(path: &Path, report: &CheckReport) {
    println!(
        "  {} {}: {} cities, {} relays, {} routes",
        "Checked".cyan().bold(),
        path.display(),
        report.cities,
        report.relays,
        report.routes
    );
    println!(
        "  {} {}",
        "Reparse".cyan().bold(),
        report.reparse_summary.as_str().dark_grey()
    );

    if !report.relay_warnings.is_empty() {
        println!(
            "  {} {} relay(s) still use the default name",
            "Warning".yellow().bold(),
            report.relay_warnings.len()
        );
        for line in script::displayed_warnings(&report.relay_warnings) {
            println!("    {}", line.dark_grey());
        }
    }
    if !report.duplicate_full_names.is_empty() {
        println!(
            "  {} shared full names: {}",
            "Warning".yellow().bold(),
            report.duplicate_full_names.join(", ")
        );
    }
    if !report.isolated.is_empty() {
        println!(
            "  {} {} node(s) without routes",
            "Note".dark_grey().bold(),
            report.isolated.len()
        );
        for node in &report.isolated {
            println!("    {}", node.as_str().dark_grey());
        }
    }
    if report.is_clean() {
        println!("  {} ready to export", "Clean".green().bold());
    }
}
