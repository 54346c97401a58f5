//! Map text → positional node graph.
//!
//! Every reparse builds a new arena but carries attributes and routes over
//! from the previous snapshot: cities are matched by name in appearance order,
//! relays by their exact `(line, column)` anchor. Ids are dense, cities first.

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::LazyLock;

use regex::Regex;
use tracing::debug;

use crate::graph::diff::{self, ReparseReport};
use crate::graph::model::{MapGraph, Node, NodeIndex, NodeKind};

/// City runs (ASCII alphanumerics or CJK ideographs) or a single relay glyph.
static TOKEN_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"([A-Za-z0-9\x{4e00}-\x{9fa5}]+)|(◇)").expect("token pattern is valid")
});

// ---------------------------------------------------------------------------
// Scanner
// ---------------------------------------------------------------------------

/// A node token found in one line of map text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Token<'a> {
    pub kind: NodeKind,
    pub text: &'a str,
    /// Char column of the first character.
    pub column: usize,
    /// Byte range inside the line.
    pub start: usize,
    pub end: usize,
}

/// Scan one line left to right for node tokens.
pub fn tokenize(line: &str) -> Vec<Token<'_>> {
    let mut tokens = Vec::new();
    let mut column = 0usize;
    let mut last_byte = 0usize;
    for caps in TOKEN_RE.captures_iter(line) {
        let Some(m) = caps.get(0) else {
            continue;
        };
        column += line[last_byte..m.start()].chars().count();
        last_byte = m.start();
        let kind = if caps.get(1).is_some() {
            NodeKind::City
        } else {
            NodeKind::Relay
        };
        tokens.push(Token {
            kind,
            text: m.as_str(),
            column,
            start: m.start(),
            end: m.end(),
        });
    }
    tokens
}

/// Split raw text into map lines. A trailing `\r` is dropped from each line.
pub fn split_lines(text: &str) -> Vec<String> {
    text.split('\n')
        .map(|l| l.strip_suffix('\r').unwrap_or(l).to_string())
        .collect()
}

// ---------------------------------------------------------------------------
// Layout
// ---------------------------------------------------------------------------

/// One piece of a rendered map line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LineEntry {
    Text(String),
    Node(NodeIndex),
}

/// Result of one reparse.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ParsedMap {
    pub lines: Vec<String>,
    /// Per line, text spans and node references in left-to-right order.
    pub layout: Vec<Vec<LineEntry>>,
    pub graph: MapGraph,
    /// Number of cities; relay ids start right after it.
    pub max_city_id: u32,
    pub report: ReparseReport,
}

impl ParsedMap {
    /// Node indices on `line`, left to right.
    pub fn nodes_on_line(&self, line: usize) -> Vec<NodeIndex> {
        self.layout
            .get(line)
            .map(|entries| {
                entries
                    .iter()
                    .filter_map(|e| match e {
                        LineEntry::Node(idx) => Some(*idx),
                        LineEntry::Text(_) => None,
                    })
                    .collect()
            })
            .unwrap_or_default()
    }

    /// All node indices in scan order (line-major, then column).
    pub fn scan_order(&self) -> Vec<NodeIndex> {
        (0..self.layout.len())
            .flat_map(|line| self.nodes_on_line(line))
            .collect()
    }

    pub fn text(&self) -> String {
        self.lines.join("\n")
    }
}

// ---------------------------------------------------------------------------
// Reconciliation
// ---------------------------------------------------------------------------

/// A resolved token before arena placement.
#[derive(Debug)]
struct Slot {
    kind: NodeKind,
    /// Rank within its kind, in scan order.
    rank: usize,
    source: Option<NodeIndex>,
    name: String,
    position: (usize, usize),
}

#[derive(Debug)]
enum PendingEntry {
    Text(String),
    Slot(usize),
}

/// Parse `text` into a new snapshot, reusing nodes from `previous`.
pub fn reconcile(text: &str, previous: &MapGraph) -> ParsedMap {
    let lines = split_lines(text);

    let mut city_queues: HashMap<&str, VecDeque<NodeIndex>> = HashMap::new();
    let mut relay_anchors: HashMap<(usize, usize), NodeIndex> = HashMap::new();
    for (idx, node) in previous.iter() {
        match node.kind {
            NodeKind::City => city_queues
                .entry(node.name.as_str())
                .or_default()
                .push_back(idx),
            NodeKind::Relay => {
                if let Some(pos) = node.position {
                    relay_anchors.entry(pos).or_insert(idx);
                }
            }
        }
    }

    let mut slots: Vec<Slot> = Vec::new();
    let mut claimed: HashSet<NodeIndex> = HashSet::new();
    let mut pending: Vec<Vec<PendingEntry>> = Vec::with_capacity(lines.len());
    let mut city_rank = 0usize;
    let mut relay_rank = 0usize;

    for (line_idx, line) in lines.iter().enumerate() {
        let mut entries = Vec::new();
        let mut last_end = 0usize;
        for token in tokenize(line) {
            if token.start > last_end {
                entries.push(PendingEntry::Text(line[last_end..token.start].to_string()));
            }
            let position = (line_idx, token.column);
            let name = token.text.trim();
            let (source, rank) = match token.kind {
                NodeKind::City => {
                    let source = city_queues.get_mut(name).and_then(VecDeque::pop_front);
                    city_rank += 1;
                    (source, city_rank - 1)
                }
                NodeKind::Relay => {
                    let source = relay_anchors
                        .get(&position)
                        .copied()
                        .filter(|idx| !claimed.contains(idx));
                    relay_rank += 1;
                    (source, relay_rank - 1)
                }
            };
            if let Some(idx) = source {
                claimed.insert(idx);
            }
            entries.push(PendingEntry::Slot(slots.len()));
            slots.push(Slot {
                kind: token.kind,
                rank,
                source,
                name: name.to_string(),
                position,
            });
            last_end = token.end;
        }
        if last_end < line.len() {
            entries.push(PendingEntry::Text(line[last_end..].to_string()));
        }
        pending.push(entries);
    }

    let city_count = city_rank;
    let arena_index = |slot: &Slot| match slot.kind {
        NodeKind::City => slot.rank,
        NodeKind::Relay => city_count + slot.rank,
    };

    let mut ordered: Vec<&Slot> = slots.iter().collect();
    ordered.sort_by_key(|slot| arena_index(slot));

    let mut graph = MapGraph::new();
    let mut carried: Vec<Option<NodeIndex>> = Vec::with_capacity(ordered.len());
    let mut remap: HashMap<NodeIndex, NodeIndex> = HashMap::new();
    for slot in &ordered {
        let mut node = match slot.source.and_then(|idx| previous.get(idx)) {
            Some(old) => old.clone(),
            None => Node::new(slot.kind, &slot.name, None),
        };
        node.id = arena_index(slot) as u32 + 1;
        if slot.kind == NodeKind::City {
            node.name = slot.name.clone();
        }
        if node.full_name.is_empty() {
            node.full_name = node.name.clone();
        }
        node.position = Some(slot.position);
        let new_idx = graph.push(node);
        if let Some(old_idx) = slot.source {
            remap.insert(old_idx, new_idx);
        }
        carried.push(slot.source);
    }

    // Connections still point into `previous`; translate them and drop the
    // ones whose endpoint did not survive.
    for node in &mut graph.nodes {
        node.connections = node
            .connections
            .iter()
            .filter_map(|old| remap.get(old).copied())
            .collect();
    }

    let layout = pending
        .into_iter()
        .map(|entries| {
            entries
                .into_iter()
                .map(|e| match e {
                    PendingEntry::Text(t) => LineEntry::Text(t),
                    PendingEntry::Slot(s) => LineEntry::Node(NodeIndex(arena_index(&slots[s]))),
                })
                .collect()
        })
        .collect();

    let report = diff::compute(previous, &carried, &graph);
    debug!(
        cities = city_count,
        relays = relay_rank,
        created = report.created.len(),
        dropped = report.dropped.len(),
        "reparsed map text"
    );

    ParsedMap {
        lines,
        layout,
        graph,
        max_city_id: city_count as u32,
        report,
    }
}

/// Parse `text` with no previous snapshot.
pub fn parse(text: &str) -> ParsedMap {
    reconcile(text, &MapGraph::new())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
