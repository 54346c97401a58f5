//! Reader and writer for the ERB map script (`MAP_<MAPID>_<n>.erb`).
//!
//! The writer emits a fixed block layout keyed by MAPID. The reader scans a
//! file of that layout (or any superset), ignores lines it does not
//! recognise, and rebuilds the map text plus a node graph whose position
//! anchors let [`map::reconcile`] adopt the imported nodes.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::LazyLock;

use regex::Regex;
use tracing::debug;

use crate::graph::model::{MapGraph, Node, NodeIndex, RELAY_GLYPH};
use crate::parser::map::{self, LineEntry, ParsedMap};

/// Warnings shown before the list is cut off with an ellipsis.
pub const MAX_DISPLAYED_WARNINGS: usize = 10;

const DRAWMAP_INIT: &str = concat!(
    "CALL DRAWMAP_INIT(ARG:0, 0)\n",
    "    ;MAP_SHOW_TYPE\n",
    "    IF DRAWMAP_MENUBARTYPE != 0\n",
    "        CALL DRAWMAP_PRINT_MENU(DRAWMAP_MENUBARTYPE, DRAWMAP_LINECOUNT)\n",
    "        DRAWMAP_LINECOUNT++\n",
    "        CALL DRAW_MAP_SHOW_CONFIG_BUTTON()\n",
    "    ELSE\n",
    "        MAP_SHOW_CONFIG = 0\n",
    "    ENDIF",
);

const SHORT_NAME_LOOP: &str = concat!(
    "FOR LOCAL:0, 0, MAX_CITY\n",
    "        SIF CITY_TYPE:(LOCAL:0) == 1\n",
    "            CITY_NAME_SHORT:(LOCAL:0) = ●\n",
    "    NEXT\n",
    "    ",
);

const CITY_TYPE_LOOP: &str = concat!(
    "\n",
    "    FOR LOCAL:0, GET_CITY_NUM() + 1, MAX_CITY\n",
    "        CITY_TYPE:(LOCAL:0) = 1\n",
    "    NEXT\n",
    "    ",
);

const ECONOMY_LIMIT_LOOP: &str = concat!(
    "\n",
    "    FOR LOCAL:0, 1, MAX_CITY\n",
    "        CITY_ECONOMY_LIMIT:(LOCAL:0) = MIN(CITY_ECONOMY:(LOCAL:0) * 2, 300000)\n",
    "    NEXT\n",
    "    ",
);

// ---------------------------------------------------------------------------
// Export
// ---------------------------------------------------------------------------

/// Relays that would still export under the glyph, as `line L, relay #k`
/// messages in map order.
pub fn relay_warnings(map: &ParsedMap) -> Vec<String> {
    let mut warnings = Vec::new();
    for (line_idx, entries) in map.layout.iter().enumerate() {
        let mut relay_no = 0usize;
        for entry in entries {
            let LineEntry::Node(idx) = entry else {
                continue;
            };
            let Some(node) = map.graph.get(*idx) else {
                continue;
            };
            if !node.is_relay() {
                continue;
            }
            relay_no += 1;
            if node.has_default_full_name() {
                warnings.push(format!(
                    "line {}, relay #{} still has the default name",
                    line_idx + 1,
                    relay_no
                ));
            }
        }
    }
    warnings
}

/// Cap `warnings` at [`MAX_DISPLAYED_WARNINGS`], appending `...` when cut.
pub fn displayed_warnings(warnings: &[String]) -> Vec<String> {
    let mut shown: Vec<String> = warnings
        .iter()
        .take(MAX_DISPLAYED_WARNINGS)
        .cloned()
        .collect();
    if warnings.len() > MAX_DISPLAYED_WARNINGS {
        shown.push("...".to_string());
    }
    shown
}

/// Render `map` as an ERB map script namespaced by `map_id`.
pub fn export(map: &ParsedMap, map_id: &str) -> String {
    let graph = &map.graph;
    let mut out: Vec<String> = Vec::new();

    out.push(";==== Export Start ====".to_string());
    out.push(format!("@DRAWMAP_{map_id}(ARG:0 = 0, ARG:1 = 0)"));
    out.push(DRAWMAP_INIT.to_string());
    for (line_idx, text) in map.lines.iter().enumerate() {
        let ids = map
            .nodes_on_line(line_idx)
            .iter()
            .filter_map(|&idx| graph.get(idx))
            .map(|n| n.id.to_string())
            .collect::<Vec<_>>()
            .join(",");
        out.push(format!(
            "CALL DRAWMAP_LINE(\"{}\", {})",
            escape_quotes(text),
            ids
        ));
    }
    out.push("CALL DRAWMAP_END()".to_string());
    out.push(String::new());

    out.push(format!("@SET_CITY_NUM_{map_id}()"));
    out.push(format!("CITY_NUM = {}", map.max_city_id));
    out.push(String::new());

    out.push(format!("@SET_SHORTCITYNAME_{map_id}()"));
    for node in graph.cities() {
        out.push(format!("CITY_NAME_SHORT:{} = {}", node.id, node.name));
    }
    out.push(SHORT_NAME_LOOP.to_string());
    out.push(String::new());

    out.push(format!("@SET_CITYNAME_{map_id}()"));
    out.push("VARSET CITY_NAME,\"無名\"".to_string());
    for node in graph.cities().chain(graph.relays()) {
        out.push(format!("CITY_NAME:{} = {}", node.id, node.full_name));
    }

    out.push(format!("@SET_CITY_TYPE_{map_id}"));
    out.push(CITY_TYPE_LOOP.to_string());
    out.push(String::new());

    out.push(format!("@SET_MAP_ROUTE_{map_id}"));
    for (idx, node) in graph.iter() {
        let neighbours = graph.neighbors(idx);
        if neighbours.is_empty() {
            out.push(format!("CALL REGISTER_ROUTE_S(\"{}\")", node.full_name));
        } else {
            let args = neighbours
                .iter()
                .map(|n| n.full_name.as_str())
                .collect::<Vec<_>>()
                .join("\", \"");
            out.push(format!(
                "CALL REGISTER_ROUTE_S(\"{}\", \"{}\")",
                node.full_name, args
            ));
        }
    }
    out.push(String::new());

    out.push(format!("@MAP_INIT_{map_id}"));
    for node in graph.cities() {
        out.push(format!(
            "CITY_ECONOMY:GET_CITYNUMBER(\"{}\") = {}",
            node.full_name, node.economy
        ));
    }
    out.push(ECONOMY_LIMIT_LOOP.to_string());
    for node in graph.cities() {
        out.push(format!(
            "CITY_GUARD:GET_CITYNUMBER(\"{}\") = {}",
            node.full_name, node.guard
        ));
    }
    out.push(";==== Export End ====".to_string());

    let mut text = out.join("\n");
    text.push('\n');
    text
}

fn escape_quotes(text: &str) -> String {
    text.replace('"', "\\\"")
}

// ---------------------------------------------------------------------------
// Import
// ---------------------------------------------------------------------------

static MAP_ID_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^@DRAWMAP_(.+?)\(").expect("map id pattern is valid"));
static SHORT_NAME_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^CITY_NAME_SHORT:(\d+)\s*=\s*(.+)").expect("short name pattern is valid")
});
static FULL_NAME_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^CITY_NAME:(\d+)\s*=\s*(.+)").expect("full name pattern is valid")
});
static ECONOMY_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"^CITY_ECONOMY:GET_CITYNUMBER\("(.+?)"\)\s*=\s*(\d+)"#)
        .expect("economy pattern is valid")
});
static GUARD_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"^CITY_GUARD:GET_CITYNUMBER\("(.+?)"\)\s*=\s*(\d+)"#)
        .expect("guard pattern is valid")
});
static QUOTED_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#""([^"]+)""#).expect("quoted pattern is valid"));

static ROW_TAIL_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\s*,?\s*([\d\s,]*)\)?\s*$").expect("row tail pattern is valid")
});

const DRAWMAP_LINE_PREFIX: &str = "CALL DRAWMAP_LINE(";
const ROUTE_PREFIX: &str = "CALL REGISTER_ROUTE_S";

/// Counters describing one import.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ImportStats {
    pub map_lines: usize,
    pub nodes: usize,
    pub routes: usize,
    /// Non-blank lines that matched no directive.
    pub ignored_lines: usize,
}

/// A map rebuilt from a script, before reconciliation.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ImportedMap {
    pub map_id: Option<String>,
    pub text: String,
    /// Nodes keyed by their exported ids, anchored to their tokens in `text`.
    pub graph: MapGraph,
    pub stats: ImportStats,
}

impl ImportedMap {
    /// Run the imported text through the reconciler with the imported nodes
    /// as the previous snapshot.
    pub fn into_parsed(self) -> ParsedMap {
        map::reconcile(&self.text, &self.graph)
    }
}

/// Parse an ERB map script.
pub fn import(content: &str) -> ImportedMap {
    let mut map_id = None;
    let mut rows: Vec<(String, Vec<u32>)> = Vec::new();
    let mut short_names: BTreeMap<u32, String> = BTreeMap::new();
    let mut full_names: BTreeMap<u32, String> = BTreeMap::new();
    let mut economy: HashMap<String, u64> = HashMap::new();
    let mut guard: HashMap<String, u64> = HashMap::new();
    let mut routes: Vec<(String, Vec<String>)> = Vec::new();
    let mut stats = ImportStats::default();

    for raw in content.lines() {
        let line = raw.trim();
        if line.is_empty() {
            continue;
        }
        let recognised = if let Some(rest) = line.strip_prefix(DRAWMAP_LINE_PREFIX) {
            match parse_drawmap_row(rest) {
                Some(row) => {
                    rows.push(row);
                    true
                }
                None => false,
            }
        } else if let Some(caps) = SHORT_NAME_RE.captures(line) {
            match caps[1].parse::<u32>() {
                Ok(id) => {
                    short_names.insert(id, caps[2].trim().to_string());
                    true
                }
                Err(_) => false,
            }
        } else if let Some(caps) = FULL_NAME_RE.captures(line) {
            match caps[1].parse::<u32>() {
                Ok(id) => {
                    full_names.insert(id, caps[2].trim().to_string());
                    true
                }
                Err(_) => false,
            }
        } else if let Some(caps) = ECONOMY_RE.captures(line) {
            match caps[2].parse::<u64>() {
                Ok(v) => {
                    economy.insert(caps[1].to_string(), v);
                    true
                }
                Err(_) => false,
            }
        } else if let Some(caps) = GUARD_RE.captures(line) {
            match caps[2].parse::<u64>() {
                Ok(v) => {
                    guard.insert(caps[1].to_string(), v);
                    true
                }
                Err(_) => false,
            }
        } else if line.starts_with(ROUTE_PREFIX) {
            let names: Vec<String> = QUOTED_RE
                .captures_iter(line)
                .map(|c| c[1].to_string())
                .collect();
            match names.split_first() {
                Some((head, rest)) => {
                    routes.push((head.clone(), rest.to_vec()));
                    true
                }
                None => false,
            }
        } else if let Some(caps) = MAP_ID_RE.captures(line) {
            map_id = Some(caps[1].to_string());
            true
        } else {
            false
        };
        if !recognised {
            stats.ignored_lines += 1;
        }
    }

    let mut graph = MapGraph::new();
    let mut by_full_name: HashMap<String, NodeIndex> = HashMap::new();
    let ids: BTreeSet<u32> = short_names.keys().chain(full_names.keys()).copied().collect();
    for id in ids {
        let short = short_names.get(&id);
        let Some(full) = full_names.get(&id).or(short).cloned() else {
            continue;
        };
        let mut node = match short {
            Some(name) if name != RELAY_GLYPH => Node::city(name),
            _ => Node::relay(None),
        };
        node.id = id;
        node.economy = economy.get(&full).copied().unwrap_or(0);
        node.guard = guard.get(&full).copied().unwrap_or(0);
        node.full_name = full.clone();
        // Colliding full names merge onto the last node declared.
        let idx = graph.push(node);
        by_full_name.insert(full, idx);
    }

    for (name, neighbours) in &routes {
        let Some(&from) = by_full_name.get(name) else {
            continue;
        };
        for other in neighbours {
            if let Some(&to) = by_full_name.get(other) {
                graph.connect(from, to);
            }
        }
        stats.routes += 1;
    }

    for (line_idx, (text, row_ids)) in rows.iter().enumerate() {
        for (token, id) in map::tokenize(text).iter().zip(row_ids) {
            if let Some(idx) = graph.index_of_id(*id)
                && let Some(node) = graph.get_mut(idx)
            {
                node.position = Some((line_idx, token.column));
            }
        }
    }

    stats.map_lines = rows.len();
    stats.nodes = graph.len();
    debug!(
        lines = stats.map_lines,
        nodes = stats.nodes,
        routes = stats.routes,
        ignored = stats.ignored_lines,
        "imported map script"
    );

    let text = rows
        .into_iter()
        .map(|(text, _)| text)
        .collect::<Vec<_>>()
        .join("\n");

    ImportedMap {
        map_id,
        text,
        graph,
        stats,
    }
}

/// Parse `"<text>", <id>,<id>...)` following `CALL DRAWMAP_LINE(`.
///
/// Only `"` is escaped on export, so a row whose text ends in a backslash reads as
/// an escaped quote. When the escape-aware scan does not end in an id list,
/// the last quote before the id list closes the text instead.
fn parse_drawmap_row(rest: &str) -> Option<(String, Vec<u32>)> {
    let body = rest.strip_prefix('"')?;
    let (text, tail) = match escaped_literal(body) {
        Some((text, close)) if ROW_TAIL_RE.is_match(&body[close + 1..]) => {
            (text, &body[close + 1..])
        }
        _ => {
            let close = body.rfind('"')?;
            (body[..close].replace("\\\"", "\""), &body[close + 1..])
        }
    };
    let caps = ROW_TAIL_RE.captures(tail)?;
    let ids = caps[1]
        .split(',')
        .filter_map(|id| id.trim().parse::<u32>().ok())
        .collect();
    Some((text, ids))
}

/// Unescaped text up to the first unescaped `"`, plus that quote's offset.
fn escaped_literal(body: &str) -> Option<(String, usize)> {
    let mut text = String::new();
    let mut chars = body.char_indices();
    while let Some((i, c)) = chars.next() {
        match c {
            '\\' if body[i + 1..].starts_with('"') => {
                text.push('"');
                chars.next();
            }
            '"' => return Some((text, i)),
            _ => text.push(c),
        }
    }
    None
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn two_city_map() -> ParsedMap {
        let mut map = map::parse("A◇B");
        let g = &mut map.graph;
        g.nodes[0].full_name = "Alpha".into();
        g.nodes[0].economy = 100;
        g.nodes[0].guard = 5;
        g.nodes[1].full_name = "Beta".into();
        g.nodes[1].economy = 200;
        g.nodes[1].guard = 10;
        g.connect(NodeIndex(0), NodeIndex(2));
        g.connect(NodeIndex(1), NodeIndex(2));
        g.refresh_relay_name(NodeIndex(2));
        map
    }

    #[test]
    fn export_emits_blocks_in_order() {
        let out = export(&two_city_map(), "TEST");
        let expected_lines = [
            ";==== Export Start ====",
            "@DRAWMAP_TEST(ARG:0 = 0, ARG:1 = 0)",
            "CALL DRAWMAP_LINE(\"A◇B\", 1,3,2)",
            "CALL DRAWMAP_END()",
            "@SET_CITY_NUM_TEST()",
            "CITY_NUM = 2",
            "CITY_NAME_SHORT:1 = A",
            "CITY_NAME_SHORT:2 = B",
            "VARSET CITY_NAME,\"無名\"",
            "CITY_NAME:1 = Alpha",
            "CITY_NAME:2 = Beta",
            "CITY_NAME:3 = Alpha-Beta",
            "@SET_CITY_TYPE_TEST",
            "@SET_MAP_ROUTE_TEST",
            "CALL REGISTER_ROUTE_S(\"Alpha\", \"Alpha-Beta\")",
            "CALL REGISTER_ROUTE_S(\"Beta\", \"Alpha-Beta\")",
            "CALL REGISTER_ROUTE_S(\"Alpha-Beta\", \"Alpha\", \"Beta\")",
            "@MAP_INIT_TEST",
            "CITY_ECONOMY:GET_CITYNUMBER(\"Alpha\") = 100",
            "CITY_ECONOMY:GET_CITYNUMBER(\"Beta\") = 200",
            "CITY_GUARD:GET_CITYNUMBER(\"Alpha\") = 5",
            "CITY_GUARD:GET_CITYNUMBER(\"Beta\") = 10",
            ";==== Export End ====",
        ];
        let mut cursor = 0usize;
        for expected in expected_lines {
            let found = out[cursor..]
                .find(&format!("{expected}\n"))
                .unwrap_or_else(|| panic!("missing or out of order: {expected}"));
            cursor += found + expected.len();
        }
        assert!(out.starts_with(";==== Export Start ====\n"));
        assert!(out.ends_with(";==== Export End ====\n"));
    }

    #[test]
    fn export_lines_without_nodes_and_unconnected_nodes() {
        let map = map::parse("-- \"~\" --\nC");
        let out = export(&map, "M");
        assert!(out.contains("CALL DRAWMAP_LINE(\"-- \\\"~\\\" --\", )\n"));
        assert!(out.contains("CALL REGISTER_ROUTE_S(\"C\")\n"));
    }

    #[test]
    fn round_trip_preserves_shape_and_attributes() {
        let original = two_city_map();
        let restored = import(&export(&original, "RT")).into_parsed();

        assert_eq!(restored.graph.len(), original.graph.len());
        assert_eq!(restored.lines, original.lines);
        assert_eq!(restored.max_city_id, 2);
        for (a, b) in original.graph.nodes.iter().zip(&restored.graph.nodes) {
            assert_eq!(a.kind, b.kind);
            assert_eq!(a.full_name, b.full_name);
            if a.is_city() {
                assert_eq!((a.economy, a.guard), (b.economy, b.guard));
            }
        }
        let edges = |m: &ParsedMap| {
            let mut e: Vec<(String, String)> = m
                .graph
                .iter()
                .flat_map(|(idx, n)| {
                    m.graph
                        .neighbors(idx)
                        .into_iter()
                        .map(move |o| (n.full_name.clone(), o.full_name.clone()))
                })
                .collect();
            e.sort();
            e
        };
        assert_eq!(edges(&original), edges(&restored));
        assert!(restored.graph.is_consistent());
        assert!(restored.report.created.is_empty());
    }

    #[test]
    fn import_reads_map_id_and_ignores_unknown_lines() {
        let script = "\
@DRAWMAP_EAST(ARG:0 = 0, ARG:1 = 0)
SOMETHING ELSE
CALL DRAWMAP_LINE(\"X\", 1)
CITY_NAME_SHORT:(LOCAL:0) = ●
CITY_NAME_SHORT:1 = X
";
        let imported = import(script);
        assert_eq!(imported.map_id.as_deref(), Some("EAST"));
        assert_eq!(imported.stats.ignored_lines, 2);
        assert_eq!(imported.stats.nodes, 1);
        let node = &imported.graph.nodes[0];
        assert_eq!(node.full_name, "X");
        assert_eq!(node.economy, 0);
        assert_eq!(node.position, Some((0, 0)));
    }

    #[test]
    fn import_keeps_empty_rows_and_quoted_commas() {
        let script = "\
CALL DRAWMAP_LINE(\"A\", 1)
CALL DRAWMAP_LINE(\"\", )
CALL DRAWMAP_LINE(\"say \\\"x\\\", ok\", )
";
        let imported = import(script);
        assert_eq!(imported.text, "A\n\nsay \"x\", ok");
    }

    #[test]
    fn round_trip_keeps_rows_ending_in_backslash() {
        let mut original = map::parse("A--\\\n   ◇\nB");
        original.graph.connect(NodeIndex(0), NodeIndex(2));
        original.graph.connect(NodeIndex(1), NodeIndex(2));
        original.graph.refresh_relay_name(NodeIndex(2));

        let out = export(&original, "DIAG");
        assert!(out.contains("CALL DRAWMAP_LINE(\"A--\\\", 1)\n"));

        let imported = import(&out);
        assert_eq!(imported.stats.ignored_lines, 0);
        let restored = imported.into_parsed();
        assert_eq!(restored.lines, original.lines);

        let relay = restored
            .graph
            .iter()
            .find(|(_, n)| !n.is_city())
            .map(|(idx, _)| idx)
            .unwrap();
        assert_eq!(restored.graph.nodes[relay.0].full_name, "A-B");
        assert_eq!(restored.graph.nodes[relay.0].position, Some((1, 3)));
        let mut names: Vec<String> = restored
            .graph
            .neighbors(relay)
            .into_iter()
            .map(|n| n.full_name.clone())
            .collect();
        names.sort();
        assert_eq!(names, ["A", "B"]);
    }

    #[test]
    fn backslash_before_escaped_quote_in_row_text() {
        let script = "CALL DRAWMAP_LINE(\"\\\"A\\\"--\\\", 1)\n";
        let imported = import(script);
        assert_eq!(imported.text, "\"A\"--\\");
        assert_eq!(imported.stats.ignored_lines, 0);
    }

    #[test]
    fn import_classifies_relays_by_short_name() {
        let script = "\
CITY_NAME_SHORT:1 = A
CITY_NAME_SHORT:2 = ◇
CITY_NAME:1 = Alpha
CITY_NAME:2 = Gate
CITY_NAME:3 = Pass
";
        let imported = import(script);
        let kinds: Vec<(u32, bool)> = imported
            .graph
            .nodes
            .iter()
            .map(|n| (n.id, n.is_relay()))
            .collect();
        assert_eq!(kinds, vec![(1, false), (2, true), (3, true)]);
        assert_eq!(imported.graph.nodes[2].full_name, "Pass");
    }

    #[test]
    fn relay_warnings_report_line_and_ordinal() {
        let map = map::parse("◇ A ◇\nB ◇");
        let warnings = relay_warnings(&map);
        assert_eq!(
            warnings,
            vec![
                "line 1, relay #1 still has the default name",
                "line 1, relay #2 still has the default name",
                "line 2, relay #1 still has the default name",
            ]
        );
        assert!(relay_warnings(&two_city_map()).is_empty());
    }

    #[test]
    fn displayed_warnings_are_capped() {
        let warnings: Vec<String> = (0..12).map(|i| format!("w{i}")).collect();
        let shown = displayed_warnings(&warnings);
        assert_eq!(shown.len(), MAX_DISPLAYED_WARNINGS + 1);
        assert_eq!(shown.last().map(String::as_str), Some("..."));
        assert_eq!(displayed_warnings(&warnings[..3]).len(), 3);
    }
}
