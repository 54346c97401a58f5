//! Editor session: owns the parsed map and the selection state, and applies
//! the events the UI sends in.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use tracing::{debug, info};

use crate::error::MapError;
use crate::graph::diff::ReparseReport;
use crate::graph::model::{Node, NodeIndex};
use crate::parser::map::{self, ParsedMap};
use crate::parser::script::{self, ImportStats};
use crate::workspace;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Selection {
    #[default]
    Idle,
    Selected(NodeIndex),
}

/// Node attributes the UI can edit while a node is selected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Field {
    FullName,
    Economy,
    Guard,
}

impl Field {
    pub fn label(self) -> &'static str {
        match self {
            Field::FullName => "fullName",
            Field::Economy => "economy",
            Field::Guard => "guard",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EditorEvent {
    TextUpdateRequested(String),
    NodeActivated(u32),
    CancelSelection,
    FieldEdited(Field, String),
    /// `confirmed` accepts any default-named relay warnings up front.
    ExportRequested { map_id: String, confirmed: bool },
    ImportRequested(PathBuf),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Reparsed(ReparseReport),
    Selection(Selection),
    Connected(u32, u32),
    Disconnected(u32, u32),
    FieldUpdated(bool),
    Exported(PathBuf),
    Imported {
        map_id: Option<String>,
        stats: ImportStats,
    },
}

#[derive(Debug, Default)]
pub struct MapEditor {
    parsed: ParsedMap,
    selection: Selection,
    export_dir: PathBuf,
}

impl MapEditor {
    pub fn new(export_dir: impl Into<PathBuf>) -> Self {
        Self {
            parsed: ParsedMap::default(),
            selection: Selection::Idle,
            export_dir: export_dir.into(),
        }
    }

    pub fn from_text(text: &str, export_dir: impl Into<PathBuf>) -> Self {
        let mut editor = Self::new(export_dir);
        editor.apply_text(text);
        editor
    }

    pub fn map(&self) -> &ParsedMap {
        &self.parsed
    }

    pub fn selection(&self) -> Selection {
        self.selection
    }

    pub fn selected_node(&self) -> Option<&Node> {
        match self.selection {
            Selection::Selected(idx) => self.parsed.graph.get(idx),
            Selection::Idle => None,
        }
    }

    /// Selected node plus its connections; empty when idle.
    pub fn highlight(&self) -> BTreeSet<NodeIndex> {
        let Selection::Selected(idx) = self.selection else {
            return BTreeSet::new();
        };
        let mut set = self
            .parsed
            .graph
            .get(idx)
            .map(|n| n.connections.clone())
            .unwrap_or_default();
        set.insert(idx);
        set
    }

    pub fn handle(&mut self, event: EditorEvent) -> Result<Outcome, MapError> {
        match event {
            EditorEvent::TextUpdateRequested(text) => Ok(Outcome::Reparsed(self.apply_text(&text))),
            EditorEvent::NodeActivated(id) => {
                let idx = self
                    .parsed
                    .graph
                    .index_of_id(id)
                    .ok_or(MapError::UnknownNode(id))?;
                Ok(self.activate(idx))
            }
            EditorEvent::CancelSelection => {
                self.cancel();
                Ok(Outcome::Selection(self.selection))
            }
            EditorEvent::FieldEdited(field, value) => {
                Ok(Outcome::FieldUpdated(self.edit_field(field, &value)))
            }
            EditorEvent::ExportRequested { map_id, confirmed } => {
                self.export(&map_id, confirmed).map(Outcome::Exported)
            }
            EditorEvent::ImportRequested(path) => self.import_file(&path),
        }
    }

    /// Reparse `text` against the current graph and clear the selection.
    pub fn apply_text(&mut self, text: &str) -> ReparseReport {
        self.selection = Selection::Idle;
        self.parsed = map::reconcile(text, &self.parsed.graph);
        debug!(summary = %self.parsed.report.summary(), "text applied");
        self.parsed.report.clone()
    }

    /// Drive the selection state machine with a node activation.
    pub fn activate(&mut self, target: NodeIndex) -> Outcome {
        if self.parsed.graph.get(target).is_none() {
            return Outcome::Selection(self.selection);
        }
        let current = match self.selection {
            Selection::Idle => {
                self.selection = Selection::Selected(target);
                return Outcome::Selection(self.selection);
            }
            Selection::Selected(current) if current == target => {
                self.selection = Selection::Idle;
                return Outcome::Selection(self.selection);
            }
            Selection::Selected(current) => current,
        };

        let graph = &mut self.parsed.graph;
        let (a, b) = (graph.nodes[current.0].id, graph.nodes[target.0].id);
        if graph.is_connected(current, target) {
            graph.disconnect(current, target);
            debug!(a, b, "route removed");
            Outcome::Disconnected(a, b)
        } else {
            graph.connect(current, target);
            for idx in [current, target] {
                if graph.refresh_relay_name(idx) {
                    debug!(relay = graph.nodes[idx.0].id, name = %graph.nodes[idx.0].full_name, "relay renamed");
                }
            }
            debug!(a, b, "route added");
            Outcome::Connected(a, b)
        }
    }

    pub fn cancel(&mut self) {
        self.selection = Selection::Idle;
    }

    /// Write `value` into the selected node. Returns `false` without touching
    /// anything when nothing is selected or a number field gets a non-number.
    pub fn edit_field(&mut self, field: Field, value: &str) -> bool {
        let Selection::Selected(idx) = self.selection else {
            return false;
        };
        let Some(node) = self.parsed.graph.get_mut(idx) else {
            return false;
        };
        match field {
            Field::FullName => {
                node.full_name = value.to_string();
                true
            }
            Field::Economy | Field::Guard => {
                let Some(number) = parse_count(value) else {
                    debug!(field = field.label(), value, "ignored non-numeric edit");
                    return false;
                };
                if field == Field::Economy {
                    node.economy = number;
                } else {
                    node.guard = number;
                }
                true
            }
        }
    }

    /// Relay warnings the export of the current map would raise.
    pub fn export_warnings(&self) -> Vec<String> {
        script::relay_warnings(&self.parsed)
    }

    /// Export to the first free `MAP_<map_id>_<n>.erb` in the export directory.
    pub fn export(&self, map_id: &str, confirmed: bool) -> Result<PathBuf, MapError> {
        let warnings = self.export_warnings();
        if !warnings.is_empty() && !confirmed {
            return Err(MapError::ExportAborted { warnings });
        }
        let contents = script::export(&self.parsed, map_id);
        let path = workspace::next_export_path(&self.export_dir, map_id);
        workspace::write_new_file(&path, &contents)?;
        info!(path = %path.display(), nodes = self.parsed.graph.len(), "map exported");
        Ok(path)
    }

    /// Replace the session with the map stored in `path`. On failure the
    /// current map stays as it was.
    pub fn import_file(&mut self, path: &Path) -> Result<Outcome, MapError> {
        let content = workspace::read_text(path)?;
        let imported = script::import(&content);
        let map_id = imported.map_id.clone();
        let stats = imported.stats;
        self.parsed = imported.into_parsed();
        self.selection = Selection::Idle;
        info!(
            path = %path.display(),
            nodes = stats.nodes,
            routes = stats.routes,
            ignored = stats.ignored_lines,
            "map imported"
        );
        Ok(Outcome::Imported { map_id, stats })
    }
}

/// Non-negative integer made of ASCII digits only.
fn parse_count(value: &str) -> Option<u64> {
    if value.is_empty() || !value.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    value.parse().ok()
}
