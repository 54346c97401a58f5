use std::io::{self, Write};
use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use crossterm::event::{self, Event, KeyCode, KeyEvent, KeyEventKind};
use crossterm::execute;
use crossterm::terminal::{
    EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode,
};
use ratatui::backend::CrosstermBackend;
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, BorderType, Borders, Clear, Paragraph, Wrap};
use ratatui::{Frame, Terminal};
use tracing::warn;

use crate::commands::edit;
use crate::editor::{EditorEvent, Field, MapEditor, Outcome, Selection};
use crate::error::MapError;
use crate::graph::model::NodeIndex;
use crate::parser::config::Config;
use crate::parser::map::LineEntry;
use crate::parser::script;
use crate::tui::input::{self, Action, Direction};
use crate::tui::render::{self, MapRenderData, NodeDetails, NodeMarks, RenderSpan, centered_rect};
use crate::workspace::{self, Workspace};

const DEMO_MAP: &str = "\
  北京 ◇ 天津
  ◇      ◇
 太原 ◇ 石家庄 ◇ 济南";

#[derive(Debug, Clone, PartialEq, Eq)]
enum PendingTextKind {
    Field(Field),
    ExportMapId,
    ImportPath,
    SavePath,
}

#[derive(Debug, Clone)]
struct PendingText {
    title: String,
    buffer: String,
    cursor: usize,
    kind: PendingTextKind,
}

impl PendingText {
    fn new(title: impl Into<String>, buffer: String, kind: PendingTextKind) -> Self {
        let cursor = buffer.chars().count();
        Self {
            title: title.into(),
            buffer,
            cursor,
            kind,
        }
    }
}

#[derive(Debug, Clone)]
enum PendingConfirm {
    ExportWithDefaultRelays {
        map_id: String,
        warnings: Vec<String>,
    },
}

#[derive(Debug)]
struct AppState {
    editor: MapEditor,
    config: Config,
    source_path: Option<PathBuf>,
    /// Position of the focus cursor in scan order.
    focus: usize,
    show_help: bool,
    status_message: Option<String>,
    pending_text: Option<PendingText>,
    pending_confirm: Option<PendingConfirm>,
    external_edit_requested: bool,
}

impl AppState {
    fn new(editor: MapEditor, config: Config, source_path: Option<PathBuf>) -> Self {
        Self {
            editor,
            config,
            source_path,
            focus: 0,
            show_help: false,
            status_message: None,
            pending_text: None,
            pending_confirm: None,
            external_edit_requested: false,
        }
    }

    fn load(source: Option<PathBuf>, import: Option<PathBuf>, demo: bool) -> Result<Self> {
        let ws = Workspace::load()?;
        let mut editor = MapEditor::new(ws.export_dir());

        if demo {
            editor.apply_text(DEMO_MAP);
            let mut app = Self::new(editor, ws.config, None);
            app.status_message = Some("demo map: save with [s] to keep it".to_string());
            return Ok(app);
        }

        let mut message = None;
        if let Some(path) = &source
            && path.exists()
        {
            let text = workspace::read_map_text(path)?;
            editor.apply_text(&text);
        } else if let Some(path) = &source {
            message = Some(format!("new map: {}", path.display()));
        }

        if let Some(path) = &import {
            let outcome = editor
                .import_file(path)
                .with_context(|| format!("failed to import {}", path.display()))?;
            message = Some(describe(&outcome));
        }

        let mut app = Self::new(editor, ws.config, source);
        app.status_message = message;
        Ok(app)
    }

    fn title(&self) -> String {
        self.source_path
            .as_ref()
            .map(|p| p.display().to_string())
            .unwrap_or_else(|| "(unsaved)".to_string())
    }

    fn scan_order(&self) -> Vec<NodeIndex> {
        self.editor.map().scan_order()
    }

    fn focused_index(&self) -> Option<NodeIndex> {
        self.scan_order().get(self.focus).copied()
    }

    fn clamp_focus(&mut self) {
        let len = self.scan_order().len();
        self.focus = self.focus.min(len.saturating_sub(1));
    }

    fn draw(&mut self, frame: &mut Frame) {
        let map = self.editor.map();
        let focused = self.focused_index();
        let selected = match self.editor.selection() {
            Selection::Selected(idx) => Some(idx),
            Selection::Idle => None,
        };
        let highlight = self.editor.highlight();

        let lines = map
            .layout
            .iter()
            .map(|entries| {
                entries
                    .iter()
                    .filter_map(|entry| match entry {
                        LineEntry::Text(text) => Some(RenderSpan::Text(text.clone())),
                        LineEntry::Node(idx) => {
                            let node = map.graph.get(*idx)?;
                            Some(RenderSpan::Node {
                                kind: node.kind,
                                text: node.display_text().to_string(),
                                marks: NodeMarks {
                                    selected: selected == Some(*idx),
                                    highlighted: highlight.contains(idx),
                                    focused: focused == Some(*idx),
                                },
                            })
                        }
                    })
                    .collect::<Vec<_>>()
            })
            .collect::<Vec<_>>();

        let details = focused.and_then(|idx| {
            let node = map.graph.get(idx)?;
            Some(NodeDetails {
                id: node.id,
                kind: node.kind,
                name: node.name.clone(),
                full_name: node.full_name.clone(),
                economy: node.economy,
                guard: node.guard,
                neighbors: map
                    .graph
                    .neighbors(idx)
                    .into_iter()
                    .map(|n| format!("#{} {}", n.id, n.full_name))
                    .collect(),
                selected: selected == Some(idx),
            })
        });
        let focus_line = focused
            .and_then(|idx| map.graph.get(idx))
            .and_then(|n| n.position)
            .map(|(line, _)| line);
        let cities = map.graph.city_count();
        let counts = (cities, map.graph.len() - cities);

        let title = self.title();
        let hints = self.hints();
        let data = MapRenderData {
            title: &title,
            lines: &lines,
            focus_line,
            details,
            counts,
            mode_label: self.mode_label(),
            hints: &hints,
            message: self.status_message.as_deref(),
            show_help: self.show_help,
        };
        render::draw(frame, &data);

        if let Some(prompt) = &self.pending_text {
            self.draw_text_prompt(frame, prompt);
        } else if let Some(confirm) = &self.pending_confirm {
            self.draw_confirm_prompt(frame, confirm);
        }
    }

    fn draw_text_prompt(&self, frame: &mut Frame, prompt: &PendingText) {
        let area = centered_rect(frame.area(), 70, 28);
        frame.render_widget(Clear, area);
        let paragraph = Paragraph::new(vec![
            Line::from(Span::styled(
                prompt.title.clone(),
                Style::default().add_modifier(Modifier::BOLD),
            )),
            Line::from(""),
            line_with_cursor(
                &prompt.buffer,
                prompt.cursor,
                "",
                Style::default().fg(Color::White),
                Style::default().fg(Color::DarkGray),
                Style::default()
                    .fg(Color::Yellow)
                    .add_modifier(Modifier::BOLD | Modifier::SLOW_BLINK),
            ),
            Line::from(""),
            Line::from(Span::styled(
                "Backspace deletes char. Enter applies, Esc cancels.",
                Style::default().fg(Color::DarkGray),
            )),
        ])
        .block(Block::default().title("Input").borders(Borders::ALL));
        frame.render_widget(paragraph, area);
    }

    fn draw_confirm_prompt(&self, frame: &mut Frame, confirm: &PendingConfirm) {
        let area = centered_rect(frame.area(), 64, 50);
        frame.render_widget(Clear, area);
        let PendingConfirm::ExportWithDefaultRelays { map_id, warnings } = confirm;
        let mut lines = vec![
            Line::from(Span::styled(
                format!("Export MAP_{map_id} with unnamed relays?"),
                Style::default().add_modifier(Modifier::BOLD),
            )),
            Line::from(""),
        ];
        lines.extend(
            script::displayed_warnings(warnings)
                .into_iter()
                .map(|w| Line::from(Span::styled(w, Style::default().fg(Color::Yellow)))),
        );
        lines.push(Line::from(""));
        lines.push(Line::from(vec![
            Span::styled(
                "[y/Enter]",
                Style::default()
                    .fg(Color::Green)
                    .add_modifier(Modifier::BOLD),
            ),
            Span::styled(" export anyway   ", Style::default().fg(Color::DarkGray)),
            Span::styled(
                "[n/Esc]",
                Style::default().fg(Color::Red).add_modifier(Modifier::BOLD),
            ),
            Span::styled(" cancel", Style::default().fg(Color::DarkGray)),
        ]));
        let paragraph = Paragraph::new(lines).wrap(Wrap { trim: false }).block(
            Block::default()
                .title(" confirm ")
                .borders(Borders::ALL)
                .border_type(BorderType::Rounded)
                .border_style(Style::default().fg(Color::Yellow)),
        );
        frame.render_widget(paragraph, area);
    }

    fn mode_label(&self) -> &'static str {
        if self.pending_confirm.is_some() {
            return "Confirm";
        }
        if self.pending_text.is_some() {
            return "Input";
        }
        match self.editor.selection() {
            Selection::Idle => "Idle",
            Selection::Selected(_) => "Selected",
        }
    }

    fn hints(&self) -> String {
        if self.pending_text.is_some() {
            return "type text, [Backspace] delete, [Enter] apply, [Esc] cancel".to_string();
        }
        if self.pending_confirm.is_some() {
            return "[y] confirm  [n/Esc] cancel".to_string();
        }
        match self.editor.selection() {
            Selection::Idle => {
                "[←→/Tab ↑↓] move  [Enter] select  [E] edit text  [x] export  [i] import  [s] save  [q] quit"
                    .to_string()
            }
            Selection::Selected(_) => {
                "[Enter] link/unlink focus  [n] fullName  [e] economy  [g] guard  [Esc] deselect"
                    .to_string()
            }
        }
    }

    fn handle_key(&mut self, key: KeyEvent) -> Result<bool> {
        self.status_message = None;

        if self.pending_confirm.is_some() {
            return self.handle_confirm_key(key);
        }

        let in_text_mode = self.pending_text.is_some();
        let action = input::action_for_key(key, in_text_mode);
        if in_text_mode {
            return self.handle_text_action(action);
        }

        match action {
            Action::Quit => return Ok(true),
            Action::ToggleHelp => self.show_help = !self.show_help,
            Action::Move(direction) => self.move_focus(direction),
            Action::NextNode => self.move_focus_relative(1),
            Action::Activate => {
                let Some(id) = self
                    .focused_index()
                    .and_then(|idx| self.editor.map().graph.get(idx))
                    .map(|n| n.id)
                else {
                    return Ok(false);
                };
                match self.editor.handle(EditorEvent::NodeActivated(id)) {
                    Ok(outcome) => self.status_message = Some(describe(&outcome)),
                    Err(err) => self.report_error("activate failed", &err),
                }
            }
            Action::Cancel => {
                if self.show_help {
                    self.show_help = false;
                } else {
                    match self.editor.handle(EditorEvent::CancelSelection) {
                        Ok(outcome) => self.status_message = Some(describe(&outcome)),
                        Err(err) => self.report_error("cancel failed", &err),
                    }
                }
            }
            Action::EditField(field) => self.start_field_prompt(field),
            Action::EditText => self.external_edit_requested = true,
            Action::Export => {
                self.pending_text = Some(PendingText::new(
                    "Export: MAPID",
                    self.config.map_id.clone(),
                    PendingTextKind::ExportMapId,
                ));
            }
            Action::Import => {
                self.pending_text = Some(PendingText::new(
                    "Import: path to .erb file",
                    String::new(),
                    PendingTextKind::ImportPath,
                ));
            }
            Action::Save => {
                let current = self
                    .source_path
                    .as_ref()
                    .map(|p| p.display().to_string())
                    .unwrap_or_default();
                self.pending_text = Some(PendingText::new(
                    "Save map text to",
                    current,
                    PendingTextKind::SavePath,
                ));
            }
            Action::SubmitText | Action::Backspace | Action::InputChar(_) | Action::Noop => {}
        }
        Ok(false)
    }

    fn handle_confirm_key(&mut self, key: KeyEvent) -> Result<bool> {
        match key.code {
            KeyCode::Char('y') | KeyCode::Char('Y') | KeyCode::Enter => {
                if let Some(PendingConfirm::ExportWithDefaultRelays { map_id, .. }) =
                    self.pending_confirm.take()
                {
                    self.run_export(map_id, true);
                }
            }
            KeyCode::Esc | KeyCode::Backspace | KeyCode::Char('n') | KeyCode::Char('N') => {
                self.pending_confirm = None;
                self.status_message = Some("export cancelled".to_string());
            }
            _ => {}
        }
        Ok(false)
    }

    fn handle_text_action(&mut self, action: Action) -> Result<bool> {
        match action {
            Action::SubmitText => {
                if let Some(prompt) = self.pending_text.take() {
                    self.apply_text_prompt(prompt);
                }
            }
            Action::Cancel => self.pending_text = None,
            Action::Backspace => {
                if let Some(prompt) = &mut self.pending_text
                    && prompt.cursor > 0
                {
                    let from = byte_index_for_cursor(&prompt.buffer, prompt.cursor - 1);
                    let to = byte_index_for_cursor(&prompt.buffer, prompt.cursor);
                    prompt.buffer.replace_range(from..to, "");
                    prompt.cursor -= 1;
                }
            }
            Action::InputChar(c) => {
                if let Some(prompt) = &mut self.pending_text {
                    let at = byte_index_for_cursor(&prompt.buffer, prompt.cursor);
                    prompt.buffer.insert(at, c);
                    prompt.cursor += 1;
                }
            }
            Action::Move(Direction::Left) => {
                if let Some(prompt) = &mut self.pending_text {
                    prompt.cursor = prompt.cursor.saturating_sub(1);
                }
            }
            Action::Move(Direction::Right) => {
                if let Some(prompt) = &mut self.pending_text {
                    let max = prompt.buffer.chars().count();
                    prompt.cursor = (prompt.cursor + 1).min(max);
                }
            }
            _ => {}
        }
        Ok(false)
    }

    fn apply_text_prompt(&mut self, prompt: PendingText) {
        let PendingText { buffer, kind, .. } = prompt;
        // Field values go through verbatim; numeric fields reject padding.
        let value = match kind {
            PendingTextKind::Field(_) => buffer,
            _ => buffer.trim().to_string(),
        };
        match kind {
            PendingTextKind::Field(field) => {
                let edited = self.editor.handle(EditorEvent::FieldEdited(field, value));
                if let Ok(Outcome::FieldUpdated(true)) = edited {
                    self.status_message = Some(format!("{} updated", field.label()));
                }
            }
            PendingTextKind::ExportMapId => {
                if value.is_empty() {
                    self.status_message = Some("MAPID must not be empty".to_string());
                    return;
                }
                let warnings = self.editor.export_warnings();
                if !warnings.is_empty() && self.config.confirm_default_relays {
                    self.pending_confirm = Some(PendingConfirm::ExportWithDefaultRelays {
                        map_id: value,
                        warnings,
                    });
                } else {
                    self.run_export(value, true);
                }
            }
            PendingTextKind::ImportPath => {
                if value.is_empty() {
                    return;
                }
                match self.editor.handle(EditorEvent::ImportRequested(value.into())) {
                    Ok(outcome) => {
                        self.focus = 0;
                        self.status_message = Some(describe(&outcome));
                    }
                    Err(err) => self.report_error("import failed", &err),
                }
            }
            PendingTextKind::SavePath => {
                if value.is_empty() {
                    return;
                }
                let path = PathBuf::from(value);
                match workspace::write_map_text(&path, &self.editor.map().text()) {
                    Ok(()) => {
                        self.status_message = Some(format!("saved {}", path.display()));
                        self.source_path = Some(path);
                    }
                    Err(err) => self.report_error("save failed", &err),
                }
            }
        }
    }

    fn start_field_prompt(&mut self, field: Field) {
        let Some(node) = self.editor.selected_node() else {
            self.status_message = Some("select a node first [Enter]".to_string());
            return;
        };
        let current = match field {
            Field::FullName => node.full_name.clone(),
            Field::Economy => node.economy.to_string(),
            Field::Guard => node.guard.to_string(),
        };
        let title = format!("#{} {}: {}", node.id, node.display_text(), field.label());
        self.pending_text = Some(PendingText::new(title, current, PendingTextKind::Field(field)));
    }

    fn run_export(&mut self, map_id: String, confirmed: bool) {
        match self
            .editor
            .handle(EditorEvent::ExportRequested { map_id, confirmed })
        {
            Ok(outcome) => self.status_message = Some(describe(&outcome)),
            Err(err) => self.report_error("export failed", &err),
        }
    }

    fn report_error(&mut self, what: &str, err: &MapError) {
        warn!(error = %err, "{what}");
        self.status_message = Some(format!("{what}: {err}"));
    }

    /// Reparse text returned from the external editor.
    fn finish_external_edit(&mut self, edited: Result<String>) {
        match edited {
            Ok(text) => {
                if text == self.editor.map().text() {
                    self.status_message = Some("map text unchanged".to_string());
                    return;
                }
                match self.editor.handle(EditorEvent::TextUpdateRequested(text)) {
                    Ok(outcome) => self.status_message = Some(describe(&outcome)),
                    Err(err) => self.report_error("reparse failed", &err),
                }
                self.clamp_focus();
            }
            Err(err) => {
                warn!(error = %err, "external edit failed");
                self.status_message = Some(format!("edit failed: {err:#}"));
            }
        }
    }

    fn move_focus(&mut self, direction: Direction) {
        match direction {
            Direction::Left => self.move_focus_relative(-1),
            Direction::Right => self.move_focus_relative(1),
            Direction::Up => self.move_focus_vertical(-1),
            Direction::Down => self.move_focus_vertical(1),
        }
    }

    fn move_focus_relative(&mut self, delta: isize) {
        let len = self.scan_order().len();
        if len == 0 {
            return;
        }
        self.focus = (self.focus as isize + delta).rem_euclid(len as isize) as usize;
    }

    /// Jump to the node nearest by column on the closest line above or
    /// below that holds any node.
    fn move_focus_vertical(&mut self, step: isize) {
        let map = self.editor.map();
        let Some((line, column)) = self
            .focused_index()
            .and_then(|idx| map.graph.get(idx))
            .and_then(|n| n.position)
        else {
            return;
        };
        let mut probe = line as isize + step;
        while probe >= 0 && (probe as usize) < map.layout.len() {
            let candidates = map.nodes_on_line(probe as usize);
            let nearest = candidates.iter().copied().min_by_key(|idx| {
                map.graph
                    .get(*idx)
                    .and_then(|n| n.position)
                    .map(|(_, c)| c.abs_diff(column))
                    .unwrap_or(usize::MAX)
            });
            if let Some(target) = nearest {
                if let Some(pos) = self.scan_order().iter().position(|i| *i == target) {
                    self.focus = pos;
                }
                return;
            }
            probe += step;
        }
    }
}

/// Status line text for an editor outcome.
fn describe(outcome: &Outcome) -> String {
    match outcome {
        Outcome::Reparsed(report) => format!("reparsed: {}", report.summary()),
        Outcome::Selection(Selection::Idle) => "selection cleared".to_string(),
        Outcome::Selection(Selection::Selected(_)) => {
            "selected: Enter on another node toggles a route".to_string()
        }
        Outcome::Connected(a, b) => format!("route #{a} -- #{b} added"),
        Outcome::Disconnected(a, b) => format!("route #{a} -- #{b} removed"),
        Outcome::FieldUpdated(_) => "field updated".to_string(),
        Outcome::Exported(path) => format!("exported {}", path.display()),
        Outcome::Imported { map_id, stats } => format!(
            "imported {} ({} nodes, {} lines, {} ignored)",
            map_id.as_deref().unwrap_or("map"),
            stats.nodes,
            stats.map_lines,
            stats.ignored_lines
        ),
    }
}

/// Write `text` to a temporary file, open it in the editor, read it back.
fn edit_in_external_editor(text: &str, editor_cmd: &str) -> Result<String> {
    let mut tmp = tempfile::Builder::new()
        .prefix("tkmap-")
        .suffix(".txt")
        .tempfile()
        .context("failed to create temporary map file")?;
    tmp.write_all(text.as_bytes())?;
    tmp.flush()?;
    edit::launch(editor_cmd, tmp.path())?;
    let edited = workspace::read_text(tmp.path())?;
    Ok(workspace::trim_final_newline(&edited).to_string())
}

pub fn run(source: Option<PathBuf>, import: Option<PathBuf>, demo: bool) -> Result<()> {
    let mut app = AppState::load(source, import, demo)?;

    let mut stdout = io::stdout();
    enable_raw_mode()?;
    execute!(stdout, EnterAlternateScreen)?;
    let _guard = TerminalGuard;

    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    loop {
        terminal.draw(|f| app.draw(f))?;

        if app.external_edit_requested {
            app.external_edit_requested = false;
            let editor_cmd = edit::resolve_editor(app.config.editor.clone());
            suspend_terminal()?;
            let edited = edit_in_external_editor(&app.editor.map().text(), &editor_cmd);
            resume_terminal(&mut terminal)?;
            app.finish_external_edit(edited);
            continue;
        }

        if !event::poll(Duration::from_millis(200))? {
            continue;
        }
        if let Event::Key(key) = event::read()? {
            if matches!(key.kind, KeyEventKind::Release | KeyEventKind::Repeat) {
                continue;
            }
            if app.handle_key(key)? {
                break;
            }
        }
    }
    Ok(())
}

fn suspend_terminal() -> Result<()> {
    disable_raw_mode()?;
    execute!(io::stdout(), LeaveAlternateScreen)?;
    Ok(())
}

fn resume_terminal<W: Write>(terminal: &mut Terminal<CrosstermBackend<W>>) -> Result<()> {
    enable_raw_mode()?;
    execute!(io::stdout(), EnterAlternateScreen)?;
    terminal.clear()?;
    Ok(())
}

struct TerminalGuard;

impl Drop for TerminalGuard {
    fn drop(&mut self) {
        let _ = disable_raw_mode();
        let mut stdout = io::stdout();
        let _ = execute!(stdout, LeaveAlternateScreen);
    }
}

fn line_with_cursor(
    text: &str,
    cursor: usize,
    placeholder: &str,
    text_style: Style,
    placeholder_style: Style,
    caret_style: Style,
) -> Line<'static> {
    let mut spans = Vec::new();
    let char_len = text.chars().count();
    let clamped = cursor.min(char_len);

    if char_len == 0 {
        spans.push(Span::styled("▌", caret_style));
        if !placeholder.is_empty() {
            spans.push(Span::raw(" "));
            spans.push(Span::styled(placeholder.to_string(), placeholder_style));
        }
        return Line::from(spans);
    }

    let split = byte_index_for_cursor(text, clamped);
    let (left, right) = text.split_at(split);
    if !left.is_empty() {
        spans.push(Span::styled(left.to_string(), text_style));
    }
    spans.push(Span::styled("▌", caret_style));
    if !right.is_empty() {
        spans.push(Span::styled(right.to_string(), text_style));
    }
    Line::from(spans)
}

fn byte_index_for_cursor(text: &str, cursor: usize) -> usize {
    text.char_indices()
        .nth(cursor)
        .map(|(idx, _)| idx)
        .unwrap_or(text.len())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crossterm::event::KeyModifiers;
    use std::fs;
    use std::path::Path;
    use tempfile::TempDir;

    fn app(text: &str, export_dir: &Path) -> AppState {
        AppState::new(
            MapEditor::from_text(text, export_dir),
            Config::default(),
            None,
        )
    }

    fn press(app: &mut AppState, code: KeyCode) {
        app.handle_key(KeyEvent::new(code, KeyModifiers::NONE))
            .unwrap();
    }

    fn type_text(app: &mut AppState, text: &str) {
        for c in text.chars() {
            press(app, KeyCode::Char(c));
        }
    }

    fn focused_name(app: &AppState) -> String {
        let idx = app.focused_index().unwrap();
        app.editor.map().graph.get(idx).unwrap().display_text().to_string()
    }

    #[test]
    fn horizontal_focus_follows_scan_order_and_wraps() {
        let dir = TempDir::new().unwrap();
        let mut app = app("A◇B\nC", dir.path());
        assert_eq!(focused_name(&app), "A");
        press(&mut app, KeyCode::Right);
        assert_eq!(focused_name(&app), "◇");
        press(&mut app, KeyCode::Tab);
        assert_eq!(focused_name(&app), "B");
        press(&mut app, KeyCode::Tab);
        assert_eq!(focused_name(&app), "C");
        press(&mut app, KeyCode::Right);
        assert_eq!(focused_name(&app), "A");
        press(&mut app, KeyCode::Left);
        assert_eq!(focused_name(&app), "C");
    }

    #[test]
    fn vertical_focus_picks_nearest_column_and_skips_empty_lines() {
        let dir = TempDir::new().unwrap();
        let mut app = app("A    B\n\n--\n    C  D", dir.path());
        press(&mut app, KeyCode::Down);
        assert_eq!(focused_name(&app), "C");
        press(&mut app, KeyCode::Right);
        assert_eq!(focused_name(&app), "D");
        press(&mut app, KeyCode::Up);
        assert_eq!(focused_name(&app), "B");
        press(&mut app, KeyCode::Up);
        assert_eq!(focused_name(&app), "B");
    }

    #[test]
    fn enter_selects_and_links_nodes() {
        let dir = TempDir::new().unwrap();
        let mut app = app("A◇B", dir.path());
        press(&mut app, KeyCode::Right);
        press(&mut app, KeyCode::Enter);
        assert_eq!(app.mode_label(), "Selected");
        press(&mut app, KeyCode::Left);
        press(&mut app, KeyCode::Enter);
        press(&mut app, KeyCode::Right);
        press(&mut app, KeyCode::Right);
        press(&mut app, KeyCode::Enter);
        let graph = &app.editor.map().graph;
        let relay = graph.relays().next().unwrap();
        assert_eq!(relay.full_name, "A-B");
        assert_eq!(relay.connections.len(), 2);
        press(&mut app, KeyCode::Esc);
        assert_eq!(app.mode_label(), "Idle");
        assert_eq!(app.status_message.as_deref(), Some("selection cleared"));
    }

    #[test]
    fn field_prompt_requires_selection() {
        let dir = TempDir::new().unwrap();
        let mut app = app("A", dir.path());
        press(&mut app, KeyCode::Char('n'));
        assert!(app.pending_text.is_none());
        assert!(app.status_message.as_deref().unwrap().contains("select"));
    }

    #[test]
    fn field_prompt_edits_selected_node() {
        let dir = TempDir::new().unwrap();
        let mut app = app("A", dir.path());
        press(&mut app, KeyCode::Enter);
        press(&mut app, KeyCode::Char('n'));
        for _ in 0.."A".len() {
            press(&mut app, KeyCode::Backspace);
        }
        type_text(&mut app, "Alpha");
        press(&mut app, KeyCode::Enter);
        press(&mut app, KeyCode::Char('e'));
        type_text(&mut app, "x");
        press(&mut app, KeyCode::Enter);
        let node = &app.editor.map().graph.nodes[0];
        assert_eq!(node.full_name, "Alpha");
        assert_eq!(node.economy, crate::graph::model::DEFAULT_ECONOMY);
    }

    #[test]
    fn field_prompt_keeps_value_verbatim() {
        use crate::graph::model::DEFAULT_GUARD;
        let dir = TempDir::new().unwrap();
        let mut app = app("A", dir.path());
        press(&mut app, KeyCode::Enter);
        press(&mut app, KeyCode::Char('n'));
        press(&mut app, KeyCode::Backspace);
        type_text(&mut app, " Alpha ");
        press(&mut app, KeyCode::Enter);
        press(&mut app, KeyCode::Char('g'));
        for _ in 0..DEFAULT_GUARD.to_string().len() {
            press(&mut app, KeyCode::Backspace);
        }
        type_text(&mut app, " 5");
        press(&mut app, KeyCode::Enter);
        let node = &app.editor.map().graph.nodes[0];
        assert_eq!(node.full_name, " Alpha ");
        assert_eq!(node.guard, DEFAULT_GUARD);
    }

    #[test]
    fn export_with_default_relay_asks_for_confirmation() {
        let dir = TempDir::new().unwrap();
        let mut app = app("A◇B", dir.path());
        press(&mut app, KeyCode::Char('x'));
        press(&mut app, KeyCode::Enter);
        assert!(app.pending_confirm.is_some());
        press(&mut app, KeyCode::Char('n'));
        assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 0);

        press(&mut app, KeyCode::Char('x'));
        press(&mut app, KeyCode::Enter);
        press(&mut app, KeyCode::Char('y'));
        assert!(dir.path().join("MAP_NEWMAP_1.erb").exists());
        assert!(app.status_message.as_deref().unwrap().starts_with("exported"));
    }

    #[test]
    fn export_skips_confirmation_when_disabled() {
        let dir = TempDir::new().unwrap();
        let mut app = app("A◇B", dir.path());
        app.config.confirm_default_relays = false;
        press(&mut app, KeyCode::Char('x'));
        press(&mut app, KeyCode::Enter);
        assert!(app.pending_confirm.is_none());
        assert!(dir.path().join("MAP_NEWMAP_1.erb").exists());
    }

    #[test]
    fn import_failure_becomes_status_message() {
        let dir = TempDir::new().unwrap();
        let mut app = app("A B", dir.path());
        press(&mut app, KeyCode::Char('i'));
        type_text(&mut app, &dir.path().join("nope.erb").display().to_string());
        press(&mut app, KeyCode::Enter);
        assert!(app.status_message.as_deref().unwrap().starts_with("import failed"));
        assert_eq!(app.editor.map().text(), "A B");
    }

    #[test]
    fn save_writes_text_and_remembers_path() {
        let dir = TempDir::new().unwrap();
        let mut app = app("A◇B", dir.path());
        let path = dir.path().join("east.txt");
        press(&mut app, KeyCode::Char('s'));
        type_text(&mut app, &path.display().to_string());
        press(&mut app, KeyCode::Enter);
        assert_eq!(fs::read_to_string(&path).unwrap(), "A◇B\n");
        assert_eq!(app.source_path.as_deref(), Some(path.as_path()));
    }

    #[test]
    fn external_edit_result_is_reconciled() {
        let dir = TempDir::new().unwrap();
        let mut app = app("A◇B", dir.path());
        press(&mut app, KeyCode::Char('E'));
        assert!(app.external_edit_requested);
        app.finish_external_edit(Ok("A◇B C".to_string()));
        assert_eq!(app.editor.map().graph.len(), 4);
        assert!(app.status_message.as_deref().unwrap().contains("1 new"));

        app.finish_external_edit(Err(anyhow::anyhow!("boom")));
        assert!(app.status_message.as_deref().unwrap().contains("boom"));
        assert_eq!(app.editor.map().graph.len(), 4);
    }

    #[test]
    fn prompt_cursor_edits_multibyte_text() {
        let dir = TempDir::new().unwrap();
        let mut app = app("北京", dir.path());
        press(&mut app, KeyCode::Enter);
        press(&mut app, KeyCode::Char('n'));
        press(&mut app, KeyCode::Left);
        press(&mut app, KeyCode::Backspace);
        type_text(&mut app, "南");
        press(&mut app, KeyCode::Enter);
        assert_eq!(app.editor.map().graph.nodes[0].full_name, "南京");
    }
}
