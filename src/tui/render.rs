use ratatui::Frame;
use ratatui::layout::Margin;
use ratatui::layout::{Constraint, Flex, Layout, Rect};
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, BorderType, Borders, Clear, Padding, Paragraph, Wrap};

use crate::graph::model::NodeKind;

/// Styling flags for a node cell on the map.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct NodeMarks {
    pub selected: bool,
    pub highlighted: bool,
    pub focused: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RenderSpan {
    Text(String),
    Node {
        kind: NodeKind,
        text: String,
        marks: NodeMarks,
    },
}

/// Tooltip data for the focused node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeDetails {
    pub id: u32,
    pub kind: NodeKind,
    pub name: String,
    pub full_name: String,
    pub economy: u64,
    pub guard: u64,
    pub neighbors: Vec<String>,
    pub selected: bool,
}

#[derive(Debug)]
pub struct MapRenderData<'a> {
    pub title: &'a str,
    pub lines: &'a [Vec<RenderSpan>],
    /// Line holding the focus cursor, kept in view.
    pub focus_line: Option<usize>,
    pub details: Option<NodeDetails>,
    pub counts: (usize, usize),
    pub mode_label: &'a str,
    pub hints: &'a str,
    pub message: Option<&'a str>,
    pub show_help: bool,
}

pub fn draw(frame: &mut Frame, data: &MapRenderData<'_>) {
    let area = frame.area().inner(Margin {
        horizontal: 1,
        vertical: 0,
    });

    let title = Line::from(vec![
        Span::styled("tkmap", Style::default().add_modifier(Modifier::BOLD)),
        Span::raw("  "),
        Span::styled(data.title.to_string(), Style::default().fg(Color::Gray)),
        Span::raw("  "),
        Span::styled("[?] help", Style::default().fg(Color::DarkGray)),
        Span::raw("  "),
        Span::styled("[q] quit", Style::default().fg(Color::DarkGray)),
    ]);
    let outer = Block::default()
        .borders(Borders::ALL)
        .border_type(BorderType::Double)
        .border_style(Style::default().fg(Color::DarkGray))
        .padding(Padding::new(1, 1, 0, 0))
        .title(title);
    let inner = outer.inner(area);
    frame.render_widget(outer, area);

    let [panes_area, status_area] =
        Layout::vertical([Constraint::Min(6), Constraint::Length(4)]).areas(inner);
    let [map_outer, _, details_outer] = Layout::horizontal([
        Constraint::Percentage(66),
        Constraint::Length(1),
        Constraint::Fill(1),
    ])
    .areas(panes_area);

    let (cities, relays) = data.counts;
    let map_block = Block::default()
        .borders(Borders::ALL)
        .border_type(BorderType::Rounded)
        .border_style(Style::default().fg(Color::White))
        .title(Line::from(vec![
            Span::styled(
                "MAP",
                Style::default()
                    .fg(Color::White)
                    .add_modifier(Modifier::BOLD | Modifier::UNDERLINED),
            ),
            Span::raw("  "),
            Span::styled(
                format!("{cities} cities, {relays} relays"),
                Style::default().fg(Color::DarkGray),
            ),
        ]));
    let map_inner = map_block.inner(map_outer);
    frame.render_widget(map_block, map_outer);

    let scroll = scroll_offset(data.focus_line, map_inner.height as usize);
    let map = Paragraph::new(map_lines(data.lines)).scroll((scroll as u16, 0));
    frame.render_widget(map, map_inner);

    let details_block = Block::default()
        .borders(Borders::ALL)
        .border_type(BorderType::Rounded)
        .border_style(Style::default().fg(Color::DarkGray))
        .title(Line::from(vec![
            Span::styled("DETAILS", Style::default().fg(Color::Gray).add_modifier(Modifier::BOLD)),
            Span::raw("  "),
            Span::styled(data.mode_label.to_string(), Style::default().fg(Color::DarkGray)),
        ]));
    let details_inner = details_block.inner(details_outer);
    frame.render_widget(details_block, details_outer);
    let details = Paragraph::new(details_lines(data.details.as_ref())).wrap(Wrap { trim: false });
    frame.render_widget(details, details_inner);

    let top_status = match &data.details {
        Some(d) => format!("FOCUS: #{} {}   links: {}", d.id, d.full_name, d.neighbors.len()),
        None => "FOCUS: —".to_string(),
    };
    let mut hint_line = data.hints.to_string();
    if let Some(msg) = data.message {
        hint_line.push_str("   ");
        hint_line.push_str(msg);
    }
    let status = Paragraph::new(vec![
        Line::from(Span::styled(
            top_status,
            Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD),
        )),
        Line::from(Span::styled(hint_line, Style::default().fg(Color::DarkGray))),
    ])
    .block(
        Block::default()
            .borders(Borders::ALL)
            .border_type(BorderType::Rounded)
            .border_style(Style::default().fg(Color::DarkGray))
            .padding(Padding::new(1, 1, 0, 0)),
    );
    frame.render_widget(status, status_area);

    if data.show_help {
        render_help_overlay(frame);
    }
}

/// Smallest scroll that keeps `focus_line` inside a pane `height` rows tall.
fn scroll_offset(focus_line: Option<usize>, height: usize) -> usize {
    match focus_line {
        Some(line) if height > 0 && line >= height => line + 1 - height,
        _ => 0,
    }
}

pub fn node_style(kind: NodeKind, marks: NodeMarks) -> Style {
    let mut style = match kind {
        NodeKind::City => Style::default().fg(Color::White).add_modifier(Modifier::BOLD),
        NodeKind::Relay => Style::default().fg(Color::Yellow),
    };
    if marks.selected {
        style = style.bg(Color::Green).fg(Color::Black);
    } else if marks.highlighted {
        style = style.bg(Color::Magenta).fg(Color::White);
    }
    if marks.focused {
        style = style.add_modifier(Modifier::BOLD | Modifier::UNDERLINED | Modifier::REVERSED);
    }
    style
}

fn map_lines(lines: &[Vec<RenderSpan>]) -> Vec<Line<'static>> {
    lines
        .iter()
        .map(|spans| {
            Line::from(
                spans
                    .iter()
                    .map(|span| match span {
                        RenderSpan::Text(text) => {
                            Span::styled(text.clone(), Style::default().fg(Color::DarkGray))
                        }
                        RenderSpan::Node { kind, text, marks } => {
                            Span::styled(text.clone(), node_style(*kind, *marks))
                        }
                    })
                    .collect::<Vec<_>>(),
            )
        })
        .collect()
}

fn details_lines(details: Option<&NodeDetails>) -> Vec<Line<'static>> {
    let Some(d) = details else {
        return vec![Line::from(Span::styled(
            "No nodes. Press E to edit the map text.",
            Style::default().fg(Color::DarkGray),
        ))];
    };
    let heading = Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD);
    let kind = match d.kind {
        NodeKind::City => "City",
        NodeKind::Relay => "Relay",
    };
    let mut lines = vec![
        Line::from(Span::styled(
            if d.selected { "Selected Node" } else { "Focused Node" },
            heading,
        )),
        Line::from(""),
        Line::from(format!("id:       {}", d.id)),
        Line::from(format!("kind:     {kind}")),
        Line::from(format!("name:     {}", d.name)),
        Line::from(format!("fullName: {}", d.full_name)),
        Line::from(format!("economy:  {}", d.economy)),
        Line::from(format!("guard:    {}", d.guard)),
        Line::from(""),
        Line::from(Span::styled(format!("Routes ({})", d.neighbors.len()), heading)),
    ];
    if d.neighbors.is_empty() {
        lines.push(Line::from(Span::styled(
            "(none)",
            Style::default().fg(Color::DarkGray),
        )));
    }
    lines.extend(d.neighbors.iter().map(|n| Line::from(format!("• {n}"))));
    lines
}

fn render_help_overlay(frame: &mut Frame) {
    let area = centered_rect(frame.area(), 70, 70);
    frame.render_widget(Clear, area);
    let help = Paragraph::new(vec![
        Line::from("MOVE"),
        Line::from("  ←/→ or Tab   previous/next node"),
        Line::from("  ↑/↓          nearest node on the line above/below"),
        Line::from(""),
        Line::from("ROUTES"),
        Line::from("  Enter        select node; on another node: add or remove route"),
        Line::from("  Enter again  on the selected node clears the selection"),
        Line::from("  Esc          clear selection"),
        Line::from(""),
        Line::from("SELECTED NODE"),
        Line::from("  n  fullName   e  economy   g  guard"),
        Line::from(""),
        Line::from("MAP"),
        Line::from("  E  edit text in $EDITOR   s  save text"),
        Line::from("  x  export .erb            i  import .erb"),
    ])
    .block(Block::default().title("Help").borders(Borders::ALL));
    frame.render_widget(help, area);
}

pub(crate) fn centered_rect(area: Rect, width_percent: u16, height_percent: u16) -> Rect {
    let vertical = Layout::vertical([
        Constraint::Percentage((100 - height_percent) / 2),
        Constraint::Percentage(height_percent),
        Constraint::Percentage((100 - height_percent) / 2),
    ])
    .flex(Flex::Center)
    .split(area);
    Layout::horizontal([
        Constraint::Percentage((100 - width_percent) / 2),
        Constraint::Percentage(width_percent),
        Constraint::Percentage((100 - width_percent) / 2),
    ])
    .flex(Flex::Center)
    .split(vertical[1])[1]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scroll_keeps_focus_visible() {
        assert_eq!(scroll_offset(None, 10), 0);
        assert_eq!(scroll_offset(Some(3), 10), 0);
        assert_eq!(scroll_offset(Some(10), 10), 1);
        assert_eq!(scroll_offset(Some(25), 10), 16);
        assert_eq!(scroll_offset(Some(5), 0), 0);
    }

    #[test]
    fn selected_wins_over_highlight() {
        let marks = NodeMarks {
            selected: true,
            highlighted: true,
            focused: false,
        };
        assert_eq!(node_style(NodeKind::City, marks).bg, Some(Color::Green));
        let marks = NodeMarks {
            highlighted: true,
            ..NodeMarks::default()
        };
        assert_eq!(node_style(NodeKind::Relay, marks).bg, Some(Color::Magenta));
    }

    #[test]
    fn details_list_neighbors() {
        let d = NodeDetails {
            id: 3,
            kind: NodeKind::Relay,
            name: "◇".into(),
            full_name: "A-B".into(),
            economy: 10_000,
            guard: 100,
            neighbors: vec!["A".into(), "B".into()],
            selected: false,
        };
        let lines = details_lines(Some(&d));
        let text: Vec<String> = lines.iter().map(|l| l.to_string()).collect();
        assert!(text.contains(&"fullName: A-B".to_string()));
        assert!(text.contains(&"• B".to_string()));
        assert_eq!(text[0], "Focused Node");
    }
}
