use std::collections::HashSet;
use std::io::stdout;

use anyhow::Result;
use crossterm::{
    event::{self, Event, KeyCode, KeyEventKind},
    execute,
    terminal::{EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode},
};
use linetree_protocol::{CallRow, CallTreeView, SharedStr, format_seconds};
use ratatui::{
    Terminal,
    backend::CrosstermBackend,
    layout::{Constraint, Layout},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, List, ListItem, ListState, Paragraph},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    Continue,
    Quit,
}

/// Cursor, collapsed subtrees and pane toggles of the tree view.
#[derive(Debug, Default)]
pub struct TreeState {
    collapsed: HashSet<SharedStr>,
    /// Position within the visible rows.
    selected: usize,
    show_line_stats: bool,
}

impl TreeState {
    /// Indices into `view.rows` that are not hidden under a collapsed row.
    pub fn visible(&self, view: &CallTreeView) -> Vec<usize> {
        view.visible(&self.collapsed).map(|(i, _)| i).collect()
    }

    pub fn selected_row<'a>(&self, view: &'a CallTreeView) -> Option<&'a CallRow> {
        self.visible(view)
            .get(self.selected)
            .map(|&i| &view.rows[i])
    }

    pub fn is_collapsed(&self, row: &CallRow) -> bool {
        self.collapsed.contains(&row.id)
    }

    pub fn handle_key(&mut self, code: KeyCode, view: &CallTreeView) -> Action {
        let visible = self.visible(view).len();
        match code {
            KeyCode::Char('q') | KeyCode::Esc => return Action::Quit,
            KeyCode::Up | KeyCode::Char('k') => self.selected = self.selected.saturating_sub(1),
            KeyCode::Down | KeyCode::Char('j') => {
                self.selected = (self.selected + 1).min(visible.saturating_sub(1));
            }
            KeyCode::PageUp => self.selected = self.selected.saturating_sub(10),
            KeyCode::PageDown => {
                self.selected = (self.selected + 10).min(visible.saturating_sub(1));
            }
            KeyCode::Home => self.selected = 0,
            KeyCode::End => self.selected = visible.saturating_sub(1),
            KeyCode::Left | KeyCode::Char('h') => self.set_collapsed(view, true),
            KeyCode::Right | KeyCode::Char('l') => self.set_collapsed(view, false),
            KeyCode::Enter | KeyCode::Char(' ') => {
                if let Some(row) = self.selected_row(view) {
                    let collapse = !self.is_collapsed(row);
                    self.set_collapsed(view, collapse);
                }
            }
            KeyCode::Char('s') => self.show_line_stats = !self.show_line_stats,
            _ => {}
        }
        Action::Continue
    }

    // Rows above the cursor never change visibility, so the cursor position
    // stays valid across collapse and expand.
    fn set_collapsed(&mut self, view: &CallTreeView, collapse: bool) {
        let Some(row) = self.selected_row(view) else {
            return;
        };
        if !row.has_subfuncs {
            return;
        }
        let id = row.id.clone();
        if collapse {
            self.collapsed.insert(id);
        } else {
            self.collapsed.remove(&id);
        }
    }
}

fn row_line(row: &CallRow, collapsed: bool) -> Line<'static> {
    let (r, g, b) = row.color.to_rgb().to_u8();
    let marker = match (row.has_subfuncs, collapsed) {
        (false, _) => "  ",
        (true, false) => "▾ ",
        (true, true) => "▸ ",
    };
    Line::from(vec![
        Span::styled(
            format!(
                "{:>8} {:>8} {:>7} ",
                format_seconds(row.cumulative_time),
                format_seconds(row.self_time),
                row.call_count
            ),
            Style::default().fg(Color::Gray),
        ),
        Span::raw(" ".repeat(2 * row.depth as usize)),
        Span::styled("  ", Style::default().bg(Color::Rgb(r, g, b))),
        Span::raw(" "),
        Span::raw(marker),
        Span::styled(
            row.plain_name.clone(),
            Style::default().fg(Color::White),
        ),
        Span::styled(
            if row.line_stats.is_some() { " [lines]" } else { "" },
            Style::default().fg(Color::Cyan),
        ),
    ])
}

pub fn render_tui(view: &CallTreeView) -> Result<()> {
    enable_raw_mode()?;
    let mut stdout = stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let mut state = TreeState::default();
    let mut list_state = ListState::default();

    loop {
        let visible = state.visible(view);
        list_state.select((!visible.is_empty()).then_some(state.selected));
        let report = state
            .selected_row(view)
            .and_then(|row| row.line_stats.as_deref())
            .filter(|_| state.show_line_stats);

        terminal.draw(|frame| {
            let report_height = report.map_or(0, |text| {
                (text.lines().count() as u16 + 2).min(frame.area().height / 2)
            });
            let [header_area, tree_area, report_area] = Layout::vertical([
                Constraint::Length(1),
                Constraint::Min(1),
                Constraint::Length(report_height),
            ])
            .areas(frame.area());

            let header = Block::default()
                .title(format!(
                    " linetree: {} rows | ↑↓ move | ←→ collapse/expand | s line stats | q quit ",
                    view.len()
                ))
                .style(Style::default().fg(Color::White).bg(Color::DarkGray));
            frame.render_widget(header, header_area);

            if visible.is_empty() {
                let empty = Paragraph::new("No call tree: the entry point was not found in the profile.")
                    .style(Style::default().fg(Color::Gray));
                frame.render_widget(empty, tree_area);
                return;
            }

            let items: Vec<ListItem<'_>> = visible
                .iter()
                .map(|&i| {
                    let row = &view.rows[i];
                    ListItem::new(row_line(row, state.is_collapsed(row)))
                })
                .collect();
            let list = List::new(items)
                .block(Block::default().borders(Borders::NONE))
                .highlight_style(Style::default().add_modifier(Modifier::REVERSED));
            frame.render_stateful_widget(list, tree_area, &mut list_state);

            if let Some(text) = report {
                let pane = Paragraph::new(text.to_string())
                    .block(Block::default().borders(Borders::TOP).title(" line stats "));
                frame.render_widget(pane, report_area);
            }
        })?;

        if event::poll(std::time::Duration::from_millis(100))?
            && let Event::Key(key) = event::read()?
            && key.kind == KeyEventKind::Press
            && state.handle_key(key.code, view) == Action::Quit
        {
            break;
        }
    }

    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use linetree_core::model::EntryPoint;
    use linetree_core::{ProfileSession, TreeOptions};

    /// main → parse → lex, main → emit
    const CALL_GRAPH: &str = r#"{"functions": [
        {"function": ["c.py", 1, "main"],
         "call_count": 1, "primitive_calls": 1, "self_time": 0.0, "cumulative_time": 1.0},
        {"function": ["c.py", 10, "parse"],
         "call_count": 1, "primitive_calls": 1, "self_time": 0.2, "cumulative_time": 0.6,
         "callers": [{"function": ["c.py", 1, "main"],
                      "call_count": 1, "primitive_calls": 1, "self_time": 0.2, "cumulative_time": 0.6}]},
        {"function": ["c.py", 20, "lex"],
         "call_count": 1, "primitive_calls": 1, "self_time": 0.4, "cumulative_time": 0.4,
         "callers": [{"function": ["c.py", 10, "parse"],
                      "call_count": 1, "primitive_calls": 1, "self_time": 0.4, "cumulative_time": 0.4}]},
        {"function": ["c.py", 30, "emit"],
         "call_count": 1, "primitive_calls": 1, "self_time": 0.4, "cumulative_time": 0.4,
         "callers": [{"function": ["c.py", 1, "main"],
                      "call_count": 1, "primitive_calls": 1, "self_time": 0.4, "cumulative_time": 0.4}]}
    ]}"#;

    fn view() -> CallTreeView {
        ProfileSession::from_dumps(
            CALL_GRAPH.as_bytes(),
            None,
            Some(EntryPoint::new("c.py", 1)),
            TreeOptions::default(),
        )
        .unwrap()
        .rows()
    }

    fn selected_name(state: &TreeState, view: &CallTreeView) -> String {
        state.selected_row(view).unwrap().plain_name.clone()
    }

    #[test]
    fn moves_within_visible_rows() {
        let view = view();
        let mut state = TreeState::default();
        assert_eq!(state.visible(&view).len(), 4);

        state.handle_key(KeyCode::Up, &view);
        assert_eq!(state.selected, 0);
        state.handle_key(KeyCode::End, &view);
        assert_eq!(selected_name(&state, &view), "c.py in emit(30)");
        state.handle_key(KeyCode::Down, &view);
        assert_eq!(state.selected, 3);
    }

    #[test]
    fn collapse_hides_descendants() {
        let view = view();
        let mut state = TreeState::default();
        state.handle_key(KeyCode::Down, &view);
        assert_eq!(selected_name(&state, &view), "c.py in parse(10)");

        state.handle_key(KeyCode::Left, &view);
        assert_eq!(state.visible(&view), vec![0, 1, 3]);
        state.handle_key(KeyCode::Down, &view);
        assert_eq!(selected_name(&state, &view), "c.py in emit(30)");

        state.handle_key(KeyCode::Up, &view);
        state.handle_key(KeyCode::Enter, &view);
        assert_eq!(state.visible(&view).len(), 4);
    }

    #[test]
    fn leaves_do_not_collapse() {
        let view = view();
        let mut state = TreeState::default();
        state.handle_key(KeyCode::End, &view);
        state.handle_key(KeyCode::Left, &view);
        assert!(state.collapsed.is_empty());
    }

    #[test]
    fn quit_and_line_stats_toggle() {
        let view = view();
        let mut state = TreeState::default();
        assert_eq!(state.handle_key(KeyCode::Char('s'), &view), Action::Continue);
        assert!(state.show_line_stats);
        assert_eq!(state.handle_key(KeyCode::Char('q'), &view), Action::Quit);
    }
}
