//! TUI rendering for Wrangle using ratatui.
//!
//! Every surface is drawn from a [`SessionState`] snapshot plus the surface-local
//! [`UiState`]. Nothing here talks to the backend; key presses become intents that the
//! caller hands to the session runtime.

mod input;
mod theme;
mod view;

#[cfg(test)]
mod testing;

pub use input::{Action, InputMode, InputPump, PromptKind, handle_events, handle_key};
pub use theme::{Glyphs, Palette, glyphs, palette, spinner_frame, styles};
pub use view::{SortKey, ViewState};

use std::time::{Duration, Instant};

use ratatui::{
    Frame,
    layout::{Constraint, Direction, Layout, Rect},
    style::{Modifier, Style},
    text::{Line, Span},
    widgets::{Block, BorderType, Borders, Cell, Paragraph, Row, Table, Wrap},
};
use unicode_width::{UnicodeWidthChar, UnicodeWidthStr};

use wrangle_engine::{
    ApplyStage, LoadSource, LoadStage, NoticeLevel, Phase, SessionState, SessionStatus, UiOptions,
    wrangle_types::{sanitize_cell_text, sanitize_terminal_text},
};

const MAX_COLUMN_WIDTH: usize = 28;
const MIN_COLUMN_WIDTH: usize = 3;

/// ~10Hz spinner cadence, independent of render FPS.
pub const SPINNER_INTERVAL: Duration = Duration::from_millis(100);

/// Surface-owned state: everything the TUI remembers between frames that is not
/// session state.
#[derive(Debug, Clone)]
pub struct UiState {
    pub view: ViewState,
    pub(crate) mode: InputMode,
    options: UiOptions,
    tick: usize,
    last_tick: Instant,
}

impl UiState {
    #[must_use]
    pub fn new(options: UiOptions, page_size: usize) -> Self {
        Self {
            view: ViewState::new(page_size),
            mode: InputMode::Normal,
            options,
            tick: 0,
            last_tick: Instant::now(),
        }
    }

    #[must_use]
    pub fn mode(&self) -> &InputMode {
        &self.mode
    }

    #[must_use]
    pub fn options(&self) -> UiOptions {
        self.options
    }

    /// Spinner frame counter.
    #[must_use]
    pub fn tick_count(&self) -> usize {
        self.tick
    }

    /// Called once per rendered frame. The spinner only advances every
    /// [`SPINNER_INTERVAL`], whatever the frame rate.
    pub fn tick(&mut self) {
        self.tick_at(Instant::now());
    }

    fn tick_at(&mut self, now: Instant) {
        if now.duration_since(self.last_tick) >= SPINNER_INTERVAL {
            self.last_tick = now;
            self.tick = self.tick.wrapping_add(1);
        }
    }
}

impl Default for UiState {
    fn default() -> Self {
        Self::new(UiOptions::default(), wrangle_engine::DEFAULT_PAGE_SIZE)
    }
}

/// Main draw function
pub fn draw(frame: &mut Frame, session: &SessionState, ui: &mut UiState) {
    ui.view.observe(session);
    let palette = palette(ui.options);
    let glyphs = glyphs(ui.options);

    let bg_block = Block::default().style(Style::default().bg(palette.bg_dark));
    frame.render_widget(bg_block, frame.area());

    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Min(6),    // Panels
            Constraint::Length(3), // Prompt / key hints
            Constraint::Length(1), // Status bar
        ])
        .split(frame.area());

    let panels = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(60), Constraint::Percentage(40)])
        .split(chunks[0]);

    let side = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Percentage(40),
            Constraint::Percentage(35),
            Constraint::Min(3),
        ])
        .split(panels[1]);

    let rows = ui.view.visible_rows(session);
    draw_data_preview(frame, session, &ui.view, &rows, panels[0], &palette, &glyphs);
    draw_suggestions(frame, session, &ui.view, side[0], &palette, &glyphs);
    draw_code_preview(frame, session, &ui.view, side[1], &palette);
    draw_history(frame, session, side[2], &palette, &glyphs);
    draw_prompt(frame, session, ui, chunks[1], &palette);
    draw_status_bar(frame, session, ui, chunks[2], &palette, &glyphs);
}

fn panel<'a>(title: String, palette: &Palette, focused: bool) -> Block<'a> {
    Block::default()
        .borders(Borders::ALL)
        .border_type(BorderType::Rounded)
        .border_style(styles::panel_border(palette, focused))
        .style(Style::default().bg(palette.bg_panel))
        .title(Line::from(Span::styled(title, styles::panel_title(palette))))
}

fn draw_data_preview(
    frame: &mut Frame,
    session: &SessionState,
    view: &ViewState,
    rows: &[usize],
    area: Rect,
    palette: &Palette,
    glyphs: &Glyphs,
) {
    let Some(dataset) = session.dataset() else {
        let hint = Paragraph::new(vec![
            Line::from(""),
            Line::from(vec![
                Span::styled("  No dataset loaded. Press ", styles::key_hint(palette)),
                Span::styled("o", styles::key_highlight(palette)),
                Span::styled(" to upload a CSV or Excel file.", styles::key_hint(palette)),
            ]),
        ])
        .block(panel(" Data ".to_string(), palette, false));
        frame.render_widget(hint, area);
        return;
    };

    let page_rows = view.page_of(rows);
    let page_count = view.page_count(rows.len());
    let page = view.page().min(page_count - 1) + 1;

    let mut title = String::from(" Data");
    if let Some(label) = session.label() {
        title.push_str(" · ");
        title.push_str(&sanitize_cell_text(label));
    }
    title.push_str(&format!(
        " · {} rows × {} cols · page {page}/{page_count}",
        dataset.row_count(),
        dataset.column_count()
    ));
    if !view.filter().is_empty() {
        title.push_str(&format!(
            " · filter \"{}\" ({} match)",
            sanitize_cell_text(view.filter()),
            rows.len()
        ));
    }
    title.push(' ');

    let headers: Vec<String> = dataset
        .columns()
        .iter()
        .map(|col| {
            let name = sanitize_cell_text(col);
            match view.sort() {
                Some(sort) if &sort.column == col => {
                    let arrow = if sort.descending {
                        glyphs.sort_desc
                    } else {
                        glyphs.sort_asc
                    };
                    format!("{name} {arrow}")
                }
                _ => name.into_owned(),
            }
        })
        .collect();

    let body: Vec<Vec<String>> = page_rows
        .iter()
        .map(|&row| {
            dataset
                .columns()
                .iter()
                .map(|col| sanitize_cell_text(&dataset.cell(row, col).display()).into_owned())
                .collect()
        })
        .collect();

    let widths: Vec<usize> = headers
        .iter()
        .enumerate()
        .map(|(i, header)| {
            body.iter()
                .map(|cells| cells[i].width())
                .chain(std::iter::once(header.width()))
                .max()
                .unwrap_or(0)
                .clamp(MIN_COLUMN_WIDTH, MAX_COLUMN_WIDTH)
        })
        .collect();

    let header = Row::new(
        headers
            .iter()
            .zip(&widths)
            .map(|(h, &w)| Cell::from(fit_width(h, w, glyphs.ellipsis))),
    )
    .style(styles::column_header(palette));

    let table_rows = body.iter().map(|cells| {
        Row::new(
            cells
                .iter()
                .zip(&widths)
                .map(|(c, &w)| Cell::from(fit_width(c, w, glyphs.ellipsis))),
        )
        .style(Style::default().fg(palette.text_primary))
    });

    let constraints = widths
        .iter()
        .map(|&w| Constraint::Length(u16::try_from(w).unwrap_or(u16::MAX)));

    let table = Table::new(table_rows, constraints)
        .header(header)
        .column_spacing(2)
        .block(panel(title, palette, true));
    frame.render_widget(table, area);
}

fn draw_suggestions(
    frame: &mut Frame,
    session: &SessionState,
    view: &ViewState,
    area: Rect,
    palette: &Palette,
    glyphs: &Glyphs,
) {
    let batch = session.suggestions();
    let title = format!(" Suggestions ({}) ", batch.len());

    let lines: Vec<Line> = if batch.is_empty() {
        let text = if session.dataset().is_none() {
            "  Upload a dataset to get suggestions"
        } else if session.status() == SessionStatus::Loading {
            "  Fetching suggestions..."
        } else {
            "  No suggestions for this dataset"
        };
        vec![Line::from(Span::styled(text, styles::key_hint(palette)))]
    } else {
        batch
            .iter()
            .enumerate()
            .map(|(i, suggestion)| {
                let at_cursor = i == view.cursor();
                let is_selected = session.selection() == Some(suggestion.id());
                let marker = match (at_cursor, is_selected) {
                    (_, true) => glyphs.selected,
                    (true, false) => glyphs.cursor,
                    (false, false) => " ",
                };
                let style = if at_cursor {
                    styles::cursor_row(palette)
                } else if is_selected {
                    Style::default().fg(palette.success)
                } else {
                    Style::default().fg(palette.text_secondary)
                };
                Line::from(vec![
                    Span::styled(format!(" {marker} "), Style::default().fg(palette.peach)),
                    Span::styled(sanitize_cell_text(suggestion.title()).into_owned(), style),
                ])
            })
            .collect()
    };

    let list = Paragraph::new(lines).block(panel(title, palette, false));
    frame.render_widget(list, area);
}

fn draw_code_preview(
    frame: &mut Frame,
    session: &SessionState,
    view: &ViewState,
    area: Rect,
    palette: &Palette,
) {
    let (suggestion, title) = match session.selected() {
        Some(s) => (Some(s), " Code · selected "),
        None => (view.cursor_suggestion(session), " Code · preview "),
    };

    let lines: Vec<Line> = match suggestion {
        None => vec![Line::from(Span::styled(
            "  Select a suggestion to preview its code",
            styles::key_hint(palette),
        ))],
        Some(suggestion) => {
            let mut lines = Vec::new();
            let explanation = sanitize_terminal_text(suggestion.explanation());
            if !explanation.trim().is_empty() {
                lines.push(Line::from(Span::styled(
                    explanation.trim().to_string(),
                    Style::default()
                        .fg(palette.text_muted)
                        .add_modifier(Modifier::ITALIC),
                )));
                lines.push(Line::from(""));
            }
            let code = sanitize_terminal_text(&suggestion.code_preview()).into_owned();
            lines.extend(code.lines().map(|line| {
                Line::from(Span::styled(
                    line.to_string(),
                    Style::default().fg(palette.code),
                ))
            }));
            lines
        }
    };

    let preview = Paragraph::new(lines)
        .wrap(Wrap { trim: false })
        .block(panel(title.to_string(), palette, false));
    frame.render_widget(preview, area);
}

fn draw_history(
    frame: &mut Frame,
    session: &SessionState,
    area: Rect,
    palette: &Palette,
    glyphs: &Glyphs,
) {
    let history = session.history();
    let title = format!(" History ({}) ", history.len());

    let lines: Vec<Line> = if history.is_empty() {
        vec![Line::from(Span::styled(
            "  No transformations applied yet",
            styles::key_hint(palette),
        ))]
    } else {
        history
            .records()
            .iter()
            .map(|record| {
                Line::from(vec![
                    Span::styled(
                        format!(" {} {}. ", glyphs.bullet, record.sequence()),
                        Style::default().fg(palette.text_muted),
                    ),
                    Span::styled(
                        sanitize_cell_text(record.suggestion().title()).into_owned(),
                        Style::default().fg(palette.text_primary),
                    ),
                    Span::styled(
                        format!("  ({})", record.applied_to()),
                        Style::default().fg(palette.text_muted),
                    ),
                ])
            })
            .collect()
    };

    let list = Paragraph::new(lines).block(panel(title, palette, false));
    frame.render_widget(list, area);
}

fn draw_prompt(
    frame: &mut Frame,
    session: &SessionState,
    ui: &UiState,
    area: Rect,
    palette: &Palette,
) {
    let (mode_label, mode_style, border_style) = match &ui.mode {
        InputMode::Normal => (
            "NORMAL",
            styles::mode_normal(palette),
            Style::default().fg(palette.text_muted),
        ),
        InputMode::Prompt { kind, .. } => (
            kind.label(),
            styles::mode_prompt(palette),
            Style::default().fg(palette.success),
        ),
    };

    let content = match &ui.mode {
        InputMode::Normal => key_hints(session, palette),
        InputMode::Prompt { kind, text } => {
            let label = match kind {
                PromptKind::Upload => " Path: ",
                PromptKind::Filter => " Filter: ",
            };
            let cursor = if ui.options.ascii_only { "_" } else { "▏" };
            Line::from(vec![
                Span::styled(label, styles::key_hint(palette)),
                Span::styled(
                    sanitize_cell_text(text).into_owned(),
                    Style::default().fg(palette.text_primary),
                ),
                Span::styled(cursor, Style::default().fg(palette.primary)),
                Span::styled("   Enter", styles::key_highlight(palette)),
                Span::styled(" submit  ", styles::key_hint(palette)),
                Span::styled("Esc", styles::key_highlight(palette)),
                Span::styled(" cancel", styles::key_hint(palette)),
            ])
        }
    };

    let block = Block::default()
        .borders(Borders::ALL)
        .border_type(BorderType::Rounded)
        .border_style(border_style)
        .title(Line::from(Span::styled(format!(" {mode_label} "), mode_style)));
    frame.render_widget(Paragraph::new(content).block(block), area);
}

/// Key hints for normal mode. Affordances that would be rejected right now are shown
/// struck through.
fn key_hints(session: &SessionState, palette: &Palette) -> Line<'static> {
    let has_dataset = session.dataset().is_some();
    let hints: [(&str, &str, bool); 9] = [
        ("o", "upload", session.can_upload()),
        ("Enter", "select", !session.is_busy()),
        ("a", "apply", session.can_apply()),
        ("d", "discard", session.selection().is_some()),
        ("r", "refresh", session.can_refresh()),
        ("e", "export", has_dataset),
        ("c", "code", !session.history().is_empty()),
        ("s/S", "sort", has_dataset),
        ("q", "quit", true),
    ];

    let mut spans = vec![Span::raw(" ")];
    for (key, label, enabled) in hints {
        if enabled {
            spans.push(Span::styled(key, styles::key_highlight(palette)));
            spans.push(Span::styled(format!(" {label}  "), styles::key_hint(palette)));
        } else {
            spans.push(Span::styled(key, styles::key_disabled(palette)));
            spans.push(Span::styled(format!(" {label}"), styles::key_disabled(palette)));
            spans.push(Span::raw("  "));
        }
    }
    Line::from(spans)
}

fn draw_status_bar(
    frame: &mut Frame,
    session: &SessionState,
    ui: &UiState,
    area: Rect,
    palette: &Palette,
    glyphs: &Glyphs,
) {
    let (status_text, status_style) = match session.status() {
        SessionStatus::Error(message) => (
            format!(
                "{} Error: {}  (x to dismiss)",
                glyphs.status_error,
                sanitize_cell_text(&message)
            ),
            Style::default().fg(palette.error),
        ),
        SessionStatus::Loading => (
            format!(
                "{} {}",
                spinner_frame(ui.tick_count(), ui.options),
                activity(session)
            ),
            Style::default().fg(palette.primary),
        ),
        SessionStatus::Ready => (
            format!(
                "{} Ready · {} · {} applied",
                glyphs.status_ready,
                session.version(),
                session.history().len()
            ),
            Style::default().fg(palette.success),
        ),
        SessionStatus::Empty => (
            format!("{} No dataset", glyphs.status_empty),
            Style::default().fg(palette.text_muted),
        ),
    };

    let mut spans = vec![Span::raw(" "), Span::styled(status_text, status_style)];
    if let Some(notice) = session.notice() {
        let color = match notice.level {
            NoticeLevel::Info => palette.text_secondary,
            NoticeLevel::Warning => palette.warning,
        };
        spans.push(Span::styled(" │ ", Style::default().fg(palette.text_muted)));
        spans.push(Span::styled(
            sanitize_cell_text(&notice.text).into_owned(),
            Style::default().fg(color),
        ));
    }
    frame.render_widget(Paragraph::new(Line::from(spans)), area);
}

/// Cut `raw` to at most `max` terminal columns, ending in `ellipsis` when cut.
fn fit_width(raw: &str, max: usize, ellipsis: &str) -> String {
    if raw.width() <= max {
        return raw.to_string();
    }
    let room = max.saturating_sub(ellipsis.width());
    let mut used = 0;
    let mut out: String = raw
        .chars()
        .take_while(|ch| {
            used += ch.width().unwrap_or(0);
            used <= room
        })
        .collect();
    out.push_str(ellipsis);
    out
}

/// Human description of what the session is waiting on.
fn activity(session: &SessionState) -> String {
    match session.phase() {
        Phase::Loading(load) => {
            let name = match &load.source {
                LoadSource::Upload { label, .. } => sanitize_cell_text(label).into_owned(),
                LoadSource::Sync => "dataset".to_string(),
            };
            match load.stage {
                LoadStage::Sending => format!("Uploading {name}..."),
                LoadStage::FetchingData => format!("Fetching {name}..."),
                LoadStage::FetchingSuggestions { .. } => "Fetching suggestions...".to_string(),
            }
        }
        Phase::Applying(apply) => match apply.stage {
            ApplyStage::Submitting => format!(
                "Applying {}...",
                sanitize_cell_text(apply.suggestion.title())
            ),
            ApplyStage::RefreshingSuggestions => "Refreshing suggestions...".to_string(),
        },
        Phase::Empty | Phase::Ready | Phase::Error(_) => "Refreshing suggestions...".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use ratatui::Terminal;
    use ratatui::backend::TestBackend;
    use ratatui::buffer::Buffer;
    use ratatui::style::Modifier;

    use wrangle_engine::{SessionState, UiOptions};

    use unicode_width::UnicodeWidthStr;

    use std::time::Duration;

    use super::{SPINNER_INTERVAL, UiState, draw, fit_width};
    use crate::testing::{applied, busy, failed_apply, ready_state, selected};

    fn render(session: &SessionState, ui: &mut UiState) -> Buffer {
        let mut terminal = Terminal::new(TestBackend::new(120, 30)).unwrap();
        terminal.draw(|frame| draw(frame, session, ui)).unwrap();
        terminal.backend().buffer().clone()
    }

    fn text(buffer: &Buffer) -> String {
        let width = buffer.area.width as usize;
        buffer
            .content()
            .chunks(width)
            .map(|row| row.iter().map(|cell| cell.symbol()).collect::<String>())
            .collect::<Vec<_>>()
            .join("\n")
    }

    fn find(buffer: &Buffer, needle: &str) -> Option<(u16, u16)> {
        text(buffer).lines().enumerate().find_map(|(y, line)| {
            line.find(needle).map(|byte| {
                let x = line[..byte].chars().count();
                (u16::try_from(x).unwrap(), u16::try_from(y).unwrap())
            })
        })
    }

    #[test]
    fn empty_session_shows_upload_hint() {
        let screen = text(&render(&SessionState::new(), &mut UiState::default()));
        assert!(screen.contains("No dataset loaded. Press o to upload"));
        assert!(screen.contains("No dataset"));
        assert!(screen.contains("Suggestions (0)"));
        assert!(screen.contains("NORMAL"));
    }

    #[test]
    fn ready_session_renders_all_surfaces() {
        let session = selected(&ready_state(3, 2), 1);
        let screen = text(&render(&session, &mut UiState::default()));

        assert!(screen.contains("Data · 911.csv · 3 rows × 3 cols · page 1/1"));
        assert!(screen.contains("zip"));
        assert!(screen.contains("19525"));
        assert!(screen.contains("NEW HANOVER"));
        assert!(screen.contains("Suggestions (2)"));
        assert!(screen.contains("✓ Split title #1"));
        assert!(screen.contains("Code · selected"));
        assert!(screen.contains("str.split(':', expand=True)"));
        assert!(screen.contains("Separates the call category"));
        assert!(screen.contains("History (0)"));
        assert!(screen.contains("Ready · v1 · 0 applied"));
    }

    #[test]
    fn applied_transformation_lands_in_history() {
        let session = applied(&selected(&ready_state(3, 2), 2), 4, 1);
        let screen = text(&render(&session, &mut UiState::default()));
        assert!(screen.contains("History (1)"));
        assert!(screen.contains("1. Split title #2  (v1)"));
        assert!(screen.contains("4 rows"));
        assert!(screen.contains("Ready · v2 · 1 applied"));
    }

    #[test]
    fn error_status_and_preserved_selection() {
        let session = failed_apply(&selected(&ready_state(3, 2), 1), "column 'title' not found");
        let screen = text(&render(&session, &mut UiState::default()));
        assert!(screen.contains("Error: column 'title' not found  (x to dismiss)"));
        assert!(screen.contains("Code · selected"));
    }

    #[test]
    fn busy_session_strikes_through_mutating_affordances() {
        let session = busy(&selected(&ready_state(3, 1), 1));
        let buffer = render(&session, &mut UiState::default());
        assert!(text(&buffer).contains("Applying Split title"));

        let (x, y) = find(&buffer, "upload").unwrap();
        assert!(
            buffer[(x, y)].modifier.contains(Modifier::CROSSED_OUT),
            "upload hint should be disabled while applying"
        );
        let (x, y) = find(&buffer, "quit").unwrap();
        assert!(!buffer[(x, y)].modifier.contains(Modifier::CROSSED_OUT));
    }

    #[test]
    fn backend_text_is_sanitized() {
        let session = ready_state(1, 0);
        let mut ui = UiState::default();
        ui.view.set_filter("\x1b[31mhanover");
        let screen = text(&render(&session, &mut ui));
        assert!(!screen.contains('\x1b'));
        assert!(screen.contains("No suggestions for this dataset"));
    }

    #[test]
    fn sort_indicator_and_ascii_glyphs() {
        let session = ready_state(3, 1);
        let mut ui = UiState::new(
            UiOptions {
                ascii_only: true,
                high_contrast: false,
            },
            50,
        );
        ui.view.cycle_sort(&["zip".to_string()]);
        ui.view.toggle_sort_direction();
        let screen = text(&render(&session, &mut ui));
        assert!(screen.contains("zip v"));
        assert!(screen.contains("* Ready"));
    }

    #[test]
    fn paging_reflected_in_title() {
        let session = ready_state(120, 1);
        let mut ui = UiState::default();
        ui.view.observe(&session);
        ui.view.next_page(120);
        let screen = text(&render(&session, &mut ui));
        assert!(screen.contains("page 2/3"));
    }

    #[test]
    fn spinner_advances_on_elapsed_time_not_frames() {
        let mut ui = UiState::default();
        let start = ui.last_tick;
        for frame in 1..=12 {
            ui.tick_at(start + Duration::from_millis(8 * frame));
        }
        assert_eq!(ui.tick_count(), 0);

        ui.tick_at(start + SPINNER_INTERVAL);
        assert_eq!(ui.tick_count(), 1);
        ui.tick_at(start + SPINNER_INTERVAL + Duration::from_millis(8));
        assert_eq!(ui.tick_count(), 1);
        ui.tick_at(start + SPINNER_INTERVAL * 2);
        assert_eq!(ui.tick_count(), 2);
    }

    #[test]
    fn cells_are_cut_by_display_width() {
        assert_eq!(fit_width("NEW HANOVER", 11, "…"), "NEW HANOVER");
        assert_eq!(fit_width("NEW HANOVER", 6, "…"), "NEW H…");
        // Each ideograph takes two columns.
        let cut = fit_width("東京都港区芝公園", 7, "…");
        assert_eq!(cut, "東京都…");
        assert!(cut.width() <= 7);
        assert_eq!(fit_width("東京都港区", 4, "..."), "...");
    }
}
