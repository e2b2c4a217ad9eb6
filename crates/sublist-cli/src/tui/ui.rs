//! UI rendering

use ratatui::{
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Clear, Paragraph, Row, Table, TableState, Wrap},
    Frame,
};
use sublist_core::{StatusTone, Store};

use super::app::{App, Focus};

const FORM_LABEL_WIDTH: u16 = 8;

/// Main UI rendering function
pub fn draw(frame: &mut Frame, app: &App, store: &Store) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(4),
            Constraint::Min(3),
            Constraint::Length(1),
            Constraint::Length(1),
        ])
        .split(frame.area());

    draw_form(frame, app, store, chunks[0]);
    draw_table(frame, app, store, chunks[1]);
    draw_status_bar(frame, app, store, chunks[2]);
    draw_hints(frame, app, chunks[3]);

    if let Some(conflict) = &app.pending_conflict {
        draw_popup(
            frame,
            " Replace? ",
            vec![
                Line::from(conflict.prompt()),
                Line::from(""),
                dim_line("y: replace   n/Esc: keep"),
            ],
            Color::Yellow,
        );
    }

    if let Some(error) = &app.error {
        draw_popup(
            frame,
            " Error ",
            vec![
                Line::from(error.as_str()),
                Line::from(""),
                dim_line("Press any key to close"),
            ],
            Color::Red,
        );
    }

    if app.show_help {
        draw_help_overlay(frame);
    }
}

/// Color for a status line
pub fn tone_style(tone: StatusTone) -> Style {
    match tone {
        StatusTone::Synced => Style::default().fg(Color::Rgb(0x00, 0xa1, 0x06)),
        StatusTone::Syncing => Style::default().fg(Color::Rgb(0x38, 0x7d, 0xb2)),
        StatusTone::MayStillBeSyncing => Style::default().fg(Color::Rgb(0xff, 0xa5, 0x00)),
        StatusTone::Neutral => Style::default().fg(Color::Gray),
    }
}

fn dim_line(text: &str) -> Line<'_> {
    Line::from(Span::styled(
        text,
        Style::default().add_modifier(Modifier::DIM),
    ))
}

/// Draw the add form (top)
fn draw_form(frame: &mut Frame, app: &App, store: &Store, area: Rect) {
    let field = |label: &'static str, value: &str, focused: bool| {
        let label_style = if focused {
            Style::default().add_modifier(Modifier::BOLD)
        } else {
            Style::default().add_modifier(Modifier::DIM)
        };
        Line::from(vec![
            Span::styled(
                format!("{:<width$}", label, width = FORM_LABEL_WIDTH as usize),
                label_style,
            ),
            Span::raw(value.to_string()),
        ])
    };

    let lines = vec![
        field("Name", store.name_input(), app.focus == Focus::Name),
        field("Email", store.email_input(), app.focus == Focus::Email),
    ];

    let border_style = if app.focus.is_input() {
        Style::default().add_modifier(Modifier::BOLD)
    } else {
        Style::default()
    };
    let block = Block::default()
        .title(" Add subscriber ")
        .borders(Borders::ALL)
        .border_style(border_style);

    frame.render_widget(Paragraph::new(lines).block(block), area);

    // Position cursor at the end of the focused field
    let (row, value) = match app.focus {
        Focus::Name => (0, store.name_input()),
        Focus::Email => (1, store.email_input()),
        Focus::Table => return,
    };
    let cursor_x = area.x + 1 + FORM_LABEL_WIDTH + value.chars().count() as u16;
    let max_x = area.x + area.width.saturating_sub(2);
    frame.set_cursor_position((cursor_x.min(max_x), area.y + 1 + row));
}

/// Draw the subscriber table (middle)
fn draw_table(frame: &mut Frame, app: &App, store: &Store, area: Rect) {
    let is_active = app.focus == Focus::Table;
    let subscribers = store.subscribers();

    let header = Row::new(vec!["Name", "Email"]).style(
        Style::default()
            .add_modifier(Modifier::BOLD)
            .add_modifier(Modifier::UNDERLINED),
    );

    let rows: Vec<Row> = subscribers
        .iter()
        .enumerate()
        .map(|(index, s)| {
            let style = if index % 2 == 1 {
                Style::default().add_modifier(Modifier::DIM)
            } else {
                Style::default()
            };
            Row::new(vec![s.name.clone(), s.email.clone()]).style(style)
        })
        .collect();

    let border_style = if is_active {
        Style::default().add_modifier(Modifier::BOLD)
    } else {
        Style::default()
    };
    let block = Block::default()
        .title(format!(" Current Subscribers ({}) ", subscribers.len()))
        .borders(Borders::ALL)
        .border_style(border_style);

    let highlight_style = if is_active {
        Style::default()
            .add_modifier(Modifier::BOLD)
            .add_modifier(Modifier::REVERSED)
    } else {
        Style::default()
    };

    let table = Table::new(
        rows,
        [Constraint::Percentage(40), Constraint::Percentage(60)],
    )
    .header(header)
    .block(block)
    .row_highlight_style(highlight_style);

    let mut state = TableState::default();
    if !subscribers.is_empty() {
        state.select(Some(app.selected));
    }

    frame.render_stateful_widget(table, area, &mut state);
}

/// Draw the sync status line
fn draw_status_bar(frame: &mut Frame, app: &App, store: &Store, area: Rect) {
    let line = if let Some(notice) = &app.notice {
        Line::from(Span::styled(
            notice.as_str(),
            tone_style(StatusTone::Neutral),
        ))
    } else {
        let status = store.status();
        let mut spans = vec![Span::styled(
            status,
            tone_style(StatusTone::classify(status)).add_modifier(Modifier::ITALIC),
        )];
        match app.status_changed_at {
            Some(at) if !status.is_empty() => spans.push(Span::styled(
                format!("  {}", at.format("%H:%M:%S")),
                Style::default().add_modifier(Modifier::DIM),
            )),
            _ => {}
        }
        Line::from(spans)
    };

    frame.render_widget(Paragraph::new(line), area);
}

/// Draw key hints at the bottom
fn draw_hints(frame: &mut Frame, app: &App, area: Rect) {
    let hints = if app.focus.is_input() {
        "Enter:add  Tab:next field  Esc:table  Ctrl+C:quit"
    } else {
        "a:add  d:delete  j/k:move  Tab:form  ?:help  q:quit"
    };

    let paragraph = Paragraph::new(hints).style(Style::default().add_modifier(Modifier::DIM));
    frame.render_widget(paragraph, area);
}

/// Calculate a centered popup area
fn popup_area(area: Rect, width: u16, height: u16) -> Rect {
    let popup_width = width.min(area.width.saturating_sub(4));
    let popup_height = height.min(area.height.saturating_sub(2));
    let popup_x = area.x + (area.width.saturating_sub(popup_width)) / 2;
    let popup_y = area.y + (area.height.saturating_sub(popup_height)) / 2;
    Rect::new(popup_x, popup_y, popup_width, popup_height)
}

/// Draw a small modal with a colored border
fn draw_popup(frame: &mut Frame, title: &str, lines: Vec<Line>, color: Color) {
    let area = popup_area(frame.area(), 60, 7);
    frame.render_widget(Clear, area);

    let block = Block::default()
        .title(title.to_string())
        .borders(Borders::ALL)
        .border_style(Style::default().fg(color).add_modifier(Modifier::BOLD));

    let paragraph = Paragraph::new(lines)
        .block(block)
        .wrap(Wrap { trim: true });
    frame.render_widget(paragraph, area);
}

/// Draw help overlay
fn draw_help_overlay(frame: &mut Frame) {
    let area = popup_area(frame.area(), 50, 18);
    frame.render_widget(Clear, area);

    let help_text = vec![
        Line::from(vec![Span::styled(
            "Keyboard Shortcuts",
            Style::default().add_modifier(Modifier::BOLD),
        )]),
        Line::from(""),
        Line::from("Form:"),
        Line::from("  Tab/↓, S-Tab/↑  Next / previous field"),
        Line::from("  Enter           Add subscriber"),
        Line::from("  Esc             Go to the table"),
        Line::from(""),
        Line::from("Table:"),
        Line::from("  j/k, ↑/↓        Move up/down"),
        Line::from("  g/G             First / last row"),
        Line::from("  d, Delete       Remove subscriber"),
        Line::from("  a               Go to the form"),
        Line::from("  q               Quit"),
        Line::from(""),
        dim_line("Press any key to close"),
    ];

    let block = Block::default()
        .title(" Help ")
        .borders(Borders::ALL)
        .border_style(Style::default().add_modifier(Modifier::BOLD));

    frame.render_widget(Paragraph::new(help_text).block(block), area);
}
