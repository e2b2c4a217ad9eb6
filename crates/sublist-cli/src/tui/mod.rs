//! sublist TUI
//!
//! Terminal user interface for managing the subscriber list.
//!
//! ## Layout
//!
//! - Top: add form (Name, Email)
//! - Middle: subscriber table
//! - Bottom: sync status line
//!
//! ## Keys
//!
//! - Tab / Shift+Tab: Move focus between Name, Email and the table
//! - Enter: Add (from either form field)
//! - Esc: Leave the form for the table
//! - j/k or ↑/↓: Move selection in the table
//! - d / Delete: Remove selected subscriber
//! - a: Jump to the form
//! - ?: Help
//! - q: Quit (from the table), Ctrl+C quits anywhere

mod app;
mod ui;

use std::io::stdout;
use std::time::Duration;

use anyhow::{Context, Result};
use crossterm::{
    event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers},
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
    ExecutableCommand,
};
use ratatui::prelude::*;
use sublist_core::{Config, Mutation, Store, SyncEvent};
use tokio::sync::mpsc;
use tracing::{debug, info};

use app::{App, Focus};

use crate::logging::init_tui_logging;

/// Run the TUI application
pub async fn run(config: Config) -> Result<()> {
    // File-based, only if SUBLIST_LOG is set
    init_tui_logging(&config);

    // Fail on missing credentials before taking over the terminal
    let mut store = crate::open_store(&config)?;
    let mut events = store
        .take_events()
        .context("Sync events already taken")?;

    enable_raw_mode()?;
    stdout().execute(EnterAlternateScreen)?;
    let mut terminal = Terminal::new(CrosstermBackend::new(stdout()))?;

    let mut app = App::new();
    app.set_notice("Loading subscribers...");
    terminal.draw(|frame| ui::draw(frame, &app, &store))?;

    if store.load().await.is_err() {
        // The store already shows the error as its status
        app.status_changed();
    }
    app.notice = None;
    app.notice_time = None;

    let result = run_app(&mut terminal, &mut app, &mut store, &mut events).await;

    disable_raw_mode()?;
    stdout().execute(LeaveAlternateScreen)?;

    result
}

async fn run_app<B: Backend>(
    terminal: &mut Terminal<B>,
    app: &mut App,
    store: &mut Store,
    events: &mut mpsc::UnboundedReceiver<SyncEvent>,
) -> Result<()> {
    loop {
        app.check_notice_timeout();
        terminal.draw(|frame| ui::draw(frame, app, store))?;

        tokio::select! {
            biased;

            Some(event) = events.recv() => {
                if store.apply_sync_event(&event) {
                    app.status_changed();
                }
            }

            // Poll for terminal events
            _ = tokio::time::sleep(Duration::from_millis(50)) => {
                if event::poll(Duration::from_millis(0))? {
                    if let Event::Key(key) = event::read()? {
                        // Only handle key press events (not release)
                        if key.kind != KeyEventKind::Press {
                            continue;
                        }

                        if let Some(mutation) = handle_key(app, store, key) {
                            // Show the optimistic change before the write is queued
                            terminal.draw(|frame| ui::draw(frame, app, store))?;
                            commit(app, store, mutation);
                        }
                    }
                }
            }
        }

        if app.should_quit {
            info!("Quitting");
            break;
        }
    }

    Ok(())
}

/// Queue a staged mutation; the write and polling run in the background
fn commit(app: &mut App, store: &mut Store, mutation: Mutation) {
    let session = store.commit(mutation);
    debug!("Committed, following sync session {}", session);
    app.status_changed();
}

/// Handle a key press, returning a mutation that needs committing
fn handle_key(app: &mut App, store: &mut Store, key: KeyEvent) -> Option<Mutation> {
    if key.code == KeyCode::Char('c') && key.modifiers.contains(KeyModifiers::CONTROL) {
        app.should_quit = true;
        return None;
    }

    // If error modal is showing, any key dismisses it
    if app.has_error() {
        app.clear_error();
        return None;
    }

    // If help is showing, any key dismisses it
    if app.show_help {
        app.show_help = false;
        return None;
    }

    if app.pending_conflict.is_some() {
        return handle_conflict(app, store, key.code);
    }

    if app.focus.is_input() {
        handle_form(app, store, key.code)
    } else {
        handle_table(app, store, key.code)
    }
}

fn handle_conflict(app: &mut App, store: &mut Store, code: KeyCode) -> Option<Mutation> {
    match code {
        KeyCode::Char('y') | KeyCode::Char('Y') => app.resolve_conflict(store, true),
        KeyCode::Char('n') | KeyCode::Char('N') | KeyCode::Esc => {
            app.resolve_conflict(store, false);
            app.set_notice("Subscriber left unchanged");
            None
        }
        _ => None,
    }
}

fn handle_form(app: &mut App, store: &mut Store, code: KeyCode) -> Option<Mutation> {
    match code {
        KeyCode::Enter => return app.submit(store),
        KeyCode::Tab | KeyCode::Down => app.focus = app.focus.next(),
        KeyCode::BackTab | KeyCode::Up => app.focus = app.focus.prev(),
        KeyCode::Esc => app.focus = Focus::Table,
        KeyCode::Backspace => app.delete_char(store),
        KeyCode::Char(c) => app.insert_char(store, c),
        _ => {}
    }
    None
}

fn handle_table(app: &mut App, store: &mut Store, code: KeyCode) -> Option<Mutation> {
    match code {
        KeyCode::Char('q') => app.should_quit = true,
        KeyCode::Char('k') | KeyCode::Up => app.move_up(),
        KeyCode::Char('j') | KeyCode::Down => app.move_down(store),
        KeyCode::Char('g') | KeyCode::Home => app.selected = 0,
        KeyCode::Char('G') | KeyCode::End => app.select_last(store),
        KeyCode::Char('d') | KeyCode::Delete => return app.remove_selected(store),
        KeyCode::Char('a') => app.focus = Focus::Name,
        KeyCode::Tab => app.focus = app.focus.next(),
        KeyCode::BackTab => app.focus = app.focus.prev(),
        KeyCode::Char('?') => app.toggle_help(),
        _ => {}
    }
    None
}
