//! Application state and logic

use std::time::{Duration, Instant};

use chrono::{DateTime, Local};
use sublist_core::metrics::{classify_email, MetricEvent};
use sublist_core::{AddOutcome, Conflict, Mutation, Store};

/// How long a notice stays in the status bar
const NOTICE_TIMEOUT: Duration = Duration::from_secs(3);

/// Which widget has focus
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Focus {
    Name,
    Email,
    Table,
}

impl Focus {
    /// Move to the next widget (wrapping)
    pub fn next(self) -> Self {
        match self {
            Focus::Name => Focus::Email,
            Focus::Email => Focus::Table,
            Focus::Table => Focus::Name,
        }
    }

    /// Move to the previous widget (wrapping)
    pub fn prev(self) -> Self {
        match self {
            Focus::Name => Focus::Table,
            Focus::Email => Focus::Name,
            Focus::Table => Focus::Email,
        }
    }

    pub fn is_input(self) -> bool {
        matches!(self, Focus::Name | Focus::Email)
    }
}

/// Application state
///
/// Subscribers, form inputs and the sync status live in the [`Store`]; this
/// only holds what the terminal needs on top.
pub struct App {
    /// Whether the app should exit
    pub should_quit: bool,
    /// Which widget has focus
    pub focus: Focus,
    /// Selected table row
    pub selected: usize,
    /// Add waiting for a yes/no answer
    pub pending_conflict: Option<Conflict>,
    /// Error shown in a modal until a key is pressed
    pub error: Option<String>,
    /// Short-lived message shown instead of the sync status
    pub notice: Option<String>,
    /// When the notice was set (for auto-dismiss)
    pub notice_time: Option<Instant>,
    /// Whether help overlay is visible
    pub show_help: bool,
    /// When the sync status last changed
    pub status_changed_at: Option<DateTime<Local>>,
    /// First keystroke since the last successful add
    pub typing_started: Option<Instant>,
    /// Whether the form was rejected since the last successful add
    pub had_field_error: bool,
}

impl App {
    pub fn new() -> Self {
        Self {
            should_quit: false,
            focus: Focus::Name,
            selected: 0,
            pending_conflict: None,
            error: None,
            notice: None,
            notice_time: None,
            show_help: false,
            status_changed_at: None,
            typing_started: None,
            had_field_error: false,
        }
    }

    // ==================== Messages ====================

    /// Show a notice for a few seconds
    pub fn set_notice(&mut self, message: impl Into<String>) {
        self.notice = Some(message.into());
        self.notice_time = Some(Instant::now());
    }

    /// Check and clear an expired notice
    pub fn check_notice_timeout(&mut self) {
        if let Some(time) = self.notice_time {
            if time.elapsed() > NOTICE_TIMEOUT {
                self.notice = None;
                self.notice_time = None;
            }
        }
    }

    pub fn set_error(&mut self, message: impl Into<String>) {
        self.error = Some(message.into());
    }

    pub fn has_error(&self) -> bool {
        self.error.is_some()
    }

    pub fn clear_error(&mut self) {
        self.error = None;
    }

    /// Toggle help overlay
    pub fn toggle_help(&mut self) {
        self.show_help = !self.show_help;
    }

    /// Record that the store's status line changed
    pub fn status_changed(&mut self) {
        self.status_changed_at = Some(Local::now());
    }

    // ==================== Form ====================

    /// Type a character into the focused field
    pub fn insert_char(&mut self, store: &mut Store, c: char) {
        let mut value = match self.focus {
            Focus::Name => store.name_input().to_string(),
            Focus::Email => store.email_input().to_string(),
            Focus::Table => return,
        };
        value.push(c);
        self.typing_started.get_or_insert_with(Instant::now);
        self.set_focused_input(store, value);
    }

    /// Delete the last character of the focused field
    pub fn delete_char(&mut self, store: &mut Store) {
        let mut value = match self.focus {
            Focus::Name => store.name_input().to_string(),
            Focus::Email => store.email_input().to_string(),
            Focus::Table => return,
        };
        value.pop();
        self.set_focused_input(store, value);
    }

    fn set_focused_input(&self, store: &mut Store, value: String) {
        match self.focus {
            Focus::Name => store.set_name_input(value),
            Focus::Email => store.set_email_input(value),
            Focus::Table => {}
        }
    }

    /// Submit the add form
    ///
    /// Returns the mutation to commit when the add was staged. Rejections
    /// open the error modal; conflicts wait for [`App::resolve_conflict`].
    pub fn submit(&mut self, store: &mut Store) -> Option<Mutation> {
        match store.submit_form() {
            Ok(AddOutcome::Staged(mutation)) => {
                self.added(store, &mutation);
                Some(mutation)
            }
            Ok(AddOutcome::NeedsConfirmation(conflict)) => {
                self.pending_conflict = Some(conflict);
                None
            }
            Err(e) => {
                self.had_field_error = true;
                self.set_error(e.to_string());
                None
            }
        }
    }

    /// Answer the pending replace question
    pub fn resolve_conflict(&mut self, store: &mut Store, accept: bool) -> Option<Mutation> {
        let conflict = self.pending_conflict.take()?;
        if !accept {
            self.had_field_error = true;
            return None;
        }

        let mutation = store.confirm_replace(conflict);
        self.added(store, &mutation);
        Some(mutation)
    }

    /// Report the add and reset the form trackers
    fn added(&mut self, store: &Store, mutation: &Mutation) {
        let time_needed_secs = self
            .typing_started
            .take()
            .map(|start| start.elapsed().as_secs_f64());

        store.metrics().record(&MetricEvent::AddSubscriberClick {
            time_needed_secs,
            email_type: classify_email(mutation.email()),
            had_field_error: self.had_field_error,
        });
        self.had_field_error = false;
        self.focus = Focus::Name;
        self.select_last(store);
    }

    // ==================== Table ====================

    pub fn move_up(&mut self) {
        self.selected = self.selected.saturating_sub(1);
    }

    pub fn move_down(&mut self, store: &Store) {
        if self.selected + 1 < store.subscribers().len() {
            self.selected += 1;
        }
    }

    pub fn select_last(&mut self, store: &Store) {
        self.selected = store.subscribers().len().saturating_sub(1);
    }

    /// Keep the selection inside the table
    pub fn clamp_selection(&mut self, store: &Store) {
        let len = store.subscribers().len();
        if self.selected >= len {
            self.selected = len.saturating_sub(1);
        }
    }

    /// Stage removal of the selected subscriber
    pub fn remove_selected(&mut self, store: &mut Store) -> Option<Mutation> {
        let email = store
            .subscribers()
            .as_slice()
            .get(self.selected)?
            .email
            .clone();
        let mutation = store.stage_remove(&email);
        self.clamp_selection(store);
        Some(mutation)
    }
}

impl Default for App {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use sublist_core::metrics::{EmailType, MemoryMetrics};
    use sublist_core::{MemoryProvider, Subscriber, SyncPolicy};

    fn store_with(subscribers: Vec<Subscriber>, metrics: &MemoryMetrics) -> Store {
        let provider = Arc::new(MemoryProvider::new());
        let mut store = Store::new(provider, SyncPolicy::default())
            .with_metrics(Arc::new(metrics.clone()));
        for s in subscribers {
            let _ = store.stage_add(&s.name, &s.email);
        }
        store
    }

    fn type_str(app: &mut App, store: &mut Store, text: &str) {
        for c in text.chars() {
            app.insert_char(store, c);
        }
    }

    fn clicks(metrics: &MemoryMetrics) -> Vec<MetricEvent> {
        metrics
            .events()
            .into_iter()
            .filter(|e| matches!(e, MetricEvent::AddSubscriberClick { .. }))
            .collect()
    }

    #[test]
    fn test_focus_cycles() {
        assert_eq!(Focus::Name.next(), Focus::Email);
        assert_eq!(Focus::Table.next(), Focus::Name);
        assert_eq!(Focus::Name.prev(), Focus::Table);
        assert!(Focus::Email.is_input());
        assert!(!Focus::Table.is_input());
    }

    #[test]
    fn test_typing_edits_focused_field() {
        let metrics = MemoryMetrics::new();
        let mut store = store_with(vec![], &metrics);
        let mut app = App::new();

        type_str(&mut app, &mut store, "Bobb");
        app.delete_char(&mut store);
        app.focus = Focus::Email;
        type_str(&mut app, &mut store, "bob@x.com");

        assert_eq!(store.name_input(), "Bob");
        assert_eq!(store.email_input(), "bob@x.com");
        assert!(app.typing_started.is_some());
    }

    #[test]
    fn test_submit_reports_field_error_once() {
        let metrics = MemoryMetrics::new();
        let mut store = store_with(vec![], &metrics);
        let mut app = App::new();

        type_str(&mut app, &mut store, "Bob");
        assert!(app.submit(&mut store).is_none());
        assert_eq!(app.error.as_deref(), Some("Both name and email are required."));

        app.clear_error();
        app.focus = Focus::Email;
        type_str(&mut app, &mut store, "bob@gmail.com");
        let mutation = app.submit(&mut store).unwrap();
        assert_eq!(mutation.email(), "bob@gmail.com");

        let events = clicks(&metrics);
        assert_eq!(events.len(), 1);
        let MetricEvent::AddSubscriberClick {
            time_needed_secs,
            email_type,
            had_field_error,
        } = &events[0]
        else {
            unreachable!();
        };
        assert!(time_needed_secs.is_some());
        assert_eq!(*email_type, EmailType::Generic);
        assert!(*had_field_error);

        // Trackers reset after a successful add
        assert!(app.typing_started.is_none());
        assert!(!app.had_field_error);
        assert_eq!(app.focus, Focus::Name);
    }

    #[test]
    fn test_conflict_flow() {
        let metrics = MemoryMetrics::new();
        let mut store = store_with(vec![Subscriber::new("Ann", "ann@x.com")], &metrics);
        let mut app = App::new();

        store.set_name_input("Annie");
        store.set_email_input("ann@x.com");
        assert!(app.submit(&mut store).is_none());
        assert!(app.pending_conflict.is_some());

        assert!(app.resolve_conflict(&mut store, false).is_none());
        assert!(app.pending_conflict.is_none());
        assert!(app.had_field_error);
        assert_eq!(store.subscribers().get("ann@x.com").unwrap().name, "Ann");

        assert!(app.submit(&mut store).is_none());
        let mutation = app.resolve_conflict(&mut store, true).unwrap();
        assert_eq!(mutation, Mutation::Upsert(Subscriber::new("Annie", "ann@x.com")));
        assert_eq!(store.subscribers().get("ann@x.com").unwrap().name, "Annie");
    }

    #[test]
    fn test_remove_selected_clamps() {
        let metrics = MemoryMetrics::new();
        let mut store = store_with(
            vec![
                Subscriber::new("Ann", "ann@x.com"),
                Subscriber::new("Bob", "bob@x.com"),
            ],
            &metrics,
        );
        let mut app = App::new();

        app.move_down(&store);
        app.move_down(&store);
        assert_eq!(app.selected, 1);

        let mutation = app.remove_selected(&mut store).unwrap();
        assert_eq!(mutation.email(), "bob@x.com");
        assert_eq!(app.selected, 0);

        app.remove_selected(&mut store).unwrap();
        assert!(app.remove_selected(&mut store).is_none());
    }

    #[test]
    fn test_notice_timeout() {
        let mut app = App::new();
        app.set_notice("Left unchanged");
        app.check_notice_timeout();
        assert!(app.notice.is_some());

        app.notice_time = Some(Instant::now() - Duration::from_secs(10));
        app.check_notice_timeout();
        assert!(app.notice.is_none());
    }
}
