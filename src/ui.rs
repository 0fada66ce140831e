use crate::board::{progress_band, BoardView, Card, ColumnKey, ProgressBand};
use crate::calendar::{CalendarView, GridCell};
use crate::config::{DashboardConfig, Settings};
use crate::fetch::{FetchError, FetchKind, Transport};
use crate::model::{Category, TasksPayload};
use crate::service::{DataEvent, DataService};
use crate::storage::Store;
use crate::theme::{system_theme, Palette, ThemeManager};
use crate::util::format_relative_time;
use anyhow::Result;
use chrono::{DateTime, FixedOffset, Local, Utc};
use crossterm::event::{
    self, DisableFocusChange, EnableFocusChange, Event, KeyCode, KeyEvent, KeyEventKind,
    KeyModifiers,
};
use crossterm::execute;
use crossterm::terminal::{
    disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen,
};
use ratatui::backend::CrosstermBackend;
use ratatui::layout::{Constraint, Direction, Layout};
use ratatui::prelude::{Alignment, Color, Modifier, Rect, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, Borders, Clear, List, ListItem, ListState, Paragraph, Wrap};
use ratatui::Terminal;
use std::io::{stdout, Stdout};
use std::sync::mpsc::Receiver;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{info, warn};

const CELL_WIDTH: usize = 9;

pub fn run(store: Store, config: DashboardConfig, transport: Arc<dyn Transport>) -> Result<()> {
    let mut terminal = setup_terminal()?;
    let mut app = App::new(store, config, transport);
    let result = app.event_loop(&mut terminal);
    teardown_terminal(&mut terminal)?;
    result
}

struct App {
    config: DashboardConfig,
    store: Store,
    transport: Arc<dyn Transport>,
    service: DataService,
    events: Receiver<DataEvent>,
    board: BoardView,
    calendar: CalendarView,
    themes: ThemeManager,
    selected_column: usize,
    selected_card: usize,
    connection: Connection,
    toasts: Vec<Toast>,
    mode: Mode,
    view: ViewMode,
    visible: bool,
}

enum Mode {
    Normal,
    Settings(SettingsForm),
}

#[derive(Copy, Clone, PartialEq, Eq, Debug)]
enum ViewMode {
    Board,
    Calendar,
}

#[derive(Copy, Clone, PartialEq, Eq, Debug)]
enum Connection {
    Connected,
    Error,
    Offline,
}

#[derive(Copy, Clone, PartialEq, Eq, Debug)]
enum ToastLevel {
    Info,
    Success,
    Warning,
    Error,
}

struct Toast {
    level: ToastLevel,
    message: String,
    expires: Instant,
}

impl ViewMode {
    fn label(&self) -> &'static str {
        match self {
            ViewMode::Board => "Board",
            ViewMode::Calendar => "Calendar",
        }
    }
}

impl Connection {
    fn label(&self) -> &'static str {
        match self {
            Connection::Connected => "Connected",
            Connection::Error => "Error",
            Connection::Offline => "Offline",
        }
    }

    fn color(&self, palette: &Palette) -> Color {
        match self {
            Connection::Connected => palette.success,
            Connection::Error => palette.error,
            Connection::Offline => palette.warning,
        }
    }
}

impl ToastLevel {
    fn default_duration(&self) -> Duration {
        match self {
            ToastLevel::Info | ToastLevel::Success => Duration::from_secs(3),
            ToastLevel::Warning | ToastLevel::Error => Duration::from_secs(5),
        }
    }

    fn color(&self, palette: &Palette) -> Color {
        match self {
            ToastLevel::Info => palette.accent,
            ToastLevel::Success => palette.success,
            ToastLevel::Warning => palette.warning,
            ToastLevel::Error => palette.error,
        }
    }
}

struct SettingsForm {
    tasks_url: FieldValue,
    logs_url: FieldValue,
    interval: FieldValue,
    field: SettingsField,
}

#[derive(Copy, Clone, PartialEq, Eq, Debug)]
enum SettingsField {
    TasksUrl,
    LogsUrl,
    Interval,
}

#[derive(Clone)]
struct FieldValue {
    value: String,
    cursor: usize,
}

impl FieldValue {
    fn new(value: &str) -> Self {
        FieldValue {
            value: value.to_string(),
            cursor: value.len(),
        }
    }

    fn move_left(&mut self) {
        if self.cursor == 0 {
            return;
        }
        self.cursor = prev_grapheme(self.cursor, &self.value);
    }

    fn move_right(&mut self) {
        if self.cursor >= self.value.len() {
            return;
        }
        self.cursor = next_grapheme(self.cursor, &self.value);
    }

    fn home(&mut self) {
        self.cursor = 0;
    }

    fn end(&mut self) {
        self.cursor = self.value.len();
    }

    fn backspace(&mut self) {
        if self.cursor == 0 {
            return;
        }
        let prev = prev_grapheme(self.cursor, &self.value);
        self.value.drain(prev..self.cursor);
        self.cursor = prev;
    }

    fn insert_char(&mut self, ch: char) {
        self.value.insert(self.cursor, ch);
        self.cursor += ch.len_utf8();
    }

    fn with_caret(&self) -> String {
        let mut text = self.value.clone();
        text.insert_str(self.cursor, "▌");
        text
    }
}

impl SettingsForm {
    fn from_settings(settings: &Settings) -> Self {
        SettingsForm {
            tasks_url: FieldValue::new(&settings.tasks_url),
            logs_url: FieldValue::new(&settings.logs_url),
            interval: FieldValue::new(&settings.refresh_interval.to_string()),
            field: SettingsField::TasksUrl,
        }
    }

    fn to_settings(&self) -> Settings {
        Settings::from_input(
            &self.tasks_url.value,
            &self.logs_url.value,
            &self.interval.value,
        )
    }

    fn next_field(&mut self) {
        self.field = match self.field {
            SettingsField::TasksUrl => SettingsField::LogsUrl,
            SettingsField::LogsUrl => SettingsField::Interval,
            SettingsField::Interval => SettingsField::TasksUrl,
        };
    }

    fn prev_field(&mut self) {
        self.field = match self.field {
            SettingsField::TasksUrl => SettingsField::Interval,
            SettingsField::LogsUrl => SettingsField::TasksUrl,
            SettingsField::Interval => SettingsField::LogsUrl,
        };
    }

    fn active_field_mut(&mut self) -> &mut FieldValue {
        match self.field {
            SettingsField::TasksUrl => &mut self.tasks_url,
            SettingsField::LogsUrl => &mut self.logs_url,
            SettingsField::Interval => &mut self.interval,
        }
    }
}

impl App {
    fn new(store: Store, config: DashboardConfig, transport: Arc<dyn Transport>) -> Self {
        let settings = store.load_settings();
        let mut service = DataService::new(
            config.clone(),
            settings,
            store.clone(),
            Arc::clone(&transport),
        );
        let events = service.subscribe();
        let themes = ThemeManager::new(store.clone(), system_theme());
        let board = BoardView::new(config.clone());
        let calendar = CalendarView::new(config.clone(), Local::now().date_naive());
        let mut app = App {
            config,
            store,
            transport,
            service,
            events,
            board,
            calendar,
            themes,
            selected_column: 0,
            selected_card: 0,
            connection: Connection::Connected,
            toasts: Vec::new(),
            mode: Mode::Normal,
            view: ViewMode::Board,
            visible: true,
        };

        if let Some(tasks) = app.service.cached_tasks() {
            app.show_tasks(tasks);
        }
        if let Some(logs) = app.service.cached_logs() {
            app.calendar.update_logs(logs);
        }
        if !app.service.settings().has_tasks_source() {
            app.toast_for(
                ToastLevel::Info,
                "Loaded sample data. Press s to configure a tasks URL.",
                Duration::from_secs(8),
            );
        }
        app.start_service();
        app
    }

    /// Initial fetch plus polling for the current service. Without a tasks
    /// source the service runs on sample data.
    fn start_service(&mut self) {
        if !self.service.settings().has_tasks_source() {
            self.service.enable_sample_data();
        }
        self.service.fetch_all();
        if self.visible {
            let interval = self.service.settings().refresh_interval;
            self.service.start_polling(interval, Instant::now());
        }
    }

    fn event_loop(&mut self, terminal: &mut Terminal<CrosstermBackend<Stdout>>) -> Result<()> {
        loop {
            self.sync(Instant::now());
            terminal.draw(|f| self.draw(f))?;
            if event::poll(Duration::from_millis(200))? {
                match event::read()? {
                    Event::Key(key) => {
                        if key.kind != KeyEventKind::Press {
                            continue;
                        }
                        if self.handle_key(key)? {
                            break;
                        }
                    }
                    Event::FocusLost => self.set_visible(false),
                    Event::FocusGained => self.set_visible(true),
                    _ => {}
                }
            }
        }
        Ok(())
    }

    /// Runs due timers, applies finished fetches and routes the resulting
    /// events into the views.
    fn sync(&mut self, now: Instant) {
        self.service.tick(now);
        self.service.pump();
        while let Ok(event) = self.events.try_recv() {
            self.on_data_event(event);
        }
        self.toasts.retain(|t| t.expires > now);
        self.calendar.set_today(Local::now().date_naive());
    }

    fn on_data_event(&mut self, event: DataEvent) {
        match event {
            DataEvent::TasksUpdated(payload) => {
                self.show_tasks(payload);
                self.connection = Connection::Connected;
            }
            DataEvent::LogsUpdated(payload) => self.calendar.update_logs(payload),
            DataEvent::FetchFailed { kind, error } => self.on_fetch_failed(kind, error),
            DataEvent::Online => {
                self.connection = Connection::Connected;
                self.toast(ToastLevel::Success, "Back online");
            }
            DataEvent::Offline => {
                self.connection = Connection::Offline;
                self.toast(ToastLevel::Warning, "You are offline - showing cached data");
            }
        }
    }

    fn on_fetch_failed(&mut self, kind: FetchKind, error: FetchError) {
        if matches!(error, FetchError::NotConfigured(_)) {
            self.toast(
                ToastLevel::Info,
                "No tasks URL configured - press s to open settings",
            );
            return;
        }
        if kind == FetchKind::Logs {
            return;
        }
        if self.connection != Connection::Offline {
            self.connection = Connection::Error;
        }
        if self.service.cached_tasks().is_some() {
            self.toast(ToastLevel::Warning, "Using cached data - fetch failed");
        } else {
            self.toast(ToastLevel::Error, format!("Could not load tasks: {}", error));
        }
    }

    fn show_tasks(&mut self, payload: Arc<TasksPayload>) {
        let selected_id = self.current_card().map(|card| card.task.id.clone());
        self.board.render(&payload);
        self.calendar.update_tasks(payload);
        if let Some((column, pos)) = selected_id.and_then(|id| self.board.find_card(&id)) {
            if column == self.selected_column {
                self.selected_card = pos;
            }
        }
        self.ensure_board_bounds();
    }

    fn set_visible(&mut self, visible: bool) {
        if visible == self.visible {
            return;
        }
        self.visible = visible;
        self.service.set_visible(visible, Instant::now());
        if visible {
            self.themes.system_changed(system_theme());
        }
    }

    fn toast(&mut self, level: ToastLevel, message: impl Into<String>) {
        self.toast_for(level, message, level.default_duration());
    }

    fn toast_for(&mut self, level: ToastLevel, message: impl Into<String>, duration: Duration) {
        self.toasts.push(Toast {
            level,
            message: message.into(),
            expires: Instant::now() + duration,
        });
    }

    fn handle_key(&mut self, key: KeyEvent) -> Result<bool> {
        if matches!(self.mode, Mode::Settings(_)) {
            self.handle_settings_key(key);
            return Ok(false);
        }
        if key.modifiers.contains(KeyModifiers::CONTROL) && key.code == KeyCode::Char('c') {
            return Ok(true);
        }
        match key.code {
            KeyCode::Char('q') => return Ok(true),
            KeyCode::Char('1') => self.set_view(ViewMode::Board),
            KeyCode::Char('2') => self.set_view(ViewMode::Calendar),
            KeyCode::Char('r') => {
                self.service.fetch_all();
                self.toast_for(ToastLevel::Info, "Refreshing...", Duration::from_secs(2));
            }
            KeyCode::Char('t') => {
                let theme = self.themes.toggle();
                info!(theme = theme.as_str(), "theme toggled");
            }
            KeyCode::Char('s') => {
                self.mode = Mode::Settings(SettingsForm::from_settings(self.service.settings()));
            }
            _ => match self.view {
                ViewMode::Board => self.handle_board_key(key),
                ViewMode::Calendar => self.handle_calendar_key(key),
            },
        }
        Ok(false)
    }

    fn handle_board_key(&mut self, key: KeyEvent) {
        match key.code {
            KeyCode::Left | KeyCode::Char('h') => self.prev_column(),
            KeyCode::Right | KeyCode::Char('l') => self.next_column(),
            KeyCode::Up | KeyCode::Char('k') => self.prev_card(),
            KeyCode::Down | KeyCode::Char('j') => self.next_card(),
            KeyCode::Enter | KeyCode::Char(' ') => {
                self.board
                    .toggle_expanded(self.selected_column, self.selected_card);
            }
            _ => {}
        }
    }

    fn handle_calendar_key(&mut self, key: KeyEvent) {
        match key.code {
            KeyCode::Left => self.calendar.prev_month(),
            KeyCode::Right => self.calendar.next_month(),
            KeyCode::Esc => self.calendar.close_detail(),
            KeyCode::Char('h') => self.calendar.move_selection(-1),
            KeyCode::Char('l') => self.calendar.move_selection(1),
            KeyCode::Char('k') | KeyCode::Up => self.calendar.move_selection(-7),
            KeyCode::Char('j') | KeyCode::Down => self.calendar.move_selection(7),
            KeyCode::Enter => {
                if !self.calendar.open_selected() {
                    self.calendar.close_detail();
                }
            }
            _ => {}
        }
    }

    fn handle_settings_key(&mut self, key: KeyEvent) {
        let mode = std::mem::replace(&mut self.mode, Mode::Normal);
        let Mode::Settings(mut form) = mode else {
            return;
        };
        if !self.process_settings_key(&mut form, key) {
            self.mode = Mode::Settings(form);
        }
    }

    /// Returns true when the panel should close.
    fn process_settings_key(&mut self, form: &mut SettingsForm, key: KeyEvent) -> bool {
        let control = key.modifiers.contains(KeyModifiers::CONTROL);
        match key.code {
            KeyCode::Esc => return true,
            KeyCode::Char('s') if control => {
                self.apply_settings(form.to_settings());
                return true;
            }
            KeyCode::Char('l') if control => {
                self.load_sample();
                return true;
            }
            KeyCode::Enter => {
                if form.field == SettingsField::Interval {
                    self.apply_settings(form.to_settings());
                    return true;
                }
                form.next_field();
            }
            KeyCode::Tab | KeyCode::Down => form.next_field(),
            KeyCode::BackTab | KeyCode::Up => form.prev_field(),
            KeyCode::Left => form.active_field_mut().move_left(),
            KeyCode::Right => form.active_field_mut().move_right(),
            KeyCode::Home => form.active_field_mut().home(),
            KeyCode::End => form.active_field_mut().end(),
            KeyCode::Backspace => form.active_field_mut().backspace(),
            KeyCode::Char(c) => {
                if !key
                    .modifiers
                    .intersects(KeyModifiers::CONTROL | KeyModifiers::ALT)
                {
                    form.active_field_mut().insert_char(c);
                }
            }
            _ => {}
        }
        false
    }

    /// Persists the settings and swaps in a fresh service built from them.
    /// Requests still running on the old service are dropped with it.
    fn apply_settings(&mut self, settings: Settings) {
        if let Err(err) = self.store.save_settings(&settings) {
            warn!(error = %format!("{:#}", err), "could not save settings");
            self.toast(ToastLevel::Error, format!("Could not save settings: {:#}", err));
        }
        info!(
            tasks_url = %settings.tasks_url,
            logs_url = %settings.logs_url,
            interval = settings.refresh_interval,
            "settings applied"
        );
        self.service.stop_polling();
        self.service = DataService::new(
            self.config.clone(),
            settings,
            self.store.clone(),
            Arc::clone(&self.transport),
        );
        self.events = self.service.subscribe();
        self.connection = Connection::Connected;
        self.start_service();
        self.toast(ToastLevel::Success, "Settings saved");
    }

    fn load_sample(&mut self) {
        self.service.enable_sample_data();
        self.service.stop_polling();
        self.service.fetch_all();
        self.toast(ToastLevel::Success, "Loaded sample data");
    }

    fn set_view(&mut self, view: ViewMode) {
        self.view = view;
    }

    fn current_card(&self) -> Option<&Card> {
        self.board
            .column(self.selected_column)?
            .cards
            .get(self.selected_card)
    }

    fn prev_column(&mut self) {
        if self.selected_column > 0 {
            self.selected_column -= 1;
            self.selected_card = 0;
        }
    }

    fn next_column(&mut self) {
        if self.selected_column + 1 < self.board.column_count() {
            self.selected_column += 1;
            self.selected_card = 0;
        }
    }

    fn prev_card(&mut self) {
        self.selected_card = self.selected_card.saturating_sub(1);
    }

    fn next_card(&mut self) {
        let len = self
            .board
            .column(self.selected_column)
            .map(|c| c.cards.len())
            .unwrap_or(0);
        if self.selected_card + 1 < len {
            self.selected_card += 1;
        }
    }

    fn ensure_board_bounds(&mut self) {
        let columns = self.board.column_count();
        self.selected_column = self.selected_column.min(columns.saturating_sub(1));
        let len = self
            .board
            .column(self.selected_column)
            .map(|c| c.cards.len())
            .unwrap_or(0);
        self.selected_card = self.selected_card.min(len.saturating_sub(1));
    }

    fn draw(&mut self, f: &mut ratatui::Frame<'_>) {
        let palette = self.themes.palette();
        f.render_widget(
            Block::default().style(Style::default().bg(palette.background).fg(palette.text)),
            f.size(),
        );
        let layout = Layout::default()
            .direction(Direction::Vertical)
            .constraints([
                Constraint::Length(3),
                Constraint::Min(8),
                Constraint::Length(4),
            ])
            .split(f.size());

        let now = Utc::now();
        self.draw_header(f, layout[0], &palette, now);
        match self.view {
            ViewMode::Board => self.draw_board(f, layout[1], &palette, now),
            ViewMode::Calendar => self.draw_calendar(f, layout[1], &palette),
        }
        self.draw_footer(f, layout[2], &palette);

        if let Mode::Settings(form) = &self.mode {
            draw_settings(f, form, &palette);
        }
        self.draw_toasts(f, layout[1], &palette);
    }

    fn draw_header(
        &self,
        f: &mut ratatui::Frame<'_>,
        area: Rect,
        palette: &Palette,
        now: DateTime<Utc>,
    ) {
        let updated = match self.service.last_fetch_time() {
            Some(at) => format!(
                "Updated {}",
                format_relative_time(&DateTime::<FixedOffset>::from(at), now)
            ),
            None => "Not updated yet".to_string(),
        };
        let mut spans = vec![
            Span::styled(
                "taskwatch ",
                Style::default()
                    .fg(palette.accent)
                    .add_modifier(Modifier::BOLD),
            ),
            Span::raw("  •  "),
            Span::styled(
                format!("view {}", self.view.label().to_lowercase()),
                Style::default().fg(palette.text),
            ),
            Span::raw("  •  "),
            Span::styled(
                format!("● {}", self.connection.label()),
                Style::default()
                    .fg(self.connection.color(palette))
                    .add_modifier(Modifier::BOLD),
            ),
            Span::raw("  •  "),
            Span::styled(updated, Style::default().fg(palette.muted)),
        ];
        if self.service.is_stale(now) {
            spans.push(Span::styled(
                " (stale)",
                Style::default().fg(palette.warning),
            ));
        }
        if self.service.is_sample() {
            spans.push(Span::raw("  •  "));
            spans.push(Span::styled(
                "sample data",
                Style::default().fg(palette.warning),
            ));
        }
        if self.service.is_busy() {
            spans.push(Span::raw("  •  "));
            spans.push(Span::styled(
                "loading…",
                Style::default().fg(palette.accent),
            ));
        }
        spans.push(Span::raw("  •  "));
        spans.push(Span::styled(
            format!("theme {}", self.themes.current().as_str()),
            Style::default().fg(palette.muted),
        ));

        let block = Block::default()
            .borders(Borders::BOTTOM)
            .border_style(Style::default().fg(palette.border));
        let paragraph = Paragraph::new(Line::from(spans))
            .alignment(Alignment::Center)
            .block(block);
        f.render_widget(paragraph, area);
    }

    fn draw_board(
        &self,
        f: &mut ratatui::Frame<'_>,
        area: Rect,
        palette: &Palette,
        now: DateTime<Utc>,
    ) {
        let outer = Layout::default()
            .direction(Direction::Horizontal)
            .constraints([Constraint::Percentage(25), Constraint::Percentage(75)])
            .split(area);

        let categories = self.board.categories();
        let statuses = self.board.statuses();
        let mut rects = vec![outer[0]];
        if !categories.is_empty() && !statuses.is_empty() {
            let rows = Layout::default()
                .direction(Direction::Vertical)
                .constraints(
                    categories
                        .iter()
                        .map(|_| Constraint::Ratio(1, categories.len() as u32))
                        .collect::<Vec<_>>(),
                )
                .split(outer[1]);
            for row in rows.iter() {
                let cols = Layout::default()
                    .direction(Direction::Horizontal)
                    .constraints(
                        statuses
                            .iter()
                            .map(|_| Constraint::Ratio(1, statuses.len() as u32))
                            .collect::<Vec<_>>(),
                    )
                    .split(*row);
                rects.extend(cols.iter().copied());
            }
        }

        for (idx, rect) in rects.into_iter().enumerate() {
            self.draw_column(f, idx, rect, palette, now);
        }
    }

    fn draw_column(
        &self,
        f: &mut ratatui::Frame<'_>,
        idx: usize,
        area: Rect,
        palette: &Palette,
        now: DateTime<Utc>,
    ) {
        let Some(column) = self.board.column(idx) else {
            return;
        };
        let focused = idx == self.selected_column && self.view == ViewMode::Board;
        let (title, accent) = match column.key {
            ColumnKey::NeedsAction => (
                format!("{} ({})", column.title(), column.cards.len()),
                palette.warning,
            ),
            ColumnKey::Lane(category, _) => (
                format!(
                    "{} [{}] · {} ({})",
                    category.label(),
                    self.board.category_count(category),
                    column.title(),
                    column.cards.len()
                ),
                category_color(Some(category)),
            ),
        };

        let width = area.width.saturating_sub(2);
        let items: Vec<ListItem> = if column.is_empty() {
            vec![ListItem::new(Line::from(Span::styled(
                "No tasks",
                Style::default().fg(palette.muted),
            )))]
        } else {
            column
                .cards
                .iter()
                .enumerate()
                .map(|(n, card)| {
                    card_item(
                        card,
                        width,
                        focused && n == self.selected_card,
                        column.shows_category(),
                        palette,
                        now,
                    )
                })
                .collect()
        };

        let mut state = ListState::default();
        if focused && !column.is_empty() {
            state.select(Some(self.selected_card));
        }
        let block = Block::default()
            .title(Span::styled(
                title,
                Style::default().fg(accent).add_modifier(if focused {
                    Modifier::BOLD | Modifier::UNDERLINED
                } else {
                    Modifier::BOLD
                }),
            ))
            .borders(Borders::ALL)
            .border_style(Style::default().fg(if focused { accent } else { palette.border }))
            .style(Style::default().bg(palette.surface));
        f.render_stateful_widget(List::new(items).block(block), area, &mut state);
    }

    fn draw_calendar(&self, f: &mut ratatui::Frame<'_>, area: Rect, palette: &Palette) {
        let halves = Layout::default()
            .direction(Direction::Horizontal)
            .constraints([Constraint::Percentage(65), Constraint::Percentage(35)])
            .split(area);

        let selected = self.calendar.selected_date();
        let mut lines = Vec::new();
        let headings = ["Mon", "Tue", "Wed", "Thu", "Fri", "Sat", "Sun"];
        lines.push(Line::from(
            headings
                .iter()
                .map(|h| {
                    Span::styled(
                        format!("{:^width$}", h, width = CELL_WIDTH),
                        Style::default().fg(palette.muted),
                    )
                })
                .collect::<Vec<_>>(),
        ));

        for week in self.calendar.cells().chunks(7) {
            let mut numbers = Vec::new();
            let mut dots = Vec::new();
            for cell in week {
                let GridCell::Day(day) = cell else {
                    numbers.push(Span::raw(" ".repeat(CELL_WIDTH)));
                    dots.push(Span::raw(" ".repeat(CELL_WIDTH)));
                    continue;
                };
                let marker = if day.has_note { "✎" } else { " " };
                let text = format!(
                    " {:>2} {}{}",
                    day.date.format("%-d").to_string(),
                    marker,
                    " ".repeat(CELL_WIDTH - 5)
                );
                let mut style = Style::default().fg(if day.has_content() {
                    palette.text
                } else {
                    palette.muted
                });
                if day.is_today {
                    style = style.fg(palette.accent).add_modifier(Modifier::BOLD);
                }
                if Some(day.date) == selected {
                    style = style
                        .bg(palette.highlight_bg)
                        .fg(palette.highlight_fg)
                        .add_modifier(Modifier::BOLD);
                }
                numbers.push(Span::styled(text, style));

                let mut used = 1;
                dots.push(Span::raw(" "));
                for category in &day.dots {
                    dots.push(Span::styled(
                        "●",
                        Style::default().fg(category_color(*category)),
                    ));
                    used += 1;
                }
                if day.overflow > 0 {
                    let extra = format!("+{}", day.overflow);
                    used += extra.chars().count();
                    dots.push(Span::styled(extra, Style::default().fg(palette.muted)));
                }
                dots.push(Span::raw(" ".repeat(CELL_WIDTH.saturating_sub(used))));
            }
            lines.push(Line::from(numbers));
            lines.push(Line::from(dots));
        }

        let grid = Paragraph::new(lines).block(
            Block::default()
                .title(Span::styled(
                    self.calendar.title(),
                    Style::default()
                        .fg(palette.accent)
                        .add_modifier(Modifier::BOLD),
                ))
                .borders(Borders::ALL)
                .border_style(Style::default().fg(palette.border))
                .style(Style::default().bg(palette.surface)),
        );
        f.render_widget(grid, halves[0]);

        let (detail_lines, title) = self.day_detail_content(palette);
        let detail = Paragraph::new(detail_lines)
            .wrap(Wrap { trim: true })
            .block(
                Block::default()
                    .title(title)
                    .borders(Borders::ALL)
                    .border_style(Style::default().fg(palette.border))
                    .style(Style::default().bg(palette.surface)),
            );
        f.render_widget(detail, halves[1]);
    }

    fn day_detail_content(&self, palette: &Palette) -> (Vec<Line<'static>>, String) {
        let Some(detail) = self.calendar.detail() else {
            return (
                vec![Line::from(Span::styled(
                    "Move with h j k l, Enter opens a day",
                    Style::default().fg(palette.muted),
                ))],
                "Day".into(),
            );
        };
        let mut lines = Vec::new();
        for group in &detail.groups {
            lines.push(Line::from(Span::styled(
                format!("{} ({})", group.label(), group.entries.len()),
                Style::default()
                    .fg(category_color(group.category))
                    .add_modifier(Modifier::BOLD),
            )));
            for entry in &group.entries {
                lines.push(Line::from(vec![
                    Span::raw(format!("  • {}", entry.title)),
                    Span::styled(
                        format!("  {}", entry.completed_at),
                        Style::default().fg(palette.muted),
                    ),
                ]));
            }
            lines.push(Line::from(""));
        }
        if let Some(note) = &detail.note {
            lines.push(Line::from(Span::styled(
                "Daily note",
                Style::default()
                    .fg(palette.accent)
                    .add_modifier(Modifier::BOLD),
            )));
            lines.push(Line::from(note.clone()));
        }
        (lines, detail.title.clone())
    }

    fn draw_footer(&self, f: &mut ratatui::Frame<'_>, area: Rect, palette: &Palette) {
        let rows = Layout::default()
            .direction(Direction::Vertical)
            .constraints([Constraint::Length(2), Constraint::Length(2)])
            .split(area);

        let help_bar = Paragraph::new(self.footer_help_line(palette))
            .alignment(Alignment::Center)
            .block(
                Block::default()
                    .borders(Borders::TOP)
                    .border_style(Style::default().fg(palette.border)),
            );
        f.render_widget(help_bar, rows[0]);

        let settings = self.service.settings();
        let source = if self.service.is_sample() {
            "sample data".to_string()
        } else if settings.has_tasks_source() {
            settings.tasks_url.clone()
        } else {
            "not configured".to_string()
        };
        let period = self
            .service
            .task_period()
            .map(|p| format!("every {}s", p.as_secs()))
            .unwrap_or_else(|| "paused".to_string());
        let status = Paragraph::new(Line::from(vec![
            Span::styled("source ", Style::default().fg(palette.muted)),
            Span::raw(source),
            Span::styled("  polling ", Style::default().fg(palette.muted)),
            Span::raw(period),
        ]))
        .block(
            Block::default()
                .borders(Borders::TOP)
                .border_style(Style::default().fg(palette.border)),
        );
        f.render_widget(status, rows[1]);
    }

    fn footer_help_line(&self, palette: &Palette) -> Line<'static> {
        let key = Style::default().fg(palette.accent);
        let mut spans = vec![
            Span::styled("1", key),
            Span::raw(" board  "),
            Span::styled("2", key),
            Span::raw(" calendar  "),
        ];
        match self.view {
            ViewMode::Board => spans.extend([
                Span::styled("←↑↓→ / h j k l", key),
                Span::raw(" move  "),
                Span::styled("Enter", key),
                Span::raw(" expand  "),
            ]),
            ViewMode::Calendar => spans.extend([
                Span::styled("←→", key),
                Span::raw(" month  "),
                Span::styled("h j k l", key),
                Span::raw(" day  "),
                Span::styled("Enter", key),
                Span::raw(" open  "),
                Span::styled("Esc", key),
                Span::raw(" close  "),
            ]),
        }
        spans.extend([
            Span::styled("r", key),
            Span::raw(" refresh  "),
            Span::styled("t", key),
            Span::raw(" theme  "),
            Span::styled("s", key),
            Span::raw(" settings  "),
            Span::styled("q", Style::default().fg(palette.error)),
            Span::raw(" quit"),
        ]);
        Line::from(spans)
    }

    fn draw_toasts(&self, f: &mut ratatui::Frame<'_>, area: Rect, palette: &Palette) {
        let width = area.width.min(56);
        let mut y = area.y;
        for toast in self.toasts.iter().rev().take(3) {
            if y + 3 > area.y + area.height {
                break;
            }
            let rect = Rect::new(area.x + area.width - width, y, width, 3);
            let color = toast.level.color(palette);
            let body = Paragraph::new(toast.message.clone())
                .wrap(Wrap { trim: true })
                .block(
                    Block::default()
                        .borders(Borders::ALL)
                        .border_style(Style::default().fg(color))
                        .style(Style::default().bg(palette.surface).fg(palette.text)),
                );
            f.render_widget(Clear, rect);
            f.render_widget(body, rect);
            y += 3;
        }
    }
}

fn draw_settings(f: &mut ratatui::Frame<'_>, form: &SettingsForm, palette: &Palette) {
    let area = centered_rect(70, 50, f.size());
    let mut fields = Vec::new();
    fields.extend(field_lines(
        "Tasks URL",
        &form.tasks_url,
        form.field == SettingsField::TasksUrl,
        palette,
    ));
    fields.push(Line::from(""));
    fields.extend(field_lines(
        "Logs URL",
        &form.logs_url,
        form.field == SettingsField::LogsUrl,
        palette,
    ));
    fields.push(Line::from(""));
    fields.extend(field_lines(
        "Refresh interval (s)",
        &form.interval,
        form.field == SettingsField::Interval,
        palette,
    ));
    fields.push(Line::from(""));
    fields.push(Line::from(Span::styled(
        "Drive share links, file ids and script URLs are accepted",
        Style::default().fg(palette.muted),
    )));
    fields.push(Line::from(Span::styled(
        "Ctrl+S save • Enter next / save • Ctrl+L load sample data • Esc cancel",
        Style::default().fg(palette.muted),
    )));
    let dialog = Paragraph::new(fields)
        .block(
            Block::default()
                .title(Span::styled(
                    "Settings",
                    Style::default()
                        .fg(palette.accent)
                        .add_modifier(Modifier::BOLD),
                ))
                .borders(Borders::ALL)
                .border_style(Style::default().fg(palette.accent))
                .style(Style::default().bg(palette.surface)),
        )
        .wrap(Wrap { trim: true });

    f.render_widget(Clear, area);
    f.render_widget(dialog, area);
}

fn setup_terminal() -> Result<Terminal<CrosstermBackend<Stdout>>> {
    enable_raw_mode()?;
    let mut stdout = stdout();
    execute!(stdout, EnterAlternateScreen, EnableFocusChange)?;
    let backend = CrosstermBackend::new(stdout);
    let terminal = Terminal::new(backend)?;
    Ok(terminal)
}

fn teardown_terminal(terminal: &mut Terminal<CrosstermBackend<Stdout>>) -> Result<()> {
    disable_raw_mode()?;
    execute!(
        terminal.backend_mut(),
        DisableFocusChange,
        LeaveAlternateScreen
    )?;
    terminal.show_cursor()?;
    Ok(())
}

fn centered_rect(percent_x: u16, percent_y: u16, r: Rect) -> Rect {
    let popup_layout = Layout::default()
        .direction(Direction::Vertical)
        .constraints(
            [
                Constraint::Percentage((100 - percent_y) / 2),
                Constraint::Percentage(percent_y),
                Constraint::Percentage((100 - percent_y) / 2),
            ]
            .as_ref(),
        )
        .split(r);

    Layout::default()
        .direction(Direction::Horizontal)
        .constraints(
            [
                Constraint::Percentage((100 - percent_x) / 2),
                Constraint::Percentage(percent_x),
                Constraint::Percentage((100 - percent_x) / 2),
            ]
            .as_ref(),
        )
        .split(popup_layout[1])[1]
}

fn category_color(category: Option<Category>) -> Color {
    category
        .and_then(|c| hex_to_color(c.hex_color()))
        .unwrap_or(Color::Gray)
}

fn hex_to_color(hex: &str) -> Option<Color> {
    let digits = hex.strip_prefix('#')?;
    if digits.len() != 6 {
        return None;
    }
    let channel = |range: std::ops::Range<usize>| u8::from_str_radix(digits.get(range)?, 16).ok();
    Some(Color::Rgb(channel(0..2)?, channel(2..4)?, channel(4..6)?))
}

fn prev_grapheme(cursor: usize, text: &str) -> usize {
    if cursor == 0 {
        return 0;
    }
    let mut prev = 0;
    for (idx, _) in text.char_indices() {
        if idx >= cursor {
            break;
        }
        prev = idx;
    }
    prev
}

fn next_grapheme(cursor: usize, text: &str) -> usize {
    for (idx, ch) in text.char_indices() {
        if idx > cursor {
            return idx;
        }
        if idx == cursor {
            return cursor + ch.len_utf8();
        }
    }
    text.len()
}

fn truncate_text(text: &str, max: usize) -> String {
    if max == 0 {
        return String::new();
    }
    if text.chars().count() <= max {
        return text.to_string();
    }
    let keep = max.saturating_sub(3);
    let mut out: String = text.chars().take(keep).collect();
    out.push_str(&".".repeat(max - keep));
    out
}

/// Greedy word wrap. Words longer than `width` are cut.
fn wrap_text(text: &str, width: usize) -> Vec<String> {
    let width = width.max(1);
    let mut lines = Vec::new();
    let mut current = String::new();
    for word in text.split_whitespace() {
        let word = truncate_text(word, width);
        let needed = if current.is_empty() {
            word.chars().count()
        } else {
            current.chars().count() + 1 + word.chars().count()
        };
        if needed > width && !current.is_empty() {
            lines.push(std::mem::take(&mut current));
        }
        if !current.is_empty() {
            current.push(' ');
        }
        current.push_str(&word);
    }
    if !current.is_empty() {
        lines.push(current);
    }
    lines
}

fn boxed(spans: Vec<Span<'static>>, inner: usize, edge: Style) -> Line<'static> {
    let used: usize = spans.iter().map(|s| s.content.chars().count()).sum();
    let mut out = vec![Span::styled("| ", edge)];
    out.extend(spans);
    out.push(Span::raw(" ".repeat(inner.saturating_sub(used))));
    out.push(Span::styled(" |", edge));
    Line::from(out)
}

fn progress_spans(percent: u16, inner: usize, palette: &Palette) -> Vec<Span<'static>> {
    let label = format!(" {:>3}%", percent);
    let bar = inner.saturating_sub(label.len()).max(1);
    let filled = bar * percent as usize / 100;
    let color = match progress_band(percent) {
        ProgressBand::Low => palette.error,
        ProgressBand::Mid => palette.warning,
        ProgressBand::High => palette.success,
    };
    vec![
        Span::styled("█".repeat(filled), Style::default().fg(color)),
        Span::styled("░".repeat(bar - filled), Style::default().fg(palette.muted)),
        Span::raw(label),
    ]
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}

fn card_item(
    card: &Card,
    width: u16,
    selected: bool,
    with_category: bool,
    palette: &Palette,
    now: DateTime<Utc>,
) -> ListItem<'static> {
    let task = &card.task;
    let inner = width.saturating_sub(4).max(10) as usize;
    let edge_style = Style::default().fg(if selected {
        palette.highlight_bg
    } else {
        palette.border
    });
    let border_char = if selected { "=" } else { "-" };
    let edge = format!("+{}+", border_char.repeat(inner + 2));

    let mut rows: Vec<Vec<Span<'static>>> = Vec::new();
    let marker = if card.expanded { "▾ " } else { "▸ " };
    rows.push(vec![Span::styled(
        format!("{}{}", marker, truncate_text(&task.title, inner - 2)),
        Style::default()
            .fg(palette.text)
            .add_modifier(Modifier::BOLD),
    )]);

    let mut meta = task.priority_label().to_string();
    if with_category {
        if let Some(category) = task.category {
            meta = format!("{} · {}", category.label(), meta);
        }
    }
    if let Some(touched) = task.last_touched() {
        meta.push_str(&format!(" · {}", format_relative_time(&touched, now)));
    }
    rows.push(vec![Span::styled(
        truncate_text(&meta, inner),
        Style::default().fg(palette.muted),
    )]);
    rows.push(progress_spans(task.progress_percent(), inner, palette));

    if with_category {
        if let Some(note) = non_empty(&task.user_action_note) {
            for line in wrap_text(&format!("→ {}", note), inner) {
                rows.push(vec![Span::styled(line, Style::default().fg(palette.warning))]);
            }
        }
    }

    if card.expanded {
        for (label, value) in [
            ("", &task.description),
            ("notes: ", &task.notes),
            ("assignee: ", &task.assignee),
        ] {
            if let Some(text) = non_empty(value) {
                for line in wrap_text(&format!("{}{}", label, text), inner) {
                    rows.push(vec![Span::raw(line)]);
                }
            }
        }
        if !task.tags.is_empty() {
            rows.push(vec![Span::styled(
                truncate_text(&format!("#{}", task.tags.join(" #")), inner),
                Style::default().fg(palette.accent),
            )]);
        }
        if let Some(done) = task.completed_at {
            rows.push(vec![Span::styled(
                truncate_text(&format!("completed {}", format_relative_time(&done, now)), inner),
                Style::default().fg(palette.success),
            )]);
        }
    }

    let mut lines = vec![Line::from(Span::styled(edge.clone(), edge_style))];
    lines.extend(rows.into_iter().map(|spans| boxed(spans, inner, edge_style)));
    lines.push(Line::from(Span::styled(edge, edge_style)));

    let mut item = ListItem::new(lines).style(Style::default().bg(palette.surface).fg(palette.text));
    if selected {
        item = item.style(
            Style::default()
                .bg(palette.surface)
                .fg(palette.text)
                .add_modifier(Modifier::BOLD),
        );
    }
    item
}

fn field_lines(
    label: &str,
    field: &FieldValue,
    active: bool,
    palette: &Palette,
) -> Vec<Line<'static>> {
    let label_style = Style::default()
        .fg(palette.muted)
        .add_modifier(Modifier::BOLD);
    let value_style = Style::default().fg(if active { palette.accent } else { palette.text });
    let text = if active {
        field.with_caret()
    } else {
        field.value.clone()
    };
    vec![Line::from(vec![
        Span::styled(format!("{}: ", label), label_style),
        Span::styled(text, value_style),
    ])]
}
