use crate::board::BoardView;
use crate::calendar::CalendarView;
use crate::cli::ThemeChoice;
use crate::config::{parse_interval, DashboardConfig};
use crate::export::render_snapshot;
use crate::fetch::{HttpTransport, Transport};
use crate::model::{LogsPayload, TasksPayload};
use crate::service::{DataEvent, DataService};
use crate::storage::Store;
use crate::theme::Theme;
use crate::ui;
use crate::util::{build_fetch_url, format_date_only};
use anyhow::{anyhow, bail, Context, Result};
use chrono::{Datelike, Local, NaiveDate, Utc};
use std::fs;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

/// What a one-shot fetch ended up with.
struct Snapshot {
    tasks: Option<Arc<TasksPayload>>,
    logs: Option<Arc<LogsPayload>>,
    fresh: bool,
}

pub fn tui(store: &Store) -> Result<()> {
    store.ensure_root()?;
    ui::run(
        store.clone(),
        DashboardConfig::default(),
        Arc::new(HttpTransport::new()),
    )
}

pub fn fetch(store: &Store, sample: bool) -> Result<()> {
    let config = DashboardConfig::default();
    let snapshot = collect(store, &config, Arc::new(HttpTransport::new()), sample)?;
    let tasks = snapshot
        .tasks
        .ok_or_else(|| anyhow!("no task data available (configure a source or pass --sample)"))?;
    if !snapshot.fresh {
        println!("Showing cached data (fetch failed)");
    }

    let mut board = BoardView::new(config);
    board.render(&tasks);
    println!("{} tasks", tasks.tasks.len());
    for &category in board.categories() {
        let per_status: Vec<String> = board
            .statuses()
            .iter()
            .filter_map(|&status| board.lane(category, status))
            .map(|column| format!("{} {}", column.cards.len(), column.title().to_lowercase()))
            .collect();
        println!(
            "  {:<8} {:>3}  ({})",
            category.label(),
            board.category_count(category),
            per_status.join(", ")
        );
    }

    let flagged = &board.needs_action().cards;
    println!();
    println!("Next actions ({})", flagged.len());
    if flagged.is_empty() {
        println!("  (none)");
    }
    for card in flagged {
        let task = &card.task;
        match task.last_touched() {
            Some(at) => println!(
                "  - [{}] {} (updated {})",
                task.priority_label(),
                task.title,
                format_date_only(&at)
            ),
            None => println!("  - [{}] {}", task.priority_label(), task.title),
        }
        if let Some(note) = task.user_action_note.as_deref().filter(|n| !n.is_empty()) {
            println!("    {}", note);
        }
    }
    if let Some(logs) = snapshot.logs {
        println!();
        println!("{} daily log entries", logs.logs.len());
    }
    Ok(())
}

pub fn config_show(store: &Store) -> Result<()> {
    let settings = store.load_settings();
    println!("# {}", store.root().display());
    print!(
        "{}",
        serde_yaml::to_string(&settings).context("serializing settings")?
    );
    if let Some(url) = build_fetch_url(&settings.tasks_url) {
        println!("# tasks fetched from {}", url);
    }
    if let Some(url) = build_fetch_url(&settings.logs_url) {
        println!("# logs fetched from {}", url);
    }
    Ok(())
}

pub fn config_set(
    store: &Store,
    tasks_url: Option<String>,
    logs_url: Option<String>,
    interval: Option<String>,
) -> Result<()> {
    if tasks_url.is_none() && logs_url.is_none() && interval.is_none() {
        bail!("nothing to change (use --tasks-url, --logs-url or --interval)");
    }
    let mut settings = store.load_settings();
    if let Some(url) = tasks_url {
        settings.tasks_url = url.trim().to_string();
    }
    if let Some(url) = logs_url {
        settings.logs_url = url.trim().to_string();
    }
    if let Some(raw) = interval {
        settings.refresh_interval =
            parse_interval(&raw).ok_or_else(|| anyhow!("invalid interval: {}", raw))?;
    }
    store.save_settings(&settings)?;
    info!(
        tasks_url = %settings.tasks_url,
        logs_url = %settings.logs_url,
        interval = settings.refresh_interval,
        "settings saved"
    );
    println!("Saved settings to {}", store.root().display());
    Ok(())
}

pub fn theme(store: &Store, choice: ThemeChoice) -> Result<()> {
    match choice {
        ThemeChoice::Light => store.save_theme(Theme::Light)?,
        ThemeChoice::Dark => store.save_theme(Theme::Dark)?,
        ThemeChoice::System => store.clear_theme()?,
    }
    match store.load_theme() {
        Some(theme) => println!("Theme set to {}", theme.as_str()),
        None => println!("Theme follows the terminal"),
    }
    Ok(())
}

pub fn export(store: &Store, out: &Path, month: Option<String>, sample: bool) -> Result<()> {
    export_with(
        store,
        Arc::new(HttpTransport::new()),
        out,
        month.as_deref(),
        sample,
    )
}

fn export_with(
    store: &Store,
    transport: Arc<dyn Transport>,
    out: &Path,
    month: Option<&str>,
    sample: bool,
) -> Result<()> {
    let target = month.map(parse_month).transpose()?;
    let config = DashboardConfig::default();
    let snapshot = collect(store, &config, transport, sample)?;
    let tasks = snapshot
        .tasks
        .ok_or_else(|| anyhow!("no task data available (configure a source or pass --sample)"))?;

    let mut board = BoardView::new(config.clone());
    board.render(&tasks);
    let mut calendar = CalendarView::new(config, Local::now().date_naive());
    if let Some(first) = target {
        calendar.show_month(first.year(), first.month());
    }
    calendar.update_tasks(tasks);
    if let Some(logs) = snapshot.logs {
        calendar.update_logs(logs);
    }

    let html = render_snapshot(&board, &calendar, Utc::now());
    fs::write(out, html).with_context(|| format!("writing {:?}", out))?;
    println!("Wrote {} ({})", out.display(), calendar.title());
    Ok(())
}

/// Runs one fetch of each kind to completion. Failures fall back to
/// whatever the cache holds.
fn collect(
    store: &Store,
    config: &DashboardConfig,
    transport: Arc<dyn Transport>,
    sample: bool,
) -> Result<Snapshot> {
    let settings = store.load_settings();
    let mut service = DataService::new(config.clone(), settings, store.clone(), transport);
    let events = service.subscribe();
    if sample {
        service.enable_sample_data();
    }
    service.fetch_all();
    if !service.settle(config.fetch_timeout + Duration::from_secs(5)) {
        warn!("fetch did not finish in time");
    }

    let mut fresh = false;
    for event in events.try_iter() {
        match event {
            DataEvent::TasksUpdated(_) => fresh = true,
            DataEvent::FetchFailed { kind, error } => {
                warn!(kind = kind.label(), %error, "fetch failed")
            }
            _ => {}
        }
    }
    Ok(Snapshot {
        tasks: service.cached_tasks(),
        logs: service.cached_logs(),
        fresh,
    })
}

fn parse_month(raw: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(&format!("{}-01", raw.trim()), "%Y-%m-%d")
        .map_err(|_| anyhow!("invalid month (use YYYY-MM): {}", raw))
}
