use crate::config::Settings;
use crate::model::{LogsPayload, TasksPayload};
use crate::theme::Theme;
use anyhow::{Context, Result};
use directories::ProjectDirs;
use serde::Serialize;
use std::env;
use std::fmt::Display;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

const SETTINGS_FILE: &str = "settings.yml";
const THEME_FILE: &str = "theme";
const TASKS_CACHE_FILE: &str = "tasks-cache.json";
const LOGS_CACHE_FILE: &str = "logs-cache.json";
const LOG_FILE: &str = "taskwatch.log";

/// Persisted key-value state of the dashboard, one file per key under a
/// single root directory.
#[derive(Debug, Clone)]
pub struct Store {
    root: PathBuf,
}

impl Store {
    /// Resolves the data root: explicit flag, then `TASKWATCH_HOME`, then the
    /// platform data directory.
    pub fn locate(explicit: Option<PathBuf>) -> Result<Store> {
        if let Some(root) = explicit {
            return Ok(Store::at(root));
        }
        if let Some(root) = env::var_os("TASKWATCH_HOME").filter(|v| !v.is_empty()) {
            return Ok(Store::at(PathBuf::from(root)));
        }
        let dirs = ProjectDirs::from("", "", "taskwatch").context("locating data directory")?;
        Ok(Store::at(dirs.data_dir().to_path_buf()))
    }

    pub fn at(root: impl Into<PathBuf>) -> Store {
        Store { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn log_path(&self) -> PathBuf {
        self.root.join(LOG_FILE)
    }

    pub fn ensure_root(&self) -> Result<()> {
        fs::create_dir_all(&self.root).with_context(|| format!("creating {:?}", self.root))
    }

    /// Missing or unreadable settings fall back to defaults.
    pub fn load_settings(&self) -> Settings {
        let path = self.root.join(SETTINGS_FILE);
        if !path.exists() {
            return Settings::default();
        }
        let parsed = fs::read_to_string(&path)
            .with_context(|| format!("reading {:?}", path))
            .and_then(|data| serde_yaml::from_str(&data).context("parsing settings file"));
        match parsed {
            Ok(settings) => settings,
            Err(err) => {
                warn!(error = %format!("{:#}", err), "settings unreadable, using defaults");
                Settings::default()
            }
        }
    }

    pub fn save_settings(&self, settings: &Settings) -> Result<()> {
        self.ensure_root()?;
        let path = self.root.join(SETTINGS_FILE);
        let serialized = serde_yaml::to_string(settings).context("serializing settings")?;
        fs::write(&path, serialized).with_context(|| format!("writing {:?}", path))?;
        Ok(())
    }

    pub fn load_theme(&self) -> Option<Theme> {
        let raw = fs::read_to_string(self.root.join(THEME_FILE)).ok()?;
        Theme::parse(raw.trim())
    }

    pub fn save_theme(&self, theme: Theme) -> Result<()> {
        self.ensure_root()?;
        let path = self.root.join(THEME_FILE);
        fs::write(&path, theme.as_str()).with_context(|| format!("writing {:?}", path))
    }

    pub fn clear_theme(&self) -> Result<()> {
        let path = self.root.join(THEME_FILE);
        if path.exists() {
            fs::remove_file(&path).with_context(|| format!("removing {:?}", path))?;
        }
        Ok(())
    }

    pub fn load_tasks_cache(&self) -> Option<TasksPayload> {
        self.read_cache(TASKS_CACHE_FILE, TasksPayload::parse)
    }

    pub fn load_logs_cache(&self) -> Option<LogsPayload> {
        self.read_cache(LOGS_CACHE_FILE, LogsPayload::parse)
    }

    /// Cache writes are best-effort: a failure is logged and the in-memory
    /// snapshot stays authoritative.
    pub fn save_tasks_cache(&self, payload: &TasksPayload) {
        self.write_cache(TASKS_CACHE_FILE, payload);
    }

    pub fn save_logs_cache(&self, payload: &LogsPayload) {
        self.write_cache(LOGS_CACHE_FILE, payload);
    }

    /// Caches go through the same parser as fresh payloads.
    fn read_cache<T, E: Display>(
        &self,
        name: &str,
        parse: impl FnOnce(&str) -> Result<T, E>,
    ) -> Option<T> {
        let path = self.root.join(name);
        let data = fs::read_to_string(&path).ok()?;
        match parse(&data) {
            Ok(value) => Some(value),
            Err(err) => {
                warn!(file = name, error = %err, "discarding unreadable cache");
                None
            }
        }
    }

    fn write_cache<T: Serialize>(&self, name: &str, value: &T) {
        let result = self.ensure_root().and_then(|_| {
            let path = self.root.join(name);
            let serialized = serde_json::to_string(value).context("serializing cache")?;
            fs::write(&path, serialized).with_context(|| format!("writing {:?}", path))
        });
        match result {
            Ok(()) => debug!(file = name, "cache written"),
            Err(err) => warn!(file = name, error = %format!("{:#}", err), "cache write failed"),
        }
    }
}
