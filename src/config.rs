use crate::model::{Category, Status};
use serde::{Deserialize, Deserializer, Serialize};
use std::time::Duration;

/// Fixed parameters of the dashboard, handed to each component when it is
/// built instead of being read from globals.
#[derive(Debug, Clone)]
pub struct DashboardConfig {
    pub default_refresh_secs: u64,
    pub min_refresh_secs: u64,
    pub max_refresh_secs: u64,
    pub logs_refresh_secs: u64,
    pub fetch_timeout: Duration,
    pub stale_multiplier: u32,
    pub max_day_dots: usize,
    pub categories: Vec<Category>,
    pub statuses: Vec<Status>,
}

impl Default for DashboardConfig {
    fn default() -> Self {
        DashboardConfig {
            default_refresh_secs: 30,
            min_refresh_secs: 5,
            max_refresh_secs: 300,
            logs_refresh_secs: 300,
            fetch_timeout: Duration::from_secs(30),
            stale_multiplier: 3,
            max_day_dots: 5,
            categories: vec![Category::Cowork, Category::Code, Category::Chat],
            statuses: vec![Status::InProgress, Status::Pending, Status::Completed],
        }
    }
}

impl DashboardConfig {
    /// Polling period for the task timer. Zero means "not set" and falls back
    /// to the default before clamping.
    pub fn task_interval(&self, requested_secs: u64) -> Duration {
        let secs = if requested_secs == 0 {
            self.default_refresh_secs
        } else {
            requested_secs
        };
        Duration::from_secs(crate::util::clamp(
            secs,
            self.min_refresh_secs,
            self.max_refresh_secs,
        ))
    }

    pub fn logs_interval(&self) -> Duration {
        Duration::from_secs(self.logs_refresh_secs)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub tasks_url: String,
    pub logs_url: String,
    #[serde(deserialize_with = "coerce_interval")]
    pub refresh_interval: u64,
}

impl Default for Settings {
    fn default() -> Self {
        Settings {
            tasks_url: String::new(),
            logs_url: String::new(),
            refresh_interval: DEFAULT_REFRESH_SECS,
        }
    }
}

const DEFAULT_REFRESH_SECS: u64 = 30;

impl Settings {
    /// Builds settings from raw form input. The interval only gets numeric
    /// coercion here; clamping happens when polling starts.
    pub fn from_input(tasks_url: &str, logs_url: &str, interval: &str) -> Self {
        Settings {
            tasks_url: tasks_url.trim().to_string(),
            logs_url: logs_url.trim().to_string(),
            refresh_interval: parse_interval(interval).unwrap_or(DEFAULT_REFRESH_SECS),
        }
    }

    pub fn has_tasks_source(&self) -> bool {
        !self.tasks_url.trim().is_empty()
    }
}

/// Leading digits of `raw` as seconds. Zero or no digits yield `None`.
pub fn parse_interval(raw: &str) -> Option<u64> {
    let trimmed = raw.trim();
    let digits: String = trimmed
        .chars()
        .take_while(|c| c.is_ascii_digit())
        .collect();
    match digits.parse::<u64>() {
        Ok(0) | Err(_) => None,
        Ok(v) => Some(v),
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawInterval {
    Number(f64),
    Text(String),
}

fn coerce_interval<'de, D>(deserializer: D) -> Result<u64, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<RawInterval>::deserialize(deserializer)?;
    let value = match raw {
        Some(RawInterval::Number(n)) if n >= 1.0 && n.is_finite() => Some(n as u64),
        Some(RawInterval::Text(text)) => parse_interval(&text),
        _ => None,
    };
    Ok(value.unwrap_or(DEFAULT_REFRESH_SECS))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn interval_is_clamped_to_bounds() {
        let cfg = DashboardConfig::default();
        assert_eq!(cfg.task_interval(1), Duration::from_secs(5));
        assert_eq!(cfg.task_interval(4), Duration::from_secs(5));
        assert_eq!(cfg.task_interval(5), Duration::from_secs(5));
        assert_eq!(cfg.task_interval(42), Duration::from_secs(42));
        assert_eq!(cfg.task_interval(300), Duration::from_secs(300));
        assert_eq!(cfg.task_interval(3600), Duration::from_secs(300));
    }

    #[test]
    fn zero_interval_means_default() {
        let cfg = DashboardConfig::default();
        assert_eq!(cfg.task_interval(0), Duration::from_secs(30));
    }

    #[test]
    fn form_input_is_coerced() {
        let s = Settings::from_input("  https://a.example/t.json ", "", "45s");
        assert_eq!(s.tasks_url, "https://a.example/t.json");
        assert_eq!(s.refresh_interval, 45);
        let s = Settings::from_input("", "", "abc");
        assert_eq!(s.refresh_interval, 30);
        let s = Settings::from_input("", "", "0");
        assert_eq!(s.refresh_interval, 30);
    }

    #[test]
    fn settings_yaml_tolerates_missing_and_textual_fields() {
        let s: Settings = serde_yaml::from_str("tasks_url: x\nrefresh_interval: \"12\"\n").unwrap();
        assert_eq!(s.tasks_url, "x");
        assert_eq!(s.logs_url, "");
        assert_eq!(s.refresh_interval, 12);

        let s: Settings = serde_yaml::from_str("refresh_interval: ~\n").unwrap();
        assert_eq!(s.refresh_interval, 30);

        let s: Settings = serde_yaml::from_str("{}").unwrap();
        assert_eq!(s, Settings::default());
    }
}
