use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime, TimeZone};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

pub type TaskId = String;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Category {
    Cowork,
    Code,
    Chat,
    Other,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Status {
    InProgress,
    Pending,
    Completed,
    #[serde(other)]
    Other,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    Critical,
    High,
    Medium,
    Low,
    #[serde(other)]
    Unranked,
}

/// Rank given to tasks whose priority is missing or unrecognized.
pub const UNRANKED: u8 = 9;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    #[serde(deserialize_with = "lenient_id")]
    pub id: TaskId,
    #[serde(default, deserialize_with = "lenient_title")]
    pub title: String,
    /// Category as written by the source, kept so unknown ids can still be
    /// shown by name.
    #[serde(
        rename = "category",
        default,
        deserialize_with = "lenient_text",
        skip_serializing_if = "Option::is_none"
    )]
    pub category_id: Option<String>,
    #[serde(skip)]
    pub category: Option<Category>,
    #[serde(default, deserialize_with = "lenient_status")]
    pub status: Option<Status>,
    #[serde(default, deserialize_with = "lenient_priority")]
    pub priority: Option<Priority>,
    #[serde(default, deserialize_with = "lenient_progress")]
    pub progress: f64,
    #[serde(default, deserialize_with = "lenient_text")]
    pub assignee: Option<String>,
    #[serde(default, deserialize_with = "lenient_tags")]
    pub tags: Vec<String>,
    #[serde(default, deserialize_with = "lenient_timestamp")]
    pub created_at: Option<DateTime<FixedOffset>>,
    #[serde(default, deserialize_with = "lenient_timestamp")]
    pub updated_at: Option<DateTime<FixedOffset>>,
    #[serde(default, deserialize_with = "lenient_timestamp")]
    pub completed_at: Option<DateTime<FixedOffset>>,
    #[serde(default, deserialize_with = "lenient_flag")]
    pub needs_user_action: bool,
    #[serde(default, deserialize_with = "lenient_text")]
    pub user_action_note: Option<String>,
    #[serde(default, deserialize_with = "lenient_text")]
    pub description: Option<String>,
    #[serde(default, deserialize_with = "lenient_text")]
    pub notes: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DailyLog {
    #[serde(default)]
    pub date: String,
    #[serde(default)]
    pub note: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TasksPayload {
    pub tasks: Vec<Task>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LogsPayload {
    pub logs: Vec<DailyLog>,
}

#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum PayloadError {
    #[error("invalid JSON: {0}")]
    Parse(String),
    #[error("invalid data: {0}")]
    Schema(String),
}

impl Category {
    /// Empty ids mean "no category"; anything unrecognized is `Other`.
    pub fn from_id(id: &str) -> Option<Category> {
        match id {
            "" => None,
            "claude-cowork" => Some(Category::Cowork),
            "claude-code" => Some(Category::Code),
            "claude-chat" => Some(Category::Chat),
            _ => Some(Category::Other),
        }
    }

    pub fn slug(&self) -> &'static str {
        match self {
            Category::Cowork => "claude-cowork",
            Category::Code => "claude-code",
            Category::Chat => "claude-chat",
            Category::Other => "unknown",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Category::Cowork => "Cowork",
            Category::Code => "Code",
            Category::Chat => "Chat",
            Category::Other => "Other",
        }
    }

    pub fn hex_color(&self) -> &'static str {
        match self {
            Category::Cowork => "#a855f7",
            Category::Code => "#3b82f6",
            Category::Chat => "#22c55e",
            Category::Other => "#888888",
        }
    }
}

impl Status {
    pub fn slug(&self) -> &'static str {
        match self {
            Status::InProgress => "in-progress",
            Status::Pending => "pending",
            Status::Completed => "completed",
            Status::Other => "unknown",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Status::InProgress => "In Progress",
            Status::Pending => "Pending",
            Status::Completed => "Completed",
            Status::Other => "Other",
        }
    }
}

impl Priority {
    pub fn rank(&self) -> u8 {
        match self {
            Priority::Critical => 0,
            Priority::High => 1,
            Priority::Medium => 2,
            Priority::Low => 3,
            Priority::Unranked => UNRANKED,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Priority::Critical => "critical",
            Priority::High => "high",
            Priority::Medium | Priority::Unranked => "medium",
            Priority::Low => "low",
        }
    }
}

impl Task {
    pub fn priority_rank(&self) -> u8 {
        self.priority.map(|p| p.rank()).unwrap_or(UNRANKED)
    }

    pub fn priority_label(&self) -> &'static str {
        self.priority.map(|p| p.label()).unwrap_or("medium")
    }

    /// Progress clamped to 0..=100 for display.
    pub fn progress_percent(&self) -> u16 {
        if self.progress.is_nan() {
            return 0;
        }
        self.progress.clamp(0.0, 100.0).round() as u16
    }

    pub fn last_touched(&self) -> Option<DateTime<FixedOffset>> {
        self.updated_at.or(self.created_at)
    }

    /// Calendar day of completion, read in the timestamp's own offset.
    pub fn completed_on(&self) -> Option<NaiveDate> {
        self.completed_at.map(|d| d.date_naive())
    }
}

impl TasksPayload {
    /// Accepts either a bare array of tasks or an object carrying a `tasks`
    /// array. Anything else is a schema violation.
    pub fn parse(body: &str) -> Result<Self, PayloadError> {
        let value: Value =
            serde_json::from_str(body).map_err(|e| PayloadError::Parse(e.to_string()))?;
        let tasks = match value {
            Value::Array(items) => Value::Array(items),
            Value::Object(mut map) => match map.remove("tasks") {
                Some(Value::Array(items)) => Value::Array(items),
                _ => return Err(PayloadError::Schema("tasks array missing".into())),
            },
            _ => return Err(PayloadError::Schema("tasks array missing".into())),
        };
        let mut tasks: Vec<Task> =
            serde_json::from_value(tasks).map_err(|e| PayloadError::Schema(e.to_string()))?;
        for task in &mut tasks {
            task.category = task.category_id.as_deref().and_then(Category::from_id);
        }
        Ok(TasksPayload { tasks })
    }
}

impl LogsPayload {
    pub fn parse(body: &str) -> Result<Self, PayloadError> {
        let value: Value =
            serde_json::from_str(body).map_err(|e| PayloadError::Parse(e.to_string()))?;
        let logs = match value {
            Value::Array(items) => Value::Array(items),
            Value::Object(mut map) => match map.remove("logs") {
                Some(Value::Array(items)) => Value::Array(items),
                _ => return Err(PayloadError::Schema("logs array missing".into())),
            },
            _ => return Err(PayloadError::Schema("logs array missing".into())),
        };
        let logs: Vec<DailyLog> =
            serde_json::from_value(logs).map_err(|e| PayloadError::Schema(e.to_string()))?;
        Ok(LogsPayload { logs })
    }
}

fn lenient_timestamp<'de, D>(deserializer: D) -> Result<Option<DateTime<FixedOffset>>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<Value>::deserialize(deserializer)?;
    Ok(match raw {
        Some(Value::String(s)) => parse_timestamp(&s),
        _ => None,
    })
}

const LOCAL_FORMATS: [&str; 3] = [
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M",
];

/// RFC 3339 first, then a date-time without offset, then a bare
/// `YYYY-MM-DD` at midnight. Inputs without an offset are read as UTC. An
/// explicit offset is kept so the completion day matches what the source wrote.
pub fn parse_timestamp(raw: &str) -> Option<DateTime<FixedOffset>> {
    let trimmed = raw.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(trimmed) {
        return Some(dt);
    }
    let naive = LOCAL_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(trimmed, fmt).ok())
        .or_else(|| {
            NaiveDate::parse_from_str(trimmed, "%Y-%m-%d")
                .ok()?
                .and_hms_opt(0, 0, 0)
        })?;
    Some(FixedOffset::east_opt(0)?.from_utc_datetime(&naive))
}

fn lenient_progress<'de, D>(deserializer: D) -> Result<f64, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<Value>::deserialize(deserializer)?;
    Ok(match raw {
        Some(Value::Number(n)) => n.as_f64().unwrap_or(0.0),
        Some(Value::String(s)) => s.trim().parse().unwrap_or(0.0),
        _ => 0.0,
    })
}

fn lenient_id<'de, D>(deserializer: D) -> Result<TaskId, D::Error>
where
    D: Deserializer<'de>,
{
    match Value::deserialize(deserializer)? {
        Value::String(s) => Ok(s),
        Value::Number(n) => Ok(n.to_string()),
        other => Err(serde::de::Error::custom(format!(
            "task id must be a string or number, got {}",
            other
        ))),
    }
}

fn lenient_title<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(lenient_text(deserializer)?.unwrap_or_default())
}

// Strings pass through, numbers and booleans are stringified, everything
// else is absent.
fn lenient_text<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<Value>::deserialize(deserializer)?;
    Ok(match raw {
        Some(Value::String(s)) if !s.is_empty() => Some(s),
        Some(Value::Number(n)) => Some(n.to_string()),
        Some(Value::Bool(b)) => Some(b.to_string()),
        _ => None,
    })
}

fn lenient_tags<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<Value>::deserialize(deserializer)?;
    Ok(match raw {
        Some(Value::Array(items)) => items
            .into_iter()
            .filter_map(|item| match item {
                Value::String(s) if !s.is_empty() => Some(s),
                Value::Number(n) => Some(n.to_string()),
                _ => None,
            })
            .collect(),
        _ => Vec::new(),
    })
}

// Truthy the way a loose JSON producer means it: null, false, 0 and "" are off.
fn lenient_flag<'de, D>(deserializer: D) -> Result<bool, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<Value>::deserialize(deserializer)?;
    Ok(match raw {
        None | Some(Value::Null) => false,
        Some(Value::Bool(b)) => b,
        Some(Value::Number(n)) => n.as_f64().map(|f| f != 0.0).unwrap_or(false),
        Some(Value::String(s)) => !s.is_empty(),
        Some(_) => true,
    })
}

fn lenient_status<'de, D>(deserializer: D) -> Result<Option<Status>, D::Error>
where
    D: Deserializer<'de>,
{
    lenient_enum(deserializer)
}

fn lenient_priority<'de, D>(deserializer: D) -> Result<Option<Priority>, D::Error>
where
    D: Deserializer<'de>,
{
    lenient_enum(deserializer)
}

// Null, empty strings and non-string values all mean "absent".
fn lenient_enum<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: serde::de::DeserializeOwned,
{
    let raw = Option::<Value>::deserialize(deserializer)?;
    Ok(match raw {
        Some(Value::String(s)) if !s.is_empty() => serde_json::from_value(Value::String(s)).ok(),
        _ => None,
    })
}
