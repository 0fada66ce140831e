use chrono::{DateTime, Datelike, FixedOffset, NaiveDate, Utc};
use regex::Regex;
use std::sync::OnceLock;

const SCRIPT_HOST: &str = "script.google.com";

pub fn format_relative_time(ts: &DateTime<FixedOffset>, now: DateTime<Utc>) -> String {
    let secs = now
        .signed_duration_since(ts.with_timezone(&Utc))
        .num_seconds();
    let mins = secs.div_euclid(60);
    let hours = mins.div_euclid(60);
    let days = hours.div_euclid(24);
    if secs < 60 {
        "just now".to_string()
    } else if mins < 60 {
        format!("{}m ago", mins)
    } else if hours < 24 {
        format!("{}h ago", hours)
    } else if days < 30 {
        format!("{}d ago", days)
    } else {
        format_date_time(ts)
    }
}

pub fn format_date_time(ts: &DateTime<FixedOffset>) -> String {
    ts.format("%b %-d, %H:%M").to_string()
}

pub fn format_date_only(ts: &DateTime<FixedOffset>) -> String {
    ts.format("%Y-%m-%d").to_string()
}

pub fn escape_html(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for ch in input.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(ch),
        }
    }
    out
}

struct DrivePatterns {
    path: Regex,
    query: Regex,
    bare: Regex,
}

fn drive_patterns() -> Option<&'static DrivePatterns> {
    static PATTERNS: OnceLock<Option<DrivePatterns>> = OnceLock::new();
    PATTERNS
        .get_or_init(|| {
            Some(DrivePatterns {
                path: Regex::new(r"/d/([a-zA-Z0-9_-]+)").ok()?,
                query: Regex::new(r"id=([a-zA-Z0-9_-]+)").ok()?,
                bare: Regex::new(r"^([a-zA-Z0-9_-]{20,})$").ok()?,
            })
        })
        .as_ref()
}

/// Pulls a Drive file id out of a share link (`/d/<id>`), an `id=<id>`
/// query, or a bare id of at least 20 characters. Script endpoints never
/// yield an id.
pub fn extract_drive_file_id(input: &str) -> Option<String> {
    if input.is_empty() || input.contains(SCRIPT_HOST) {
        return None;
    }
    let patterns = drive_patterns()?;
    [&patterns.path, &patterns.query, &patterns.bare]
        .iter()
        .find_map(|re| re.captures(input))
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_string())
}

pub fn build_fetch_url(url_or_id: &str) -> Option<String> {
    let trimmed = url_or_id.trim();
    if trimmed.is_empty() {
        return None;
    }
    if trimmed.contains(SCRIPT_HOST) {
        return Some(trimmed.to_string());
    }
    if let Some(file_id) = extract_drive_file_id(trimmed) {
        return Some(format!(
            "https://drive.google.com/uc?export=download&id={}",
            file_id
        ));
    }
    Some(trimmed.to_string())
}

pub fn clamp<T: Ord>(value: T, min: T, max: T) -> T {
    value.max(min).min(max)
}

pub fn days_in_month(year: i32, month: u32) -> u32 {
    let next = if month == 12 {
        NaiveDate::from_ymd_opt(year + 1, 1, 1)
    } else {
        NaiveDate::from_ymd_opt(year, month + 1, 1)
    };
    next.and_then(|d| d.pred_opt()).map(|d| d.day()).unwrap_or(28)
}

/// Blank cells before the 1st in a Monday-first week (Mon = 0 .. Sun = 6).
pub fn first_weekday_offset(year: i32, month: u32) -> u32 {
    NaiveDate::from_ymd_opt(year, month, 1)
        .map(|d| d.weekday().num_days_from_monday())
        .unwrap_or(0)
}
