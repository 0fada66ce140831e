use crate::board::{BoardView, Card, Column, ColumnKey};
use crate::calendar::{CalendarView, GridCell};
use crate::model::Category;
use crate::util::{escape_html, format_relative_time};
use chrono::{DateTime, Datelike, Utc};
use std::fmt::Write;

const WEEKDAYS: [&str; 7] = ["Mon", "Tue", "Wed", "Thu", "Fri", "Sat", "Sun"];
const OTHER_COLOR: &str = "#888888";

const STYLE: &str = "body{font-family:sans-serif;margin:24px;color:#222}\
.columns{display:flex;gap:12px;flex-wrap:wrap}\
.column{flex:1;min-width:200px;background:#f4f4f0;border-radius:6px;padding:8px}\
.card{background:#fff;border:1px solid #ddd;border-radius:4px;padding:6px;margin:6px 0}\
.meta{color:#777;font-size:12px}\
table.month{border-collapse:collapse}\
table.month td{border:1px solid #ddd;width:90px;height:60px;vertical-align:top}\
.today{background:#fff6d5}\
.dot{display:inline-block;width:8px;height:8px;border-radius:4px;margin-right:2px}";

/// Renders the board and the displayed calendar month as one standalone
/// HTML page. Every payload string goes through `escape_html`.
pub fn render_snapshot(board: &BoardView, calendar: &CalendarView, now: DateTime<Utc>) -> String {
    let mut html = String::new();
    html.push_str("<!DOCTYPE html>\n<html><head><meta charset=\"utf-8\">");
    html.push_str("<title>taskwatch snapshot</title>");
    let _ = write!(html, "<style>{}</style></head><body>\n", STYLE);
    let _ = writeln!(
        html,
        "<p class=\"meta\">Generated {}</p>",
        now.format("%Y-%m-%d %H:%M UTC")
    );

    html.push_str("<h1>Next Actions</h1>\n");
    push_column(&mut html, board.needs_action(), now);

    for &category in board.categories() {
        let _ = writeln!(
            html,
            "<h2>{} <span class=\"meta\">({})</span></h2>\n<div class=\"columns\">",
            category.label(),
            board.category_count(category)
        );
        for &status in board.statuses() {
            if let Some(column) = board.lane(category, status) {
                push_column(&mut html, column, now);
            }
        }
        html.push_str("</div>\n");
    }

    push_month(&mut html, calendar);
    html.push_str("</body></html>\n");
    html
}

fn push_column(html: &mut String, column: &Column, now: DateTime<Utc>) {
    let status = match column.key {
        ColumnKey::NeedsAction => "needs-action",
        ColumnKey::Lane(_, status) => status.slug(),
    };
    let _ = writeln!(
        html,
        "<div class=\"column\" data-status=\"{}\"><h3>{} ({})</h3>",
        status,
        escape_html(&column.title()),
        column.cards.len()
    );
    if column.is_empty() {
        html.push_str("<p class=\"meta\">No tasks</p>\n");
    }
    for card in &column.cards {
        push_card(html, card, column.shows_category(), now);
    }
    html.push_str("</div>\n");
}

fn push_card(html: &mut String, card: &Card, with_category: bool, now: DateTime<Utc>) {
    let task = &card.task;
    let category = task.category.map(|c| c.slug()).unwrap_or("unknown");
    let _ = write!(html, "<div class=\"card\" data-category=\"{}\">", category);
    let _ = write!(html, "<strong>{}</strong>", escape_html(&task.title));
    let _ = write!(
        html,
        "<div class=\"meta\">{} &middot; {}%",
        task.priority_label(),
        task.progress_percent()
    );
    if with_category {
        if let Some(category) = task.category {
            let _ = write!(html, " &middot; {}", category.label());
        }
    }
    if let Some(assignee) = task.assignee.as_deref().filter(|a| !a.is_empty()) {
        let _ = write!(html, " &middot; {}", escape_html(assignee));
    }
    if let Some(touched) = task.last_touched() {
        let _ = write!(html, " &middot; {}", format_relative_time(&touched, now));
    }
    html.push_str("</div>");
    if let Some(note) = task.user_action_note.as_deref().filter(|n| with_category && !n.is_empty()) {
        let _ = write!(html, "<p>{}</p>", escape_html(note));
    }
    if !task.tags.is_empty() {
        let tags: Vec<String> = task.tags.iter().map(|t| escape_html(t)).collect();
        let _ = write!(html, "<div class=\"meta\">#{}</div>", tags.join(" #"));
    }
    html.push_str("</div>\n");
}

fn dot_color(category: Option<Category>) -> &'static str {
    category.map(|c| c.hex_color()).unwrap_or(OTHER_COLOR)
}

fn push_month(html: &mut String, calendar: &CalendarView) {
    let _ = writeln!(html, "<h1>{}</h1>\n<table class=\"month\"><tr>", calendar.title());
    for day in WEEKDAYS {
        let _ = write!(html, "<th>{}</th>", day);
    }
    html.push_str("</tr>\n");

    let mut notes = Vec::new();
    for week in calendar.cells().chunks(7) {
        html.push_str("<tr>");
        for cell in week {
            let GridCell::Day(day) = cell else {
                html.push_str("<td></td>");
                continue;
            };
            let class = if day.is_today { " class=\"today\"" } else { "" };
            let _ = write!(html, "<td{}>{}<br>", class, day.date.day());
            for category in &day.dots {
                let _ = write!(
                    html,
                    "<span class=\"dot\" style=\"background:{}\"></span>",
                    dot_color(*category)
                );
            }
            if day.overflow > 0 {
                let _ = write!(html, "<span class=\"meta\">+{}</span>", day.overflow);
            }
            if let Some(note) = calendar.note_on(day.date) {
                html.push_str(" &#9998;");
                notes.push((day.date, note));
            }
            html.push_str("</td>");
        }
        html.push_str("</tr>\n");
    }
    html.push_str("</table>\n");

    if !notes.is_empty() {
        html.push_str("<h2>Daily notes</h2>\n<ul>\n");
        for (date, note) in notes {
            let _ = writeln!(
                html,
                "<li><strong>{}</strong> {}</li>",
                date.format("%b %-d"),
                escape_html(note)
            );
        }
        html.push_str("</ul>\n");
    }
}
