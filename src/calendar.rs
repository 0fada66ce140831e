use crate::config::DashboardConfig;
use crate::model::{Category, LogsPayload, Task, TasksPayload};
use crate::util::{days_in_month, first_weekday_offset, format_date_time};
use chrono::{Datelike, NaiveDate};
use std::collections::BTreeMap;
use std::sync::Arc;

const MONTH_NAMES: [&str; 12] = [
    "January",
    "February",
    "March",
    "April",
    "May",
    "June",
    "July",
    "August",
    "September",
    "October",
    "November",
    "December",
];

#[derive(Debug, Clone, PartialEq)]
pub enum GridCell {
    Blank,
    Day(DayCell),
}

#[derive(Debug, Clone, PartialEq)]
pub struct DayCell {
    pub date: NaiveDate,
    /// Categories of the first few completed tasks, one dot each.
    pub dots: Vec<Option<Category>>,
    /// Completed tasks beyond the shown dots.
    pub overflow: usize,
    pub completed: usize,
    pub has_note: bool,
    pub is_today: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DayDetail {
    pub date: NaiveDate,
    pub title: String,
    pub groups: Vec<CategoryGroup>,
    pub note: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CategoryGroup {
    pub category: Option<Category>,
    pub category_id: Option<String>,
    pub entries: Vec<DetailEntry>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DetailEntry {
    pub title: String,
    pub completed_at: String,
}

impl CategoryGroup {
    /// Unrecognized categories are shown under the id the source used.
    pub fn label(&self) -> &str {
        match (self.category, self.category_id.as_deref()) {
            (Some(Category::Other), Some(id)) => id,
            (Some(category), _) => category.label(),
            (None, _) => "Unknown",
        }
    }
}

impl DayCell {
    pub fn has_content(&self) -> bool {
        self.completed > 0 || self.has_note
    }
}

pub struct CalendarView {
    config: DashboardConfig,
    year: i32,
    month: u32,
    today: NaiveDate,
    selected_day: u32,
    tasks: Option<Arc<TasksPayload>>,
    logs: Option<Arc<LogsPayload>>,
    completed: BTreeMap<NaiveDate, Vec<Task>>,
    notes: BTreeMap<NaiveDate, String>,
    cells: Vec<GridCell>,
    detail: Option<DayDetail>,
}

impl CalendarView {
    /// Opens on the month containing `today`.
    pub fn new(config: DashboardConfig, today: NaiveDate) -> Self {
        let mut view = CalendarView {
            config,
            year: today.year(),
            month: today.month(),
            today,
            selected_day: today.day(),
            tasks: None,
            logs: None,
            completed: BTreeMap::new(),
            notes: BTreeMap::new(),
            cells: Vec::new(),
            detail: None,
        };
        view.render();
        view
    }

    pub fn update_tasks(&mut self, payload: Arc<TasksPayload>) {
        self.tasks = Some(payload);
        self.render();
    }

    pub fn update_logs(&mut self, payload: Arc<LogsPayload>) {
        self.logs = Some(payload);
        self.render();
    }

    pub fn set_today(&mut self, today: NaiveDate) {
        if today != self.today {
            self.today = today;
            self.render();
        }
    }

    pub fn year(&self) -> i32 {
        self.year
    }

    pub fn month(&self) -> u32 {
        self.month
    }

    pub fn title(&self) -> String {
        format!("{} {}", MONTH_NAMES[(self.month - 1) as usize], self.year)
    }

    pub fn prev_month(&mut self) {
        if self.month == 1 {
            self.month = 12;
            self.year -= 1;
        } else {
            self.month -= 1;
        }
        self.render();
    }

    pub fn next_month(&mut self) {
        if self.month == 12 {
            self.month = 1;
            self.year += 1;
        } else {
            self.month += 1;
        }
        self.render();
    }

    /// Jumps the cursor to an arbitrary month (1-based).
    pub fn show_month(&mut self, year: i32, month: u32) {
        if (1..=12).contains(&month) {
            self.year = year;
            self.month = month;
            self.render();
        }
    }

    pub fn cells(&self) -> &[GridCell] {
        &self.cells
    }

    pub fn completed_on(&self, date: NaiveDate) -> &[Task] {
        self.completed.get(&date).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn note_on(&self, date: NaiveDate) -> Option<&str> {
        self.notes.get(&date).map(String::as_str)
    }

    pub fn selected_date(&self) -> Option<NaiveDate> {
        NaiveDate::from_ymd_opt(self.year, self.month, self.selected_day)
    }

    /// Moves the day selection, staying inside the displayed month.
    pub fn move_selection(&mut self, delta: i64) {
        let last = days_in_month(self.year, self.month) as i64;
        self.selected_day = (self.selected_day as i64 + delta).clamp(1, last) as u32;
    }

    pub fn detail(&self) -> Option<&DayDetail> {
        self.detail.as_ref()
    }

    pub fn open_selected(&mut self) -> bool {
        match self.selected_date() {
            Some(date) => self.open_detail(date),
            None => false,
        }
    }

    /// Only days with completed tasks or a note open a detail.
    pub fn open_detail(&mut self, date: NaiveDate) -> bool {
        let tasks = self.completed_on(date);
        let note = self.note_on(date).map(str::to_string);
        if tasks.is_empty() && note.is_none() {
            return false;
        }
        let mut groups: Vec<CategoryGroup> = Vec::new();
        for task in tasks {
            let entry = DetailEntry {
                title: task.title.clone(),
                completed_at: task
                    .completed_at
                    .as_ref()
                    .map(format_date_time)
                    .unwrap_or_default(),
            };
            match groups
                .iter_mut()
                .find(|g| g.category_id == task.category_id)
            {
                Some(group) => group.entries.push(entry),
                None => groups.push(CategoryGroup {
                    category: task.category,
                    category_id: task.category_id.clone(),
                    entries: vec![entry],
                }),
            }
        }
        self.detail = Some(DayDetail {
            date,
            title: date.format("%A, %B %-d, %Y").to_string(),
            groups,
            note,
        });
        true
    }

    pub fn close_detail(&mut self) {
        self.detail = None;
    }

    /// Rebuilds the month indexes and the grid from the current snapshots.
    pub fn render(&mut self) {
        let (year, month) = (self.year, self.month);
        let in_month = |d: &NaiveDate| d.year() == year && d.month() == month;

        self.completed.clear();
        if let Some(payload) = &self.tasks {
            for task in &payload.tasks {
                if let Some(date) = task.completed_on().filter(in_month) {
                    self.completed.entry(date).or_default().push(task.clone());
                }
            }
        }

        self.notes.clear();
        if let Some(payload) = &self.logs {
            for log in &payload.logs {
                if log.note.is_empty() {
                    continue;
                }
                if let Some(date) = NaiveDate::parse_from_str(log.date.trim(), "%Y-%m-%d")
                    .ok()
                    .filter(in_month)
                {
                    self.notes.insert(date, log.note.clone());
                }
            }
        }

        let days = days_in_month(year, month);
        let lead = first_weekday_offset(year, month) as usize;
        let mut cells = vec![GridCell::Blank; lead];
        for day in 1..=days {
            let Some(date) = NaiveDate::from_ymd_opt(year, month, day) else {
                continue;
            };
            let done = self.completed_on(date);
            let shown = done.len().min(self.config.max_day_dots);
            cells.push(GridCell::Day(DayCell {
                date,
                dots: done[..shown].iter().map(|t| t.category).collect(),
                overflow: done.len() - shown,
                completed: done.len(),
                has_note: self.notes.contains_key(&date),
                is_today: date == self.today,
            }));
        }
        let remainder = cells.len() % 7;
        if remainder > 0 {
            cells.extend(std::iter::repeat(GridCell::Blank).take(7 - remainder));
        }
        self.cells = cells;
        self.selected_day = self.selected_day.min(days).max(1);

        if let Some(open) = self.detail.as_ref().map(|d| d.date) {
            if !in_month(&open) || !self.open_detail(open) {
                self.detail = None;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::DailyLog;

    fn march_2024() -> CalendarView {
        CalendarView::new(
            DashboardConfig::default(),
            NaiveDate::from_ymd_opt(2024, 3, 20).unwrap(),
        )
    }

    fn day(view: &CalendarView, d: u32) -> DayCell {
        let date = NaiveDate::from_ymd_opt(view.year(), view.month(), d).unwrap();
        view.cells()
            .iter()
            .find_map(|c| match c {
                GridCell::Day(cell) if cell.date == date => Some(cell.clone()),
                _ => None,
            })
            .unwrap()
    }

    fn tasks(json: &str) -> Arc<TasksPayload> {
        Arc::new(TasksPayload::parse(json).unwrap())
    }

    #[test]
    fn grid_is_monday_first_and_padded_to_weeks() {
        let view = march_2024();
        assert_eq!(view.title(), "March 2024");
        assert_eq!(view.cells().len() % 7, 0);
        // 2024-03-01 is a Friday: four blanks before it.
        assert!(view.cells()[..4].iter().all(|c| *c == GridCell::Blank));
        assert!(matches!(&view.cells()[4], GridCell::Day(c) if c.date.day() == 1));
        assert!(day(&view, 20).is_today);
    }

    #[test]
    fn completed_task_shows_on_its_day_across_navigation() {
        let mut view = march_2024();
        view.update_tasks(tasks(
            r#"[{"id":"t1","title":"Ship","category":"claude-code","completedAt":"2024-03-05T10:00:00Z"}]"#,
        ));
        let date = NaiveDate::from_ymd_opt(2024, 3, 5).unwrap();
        assert_eq!(view.completed_on(date)[0].id, "t1");
        let before = view.cells().to_vec();
        assert_eq!(day(&view, 5).dots, vec![Some(Category::Code)]);

        view.next_month();
        assert_eq!(view.title(), "April 2024");
        assert!(view.completed_on(date).is_empty());

        view.prev_month();
        assert_eq!(view.cells(), before.as_slice());
        assert_eq!(view.completed_on(date)[0].id, "t1");
    }

    #[test]
    fn month_navigation_wraps_years() {
        let mut view = CalendarView::new(
            DashboardConfig::default(),
            NaiveDate::from_ymd_opt(2024, 1, 31).unwrap(),
        );
        view.prev_month();
        assert_eq!((view.year(), view.month()), (2023, 12));
        view.next_month();
        view.next_month();
        assert_eq!((view.year(), view.month()), (2024, 2));
        // Selection clamps to the shorter month.
        assert_eq!(view.selected_date(), NaiveDate::from_ymd_opt(2024, 2, 29));
    }

    #[test]
    fn dots_cap_at_five_with_overflow() {
        let mut view = march_2024();
        let items: Vec<String> = (0..7)
            .map(|i| {
                format!(
                    r#"{{"id":"t{i}","category":"claude-chat","completedAt":"2024-03-12T0{i}:00:00Z"}}"#
                )
            })
            .collect();
        view.update_tasks(tasks(&format!("[{}]", items.join(","))));
        let cell = day(&view, 12);
        assert_eq!(cell.dots.len(), 5);
        assert_eq!(cell.overflow, 2);
        assert_eq!(cell.completed, 7);
    }

    #[test]
    fn notes_index_by_date_last_entry_wins() {
        let mut view = march_2024();
        view.update_logs(Arc::new(LogsPayload {
            logs: vec![
                DailyLog {
                    date: "2024-03-07".into(),
                    note: "first".into(),
                },
                DailyLog {
                    date: "2024-03-07".into(),
                    note: "second".into(),
                },
                DailyLog {
                    date: "2024-03-08".into(),
                    note: String::new(),
                },
                DailyLog {
                    date: "2024-04-01".into(),
                    note: "next month".into(),
                },
            ],
        }));
        let date = NaiveDate::from_ymd_opt(2024, 3, 7).unwrap();
        assert_eq!(view.note_on(date), Some("second"));
        assert!(day(&view, 7).has_note);
        assert!(!day(&view, 8).has_note);
        assert!(view
            .note_on(NaiveDate::from_ymd_opt(2024, 4, 1).unwrap())
            .is_none());
    }

    #[test]
    fn detail_groups_by_category_and_includes_note() {
        let mut view = march_2024();
        view.update_tasks(tasks(
            r#"[
                {"id":"a","title":"A","category":"claude-code","completedAt":"2024-03-05T10:00:00Z"},
                {"id":"b","title":"B","category":"claude-chat","completedAt":"2024-03-05T11:30:00Z"},
                {"id":"c","title":"C","category":"claude-code","completedAt":"2024-03-05T12:00:00Z"}
            ]"#,
        ));
        view.update_logs(Arc::new(LogsPayload {
            logs: vec![DailyLog {
                date: "2024-03-05".into(),
                note: "good day".into(),
            }],
        }));
        let date = NaiveDate::from_ymd_opt(2024, 3, 5).unwrap();
        assert!(view.open_detail(date));
        let detail = view.detail().unwrap();
        assert_eq!(detail.title, "Tuesday, March 5, 2024");
        assert_eq!(detail.groups.len(), 2);
        assert_eq!(detail.groups[0].label(), "Code");
        assert_eq!(detail.groups[0].entries.len(), 2);
        assert_eq!(detail.groups[0].entries[1].completed_at, "Mar 5, 12:00");
        assert_eq!(detail.groups[1].label(), "Chat");
        assert_eq!(detail.note.as_deref(), Some("good day"));

        view.close_detail();
        assert!(view.detail().is_none());
        assert!(!view.open_detail(NaiveDate::from_ymd_opt(2024, 3, 6).unwrap()));
    }

    #[test]
    fn unknown_categories_group_by_their_own_id() {
        let mut view = march_2024();
        view.update_tasks(tasks(
            r#"[
                {"id":"a","title":"A","category":"research","completedAt":"2024-03-09T10:00:00Z"},
                {"id":"b","title":"B","category":"ops","completedAt":"2024-03-09T11:00:00Z"},
                {"id":"c","title":"C","category":"research","completedAt":"2024-03-09T12:00:00Z"},
                {"id":"d","title":"D","completedAt":"2024-03-09T13:00:00Z"}
            ]"#,
        ));
        assert!(view.open_detail(NaiveDate::from_ymd_opt(2024, 3, 9).unwrap()));
        let labels: Vec<(&str, usize)> = view
            .detail()
            .unwrap()
            .groups
            .iter()
            .map(|g| (g.label(), g.entries.len()))
            .collect();
        assert_eq!(labels, vec![("research", 2), ("ops", 1), ("Unknown", 1)]);
    }

    #[test]
    fn completion_without_offset_lands_on_written_day() {
        let mut view = march_2024();
        view.update_tasks(tasks(
            r#"[{"id":"t1","title":"Ship","category":"claude-code","completedAt":"2024-03-05T23:30:00"}]"#,
        ));
        let date = NaiveDate::from_ymd_opt(2024, 3, 5).unwrap();
        assert_eq!(view.completed_on(date)[0].id, "t1");
        assert_eq!(day(&view, 5).dots, vec![Some(Category::Code)]);
        assert!(view.open_detail(date));
        assert_eq!(
            view.detail().unwrap().groups[0].entries[0].completed_at,
            "Mar 5, 23:30"
        );
    }

    #[test]
    fn detail_closes_when_leaving_its_month() {
        let mut view = march_2024();
        view.update_tasks(tasks(
            r#"[{"id":"a","title":"A","completedAt":"2024-03-05T10:00:00Z"}]"#,
        ));
        view.move_selection(-15);
        assert!(view.open_selected());
        view.next_month();
        assert!(view.detail().is_none());
    }
}
