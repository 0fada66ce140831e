use crate::config::DashboardConfig;
use crate::model::{Category, Status, Task, TaskId, TasksPayload};
use std::cmp::Ordering;
use std::collections::HashMap;
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ColumnKey {
    NeedsAction,
    Lane(Category, Status),
}

/// A rendered card. `serial` is assigned when the card is built and survives
/// re-renders for as long as the task content is unchanged.
#[derive(Debug, Clone)]
pub struct Card {
    pub serial: u64,
    pub task: Task,
    pub expanded: bool,
}

#[derive(Debug, Clone)]
pub struct Column {
    pub key: ColumnKey,
    pub cards: Vec<Card>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProgressBand {
    Low,
    Mid,
    High,
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct RenderStats {
    pub reused: usize,
    pub created: usize,
    pub removed: usize,
}

pub struct BoardView {
    config: DashboardConfig,
    needs_action: Column,
    lanes: Vec<Column>,
    counts: HashMap<Category, usize>,
    next_serial: u64,
}

impl Column {
    fn new(key: ColumnKey) -> Self {
        Column {
            key,
            cards: Vec::new(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.cards.is_empty()
    }

    pub fn title(&self) -> String {
        match self.key {
            ColumnKey::NeedsAction => "Next Actions".to_string(),
            ColumnKey::Lane(_, status) => status.label().to_string(),
        }
    }

    /// Category badge and action note are only shown outside category lanes.
    pub fn shows_category(&self) -> bool {
        self.key == ColumnKey::NeedsAction
    }
}

pub fn progress_band(percent: u16) -> ProgressBand {
    if percent >= 75 {
        ProgressBand::High
    } else if percent >= 40 {
        ProgressBand::Mid
    } else {
        ProgressBand::Low
    }
}

/// Tasks flagged for the user, by priority rank then creation time. Tasks
/// without a creation time go after those with one.
pub fn needs_action_tasks(tasks: &[Task]) -> Vec<&Task> {
    let mut flagged: Vec<&Task> = tasks.iter().filter(|t| t.needs_user_action).collect();
    flagged.sort_by(|a, b| {
        a.priority_rank()
            .cmp(&b.priority_rank())
            .then_with(|| match (a.created_at, b.created_at) {
                (Some(x), Some(y)) => x.cmp(&y),
                (Some(_), None) => Ordering::Less,
                (None, Some(_)) => Ordering::Greater,
                (None, None) => Ordering::Equal,
            })
    });
    flagged
}

impl BoardView {
    pub fn new(config: DashboardConfig) -> Self {
        let lanes = config
            .categories
            .iter()
            .flat_map(|&cat| {
                config
                    .statuses
                    .iter()
                    .map(move |&status| Column::new(ColumnKey::Lane(cat, status)))
            })
            .collect();
        BoardView {
            config,
            needs_action: Column::new(ColumnKey::NeedsAction),
            lanes,
            counts: HashMap::new(),
            next_serial: 0,
        }
    }

    /// Brings every column in line with `payload`, reusing cards whose task
    /// is unchanged.
    pub fn render(&mut self, payload: &TasksPayload) -> RenderStats {
        let tasks = &payload.tasks;
        let mut stats = RenderStats::default();

        let flagged = needs_action_tasks(tasks);
        reconcile(&mut self.needs_action, &flagged, &mut self.next_serial, &mut stats);

        self.counts.clear();
        for &cat in &self.config.categories {
            let count = tasks.iter().filter(|t| t.category == Some(cat)).count();
            self.counts.insert(cat, count);
        }

        for column in &mut self.lanes {
            let ColumnKey::Lane(cat, status) = column.key else {
                continue;
            };
            let members: Vec<&Task> = tasks
                .iter()
                .filter(|t| t.category == Some(cat) && t.status == Some(status))
                .collect();
            reconcile(column, &members, &mut self.next_serial, &mut stats);
        }

        debug!(
            reused = stats.reused,
            created = stats.created,
            removed = stats.removed,
            "board rendered"
        );
        stats
    }

    pub fn needs_action(&self) -> &Column {
        &self.needs_action
    }

    pub fn lanes(&self) -> &[Column] {
        &self.lanes
    }

    pub fn lane(&self, category: Category, status: Status) -> Option<&Column> {
        self.lanes
            .iter()
            .find(|c| c.key == ColumnKey::Lane(category, status))
    }

    pub fn categories(&self) -> &[Category] {
        &self.config.categories
    }

    pub fn statuses(&self) -> &[Status] {
        &self.config.statuses
    }

    /// Every task of the category, whatever its status.
    pub fn category_count(&self, category: Category) -> usize {
        self.counts.get(&category).copied().unwrap_or(0)
    }

    /// Needs-action column first, then the lanes in category-major order.
    pub fn column_count(&self) -> usize {
        1 + self.lanes.len()
    }

    pub fn column(&self, idx: usize) -> Option<&Column> {
        if idx == 0 {
            Some(&self.needs_action)
        } else {
            self.lanes.get(idx - 1)
        }
    }

    fn column_mut(&mut self, idx: usize) -> Option<&mut Column> {
        if idx == 0 {
            Some(&mut self.needs_action)
        } else {
            self.lanes.get_mut(idx - 1)
        }
    }

    pub fn toggle_expanded(&mut self, column: usize, card: usize) -> Option<bool> {
        let card = self.column_mut(column)?.cards.get_mut(card)?;
        card.expanded = !card.expanded;
        Some(card.expanded)
    }

    pub fn find_card(&self, id: &str) -> Option<(usize, usize)> {
        (0..self.column_count()).find_map(|c| {
            self.column(c)?
                .cards
                .iter()
                .position(|card| card.task.id == id)
                .map(|pos| (c, pos))
        })
    }
}

fn reconcile(column: &mut Column, tasks: &[&Task], next_serial: &mut u64, stats: &mut RenderStats) {
    let mut existing: HashMap<TaskId, Card> = column
        .cards
        .drain(..)
        .map(|card| (card.task.id.clone(), card))
        .collect();

    let mut cards = Vec::with_capacity(tasks.len());
    for &task in tasks {
        match existing.remove(&task.id) {
            Some(card) if card.task == *task => {
                stats.reused += 1;
                cards.push(card);
            }
            _ => {
                stats.created += 1;
                *next_serial += 1;
                cards.push(Card {
                    serial: *next_serial,
                    task: task.clone(),
                    expanded: false,
                });
            }
        }
    }
    stats.removed += existing.len();
    column.cards = cards;
}

#[cfg(test)]
mod tests {
    use super::*;

    fn payload(json: &str) -> TasksPayload {
        TasksPayload::parse(json).unwrap()
    }

    const SAMPLE: &str = r#"[
        {"id":"a","category":"claude-code","status":"pending","priority":"low","needsUserAction":true,"createdAt":"2024-03-01T00:00:00Z"},
        {"id":"b","category":"claude-chat","status":"completed","priority":"critical","needsUserAction":true,"createdAt":"2024-03-03T00:00:00Z"},
        {"id":"c","category":"claude-cowork","status":"in-progress","priority":"critical","needsUserAction":true,"createdAt":"2024-03-02T00:00:00Z"},
        {"id":"d","category":"claude-code","status":"in-progress","priority":"high"},
        {"id":"e","category":"claude-code","status":"pending","needsUserAction":true},
        {"id":"f","category":"claude-mystery","status":"pending","priority":"high"},
        {"id":"g","category":"claude-chat","status":"blocked"}
    ]"#;

    fn ids(column: &Column) -> Vec<&str> {
        column.cards.iter().map(|c| c.task.id.as_str()).collect()
    }

    #[test]
    fn needs_action_holds_exactly_flagged_tasks_in_rank_order() {
        let mut board = BoardView::new(DashboardConfig::default());
        board.render(&payload(SAMPLE));
        // c and b tie on rank; c was created first. e has no priority.
        assert_eq!(ids(board.needs_action()), vec!["c", "b", "a", "e"]);
        assert!(board
            .needs_action()
            .cards
            .iter()
            .all(|c| c.task.needs_user_action));
    }

    #[test]
    fn each_task_lands_in_its_own_lane_only() {
        let tasks = payload(SAMPLE);
        let mut board = BoardView::new(DashboardConfig::default());
        board.render(&tasks);

        for task in &tasks.tasks {
            let holders: Vec<ColumnKey> = board
                .lanes()
                .iter()
                .filter(|col| col.cards.iter().any(|c| c.task.id == task.id))
                .map(|col| col.key)
                .collect();
            match (task.category, task.status) {
                (Some(cat), Some(status))
                    if board.categories().contains(&cat) && board.statuses().contains(&status) =>
                {
                    assert_eq!(holders, vec![ColumnKey::Lane(cat, status)], "task {}", task.id)
                }
                _ => assert!(holders.is_empty(), "task {}", task.id),
            }
        }
        assert_eq!(
            ids(board.lane(Category::Code, Status::Pending).unwrap()),
            vec!["a", "e"]
        );
    }

    #[test]
    fn category_counts_ignore_status() {
        let mut board = BoardView::new(DashboardConfig::default());
        board.render(&payload(SAMPLE));
        assert_eq!(board.category_count(Category::Code), 3);
        assert_eq!(board.category_count(Category::Chat), 2);
        assert_eq!(board.category_count(Category::Cowork), 1);
    }

    #[test]
    fn identical_rerender_preserves_every_card() {
        let tasks = payload(SAMPLE);
        let mut board = BoardView::new(DashboardConfig::default());
        board.render(&tasks);
        board.toggle_expanded(0, 1);
        let before: Vec<(u64, bool)> = (0..board.column_count())
            .flat_map(|c| board.column(c).unwrap().cards.clone())
            .map(|card| (card.serial, card.expanded))
            .collect();

        let stats = board.render(&tasks);
        assert_eq!(stats.created, 0);
        assert_eq!(stats.removed, 0);
        let after: Vec<(u64, bool)> = (0..board.column_count())
            .flat_map(|c| board.column(c).unwrap().cards.clone())
            .map(|card| (card.serial, card.expanded))
            .collect();
        assert_eq!(before, after);
        assert!(board.needs_action().cards[1].expanded);
    }

    #[test]
    fn changed_task_is_rebuilt_and_removed_task_dropped() {
        let mut board = BoardView::new(DashboardConfig::default());
        board.render(&payload(
            r#"[{"id":"x","title":"One","category":"claude-code","status":"pending"},
                {"id":"y","title":"Two","category":"claude-code","status":"pending"},
                {"id":"z","title":"Three","category":"claude-code","status":"pending"}]"#,
        ));
        let lane = board.lane(Category::Code, Status::Pending).unwrap();
        let serial_x = lane.cards[0].serial;
        let serial_y = lane.cards[1].serial;
        board.toggle_expanded(board.find_card("y").unwrap().0, 1);

        let stats = board.render(&payload(
            r#"[{"id":"y","title":"Two (edited)","category":"claude-code","status":"pending"},
                {"id":"x","title":"One","category":"claude-code","status":"pending"}]"#,
        ));
        let lane = board.lane(Category::Code, Status::Pending).unwrap();
        assert_eq!(ids(lane), vec!["y", "x"]);
        assert_ne!(lane.cards[0].serial, serial_y);
        assert!(!lane.cards[0].expanded);
        assert_eq!(lane.cards[1].serial, serial_x);
        assert_eq!(stats.removed, 1);
        assert_eq!(stats.reused, 1);
    }

    #[test]
    fn task_moving_lanes_gets_a_new_card() {
        let mut board = BoardView::new(DashboardConfig::default());
        board.render(&payload(
            r#"[{"id":"m","category":"claude-chat","status":"pending"}]"#,
        ));
        board.render(&payload(
            r#"[{"id":"m","category":"claude-chat","status":"completed"}]"#,
        ));
        assert!(board.lane(Category::Chat, Status::Pending).unwrap().is_empty());
        assert_eq!(
            ids(board.lane(Category::Chat, Status::Completed).unwrap()),
            vec!["m"]
        );
    }

    #[test]
    fn progress_bands() {
        assert_eq!(progress_band(0), ProgressBand::Low);
        assert_eq!(progress_band(39), ProgressBand::Low);
        assert_eq!(progress_band(40), ProgressBand::Mid);
        assert_eq!(progress_band(74), ProgressBand::Mid);
        assert_eq!(progress_band(75), ProgressBand::High);
    }
}
