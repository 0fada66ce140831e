use crate::config::{DashboardConfig, Settings};
use crate::fetch::{FetchError, FetchKind, Transport};
use crate::model::{LogsPayload, TasksPayload};
use crate::storage::Store;
use crate::util::build_fetch_url;
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use std::collections::HashSet;
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

const SAMPLE_TASKS: &str = include_str!("../data/sample-tasks.json");
const SAMPLE_LOGS: &str = include_str!("../data/sample-daily-logs.json");

/// Notifications sent to every subscriber of a [`DataService`].
#[derive(Debug, Clone)]
pub enum DataEvent {
    TasksUpdated(Arc<TasksPayload>),
    LogsUpdated(Arc<LogsPayload>),
    FetchFailed { kind: FetchKind, error: FetchError },
    Online,
    Offline,
}

struct Completion {
    kind: FetchKind,
    result: Result<String, FetchError>,
}

struct Timer {
    period: Duration,
    next: Instant,
}

impl Timer {
    fn new(period: Duration, now: Instant) -> Self {
        Timer {
            period,
            next: now + period,
        }
    }

    fn fire(&mut self, now: Instant) -> bool {
        if now < self.next {
            return false;
        }
        self.next = now + self.period;
        true
    }
}

#[derive(Default)]
struct Poller {
    tasks: Option<Timer>,
    logs: Option<Timer>,
}

/// Owns the task and log snapshots. Network requests run on worker threads,
/// but their results are only applied in [`DataService::pump`], so the
/// snapshots are never touched off the caller's thread.
pub struct DataService {
    config: DashboardConfig,
    settings: Settings,
    store: Store,
    transport: Arc<dyn Transport>,
    tasks: Option<Arc<TasksPayload>>,
    logs: Option<Arc<LogsPayload>>,
    last_fetch: Option<DateTime<Utc>>,
    use_sample: bool,
    online: bool,
    in_flight: HashSet<FetchKind>,
    poller: Poller,
    subscribers: Vec<Sender<DataEvent>>,
    done_tx: Sender<Completion>,
    done_rx: Receiver<Completion>,
}

impl DataService {
    pub fn new(
        config: DashboardConfig,
        settings: Settings,
        store: Store,
        transport: Arc<dyn Transport>,
    ) -> Self {
        let tasks = store.load_tasks_cache().map(Arc::new);
        let logs = store.load_logs_cache().map(Arc::new);
        let (done_tx, done_rx) = mpsc::channel();
        DataService {
            config,
            settings,
            store,
            transport,
            tasks,
            logs,
            last_fetch: None,
            use_sample: false,
            online: true,
            in_flight: HashSet::new(),
            poller: Poller::default(),
            subscribers: Vec::new(),
            done_tx,
            done_rx,
        }
    }

    pub fn subscribe(&mut self) -> Receiver<DataEvent> {
        let (tx, rx) = mpsc::channel();
        self.subscribers.push(tx);
        rx
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn cached_tasks(&self) -> Option<Arc<TasksPayload>> {
        self.tasks.clone()
    }

    pub fn cached_logs(&self) -> Option<Arc<LogsPayload>> {
        self.logs.clone()
    }

    pub fn last_fetch_time(&self) -> Option<DateTime<Utc>> {
        self.last_fetch
    }

    pub fn is_online(&self) -> bool {
        self.online
    }

    pub fn is_sample(&self) -> bool {
        self.use_sample
    }

    pub fn is_polling(&self) -> bool {
        self.poller.tasks.is_some() || self.poller.logs.is_some()
    }

    pub fn is_busy(&self) -> bool {
        !self.in_flight.is_empty()
    }

    /// Data counts as stale once the last good task fetch is older than a
    /// few refresh periods. Cache-only data is always stale.
    pub fn is_stale(&self, now: DateTime<Utc>) -> bool {
        match self.last_fetch {
            Some(at) => {
                let period = self.config.task_interval(self.settings.refresh_interval)
                    * self.config.stale_multiplier;
                let limit = ChronoDuration::from_std(period)
                    .unwrap_or_else(|_| ChronoDuration::days(365));
                now.signed_duration_since(at) > limit
            }
            None => self.tasks.is_some(),
        }
    }

    /// Switches this instance to the bundled sample payloads. There is no way
    /// back short of building a new service.
    pub fn enable_sample_data(&mut self) {
        if !self.use_sample {
            info!("switching to sample data");
        }
        self.use_sample = true;
    }

    pub fn fetch_tasks(&mut self) {
        if self.use_sample {
            self.load_sample(FetchKind::Tasks);
            return;
        }
        match build_fetch_url(&self.settings.tasks_url) {
            Some(url) => self.spawn(FetchKind::Tasks, url),
            None => self.emit(DataEvent::FetchFailed {
                kind: FetchKind::Tasks,
                error: FetchError::NotConfigured(FetchKind::Tasks),
            }),
        }
    }

    pub fn fetch_logs(&mut self) {
        if self.use_sample {
            self.load_sample(FetchKind::Logs);
            return;
        }
        match build_fetch_url(&self.settings.logs_url) {
            Some(url) => self.spawn(FetchKind::Logs, url),
            None => debug!("no logs URL configured, keeping cached logs"),
        }
    }

    pub fn fetch_all(&mut self) {
        self.fetch_tasks();
        self.fetch_logs();
    }

    /// (Re)starts both timers. The task period is the clamped requested
    /// interval; logs always refresh on the fixed slow period.
    pub fn start_polling(&mut self, interval_secs: u64, now: Instant) {
        self.stop_polling();
        let task_period = self.config.task_interval(interval_secs);
        let logs_period = self.config.logs_interval();
        debug!(
            tasks_secs = task_period.as_secs(),
            logs_secs = logs_period.as_secs(),
            "polling started"
        );
        self.poller.tasks = Some(Timer::new(task_period, now));
        self.poller.logs = Some(Timer::new(logs_period, now));
    }

    pub fn stop_polling(&mut self) {
        if self.is_polling() {
            debug!("polling stopped");
        }
        self.poller = Poller::default();
    }

    pub fn task_period(&self) -> Option<Duration> {
        self.poller.tasks.as_ref().map(|t| t.period)
    }

    /// Fires whichever timers are due.
    pub fn tick(&mut self, now: Instant) {
        let tasks_due = self
            .poller
            .tasks
            .as_mut()
            .map(|t| t.fire(now))
            .unwrap_or(false);
        let logs_due = self
            .poller
            .logs
            .as_mut()
            .map(|t| t.fire(now))
            .unwrap_or(false);
        if tasks_due {
            self.fetch_tasks();
        }
        if logs_due {
            self.fetch_logs();
        }
    }

    /// Hidden: stop polling. Visible again: fetch right away and restart.
    pub fn set_visible(&mut self, visible: bool, now: Instant) {
        if visible {
            debug!("dashboard visible");
            self.fetch_all();
            self.start_polling(self.settings.refresh_interval, now);
        } else {
            debug!("dashboard hidden");
            self.stop_polling();
        }
    }

    pub fn set_online(&mut self, online: bool) {
        if online == self.online {
            return;
        }
        self.online = online;
        if online {
            info!("back online");
            self.emit(DataEvent::Online);
            self.fetch_all();
        } else {
            warn!("gone offline");
            self.emit(DataEvent::Offline);
        }
    }

    /// Applies every finished request. Returns how many were applied.
    pub fn pump(&mut self) -> usize {
        let mut applied = 0;
        while let Ok(done) = self.done_rx.try_recv() {
            self.apply(done);
            applied += 1;
        }
        applied
    }

    /// Blocks until no request is in flight or the timeout passes. Returns
    /// whether everything settled.
    pub fn settle(&mut self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        while !self.in_flight.is_empty() {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                return false;
            }
            match self.done_rx.recv_timeout(remaining) {
                Ok(done) => self.apply(done),
                Err(_) => return false,
            }
        }
        true
    }

    fn spawn(&mut self, kind: FetchKind, url: String) {
        if !self.in_flight.insert(kind) {
            debug!(kind = kind.label(), "fetch already in flight, skipping");
            return;
        }
        debug!(kind = kind.label(), %url, "fetch started");
        let transport = Arc::clone(&self.transport);
        let done_tx = self.done_tx.clone();
        let timeout = self.config.fetch_timeout;
        let spawned = thread::Builder::new()
            .name(format!("fetch-{}", kind.label()))
            .spawn(move || {
                let result = transport.get(&url, timeout);
                // The receiver is gone once the owning service is dropped,
                // which discards responses for replaced settings.
                let _ = done_tx.send(Completion { kind, result });
            });
        if let Err(err) = spawned {
            self.apply(Completion {
                kind,
                result: Err(FetchError::Transport(err.to_string())),
            });
        }
    }

    fn apply(&mut self, done: Completion) {
        self.in_flight.remove(&done.kind);
        let outcome = match done.kind {
            FetchKind::Tasks => done
                .result
                .and_then(|body| TasksPayload::parse(&body).map_err(FetchError::from))
                .map(|payload| self.commit_tasks(payload, true)),
            FetchKind::Logs => done
                .result
                .and_then(|body| LogsPayload::parse(&body).map_err(FetchError::from))
                .map(|payload| self.commit_logs(payload, true)),
        };
        match outcome {
            Ok(()) => {
                if !self.online {
                    self.online = true;
                    info!("back online");
                    self.emit(DataEvent::Online);
                    match done.kind {
                        FetchKind::Tasks => self.fetch_logs(),
                        FetchKind::Logs => self.fetch_tasks(),
                    }
                }
            }
            Err(error) => self.fail(done.kind, error),
        }
    }

    fn commit_tasks(&mut self, payload: TasksPayload, persist: bool) {
        debug!(count = payload.tasks.len(), "tasks updated");
        if persist {
            self.store.save_tasks_cache(&payload);
        }
        let payload = Arc::new(payload);
        self.tasks = Some(Arc::clone(&payload));
        self.last_fetch = Some(Utc::now());
        self.emit(DataEvent::TasksUpdated(payload));
    }

    fn commit_logs(&mut self, payload: LogsPayload, persist: bool) {
        debug!(count = payload.logs.len(), "logs updated");
        if persist {
            self.store.save_logs_cache(&payload);
        }
        let payload = Arc::new(payload);
        self.logs = Some(Arc::clone(&payload));
        self.emit(DataEvent::LogsUpdated(payload));
    }

    fn fail(&mut self, kind: FetchKind, error: FetchError) {
        warn!(kind = kind.label(), %error, "fetch failed, keeping last good data");
        let connectivity = error.is_connectivity();
        self.emit(DataEvent::FetchFailed { kind, error });
        if connectivity && self.online {
            self.online = false;
            self.emit(DataEvent::Offline);
        }
    }

    fn load_sample(&mut self, kind: FetchKind) {
        match kind {
            FetchKind::Tasks => match TasksPayload::parse(SAMPLE_TASKS) {
                Ok(payload) => self.commit_tasks(payload, false),
                Err(err) => self.fail(kind, FetchError::Sample(err.to_string())),
            },
            FetchKind::Logs => match LogsPayload::parse(SAMPLE_LOGS) {
                Ok(payload) => self.commit_logs(payload, false),
                Err(err) => warn!(error = %err, "sample logs unreadable"),
            },
        }
    }

    fn emit(&mut self, event: DataEvent) {
        self.subscribers.retain(|tx| tx.send(event.clone()).is_ok());
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::collections::{HashMap, VecDeque};
    use std::sync::Mutex;

    const SETTLE: Duration = Duration::from_secs(5);

    /// Transport that answers from a per-URL script and records every call.
    #[derive(Default)]
    pub(crate) struct Scripted {
        responses: Mutex<HashMap<String, VecDeque<Result<String, FetchError>>>>,
        calls: Mutex<Vec<String>>,
    }

    impl Scripted {
        pub(crate) fn respond(&self, url: &str, result: Result<&str, FetchError>) -> &Self {
            self.responses
                .lock()
                .unwrap()
                .entry(url.to_string())
                .or_default()
                .push_back(result.map(str::to_string));
            self
        }

        pub(crate) fn calls(&self) -> Vec<String> {
            self.calls.lock().unwrap().clone()
        }
    }

    impl Transport for Scripted {
        fn get(&self, url: &str, _timeout: Duration) -> Result<String, FetchError> {
            self.calls.lock().unwrap().push(url.to_string());
            self.responses
                .lock()
                .unwrap()
                .get_mut(url)
                .and_then(|q| q.pop_front())
                .unwrap_or_else(|| Err(FetchError::Http(404)))
        }
    }

    const TASKS_URL: &str = "https://example.com/tasks.json";
    const LOGS_URL: &str = "https://example.com/logs.json";

    fn settings() -> Settings {
        Settings {
            tasks_url: TASKS_URL.into(),
            logs_url: LOGS_URL.into(),
            refresh_interval: 30,
        }
    }

    fn service(store: &Store, transport: Arc<Scripted>) -> DataService {
        DataService::new(DashboardConfig::default(), settings(), store.clone(), transport)
    }

    fn drain(rx: &Receiver<DataEvent>) -> Vec<DataEvent> {
        rx.try_iter().collect()
    }

    #[test]
    fn successful_fetch_updates_snapshot_cache_and_observers() {
        let dir = tempfile::tempdir().unwrap();
        let store = Store::at(dir.path());
        let transport = Arc::new(Scripted::default());
        transport.respond(TASKS_URL, Ok(r#"[{"id":"t1","title":"One"}]"#));
        let mut svc = service(&store, transport.clone());
        let rx = svc.subscribe();

        svc.fetch_tasks();
        assert!(svc.settle(SETTLE));

        let tasks = svc.cached_tasks().unwrap();
        assert_eq!(tasks.tasks[0].id, "t1");
        assert!(svc.last_fetch_time().is_some());
        assert_eq!(store.load_tasks_cache().as_ref(), Some(&*tasks));
        let events = drain(&rx);
        assert!(matches!(events.as_slice(), [DataEvent::TasksUpdated(_)]));
    }

    #[test]
    fn cache_write_failure_still_updates_snapshot() {
        let dir = tempfile::tempdir().unwrap();
        let blocked = dir.path().join("not-a-dir");
        std::fs::write(&blocked, "occupied").unwrap();
        let store = Store::at(blocked.clone());
        let transport = Arc::new(Scripted::default());
        transport
            .respond(TASKS_URL, Ok(r#"[{"id":"t1"}]"#))
            .respond(TASKS_URL, Ok(r#"[{"id":"t2"}]"#));
        let mut svc = service(&store, transport);
        let rx = svc.subscribe();

        svc.fetch_tasks();
        assert!(svc.settle(SETTLE));
        assert_eq!(svc.cached_tasks().unwrap().tasks[0].id, "t1");
        assert!(matches!(drain(&rx).as_slice(), [DataEvent::TasksUpdated(_)]));

        svc.fetch_tasks();
        assert!(svc.settle(SETTLE));
        assert_eq!(svc.cached_tasks().unwrap().tasks[0].id, "t2");
        assert!(matches!(drain(&rx).as_slice(), [DataEvent::TasksUpdated(_)]));
        assert!(store.load_tasks_cache().is_none());
        assert!(blocked.is_file());
    }

    #[test]
    fn failed_fetch_keeps_previous_snapshot() {
        let dir = tempfile::tempdir().unwrap();
        let store = Store::at(dir.path());
        let transport = Arc::new(Scripted::default());
        transport
            .respond(TASKS_URL, Ok(r#"{"tasks":[{"id":"t1"}]}"#))
            .respond(TASKS_URL, Err(FetchError::Http(500)))
            .respond(TASKS_URL, Ok(r#"{"items":[{"id":"t2"}]}"#))
            .respond(TASKS_URL, Ok("<html>"));
        let mut svc = service(&store, transport);
        let rx = svc.subscribe();

        svc.fetch_tasks();
        assert!(svc.settle(SETTLE));
        let before = svc.cached_tasks().unwrap();
        drain(&rx);

        for expected in [
            FetchError::Http(500),
            FetchError::Schema("tasks array missing".into()),
        ] {
            svc.fetch_tasks();
            assert!(svc.settle(SETTLE));
            assert_eq!(svc.cached_tasks().unwrap(), before);
            match drain(&rx).as_slice() {
                [DataEvent::FetchFailed { kind, error }] => {
                    assert_eq!(*kind, FetchKind::Tasks);
                    assert_eq!(*error, expected);
                }
                other => panic!("unexpected events: {:?}", other),
            }
        }

        svc.fetch_tasks();
        assert!(svc.settle(SETTLE));
        assert_eq!(svc.cached_tasks().unwrap(), before);
        assert!(matches!(
            drain(&rx).as_slice(),
            [DataEvent::FetchFailed {
                error: FetchError::Parse(_),
                ..
            }]
        ));
        assert_eq!(store.load_tasks_cache().as_ref(), Some(&*before));
    }

    #[test]
    fn cached_snapshot_is_available_before_first_fetch() {
        let dir = tempfile::tempdir().unwrap();
        let store = Store::at(dir.path());
        let cached = TasksPayload::parse(r#"[{"id":"cached"}]"#).unwrap();
        store.save_tasks_cache(&cached);

        let svc = service(&store, Arc::new(Scripted::default()));
        assert_eq!(svc.cached_tasks().as_deref(), Some(&cached));
        assert!(svc.last_fetch_time().is_none());
        assert!(svc.is_stale(Utc::now()));
    }

    #[test]
    fn unconfigured_sources() {
        let dir = tempfile::tempdir().unwrap();
        let store = Store::at(dir.path());
        let transport = Arc::new(Scripted::default());
        let mut svc = DataService::new(
            DashboardConfig::default(),
            Settings::default(),
            store,
            transport.clone(),
        );
        let rx = svc.subscribe();
        svc.fetch_tasks();
        svc.fetch_logs();
        assert!(!svc.is_busy());
        assert!(transport.calls().is_empty());
        match drain(&rx).as_slice() {
            [DataEvent::FetchFailed { error, .. }] => {
                assert_eq!(*error, FetchError::NotConfigured(FetchKind::Tasks))
            }
            other => panic!("unexpected events: {:?}", other),
        }
    }

    #[test]
    fn drive_links_are_normalized_before_fetching() {
        let dir = tempfile::tempdir().unwrap();
        let transport = Arc::new(Scripted::default());
        let mut svc = DataService::new(
            DashboardConfig::default(),
            Settings {
                tasks_url: "https://drive.google.com/file/d/ABC123XYZ/view".into(),
                ..Settings::default()
            },
            Store::at(dir.path()),
            transport.clone(),
        );
        svc.fetch_tasks();
        svc.settle(SETTLE);
        assert_eq!(
            transport.calls(),
            vec!["https://drive.google.com/uc?export=download&id=ABC123XYZ".to_string()]
        );
    }

    #[test]
    fn sample_mode_is_sticky_and_not_cached() {
        let dir = tempfile::tempdir().unwrap();
        let store = Store::at(dir.path());
        let transport = Arc::new(Scripted::default());
        let mut svc = service(&store, transport.clone());
        let rx = svc.subscribe();

        svc.enable_sample_data();
        svc.fetch_all();
        assert!(!svc.is_busy());
        assert!(transport.calls().is_empty());
        assert!(svc.cached_tasks().unwrap().tasks.len() > 3);
        assert!(!svc.cached_logs().unwrap().logs.is_empty());
        assert!(store.load_tasks_cache().is_none());
        assert_eq!(drain(&rx).len(), 2);

        svc.fetch_tasks();
        assert!(transport.calls().is_empty());
        assert!(svc.is_sample());
    }

    #[test]
    fn polling_clamps_interval_and_fires_on_schedule() {
        let dir = tempfile::tempdir().unwrap();
        let transport = Arc::new(Scripted::default());
        let mut svc = service(&Store::at(dir.path()), transport.clone());
        let t0 = Instant::now();

        svc.start_polling(1, t0);
        assert_eq!(svc.task_period(), Some(Duration::from_secs(5)));
        svc.tick(t0 + Duration::from_secs(4));
        assert!(transport.calls().is_empty());

        svc.tick(t0 + Duration::from_secs(5));
        svc.settle(SETTLE);
        assert_eq!(transport.calls(), vec![TASKS_URL.to_string()]);

        svc.tick(t0 + Duration::from_secs(300));
        svc.settle(SETTLE);
        let mut calls = transport.calls();
        calls.sort();
        assert_eq!(
            calls,
            vec![
                LOGS_URL.to_string(),
                TASKS_URL.to_string(),
                TASKS_URL.to_string()
            ]
        );

        svc.start_polling(10_000, t0);
        assert_eq!(svc.task_period(), Some(Duration::from_secs(300)));
    }

    #[test]
    fn hidden_stops_polling_and_visible_refetches() {
        let dir = tempfile::tempdir().unwrap();
        let transport = Arc::new(Scripted::default());
        let mut svc = service(&Store::at(dir.path()), transport.clone());
        let t0 = Instant::now();
        svc.start_polling(30, t0);

        svc.set_visible(false, t0);
        assert!(!svc.is_polling());
        svc.tick(t0 + Duration::from_secs(600));
        assert!(transport.calls().is_empty());

        svc.set_visible(true, t0);
        svc.settle(SETTLE);
        assert!(svc.is_polling());
        let mut calls = transport.calls();
        calls.sort();
        assert_eq!(calls, vec![LOGS_URL.to_string(), TASKS_URL.to_string()]);
    }

    #[test]
    fn connectivity_transitions() {
        let dir = tempfile::tempdir().unwrap();
        let transport = Arc::new(Scripted::default());
        transport
            .respond(TASKS_URL, Err(FetchError::Transport("dns failure".into())))
            .respond(TASKS_URL, Ok("[]"))
            .respond(LOGS_URL, Ok(r#"{"logs":[]}"#));
        let mut svc = service(&Store::at(dir.path()), transport.clone());
        let rx = svc.subscribe();

        svc.fetch_tasks();
        svc.settle(SETTLE);
        assert!(!svc.is_online());
        let events = drain(&rx);
        assert!(matches!(
            events.as_slice(),
            [DataEvent::FetchFailed { .. }, DataEvent::Offline]
        ));

        // Recovery also pulls the other source.
        svc.fetch_tasks();
        svc.settle(SETTLE);
        assert!(svc.is_online());
        let events = drain(&rx);
        assert!(matches!(
            events.as_slice(),
            [
                DataEvent::TasksUpdated(_),
                DataEvent::Online,
                DataEvent::LogsUpdated(_)
            ]
        ));
    }

    #[test]
    fn explicit_online_transition_refetches_both() {
        let dir = tempfile::tempdir().unwrap();
        let transport = Arc::new(Scripted::default());
        let mut svc = service(&Store::at(dir.path()), transport.clone());
        let rx = svc.subscribe();

        svc.set_online(false);
        assert!(transport.calls().is_empty());
        assert!(matches!(drain(&rx).as_slice(), [DataEvent::Offline]));

        svc.set_online(true);
        svc.settle(SETTLE);
        assert_eq!(transport.calls().len(), 2);
        assert!(matches!(drain(&rx).first(), Some(DataEvent::Online)));
    }

    struct Gated {
        release: Mutex<Receiver<()>>,
    }

    impl Transport for Gated {
        fn get(&self, _url: &str, _timeout: Duration) -> Result<String, FetchError> {
            let _ = self.release.lock().unwrap().recv();
            Ok(r#"[{"id":"stale"}]"#.to_string())
        }
    }

    #[test]
    fn responses_for_replaced_service_are_discarded() {
        let dir = tempfile::tempdir().unwrap();
        let store = Store::at(dir.path());
        let (release_tx, release_rx) = mpsc::channel();
        let gated = Arc::new(Gated {
            release: Mutex::new(release_rx),
        });

        let mut old = DataService::new(
            DashboardConfig::default(),
            settings(),
            store.clone(),
            gated,
        );
        old.fetch_tasks();
        assert!(old.is_busy());
        drop(old);

        let mut fresh = service(&store, Arc::new(Scripted::default()));
        let rx = fresh.subscribe();
        release_tx.send(()).unwrap();
        thread::sleep(Duration::from_millis(50));
        fresh.pump();
        assert!(fresh.cached_tasks().is_none());
        assert!(store.load_tasks_cache().is_none());
        assert!(drain(&rx).is_empty());
    }

    #[test]
    fn concurrent_request_of_same_kind_is_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let (release_tx, release_rx) = mpsc::channel();
        let gated = Arc::new(Gated {
            release: Mutex::new(release_rx),
        });
        let mut svc = DataService::new(
            DashboardConfig::default(),
            settings(),
            Store::at(dir.path()),
            gated,
        );
        svc.fetch_tasks();
        svc.fetch_tasks();
        release_tx.send(()).unwrap();
        assert!(svc.settle(SETTLE));
        assert_eq!(svc.cached_tasks().unwrap().tasks[0].id, "stale");
    }
}
