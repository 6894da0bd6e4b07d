//
//  mod.rs
//  routegraph
//
//  Created by hak (tharun)
//

//! Incremental monitor.
//!
//! File events update the program's per-file snapshots immediately and
//! (re)arm a single debounce timer; when it fires, a full analysis pass runs
//! over a fresh store and its outcome is broadcast to subscribers.

pub mod watcher;

pub use watcher::{FileEvent, FileWatcher};

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::runtime::Handle;
use tokio::sync::{broadcast, mpsc, oneshot};
use tokio::task::JoinHandle;
use uuid::Uuid;

use crate::analysis::{analyze, AnalysisOutcome};
use crate::config::RouteGraphConfig;
use crate::diagnostics::Diagnostics;
use crate::error::{Result, RouteGraphError};
use crate::graph::ResourceId;
use crate::program::{ProgramModel, TypeScriptProgram};

const COMPONENT: &str = "monitor";
const EVENT_CAPACITY: usize = 64;

/// Lifecycle notifications of analysis passes.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum AnalysisEvent {
    Started {
        run_id: Uuid,
        at: DateTime<Utc>,
    },
    Completed {
        run_id: Uuid,
        at: DateTime<Utc>,
        payload: AnalysisPayload,
    },
}

impl AnalysisEvent {
    pub fn run_id(&self) -> Uuid {
        match self {
            AnalysisEvent::Started { run_id, .. } | AnalysisEvent::Completed { run_id, .. } => *run_id,
        }
    }

    /// Single-line JSON form, as printed by `routegraph watch`.
    pub fn to_json_line(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum AnalysisPayload {
    /// `root_id` is `None` when the project has no routers.
    Success {
        root_id: Option<ResourceId>,
        error_count: usize,
    },
    Failure {
        error: String,
    },
}

/// Keeps a program in sync with the file system and re-runs analysis.
pub struct RoutesMonitor {
    inner: Arc<Inner>,
}

struct Inner {
    root: PathBuf,
    config: RouteGraphConfig,
    diagnostics: Diagnostics,
    program: Mutex<TypeScriptProgram>,
    last_result: Mutex<Option<Arc<AnalysisOutcome>>>,
    events: broadcast::Sender<AnalysisEvent>,
    running: AtomicBool,
    auto_update: AtomicBool,
    /// Pending debounced analysis.
    timer: Mutex<Option<JoinHandle<()>>>,
    /// Task applying file events.
    pump: Mutex<Option<JoinHandle<()>>>,
    watcher: Mutex<Option<FileWatcher>>,
}

/// Lock a mutex whose data stays consistent even if a holder panicked.
fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl RoutesMonitor {
    pub fn new(root: impl Into<PathBuf>, config: RouteGraphConfig, diagnostics: Diagnostics) -> Self {
        let root = root.into();
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        let auto_update = config.monitor.auto_update;
        Self {
            inner: Arc::new(Inner {
                program: Mutex::new(TypeScriptProgram::new(root.clone()).with_diagnostics(diagnostics.clone())),
                root,
                config,
                diagnostics,
                last_result: Mutex::new(None),
                events,
                running: AtomicBool::new(false),
                auto_update: AtomicBool::new(auto_update),
                timer: Mutex::new(None),
                pump: Mutex::new(None),
                watcher: Mutex::new(None),
            }),
        }
    }

    pub fn root(&self) -> &Path {
        &self.inner.root
    }

    pub fn subscribe(&self) -> broadcast::Receiver<AnalysisEvent> {
        self.inner.events.subscribe()
    }

    /// Watch the configured locations and return once every existing file
    /// has been ingested.
    pub async fn start(&self) -> Result<()> {
        if self.is_running() {
            return Ok(());
        }
        let mut watcher = FileWatcher::from_config(&self.inner.config, &self.inner.root);
        let events = watcher.start()?;
        *lock(&self.inner.watcher) = Some(watcher);
        self.start_with_events(events).await
    }

    /// Drive the monitor from any change notifier. Returns after the
    /// notifier's `Ready` event (or when it closes without one).
    pub async fn start_with_events(&self, mut events: mpsc::UnboundedReceiver<FileEvent>) -> Result<()> {
        if self.is_running() {
            return Ok(());
        }
        let (ready_tx, ready_rx) = oneshot::channel();
        let inner = Arc::clone(&self.inner);
        let pump = tokio::spawn(async move {
            let mut ready_tx = Some(ready_tx);
            while let Some(event) = events.recv().await {
                if matches!(event, FileEvent::Ready) {
                    if let Some(tx) = ready_tx.take() {
                        let _ = tx.send(());
                    }
                    continue;
                }
                inner.apply_event(event);
            }
            if let Some(tx) = ready_tx.take() {
                let _ = tx.send(());
            }
            inner.diagnostics.debug(COMPONENT, "file event stream closed");
        });
        *lock(&self.inner.pump) = Some(pump);

        let _ = ready_rx.await;
        if lock(&self.inner.pump).is_none() {
            // Stopped while waiting for the initial scan.
            return Ok(());
        }
        self.inner.running.store(true, Ordering::SeqCst);
        self.inner.diagnostics.info(
            COMPONENT,
            format!("routes monitor started for {}", self.inner.root.display()),
        );
        if self.auto_update() {
            self.inner.schedule_update();
        }
        Ok(())
    }

    /// Apply one file event to the program snapshots.
    pub fn apply_event(&self, event: FileEvent) {
        self.inner.apply_event(event);
    }

    /// Run an analysis pass now.
    pub fn update_routes_result(&self) -> Result<Arc<AnalysisOutcome>> {
        self.inner.update()
    }

    pub fn last_successful_result(&self) -> Option<Arc<AnalysisOutcome>> {
        lock(&self.inner.last_result).clone()
    }

    pub fn is_running(&self) -> bool {
        self.inner.running.load(Ordering::SeqCst)
    }

    pub fn auto_update(&self) -> bool {
        self.inner.auto_update.load(Ordering::SeqCst)
    }

    /// Whether file changes schedule analysis passes on their own.
    pub fn set_auto_update(&self, enabled: bool) {
        self.inner.auto_update.store(enabled, Ordering::SeqCst);
    }

    /// Cancel the pending pass and stop watching. Also releases a notifier
    /// that never reached `Ready`.
    pub fn stop(&self) {
        let was_running = self.inner.running.swap(false, Ordering::SeqCst);
        if let Some(timer) = lock(&self.inner.timer).take() {
            timer.abort();
        }
        if let Some(pump) = lock(&self.inner.pump).take() {
            pump.abort();
        }
        if let Some(mut watcher) = lock(&self.inner.watcher).take() {
            watcher.stop();
        }
        if was_running {
            self.inner.diagnostics.info(
                COMPONENT,
                format!("routes monitor stopped for {}", self.inner.root.display()),
            );
        }
    }
}

impl Drop for RoutesMonitor {
    fn drop(&mut self) {
        self.stop();
    }
}

impl Inner {
    fn apply_event(self: &Arc<Self>, event: FileEvent) {
        let changed = {
            let Ok(mut program) = self.program.lock() else {
                self.diagnostics
                    .warn(COMPONENT, "program snapshots unavailable, dropping file event");
                return;
            };
            match event {
                FileEvent::Added { path, content } => self.upsert(&mut program, &path, content),
                FileEvent::Updated { path, content } => {
                    if program.source(&path).is_none() {
                        self.diagnostics.warn(
                            COMPONENT,
                            format!("updated file {} was never added", path.display()),
                        );
                        false
                    } else {
                        self.upsert(&mut program, &path, content)
                    }
                }
                FileEvent::Removed { path } => program.remove_file(&path),
                FileEvent::Ready => false,
            }
        };
        if changed && self.auto_update.load(Ordering::SeqCst) {
            self.schedule_update();
        }
    }

    fn upsert(&self, program: &mut TypeScriptProgram, path: &Path, content: String) -> bool {
        match program.upsert_file(path, content) {
            Ok(version) => {
                self.diagnostics
                    .debug(COMPONENT, format!("{} is now at version {version}", path.display()));
                true
            }
            Err(e) => {
                self.diagnostics
                    .warn(COMPONENT, format!("failed to parse {}: {e}", path.display()));
                false
            }
        }
    }

    /// Re-arm the debounce timer.
    fn schedule_update(self: &Arc<Self>) {
        let Ok(runtime) = Handle::try_current() else {
            self.diagnostics
                .warn(COMPONENT, "no async runtime, analysis not scheduled");
            return;
        };
        let delay = Duration::from_millis(self.config.monitor.debounce_ms);
        let inner = Arc::clone(self);

        let mut timer = lock(&self.timer);
        if let Some(previous) = timer.take() {
            previous.abort();
        }
        *timer = Some(runtime.spawn(async move {
            tokio::time::sleep(delay).await;
            match inner.update() {
                Ok(_) => {}
                Err(RouteGraphError::NotRunning) => inner
                    .diagnostics
                    .debug(COMPONENT, "monitor stopped before scheduled analysis"),
                Err(e) => inner.diagnostics.warn(COMPONENT, format!("analysis failed: {e}")),
            }
        }));
    }

    fn update(&self) -> Result<Arc<AnalysisOutcome>> {
        if !self.running.load(Ordering::SeqCst) {
            return Err(RouteGraphError::NotRunning);
        }
        let run_id = Uuid::new_v4();
        self.emit(AnalysisEvent::Started {
            run_id,
            at: Utc::now(),
        });

        let outcome = match self.program.lock() {
            Ok(program) => Ok(analyze(&*program, &self.config.discovery, &self.diagnostics)),
            Err(_) => Err(RouteGraphError::Analysis(
                "program snapshots are poisoned".to_string(),
            )),
        };

        match outcome {
            Ok(outcome) => {
                let outcome = Arc::new(outcome);
                *lock(&self.last_result) = Some(Arc::clone(&outcome));
                self.diagnostics.info(
                    COMPONENT,
                    format!(
                        "analysis {run_id} completed: root {}, {} error(s)",
                        outcome.root_id.as_ref().map_or("none", |id| id.as_str()),
                        outcome.error_count
                    ),
                );
                self.emit(AnalysisEvent::Completed {
                    run_id,
                    at: Utc::now(),
                    payload: AnalysisPayload::Success {
                        root_id: outcome.root_id.clone(),
                        error_count: outcome.error_count,
                    },
                });
                Ok(outcome)
            }
            Err(e) => {
                self.emit(AnalysisEvent::Completed {
                    run_id,
                    at: Utc::now(),
                    payload: AnalysisPayload::Failure {
                        error: e.to_string(),
                    },
                });
                Err(e)
            }
        }
    }

    fn emit(&self, event: AnalysisEvent) {
        // No subscribers is fine.
        let _ = self.events.send(event);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::sync::broadcast::error::TryRecvError;

    const INDEX: &str = "import { Hono } from 'hono';\nconst app = new Hono();\napp.get('/', (c) => c.text('hi'));\n";

    fn monitor() -> RoutesMonitor {
        RoutesMonitor::new("/p", RouteGraphConfig::default(), Diagnostics::memory().0)
    }

    fn added(path: &str, content: &str) -> FileEvent {
        FileEvent::Added {
            path: PathBuf::from(path),
            content: content.to_string(),
        }
    }

    fn updated(path: &str, content: &str) -> FileEvent {
        FileEvent::Updated {
            path: PathBuf::from(path),
            content: content.to_string(),
        }
    }

    /// Next completed payload, checking it pairs with a started event.
    async fn next_run(events: &mut broadcast::Receiver<AnalysisEvent>) -> AnalysisPayload {
        let started = events.recv().await.unwrap();
        assert!(matches!(started, AnalysisEvent::Started { .. }));
        match events.recv().await.unwrap() {
            AnalysisEvent::Completed { run_id, payload, .. } => {
                assert_eq!(run_id, started.run_id());
                payload
            }
            other => panic!("expected completion, got {other:?}"),
        }
    }

    async fn started_with(files: Vec<FileEvent>) -> (RoutesMonitor, mpsc::UnboundedSender<FileEvent>) {
        let monitor = monitor();
        let (tx, rx) = mpsc::unbounded_channel();
        for file in files {
            tx.send(file).unwrap();
        }
        tx.send(FileEvent::Ready).unwrap();
        monitor.start_with_events(rx).await.unwrap();
        (monitor, tx)
    }

    #[tokio::test(start_paused = true)]
    async fn test_first_pass_runs_after_ready() {
        let monitor = monitor();
        let mut events = monitor.subscribe();
        let (tx, rx) = mpsc::unbounded_channel();
        tx.send(added("/p/src/index.ts", INDEX)).unwrap();
        tx.send(FileEvent::Ready).unwrap();

        monitor.start_with_events(rx).await.unwrap();
        assert!(monitor.is_running());
        assert!(monitor.last_successful_result().is_none(), "pass waits for the debounce delay");

        tokio::time::sleep(Duration::from_millis(60)).await;
        match next_run(&mut events).await {
            AnalysisPayload::Success { root_id, error_count } => {
                assert!(root_id.is_some());
                assert_eq!(error_count, 0);
            }
            other => panic!("unexpected {other:?}"),
        }
        assert!(matches!(events.try_recv(), Err(TryRecvError::Empty)), "exactly one pass");

        let outcome = monitor.last_successful_result().unwrap();
        let mut engine = outcome.replay(Diagnostics::memory().0).unwrap();
        assert!(engine.dispatch("GET", "/").unwrap().is_match());
        assert_eq!(engine.history_length(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_burst_of_changes_collapses_into_one_pass() {
        let (monitor, tx) = started_with(vec![added("/p/src/index.ts", INDEX)]).await;
        tokio::time::sleep(Duration::from_millis(60)).await;
        assert!(monitor.last_successful_result().is_some());
        let mut events = monitor.subscribe();

        let burst = [
            "app.post('/a', (c) => c.text('a'));\n",
            "app.post('/b', (c) => c.text('b'));\n",
            "app.post('/c', (c) => c.text('c'));\n",
        ];
        let mut content = INDEX.to_string();
        for line in burst {
            content.push_str(line);
            tx.send(updated("/p/src/index.ts", &content)).unwrap();
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        tokio::time::sleep(Duration::from_millis(60)).await;

        assert!(matches!(next_run(&mut events).await, AnalysisPayload::Success { .. }));
        assert!(matches!(events.try_recv(), Err(TryRecvError::Empty)), "one pass for the burst");
        let outcome = monitor.last_successful_result().unwrap();
        assert_eq!(outcome.root().unwrap().entries.len(), 4);
    }

    #[tokio::test(start_paused = true)]
    async fn test_no_root_is_a_successful_pass() {
        let monitor = monitor();
        let mut events = monitor.subscribe();
        let (tx, rx) = mpsc::unbounded_channel();
        tx.send(added("/p/src/util.ts", "export const answer = 42;\n")).unwrap();
        tx.send(FileEvent::Ready).unwrap();
        monitor.start_with_events(rx).await.unwrap();

        tokio::time::sleep(Duration::from_millis(60)).await;
        assert_eq!(
            next_run(&mut events).await,
            AnalysisPayload::Success {
                root_id: None,
                error_count: 0
            }
        );
        let outcome = monitor.last_successful_result().unwrap();
        assert!(outcome.root().is_none());
        assert!(matches!(
            outcome.replay(Diagnostics::memory().0),
            Err(RouteGraphError::NoRouteTrees)
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn test_manual_updates_without_auto_update() {
        let (monitor, tx) = started_with(vec![]).await;
        monitor.set_auto_update(false);
        let mut events = monitor.subscribe();
        tokio::time::sleep(Duration::from_millis(60)).await;
        // the pass armed by start still runs
        assert!(matches!(next_run(&mut events).await, AnalysisPayload::Success { root_id: None, .. }));

        tx.send(added("/p/src/index.ts", INDEX)).unwrap();
        tokio::time::sleep(Duration::from_millis(100)).await;
        assert!(matches!(events.try_recv(), Err(TryRecvError::Empty)));

        let outcome = monitor.update_routes_result().unwrap();
        assert!(outcome.root_id.is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn test_stop_cancels_pending_pass() {
        let (monitor, tx) = started_with(vec![added("/p/src/index.ts", INDEX)]).await;
        let mut events = monitor.subscribe();
        monitor.stop();
        assert!(!monitor.is_running());

        let _ = tx.send(updated("/p/src/index.ts", INDEX));
        tokio::time::sleep(Duration::from_millis(200)).await;
        assert!(matches!(events.try_recv(), Err(TryRecvError::Empty)));
        assert!(monitor.last_successful_result().is_none());
        assert!(matches!(monitor.update_routes_result(), Err(RouteGraphError::NotRunning)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_stop_before_ready_releases_notifier() {
        let monitor = monitor();
        let (tx, rx) = mpsc::unbounded_channel();
        tx.send(added("/p/src/index.ts", INDEX)).unwrap();

        tokio::select! {
            _ = monitor.start_with_events(rx) => panic!("started without a ready event"),
            _ = tokio::time::sleep(Duration::from_millis(10)) => {}
        }
        assert!(lock(&monitor.inner.pump).is_some());

        monitor.stop();
        assert!(!monitor.is_running());
        assert!(lock(&monitor.inner.pump).is_none());
        for _ in 0..10 {
            if tx.is_closed() {
                break;
            }
            tokio::task::yield_now().await;
        }
        assert!(tx.is_closed(), "event pump still owns the receiver");
    }

    #[test]
    fn test_event_json_line() {
        let event = AnalysisEvent::Completed {
            run_id: Uuid::nil(),
            at: DateTime::<Utc>::UNIX_EPOCH,
            payload: AnalysisPayload::Success {
                root_id: None,
                error_count: 2,
            },
        };
        let line = event.to_json_line().unwrap();
        assert!(!line.contains('\n'));

        let value: serde_json::Value = serde_json::from_str(&line).unwrap();
        assert_eq!(value["type"], "completed");
        assert_eq!(value["runId"], Uuid::nil().to_string());
        assert_eq!(value["payload"]["status"], "success");
        assert_eq!(value["payload"]["rootId"], serde_json::Value::Null);
        assert_eq!(value["payload"]["errorCount"], 2);
    }

    #[test]
    fn test_update_requires_running_monitor() {
        let monitor = monitor();
        assert!(!monitor.is_running());
        assert!(matches!(monitor.update_routes_result(), Err(RouteGraphError::NotRunning)));
    }

    #[test]
    fn test_updates_to_unknown_files_are_ignored() {
        let (diagnostics, sink) = Diagnostics::memory();
        let monitor = RoutesMonitor::new("/p", RouteGraphConfig::default(), diagnostics);
        monitor.set_auto_update(false);
        monitor.apply_event(updated("/p/src/ghost.ts", "export {};"));
        assert_eq!(sink.warnings().len(), 1);

        monitor.apply_event(added("/p/src/index.ts", INDEX));
        monitor.apply_event(FileEvent::Removed {
            path: PathBuf::from("/p/src/index.ts"),
        });
        assert_eq!(sink.warnings().len(), 1);
    }
}
