//! Session state machine and sample accumulator.
//!
//! One [`SessionCoordinator`] exists per process. It owns the session state
//! and the accumulator behind a single mutex; every operation holds that lock
//! for a constant-time read or write and never across I/O or the window wait.
//!
//! ```text
//! Idle --open_window--> Collecting --window expiry--> Idle
//!          (clears)            |
//!                              +-- open_window -> Err(SessionBusy), no effect
//! ```

use serde::Serialize;
use serde_json::Value;
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::window::{self, PendingSnapshot};

/// Whether a collection window is open.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionState {
    Idle,
    Collecting,
}

impl SessionState {
    pub fn as_str(&self) -> &'static str {
        match self {
            SessionState::Idle => "idle",
            SessionState::Collecting => "collecting",
        }
    }
}

/// Returned by [`SessionCoordinator::open_window`] while a window is open.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("a collection window is already open")]
pub struct SessionBusy;

/// What happened to an ingested sample.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IngestOutcome {
    Stored,
    /// No window open; the sample is gone.
    Dropped,
}

/// Immutable copy of the accumulator taken when a window closes.
///
/// Keys iterate in ascending instrument order, so serialization is
/// deterministic.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct Snapshot {
    entries: BTreeMap<String, Value>,
}

impl Snapshot {
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, instrument: &str) -> Option<&Value> {
        self.entries.get(instrument)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.entries.iter()
    }

    /// Pretty-printed JSON object, keys sorted.
    pub fn to_pretty_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(&self.entries)
    }
}

impl FromIterator<(String, Value)> for Snapshot {
    fn from_iter<I: IntoIterator<Item = (String, Value)>>(iter: I) -> Self {
        Self {
            entries: iter.into_iter().collect(),
        }
    }
}

/// Lifetime counters, kept outside the session lock.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SessionStats {
    pub windows_completed: u64,
    pub samples_stored: u64,
    pub samples_dropped: u64,
    pub busy_rejections: u64,
}

#[derive(Debug, Default)]
struct Counters {
    windows_completed: AtomicU64,
    samples_stored: AtomicU64,
    samples_dropped: AtomicU64,
    busy_rejections: AtomicU64,
}

#[derive(Debug)]
struct Session {
    state: SessionState,
    accumulator: HashMap<String, Value>,
}

/// Owner of the single process-wide session.
///
/// Sessions can only be opened together with their window timer:
///
/// ```compile_fail
/// use gather::SessionCoordinator;
/// use std::time::Duration;
///
/// let coordinator = SessionCoordinator::new(Duration::from_secs(4));
/// coordinator.start_session().unwrap();
/// ```
#[derive(Debug)]
pub struct SessionCoordinator {
    session: Mutex<Session>,
    window: Duration,
    counters: Counters,
}

impl SessionCoordinator {
    /// Create a coordinator in `Idle` whose windows last `window`.
    pub fn new(window: Duration) -> Self {
        Self {
            session: Mutex::new(Session {
                state: SessionState::Idle,
                accumulator: HashMap::new(),
            }),
            window,
            counters: Counters::default(),
        }
    }

    pub fn window(&self) -> Duration {
        self.window
    }

    // Every critical section leaves the session consistent, so a panic
    // elsewhere while holding the guard cannot corrupt it.
    fn lock(&self) -> MutexGuard<'_, Session> {
        self.session.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Move `Idle -> Collecting`, clearing the accumulator in the same
    /// critical section.
    ///
    /// Does not arm the window timer, so it stays crate-private: outside
    /// callers go through [`open_window`](Self::open_window), which does.
    pub(crate) fn start_session(&self) -> Result<(), SessionBusy> {
        let mut session = self.lock();
        if session.state == SessionState::Collecting {
            drop(session);
            self.counters.busy_rejections.fetch_add(1, Ordering::Relaxed);
            warn!("Snapshot requested while a window is already open");
            return Err(SessionBusy);
        }
        session.accumulator.clear();
        session.state = SessionState::Collecting;
        Ok(())
    }

    /// Start a session and arm its window timer.
    ///
    /// The returned handle resolves to the snapshot once the window closes.
    /// Dropping it does not cancel the window.
    pub fn open_window(self: &Arc<Self>) -> Result<PendingSnapshot, SessionBusy> {
        self.start_session()?;
        info!(window_ms = self.window.as_millis() as u64, "Collection window opened");
        Ok(window::arm(Arc::clone(self), self.window))
    }

    /// Record the latest payload for `instrument`. Last write wins.
    ///
    /// Outside a window the sample is discarded without error.
    pub fn ingest(&self, instrument: &str, payload: Value) -> IngestOutcome {
        let mut session = self.lock();
        if session.state != SessionState::Collecting {
            drop(session);
            self.counters.samples_dropped.fetch_add(1, Ordering::Relaxed);
            debug!(instrument, "Dropped sample outside collection window");
            return IngestOutcome::Dropped;
        }
        session.accumulator.insert(instrument.to_string(), payload);
        drop(session);

        self.counters.samples_stored.fetch_add(1, Ordering::Relaxed);
        debug!(instrument, "Stored sample");
        IngestOutcome::Stored
    }

    /// Move `Collecting -> Idle` and hand back what was collected.
    ///
    /// Only the window timer calls this, exactly once per successful start.
    pub(crate) fn end_session(&self) -> Snapshot {
        let mut session = self.lock();
        debug_assert_eq!(
            session.state,
            SessionState::Collecting,
            "end_session without an open window"
        );
        let snapshot: Snapshot = std::mem::take(&mut session.accumulator).into_iter().collect();
        session.state = SessionState::Idle;
        drop(session);

        self.counters.windows_completed.fetch_add(1, Ordering::Relaxed);
        info!(instruments = snapshot.len(), "Collection window closed");
        snapshot
    }

    pub fn status(&self) -> SessionState {
        self.lock().state
    }

    /// Number of instruments reported in the open window (0 when idle).
    pub fn instrument_count(&self) -> usize {
        self.lock().accumulator.len()
    }

    pub fn stats(&self) -> SessionStats {
        SessionStats {
            windows_completed: self.counters.windows_completed.load(Ordering::Relaxed),
            samples_stored: self.counters.samples_stored.load(Ordering::Relaxed),
            samples_dropped: self.counters.samples_dropped.load(Ordering::Relaxed),
            busy_rejections: self.counters.busy_rejections.load(Ordering::Relaxed),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn coordinator() -> SessionCoordinator {
        SessionCoordinator::new(Duration::from_millis(50))
    }

    #[test]
    fn test_starts_idle() {
        let c = coordinator();
        assert_eq!(c.status(), SessionState::Idle);
        assert_eq!(c.instrument_count(), 0);
    }

    #[test]
    fn test_last_write_wins_within_window() {
        let c = coordinator();
        c.start_session().unwrap();
        assert_eq!(c.ingest("A", json!({"v": 1})), IngestOutcome::Stored);
        c.ingest("B", json!({"v": 2}));
        c.ingest("A", json!({"v": 3}));

        let snapshot = c.end_session();
        assert_eq!(snapshot.len(), 2);
        assert_eq!(snapshot.get("A"), Some(&json!({"v": 3})));
        assert_eq!(snapshot.get("B"), Some(&json!({"v": 2})));
        assert_eq!(c.status(), SessionState::Idle);
    }

    #[test]
    fn test_idle_ingest_is_dropped() {
        let c = coordinator();
        assert_eq!(c.ingest("early", json!(1)), IngestOutcome::Dropped);

        c.start_session().unwrap();
        c.ingest("inside", json!(2));
        let snapshot = c.end_session();
        assert!(snapshot.get("early").is_none());

        assert_eq!(c.ingest("late", json!(3)), IngestOutcome::Dropped);
        c.start_session().unwrap();
        assert!(c.end_session().is_empty());
        assert_eq!(c.stats().samples_dropped, 2);
    }

    #[test]
    fn test_start_while_collecting_is_busy_and_keeps_data() {
        let c = coordinator();
        c.start_session().unwrap();
        c.ingest("A", json!("kept"));

        assert_eq!(c.start_session(), Err(SessionBusy));
        assert_eq!(c.status(), SessionState::Collecting);

        let snapshot = c.end_session();
        assert_eq!(snapshot.get("A"), Some(&json!("kept")));
        assert_eq!(c.stats().busy_rejections, 1);
    }

    #[test]
    fn test_status_tracks_window() {
        let c = coordinator();
        c.start_session().unwrap();
        assert_eq!(c.status(), SessionState::Collecting);
        c.end_session();
        assert_eq!(c.status(), SessionState::Idle);
        assert_eq!(c.stats().windows_completed, 1);
    }

    #[test]
    fn test_snapshot_is_independent_of_later_windows() {
        let c = coordinator();
        c.start_session().unwrap();
        c.ingest("A", json!(1));
        let first = c.end_session();

        c.start_session().unwrap();
        c.ingest("A", json!(2));
        c.ingest("B", json!(3));
        let second = c.end_session();

        assert_eq!(first.len(), 1);
        assert_eq!(first.get("A"), Some(&json!(1)));
        assert_eq!(second.get("A"), Some(&json!(2)));
    }

    #[test]
    fn test_snapshot_json_is_sorted() {
        let snapshot: Snapshot = [
            ("zeta".to_string(), json!(1)),
            ("alpha".to_string(), json!({"b": 2, "a": 1})),
            ("Mid".to_string(), json!(null)),
        ]
        .into_iter()
        .collect();

        let text = snapshot.to_pretty_json().unwrap();
        let mid = text.find("\"Mid\"").unwrap();
        let alpha = text.find("\"alpha\"").unwrap();
        let zeta = text.find("\"zeta\"").unwrap();
        assert!(mid < alpha && alpha < zeta);
        assert!(text.starts_with("{\n  \""));
    }

    #[test]
    fn test_concurrent_ingest_keeps_one_entry_per_instrument() {
        let c = Arc::new(coordinator());
        c.start_session().unwrap();

        let handles: Vec<_> = (0..8)
            .map(|t| {
                let c = Arc::clone(&c);
                std::thread::spawn(move || {
                    for i in 0..100 {
                        c.ingest(&format!("inst-{}", i % 10), json!({"thread": t, "i": i}));
                    }
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }

        let snapshot = c.end_session();
        assert_eq!(snapshot.len(), 10);
        assert_eq!(c.stats().samples_stored, 800);
    }
}
