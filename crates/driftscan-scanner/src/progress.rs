//! Run progress shared with reporters.

use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};

use parking_lot::RwLock;
use serde::Serialize;

/// The phase a scan run is in.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ScanPhase {
    /// No run started yet.
    #[default]
    Idle,
    /// Enumerating resource types.
    DiscoveringTypes,
    /// Namespaces are being scanned.
    Scanning,
    /// Per-namespace outcomes are being collected.
    Aggregating,
    /// The run finished.
    Done,
    /// Resource type discovery failed.
    Failed,
}

impl fmt::Display for ScanPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Idle => "idle",
            Self::DiscoveringTypes => "discovering_types",
            Self::Scanning => "scanning",
            Self::Aggregating => "aggregating",
            Self::Done => "done",
            Self::Failed => "failed",
        };
        f.write_str(s)
    }
}

/// A point-in-time copy of [`ScanProgress`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ProgressSnapshot {
    /// Current phase.
    pub phase: ScanPhase,
    /// Namespaces finished so far.
    pub completed: usize,
    /// Namespaces in this run.
    pub total: usize,
}

/// Progress of a scan run.
///
/// The completed counter only ever grows within a run and is bumped once
/// per finished namespace, whether it succeeded or not.
#[derive(Debug, Default)]
pub struct ScanProgress {
    phase: RwLock<ScanPhase>,
    completed: AtomicUsize,
    total: AtomicUsize,
}

impl ScanProgress {
    /// Create progress in the idle phase.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// The current phase.
    #[must_use]
    pub fn phase(&self) -> ScanPhase {
        *self.phase.read()
    }

    /// Move to `phase`.
    pub fn set_phase(&self, phase: ScanPhase) {
        *self.phase.write() = phase;
    }

    /// Reset the counters for a run over `total` namespaces.
    pub fn begin(&self, total: usize) {
        self.completed.store(0, Ordering::SeqCst);
        self.total.store(total, Ordering::SeqCst);
    }

    /// Record a finished namespace, returning the new count.
    pub fn complete_namespace(&self) -> usize {
        self.completed.fetch_add(1, Ordering::SeqCst) + 1
    }

    /// Namespaces finished so far.
    #[must_use]
    pub fn completed(&self) -> usize {
        self.completed.load(Ordering::SeqCst)
    }

    /// Namespaces in the current run.
    #[must_use]
    pub fn total(&self) -> usize {
        self.total.load(Ordering::SeqCst)
    }

    /// Copy the current state.
    #[must_use]
    pub fn snapshot(&self) -> ProgressSnapshot {
        ProgressSnapshot {
            phase: self.phase(),
            completed: self.completed(),
            total: self.total(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counts_completed_namespaces() {
        let progress = ScanProgress::new();
        assert_eq!(progress.phase(), ScanPhase::Idle);

        progress.begin(3);
        progress.set_phase(ScanPhase::Scanning);
        assert_eq!(progress.complete_namespace(), 1);
        assert_eq!(progress.complete_namespace(), 2);

        let snapshot = progress.snapshot();
        assert_eq!(snapshot.phase, ScanPhase::Scanning);
        assert_eq!(snapshot.completed, 2);
        assert_eq!(snapshot.total, 3);
    }

    #[test]
    fn begin_resets_the_counter() {
        let progress = ScanProgress::new();
        progress.begin(2);
        progress.complete_namespace();
        progress.begin(4);
        assert_eq!(progress.completed(), 0);
        assert_eq!(progress.total(), 4);
    }
}
