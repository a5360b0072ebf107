//! Collection of per-namespace outcomes into the final result map.

use std::collections::BTreeMap;

use parking_lot::Mutex;
use tracing::warn;

use crate::error::ScanError;

/// The outcome of scanning one namespace.
#[derive(Debug)]
pub struct NamespaceScanOutcome<R> {
    /// The namespace that was scanned.
    pub namespace: String,
    /// Its result, or the error that dropped it.
    pub result: Result<R, ScanError>,
}

impl<R> NamespaceScanOutcome<R> {
    /// A successful outcome.
    pub fn success(namespace: impl Into<String>, result: R) -> Self {
        Self {
            namespace: namespace.into(),
            result: Ok(result),
        }
    }

    /// A failed outcome.
    pub fn failure(namespace: impl Into<String>, error: ScanError) -> Self {
        Self {
            namespace: namespace.into(),
            result: Err(error),
        }
    }
}

/// Collects namespace outcomes from concurrent workers.
///
/// Failed namespaces are logged and left out of the result map.
#[derive(Debug)]
pub struct ResultAggregator<R> {
    results: Mutex<BTreeMap<String, R>>,
    failed: Mutex<Vec<String>>,
}

impl<R> Default for ResultAggregator<R> {
    fn default() -> Self {
        Self {
            results: Mutex::new(BTreeMap::new()),
            failed: Mutex::new(Vec::new()),
        }
    }
}

impl<R> ResultAggregator<R> {
    /// Create an empty aggregator.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Record one outcome.
    pub fn record(&self, outcome: NamespaceScanOutcome<R>) {
        match outcome.result {
            Ok(result) => {
                self.results.lock().insert(outcome.namespace, result);
            }
            Err(err) => {
                warn!(namespace = %outcome.namespace, error = %err, "Dropping namespace from results");
                self.failed.lock().push(outcome.namespace);
            }
        }
    }

    /// Namespaces dropped so far, sorted.
    #[must_use]
    pub fn failed(&self) -> Vec<String> {
        let mut failed = self.failed.lock().clone();
        failed.sort();
        failed
    }

    /// Number of namespaces with a result.
    #[must_use]
    pub fn len(&self) -> usize {
        self.results.lock().len()
    }

    /// Check if no namespace produced a result.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.results.lock().is_empty()
    }

    /// Take the result map, keyed and ordered by namespace.
    #[must_use]
    pub fn into_results(self) -> BTreeMap<String, R> {
        self.results.into_inner()
    }
}
