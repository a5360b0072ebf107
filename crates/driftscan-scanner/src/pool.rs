//! Bounded worker pool for namespace scans.

use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures::FutureExt;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, warn};

use crate::aggregate::{NamespaceScanOutcome, ResultAggregator};
use crate::error::ScanError;
use crate::progress::ScanProgress;

/// Scan every namespace with at most `concurrency` scans in flight.
///
/// Each namespace runs as its own task. A failing or panicking scan becomes
/// a failed outcome for that namespace only; the progress counter is bumped
/// once per namespace either way.
pub async fn scan_namespaces<R, F, Fut>(
    namespaces: &[String],
    concurrency: usize,
    progress: &Arc<ScanProgress>,
    scan: F,
) -> ResultAggregator<R>
where
    R: Send + 'static,
    F: Fn(String) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<R, ScanError>> + Send + 'static,
{
    let scan = Arc::new(scan);
    let semaphore = Arc::new(Semaphore::new(concurrency.max(1)));
    let mut tasks: JoinSet<NamespaceScanOutcome<R>> = JoinSet::new();

    for namespace in namespaces {
        let namespace = namespace.clone();
        let scan = Arc::clone(&scan);
        let semaphore = Arc::clone(&semaphore);
        let progress = Arc::clone(progress);

        tasks.spawn(async move {
            let result = match semaphore.acquire().await {
                Ok(_permit) => AssertUnwindSafe(scan(namespace.clone()))
                    .catch_unwind()
                    .await
                    .unwrap_or_else(|_| {
                        Err(ScanError::TaskFailed {
                            namespace: namespace.clone(),
                            message: "namespace scan panicked".to_string(),
                        })
                    }),
                Err(_) => Err(ScanError::TaskFailed {
                    namespace: namespace.clone(),
                    message: "worker pool closed".to_string(),
                }),
            };

            let completed = progress.complete_namespace();
            debug!(
                namespace = %namespace,
                completed,
                total = progress.total(),
                "Namespace finished"
            );
            NamespaceScanOutcome { namespace, result }
        });
    }

    let aggregator = ResultAggregator::new();
    while let Some(joined) = tasks.join_next().await {
        match joined {
            Ok(outcome) => aggregator.record(outcome),
            Err(err) => warn!(error = %err, "Namespace worker aborted"),
        }
    }
    aggregator
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    fn names(n: usize) -> Vec<String> {
        (0..n).map(|i| format!("ns-{i:02}")).collect()
    }

    #[tokio::test]
    async fn respects_concurrency_limit() {
        let in_flight = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));
        let progress = Arc::new(ScanProgress::new());
        progress.begin(12);

        let aggregator = {
            let in_flight = Arc::clone(&in_flight);
            let peak = Arc::clone(&peak);
            scan_namespaces(&names(12), 3, &progress, move |namespace| {
                let in_flight = Arc::clone(&in_flight);
                let peak = Arc::clone(&peak);
                async move {
                    let now = in_flight.fetch_add(1, Ordering::SeqCst) + 1;
                    peak.fetch_max(now, Ordering::SeqCst);
                    tokio::time::sleep(Duration::from_millis(5)).await;
                    in_flight.fetch_sub(1, Ordering::SeqCst);
                    Ok(namespace.len())
                }
            })
            .await
        };

        assert!(peak.load(Ordering::SeqCst) <= 3);
        assert_eq!(aggregator.len(), 12);
        assert_eq!(progress.completed(), 12);
    }

    #[tokio::test]
    async fn failures_and_panics_drop_only_their_namespace() {
        let progress = Arc::new(ScanProgress::new());
        let namespaces = vec!["ok".to_string(), "bad".to_string(), "boom".to_string()];

        let aggregator = scan_namespaces(&namespaces, 2, &progress, |namespace| async move {
            match namespace.as_str() {
                "bad" => Err(ScanError::TaskFailed {
                    namespace: namespace.clone(),
                    message: "conversion failed".to_string(),
                }),
                "boom" => panic!("classifier exploded"),
                _ => Ok(1),
            }
        })
        .await;

        assert_eq!(aggregator.failed(), vec!["bad", "boom"]);
        let results = aggregator.into_results();
        assert_eq!(results.len(), 1);
        assert!(results.contains_key("ok"));
        assert_eq!(progress.completed(), 3);
    }
}
