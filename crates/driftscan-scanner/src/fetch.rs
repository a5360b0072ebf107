//! Per-namespace resource collection.

use driftscan_client::ClusterClient;
use driftscan_core::RawObject;
use futures::stream::{self, StreamExt};
use parking_lot::Mutex;
use tracing::{debug, warn};

/// How one namespace's resource types are split and fetched.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BatchPlan {
    /// Resource types per batch.
    pub batch_size: usize,
    /// Batches fetched in parallel.
    pub concurrency: usize,
}

/// Fetch every object of `types` in `namespace`.
///
/// Types are split into batches that run `plan.concurrency` at a time. A
/// failed batch contributes nothing; the rest still count.
pub async fn fetch_namespace<C>(
    client: &C,
    namespace: &str,
    types: &[String],
    plan: BatchPlan,
) -> Vec<RawObject>
where
    C: ClusterClient + ?Sized,
{
    let collected = Mutex::new(Vec::new());

    stream::iter(types.chunks(plan.batch_size.max(1)))
        .for_each_concurrent(plan.concurrency.max(1), |batch| {
            let collected = &collected;
            async move {
                match client.fetch_resources_batch(batch, namespace).await {
                    Ok(items) => {
                        debug!(namespace = %namespace, types = batch.len(), objects = items.len(), "Batch fetched");
                        collected.lock().extend(items);
                    }
                    Err(err) => {
                        warn!(namespace = %namespace, types = batch.len(), error = %err, "Batch failed, skipping");
                    }
                }
            }
        })
        .await;

    collected.into_inner()
}

#[cfg(test)]
mod tests {
    use super::*;
    use driftscan_client::{ApiResourceInfo, MockTransport, ResourceClient, TransportError};
    use driftscan_core::{ResourceTypeSettings, RetryConfig};
    use serde_json::json;

    fn object(name: &str, uid: &str) -> RawObject {
        RawObject::from_value(json!({
            "apiVersion": "v1",
            "kind": "ConfigMap",
            "metadata": {"name": name, "namespace": "shop", "uid": uid}
        }))
        .unwrap()
    }

    fn types() -> Vec<String> {
        (0..7).map(|i| format!("kind{i}")).collect()
    }

    fn client(mock: MockTransport) -> ResourceClient<MockTransport> {
        for name in types() {
            mock.add_resource(ApiResourceInfo::namespaced(&name, "", "v1", "Thing"));
        }
        ResourceClient::new(mock, ResourceTypeSettings::default(), RetryConfig::default())
    }

    #[tokio::test]
    async fn collects_all_batches() {
        let mock = MockTransport::new();
        for (i, name) in types().iter().enumerate() {
            mock.add_object("shop", name, object(&format!("obj-{i}"), &format!("uid-{i}")));
        }
        let client = client(mock);

        let plan = BatchPlan {
            batch_size: 3,
            concurrency: 2,
        };
        let objects = fetch_namespace(&client, "shop", &types(), plan).await;
        assert_eq!(objects.len(), 7);
    }

    #[tokio::test]
    async fn failed_batches_are_skipped() {
        let mock = MockTransport::new();
        mock.add_object("shop", "kind0", object("a", "1"));
        mock.fail_discovery(TransportError::Other("discovery down".to_string()));
        let client = client(mock);

        let plan = BatchPlan {
            batch_size: 10,
            concurrency: 2,
        };
        let objects = fetch_namespace(&client, "shop", &types(), plan).await;
        assert!(objects.is_empty());
    }
}
