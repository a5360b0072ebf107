//! Single-cluster GitOps coverage audit.

use std::collections::BTreeMap;
use std::sync::Arc;

use driftscan_analyzer::{Analyzer, ResourceConverter};
use driftscan_client::{ClusterClient, ResourceScope};
use driftscan_core::{AnalysisResult, ClassificationRules, ClusterInfo, PerformanceConfig};
use tracing::{debug, info, warn};

use crate::error::{Result, ScanError};
use crate::fetch::{fetch_namespace, BatchPlan};
use crate::pool::scan_namespaces;
use crate::progress::{ScanPhase, ScanProgress};
use crate::sizing::{calculate_batch_size, optimize_concurrency, ConcurrencyLimits};

/// Audits which root resources of each namespace are GitOps-managed.
pub struct AuditScanner<C> {
    client: Arc<C>,
    analyzer: Analyzer,
    converter: ResourceConverter,
    performance: PerformanceConfig,
    limits: ConcurrencyLimits,
    progress: Arc<ScanProgress>,
}

impl<C: ClusterClient + 'static> AuditScanner<C> {
    /// Create a scanner over `client`.
    #[must_use]
    pub fn new(
        client: Arc<C>,
        rules: Arc<ClassificationRules>,
        performance: PerformanceConfig,
    ) -> Self {
        Self {
            client,
            analyzer: Analyzer::new(rules),
            converter: ResourceConverter::new(false),
            performance,
            limits: ConcurrencyLimits::AUDIT,
            progress: Arc::new(ScanProgress::new()),
        }
    }

    /// Override the concurrency caps.
    #[must_use]
    pub fn with_limits(mut self, limits: ConcurrencyLimits) -> Self {
        self.limits = limits;
        self
    }

    /// Shared progress of the current run.
    #[must_use]
    pub fn progress(&self) -> Arc<ScanProgress> {
        Arc::clone(&self.progress)
    }

    /// The cluster being audited.
    #[must_use]
    pub fn current_context(&self) -> ClusterInfo {
        self.client.current_context()
    }

    /// All namespaces except those excluded as a whole, sorted.
    ///
    /// # Errors
    ///
    /// Returns `ScanError::NamespaceListing` if the cluster cannot list
    /// namespaces.
    pub async fn list_namespaces(&self) -> Result<Vec<String>> {
        let rules = self.analyzer.rules();
        let mut namespaces: Vec<String> = self
            .client
            .list_namespaces()
            .await
            .map_err(|source| ScanError::NamespaceListing {
                cluster: self.current_context().to_string(),
                source,
            })?
            .into_iter()
            .filter(|ns| {
                let excluded = rules.whole_namespace_excluded(ns);
                if excluded {
                    debug!(namespace = %ns, "Namespace excluded by rule");
                }
                !excluded
            })
            .collect();
        namespaces.sort();
        Ok(namespaces)
    }

    /// Keep the namespaces in `names` that exist, in input order.
    ///
    /// # Errors
    ///
    /// Returns `ScanError::NoValidNamespaces` if none exist, or
    /// `ScanError::NamespaceValidation` if existence cannot be checked.
    pub async fn validate_namespaces(&self, names: &[String]) -> Result<Vec<String>> {
        let existing = self
            .client
            .validate_namespaces(names)
            .await
            .map_err(ScanError::NamespaceValidation)?;

        let valid: Vec<String> = names
            .iter()
            .filter(|name| {
                let found = existing.get(*name).copied().unwrap_or(false);
                if !found {
                    warn!(namespace = %name, "Namespace not found, skipping");
                }
                found
            })
            .cloned()
            .collect();

        if valid.is_empty() {
            return Err(ScanError::NoValidNamespaces);
        }
        info!(count = valid.len(), "Namespaces validated");
        Ok(valid)
    }

    /// Audit every namespace in `namespaces`.
    ///
    /// Namespaces whose scan fails are left out of the map.
    ///
    /// # Errors
    ///
    /// Returns `ScanError::ResourceDiscovery` if resource types cannot be
    /// enumerated. No partial results are returned in that case.
    pub async fn analyze_namespaces(
        &self,
        namespaces: &[String],
    ) -> Result<BTreeMap<String, AnalysisResult>> {
        self.progress.set_phase(ScanPhase::DiscoveringTypes);
        let types = match self.client.resource_types(ResourceScope::Namespaced).await {
            Ok(types) => types,
            Err(err) => {
                self.progress.set_phase(ScanPhase::Failed);
                return Err(ScanError::ResourceDiscovery(err));
            }
        };

        let concurrency = optimize_concurrency(
            namespaces.len(),
            self.performance.max_concurrent,
            &self.limits,
        );
        let plan = BatchPlan {
            batch_size: calculate_batch_size(types.len(), self.performance.batch_size),
            concurrency: self.performance.namespace_batch_concurrency,
        };
        info!(
            namespaces = namespaces.len(),
            resource_types = types.len(),
            concurrency,
            batch_size = plan.batch_size,
            "Starting audit"
        );

        self.progress.begin(namespaces.len());
        self.progress.set_phase(ScanPhase::Scanning);

        let client = Arc::clone(&self.client);
        let analyzer = self.analyzer.clone();
        let converter = self.converter;
        let types = Arc::new(types);

        let aggregator = scan_namespaces(namespaces, concurrency, &self.progress, move |namespace| {
            let client = Arc::clone(&client);
            let analyzer = analyzer.clone();
            let types = Arc::clone(&types);
            async move {
                let raw = fetch_namespace(client.as_ref(), &namespace, &types, plan).await;
                let resources = converter.convert_all(&raw, &namespace);
                let result = analyzer.analyze(&resources);
                debug!(
                    namespace = %namespace,
                    total = result.total_resources,
                    managed = result.managed_count,
                    manual = result.manual_count,
                    "Namespace analyzed"
                );
                Ok(result)
            }
        })
        .await;

        self.progress.set_phase(ScanPhase::Aggregating);
        let results = aggregator.into_results();
        info!(namespaces = results.len(), "Audit complete");
        self.progress.set_phase(ScanPhase::Done);
        Ok(results)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use driftscan_client::{ApiResourceInfo, MockTransport, ResourceClient, TransportError};
    use driftscan_core::{ExclusionRule, RawObject, ResourceTypeSettings, RetryConfig};
    use serde_json::{json, Value};

    fn deployment(namespace: &str, name: &str, labels: Value) -> RawObject {
        RawObject::from_value(json!({
            "apiVersion": "apps/v1",
            "kind": "Deployment",
            "metadata": {
                "name": name,
                "namespace": namespace,
                "uid": format!("{namespace}-{name}"),
                "labels": labels
            }
        }))
        .unwrap()
    }

    fn pod(namespace: &str, name: &str) -> RawObject {
        RawObject::from_value(json!({
            "apiVersion": "v1",
            "kind": "Pod",
            "metadata": {
                "name": name,
                "namespace": namespace,
                "uid": format!("{namespace}-{name}"),
                "ownerReferences": [{"apiVersion": "apps/v1", "kind": "ReplicaSet", "name": "rs", "uid": "rs-1"}]
            }
        }))
        .unwrap()
    }

    fn managed() -> Value {
        json!({"argocd.argoproj.io/instance": "shop"})
    }

    fn transport() -> MockTransport {
        let mock = MockTransport::with_context(ClusterInfo::new("prod", "prod-cluster"));
        mock.add_namespace("gitops");
        mock.add_namespace("legacy");
        mock.add_namespace("kube-system");
        mock.add_resource(ApiResourceInfo::namespaced("deployments", "apps", "v1", "Deployment"));
        mock.add_resource(ApiResourceInfo::namespaced("pods", "", "v1", "Pod"));

        mock.add_object("gitops", "deployments.apps", deployment("gitops", "api", managed()));
        mock.add_object("gitops", "deployments.apps", deployment("gitops", "web", managed()));
        mock.add_object("gitops", "pods", pod("gitops", "api-1"));

        for name in ["a", "b", "c"] {
            mock.add_object("legacy", "deployments.apps", deployment("legacy", name, json!({})));
        }
        for name in ["d", "e"] {
            mock.add_object("legacy", "deployments.apps", deployment("legacy", name, managed()));
        }
        mock.add_object("legacy", "pods", pod("legacy", "a-1"));
        mock
    }

    fn scanner(mock: MockTransport) -> AuditScanner<ResourceClient<MockTransport>> {
        let client = ResourceClient::new(mock, ResourceTypeSettings::default(), RetryConfig::default());
        let rules = ClassificationRules::with_exclusions(vec![ExclusionRule::new("kube-system", "*", "*")]);
        AuditScanner::new(Arc::new(client), Arc::new(rules), PerformanceConfig::default())
    }

    #[tokio::test]
    async fn audits_managed_and_manual_namespaces() {
        let scanner = scanner(transport());
        let namespaces = vec!["gitops".to_string(), "legacy".to_string()];

        let results = scanner.analyze_namespaces(&namespaces).await.unwrap();
        assert_eq!(results.len(), 2);

        let gitops = &results["gitops"];
        assert_eq!(gitops.manual_count, 0);
        assert_eq!(gitops.managed_count, 2);
        assert!(gitops.is_fully_managed());

        let legacy = &results["legacy"];
        assert_eq!(legacy.manual_count, 3);
        assert_eq!(legacy.managed_count, 2);
        assert_eq!(legacy.total_resources, 6);
        assert_eq!(legacy.root_resources, 5);

        let progress = scanner.progress().snapshot();
        assert_eq!(progress.phase, ScanPhase::Done);
        assert_eq!(progress.completed, 2);
    }

    #[tokio::test]
    async fn discovery_failure_aborts_the_run() {
        let mock = transport();
        mock.fail_discovery(TransportError::Connection("refused".to_string()));
        let scanner = scanner(mock);

        let err = scanner
            .analyze_namespaces(&["gitops".to_string()])
            .await
            .unwrap_err();
        assert!(matches!(err, ScanError::ResourceDiscovery(_)));
        assert_eq!(scanner.progress().phase(), ScanPhase::Failed);
    }

    #[tokio::test]
    async fn permanent_type_failures_do_not_drop_the_namespace() {
        let mock = transport();
        mock.fail_next(
            "legacy",
            "pods",
            TransportError::Api {
                code: 403,
                message: "forbidden".to_string(),
            },
        );
        let scanner = scanner(mock);

        let results = scanner.analyze_namespaces(&["legacy".to_string()]).await.unwrap();
        assert_eq!(results["legacy"].manual_count, 3);
        assert_eq!(results["legacy"].total_resources, 5);
    }

    #[tokio::test]
    async fn whole_namespace_exclusions_are_not_listed() {
        let scanner = scanner(transport());
        let namespaces = scanner.list_namespaces().await.unwrap();
        assert_eq!(namespaces, vec!["gitops", "legacy"]);
        assert_eq!(scanner.current_context().to_string(), "prod (prod-cluster)");
    }

    #[tokio::test]
    async fn namespace_listing_failure_names_the_cluster() {
        let mock = transport();
        mock.fail_namespaces(TransportError::Other("unauthorized".to_string()));
        let scanner = scanner(mock);

        match scanner.list_namespaces().await.unwrap_err() {
            ScanError::NamespaceListing { cluster, .. } => assert_eq!(cluster, "prod (prod-cluster)"),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn validation_keeps_existing_namespaces_in_order() {
        let scanner = scanner(transport());
        let requested = vec!["legacy".to_string(), "ghost".to_string(), "gitops".to_string()];

        let valid = scanner.validate_namespaces(&requested).await.unwrap();
        assert_eq!(valid, vec!["legacy", "gitops"]);

        let err = scanner
            .validate_namespaces(&["ghost".to_string()])
            .await
            .unwrap_err();
        assert!(matches!(err, ScanError::NoValidNamespaces));
    }
}
