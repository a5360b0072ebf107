//! Dual-cluster drift comparison.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use driftscan_analyzer::{Differ, ResourceConverter};
use driftscan_client::{ClusterClient, ResourceScope};
use driftscan_core::{
    ClassificationRules, ClusterInfo, ComparisonResult, ComparisonSettings, PerformanceConfig,
};
use tracing::{debug, error, info, warn};

use crate::error::{Result, ScanError};
use crate::fetch::{fetch_namespace, BatchPlan};
use crate::pool::scan_namespaces;
use crate::progress::{ScanPhase, ScanProgress};
use crate::sizing::{calculate_batch_size, optimize_concurrency, ConcurrencyLimits};

/// Compares the resources of two clusters namespace by namespace.
///
/// Resource types are discovered on the source cluster and fetched from
/// both. The target must be able to run discovery too, otherwise every
/// source object would show up as missing from it.
pub struct DriftScanner<C> {
    source: Arc<C>,
    target: Arc<C>,
    rules: Arc<ClassificationRules>,
    differ: Differ,
    converter: ResourceConverter,
    performance: PerformanceConfig,
    limits: ConcurrencyLimits,
    progress: Arc<ScanProgress>,
}

impl<C: ClusterClient + 'static> DriftScanner<C> {
    /// Create a scanner comparing `source` against `target`.
    #[must_use]
    pub fn new(
        source: Arc<C>,
        target: Arc<C>,
        rules: Arc<ClassificationRules>,
        comparison: ComparisonSettings,
        performance: PerformanceConfig,
    ) -> Self {
        Self {
            source,
            target,
            differ: Differ::new(Arc::clone(&rules), comparison),
            rules,
            converter: ResourceConverter::new(comparison.compare_resource_contents),
            performance,
            limits: ConcurrencyLimits::DRIFT,
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

    /// The source and target cluster identities.
    #[must_use]
    pub fn cluster_info(&self) -> (ClusterInfo, ClusterInfo) {
        (self.source.current_context(), self.target.current_context())
    }

    async fn namespaces_of(client: &C) -> Result<Vec<String>> {
        client
            .list_namespaces()
            .await
            .map_err(|source| ScanError::NamespaceListing {
                cluster: client.current_context().to_string(),
                source,
            })
    }

    /// The sorted union of both clusters' namespaces, minus whole-namespace
    /// exclusions.
    ///
    /// # Errors
    ///
    /// Returns `ScanError::NamespaceListing` if either cluster cannot list
    /// namespaces.
    pub async fn list_namespaces(&self) -> Result<Vec<String>> {
        let (source, target) = tokio::join!(
            Self::namespaces_of(&self.source),
            Self::namespaces_of(&self.target)
        );

        let union: BTreeSet<String> = source?.into_iter().chain(target?).collect();
        Ok(union
            .into_iter()
            .filter(|ns| !self.rules.whole_namespace_excluded(ns))
            .collect())
    }

    /// Keep the namespaces in `names` that exist in at least one cluster, in
    /// input order.
    ///
    /// # Errors
    ///
    /// Returns `ScanError::NoValidNamespaces` if none exist anywhere, or
    /// `ScanError::NamespaceValidation` if existence cannot be checked.
    pub async fn validate_namespaces(&self, names: &[String]) -> Result<Vec<String>> {
        let (source, target) = tokio::join!(
            self.source.validate_namespaces(names),
            self.target.validate_namespaces(names)
        );
        let source = source.map_err(ScanError::NamespaceValidation)?;
        let target = target.map_err(ScanError::NamespaceValidation)?;

        let mut valid = Vec::new();
        for name in names {
            let in_source = source.get(name).copied().unwrap_or(false);
            let in_target = target.get(name).copied().unwrap_or(false);
            match (in_source, in_target) {
                (true, true) => valid.push(name.clone()),
                (true, false) => {
                    warn!(namespace = %name, "Namespace only exists in source cluster");
                    valid.push(name.clone());
                }
                (false, true) => {
                    warn!(namespace = %name, "Namespace only exists in target cluster");
                    valid.push(name.clone());
                }
                (false, false) => {
                    warn!(namespace = %name, "Namespace exists in neither cluster, skipping");
                }
            }
        }

        if valid.is_empty() {
            return Err(ScanError::NoValidNamespaces);
        }
        info!(count = valid.len(), "Namespaces validated");
        Ok(valid)
    }

    /// Compare every namespace in `namespaces`.
    ///
    /// Namespaces whose scan fails are left out of the map.
    ///
    /// # Errors
    ///
    /// Returns `ScanError::ResourceDiscovery` if either cluster cannot
    /// enumerate resource types.
    pub async fn compare_namespaces(
        &self,
        namespaces: &[String],
    ) -> Result<BTreeMap<String, ComparisonResult>> {
        self.progress.set_phase(ScanPhase::DiscoveringTypes);
        let (source_types, target_types) = tokio::join!(
            self.source.resource_types(ResourceScope::Namespaced),
            self.target.resource_types(ResourceScope::Namespaced)
        );
        let types = match source_types.and_then(|types| target_types.map(|_| types)) {
            Ok(types) => types,
            Err(err) => {
                let (source, target) = self.cluster_info();
                error!(
                    source = %source,
                    target = %target,
                    error = %err,
                    "Resource discovery failed"
                );
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
            "Starting comparison"
        );

        self.progress.begin(namespaces.len());
        self.progress.set_phase(ScanPhase::Scanning);

        let source = Arc::clone(&self.source);
        let target = Arc::clone(&self.target);
        let differ = self.differ.clone();
        let converter = self.converter;
        let types = Arc::new(types);

        let aggregator = scan_namespaces(namespaces, concurrency, &self.progress, move |namespace| {
            let source = Arc::clone(&source);
            let target = Arc::clone(&target);
            let differ = differ.clone();
            let types = Arc::clone(&types);
            async move {
                let (source_raw, target_raw) = tokio::join!(
                    fetch_namespace(source.as_ref(), &namespace, &types, plan),
                    fetch_namespace(target.as_ref(), &namespace, &types, plan)
                );
                let source_resources = converter.convert_all(&source_raw, &namespace);
                let target_resources = converter.convert_all(&target_raw, &namespace);
                let result = differ.compare(&source_resources, &target_resources);
                debug!(
                    namespace = %namespace,
                    only_in_source = result.only_in_source.len(),
                    only_in_target = result.only_in_target.len(),
                    modified = result.modified.len(),
                    "Namespace compared"
                );
                Ok(result)
            }
        })
        .await;

        self.progress.set_phase(ScanPhase::Aggregating);
        let results = aggregator.into_results();
        info!(namespaces = results.len(), "Comparison complete");
        self.progress.set_phase(ScanPhase::Done);
        Ok(results)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use driftscan_client::{ApiResourceInfo, MockTransport, ResourceClient, TransportError};
    use driftscan_core::{ExclusionRule, RawObject, ResourceTypeSettings, RetryConfig};
    use serde_json::json;

    fn config_map(namespace: &str, name: &str, data: &str) -> RawObject {
        RawObject::from_value(json!({
            "apiVersion": "v1",
            "kind": "ConfigMap",
            "metadata": {
                "name": name,
                "namespace": namespace,
                "uid": format!("{}-{namespace}-{name}", data.len()),
                "resourceVersion": data.len().to_string()
            },
            "data": {"value": data}
        }))
        .unwrap()
    }

    fn cluster(context: &str, namespaces: &[&str]) -> MockTransport {
        let mock = MockTransport::with_context(ClusterInfo::new(context, format!("{context}-cluster")));
        for ns in namespaces {
            mock.add_namespace(ns);
        }
        mock.add_resource(ApiResourceInfo::namespaced("configmaps", "", "v1", "ConfigMap"));
        mock
    }

    fn scanner(
        source: MockTransport,
        target: MockTransport,
        comparison: ComparisonSettings,
    ) -> DriftScanner<ResourceClient<MockTransport>> {
        let client =
            |mock| ResourceClient::new(mock, ResourceTypeSettings::default(), RetryConfig::default());
        let rules = ClassificationRules::with_exclusions(vec![ExclusionRule::new("kube-system", "*", "*")]);
        DriftScanner::new(
            Arc::new(client(source)),
            Arc::new(client(target)),
            Arc::new(rules),
            comparison,
            PerformanceConfig::default(),
        )
    }

    #[tokio::test]
    async fn reports_presence_differences() {
        let source = cluster("staging", &["shop"]);
        source.add_object("shop", "configmaps", config_map("shop", "shared", "a"));
        source.add_object("shop", "configmaps", config_map("shop", "old", "a"));
        let target = cluster("prod", &["shop"]);
        target.add_object("shop", "configmaps", config_map("shop", "shared", "a"));
        target.add_object("shop", "configmaps", config_map("shop", "new", "a"));

        let scanner = scanner(source, target, ComparisonSettings::default());
        let results = scanner.compare_namespaces(&["shop".to_string()]).await.unwrap();

        let shop = &results["shop"];
        assert_eq!(shop.total_source, 2);
        assert_eq!(shop.total_target, 2);
        assert_eq!(shop.only_in_source.len(), 1);
        assert_eq!(shop.only_in_source[0].name(), "old");
        assert_eq!(shop.only_in_target.len(), 1);
        assert_eq!(shop.only_in_target[0].name(), "new");
        assert!(shop.modified.is_empty());
        assert_eq!(scanner.progress().snapshot().completed, 1);
    }

    #[tokio::test]
    async fn content_changes_need_content_comparison() {
        let build = || {
            let source = cluster("staging", &["shop"]);
            source.add_object("shop", "configmaps", config_map("shop", "settings", "one"));
            let target = cluster("prod", &["shop"]);
            target.add_object("shop", "configmaps", config_map("shop", "settings", "three"));
            (source, target)
        };

        let (source, target) = build();
        let presence_only = scanner(source, target, ComparisonSettings::default());
        let results = presence_only.compare_namespaces(&["shop".to_string()]).await.unwrap();
        assert!(results["shop"].is_in_sync());

        let (source, target) = build();
        let with_contents = scanner(
            source,
            target,
            ComparisonSettings {
                compare_resource_contents: true,
                strict_api_version: false,
            },
        );
        let results = with_contents.compare_namespaces(&["shop".to_string()]).await.unwrap();
        assert_eq!(results["shop"].modified.len(), 1);
    }

    #[tokio::test]
    async fn namespace_union_and_validation() {
        let source = cluster("staging", &["shop", "billing", "kube-system"]);
        let target = cluster("prod", &["shop", "search", "kube-system"]);
        let scanner = scanner(source, target, ComparisonSettings::default());

        let namespaces = scanner.list_namespaces().await.unwrap();
        assert_eq!(namespaces, vec!["billing", "search", "shop"]);

        let requested = vec!["search".to_string(), "ghost".to_string(), "billing".to_string()];
        let valid = scanner.validate_namespaces(&requested).await.unwrap();
        assert_eq!(valid, vec!["search", "billing"]);

        let (source_info, target_info) = scanner.cluster_info();
        assert_eq!(source_info.context, "staging");
        assert_eq!(target_info.cluster, "prod-cluster");
    }

    #[tokio::test]
    async fn target_discovery_failure_is_fatal() {
        let source = cluster("staging", &["shop"]);
        source.add_object("shop", "configmaps", config_map("shop", "settings", "a"));
        let target = cluster("prod", &["shop"]);
        target.fail_discovery(TransportError::Connection("refused".to_string()));
        let scanner = scanner(source, target, ComparisonSettings::default());

        let err = scanner
            .compare_namespaces(&["shop".to_string()])
            .await
            .unwrap_err();
        assert!(matches!(err, ScanError::ResourceDiscovery(_)));
        assert_eq!(scanner.progress().phase(), ScanPhase::Failed);
        assert_eq!(scanner.progress().snapshot().completed, 0);
    }

    #[tokio::test]
    async fn source_discovery_failure_is_fatal() {
        let source = cluster("staging", &["shop"]);
        source.fail_discovery(TransportError::Other("no discovery".to_string()));
        let scanner = scanner(source, cluster("prod", &["shop"]), ComparisonSettings::default());

        let err = scanner
            .compare_namespaces(&["shop".to_string()])
            .await
            .unwrap_err();
        assert!(matches!(err, ScanError::ResourceDiscovery(_)));
        assert_eq!(scanner.progress().phase(), ScanPhase::Failed);
    }
}
