//! Dual-cluster resource diffing.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use driftscan_core::{
    ClassificationRules, ComparisonResult, ComparisonSettings, ExclusionRule, KubernetesResource,
    ResourceDiff, ResourceKey,
};
use tracing::debug;

/// Why a resource was left out of a cluster comparison.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DiffExclusion {
    /// Matched an explicit exclusion rule.
    Rule(ExclusionRule),
    /// Created by a controller from another object (CronJob Jobs,
    /// Deployment ReplicaSets, owned Pods).
    Derived,
    /// A platform-generated `RoleBinding` or `ClusterRoleBinding`.
    PlatformBinding,
    /// A legacy service account token `Secret`.
    ServiceAccountToken,
    /// A Helm release record `Secret`.
    HelmRelease,
    /// A `VerticalPodAutoscalerCheckpoint`.
    VpaCheckpoint,
}

impl fmt::Display for DiffExclusion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Rule(rule) => write!(f, "exclusion rule {rule}"),
            Self::Derived => f.write_str("controller-derived object"),
            Self::PlatformBinding => f.write_str("platform role binding"),
            Self::ServiceAccountToken => f.write_str("service account token"),
            Self::HelmRelease => f.write_str("helm release record"),
            Self::VpaCheckpoint => f.write_str("vpa checkpoint"),
        }
    }
}

const BINDING_PREFIXES: [&str; 3] = ["rb-", "crb-", "psp:"];

/// Compares the resources of one namespace across two clusters.
#[derive(Debug, Clone)]
pub struct Differ {
    rules: Arc<ClassificationRules>,
    settings: ComparisonSettings,
}

impl Differ {
    /// Create a differ.
    #[must_use]
    pub fn new(rules: Arc<ClassificationRules>, settings: ComparisonSettings) -> Self {
        Self { rules, settings }
    }

    /// Comparison settings in effect.
    #[must_use]
    pub fn settings(&self) -> ComparisonSettings {
        self.settings
    }

    /// The reason `resource` is left out of the comparison, if any.
    #[must_use]
    pub fn exclusion(&self, resource: &KubernetesResource) -> Option<DiffExclusion> {
        if let Some(rule) = self.rules.matching_rule(resource) {
            return Some(DiffExclusion::Rule(rule.clone()));
        }

        let name = resource.name();
        match resource.kind() {
            "Job" if resource.is_owned_by_kind("CronJob") => Some(DiffExclusion::Derived),
            "ReplicaSet" if resource.is_owned_by_kind("Deployment") => {
                Some(DiffExclusion::Derived)
            }
            "Pod" if !resource.is_root() => Some(DiffExclusion::Derived),
            "RoleBinding" | "ClusterRoleBinding"
                if BINDING_PREFIXES.iter().any(|p| name.starts_with(p)) =>
            {
                Some(DiffExclusion::PlatformBinding)
            }
            "Secret" if name.starts_with("default-token-") => {
                Some(DiffExclusion::ServiceAccountToken)
            }
            "Secret" if name.starts_with("sh.helm.release.") => Some(DiffExclusion::HelmRelease),
            "VerticalPodAutoscalerCheckpoint" => Some(DiffExclusion::VpaCheckpoint),
            _ => None,
        }
    }

    /// Whether `resource` is left out of the comparison.
    #[must_use]
    pub fn is_excluded(&self, resource: &KubernetesResource) -> bool {
        self.exclusion(resource).is_some()
    }

    fn index<'a>(
        &self,
        resources: &'a [KubernetesResource],
    ) -> BTreeMap<ResourceKey, &'a KubernetesResource> {
        let mut map = BTreeMap::new();
        for resource in resources {
            if let Some(reason) = self.exclusion(resource) {
                debug!(resource = %resource.identifier, %reason, "excluded from comparison");
                continue;
            }
            map.insert(resource.key(self.settings.strict_api_version), resource);
        }
        map
    }

    /// Compare source and target resources.
    ///
    /// Excluded resources are dropped first and do not count towards the
    /// totals. Output lists are ordered by resource key.
    #[must_use]
    pub fn compare(
        &self,
        source: &[KubernetesResource],
        target: &[KubernetesResource],
    ) -> ComparisonResult {
        let source_map = self.index(source);
        let target_map = self.index(target);

        let mut result = ComparisonResult {
            total_source: source_map.len(),
            total_target: target_map.len(),
            ..ComparisonResult::default()
        };

        for (key, resource) in &source_map {
            match target_map.get(key) {
                None => result.only_in_source.push((*resource).clone()),
                Some(other) if self.settings.compare_resource_contents => {
                    if let (Some(source_hash), Some(target_hash)) =
                        (&resource.content_hash, &other.content_hash)
                    {
                        if source_hash != target_hash {
                            result.modified.push(ResourceDiff {
                                resource: (*resource).clone(),
                                source_hash: source_hash.clone(),
                                target_hash: target_hash.clone(),
                            });
                        }
                    }
                }
                Some(_) => {}
            }
        }

        result.only_in_target = target_map
            .iter()
            .filter(|(key, _)| !source_map.contains_key(*key))
            .map(|(_, resource)| (*resource).clone())
            .collect();

        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use driftscan_core::{OwnerReference, ResourceIdentifier};

    fn resource(api_version: &str, kind: &str, name: &str) -> KubernetesResource {
        KubernetesResource::new(ResourceIdentifier {
            api_version: api_version.to_string(),
            kind: kind.to_string(),
            name: name.to_string(),
            namespace: "app".to_string(),
        })
    }

    fn owned_by(mut res: KubernetesResource, kind: &str) -> KubernetesResource {
        res.owner_references.push(OwnerReference {
            kind: kind.to_string(),
            name: "owner".to_string(),
            ..OwnerReference::default()
        });
        res
    }

    fn hashed(mut res: KubernetesResource, hash: &str) -> KubernetesResource {
        res.content_hash = Some(hash.to_string());
        res
    }

    fn differ(compare_resource_contents: bool, strict_api_version: bool) -> Differ {
        Differ::new(
            Arc::new(ClassificationRules::default()),
            ComparisonSettings {
                compare_resource_contents,
                strict_api_version,
            },
        )
    }

    #[test]
    fn only_in_each_side() {
        let source = vec![resource("v1", "ConfigMap", "a"), resource("v1", "ConfigMap", "b")];
        let target = vec![resource("v1", "ConfigMap", "b"), resource("v1", "Service", "c")];

        let result = differ(false, false).compare(&source, &target);
        assert_eq!(result.only_in_source.len(), 1);
        assert_eq!(result.only_in_source[0].name(), "a");
        assert_eq!(result.only_in_target.len(), 1);
        assert_eq!(result.only_in_target[0].name(), "c");
        assert!(result.modified.is_empty());
        assert_eq!(result.total_source, 2);
        assert_eq!(result.total_target, 2);
    }

    #[test]
    fn diff_is_symmetric_under_swap() {
        let a = vec![resource("v1", "ConfigMap", "x"), resource("v1", "Secret", "y")];
        let b = vec![resource("v1", "Secret", "y"), resource("v1", "Service", "z")];
        let differ = differ(false, false);

        let forward = differ.compare(&a, &b);
        let backward = differ.compare(&b, &a);
        assert_eq!(forward.only_in_source, backward.only_in_target);
        assert_eq!(forward.only_in_target, backward.only_in_source);
    }

    #[test]
    fn api_version_only_matters_in_strict_mode() {
        let source = vec![resource("autoscaling/v1", "HorizontalPodAutoscaler", "web")];
        let target = vec![resource("autoscaling/v2", "HorizontalPodAutoscaler", "web")];

        assert!(differ(false, false).compare(&source, &target).is_in_sync());

        let strict = differ(false, true).compare(&source, &target);
        assert_eq!(strict.only_in_source.len(), 1);
        assert_eq!(strict.only_in_target.len(), 1);
    }

    #[test]
    fn modified_only_with_content_comparison() {
        let source = vec![hashed(resource("v1", "ConfigMap", "a"), "aaa")];
        let target = vec![hashed(resource("v1", "ConfigMap", "a"), "bbb")];

        assert!(differ(false, false).compare(&source, &target).is_in_sync());

        let result = differ(true, false).compare(&source, &target);
        assert_eq!(result.modified.len(), 1);
        assert_eq!(result.modified[0].source_hash, "aaa");
        assert_eq!(result.modified[0].target_hash, "bbb");
        assert!(result.only_in_source.is_empty());
        assert!(result.only_in_target.is_empty());

        let same = vec![hashed(resource("v1", "ConfigMap", "a"), "aaa")];
        assert!(differ(true, false).compare(&source, &same).is_in_sync());
    }

    #[test]
    fn derived_and_platform_objects_are_excluded() {
        let differ = differ(false, false);

        assert_eq!(
            differ.exclusion(&owned_by(resource("batch/v1", "Job", "nightly-1"), "CronJob")),
            Some(DiffExclusion::Derived)
        );
        assert!(!differ.is_excluded(&resource("batch/v1", "Job", "one-off")));
        assert!(differ.is_excluded(&owned_by(resource("apps/v1", "ReplicaSet", "web-1"), "Deployment")));
        assert!(differ.is_excluded(&owned_by(resource("v1", "Pod", "web-1-x"), "ReplicaSet")));
        assert!(!differ.is_excluded(&resource("v1", "Pod", "standalone")));

        assert_eq!(
            differ.exclusion(&resource("rbac.authorization.k8s.io/v1", "ClusterRoleBinding", "crb-abc")),
            Some(DiffExclusion::PlatformBinding)
        );
        assert!(differ.is_excluded(&resource("rbac.authorization.k8s.io/v1", "RoleBinding", "psp:restricted")));
        assert!(!differ.is_excluded(&resource("rbac.authorization.k8s.io/v1", "RoleBinding", "team-edit")));

        assert_eq!(
            differ.exclusion(&resource("v1", "Secret", "default-token-xyz")),
            Some(DiffExclusion::ServiceAccountToken)
        );
        assert_eq!(
            differ.exclusion(&resource("v1", "Secret", "sh.helm.release.v1.web.v2")),
            Some(DiffExclusion::HelmRelease)
        );
        assert_eq!(
            differ.exclusion(&resource("autoscaling.k8s.io/v1", "VerticalPodAutoscalerCheckpoint", "x")),
            Some(DiffExclusion::VpaCheckpoint)
        );
    }

    #[test]
    fn exclusions_do_not_count_towards_totals() {
        let rules = ClassificationRules::with_exclusions(vec![ExclusionRule::new("*", "ConfigMap", "kube-root-ca.crt")]);
        let differ = Differ::new(Arc::new(rules), ComparisonSettings::default());

        let source = vec![
            resource("v1", "ConfigMap", "kube-root-ca.crt"),
            resource("v1", "Secret", "default-token-abc"),
            resource("v1", "ConfigMap", "app"),
        ];
        let result = differ.compare(&source, &[]);
        assert_eq!(result.total_source, 1);
        assert_eq!(result.only_in_source.len(), 1);
        assert_eq!(result.only_in_source[0].name(), "app");
    }
}
