//! Single-cluster classification of root resources.

use std::fmt;
use std::sync::Arc;

use driftscan_core::{AnalysisResult, ClassificationRules, ExclusionRule, KubernetesResource};
use tracing::debug;

/// Why a root resource was left out of managed/manual accounting.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExclusionReason {
    /// Matched an explicit exclusion rule.
    Rule(ExclusionRule),
    /// A platform or cert-manager generated `Secret`.
    Secret,
    /// Name matches a platform-managed pattern for its kind.
    PlatformManaged,
    /// Carries an auto-managed annotation.
    AutoManaged,
    /// A `PersistentVolumeClaim` created from a `StatefulSet` template.
    StatefulSetPvc,
}

impl fmt::Display for ExclusionReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Rule(rule) => write!(f, "exclusion rule {rule}"),
            Self::Secret => f.write_str("generated secret"),
            Self::PlatformManaged => f.write_str("platform-managed name"),
            Self::AutoManaged => f.write_str("auto-managed annotation"),
            Self::StatefulSetPvc => f.write_str("statefulset volume claim"),
        }
    }
}

/// Classification of a single resource.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verdict {
    /// Owned by another object; only counted in the total.
    NonRoot,
    /// Root resource removed by the exclusion cascade.
    Excluded(ExclusionReason),
    /// Root resource carrying a GitOps marker.
    Managed,
    /// Root resource created by hand.
    Manual,
}

/// Classifies resources as GitOps-managed or manually created.
#[derive(Debug, Clone)]
pub struct Analyzer {
    rules: Arc<ClassificationRules>,
}

impl Analyzer {
    /// Create an analyzer over compiled rules.
    #[must_use]
    pub fn new(rules: Arc<ClassificationRules>) -> Self {
        Self { rules }
    }

    /// The rules this analyzer applies.
    #[must_use]
    pub fn rules(&self) -> &ClassificationRules {
        &self.rules
    }

    /// The first exclusion in the cascade matching `resource`, if any.
    #[must_use]
    pub fn exclusion(&self, resource: &KubernetesResource) -> Option<ExclusionReason> {
        let rules = &*self.rules;
        if let Some(rule) = rules.matching_rule(resource) {
            return Some(ExclusionReason::Rule(rule.clone()));
        }
        if rules.is_excluded_secret(resource) {
            return Some(ExclusionReason::Secret);
        }
        if rules.is_platform_managed(resource) {
            return Some(ExclusionReason::PlatformManaged);
        }
        if rules.has_auto_managed_annotation(resource) {
            return Some(ExclusionReason::AutoManaged);
        }
        if rules.is_statefulset_pvc(resource) {
            return Some(ExclusionReason::StatefulSetPvc);
        }
        None
    }

    /// Classify one resource.
    #[must_use]
    pub fn classify(&self, resource: &KubernetesResource) -> Verdict {
        if !resource.is_root() {
            return Verdict::NonRoot;
        }
        if let Some(reason) = self.exclusion(resource) {
            return Verdict::Excluded(reason);
        }
        if self.rules.is_gitops_managed(resource) {
            Verdict::Managed
        } else {
            Verdict::Manual
        }
    }

    /// Classify every resource of a namespace.
    ///
    /// Lists keep the order of `resources`.
    #[must_use]
    pub fn analyze(&self, resources: &[KubernetesResource]) -> AnalysisResult {
        let mut result = AnalysisResult {
            total_resources: resources.len(),
            ..AnalysisResult::default()
        };

        for resource in resources {
            match self.classify(resource) {
                Verdict::NonRoot => continue,
                Verdict::Excluded(reason) => {
                    debug!(resource = %resource.identifier, %reason, "excluded");
                    result.excluded_count += 1;
                }
                Verdict::Managed => {
                    result.managed_count += 1;
                    result.managed.push(resource.clone());
                }
                Verdict::Manual => {
                    result.manual_count += 1;
                    result.manual.push(resource.clone());
                }
            }
            result.root_resources += 1;
        }

        result
    }
}
