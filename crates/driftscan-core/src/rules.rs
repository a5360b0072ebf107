//! Compiled classification rules.

use std::collections::{BTreeMap, BTreeSet};

use regex::Regex;

use crate::config::AuditConfig;
use crate::error::{ConfigError, Result};
use crate::pattern::ExclusionRule;
use crate::resource::KubernetesResource;

/// Label set by Argo CD on every object it manages.
pub const DEFAULT_INSTANCE_LABEL: &str = "argocd.argoproj.io/instance";

/// Annotation set by Argo CD annotation-based tracking.
pub const DEFAULT_TRACKING_ANNOTATION: &str = "argocd.argoproj.io/tracking-id";

const INSTANCE_LABEL: &str = "app.kubernetes.io/instance";
const COMPONENT_LABEL: &str = "app.kubernetes.io/component";

/// Classification rules compiled from an [`AuditConfig`].
///
/// Built once before scanning and shared read-only by every worker.
#[derive(Debug, Clone, Default)]
pub struct ClassificationRules {
    exclusion_rules: Vec<ExclusionRule>,
    secret_patterns: Vec<Regex>,
    platform_patterns: BTreeMap<String, Vec<Regex>>,
    auto_managed_annotations: BTreeSet<String>,
    cert_manager_annotations: BTreeSet<String>,
    statefulset_pvc: Option<Regex>,
    managed_labels: Vec<String>,
    sync_annotations: Vec<String>,
}

fn compile_pattern(field: &'static str, pattern: &str) -> Result<Regex> {
    Regex::new(pattern).map_err(|source| ConfigError::InvalidPattern {
        field,
        pattern: pattern.to_string(),
        source,
    })
}

impl ClassificationRules {
    /// Compile the rules in `config`.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidPattern`] if a regular expression does
    /// not compile.
    pub fn compile(config: &AuditConfig) -> Result<Self> {
        let patterns = &config.patterns;

        let secret_patterns = patterns
            .secret_patterns
            .iter()
            .map(|p| compile_pattern("secret_patterns", p))
            .collect::<Result<Vec<_>>>()?;

        let mut platform_patterns = BTreeMap::new();
        for (kind, kind_patterns) in &patterns.platform_managed {
            let compiled = kind_patterns
                .iter()
                .map(|p| compile_pattern("platform_managed", p))
                .collect::<Result<Vec<_>>>()?;
            platform_patterns.insert(kind.clone(), compiled);
        }

        let statefulset_pvc = patterns
            .statefulset_pvc
            .as_deref()
            .filter(|p| !p.is_empty())
            .map(|p| compile_pattern("statefulset_pvc", p))
            .transpose()?;

        Ok(Self {
            exclusion_rules: config.exclusions.rules(),
            secret_patterns,
            platform_patterns,
            auto_managed_annotations: config.auto_managed.annotations.iter().cloned().collect(),
            cert_manager_annotations: config
                .auto_managed
                .cert_manager_annotations
                .iter()
                .cloned()
                .collect(),
            statefulset_pvc,
            managed_labels: config.gitops.managed_labels.clone(),
            sync_annotations: config.gitops.sync_annotations.clone(),
        })
    }

    /// Rules with only exclusion rules set.
    #[must_use]
    pub fn with_exclusions(rules: Vec<ExclusionRule>) -> Self {
        Self {
            exclusion_rules: rules,
            ..Self::default()
        }
    }

    /// The explicit exclusion rules.
    #[must_use]
    pub fn exclusion_rules(&self) -> &[ExclusionRule] {
        &self.exclusion_rules
    }

    /// Whether a whole-namespace rule (`ns/*/*`) covers `namespace`.
    #[must_use]
    pub fn whole_namespace_excluded(&self, namespace: &str) -> bool {
        self.exclusion_rules
            .iter()
            .any(|rule| rule.is_whole_namespace() && rule.matches(namespace, "*", "*"))
    }

    /// The first explicit rule matching the resource.
    #[must_use]
    pub fn matching_rule(&self, resource: &KubernetesResource) -> Option<&ExclusionRule> {
        self.exclusion_rules
            .iter()
            .find(|rule| rule.matches(resource.namespace(), resource.kind(), resource.name()))
    }

    /// A `Secret` whose name matches a secret pattern or which carries a
    /// cert-manager annotation.
    #[must_use]
    pub fn is_excluded_secret(&self, resource: &KubernetesResource) -> bool {
        if resource.kind() != "Secret" {
            return false;
        }
        self.secret_patterns
            .iter()
            .any(|re| re.is_match(resource.name()))
            || self
                .cert_manager_annotations
                .iter()
                .any(|key| resource.has_annotation(key))
    }

    /// The name matches a platform-managed pattern for the resource's kind.
    #[must_use]
    pub fn is_platform_managed(&self, resource: &KubernetesResource) -> bool {
        self.platform_patterns
            .get(resource.kind())
            .is_some_and(|patterns| patterns.iter().any(|re| re.is_match(resource.name())))
    }

    /// The resource carries an auto-managed annotation.
    #[must_use]
    pub fn has_auto_managed_annotation(&self, resource: &KubernetesResource) -> bool {
        self.auto_managed_annotations
            .iter()
            .any(|key| resource.has_annotation(key))
    }

    /// A `PersistentVolumeClaim` created from a `StatefulSet` volume claim
    /// template.
    ///
    /// Detected by the configured name pattern, or by the resource carrying
    /// both the `app.kubernetes.io/instance` and `app.kubernetes.io/component`
    /// labels.
    #[must_use]
    pub fn is_statefulset_pvc(&self, resource: &KubernetesResource) -> bool {
        if resource.kind() != "PersistentVolumeClaim" {
            return false;
        }
        if self
            .statefulset_pvc
            .as_ref()
            .is_some_and(|re| re.is_match(resource.name()))
        {
            return true;
        }
        resource.has_label(INSTANCE_LABEL) && resource.has_label(COMPONENT_LABEL)
    }

    /// The resource carries a GitOps ownership label or annotation.
    #[must_use]
    pub fn is_gitops_managed(&self, resource: &KubernetesResource) -> bool {
        self.managed_labels.iter().any(|key| resource.has_label(key))
            || self
                .sync_annotations
                .iter()
                .any(|key| resource.has_annotation(key))
            || resource.has_label(DEFAULT_INSTANCE_LABEL)
            || resource.has_annotation(DEFAULT_TRACKING_ANNOTATION)
    }
}
