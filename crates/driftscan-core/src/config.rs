//! Driftscan configuration.
//!
//! The configuration is a YAML document where every section is optional.
//! It is loaded once, optionally patched from the environment, and then
//! compiled into [`ClassificationRules`] before any cluster is contacted.

use std::collections::{BTreeMap, HashSet};
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::{ConfigError, Result};
use crate::pattern::ExclusionRule;
use crate::rules::ClassificationRules;

/// Top-level driftscan configuration.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct AuditConfig {
    /// Labels and annotations that mark a resource as GitOps-managed.
    #[serde(alias = "argocd")]
    pub gitops: GitOpsConfig,

    /// Exclusion rules.
    pub exclusions: ExclusionList,

    /// Annotations that mark a resource as created by automation.
    pub auto_managed: AutoManagedConfig,

    /// Regular expressions for platform-managed names.
    pub patterns: PatternsConfig,

    /// Resource type selection.
    pub resource_types: ResourceTypeSettings,

    /// Concurrency and batching.
    pub performance: PerformanceConfig,

    /// Dual-cluster comparison settings.
    pub comparison: ComparisonSettings,

    /// Retry policy for resource fetches.
    pub retry: RetryConfig,
}

/// GitOps ownership markers.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct GitOpsConfig {
    /// Label keys that mark a resource as managed.
    pub managed_labels: Vec<String>,
    /// Annotation keys that mark a resource as managed.
    pub sync_annotations: Vec<String>,
}

/// Exclusion rules, either as a flat list or grouped by category.
///
/// ```yaml
/// exclusions:
///   - "kube-system/*/*"
///   - { namespace: "*", kind: ConfigMap, name: kube-root-ca.crt }
/// ```
///
/// or
///
/// ```yaml
/// exclusions:
///   system:
///     - "kube-system/*/*"
/// ```
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum ExclusionList {
    /// A single list of rules.
    Flat(Vec<ExclusionEntry>),
    /// Rules grouped under arbitrary category names.
    Grouped(BTreeMap<String, Vec<ExclusionEntry>>),
}

impl Default for ExclusionList {
    fn default() -> Self {
        Self::Flat(Vec::new())
    }
}

/// A single exclusion rule as written in the configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum ExclusionEntry {
    /// A `namespace/Kind/name` string.
    Text(String),
    /// An explicit mapping.
    Rule(ExclusionRule),
}

impl ExclusionList {
    fn entries(&self) -> Box<dyn Iterator<Item = &ExclusionEntry> + '_> {
        match self {
            Self::Flat(entries) => Box::new(entries.iter()),
            Self::Grouped(groups) => Box::new(groups.values().flatten()),
        }
    }

    /// Parse every entry into a rule.
    ///
    /// Strings that do not have exactly three `/`-separated parts are
    /// skipped with a warning.
    #[must_use]
    pub fn rules(&self) -> Vec<ExclusionRule> {
        self.entries()
            .filter_map(|entry| match entry {
                ExclusionEntry::Rule(rule) => Some(rule.clone()),
                ExclusionEntry::Text(text) => {
                    let parsed = ExclusionRule::parse(text);
                    if parsed.is_none() {
                        warn!(rule = %text, "skipping exclusion rule, expected namespace/Kind/name");
                    }
                    parsed
                }
            })
            .collect()
    }
}

/// Annotations that mark objects created by automation.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct AutoManagedConfig {
    /// Annotation keys that exclude a resource of any kind.
    pub annotations: Vec<String>,
    /// Annotation keys that exclude a `Secret`.
    pub cert_manager_annotations: Vec<String>,
}

/// Regular expressions for names of platform-managed objects.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct PatternsConfig {
    /// Patterns matched against `Secret` names.
    pub secret_patterns: Vec<String>,
    /// Patterns per kind, matched against object names.
    #[serde(alias = "rancher_managed")]
    pub platform_managed: BTreeMap<String, Vec<String>>,
    /// Pattern matched against `PersistentVolumeClaim` names.
    pub statefulset_pvc: Option<String>,
}

/// Resource type selection.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ResourceTypeSettings {
    /// Resource names (`name` or `name.group`) never scanned.
    pub skip: HashSet<String>,
    /// When non-empty, the only resource types scanned. Discovery is skipped.
    pub important: Vec<String>,
}

impl ResourceTypeSettings {
    /// Whether a discovered resource is in the skip set.
    ///
    /// Both the bare plural name and the group-qualified `name.group` form
    /// are checked.
    #[must_use]
    pub fn is_skipped(&self, name: &str, group: &str) -> bool {
        if self.skip.contains(name) {
            return true;
        }
        !group.is_empty() && self.skip.contains(&format!("{name}.{group}"))
    }

    /// The fixed resource type list, if one is configured.
    #[must_use]
    pub fn important(&self) -> Option<&[String]> {
        (!self.important.is_empty()).then_some(self.important.as_slice())
    }
}

/// Concurrency and batching settings.
#[derive(Debug, Clone, Deserialize)]
pub struct PerformanceConfig {
    /// Requested namespace-level parallelism.
    #[serde(
        default = "PerformanceConfig::default_max_concurrent",
        alias = "default_max_concurrent"
    )]
    pub max_concurrent: usize,

    /// Namespace-level parallelism in fast-scan mode.
    #[serde(default = "PerformanceConfig::default_fast_scan_concurrent")]
    pub fast_scan_concurrent: usize,

    /// Resource types per batch; `0` computes it from the type count.
    #[serde(default)]
    pub batch_size: usize,

    /// Parallel resource-type batches within one namespace.
    #[serde(default = "PerformanceConfig::default_namespace_batch_concurrency")]
    pub namespace_batch_concurrency: usize,
}

impl PerformanceConfig {
    const fn default_max_concurrent() -> usize {
        10
    }

    const fn default_fast_scan_concurrent() -> usize {
        5
    }

    const fn default_namespace_batch_concurrency() -> usize {
        2
    }
}

impl Default for PerformanceConfig {
    fn default() -> Self {
        Self {
            max_concurrent: Self::default_max_concurrent(),
            fast_scan_concurrent: Self::default_fast_scan_concurrent(),
            batch_size: 0,
            namespace_batch_concurrency: Self::default_namespace_batch_concurrency(),
        }
    }
}

/// Dual-cluster comparison settings.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ComparisonSettings {
    /// Hash and compare object contents for resources present in both clusters.
    pub compare_resource_contents: bool,
    /// Treat objects that differ only in `apiVersion` as different objects.
    pub strict_api_version: bool,
}

/// Retry policy for a single resource-type fetch.
#[derive(Debug, Clone, Deserialize)]
pub struct RetryConfig {
    /// Attempts per fetch, including the first.
    #[serde(default = "RetryConfig::default_max_attempts")]
    pub max_attempts: u32,

    /// Deadline of the first attempt, in seconds.
    #[serde(default = "RetryConfig::default_base_timeout")]
    pub base_timeout_secs: u64,

    /// Extra deadline per subsequent attempt, in seconds.
    #[serde(default = "RetryConfig::default_timeout_step")]
    pub timeout_step_secs: u64,

    /// Backoff before the first retry, in milliseconds. Doubles per retry.
    #[serde(default = "RetryConfig::default_initial_backoff")]
    pub initial_backoff_ms: u64,
}

impl RetryConfig {
    const fn default_max_attempts() -> u32 {
        3
    }

    const fn default_base_timeout() -> u64 {
        20
    }

    const fn default_timeout_step() -> u64 {
        10
    }

    const fn default_initial_backoff() -> u64 {
        1000
    }

    /// Deadline for the zero-based `attempt`.
    #[must_use]
    pub fn attempt_timeout(&self, attempt: u32) -> Duration {
        Duration::from_secs(
            self.base_timeout_secs
                .saturating_add(self.timeout_step_secs.saturating_mul(u64::from(attempt))),
        )
    }

    /// Backoff before the first retry.
    #[must_use]
    pub fn initial_backoff(&self) -> Duration {
        Duration::from_millis(self.initial_backoff_ms)
    }
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: Self::default_max_attempts(),
            base_timeout_secs: Self::default_base_timeout(),
            timeout_step_secs: Self::default_timeout_step(),
            initial_backoff_ms: Self::default_initial_backoff(),
        }
    }
}

impl AuditConfig {
    /// Parse and validate a configuration document.
    ///
    /// # Errors
    ///
    /// Returns an error if the YAML is malformed or a value is out of range.
    pub fn from_yaml_str(yaml: &str) -> Result<Self> {
        let config: Self = if yaml.trim().is_empty() {
            Self::default()
        } else {
            serde_yaml::from_str(yaml)?
        };
        config.validate()?;
        Ok(config)
    }

    /// Load and validate a configuration file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read, is malformed, or holds an
    /// out-of-range value.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_yaml_str(&contents)
    }

    /// Apply overrides from environment variables.
    ///
    /// Supported environment variables:
    /// - `DRIFTSCAN_MAX_CONCURRENT`: namespace-level parallelism
    /// - `DRIFTSCAN_BATCH_SIZE`: resource types per batch
    /// - `DRIFTSCAN_COMPARE_CONTENTS`: enable content hashing (`true`/`false`)
    /// - `DRIFTSCAN_STRICT_API_VERSION`: key on `apiVersion` (`true`/`false`)
    ///
    /// Unparseable values are ignored.
    pub fn apply_env_overrides(&mut self) {
        self.apply_overrides(|key| std::env::var(key).ok());
    }

    fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(n) = lookup("DRIFTSCAN_MAX_CONCURRENT").and_then(|v| v.parse().ok()) {
            if n > 0 {
                self.performance.max_concurrent = n;
            }
        }
        if let Some(n) = lookup("DRIFTSCAN_BATCH_SIZE").and_then(|v| v.parse().ok()) {
            self.performance.batch_size = n;
        }
        if let Some(flag) = lookup("DRIFTSCAN_COMPARE_CONTENTS").and_then(|v| parse_flag(&v)) {
            self.comparison.compare_resource_contents = flag;
        }
        if let Some(flag) = lookup("DRIFTSCAN_STRICT_API_VERSION").and_then(|v| parse_flag(&v)) {
            self.comparison.strict_api_version = flag;
        }
    }

    /// Check numeric settings.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidValue`] for a zero concurrency or
    /// attempt count.
    pub fn validate(&self) -> Result<()> {
        let checks = [
            ("performance.max_concurrent", self.performance.max_concurrent),
            (
                "performance.fast_scan_concurrent",
                self.performance.fast_scan_concurrent,
            ),
            (
                "performance.namespace_batch_concurrency",
                self.performance.namespace_batch_concurrency,
            ),
        ];
        for (field, value) in checks {
            if value == 0 {
                return Err(ConfigError::InvalidValue(format!(
                    "{field} must be at least 1"
                )));
            }
        }
        if self.retry.max_attempts == 0 {
            return Err(ConfigError::InvalidValue(
                "retry.max_attempts must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    /// Compile exclusion rules and regular expressions.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidPattern`] for the first regular
    /// expression that fails to compile.
    pub fn compile_rules(&self) -> Result<ClassificationRules> {
        ClassificationRules::compile(self)
    }
}

fn parse_flag(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}
