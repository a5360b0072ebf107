//! Per-namespace scan results handed to reporters.

use serde::Serialize;

use crate::resource::KubernetesResource;

/// Single-cluster classification of one namespace.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisResult {
    /// Every converted resource, owned or not.
    pub total_resources: usize,
    /// Resources without owner references.
    pub root_resources: usize,
    /// Root resources carrying a GitOps marker.
    pub managed_count: usize,
    /// Root resources without a GitOps marker.
    pub manual_count: usize,
    /// Root resources dropped by the exclusion cascade.
    pub excluded_count: usize,
    /// Manually created resources, in encounter order.
    pub manual: Vec<KubernetesResource>,
    /// GitOps-managed resources, in encounter order.
    pub managed: Vec<KubernetesResource>,
}

impl AnalysisResult {
    /// Whether the namespace holds no manually created resources.
    #[must_use]
    pub fn is_fully_managed(&self) -> bool {
        self.manual_count == 0
    }
}

/// A resource present in both clusters with different content.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceDiff {
    /// The resource as seen in the source cluster.
    pub resource: KubernetesResource,
    /// Content hash in the source cluster.
    pub source_hash: String,
    /// Content hash in the target cluster.
    pub target_hash: String,
}

/// Dual-cluster comparison of one namespace.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ComparisonResult {
    /// Resources only found in the source cluster.
    pub only_in_source: Vec<KubernetesResource>,
    /// Resources only found in the target cluster.
    pub only_in_target: Vec<KubernetesResource>,
    /// Resources found in both clusters with differing content.
    pub modified: Vec<ResourceDiff>,
    /// Source resources left after exclusion.
    pub total_source: usize,
    /// Target resources left after exclusion.
    pub total_target: usize,
}

impl ComparisonResult {
    /// Whether the two clusters agree for this namespace.
    #[must_use]
    pub fn is_in_sync(&self) -> bool {
        self.only_in_source.is_empty() && self.only_in_target.is_empty() && self.modified.is_empty()
    }
}
