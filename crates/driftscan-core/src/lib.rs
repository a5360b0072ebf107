//! Core types and configuration for driftscan.
//!
//! This crate provides the foundational pieces shared by every other driftscan crate:
//!
//! - **Pattern matching**: wildcard matching for `namespace/Kind/name` exclusion rules
//! - **Raw objects**: a typed view over untyped Kubernetes API documents
//! - **Resources**: the immutable resource model handed to the classifier and differ
//! - **Results**: per-namespace analysis and comparison results consumed by reporters
//! - **Configuration**: the YAML configuration and its compiled, validated form
//!
//! # Example
//!
//! ```
//! use driftscan_core::{matches_pattern, ExclusionRule};
//!
//! assert!(matches_pattern("kube-*", "kube-system"));
//!
//! let rule = ExclusionRule::parse("kube-system/*/*").unwrap();
//! assert!(rule.is_whole_namespace());
//! assert!(rule.matches("kube-system", "ConfigMap", "anything"));
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

pub mod config;
pub mod error;
pub mod pattern;
pub mod raw;
pub mod resource;
pub mod results;
pub mod rules;

pub use config::{
    AuditConfig, AutoManagedConfig, ComparisonSettings, ExclusionEntry, ExclusionList,
    GitOpsConfig, PatternsConfig, PerformanceConfig, ResourceTypeSettings, RetryConfig,
};
pub use error::{ConfigError, Result};
pub use pattern::{matches_pattern, ExclusionRule};
pub use raw::{RawMetadata, RawObject};
pub use resource::{
    ClusterInfo, KubernetesResource, OwnerReference, ResourceIdentifier, ResourceKey,
};
pub use results::{AnalysisResult, ComparisonResult, ResourceDiff};
pub use rules::{ClassificationRules, DEFAULT_INSTANCE_LABEL, DEFAULT_TRACKING_ANNOTATION};
