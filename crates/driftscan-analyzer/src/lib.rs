//! Resource classification and cluster diffing for driftscan.
//!
//! This crate turns raw API objects into typed resources and decides what
//! they mean:
//!
//! - [`ResourceConverter`] builds [`KubernetesResource`](driftscan_core::KubernetesResource)s
//!   from raw objects, optionally with a content hash
//! - [`Analyzer`] classifies root resources of a namespace as GitOps-managed,
//!   manually created, or excluded
//! - [`Differ`] compares the resources of a namespace across two clusters
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//!
//! use driftscan_analyzer::{Analyzer, ResourceConverter};
//! use driftscan_core::{ClassificationRules, RawObject};
//!
//! let raw = RawObject::from_value(serde_json::json!({
//!     "apiVersion": "v1",
//!     "kind": "ConfigMap",
//!     "metadata": {"name": "settings"}
//! }))
//! .unwrap();
//!
//! let resources = ResourceConverter::default().convert_all(&[raw], "default");
//! let result = Analyzer::new(Arc::new(ClassificationRules::default())).analyze(&resources);
//!
//! assert_eq!(result.manual_count, 1);
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

pub mod classify;
pub mod convert;
pub mod diff;

pub use classify::{Analyzer, ExclusionReason, Verdict};
pub use convert::{content_hash, ResourceConverter};
pub use diff::{DiffExclusion, Differ};
