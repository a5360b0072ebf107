//! Scan orchestration for driftscan.
//!
//! This crate drives whole-cluster scans on top of a
//! [`ClusterClient`](driftscan_client::ClusterClient):
//!
//! - [`AuditScanner`] classifies each namespace's root resources as
//!   GitOps-managed or manual
//! - [`DriftScanner`] compares two clusters namespace by namespace
//!
//! Both discover resource types once, then scan namespaces on a bounded
//! worker pool. Within a namespace, resource types are fetched in batches
//! with a small fixed parallelism.
//!
//! # Failure model
//!
//! Resource type discovery failing aborts the run. A namespace whose scan
//! fails is left out of the result map. A resource type that cannot be
//! fetched simply contributes nothing.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use driftscan_client::{KubeTransport, ResourceClient};
//! use driftscan_core::AuditConfig;
//! use driftscan_scanner::AuditScanner;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = AuditConfig::default();
//! let transport = KubeTransport::connect(None).await?;
//! let client = ResourceClient::new(transport, config.resource_types.clone(), config.retry.clone());
//!
//! let scanner = AuditScanner::new(
//!     Arc::new(client),
//!     Arc::new(config.compile_rules()?),
//!     config.performance.clone(),
//! );
//! let namespaces = scanner.list_namespaces().await?;
//! let results = scanner.analyze_namespaces(&namespaces).await?;
//!
//! for (namespace, result) in &results {
//!     println!("{namespace}: {} manual", result.manual_count);
//! }
//! # Ok(())
//! # }
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

pub mod aggregate;
pub mod audit;
pub mod drift;
pub mod error;
pub mod fetch;
pub mod pool;
pub mod progress;
pub mod sizing;

pub use aggregate::{NamespaceScanOutcome, ResultAggregator};
pub use audit::AuditScanner;
pub use drift::DriftScanner;
pub use error::{Result, ScanError};
pub use fetch::{fetch_namespace, BatchPlan};
pub use pool::scan_namespaces;
pub use progress::{ProgressSnapshot, ScanPhase, ScanProgress};
pub use sizing::{calculate_batch_size, optimize_concurrency, ConcurrencyLimits};
