//! Kubernetes resource client for driftscan.
//!
//! This crate wraps a cluster connection in a [`ResourceClient`] that adds
//! the behaviour a whole-cluster scan needs on top of plain list calls:
//!
//! - Resource-type discovery, run once and shared by all callers
//! - A namespace list cached for five minutes
//! - A memo of `(namespace, type)` pairs that came back empty
//! - Paginated listing with bounded, deadline-limited retries
//! - Concurrent batch fetches deduplicated by object uid
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────┐
//! │                    ResourceClient                     │
//! │  ┌──────────────┐ ┌──────────────┐ ┌──────────────┐  │
//! │  │  Namespace   │ │ Empty-result │ │    Retry     │  │
//! │  │  Cache       │ │ Memo         │ │    Policy    │  │
//! │  └──────────────┘ └──────────────┘ └──────────────┘  │
//! └──────────────────────────────────────────────────────┘
//!                           │
//!                           ▼
//! ┌──────────────────────────────────────────────────────┐
//! │         Transport (KubeTransport / MockTransport)     │
//! └──────────────────────────────────────────────────────┘
//! ```
//!
//! # Example
//!
//! ```no_run
//! use driftscan_client::{ClusterClient, KubeTransport, ResourceClient};
//! use driftscan_core::{ResourceTypeSettings, RetryConfig};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let transport = KubeTransport::connect(None).await?;
//! let client = ResourceClient::new(transport, ResourceTypeSettings::default(), RetryConfig::default());
//!
//! for namespace in client.list_namespaces().await? {
//!     println!("{namespace}");
//! }
//! # Ok(())
//! # }
//! ```
//!
//! # Testing
//!
//! Enable the `test-utils` feature to use [`MockTransport`], which serves
//! namespaces, discovery entries and objects from memory and can script
//! failures.

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

pub mod cache;
pub mod error;
pub mod facade;
pub mod k8s;
pub mod retry;
pub mod transport;

#[cfg(any(test, feature = "test-utils"))]
pub mod mock;

pub use cache::{EmptyResultCache, NamespaceCache, DEFAULT_NAMESPACE_TTL};
pub use error::{ClientError, Result, TransportError};
pub use facade::{ClusterClient, ResourceClient, ResourceScope, DEFAULT_PAGE_SIZE};
pub use k8s::KubeTransport;
pub use retry::{RetryOutcome, RetryPolicy};
pub use transport::{ApiResourceInfo, PageRequest, ResourcePage, Transport};

#[cfg(any(test, feature = "test-utils"))]
pub use mock::MockTransport;
