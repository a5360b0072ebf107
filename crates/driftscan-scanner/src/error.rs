//! Error types for scan orchestration.
//!
//! Only run-level failures surface here. Per-resource-type failures are
//! absorbed by the client and per-namespace failures drop the namespace
//! from the result map.

use driftscan_client::ClientError;
use thiserror::Error;

/// A result type using `ScanError`.
pub type Result<T> = std::result::Result<T, ScanError>;

/// Errors that can occur while scanning.
#[derive(Debug, Error)]
pub enum ScanError {
    /// Resource types could not be enumerated. Aborts the run.
    #[error("resource type discovery failed: {0}")]
    ResourceDiscovery(#[source] ClientError),

    /// Namespaces could not be enumerated. Aborts the run.
    #[error("failed to list namespaces in {cluster}: {source}")]
    NamespaceListing {
        /// The cluster whose namespaces were requested.
        cluster: String,
        /// The underlying client error.
        #[source]
        source: ClientError,
    },

    /// Namespace existence could not be checked.
    #[error("namespace validation failed: {0}")]
    NamespaceValidation(#[source] ClientError),

    /// None of the requested namespaces exist.
    #[error("no valid namespaces to scan")]
    NoValidNamespaces,

    /// Processing a single namespace failed.
    #[error("scan of namespace {namespace} failed: {message}")]
    TaskFailed {
        /// The namespace being scanned.
        namespace: String,
        /// What went wrong.
        message: String,
    },
}

impl ScanError {
    /// Returns true if this error aborts the whole run.
    #[must_use]
    pub const fn is_fatal(&self) -> bool {
        !matches!(self, Self::TaskFailed { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use driftscan_client::TransportError;

    #[test]
    fn only_task_failures_are_recoverable() {
        let discovery = ScanError::ResourceDiscovery(ClientError::Discovery(
            TransportError::Other("boom".to_string()),
        ));
        assert!(discovery.is_fatal());
        assert!(ScanError::NoValidNamespaces.is_fatal());

        let task = ScanError::TaskFailed {
            namespace: "shop".to_string(),
            message: "panicked".to_string(),
        };
        assert!(!task.is_fatal());
        assert_eq!(task.to_string(), "scan of namespace shop failed: panicked");
    }
}
