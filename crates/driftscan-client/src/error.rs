//! Error types for the client crate.

use std::time::Duration;

use thiserror::Error;

/// Markers in error text that identify a transient failure.
const TRANSIENT_MARKERS: [&str; 4] = ["timeout", "deadline exceeded", "connection reset", "temporary"];

/// A failure of a single wire-level call.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransportError {
    /// The call did not complete within its deadline.
    #[error("request timed out after {0:?}")]
    Timeout(Duration),

    /// The API server answered with an error status.
    #[error("API error {code}: {message}")]
    Api {
        /// HTTP status code.
        code: u16,
        /// Status message.
        message: String,
    },

    /// The connection to the API server failed.
    #[error("connection error: {0}")]
    Connection(String),

    /// Any other failure.
    #[error("{0}")]
    Other(String),
}

impl TransportError {
    /// Check if this error is worth retrying.
    ///
    /// Timeouts are always transient. Other errors are transient when their
    /// text mentions a timeout, an exceeded deadline, a reset connection, or
    /// a temporary condition.
    #[must_use]
    pub fn is_transient(&self) -> bool {
        if matches!(self, Self::Timeout(_)) {
            return true;
        }
        let text = self.to_string().to_ascii_lowercase();
        TRANSIENT_MARKERS.iter().any(|marker| text.contains(marker))
    }
}

impl From<kube::Error> for TransportError {
    fn from(err: kube::Error) -> Self {
        match err {
            kube::Error::Api(response) => Self::Api {
                code: response.code,
                message: response.message,
            },
            kube::Error::HyperError(e) => Self::Connection(e.to_string()),
            kube::Error::Service(e) => Self::Connection(e.to_string()),
            other => Self::Other(other.to_string()),
        }
    }
}

/// Errors surfaced by the resource client.
#[derive(Error, Debug)]
pub enum ClientError {
    /// A wire-level call failed.
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// API discovery failed.
    #[error("resource discovery failed: {0}")]
    Discovery(#[source] TransportError),

    /// The requested kubeconfig context does not exist.
    #[error("context '{0}' not found in kubeconfig")]
    ContextNotFound(String),

    /// The kubeconfig could not be read or applied.
    #[error("kubeconfig error: {0}")]
    Kubeconfig(#[from] kube::config::KubeconfigError),

    /// No kubeconfig and no in-cluster configuration.
    #[error("could not infer cluster configuration: {0}")]
    InferConfig(#[from] kube::config::InferConfigError),

    /// The Kubernetes client could not be built.
    #[error("Kubernetes client error: {0}")]
    Kube(#[from] kube::Error),
}

/// A specialized Result type for client operations.
pub type Result<T> = std::result::Result<T, ClientError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn timeouts_are_transient() {
        assert!(TransportError::Timeout(Duration::from_secs(20)).is_transient());
    }

    #[test]
    fn transient_markers_in_text() {
        assert!(TransportError::Connection("read: connection reset by peer".into()).is_transient());
        assert!(TransportError::Other("context deadline exceeded".into()).is_transient());
        assert!(TransportError::Api {
            code: 503,
            message: "Temporary failure in name resolution".into()
        }
        .is_transient());
        assert!(TransportError::Other("i/o Timeout".into()).is_transient());
    }

    #[test]
    fn other_errors_are_not_transient() {
        assert!(!TransportError::Api {
            code: 403,
            message: "forbidden".into()
        }
        .is_transient());
        assert!(!TransportError::Connection("connection refused".into()).is_transient());
    }
}
