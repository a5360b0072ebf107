//! The wire-level capability the resource client is built on.

use async_trait::async_trait;
use driftscan_core::{ClusterInfo, RawObject};

use crate::error::TransportError;

/// A resource type reported by API discovery.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiResourceInfo {
    /// Plural resource name, e.g. `deployments`.
    pub name: String,
    /// API group, empty for the core group.
    pub group: String,
    /// API version within the group.
    pub version: String,
    /// Kind of the objects, e.g. `Deployment`.
    pub kind: String,
    /// Whether objects live in namespaces.
    pub namespaced: bool,
    /// Supported verbs.
    pub verbs: Vec<String>,
}

impl ApiResourceInfo {
    /// A namespaced resource supporting the read verbs.
    #[must_use]
    pub fn namespaced(name: &str, group: &str, version: &str, kind: &str) -> Self {
        Self {
            name: name.to_string(),
            group: group.to_string(),
            version: version.to_string(),
            kind: kind.to_string(),
            namespaced: true,
            verbs: ["get", "list", "watch"].map(String::from).to_vec(),
        }
    }

    /// A cluster-scoped resource supporting the read verbs.
    #[must_use]
    pub fn cluster_scoped(name: &str, group: &str, version: &str, kind: &str) -> Self {
        Self {
            namespaced: false,
            ..Self::namespaced(name, group, version, kind)
        }
    }

    /// Replace the supported verbs.
    #[must_use]
    pub fn with_verbs(mut self, verbs: &[&str]) -> Self {
        self.verbs = verbs.iter().map(ToString::to_string).collect();
        self
    }

    /// `group/version`, or just `version` for the core group.
    #[must_use]
    pub fn api_version(&self) -> String {
        if self.group.is_empty() {
            self.version.clone()
        } else {
            format!("{}/{}", self.group, self.version)
        }
    }

    /// `name.group`, or just `name` for the core group.
    #[must_use]
    pub fn qualified_name(&self) -> String {
        if self.group.is_empty() {
            self.name.clone()
        } else {
            format!("{}.{}", self.name, self.group)
        }
    }

    /// Whether objects of this type can be listed.
    #[must_use]
    pub fn supports_list(&self) -> bool {
        self.verbs.iter().any(|verb| verb == "list")
    }

    /// Whether `type_name` refers to this resource, by bare or qualified name.
    #[must_use]
    pub fn matches(&self, type_name: &str) -> bool {
        self.name == type_name || self.qualified_name() == type_name
    }
}

/// One page of a list request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageRequest {
    /// Maximum objects per page.
    pub limit: u32,
    /// Token returned by the previous page.
    pub continue_token: Option<String>,
}

/// One page of a list response.
#[derive(Debug, Clone, Default)]
pub struct ResourcePage {
    /// Objects on this page.
    pub items: Vec<RawObject>,
    /// Token for the next page, `None` on the last page.
    pub continue_token: Option<String>,
}

/// Raw access to a cluster's API server.
///
/// Implementations perform exactly one API interaction per call and never
/// cache or retry; [`ResourceClient`](crate::ResourceClient) layers that on top.
#[async_trait]
pub trait Transport: Send + Sync {
    /// The kubeconfig context and cluster this transport talks to.
    fn current_context(&self) -> ClusterInfo;

    /// List all namespace names.
    ///
    /// # Errors
    ///
    /// Returns an error if the namespace list cannot be retrieved.
    async fn list_namespaces(&self) -> Result<Vec<String>, TransportError>;

    /// Discover every resource type the API server serves.
    ///
    /// # Errors
    ///
    /// Returns an error if discovery fails.
    async fn discover_resources(&self) -> Result<Vec<ApiResourceInfo>, TransportError>;

    /// Fetch one page of objects of `resource` in `namespace`.
    ///
    /// # Errors
    ///
    /// Returns an error if the list request fails.
    async fn list_page(
        &self,
        resource: &ApiResourceInfo,
        namespace: &str,
        page: &PageRequest,
    ) -> Result<ResourcePage, TransportError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn names_and_versions() {
        let deployments = ApiResourceInfo::namespaced("deployments", "apps", "v1", "Deployment");
        assert_eq!(deployments.api_version(), "apps/v1");
        assert_eq!(deployments.qualified_name(), "deployments.apps");
        assert!(deployments.matches("deployments"));
        assert!(deployments.matches("deployments.apps"));
        assert!(!deployments.matches("deployments.extensions"));

        let pods = ApiResourceInfo::namespaced("pods", "", "v1", "Pod");
        assert_eq!(pods.api_version(), "v1");
        assert_eq!(pods.qualified_name(), "pods");
    }

    #[test]
    fn list_verb() {
        let bindings = ApiResourceInfo::namespaced("bindings", "", "v1", "Binding").with_verbs(&["create"]);
        assert!(!bindings.supports_list());
        assert!(ApiResourceInfo::cluster_scoped("nodes", "", "v1", "Node").supports_list());
    }
}
