//! Typed Kubernetes resource model.
//!
//! A [`KubernetesResource`] is built once from a [`RawObject`](crate::RawObject)
//! and never mutated afterwards.

use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::raw::lenient_string_or_empty;

/// The natural key of a resource: `apiVersion`, kind, name and namespace.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceIdentifier {
    /// API group and version, e.g. `apps/v1`.
    pub api_version: String,
    /// Resource kind, e.g. `Deployment`.
    pub kind: String,
    /// Object name.
    pub name: String,
    /// Namespace the object lives in.
    pub namespace: String,
}

impl fmt::Display for ResourceIdentifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}/{}", self.namespace, self.kind, self.name)
    }
}

/// A reference from an object to the object that owns it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OwnerReference {
    /// API version of the owner.
    #[serde(default, deserialize_with = "lenient_string_or_empty")]
    pub api_version: String,
    /// Kind of the owner.
    #[serde(default, deserialize_with = "lenient_string_or_empty")]
    pub kind: String,
    /// Name of the owner.
    #[serde(default, deserialize_with = "lenient_string_or_empty")]
    pub name: String,
    /// UID of the owner.
    #[serde(default, deserialize_with = "lenient_string_or_empty")]
    pub uid: String,
}

/// Key used to match the same object across two clusters.
///
/// `api_version` is only populated in strict mode, so that two objects that
/// differ only in API version are treated as the same object by default.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ResourceKey {
    /// Namespace of the object.
    pub namespace: String,
    /// API version, in strict mode only.
    pub api_version: Option<String>,
    /// Object kind.
    pub kind: String,
    /// Object name.
    pub name: String,
}

impl fmt::Display for ResourceKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.api_version {
            Some(api_version) => write!(
                f,
                "{}/{}/{}/{}",
                self.namespace, api_version, self.kind, self.name
            ),
            None => write!(f, "{}/{}/{}", self.namespace, self.kind, self.name),
        }
    }
}

/// A Kubernetes object as seen by the classifier and differ.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KubernetesResource {
    /// Identity of the object.
    pub identifier: ResourceIdentifier,
    /// Object UID, when the API server reported one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uid: Option<String>,
    /// Creation time, when present and parseable.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub creation_timestamp: Option<DateTime<Utc>>,
    /// Object labels.
    #[serde(default)]
    pub labels: BTreeMap<String, String>,
    /// Object annotations.
    #[serde(default)]
    pub annotations: BTreeMap<String, String>,
    /// Owner references, in API order.
    #[serde(default)]
    pub owner_references: Vec<OwnerReference>,
    /// Hash of the object's content, when content comparison is enabled.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content_hash: Option<String>,
}

impl KubernetesResource {
    /// Create a resource with only an identity.
    #[must_use]
    pub fn new(identifier: ResourceIdentifier) -> Self {
        Self {
            identifier,
            uid: None,
            creation_timestamp: None,
            labels: BTreeMap::new(),
            annotations: BTreeMap::new(),
            owner_references: Vec::new(),
            content_hash: None,
        }
    }

    /// Object kind.
    #[must_use]
    pub fn kind(&self) -> &str {
        &self.identifier.kind
    }

    /// Object name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.identifier.name
    }

    /// Object namespace.
    #[must_use]
    pub fn namespace(&self) -> &str {
        &self.identifier.namespace
    }

    /// A root resource has no owner and was created directly.
    #[must_use]
    pub fn is_root(&self) -> bool {
        self.owner_references.is_empty()
    }

    /// Whether any owner reference points to an object of `kind`.
    #[must_use]
    pub fn is_owned_by_kind(&self, kind: &str) -> bool {
        self.owner_references.iter().any(|owner| owner.kind == kind)
    }

    /// Whether the label key is present.
    #[must_use]
    pub fn has_label(&self, key: &str) -> bool {
        self.labels.contains_key(key)
    }

    /// Whether the annotation key is present.
    #[must_use]
    pub fn has_annotation(&self, key: &str) -> bool {
        self.annotations.contains_key(key)
    }

    /// Build the cross-cluster key for this resource.
    #[must_use]
    pub fn key(&self, strict_api_version: bool) -> ResourceKey {
        ResourceKey {
            namespace: self.identifier.namespace.clone(),
            api_version: strict_api_version.then(|| self.identifier.api_version.clone()),
            kind: self.identifier.kind.clone(),
            name: self.identifier.name.clone(),
        }
    }
}

/// Identity of a cluster: the kubeconfig context and the cluster it points to.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClusterInfo {
    /// Kubeconfig context name.
    pub context: String,
    /// Cluster name referenced by the context, empty when unknown.
    pub cluster: String,
}

impl ClusterInfo {
    /// Create a cluster identity.
    #[must_use]
    pub fn new(context: impl Into<String>, cluster: impl Into<String>) -> Self {
        Self {
            context: context.into(),
            cluster: cluster.into(),
        }
    }
}

impl fmt::Display for ClusterInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.cluster.is_empty() {
            write!(f, "{}", self.context)
        } else {
            write!(f, "{} ({})", self.context, self.cluster)
        }
    }
}
