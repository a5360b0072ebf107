//! Conversion from raw API objects to typed resources.

use chrono::{DateTime, Utc};
use driftscan_core::{KubernetesResource, RawObject, ResourceIdentifier};
use tracing::warn;

/// Hash of an object's content, ignoring fields that change on every write.
///
/// The document is canonicalized with sorted keys before hashing, so two
/// structurally equal objects hash identically whatever their field order.
///
/// # Errors
///
/// Returns an error if the object cannot be serialized.
pub fn content_hash(raw: &RawObject) -> Result<String, serde_json::Error> {
    let document = raw.canonical_document()?;
    let bytes = serde_json::to_vec(&document)?;

    let mut hasher = blake3::Hasher::new();
    hasher.update(&bytes);
    Ok(hex::encode(hasher.finalize().as_bytes()))
}

/// Without a hash the object is never reported as modified.
fn hash_or_warn(raw: &RawObject, name: &str) -> Option<String> {
    match content_hash(raw) {
        Ok(hash) => Some(hash),
        Err(err) => {
            warn!(name = %name, error = %err, "Cannot hash object, skipping content comparison");
            None
        }
    }
}

/// Converts raw API objects into [`KubernetesResource`]s.
#[derive(Debug, Clone, Copy, Default)]
pub struct ResourceConverter {
    compute_hash: bool,
}

impl ResourceConverter {
    /// Create a converter. With `compute_hash`, every resource carries a
    /// content hash.
    #[must_use]
    pub const fn new(compute_hash: bool) -> Self {
        Self { compute_hash }
    }

    /// Convert a single object.
    ///
    /// Returns `None` when metadata is missing or the name is empty. The
    /// object's own namespace wins over `fallback_namespace`.
    #[must_use]
    pub fn convert(&self, raw: &RawObject, fallback_namespace: &str) -> Option<KubernetesResource> {
        let metadata = raw.metadata.as_ref()?;
        let name = metadata.name.as_deref().filter(|n| !n.is_empty())?;

        let namespace = metadata
            .namespace
            .as_deref()
            .filter(|ns| !ns.is_empty())
            .unwrap_or(fallback_namespace);

        let identifier = ResourceIdentifier {
            api_version: raw.api_version.clone().unwrap_or_default(),
            kind: raw.kind.clone().unwrap_or_default(),
            name: name.to_string(),
            namespace: namespace.to_string(),
        };

        let creation_timestamp = metadata
            .creation_timestamp
            .as_deref()
            .and_then(|ts| DateTime::parse_from_rfc3339(ts).ok())
            .map(|ts| ts.with_timezone(&Utc));

        Some(KubernetesResource {
            identifier,
            uid: metadata.uid.clone().filter(|uid| !uid.is_empty()),
            creation_timestamp,
            labels: metadata.labels.clone(),
            annotations: metadata.annotations.clone(),
            owner_references: metadata.owner_references.clone(),
            content_hash: self.compute_hash.then(|| hash_or_warn(raw, name)).flatten(),
        })
    }

    /// Convert every object fetched from `namespace`, dropping the ones that
    /// cannot be converted.
    #[must_use]
    pub fn convert_all(&self, raws: &[RawObject], namespace: &str) -> Vec<KubernetesResource> {
        let resources: Vec<_> = raws
            .iter()
            .filter_map(|raw| self.convert(raw, namespace))
            .collect();

        let dropped = raws.len() - resources.len();
        if dropped > 0 {
            warn!(namespace = %namespace, dropped, "dropped objects without usable metadata");
        }

        resources
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn raw(value: serde_json::Value) -> RawObject {
        RawObject::from_value(value).unwrap()
    }

    #[test]
    fn converts_metadata() {
        let obj = raw(json!({
            "apiVersion": "apps/v1",
            "kind": "Deployment",
            "metadata": {
                "name": "web",
                "uid": "u-1",
                "creationTimestamp": "2024-05-01T12:00:00Z",
                "labels": {"app": "web"},
                "ownerReferences": [{"kind": "Thing", "name": "t", "uid": "o-1"}]
            }
        }));

        let res = ResourceConverter::new(false).convert(&obj, "shop").unwrap();
        assert_eq!(res.identifier.api_version, "apps/v1");
        assert_eq!(res.kind(), "Deployment");
        assert_eq!(res.namespace(), "shop");
        assert_eq!(res.uid.as_deref(), Some("u-1"));
        assert_eq!(res.labels.get("app").map(String::as_str), Some("web"));
        assert_eq!(res.owner_references.len(), 1);
        assert!(res.creation_timestamp.is_some());
        assert!(res.content_hash.is_none());
    }

    #[test]
    fn object_namespace_wins_over_fallback() {
        let obj = raw(json!({"kind": "ConfigMap", "metadata": {"name": "a", "namespace": "real"}}));
        let res = ResourceConverter::default().convert(&obj, "scanned").unwrap();
        assert_eq!(res.namespace(), "real");
    }

    #[test]
    fn unconvertible_objects_are_dropped() {
        let objects = vec![
            raw(json!({"kind": "ConfigMap"})),
            raw(json!({"kind": "ConfigMap", "metadata": "broken"})),
            raw(json!({"kind": "ConfigMap", "metadata": {"name": ""}})),
            raw(json!({"kind": "ConfigMap", "metadata": {"name": "kept"}})),
        ];

        let resources = ResourceConverter::default().convert_all(&objects, "ns");
        assert_eq!(resources.len(), 1);
        assert_eq!(resources[0].name(), "kept");
    }

    #[test]
    fn bad_timestamp_is_ignored() {
        let obj = raw(json!({
            "kind": "ConfigMap",
            "metadata": {"name": "a", "creationTimestamp": "yesterday"}
        }));
        let res = ResourceConverter::default().convert(&obj, "ns").unwrap();
        assert!(res.creation_timestamp.is_none());
    }

    #[test]
    fn hash_ignores_volatile_fields_and_key_order() {
        let a = raw(json!({
            "kind": "ConfigMap",
            "metadata": {"name": "cfg", "uid": "1", "resourceVersion": "10"},
            "data": {"x": "1", "y": "2"}
        }));
        let b = raw(json!({
            "data": {"y": "2", "x": "1"},
            "metadata": {"resourceVersion": "99", "name": "cfg", "uid": "2", "generation": 4},
            "kind": "ConfigMap"
        }));
        assert_eq!(content_hash(&a).unwrap(), content_hash(&b).unwrap());

        let c = raw(json!({
            "kind": "ConfigMap",
            "metadata": {"name": "cfg"},
            "data": {"x": "1", "y": "3"}
        }));
        assert_ne!(content_hash(&a).unwrap(), content_hash(&c).unwrap());

        let hashed = ResourceConverter::new(true).convert(&a, "ns").unwrap();
        assert_eq!(hashed.content_hash, Some(content_hash(&a).unwrap()));
        assert_eq!(content_hash(&a).unwrap().len(), 64);
    }

    #[test]
    fn hash_sees_annotations_with_non_string_values() {
        let with_flag = |enabled: bool| {
            raw(json!({
                "kind": "ConfigMap",
                "metadata": {"name": "cfg", "annotations": {"feature": enabled}}
            }))
        };
        assert_ne!(
            content_hash(&with_flag(true)).unwrap(),
            content_hash(&with_flag(false)).unwrap()
        );
    }
}
