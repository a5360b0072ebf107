//! Typed view over untyped Kubernetes API documents.
//!
//! The wire client hands back objects exactly as the API server returned
//! them. [`RawObject`] validates the handful of fields the scanner cares
//! about once, at deserialization time, and keeps everything else in an
//! opaque JSON bag so the full document can still be hashed.
//!
//! Deserialization is lenient: a field of the wrong JSON type is treated as
//! absent instead of failing the whole object, though the original value is
//! still part of the hashed content. Objects whose metadata is
//! missing or not an object deserialize with `metadata: None` and are
//! dropped later by the converter.

use std::collections::BTreeMap;

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

use crate::resource::OwnerReference;

/// A Kubernetes object as returned by the API server.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawObject {
    /// `apiVersion` of the object.
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "lenient_string"
    )]
    pub api_version: Option<String>,

    /// `kind` of the object.
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "lenient_string"
    )]
    pub kind: Option<String>,

    /// Object metadata, `None` when missing or malformed.
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "lenient_metadata"
    )]
    pub metadata: Option<RawMetadata>,

    /// Everything else (`spec`, `data`, `status`, ...).
    #[serde(flatten)]
    pub body: Map<String, Value>,
}

/// The known fields of `metadata`, plus the rest as an opaque bag.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawMetadata {
    /// Object name.
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "lenient_string"
    )]
    pub name: Option<String>,

    /// Object namespace.
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "lenient_string"
    )]
    pub namespace: Option<String>,

    /// Object UID.
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "lenient_string"
    )]
    pub uid: Option<String>,

    /// RFC 3339 creation timestamp.
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "lenient_string"
    )]
    pub creation_timestamp: Option<String>,

    /// Resource version, bumped on every write.
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "lenient_string"
    )]
    pub resource_version: Option<String>,

    /// Generation counter.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub generation: Option<Value>,

    /// Labels with string values.
    #[serde(
        default,
        skip_serializing_if = "BTreeMap::is_empty",
        deserialize_with = "lenient_string_map"
    )]
    pub labels: BTreeMap<String, String>,

    /// Annotations with string values.
    #[serde(
        default,
        skip_serializing_if = "BTreeMap::is_empty",
        deserialize_with = "lenient_string_map"
    )]
    pub annotations: BTreeMap<String, String>,

    /// Owner references in API order.
    #[serde(
        default,
        skip_serializing_if = "Vec::is_empty",
        deserialize_with = "lenient_owner_references"
    )]
    pub owner_references: Vec<OwnerReference>,

    /// Server-side apply bookkeeping.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub managed_fields: Option<Value>,

    /// Remaining metadata fields.
    #[serde(flatten)]
    pub extra: Map<String, Value>,

    /// Original values of known fields that did not parse cleanly, such as
    /// labels with non-string values. Only used for hashing.
    #[serde(skip)]
    pub unparsed: Map<String, Value>,
}

impl RawObject {
    /// Build a raw object from a decoded JSON document.
    ///
    /// # Errors
    ///
    /// Returns an error if `value` is not a JSON object.
    pub fn from_value(value: Value) -> Result<Self, serde_json::Error> {
        serde_json::from_value(value)
    }

    /// Object name, if present.
    #[must_use]
    pub fn name(&self) -> Option<&str> {
        self.metadata.as_ref()?.name.as_deref()
    }

    /// Object UID, if present.
    #[must_use]
    pub fn uid(&self) -> Option<&str> {
        self.metadata.as_ref()?.uid.as_deref()
    }

    /// Object namespace, if present.
    #[must_use]
    pub fn namespace(&self) -> Option<&str> {
        self.metadata.as_ref()?.namespace.as_deref()
    }

    /// The document with volatile metadata removed and all keys sorted.
    ///
    /// Known metadata fields that were only partly understood (a label with
    /// a numeric value, an unreadable owner reference) appear with their
    /// original value, so they still count towards the content.
    ///
    /// `resourceVersion`, `uid`, `generation`, `creationTimestamp` and
    /// `managedFields` change on every API write without representing a
    /// change to the object, so they are stripped. If nothing is left in
    /// `metadata`, the key is dropped entirely.
    ///
    /// # Errors
    ///
    /// Returns an error if the object cannot be serialized.
    pub fn canonical_document(&self) -> Result<Value, serde_json::Error> {
        let mut stripped = self.clone();
        if let Some(metadata) = stripped.metadata.as_mut() {
            metadata.resource_version = None;
            metadata.uid = None;
            metadata.generation = None;
            metadata.creation_timestamp = None;
            metadata.managed_fields = None;
        }

        let unparsed = stripped
            .metadata
            .as_mut()
            .map(|metadata| std::mem::take(&mut metadata.unparsed))
            .unwrap_or_default();

        let mut document = serde_json::to_value(&stripped)?;
        if let Value::Object(map) = &mut document {
            if !unparsed.is_empty() {
                if let Some(Value::Object(metadata)) = map.get_mut("metadata") {
                    metadata.extend(unparsed);
                }
            }
            let empty_metadata = map
                .get("metadata")
                .and_then(Value::as_object)
                .is_some_and(Map::is_empty);
            if empty_metadata {
                map.remove("metadata");
            }
        }

        Ok(canonicalize(document))
    }
}

/// Recursively rebuild every object with its keys in sorted order.
fn canonicalize(value: Value) -> Value {
    match value {
        Value::Object(map) => {
            let sorted: BTreeMap<String, Value> = map
                .into_iter()
                .map(|(key, value)| (key, canonicalize(value)))
                .collect();
            Value::Object(sorted.into_iter().collect())
        }
        Value::Array(items) => Value::Array(items.into_iter().map(canonicalize).collect()),
        other => other,
    }
}

fn lenient_string<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Value::deserialize(deserializer)? {
        Value::String(s) => Some(s),
        _ => None,
    })
}

pub(crate) fn lenient_string_or_empty<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    lenient_string(deserializer).map(Option::unwrap_or_default)
}

fn lenient_string_map<'de, D>(deserializer: D) -> Result<BTreeMap<String, String>, D::Error>
where
    D: Deserializer<'de>,
{
    let Value::Object(map) = Value::deserialize(deserializer)? else {
        return Ok(BTreeMap::new());
    };

    Ok(map
        .into_iter()
        .filter_map(|(key, value)| match value {
            Value::String(s) => Some((key, s)),
            _ => None,
        })
        .collect())
}

fn lenient_owner_references<'de, D>(deserializer: D) -> Result<Vec<OwnerReference>, D::Error>
where
    D: Deserializer<'de>,
{
    let Value::Array(items) = Value::deserialize(deserializer)? else {
        return Ok(Vec::new());
    };

    Ok(items
        .into_iter()
        .filter(Value::is_object)
        .filter_map(|item| serde_json::from_value(item).ok())
        .collect())
}

fn lenient_metadata<'de, D>(deserializer: D) -> Result<Option<RawMetadata>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    let Value::Object(fields) = &value else {
        return Ok(None);
    };
    let unparsed = unparsed_fields(fields);

    Ok(serde_json::from_value::<RawMetadata>(value)
        .ok()
        .map(|metadata| RawMetadata { unparsed, ..metadata }))
}

fn is_clean_owner_reference(item: &Value) -> bool {
    item.as_object().is_some_and(|reference| {
        ["apiVersion", "kind", "name", "uid"]
            .iter()
            .filter_map(|field| reference.get(*field))
            .all(Value::is_string)
    })
}

/// Known metadata fields whose value the lenient deserializers would lose.
fn unparsed_fields(fields: &Map<String, Value>) -> Map<String, Value> {
    fields
        .iter()
        .filter(|(key, value)| match key.as_str() {
            "name" | "namespace" => !value.is_string(),
            "labels" | "annotations" => !value
                .as_object()
                .is_some_and(|map| map.values().all(Value::is_string)),
            "ownerReferences" => !value
                .as_array()
                .is_some_and(|items| items.iter().all(is_clean_owner_reference)),
            _ => false,
        })
        .map(|(key, value)| (key.clone(), value.clone()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn parses_known_metadata() {
        let raw = RawObject::from_value(json!({
            "apiVersion": "apps/v1",
            "kind": "Deployment",
            "metadata": {
                "name": "web",
                "namespace": "shop",
                "uid": "1234",
                "labels": {"app": "web", "replicas": 3},
                "ownerReferences": [
                    {"apiVersion": "v1", "kind": "Thing", "name": "owner", "uid": "9"},
                    "garbage"
                ]
            },
            "spec": {"replicas": 2}
        }))
        .unwrap();

        assert_eq!(raw.api_version.as_deref(), Some("apps/v1"));
        assert_eq!(raw.name(), Some("web"));
        assert_eq!(raw.uid(), Some("1234"));
        assert_eq!(raw.namespace(), Some("shop"));

        let metadata = raw.metadata.as_ref().unwrap();
        assert_eq!(metadata.labels.len(), 1);
        assert_eq!(metadata.owner_references.len(), 1);
        assert_eq!(metadata.owner_references[0].kind, "Thing");
        assert_eq!(raw.body.get("spec"), Some(&json!({"replicas": 2})));
    }

    #[test]
    fn malformed_metadata_is_absent() {
        let raw = RawObject::from_value(json!({"kind": "ConfigMap", "metadata": "oops"})).unwrap();
        assert!(raw.metadata.is_none());

        let raw = RawObject::from_value(json!({"kind": 7})).unwrap();
        assert!(raw.kind.is_none());
        assert!(raw.metadata.is_none());
    }

    #[test]
    fn canonical_document_strips_volatile_fields() {
        let raw = RawObject::from_value(json!({
            "kind": "ConfigMap",
            "metadata": {
                "name": "cfg",
                "uid": "1",
                "resourceVersion": "42",
                "generation": 3,
                "creationTimestamp": "2024-01-01T00:00:00Z",
                "managedFields": [{"manager": "kubectl"}]
            },
            "data": {"b": "2", "a": "1"}
        }))
        .unwrap();

        let doc = raw.canonical_document().unwrap();
        assert_eq!(
            doc,
            json!({"kind": "ConfigMap", "metadata": {"name": "cfg"}, "data": {"a": "1", "b": "2"}})
        );

        let keys: Vec<&String> = doc["data"].as_object().unwrap().keys().collect();
        assert_eq!(keys, vec!["a", "b"]);
    }

    #[test]
    fn canonical_document_drops_empty_metadata() {
        let raw = RawObject::from_value(json!({
            "kind": "ConfigMap",
            "metadata": {"uid": "1", "resourceVersion": "7"}
        }))
        .unwrap();

        assert_eq!(raw.canonical_document().unwrap(), json!({"kind": "ConfigMap"}));
    }

    #[test]
    fn canonical_document_keeps_non_string_metadata_values() {
        let doc = |replicas: Value| {
            RawObject::from_value(json!({
                "kind": "ConfigMap",
                "metadata": {"name": "cfg", "labels": {"app": "web", "replicas": replicas}}
            }))
            .unwrap()
        };
        let two = doc(json!(2));
        let three = doc(json!(3));

        assert_eq!(two.metadata.as_ref().unwrap().labels.len(), 1);
        assert_eq!(
            two.canonical_document().unwrap()["metadata"]["labels"],
            json!({"app": "web", "replicas": 2})
        );
        assert_ne!(
            two.canonical_document().unwrap(),
            three.canonical_document().unwrap()
        );
    }

    #[test]
    fn canonical_document_keeps_unreadable_owner_references() {
        let raw = RawObject::from_value(json!({
            "kind": "Pod",
            "metadata": {
                "name": "web-1",
                "ownerReferences": [{"kind": "ReplicaSet", "name": "web", "uid": 7}, "garbage"]
            }
        }))
        .unwrap();

        assert_eq!(
            raw.canonical_document().unwrap()["metadata"]["ownerReferences"],
            json!([{"kind": "ReplicaSet", "name": "web", "uid": 7}, "garbage"])
        );

        let clean = RawObject::from_value(json!({
            "kind": "Pod",
            "metadata": {"name": "web-1", "labels": {"app": "web"}}
        }))
        .unwrap();
        assert!(clean.metadata.as_ref().unwrap().unparsed.is_empty());
    }
}
