//! Wildcard matching for exclusion rules.
//!
//! Patterns support a single `*` wildcard:
//!
//! - `*` matches any value, including the empty string
//! - `prefix*` matches values starting with `prefix`
//! - `*suffix` matches values ending with `suffix`
//! - `head*tail` matches values starting with `head` and ending with `tail`
//!
//! A pattern with more than one internal wildcard is compared literally.

use serde::{Deserialize, Serialize};

/// Match `value` against a wildcard `pattern`.
///
/// This is a total function: it never fails, and an empty pattern matches
/// only the empty value.
#[must_use]
pub fn matches_pattern(pattern: &str, value: &str) -> bool {
    if pattern == "*" {
        return true;
    }

    if let Some(prefix) = pattern.strip_suffix('*') {
        return value.starts_with(prefix);
    }

    if let Some(suffix) = pattern.strip_prefix('*') {
        return value.ends_with(suffix);
    }

    if let Some((head, tail)) = pattern.split_once('*') {
        // Only one internal wildcard is understood; anything more falls
        // through to literal comparison.
        if !tail.contains('*') {
            return value.starts_with(head) && value.ends_with(tail);
        }
    }

    pattern == value
}

/// An exclusion rule over `namespace/Kind/name` triples.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ExclusionRule {
    /// Namespace pattern.
    pub namespace: String,
    /// Kind pattern.
    pub kind: String,
    /// Name pattern.
    pub name: String,
}

impl ExclusionRule {
    /// Create a rule from its three patterns.
    #[must_use]
    pub fn new(
        namespace: impl Into<String>,
        kind: impl Into<String>,
        name: impl Into<String>,
    ) -> Self {
        Self {
            namespace: namespace.into(),
            kind: kind.into(),
            name: name.into(),
        }
    }

    /// Parse a `namespace/Kind/name` rule string.
    ///
    /// Returns `None` unless the string has exactly three `/`-separated parts.
    #[must_use]
    pub fn parse(rule: &str) -> Option<Self> {
        let mut parts = rule.split('/');
        let namespace = parts.next()?;
        let kind = parts.next()?;
        let name = parts.next()?;
        if parts.next().is_some() {
            return None;
        }
        Some(Self::new(namespace, kind, name))
    }

    /// Whether this rule excludes an entire namespace (`ns/*/*`).
    #[must_use]
    pub fn is_whole_namespace(&self) -> bool {
        self.kind == "*" && self.name == "*"
    }

    /// Check whether all three components match.
    #[must_use]
    pub fn matches(&self, namespace: &str, kind: &str, name: &str) -> bool {
        matches_pattern(&self.namespace, namespace)
            && matches_pattern(&self.kind, kind)
            && matches_pattern(&self.name, name)
    }
}

impl std::fmt::Display for ExclusionRule {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}/{}", self.namespace, self.kind, self.name)
    }
}
