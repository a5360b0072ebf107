//! Namespace selection by regular expression.

use regex::Regex;
use tracing::warn;

fn compile(pattern: Option<&str>, flag: &str) -> Option<Regex> {
    let pattern = pattern.filter(|p| !p.is_empty())?;
    match Regex::new(pattern) {
        Ok(re) => Some(re),
        Err(err) => {
            warn!(flag, pattern, error = %err, "Ignoring invalid namespace pattern");
            None
        }
    }
}

/// Keep namespaces matching `include` and not matching `exclude`.
///
/// An invalid pattern is logged and ignored.
pub fn filter_namespaces(
    namespaces: Vec<String>,
    include: Option<&str>,
    exclude: Option<&str>,
) -> Vec<String> {
    let include = compile(include, "--regex");
    let exclude = compile(exclude, "--exclude");

    namespaces
        .into_iter()
        .filter(|ns| match &include {
            Some(re) => re.is_match(ns),
            None => true,
        })
        .filter(|ns| !exclude.as_ref().is_some_and(|re| re.is_match(ns)))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn all() -> Vec<String> {
        ["shop-dev", "shop-prod", "billing-prod", "monitoring"]
            .map(String::from)
            .to_vec()
    }

    #[test]
    fn include_then_exclude() {
        let selected = filter_namespaces(all(), Some("-prod$"), Some("^billing"));
        assert_eq!(selected, vec!["shop-prod"]);
    }

    #[test]
    fn no_patterns_keep_everything() {
        assert_eq!(filter_namespaces(all(), None, Some("")).len(), 4);
    }

    #[test]
    fn invalid_patterns_are_ignored() {
        let selected = filter_namespaces(all(), Some("(unclosed"), Some("^monitoring$"));
        assert_eq!(selected, vec!["shop-dev", "shop-prod", "billing-prod"]);
    }
}
