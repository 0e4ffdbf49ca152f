//! Pattern-based invalidation
//!
//! Patterns are written against logical keys: the active namespace prefix
//! is stripped before matching, and only keys owned by the active namespace
//! are ever candidates for removal.

use crate::core::keys::PARAMS_DELIMITER;
use crate::identity::Namespace;
use regex::Regex;

/// What to invalidate
#[derive(Debug, Clone)]
pub enum InvalidationPattern {
    /// The key itself and every parameterised variant (`key:{...}`)
    Exact(String),
    /// Any key whose logical part matches the expression
    Regex(Regex),
}

impl InvalidationPattern {
    /// Check a logical (unprefixed) key against the pattern
    pub fn matches(&self, logical_key: &str) -> bool {
        match self {
            Self::Exact(pattern) => {
                logical_key == pattern
                    || logical_key
                        .strip_prefix(pattern.as_str())
                        .is_some_and(|rest| rest.starts_with(PARAMS_DELIMITER))
            }
            Self::Regex(regex) => regex.is_match(logical_key),
        }
    }
}

impl From<&str> for InvalidationPattern {
    fn from(value: &str) -> Self {
        Self::Exact(value.to_string())
    }
}

impl From<String> for InvalidationPattern {
    fn from(value: String) -> Self {
        Self::Exact(value)
    }
}

impl From<&crate::core::CacheKey> for InvalidationPattern {
    fn from(value: &crate::core::CacheKey) -> Self {
        Self::Exact(value.as_str().to_string())
    }
}

impl From<Regex> for InvalidationPattern {
    fn from(value: Regex) -> Self {
        Self::Regex(value)
    }
}

/// Set of scoped keys an invalidation or clear applies to
#[derive(Debug, Clone)]
pub struct KeyScope {
    namespace: Namespace,
    pattern: Option<InvalidationPattern>,
}

impl KeyScope {
    /// Every key owned by `namespace`
    pub fn all(namespace: Namespace) -> Self {
        Self {
            namespace,
            pattern: None,
        }
    }

    /// Keys owned by `namespace` whose logical part matches `pattern`
    ///
    /// An exact pattern that already carries the namespace prefix is
    /// normalised to its logical form.
    pub fn matching(namespace: Namespace, pattern: InvalidationPattern) -> Self {
        let pattern = match pattern {
            InvalidationPattern::Exact(p) if !namespace.is_anonymous() => {
                InvalidationPattern::Exact(namespace.strip(&p).to_string())
            }
            other => other,
        };
        Self {
            namespace,
            pattern: Some(pattern),
        }
    }

    pub fn namespace(&self) -> &Namespace {
        &self.namespace
    }

    /// Check a scoped key
    pub fn matches(&self, scoped_key: &str) -> bool {
        if !self.namespace.owns(scoped_key) {
            return false;
        }
        match &self.pattern {
            Some(pattern) => pattern.matches(self.namespace.strip(scoped_key)),
            None => true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exact_matches_parameterised_variants() {
        let scope = KeyScope::matching(Namespace::anonymous(), "orders".into());
        assert!(scope.matches("orders"));
        assert!(scope.matches(r#"orders:{"id":1}"#));
        assert!(!scope.matches("ordersHistory"));
        assert!(!scope.matches("order"));
    }

    #[test]
    fn test_scope_is_limited_to_namespace() {
        let alice = Namespace::for_identity("alice");
        let scope = KeyScope::matching(alice, "orders".into());
        assert!(scope.matches("user_alice_orders"));
        assert!(!scope.matches("user_bob_orders"));
        assert!(!scope.matches("orders"));
    }

    #[test]
    fn test_prefixed_exact_pattern_is_normalised() {
        let alice = Namespace::for_identity("alice");
        let scope = KeyScope::matching(alice, "user_alice_orders".into());
        assert!(scope.matches(r#"user_alice_orders:{"id":2}"#));
    }

    #[test]
    fn test_regex_ignores_identity_prefix() {
        let alice = Namespace::for_identity("alice");
        let pattern = InvalidationPattern::from(Regex::new(r"^orders").unwrap());
        let scope = KeyScope::matching(alice, pattern);
        assert!(scope.matches("user_alice_ordersHistory"));
        assert!(!scope.matches("user_alice_widgets"));
        assert!(!scope.matches("user_bob_orders"));
    }

    #[test]
    fn test_all_scope() {
        let scope = KeyScope::all(Namespace::for_identity("1"));
        assert!(scope.matches("user_1_anything"));
        assert!(!scope.matches("user_2_anything"));

        let anon = KeyScope::all(Namespace::anonymous());
        assert!(anon.matches("anything"));
        assert!(!anon.matches("user_2_anything"));
    }
}
