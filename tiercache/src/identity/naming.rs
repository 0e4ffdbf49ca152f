//! Identity-Scoped Key Naming
//!
//! Implements the naming convention for per-identity cache isolation.
//! Keys are prefixed with `user_{id}_` so that data cached for one identity
//! is never served to another on a shared device. The anonymous namespace
//! is the empty prefix.

use std::fmt;

/// Marker every named namespace starts with
pub const NAMESPACE_MARKER: &str = "user_";

/// Namespace prefix derived from the active identity
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct Namespace(String);

impl Namespace {
    /// Namespace for a resolved identity
    ///
    /// `%` and `_` in the id are percent-escaped, so the encoded id never
    /// contains the terminating `_` and no namespace is a prefix of another.
    ///
    /// # Example
    /// ```ignore
    /// let ns = Namespace::for_identity("42");
    /// // Result: "user_42_"
    /// let ns = Namespace::for_identity("1_2");
    /// // Result: "user_1%5F2_"
    /// ```
    pub fn for_identity(id: &str) -> Self {
        Self(format!("{NAMESPACE_MARKER}{}_", escape_id(id)))
    }

    /// The unnamespaced, pre-login namespace
    pub fn anonymous() -> Self {
        Self(String::new())
    }

    pub fn is_anonymous(&self) -> bool {
        self.0.is_empty()
    }

    pub fn prefix(&self) -> &str {
        &self.0
    }

    /// Scope a key to this namespace
    ///
    /// Keys already carrying the prefix (e.g. produced by the key generator)
    /// are returned unchanged.
    pub fn scope(&self, key: &str) -> String {
        if self.is_anonymous() || key.starts_with(&self.0) {
            key.to_string()
        } else {
            format!("{}{}", self.0, key)
        }
    }

    /// Remove this namespace's prefix, if present
    pub fn strip<'a>(&self, key: &'a str) -> &'a str {
        key.strip_prefix(self.0.as_str()).unwrap_or(key)
    }

    /// Check if a scoped key belongs to this namespace
    ///
    /// The anonymous namespace owns every key that carries no identity
    /// prefix.
    pub fn owns(&self, scoped_key: &str) -> bool {
        if self.is_anonymous() {
            !scoped_key.starts_with(NAMESPACE_MARKER)
        } else {
            scoped_key.starts_with(&self.0)
        }
    }
}

fn escape_id(id: &str) -> String {
    let mut escaped = String::with_capacity(id.len());
    for c in id.chars() {
        match c {
            '%' => escaped.push_str("%25"),
            '_' => escaped.push_str("%5F"),
            c => escaped.push(c),
        }
    }
    escaped
}

impl fmt::Display for Namespace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_anonymous() {
            f.write_str("<anonymous>")
        } else {
            f.write_str(&self.0)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format() {
        assert_eq!(Namespace::for_identity("42").prefix(), "user_42_");
        assert_eq!(Namespace::anonymous().prefix(), "");
    }

    #[test]
    fn test_scope_is_idempotent() {
        let ns = Namespace::for_identity("7");
        let scoped = ns.scope("orders");
        assert_eq!(scoped, "user_7_orders");
        assert_eq!(ns.scope(&scoped), scoped);
    }

    #[test]
    fn test_anonymous_scope_passes_through() {
        assert_eq!(Namespace::anonymous().scope("orders"), "orders");
    }

    #[test]
    fn test_strip() {
        let ns = Namespace::for_identity("7");
        assert_eq!(ns.strip("user_7_orders:{}"), "orders:{}");
        assert_eq!(ns.strip("orders"), "orders");
    }

    #[test]
    fn test_owns() {
        let alice = Namespace::for_identity("alice");
        let bob = Namespace::for_identity("bob");
        let anon = Namespace::anonymous();

        assert!(alice.owns("user_alice_orders"));
        assert!(!bob.owns("user_alice_orders"));
        assert!(!anon.owns("user_alice_orders"));
        assert!(anon.owns("orders"));
        assert!(!alice.owns("orders"));
    }

    #[test]
    fn test_overlapping_ids_are_isolated() {
        let one = Namespace::for_identity("1");
        let one_two = Namespace::for_identity("1_2");
        assert_eq!(one_two.prefix(), "user_1%5F2_");

        let theirs = one_two.scope("orders");
        assert!(!one.owns(&theirs));
        assert!(one_two.owns(&theirs));
        assert!(!one_two.owns(&one.scope("orders")));
    }

    #[test]
    fn test_escape_is_injective() {
        assert_ne!(
            Namespace::for_identity("a_b"),
            Namespace::for_identity("a%5Fb")
        );
    }

    #[test]
    fn test_display() {
        assert_eq!(Namespace::anonymous().to_string(), "<anonymous>");
        assert_eq!(Namespace::for_identity("1").to_string(), "user_1_");
    }
}
