use super::naming::Namespace;
use crate::core::error::IdentityError;
use async_trait::async_trait;
use parking_lot::RwLock;
use std::sync::Arc;
use tracing::{debug, warn};

/// Source of the currently authenticated identity
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    /// Stable identifier of the active identity, or `None` when logged out
    async fn current_identity_id(&self) -> Result<Option<String>, IdentityError>;
}

/// In-process identity holder that can be switched at runtime
#[derive(Debug, Clone, Default)]
pub struct StaticIdentity {
    current: Arc<RwLock<Option<String>>>,
}

impl StaticIdentity {
    pub fn new(id: Option<String>) -> Self {
        Self {
            current: Arc::new(RwLock::new(id)),
        }
    }

    pub fn login(&self, id: impl Into<String>) {
        *self.current.write() = Some(id.into());
    }

    pub fn logout(&self) {
        *self.current.write() = None;
    }
}

#[async_trait]
impl IdentityProvider for StaticIdentity {
    async fn current_identity_id(&self) -> Result<Option<String>, IdentityError> {
        Ok(self.current.read().clone())
    }
}

/// Derives the cache namespace from the active identity
///
/// Provider failures never reach callers; an unreachable provider resolves
/// to the anonymous namespace.
#[derive(Clone, Default)]
pub struct IdentityResolver {
    provider: Option<Arc<dyn IdentityProvider>>,
}

impl IdentityResolver {
    pub fn new(provider: Arc<dyn IdentityProvider>) -> Self {
        Self {
            provider: Some(provider),
        }
    }

    /// Resolver that always yields the anonymous namespace
    pub fn anonymous() -> Self {
        Self { provider: None }
    }

    /// Resolve the namespace for the active identity
    pub async fn resolve_namespace(&self) -> Namespace {
        let Some(provider) = &self.provider else {
            return Namespace::anonymous();
        };

        match provider.current_identity_id().await {
            Ok(Some(id)) if !id.is_empty() => Namespace::for_identity(&id),
            Ok(_) => {
                debug!("No active identity, using anonymous namespace");
                Namespace::anonymous()
            }
            Err(e) => {
                warn!(error = %e, "Identity lookup failed, using anonymous namespace");
                Namespace::anonymous()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Unreachable;

    #[async_trait]
    impl IdentityProvider for Unreachable {
        async fn current_identity_id(&self) -> Result<Option<String>, IdentityError> {
            Err(IdentityError::Unavailable("connection refused".to_string()))
        }
    }

    #[tokio::test]
    async fn test_resolves_active_identity() {
        let identity = StaticIdentity::new(Some("42".to_string()));
        let resolver = IdentityResolver::new(Arc::new(identity.clone()));

        assert_eq!(resolver.resolve_namespace().await.prefix(), "user_42_");

        identity.logout();
        assert!(resolver.resolve_namespace().await.is_anonymous());

        identity.login("7");
        assert_eq!(resolver.resolve_namespace().await.prefix(), "user_7_");
    }

    #[tokio::test]
    async fn test_provider_failure_is_anonymous() {
        let resolver = IdentityResolver::new(Arc::new(Unreachable));
        assert!(resolver.resolve_namespace().await.is_anonymous());
    }

    #[tokio::test]
    async fn test_empty_id_is_anonymous() {
        let resolver = IdentityResolver::new(Arc::new(StaticIdentity::new(Some(String::new()))));
        assert!(resolver.resolve_namespace().await.is_anonymous());
    }

    #[tokio::test]
    async fn test_no_provider() {
        assert!(IdentityResolver::anonymous().resolve_namespace().await.is_anonymous());
    }
}
