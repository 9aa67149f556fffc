//! Policy resolution and caching

use std::sync::Arc;

use rustc_hash::FxHashMap;
use thiserror::Error;

use crate::error::ErrorListener;
use crate::policy::{
    identities, AccessRestriction, DoNotUse, Final, NoExternalUse, Permissive,
    ProtectedExternally,
};

/// A policy identity could not be resolved
#[derive(Debug, Error)]
#[error("unable to load access restriction class {identity}")]
pub struct PolicyLoadError {
    /// The unresolvable identity
    pub identity: String,
}

type Factory = Box<dyn Fn() -> Arc<dyn AccessRestriction>>;

/// Resolves policy identities to shared policy instances.
///
/// Each identity is resolved at most once per run; an identity that fails to
/// resolve is reported through the listener once and then cached as
/// [`Permissive`] so scanning continues.
pub struct PolicyRegistry {
    cache: FxHashMap<String, Arc<dyn AccessRestriction>>,
    factories: FxHashMap<String, Factory>,
}

impl PolicyRegistry {
    /// Create a registry knowing the built-in policies
    pub fn new() -> Self {
        Self {
            cache: FxHashMap::default(),
            factories: FxHashMap::default(),
        }
    }

    /// Register a factory for a non-built-in policy identity
    pub fn register<F>(&mut self, identity: impl Into<String>, factory: F)
    where
        F: Fn() -> Arc<dyn AccessRestriction> + 'static,
    {
        self.factories.insert(identity.into(), Box::new(factory));
    }

    /// The policy instance for an identity, instantiating it on first use
    pub fn resolve(
        &mut self,
        identity: &str,
        listener: &mut dyn ErrorListener,
    ) -> Arc<dyn AccessRestriction> {
        if let Some(cached) = self.cache.get(identity) {
            return Arc::clone(cached);
        }
        let policy = match self.instantiate(identity) {
            Some(policy) => policy,
            None => {
                let error = PolicyLoadError {
                    identity: identity.to_string(),
                };
                listener.on_error(Some(&error), None, &error.to_string());
                Arc::new(Permissive)
            }
        };
        self.cache.insert(identity.to_string(), Arc::clone(&policy));
        policy
    }

    fn instantiate(&self, identity: &str) -> Option<Arc<dyn AccessRestriction>> {
        if let Some(factory) = self.factories.get(identity) {
            return Some(factory());
        }
        match identity {
            identities::NONE => Some(Arc::new(Permissive)),
            identities::DO_NOT_USE => Some(Arc::new(DoNotUse)),
            identities::NO_EXTERNAL_USE => Some(Arc::new(NoExternalUse)),
            identities::FINAL => Some(Arc::new(Final)),
            identities::PROTECTED_EXTERNALLY => Some(Arc::new(ProtectedExternally)),
            _ => None,
        }
    }
}

impl Default for PolicyRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::CollectingListener;

    #[test]
    fn test_builtins_resolve_and_are_shared() {
        let mut registry = PolicyRegistry::new();
        let mut listener = CollectingListener::new();

        let first = registry.resolve(identities::DO_NOT_USE, &mut listener);
        let second = registry.resolve(identities::DO_NOT_USE, &mut listener);
        assert!(Arc::ptr_eq(&first, &second));
        assert!(first.applies_to_nested());
        assert!(listener.reports.is_empty());
    }

    #[test]
    fn test_unknown_identity_reported_once_then_permissive() {
        let mut registry = PolicyRegistry::new();
        let mut listener = CollectingListener::new();

        let policy = registry.resolve("com.example.Missing", &mut listener);
        assert!(!policy.applies_to_nested());
        registry.resolve("com.example.Missing", &mut listener);
        registry.resolve("com.example.Missing", &mut listener);

        assert_eq!(listener.errors().count(), 1);
        assert!(listener
            .errors()
            .next()
            .unwrap()
            .message
            .contains("com.example.Missing"));
    }

    #[test]
    fn test_custom_factory_takes_precedence() {
        let mut registry = PolicyRegistry::new();
        let mut listener = CollectingListener::new();
        registry.register("com.example.Custom", || Arc::new(DoNotUse));

        let policy = registry.resolve("com.example.Custom", &mut listener);
        assert!(policy.applies_to_nested());
        assert!(listener.reports.is_empty());
    }
}
