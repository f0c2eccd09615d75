//! Capability registration and startup validation.
//!
//! Collects the fallback chains an application configures, one per
//! capability, and checks at startup that every capability declared for
//! fallback actually has an ordered chain with something to fall back to.

use crate::application::executor::FallbackExecutor;
use crate::domain::failure::ConfigError;
use std::any::{type_name, Any, TypeId};
use std::collections::HashMap;
use std::fmt;

struct Registration {
    capability: &'static str,
    chain: Option<Chain>,
}

struct Chain {
    failure_type: TypeId,
    len: usize,
    executor: Box<dyn Any + Send + Sync>,
}

/// Collection of configured fallback chains, keyed by capability.
///
/// # Example
/// ```
/// use resilient_fallback::{CapabilityRegistry, ConfigError};
///
/// trait Mailer: Send + Sync {}
///
/// let mut registry = CapabilityRegistry::new();
/// registry.declare::<dyn Mailer>();
///
/// assert!(matches!(registry.validate(), Err(ConfigError::Unordered(_))));
/// ```
#[derive(Default)]
pub struct CapabilityRegistry {
    registrations: HashMap<TypeId, Registration>,
}

impl CapabilityRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Declare `C` as a capability that expects a fallback chain.
    ///
    /// Has no effect if a chain is already registered for `C`.
    pub fn declare<C: ?Sized + 'static>(&mut self) -> &mut Self {
        self.registrations
            .entry(TypeId::of::<C>())
            .or_insert_with(|| Registration {
                capability: type_name::<C>(),
                chain: None,
            });
        self
    }

    /// Register the chain for the capability `C`, replacing any previous one.
    pub fn register<C, E>(&mut self, executor: FallbackExecutor<C, E>) -> &mut Self
    where
        C: ?Sized + Send + Sync + 'static,
        E: 'static,
    {
        let registration = Registration {
            capability: executor.capability(),
            chain: Some(Chain {
                failure_type: TypeId::of::<E>(),
                len: executor.len(),
                executor: Box::new(executor),
            }),
        };
        self.registrations.insert(TypeId::of::<C>(), registration);
        self
    }

    /// Get the chain registered for `C` with failure type `E`.
    ///
    /// Returns a cheap clone sharing state with the registered executor.
    pub fn get<C, E>(&self) -> Option<FallbackExecutor<C, E>>
    where
        C: ?Sized + Send + Sync + 'static,
        E: 'static,
    {
        self.registrations
            .get(&TypeId::of::<C>())
            .and_then(|registration| registration.chain.as_ref())
            .filter(|chain| chain.failure_type == TypeId::of::<E>())
            .and_then(|chain| chain.executor.downcast_ref::<FallbackExecutor<C, E>>())
            .cloned()
    }

    /// Check if `C` was declared or registered.
    pub fn contains<C: ?Sized + 'static>(&self) -> bool {
        self.registrations.contains_key(&TypeId::of::<C>())
    }

    /// Number of known capabilities.
    pub fn len(&self) -> usize {
        self.registrations.len()
    }

    /// Check if nothing was declared or registered.
    pub fn is_empty(&self) -> bool {
        self.registrations.is_empty()
    }

    /// Validate the configuration once at startup.
    ///
    /// # Errors
    /// - [`ConfigError::Unordered`] naming every capability declared without
    ///   a chain
    /// - [`ConfigError::WithoutFallbacks`] naming every capability whose
    ///   chain has fewer than two implementations
    ///
    /// Unordered capabilities are reported first.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let unordered = self.capabilities_where(|registration| registration.chain.is_none());
        if !unordered.is_empty() {
            return Err(ConfigError::Unordered(unordered));
        }

        let without_fallbacks = self.capabilities_where(|registration| {
            registration
                .chain
                .as_ref()
                .is_some_and(|chain| chain.len < 2)
        });
        if !without_fallbacks.is_empty() {
            return Err(ConfigError::WithoutFallbacks(without_fallbacks));
        }

        Ok(())
    }

    fn capabilities_where<F>(&self, predicate: F) -> Vec<&'static str>
    where
        F: Fn(&Registration) -> bool,
    {
        let mut names: Vec<_> = self
            .registrations
            .values()
            .filter(|registration| predicate(registration))
            .map(|registration| registration.capability)
            .collect();
        names.sort_unstable();
        names
    }
}

impl fmt::Debug for CapabilityRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut map = f.debug_map();
        for registration in self.registrations.values() {
            map.entry(
                &registration.capability,
                &registration.chain.as_ref().map(|chain| chain.len),
            );
        }
        map.finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::failure::ResolveError;
    use std::sync::Arc;

    #[derive(Debug, thiserror::Error)]
    enum TestError {
        #[error(transparent)]
        Resolve(#[from] ResolveError),
    }

    #[derive(Debug, thiserror::Error)]
    #[error(transparent)]
    struct OtherError(#[from] ResolveError);

    trait Mailer: Send + Sync {}
    trait Storage: Send + Sync {}

    struct Smtp;
    struct Sendgrid;
    struct Disk;

    impl Mailer for Smtp {}
    impl Mailer for Sendgrid {}
    impl Storage for Disk {}

    fn mailer_chain() -> FallbackExecutor<dyn Mailer, TestError> {
        FallbackExecutor::<dyn Mailer, TestError>::builder()
            .with_instance(Arc::new(Smtp))
            .with_instance(Arc::new(Sendgrid))
            .build()
            .unwrap()
    }

    fn storage_chain() -> FallbackExecutor<dyn Storage, TestError> {
        FallbackExecutor::<dyn Storage, TestError>::builder()
            .with_instance(Arc::new(Disk))
            .build()
            .unwrap()
    }

    #[test]
    fn test_valid_configuration() {
        let mut registry = CapabilityRegistry::new();
        registry.declare::<dyn Mailer>().register(mailer_chain());

        assert!(registry.validate().is_ok());
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_declared_without_chain_is_unordered() {
        let mut registry = CapabilityRegistry::new();
        registry.declare::<dyn Mailer>();

        let err = registry.validate().unwrap_err();
        match err {
            ConfigError::Unordered(names) => {
                assert_eq!(names.len(), 1);
                assert!(names[0].contains("Mailer"));
            }
            other => panic!("expected unordered error, got {:?}", other),
        }
    }

    #[test]
    fn test_single_implementation_has_no_fallbacks() {
        let mut registry = CapabilityRegistry::new();
        registry.register(mailer_chain()).register(storage_chain());

        let err = registry.validate().unwrap_err();
        match err {
            ConfigError::WithoutFallbacks(names) => {
                assert_eq!(names.len(), 1);
                assert!(names[0].contains("Storage"));
            }
            other => panic!("expected without-fallbacks error, got {:?}", other),
        }
    }

    #[test]
    fn test_unordered_reported_before_missing_fallbacks() {
        let mut registry = CapabilityRegistry::new();
        registry.declare::<dyn Mailer>().register(storage_chain());

        assert!(matches!(registry.validate(), Err(ConfigError::Unordered(_))));
    }

    #[test]
    fn test_declare_does_not_clear_registered_chain() {
        let mut registry = CapabilityRegistry::new();
        registry.register(mailer_chain()).declare::<dyn Mailer>();

        assert!(registry.validate().is_ok());
    }

    #[test]
    fn test_get_returns_shared_executor() {
        let mut registry = CapabilityRegistry::new();
        let chain = mailer_chain();
        registry.register(chain.clone());

        let found = registry.get::<dyn Mailer, TestError>().unwrap();
        found.metrics().record_execution();

        assert_eq!(chain.metrics().executions(), 1);
        assert_eq!(found.len(), 2);
    }

    #[test]
    fn test_get_with_wrong_failure_type() {
        let mut registry = CapabilityRegistry::new();
        registry.register(mailer_chain());

        assert!(registry.get::<dyn Mailer, OtherError>().is_none());
        assert!(registry.get::<dyn Storage, TestError>().is_none());
        assert!(registry.contains::<dyn Mailer>());
        assert!(!registry.contains::<dyn Storage>());
    }

    #[test]
    fn test_empty_registry_is_valid() {
        let registry = CapabilityRegistry::new();

        assert!(registry.validate().is_ok());
        assert!(registry.is_empty());
    }
}
