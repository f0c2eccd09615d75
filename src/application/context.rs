//! Resolution context handed to factories, type-token slots and observers.
//!
//! The context is an explicit table keyed by concrete type. Each entry is
//! either a registered shared instance or a constructor that builds a fresh
//! instance on demand. It is assembled during configuration and read-only
//! afterwards.

use crate::domain::failure::{BoxError, ResolveError};
use std::any::{type_name, Any, TypeId};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

type SharedAny = Arc<dyn Any + Send + Sync>;
type Constructor = Arc<dyn Fn(&ResolutionContext) -> Result<SharedAny, ResolveError> + Send + Sync>;

struct Entry {
    type_name: &'static str,
    instance: Option<SharedAny>,
    constructor: Option<Constructor>,
}

/// Type-keyed table of instances and constructors.
///
/// # Example
/// ```
/// use resilient_fallback::ResolutionContext;
/// use std::sync::Arc;
///
/// struct Settings { region: &'static str }
/// struct Client { region: &'static str }
///
/// let context = ResolutionContext::new()
///     .with_instance(Arc::new(Settings { region: "eu-west" }))
///     .with_constructor(|ctx| {
///         let settings = ctx.resolve::<Settings>()?;
///         Ok(Client { region: settings.region })
///     });
///
/// assert_eq!(context.resolve::<Client>().unwrap().region, "eu-west");
/// ```
#[derive(Default)]
pub struct ResolutionContext {
    entries: HashMap<TypeId, Entry>,
}

impl ResolutionContext {
    /// Create an empty context.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a shared instance of `T`.
    ///
    /// Replaces any instance previously registered for `T`.
    pub fn with_instance<T>(mut self, instance: Arc<T>) -> Self
    where
        T: Send + Sync + 'static,
    {
        self.entry::<T>().instance = Some(instance);
        self
    }

    /// Register a constructor used when no instance of `T` is registered.
    ///
    /// Every resolution without a registered instance calls the constructor
    /// again; constructed values are not cached.
    pub fn with_constructor<T, F>(mut self, constructor: F) -> Self
    where
        T: Send + Sync + 'static,
        F: Fn(&ResolutionContext) -> Result<T, ResolveError> + Send + Sync + 'static,
    {
        self.entry::<T>().constructor = Some(Arc::new(move |ctx: &ResolutionContext| {
            constructor(ctx).map(|value| Arc::new(value) as SharedAny)
        }));
        self
    }

    /// Register a fallible constructor whose error is reported as a
    /// construction failure of `T`.
    pub fn with_try_constructor<T, F, Err>(self, constructor: F) -> Self
    where
        T: Send + Sync + 'static,
        F: Fn(&ResolutionContext) -> Result<T, Err> + Send + Sync + 'static,
        Err: Into<BoxError>,
    {
        self.with_constructor(move |ctx| {
            constructor(ctx).map_err(|err| ResolveError::construction::<T>(err))
        })
    }

    fn entry<T: 'static>(&mut self) -> &mut Entry {
        self.entries.entry(TypeId::of::<T>()).or_insert_with(|| Entry {
            type_name: type_name::<T>(),
            instance: None,
            constructor: None,
        })
    }

    /// Get the registered instance of `T`, if any.
    ///
    /// Constructors are not consulted.
    pub fn get<T>(&self) -> Option<Arc<T>>
    where
        T: Send + Sync + 'static,
    {
        self.entries
            .get(&TypeId::of::<T>())
            .and_then(|entry| entry.instance.clone())
            .and_then(|instance| instance.downcast::<T>().ok())
    }

    /// Resolve `T`: the registered instance if present, otherwise a freshly
    /// constructed one.
    ///
    /// # Errors
    /// Returns [`ResolveError::Unregistered`] when neither is available, or the
    /// constructor's error.
    pub fn resolve<T>(&self) -> Result<Arc<T>, ResolveError>
    where
        T: Send + Sync + 'static,
    {
        if let Some(instance) = self.get::<T>() {
            return Ok(instance);
        }

        let constructor = self
            .entries
            .get(&TypeId::of::<T>())
            .and_then(|entry| entry.constructor.clone())
            .ok_or(ResolveError::Unregistered {
                type_name: type_name::<T>(),
            })?;

        constructor(self)?
            .downcast::<T>()
            .map_err(|_| ResolveError::Unregistered {
                type_name: type_name::<T>(),
            })
    }

    /// Check if `T` can be resolved.
    pub fn contains<T: 'static>(&self) -> bool {
        self.entries
            .get(&TypeId::of::<T>())
            .is_some_and(|entry| entry.instance.is_some() || entry.constructor.is_some())
    }

    /// Number of registered types.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Check if nothing is registered.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl fmt::Debug for ResolutionContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut types: Vec<_> = self.entries.values().map(|e| e.type_name).collect();
        types.sort_unstable();
        f.debug_struct("ResolutionContext")
            .field("types", &types)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Debug, PartialEq)]
    struct Settings {
        name: &'static str,
    }

    #[derive(Debug)]
    struct Client {
        settings: Arc<Settings>,
    }

    #[test]
    fn test_registered_instance_is_shared() {
        let settings = Arc::new(Settings { name: "primary" });
        let context = ResolutionContext::new().with_instance(Arc::clone(&settings));

        let resolved = context.resolve::<Settings>().unwrap();
        assert!(Arc::ptr_eq(&resolved, &settings));
        assert!(Arc::ptr_eq(&context.get::<Settings>().unwrap(), &settings));
    }

    #[test]
    fn test_constructor_builds_fresh_instance_each_time() {
        let built = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&built);
        let context = ResolutionContext::new().with_constructor(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(Settings { name: "built" })
        });

        let first = context.resolve::<Settings>().unwrap();
        let second = context.resolve::<Settings>().unwrap();

        assert_eq!(first.name, "built");
        assert!(!Arc::ptr_eq(&first, &second));
        assert_eq!(built.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_instance_wins_over_constructor() {
        let context = ResolutionContext::new()
            .with_constructor(|_| Ok(Settings { name: "built" }))
            .with_instance(Arc::new(Settings { name: "registered" }));

        assert_eq!(context.resolve::<Settings>().unwrap().name, "registered");
    }

    #[test]
    fn test_get_ignores_constructors() {
        let context = ResolutionContext::new().with_constructor(|_| Ok(Settings { name: "built" }));

        assert!(context.get::<Settings>().is_none());
        assert!(context.contains::<Settings>());
    }

    #[test]
    fn test_constructor_resolves_dependencies() {
        let context = ResolutionContext::new()
            .with_instance(Arc::new(Settings { name: "dep" }))
            .with_constructor(|ctx| {
                Ok(Client {
                    settings: ctx.resolve::<Settings>()?,
                })
            });

        let client = context.resolve::<Client>().unwrap();
        assert_eq!(client.settings.name, "dep");
    }

    #[test]
    fn test_unregistered_type() {
        let context = ResolutionContext::new();

        let err = context.resolve::<Settings>().unwrap_err();
        assert!(matches!(err, ResolveError::Unregistered { .. }));
        assert!(!context.contains::<Settings>());
        assert!(context.is_empty());
    }

    #[test]
    fn test_missing_dependency_surfaces_from_constructor() {
        let context = ResolutionContext::new().with_constructor(|ctx| {
            Ok(Client {
                settings: ctx.resolve::<Settings>()?,
            })
        });

        let err = context.resolve::<Client>().unwrap_err();
        assert!(err.to_string().contains("Settings"));
    }

    #[test]
    fn test_try_constructor_wraps_error() {
        let context = ResolutionContext::new()
            .with_try_constructor(|_| Err::<Settings, _>("connection refused"));

        let err = context.resolve::<Settings>().unwrap_err();
        assert!(matches!(err, ResolveError::Construction { .. }));
        assert!(err.to_string().contains("connection refused"));
    }

    #[test]
    fn test_debug_lists_types() {
        let context = ResolutionContext::new().with_instance(Arc::new(Settings { name: "a" }));

        assert!(format!("{:?}", context).contains("Settings"));
        assert_eq!(context.len(), 1);
    }
}
