//! Failure types produced by fallback execution and configuration.

use std::error::Error as StdError;
use std::fmt;

/// Boxed error used for constructor failures inside the resolution context.
pub type BoxError = Box<dyn StdError + Send + Sync + 'static>;

/// Raised when every implementation in a chain failed.
///
/// Holds the failures in invocation order. [`std::error::Error::source`]
/// returns the first of them, which is the only one for a single-implementation
/// chain; use [`failures`](Self::failures) to see every cause.
#[derive(Debug)]
pub struct AggregateFailure<E> {
    capability: &'static str,
    failures: Vec<E>,
}

/// View over the causes of an [`AggregateFailure`].
#[derive(Debug, Clone, Copy)]
pub enum Causes<'a, E> {
    /// No implementation was attempted
    None,
    /// Exactly one implementation failed
    Single(&'a E),
    /// Several implementations failed, in invocation order
    Many(&'a [E]),
}

impl<E> AggregateFailure<E> {
    pub(crate) fn new(capability: &'static str, failures: Vec<E>) -> Self {
        Self {
            capability,
            failures,
        }
    }

    /// Name of the capability whose chain was exhausted.
    pub fn capability(&self) -> &'static str {
        self.capability
    }

    /// All failures in invocation order.
    pub fn failures(&self) -> &[E] {
        &self.failures
    }

    /// Number of failures recorded.
    pub fn len(&self) -> usize {
        self.failures.len()
    }

    /// Check if no failure was recorded.
    pub fn is_empty(&self) -> bool {
        self.failures.is_empty()
    }

    /// The underlying cause, collapsed to the bare failure when there is one.
    pub fn causes(&self) -> Causes<'_, E> {
        match self.failures.as_slice() {
            [] => Causes::None,
            [single] => Causes::Single(single),
            many => Causes::Many(many),
        }
    }

    /// The bare failure when exactly one occurred.
    pub fn single(&self) -> Option<&E> {
        match self.causes() {
            Causes::Single(failure) => Some(failure),
            _ => None,
        }
    }

    /// Consume the aggregate and return the failures in invocation order.
    pub fn into_failures(self) -> Vec<E> {
        self.failures
    }
}

impl<E: fmt::Display> fmt::Display for AggregateFailure<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "all registered fallbacks for {} were unsuccessful",
            self.capability
        )?;
        match self.causes() {
            Causes::None => Ok(()),
            Causes::Single(failure) => write!(f, ": {}", failure),
            Causes::Many(failures) => {
                write!(f, " ({} failures: ", failures.len())?;
                for (i, failure) in failures.iter().enumerate() {
                    if i > 0 {
                        f.write_str("; ")?;
                    }
                    write!(f, "{}", failure)?;
                }
                f.write_str(")")
            }
        }
    }
}

impl<E> StdError for AggregateFailure<E>
where
    E: StdError + 'static,
{
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        self.failures
            .first()
            .map(|failure| failure as &(dyn StdError + 'static))
    }
}

/// Error returned by the fallback executor.
#[derive(Debug, thiserror::Error)]
pub enum FallbackError<E>
where
    E: StdError + 'static,
{
    /// A failure matched an exclusion rule for the invoked operation and was
    /// surfaced unmodified; remaining implementations were not attempted.
    #[error(transparent)]
    Propagated(E),

    /// Every implementation failed.
    #[error(transparent)]
    Exhausted(#[from] AggregateFailure<E>),
}

impl<E> FallbackError<E>
where
    E: StdError + 'static,
{
    /// Check if this is a propagated (excluded) failure.
    pub fn is_propagated(&self) -> bool {
        matches!(self, FallbackError::Propagated(_))
    }

    /// Check if the whole chain was exhausted.
    pub fn is_exhausted(&self) -> bool {
        matches!(self, FallbackError::Exhausted(_))
    }

    /// The propagated failure, if this is one.
    pub fn into_propagated(self) -> Option<E> {
        match self {
            FallbackError::Propagated(failure) => Some(failure),
            FallbackError::Exhausted(_) => None,
        }
    }

    /// The aggregate failure, if the chain was exhausted.
    pub fn into_aggregate(self) -> Option<AggregateFailure<E>> {
        match self {
            FallbackError::Exhausted(aggregate) => Some(aggregate),
            FallbackError::Propagated(_) => None,
        }
    }
}

/// Error raised while turning an implementation slot into an instance.
///
/// The executor converts it into the caller's failure type, so it is subject
/// to the same exclusion rules as any operation failure.
#[derive(Debug, thiserror::Error)]
pub enum ResolveError {
    /// Neither an instance nor a constructor is registered for the type
    #[error("no instance or constructor registered for {type_name}")]
    Unregistered {
        /// Concrete type that was requested
        type_name: &'static str,
    },

    /// The registered constructor failed
    #[error("failed to construct {type_name}")]
    Construction {
        /// Concrete type being constructed
        type_name: &'static str,
        /// Underlying constructor error
        #[source]
        source: BoxError,
    },

    /// A factory slot failed to produce an instance
    #[error("implementation factory failed")]
    Factory(#[source] BoxError),
}

impl ResolveError {
    /// Wrap a constructor error for the concrete type `T`.
    pub fn construction<T: ?Sized>(source: impl Into<BoxError>) -> Self {
        ResolveError::Construction {
            type_name: std::any::type_name::<T>(),
            source: source.into(),
        }
    }

    /// Wrap a factory error.
    pub fn factory(source: impl Into<BoxError>) -> Self {
        ResolveError::Factory(source.into())
    }
}

/// Error returned when building a fallback executor fails.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum BuildError {
    /// At least one implementation must be configured
    #[error("fallback chain for {capability} has no implementations")]
    EmptyChain {
        /// Capability the chain was built for
        capability: &'static str,
    },
}

/// Error returned by the startup validation hook.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    /// Capabilities declared for fallback without any ordered chain
    #[error("capabilities registered without an ordered fallback chain: {}", .0.join(", "))]
    Unordered(Vec<&'static str>),

    /// Capabilities whose chain has fewer than two implementations
    #[error("capabilities registered without fallbacks: {}", .0.join(", "))]
    WithoutFallbacks(Vec<&'static str>),
}
