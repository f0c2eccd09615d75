//! Failure policy for fallback chains.
//!
//! The registry maps each operation identity to the predicates that mark its
//! failures as not eligible for fallback, and holds at most one observer that
//! is told about every failure the chain swallows.

use crate::application::context::ResolutionContext;
use crate::application::ports::Storage;
use crate::domain::operation::OperationId;
use crate::infrastructure::storage::ShardedStorage;
use std::fmt;
use std::sync::Arc;

#[cfg(feature = "async")]
use futures::future::{BoxFuture, FutureExt};

/// Predicate deciding whether a failure must propagate.
pub type ExclusionPredicate<E> = Arc<dyn Fn(&E) -> bool + Send + Sync>;

/// Synchronous failure callback.
pub type SyncObserver<E> = Arc<dyn Fn(&E, &ResolutionContext) + Send + Sync>;

/// Asynchronous failure callback.
#[cfg(feature = "async")]
pub type AsyncObserver<E> =
    Arc<dyn for<'a> Fn(&'a E, &'a ResolutionContext) -> BoxFuture<'a, ()> + Send + Sync>;

/// Exclusion predicates registered for one operation, in registration order.
pub struct ExclusionRules<E> {
    predicates: Vec<ExclusionPredicate<E>>,
}

impl<E> ExclusionRules<E> {
    /// Create an empty rule list.
    pub fn new() -> Self {
        Self {
            predicates: Vec::new(),
        }
    }

    /// Append a predicate. Duplicates are kept.
    pub fn push(&mut self, predicate: ExclusionPredicate<E>) {
        self.predicates.push(predicate);
    }

    /// Check if any predicate matches the failure.
    pub fn matches(&self, failure: &E) -> bool {
        self.predicates.iter().any(|predicate| predicate(failure))
    }

    /// Number of predicates.
    pub fn len(&self) -> usize {
        self.predicates.len()
    }

    /// Check if no predicate is registered.
    pub fn is_empty(&self) -> bool {
        self.predicates.is_empty()
    }
}

impl<E> Default for ExclusionRules<E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E> fmt::Debug for ExclusionRules<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExclusionRules")
            .field("predicates", &self.predicates.len())
            .finish()
    }
}

/// Callback told about each failure that triggers a fallback.
///
/// It observes only; it cannot turn a suppressed failure into a propagated
/// one. Excluded failures never reach it.
pub enum FailureObserver<E> {
    /// Runs inline on the calling thread
    Sync(SyncObserver<E>),
    /// Awaited by the async entry points, polled once by the sync ones
    #[cfg(feature = "async")]
    Async(AsyncObserver<E>),
}

#[cfg(feature = "async")]
fn async_observer<E, F>(observer: F) -> AsyncObserver<E>
where
    F: for<'a> Fn(&'a E, &'a ResolutionContext) -> BoxFuture<'a, ()> + Send + Sync + 'static,
{
    Arc::new(observer)
}

impl<E: 'static> FailureObserver<E> {
    /// Observer that only looks at the failure.
    pub fn new<F>(observer: F) -> Self
    where
        F: Fn(&E) + Send + Sync + 'static,
    {
        FailureObserver::Sync(Arc::new(move |failure: &E, _: &ResolutionContext| {
            observer(failure)
        }))
    }

    /// Observer that also receives the resolution context.
    pub fn with_context<F>(observer: F) -> Self
    where
        F: Fn(&E, &ResolutionContext) + Send + Sync + 'static,
    {
        FailureObserver::Sync(Arc::new(observer))
    }

    /// Asynchronous observer that only looks at the failure.
    ///
    /// ```
    /// use futures::FutureExt;
    /// use resilient_fallback::FailureObserver;
    ///
    /// let observer = FailureObserver::<std::io::Error>::from_async(|err| {
    ///     let message = err.to_string();
    ///     async move { println!("fell back after: {message}") }.boxed()
    /// });
    /// assert!(observer.is_async());
    /// ```
    #[cfg(feature = "async")]
    pub fn from_async<F>(observer: F) -> Self
    where
        F: for<'a> Fn(&'a E) -> BoxFuture<'a, ()> + Send + Sync + 'static,
    {
        FailureObserver::Async(async_observer(move |failure, _| observer(failure)))
    }

    /// Asynchronous observer that also receives the resolution context.
    #[cfg(feature = "async")]
    pub fn from_async_with_context<F>(observer: F) -> Self
    where
        F: for<'a> Fn(&'a E, &'a ResolutionContext) -> BoxFuture<'a, ()> + Send + Sync + 'static,
    {
        FailureObserver::Async(async_observer(observer))
    }

    /// Check if this observer is asynchronous.
    pub fn is_async(&self) -> bool {
        match self {
            FailureObserver::Sync(_) => false,
            #[cfg(feature = "async")]
            FailureObserver::Async(_) => true,
        }
    }

    /// Notify the observer from a synchronous call.
    ///
    /// Never blocks. An asynchronous observer is polled once: whatever it
    /// does before its first pending await runs, the rest of its future is
    /// dropped. Returns `false` when the observer was abandoned that way.
    pub fn notify(&self, failure: &E, context: &ResolutionContext) -> bool {
        match self {
            FailureObserver::Sync(observer) => {
                observer(failure, context);
                true
            }
            #[cfg(feature = "async")]
            FailureObserver::Async(observer) => observer(failure, context).now_or_never().is_some(),
        }
    }

    /// Notify the observer from an asynchronous call.
    #[cfg(feature = "async")]
    pub async fn notify_async(&self, failure: &E, context: &ResolutionContext) {
        match self {
            FailureObserver::Sync(observer) => observer(failure, context),
            FailureObserver::Async(observer) => observer(failure, context).await,
        }
    }
}

impl<E> Clone for FailureObserver<E> {
    fn clone(&self) -> Self {
        match self {
            FailureObserver::Sync(observer) => FailureObserver::Sync(Arc::clone(observer)),
            #[cfg(feature = "async")]
            FailureObserver::Async(observer) => FailureObserver::Async(Arc::clone(observer)),
        }
    }
}

impl<E> fmt::Debug for FailureObserver<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailureObserver::Sync(_) => f.write_str("FailureObserver::Sync(<fn>)"),
            #[cfg(feature = "async")]
            FailureObserver::Async(_) => f.write_str("FailureObserver::Async(<fn>)"),
        }
    }
}

/// Registry of exclusion rules and the failure observer.
///
/// Generic over the storage backend; by default rules live in a
/// [`ShardedStorage`]. Rules are registered during configuration and only
/// read while chains execute.
pub struct PolicyRegistry<E, S = ShardedStorage<OperationId, ExclusionRules<E>>>
where
    S: Storage<OperationId, ExclusionRules<E>>,
{
    storage: S,
    observer: Option<FailureObserver<E>>,
}

impl<E> PolicyRegistry<E> {
    /// Create an empty registry backed by sharded storage.
    pub fn new() -> Self {
        Self::with_storage(ShardedStorage::new())
    }
}

impl<E> Default for PolicyRegistry<E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E, S> PolicyRegistry<E, S>
where
    S: Storage<OperationId, ExclusionRules<E>>,
{
    /// Create an empty registry on top of the given storage.
    pub fn with_storage(storage: S) -> Self {
        Self {
            storage,
            observer: None,
        }
    }

    /// Mark failures of `operation` matching `predicate` as not eligible for
    /// fallback.
    ///
    /// Predicates accumulate per operation; a failure propagates when any of
    /// them matches.
    pub fn register_exclusion<P>(&self, operation: OperationId, predicate: P)
    where
        P: Fn(&E) -> bool + Send + Sync + 'static,
    {
        let predicate: ExclusionPredicate<E> = Arc::new(predicate);
        self.storage
            .with_entry_mut(operation, ExclusionRules::new, |rules| rules.push(predicate));
    }

    /// Install the failure observer, replacing any previous one.
    pub fn set_failure_observer(&mut self, observer: FailureObserver<E>) {
        self.observer = Some(observer);
    }

    /// The installed failure observer, if any.
    pub fn failure_observer(&self) -> Option<&FailureObserver<E>> {
        self.observer.as_ref()
    }

    /// Check if `failure` raised by `operation` must propagate.
    ///
    /// Only rules registered for exactly this operation are consulted.
    pub fn should_propagate(&self, operation: &OperationId, failure: &E) -> bool {
        self.storage
            .with_entry(operation, |rules| rules.matches(failure))
            .unwrap_or(false)
    }

    /// Number of predicates registered for `operation`.
    pub fn exclusion_count(&self, operation: &OperationId) -> usize {
        self.storage
            .with_entry(operation, ExclusionRules::len)
            .unwrap_or(0)
    }

    /// Number of operations with at least one exclusion rule.
    pub fn len(&self) -> usize {
        self.storage.len()
    }

    /// Check if no exclusion rule is registered.
    pub fn is_empty(&self) -> bool {
        self.storage.is_empty()
    }
}

impl<E, S> fmt::Debug for PolicyRegistry<E, S>
where
    S: Storage<OperationId, ExclusionRules<E>>,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PolicyRegistry")
            .field("storage", &self.storage)
            .field("observer", &self.observer)
            .finish()
    }
}
