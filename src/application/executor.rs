//! Fallback chain execution.
//!
//! The executor walks its implementation slots in configured order and runs
//! the caller's operation against each one until an attempt succeeds. Each
//! failure is checked against the exclusion rules of the invoked operation:
//! an excluded failure propagates immediately, any other failure is reported
//! to the failure observer and recorded before the next implementation is
//! tried. When every implementation failed, the recorded failures are
//! returned as one [`AggregateFailure`].

use crate::application::context::ResolutionContext;
use crate::application::metrics::Metrics;
use crate::application::policy::{FailureObserver, PolicyRegistry};
use crate::application::resolver::{ImplementationSlot, Implements};
use crate::domain::failure::{AggregateFailure, BuildError, FallbackError, ResolveError};
use crate::domain::operation::OperationId;
use std::any::type_name;
use std::error::Error as StdError;
use std::fmt;
use std::panic;
use std::sync::Arc;
use tracing::{debug, error, warn};

#[cfg(feature = "async")]
use futures::future::{BoxFuture, FutureExt};
#[cfg(feature = "async")]
use std::future::Future;

/// Runs operations against an ordered chain of implementations of `C`.
///
/// Cloning is cheap: clones share the chain, policy, context and metrics.
/// No execution state survives a call, so every call starts again from the
/// first implementation.
///
/// # Example
/// ```
/// use resilient_fallback::{operation, FallbackExecutor};
/// use std::sync::Arc;
///
/// trait Quotes: Send + Sync {
///     fn price(&self, symbol: &str) -> Result<u32, std::io::Error>;
/// }
///
/// struct Primary;
/// struct Backup;
///
/// impl Quotes for Primary {
///     fn price(&self, _: &str) -> Result<u32, std::io::Error> {
///         Err(std::io::Error::other("primary offline"))
///     }
/// }
///
/// impl Quotes for Backup {
///     fn price(&self, _: &str) -> Result<u32, std::io::Error> {
///         Ok(42)
///     }
/// }
///
/// # #[derive(Debug, thiserror::Error)]
/// # enum QuoteError {
/// #     #[error(transparent)] Io(#[from] std::io::Error),
/// #     #[error(transparent)] Resolve(#[from] resilient_fallback::ResolveError),
/// # }
/// let quotes = FallbackExecutor::<dyn Quotes, QuoteError>::builder()
///     .with_instance(Arc::new(Primary))
///     .with_instance(Arc::new(Backup))
///     .build()
///     .unwrap();
///
/// let op = operation!(dyn Quotes => price(&str));
/// let price = quotes.execute(&op, |q| Ok(q.price("ACME")?)).unwrap();
/// assert_eq!(price, 42);
/// ```
pub struct FallbackExecutor<C: ?Sized, E> {
    capability: &'static str,
    slots: Arc<[ImplementationSlot<C>]>,
    policy: Arc<PolicyRegistry<E>>,
    context: Arc<ResolutionContext>,
    metrics: Metrics,
}

impl<C: ?Sized + 'static, E: 'static> FallbackExecutor<C, E> {
    /// Start configuring a chain for the capability `C`.
    pub fn builder() -> FallbackExecutorBuilder<C, E> {
        FallbackExecutorBuilder::new()
    }
}

impl<C: ?Sized, E> FallbackExecutor<C, E> {
    /// Name of the capability this chain serves.
    pub fn capability(&self) -> &'static str {
        self.capability
    }

    /// Configured slots, in invocation order.
    pub fn slots(&self) -> &[ImplementationSlot<C>] {
        &self.slots
    }

    /// Number of implementations in the chain.
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    /// Check if the chain has no implementations.
    ///
    /// Always false for executors produced by the builder.
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Get a reference to the policy registry.
    pub fn policy(&self) -> &PolicyRegistry<E> {
        &self.policy
    }

    /// Get a reference to the resolution context.
    pub fn context(&self) -> &ResolutionContext {
        &self.context
    }

    /// Get a reference to the metrics.
    pub fn metrics(&self) -> &Metrics {
        &self.metrics
    }
}

impl<C, E> FallbackExecutor<C, E>
where
    C: ?Sized,
    E: StdError + From<ResolveError> + 'static,
{
    /// Run `invoke` against each implementation until one succeeds.
    ///
    /// `operation` identifies the method being called and selects the
    /// exclusion rules that apply to its failures. This call never blocks on
    /// an asynchronous failure observer; see [`FailureObserver::notify`].
    ///
    /// # Errors
    /// - [`FallbackError::Propagated`] with the unmodified failure when it
    ///   matched an exclusion rule for `operation`
    /// - [`FallbackError::Exhausted`] when every implementation failed
    pub fn execute<T, F>(
        &self,
        operation: &OperationId,
        mut invoke: F,
    ) -> Result<T, FallbackError<E>>
    where
        F: FnMut(&C) -> Result<T, E>,
    {
        self.metrics.record_execution();
        let mut failures = Vec::new();

        for (index, slot) in self.slots.iter().enumerate() {
            self.trace_attempt(operation, index, slot);

            let outcome = slot
                .resolve(&self.context)
                .map_err(E::from)
                .and_then(|instance| invoke(&*instance));

            let failure = match outcome {
                Ok(value) => return Ok(self.succeeded(operation, index, value)),
                Err(failure) => self.check_exclusion(operation, index, failure)?,
            };

            if let Some(observer) = self.policy.failure_observer() {
                let notified = panic::catch_unwind(panic::AssertUnwindSafe(|| {
                    observer.notify(&failure, &self.context)
                }));
                match notified {
                    Ok(true) => {}
                    Ok(false) => self.observer_abandoned(operation, index),
                    Err(_) => self.observer_panicked(operation, index),
                }
            }

            failures.push(failure);
        }

        Err(self.exhausted(operation, failures))
    }

    /// Like [`execute`](Self::execute) for operations without a result value.
    pub fn run<F>(&self, operation: &OperationId, invoke: F) -> Result<(), FallbackError<E>>
    where
        F: FnMut(&C) -> Result<(), E>,
    {
        self.execute(operation, invoke)
    }

    /// Asynchronous [`execute`](Self::execute).
    ///
    /// Slots are resolved synchronously; the operation and an asynchronous
    /// failure observer are awaited in turn. Dropping the returned future
    /// abandons the chain at its current attempt.
    #[cfg(feature = "async")]
    pub async fn execute_async<T, F, Fut>(
        &self,
        operation: &OperationId,
        mut invoke: F,
    ) -> Result<T, FallbackError<E>>
    where
        F: FnMut(Arc<C>) -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        self.metrics.record_execution();
        let mut failures = Vec::new();

        for (index, slot) in self.slots.iter().enumerate() {
            self.trace_attempt(operation, index, slot);

            let outcome = match slot.resolve(&self.context) {
                Ok(instance) => invoke(instance).await,
                Err(err) => Err(E::from(err)),
            };

            let failure = match outcome {
                Ok(value) => return Ok(self.succeeded(operation, index, value)),
                Err(failure) => self.check_exclusion(operation, index, failure)?,
            };

            if let Some(observer) = self.policy.failure_observer() {
                let notify = observer.notify_async(&failure, &self.context);
                let notified = panic::AssertUnwindSafe(notify).catch_unwind().await;
                if notified.is_err() {
                    self.observer_panicked(operation, index);
                }
            }

            failures.push(failure);
        }

        Err(self.exhausted(operation, failures))
    }

    /// Asynchronous [`run`](Self::run).
    #[cfg(feature = "async")]
    pub async fn run_async<F, Fut>(
        &self,
        operation: &OperationId,
        invoke: F,
    ) -> Result<(), FallbackError<E>>
    where
        F: FnMut(Arc<C>) -> Fut,
        Fut: Future<Output = Result<(), E>>,
    {
        self.execute_async(operation, invoke).await
    }

    fn trace_attempt(&self, operation: &OperationId, index: usize, slot: &ImplementationSlot<C>) {
        debug!(
            capability = self.capability,
            operation = %operation,
            fingerprint = operation.fingerprint(),
            attempt = index + 1,
            slot = slot.kind(),
            "invoking implementation"
        );
    }

    fn succeeded<T>(&self, operation: &OperationId, index: usize, value: T) -> T {
        self.metrics.record_success();
        if index > 0 {
            debug!(
                capability = self.capability,
                operation = %operation,
                attempt = index + 1,
                "fallback implementation succeeded"
            );
        }
        value
    }

    /// Returns the failure back when it may fall through to the next slot.
    fn check_exclusion(
        &self,
        operation: &OperationId,
        index: usize,
        failure: E,
    ) -> Result<E, FallbackError<E>> {
        if self.policy.should_propagate(operation, &failure) {
            self.metrics.record_propagated();
            debug!(
                capability = self.capability,
                operation = %operation,
                attempt = index + 1,
                error = %failure,
                "failure excluded from fallback, propagating"
            );
            return Err(FallbackError::Propagated(failure));
        }

        self.metrics.record_suppressed();
        warn!(
            capability = self.capability,
            operation = %operation,
            attempt = index + 1,
            remaining = self.slots.len() - index - 1,
            error = %failure,
            "implementation failed"
        );
        Ok(failure)
    }

    fn observer_panicked(&self, operation: &OperationId, index: usize) {
        self.metrics.record_observer_panic();
        warn!(
            capability = self.capability,
            operation = %operation,
            attempt = index + 1,
            "failure observer panicked, continuing"
        );
    }

    fn observer_abandoned(&self, operation: &OperationId, index: usize) {
        self.metrics.record_abandoned_observer();
        warn!(
            capability = self.capability,
            operation = %operation,
            attempt = index + 1,
            "asynchronous failure observer did not finish in a synchronous call, dropped"
        );
    }

    fn exhausted(&self, operation: &OperationId, failures: Vec<E>) -> FallbackError<E> {
        self.metrics.record_exhausted();
        error!(
            capability = self.capability,
            operation = %operation,
            failures = failures.len(),
            "all registered fallbacks were unsuccessful"
        );
        AggregateFailure::new(self.capability, failures).into()
    }
}

impl<C: ?Sized, E> Clone for FallbackExecutor<C, E> {
    fn clone(&self) -> Self {
        Self {
            capability: self.capability,
            slots: Arc::clone(&self.slots),
            policy: Arc::clone(&self.policy),
            context: Arc::clone(&self.context),
            metrics: self.metrics.clone(),
        }
    }
}

impl<C: ?Sized, E> fmt::Debug for FallbackExecutor<C, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FallbackExecutor")
            .field("capability", &self.capability)
            .field("slots", &self.slots)
            .field("policy", &self.policy)
            .field("context", &self.context)
            .finish()
    }
}

/// Builder for configuring a [`FallbackExecutor`].
///
/// Slots are invoked in the order they are added.
pub struct FallbackExecutorBuilder<C: ?Sized, E> {
    slots: Vec<ImplementationSlot<C>>,
    policy: PolicyRegistry<E>,
    context: ResolutionContext,
}

impl<C: ?Sized + 'static, E: 'static> FallbackExecutorBuilder<C, E> {
    /// Create a builder with an empty chain.
    pub fn new() -> Self {
        Self {
            slots: Vec::new(),
            policy: PolicyRegistry::new(),
            context: ResolutionContext::new(),
        }
    }

    /// Append a pre-built instance.
    pub fn with_instance(self, instance: Arc<C>) -> Self {
        self.with_slot(ImplementationSlot::instance(instance))
    }

    /// Append a factory, called with the resolution context on every attempt.
    pub fn with_factory<F>(self, factory: F) -> Self
    where
        F: Fn(&ResolutionContext) -> Result<Arc<C>, ResolveError> + Send + Sync + 'static,
    {
        self.with_slot(ImplementationSlot::factory(factory))
    }

    /// Append the concrete type `T`, resolved through the resolution context.
    pub fn with_type<T: Implements<C>>(self) -> Self {
        self.with_slot(ImplementationSlot::of_type::<T>())
    }

    /// Append a slot.
    pub fn with_slot(mut self, slot: ImplementationSlot<C>) -> Self {
        self.slots.push(slot);
        self
    }

    /// Set the resolution context used by factories, type slots and
    /// observers.
    pub fn with_context(mut self, context: ResolutionContext) -> Self {
        self.context = context;
        self
    }

    /// Mark failures of `operation` matching `predicate` as not eligible for
    /// fallback.
    pub fn with_exclusion<P>(self, operation: OperationId, predicate: P) -> Self
    where
        P: Fn(&E) -> bool + Send + Sync + 'static,
    {
        self.policy.register_exclusion(operation, predicate);
        self
    }

    /// Install a failure observer, replacing any previous one.
    pub fn with_observer(mut self, observer: FailureObserver<E>) -> Self {
        self.policy.set_failure_observer(observer);
        self
    }

    /// Install a synchronous failure observer.
    pub fn with_failure_observer<F>(self, observer: F) -> Self
    where
        F: Fn(&E) + Send + Sync + 'static,
    {
        self.with_observer(FailureObserver::new(observer))
    }

    /// Install an asynchronous failure observer.
    #[cfg(feature = "async")]
    pub fn with_async_failure_observer<F>(self, observer: F) -> Self
    where
        F: for<'a> Fn(&'a E) -> BoxFuture<'a, ()> + Send + Sync + 'static,
    {
        self.with_observer(FailureObserver::from_async(observer))
    }

    /// Build the executor.
    ///
    /// # Errors
    /// Returns [`BuildError::EmptyChain`] if no implementation was added.
    pub fn build(self) -> Result<FallbackExecutor<C, E>, BuildError> {
        let capability = type_name::<C>();
        if self.slots.is_empty() {
            return Err(BuildError::EmptyChain { capability });
        }

        Ok(FallbackExecutor {
            capability,
            slots: self.slots.into(),
            policy: Arc::new(self.policy),
            context: Arc::new(self.context),
            metrics: Metrics::new(),
        })
    }
}

impl<C: ?Sized + 'static, E: 'static> Default for FallbackExecutorBuilder<C, E> {
    fn default() -> Self {
        Self::new()
    }
}
