//! # resilient-fallback
//!
//! Ordered fallback chains for trait-based services.
//!
//! Give the executor a capability (a trait), an ordered list of
//! implementations and an operation to run. It tries each implementation in
//! turn and returns the first success. Failures along the way are logged,
//! reported to an optional observer and collected; if every implementation
//! fails, the caller receives all of them at once as an [`AggregateFailure`].
//!
//! Some failures should never fall back: a validation error will not go away
//! by asking a different backend. Exclusion rules mark such failures, scoped
//! to a single operation, so they propagate to the caller untouched.
//!
//! ## Quick Start
//!
//! ```rust
//! use resilient_fallback::{operation, FallbackExecutor, ResolveError};
//! use std::sync::Arc;
//!
//! #[derive(Debug, thiserror::Error)]
//! enum SendError {
//!     #[error("provider unavailable")]
//!     Unavailable,
//!     #[error("invalid recipient {0}")]
//!     InvalidRecipient(String),
//!     #[error(transparent)]
//!     Resolve(#[from] ResolveError),
//! }
//!
//! trait Mailer: Send + Sync {
//!     fn send(&self, to: &str, body: &str) -> Result<(), SendError>;
//! }
//!
//! struct Smtp;
//! struct Relay;
//!
//! impl Mailer for Smtp {
//!     fn send(&self, _: &str, _: &str) -> Result<(), SendError> {
//!         Err(SendError::Unavailable)
//!     }
//! }
//!
//! impl Mailer for Relay {
//!     fn send(&self, _: &str, _: &str) -> Result<(), SendError> {
//!         Ok(())
//!     }
//! }
//!
//! let send = operation!(dyn Mailer => send(&str, &str));
//!
//! let mailer = FallbackExecutor::<dyn Mailer, SendError>::builder()
//!     .with_instance(Arc::new(Smtp))
//!     .with_instance(Arc::new(Relay))
//!     // A bad address is bad for every provider
//!     .with_exclusion(send.clone(), |err| matches!(err, SendError::InvalidRecipient(_)))
//!     .with_failure_observer(|err| eprintln!("mailer fell back: {err}"))
//!     .build()
//!     .unwrap();
//!
//! mailer.run(&send, |m| m.send("ops@example.com", "disk full")).unwrap();
//! assert_eq!(mailer.metrics().suppressed_failures(), 1);
//! ```
//!
//! ## Operation Identity
//!
//! Exclusion rules are keyed by [`OperationId`]: the capability's type name,
//! the method name and the ordered parameter type names. Argument values are
//! never part of the identity, so a rule registered for
//! `operation!(dyn Mailer => send(&str, &str))` applies to every call of that
//! method and to no other method, even one with identical parameter types.
//!
//! ## Implementation Slots
//!
//! A chain is built from [`ImplementationSlot`]s:
//! - **Instances** are shared `Arc`s handed out as-is.
//! - **Factories** build an implementation from the [`ResolutionContext`] on
//!   every attempt.
//! - **Types** name a concrete type that the context provides, either as a
//!   registered instance or through a registered constructor. The type must
//!   declare the capability it serves with [`implements!`].
//!
//! Slots are resolved right before their attempt, never ahead of time. A
//! resolution error counts as a failure of that attempt and goes through the
//! same exclusion check, observer and aggregate as any other failure; the
//! failure type therefore implements `From<ResolveError>`.
//!
//! ## Failure Reporting
//!
//! | Outcome | Returned |
//! |---------|----------|
//! | An implementation succeeded | `Ok(value)` |
//! | A failure matched an exclusion rule | [`FallbackError::Propagated`] with the failure |
//! | Every implementation failed | [`FallbackError::Exhausted`] with all failures in order |
//!
//! The aggregate's [`source`](std::error::Error::source) is the first failure,
//! so a single-implementation chain reports its own failure as the cause.
//! [`AggregateFailure::failures`] lists all of them.
//!
//! The failure observer sees every failure that triggers a fallback. It cannot
//! change the outcome. A panicking observer is caught, logged and counted in
//! [`Metrics::observer_panics`]; the chain carries on.
//!
//! ## Async
//!
//! With the `async` feature (enabled by default) the executor also offers
//! [`execute_async`](FallbackExecutor::execute_async) and
//! [`run_async`](FallbackExecutor::run_async), and accepts asynchronous
//! observers. Synchronous entry points never block on an asynchronous
//! observer: it is polled once, and if it is still pending it is dropped,
//! logged at `warn` and counted in [`Metrics::abandoned_observers`]. Use the
//! async entry points when the observer has to run to completion.
//!
//! ## Observability
//!
//! Every attempt, fallback, propagation and exhaustion is reported through
//! `tracing`, with `capability`, `operation` and `attempt` fields. Counters
//! are available from the executor:
//!
//! ```rust,no_run
//! # use resilient_fallback::FallbackExecutor;
//! # use std::sync::Arc;
//! # trait Mailer: Send + Sync {}
//! # struct Smtp;
//! # impl Mailer for Smtp {}
//! # let mailer = FallbackExecutor::<dyn Mailer, std::io::Error>::builder()
//! #     .with_instance(Arc::new(Smtp))
//! #     .build()
//! #     .unwrap();
//! let snapshot = mailer.metrics().snapshot();
//! println!("Executions: {}", snapshot.executions);
//! println!("Exhausted chains: {}", snapshot.exhausted);
//! println!("Fallbacks per call: {:.2}", snapshot.fallback_rate());
//! ```
//!
//! ## Startup Validation
//!
//! [`CapabilityRegistry`] collects the configured chains. Its
//! [`validate`](CapabilityRegistry::validate) hook reports capabilities that
//! were declared without a chain, and chains with nothing to fall back to.

// Domain layer - identities and failure types
pub mod domain;

// Application layer - policy, resolution and execution
pub mod application;

// Infrastructure layer - storage adapters and test doubles
pub mod infrastructure;

// Re-export commonly used types for convenience
pub use domain::{
    failure::{
        AggregateFailure, BoxError, BuildError, Causes, ConfigError, FallbackError, ResolveError,
    },
    operation::OperationId,
};

pub use application::{
    context::ResolutionContext,
    executor::{FallbackExecutor, FallbackExecutorBuilder},
    metrics::{Metrics, MetricsSnapshot},
    policy::{ExclusionPredicate, ExclusionRules, FailureObserver, PolicyRegistry, SyncObserver},
    ports::Storage,
    registration::CapabilityRegistry,
    resolver::{ImplementationSlot, Implements, SlotFactory, TypeToken},
};

#[cfg(feature = "async")]
pub use application::policy::AsyncObserver;

pub use infrastructure::storage::ShardedStorage;
