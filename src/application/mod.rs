//! Application layer - orchestration of domain logic.
//!
//! This layer runs fallback chains and manages their configuration:
//! - Policy registry (exclusion rules and the failure observer)
//! - Resolution context and implementation slots
//! - Fallback executor (the chain algorithm)
//! - Capability registration and startup validation
//!
//! ## Ports
//!
//! The application layer defines ports (traits) that infrastructure
//! adapters must implement. This keeps the application layer independent
//! from infrastructure details.

pub mod context;
pub mod executor;
pub mod metrics;
pub mod policy;
pub mod ports;
pub mod registration;
pub mod resolver;
