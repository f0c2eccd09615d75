//! Domain layer - pure types with no runtime behaviour.
//!
//! This layer contains the vocabulary of the fallback engine:
//! - Operation identities that scope exclusion rules
//! - Failures produced by execution, resolution and configuration
//!
//! All types in this layer are pure and easily testable.

pub mod failure;
pub mod operation;
