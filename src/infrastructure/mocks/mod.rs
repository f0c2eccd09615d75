//! Mock implementations for testing.
//!
//! This module provides test doubles for observing what the executor logs.

pub mod layer;

pub use layer::{CapturedEvent, MockCaptureLayer};
