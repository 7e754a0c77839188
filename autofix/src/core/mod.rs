//! Deterministic, pure workflow logic.
//!
//! Core modules must be free of I/O side effects. They operate on in-memory
//! values and return deterministic outputs suitable for tests.

pub mod phase;
pub mod snapshot;
pub mod types;
pub mod workflow;
