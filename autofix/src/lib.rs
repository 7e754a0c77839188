//! Issue autofix workflow: seven phases from ticket to pull request, with
//! human approval checkpoints after planning and after security review.
//!
//! - **[`core`]**: The phase registry and the workflow state machine. Pure and
//!   deterministic, no I/O.
//! - **[`io`]**: Snapshot persistence, phase instructions, the executor that
//!   runs the agent, and the local checkout.
//!
//! The driving operations ([`start`], [`step`], [`decide`]) load a run, apply
//! one transition, and save it again.

pub mod core;
pub mod decide;
pub mod io;
pub mod logging;
pub mod start;
pub mod step;
#[cfg(any(test, feature = "test-support"))]
pub mod test_support;
