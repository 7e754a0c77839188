//! I/O for the workflow: persistence, instructions, and the agent process.

pub mod checkout;
pub mod config;
pub mod executor;
pub mod fs_util;
pub mod instructions;
pub mod process;
pub mod run_store;
