//! Operator command-line support.
//!
//! Configuration loading, liquidation scenarios over the in-memory
//! collaborators, and report rendering for the `musd` binary.

pub mod commands;
pub mod config;
pub mod output;

pub use commands::*;
pub use config::*;
pub use output::*;
