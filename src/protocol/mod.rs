//! Protocol module - Core state machine and orchestration.
//!
//! This module provides the state machine that runs every vault and
//! liquidation operation atomically, and the event log both components
//! write to.

pub mod events;
pub mod state_machine;

pub use events::*;
pub use state_machine::*;
