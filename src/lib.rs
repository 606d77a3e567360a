//! # mUSD Collateral Core
//!
//! The custody and liquidation core of an overcollateralized lending
//! protocol. It holds user collateral, lets liquidators repay the debt of
//! unhealthy borrowers for a discounted share of that collateral, and
//! tracks any shortfall as bad debt to be socialized.
//!
//! ## Architecture
//!
//! - **Core**: collateral parameters, call context and the collateral vault
//! - **Liquidation**: liquidation engine and bad-debt book
//! - **Governance**: roles and the timelocked pending-change slots
//! - **External**: borrow ledger, price oracle and token bank interfaces,
//!   with in-memory implementations
//! - **Protocol**: the atomic state machine and the event log
//!
//! ## Example
//!
//! ```rust,ignore
//! use musd_core::prelude::*;
//!
//! let outcome = protocol.liquidate(liquidator, borrower, weth, repay)?;
//! assert!(outcome.collateral_seized <= deposit);
//! ```

#![forbid(unsafe_code)]
#![warn(
    missing_docs,
    rust_2018_idioms,
    trivial_casts,
    unused_lifetimes,
    unused_qualifications
)]

pub mod cli;
pub mod core;
pub mod error;
pub mod external;
pub mod governance;
pub mod liquidation;
pub mod protocol;
pub mod utils;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::core::{
        config::{CollateralConfig, CollateralParams, LiquidationParams},
        context::CallContext,
        vault::CollateralVault,
    };
    pub use crate::error::{Error, Result};
    pub use crate::external::{
        BorrowLedger, CollateralView, HealthReading, InMemoryBorrowLedger, InMemoryTokenBank,
        PriceOracle, StaticPriceOracle, TokenBank,
    };
    pub use crate::governance::access::Role;
    pub use crate::liquidation::{
        bad_debt::BadDebtBook,
        engine::{LiquidationEngine, LiquidationOutcome, SeizureQuote},
    };
    pub use crate::protocol::{events::CoreEvent, state_machine::ProtocolStateMachine};
    pub use crate::utils::address::Address;
}

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Protocol name
pub const PROTOCOL_NAME: &str = "mUSD";
