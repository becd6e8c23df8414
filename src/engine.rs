//! Ledger engine.
//!
//! Provides [`LedgerEngine`] which owns every [`crate::account::TenderAccount`],
//! validates and applies issue/spend/verify/resolve operations, and appends each
//! mutation to the [`crate::store`] transaction log before it takes effect.

pub mod ledger_engine;

pub use ledger_engine::LedgerEngine;
pub use ledger_engine::LedgerError;
pub use ledger_engine::Outcome;
pub use ledger_engine::TenderSummary;
