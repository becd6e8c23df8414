//! Token-based escrow ledger for government tenders.
//!
//! Tracks spending tokens issued to contractors against a tender, restricts
//! where they may be spent, records per-milestone quality verifications, and
//! resolves the remaining balance at project end into a bonus-adjusted
//! redemption or a forfeiture to treasury. Every mutation is appended to the
//! [`store`] transaction log before it takes effect, so the full ledger state
//! is reproducible by replay.

pub mod account;
pub mod engine;
pub mod op;
pub mod record;
pub mod report;
pub mod scoring;
pub mod store;
