//! # Domain Models
//!
//! Canonical domain types for capscreen.
//!
//! | Type | Description |
//! |------|-------------|
//! | [`Symbol`] | Validated, uppercase ticker symbol |
//! | [`FundamentalsSnapshot`] | Point-in-time fundamentals with optional metrics |
//!
//! [`Symbol`] is validated at construction and on deserialization.
//! [`FundamentalsSnapshot::new`] rejects non-finite and negative magnitudes,
//! but the snapshot's fields are public and serde does not re-check them, so
//! the scorer treats such values as not meaningful rather than trusting them.

mod snapshot;
mod symbol;

pub use snapshot::FundamentalsSnapshot;
pub use symbol::Symbol;
