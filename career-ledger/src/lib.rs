//! Career Ledger
//!
//! In-memory ledger of funds, science and reputation changes inside a
//! simulation host, with save/load round-tripping and reconciliation
//! against the host's own totals.
//!
//! # Architecture
//!
//! - **Single mutation path**: every entry, including corrections and
//!   restored entries, goes through [`Ledger::admit`]
//! - **Indexed views**: one order-preserving index per resource into the
//!   master sequence
//! - **Reconciliation**: drift below epsilon is absorbed, anything larger is
//!   recorded as an auditable correction
//! - **Explicit host**: the simulation clock and authoritative balances are
//!   passed in through [`CurrencyHost`], never looked up globally
//!
//! # Invariants
//!
//! - No admitted transaction has all three deltas zero
//! - Each view equals the master sequence filtered to non-zero deltas of
//!   its resource, in the same relative order
//! - Each running total equals the sum of that resource's deltas, except
//!   for drift smaller than epsilon absorbed during reconciliation

#![forbid(unsafe_code)]
#![warn(
    missing_docs,
    rust_2018_idioms,
    missing_debug_implementations,
    clippy::all
)]

pub mod actor;
pub mod config;
pub mod error;
pub mod host;
pub mod ledger;
pub mod metrics;
pub mod node;
pub mod storage;
pub mod transaction;
pub mod types;

// Re-exports
pub use config::Config;
pub use error::{Error, Result};
pub use host::{CurrencyHost, CurrencyModifierQuery, FixedHost, HostEvent};
pub use ledger::{Ledger, LedgerSummary, Reconciliation, TransactionView};
pub use metrics::Metrics;
pub use node::ConfigNode;
pub use storage::SaveStore;
pub use transaction::{SortKey, SortOrder, Transaction, TransactionSorter};
pub use types::{Balances, Resource, TransactionReason};
