//! Ledger entries and their ordering
//!
//! A [`Transaction`] records one change to funds, science and reputation.
//! Fields are only set while constructing or loading; once a transaction
//! has been admitted to a [`Ledger`](crate::Ledger) it is only ever handed
//! out by shared reference.

use crate::host::CurrencyModifierQuery;
use crate::node::ConfigNode;
use crate::types::{decimal_from_host, Resource, TransactionReason};
use rust_decimal::prelude::FromPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

const REASON_KEY: &str = "reason";
const FUNDING_KEY: &str = "fundingDelta";
const SCIENCE_KEY: &str = "scienceDelta";
const REPUTATION_KEY: &str = "reputationDelta";
const TIMESTAMP_KEY: &str = "timeStamp";

/// One recorded change to the career resources
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Transaction {
    timestamp: f64,
    reason: TransactionReason,
    funds_delta: Decimal,
    science_delta: Decimal,
    reputation_delta: Decimal,
}

impl Transaction {
    /// Create a transaction from explicit deltas
    ///
    /// No validation happens here; an all-zero transaction is legal to build
    /// but will be dropped by the ledger.
    pub fn new(
        timestamp: f64,
        reason: TransactionReason,
        funds_delta: Decimal,
        science_delta: Decimal,
        reputation_delta: Decimal,
    ) -> Self {
        Self {
            timestamp,
            reason,
            funds_delta,
            science_delta,
            reputation_delta,
        }
    }

    /// Create a transaction from a host query
    ///
    /// Each delta is the query's input plus its modifier effect.
    pub fn from_query(timestamp: f64, query: &CurrencyModifierQuery) -> Self {
        let total = |resource: Resource| {
            let input = query.input(resource);
            let effect = query.effect_delta(resource);
            let (Some(input_amount), Some(effect_amount)) =
                (decimal_from_host(input), decimal_from_host(effect))
            else {
                tracing::warn!(
                    %resource,
                    input,
                    effect,
                    "Ignoring non-finite amount in currency query"
                );
                return Decimal::ZERO;
            };
            input_amount.checked_add(effect_amount).unwrap_or_else(|| {
                tracing::warn!(
                    %resource,
                    input,
                    effect,
                    "Ignoring overflowing amount in currency query"
                );
                Decimal::ZERO
            })
        };

        Self {
            timestamp,
            reason: query.reason,
            funds_delta: total(Resource::Funds),
            science_delta: total(Resource::Science),
            reputation_delta: total(Resource::Reputation),
        }
    }

    /// Correction entry moving a single resource by `delta`
    pub fn correction(timestamp: f64, resource: Resource, delta: Decimal) -> Self {
        let mut tx = Self {
            timestamp,
            ..Self::default()
        };
        match resource {
            Resource::Funds => tx.funds_delta = delta,
            Resource::Science => tx.science_delta = delta,
            Resource::Reputation => tx.reputation_delta = delta,
        }
        tx
    }

    /// Read a transaction from a node
    ///
    /// Never fails: unknown reasons become `None`, missing or unreadable
    /// numbers become zero.
    pub fn from_node(node: &ConfigNode) -> Self {
        let mut tx = Self::default();
        tx.load(node);
        tx
    }

    /// Overwrite every field from a node, default-filling anything unusable
    pub fn load(&mut self, node: &ConfigNode) {
        self.reason = node
            .get_value(REASON_KEY)
            .map(|name| TransactionReason::from_name_or_default(name.trim()))
            .unwrap_or_default();

        self.funds_delta = read_decimal(node, FUNDING_KEY);
        self.science_delta = read_decimal(node, SCIENCE_KEY);
        self.reputation_delta = read_decimal(node, REPUTATION_KEY);

        self.timestamp = node
            .get_parsed::<f64>(TIMESTAMP_KEY)
            .filter(|t| t.is_finite())
            .unwrap_or(0.0);
    }

    /// Write all five fields, replacing keys that already exist
    pub fn save(&self, node: &mut ConfigNode) {
        node.set_or_add_value(REASON_KEY, self.reason.name());
        node.set_or_add_value(FUNDING_KEY, self.funds_delta.normalize().to_string());
        node.set_or_add_value(SCIENCE_KEY, self.science_delta.normalize().to_string());
        node.set_or_add_value(REPUTATION_KEY, self.reputation_delta.normalize().to_string());
        node.set_or_add_value(TIMESTAMP_KEY, self.timestamp.to_string());
    }

    /// Simulation time of the change
    pub fn timestamp(&self) -> f64 {
        self.timestamp
    }

    /// Host reason code
    pub fn reason(&self) -> TransactionReason {
        self.reason
    }

    /// Funds moved
    pub fn funds_delta(&self) -> Decimal {
        self.funds_delta
    }

    /// Science moved
    pub fn science_delta(&self) -> Decimal {
        self.science_delta
    }

    /// Reputation moved
    pub fn reputation_delta(&self) -> Decimal {
        self.reputation_delta
    }

    /// Delta for one resource
    pub fn delta(&self, resource: Resource) -> Decimal {
        match resource {
            Resource::Funds => self.funds_delta,
            Resource::Science => self.science_delta,
            Resource::Reputation => self.reputation_delta,
        }
    }

    /// Whether this transaction moves any resource at all
    pub fn is_empty(&self) -> bool {
        Resource::ALL.iter().all(|r| self.delta(*r).is_zero())
    }
}

impl fmt::Display for Transaction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[CurrencyTransaction: TimeStamp={}, Reason={}, FundsDelta={}, ScienceDelta={}, ReputationDelta={}]",
            self.timestamp,
            self.reason,
            self.funds_delta,
            self.science_delta,
            self.reputation_delta
        )
    }
}

/// Lenient decimal read: plain, scientific, then float notation, else zero
fn read_decimal(node: &ConfigNode, key: &str) -> Decimal {
    let Some(raw) = node.get_value(key).map(str::trim) else {
        return Decimal::ZERO;
    };

    Decimal::from_str(raw)
        .or_else(|_| Decimal::from_scientific(raw))
        .ok()
        .or_else(|| {
            raw.parse::<f64>()
                .ok()
                .filter(|v| v.is_finite())
                .and_then(Decimal::from_f64)
        })
        .unwrap_or(Decimal::ZERO)
}

/// Field a [`TransactionSorter`] orders by
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SortKey {
    /// Timestamp
    #[default]
    Time,
    /// Funds delta
    Funds,
    /// Science delta
    Science,
    /// Reputation delta
    Reputation,
}

/// Direction of a sort
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SortOrder {
    /// Smallest first
    #[default]
    Ascending,
    /// Largest first
    Descending,
}

/// Comparator over transactions; defaults to oldest first
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TransactionSorter {
    /// Field compared
    pub key: SortKey,
    /// Direction
    pub order: SortOrder,
}

impl TransactionSorter {
    /// Create a sorter
    pub fn new(key: SortKey, order: SortOrder) -> Self {
        Self { key, order }
    }

    /// Compare two transactions on the configured field
    pub fn compare(&self, a: &Transaction, b: &Transaction) -> Ordering {
        let ordering = match self.key {
            SortKey::Time => a.timestamp.total_cmp(&b.timestamp),
            SortKey::Funds => a.funds_delta.cmp(&b.funds_delta),
            SortKey::Science => a.science_delta.cmp(&b.science_delta),
            SortKey::Reputation => a.reputation_delta.cmp(&b.reputation_delta),
        };

        match self.order {
            SortOrder::Ascending => ordering,
            SortOrder::Descending => ordering.reverse(),
        }
    }

    /// Stable in-place sort; equal elements keep their relative order
    pub fn sort(&self, transactions: &mut [Transaction]) {
        transactions.sort_by(|a, b| self.compare(a, b));
    }
}
