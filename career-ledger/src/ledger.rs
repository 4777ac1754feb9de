//! The career ledger
//!
//! Owns the master sequence of transactions, one index per resource into
//! that sequence, and the running totals. Every mutation funnels through
//! [`Ledger::admit`].
//!
//! # Threading
//!
//! A `Ledger` is driven from the host's single update loop. `admit`,
//! `reconcile_resource`, `restore` and `persist` take `&mut self` and must
//! not be raced from several threads without external synchronization; the
//! [`actor`](crate::actor) module provides one such wrapper.
//!
//! # Example
//!
//! ```
//! use career_ledger::{FixedHost, Ledger, Resource, Transaction, TransactionReason};
//! use rust_decimal::Decimal;
//!
//! let host = FixedHost { time: 30.0, funds: 150.0, ..FixedHost::default() };
//! let mut ledger = Ledger::new();
//!
//! ledger.admit(Transaction::new(
//!     10.0,
//!     TransactionReason::ContractReward,
//!     Decimal::from(100),
//!     Decimal::ZERO,
//!     Decimal::ZERO,
//! ));
//! ledger.reconcile_resource(&host, Resource::Funds, 150.0, TransactionReason::None);
//!
//! assert_eq!(ledger.len(), 2);
//! assert_eq!(ledger.current_funds(), Decimal::from(150));
//! ```

use crate::{
    host::{CurrencyHost, CurrencyModifierQuery, HostEvent},
    metrics::Metrics,
    node::ConfigNode,
    transaction::{Transaction, TransactionSorter},
    types::{decimal_from_host, Balances, Resource, TransactionReason},
    Config, Result,
};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::iter::FusedIterator;

/// Child node name of each persisted transaction
pub const TRANSACTION_NODE: &str = "CURRENCY_TRANSACTION";

/// Ledger flag marking a session that predates ledger tracking
pub const NEW_GAME_KEY: &str = "NewGame";

/// Default reconciliation threshold
pub const DEFAULT_EPSILON: Decimal = Decimal::from_parts(1, 0, 0, false, 2);

/// Outcome of a reconciliation against a host total
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reconciliation {
    /// Ledger already matched the host
    Unchanged,
    /// Drift below epsilon; total overwritten without a transaction
    Absorbed {
        /// Host total minus ledger total
        drift: Decimal,
    },
    /// Drift recorded as a correction transaction
    Corrected {
        /// Host total minus ledger total
        drift: Decimal,
    },
    /// Host value or drift could not be represented; nothing changed
    Ignored,
}

/// Career ledger
#[derive(Debug, Clone)]
pub struct Ledger {
    /// Every admitted transaction
    transactions: Vec<Transaction>,

    /// Per-resource positions into `transactions`, indexed by `Resource::index`
    views: [Vec<usize>; 3],

    /// Running totals
    balances: Balances,

    /// No save with ledger data has been seen for this session yet
    is_new_game: bool,

    /// Reconciliation threshold
    epsilon: Decimal,

    metrics: Option<Metrics>,
}

impl Default for Ledger {
    fn default() -> Self {
        Self::new()
    }
}

impl Ledger {
    /// Empty ledger for a new game
    pub fn new() -> Self {
        Self {
            transactions: Vec::new(),
            views: [Vec::new(), Vec::new(), Vec::new()],
            balances: Balances::default(),
            is_new_game: true,
            epsilon: DEFAULT_EPSILON,
            metrics: None,
        }
    }

    /// Empty ledger configured from `config`
    pub fn from_config(config: &Config) -> Result<Self> {
        let mut ledger = Self::new().with_epsilon(config.reconciliation.epsilon);
        if config.metrics_enabled {
            ledger = ledger.with_metrics(Metrics::new()?);
        }
        Ok(ledger)
    }

    /// Override the reconciliation threshold
    pub fn with_epsilon(mut self, epsilon: Decimal) -> Self {
        self.epsilon = epsilon.abs();
        self
    }

    /// Attach a metrics collector
    pub fn with_metrics(mut self, metrics: Metrics) -> Self {
        metrics.update_ledger_size(self.transactions.len());
        self.metrics = Some(metrics);
        self
    }

    /// Admit a transaction
    ///
    /// All-zero transactions, and transactions that would push a total past
    /// what `Decimal` can hold, are dropped without any effect. Returns
    /// whether the transaction was recorded.
    pub fn admit(&mut self, transaction: Transaction) -> bool {
        if transaction.is_empty() {
            if let Some(metrics) = &self.metrics {
                metrics.record_zero_rejected();
            }
            return false;
        }

        let mut balances = self.balances;
        for resource in Resource::ALL {
            match balances.checked_add(resource, transaction.delta(resource)) {
                Some(next) => balances = next,
                None => {
                    tracing::warn!(
                        %transaction,
                        %resource,
                        "Dropping transaction: total overflows"
                    );
                    return false;
                }
            }
        }
        self.balances = balances;

        let position = self.transactions.len();
        for resource in Resource::ALL {
            if !transaction.delta(resource).is_zero() {
                self.views[resource.index()].push(position);
            }
        }

        tracing::debug!(%transaction, "Added transaction");
        self.transactions.push(transaction);

        if let Some(metrics) = &self.metrics {
            metrics.record_admit(self.transactions.len());
        }
        true
    }

    /// Record a host query observed at `timestamp`
    pub fn append_from_query(&mut self, timestamp: f64, query: &CurrencyModifierQuery) -> bool {
        self.admit(Transaction::from_query(timestamp, query))
    }

    /// Host notification: a multi-resource delta occurred
    pub fn on_query_delta<H>(&mut self, host: &H, query: &CurrencyModifierQuery) -> bool
    where
        H: CurrencyHost + ?Sized,
    {
        self.append_from_query(host.universal_time(), query)
    }

    /// Host notification: a resource total changed
    pub fn on_resource_total<H>(
        &mut self,
        host: &H,
        resource: Resource,
        value: f64,
        reason: TransactionReason,
    ) -> Reconciliation
    where
        H: CurrencyHost + ?Sized,
    {
        self.reconcile_resource(host, resource, value, reason)
    }

    /// Dispatch a host notification
    pub fn handle_event<H>(&mut self, host: &H, event: &HostEvent)
    where
        H: CurrencyHost + ?Sized,
    {
        match event {
            HostEvent::CurrencyModified(query) => {
                self.on_query_delta(host, query);
            }
            HostEvent::TotalChanged {
                resource,
                value,
                reason,
            } => {
                self.on_resource_total(host, *resource, *value, *reason);
            }
        }
    }

    /// Bring one running total in line with the host's authoritative value
    ///
    /// Drift below epsilon is absorbed silently; anything larger becomes a
    /// correction transaction stamped with the host's current time. Other
    /// resources are never touched.
    pub fn reconcile_resource<H>(
        &mut self,
        host: &H,
        resource: Resource,
        authoritative: f64,
        reason: TransactionReason,
    ) -> Reconciliation
    where
        H: CurrencyHost + ?Sized,
    {
        let Some(target) = decimal_from_host(authoritative) else {
            tracing::warn!(
                %resource,
                authoritative,
                %reason,
                "Ignoring unrepresentable host total"
            );
            return Reconciliation::Ignored;
        };

        let current = self.balances.get(resource);
        let Some(drift) = target.checked_sub(current) else {
            tracing::warn!(
                %resource,
                host_value = %target,
                ledger_value = %current,
                %reason,
                "Ignoring host total: drift overflows"
            );
            return Reconciliation::Ignored;
        };

        if drift.is_zero() {
            return Reconciliation::Unchanged;
        }

        if drift.abs() < self.epsilon {
            self.balances.set(resource, target);
            if let Some(metrics) = &self.metrics {
                metrics.record_drift_absorbed(resource);
            }
            tracing::trace!(%resource, %drift, "Absorbed drift below epsilon");
            return Reconciliation::Absorbed { drift };
        }

        let correction = Transaction::correction(host.universal_time(), resource, drift);
        tracing::warn!(
            %resource,
            host_value = %target,
            ledger_value = %current,
            %reason,
            %correction,
            "Detected discrepancy in {} totals; correcting",
            resource
        );

        if !self.admit(correction) {
            return Reconciliation::Ignored;
        }
        if let Some(metrics) = &self.metrics {
            metrics.record_correction(resource);
        }
        Reconciliation::Corrected { drift }
    }

    /// Recompute every total from the master sequence, then reconcile each
    /// against the host
    ///
    /// Used for sessions that predate the ledger: whatever the known
    /// transactions do not explain becomes one correction per resource.
    pub fn rebalance<H>(&mut self, host: &H)
    where
        H: CurrencyHost + ?Sized,
    {
        for resource in Resource::ALL {
            let sum = self
                .transactions
                .iter()
                .try_fold(Decimal::ZERO, |sum, t| sum.checked_add(t.delta(resource)));
            match sum {
                Some(sum) => self.balances.set(resource, sum),
                None => tracing::warn!(
                    %resource,
                    "Keeping running total: recomputed sum overflows"
                ),
            }

            let authoritative = host.authoritative_total(resource);
            self.reconcile_resource(host, resource, authoritative, TransactionReason::None);
        }

        tracing::info!(
            transactions = self.transactions.len(),
            funds = %self.balances.funds,
            science = %self.balances.science,
            reputation = %self.balances.reputation,
            "Rebalanced ledger against host totals"
        );
    }

    /// Replace the ledger's contents with a persisted node
    ///
    /// Every persisted transaction goes through `admit`, all sequences are
    /// re-sorted by time, and a session flagged as predating the ledger (or
    /// missing the flag) is rebalanced against `host`.
    pub fn restore<H>(&mut self, node: &ConfigNode, host: &H)
    where
        H: CurrencyHost + ?Sized,
    {
        self.clear();

        for child in node.get_nodes(TRANSACTION_NODE) {
            self.admit(Transaction::from_node(child));
        }

        TransactionSorter::default().sort(&mut self.transactions);
        self.rebuild_views();

        self.is_new_game = node.get_bool(NEW_GAME_KEY).unwrap_or(true);
        if self.is_new_game {
            self.rebalance(host);
        }

        tracing::info!(ledger = %self, "Loaded");
    }

    /// Write the ledger into `node`
    ///
    /// Existing child nodes are replaced; other values already on the node
    /// are kept. The session is never treated as new again afterwards.
    pub fn persist(&mut self, node: &mut ConfigNode) {
        node.clear_nodes();

        for transaction in &self.transactions {
            let mut child = ConfigNode::new(TRANSACTION_NODE);
            transaction.save(&mut child);
            node.add_node(child);
        }

        node.set_or_add_value(NEW_GAME_KEY, "False");
        self.is_new_game = false;

        tracing::info!(transactions = self.transactions.len(), "Saved");
    }

    fn clear(&mut self) {
        self.transactions.clear();
        for view in &mut self.views {
            view.clear();
        }
        self.balances = Balances::default();
        if let Some(metrics) = &self.metrics {
            metrics.update_ledger_size(0);
        }
    }

    fn rebuild_views(&mut self) {
        for resource in Resource::ALL {
            let view = &mut self.views[resource.index()];
            view.clear();
            view.extend(
                self.transactions
                    .iter()
                    .enumerate()
                    .filter(|(_, t)| !t.delta(resource).is_zero())
                    .map(|(position, _)| position),
            );
        }
    }

    /// Every transaction, in ledger order
    pub fn transactions(&self) -> &[Transaction] {
        &self.transactions
    }

    /// Transactions touching one resource, in ledger order
    pub fn view(&self, resource: Resource) -> TransactionView<'_> {
        TransactionView {
            transactions: &self.transactions,
            positions: &self.views[resource.index()],
        }
    }

    /// Transactions with a non-zero funds delta
    pub fn funds_view(&self) -> TransactionView<'_> {
        self.view(Resource::Funds)
    }

    /// Transactions with a non-zero science delta
    pub fn science_view(&self) -> TransactionView<'_> {
        self.view(Resource::Science)
    }

    /// Transactions with a non-zero reputation delta
    pub fn reputation_view(&self) -> TransactionView<'_> {
        self.view(Resource::Reputation)
    }

    /// Owned snapshot, optionally filtered to one resource, ordered by `sorter`
    pub fn sorted(&self, resource: Option<Resource>, sorter: TransactionSorter) -> Vec<Transaction> {
        let mut snapshot = match resource {
            Some(resource) => self.view(resource).to_vec(),
            None => self.transactions.clone(),
        };
        sorter.sort(&mut snapshot);
        snapshot
    }

    /// All running totals
    pub fn balances(&self) -> Balances {
        self.balances
    }

    /// Running total for one resource
    pub fn current(&self, resource: Resource) -> Decimal {
        self.balances.get(resource)
    }

    /// Running funds total
    pub fn current_funds(&self) -> Decimal {
        self.balances.funds
    }

    /// Running science total
    pub fn current_science(&self) -> Decimal {
        self.balances.science
    }

    /// Running reputation total
    pub fn current_reputation(&self) -> Decimal {
        self.balances.reputation
    }

    /// Whether this session has not yet been persisted with ledger data
    pub fn is_new_game(&self) -> bool {
        self.is_new_game
    }

    /// Reconciliation threshold in use
    pub fn epsilon(&self) -> Decimal {
        self.epsilon
    }

    /// Number of transactions
    pub fn len(&self) -> usize {
        self.transactions.len()
    }

    /// Whether the ledger holds no transactions
    pub fn is_empty(&self) -> bool {
        self.transactions.is_empty()
    }

    /// Serializable overview
    pub fn summary(&self) -> LedgerSummary {
        LedgerSummary {
            transactions: self.transactions.len(),
            funds_transactions: self.funds_view().len(),
            science_transactions: self.science_view().len(),
            reputation_transactions: self.reputation_view().len(),
            balances: self.balances,
            is_new_game: self.is_new_game,
            first_timestamp: self.transactions.first().map(Transaction::timestamp),
            last_timestamp: self.transactions.last().map(Transaction::timestamp),
        }
    }
}

impl fmt::Display for Ledger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[CareerLedger]: CurrentFunds={}, CurrentScience={}, CurrentReputation={}, contains {} transactions",
            self.balances.funds,
            self.balances.science,
            self.balances.reputation,
            self.transactions.len()
        )
    }
}

/// Overview of a ledger's contents
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LedgerSummary {
    /// Transactions in the master sequence
    pub transactions: usize,
    /// Transactions touching funds
    pub funds_transactions: usize,
    /// Transactions touching science
    pub science_transactions: usize,
    /// Transactions touching reputation
    pub reputation_transactions: usize,
    /// Running totals
    pub balances: Balances,
    /// New-game flag
    pub is_new_game: bool,
    /// Timestamp of the first transaction
    pub first_timestamp: Option<f64>,
    /// Timestamp of the last transaction
    pub last_timestamp: Option<f64>,
}

impl LedgerSummary {
    /// Pretty-printed JSON
    pub fn to_json_pretty(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

/// Read-only, order-preserving view of the transactions touching one resource
#[derive(Debug, Clone, Copy)]
pub struct TransactionView<'a> {
    transactions: &'a [Transaction],
    positions: &'a [usize],
}

impl<'a> TransactionView<'a> {
    /// Number of transactions in the view
    pub fn len(&self) -> usize {
        self.positions.len()
    }

    /// Whether the view is empty
    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }

    /// Transaction at `index` within the view
    pub fn get(&self, index: usize) -> Option<&'a Transaction> {
        self.positions
            .get(index)
            .and_then(|&position| self.transactions.get(position))
    }

    /// First transaction in the view
    pub fn first(&self) -> Option<&'a Transaction> {
        self.get(0)
    }

    /// Last transaction in the view
    pub fn last(&self) -> Option<&'a Transaction> {
        self.len().checked_sub(1).and_then(|i| self.get(i))
    }

    /// Iterate in ledger order
    pub fn iter(&self) -> ViewIter<'a> {
        ViewIter {
            transactions: self.transactions,
            positions: self.positions.iter(),
        }
    }

    /// Owned copy of the view
    pub fn to_vec(&self) -> Vec<Transaction> {
        self.iter().cloned().collect()
    }

    /// Owned copy ordered by `sorter`
    pub fn sorted(&self, sorter: TransactionSorter) -> Vec<Transaction> {
        let mut snapshot = self.to_vec();
        sorter.sort(&mut snapshot);
        snapshot
    }
}

impl<'a> IntoIterator for TransactionView<'a> {
    type Item = &'a Transaction;
    type IntoIter = ViewIter<'a>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

/// Iterator over a [`TransactionView`]
#[derive(Debug, Clone)]
pub struct ViewIter<'a> {
    transactions: &'a [Transaction],
    positions: std::slice::Iter<'a, usize>,
}

impl<'a> Iterator for ViewIter<'a> {
    type Item = &'a Transaction;

    fn next(&mut self) -> Option<Self::Item> {
        let position = *self.positions.next()?;
        self.transactions.get(position)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.positions.size_hint()
    }
}

impl<'a> DoubleEndedIterator for ViewIter<'a> {
    fn next_back(&mut self) -> Option<Self::Item> {
        let position = *self.positions.next_back()?;
        self.transactions.get(position)
    }
}

impl ExactSizeIterator for ViewIter<'_> {}

impl FusedIterator for ViewIter<'_> {}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::FixedHost;

    fn tx(timestamp: f64, reason: TransactionReason, funds: i64, science: i64, reputation: i64) -> Transaction {
        Transaction::new(
            timestamp,
            reason,
            Decimal::from(funds),
            Decimal::from(science),
            Decimal::from(reputation),
        )
    }

    fn host(time: f64, funds: f64, science: f64, reputation: f64) -> FixedHost {
        FixedHost {
            time,
            funds,
            science,
            reputation,
        }
    }

    fn assert_views_consistent(ledger: &Ledger) {
        for resource in Resource::ALL {
            let expected: Vec<&Transaction> = ledger
                .transactions()
                .iter()
                .filter(|t| !t.delta(resource).is_zero())
                .collect();
            let actual: Vec<&Transaction> = ledger.view(resource).iter().collect();
            assert_eq!(actual, expected, "{} view out of sync", resource);
        }
    }

    #[test]
    fn test_zero_delta_rejected() {
        let mut ledger = Ledger::new();
        ledger.admit(tx(1.0, TransactionReason::ContractReward, 10, 0, 0));
        let before = ledger.balances();

        assert!(!ledger.admit(tx(2.0, TransactionReason::VesselLoss, 0, 0, 0)));
        assert_eq!(ledger.len(), 1);
        assert_eq!(ledger.funds_view().len(), 1);
        assert!(ledger.science_view().is_empty());
        assert!(ledger.reputation_view().is_empty());
        assert_eq!(ledger.balances(), before);
    }

    #[test]
    fn test_admit_updates_views_and_totals() {
        let mut ledger = Ledger::new();
        ledger.admit(tx(1.0, TransactionReason::ContractReward, 100, 0, 5));
        ledger.admit(tx(2.0, TransactionReason::ScienceTransmission, 0, 12, 0));
        ledger.admit(tx(3.0, TransactionReason::VesselRollout, -40, 0, 0));

        assert_eq!(ledger.len(), 3);
        assert_eq!(ledger.funds_view().len(), 2);
        assert_eq!(ledger.science_view().len(), 1);
        assert_eq!(ledger.reputation_view().len(), 1);
        assert_eq!(ledger.current_funds(), Decimal::from(60));
        assert_eq!(ledger.current_science(), Decimal::from(12));
        assert_eq!(ledger.current_reputation(), Decimal::from(5));
        assert_views_consistent(&ledger);
    }

    #[test]
    fn test_scenario_with_correction() {
        let host = host(30.0, 150.0, 5.0, 0.0);
        let mut ledger = Ledger::new();

        ledger.admit(tx(10.0, TransactionReason::ContractReward, 100, 0, 0));
        ledger.admit(tx(20.0, TransactionReason::None, 0, 5, 0));
        let outcome = ledger.reconcile_resource(&host, Resource::Funds, 150.0, TransactionReason::None);

        assert_eq!(outcome, Reconciliation::Corrected { drift: Decimal::from(50) });
        assert_eq!(ledger.len(), 3);
        let last = ledger.transactions().last().unwrap();
        assert_eq!(last.funds_delta(), Decimal::from(50));
        assert_eq!(last.reason(), TransactionReason::None);
        assert_eq!(last.timestamp(), 30.0);
        assert_eq!(ledger.current_funds(), Decimal::from(150));
        assert_eq!(ledger.current_science(), Decimal::from(5));
        assert_eq!(ledger.funds_view().len(), 2);
        assert_eq!(ledger.science_view().len(), 1);
        assert_views_consistent(&ledger);
    }

    #[test]
    fn test_reconcile_epsilon_boundary() {
        let host = host(5.0, 0.0, 0.0, 0.0);
        let mut ledger = Ledger::new();
        ledger.admit(tx(1.0, TransactionReason::ContractReward, 100, 0, 0));

        let target = decimal_from_host(100.005).unwrap();
        let outcome = ledger.reconcile_resource(&host, Resource::Funds, 100.005, TransactionReason::None);
        assert!(matches!(outcome, Reconciliation::Absorbed { .. }));
        assert_eq!(ledger.len(), 1);
        assert_eq!(ledger.current_funds(), target);

        let before = ledger.current_funds();
        let outcome = ledger.reconcile_resource(
            &host,
            Resource::Funds,
            100.025,
            TransactionReason::None,
        );
        assert!(matches!(outcome, Reconciliation::Corrected { .. }));
        assert_eq!(ledger.len(), 2);

        let correction = ledger.transactions().last().unwrap().funds_delta();
        assert!((correction - Decimal::new(2, 2)).abs() < Decimal::new(1, 9));
        assert_eq!(ledger.current_funds(), before + correction);
        assert_eq!(ledger.current_funds(), decimal_from_host(100.025).unwrap());
    }

    #[test]
    fn test_default_epsilon_is_one_hundredth() {
        assert_eq!(DEFAULT_EPSILON, Decimal::new(1, 2));
        assert_eq!(Ledger::new().epsilon(), Decimal::new(1, 2));
    }

    #[test]
    fn test_drift_equal_to_epsilon_is_corrected() {
        let host = host(6.0, 0.0, 0.0, 0.0);
        let mut ledger = Ledger::new().with_epsilon(Decimal::new(25, 2));
        ledger.admit(tx(1.0, TransactionReason::ContractReward, 100, 0, 0));

        let outcome = ledger.reconcile_resource(&host, Resource::Funds, 100.25, TransactionReason::None);
        assert_eq!(outcome, Reconciliation::Corrected { drift: Decimal::new(25, 2) });
        assert_eq!(ledger.len(), 2);
        assert_eq!(ledger.current_funds(), Decimal::new(10025, 2));

        let outcome = ledger.reconcile_resource(&host, Resource::Funds, 100.0, TransactionReason::None);
        assert_eq!(outcome, Reconciliation::Corrected { drift: Decimal::new(-25, 2) });
        assert_eq!(ledger.len(), 3);
        assert_eq!(ledger.current_funds(), Decimal::from(100));
        assert_views_consistent(&ledger);
    }

    #[test]
    fn test_admit_drops_overflowing_transaction() {
        let mut ledger = Ledger::new();
        assert!(ledger.admit(Transaction::new(
            1.0,
            TransactionReason::None,
            Decimal::MAX,
            Decimal::ZERO,
            Decimal::ZERO,
        )));
        ledger.admit(tx(2.0, TransactionReason::None, 0, 3, 0));

        let overflowing = Transaction::new(
            3.0,
            TransactionReason::None,
            Decimal::ONE,
            Decimal::ONE,
            Decimal::ZERO,
        );
        assert!(!ledger.admit(overflowing));

        assert_eq!(ledger.len(), 2);
        assert_eq!(ledger.current_funds(), Decimal::MAX);
        assert_eq!(ledger.current_science(), Decimal::from(3));
        assert_views_consistent(&ledger);
    }

    #[test]
    fn test_restore_survives_overflowing_totals() {
        let mut node = ConfigNode::new("SCENARIO");
        for timestamp in ["1", "2"] {
            let mut child = ConfigNode::new(TRANSACTION_NODE);
            child.add_value("reason", "ContractReward");
            child.add_value("fundingDelta", "79228162514264337593543950335");
            child.add_value("timeStamp", timestamp);
            node.add_node(child);
        }
        node.add_value(NEW_GAME_KEY, "False");

        let mut ledger = Ledger::new();
        ledger.restore(&node, &FixedHost::default());

        assert_eq!(ledger.len(), 1);
        assert_eq!(ledger.current_funds(), Decimal::MAX);
        assert_views_consistent(&ledger);
    }

    #[test]
    fn test_reconcile_ignores_overflowing_drift() {
        let host = host(4.0, 0.0, 0.0, 0.0);
        let mut ledger = Ledger::new();
        ledger.admit(Transaction::new(
            1.0,
            TransactionReason::None,
            "-39600000000000000000000000000".parse().unwrap(),
            Decimal::ZERO,
            Decimal::ZERO,
        ));
        let before = ledger.balances();

        let outcome = ledger.reconcile_resource(&host, Resource::Funds, 7.0e28, TransactionReason::None);

        assert_eq!(outcome, Reconciliation::Ignored);
        assert_eq!(ledger.len(), 1);
        assert_eq!(ledger.balances(), before);
    }

    #[test]
    fn test_reconcile_unchanged_and_ignored() {
        let host = host(5.0, 0.0, 0.0, 0.0);
        let mut ledger = Ledger::new();
        ledger.admit(tx(1.0, TransactionReason::None, 0, 7, 0));

        assert_eq!(
            ledger.reconcile_resource(&host, Resource::Science, 7.0, TransactionReason::None),
            Reconciliation::Unchanged
        );
        assert_eq!(
            ledger.reconcile_resource(&host, Resource::Science, f64::NAN, TransactionReason::None),
            Reconciliation::Ignored
        );
        assert_eq!(ledger.len(), 1);
        assert_eq!(ledger.current_science(), Decimal::from(7));
    }

    #[test]
    fn test_reconcile_is_per_resource() {
        let host = host(8.0, 0.0, 0.0, 0.0);
        let mut ledger = Ledger::new();
        ledger.admit(tx(1.0, TransactionReason::None, 10, 10, 10));

        ledger.reconcile_resource(&host, Resource::Reputation, -15.0, TransactionReason::None);

        assert_eq!(ledger.current_funds(), Decimal::from(10));
        assert_eq!(ledger.current_science(), Decimal::from(10));
        assert_eq!(ledger.current_reputation(), Decimal::from(-15));
        let last = ledger.transactions().last().unwrap();
        assert_eq!(last.reputation_delta(), Decimal::from(-25));
        assert!(last.funds_delta().is_zero() && last.science_delta().is_zero());
        assert_eq!(ledger.reputation_view().len(), 2);
        assert_eq!(ledger.funds_view().len(), 1);
    }

    #[test]
    fn test_custom_epsilon() {
        let host = host(1.0, 0.0, 0.0, 0.0);
        let mut ledger = Ledger::new().with_epsilon(Decimal::ONE);

        let outcome = ledger.reconcile_resource(&host, Resource::Science, 0.5, TransactionReason::None);
        assert!(matches!(outcome, Reconciliation::Absorbed { .. }));
        assert!(ledger.is_empty());

        let outcome = ledger.reconcile_resource(&host, Resource::Science, 1.5, TransactionReason::None);
        assert_eq!(outcome, Reconciliation::Corrected { drift: Decimal::ONE });
    }

    #[test]
    fn test_host_events() {
        let host = host(42.0, 0.0, 0.0, 0.0);
        let mut ledger = Ledger::new();

        let query = CurrencyModifierQuery::new(TransactionReason::ContractAdvance)
            .with_input(Resource::Funds, 5000.0)
            .with_effect(Resource::Funds, -500.0);
        ledger.handle_event(&host, &HostEvent::CurrencyModified(query));
        ledger.handle_event(
            &host,
            &HostEvent::TotalChanged {
                resource: Resource::Funds,
                value: 4500.0,
                reason: TransactionReason::ContractAdvance,
            },
        );

        assert_eq!(ledger.len(), 1);
        let first = &ledger.transactions()[0];
        assert_eq!(first.timestamp(), 42.0);
        assert_eq!(first.reason(), TransactionReason::ContractAdvance);
        assert_eq!(ledger.current_funds(), Decimal::from(4500));

        let empty = CurrencyModifierQuery::new(TransactionReason::Progression);
        assert!(!ledger.on_query_delta(&host, &empty));
        assert_eq!(ledger.len(), 1);
    }

    #[test]
    fn test_persist_and_restore_round_trip() {
        let host = host(99.0, 0.0, 0.0, 0.0);
        let mut ledger = Ledger::new();
        ledger.admit(tx(10.0, TransactionReason::ContractReward, 100, 0, 3));
        ledger.admit(Transaction::new(
            20.5,
            TransactionReason::RnDTechResearch,
            Decimal::ZERO,
            Decimal::new(-455, 1),
            Decimal::ZERO,
        ));
        ledger.admit(tx(30.0, TransactionReason::VesselRecovery, 1234, 0, 0));

        let mut node = ConfigNode::new("SCENARIO");
        ledger.persist(&mut node);
        assert!(!ledger.is_new_game());
        assert_eq!(node.get_value(NEW_GAME_KEY), Some("False"));
        assert_eq!(node.get_nodes(TRANSACTION_NODE).count(), 3);

        let mut restored = Ledger::new();
        restored.restore(&node, &host);

        assert_eq!(restored.transactions(), ledger.transactions());
        assert_eq!(restored.balances(), ledger.balances());
        assert!(!restored.is_new_game());
        assert_views_consistent(&restored);
    }

    #[test]
    fn test_persist_replaces_previous_contents() {
        let mut ledger = Ledger::new();
        ledger.admit(tx(1.0, TransactionReason::None, 1, 0, 0));

        let mut node = ConfigNode::new("SCENARIO");
        node.add_value("name", "CareerLedger");
        ledger.persist(&mut node);
        ledger.admit(tx(2.0, TransactionReason::None, 2, 0, 0));
        ledger.persist(&mut node);

        assert_eq!(node.get_nodes(TRANSACTION_NODE).count(), 2);
        assert_eq!(node.get_values(NEW_GAME_KEY).count(), 1);
        assert_eq!(node.get_value("name"), Some("CareerLedger"));
    }

    #[test]
    fn test_restore_sorts_and_drops_zero_entries() {
        let mut node = ConfigNode::new("SCENARIO");
        node.add_value(NEW_GAME_KEY, "False");
        for (time, funds, science) in [(30.0, 3, 0), (10.0, 1, 0), (20.0, 0, 2), (15.0, 0, 0)] {
            let mut child = ConfigNode::new(TRANSACTION_NODE);
            tx(time, TransactionReason::None, funds, science, 0).save(&mut child);
            node.add_node(child);
        }
        node.add_node(ConfigNode::new("UNRELATED"));

        let mut ledger = Ledger::new();
        ledger.admit(tx(1000.0, TransactionReason::Cheating, 999, 0, 0));
        ledger.restore(&node, &host(0.0, 0.0, 0.0, 0.0));

        let times: Vec<f64> = ledger.transactions().iter().map(|t| t.timestamp()).collect();
        assert_eq!(times, vec![10.0, 20.0, 30.0]);
        let fund_times: Vec<f64> = ledger.funds_view().iter().map(|t| t.timestamp()).collect();
        assert_eq!(fund_times, vec![10.0, 30.0]);
        assert_eq!(ledger.current_funds(), Decimal::from(4));
        assert_eq!(ledger.current_science(), Decimal::from(2));
        assert_views_consistent(&ledger);
    }

    #[test]
    fn test_restore_legacy_save_rebalances() {
        // Host already holds balances the empty ledger knows nothing about
        let host = host(500.0, 25000.0, 12.5, 0.0);
        let mut node = ConfigNode::new("SCENARIO");
        let mut child = ConfigNode::new(TRANSACTION_NODE);
        tx(100.0, TransactionReason::ContractReward, 5000, 0, 0).save(&mut child);
        node.add_node(child);
        node.add_value(NEW_GAME_KEY, "True");

        let mut ledger = Ledger::new();
        ledger.restore(&node, &host);

        assert!(ledger.is_new_game());
        assert_eq!(ledger.len(), 3);
        assert_eq!(ledger.current_funds(), Decimal::from(25000));
        assert_eq!(ledger.current_science(), Decimal::new(125, 1));
        assert_eq!(ledger.current_reputation(), Decimal::ZERO);

        let corrections: Vec<&Transaction> = ledger.transactions()[1..].iter().collect();
        assert_eq!(corrections[0].funds_delta(), Decimal::from(20000));
        assert_eq!(corrections[1].science_delta(), Decimal::new(125, 1));
        assert!(corrections.iter().all(|t| t.timestamp() == 500.0));
    }

    #[test]
    fn test_restore_missing_flag_counts_as_new_game() {
        let host = host(1.0, 10.0, 0.0, 0.0);
        let mut ledger = Ledger::new();
        ledger.restore(&ConfigNode::new("SCENARIO"), &host);

        assert!(ledger.is_new_game());
        assert_eq!(ledger.len(), 1);
        assert_eq!(ledger.current_funds(), Decimal::from(10));
    }

    #[test]
    fn test_rebalance_recomputes_after_absorbed_drift() {
        let host = host(2.0, 100.0, 0.0, 0.0);
        let mut ledger = Ledger::new();
        ledger.admit(tx(1.0, TransactionReason::None, 100, 0, 0));
        ledger.reconcile_resource(&host, Resource::Funds, 100.004, TransactionReason::None);
        assert_ne!(ledger.current_funds(), Decimal::from(100));

        ledger.rebalance(&host);
        assert_eq!(ledger.current_funds(), Decimal::from(100));
        assert_eq!(ledger.len(), 1);
    }

    #[test]
    fn test_view_accessors() {
        let mut ledger = Ledger::new();
        ledger.admit(tx(1.0, TransactionReason::None, 5, 0, 0));
        ledger.admit(tx(2.0, TransactionReason::None, 0, 1, 0));
        ledger.admit(tx(3.0, TransactionReason::None, -2, 0, 0));

        let funds = ledger.funds_view();
        assert_eq!(funds.first().map(Transaction::timestamp), Some(1.0));
        assert_eq!(funds.last().map(Transaction::timestamp), Some(3.0));
        assert!(funds.get(2).is_none());
        assert_eq!(funds.iter().len(), 2);
        assert_eq!(funds.iter().rev().next().map(Transaction::timestamp), Some(3.0));
        assert_eq!(funds.into_iter().count(), 2);
        assert!(ledger.reputation_view().last().is_none());
    }

    #[test]
    fn test_sorted_snapshots() {
        let mut ledger = Ledger::new();
        ledger.admit(tx(1.0, TransactionReason::None, 5, 0, 0));
        ledger.admit(tx(2.0, TransactionReason::None, 0, 1, 0));
        ledger.admit(tx(3.0, TransactionReason::None, 50, 0, 0));

        let by_funds = ledger.sorted(
            Some(Resource::Funds),
            TransactionSorter::new(crate::SortKey::Funds, crate::SortOrder::Descending),
        );
        assert_eq!(by_funds.len(), 2);
        assert_eq!(by_funds[0].funds_delta(), Decimal::from(50));

        let newest_first = ledger.sorted(
            None,
            TransactionSorter::new(crate::SortKey::Time, crate::SortOrder::Descending),
        );
        assert_eq!(newest_first[0].timestamp(), 3.0);
        // Snapshots never reorder the ledger itself
        assert_eq!(ledger.transactions()[0].timestamp(), 1.0);
    }

    #[test]
    fn test_metrics_follow_ledger() {
        let metrics = Metrics::new().unwrap();
        let host = host(1.0, 0.0, 0.0, 0.0);
        let mut ledger = Ledger::new().with_metrics(metrics.clone());

        ledger.admit(tx(1.0, TransactionReason::None, 0, 0, 0));
        ledger.admit(tx(1.0, TransactionReason::None, 10, 0, 0));
        ledger.reconcile_resource(&host, Resource::Funds, 10.001, TransactionReason::None);
        ledger.reconcile_resource(&host, Resource::Funds, 20.0, TransactionReason::None);

        assert_eq!(metrics.zero_delta_rejected.get(), 1);
        assert_eq!(metrics.transactions_total.get(), 2);
        assert_eq!(metrics.ledger_size.get(), 2);
        assert_eq!(metrics.corrections_total.with_label_values(&["funds"]).get(), 1);
        assert_eq!(metrics.drift_absorbed_total.with_label_values(&["funds"]).get(), 1);
    }

    #[test]
    fn test_from_config_and_summary() {
        let mut config = Config::default();
        config.reconciliation.epsilon = Decimal::new(5, 1);
        config.metrics_enabled = false;

        let mut ledger = Ledger::from_config(&config).unwrap();
        assert_eq!(ledger.epsilon(), Decimal::new(5, 1));

        ledger.admit(tx(4.0, TransactionReason::None, 1, 2, 0));
        let summary = ledger.summary();
        assert_eq!(summary.transactions, 1);
        assert_eq!(summary.funds_transactions, 1);
        assert_eq!(summary.science_transactions, 1);
        assert_eq!(summary.reputation_transactions, 0);
        assert_eq!(summary.first_timestamp, Some(4.0));
        assert!(summary.is_new_game);
        assert!(ledger.to_string().contains("contains 1 transactions"));

        let json = summary.to_json_pretty().unwrap();
        let back: LedgerSummary = serde_json::from_str(&json).unwrap();
        assert_eq!(back, summary);
    }
}
