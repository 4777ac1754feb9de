//! Contract with the simulation host
//!
//! The ledger never reaches into the host. Whatever adapter receives the
//! host's notifications turns them into [`HostEvent`]s and hands the ledger
//! a [`CurrencyHost`] for the two things it must ask about: the current
//! simulation time and the host's own resource balances.

use crate::types::{Resource, TransactionReason};
use serde::{Deserialize, Serialize};

/// Host-side view of the simulation clock and authoritative balances
pub trait CurrencyHost {
    /// Current simulation time in seconds
    fn universal_time(&self) -> f64;

    /// The host's own total for a resource
    fn authoritative_total(&self, resource: Resource) -> f64;
}

/// A multi-resource change as the host models it
///
/// The host splits each change into the requested `input` and a computed
/// modifier `effect`; the amount that actually moved is their sum.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct CurrencyModifierQuery {
    /// Why the change happened
    pub reason: TransactionReason,
    inputs: [f64; 3],
    effects: [f64; 3],
}

impl CurrencyModifierQuery {
    /// Create an empty query for a reason
    pub fn new(reason: TransactionReason) -> Self {
        Self {
            reason,
            ..Self::default()
        }
    }

    /// Set the requested input for a resource
    pub fn with_input(mut self, resource: Resource, amount: f64) -> Self {
        self.inputs[resource.index()] = amount;
        self
    }

    /// Set the modifier effect for a resource
    pub fn with_effect(mut self, resource: Resource, amount: f64) -> Self {
        self.effects[resource.index()] = amount;
        self
    }

    /// Requested input amount
    pub fn input(&self, resource: Resource) -> f64 {
        self.inputs[resource.index()]
    }

    /// Modifier effect amount
    pub fn effect_delta(&self, resource: Resource) -> f64 {
        self.effects[resource.index()]
    }
}

/// Notification delivered by the host adapter
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum HostEvent {
    /// A multi-resource delta occurred
    CurrencyModified(CurrencyModifierQuery),

    /// The host's total for one resource changed
    TotalChanged {
        /// Affected resource
        resource: Resource,
        /// New host total
        value: f64,
        /// Reason reported with the change
        reason: TransactionReason,
    },
}

/// Host with a fixed clock and fixed balances
///
/// Useful for offline audits of a save file and for tests.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct FixedHost {
    /// Simulation time reported to the ledger
    pub time: f64,
    /// Funds balance
    pub funds: f64,
    /// Science balance
    pub science: f64,
    /// Reputation balance
    pub reputation: f64,
}

impl CurrencyHost for FixedHost {
    fn universal_time(&self) -> f64 {
        self.time
    }

    fn authoritative_total(&self, resource: Resource) -> f64 {
        match resource {
            Resource::Funds => self.funds,
            Resource::Science => self.science,
            Resource::Reputation => self.reputation,
        }
    }
}
