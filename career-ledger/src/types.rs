//! Core types for the career ledger
//!
//! All money-like quantities are `Decimal` so long play sessions
//! accumulate without floating-point drift. The host reports `f64`
//! values; they are converted once, at the boundary.

use rust_decimal::prelude::FromPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

/// One of the three tracked career resources
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Resource {
    /// Funds (the space program's money)
    Funds,
    /// Science points
    Science,
    /// Reputation
    Reputation,
}

impl Resource {
    /// All resources, in the order views and totals are kept
    pub const ALL: [Resource; 3] = [Resource::Funds, Resource::Science, Resource::Reputation];

    /// Stable position of this resource in per-resource arrays
    pub fn index(self) -> usize {
        match self {
            Resource::Funds => 0,
            Resource::Science => 1,
            Resource::Reputation => 2,
        }
    }

    /// Display name
    pub fn name(self) -> &'static str {
        match self {
            Resource::Funds => "funds",
            Resource::Science => "science",
            Resource::Reputation => "reputation",
        }
    }
}

impl fmt::Display for Resource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Why a currency change happened, as reported by the host
///
/// The set is fixed by the host; the ledger treats it as opaque symbols.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[allow(missing_docs)]
pub enum TransactionReason {
    /// No reason given (also used for ledger corrections)
    #[default]
    None,
    ContractAdvance,
    ContractReward,
    ContractPenalty,
    ContractDecline,
    VesselRollout,
    VesselRecovery,
    VesselLoss,
    StrategyInput,
    StrategyOutput,
    StrategySetup,
    ScienceTransmission,
    StructureRepair,
    StructureCollapse,
    StructureConstruction,
    RnDTechResearch,
    RnDPartPurchase,
    Cheating,
    CrewRecruited,
    Progression,
    Any,
}

impl TransactionReason {
    /// Every reason code the host knows about
    pub const ALL: [TransactionReason; 21] = [
        TransactionReason::None,
        TransactionReason::ContractAdvance,
        TransactionReason::ContractReward,
        TransactionReason::ContractPenalty,
        TransactionReason::ContractDecline,
        TransactionReason::VesselRollout,
        TransactionReason::VesselRecovery,
        TransactionReason::VesselLoss,
        TransactionReason::StrategyInput,
        TransactionReason::StrategyOutput,
        TransactionReason::StrategySetup,
        TransactionReason::ScienceTransmission,
        TransactionReason::StructureRepair,
        TransactionReason::StructureCollapse,
        TransactionReason::StructureConstruction,
        TransactionReason::RnDTechResearch,
        TransactionReason::RnDPartPurchase,
        TransactionReason::Cheating,
        TransactionReason::CrewRecruited,
        TransactionReason::Progression,
        TransactionReason::Any,
    ];

    /// Persisted name of the reason code
    pub fn name(self) -> &'static str {
        match self {
            TransactionReason::None => "None",
            TransactionReason::ContractAdvance => "ContractAdvance",
            TransactionReason::ContractReward => "ContractReward",
            TransactionReason::ContractPenalty => "ContractPenalty",
            TransactionReason::ContractDecline => "ContractDecline",
            TransactionReason::VesselRollout => "VesselRollout",
            TransactionReason::VesselRecovery => "VesselRecovery",
            TransactionReason::VesselLoss => "VesselLoss",
            TransactionReason::StrategyInput => "StrategyInput",
            TransactionReason::StrategyOutput => "StrategyOutput",
            TransactionReason::StrategySetup => "StrategySetup",
            TransactionReason::ScienceTransmission => "ScienceTransmission",
            TransactionReason::StructureRepair => "StructureRepair",
            TransactionReason::StructureCollapse => "StructureCollapse",
            TransactionReason::StructureConstruction => "StructureConstruction",
            TransactionReason::RnDTechResearch => "RnDTechResearch",
            TransactionReason::RnDPartPurchase => "RnDPartPurchase",
            TransactionReason::Cheating => "Cheating",
            TransactionReason::CrewRecruited => "CrewRecruited",
            TransactionReason::Progression => "Progression",
            TransactionReason::Any => "Any",
        }
    }

    /// Parse from a persisted name
    pub fn from_name(s: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|reason| reason.name() == s)
    }

    /// Parse from a persisted name, substituting `None` for unknown codes
    pub fn from_name_or_default(s: &str) -> Self {
        Self::from_name(s).unwrap_or_default()
    }
}

impl fmt::Display for TransactionReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Running totals of the three resources
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Balances {
    /// Funds total
    pub funds: Decimal,
    /// Science total
    pub science: Decimal,
    /// Reputation total
    pub reputation: Decimal,
}

impl Balances {
    /// Total for one resource
    pub fn get(&self, resource: Resource) -> Decimal {
        match resource {
            Resource::Funds => self.funds,
            Resource::Science => self.science,
            Resource::Reputation => self.reputation,
        }
    }

    pub(crate) fn set(&mut self, resource: Resource, value: Decimal) {
        match resource {
            Resource::Funds => self.funds = value,
            Resource::Science => self.science = value,
            Resource::Reputation => self.reputation = value,
        }
    }

    /// Totals with `delta` added to one resource, or `None` on overflow
    pub(crate) fn checked_add(&self, resource: Resource, delta: Decimal) -> Option<Self> {
        let mut next = *self;
        next.set(resource, self.get(resource).checked_add(delta)?);
        Some(next)
    }
}

/// Convert a host-reported amount into ledger precision
///
/// Returns `None` for NaN, infinities and magnitudes `Decimal` cannot hold.
pub fn decimal_from_host(value: f64) -> Option<Decimal> {
    if !value.is_finite() {
        return None;
    }
    Decimal::from_f64(value)
}
