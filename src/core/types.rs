use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

pub const DEFAULT_TRIAL_COUNT: u32 = 5_000;

#[derive(Copy, Clone, Debug, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub enum AssetClass {
    Equity,
    Debt,
    Gold,
    Other,
}

impl AssetClass {
    pub fn key(self) -> &'static str {
        match self {
            AssetClass::Equity => "equity",
            AssetClass::Debt => "debt",
            AssetClass::Gold => "gold",
            AssetClass::Other => "other",
        }
    }
}

impl fmt::Display for AssetClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

/// Percentage weights per asset class, keyed by class name.
///
/// Weights are taken as given: nothing here checks that they add up to 100.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Allocation(BTreeMap<String, f64>);

impl Allocation {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_classes(equity: f64, debt: f64, gold: f64, other: f64) -> Self {
        let mut allocation = Self::new();
        allocation.set(AssetClass::Equity, equity);
        allocation.set(AssetClass::Debt, debt);
        allocation.set(AssetClass::Gold, gold);
        allocation.set(AssetClass::Other, other);
        allocation
    }

    pub fn set(&mut self, class: AssetClass, weight: f64) {
        self.0.insert(class.key().to_string(), weight);
    }

    pub fn insert(&mut self, asset: impl Into<String>, weight: f64) {
        self.0.insert(asset.into(), weight);
    }

    pub fn weight(&self, asset: &str) -> Option<f64> {
        self.0.get(asset).copied()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, f64)> {
        self.0.iter().map(|(name, weight)| (name.as_str(), *weight))
    }

    pub fn total_weight(&self) -> f64 {
        self.0.values().sum()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InvestmentMode {
    #[serde(alias = "sip")]
    Periodic,
    #[serde(alias = "lumpsum", alias = "lumpSum")]
    LumpSum,
}

/// Cash-flow regime of one projection.
#[derive(Debug, Clone, PartialEq)]
pub struct InvestmentSchedule {
    pub mode: InvestmentMode,
    /// Contribution landing at the end of every month (periodic mode).
    pub periodic_amount: Option<f64>,
    /// Amount invested once at the start (lump-sum mode).
    pub lump_sum_amount: Option<f64>,
    pub duration_years: u32,
}

impl InvestmentSchedule {
    pub fn periodic(amount: f64, duration_years: u32) -> Self {
        Self {
            mode: InvestmentMode::Periodic,
            periodic_amount: Some(amount),
            lump_sum_amount: None,
            duration_years,
        }
    }

    pub fn lump_sum(amount: f64, duration_years: u32) -> Self {
        Self {
            mode: InvestmentMode::LumpSum,
            periodic_amount: None,
            lump_sum_amount: Some(amount),
            duration_years,
        }
    }

    pub fn with_active_amount(&self, amount: f64) -> Self {
        let mut schedule = self.clone();
        match schedule.mode {
            InvestmentMode::Periodic => schedule.periodic_amount = Some(amount),
            InvestmentMode::LumpSum => schedule.lump_sum_amount = Some(amount),
        }
        schedule
    }

    pub(crate) fn step_count(&self) -> u32 {
        match self.mode {
            InvestmentMode::Periodic => self.duration_years.saturating_mul(12),
            InvestmentMode::LumpSum => self.duration_years,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SimulationParams {
    pub trial_count: u32,
    pub goal_amount: f64,
    /// Fixed seed for replayable runs; a fresh one is drawn when absent.
    pub seed: Option<u64>,
    /// Worker threads for the trial fan-out; `None` uses the global pool.
    pub workers: Option<usize>,
    pub include_trials: bool,
}

impl SimulationParams {
    pub fn new(goal_amount: f64) -> Self {
        Self {
            trial_count: DEFAULT_TRIAL_COUNT,
            goal_amount,
            seed: None,
            workers: None,
            include_trials: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SimulationRequest {
    pub allocation: Allocation,
    pub schedule: InvestmentSchedule,
    pub params: SimulationParams,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BlendedParameters {
    pub expected_return: f64,
    pub volatility: f64,
    /// Asset names priced with the fallback assumption.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub unknown_assets: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OutcomeStats {
    pub expected_value: f64,
    pub worst_case: f64,
    pub best_case: f64,
    pub probability_of_goal_achievement: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SimulationOutcome {
    pub expected_value: f64,
    /// 5th percentile terminal value.
    pub worst_case: f64,
    /// 95th percentile terminal value.
    pub best_case: f64,
    pub probability_of_goal_achievement: f64,
    pub trial_count: u32,
    pub seed: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub trials: Option<Vec<f64>>,
}
