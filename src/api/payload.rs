use serde::{Deserialize, Serialize};

use crate::advisory::{RiskProfile, TaxSavingPlan};
use crate::core::{
    Allocation, AssetClass, BlendedParameters, GoalSolveConfig, GoalSolveResult, GoalType,
    InvestmentMode, InvestmentSchedule, Result, SimulationError, SimulationOutcome,
    SimulationParams, SimulationRequest,
};

use super::config::ServerConfig;

const DEFAULT_TARGET_PROBABILITY: f64 = 0.9;
const DEFAULT_TOLERANCE: f64 = 1.0;
const DEFAULT_MAX_ITERATIONS: u32 = 40;
const DEFAULT_TRIALS_PER_ITERATION: u32 = 1_000;

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub(super) struct InvestmentPayload {
    #[serde(rename = "type", alias = "mode")]
    pub mode: Option<InvestmentMode>,
    #[serde(
        alias = "monthlyAmount",
        alias = "monthly_amount",
        alias = "periodic_amount"
    )]
    pub periodic_amount: Option<f64>,
    #[serde(
        alias = "lumpsumAmount",
        alias = "lumpsum_amount",
        alias = "lump_sum_amount"
    )]
    pub lump_sum_amount: Option<f64>,
    #[serde(alias = "duration_years")]
    pub duration_years: Option<u32>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub(super) struct SimulationParamsPayload {
    #[serde(alias = "num_simulations", alias = "trialCount", alias = "trial_count")]
    pub num_simulations: Option<u32>,
    #[serde(alias = "goal_amount")]
    pub goal_amount: Option<f64>,
    pub seed: Option<u64>,
    pub workers: Option<usize>,
    #[serde(alias = "include_trials")]
    pub include_trials: Option<bool>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub(super) struct SimulatePayload {
    pub allocation: Option<Allocation>,
    #[serde(alias = "investment_details", alias = "investmentDetails")]
    pub investment: Option<InvestmentPayload>,
    #[serde(alias = "simulation_params")]
    pub simulation_params: Option<SimulationParamsPayload>,
}

/// Flat query-string form of [`SimulatePayload`] for `GET /api/simulate`.
#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub(super) struct SimulateQuery {
    equity: Option<f64>,
    debt: Option<f64>,
    gold: Option<f64>,
    other: Option<f64>,
    #[serde(rename = "type", alias = "mode")]
    mode: Option<InvestmentMode>,
    #[serde(
        alias = "periodicAmount",
        alias = "monthly_amount",
        alias = "periodic_amount"
    )]
    monthly_amount: Option<f64>,
    #[serde(
        alias = "lumpSumAmount",
        alias = "lumpsum_amount",
        alias = "lump_sum_amount"
    )]
    lumpsum_amount: Option<f64>,
    #[serde(alias = "duration_years")]
    duration_years: Option<u32>,
    #[serde(alias = "num_simulations")]
    num_simulations: Option<u32>,
    #[serde(alias = "goal_amount")]
    goal_amount: Option<f64>,
    seed: Option<u64>,
    workers: Option<usize>,
    #[serde(alias = "include_trials")]
    include_trials: Option<bool>,
}

impl From<SimulateQuery> for SimulatePayload {
    fn from(query: SimulateQuery) -> Self {
        let weights = [
            (AssetClass::Equity, query.equity),
            (AssetClass::Debt, query.debt),
            (AssetClass::Gold, query.gold),
            (AssetClass::Other, query.other),
        ];
        let mut allocation = Allocation::new();
        for (class, weight) in weights {
            if let Some(weight) = weight {
                allocation.set(class, weight);
            }
        }

        SimulatePayload {
            allocation: (!allocation.is_empty()).then_some(allocation),
            investment: Some(InvestmentPayload {
                mode: query.mode,
                periodic_amount: query.monthly_amount,
                lump_sum_amount: query.lumpsum_amount,
                duration_years: query.duration_years,
            }),
            simulation_params: Some(SimulationParamsPayload {
                num_simulations: query.num_simulations,
                goal_amount: query.goal_amount,
                seed: query.seed,
                workers: query.workers,
                include_trials: query.include_trials,
            }),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub(super) struct SolveGoalPayload {
    #[serde(flatten)]
    pub simulation: SimulatePayload,
    #[serde(alias = "goal_type")]
    pub goal_type: Option<GoalType>,
    #[serde(alias = "target_probability")]
    pub target_probability: Option<f64>,
    #[serde(alias = "search_min")]
    pub search_min: Option<f64>,
    #[serde(alias = "search_max")]
    pub search_max: Option<f64>,
    pub tolerance: Option<f64>,
    #[serde(alias = "max_iterations")]
    pub max_iterations: Option<u32>,
    #[serde(alias = "trials_per_iteration")]
    pub trials_per_iteration: Option<u32>,
    #[serde(alias = "final_trials")]
    pub final_trials: Option<u32>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub(super) struct PortfolioQuery {
    #[serde(alias = "risk_category", alias = "category")]
    pub risk_category: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub(super) struct GuardPayload {
    pub text: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub(super) struct GlossaryQuery {
    pub term: Option<String>,
}

#[derive(Debug, Serialize)]
pub(super) struct GlossaryEntry {
    pub term: String,
    pub definition: &'static str,
}

#[derive(Debug, Serialize)]
pub(super) struct GlossaryIndex {
    pub terms: Vec<&'static str>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(super) struct TaxSavingResponse {
    #[serde(flatten)]
    pub plan: TaxSavingPlan,
    pub disclaimer: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(super) struct SimulateResponse {
    #[serde(flatten)]
    pub outcome: SimulationOutcome,
    pub goal_amount: f64,
    pub mode: InvestmentMode,
    pub duration_years: u32,
    pub portfolio: BlendedParameters,
    pub disclaimer: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(super) struct SolveGoalResponse {
    #[serde(flatten)]
    pub result: GoalSolveResult,
    pub disclaimer: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(super) struct RiskProfileResponse {
    #[serde(flatten)]
    pub profile: RiskProfile,
    pub allocation: Allocation,
    pub allocation_explanation: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(super) struct PortfolioResponse {
    pub risk_category: String,
    pub allocation: Allocation,
    pub explanation: String,
}

#[derive(Debug, Serialize)]
pub(super) struct SanitizedText {
    pub text: String,
    pub modified: bool,
}

#[derive(Debug, Serialize)]
pub(super) struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
}

#[derive(Debug, Serialize)]
pub(super) struct ErrorResponse {
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub field: Option<&'static str>,
}

fn required<T>(value: Option<T>, field: &'static str) -> Result<T> {
    value.ok_or_else(|| SimulationError::invalid(field, "is required"))
}

fn capped_trials(trials: u32, field: &'static str, config: &ServerConfig) -> Result<u32> {
    if trials > config.max_trial_count {
        return Err(SimulationError::invalid(
            field,
            format!("must be <= {}", config.max_trial_count),
        ));
    }
    Ok(trials)
}

/// Fills request defaults from `config`; range checks are left to the engine.
pub(super) fn simulation_request_from_payload(
    payload: SimulatePayload,
    config: &ServerConfig,
) -> Result<SimulationRequest> {
    let allocation = required(payload.allocation, "allocation")?;
    let investment = required(payload.investment, "investment")?;
    let mode = required(investment.mode, "investment.type")?;
    let duration_years = required(investment.duration_years, "duration_years")?;
    let params = payload.simulation_params.unwrap_or_default();

    let workers = params.workers.or(config.workers);
    if let Some(requested) = workers {
        if requested > config.max_workers {
            return Err(SimulationError::invalid(
                "workers",
                format!("must be <= {}", config.max_workers),
            ));
        }
    }

    let trial_count = capped_trials(
        params.num_simulations.unwrap_or(config.default_trial_count),
        "trial_count",
        config,
    )?;

    Ok(SimulationRequest {
        allocation,
        schedule: InvestmentSchedule {
            mode,
            periodic_amount: investment.periodic_amount,
            lump_sum_amount: investment.lump_sum_amount,
            duration_years,
        },
        params: SimulationParams {
            trial_count,
            goal_amount: params.goal_amount.unwrap_or(config.default_goal_amount),
            seed: params.seed,
            workers,
            include_trials: params.include_trials.unwrap_or(false),
        },
    })
}

pub(super) fn solve_request_from_payload(
    payload: SolveGoalPayload,
    config: &ServerConfig,
) -> Result<(SimulationRequest, GoalSolveConfig)> {
    let request = simulation_request_from_payload(payload.simulation, config)?;
    let trials_per_iteration = capped_trials(
        payload
            .trials_per_iteration
            .unwrap_or(DEFAULT_TRIALS_PER_ITERATION.min(config.default_trial_count)),
        "trials_per_iteration",
        config,
    )?;
    let final_trials = capped_trials(
        payload.final_trials.unwrap_or(request.params.trial_count),
        "final_trials",
        config,
    )?;

    let solve = GoalSolveConfig {
        goal_type: payload.goal_type.unwrap_or(GoalType::RequiredAmount),
        target_probability: payload
            .target_probability
            .unwrap_or(DEFAULT_TARGET_PROBABILITY),
        search_min: payload.search_min.unwrap_or(0.0),
        search_max: required(payload.search_max, "search_max")?,
        tolerance: payload.tolerance.unwrap_or(DEFAULT_TOLERANCE),
        max_iterations: payload.max_iterations.unwrap_or(DEFAULT_MAX_ITERATIONS),
        trials_per_iteration,
        final_trials,
    };
    Ok((request, solve))
}
