use std::sync::atomic::{AtomicBool, Ordering};

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rand_distr::{Distribution, Normal};

use super::error::{Result, SimulationError};
use super::market::ReturnModel;
use super::types::{
    BlendedParameters, InvestmentMode, InvestmentSchedule, OutcomeStats, SimulationOutcome,
    SimulationRequest,
};

const MONTHS_PER_YEAR: f64 = 12.0;
/// Upper bound on a single contribution or lump sum.
pub const MAX_CASH_FLOW_AMOUNT: f64 = 1e15;
const TRIAL_BATCH_SIZE: usize = 256;
const WORST_CASE_QUANTILE: f64 = 0.05;
const BEST_CASE_QUANTILE: f64 = 0.95;

/// Resolved cash-flow regime of a validated schedule.
#[derive(Copy, Clone, Debug, PartialEq)]
pub enum CashFlow {
    Periodic { amount: f64 },
    LumpSum { amount: f64 },
}

impl CashFlow {
    pub fn from_schedule(schedule: &InvestmentSchedule) -> Result<Self> {
        match schedule.mode {
            InvestmentMode::Periodic => {
                let amount = required_amount(schedule.periodic_amount, "periodic_amount")?;
                Ok(CashFlow::Periodic { amount })
            }
            InvestmentMode::LumpSum => {
                let amount = required_amount(schedule.lump_sum_amount, "lump_sum_amount")?;
                Ok(CashFlow::LumpSum { amount })
            }
        }
    }
}

fn required_amount(amount: Option<f64>, field: &'static str) -> Result<f64> {
    let amount = amount.ok_or(SimulationError::MissingField { field })?;
    if !amount.is_finite() {
        return Err(SimulationError::invalid(field, "must be finite"));
    }
    if amount < 0.0 {
        return Err(SimulationError::invalid(field, "must be >= 0"));
    }
    if amount > MAX_CASH_FLOW_AMOUNT {
        return Err(SimulationError::invalid(
            field,
            format!("must be <= {MAX_CASH_FLOW_AMOUNT:e}"),
        ));
    }
    Ok(amount)
}

/// Blended portfolio figures together with the outcome they produced.
#[derive(Debug, Clone, PartialEq)]
pub struct Projection {
    pub portfolio: BlendedParameters,
    pub outcome: SimulationOutcome,
}

pub fn simulate(model: &ReturnModel, request: &SimulationRequest) -> Result<SimulationOutcome> {
    let cancel = AtomicBool::new(false);
    simulate_with_cancel(model, request, &cancel).map(|projection| projection.outcome)
}

/// Runs a full projection; raising `cancel` abandons it before aggregation.
pub fn simulate_with_cancel(
    model: &ReturnModel,
    request: &SimulationRequest,
    cancel: &AtomicBool,
) -> Result<Projection> {
    let cash_flow = validate(request)?;
    let portfolio = model.blend(&request.allocation);
    let params = &request.params;
    let seed = params.seed.unwrap_or_else(rand::random::<u64>);

    tracing::debug!(
        expected_return = portfolio.expected_return,
        volatility = portfolio.volatility,
        trial_count = params.trial_count,
        duration_years = request.schedule.duration_years,
        steps_per_trial = request.schedule.step_count(),
        seed,
        "starting projection"
    );

    let mut trials = simulate_trials(
        &portfolio,
        cash_flow,
        request.schedule.duration_years,
        params.trial_count as usize,
        seed,
        params.workers,
        cancel,
    )?;
    let stats = summarize(&mut trials, params.goal_amount)?;

    Ok(Projection {
        portfolio,
        outcome: SimulationOutcome {
            expected_value: stats.expected_value,
            worst_case: stats.worst_case,
            best_case: stats.best_case,
            probability_of_goal_achievement: stats.probability_of_goal_achievement,
            trial_count: params.trial_count,
            seed,
            trials: params.include_trials.then_some(trials),
        },
    })
}

pub fn validate(request: &SimulationRequest) -> Result<CashFlow> {
    let schedule = &request.schedule;
    let params = &request.params;

    if schedule.duration_years < 1 {
        return Err(SimulationError::invalid("duration_years", "must be >= 1"));
    }
    if params.trial_count < 1 {
        return Err(SimulationError::invalid("trial_count", "must be >= 1"));
    }
    if !params.goal_amount.is_finite() || params.goal_amount < 0.0 {
        return Err(SimulationError::invalid(
            "goal_amount",
            "must be finite and >= 0",
        ));
    }
    if params.workers == Some(0) {
        return Err(SimulationError::invalid("workers", "must be >= 1"));
    }
    for (asset, weight) in request.allocation.iter() {
        if !weight.is_finite() || weight < 0.0 {
            return Err(SimulationError::invalid(
                "allocation",
                format!("weight for {asset} must be finite and >= 0"),
            ));
        }
    }

    CashFlow::from_schedule(schedule)
}

/// Fans trials out over worker threads and gathers one terminal value per trial.
///
/// Trial `i` always draws from a generator seeded by `derive_seed(seed, i)`, so
/// the returned set depends only on `seed`, never on the worker count.
pub fn simulate_trials(
    portfolio: &BlendedParameters,
    cash_flow: CashFlow,
    duration_years: u32,
    trial_count: usize,
    seed: u64,
    workers: Option<usize>,
    cancel: &AtomicBool,
) -> Result<Vec<f64>> {
    let returns = Normal::new(portfolio.expected_return, portfolio.volatility)
        .map_err(|e| SimulationError::Distribution(e.to_string()))?;
    let batches = trial_count.div_ceil(TRIAL_BATCH_SIZE);

    let run_batch = |batch: usize| -> Result<Vec<f64>> {
        if cancel.load(Ordering::Relaxed) {
            return Err(SimulationError::Cancelled);
        }
        let start = batch * TRIAL_BATCH_SIZE;
        let end = (start + TRIAL_BATCH_SIZE).min(trial_count);
        Ok((start..end)
            .map(|trial| {
                let mut rng = StdRng::seed_from_u64(derive_seed(seed, trial as u64));
                simulate_trial(&returns, cash_flow, duration_years, &mut rng)
            })
            .collect())
    };

    let trials: Vec<f64> = fan_out(batches, workers, run_batch)?
        .into_iter()
        .flatten()
        .collect();

    if cancel.load(Ordering::Relaxed) {
        return Err(SimulationError::Cancelled);
    }
    debug_assert_eq!(trials.len(), trial_count);
    Ok(trials)
}

#[cfg(feature = "parallel")]
fn fan_out<F>(batches: usize, workers: Option<usize>, run_batch: F) -> Result<Vec<Vec<f64>>>
where
    F: Fn(usize) -> Result<Vec<f64>> + Send + Sync,
{
    use rayon::prelude::*;

    let collect = || {
        (0..batches)
            .into_par_iter()
            .map(&run_batch)
            .collect::<Result<Vec<_>>>()
    };

    match workers {
        Some(threads) => {
            let pool = rayon::ThreadPoolBuilder::new()
                .num_threads(threads)
                .build()
                .map_err(|e| SimulationError::WorkerPool(e.to_string()))?;
            pool.install(collect)
        }
        None => collect(),
    }
}

#[cfg(not(feature = "parallel"))]
fn fan_out<F>(batches: usize, _workers: Option<usize>, run_batch: F) -> Result<Vec<Vec<f64>>>
where
    F: Fn(usize) -> Result<Vec<f64>>,
{
    (0..batches).map(run_batch).collect()
}

/// Simulates one path and returns its terminal value.
///
/// Periodic: one annual rate drawn per month, applied as `(1 + r)^(1/12)`, with
/// the contribution landing after growth. Lump sum: one annual rate per year.
pub fn simulate_trial<R: Rng + ?Sized>(
    returns: &Normal<f64>,
    cash_flow: CashFlow,
    duration_years: u32,
    rng: &mut R,
) -> f64 {
    match cash_flow {
        CashFlow::Periodic { amount } => {
            let months = duration_years.saturating_mul(12);
            let mut value = 0.0;
            for _ in 0..months {
                let annual_rate = returns.sample(rng);
                let monthly_factor = monthly_growth_factor(annual_rate);
                value = value * monthly_factor + amount;
            }
            value
        }
        CashFlow::LumpSum { amount } => {
            let mut value = amount;
            for _ in 0..duration_years {
                let annual_rate = returns.sample(rng);
                value *= 1.0 + annual_rate;
            }
            value
        }
    }
}

// The twelfth root of a negative base is NaN, so a draw below -100% counts as
// a total loss for that month.
fn monthly_growth_factor(annual_rate: f64) -> f64 {
    (1.0 + annual_rate).max(0.0).powf(1.0 / MONTHS_PER_YEAR)
}

/// Sorts `trials` ascending and derives the outcome statistics.
///
/// Percentiles use truncated linear indices (`floor(q * (n - 1))`), no
/// interpolation. A single trial collapses every statistic onto its value.
pub fn summarize(trials: &mut [f64], goal_amount: f64) -> Result<OutcomeStats> {
    if trials.is_empty() {
        return Err(SimulationError::EmptyTrialSet);
    }
    if let Some(index) = trials.iter().position(|v| !v.is_finite()) {
        return Err(SimulationError::NonFiniteTrial { index });
    }

    trials.sort_by(|a, b| a.total_cmp(b));
    let n = trials.len();
    let expected_value = trials.iter().sum::<f64>() / n as f64;
    let below_goal = trials.partition_point(|&v| v < goal_amount);

    Ok(OutcomeStats {
        expected_value,
        worst_case: trials[percentile_index(n, WORST_CASE_QUANTILE)],
        best_case: trials[percentile_index(n, BEST_CASE_QUANTILE)],
        probability_of_goal_achievement: (n - below_goal) as f64 / n as f64,
    })
}

fn percentile_index(n: usize, quantile: f64) -> usize {
    (quantile * (n - 1) as f64).floor() as usize
}

pub(crate) fn derive_seed(base_seed: u64, trial: u64) -> u64 {
    splitmix64(base_seed ^ trial.wrapping_mul(0xD1B5_4A32_D192_ED03))
}

fn splitmix64(mut x: u64) -> u64 {
    x = x.wrapping_add(0x9E3779B97F4A7C15);
    let mut z = x;
    z = (z ^ (z >> 30)).wrapping_mul(0xBF58476D1CE4E5B9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94D049BB133111EB);
    z ^ (z >> 31)
}
