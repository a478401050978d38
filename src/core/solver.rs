use std::sync::atomic::AtomicBool;

use serde::{Deserialize, Serialize};

use super::engine::simulate_with_cancel;
use super::error::{Result, SimulationError};
use super::market::ReturnModel;
use super::types::{InvestmentMode, SimulationRequest};

const PROBABILITY_EPS: f64 = 1e-12;

#[derive(Copy, Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum GoalType {
    /// Smallest contribution (or lump sum) that reaches the goal often enough.
    #[serde(alias = "requiredAmount", alias = "required_amount")]
    RequiredAmount,
    /// Largest goal the schedule reaches often enough.
    #[serde(alias = "maxGoal", alias = "max_goal")]
    MaxGoal,
}

#[derive(Debug, Clone, Copy)]
pub struct GoalSolveConfig {
    pub goal_type: GoalType,
    pub target_probability: f64,
    pub search_min: f64,
    pub search_max: f64,
    pub tolerance: f64,
    pub max_iterations: u32,
    pub trials_per_iteration: u32,
    pub final_trials: u32,
}

#[derive(Debug, Clone, Copy, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GoalSolveIteration {
    pub iteration: u32,
    pub lower_bound: f64,
    pub upper_bound: f64,
    pub candidate_value: f64,
    pub probability: f64,
    pub probability_ci_half_width: f64,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GoalSolveResult {
    pub goal_type: GoalType,
    pub mode: InvestmentMode,
    pub target_probability: f64,
    pub seed: u64,
    pub solved_value: Option<f64>,
    pub achieved_probability: Option<f64>,
    pub achieved_probability_ci_half_width: Option<f64>,
    pub iterations: Vec<GoalSolveIteration>,
    pub converged: bool,
    pub feasible: bool,
    pub message: String,
}

/// Bisects over the cash-flow amount or the goal amount of `request`.
///
/// Every candidate replays the same seed, so the goal probability moves
/// monotonically with the candidate and bisection is well defined.
pub fn solve_goal(
    model: &ReturnModel,
    request: &SimulationRequest,
    config: GoalSolveConfig,
) -> Result<GoalSolveResult> {
    solve_goal_with_cancel(model, request, config, &AtomicBool::new(false))
}

pub fn solve_goal_with_cancel(
    model: &ReturnModel,
    request: &SimulationRequest,
    config: GoalSolveConfig,
    cancel: &AtomicBool,
) -> Result<GoalSolveResult> {
    validate_config(config)?;

    let mut base = request.clone();
    let seed = base.params.seed.unwrap_or_else(rand::random::<u64>);
    base.params.seed = Some(seed);
    base.params.include_trials = false;

    let mut iterations = Vec::with_capacity(config.max_iterations as usize);
    let low_eval = evaluate_candidate(model, &base, cancel, config, config.search_min)?;
    let high_eval = evaluate_candidate(model, &base, cancel, config, config.search_max)?;

    let mut solved_value = None;
    let mut converged = false;
    let feasible;
    let message;

    match config.goal_type {
        GoalType::RequiredAmount => {
            if meets_target(low_eval, config) {
                solved_value = Some(config.search_min);
                converged = true;
                feasible = true;
                message = "Already meets the goal at the lower amount bound.".to_string();
            } else if !meets_target(high_eval, config) {
                feasible = false;
                message = "No feasible amount found within the search bounds.".to_string();
            } else {
                let mut lo = config.search_min;
                let mut hi = config.search_max;
                let mut it = 0;
                while it < config.max_iterations {
                    it += 1;
                    let mid = (lo + hi) * 0.5;
                    let eval = evaluate_candidate(model, &base, cancel, config, mid)?;
                    iterations.push(eval.iteration(it, lo, hi, mid));

                    if meets_target(eval, config) {
                        hi = mid;
                    } else {
                        lo = mid;
                    }

                    if (hi - lo).abs() <= config.tolerance {
                        converged = true;
                        break;
                    }
                }
                solved_value = Some(hi);
                feasible = true;
                message = if converged {
                    "Solved required amount.".to_string()
                } else {
                    "Reached max iterations before tolerance was met; returning best estimate."
                        .to_string()
                };
            }
        }
        GoalType::MaxGoal => {
            if !meets_target(low_eval, config) {
                feasible = false;
                message = "No feasible goal found within the search bounds.".to_string();
            } else if meets_target(high_eval, config) {
                solved_value = Some(config.search_max);
                converged = true;
                feasible = true;
                message =
                    "Upper goal bound is still reachable; increase search max for a higher goal."
                        .to_string();
            } else {
                let mut lo = config.search_min;
                let mut hi = config.search_max;
                let mut it = 0;
                while it < config.max_iterations {
                    it += 1;
                    let mid = (lo + hi) * 0.5;
                    let eval = evaluate_candidate(model, &base, cancel, config, mid)?;
                    iterations.push(eval.iteration(it, lo, hi, mid));

                    if meets_target(eval, config) {
                        lo = mid;
                    } else {
                        hi = mid;
                    }

                    if (hi - lo).abs() <= config.tolerance {
                        converged = true;
                        break;
                    }
                }
                solved_value = Some(lo);
                feasible = true;
                message = if converged {
                    "Solved maximum reachable goal.".to_string()
                } else {
                    "Reached max iterations before tolerance was met; returning best estimate."
                        .to_string()
                };
            }
        }
    }

    let mut achieved_probability = None;
    let mut achieved_probability_ci_half_width = None;
    if let Some(value) = solved_value {
        let final_eval = evaluate_candidate(
            model,
            &base,
            cancel,
            GoalSolveConfig {
                trials_per_iteration: config.final_trials,
                ..config
            },
            value,
        )?;
        achieved_probability = Some(final_eval.probability);
        achieved_probability_ci_half_width = Some(final_eval.ci_half_width);
    }

    tracing::debug!(
        goal_type = ?config.goal_type,
        solved_value = ?solved_value,
        feasible,
        converged,
        iterations = iterations.len(),
        "goal solve finished"
    );

    Ok(GoalSolveResult {
        goal_type: config.goal_type,
        mode: base.schedule.mode,
        target_probability: config.target_probability,
        seed,
        solved_value,
        achieved_probability,
        achieved_probability_ci_half_width,
        iterations,
        converged,
        feasible,
        message,
    })
}

#[derive(Debug, Clone, Copy)]
struct CandidateEval {
    probability: f64,
    ci_half_width: f64,
}

impl CandidateEval {
    fn iteration(self, iteration: u32, lo: f64, hi: f64, candidate: f64) -> GoalSolveIteration {
        GoalSolveIteration {
            iteration,
            lower_bound: lo,
            upper_bound: hi,
            candidate_value: candidate,
            probability: self.probability,
            probability_ci_half_width: self.ci_half_width,
        }
    }
}

fn meets_target(eval: CandidateEval, config: GoalSolveConfig) -> bool {
    eval.probability + PROBABILITY_EPS >= config.target_probability
}

fn evaluate_candidate(
    model: &ReturnModel,
    base: &SimulationRequest,
    cancel: &AtomicBool,
    config: GoalSolveConfig,
    candidate_value: f64,
) -> Result<CandidateEval> {
    let mut request = base.clone();
    request.params.trial_count = config.trials_per_iteration.max(1);

    match config.goal_type {
        GoalType::RequiredAmount => {
            request.schedule = request.schedule.with_active_amount(candidate_value.max(0.0));
        }
        GoalType::MaxGoal => {
            request.params.goal_amount = candidate_value.max(0.0);
        }
    }

    let outcome = simulate_with_cancel(model, &request, cancel)?.outcome;
    let probability = outcome.probability_of_goal_achievement;
    Ok(CandidateEval {
        probability,
        ci_half_width: binomial_ci_half_width(probability, request.params.trial_count),
    })
}

fn binomial_ci_half_width(p: f64, n: u32) -> f64 {
    if n == 0 {
        return 0.0;
    }
    let p = p.clamp(0.0, 1.0);
    1.96 * (p * (1.0 - p) / n as f64).sqrt()
}

fn validate_config(config: GoalSolveConfig) -> Result<()> {
    if !(0.0..=1.0).contains(&config.target_probability) {
        return Err(SimulationError::invalid(
            "target_probability",
            "must be between 0 and 1",
        ));
    }
    if !config.search_min.is_finite() || !config.search_max.is_finite() {
        return Err(SimulationError::invalid("search_min", "search bounds must be finite"));
    }
    if config.search_min < 0.0 {
        return Err(SimulationError::invalid("search_min", "must be >= 0"));
    }
    if config.search_max <= config.search_min {
        return Err(SimulationError::invalid(
            "search_max",
            "must be greater than search_min",
        ));
    }
    if !config.tolerance.is_finite() || config.tolerance <= 0.0 {
        return Err(SimulationError::invalid("tolerance", "must be > 0"));
    }
    if config.max_iterations == 0 {
        return Err(SimulationError::invalid("max_iterations", "must be > 0"));
    }
    if config.trials_per_iteration == 0 {
        return Err(SimulationError::invalid("trials_per_iteration", "must be > 0"));
    }
    if config.final_trials == 0 {
        return Err(SimulationError::invalid("final_trials", "must be > 0"));
    }
    Ok(())
}
