mod engine;
mod error;
mod market;
mod solver;
mod types;

pub use engine::{
    CashFlow, Projection, simulate, simulate_trial, simulate_trials, simulate_with_cancel,
    summarize, validate,
};
pub use error::{Result, SimulationError};
pub use market::{AssetAssumption, ReturnModel};
pub use solver::{
    GoalSolveConfig, GoalSolveIteration, GoalSolveResult, GoalType, solve_goal,
    solve_goal_with_cancel,
};
pub use types::{
    Allocation, AssetClass, BlendedParameters, DEFAULT_TRIAL_COUNT, InvestmentMode,
    InvestmentSchedule, OutcomeStats, SimulationOutcome, SimulationParams, SimulationRequest,
};
