use std::net::IpAddr;
use std::path::PathBuf;
use std::sync::atomic::AtomicBool;
use std::time::Duration;

use clap::{Args, Parser, Subcommand, ValueEnum};
use serde::Serialize;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use nestegg::advisory::projection_notice;
use nestegg::api::{
    self, DEFAULT_GOAL_AMOUNT, DEFAULT_MAX_TRIAL_COUNT, DEFAULT_PORT, DEFAULT_REQUEST_TIMEOUT,
    ServerConfig,
};
use nestegg::core::{
    Allocation, BlendedParameters, DEFAULT_TRIAL_COUNT, InvestmentMode, InvestmentSchedule,
    ReturnModel, SimulationOutcome, SimulationParams, SimulationRequest, simulate_with_cancel,
};

/// Monte Carlo projections of goal-based investment plans
#[derive(Parser, Debug)]
#[command(name = "nestegg", version, about, long_about = None)]
struct Cli {
    /// Log filter used when RUST_LOG is unset (trace, debug, info, warn, error)
    #[arg(long, env = "NESTEGG_LOG", default_value = "info", global = true)]
    log_level: String,

    /// JSON file with per-asset return and volatility assumptions
    #[arg(long, env = "NESTEGG_ASSUMPTIONS", value_name = "FILE", global = true)]
    assumptions: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the HTTP API
    Serve(ServeArgs),
    /// Run one projection and print it as JSON
    Simulate(SimulateArgs),
}

#[derive(Args, Debug)]
struct ServeArgs {
    #[arg(long, env = "NESTEGG_HOST", default_value = "0.0.0.0")]
    host: IpAddr,

    #[arg(short, long, env = "NESTEGG_PORT", default_value_t = DEFAULT_PORT)]
    port: u16,

    /// Goal amount used when a request omits one
    #[arg(long, env = "NESTEGG_DEFAULT_GOAL", default_value_t = DEFAULT_GOAL_AMOUNT)]
    default_goal: f64,

    /// Trial count used when a request omits one
    #[arg(long, env = "NESTEGG_DEFAULT_TRIALS", default_value_t = DEFAULT_TRIAL_COUNT)]
    default_trials: u32,

    #[arg(long, env = "NESTEGG_MAX_TRIALS", default_value_t = DEFAULT_MAX_TRIAL_COUNT)]
    max_trials: u32,

    /// Wall-clock budget per simulation request, in seconds
    #[arg(long, env = "NESTEGG_TIMEOUT_SECS", default_value_t = DEFAULT_REQUEST_TIMEOUT.as_secs())]
    timeout_secs: u64,

    /// Worker threads per simulation (defaults to the global pool)
    #[arg(long, env = "NESTEGG_WORKERS")]
    workers: Option<usize>,

    /// Largest worker pool a request may ask for (defaults to the core count)
    #[arg(long, env = "NESTEGG_MAX_WORKERS")]
    max_workers: Option<usize>,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, ValueEnum)]
enum CliInvestmentMode {
    Sip,
    Lumpsum,
}

impl From<CliInvestmentMode> for InvestmentMode {
    fn from(value: CliInvestmentMode) -> Self {
        match value {
            CliInvestmentMode::Sip => InvestmentMode::Periodic,
            CliInvestmentMode::Lumpsum => InvestmentMode::LumpSum,
        }
    }
}

#[derive(Args, Debug)]
struct SimulateArgs {
    #[arg(long, default_value_t = 0.0)]
    equity: f64,
    #[arg(long, default_value_t = 0.0)]
    debt: f64,
    #[arg(long, default_value_t = 0.0)]
    gold: f64,
    #[arg(long, default_value_t = 0.0)]
    other: f64,

    #[arg(long, value_enum, default_value_t = CliInvestmentMode::Sip)]
    mode: CliInvestmentMode,

    /// Monthly contribution (sip) or initial investment (lumpsum)
    #[arg(long)]
    amount: f64,

    #[arg(long)]
    years: u32,

    #[arg(long, default_value_t = DEFAULT_TRIAL_COUNT)]
    trials: u32,

    #[arg(long, default_value_t = DEFAULT_GOAL_AMOUNT)]
    goal: f64,

    #[arg(long)]
    seed: Option<u64>,

    #[arg(long, env = "NESTEGG_WORKERS")]
    workers: Option<usize>,

    /// Include every sorted terminal value in the output
    #[arg(long)]
    include_trials: bool,
}

impl SimulateArgs {
    fn into_request(self) -> SimulationRequest {
        let schedule = match InvestmentMode::from(self.mode) {
            InvestmentMode::Periodic => InvestmentSchedule::periodic(self.amount, self.years),
            InvestmentMode::LumpSum => InvestmentSchedule::lump_sum(self.amount, self.years),
        };
        SimulationRequest {
            allocation: Allocation::from_classes(self.equity, self.debt, self.gold, self.other),
            schedule,
            params: SimulationParams {
                trial_count: self.trials,
                goal_amount: self.goal,
                seed: self.seed,
                workers: self.workers,
                include_trials: self.include_trials,
            },
        }
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct SimulationReport {
    #[serde(flatten)]
    outcome: SimulationOutcome,
    portfolio: BlendedParameters,
    disclaimer: String,
}

fn init_tracing(log_level: &str) {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(log_level)),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

fn load_model(path: Option<&PathBuf>) -> nestegg::core::Result<ReturnModel> {
    match path {
        Some(path) => {
            let model = ReturnModel::from_json_file(path)?;
            tracing::info!(path = %path.display(), assets = model.assets.len(), "loaded assumptions");
            Ok(model)
        }
        None => Ok(ReturnModel::default()),
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    init_tracing(&cli.log_level);
    let model = load_model(cli.assumptions.as_ref())?;

    match cli.command {
        Command::Serve(args) => {
            let config = ServerConfig {
                host: args.host,
                port: args.port,
                default_goal_amount: args.default_goal,
                default_trial_count: args.default_trials,
                max_trial_count: args.max_trials,
                request_timeout: Duration::from_secs(args.timeout_secs),
                workers: args.workers,
                max_workers: args.max_workers.unwrap_or_else(api::default_max_workers),
                model,
            };
            config.validate()?;
            tracing::info!(address = %config.socket_addr(), "starting server");
            api::run_http_server(config).await?;
        }
        Command::Simulate(args) => {
            let request = args.into_request();
            let projection = tokio::task::spawn_blocking(move || {
                simulate_with_cancel(&model, &request, &AtomicBool::new(false))
            })
            .await??;
            let report = SimulationReport {
                outcome: projection.outcome,
                portfolio: projection.portfolio,
                disclaimer: projection_notice(),
            };
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
    }

    Ok(())
}
