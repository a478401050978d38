use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::num::NonZeroUsize;
use std::time::Duration;

use crate::core::{DEFAULT_TRIAL_COUNT, Result, ReturnModel, SimulationError};

/// One crore, the goal used when a request does not name one.
pub const DEFAULT_GOAL_AMOUNT: f64 = 10_000_000.0;
pub const DEFAULT_PORT: u16 = 8080;
pub const DEFAULT_MAX_TRIAL_COUNT: u32 = 200_000;
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Worker cap when none is configured: one thread per available core.
pub fn default_max_workers() -> usize {
    std::thread::available_parallelism()
        .map(NonZeroUsize::get)
        .unwrap_or(1)
}

/// Settings shared by every request the server handles.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: IpAddr,
    pub port: u16,
    pub default_goal_amount: f64,
    pub default_trial_count: u32,
    /// Requests asking for more trials than this are rejected.
    pub max_trial_count: u32,
    /// Wall-clock budget for one simulation or goal solve.
    pub request_timeout: Duration,
    pub workers: Option<usize>,
    /// Requests asking for a larger dedicated pool than this are rejected.
    pub max_workers: usize,
    pub model: ReturnModel,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: IpAddr::V4(Ipv4Addr::UNSPECIFIED),
            port: DEFAULT_PORT,
            default_goal_amount: DEFAULT_GOAL_AMOUNT,
            default_trial_count: DEFAULT_TRIAL_COUNT,
            max_trial_count: DEFAULT_MAX_TRIAL_COUNT,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            workers: None,
            max_workers: default_max_workers(),
            model: ReturnModel::default(),
        }
    }
}

impl ServerConfig {
    pub fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }

    pub fn validate(&self) -> Result<()> {
        self.model.validate()?;
        if !self.default_goal_amount.is_finite() || self.default_goal_amount < 0.0 {
            return Err(SimulationError::invalid(
                "default_goal_amount",
                "must be finite and >= 0",
            ));
        }
        if self.max_trial_count < 1 {
            return Err(SimulationError::invalid("max_trial_count", "must be >= 1"));
        }
        if self.default_trial_count < 1 || self.default_trial_count > self.max_trial_count {
            return Err(SimulationError::invalid(
                "default_trial_count",
                format!("must be between 1 and {}", self.max_trial_count),
            ));
        }
        if self.request_timeout.is_zero() {
            return Err(SimulationError::invalid("request_timeout", "must be > 0"));
        }
        if self.max_workers < 1 {
            return Err(SimulationError::invalid("max_workers", "must be >= 1"));
        }
        if let Some(workers) = self.workers {
            if workers < 1 || workers > self.max_workers {
                return Err(SimulationError::invalid(
                    "workers",
                    format!("must be between 1 and {}", self.max_workers),
                ));
            }
        }
        Ok(())
    }
}
