use thiserror::Error;

pub type Result<T> = std::result::Result<T, SimulationError>;

/// Errors raised by the projection engine and the goal solver.
#[derive(Debug, Error)]
pub enum SimulationError {
    /// A request field is out of range or malformed.
    #[error("invalid {field}: {reason}")]
    InvalidRequest { field: &'static str, reason: String },

    /// The cash-flow amount required by the selected mode was not supplied.
    #[error("missing {field}: required for the selected investment mode")]
    MissingField { field: &'static str },

    /// The outcome aggregator received no trials.
    #[error("cannot aggregate an empty trial set")]
    EmptyTrialSet,

    /// A simulated path ended on NaN or infinity, i.e. the amounts or horizon
    /// grow past what an f64 can hold.
    #[error("trial {index} produced a non-finite terminal value; reduce the amount or horizon")]
    NonFiniteTrial { index: usize },

    /// The return/volatility model holds unusable figures.
    #[error("invalid assumption for {asset}: {reason}")]
    InvalidModel { asset: String, reason: String },

    #[error("return distribution rejected: {0}")]
    Distribution(String),

    /// The caller abandoned the run before aggregation.
    #[error("simulation cancelled")]
    Cancelled,

    #[error("worker pool unavailable: {0}")]
    WorkerPool(String),

    #[error("cannot read assumptions file: {0}")]
    AssumptionsIo(#[from] std::io::Error),

    #[error("cannot parse assumptions file: {0}")]
    AssumptionsParse(#[from] serde_json::Error),
}

impl SimulationError {
    pub fn invalid(field: &'static str, reason: impl Into<String>) -> Self {
        Self::InvalidRequest {
            field,
            reason: reason.into(),
        }
    }

    /// The request field this error points at, if any.
    pub fn field(&self) -> Option<&'static str> {
        match self {
            Self::InvalidRequest { field, .. } | Self::MissingField { field } => Some(field),
            _ => None,
        }
    }

    /// True when the error stems from caller input rather than an engine fault.
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            Self::InvalidRequest { .. }
                | Self::MissingField { .. }
                | Self::InvalidModel { .. }
                | Self::NonFiniteTrial { .. }
        )
    }
}
