//! Monte Carlo portfolio projections for a financial-advisory service.
//!
//! [`core`] holds the engine: blending per-asset assumptions, simulating
//! periodic or lump-sum cash flows, and summarising the terminal values.
//! [`advisory`] holds the rule tables around it and [`api`] the HTTP layer.

pub mod advisory;
pub mod api;
pub mod core;
