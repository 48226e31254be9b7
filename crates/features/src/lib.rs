//! Feature derivation for the volatility dashboard pipeline.
//!
//! This crate handles:
//! - Log returns
//! - Rolling annualized volatility over several horizons
//! - Rolling average volume

pub mod volatility;
pub mod volume;
pub mod engine;

pub use volatility::{log_returns, RollingVolatility};
pub use volume::RollingMean;
pub use engine::FeatureEngine;
