//! Core types and configuration for the volatility dashboard pipeline.
//!
//! This crate provides shared types used across all other crates:
//! - Daily OHLCV bars and the annotated time-series table
//! - Configuration structures
//! - Common error types

pub mod config;
pub mod error;
pub mod types;

pub use config::Config;
pub use error::{Error, Result};
pub use types::*;
