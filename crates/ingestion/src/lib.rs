//! Input handling for the volatility dashboard pipeline.
//!
//! This crate handles:
//! - Loading daily OHLCV records delivered by the retrieval collaborator
//! - Validating the input contract before any feature is derived

pub mod loader;
pub mod validator;

pub use loader::{load_bars_json, load_table_file, load_table_json, parse_date};
pub use validator::validate_table;
