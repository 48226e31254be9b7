//! Pipeline orchestration for the volatility dashboard.
//!
//! This crate provides:
//! - The sequential feature -> regime -> anomaly pipeline
//! - Run summaries handed to the renderer alongside the annotated table

pub mod orchestrator;
pub mod summary;

pub use orchestrator::{PipelineOutput, VolatilityPipeline};
pub use summary::{RegimeStats, RunSummary, StageReport};
