//! Loading daily OHLCV records from JSON.
//!
//! Accepts an array of records as written by `DataFrame.to_json(orient="records",
//! date_format="iso")` or hand-written equivalents. Records are kept in the
//! order given; ordering is checked by the validator, not repaired here.

use std::path::Path;

use chrono::NaiveDate;
use serde::Deserialize;
use tracing::debug;
use voldash_core::{DailyBar, Error, Result, TimeSeriesTable};

use crate::validator::validate_table;

/// One record as it appears on the wire.
#[derive(Debug, Deserialize)]
struct RawRecord {
    #[serde(alias = "Date")]
    date: String,
    #[serde(alias = "Open")]
    open: f64,
    #[serde(alias = "High")]
    high: f64,
    #[serde(alias = "Low")]
    low: f64,
    #[serde(alias = "Close")]
    close: f64,
    #[serde(alias = "Volume")]
    volume: f64,
}

/// Parse `YYYY-MM-DD`, ignoring any time-of-day suffix.
pub fn parse_date(raw: &str) -> Result<NaiveDate> {
    let day = raw.get(..10).unwrap_or(raw);
    NaiveDate::parse_from_str(day, "%Y-%m-%d")
        .map_err(|e| Error::data(format!("invalid date '{raw}': {e}")))
}

/// Parse a JSON array of daily records into bars.
pub fn load_bars_json(json: &str) -> Result<Vec<DailyBar>> {
    let records: Vec<RawRecord> = serde_json::from_str(json)?;
    let bars = records
        .into_iter()
        .map(|r| {
            Ok(DailyBar {
                date: parse_date(&r.date)?,
                open: r.open,
                high: r.high,
                low: r.low,
                close: r.close,
                volume: r.volume,
            })
        })
        .collect::<Result<Vec<_>>>()?;
    debug!(rows = bars.len(), "parsed daily records");
    Ok(bars)
}

/// Parse and validate a table from JSON.
pub fn load_table_json(json: &str) -> Result<TimeSeriesTable> {
    let table = TimeSeriesTable::from_bars(load_bars_json(json)?);
    validate_table(&table)?;
    Ok(table)
}

/// Read, parse, and validate a table from a JSON file.
pub fn load_table_file(path: impl AsRef<Path>) -> Result<TimeSeriesTable> {
    let raw = std::fs::read_to_string(path)?;
    load_table_json(&raw)
}
