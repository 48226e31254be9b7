//! Input contract checks.
//!
//! Runs before feature derivation: a table that fails here produces no
//! partial output.

use tracing::debug;
use voldash_core::{Error, Result, TimeSeriesTable};

/// Validate a raw table against the input contract.
///
/// Rejects empty tables, dates that are not strictly increasing, non-finite
/// OHLCV values, non-positive closes (log returns are undefined) and negative
/// volume.
pub fn validate_table(table: &TimeSeriesTable) -> Result<()> {
    if table.is_empty() {
        return Err(Error::empty_input("no price data in input table"));
    }

    let bars = table.bars();
    for (i, bar) in bars.iter().enumerate() {
        let values = [bar.open, bar.high, bar.low, bar.close, bar.volume];
        if values.iter().any(|v| !v.is_finite()) {
            return Err(Error::data(format!("row {i} ({}) has a non-finite value", bar.date)));
        }
        if bar.close <= 0.0 {
            return Err(Error::data(format!(
                "row {i} ({}) has non-positive close {}",
                bar.date, bar.close
            )));
        }
        if bar.volume < 0.0 {
            return Err(Error::data(format!(
                "row {i} ({}) has negative volume {}",
                bar.date, bar.volume
            )));
        }
    }

    if let Some(pos) = bars.windows(2).position(|w| w[1].date <= w[0].date) {
        return Err(Error::data(format!(
            "dates must be strictly increasing: row {} ({}) follows {}",
            pos + 1,
            bars[pos + 1].date,
            bars[pos].date
        )));
    }

    debug!(rows = bars.len(), "input table validated");
    Ok(())
}
