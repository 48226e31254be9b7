//! Rolling volatility computation.
//!
//! Computes the annualized sample standard deviation of log returns over a
//! rolling window. A window containing a missing return yields no value.

use std::collections::VecDeque;

/// Log returns of a close series: `ln(close[t] / close[t-1])`.
///
/// The first slot is always missing. A return is also missing when either
/// close is not strictly positive.
pub fn log_returns(closes: &[f64]) -> Vec<Option<f64>> {
    let mut out = Vec::with_capacity(closes.len());
    if closes.is_empty() {
        return out;
    }
    out.push(None);
    out.extend(closes.windows(2).map(|w| {
        let (prev, price) = (w[0], w[1]);
        if prev > 0.0 && price > 0.0 {
            Some((price / prev).ln())
        } else {
            None
        }
    }));
    out
}

/// Rolling volatility calculator over log returns.
///
/// Keeps running sums for O(1) updates. The sums are rebuilt from the window
/// once every `window` pushes, which bounds the cancellation error left behind
/// when large returns slide out ahead of small ones.
pub struct RollingVolatility {
    /// Window size in periods.
    window: usize,
    /// Multiplier applied to the daily standard deviation.
    scale: f64,
    /// Returns currently in the window.
    returns: VecDeque<Option<f64>>,
    /// Number of missing returns in the window.
    missing: usize,
    /// Running sum of present returns (for mean).
    sum: f64,
    /// Running sum of squared present returns (for variance).
    sum_sq: f64,
    /// Pushes since the sums were last rebuilt.
    since_resync: usize,
}

impl RollingVolatility {
    /// Create a calculator scaled by `sqrt(periods_per_year)`.
    pub fn annualized(window: usize, periods_per_year: f64) -> Self {
        Self {
            window,
            scale: periods_per_year.sqrt(),
            returns: VecDeque::with_capacity(window + 1),
            missing: 0,
            sum: 0.0,
            sum_sq: 0.0,
            since_resync: 0,
        }
    }

    /// Push the next return (or a missing slot).
    ///
    /// Returns the current volatility if the window is full and complete.
    pub fn push(&mut self, ret: Option<f64>) -> Option<f64> {
        self.returns.push_back(ret);
        match ret {
            Some(r) => {
                self.sum += r;
                self.sum_sq += r * r;
            }
            None => self.missing += 1,
        }

        // If window is full, remove oldest
        if self.returns.len() > self.window {
            match self.returns.pop_front().flatten() {
                Some(old) => {
                    self.sum -= old;
                    self.sum_sq -= old * old;
                }
                None => self.missing -= 1,
            }
        }

        self.since_resync += 1;
        if self.since_resync >= self.window {
            self.resync();
        }

        self.volatility()
    }

    /// Rebuild the running sums from the values in the window.
    fn resync(&mut self) {
        let present = self.returns.iter().flatten();
        self.sum = present.clone().sum();
        self.sum_sq = present.map(|r| r * r).sum();
        self.since_resync = 0;
    }

    /// Current volatility (sample standard deviation, n - 1).
    pub fn volatility(&self) -> Option<f64> {
        if !self.is_ready() || self.window < 2 {
            return None;
        }

        let n = self.window as f64;
        let variance = (self.sum_sq - self.sum * self.sum / n) / (n - 1.0);

        // Handle numerical issues
        if variance <= 0.0 {
            Some(0.0)
        } else {
            Some(variance.sqrt() * self.scale)
        }
    }

    /// Check if the window is full with no missing returns.
    pub fn is_ready(&self) -> bool {
        self.returns.len() == self.window && self.missing == 0
    }
}
