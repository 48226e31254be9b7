//! Rolling average volume.

use std::collections::VecDeque;

/// Rolling arithmetic mean that yields nothing until the window is full.
pub struct RollingMean {
    window: usize,
    values: VecDeque<Option<f64>>,
    missing: usize,
    sum: f64,
}

impl RollingMean {
    pub fn new(window: usize) -> Self {
        Self {
            window,
            values: VecDeque::with_capacity(window + 1),
            missing: 0,
            sum: 0.0,
        }
    }

    /// Push the next observation; returns the mean of the last `window` values.
    pub fn push(&mut self, value: Option<f64>) -> Option<f64> {
        self.values.push_back(value);
        match value {
            Some(v) => self.sum += v,
            None => self.missing += 1,
        }
        if self.values.len() > self.window {
            match self.values.pop_front().flatten() {
                Some(old) => self.sum -= old,
                None => self.missing -= 1,
            }
        }
        self.mean()
    }

    pub fn mean(&self) -> Option<f64> {
        if self.window == 0 || self.values.len() < self.window || self.missing > 0 {
            return None;
        }
        Some(self.sum / self.window as f64)
    }
}
