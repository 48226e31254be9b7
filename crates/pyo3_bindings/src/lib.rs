//! PyO3 bindings for the volatility dashboard pipeline.
//!
//! Exposes the Rust pipeline to the Python renderer:
//! - Daily bar input type
//! - Annotated row output type
//! - Pipeline runner (typed and JSON entry points)

use std::collections::HashMap;

use pyo3::exceptions::PyValueError;
use pyo3::prelude::*;

use voldash_core::{
    AnnotatedRow as RustAnnotatedRow, Config as RustConfig, DailyBar as RustDailyBar,
    Error as RustError, TimeSeriesTable,
};
use voldash_ingestion::{load_table_json, parse_date};
use voldash_pipeline::VolatilityPipeline;

fn to_py_err(err: RustError) -> PyErr {
    PyValueError::new_err(err.to_string())
}

// ============================================================================
// Python-exposed Types
// ============================================================================

/// A single daily OHLCV bar.
#[pyclass]
#[derive(Clone)]
pub struct DailyBar {
    /// Trading date as `YYYY-MM-DD`; a time-of-day suffix is ignored.
    #[pyo3(get, set)]
    pub date: String,
    #[pyo3(get, set)]
    pub open: f64,
    #[pyo3(get, set)]
    pub high: f64,
    #[pyo3(get, set)]
    pub low: f64,
    #[pyo3(get, set)]
    pub close: f64,
    #[pyo3(get, set)]
    pub volume: f64,
}

#[pymethods]
impl DailyBar {
    #[new]
    fn new(date: String, open: f64, high: f64, low: f64, close: f64, volume: f64) -> Self {
        DailyBar {
            date,
            open,
            high,
            low,
            close,
            volume,
        }
    }

    fn __repr__(&self) -> String {
        format!(
            "DailyBar(date={}, open={}, high={}, low={}, close={}, volume={})",
            self.date, self.open, self.high, self.low, self.close, self.volume
        )
    }
}

impl TryFrom<&DailyBar> for RustDailyBar {
    type Error = PyErr;

    fn try_from(b: &DailyBar) -> PyResult<Self> {
        let date = parse_date(&b.date).map_err(to_py_err)?;
        Ok(RustDailyBar {
            date,
            open: b.open,
            high: b.high,
            low: b.low,
            close: b.close,
            volume: b.volume,
        })
    }
}

/// One annotated output row.
#[pyclass]
#[derive(Clone)]
pub struct AnnotatedRow {
    #[pyo3(get)]
    pub date: String,
    #[pyo3(get)]
    pub open: f64,
    #[pyo3(get)]
    pub high: f64,
    #[pyo3(get)]
    pub low: f64,
    #[pyo3(get)]
    pub close: f64,
    #[pyo3(get)]
    pub volume: f64,
    /// Derived columns (`return`, `vol_W`, `vol_avg_W`); `None` when missing.
    #[pyo3(get)]
    pub features: HashMap<String, Option<f64>>,
    /// Regime label, or `None`.
    #[pyo3(get)]
    pub cluster: Option<usize>,
    /// -1 for anomalies, 1 for normal days, `None` when not labeled.
    #[pyo3(get)]
    pub anomaly: Option<i8>,
}

#[pymethods]
impl AnnotatedRow {
    fn __repr__(&self) -> String {
        format!(
            "AnnotatedRow(date={}, close={}, cluster={:?}, anomaly={:?})",
            self.date, self.close, self.cluster, self.anomaly
        )
    }
}

impl From<RustAnnotatedRow> for AnnotatedRow {
    fn from(r: RustAnnotatedRow) -> Self {
        AnnotatedRow {
            date: r.date.format("%Y-%m-%d").to_string(),
            open: r.open,
            high: r.high,
            low: r.low,
            close: r.close,
            volume: r.volume,
            features: r.features.into_iter().collect(),
            cluster: r.cluster,
            anomaly: r.anomaly.map(|a| a.code()),
        }
    }
}

// ============================================================================
// Python-exposed Pipeline
// ============================================================================

/// Feature, regime and anomaly pipeline.
#[pyclass]
pub struct PyPipeline {
    inner: VolatilityPipeline,
}

#[pymethods]
impl PyPipeline {
    /// Create a pipeline; `config_json` overrides defaults section by section.
    #[new]
    #[pyo3(signature = (config_json=None))]
    fn new(config_json: Option<&str>) -> PyResult<Self> {
        let config = match config_json {
            Some(json) => RustConfig::from_json_str(json).map_err(to_py_err)?,
            None => RustConfig::default(),
        };
        let inner = VolatilityPipeline::new(config).map_err(to_py_err)?;
        Ok(PyPipeline { inner })
    }

    /// Run the pipeline and return annotated rows plus a JSON run summary.
    fn run(&self, bars: Vec<DailyBar>) -> PyResult<(Vec<AnnotatedRow>, String)> {
        let bars = bars
            .iter()
            .map(RustDailyBar::try_from)
            .collect::<PyResult<Vec<_>>>()?;
        let output = self
            .inner
            .run(&TimeSeriesTable::from_bars(bars))
            .map_err(to_py_err)?;
        let summary = serde_json::to_string(&output.summary)
            .map_err(|e| PyValueError::new_err(e.to_string()))?;
        let rows = output.table.rows().into_iter().map(Into::into).collect();
        Ok((rows, summary))
    }

    /// Get the active configuration as JSON.
    fn config_json(&self) -> PyResult<String> {
        serde_json::to_string(self.inner.config()).map_err(|e| PyValueError::new_err(e.to_string()))
    }
}

/// Run the pipeline on JSON records and return `{"rows": [...], "summary": {...}}`.
#[pyfunction]
#[pyo3(signature = (records_json, config_json=None))]
fn run_pipeline_json(records_json: &str, config_json: Option<&str>) -> PyResult<String> {
    let config = match config_json {
        Some(json) => RustConfig::from_json_str(json).map_err(to_py_err)?,
        None => RustConfig::default(),
    };
    let pipeline = VolatilityPipeline::new(config).map_err(to_py_err)?;
    let table = load_table_json(records_json).map_err(to_py_err)?;
    let output = pipeline.run(&table).map_err(to_py_err)?;

    let to_value_err = |e: serde_json::Error| PyValueError::new_err(e.to_string());
    let mut payload = serde_json::Map::new();
    payload.insert(
        "rows".to_string(),
        serde_json::to_value(output.table.rows()).map_err(to_value_err)?,
    );
    payload.insert(
        "summary".to_string(),
        serde_json::to_value(&output.summary).map_err(to_value_err)?,
    );
    Ok(serde_json::Value::Object(payload).to_string())
}

// ============================================================================
// Module Definition
// ============================================================================

/// Volatility dashboard core - Rust pipeline for the Python renderer.
#[pymodule]
fn voldash_py(m: &Bound<'_, PyModule>) -> PyResult<()> {
    // Types
    m.add_class::<DailyBar>()?;
    m.add_class::<AnnotatedRow>()?;

    // Pipeline
    m.add_class::<PyPipeline>()?;
    m.add_function(wrap_pyfunction!(run_pipeline_json, m)?)?;

    Ok(())
}
