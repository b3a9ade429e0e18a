//! PyO3 bindings: exposes `decode_identifier()` and `characterize_csv()` to Python.

use pyo3::exceptions::{PyIOError, PyValueError};
use pyo3::prelude::*;

use crate::analysis::{self, Characterization};
use crate::config::AnalysisConfig;
use crate::error::Error;
use crate::identifier;
use crate::parser;
use crate::types::*;

fn to_py_err(err: Error) -> PyErr {
    match err {
        Error::Io(e) => PyIOError::new_err(e.to_string()),
        other => PyValueError::new_err(other.to_string()),
    }
}

/// Decoded measurement file name.
#[pyclass(name = "Descriptor")]
#[derive(Clone, Debug)]
pub struct PyDescriptor {
    #[pyo3(get)]
    target: String,
    #[pyo3(get)]
    neighbor: Option<String>,
    #[pyo3(get)]
    three_probe: bool,
    #[pyo3(get)]
    timestamp: Option<String>,
    #[pyo3(get)]
    sort_key: u64,
    #[pyo3(get)]
    activity: String,
    #[pyo3(get)]
    start_voltage: Option<f64>,
    #[pyo3(get)]
    end_voltage: Option<f64>,
    #[pyo3(get)]
    ramp_rate: Option<f64>,
    #[pyo3(get)]
    platinum_voltage: Option<f64>,
    #[pyo3(get)]
    copper_voltage: Option<f64>,
    #[pyo3(get)]
    compliance_amps: Option<f64>,
}

impl From<&MeasurementDescriptor> for PyDescriptor {
    fn from(d: &MeasurementDescriptor) -> Self {
        let (start_voltage, end_voltage, ramp_rate) = match &d.parameters {
            ActivityParameters::Sweep {
                start_voltage,
                end_voltage,
                ramp_rate,
                ..
            } => (Some(*start_voltage), Some(*end_voltage), Some(*ramp_rate)),
            _ => (None, None, None),
        };
        let (platinum_voltage, copper_voltage) = match &d.parameters {
            ActivityParameters::Observe {
                platinum_voltage,
                copper_voltage,
                ..
            } => (Some(*platinum_voltage), Some(*copper_voltage)),
            _ => (None, None),
        };
        Self {
            target: d.target.key(),
            neighbor: d.neighbor.as_ref().map(CellPosition::key),
            three_probe: d.probe_mode == ProbeMode::ThreeProbe,
            timestamp: d.timestamp.as_ref().map(Timestamp::summary_label),
            sort_key: d.sort_key(),
            activity: d.activity.to_string(),
            start_voltage,
            end_voltage,
            ramp_rate,
            platinum_voltage,
            copper_voltage,
            compliance_amps: d.compliance().map(|c| c.amps()),
        }
    }
}

/// Derived quantities of one measurement file.
#[pyclass(name = "Characterization")]
#[derive(Clone, Debug)]
pub struct PyCharacterization {
    #[pyo3(get)]
    source: String,
    #[pyo3(get)]
    activity: String,
    #[pyo3(get)]
    set_voltage: Option<f64>,
    #[pyo3(get)]
    on_resistance: Option<f64>,
    #[pyo3(get)]
    r_squared: Option<f64>,
    #[pyo3(get)]
    linear_voltage_min: Option<f64>,
    #[pyo3(get)]
    linear_voltage_max: Option<f64>,
    #[pyo3(get)]
    true_ramp_rate: Option<f64>,
}

/// Decode a measurement file name (with or without the `.csv` extension).
#[pyfunction]
fn decode_identifier(identifier: &str) -> PyResult<PyDescriptor> {
    identifier::decode_path(identifier)
        .map(|d| PyDescriptor::from(&d))
        .map_err(to_py_err)
}

/// Load a measurement file and characterize it.
///
/// Supports both `.csv` and `.csv.gz` files.
#[pyfunction]
#[pyo3(signature = (path, set_threshold = 0.9, linearity_threshold = 0.005))]
fn characterize_csv(
    path: &str,
    set_threshold: f64,
    linearity_threshold: f64,
) -> PyResult<PyCharacterization> {
    let config = AnalysisConfig::default()
        .with_set_threshold(set_threshold)
        .with_linearity_threshold(linearity_threshold);
    config.validate().map_err(to_py_err)?;

    let record = parser::load_record(path).map_err(to_py_err)?;
    let result = analysis::characterize(&record, &config).map_err(to_py_err)?;

    let mut out = PyCharacterization {
        source: record.source().to_string(),
        activity: record.activity().to_string(),
        set_voltage: None,
        on_resistance: None,
        r_squared: None,
        linear_voltage_min: None,
        linear_voltage_max: None,
        true_ramp_rate: result.true_ramp_rate(),
    };
    match result {
        Characterization::Set { set_voltage, .. } => out.set_voltage = set_voltage,
        Characterization::Reset {
            on_resistance,
            linear_voltage_range,
            ..
        } => {
            out.on_resistance = on_resistance.map(|fit| fit.ohms);
            out.r_squared = on_resistance.map(|fit| fit.r_squared);
            out.linear_voltage_min = linear_voltage_range.map(|(min, _)| min);
            out.linear_voltage_max = linear_voltage_range.map(|(_, max)| max);
        }
        Characterization::ThreeProbe { .. } | Characterization::Observe => {}
    }
    Ok(out)
}

/// Python module: ivsweep_rs
#[pymodule]
fn ivsweep_rs(m: &Bound<'_, PyModule>) -> PyResult<()> {
    m.add_function(wrap_pyfunction!(decode_identifier, m)?)?;
    m.add_function(wrap_pyfunction!(characterize_csv, m)?)?;
    m.add_class::<PyDescriptor>()?;
    m.add_class::<PyCharacterization>()?;
    Ok(())
}
