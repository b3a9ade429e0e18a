//! Characterization of single measurements.
//!
//! - set/form: voltage at the last crossing of `set_threshold * Icc`
//! - reset: on-resistance from a least-squares fit over the linear regime
//! - every non-observe sweep: the realized ("true") ramp rate
//!
//! Numeric degeneracies (no crossing, flat sweep) are `None` results, not
//! errors. Asking a record for a quantity its activity does not define is.

use std::collections::HashMap;

use log::debug;
use serde::Serialize;

use crate::config::AnalysisConfig;
use crate::error::{Error, Result};
use crate::signal;
use crate::types::*;

/// |V| at which the realized ramp rate is sampled.
pub const RAMP_REFERENCE_VOLTAGE: f64 = 1.0;

/// On-resistance of a reset sweep and the quality of its linear fit.
#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub struct ResistanceFit {
    pub ohms: f64,
    pub r_squared: f64,
}

/// Derived quantities of one record, by activity.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Characterization {
    /// Set or form sweep.
    Set {
        set_voltage: Option<f64>,
        true_ramp_rate: Option<f64>,
    },
    Reset {
        on_resistance: Option<ResistanceFit>,
        linear_voltage_range: Option<(f64, f64)>,
        true_ramp_rate: Option<f64>,
    },
    /// Only the realized ramp is derived for three-probe sweeps.
    ThreeProbe { true_ramp_rate: Option<f64> },
    /// Observe runs are not characterized.
    Observe,
}

impl Characterization {
    pub fn true_ramp_rate(&self) -> Option<f64> {
        match self {
            Characterization::Set { true_ramp_rate, .. }
            | Characterization::Reset { true_ramp_rate, .. }
            | Characterization::ThreeProbe { true_ramp_rate } => *true_ramp_rate,
            Characterization::Observe => None,
        }
    }
}

// ── Activity gates ──────────────────────────────────────────────────

fn require_activity(
    record: &WaveformRecord,
    query: &'static str,
    accepts: fn(&Activity) -> bool,
) -> Result<()> {
    match record.activity() {
        Activity::Observe => Err(Error::InapplicableQuery { query }),
        Activity::Invalid(name) => Err(Error::InvalidActivity(name.clone())),
        activity if accepts(activity) => Ok(()),
        activity => Err(Error::WrongActivity {
            query,
            activity: activity.to_string(),
        }),
    }
}

fn sweep(record: &WaveformRecord) -> Result<&ProbeTrace> {
    record.probe(Probe::A).ok_or_else(|| Error::MissingProbe {
        source_name: record.source().to_string(),
        probe: Probe::A,
    })
}

// ── Set / form ──────────────────────────────────────────────────────

/// Voltage at which a set/form sweep reached `set_threshold * Icc`.
///
/// The last crossing wins, so early transients do not count as the set
/// event. `None` when the current never crosses the threshold.
pub fn set_voltage(record: &WaveformRecord, config: &AnalysisConfig) -> Result<Option<f64>> {
    config.validate()?;
    require_activity(record, "set voltage", Activity::is_switching)?;
    let trace = sweep(record)?;

    let Some(compliance) = record.descriptor().compliance() else {
        debug!("{}: no compliance current, set voltage undefined", record.source());
        return Ok(None);
    };
    let threshold = config.set_threshold * compliance.amps();

    let signal: Vec<bool> = trace.current.iter().map(|&i| i >= threshold).collect();
    let voltage = signal::crossings(&signal).last().map(|&k| trace.voltage[k]);
    if voltage.is_none() {
        debug!("{}: current never crossed {:e} A", record.source(), threshold);
    }
    Ok(voltage)
}

// ── Reset ───────────────────────────────────────────────────────────

/// First sample index outside the linear regime of a reset sweep.
pub fn linearity_boundary(record: &WaveformRecord, config: &AnalysisConfig) -> Result<Option<usize>> {
    config.validate()?;
    require_activity(record, "linearity boundary", |a| *a == Activity::Reset)?;
    let trace = sweep(record)?;
    Ok(signal::linearity_boundary(
        &trace.voltage,
        &trace.current,
        config.linearity_threshold,
    ))
}

/// `(min, max)` voltage of the linear regime of a reset sweep.
pub fn linear_voltage_range(
    record: &WaveformRecord,
    config: &AnalysisConfig,
) -> Result<Option<(f64, f64)>> {
    let boundary = linearity_boundary(record, config)?;
    let trace = sweep(record)?;
    Ok(voltage_range(crop(&trace.voltage, boundary)))
}

/// On-resistance (1 / slope) of the linear regime of a reset sweep.
pub fn on_resistance(
    record: &WaveformRecord,
    config: &AnalysisConfig,
) -> Result<Option<ResistanceFit>> {
    let boundary = linearity_boundary(record, config)?;
    let trace = sweep(record)?;
    let fit = fit_resistance(trace, boundary);
    if fit.is_none() {
        debug!("{}: linear regime too degenerate to fit", record.source());
    }
    Ok(fit)
}

fn crop(values: &[f64], boundary: Option<usize>) -> &[f64] {
    match boundary {
        Some(idx) => &values[..idx.min(values.len())],
        None => values,
    }
}

fn voltage_range(voltage: &[f64]) -> Option<(f64, f64)> {
    if voltage.is_empty() {
        return None;
    }
    let min = voltage.iter().copied().fold(f64::INFINITY, f64::min);
    let max = voltage.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    Some((min, max))
}

fn fit_resistance(trace: &ProbeTrace, boundary: Option<usize>) -> Option<ResistanceFit> {
    let voltage = crop(&trace.voltage, boundary);
    let current = crop(&trace.current, boundary);
    let fit = signal::linear_fit(voltage, current)?;
    // Slope is conductance.
    if fit.slope == 0.0 {
        return None;
    }
    Some(ResistanceFit {
        ohms: 1.0 / fit.slope,
        r_squared: fit.r_squared,
    })
}

// ── Ramp rate ───────────────────────────────────────────────────────

/// Realized ramp rate in V/s, as opposed to the target encoded in the name.
///
/// Sampled where |V| first crosses 1 V, or at the last sample of sweeps that
/// never get there.
pub fn true_ramp_rate(record: &WaveformRecord) -> Result<Option<f64>> {
    require_activity(record, "true ramp rate", |_| true)?;
    let trace = sweep(record)?;
    Ok(ramp_rate(record.time(), &trace.voltage))
}

fn ramp_rate(time: &[f64], voltage: &[f64]) -> Option<f64> {
    let signal: Vec<bool> = voltage
        .iter()
        .map(|v| v.abs() >= RAMP_REFERENCE_VOLTAGE)
        .collect();
    let idx = match signal::crossings(&signal).first() {
        Some(&k) => k,
        None => voltage.len().checked_sub(1)?,
    };
    let rate = voltage[idx] / time[idx];
    rate.is_finite().then_some(rate)
}

// ── Whole-record characterization ───────────────────────────────────

/// Every quantity the record's activity defines.
pub fn characterize(record: &WaveformRecord, config: &AnalysisConfig) -> Result<Characterization> {
    config.validate()?;
    match record.activity() {
        Activity::Observe => Ok(Characterization::Observe),
        Activity::Invalid(name) => Err(Error::InvalidActivity(name.clone())),
        Activity::Set | Activity::Form => Ok(Characterization::Set {
            set_voltage: set_voltage(record, config)?,
            true_ramp_rate: true_ramp_rate(record)?,
        }),
        Activity::Reset => {
            let boundary = linearity_boundary(record, config)?;
            let trace = sweep(record)?;
            Ok(Characterization::Reset {
                on_resistance: fit_resistance(trace, boundary),
                linear_voltage_range: voltage_range(crop(&trace.voltage, boundary)),
                true_ramp_rate: ramp_rate(record.time(), &trace.voltage),
            })
        }
        Activity::ThreeProbe => Ok(Characterization::ThreeProbe {
            true_ramp_rate: true_ramp_rate(record)?,
        }),
    }
}

// ── Memoization ─────────────────────────────────────────────────────

type CacheKey = (String, (u64, u64));

/// Memoizing front end to [`characterize`].
///
/// Results are keyed by record source path and the exact hyperparameters.
/// Replacing the configuration drops every result computed under the old
/// one. Errors are not cached.
#[derive(Debug, Default)]
pub struct Characterizer {
    config: AnalysisConfig,
    cache: HashMap<CacheKey, Characterization>,
}

impl Characterizer {
    pub fn new(config: AnalysisConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            config,
            cache: HashMap::new(),
        })
    }

    pub fn config(&self) -> &AnalysisConfig {
        &self.config
    }

    /// Swap hyperparameters, invalidating cached results if they changed.
    pub fn set_config(&mut self, config: AnalysisConfig) -> Result<()> {
        config.validate()?;
        if config != self.config {
            debug!("hyperparameters changed, dropping {} cached results", self.cache.len());
            self.cache.clear();
            self.config = config;
        }
        Ok(())
    }

    pub fn characterize(&mut self, record: &WaveformRecord) -> Result<Characterization> {
        let key = (record.source().to_string(), self.config.cache_key());
        if let Some(hit) = self.cache.get(&key) {
            debug!("{}: cached characterization", record.source());
            return Ok(hit.clone());
        }
        let result = characterize(record, &self.config)?;
        self.cache.insert(key, result.clone());
        Ok(result)
    }

    /// Forget the cached result of one record, e.g. after it was reloaded.
    pub fn invalidate_record(&mut self, source: &str) {
        self.cache.retain(|(name, _), _| name != source);
    }

    pub fn invalidate(&mut self) {
        self.cache.clear();
    }

    /// Number of cached results.
    pub fn cached(&self) -> usize {
        self.cache.len()
    }
}
