//! Folding one cell's measurement history into set -> reset cycles.

use log::warn;
use serde::Serialize;

use crate::analysis::{self, Characterization, ResistanceFit};
use crate::config::AnalysisConfig;
use crate::error::Result;
use crate::types::*;

/// What one record contributes to the cycle fold.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum CycleEvent {
    /// Set or form sweep; `voltage` is `None` when no set was detected.
    Set {
        compliance: ComplianceCurrent,
        voltage: Option<f64>,
    },
    /// Reset sweep; `fit` is `None` when the curve was too nonlinear.
    Reset { fit: Option<ResistanceFit> },
}

impl CycleEvent {
    /// Observe and three-probe records contribute nothing.
    pub fn from_characterization(
        descriptor: &MeasurementDescriptor,
        result: &Characterization,
    ) -> Option<Self> {
        match result {
            Characterization::Set { set_voltage, .. } => Some(CycleEvent::Set {
                compliance: descriptor.compliance()?,
                voltage: *set_voltage,
            }),
            Characterization::Reset { on_resistance, .. } => Some(CycleEvent::Reset {
                fit: *on_resistance,
            }),
            Characterization::ThreeProbe { .. } | Characterization::Observe => None,
        }
    }
}

/// One completed set -> reset cycle of a cell.
#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub struct CycleRecord {
    /// 1-based.
    pub cycle: u32,
    pub set_compliance: ComplianceCurrent,
    pub set_voltage: f64,
    pub on_resistance: f64,
    pub r_squared: f64,
}

#[derive(Clone, Copy, Debug, Default)]
struct Accumulator {
    set_compliance: Option<ComplianceCurrent>,
    set_voltage: Option<f64>,
    on_resistance: Option<f64>,
    r_squared: Option<f64>,
}

impl Accumulator {
    fn complete(&self, cycle: u32) -> Option<CycleRecord> {
        Some(CycleRecord {
            cycle,
            set_compliance: self.set_compliance?,
            set_voltage: self.set_voltage?,
            on_resistance: self.on_resistance?,
            r_squared: self.r_squared?,
        })
    }
}

/// Sequential fold over a cell's time-ordered events.
#[derive(Clone, Debug)]
pub struct CycleAggregator {
    cycle: u32,
    current: Accumulator,
    previous: Option<CycleRecord>,
    completed: Vec<CycleRecord>,
}

impl Default for CycleAggregator {
    fn default() -> Self {
        Self::new()
    }
}

impl CycleAggregator {
    pub fn new() -> Self {
        Self {
            cycle: 1,
            current: Accumulator::default(),
            previous: None,
            completed: Vec::new(),
        }
    }

    /// Feed the next event; returns the cycle it completed, if any.
    pub fn push(&mut self, event: CycleEvent) -> Option<CycleRecord> {
        match event {
            CycleEvent::Set {
                compliance,
                voltage: Some(voltage),
            } => {
                self.current.set_compliance = Some(compliance);
                self.current.set_voltage = Some(voltage);
            }
            CycleEvent::Reset { fit: Some(fit) } => {
                self.current.on_resistance = Some(fit.ohms);
                self.current.r_squared = Some(fit.r_squared);
                // A reset without an intervening successful set reuses the
                // previous cycle's set.
                if self.current.set_compliance.is_none() {
                    if let Some(prev) = &self.previous {
                        self.current.set_compliance = Some(prev.set_compliance);
                        self.current.set_voltage = Some(prev.set_voltage);
                    }
                }
            }
            CycleEvent::Set { voltage: None, .. } | CycleEvent::Reset { fit: None } => {}
        }

        let record = self.current.complete(self.cycle)?;
        self.completed.push(record);
        self.previous = Some(record);
        self.current = Accumulator::default();
        self.cycle += 1;
        Some(record)
    }

    /// Index of the cycle in progress.
    pub fn cycle(&self) -> u32 {
        self.cycle
    }

    pub fn previous(&self) -> Option<&CycleRecord> {
        self.previous.as_ref()
    }

    pub fn completed(&self) -> &[CycleRecord] {
        &self.completed
    }

    pub fn into_cycles(self) -> Vec<CycleRecord> {
        self.completed
    }
}

/// Characterize a cell's time-ordered records and fold them into cycles.
///
/// Records that cannot be characterized are logged and skipped. An invalid
/// configuration fails the whole fold.
pub fn fold_cycles<'a, I>(records: I, config: &AnalysisConfig) -> Result<Vec<CycleRecord>>
where
    I: IntoIterator<Item = &'a WaveformRecord>,
{
    config.validate()?;
    let mut aggregator = CycleAggregator::new();
    for record in records {
        let result = match analysis::characterize(record, config) {
            Ok(result) => result,
            Err(err) => {
                warn!("skipping {} in cycle fold: {}", record.source(), err);
                continue;
            }
        };
        if let Some(event) = CycleEvent::from_characterization(record.descriptor(), &result) {
            aggregator.push(event);
        }
    }
    Ok(aggregator.into_cycles())
}
