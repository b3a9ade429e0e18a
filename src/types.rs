//! Measurement descriptor and waveform data types.

use std::fmt;
use std::path::Path;

use chrono::NaiveDateTime;
use serde::Serialize;

/// Physical test site on a wafer.
///
/// The canonical rendering `(wafer,grid,subgrid,cell)` is also the file-name
/// encoding and the key measurements are grouped by.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct CellPosition {
    pub wafer: String,
    pub grid: String,
    pub subgrid: String,
    pub cell: String,
}

impl CellPosition {
    pub fn new(
        wafer: impl Into<String>,
        grid: impl Into<String>,
        subgrid: impl Into<String>,
        cell: impl Into<String>,
    ) -> Self {
        Self {
            wafer: wafer.into(),
            grid: grid.into(),
            subgrid: subgrid.into(),
            cell: cell.into(),
        }
    }

    /// Grouping key, identical to the canonical rendering.
    pub fn key(&self) -> String {
        self.to_string()
    }

    /// `(grid,subgrid)`: the array coordinates used by the cell-size table.
    ///
    /// Only the first component of a comma subgrid takes part, so
    /// `(W1,2,-1,-1,13)` maps to `(2,-1)`.
    pub fn array_coordinates(&self) -> String {
        let subgrid = self.subgrid.split(',').next().unwrap_or(&self.subgrid);
        format!("({},{})", self.grid, subgrid)
    }
}

impl fmt::Display for CellPosition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({},{},{},{})", self.wafer, self.grid, self.subgrid, self.cell)
    }
}

/// How many cells the probes were landed on.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ProbeMode {
    TwoProbe,
    ThreeProbe,
}

/// What the sweep did to the cell.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum Activity {
    Set,
    Form,
    Reset,
    Observe,
    /// Three-probe measurements carry no activity.
    ThreeProbe,
    /// Two-probe activity name outside the known set, kept for reporting.
    Invalid(String),
}

impl Activity {
    /// Case-insensitive lookup of a two-probe activity token.
    pub fn from_token(token: &str) -> Self {
        match token.to_ascii_lowercase().as_str() {
            "set" => Activity::Set,
            "form" => Activity::Form,
            "reset" => Activity::Reset,
            "observe" => Activity::Observe,
            _ => Activity::Invalid(token.to_string()),
        }
    }

    pub fn name(&self) -> &str {
        match self {
            Activity::Set => "set",
            Activity::Form => "form",
            Activity::Reset => "reset",
            Activity::Observe => "observe",
            Activity::ThreeProbe => "three-probe",
            Activity::Invalid(name) => name,
        }
    }

    /// Set and form both drive the cell into its low-resistance state.
    pub fn is_switching(&self) -> bool {
        matches!(self, Activity::Set | Activity::Form)
    }
}

impl fmt::Display for Activity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Unit suffix of a compliance current.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
pub enum CurrentUnit {
    Micro,
    Milli,
}

impl CurrentUnit {
    pub fn from_suffix(suffix: &str) -> Option<Self> {
        match suffix {
            "uA" => Some(CurrentUnit::Micro),
            "mA" => Some(CurrentUnit::Milli),
            _ => None,
        }
    }

    pub fn suffix(&self) -> &'static str {
        match self {
            CurrentUnit::Micro => "uA",
            CurrentUnit::Milli => "mA",
        }
    }

    /// Multiplier converting a magnitude in this unit to amps.
    pub fn scale(&self) -> f64 {
        match self {
            CurrentUnit::Micro => 1e-6,
            CurrentUnit::Milli => 1e-3,
        }
    }
}

/// Current limit enforced during a sweep.
#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub struct ComplianceCurrent {
    pub magnitude: f64,
    pub unit: CurrentUnit,
}

impl ComplianceCurrent {
    pub fn new(magnitude: f64, unit: CurrentUnit) -> Self {
        Self { magnitude, unit }
    }

    pub fn amps(&self) -> f64 {
        self.magnitude * self.unit.scale()
    }
}

impl fmt::Display for ComplianceCurrent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.magnitude, self.unit.suffix())
    }
}

/// Measurement time decoded from a `YYMMDDHHMM[SS]` token.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Timestamp {
    pub(crate) token: String,
    pub(crate) datetime: NaiveDateTime,
    pub(crate) has_seconds: bool,
}

impl Timestamp {
    /// The token exactly as it appeared in the identifier.
    pub fn token(&self) -> &str {
        &self.token
    }

    pub fn datetime(&self) -> NaiveDateTime {
        self.datetime
    }

    /// False when the identifier omitted seconds and they defaulted to zero.
    pub fn has_seconds(&self) -> bool {
        self.has_seconds
    }

    /// `YYMMDDHHMMSS` as an integer, monotonic with real time.
    ///
    /// Identifiers without seconds sort as `:00`, which can tie with other
    /// measurements of the same minute.
    pub fn sort_key(&self) -> u64 {
        let digits: u64 = self.token.parse().unwrap_or(0);
        if self.has_seconds {
            digits
        } else {
            digits * 100
        }
    }

    pub fn month_name(&self) -> String {
        self.datetime.format("%B").to_string()
    }

    /// `HHMM` or `HHMMSS`, as encoded.
    pub fn time_24h(&self) -> &str {
        &self.token[6..]
    }

    /// e.g. `10:53PM`, or `10:53:07PM` when seconds were encoded.
    pub fn time_12h(&self) -> String {
        let pattern = if self.has_seconds { "%I:%M:%S%p" } else { "%I:%M%p" };
        self.datetime.format(pattern).to_string()
    }

    /// e.g. `2021/February/23 at 10:53PM`.
    pub fn summary_label(&self) -> String {
        self.datetime
            .format(&format!("%Y/%B/%d at {}", self.time_12h()))
            .to_string()
    }
}

/// Activity-dependent sweep parameters.
#[derive(Clone, Debug, PartialEq)]
pub enum ActivityParameters {
    /// Set, form and reset sweeps.
    Sweep {
        start_voltage: f64,
        end_voltage: f64,
        /// Target ramp rate in V/s.
        ramp_rate: f64,
        compliance: ComplianceCurrent,
    },
    /// Bias voltages held on the two electrodes during an observe run.
    Observe {
        platinum_voltage: f64,
        copper_voltage: f64,
        compliance: ComplianceCurrent,
    },
    /// Three-probe measurements and unrecognized activities.
    NotApplicable,
}

impl ActivityParameters {
    pub fn compliance(&self) -> Option<ComplianceCurrent> {
        match self {
            ActivityParameters::Sweep { compliance, .. }
            | ActivityParameters::Observe { compliance, .. } => Some(*compliance),
            ActivityParameters::NotApplicable => None,
        }
    }
}

/// Everything encoded in a measurement's file name.
#[derive(Clone, Debug, PartialEq)]
pub struct MeasurementDescriptor {
    pub target: CellPosition,
    pub neighbor: Option<CellPosition>,
    pub probe_mode: ProbeMode,
    pub timestamp: Option<Timestamp>,
    pub activity: Activity,
    pub parameters: ActivityParameters,
    /// Undecoded trailing identifier list of a three-probe file name.
    pub trailer: Option<String>,
}

impl MeasurementDescriptor {
    /// Time-ordering key; records without a timestamp sort first.
    pub fn sort_key(&self) -> u64 {
        self.timestamp.as_ref().map_or(0, Timestamp::sort_key)
    }

    pub fn compliance(&self) -> Option<ComplianceCurrent> {
        self.parameters.compliance()
    }
}

/// Probe slots of the measurement setup.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Probe {
    A,
    B,
    C,
}

impl Probe {
    pub const ALL: [Probe; 3] = [Probe::A, Probe::B, Probe::C];

    pub fn voltage_column(&self) -> &'static str {
        match self {
            Probe::A => "AV",
            Probe::B => "BV",
            Probe::C => "CV",
        }
    }

    pub fn current_column(&self) -> &'static str {
        match self {
            Probe::A => "AI",
            Probe::B => "BI",
            Probe::C => "CI",
        }
    }

    fn index(&self) -> usize {
        match self {
            Probe::A => 0,
            Probe::B => 1,
            Probe::C => 2,
        }
    }
}

impl fmt::Display for Probe {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Probe::A => "A",
            Probe::B => "B",
            Probe::C => "C",
        };
        f.write_str(name)
    }
}

/// Voltage and current samples of one probe.
#[derive(Clone, Debug, PartialEq)]
pub struct ProbeTrace {
    pub voltage: Vec<f64>,
    pub current: Vec<f64>,
}

/// One measurement: its descriptor plus the sampled waveform.
///
/// Every present probe trace has the time axis' length.
#[derive(Clone, Debug, PartialEq)]
pub struct WaveformRecord {
    pub(crate) source: String,
    pub(crate) descriptor: MeasurementDescriptor,
    pub(crate) comments: String,
    pub(crate) time: Vec<f64>,
    pub(crate) probes: [Option<ProbeTrace>; 3],
}

impl WaveformRecord {
    /// Path the record was loaded from; identifies the record.
    pub fn source(&self) -> &str {
        &self.source
    }

    /// Final component of [`source`](Self::source).
    pub fn file_name(&self) -> &str {
        Path::new(&self.source)
            .file_name()
            .and_then(|name| name.to_str())
            .unwrap_or(&self.source)
    }

    pub fn descriptor(&self) -> &MeasurementDescriptor {
        &self.descriptor
    }

    pub fn activity(&self) -> &Activity {
        &self.descriptor.activity
    }

    pub fn comments(&self) -> &str {
        &self.comments
    }

    pub fn time(&self) -> &[f64] {
        &self.time
    }

    pub fn probe(&self, probe: Probe) -> Option<&ProbeTrace> {
        self.probes[probe.index()].as_ref()
    }

    /// Number of samples.
    pub fn len(&self) -> usize {
        self.time.len()
    }

    pub fn is_empty(&self) -> bool {
        self.time.is_empty()
    }
}
