//! Measurement file parser: file name + CSV body -> `WaveformRecord`.

use std::path::Path;

use log::debug;

use crate::error::{Error, Result};
use crate::identifier;
use crate::reader::{self, Table};
use crate::types::*;

/// Name of the mandatory time-axis column.
pub const TIME_COLUMN: &str = "Time";

impl WaveformRecord {
    /// Map the columns of a parsed table onto the time axis and probe slots.
    ///
    /// `Time` is required; a probe whose voltage or current column is missing
    /// is recorded as absent. Present probe columns must match the length of
    /// `Time`.
    pub fn from_table(
        source: impl Into<String>,
        descriptor: MeasurementDescriptor,
        table: Table,
    ) -> Result<Self> {
        let source = source.into();
        let time = table
            .column(TIME_COLUMN)
            .ok_or_else(|| Error::MissingAxis {
                source_name: source.clone(),
            })?
            .to_vec();

        let mut probes: [Option<ProbeTrace>; 3] = [None, None, None];
        for (slot, probe) in probes.iter_mut().zip(Probe::ALL) {
            let voltage = table.column(probe.voltage_column());
            let current = table.column(probe.current_column());
            *slot = match (voltage, current) {
                (Some(voltage), Some(current)) => {
                    for (column, samples) in [
                        (probe.voltage_column(), voltage),
                        (probe.current_column(), current),
                    ] {
                        if samples.len() != time.len() {
                            return Err(Error::LengthMismatch {
                                source_name: source,
                                column: column.to_string(),
                                expected: time.len(),
                                found: samples.len(),
                            });
                        }
                    }
                    Some(ProbeTrace {
                        voltage: voltage.to_vec(),
                        current: current.to_vec(),
                    })
                }
                _ => {
                    debug!("{}: probe {} absent", source, probe);
                    None
                }
            };
        }

        Ok(Self {
            source,
            descriptor,
            comments: table.comments,
            time,
            probes,
        })
    }
}

/// Parse a measurement file (supports .csv and .csv.gz).
///
/// The record's source is the path as given, so equally named files from
/// different run directories stay distinct.
pub fn load_record<P: AsRef<Path>>(path: P) -> Result<WaveformRecord> {
    let path = path.as_ref();
    let descriptor = identifier::decode_path(path)?;
    let table = reader::read_table(path)?;

    let record = WaveformRecord::from_table(path.display().to_string(), descriptor, table)?;
    debug!(
        "loaded {} ({} samples, activity {})",
        record.source(),
        record.len(),
        record.activity()
    );
    Ok(record)
}
