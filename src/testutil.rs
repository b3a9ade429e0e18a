//! Record builders shared by unit tests.

use crate::identifier;
use crate::reader::{self, Table, NO_COMMENTS};
use crate::types::WaveformRecord;

/// Probe-A record from explicit sample vectors.
pub(crate) fn record(
    identifier: &str,
    time: Vec<f64>,
    voltage: Vec<f64>,
    current: Vec<f64>,
) -> WaveformRecord {
    record_at(&format!("{identifier}.csv"), identifier, time, voltage, current)
}

/// Like [`record`], but loaded from an explicit source path.
pub(crate) fn record_at(
    source: &str,
    identifier: &str,
    time: Vec<f64>,
    voltage: Vec<f64>,
    current: Vec<f64>,
) -> WaveformRecord {
    let table = Table {
        comments: NO_COMMENTS.to_string(),
        column_names: vec!["Time".to_string(), "AV".to_string(), "AI".to_string()],
        columns: vec![time, voltage, current],
    };
    WaveformRecord::from_table(source, identifier::decode(identifier).unwrap(), table).unwrap()
}

/// Record from CSV body text.
pub(crate) fn sweep_record(identifier: &str, body: &str) -> WaveformRecord {
    WaveformRecord::from_table(
        format!("{identifier}.csv"),
        identifier::decode(identifier).unwrap(),
        reader::load(body).unwrap(),
    )
    .unwrap()
}
