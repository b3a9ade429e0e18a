//! Batch ingestion of measurement files, grouped by cell.
//!
//! A malformed file never aborts the batch: its error is recorded in
//! [`Catalog::failures`] and ingestion carries on.

use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::path::{Path, PathBuf};

use log::{info, warn};
use rayon::prelude::*;
use serde::Serialize;

use crate::config::AnalysisConfig;
use crate::cycle::{self, CycleRecord};
use crate::error::{Error, Result};
use crate::parser;
use crate::types::*;

/// A file that could not be turned into a record.
#[derive(Debug)]
pub struct IngestFailure {
    pub path: PathBuf,
    pub error: Error,
}

/// Physical cell size by array coordinates (`(grid,subgrid)`).
///
/// The table itself belongs to the wafer layout, not to this crate.
pub trait CellSizeLookup {
    fn cell_size(&self, array_coordinates: &str) -> Option<String>;
}

impl CellSizeLookup for HashMap<String, String> {
    fn cell_size(&self, array_coordinates: &str) -> Option<String> {
        self.get(array_coordinates).cloned()
    }
}

/// Usage summary of one cell.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct CellSummary {
    pub cell: String,
    pub cell_size: Option<String>,
    pub times_accessed: usize,
    /// e.g. `2021/February/23 at 10:53PM`.
    pub last_accessed: Option<String>,
}

#[derive(Debug)]
struct CellEntry {
    position: CellPosition,
    /// Indices into `Catalog::records`, time-ordered.
    records: Vec<usize>,
}

/// Records of a measurement batch, indexed by cell.
#[derive(Debug, Default)]
pub struct Catalog {
    records: Vec<WaveformRecord>,
    cells: BTreeMap<String, CellEntry>,
    failures: Vec<IngestFailure>,
}

impl Catalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load every path, in the given order, collecting per-file failures.
    pub fn ingest<I, P>(paths: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: AsRef<Path>,
    {
        let mut catalog = Self::new();
        for path in paths {
            let path = path.as_ref();
            match parser::load_record(path) {
                Ok(record) => catalog.insert(record),
                Err(error) => {
                    warn!("skipping {}: {}", path.display(), error);
                    catalog.failures.push(IngestFailure {
                        path: path.to_path_buf(),
                        error,
                    });
                }
            }
        }
        info!(
            "ingested {} records for {} cells ({} failed)",
            catalog.records.len(),
            catalog.cells.len(),
            catalog.failures.len()
        );
        catalog
    }

    /// Ingest every `.csv` / `.csv.gz` file of a directory, in name order.
    pub fn from_dir<P: AsRef<Path>>(dir: P) -> Result<Self> {
        let mut paths = Vec::new();
        for entry in fs::read_dir(dir.as_ref())? {
            let path = entry?.path();
            let is_csv = path
                .file_name()
                .and_then(|name| name.to_str())
                .map_or(false, |name| name.ends_with(".csv") || name.ends_with(".csv.gz"));
            if is_csv && path.is_file() {
                paths.push(path);
            }
        }
        paths.sort();
        Ok(Self::ingest(paths))
    }

    /// File a record under its target cell and, for three-probe
    /// measurements, its neighbor cell.
    ///
    /// Each cell's history stays sorted by timestamp; equal timestamps keep
    /// insertion order.
    pub fn insert(&mut self, record: WaveformRecord) {
        let idx = self.records.len();
        let key = record.descriptor().sort_key();
        let descriptor = record.descriptor();

        let mut positions = vec![descriptor.target.clone()];
        if let Some(neighbor) = &descriptor.neighbor {
            if *neighbor != descriptor.target {
                positions.push(neighbor.clone());
            }
        }
        self.records.push(record);

        for position in positions {
            let entry = self.cells.entry(position.key()).or_insert_with(|| CellEntry {
                position,
                records: Vec::new(),
            });
            let records = &self.records;
            let at = entry
                .records
                .partition_point(|&i| records[i].descriptor().sort_key() <= key);
            entry.records.insert(at, idx);
        }
    }

    /// All records, in ingestion order.
    pub fn records(&self) -> &[WaveformRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn failures(&self) -> &[IngestFailure] {
        &self.failures
    }

    /// Canonical keys of every cell with at least one record.
    pub fn cells(&self) -> impl Iterator<Item = &str> + '_ {
        self.cells.keys().map(String::as_str)
    }

    /// Time-ordered history of one cell; empty for unknown keys.
    pub fn records_for<'a>(&'a self, cell: &str) -> impl Iterator<Item = &'a WaveformRecord> + 'a {
        self.cells
            .get(cell)
            .into_iter()
            .flat_map(|entry| entry.records.iter())
            .map(move |&i| &self.records[i])
    }

    pub fn summaries(&self, sizes: &impl CellSizeLookup) -> Vec<CellSummary> {
        self.cells
            .iter()
            .map(|(key, entry)| {
                let last_accessed = entry
                    .records
                    .iter()
                    .rev()
                    .find_map(|&i| self.records[i].descriptor().timestamp.as_ref())
                    .map(Timestamp::summary_label);
                CellSummary {
                    cell: key.clone(),
                    cell_size: sizes.cell_size(&entry.position.array_coordinates()),
                    times_accessed: entry.records.len(),
                    last_accessed,
                }
            })
            .collect()
    }

    /// Completed cycles of every cell. Cells are folded in parallel.
    pub fn cycles(&self, config: &AnalysisConfig) -> Result<BTreeMap<String, Vec<CycleRecord>>> {
        config.validate()?;
        self.cells
            .par_iter()
            .map(|(key, entry)| -> Result<(String, Vec<CycleRecord>)> {
                let history = entry.records.iter().map(|&i| &self.records[i]);
                Ok((key.clone(), cycle::fold_cycles(history, config)?))
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::record;

    fn flat(identifier: &str) -> WaveformRecord {
        record(identifier, vec![0.0, 1.0], vec![0.0, 0.1], vec![0.0, 1e-9])
    }

    #[test]
    fn test_insert_orders_by_timestamp_then_insertion() {
        let mut catalog = Catalog::new();
        catalog.insert(flat("(W1,2,0,13)_2102231100_set_0_2_0.5_10uA"));
        catalog.insert(flat("(W1,2,0,13)_2102231053_reset_0_-1_0.5_1mA"));
        catalog.insert(flat("(W1,2,0,13)_210223110000_form_0_2_0.5_10uA"));
        catalog.insert(flat("(W1,2,0,14)_2102221000_set_0_2_0.5_10uA"));

        assert_eq!(catalog.len(), 4);
        let cells: Vec<&str> = catalog.cells().collect();
        assert_eq!(cells, vec!["(W1,2,0,13)", "(W1,2,0,14)"]);

        let activities: Vec<String> = catalog
            .records_for("(W1,2,0,13)")
            .map(|r| r.activity().to_string())
            .collect();
        // 1100 and 110000 tie; the set was ingested first.
        assert_eq!(activities, vec!["reset", "set", "form"]);
        assert_eq!(catalog.records_for("(W9,0,0,0)").count(), 0);
    }

    #[test]
    fn test_three_probe_filed_under_both_cells() {
        let mut catalog = Catalog::new();
        catalog.insert(flat("(W1,2,0,13)_(W1,2,0,14)_2102231053_run4"));
        assert_eq!(catalog.records_for("(W1,2,0,13)").count(), 1);
        assert_eq!(catalog.records_for("(W1,2,0,14)").count(), 1);
        assert_eq!(catalog.len(), 1);
    }

    #[test]
    fn test_cycles_reject_invalid_config() {
        let mut catalog = Catalog::new();
        catalog.insert(flat("(W1,2,0,13)_2102231053_set_0_2_0.5_10uA"));

        let nan = AnalysisConfig::default().with_linearity_threshold(f64::NAN);
        assert!(matches!(catalog.cycles(&nan), Err(Error::InvalidConfig(_))));

        let cycles = catalog.cycles(&AnalysisConfig::default()).unwrap();
        assert_eq!(cycles.len(), 1);
        assert!(cycles["(W1,2,0,13)"].is_empty());
    }

    #[test]
    fn test_summaries_use_first_subgrid_component() {
        let mut catalog = Catalog::new();
        catalog.insert(flat("(W1,2,-1,-1,13)_2102231053_set_0_2_0.5_10uA"));

        let mut sizes = HashMap::new();
        sizes.insert("(2,-1)".to_string(), "5um".to_string());
        let summaries = catalog.summaries(&sizes);
        assert_eq!(summaries[0].cell, "(W1,2,-1,-1,13)");
        assert_eq!(summaries[0].cell_size.as_deref(), Some("5um"));
    }

    #[test]
    fn test_summaries() {
        let mut catalog = Catalog::new();
        catalog.insert(flat("(W1,2,0,13)_2102231053_set_0_2_0.5_10uA"));
        catalog.insert(flat("(W1,2,0,13)_2102232215_reset_0_-1_0.5_1mA"));

        let mut sizes = HashMap::new();
        sizes.insert("(2,0)".to_string(), "15um".to_string());

        let summaries = catalog.summaries(&sizes);
        assert_eq!(
            summaries,
            vec![CellSummary {
                cell: "(W1,2,0,13)".to_string(),
                cell_size: Some("15um".to_string()),
                times_accessed: 2,
                last_accessed: Some("2021/February/23 at 10:15PM".to_string()),
            }]
        );
    }
}
