//! ivsweep-rs: decoder and characterization engine for memristive cell IV
//! sweep CSV files, with optional Python bindings.

pub mod analysis;
pub mod catalog;
pub mod config;
pub mod cycle;
pub mod error;
pub mod identifier;
pub mod parser;
pub mod reader;
pub mod signal;
pub mod types;

#[cfg(feature = "python")]
mod python;

#[cfg(test)]
mod testutil;

pub use analysis::{characterize, Characterization, Characterizer, ResistanceFit};
pub use catalog::{Catalog, CellSizeLookup, CellSummary, IngestFailure};
pub use config::AnalysisConfig;
pub use cycle::{CycleAggregator, CycleEvent, CycleRecord};
pub use error::{Error, Result};
pub use identifier::{decode, decode_path, encode};
pub use parser::load_record;
pub use reader::{load, read_table, Table};
pub use types::*;
