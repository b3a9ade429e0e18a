//! End-to-end tests: files on disk -> records -> characterization -> cycles.

use std::collections::HashMap;
use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};

use flate2::write::GzEncoder;
use flate2::Compression;
use tempfile::TempDir;

use ivsweep_rs::{
    analysis, decode_path, load_record, AnalysisConfig, Catalog, Characterization, Characterizer,
    Error, Probe, Table, WaveformRecord,
};

const SET_NAME: &str = "(W1,2,0,13)_2102231053_set_0_2_0.5_100uA.csv";
const RESET_NAME: &str = "(W1,2,0,13)_2102231110_reset_0_-0.5_0.5_1mA.csv";
const OBSERVE_NAME: &str = "(W1,2,0,13)_2102231120_observe_0_0.1_100uA.csv";

fn set_body() -> String {
    let mut body = String::from("---\nfresh cell\nsecond sweep\n---\nTime,AV,AI,BV,BI\n");
    for k in 0..21 {
        let current = if k >= 12 { 1e-4 } else { 1e-9 };
        body.push_str(&format!("{},{},{},0,0\n", k as f64 * 0.2, k as f64 * 0.1, current));
    }
    body
}

fn reset_body(ohms: f64) -> String {
    let mut body = String::from("Time,AV,AI\n");
    for k in 0..41 {
        let v = -(k as f64) * 0.0125;
        body.push_str(&format!("{},{},{}\n", k as f64 * 0.025, v, v / ohms));
    }
    body
}

fn write(dir: &Path, name: &str, body: &str) -> PathBuf {
    let path = dir.join(name);
    let mut file = File::create(&path).unwrap();
    file.write_all(body.as_bytes()).unwrap();
    path
}

fn write_gz(dir: &Path, name: &str, body: &str) -> PathBuf {
    let path = dir.join(name);
    let mut encoder = GzEncoder::new(File::create(&path).unwrap(), Compression::default());
    encoder.write_all(body.as_bytes()).unwrap();
    encoder.finish().unwrap();
    path
}

#[test]
fn test_load_record_from_disk() {
    let dir = TempDir::new().unwrap();
    let path = write(dir.path(), SET_NAME, &set_body());

    let record = load_record(&path).unwrap();
    assert_eq!(record.source(), path.display().to_string());
    assert_eq!(record.file_name(), SET_NAME);
    assert_eq!(record.comments(), "fresh cell\nsecond sweep");
    assert_eq!(record.len(), 21);
    assert!(record.probe(Probe::A).is_some());
    assert!(record.probe(Probe::B).is_some());
    assert!(record.probe(Probe::C).is_none());
}

#[test]
fn test_load_gzipped_record() {
    let dir = TempDir::new().unwrap();
    let name = format!("{RESET_NAME}.gz");
    let path = write_gz(dir.path(), &name, &reset_body(5000.0));

    let record = load_record(&path).unwrap();
    assert_eq!(record.file_name(), name);
    let fit = analysis::on_resistance(&record, &AnalysisConfig::default())
        .unwrap()
        .unwrap();
    assert!((fit.ohms - 5000.0).abs() < 1e-6);
    assert!((fit.r_squared - 1.0).abs() < 1e-9);
}

#[test]
fn test_missing_time_column_is_fatal() {
    let dir = TempDir::new().unwrap();
    let path = write(dir.path(), SET_NAME, "AV,AI\n0,0\n1,1e-6\n");
    assert!(matches!(load_record(&path), Err(Error::MissingAxis { .. })));
}

#[test]
fn test_malformed_name_is_reported_before_reading() {
    let dir = TempDir::new().unwrap();
    let path = write(dir.path(), "no_cell_here.csv", &set_body());
    assert!(matches!(load_record(&path), Err(Error::MalformedIdentifier { .. })));
}

#[test]
fn test_missing_file_is_io_error() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join(SET_NAME);
    assert!(matches!(load_record(&path), Err(Error::Io(_))));
}

#[test]
fn test_catalog_survives_bad_files_and_folds_cycles() {
    let dir = TempDir::new().unwrap();
    write(dir.path(), SET_NAME, &set_body());
    write(dir.path(), RESET_NAME, &reset_body(5000.0));
    write(dir.path(), OBSERVE_NAME, "Time,AV,AI\n0,0.1,1e-6\n1,0.1,1e-6\n");
    write(dir.path(), "(W1,2,0,13)_2102231200_set_0_2_0.5_100uA.csv", "Time,AV,AI\n0,0\n");
    write(dir.path(), "garbage.csv", "Time\n0\n");
    write(dir.path(), "notes.txt", "not a measurement");
    write_gz(
        dir.path(),
        "(W1,2,0,14)_2102231300_reset_0_-0.5_0.5_1mA.csv.gz",
        &reset_body(2000.0),
    );

    let catalog = Catalog::from_dir(dir.path()).unwrap();
    assert_eq!(catalog.len(), 4);
    assert_eq!(catalog.failures().len(), 2);
    assert!(catalog.failures().iter().all(|f| f.error.is_data_error()));

    let histories: Vec<String> = catalog
        .records_for("(W1,2,0,13)")
        .map(|r| r.activity().to_string())
        .collect();
    assert_eq!(histories, vec!["set", "reset", "observe"]);

    let config = AnalysisConfig::default();
    let cycles = catalog.cycles(&config).unwrap();
    assert_eq!(cycles.len(), 2);

    let cell13 = &cycles["(W1,2,0,13)"];
    assert_eq!(cell13.len(), 1);
    assert_eq!(cell13[0].cycle, 1);
    assert!((cell13[0].set_voltage - 1.1).abs() < 1e-9);
    assert!((cell13[0].on_resistance - 5000.0).abs() < 1e-6);
    assert!((cell13[0].set_compliance.amps() - 1e-4).abs() < 1e-15);

    // A reset with no preceding set never completes a cycle.
    assert!(cycles["(W1,2,0,14)"].is_empty());

    let mut sizes = HashMap::new();
    sizes.insert("(2,0)".to_string(), "10um".to_string());
    let summaries = catalog.summaries(&sizes);
    assert_eq!(summaries.len(), 2);
    assert_eq!(summaries[0].times_accessed, 3);
    assert_eq!(summaries[0].cell_size.as_deref(), Some("10um"));
    assert_eq!(
        summaries[0].last_accessed.as_deref(),
        Some("2021/February/23 at 11:20AM")
    );
}

#[test]
fn test_characterize_observe_is_inert() {
    let dir = TempDir::new().unwrap();
    let path = write(dir.path(), OBSERVE_NAME, "Time,AV,AI\n0,0.1,1e-6\n1,0.1,1e-6\n");
    let record = load_record(&path).unwrap();

    let config = AnalysisConfig::default();
    assert_eq!(
        analysis::characterize(&record, &config).unwrap(),
        Characterization::Observe
    );
    assert!(matches!(
        analysis::true_ramp_rate(&record),
        Err(Error::InapplicableQuery { .. })
    ));
}

#[test]
fn test_same_file_name_in_two_runs() {
    let dir = TempDir::new().unwrap();
    let run1 = dir.path().join("Run1");
    let run2 = dir.path().join("Run2");
    std::fs::create_dir(&run1).unwrap();
    std::fs::create_dir(&run2).unwrap();
    let a = write(&run1, RESET_NAME, &reset_body(5000.0));
    let b = write(&run2, RESET_NAME, &reset_body(2000.0));

    let catalog = Catalog::ingest([&a, &b]);
    assert_eq!(catalog.len(), 2);
    assert_ne!(catalog.records()[0].source(), catalog.records()[1].source());

    let mut engine = Characterizer::new(AnalysisConfig::default()).unwrap();
    let ohms: Vec<f64> = catalog
        .records()
        .iter()
        .map(|record| match engine.characterize(record).unwrap() {
            Characterization::Reset { on_resistance, .. } => on_resistance.unwrap().ohms,
            other => panic!("unexpected {other:?}"),
        })
        .collect();
    assert!((ohms[0] - 5000.0).abs() < 1e-6);
    assert!((ohms[1] - 2000.0).abs() < 1e-6);
    assert_eq!(engine.cached(), 2);
}

#[test]
fn test_mismatched_columns_are_rejected() {
    let table = Table {
        comments: String::new(),
        column_names: vec!["Time".into(), "AV".into(), "AI".into()],
        columns: vec![vec![0.0, 1.0], vec![0.1, 0.2, 0.3], vec![0.0, 0.0, 0.0]],
    };
    let descriptor = decode_path(SET_NAME).unwrap();
    assert!(matches!(
        WaveformRecord::from_table(SET_NAME, descriptor, table),
        Err(Error::LengthMismatch { .. })
    ));
}
