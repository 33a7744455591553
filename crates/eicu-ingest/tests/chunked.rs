//! Tests for chunked source table scans.

use std::fs;
use std::path::PathBuf;

use eicu_ingest::{ChunkedReader, IngestError, SourceRow, TableSpec};
use tempfile::TempDir;

fn write_table(dir: &TempDir, name: &str, contents: &str) -> PathBuf {
    let path = dir.path().join(name);
    fs::write(&path, contents).expect("write table");
    path
}

const LAB: &str = "\
labid,patientunitstayid,labresultoffset,labname,labresult,labmeasurenamesystem
1,141765,10,glucose,5.5,mg/dL
2,141765,-3,glucose,,mg/dL
3,141766,20,,1.0,
4,141766,25,sodium,140,mmol/L
";

#[test]
fn projects_rows_onto_table_columns() {
    let dir = TempDir::new().expect("temp dir");
    let path = write_table(&dir, "lab.csv", LAB);
    let mut reader = ChunkedReader::open(&path, &TableSpec::lab(), 100).expect("open");
    let rows = reader.next_chunk().expect("read").expect("chunk");
    assert_eq!(rows.len(), 3);
    assert_eq!(
        rows[0],
        SourceRow {
            line: 2,
            patient_id: "141765".to_string(),
            time: 10,
            code: "glucose".to_string(),
            value: Some("5.5".to_string()),
            unit: Some("mg/dL".to_string()),
        }
    );
    assert_eq!(rows[1].time, -3);
    assert_eq!(rows[1].value, None);
    assert_eq!(reader.skipped_rows(), 1);
    assert!(reader.next_chunk().expect("end").is_none());
}

#[test]
fn splits_table_into_bounded_chunks() {
    let dir = TempDir::new().expect("temp dir");
    let path = write_table(&dir, "lab.csv", LAB);
    let mut reader = ChunkedReader::open(&path, &TableSpec::lab(), 2).expect("open");
    let mut sizes = Vec::new();
    let chunks = reader
        .for_each_chunk(|index, rows| {
            sizes.push((index, rows.len()));
            Ok::<(), IngestError>(())
        })
        .expect("scan");
    assert_eq!(chunks, 2);
    // The second chunk lost its empty-code row.
    assert_eq!(sizes, vec![(0, 2), (1, 1)]);
    assert_eq!(reader.skipped_rows(), 1);
}

#[test]
fn missing_column_fails_at_open() {
    let dir = TempDir::new().expect("temp dir");
    let path = write_table(
        &dir,
        "diagnosis.csv",
        "patientunitstayid,diagnosisoffset\n1,5\n",
    );
    let err = ChunkedReader::open(&path, &TableSpec::diagnosis(), 10)
        .err()
        .expect("missing column");
    match err {
        IngestError::MissingColumn { column, .. } => assert_eq!(column, "diagnosisstring"),
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn unparseable_offset_is_an_invalid_field() {
    let dir = TempDir::new().expect("temp dir");
    let path = write_table(
        &dir,
        "medication.csv",
        "patientunitstayid,drugstartoffset,drugname\n1,5,aspirin\n1,later,heparin\n",
    );
    let mut reader = ChunkedReader::open(&path, &TableSpec::medication(), 10).expect("open");
    let err = reader.next_chunk().expect_err("bad offset");
    match err {
        IngestError::InvalidField {
            line,
            column,
            value,
            ..
        } => {
            assert_eq!(line, 3);
            assert_eq!(column, "drugstartoffset");
            assert_eq!(value, "later");
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn missing_file_is_reported() {
    let dir = TempDir::new().expect("temp dir");
    let err = ChunkedReader::open(&dir.path().join("lab.csv"), &TableSpec::lab(), 10)
        .err()
        .expect("missing file");
    assert!(matches!(err, IngestError::FileNotFound { .. }));
}
