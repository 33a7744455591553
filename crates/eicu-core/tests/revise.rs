//! Dictionary revision against hand-written tuple files.

use std::fs;
use std::path::Path;

use eicu_core::{
    CodeDictionary, FrequencyField, RevisionError, RevisionOutcome, RevisionPaths,
    revise_dictionary, revise_or_copy,
};
use tempfile::TempDir;

const DICTIONARY: &str = "\
index,code,code_type,value_frequency,total_frequency,source_table,unit_of_measurement,with_value
1,sepsis,eicu_diagnosis,0,2,diagnosis,,0
2,heparin,eicu_infusiondrug,1,2,infusiondrug,rate,1
3,glucose,eicu_lab,2,3,lab,mg/dl,1
";

fn paths(root: &Path) -> RevisionPaths {
    RevisionPaths {
        dictionary: root.join("index/code_dict.csv"),
        tuples: root.join("tuples.csv"),
        revised: root.join("code_dict_revised.csv"),
        report: root.join("code_dict_revised.json"),
    }
}

fn setup(dictionary: &str, tuples: Option<&str>) -> (TempDir, RevisionPaths) {
    let dir = TempDir::new().expect("temp dir");
    let paths = paths(dir.path());
    fs::create_dir_all(dir.path().join("index")).expect("index dir");
    fs::write(&paths.dictionary, dictionary).expect("write dictionary");
    if let Some(tuples) = tuples {
        fs::write(&paths.tuples, tuples).expect("write tuples");
    }
    (dir, paths)
}

#[test]
fn counts_values_after_reversing_rate_substitution() {
    let tuples = "\
patient_id,admission_id,time,code,value
1,,0,1,NaN
1,,5,2,10/5
1,,6,3,5.5
2,,1,1,NaN
2,,2,2,NaN
2,,3,3,_MISSING
2,,4,3,6
";
    let (_dir, paths) = setup(DICTIONARY, Some(tuples));
    let report = revise_dictionary(&paths, 3).expect("revise");
    assert!(report.is_clean(), "{report:?}");
    assert_eq!(report.tuples, 7);
}

#[test]
fn reports_drift_in_both_directions() {
    let tuples = "\
patient_id,admission_id,time,code,value
1,,0,1,NaN
1,,1,1,NaN
1,,2,1,NaN
1,,5,2,10/5
1,,6,3,5.5
1,,7,3,6
1,,8,3,7
";
    let (_dir, paths) = setup(DICTIONARY, Some(tuples));
    let report = revise_dictionary(&paths, 100).expect("revise");

    let changes: Vec<(u32, FrequencyField, u64, u64)> = report
        .changes
        .iter()
        .map(|c| (c.index, c.field, c.recorded, c.recomputed))
        .collect();
    assert_eq!(
        changes,
        [
            (1, FrequencyField::Total, 2, 3),
            (2, FrequencyField::Total, 2, 1),
            (3, FrequencyField::Value, 2, 3),
        ]
    );

    let revised = CodeDictionary::load(&paths.revised).expect("revised");
    let sepsis = revised.get(1).expect("sepsis");
    assert_eq!(sepsis.total_frequency, 3);
    let glucose = revised.get(3).expect("glucose");
    assert_eq!((glucose.value_frequency, glucose.total_frequency), (3, 3));
    assert_eq!(glucose.unit_of_measurement, "mg/dl");

    let json: serde_json::Value =
        serde_json::from_str(&fs::read_to_string(&paths.report).expect("read report"))
            .expect("parse report");
    assert_eq!(json["changes"][0]["field"], "total_frequency");
    assert_eq!(json["changes"][0]["code"], "sepsis");
}

#[test]
fn unknown_code_indices_are_reported_separately() {
    let tuples = "\
patient_id,admission_id,time,code,value
1,,0,1,NaN
1,,0,1,NaN
1,,1,2,10/5
1,,1,2,NaN
1,,2,3,5
1,,3,3,6
1,,4,3,_MISSING
1,,9,42,NaN
1,,9,42,NaN
";
    let (_dir, paths) = setup(DICTIONARY, Some(tuples));
    let report = revise_dictionary(&paths, 4).expect("revise");
    assert!(report.changes.is_empty(), "{:?}", report.changes);
    assert_eq!(report.unknown_codes.get(&42), Some(&2));
    assert!(!report.is_clean());
}

#[test]
fn dictionary_without_index_column_is_numbered_by_row() {
    let dictionary = "\
code,code_type,value_frequency,total_frequency,source_table,unit_of_measurement,with_value
sepsis,eicu_diagnosis,0,1,diagnosis,,0
aki,eicu_diagnosis,0,1,diagnosis,,0
";
    let tuples = "patient_id,admission_id,time,code,value\n1,,0,1,NaN\n1,,1,2,NaN\n";
    let (_dir, paths) = setup(dictionary, Some(tuples));
    let report = revise_dictionary(&paths, 10).expect("revise");
    assert!(report.is_clean(), "{report:?}");
    let revised = CodeDictionary::load(&paths.revised).expect("revised");
    assert_eq!(revised.get(2).map(|e| e.code.as_str()), Some("aki"));
}

#[test]
fn missing_tuple_file_falls_back_as_transient() {
    let (_dir, paths) = setup(DICTIONARY, None);
    match revise_or_copy(&paths, 10).expect("fallback copy") {
        RevisionOutcome::FellBack { error } => assert!(!error.is_systemic(), "{error}"),
        RevisionOutcome::Revised(report) => panic!("unexpected revision: {report:?}"),
    }
    assert_eq!(
        fs::read_to_string(&paths.revised).expect("copied"),
        DICTIONARY
    );
}

#[test]
fn wrong_tuple_header_falls_back_as_systemic() {
    let (_dir, paths) = setup(DICTIONARY, Some("pid,time,code\n1,0,1\n"));
    match revise_or_copy(&paths, 10).expect("fallback copy") {
        RevisionOutcome::FellBack { error } => {
            assert!(matches!(error, RevisionError::TupleHeader { .. }), "{error}");
            assert!(error.is_systemic());
        }
        RevisionOutcome::Revised(report) => panic!("unexpected revision: {report:?}"),
    }
    assert!(paths.revised.is_file());
}

#[test]
fn malformed_tuple_is_systemic() {
    let tuples = "patient_id,admission_id,time,code,value\n1,,later,1,NaN\n";
    let (_dir, paths) = setup(DICTIONARY, Some(tuples));
    let err = revise_dictionary(&paths, 10).expect_err("malformed");
    match &err {
        RevisionError::MalformedTuple { line, .. } => assert_eq!(*line, 2),
        other => panic!("unexpected error: {other}"),
    }
    assert!(err.is_systemic());
}

#[test]
fn failed_fallback_returns_both_errors() {
    let dir = TempDir::new().expect("temp dir");
    let paths = paths(dir.path());
    let err = revise_or_copy(&paths, 10).expect_err("nothing to copy");
    match err {
        RevisionError::FallbackFailed { revision, .. } => {
            assert!(matches!(*revision, RevisionError::Dictionary(_)));
        }
        other => panic!("unexpected error: {other}"),
    }
    assert!(!paths.revised.exists());
}
