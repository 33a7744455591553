//! Command-level runs against a tiny eICU-shaped corpus.

use std::fs;
use std::path::{Path, PathBuf};

use eicu_cli::commands::{
    ConfigOverrides, resolve_config, run_dictionary, run_encode, run_merge, run_pipeline,
    run_revise, run_vocabulary,
};
use eicu_core::{PipelineConfig, RevisionOutcome};
use tempfile::TempDir;

const PATIENTS: &str = "\
patientunitstayid,gender,age
101,Male,65
102,Female,70
103,Male,50
";

const DIAGNOSIS: &str = "\
diagnosisid,patientunitstayid,diagnosisoffset,diagnosisstring
1,101,10,code_A
2,101,5,code_B
3,102,7,code_A
";

const LAB: &str = "\
labid,patientunitstayid,labresultoffset,labname,labresult,labmeasurenamesystem
1,101,30,glucose,5.5,mg/dL
2,102,-5,glucose,6.1,mg/dL
";

const MEDICATION: &str = "\
medicationid,patientunitstayid,drugstartoffset,drugname
1,103,0,aspirin
";

const INFUSION: &str = "\
infusiondrugid,patientunitstayid,infusionoffset,drugname,infusionrate
1,101,15,heparin,\"10,5\"
";

fn write_corpus(root: &Path, diagnosis: &str) -> PathBuf {
    let source = root.join("eicu");
    fs::create_dir_all(&source).expect("create source dir");
    for (name, contents) in [
        ("patient.csv", PATIENTS),
        ("diagnosis.csv", diagnosis),
        ("lab.csv", LAB),
        ("medication.csv", MEDICATION),
        ("infusiondrug.csv", INFUSION),
    ] {
        fs::write(source.join(name), contents).expect("write table");
    }
    source
}

fn config_for(root: &Path, diagnosis: &str) -> PipelineConfig {
    let source = write_corpus(root, diagnosis);
    resolve_config(&ConfigOverrides {
        source_dir: Some(source),
        output_dir: Some(root.join("records")),
        chunk_rows: Some(2),
        ..ConfigOverrides::default()
    })
    .expect("resolve config")
}

#[test]
fn overrides_replace_config_file_values() {
    let dir = TempDir::new().expect("temp dir");
    let path = dir.path().join("pipeline.toml");
    fs::write(
        &path,
        "source_dir = \"raw\"\noutput_dir = \"out\"\nchunk_rows = 10\n",
    )
    .expect("write config");

    let from_file = resolve_config(&ConfigOverrides {
        config: Some(path.clone()),
        ..ConfigOverrides::default()
    })
    .expect("file config");
    assert_eq!(from_file.source_dir, PathBuf::from("raw"));
    assert_eq!(from_file.chunk_rows, 10);

    let overridden = resolve_config(&ConfigOverrides {
        config: Some(path),
        output_dir: Some(PathBuf::from("elsewhere")),
        chunk_rows: Some(3),
        ..ConfigOverrides::default()
    })
    .expect("overridden config");
    assert_eq!(overridden.source_dir, PathBuf::from("raw"));
    assert_eq!(overridden.output_dir, PathBuf::from("elsewhere"));
    assert_eq!(overridden.chunk_rows, 3);
}

#[test]
fn zero_chunk_rows_is_rejected() {
    let result = resolve_config(&ConfigOverrides {
        chunk_rows: Some(0),
        ..ConfigOverrides::default()
    });
    assert!(result.is_err());
}

#[test]
fn missing_config_file_names_the_path() {
    let dir = TempDir::new().expect("temp dir");
    let path = dir.path().join("absent.toml");
    let error = resolve_config(&ConfigOverrides {
        config: Some(path),
        ..ConfigOverrides::default()
    })
    .expect_err("missing config");
    assert!(format!("{error:#}").contains("absent.toml"));
}

#[test]
fn full_run_is_clean() {
    let dir = TempDir::new().expect("temp dir");
    let config = config_for(dir.path(), DIAGNOSIS);

    let result = run_pipeline(&config, true).expect("pipeline");
    assert!(!result.has_errors);
    assert_eq!(result.vocabularies.len(), 4);
    let merged = result.merged.expect("tuples written");
    assert_eq!(merged.tuples, 7);
    assert_eq!(merged.patients, 3);
    match &result.revision.outcome {
        RevisionOutcome::Revised(report) => assert!(report.is_clean()),
        RevisionOutcome::FellBack { error } => panic!("unexpected fallback: {error}"),
    }
    assert_eq!(result.patients.written, 3);
    assert!(config.revised_dictionary_path().exists());
    assert!(config.patients_dict_path().exists());
}

#[test]
fn drift_fails_only_when_requested() {
    let dir = TempDir::new().expect("temp dir");
    let diagnosis = format!("{DIAGNOSIS}4,999,1,code_B\n");
    let config = config_for(dir.path(), &diagnosis);

    let lenient = run_pipeline(&config, false).expect("lenient run");
    assert!(!lenient.has_errors);
    assert!(!lenient.revision.is_failure(false));

    let strict = run_pipeline(&config, true).expect("strict run");
    assert!(strict.has_errors);
}

#[test]
fn stages_run_as_separate_invocations() {
    let dir = TempDir::new().expect("temp dir");
    let config = config_for(dir.path(), DIAGNOSIS);

    run_vocabulary(&config).expect("vocabulary");
    let merged = run_dictionary(&config).expect("dictionary");
    assert_eq!(merged.sources.len(), 4);
    let encoded = run_encode(&config).expect("encode");
    assert_eq!(encoded.iter().map(|summary| summary.encoded).sum::<u64>(), 7);
    assert!(run_merge(&config).expect("merge").is_some());
    let revision = run_revise(&config).expect("revise");
    assert!(!revision.is_failure(true));
}

#[test]
fn encode_without_dictionary_reports_context() {
    let dir = TempDir::new().expect("temp dir");
    let config = config_for(dir.path(), DIAGNOSIS);
    let error = run_encode(&config).expect_err("no dictionary yet");
    assert!(format!("{error:#}").starts_with("encode tables"));
}

#[test]
fn inconsistent_tuple_file_is_a_failure() {
    let dir = TempDir::new().expect("temp dir");
    let config = config_for(dir.path(), DIAGNOSIS);
    run_pipeline(&config, false).expect("pipeline");

    fs::write(config.tuples_path(), "patient,time\n101,5\n").expect("corrupt tuples");
    let revision = run_revise(&config).expect("fallback copy");
    match &revision.outcome {
        RevisionOutcome::FellBack { error } => assert!(error.is_systemic()),
        RevisionOutcome::Revised(_) => panic!("expected fallback"),
    }
    assert!(revision.is_failure(false));
    assert_eq!(
        fs::read(config.revised_dictionary_path()).expect("revised"),
        fs::read(config.dictionary_path()).expect("dictionary")
    );
}
