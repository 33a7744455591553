//! Pipeline stages driven by a [`PipelineConfig`].
//!
//! Each stage reads only persisted artifacts of earlier stages, so stages can
//! run as separate invocations.

use std::collections::BTreeMap;
use std::path::PathBuf;

use tracing::info;

use eicu_ingest::PatientRoster;
use eicu_model::CodeType;

use crate::config::{PipelineConfig, ensure_dir};
use crate::dictionary::{CodeDictionary, MergedDictionary, merge_dictionary_files};
use crate::encoder::{EncodeSummary, encode_table};
use crate::error::{Result, RevisionError};
use crate::merge::{MergeSummary, merge_partials};
use crate::patients::{PatientDictionaryRequest, PatientDictionarySummary, write_patient_dictionary};
use crate::revise::{RevisionOutcome, RevisionPaths, revise_or_copy};
use crate::stats::{FrequencyStats, stats_by_type};
use crate::vocabulary::{Vocabulary, build_vocabulary, write_vocabulary};

/// A table vocabulary written to its `.dict` file.
#[derive(Debug, Clone)]
pub struct TableVocabulary {
    pub path: PathBuf,
    pub vocabulary: Vocabulary,
    pub stats: BTreeMap<CodeType, FrequencyStats>,
}

/// Stage 1: one vocabulary file per configured table.
pub fn build_vocabularies(config: &PipelineConfig) -> Result<Vec<TableVocabulary>> {
    ensure_dir(&config.index_dir())?;
    let mut built = Vec::with_capacity(config.tables.len());
    for spec in &config.tables {
        let vocabulary = build_vocabulary(spec, &spec.source_path(&config.source_dir), config.chunk_rows)?;
        let path = config.table_dictionary_path(spec);
        write_vocabulary(&vocabulary, &path)?;
        let stats = stats_by_type(&vocabulary.entries);
        built.push(TableVocabulary {
            path,
            vocabulary,
            stats,
        });
    }
    Ok(built)
}

/// Stage 2: the global dictionary.
pub fn build_dictionary(config: &PipelineConfig) -> Result<MergedDictionary> {
    merge_dictionary_files(&config.index_dir(), &config.dictionary_path())
}

/// Stage 3: partial tuple files for every configured table.
pub fn encode_tables(config: &PipelineConfig) -> Result<Vec<EncodeSummary>> {
    let dictionary = CodeDictionary::load(&config.dictionary_path())?;
    let roster = PatientRoster::load(&config.roster_path(), &config.roster_id_column, config.chunk_rows)?;
    let tuple_dir = config.tuple_dir();
    ensure_dir(&tuple_dir)?;
    info!(codes = dictionary.len(), patients = roster.len(), "encoding tables");

    config
        .tables
        .iter()
        .map(|spec| {
            encode_table(
                spec,
                &spec.source_path(&config.source_dir),
                &dictionary,
                &roster,
                &tuple_dir,
                config.chunk_rows,
            )
        })
        .collect()
}

/// Stage 4: the consolidated tuple file, `None` when nothing was encoded.
pub fn merge_tuples(config: &PipelineConfig) -> Result<Option<MergeSummary>> {
    merge_partials(&config.tuple_dir(), &config.tuples_path())
}

pub fn revision_paths(config: &PipelineConfig) -> RevisionPaths {
    RevisionPaths {
        dictionary: config.dictionary_path(),
        tuples: config.tuples_path(),
        revised: config.revised_dictionary_path(),
        report: config.revision_report_path(),
    }
}

/// Stage 5: the revised dictionary, falling back to a copy.
pub fn revise(config: &PipelineConfig) -> std::result::Result<RevisionOutcome, RevisionError> {
    revise_or_copy(&revision_paths(config), config.chunk_rows)
}

/// Stage 6: the patient dictionary.
pub fn build_patient_dictionary(config: &PipelineConfig) -> Result<PatientDictionarySummary> {
    let tuples_path = config.tuples_path();
    let roster_path = config.roster_path();
    let output = config.patients_dict_path();
    write_patient_dictionary(&PatientDictionaryRequest {
        tuples_path: &tuples_path,
        roster_path: &roster_path,
        id_column: &config.roster_id_column,
        columns: &config.patient_columns,
        output: &output,
        chunk_rows: config.chunk_rows,
    })
}
