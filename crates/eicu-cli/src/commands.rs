use std::path::PathBuf;
use std::time::Instant;

use anyhow::{Context, Result};
use tracing::{info, info_span};

use eicu_core::pipeline::{self, TableVocabulary};
use eicu_core::{
    EncodeSummary, MergeSummary, MergedDictionary, PatientDictionarySummary, PipelineConfig,
};

use crate::types::{RevisionResult, RunResult};

/// Command line values layered over the config file.
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    pub config: Option<PathBuf>,
    pub source_dir: Option<PathBuf>,
    pub output_dir: Option<PathBuf>,
    pub chunk_rows: Option<usize>,
}

/// Load the config file (or defaults) and apply the overrides on top.
pub fn resolve_config(overrides: &ConfigOverrides) -> Result<PipelineConfig> {
    let mut config = match &overrides.config {
        Some(path) => PipelineConfig::load(path)
            .with_context(|| format!("load config {}", path.display()))?,
        None => PipelineConfig::default(),
    };
    if let Some(dir) = &overrides.source_dir {
        config = config.with_source_dir(dir.clone());
    }
    if let Some(dir) = &overrides.output_dir {
        config = config.with_output_dir(dir.clone());
    }
    if let Some(rows) = overrides.chunk_rows {
        anyhow::ensure!(rows > 0, "--chunk-rows must be at least 1");
        config = config.with_chunk_rows(rows);
    }
    Ok(config)
}

pub fn run_vocabulary(config: &PipelineConfig) -> Result<Vec<TableVocabulary>> {
    pipeline::build_vocabularies(config).context("build table vocabularies")
}

pub fn run_dictionary(config: &PipelineConfig) -> Result<MergedDictionary> {
    pipeline::build_dictionary(config).context("merge code dictionary")
}

pub fn run_encode(config: &PipelineConfig) -> Result<Vec<EncodeSummary>> {
    pipeline::encode_tables(config).context("encode tables")
}

pub fn run_merge(config: &PipelineConfig) -> Result<Option<MergeSummary>> {
    pipeline::merge_tuples(config).context("merge tuple files")
}

/// Fallbacks are returned as outcomes; only a failed fallback copy is an error.
pub fn run_revise(config: &PipelineConfig) -> Result<RevisionResult> {
    let outcome = pipeline::revise(config).context("revise code dictionary")?;
    Ok(RevisionResult {
        paths: pipeline::revision_paths(config),
        outcome,
    })
}

pub fn run_patients(config: &PipelineConfig) -> Result<PatientDictionarySummary> {
    pipeline::build_patient_dictionary(config).context("write patient dictionary")
}

/// Every stage in order against one configuration.
pub fn run_pipeline(config: &PipelineConfig, fail_on_drift: bool) -> Result<RunResult> {
    let run_span = info_span!("run", output_dir = %config.output_dir.display());
    let _run_guard = run_span.enter();
    let start = Instant::now();

    // =========================================================================
    // Stage 1: Vocabulary per table
    // =========================================================================
    let vocabularies = run_vocabulary(config)?;

    // =========================================================================
    // Stage 2: Global dictionary
    // =========================================================================
    let dictionary = run_dictionary(config)?;

    // =========================================================================
    // Stage 3: Encode tables into partial files
    // =========================================================================
    let encoded = run_encode(config)?;

    // =========================================================================
    // Stage 4: Consolidated tuple file
    // =========================================================================
    let merged = run_merge(config)?;

    // =========================================================================
    // Stage 5: Revise dictionary against the tuples
    // =========================================================================
    let revision = run_revise(config)?;

    // =========================================================================
    // Stage 6: Patient dictionary
    // =========================================================================
    let patients = run_patients(config)?;

    let has_errors = revision.is_failure(fail_on_drift);
    info!(
        tables = vocabularies.len(),
        codes = dictionary.dictionary.len(),
        tuples = merged.as_ref().map_or(0, |summary| summary.tuples),
        has_errors,
        duration_ms = start.elapsed().as_millis(),
        "pipeline complete"
    );

    Ok(RunResult {
        output_dir: config.output_dir.clone(),
        vocabularies,
        dictionary,
        encoded,
        merged,
        revision,
        patients,
        has_errors,
    })
}
