use std::path::PathBuf;

use eicu_core::pipeline::TableVocabulary;
use eicu_core::{
    EncodeSummary, MergeSummary, MergedDictionary, PatientDictionarySummary, RevisionOutcome,
    RevisionPaths,
};

/// Result of the revision stage together with where it wrote.
#[derive(Debug)]
pub struct RevisionResult {
    pub paths: RevisionPaths,
    pub outcome: RevisionOutcome,
}

impl RevisionResult {
    /// Whether the outcome should fail the invocation.
    pub fn is_failure(&self, fail_on_drift: bool) -> bool {
        match &self.outcome {
            RevisionOutcome::Revised(report) => fail_on_drift && !report.is_clean(),
            RevisionOutcome::FellBack { error } => error.is_systemic(),
        }
    }
}

#[derive(Debug)]
pub struct RunResult {
    pub output_dir: PathBuf,
    pub vocabularies: Vec<TableVocabulary>,
    pub dictionary: MergedDictionary,
    pub encoded: Vec<EncodeSummary>,
    /// `None` when there were no partial files to merge.
    pub merged: Option<MergeSummary>,
    pub revision: RevisionResult,
    pub patients: PatientDictionarySummary,
    pub has_errors: bool,
}
