//! Dictionary revision: recount frequencies from the consolidated tuples and
//! report every divergence from the recorded ones.

use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use std::time::Instant;

use serde::Serialize;
use tracing::{error, info, info_span, warn};

use eicu_ingest::RecordChunks;
use eicu_model::{CodeIndex, CodeType, DictionaryEntry, Event, TUPLE_HEADER};

use crate::config::ensure_parent;
use crate::dictionary::{CodeDictionary, write_dictionary};
use crate::error::{CoreError, RevisionError};

/// Which counter diverged.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum FrequencyField {
    #[serde(rename = "total_frequency")]
    Total,
    #[serde(rename = "value_frequency")]
    Value,
}

impl FrequencyField {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Total => "total_frequency",
            Self::Value => "value_frequency",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FrequencyChange {
    pub index: CodeIndex,
    pub code: String,
    pub code_type: CodeType,
    pub field: FrequencyField,
    pub recorded: u64,
    pub recomputed: u64,
}

/// Drift between the dictionary and the encoded stream.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RevisionReport {
    pub tuples: u64,
    pub changes: Vec<FrequencyChange>,
    /// Occurrences of code indices the dictionary does not know.
    pub unknown_codes: BTreeMap<CodeIndex, u64>,
}

impl RevisionReport {
    pub fn is_clean(&self) -> bool {
        self.changes.is_empty() && self.unknown_codes.is_empty()
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Recount {
    pub total: u64,
    pub value: u64,
}

/// Counters recomputed from a tuple stream.
#[derive(Debug, Clone, Default)]
pub struct Recounts {
    pub tuples: u64,
    pub known: HashMap<CodeIndex, Recount>,
    pub unknown: BTreeMap<CodeIndex, u64>,
}

/// Streams the consolidated tuple file and recounts every dictionary code.
pub fn recount(
    dictionary: &CodeDictionary,
    tuples_path: &Path,
    chunk_rows: usize,
) -> Result<Recounts, RevisionError> {
    let mut counts = Recounts {
        known: dictionary
            .entries()
            .iter()
            .map(|entry| (entry.index, Recount::default()))
            .collect(),
        ..Recounts::default()
    };

    let mut chunks = RecordChunks::open(tuples_path, chunk_rows)?;
    let header: Vec<&str> = chunks.headers().iter().map(str::trim).collect();
    if header != TUPLE_HEADER {
        return Err(RevisionError::TupleHeader {
            path: tuples_path.to_path_buf(),
            found: header.join(","),
        });
    }

    while let Some(records) = chunks.next_chunk()? {
        for (line, record) in &records {
            let field = |idx: usize| record.get(idx).unwrap_or_default();
            let event = Event::from_fields(field(1), field(2), field(3), field(4)).map_err(
                |reason| RevisionError::MalformedTuple {
                    path: tuples_path.to_path_buf(),
                    line: *line,
                    reason,
                },
            )?;
            counts.tuples += 1;
            match counts.known.get_mut(&event.code_index) {
                Some(recount) => {
                    recount.total += 1;
                    if event.value.is_present() {
                        recount.value += 1;
                    }
                }
                None => *counts.unknown.entry(event.code_index).or_default() += 1,
            }
        }
    }
    Ok(counts)
}

/// Compares recounts with the recorded counters and returns the revised
/// entries along with the report.
pub fn diff(dictionary: &CodeDictionary, counts: &Recounts) -> (Vec<DictionaryEntry>, RevisionReport) {
    let mut report = RevisionReport {
        tuples: counts.tuples,
        unknown_codes: counts.unknown.clone(),
        ..RevisionReport::default()
    };
    let mut revised = Vec::with_capacity(dictionary.len());
    for entry in dictionary.entries() {
        let recount = counts.known.get(&entry.index).copied().unwrap_or_default();
        for (field, recorded, recomputed) in [
            (FrequencyField::Value, entry.value_frequency, recount.value),
            (FrequencyField::Total, entry.total_frequency, recount.total),
        ] {
            if recorded != recomputed {
                report.changes.push(FrequencyChange {
                    index: entry.index,
                    code: entry.code.clone(),
                    code_type: entry.code_type,
                    field,
                    recorded,
                    recomputed,
                });
            }
        }
        let mut entry = entry.clone();
        entry.value_frequency = recount.value;
        entry.total_frequency = recount.total;
        revised.push(entry);
    }
    (revised, report)
}

fn write_report(report: &RevisionReport, path: &Path) -> Result<(), CoreError> {
    ensure_parent(path)?;
    let json = serde_json::to_string_pretty(report).map_err(|e| CoreError::Report {
        path: path.to_path_buf(),
        message: e.to_string(),
    })?;
    std::fs::write(path, json).map_err(|source| CoreError::write(path, source))
}

fn log_report(report: &RevisionReport) {
    for change in &report.changes {
        warn!(
            index = change.index,
            code = %change.code,
            code_type = %change.code_type,
            field = ?change.field,
            recorded = change.recorded,
            recomputed = change.recomputed,
            "frequency changed"
        );
    }
    for (index, count) in &report.unknown_codes {
        warn!(index, count, "tuples reference a code missing from the dictionary");
    }
    if report.is_clean() {
        info!(tuples = report.tuples, "no frequency change");
    }
}

/// Paths of one revision run.
#[derive(Debug, Clone)]
pub struct RevisionPaths {
    pub dictionary: PathBuf,
    pub tuples: PathBuf,
    pub revised: PathBuf,
    pub report: PathBuf,
}

/// Recounts, writes the revised dictionary and the JSON report.
pub fn revise_dictionary(
    paths: &RevisionPaths,
    chunk_rows: usize,
) -> Result<RevisionReport, RevisionError> {
    let span = info_span!("revise", tuples = %paths.tuples.display());
    let _guard = span.enter();
    let start = Instant::now();

    let dictionary = CodeDictionary::load(&paths.dictionary).map_err(RevisionError::Dictionary)?;
    let counts = recount(&dictionary, &paths.tuples, chunk_rows)?;
    let (revised, report) = diff(&dictionary, &counts);
    log_report(&report);

    write_dictionary(&revised, &paths.revised).map_err(RevisionError::Write)?;
    write_report(&report, &paths.report).map_err(RevisionError::Write)?;
    info!(
        path = %paths.revised.display(),
        codes = revised.len(),
        changes = report.changes.len(),
        duration_ms = start.elapsed().as_millis(),
        "wrote revised dictionary"
    );
    Ok(report)
}

/// How a revision run ended when it produced a dictionary file.
#[derive(Debug)]
pub enum RevisionOutcome {
    Revised(RevisionReport),
    /// The original dictionary was copied unmodified.
    FellBack { error: RevisionError },
}

/// Like [`revise_dictionary`], but on failure copies the input dictionary to
/// the revised path so a dictionary file always exists afterwards.
pub fn revise_or_copy(
    paths: &RevisionPaths,
    chunk_rows: usize,
) -> Result<RevisionOutcome, RevisionError> {
    match revise_dictionary(paths, chunk_rows) {
        Ok(report) => Ok(RevisionOutcome::Revised(report)),
        Err(revision) => {
            let systemic = revision.is_systemic();
            if systemic {
                error!(error = %revision, "revision failed on inconsistent inputs, copying dictionary");
            } else {
                warn!(error = %revision, "revision failed, copying dictionary");
            }
            let copied = ensure_parent(&paths.revised)
                .map_err(|e| std::io::Error::other(e.to_string()))
                .and_then(|()| std::fs::copy(&paths.dictionary, &paths.revised));
            match copied {
                Ok(_) => Ok(RevisionOutcome::FellBack { error: revision }),
                Err(source) => Err(RevisionError::FallbackFailed {
                    revision: Box::new(revision),
                    path: paths.dictionary.clone(),
                    source,
                }),
            }
        }
    }
}
