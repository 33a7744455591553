//! Patient dictionary: demographics of the patients that have records.

use std::collections::HashSet;
use std::path::Path;
use std::time::Instant;

use tracing::{info, info_span, warn};

use eicu_ingest::{RecordChunks, get_string};

use crate::config::ensure_parent;
use crate::error::{CoreError, Result};

/// Patient ids present in the consolidated tuple file.
pub fn recorded_patients(tuples_path: &Path, chunk_rows: usize) -> Result<HashSet<String>> {
    let mut chunks = RecordChunks::open(tuples_path, chunk_rows)?;
    let column = chunks.require_column("patient_id")?;
    let mut patients = HashSet::new();
    while let Some(records) = chunks.next_chunk()? {
        for (_, record) in &records {
            if let Some(id) = get_string(record, column) {
                patients.insert(id);
            }
        }
    }
    Ok(patients)
}

#[derive(Debug, Clone, PartialEq)]
pub struct PatientDictionarySummary {
    /// Patients found in the tuple file, `None` when it could not be read.
    pub recorded: Option<usize>,
    pub written: usize,
    pub duplicates: usize,
    pub columns: Vec<String>,
}

/// Inputs of [`write_patient_dictionary`].
#[derive(Debug, Clone, Copy)]
pub struct PatientDictionaryRequest<'a> {
    pub tuples_path: &'a Path,
    pub roster_path: &'a Path,
    pub id_column: &'a str,
    pub columns: &'a [String],
    pub output: &'a Path,
    pub chunk_rows: usize,
}

/// Streams the roster and writes one row per recorded patient, keeping the
/// first row of a repeated id and the requested columns the roster has. When
/// the tuple file cannot be read every roster patient is kept.
pub fn write_patient_dictionary(request: &PatientDictionaryRequest<'_>) -> Result<PatientDictionarySummary> {
    let span = info_span!("patients");
    let _guard = span.enter();
    let start = Instant::now();

    let recorded = match recorded_patients(request.tuples_path, request.chunk_rows) {
        Ok(patients) => Some(patients),
        Err(error) => {
            warn!(%error, "cannot read recorded patients, keeping every roster patient");
            None
        }
    };

    let mut roster = RecordChunks::open(request.roster_path, request.chunk_rows)?;
    let id_index = roster.require_column(request.id_column)?;
    let mut columns = vec![request.id_column.to_string()];
    let mut indices = vec![id_index];
    for column in request.columns {
        if column == request.id_column {
            continue;
        }
        match roster.column_index(column) {
            Some(index) => {
                columns.push(column.clone());
                indices.push(index);
            }
            None => warn!(column = %column, "roster has no such column, skipping"),
        }
    }

    ensure_parent(request.output)?;
    let output = request.output;
    let mut writer = csv::Writer::from_path(output).map_err(|e| CoreError::from_csv_write(output, e))?;
    writer
        .write_record(&columns)
        .map_err(|e| CoreError::from_csv_write(output, e))?;

    let mut seen = HashSet::new();
    let mut duplicates = 0;
    let mut written = 0;
    while let Some(records) = roster.next_chunk()? {
        for (_, record) in &records {
            let Some(id) = get_string(record, id_index) else {
                continue;
            };
            if recorded.as_ref().is_some_and(|ids| !ids.contains(&id)) {
                continue;
            }
            if !seen.insert(id) {
                duplicates += 1;
                continue;
            }
            let row = indices
                .iter()
                .map(|&idx| record.get(idx).unwrap_or_default().trim());
            writer
                .write_record(row)
                .map_err(|e| CoreError::from_csv_write(output, e))?;
            written += 1;
        }
    }
    writer.flush().map_err(|source| CoreError::write(output, source))?;

    if duplicates > 0 {
        warn!(duplicates, "duplicate patient ids in roster, kept first");
    }
    info!(
        path = %output.display(),
        patients = written,
        columns = columns.len(),
        duration_ms = start.elapsed().as_millis(),
        "wrote patient dictionary"
    );
    Ok(PatientDictionarySummary {
        recorded: recorded.map(|ids| ids.len()),
        written,
        duplicates,
        columns,
    })
}
