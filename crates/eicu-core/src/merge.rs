//! Consolidation of partial tuple files into one patient-ordered file.

use std::collections::BTreeMap;
use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::time::Instant;

use sha2::{Digest, Sha256};
use tracing::{debug, info, info_span, warn};

use eicu_ingest::list_files_with_extension;
use eicu_model::{Event, EventTuple, PatientId, TUPLE_HEADER};

use crate::config::ensure_parent;
use crate::error::{CoreError, Result};
use crate::partial::{BlockReader, PARTIAL_EXTENSION};

/// Writer that hashes everything passing through it.
struct HashingWriter<W> {
    inner: W,
    hasher: Sha256,
}

impl<W: Write> Write for HashingWriter<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let written = self.inner.write(buf)?;
        self.hasher.update(&buf[..written]);
        Ok(written)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner.flush()
    }
}

/// Outcome of a merge that produced a file.
#[derive(Debug, Clone, PartialEq)]
pub struct MergeSummary {
    pub output: PathBuf,
    pub files: usize,
    pub patients: usize,
    pub tuples: u64,
    /// Hex SHA-256 of the consolidated file.
    pub sha256: String,
}

/// All events per patient, ordered by patient id.
pub type PatientEvents = BTreeMap<PatientId, Vec<Event>>;

/// Accumulates the blocks of every file in order.
pub fn collect_partials(files: &[PathBuf]) -> Result<PatientEvents> {
    let mut patients = PatientEvents::new();
    for path in files {
        let mut blocks = 0usize;
        for block in BlockReader::open(path)? {
            let block = block?;
            blocks += 1;
            patients
                .entry(block.patient_id)
                .or_default()
                .extend(block.events);
        }
        debug!(path = %path.display(), blocks, "read partial file");
    }
    Ok(patients)
}

/// Sorts each patient's events by time (stable) and writes the consolidated
/// file. Patients without events are omitted.
pub fn write_consolidated(patients: PatientEvents, output: &Path) -> Result<(usize, u64, String)> {
    ensure_parent(output)?;
    let file = File::create(output).map_err(|source| CoreError::write(output, source))?;
    let hashing = HashingWriter {
        inner: BufWriter::new(file),
        hasher: Sha256::new(),
    };
    let mut writer = csv::Writer::from_writer(hashing);
    writer
        .write_record(TUPLE_HEADER)
        .map_err(|e| CoreError::from_csv_write(output, e))?;

    let mut written_patients = 0;
    let mut tuples = 0u64;
    for (patient_id, mut events) in patients {
        if events.is_empty() {
            continue;
        }
        events.sort_by_key(|event| event.time);
        written_patients += 1;
        for event in events {
            let tuple = EventTuple {
                patient_id: patient_id.clone(),
                event,
            };
            writer
                .write_record(tuple.to_record())
                .map_err(|e| CoreError::from_csv_write(output, e))?;
            tuples += 1;
        }
    }

    let mut hashing = writer
        .into_inner()
        .map_err(|e| CoreError::write(output, e.into_error()))?;
    hashing
        .flush()
        .map_err(|source| CoreError::write(output, source))?;
    let digest = hex::encode(hashing.hasher.finalize());
    Ok((written_patients, tuples, digest))
}

/// Merges every `*.tri` file in `tuple_dir` into `output`.
///
/// Returns `Ok(None)` without touching `output` when there is nothing to
/// merge.
pub fn merge_partials(tuple_dir: &Path, output: &Path) -> Result<Option<MergeSummary>> {
    let span = info_span!("merge", dir = %tuple_dir.display());
    let _guard = span.enter();
    let start = Instant::now();

    let mut files = if tuple_dir.is_dir() {
        list_files_with_extension(tuple_dir, PARTIAL_EXTENSION)?
    } else {
        Vec::new()
    };
    files.sort_by(|a, b| {
        partial_order_key(a)
            .cmp(&partial_order_key(b))
            .then_with(|| a.cmp(b))
    });
    if files.is_empty() {
        warn!(dir = %tuple_dir.display(), "no partial tuple files, skipping merge");
        return Ok(None);
    }

    let patients = collect_partials(&files)?;
    let (written_patients, tuples, sha256) = write_consolidated(patients, output)?;

    info!(
        path = %output.display(),
        files = files.len(),
        patients = written_patients,
        tuples,
        sha256 = %sha256,
        duration_ms = start.elapsed().as_millis(),
        "merged tuples"
    );
    Ok(Some(MergeSummary {
        output: output.to_path_buf(),
        files: files.len(),
        patients: written_patients,
        tuples,
        sha256,
    }))
}

/// Orders `lab.tri`, `lab2.tri`, `lab10.tri` by table, then chunk number.
fn partial_order_key(path: &Path) -> (String, Option<u64>) {
    let stem = path
        .file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
        .unwrap_or_default();
    let table = stem.trim_end_matches(|c: char| c.is_ascii_digit());
    let chunk = stem[table.len()..].parse::<u64>().ok();
    (table.to_string(), chunk)
}

/// Hex SHA-256 of a file's contents.
pub fn file_sha256(path: &Path) -> Result<String> {
    let mut file = File::open(path).map_err(|source| CoreError::FileRead {
        path: path.to_path_buf(),
        source,
    })?;
    let mut hasher = Sha256::new();
    io::copy(&mut file, &mut hasher).map_err(|source| CoreError::FileRead {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(hex::encode(hasher.finalize()))
}
