//! Event encoding: raw rows to patient-keyed tuples in the shared code space.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Instant;

use tracing::{debug, info, info_span};

use eicu_ingest::{ChunkedReader, PatientRoster, SourceRow, TableSpec};
use eicu_model::{Event, EventValue, ValueKind};

use crate::dictionary::{CodeDictionary, CodeSlot};
use crate::error::{CoreError, Result};
use crate::partial::{Block, PARTIAL_EXTENSION, write_blocks};
use crate::vocabulary::parse_numeric_value;

/// Value field for one occurrence of a code.
///
/// Valueless codes always encode `NaN`. Valued lab codes encode the number or
/// `_MISSING`; valued rate codes encode the substituted rate or `NaN`.
pub fn encode_value(kind: ValueKind, slot: CodeSlot, raw: Option<&str>) -> EventValue {
    if !slot.with_value {
        return EventValue::None;
    }
    match kind {
        ValueKind::Categorical => EventValue::None,
        ValueKind::Numeric => parse_numeric_value(raw).map_or(EventValue::Missing, EventValue::Number),
        ValueKind::Rate => raw.map_or(EventValue::None, EventValue::rate),
    }
}

/// Per-patient event lists for one unit of output, seeded with an empty list
/// for every roster patient.
#[derive(Debug)]
pub struct PatientBuffer<'r> {
    roster: &'r PatientRoster,
    events: Vec<Vec<Event>>,
}

impl<'r> PatientBuffer<'r> {
    pub fn seeded(roster: &'r PatientRoster) -> Self {
        Self {
            roster,
            events: vec![Vec::new(); roster.len()],
        }
    }

    /// Appends an event. Returns false when the patient is not on the roster.
    pub fn push(&mut self, patient_id: &str, event: Event) -> bool {
        match self.roster.position(patient_id) {
            Some(position) => {
                self.events[position].push(event);
                true
            }
            None => false,
        }
    }

    /// Non-empty records in roster order.
    pub fn into_blocks(self) -> Vec<Block> {
        self.roster
            .ids()
            .iter()
            .zip(self.events)
            .filter(|(_, events)| !events.is_empty())
            .map(|(patient_id, events)| Block {
                patient_id: patient_id.clone(),
                events,
            })
            .collect()
    }
}

/// Counters of one table's encoding run.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EncodeSummary {
    pub table: String,
    pub chunks: usize,
    pub rows: u64,
    pub encoded: u64,
    pub unknown_codes: u64,
    pub unknown_patients: u64,
    /// Source rows dropped because their code was empty.
    pub skipped_rows: u64,
    pub patients_written: usize,
    pub files: Vec<PathBuf>,
}

/// Encodes one table against a dictionary snapshot.
pub struct TableEncoder<'a> {
    spec: &'a TableSpec,
    roster: &'a PatientRoster,
    lookup: HashMap<String, CodeSlot>,
    summary: EncodeSummary,
}

impl<'a> TableEncoder<'a> {
    pub fn new(spec: &'a TableSpec, dictionary: &CodeDictionary, roster: &'a PatientRoster) -> Self {
        Self {
            spec,
            roster,
            lookup: dictionary.table_lookup(spec.name()),
            summary: EncodeSummary {
                table: spec.name().to_string(),
                ..EncodeSummary::default()
            },
        }
    }

    /// Encodes rows into `buffer`, dropping unknown codes and patients.
    pub fn encode_rows(&mut self, rows: &[SourceRow], buffer: &mut PatientBuffer<'_>) {
        let kind = self.spec.code_type.value_kind();
        for row in rows {
            self.summary.rows += 1;
            let Some(&slot) = self.lookup.get(&row.code) else {
                self.summary.unknown_codes += 1;
                continue;
            };
            let event = Event::new(row.time, slot.index, encode_value(kind, slot, row.value.as_deref()));
            if buffer.push(&row.patient_id, event) {
                self.summary.encoded += 1;
            } else {
                self.summary.unknown_patients += 1;
            }
        }
    }

    fn flush(&mut self, buffer: PatientBuffer<'_>, path: PathBuf) -> Result<()> {
        let blocks = buffer.into_blocks();
        let written = write_blocks(&path, &blocks)?;
        debug!(path = %path.display(), patients = written, "wrote partial file");
        self.summary.patients_written += written;
        self.summary.files.push(path);
        Ok(())
    }

    /// Streams the source table and writes its partial files into `tuple_dir`:
    /// `<table><chunk>.tri` per chunk for chunked tables, else `<table>.tri`.
    pub fn run(mut self, source: &Path, tuple_dir: &Path, chunk_rows: usize) -> Result<EncodeSummary> {
        let mut reader = ChunkedReader::open(source, self.spec, chunk_rows)?;
        remove_partials(tuple_dir, self.spec.name())?;
        let name = self.spec.name();

        if self.spec.chunked {
            let roster = self.roster;
            let chunks = reader.for_each_chunk(|chunk, rows| {
                let mut buffer = PatientBuffer::seeded(roster);
                self.encode_rows(&rows, &mut buffer);
                let path = tuple_dir.join(format!("{name}{chunk}.{PARTIAL_EXTENSION}"));
                self.flush(buffer, path)
            })?;
            self.summary.chunks = chunks;
        } else {
            let mut buffer = PatientBuffer::seeded(self.roster);
            let chunks = reader.for_each_chunk(|_, rows| {
                self.encode_rows(&rows, &mut buffer);
                Ok::<(), CoreError>(())
            })?;
            self.summary.chunks = chunks;
            let path = tuple_dir.join(format!("{name}.{PARTIAL_EXTENSION}"));
            self.flush(buffer, path)?;
        }
        self.summary.skipped_rows = reader.skipped_rows();
        Ok(self.summary)
    }
}

/// Deletes partial files left by an earlier run of the same table
/// (`<table>.tri` and `<table><digits>.tri`).
fn remove_partials(tuple_dir: &Path, table: &str) -> Result<()> {
    if !tuple_dir.is_dir() {
        return Ok(());
    }
    for path in eicu_ingest::list_files_with_extension(tuple_dir, PARTIAL_EXTENSION)? {
        let Some(stem) = path.file_stem().and_then(|stem| stem.to_str()) else {
            continue;
        };
        let belongs = stem
            .strip_prefix(table)
            .is_some_and(|rest| rest.chars().all(|c| c.is_ascii_digit()));
        if belongs {
            std::fs::remove_file(&path).map_err(|source| CoreError::write(&path, source))?;
        }
    }
    Ok(())
}

/// Encodes one table, logging its summary.
pub fn encode_table(
    spec: &TableSpec,
    source: &Path,
    dictionary: &CodeDictionary,
    roster: &PatientRoster,
    tuple_dir: &Path,
    chunk_rows: usize,
) -> Result<EncodeSummary> {
    let span = info_span!("encode", table = spec.name());
    let _guard = span.enter();
    let start = Instant::now();

    let summary = TableEncoder::new(spec, dictionary, roster).run(source, tuple_dir, chunk_rows)?;

    info!(
        chunks = summary.chunks,
        rows = summary.rows,
        encoded = summary.encoded,
        unknown_codes = summary.unknown_codes,
        unknown_patients = summary.unknown_patients,
        skipped_rows = summary.skipped_rows,
        files = summary.files.len(),
        duration_ms = start.elapsed().as_millis(),
        "encoded table"
    );
    Ok(summary)
}
