//! Bounded-size chunked scans over delimited source tables.
//!
//! A scan never holds more than `chunk_rows` records at once. The header is
//! validated when the reader is opened, so a schema mismatch fails before any
//! row is consumed.

use std::fs::File;
use std::path::{Path, PathBuf};

use csv::{ReaderBuilder, StringRecord};
use tracing::debug;

use crate::error::{IngestError, Result};
use crate::schema::TableSpec;

/// Default chunk row cap.
pub const DEFAULT_CHUNK_ROWS: usize = 30_000_000;

/// Raw records read in chunks, each tagged with its 1-based line number.
pub struct RecordChunks {
    path: PathBuf,
    reader: csv::Reader<File>,
    headers: StringRecord,
    chunk_rows: usize,
    exhausted: bool,
}

impl RecordChunks {
    pub fn open(path: &Path, chunk_rows: usize) -> Result<Self> {
        if !path.is_file() {
            return Err(IngestError::FileNotFound {
                path: path.to_path_buf(),
            });
        }
        let mut reader = ReaderBuilder::new()
            .has_headers(true)
            .from_path(path)
            .map_err(|e| IngestError::from_csv(path, e))?;
        let headers = reader
            .headers()
            .map_err(|e| IngestError::from_csv(path, e))?
            .clone();
        Ok(Self {
            path: path.to_path_buf(),
            reader,
            headers,
            chunk_rows: chunk_rows.max(1),
            exhausted: false,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn headers(&self) -> &StringRecord {
        &self.headers
    }

    /// Position of a named column, ignoring surrounding whitespace and BOM.
    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.headers
            .iter()
            .position(|header| header.trim().trim_matches('\u{feff}') == name)
    }

    pub fn require_column(&self, name: &str) -> Result<usize> {
        self.column_index(name)
            .ok_or_else(|| IngestError::MissingColumn {
                column: name.to_string(),
                path: self.path.clone(),
            })
    }

    /// Reads up to `chunk_rows` records. `None` once the file is exhausted.
    pub fn next_chunk(&mut self) -> Result<Option<Vec<(u64, StringRecord)>>> {
        if self.exhausted {
            return Ok(None);
        }
        let mut chunk = Vec::new();
        let mut record = StringRecord::new();
        while chunk.len() < self.chunk_rows {
            let more = self
                .reader
                .read_record(&mut record)
                .map_err(|e| IngestError::from_csv(&self.path, e))?;
            if !more {
                self.exhausted = true;
                break;
            }
            let line = record.position().map_or(0, csv::Position::line);
            chunk.push((line, record.clone()));
        }
        if chunk.is_empty() {
            return Ok(None);
        }
        Ok(Some(chunk))
    }
}

/// Returns a trimmed non-empty field.
pub fn get_string(record: &StringRecord, index: usize) -> Option<String> {
    record
        .get(index)
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(String::from)
}

/// One event row of a source table, projected onto the table's configured columns.
#[derive(Debug, Clone, PartialEq)]
pub struct SourceRow {
    pub line: u64,
    pub patient_id: String,
    pub time: i64,
    pub code: String,
    pub value: Option<String>,
    pub unit: Option<String>,
}

#[derive(Debug, Clone, Copy)]
struct Columns {
    patient: usize,
    time: usize,
    code: usize,
    value: Option<usize>,
    unit: Option<usize>,
}

/// Chunked scan of one source table yielding [`SourceRow`]s.
pub struct ChunkedReader {
    records: RecordChunks,
    spec: TableSpec,
    columns: Columns,
    skipped: u64,
}

impl ChunkedReader {
    pub fn open(path: &Path, spec: &TableSpec, chunk_rows: usize) -> Result<Self> {
        let records = RecordChunks::open(path, chunk_rows)?;
        let optional = |name: &Option<String>| -> Result<Option<usize>> {
            name.as_deref()
                .map(|column| records.require_column(column))
                .transpose()
        };
        let columns = Columns {
            patient: records.require_column(&spec.patient_column)?,
            time: records.require_column(&spec.time_column)?,
            code: records.require_column(&spec.code_column)?,
            value: optional(&spec.value_column)?,
            unit: optional(&spec.unit_column)?,
        };
        Ok(Self {
            records,
            spec: spec.clone(),
            columns,
            skipped: 0,
        })
    }

    pub fn path(&self) -> &Path {
        self.records.path()
    }

    /// Rows dropped so far because their code was empty.
    pub fn skipped_rows(&self) -> u64 {
        self.skipped
    }

    pub fn next_chunk(&mut self) -> Result<Option<Vec<SourceRow>>> {
        let Some(records) = self.records.next_chunk()? else {
            return Ok(None);
        };
        let mut rows = Vec::with_capacity(records.len());
        for (line, record) in &records {
            let code = record.get(self.columns.code).unwrap_or_default();
            if code.trim().is_empty() {
                self.skipped += 1;
                continue;
            }
            rows.push(SourceRow {
                line: *line,
                patient_id: record
                    .get(self.columns.patient)
                    .unwrap_or_default()
                    .trim()
                    .to_string(),
                time: self.parse_time(*line, record)?,
                code: code.to_string(),
                value: self.columns.value.and_then(|idx| get_string(record, idx)),
                unit: self.columns.unit.and_then(|idx| get_string(record, idx)),
            });
        }
        Ok(Some(rows))
    }

    /// Feeds every chunk to `handle` with its 0-based position, returning the
    /// number of chunks read.
    pub fn for_each_chunk<E, F>(&mut self, mut handle: F) -> std::result::Result<usize, E>
    where
        E: From<IngestError>,
        F: FnMut(usize, Vec<SourceRow>) -> std::result::Result<(), E>,
    {
        let mut chunks = 0;
        while let Some(rows) = self.next_chunk()? {
            debug!(
                table = self.spec.name(),
                chunk = chunks,
                rows = rows.len(),
                "read chunk"
            );
            handle(chunks, rows)?;
            chunks += 1;
        }
        if self.skipped > 0 {
            debug!(
                table = self.spec.name(),
                skipped = self.skipped,
                "skipped rows with an empty code"
            );
        }
        Ok(chunks)
    }

    fn parse_time(&self, line: u64, record: &StringRecord) -> Result<i64> {
        let raw = record.get(self.columns.time).unwrap_or_default().trim();
        raw.parse::<i64>().map_err(|_| IngestError::InvalidField {
            path: self.records.path().to_path_buf(),
            line,
            column: self.spec.time_column.clone(),
            value: raw.to_string(),
        })
    }
}
