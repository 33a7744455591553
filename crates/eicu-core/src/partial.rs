//! Block-structured partial tuple files (`*.tri`).
//!
//! ```text
//! file   = { blank } { block }
//! block  = header { tuple } blank { blank }
//! header = patient id, a line without commas
//! tuple  = admission_id "," time "," code "," value
//! blank  = an empty or whitespace-only line
//! ```
//!
//! Lines are trimmed before they are interpreted. The final block may end at
//! end of file without a trailing blank line.

use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use eicu_model::{Event, PatientId};

use crate::config::ensure_parent;
use crate::error::{CoreError, Result};

/// Extension of partial tuple files.
pub const PARTIAL_EXTENSION: &str = "tri";

/// One patient's events as stored in a partial file.
#[derive(Debug, Clone, PartialEq)]
pub struct Block {
    pub patient_id: PatientId,
    pub events: Vec<Event>,
}

/// Writes blocks in the given order. Blocks without events are skipped.
pub fn write_blocks(path: &Path, blocks: &[Block]) -> Result<usize> {
    ensure_parent(path)?;
    let file = File::create(path).map_err(|source| CoreError::write(path, source))?;
    let mut out = BufWriter::new(file);
    let mut written = 0;
    for block in blocks.iter().filter(|block| !block.events.is_empty()) {
        writeln!(out, "{}", block.patient_id).map_err(|source| CoreError::write(path, source))?;
        for event in &block.events {
            writeln!(out, "{}", event.to_line()).map_err(|source| CoreError::write(path, source))?;
        }
        writeln!(out).map_err(|source| CoreError::write(path, source))?;
        written += 1;
    }
    out.flush().map_err(|source| CoreError::write(path, source))?;
    Ok(written)
}

/// Streaming reader yielding one [`Block`] at a time.
pub struct BlockReader<R> {
    path: PathBuf,
    lines: std::io::Lines<R>,
    line: u64,
}

impl BlockReader<BufReader<File>> {
    pub fn open(path: &Path) -> Result<Self> {
        let file = File::open(path).map_err(|source| CoreError::FileRead {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(Self::new(path, BufReader::new(file)))
    }
}

impl<R: BufRead> BlockReader<R> {
    pub fn new(path: &Path, reader: R) -> Self {
        Self {
            path: path.to_path_buf(),
            lines: reader.lines(),
            line: 0,
        }
    }

    fn next_line(&mut self) -> Result<Option<String>> {
        match self.lines.next() {
            None => Ok(None),
            Some(Ok(line)) => {
                self.line += 1;
                Ok(Some(line.trim().to_string()))
            }
            Some(Err(source)) => Err(CoreError::FileRead {
                path: self.path.clone(),
                source,
            }),
        }
    }

    fn malformed(&self, reason: impl Into<String>) -> CoreError {
        CoreError::MalformedPartial {
            path: self.path.clone(),
            line: self.line,
            reason: reason.into(),
        }
    }

    fn read_block(&mut self) -> Result<Option<Block>> {
        let header = loop {
            match self.next_line()? {
                None => return Ok(None),
                Some(line) if line.is_empty() => continue,
                Some(line) => break line,
            }
        };
        if header.contains(',') {
            return Err(self.malformed("tuple line without a patient header"));
        }
        let patient_id = PatientId::new(header).map_err(|e| self.malformed(e.to_string()))?;

        let mut events = Vec::new();
        while let Some(line) = self.next_line()? {
            if line.is_empty() {
                break;
            }
            let event = Event::parse_line(&line).map_err(|e| self.malformed(e.to_string()))?;
            events.push(event);
        }
        Ok(Some(Block { patient_id, events }))
    }
}

impl<R: BufRead> Iterator for BlockReader<R> {
    type Item = Result<Block>;

    fn next(&mut self) -> Option<Self::Item> {
        self.read_block().transpose()
    }
}
