//! The global code dictionary: merging per-table vocabularies, persisting
//! and loading it.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use tracing::{debug, info, warn};

use eicu_ingest::{IngestError, list_files_with_extension};
use eicu_model::{CodeEntry, CodeIndex, CodeType, DictionaryEntry, parse_flag};

use crate::config::ensure_parent;
use crate::error::{CoreError, Result};
use crate::stats::DictionaryStats;

/// Extension of per-table vocabulary files.
pub const TABLE_DICTIONARY_EXTENSION: &str = "dict";

fn header_index(headers: &csv::StringRecord, name: &str) -> Option<usize> {
    headers
        .iter()
        .position(|h| h.trim().trim_matches('\u{feff}') == name)
}

fn require_header(headers: &csv::StringRecord, name: &str, path: &Path) -> Result<usize> {
    header_index(headers, name).ok_or_else(|| {
        CoreError::Ingest(IngestError::MissingColumn {
            column: name.to_string(),
            path: path.to_path_buf(),
        })
    })
}

/// Reads dictionary rows with their optional `index` column.
fn read_dictionary_rows(path: &Path) -> Result<Vec<(Option<CodeIndex>, CodeEntry)>> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .from_path(path)
        .map_err(|e| CoreError::from_csv_read(path, e))?;
    let headers = reader
        .headers()
        .map_err(|e| CoreError::from_csv_read(path, e))?
        .clone();

    let idx_index = header_index(&headers, "index");
    let idx_code = require_header(&headers, "code", path)?;
    let idx_type = require_header(&headers, "code_type", path)?;
    let idx_value = require_header(&headers, "value_frequency", path)?;
    let idx_total = require_header(&headers, "total_frequency", path)?;
    let idx_table = require_header(&headers, "source_table", path)?;
    let idx_unit = header_index(&headers, "unit_of_measurement");
    let idx_flag = require_header(&headers, "with_value", path)?;

    let mut rows = Vec::new();
    for row in reader.records() {
        let row = row.map_err(|e| CoreError::from_csv_read(path, e))?;
        let line = row.position().map_or(0, csv::Position::line);
        let invalid = |reason: String| CoreError::InvalidDictionary {
            path: path.to_path_buf(),
            line,
            reason,
        };
        let field = |idx: usize| row.get(idx).unwrap_or_default();
        let count = |idx: usize, name: &str| {
            field(idx)
                .trim()
                .parse::<u64>()
                .map_err(|_| invalid(format!("{name} '{}' is not a count", field(idx))))
        };

        let code = field(idx_code);
        if code.trim().is_empty() {
            return Err(invalid("empty code".to_string()));
        }
        let index = match idx_index {
            Some(idx) => Some(
                field(idx)
                    .trim()
                    .parse::<CodeIndex>()
                    .map_err(|_| invalid(format!("index '{}' is not a code index", field(idx))))?,
            ),
            None => None,
        };
        let entry = CodeEntry {
            code: code.to_string(),
            code_type: field(idx_type)
                .parse::<CodeType>()
                .map_err(|e| invalid(e.to_string()))?,
            value_frequency: count(idx_value, "value_frequency")?,
            total_frequency: count(idx_total, "total_frequency")?,
            source_table: field(idx_table).trim().to_string(),
            unit_of_measurement: idx_unit.map(|idx| field(idx).trim().to_string()).unwrap_or_default(),
            with_value: parse_flag(field(idx_flag)).map_err(|e| invalid(e.to_string()))?,
        };
        rows.push((index, entry));
    }
    Ok(rows)
}

/// Reads a per-table `.dict` file.
pub fn read_code_entries(path: &Path) -> Result<Vec<CodeEntry>> {
    Ok(read_dictionary_rows(path)?
        .into_iter()
        .map(|(_, entry)| entry)
        .collect())
}

/// Assigns dense 1-based indices after a stable sort by
/// `(code_type, with_value, total_frequency)`.
pub fn merge_entries(mut entries: Vec<CodeEntry>) -> Vec<DictionaryEntry> {
    entries.sort_by_key(CodeEntry::merge_key);
    entries
        .into_iter()
        .zip(1..)
        .map(|(entry, index)| DictionaryEntry::from_entry(index, entry))
        .collect()
}

/// Result of merging the per-table files.
#[derive(Debug, Clone)]
pub struct MergedDictionary {
    pub sources: Vec<PathBuf>,
    pub dictionary: CodeDictionary,
    pub stats: DictionaryStats,
}

/// Concatenates every `*.dict` file in `index_dir` (file name order), merges
/// them and writes the global dictionary to `output`.
pub fn merge_dictionary_files(index_dir: &Path, output: &Path) -> Result<MergedDictionary> {
    let sources = list_files_with_extension(index_dir, TABLE_DICTIONARY_EXTENSION)?;
    if sources.is_empty() {
        return Err(CoreError::NoDictionaryFiles {
            path: index_dir.to_path_buf(),
        });
    }

    let mut entries = Vec::new();
    for source in &sources {
        let table = read_code_entries(source)?;
        debug!(path = %source.display(), codes = table.len(), "read table dictionary");
        entries.extend(table);
    }

    let dictionary = CodeDictionary::from_entries(merge_entries(entries));
    dictionary.write(output)?;
    let stats = DictionaryStats::from_entries(dictionary.entries());
    if stats.valued.is_none() {
        warn!("no valued codes in the merged dictionary");
    }
    info!(
        path = %output.display(),
        files = sources.len(),
        codes = dictionary.len(),
        "merged code dictionary"
    );
    Ok(MergedDictionary {
        sources,
        dictionary,
        stats,
    })
}

/// Where a code lives in the global dictionary.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CodeSlot {
    pub index: CodeIndex,
    pub with_value: bool,
}

/// Immutable snapshot of the global dictionary keyed by index.
#[derive(Debug, Clone, Default)]
pub struct CodeDictionary {
    entries: Vec<DictionaryEntry>,
    positions: HashMap<CodeIndex, usize>,
}

impl CodeDictionary {
    /// Entries are expected to carry distinct indices.
    pub fn from_entries(entries: Vec<DictionaryEntry>) -> Self {
        let positions = entries
            .iter()
            .enumerate()
            .map(|(position, entry)| (entry.index, position))
            .collect();
        Self { entries, positions }
    }

    /// Loads a dictionary file. Without an `index` column, rows are numbered
    /// from 1 in file order.
    pub fn load(path: &Path) -> Result<Self> {
        let rows = read_dictionary_rows(path)?;
        let mut entries = Vec::with_capacity(rows.len());
        let mut positions = HashMap::with_capacity(rows.len());
        for ((index, entry), row_number) in rows.into_iter().zip(1..) {
            let index = index.unwrap_or(row_number);
            if positions.insert(index, entries.len()).is_some() {
                return Err(CoreError::DuplicateIndex {
                    path: path.to_path_buf(),
                    index,
                });
            }
            entries.push(DictionaryEntry::from_entry(index, entry));
        }
        debug!(path = %path.display(), codes = entries.len(), "loaded code dictionary");
        Ok(Self { entries, positions })
    }

    pub fn write(&self, path: &Path) -> Result<()> {
        write_dictionary(&self.entries, path)
    }

    pub fn entries(&self) -> &[DictionaryEntry] {
        &self.entries
    }

    pub fn get(&self, index: CodeIndex) -> Option<&DictionaryEntry> {
        self.positions
            .get(&index)
            .and_then(|&position| self.entries.get(position))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// `code -> slot` lookup restricted to one source table.
    pub fn table_lookup(&self, source_table: &str) -> HashMap<String, CodeSlot> {
        self.entries
            .iter()
            .filter(|entry| entry.source_table == source_table)
            .map(|entry| {
                (
                    entry.code.clone(),
                    CodeSlot {
                        index: entry.index,
                        with_value: entry.with_value,
                    },
                )
            })
            .collect()
    }
}

/// Column order of the global dictionary file.
pub const DICTIONARY_COLUMNS: [&str; 8] = [
    "index",
    "code",
    "code_type",
    "value_frequency",
    "total_frequency",
    "source_table",
    "unit_of_measurement",
    "with_value",
];

/// Writes dictionary entries with their `index` column.
pub fn write_dictionary(entries: &[DictionaryEntry], path: &Path) -> Result<()> {
    ensure_parent(path)?;
    let mut writer = csv::Writer::from_path(path).map_err(|e| CoreError::from_csv_write(path, e))?;
    if entries.is_empty() {
        writer
            .write_record(DICTIONARY_COLUMNS)
            .map_err(|e| CoreError::from_csv_write(path, e))?;
    }
    for entry in entries {
        writer
            .serialize(entry)
            .map_err(|e| CoreError::from_csv_write(path, e))?;
    }
    writer.flush().map_err(|source| CoreError::write(path, source))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn code(code: &str, code_type: CodeType, total: u64, with_value: bool) -> CodeEntry {
        let mut entry = CodeEntry::new(code, code_type);
        entry.total_frequency = total;
        entry.with_value = with_value;
        entry
    }

    #[test]
    fn merge_orders_by_type_flag_and_frequency() {
        let merged = merge_entries(vec![
            code("glucose", CodeType::Lab, 9, true),
            code("sepsis", CodeType::Diagnosis, 4, false),
            code("ph", CodeType::Lab, 2, false),
            code("heparin", CodeType::InfusionDrug, 1, true),
            code("aki", CodeType::Diagnosis, 2, false),
        ]);
        let order: Vec<(CodeIndex, &str)> = merged
            .iter()
            .map(|e| (e.index, e.code.as_str()))
            .collect();
        assert_eq!(
            order,
            [
                (1, "aki"),
                (2, "sepsis"),
                (3, "heparin"),
                (4, "ph"),
                (5, "glucose")
            ]
        );
    }

    #[test]
    fn lookup_is_scoped_to_source_table() {
        let mut drug = code("heparin", CodeType::Medication, 3, false);
        drug.source_table = "medication".to_string();
        let mut infusion = code("heparin", CodeType::InfusionDrug, 3, true);
        infusion.source_table = "infusiondrug".to_string();
        let dictionary = CodeDictionary::from_entries(merge_entries(vec![drug, infusion]));

        let lookup = dictionary.table_lookup("medication");
        assert_eq!(lookup.len(), 1);
        let slot = lookup["heparin"];
        assert!(!slot.with_value);
        assert_eq!(
            dictionary.get(slot.index).map(|e| e.code_type),
            Some(CodeType::Medication)
        );
    }
}
