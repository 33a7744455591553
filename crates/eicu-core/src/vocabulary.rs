//! Per-table vocabulary building.
//!
//! One streaming pass over a source table counts, per distinct code, its
//! occurrences and its value-bearing occurrences. The value policy depends on
//! the table's [`ValueKind`]:
//!
//! - categorical tables never carry values;
//! - numeric (lab) codes are valued only when their values vary, see
//!   [`LAB_CONSTANT_VALUE_POLICY`];
//! - rate (infusion) codes are valued as soon as one non-empty rate is seen.
//!
//! A valueless code always records a `value_frequency` of zero, which is what
//! the encoder will emit for it.

use std::collections::HashMap;
use std::path::Path;
use std::time::Instant;

use tracing::{debug, info, info_span};

use eicu_ingest::{ChunkedReader, SourceRow, TableSpec, is_absent_unit, normalize_unit};
use eicu_model::{
    CodeEntry, CodeType, EventValue, LAB_CONSTANT_VALUE_POLICY, UNKNOWN_CODE, ValueKind,
};

use crate::config::ensure_parent;
use crate::error::{CoreError, Result};

/// Unit recorded for valued rate codes.
pub const RATE_UNIT: &str = "rate";

#[derive(Debug, Default)]
struct CodeCounter {
    total: u64,
    values: u64,
    /// First numeric value seen, for the constant-value check.
    first_value: Option<f64>,
    varying: bool,
    rate_seen: bool,
    units: Vec<(String, u64)>,
}

impl CodeCounter {
    fn record_unit(&mut self, unit: String) {
        match self.units.iter_mut().find(|(seen, _)| *seen == unit) {
            Some((_, count)) => *count += 1,
            None => self.units.push((unit, 1)),
        }
    }

    /// Most frequent unit, earliest first on ties.
    fn dominant_unit(&self) -> Option<&str> {
        let mut best: Option<&(String, u64)> = None;
        for candidate in &self.units {
            if best.is_none_or(|current| candidate.1 > current.1) {
                best = Some(candidate);
            }
        }
        best.map(|(unit, _)| unit.as_str())
    }
}

/// Parses a lab result. Unparseable and NaN results count as missing.
pub fn parse_numeric_value(raw: Option<&str>) -> Option<f64> {
    raw?.trim().parse::<f64>().ok().filter(|value| !value.is_nan())
}

/// Accumulates code statistics for one table across all of its chunks.
#[derive(Debug)]
pub struct VocabularyBuilder {
    code_type: CodeType,
    source_table: String,
    counters: HashMap<String, CodeCounter>,
    first_seen: Vec<String>,
    rows: u64,
}

impl VocabularyBuilder {
    pub fn new(code_type: CodeType, source_table: impl Into<String>) -> Self {
        Self {
            code_type,
            source_table: source_table.into(),
            counters: HashMap::new(),
            first_seen: Vec::new(),
            rows: 0,
        }
    }

    pub fn for_table(spec: &TableSpec) -> Self {
        Self::new(spec.code_type, spec.name())
    }

    pub fn observe_chunk(&mut self, rows: &[SourceRow]) {
        for row in rows {
            self.observe(row);
        }
    }

    pub fn observe(&mut self, row: &SourceRow) {
        self.rows += 1;
        if !self.counters.contains_key(&row.code) {
            self.first_seen.push(row.code.clone());
            self.counters
                .insert(row.code.clone(), CodeCounter::default());
        }
        let Some(counter) = self.counters.get_mut(&row.code) else {
            return;
        };
        counter.total += 1;
        match self.code_type.value_kind() {
            ValueKind::Categorical => {}
            ValueKind::Numeric => {
                if let Some(value) = parse_numeric_value(row.value.as_deref()) {
                    counter.values += 1;
                    match counter.first_value {
                        None => counter.first_value = Some(value),
                        Some(first) if first != value => counter.varying = true,
                        Some(_) => {}
                    }
                }
                let unit = normalize_unit(row.unit.as_deref());
                if !is_absent_unit(&unit) {
                    counter.record_unit(unit);
                }
            }
            ValueKind::Rate => {
                if let Some(rate) = row.value.as_deref() {
                    counter.rate_seen = true;
                    if EventValue::rate(rate).is_present() {
                        counter.values += 1;
                    }
                }
            }
        }
    }

    /// Finalizes the entries in first-seen order and removes the `<unk>`
    /// sentinel.
    pub fn finish(self) -> Vocabulary {
        let mut counters = self.counters;
        let mut unknown_frequency = 0;
        let mut entries = Vec::with_capacity(self.first_seen.len());
        for code in self.first_seen {
            let Some(counter) = counters.remove(&code) else {
                continue;
            };
            if code == UNKNOWN_CODE {
                unknown_frequency = counter.total;
                continue;
            }
            let mut entry = CodeEntry::new(code, self.code_type);
            entry.source_table.clone_from(&self.source_table);
            entry.total_frequency = counter.total;
            match self.code_type.value_kind() {
                ValueKind::Categorical => {}
                ValueKind::Numeric => {
                    entry.with_value =
                        LAB_CONSTANT_VALUE_POLICY.with_value(counter.values, counter.varying);
                    if let Some(unit) = counter.dominant_unit() {
                        entry.unit_of_measurement = unit.to_string();
                    }
                }
                ValueKind::Rate => {
                    entry.with_value = counter.rate_seen;
                    if entry.with_value {
                        entry.unit_of_measurement = RATE_UNIT.to_string();
                    }
                }
            }
            if entry.with_value {
                entry.value_frequency = counter.values;
            }
            entries.push(entry);
        }
        entries.sort_by(|a, b| {
            (a.with_value, a.total_frequency, &a.code).cmp(&(b.with_value, b.total_frequency, &b.code))
        });
        Vocabulary {
            code_type: self.code_type,
            entries,
            unknown_frequency,
            rows: self.rows,
            skipped_rows: 0,
        }
    }
}

/// Finished vocabulary of one table, ordered by
/// `(with_value, total_frequency, code)`.
#[derive(Debug, Clone, PartialEq)]
pub struct Vocabulary {
    pub code_type: CodeType,
    pub entries: Vec<CodeEntry>,
    /// Occurrences of the `<unk>` sentinel, dropped from `entries`.
    pub unknown_frequency: u64,
    pub rows: u64,
    /// Source rows dropped because their code was empty.
    pub skipped_rows: u64,
}

impl Vocabulary {
    pub fn valued_codes(&self) -> usize {
        self.entries.iter().filter(|e| e.with_value).count()
    }
}

/// Streams a source table once and builds its vocabulary.
pub fn build_vocabulary(spec: &TableSpec, source: &Path, chunk_rows: usize) -> Result<Vocabulary> {
    let span = info_span!("vocabulary", table = spec.name());
    let _guard = span.enter();
    let start = Instant::now();

    let mut reader = ChunkedReader::open(source, spec, chunk_rows)?;
    let mut builder = VocabularyBuilder::for_table(spec);
    let chunks = reader.for_each_chunk(|chunk, rows| {
        debug!(chunk, rows = rows.len(), "counting chunk");
        builder.observe_chunk(&rows);
        Ok::<(), CoreError>(())
    })?;
    let mut vocabulary = builder.finish();
    vocabulary.skipped_rows = reader.skipped_rows();

    info!(
        path = %source.display(),
        chunks,
        rows = vocabulary.rows,
        codes = vocabulary.entries.len(),
        valued = vocabulary.valued_codes(),
        unknown_frequency = vocabulary.unknown_frequency,
        skipped_rows = vocabulary.skipped_rows,
        duration_ms = start.elapsed().as_millis(),
        "built table vocabulary"
    );
    Ok(vocabulary)
}

/// Writes a per-table `.dict` file.
pub fn write_vocabulary(vocabulary: &Vocabulary, path: &Path) -> Result<()> {
    ensure_parent(path)?;
    let mut writer = csv::Writer::from_path(path).map_err(|e| CoreError::from_csv_write(path, e))?;
    for entry in &vocabulary.entries {
        writer
            .serialize(entry)
            .map_err(|e| CoreError::from_csv_write(path, e))?;
    }
    if vocabulary.entries.is_empty() {
        writer
            .write_record(CODE_ENTRY_COLUMNS)
            .map_err(|e| CoreError::from_csv_write(path, e))?;
    }
    writer.flush().map_err(|source| CoreError::write(path, source))?;
    Ok(())
}

/// Column order of per-table `.dict` files.
pub const CODE_ENTRY_COLUMNS: [&str; 7] = [
    "code",
    "code_type",
    "value_frequency",
    "total_frequency",
    "source_table",
    "unit_of_measurement",
    "with_value",
];

#[cfg(test)]
mod tests {
    use super::*;

    fn row(code: &str, value: Option<&str>, unit: Option<&str>) -> SourceRow {
        SourceRow {
            line: 0,
            patient_id: "p1".to_string(),
            time: 0,
            code: code.to_string(),
            value: value.map(String::from),
            unit: unit.map(String::from),
        }
    }

    fn entry<'a>(vocabulary: &'a Vocabulary, code: &str) -> &'a CodeEntry {
        vocabulary
            .entries
            .iter()
            .find(|e| e.code == code)
            .expect("code present")
    }

    #[test]
    fn categorical_codes_never_carry_values() {
        let mut builder = VocabularyBuilder::new(CodeType::Diagnosis, "diagnosis");
        builder.observe(&row("sepsis", Some("3"), None));
        builder.observe(&row("sepsis", None, None));
        let vocabulary = builder.finish();
        let sepsis = entry(&vocabulary, "sepsis");
        assert_eq!(sepsis.total_frequency, 2);
        assert_eq!(sepsis.value_frequency, 0);
        assert!(!sepsis.with_value);
    }

    #[test]
    fn constant_lab_values_are_valueless() {
        let mut builder = VocabularyBuilder::new(CodeType::Lab, "lab");
        for value in ["7", "7.0", "7"] {
            builder.observe(&row("ph", Some(value), None));
        }
        builder.observe(&row("glucose", Some("5.5"), None));
        builder.observe(&row("glucose", Some("6"), None));
        builder.observe(&row("glucose", None, None));
        builder.observe(&row("glucose", Some("high"), None));
        let vocabulary = builder.finish();

        let ph = entry(&vocabulary, "ph");
        assert!(!ph.with_value);
        assert_eq!(ph.value_frequency, 0);
        assert_eq!(ph.total_frequency, 3);

        let glucose = entry(&vocabulary, "glucose");
        assert!(glucose.with_value);
        assert_eq!(glucose.value_frequency, 2);
        assert_eq!(glucose.total_frequency, 4);
    }

    #[test]
    fn lab_unit_is_most_frequent_normalized_unit() {
        let mut builder = VocabularyBuilder::new(CodeType::Lab, "lab");
        builder.observe(&row("k", Some("4"), Some("mmol/L")));
        builder.observe(&row("k", Some("5"), Some("mEq/L")));
        builder.observe(&row("k", Some("4"), Some(" MMOL/L")));
        builder.observe(&row("k", Some("4"), Some("None")));
        builder.observe(&row("na", Some("140"), Some("mEq/L")));
        builder.observe(&row("na", Some("141"), Some("mmol/L")));
        builder.observe(&row("cl", Some("100"), None));
        let vocabulary = builder.finish();
        assert_eq!(entry(&vocabulary, "k").unit_of_measurement, "mmol/l");
        assert_eq!(entry(&vocabulary, "na").unit_of_measurement, "meq/l");
        assert_eq!(entry(&vocabulary, "cl").unit_of_measurement, "");
    }

    #[test]
    fn any_rate_makes_infusion_valued() {
        let mut builder = VocabularyBuilder::new(CodeType::InfusionDrug, "infusiondrug");
        builder.observe(&row("heparin", None, None));
        builder.observe(&row("heparin", Some("10,5"), None));
        builder.observe(&row("saline", None, None));
        let vocabulary = builder.finish();

        let heparin = entry(&vocabulary, "heparin");
        assert!(heparin.with_value);
        assert_eq!(heparin.value_frequency, 1);
        assert_eq!(heparin.unit_of_measurement, RATE_UNIT);

        let saline = entry(&vocabulary, "saline");
        assert!(!saline.with_value);
        assert_eq!(saline.unit_of_measurement, "");
    }

    #[test]
    fn unknown_sentinel_is_counted_then_dropped() {
        let mut builder = VocabularyBuilder::new(CodeType::Medication, "medication");
        builder.observe(&row(UNKNOWN_CODE, None, None));
        builder.observe(&row(UNKNOWN_CODE, None, None));
        builder.observe(&row("aspirin", None, None));
        let vocabulary = builder.finish();
        assert_eq!(vocabulary.unknown_frequency, 2);
        assert_eq!(vocabulary.entries.len(), 1);
        assert_eq!(vocabulary.rows, 3);
    }

    #[test]
    fn entries_sorted_by_value_flag_then_frequency_then_code() {
        let mut builder = VocabularyBuilder::new(CodeType::Lab, "lab");
        for (code, value) in [
            ("b", Some("1")),
            ("b", Some("2")),
            ("a", None),
            ("a", None),
            ("c", None),
            ("d", None),
        ] {
            builder.observe(&row(code, value, None));
        }
        let vocabulary = builder.finish();
        let order: Vec<&str> = vocabulary.entries.iter().map(|e| e.code.as_str()).collect();
        assert_eq!(order, ["c", "d", "a", "b"]);
    }
}
