//! Pipeline configuration.
//!
//! Every field has a default, so an empty TOML file (or no file at all)
//! describes the standard eICU layout:
//!
//! ```text
//! eicu/                      source tables and patient.csv
//! records/index/             per-table *.dict files and code_dict.csv
//! records/tuple/             partial *.tri files
//! records/tuples.csv         consolidated tuples
//! records/code_dict_revised.csv
//! records/patients_dict.csv
//! ```

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use eicu_ingest::{DEFAULT_CHUNK_ROWS, PATIENT_ID_COLUMN, TableSpec};

use crate::error::{CoreError, Result};

/// Demographic columns copied from the roster into the patient dictionary.
pub const DEFAULT_PATIENT_COLUMNS: [&str; 17] = [
    "patientunitstayid",
    "gender",
    "age",
    "ethnicity",
    "hospitaladmittime24",
    "hospitaladmitoffset",
    "hospitaladmitsource",
    "hospitaldischargestatus",
    "unittype",
    "unitadmittime24",
    "unitadmitsource",
    "unitstaytype",
    "admissionweight",
    "unitdischargetime24",
    "unitdischargeoffset",
    "unitdischargelocation",
    "unitdischargestatus",
];

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PipelineConfig {
    /// Directory holding the raw eICU tables.
    pub source_dir: PathBuf,
    /// Root of every artifact the pipeline writes.
    pub output_dir: PathBuf,
    pub tuple_dir: Option<PathBuf>,
    pub index_dir: Option<PathBuf>,
    pub dictionary_path: Option<PathBuf>,
    pub tuples_path: Option<PathBuf>,
    pub revised_dictionary_path: Option<PathBuf>,
    pub patients_dict_path: Option<PathBuf>,
    /// Roster file name inside `source_dir`.
    pub roster: String,
    pub roster_id_column: String,
    /// Row cap of every chunked scan.
    pub chunk_rows: usize,
    pub tables: Vec<TableSpec>,
    pub patient_columns: Vec<String>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            source_dir: PathBuf::from("eicu"),
            output_dir: PathBuf::from("records"),
            tuple_dir: None,
            index_dir: None,
            dictionary_path: None,
            tuples_path: None,
            revised_dictionary_path: None,
            patients_dict_path: None,
            roster: "patient.csv".to_string(),
            roster_id_column: PATIENT_ID_COLUMN.to_string(),
            chunk_rows: DEFAULT_CHUNK_ROWS,
            tables: TableSpec::eicu_defaults(),
            patient_columns: DEFAULT_PATIENT_COLUMNS.map(String::from).to_vec(),
        }
    }
}

impl PipelineConfig {
    /// Loads a TOML configuration file.
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path).map_err(|source| CoreError::FileRead {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml(&text).map_err(|message| CoreError::Config {
            path: path.to_path_buf(),
            message,
        })
    }

    pub fn from_toml(text: &str) -> std::result::Result<Self, String> {
        let config: Self = toml::from_str(text).map_err(|e| e.to_string())?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> std::result::Result<(), String> {
        if self.chunk_rows == 0 {
            return Err("chunk_rows must be at least 1".to_string());
        }
        for (position, spec) in self.tables.iter().enumerate() {
            if self.tables[..position]
                .iter()
                .any(|other| other.code_type == spec.code_type)
            {
                return Err(format!("table {} is configured twice", spec.code_type));
            }
        }
        Ok(())
    }

    pub fn with_source_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.source_dir = dir.into();
        self
    }

    pub fn with_output_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.output_dir = dir.into();
        self
    }

    pub fn with_chunk_rows(mut self, rows: usize) -> Self {
        self.chunk_rows = rows.max(1);
        self
    }

    pub fn tuple_dir(&self) -> PathBuf {
        self.tuple_dir
            .clone()
            .unwrap_or_else(|| self.output_dir.join("tuple"))
    }

    pub fn index_dir(&self) -> PathBuf {
        self.index_dir
            .clone()
            .unwrap_or_else(|| self.output_dir.join("index"))
    }

    pub fn dictionary_path(&self) -> PathBuf {
        self.dictionary_path
            .clone()
            .unwrap_or_else(|| self.index_dir().join("code_dict.csv"))
    }

    pub fn tuples_path(&self) -> PathBuf {
        self.tuples_path
            .clone()
            .unwrap_or_else(|| self.output_dir.join("tuples.csv"))
    }

    pub fn revised_dictionary_path(&self) -> PathBuf {
        self.revised_dictionary_path
            .clone()
            .unwrap_or_else(|| self.output_dir.join("code_dict_revised.csv"))
    }

    /// JSON drift report written next to the revised dictionary.
    pub fn revision_report_path(&self) -> PathBuf {
        self.revised_dictionary_path().with_extension("json")
    }

    pub fn patients_dict_path(&self) -> PathBuf {
        self.patients_dict_path
            .clone()
            .unwrap_or_else(|| self.output_dir.join("patients_dict.csv"))
    }

    pub fn roster_path(&self) -> PathBuf {
        self.source_dir.join(&self.roster)
    }

    /// Per-table vocabulary file, `<index>/<table>_dict.dict`.
    pub fn table_dictionary_path(&self, spec: &TableSpec) -> PathBuf {
        self.index_dir().join(format!("{}_dict.dict", spec.name()))
    }
}

/// Creates `dir` and its parents if missing.
pub fn ensure_dir(dir: &Path) -> Result<()> {
    std::fs::create_dir_all(dir).map_err(|source| CoreError::CreateDir {
        path: dir.to_path_buf(),
        source,
    })
}

/// Creates the parent directory of a file about to be written.
pub fn ensure_parent(path: &Path) -> Result<()> {
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => ensure_dir(parent),
        _ => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_file_yields_standard_layout() {
        let config = PipelineConfig::from_toml("").expect("parse");
        assert_eq!(config, PipelineConfig::default());
        assert_eq!(
            config.dictionary_path(),
            Path::new("records/index/code_dict.csv")
        );
        assert_eq!(config.tuple_dir(), Path::new("records/tuple"));
        assert_eq!(
            config.revision_report_path(),
            Path::new("records/code_dict_revised.json")
        );
        assert_eq!(config.roster_path(), Path::new("eicu/patient.csv"));
        assert_eq!(config.chunk_rows, 30_000_000);
    }

    #[test]
    fn overrides_and_tables_parse() {
        let text = r#"
output_dir = "out"
chunk_rows = 1000

[[tables]]
code_type = "eicu_lab"
file_name = "lab_small.csv"
patient_column = "patientunitstayid"
time_column = "labresultoffset"
code_column = "labname"
value_column = "labresult"
chunked = true
"#;
        let config = PipelineConfig::from_toml(text).expect("parse");
        assert_eq!(config.chunk_rows, 1000);
        assert_eq!(config.tables.len(), 1);
        assert_eq!(config.tables[0].unit_column, None);
        assert_eq!(
            config.table_dictionary_path(&config.tables[0]),
            Path::new("out/index/lab_dict.dict")
        );
    }

    #[test]
    fn rejects_unknown_keys_and_zero_chunks() {
        assert!(PipelineConfig::from_toml("chunk_size = 5").is_err());
        assert!(PipelineConfig::from_toml("chunk_rows = 0").is_err());
    }

    #[test]
    fn rejects_duplicate_tables() {
        let table = r#"
[[tables]]
code_type = "eicu_lab"
file_name = "lab.csv"
patient_column = "patientunitstayid"
time_column = "labresultoffset"
code_column = "labname"
"#;
        let err = PipelineConfig::from_toml(&table.repeat(2)).expect_err("duplicate");
        assert!(err.contains("eicu_lab"), "{err}");
    }
}
