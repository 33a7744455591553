//! Column layout of the eICU source tables.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use eicu_model::CodeType;

/// Named columns the pipeline reads from one source table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableSpec {
    pub code_type: CodeType,
    /// File name inside the source directory.
    pub file_name: String,
    pub patient_column: String,
    pub time_column: String,
    pub code_column: String,
    /// Lab result or infusion rate.
    #[serde(default)]
    pub value_column: Option<String>,
    #[serde(default)]
    pub unit_column: Option<String>,
    /// Encode chunk by chunk into one partial file per chunk. Otherwise the
    /// table is grouped as a whole into a single partial file.
    #[serde(default)]
    pub chunked: bool,
}

impl TableSpec {
    pub fn name(&self) -> &'static str {
        self.code_type.table_name()
    }

    pub fn source_path(&self, source_dir: &Path) -> PathBuf {
        source_dir.join(&self.file_name)
    }

    pub fn diagnosis() -> Self {
        Self {
            code_type: CodeType::Diagnosis,
            file_name: "diagnosis.csv".to_string(),
            patient_column: PATIENT_ID_COLUMN.to_string(),
            time_column: "diagnosisoffset".to_string(),
            code_column: "diagnosisstring".to_string(),
            value_column: None,
            unit_column: None,
            chunked: false,
        }
    }

    pub fn lab() -> Self {
        Self {
            code_type: CodeType::Lab,
            file_name: "lab.csv".to_string(),
            patient_column: PATIENT_ID_COLUMN.to_string(),
            time_column: "labresultoffset".to_string(),
            code_column: "labname".to_string(),
            value_column: Some("labresult".to_string()),
            unit_column: Some("labmeasurenamesystem".to_string()),
            chunked: true,
        }
    }

    pub fn medication() -> Self {
        Self {
            code_type: CodeType::Medication,
            file_name: "medication.csv".to_string(),
            patient_column: PATIENT_ID_COLUMN.to_string(),
            time_column: "drugstartoffset".to_string(),
            code_column: "drugname".to_string(),
            value_column: None,
            unit_column: None,
            chunked: false,
        }
    }

    pub fn infusion_drug() -> Self {
        Self {
            code_type: CodeType::InfusionDrug,
            file_name: "infusiondrug.csv".to_string(),
            patient_column: PATIENT_ID_COLUMN.to_string(),
            time_column: "infusionoffset".to_string(),
            code_column: "drugname".to_string(),
            value_column: Some("infusionrate".to_string()),
            unit_column: None,
            chunked: true,
        }
    }

    /// The four eICU event tables in processing order.
    pub fn eicu_defaults() -> Vec<TableSpec> {
        vec![
            Self::diagnosis(),
            Self::lab(),
            Self::medication(),
            Self::infusion_drug(),
        ]
    }
}

/// Patient identifier column shared by every eICU table.
pub const PATIENT_ID_COLUMN: &str = "patientunitstayid";
