//! Code vocabulary types shared by every pipeline stage.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::ids::CodeIndex;
use crate::ModelError;

/// Source-table category a code belongs to.
///
/// The derived ordering follows the serialized names, so sorting by
/// `CodeType` sorts `eicu_diagnosis < eicu_infusiondrug < eicu_lab <
/// eicu_medication`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum CodeType {
    #[serde(rename = "eicu_diagnosis")]
    Diagnosis,
    #[serde(rename = "eicu_infusiondrug")]
    InfusionDrug,
    #[serde(rename = "eicu_lab")]
    Lab,
    #[serde(rename = "eicu_medication")]
    Medication,
}

impl CodeType {
    pub const ALL: [CodeType; 4] = [
        CodeType::Diagnosis,
        CodeType::InfusionDrug,
        CodeType::Lab,
        CodeType::Medication,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            CodeType::Diagnosis => "eicu_diagnosis",
            CodeType::InfusionDrug => "eicu_infusiondrug",
            CodeType::Lab => "eicu_lab",
            CodeType::Medication => "eicu_medication",
        }
    }

    /// Short table name used for file names (`lab`, `infusiondrug`, ...).
    pub fn table_name(self) -> &'static str {
        match self {
            CodeType::Diagnosis => "diagnosis",
            CodeType::InfusionDrug => "infusiondrug",
            CodeType::Lab => "lab",
            CodeType::Medication => "medication",
        }
    }

    pub fn value_kind(self) -> ValueKind {
        match self {
            CodeType::Diagnosis | CodeType::Medication => ValueKind::Categorical,
            CodeType::Lab => ValueKind::Numeric,
            CodeType::InfusionDrug => ValueKind::Rate,
        }
    }
}

impl fmt::Display for CodeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CodeType {
    type Err = ModelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        CodeType::ALL
            .into_iter()
            .find(|kind| {
                kind.as_str().eq_ignore_ascii_case(trimmed)
                    || kind.table_name().eq_ignore_ascii_case(trimmed)
            })
            .ok_or_else(|| ModelError::UnknownCodeType(s.to_string()))
    }
}

/// How a table's codes carry values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ValueKind {
    /// Occurrence only, never a value.
    Categorical,
    /// Numeric result, valued only when it varies.
    Numeric,
    /// Free-form rate string, valued whenever one is present.
    Rate,
}

/// Lab codes whose observed values never vary.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConstantValuePolicy {
    /// A code seen with a single constant value is treated as valueless.
    Valueless,
    /// A code seen with any value is valued.
    Valued,
}

/// Policy applied by the vocabulary builder to lab codes.
pub const LAB_CONSTANT_VALUE_POLICY: ConstantValuePolicy = ConstantValuePolicy::Valueless;

impl ConstantValuePolicy {
    /// Decides `with_value` for a numeric code from its value statistics.
    pub fn with_value(self, value_count: u64, varying: bool) -> bool {
        match self {
            ConstantValuePolicy::Valueless => value_count > 0 && varying,
            ConstantValuePolicy::Valued => value_count > 0,
        }
    }
}

/// Aggregated vocabulary entry for one `(code, code_type)` pair.
///
/// Field order is the column order of the per-table dictionary files.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CodeEntry {
    pub code: String,
    pub code_type: CodeType,
    pub value_frequency: u64,
    pub total_frequency: u64,
    pub source_table: String,
    #[serde(default)]
    pub unit_of_measurement: String,
    #[serde(with = "flag")]
    pub with_value: bool,
}

impl CodeEntry {
    pub fn new(code: impl Into<String>, code_type: CodeType) -> Self {
        Self {
            code: code.into(),
            code_type,
            value_frequency: 0,
            total_frequency: 0,
            source_table: code_type.table_name().to_string(),
            unit_of_measurement: String::new(),
            with_value: false,
        }
    }

    /// Merge sort key: type, then value flag, then total frequency.
    pub fn merge_key(&self) -> (CodeType, bool, u64) {
        (self.code_type, self.with_value, self.total_frequency)
    }
}

/// A code entry with its position in the global dictionary.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DictionaryEntry {
    pub index: CodeIndex,
    pub code: String,
    pub code_type: CodeType,
    pub value_frequency: u64,
    pub total_frequency: u64,
    pub source_table: String,
    #[serde(default)]
    pub unit_of_measurement: String,
    #[serde(with = "flag")]
    pub with_value: bool,
}

impl DictionaryEntry {
    pub fn from_entry(index: CodeIndex, entry: CodeEntry) -> Self {
        Self {
            index,
            code: entry.code,
            code_type: entry.code_type,
            value_frequency: entry.value_frequency,
            total_frequency: entry.total_frequency,
            source_table: entry.source_table,
            unit_of_measurement: entry.unit_of_measurement,
            with_value: entry.with_value,
        }
    }

    /// Share of occurrences that carried a value, if the code ever occurred.
    pub fn value_ratio(&self) -> Option<f64> {
        if self.total_frequency == 0 {
            None
        } else {
            Some(self.value_frequency as f64 / self.total_frequency as f64)
        }
    }
}

/// Parses a `0`/`1` dictionary flag. `true`/`false` are accepted as well.
pub fn parse_flag(raw: &str) -> Result<bool, ModelError> {
    match raw.trim() {
        "1" | "true" | "True" | "TRUE" => Ok(true),
        "0" | "false" | "False" | "FALSE" | "" => Ok(false),
        other => Err(ModelError::InvalidFlag(other.to_string())),
    }
}

mod flag {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &bool, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u8(u8::from(*value))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<bool, D::Error> {
        let raw = String::deserialize(deserializer)?;
        super::parse_flag(&raw).map_err(serde::de::Error::custom)
    }
}
