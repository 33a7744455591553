//! The eICU tuple pipeline.
//!
//! Raw tables are counted into per-table vocabularies, merged into one
//! global dictionary, re-encoded into integer-coded per-patient tuples,
//! merged into a single time-ordered file and finally checked for drift
//! against the dictionary.

pub mod config;
pub mod dictionary;
pub mod encoder;
pub mod error;
pub mod merge;
pub mod partial;
pub mod patients;
pub mod pipeline;
pub mod revise;
pub mod stats;
pub mod vocabulary;

pub use config::{DEFAULT_PATIENT_COLUMNS, PipelineConfig, ensure_dir};
pub use dictionary::{
    CodeDictionary, CodeSlot, MergedDictionary, merge_dictionary_files, merge_entries,
    read_code_entries, write_dictionary,
};
pub use encoder::{EncodeSummary, PatientBuffer, TableEncoder, encode_table, encode_value};
pub use error::{CoreError, Result, RevisionError};
pub use merge::{MergeSummary, file_sha256, merge_partials};
pub use partial::{Block, BlockReader, write_blocks};
pub use patients::{PatientDictionaryRequest, PatientDictionarySummary, write_patient_dictionary};
pub use revise::{
    FrequencyChange, FrequencyField, RevisionOutcome, RevisionPaths, RevisionReport,
    revise_dictionary, revise_or_copy,
};
pub use stats::{DictionaryStats, FrequencyStats};
pub use vocabulary::{Vocabulary, VocabularyBuilder, build_vocabulary, write_vocabulary};
