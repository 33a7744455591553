//! Shared types for the eICU tuple pipeline.

pub mod code;
pub mod error;
pub mod ids;
pub mod tuple;

pub use code::{
    CodeEntry, CodeType, ConstantValuePolicy, DictionaryEntry, LAB_CONSTANT_VALUE_POLICY,
    ValueKind, parse_flag,
};
pub use error::{ModelError, Result};
pub use ids::{CodeIndex, PatientId};
pub use tuple::{
    Event, EventTuple, EventValue, MISSING_VALUE, NO_VALUE, TUPLE_HEADER, UNKNOWN_CODE,
    decode_rate, encode_rate,
};
