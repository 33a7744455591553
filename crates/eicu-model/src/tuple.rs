//! Encoded event tuples and their value field.

use std::fmt;

use crate::ids::{CodeIndex, PatientId};
use crate::ModelError;

/// Value field of a code that carries no value.
pub const NO_VALUE: &str = "NaN";

/// Value field of a valued code whose occurrence lacks a value.
pub const MISSING_VALUE: &str = "_MISSING";

/// Sentinel code counted during vocabulary building and never persisted.
pub const UNKNOWN_CODE: &str = "<unk>";

/// Header of the consolidated tuple file.
pub const TUPLE_HEADER: [&str; 5] = ["patient_id", "admission_id", "time", "code", "value"];

/// Replaces the field delimiter inside a rate string. Line breaks become
/// spaces so the value stays on its event line.
pub fn encode_rate(raw: &str) -> String {
    raw.trim().replace(',', "/").replace(['\r', '\n'], " ")
}

/// Reverses [`encode_rate`] into a parseable decimal literal.
pub fn decode_rate(encoded: &str) -> String {
    encoded.replace('/', ".")
}

#[derive(Debug, Clone, PartialEq)]
pub enum EventValue {
    /// The code carries no value (`NaN`).
    None,
    /// The code carries values but this occurrence has none (`_MISSING`).
    Missing,
    /// A numeric lab result.
    Number(f64),
    /// Any other literal, such as an encoded rate.
    Text(String),
}

impl EventValue {
    pub fn rate(raw: &str) -> Self {
        EventValue::Text(encode_rate(raw))
    }

    /// Reads a value field back from a tuple line. Literals stay verbatim.
    pub fn parse(field: &str) -> Self {
        match field {
            NO_VALUE | "" => EventValue::None,
            MISSING_VALUE => EventValue::Missing,
            other => EventValue::Text(other.to_string()),
        }
    }

    /// Numeric reading of the value, reversing the rate substitution.
    pub fn numeric(&self) -> Option<f64> {
        match self {
            EventValue::None | EventValue::Missing => None,
            EventValue::Number(value) => Some(*value),
            EventValue::Text(text) => decode_rate(text.trim()).parse::<f64>().ok(),
        }
    }

    pub fn is_present(&self) -> bool {
        self.numeric().is_some()
    }
}

impl fmt::Display for EventValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EventValue::None => f.write_str(NO_VALUE),
            EventValue::Missing => f.write_str(MISSING_VALUE),
            EventValue::Number(value) => write!(f, "{value}"),
            EventValue::Text(text) => f.write_str(text),
        }
    }
}

/// One encoded event without its patient, as stored in partial files.
#[derive(Debug, Clone, PartialEq)]
pub struct Event {
    pub admission_id: String,
    pub time: i64,
    pub code_index: CodeIndex,
    pub value: EventValue,
}

impl Event {
    pub fn new(time: i64, code_index: CodeIndex, value: EventValue) -> Self {
        Self {
            admission_id: String::new(),
            time,
            code_index,
            value,
        }
    }

    /// Renders `admission_id,time,code,value`.
    pub fn to_line(&self) -> String {
        format!(
            "{},{},{},{}",
            self.admission_id, self.time, self.code_index, self.value
        )
    }

    pub fn parse_line(line: &str) -> Result<Self, ModelError> {
        let fields: Vec<&str> = line.split(',').collect();
        let [admission_id, time, code_index, value] = fields.as_slice() else {
            return Err(ModelError::MalformedTuple {
                line: line.to_string(),
                reason: format!("expected 4 fields, found {}", fields.len()),
            });
        };
        Self::from_fields(admission_id, time, code_index, value).map_err(|reason| {
            ModelError::MalformedTuple {
                line: line.to_string(),
                reason,
            }
        })
    }

    /// Builds an event from the four tuple fields, reporting the bad field.
    pub fn from_fields(
        admission_id: &str,
        time: &str,
        code_index: &str,
        value: &str,
    ) -> Result<Self, String> {
        let time = time
            .trim()
            .parse::<i64>()
            .map_err(|_| format!("time '{time}' is not an integer"))?;
        let code_index = code_index
            .trim()
            .parse::<CodeIndex>()
            .map_err(|_| format!("code '{code_index}' is not a code index"))?;
        Ok(Self {
            admission_id: admission_id.to_string(),
            time,
            code_index,
            value: EventValue::parse(value),
        })
    }
}

/// An event bound to its patient, as stored in the consolidated file.
#[derive(Debug, Clone, PartialEq)]
pub struct EventTuple {
    pub patient_id: PatientId,
    pub event: Event,
}

impl EventTuple {
    /// Fields in [`TUPLE_HEADER`] order.
    pub fn to_record(&self) -> [String; 5] {
        [
            self.patient_id.to_string(),
            self.event.admission_id.clone(),
            self.event.time.to_string(),
            self.event.code_index.to_string(),
            self.event.value.to_string(),
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rate_substitution_round_trips_to_number() {
        let value = EventValue::rate(" 10,5 ");
        assert_eq!(value.to_string(), "10/5");
        assert_eq!(value.numeric(), Some(10.5));
    }

    #[test]
    fn rate_line_breaks_stay_on_one_line() {
        let value = EventValue::rate("10\r\n5,5");
        assert_eq!(value.to_string(), "10  5/5");
        let event = Event::new(3, 4, value);
        assert_eq!(event.to_line().lines().count(), 1);
    }

    #[test]
    fn sentinels_are_not_present() {
        assert!(!EventValue::parse("NaN").is_present());
        assert!(!EventValue::parse("_MISSING").is_present());
        assert!(!EventValue::parse("").is_present());
        assert!(!EventValue::parse("ml/hr").is_present());
        assert!(EventValue::parse("5.5").is_present());
    }

    #[test]
    fn numbers_use_shortest_formatting() {
        assert_eq!(EventValue::Number(5.5).to_string(), "5.5");
        assert_eq!(EventValue::Number(5.0).to_string(), "5");
    }

    #[test]
    fn event_line_round_trip_keeps_text() {
        let line = ",-12,7,10/5";
        let event = Event::parse_line(line).expect("parse");
        assert_eq!(event.time, -12);
        assert_eq!(event.code_index, 7);
        assert_eq!(event.to_line(), line);
    }

    #[test]
    fn event_line_rejects_bad_fields() {
        assert!(Event::parse_line(",5,7").is_err());
        assert!(Event::parse_line(",x,7,NaN").is_err());
        assert!(Event::parse_line(",5,-1,NaN").is_err());
    }
}
