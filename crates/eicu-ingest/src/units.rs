/// Canonical form of an absent unit.
pub const ABSENT_UNIT: &str = "nan";

/// Lowercases and trims a unit string. Blank, `none` and `nan` collapse to
/// [`ABSENT_UNIT`].
pub fn normalize_unit(raw: Option<&str>) -> String {
    let Some(raw) = raw else {
        return ABSENT_UNIT.to_string();
    };
    let unit = raw.trim().to_lowercase();
    if unit.is_empty() || unit == "none" || unit == ABSENT_UNIT {
        ABSENT_UNIT.to_string()
    } else {
        unit
    }
}

pub fn is_absent_unit(unit: &str) -> bool {
    unit == ABSENT_UNIT
}
