//! Numeric track-status codes

use serde_json::Value;

use crate::{Category, Flag};

/// Map a provider track-status code to a flag.
///
/// Formula 2 additionally reports 7 for the end of a virtual safety car period.
/// Codes outside the table yield `None` and must be dropped by the caller.
pub fn map_code(category: Category, code: i64) -> Option<Flag> {
    match code {
        1 => Some(Flag::Clear),
        2 => Some(Flag::Yellow),
        4 => Some(Flag::SafetyCar),
        5 => Some(Flag::Red),
        6 => Some(Flag::Vsc),
        7 if category == Category::Formula2 => Some(Flag::Vsc),
        _ => None,
    }
}

/// Read a status code sent either as a JSON number or as a numeric string.
pub fn code_from_value(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}
