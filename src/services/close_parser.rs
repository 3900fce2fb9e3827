use crate::error::{AppError, Result};
use rust_decimal::Decimal;
use std::str::FromStr;

/// Parse a loosely formatted close ("41,985.63", "$ 383.32 ") into a decimal.
///
/// Everything except ASCII digits and '.' is dropped before parsing, so
/// thousands separators, currency symbols and whitespace are ignored. Signs are
/// dropped too: closes of an index level are never negative.
pub fn parse_close(raw: &str) -> Result<Decimal> {
    let cleaned: String = raw.chars().filter(|c| c.is_ascii_digit() || *c == '.').collect();

    if !cleaned.chars().any(|c| c.is_ascii_digit()) {
        return Err(AppError::Parse(format!("No digits in close value '{}'", raw)));
    }
    if cleaned.matches('.').count() > 1 {
        return Err(AppError::Parse(format!("Ambiguous close value '{}' (multiple decimal points)", raw)));
    }

    // "1,234." and ".5" are valid closes once the lone point is made explicit
    let cleaned = cleaned.trim_end_matches('.');
    let cleaned = if cleaned.starts_with('.') {
        format!("0{}", cleaned)
    } else {
        cleaned.to_string()
    };

    Decimal::from_str(&cleaned)
        .map(|d| d.normalize())
        .map_err(|e| AppError::Parse(format!("Invalid close value '{}': {}", raw, e)))
}
