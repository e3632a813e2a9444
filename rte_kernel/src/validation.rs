//! RTE Kernel: value checks.
//!
//! Non-panicking validation of canonical values against each element's
//! value type. Every check returns `Err(IncorrectDataType)` on failure and
//! leaves interpretation to the caller.

use crate::arithmetic::{parse_decimal, within};
use crate::dialect::{decode_timespan, Dialect};
use crate::domain::{Element, ValueType};
use crate::error_code::ErrorCode;

// ---------------------------------------------------------------------------
// Public API
// ---------------------------------------------------------------------------

/// Validate a canonical value for `element`.
pub fn try_validate_value(element: Element, value: &str) -> Result<(), ErrorCode> {
    match element.value_type() {
        ValueType::Text => Ok(()),
        ValueType::Vocabulary(words) => check_vocabulary(words, value),
        ValueType::Decimal => check_decimal(value),
        ValueType::BoundedDecimal { low, high } => check_bounded(value, low, high),
        ValueType::Timespan => check_timespan(value),
    }
}

/// Validate every entry of a restored map, stopping at the first failure.
pub fn try_validate_all<'a, I>(entries: I) -> Result<(), (Element, ErrorCode)>
where
    I: IntoIterator<Item = (&'a Element, &'a String)>,
{
    for (element, value) in entries {
        try_validate_value(*element, value).map_err(|code| (*element, code))?;
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Individual checks (private)
// ---------------------------------------------------------------------------

fn check_vocabulary(words: &[&str], value: &str) -> Result<(), ErrorCode> {
    if words.contains(&value) {
        Ok(())
    } else {
        Err(ErrorCode::IncorrectDataType)
    }
}

/// Blank clears a score in the legacy dialect, so it is accepted.
fn check_decimal(value: &str) -> Result<(), ErrorCode> {
    if value.is_empty() || parse_decimal(value).is_some() {
        Ok(())
    } else {
        Err(ErrorCode::IncorrectDataType)
    }
}

fn check_bounded(value: &str, low: i64, high: i64) -> Result<(), ErrorCode> {
    match parse_decimal(value) {
        Some(v) if within(v, low, high) => Ok(()),
        _ => Err(ErrorCode::IncorrectDataType),
    }
}

fn check_timespan(value: &str) -> Result<(), ErrorCode> {
    decode_timespan(value, Dialect::Current)
        .map(|_| ())
        .ok_or(ErrorCode::IncorrectDataType)
}
