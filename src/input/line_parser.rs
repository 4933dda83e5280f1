//! Parser for the `<PIN>#<VALUE>` serial line protocol.
//!
//! ```text
//! 2#1.0    -> D2 = 1.0
//! 14#0.5   -> A0 = 0.5
//! 5#0      -> D5 = 0.0
//! ```
//!
//! Pin numbers are plain decimal integers, values are decimal floats with a
//! `.` separator. Values outside `[0.0, 1.0]` are clamped without complaint.

use crate::input::pin::{clamp_unit, parse_pin, PinSample};

/// Field separator between pin number and value.
pub const DELIMITER: char = '#';

/// Why a line did not produce a sample.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ParseError {
    #[error("Empty line")]
    EmptyLine,

    #[error("Malformed line, expected <pin>#<value>: {0:?}")]
    MalformedLine(String),

    #[error("Invalid pin number: {0:?}")]
    InvalidPinNumber(String),

    #[error("Invalid value: {0:?}")]
    InvalidValue(String),

    #[error("Unknown pin number: {0}")]
    UnknownPin(i64),
}

impl ParseError {
    /// Silent failures are expected noise and only logged at debug level.
    pub fn is_silent(&self) -> bool {
        matches!(self, ParseError::EmptyLine | ParseError::UnknownPin(_))
    }

    /// Short label used for statistics and log fields.
    pub fn kind(&self) -> &'static str {
        match self {
            ParseError::EmptyLine => "empty_line",
            ParseError::MalformedLine(_) => "malformed_line",
            ParseError::InvalidPinNumber(_) => "invalid_pin_number",
            ParseError::InvalidValue(_) => "invalid_value",
            ParseError::UnknownPin(_) => "unknown_pin",
        }
    }
}

/// Parses one raw line into a clamped [`PinSample`].
pub fn parse_line(line: &str) -> Result<PinSample, ParseError> {
    let line = line.trim();
    if line.is_empty() {
        return Err(ParseError::EmptyLine);
    }

    let mut fields = line.split(DELIMITER);
    let (pin_field, value_field) = match (fields.next(), fields.next(), fields.next()) {
        (Some(pin), Some(value), None) => (pin.trim(), value.trim()),
        _ => return Err(ParseError::MalformedLine(line.to_string())),
    };

    let pin_number = parse_pin_number(pin_field)?;
    let value = parse_value(value_field)?;

    let pin = parse_pin(pin_number).ok_or(ParseError::UnknownPin(pin_number))?;

    Ok(PinSample {
        pin,
        value: clamp_unit(value),
    })
}

// Only an optional sign followed by ASCII digits; no grouping, no whitespace.
fn parse_pin_number(field: &str) -> Result<i64, ParseError> {
    let digits = field.strip_prefix(['+', '-']).unwrap_or(field);
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return Err(ParseError::InvalidPinNumber(field.to_string()));
    }
    field
        .parse::<i64>()
        .map_err(|_| ParseError::InvalidPinNumber(field.to_string()))
}

fn parse_value(field: &str) -> Result<f32, ParseError> {
    // Rust float parsing is locale independent, but `,` is never a decimal separator here.
    if field.contains(',') {
        return Err(ParseError::InvalidValue(field.to_string()));
    }
    match field.parse::<f32>() {
        Ok(value) if !value.is_nan() => Ok(value),
        _ => Err(ParseError::InvalidValue(field.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::input::pin::PinIdentifier;

    #[test]
    fn parses_reference_lines() {
        assert_eq!(
            parse_line("2#1.0"),
            Ok(PinSample::new(PinIdentifier::D2, 1.0))
        );
        assert_eq!(
            parse_line("14#0.5"),
            Ok(PinSample::new(PinIdentifier::A0, 0.5))
        );
        assert_eq!(parse_line("5#0"), Ok(PinSample::new(PinIdentifier::D5, 0.0)));
    }

    #[test]
    fn surrounding_whitespace_is_ignored() {
        assert_eq!(
            parse_line("  4#0.25\r\n"),
            Ok(PinSample::new(PinIdentifier::D4, 0.25))
        );
    }

    #[test]
    fn out_of_range_values_are_clamped() {
        assert_eq!(parse_line("2#1.5").map(|s| s.value), Ok(1.0));
        assert_eq!(parse_line("2#-3").map(|s| s.value), Ok(0.0));
        assert_eq!(parse_line("2#-3").map(|s| s.pin), Ok(PinIdentifier::D2));
    }

    #[test]
    fn malformed_lines_are_classified() {
        assert_eq!(parse_line(""), Err(ParseError::EmptyLine));
        assert_eq!(parse_line("   "), Err(ParseError::EmptyLine));
        assert!(matches!(parse_line("abc"), Err(ParseError::MalformedLine(_))));
        assert!(matches!(parse_line("2#"), Err(ParseError::InvalidValue(_))));
        assert!(matches!(parse_line("2#x"), Err(ParseError::InvalidValue(_))));
        assert!(matches!(parse_line("2#3#4"), Err(ParseError::MalformedLine(_))));
    }

    #[test]
    fn pin_numbers_must_be_plain_decimal() {
        assert!(matches!(parse_line("x#1"), Err(ParseError::InvalidPinNumber(_))));
        assert!(matches!(parse_line("1,000#1"), Err(ParseError::InvalidPinNumber(_))));
        assert!(matches!(parse_line("0x2#1"), Err(ParseError::InvalidPinNumber(_))));
        assert!(matches!(parse_line("#1"), Err(ParseError::InvalidPinNumber(_))));
    }

    #[test]
    fn comma_decimal_separator_is_rejected() {
        assert!(matches!(parse_line("2#0,5"), Err(ParseError::InvalidValue(_))));
        assert!(matches!(parse_line("2#NaN"), Err(ParseError::InvalidValue(_))));
    }

    #[test]
    fn unknown_pins_are_skippable() {
        let err = parse_line("99#1.0").unwrap_err();
        assert_eq!(err, ParseError::UnknownPin(99));
        assert!(err.is_silent());
        assert!(!ParseError::InvalidValue("x".into()).is_silent());
    }
}
