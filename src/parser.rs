// src/parser.rs
use crate::error::ParseError;

/// Converts one raw device line into a sample value.
///
/// The device prints one decimal number per line, e.g. `23.56\r\n`. Line
/// terminators and surrounding whitespace are ignored.
pub fn parse_sample(raw: &[u8]) -> Result<f64, ParseError> {
    let text = std::str::from_utf8(raw).map_err(|_| ParseError::InvalidUtf8)?;
    let text = text.trim_matches(|c| c == '\r' || c == '\n').trim();
    if text.is_empty() {
        return Err(ParseError::Empty);
    }
    let value: f64 = text
        .parse()
        .map_err(|_| ParseError::NotANumber(text.to_owned()))?;
    // "nan" and "inf" parse fine but cannot be plotted.
    if !value.is_finite() {
        return Err(ParseError::NotFinite(text.to_owned()));
    }
    Ok(value)
}
