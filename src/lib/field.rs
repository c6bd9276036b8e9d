use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// One entry of a calculator form.
#[derive(Serialize, Deserialize, JsonSchema, Debug, Clone, PartialEq)]
pub struct Field {
    /// Identifier, unique within a calculator.
    pub name: String,
    /// Display text, usually carrying the unit (e.g. "Bill Amount ($)").
    pub label: String,
    #[serde(default)]
    pub value: f64,
    /// Output fields are derived by the recompute function and cannot be edited.
    #[serde(default)]
    pub readonly: bool,
    /// Descriptive only; never evaluated.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub formula: Option<String>,
}

impl Field {
    pub fn input(name: &str, label: &str, value: f64) -> Self {
        Self {
            name: name.to_string(),
            label: label.to_string(),
            value,
            readonly: false,
            formula: None,
        }
    }
    pub fn output(name: &str, label: &str) -> Self {
        Self {
            name: name.to_string(),
            label: label.to_string(),
            value: 0.0,
            readonly: true,
            formula: None,
        }
    }
    pub fn with_formula(mut self, formula: &str) -> Self {
        self.formula = Some(formula.to_string());
        self
    }
}

/// Reads the longest decimal prefix of `raw` (after leading whitespace).
/// Anything that does not yield a finite number becomes `0`.
pub fn parse_input(raw: &str) -> f64 {
    let text = raw.trim_start();
    let bytes = text.as_bytes();
    let digits_from = |mut i: usize| {
        while i < bytes.len() && bytes[i].is_ascii_digit() {
            i += 1;
        }
        i
    };

    let mut end = 0;
    if matches!(bytes.first(), Some(b'+' | b'-')) {
        end = 1;
    }
    let integer_end = digits_from(end);
    let mut mantissa_end = integer_end;
    let mut has_digits = integer_end > end;
    if bytes.get(integer_end) == Some(&b'.') {
        let fraction_end = digits_from(integer_end + 1);
        if fraction_end > integer_end + 1 || has_digits {
            has_digits |= fraction_end > integer_end + 1;
            mantissa_end = fraction_end;
        }
    }
    if !has_digits {
        return 0.0;
    }
    end = mantissa_end;
    if matches!(bytes.get(end), Some(b'e' | b'E')) {
        let mut exponent_start = end + 1;
        if matches!(bytes.get(exponent_start), Some(b'+' | b'-')) {
            exponent_start += 1;
        }
        let exponent_end = digits_from(exponent_start);
        if exponent_end > exponent_start {
            end = exponent_end;
        }
    }

    match text[..end].parse::<f64>() {
        Ok(value) if value.is_finite() => value,
        _ => 0.0,
    }
}
