//! Typed interpretation of simple-field text.
//!
//! Document contents are always stored as text. Comparisons in queries need
//! the value in the field's declared [`FieldType`], so [`coerce`] converts a
//! string into a [`TypedValue`], honoring the field's decimal-separator flag
//! and date/time format. Anything that fails to convert yields `None`.
//!
//! # Examples
//!
//! ```
//! use catalog_core::*;
//!
//! let def = DocumentTypeDef::new("SI", "").with_paragraph(
//!     ElementDef::paragraph("MS", "")
//!         .with_field(ElementDef::simple("MISA", "Altezza").of_type(FieldType::Float64)),
//! );
//! let dt = DocumentType::build(&def).unwrap();
//! let field = dt.simple_field("SI.MS.MISA").unwrap();
//!
//! assert_eq!(coerce("12,5", field, DecimalConvention::Comma), Some(TypedValue::Float64(12.5)));
//! assert_eq!(coerce("12.5", field, DecimalConvention::Point), Some(TypedValue::Float64(12.5)));
//! assert_eq!(coerce("n.d.", field, DecimalConvention::Point), None);
//! ```

use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use serde::{Deserialize, Serialize};

use crate::schema::SimpleField;
use crate::types::FieldType;

/// Decimal separator used in stored text when a field does not force `.`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum DecimalConvention {
    /// `1234.5`
    #[default]
    Point,
    /// `1234,5`
    Comma,
}

const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%d/%m/%Y"];
const TIME_FORMATS: &[&str] = &["%H:%M:%S", "%H:%M"];
const DATETIME_FORMATS: &[&str] = &["%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M:%S"];

/// Fixed-point decimal number.
///
/// Kept exact for comparison; values beyond `i128` precision fall back to
/// floating point when compared.
#[derive(Debug, Clone, Copy)]
pub struct Decimal {
    mantissa: i128,
    scale: u32,
}

/// Error parsing a [`Decimal`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseDecimalError;

impl fmt::Display for ParseDecimalError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("invalid decimal literal")
    }
}

impl std::error::Error for ParseDecimalError {}

impl Decimal {
    pub fn to_f64(self) -> f64 {
        self.mantissa as f64 / 10f64.powi(self.scale as i32)
    }

    fn rescaled(self, scale: u32) -> Option<i128> {
        10i128
            .checked_pow(scale - self.scale)
            .and_then(|factor| self.mantissa.checked_mul(factor))
    }
}

impl FromStr for Decimal {
    type Err = ParseDecimalError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (negative, unsigned) = match s.strip_prefix('-') {
            Some(rest) => (true, rest),
            None => (false, s.strip_prefix('+').unwrap_or(s)),
        };
        let (int_part, frac_part) = unsigned.split_once('.').unwrap_or((unsigned, ""));
        if int_part.is_empty() && frac_part.is_empty() {
            return Err(ParseDecimalError);
        }
        if !int_part.bytes().chain(frac_part.bytes()).all(|b| b.is_ascii_digit()) {
            return Err(ParseDecimalError);
        }

        let mut mantissa: i128 = 0;
        for digit in int_part.bytes().chain(frac_part.bytes()) {
            mantissa = mantissa
                .checked_mul(10)
                .and_then(|m| m.checked_add(i128::from(digit - b'0')))
                .ok_or(ParseDecimalError)?;
        }
        Ok(Self {
            mantissa: if negative { -mantissa } else { mantissa },
            scale: frac_part.len() as u32,
        })
    }
}

impl Ord for Decimal {
    fn cmp(&self, other: &Self) -> Ordering {
        let scale = self.scale.max(other.scale);
        match (self.rescaled(scale), other.rescaled(scale)) {
            (Some(a), Some(b)) => a.cmp(&b),
            _ => self.to_f64().total_cmp(&other.to_f64()),
        }
    }
}

impl PartialOrd for Decimal {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for Decimal {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Decimal {}

impl fmt::Display for Decimal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let digits = self.mantissa.unsigned_abs().to_string();
        let sign = if self.mantissa < 0 { "-" } else { "" };
        let scale = self.scale as usize;
        if scale == 0 {
            return write!(f, "{sign}{digits}");
        }
        let padded = format!("{digits:0>width$}", width = scale + 1);
        let (int_part, frac_part) = padded.split_at(padded.len() - scale);
        write!(f, "{sign}{int_part}.{frac_part}")
    }
}

/// A simple-field value interpreted in its declared type.
#[derive(Debug, Clone, PartialEq)]
pub enum TypedValue {
    Boolean(bool),
    Byte(u8),
    Int16(i16),
    Int32(i32),
    Int64(i64),
    Float32(f32),
    Float64(f64),
    Decimal(Decimal),
    Date(NaiveDate),
    Time(NaiveTime),
    DateTime(NaiveDateTime),
    Text(String),
}

impl PartialOrd for TypedValue {
    /// Values of different variants are unordered.
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        use TypedValue::*;
        match (self, other) {
            (Boolean(a), Boolean(b)) => a.partial_cmp(b),
            (Byte(a), Byte(b)) => a.partial_cmp(b),
            (Int16(a), Int16(b)) => a.partial_cmp(b),
            (Int32(a), Int32(b)) => a.partial_cmp(b),
            (Int64(a), Int64(b)) => a.partial_cmp(b),
            (Float32(a), Float32(b)) => a.partial_cmp(b),
            (Float64(a), Float64(b)) => a.partial_cmp(b),
            (Decimal(a), Decimal(b)) => a.partial_cmp(b),
            (Date(a), Date(b)) => a.partial_cmp(b),
            (Time(a), Time(b)) => a.partial_cmp(b),
            (DateTime(a), DateTime(b)) => a.partial_cmp(b),
            (Text(a), Text(b)) => a.partial_cmp(b),
            _ => None,
        }
    }
}

fn parse_boolean(text: &str) -> Option<bool> {
    match text.to_lowercase().as_str() {
        "true" | "1" | "yes" | "si" | "sì" => Some(true),
        "false" | "0" | "no" => Some(false),
        _ => None,
    }
}

/// Rewrites a number written with `,` as decimal separator into `.` form.
///
/// Thousands separators swap the other way, so `1.234,5` becomes `1,234.5`
/// and fails to parse rather than being misread.
fn to_point_notation(text: &str, convention: DecimalConvention) -> String {
    match convention {
        DecimalConvention::Point => text.to_string(),
        DecimalConvention::Comma => text
            .chars()
            .map(|c| match c {
                ',' => '.',
                '.' => ',',
                other => other,
            })
            .collect(),
    }
}

fn parse_with<T>(
    text: &str,
    custom: Option<&str>,
    defaults: &[&str],
    parse: impl Fn(&str, &str) -> chrono::ParseResult<T>,
) -> Option<T> {
    match custom {
        Some(format) => parse(text, format).ok(),
        None => defaults.iter().find_map(|format| parse(text, format).ok()),
    }
}

/// Converts `text` to the declared type of `field`.
///
/// The decimal separator is `.` when the field declares point notation and
/// `convention` otherwise. Returns `None` when the text cannot be converted.
pub fn coerce(text: &str, field: &SimpleField, convention: DecimalConvention) -> Option<TypedValue> {
    let convention = if field.uses_point_decimal {
        DecimalConvention::Point
    } else {
        convention
    };
    let trimmed = text.trim();
    let number = || to_point_notation(trimmed, convention);
    let format = field.datetime_format.as_deref();

    match field.field_type {
        FieldType::Boolean => parse_boolean(trimmed).map(TypedValue::Boolean),
        FieldType::Byte => number().parse().ok().map(TypedValue::Byte),
        FieldType::Int16 => number().parse().ok().map(TypedValue::Int16),
        FieldType::Int32 => number().parse().ok().map(TypedValue::Int32),
        FieldType::Int64 => number().parse().ok().map(TypedValue::Int64),
        FieldType::Float32 => number()
            .parse::<f32>()
            .ok()
            .filter(|v| v.is_finite())
            .map(TypedValue::Float32),
        FieldType::Float64 => number()
            .parse::<f64>()
            .ok()
            .filter(|v| v.is_finite())
            .map(TypedValue::Float64),
        FieldType::Decimal => number().parse().ok().map(TypedValue::Decimal),
        FieldType::Date => {
            parse_with(trimmed, format, DATE_FORMATS, NaiveDate::parse_from_str).map(TypedValue::Date)
        }
        FieldType::Time => {
            parse_with(trimmed, format, TIME_FORMATS, NaiveTime::parse_from_str).map(TypedValue::Time)
        }
        FieldType::DateTime => {
            parse_with(trimmed, format, DATETIME_FORMATS, NaiveDateTime::parse_from_str)
                .map(TypedValue::DateTime)
        }
        FieldType::String => Some(TypedValue::Text(text.to_string())),
    }
}
