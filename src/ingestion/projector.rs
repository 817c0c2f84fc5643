//! Record projection: nested record -> `(name, age, address, additional_info)`.

use super::{DecodedRecord, FieldValue};
use serde::Serialize;
use std::fmt;
use thiserror::Error;

/// Placeholder rendered for a missing name part.
///
/// A name part that is itself a mapping (`name.firstName.given`) is rendered as its JSON text,
/// not as an opaque object marker, so the nested value stays readable in `name`.
pub const MISSING_PART: &str = "undefined";

const NAME_KEY: &str = "name";
const AGE_KEY: &str = "age";
const ADDRESS_KEY: &str = "address";

/// Best-effort integer age. Non-numeric input yields `NotANumber` instead of failing the row.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub enum Age {
    Value(i64),
    NotANumber,
}

impl Age {
    pub fn parse(raw: &str) -> Self {
        parse_leading_int(raw).map_or(Age::NotANumber, Age::Value)
    }

    /// Storage form: the sentinel is stored as NULL.
    pub fn as_option(&self) -> Option<i64> {
        match self {
            Age::Value(v) => Some(*v),
            Age::NotANumber => None,
        }
    }
}

impl fmt::Display for Age {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Age::Value(v) => write!(f, "{}", v),
            Age::NotANumber => write!(f, "NaN"),
        }
    }
}

/// The four fields stored per row.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ProjectedTuple {
    pub full_name: String,
    pub age: Age,
    pub address: Option<String>,
    pub additional_info: Option<String>,
}

#[derive(Error, Debug)]
pub enum ProjectionError {
    #[error("record has no `name` field")]
    MissingName,

    #[error("failed to serialize field: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// Parse the leading base-10 integer of `raw`: surrounding whitespace, an optional sign,
/// then digits up to the first non-digit. `None` when no digit leads or the value overflows.
pub fn parse_leading_int(raw: &str) -> Option<i64> {
    let s = raw.trim();
    let (negative, rest) = match s.as_bytes().first() {
        Some(b'-') => (true, &s[1..]),
        Some(b'+') => (false, &s[1..]),
        _ => (false, s),
    };

    let digits_end = rest
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(rest.len());
    if digits_end == 0 {
        return None;
    }

    let magnitude: i64 = rest[..digits_end].parse().ok()?;
    Some(if negative { -magnitude } else { magnitude })
}

pub fn project(record: &DecodedRecord) -> Result<ProjectedTuple, ProjectionError> {
    let full_name = full_name(record.get(NAME_KEY).ok_or(ProjectionError::MissingName)?)?;

    let age = match record.get(AGE_KEY) {
        Some(FieldValue::Scalar(raw)) => Age::parse(raw),
        _ => Age::NotANumber,
    };

    // An empty scalar counts as absent.
    let address = match record.get(ADDRESS_KEY) {
        Some(FieldValue::Scalar(s)) if s.is_empty() => None,
        Some(value) => Some(serde_json::to_string(value)?),
        None => None,
    };

    let mut rest = record.clone();
    for key in [NAME_KEY, AGE_KEY, ADDRESS_KEY] {
        rest.shift_remove(key);
    }
    let additional_info = if rest.is_empty() {
        None
    } else {
        Some(serde_json::to_string(&rest)?)
    };

    Ok(ProjectedTuple {
        full_name,
        age,
        address,
        additional_info,
    })
}

fn full_name(name: &FieldValue) -> Result<String, ProjectionError> {
    let (first, last) = match name {
        FieldValue::Mapping(parts) => (
            name_part(parts.get("firstName"))?,
            name_part(parts.get("lastName"))?,
        ),
        FieldValue::Scalar(_) => (MISSING_PART.to_string(), MISSING_PART.to_string()),
    };
    Ok(format!("{} {}", first, last))
}

fn name_part(part: Option<&FieldValue>) -> Result<String, ProjectionError> {
    match part {
        None => Ok(MISSING_PART.to_string()),
        Some(FieldValue::Scalar(s)) => Ok(s.clone()),
        Some(nested @ FieldValue::Mapping(_)) => Ok(serde_json::to_string(nested)?),
    }
}
