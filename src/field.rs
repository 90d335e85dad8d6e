//! Field shapes contributed by the two sources and the identity used to align them.
//!
//! The database side arrives as loosely-typed records ([`RawRecord`]) whose
//! column set is owned upstream, so a [`DatabaseField`] is read out of a map of
//! tagged scalars instead of a fixed struct. The spreadsheet side arrives as
//! already-extracted [`SpreadsheetField`] values. [`SourceField`] wraps either
//! variant when a caller needs to handle them uniformly.

use std::{collections::BTreeMap, fmt, sync::OnceLock};

use regex::Regex;
use serde::{Deserialize, Serialize};

/// Tokens (compared lower-cased and trimmed) that mark a spreadsheet field as required.
pub const REQUIRED_TOKENS: &[&str] = &["y", "yes", "true", "1", "是", "必填"];

static REMARK_COLUMN: OnceLock<Regex> = OnceLock::new();

fn remark_column_pattern() -> &'static Regex {
    REMARK_COLUMN.get_or_init(|| {
        Regex::new(r"欄位代號[:：]\s*([A-Z]+\.[A-Z0-9]+)").expect("remark column pattern is valid")
    })
}

/// Case-insensitive alignment key for a field.
///
/// Holds the trimmed, lower-cased form of an API name. The display casing is
/// kept on the field itself.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct FieldIdentity(String);

impl FieldIdentity {
    /// Returns `None` for names that are empty after trimming.
    pub fn new(api_name: &str) -> Option<Self> {
        let trimmed = api_name.trim();
        if trimmed.is_empty() {
            None
        } else {
            Some(Self(trimmed.to_lowercase()))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for FieldIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// One cell of a raw database record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ScalarValue {
    Bool(bool),
    Number(f64),
    Text(String),
    Null,
    /// Nested objects or arrays; never read as a field attribute.
    Other(serde_json::Value),
}

impl ScalarValue {
    /// Renders the value as text; `Null` and blank strings yield `None`.
    pub fn as_text(&self) -> Option<String> {
        match self {
            ScalarValue::Null | ScalarValue::Other(_) => None,
            ScalarValue::Bool(flag) => Some(flag.to_string()),
            ScalarValue::Number(number) => {
                if number.fract() == 0.0 && number.abs() < i64::MAX as f64 {
                    Some(format!("{}", *number as i64))
                } else {
                    Some(number.to_string())
                }
            }
            ScalarValue::Text(text) => {
                if text.trim().is_empty() {
                    None
                } else {
                    Some(text.clone())
                }
            }
        }
    }

    pub fn as_length(&self) -> Option<u32> {
        match self {
            ScalarValue::Number(number) if *number > 0.0 && number.fract() == 0.0 => {
                u32::try_from(*number as u64).ok()
            }
            ScalarValue::Text(text) => text.trim().parse::<u32>().ok().filter(|len| *len > 0),
            _ => None,
        }
    }
}

/// A database record keyed by whatever column names the upstream table exposes.
pub type RawRecord = BTreeMap<String, ScalarValue>;

fn lookup<'a>(record: &'a RawRecord, keys: &[&str]) -> Option<&'a ScalarValue> {
    keys.iter()
        .filter_map(|key| record.get(*key))
        .find(|value| !matches!(value, ScalarValue::Null))
}

fn lookup_text(record: &RawRecord, keys: &[&str]) -> Option<String> {
    lookup(record, keys).and_then(ScalarValue::as_text)
}

/// Field annotation taken from the legacy database catalog.
///
/// The database never carries a requiredness signal, so there is no
/// `required` attribute here.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct DatabaseField {
    pub api_name: String,
    pub db_column: String,
    pub data_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_length: Option<u32>,
    pub description: String,
}

impl DatabaseField {
    /// Reads a field out of a raw record, accepting snake_case and camelCase keys.
    ///
    /// Returns `None` when the record carries no API name.
    pub fn from_record(record: &RawRecord) -> Option<Self> {
        let api_name = lookup_text(record, &["api_name", "apiName"])?;
        FieldIdentity::new(&api_name)?;
        Some(Self {
            api_name,
            db_column: lookup_text(record, &["db_column", "dbColumn"]).unwrap_or_default(),
            data_type: lookup_text(record, &["data_type", "dataType"]).unwrap_or_default(),
            max_length: lookup(record, &["max_length", "maxLength"])
                .and_then(ScalarValue::as_length),
            description: lookup_text(record, &["description"]).unwrap_or_default(),
        })
    }

    pub fn identity(&self) -> Option<FieldIdentity> {
        FieldIdentity::new(&self.api_name)
    }
}

/// Field row extracted from a workbook's API sheet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct SpreadsheetField {
    pub api_name: String,
    pub db_column: String,
    pub data_type: String,
    pub required: bool,
    pub description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub validation: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub example: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub remark: Option<String>,
}

impl SpreadsheetField {
    pub fn identity(&self) -> Option<FieldIdentity> {
        FieldIdentity::new(&self.api_name)
    }
}

/// Either source's view of one field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceField {
    Database(DatabaseField),
    Spreadsheet(SpreadsheetField),
}

impl SourceField {
    pub fn api_name(&self) -> &str {
        match self {
            SourceField::Database(field) => &field.api_name,
            SourceField::Spreadsheet(field) => &field.api_name,
        }
    }

    pub fn identity(&self) -> Option<FieldIdentity> {
        FieldIdentity::new(self.api_name())
    }

    /// Only spreadsheet fields can assert requiredness.
    pub fn required(&self) -> Option<bool> {
        match self {
            SourceField::Database(_) => None,
            SourceField::Spreadsheet(field) => Some(field.required),
        }
    }
}

impl From<DatabaseField> for SourceField {
    fn from(field: DatabaseField) -> Self {
        SourceField::Database(field)
    }
}

impl From<SpreadsheetField> for SourceField {
    fn from(field: SpreadsheetField) -> Self {
        SourceField::Spreadsheet(field)
    }
}

/// Interprets a spreadsheet "required" cell.
pub fn parse_required(raw: &str) -> bool {
    let lowered = raw.trim().to_lowercase();
    REQUIRED_TOKENS.contains(&lowered.as_str())
}

/// Recovers a `TABLE.COLUMN` reference embedded in a remark such as
/// `欄位代號:ACPTA.TA001`.
pub fn column_from_remark(remark: &str) -> Option<String> {
    remark_column_pattern()
        .captures(remark)
        .and_then(|captures| captures.get(1))
        .map(|found| found.as_str().to_string())
}
