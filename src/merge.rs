//! Per-field resolution and conflict detection.
//!
//! Resolution policy for a field present in both sources:
//!
//! | attribute     | winner                                   | conflicts |
//! |---------------|------------------------------------------|-----------|
//! | `db_column`   | spreadsheet when non-empty, else database | yes       |
//! | `data_type`   | database when non-empty, else spreadsheet | yes       |
//! | `max_length`  | database                                 | no        |
//! | `required`    | spreadsheet                              | no        |
//! | `description` | spreadsheet when non-empty, else database | yes       |
//! | `validation`, `example`, `remark` | spreadsheet          | no        |
//!
//! A conflict is only recorded when both sides carry a non-empty value and the
//! two strings differ exactly. A value present on one side only is an
//! enrichment, not a conflict.

use std::fmt;

use itertools::Itertools;
use serde::{Deserialize, Serialize};

use crate::{
    align::{self, Alignment},
    field::{DatabaseField, FieldIdentity, SpreadsheetField},
    source::Workbook,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Provenance {
    DatabaseOnly,
    SpreadsheetOnly,
    Merged,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum FieldAttribute {
    ApiName,
    DbColumn,
    DataType,
    MaxLength,
    Required,
    Description,
    Validation,
    Example,
    Remark,
}

impl FieldAttribute {
    pub fn as_str(&self) -> &'static str {
        match self {
            FieldAttribute::ApiName => "apiName",
            FieldAttribute::DbColumn => "dbColumn",
            FieldAttribute::DataType => "dataType",
            FieldAttribute::MaxLength => "maxLength",
            FieldAttribute::Required => "required",
            FieldAttribute::Description => "description",
            FieldAttribute::Validation => "validation",
            FieldAttribute::Example => "example",
            FieldAttribute::Remark => "remark",
        }
    }
}

impl fmt::Display for FieldAttribute {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Disagreement between the two sources on one attribute of one field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldConflict {
    pub attribute: FieldAttribute,
    pub database_value: String,
    pub spreadsheet_value: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MergedField {
    pub api_name: String,
    pub db_column: String,
    pub data_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_length: Option<u32>,
    pub required: bool,
    pub description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub validation: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub example: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub remark: Option<String>,
    pub provenance: Provenance,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub conflicts: Vec<FieldConflict>,
}

impl MergedField {
    pub fn has_conflicts(&self) -> bool {
        !self.conflicts.is_empty()
    }

    pub fn identity(&self) -> Option<FieldIdentity> {
        FieldIdentity::new(&self.api_name)
    }

    fn from_database(field: &DatabaseField) -> Self {
        Self {
            api_name: field.api_name.clone(),
            db_column: field.db_column.clone(),
            data_type: field.data_type.clone(),
            max_length: field.max_length,
            required: false,
            description: field.description.clone(),
            validation: None,
            example: None,
            remark: None,
            provenance: Provenance::DatabaseOnly,
            conflicts: Vec::new(),
        }
    }

    fn from_spreadsheet(field: &SpreadsheetField) -> Self {
        Self {
            api_name: field.api_name.clone(),
            db_column: field.db_column.clone(),
            data_type: field.data_type.clone(),
            max_length: None,
            required: field.required,
            description: field.description.clone(),
            validation: field.validation.clone(),
            example: field.example.clone(),
            remark: field.remark.clone(),
            provenance: Provenance::SpreadsheetOnly,
            conflicts: Vec::new(),
        }
    }
}

fn prefer<'a>(preferred: &'a str, fallback: &'a str) -> &'a str {
    if preferred.is_empty() {
        fallback
    } else {
        preferred
    }
}

fn compare(
    conflicts: &mut Vec<FieldConflict>,
    attribute: FieldAttribute,
    database_value: &str,
    spreadsheet_value: &str,
) {
    if !database_value.is_empty()
        && !spreadsheet_value.is_empty()
        && database_value != spreadsheet_value
    {
        conflicts.push(FieldConflict {
            attribute,
            database_value: database_value.to_string(),
            spreadsheet_value: spreadsheet_value.to_string(),
        });
    }
}

/// Conflicts between two aligned fields, in `dbColumn`, `dataType`, `description` order.
///
/// Requiredness is never compared: the database carries no signal for it.
pub fn detect_conflicts(
    database: &DatabaseField,
    spreadsheet: &SpreadsheetField,
) -> Vec<FieldConflict> {
    let mut conflicts = Vec::new();
    compare(
        &mut conflicts,
        FieldAttribute::DbColumn,
        &database.db_column,
        &spreadsheet.db_column,
    );
    compare(
        &mut conflicts,
        FieldAttribute::DataType,
        &database.data_type,
        &spreadsheet.data_type,
    );
    compare(
        &mut conflicts,
        FieldAttribute::Description,
        &database.description,
        &spreadsheet.description,
    );
    conflicts
}

/// Merges one aligned identity. Returns `None` only when both sides are absent.
pub fn merge_one(
    database: Option<&DatabaseField>,
    spreadsheet: Option<&SpreadsheetField>,
) -> Option<MergedField> {
    match (database, spreadsheet) {
        (None, None) => None,
        (Some(db), None) => Some(MergedField::from_database(db)),
        (None, Some(excel)) => Some(MergedField::from_spreadsheet(excel)),
        (Some(db), Some(excel)) => Some(MergedField {
            api_name: prefer(&excel.api_name, &db.api_name).to_string(),
            db_column: prefer(&excel.db_column, &db.db_column).to_string(),
            data_type: prefer(&db.data_type, &excel.data_type).to_string(),
            max_length: db.max_length,
            required: excel.required,
            description: prefer(&excel.description, &db.description).to_string(),
            validation: excel.validation.clone(),
            example: excel.example.clone(),
            remark: excel.remark.clone(),
            provenance: Provenance::Merged,
            conflicts: detect_conflicts(db, excel),
        }),
    }
}

/// Merges every aligned identity, ordered by normalized identity.
pub fn merge_alignment(alignment: &Alignment) -> Vec<MergedField> {
    let database_only = alignment
        .only_database
        .iter()
        .filter_map(|(identity, db)| Some((identity, merge_one(Some(db), None)?)));
    let spreadsheet_only = alignment
        .only_spreadsheet
        .iter()
        .filter_map(|(identity, excel)| Some((identity, merge_one(None, Some(excel))?)));
    let both = alignment
        .both
        .iter()
        .filter_map(|(identity, db, excel)| Some((identity, merge_one(Some(db), Some(excel))?)));

    database_only
        .chain(spreadsheet_only)
        .chain(both)
        .sorted_by(|left, right| left.0.cmp(right.0))
        .map(|(_, merged)| merged)
        .collect()
}

/// Merged catalog for one operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MergeResult {
    pub operation_code: String,
    pub total_fields: usize,
    /// Fields only the spreadsheet knows about.
    pub new_fields: usize,
    /// Fields present in both sources.
    pub updated_fields: usize,
    /// Fields carrying at least one conflict.
    pub conflicting_fields: usize,
    pub fields: Vec<MergedField>,
}

impl MergeResult {
    pub fn from_fields(operation_code: &str, fields: Vec<MergedField>) -> Self {
        Self {
            operation_code: operation_code.to_string(),
            total_fields: fields.len(),
            new_fields: count_provenance(&fields, Provenance::SpreadsheetOnly),
            updated_fields: count_provenance(&fields, Provenance::Merged),
            conflicting_fields: fields.iter().filter(|field| field.has_conflicts()).count(),
            fields,
        }
    }

    pub fn conflict_count(&self) -> usize {
        self.fields.iter().map(|field| field.conflicts.len()).sum()
    }

    pub fn required_fields(&self) -> usize {
        self.fields.iter().filter(|field| field.required).count()
    }

    pub fn count_by_provenance(&self, provenance: Provenance) -> usize {
        count_provenance(&self.fields, provenance)
    }
}

fn count_provenance(fields: &[MergedField], provenance: Provenance) -> usize {
    fields
        .iter()
        .filter(|field| field.provenance == provenance)
        .count()
}

/// Aligns and merges one operation's database catalog with the fields of all
/// of its workbooks.
///
/// Workbook fields are concatenated in workbook order before indexing, so a
/// later workbook's definition of an identity replaces an earlier one.
pub fn merge_operation(
    operation_code: &str,
    database: &[DatabaseField],
    workbooks: &[Workbook],
) -> MergeResult {
    let database = align::index_fields(database.iter().cloned(), DatabaseField::identity);
    let spreadsheet = align::index_fields(
        workbooks
            .iter()
            .flat_map(|workbook| workbook.fields.iter().cloned()),
        SpreadsheetField::identity,
    );
    let alignment = align::align(database, spreadsheet);
    MergeResult::from_fields(operation_code, merge_alignment(&alignment))
}
