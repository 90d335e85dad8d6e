//! JSON artifacts written for each merged operation and for the batch.
//!
//! Per operation, under `<output_dir>/<CODE>/`:
//! - `merged-fields.json`: the full [`MergeResult`]
//! - `merge-conflicts.json`: conflicted fields only, absent when there are none
//! - `field-data.json`: the flattened field catalog
//! - `update-suggestions.json`: edits worth applying to the database catalog
//!
//! The emitted `field-data.json` uses the same record keys the catalog reader
//! accepts, so an output directory can serve as the next run's `catalog_root`.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use log::{debug, info};
use serde::{Deserialize, Serialize};

use crate::{
    batch::BatchAnalysisResult,
    io_utils::write_json,
    merge::{FieldConflict, MergeResult, MergedField, Provenance},
    source::catalog::CATALOG_FILE_NAME,
};

pub const MERGED_FIELDS_FILE: &str = "merged-fields.json";
pub const CONFLICTS_FILE: &str = "merge-conflicts.json";
pub const FIELD_CATALOG_FILE: &str = CATALOG_FILE_NAME;
pub const SUGGESTIONS_FILE: &str = "update-suggestions.json";
pub const BATCH_ANALYSIS_FILE: &str = "batch-analysis.json";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConflictEntry {
    pub field_name: String,
    pub conflicts: Vec<FieldConflict>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DataSourceCounts {
    pub database_only: usize,
    pub spreadsheet_only: usize,
    pub merged: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogEntry {
    pub api_name: String,
    pub db_column: String,
    pub data_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_length: Option<u32>,
    pub required: bool,
    pub description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub example: Option<String>,
    pub provenance: Provenance,
    pub has_conflicts: bool,
}

impl From<&MergedField> for CatalogEntry {
    fn from(field: &MergedField) -> Self {
        Self {
            api_name: field.api_name.clone(),
            db_column: field.db_column.clone(),
            data_type: field.data_type.clone(),
            max_length: field.max_length,
            required: field.required,
            description: field.description.clone(),
            example: field.example.clone(),
            provenance: field.provenance,
            has_conflicts: field.has_conflicts(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldCatalog {
    pub operation_code: String,
    /// RFC 3339 timestamp.
    pub generated_at: String,
    pub total_fields: usize,
    pub required_fields: usize,
    pub data_sources: DataSourceCounts,
    pub fields: Vec<CatalogEntry>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewFieldSuggestion {
    pub api_name: String,
    pub data_type: String,
    pub description: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DescriptionSuggestion {
    pub api_name: String,
    pub description: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpdateSuggestions {
    pub operation_code: String,
    pub new_required_fields: Vec<NewFieldSuggestion>,
    pub description_updates: Vec<DescriptionSuggestion>,
    pub conflicts: Vec<ConflictEntry>,
}

impl UpdateSuggestions {
    pub fn is_empty(&self) -> bool {
        self.new_required_fields.is_empty()
            && self.description_updates.is_empty()
            && self.conflicts.is_empty()
    }
}

pub fn conflict_entries(result: &MergeResult) -> Vec<ConflictEntry> {
    result
        .fields
        .iter()
        .filter(|field| field.has_conflicts())
        .map(|field| ConflictEntry {
            field_name: field.api_name.clone(),
            conflicts: field.conflicts.clone(),
        })
        .collect()
}

pub fn field_catalog(result: &MergeResult, generated_at: DateTime<Utc>) -> FieldCatalog {
    FieldCatalog {
        operation_code: result.operation_code.clone(),
        generated_at: generated_at.to_rfc3339(),
        total_fields: result.total_fields,
        required_fields: result.required_fields(),
        data_sources: DataSourceCounts {
            database_only: result.count_by_provenance(Provenance::DatabaseOnly),
            spreadsheet_only: result.count_by_provenance(Provenance::SpreadsheetOnly),
            merged: result.count_by_provenance(Provenance::Merged),
        },
        fields: result.fields.iter().map(CatalogEntry::from).collect(),
    }
}

pub fn update_suggestions(result: &MergeResult) -> UpdateSuggestions {
    let new_required_fields = result
        .fields
        .iter()
        .filter(|field| field.provenance == Provenance::SpreadsheetOnly && field.required)
        .map(|field| NewFieldSuggestion {
            api_name: field.api_name.clone(),
            data_type: field.data_type.clone(),
            description: field.description.clone(),
        })
        .collect();
    let description_updates = result
        .fields
        .iter()
        .filter(|field| field.provenance == Provenance::Merged && !field.description.is_empty())
        .map(|field| DescriptionSuggestion {
            api_name: field.api_name.clone(),
            description: field.description.clone(),
        })
        .collect();
    UpdateSuggestions {
        operation_code: result.operation_code.clone(),
        new_required_fields,
        description_updates,
        conflicts: conflict_entries(result),
    }
}

/// Writes every per-operation artifact into `dir`, returning the paths written.
pub fn write_operation_outputs(
    dir: &Path,
    result: &MergeResult,
    generated_at: DateTime<Utc>,
) -> Result<Vec<PathBuf>> {
    let mut written = Vec::with_capacity(4);

    let merged_path = dir.join(MERGED_FIELDS_FILE);
    write_json(&merged_path, result)?;
    written.push(merged_path);

    let conflicts = conflict_entries(result);
    if !conflicts.is_empty() {
        let conflicts_path = dir.join(CONFLICTS_FILE);
        write_json(&conflicts_path, &conflicts)?;
        written.push(conflicts_path);
    }

    let catalog_path = dir.join(FIELD_CATALOG_FILE);
    write_json(&catalog_path, &field_catalog(result, generated_at))?;
    written.push(catalog_path);

    let suggestions_path = dir.join(SUGGESTIONS_FILE);
    write_json(&suggestions_path, &update_suggestions(result))?;
    written.push(suggestions_path);

    debug!(
        "Wrote {} artifact(s) for {} to {:?}",
        written.len(),
        result.operation_code,
        dir
    );
    Ok(written)
}

pub fn write_batch_analysis(output_dir: &Path, result: &BatchAnalysisResult) -> Result<PathBuf> {
    let path = output_dir.join(BATCH_ANALYSIS_FILE);
    write_json(&path, result)
        .with_context(|| format!("Writing batch analysis for {} operation(s)", result.analyzed))?;
    info!("Batch analysis written to {path:?}");
    Ok(path)
}
