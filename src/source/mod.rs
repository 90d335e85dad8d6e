//! Source provider seam.
//!
//! The reconciliation core only ever talks to the two traits defined here.
//! [`catalog::JsonCatalogSource`] and [`workbook::CsvWorkbookReader`] are the
//! file-backed implementations shipped with the crate.

pub mod catalog;
pub mod workbook;

use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::field::{DatabaseField, SpreadsheetField};

#[derive(Debug, Error)]
pub enum SourceError {
    #[error("reading {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("parsing {path:?}: {source}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("reading sheet {path:?}: {source}")]
    Csv {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },
    #[error("decoding {path:?} as {encoding}")]
    Decode { path: PathBuf, encoding: String },
    #[error("unexpected layout in {path:?}: {message}")]
    Layout { path: PathBuf, message: String },
}

/// Service block found at the top of an API sheet.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ServiceInfo {
    pub service_name: String,
    pub description_zh_tw: String,
    pub description_zh_cn: String,
    pub description_en: String,
    pub service_version: String,
    pub call_mode: String,
    pub page_mode: String,
}

/// One workbook describing (part of) an operation's API surface.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Workbook {
    pub operation_code: String,
    pub api_name: String,
    pub module: String,
    pub method_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub service_info: Option<ServiceInfo>,
    pub fields: Vec<SpreadsheetField>,
    pub header_fields: Vec<SpreadsheetField>,
    pub detail_fields: Vec<SpreadsheetField>,
}

/// Source A: the legacy database field catalog.
pub trait CatalogSource {
    /// `Ok(None)` when no catalog exists for the operation.
    fn existing_field_catalog(
        &self,
        operation_code: &str,
    ) -> Result<Option<Vec<DatabaseField>>, SourceError>;
}

/// Source B: spreadsheet workbooks.
pub trait WorkbookSource {
    /// An empty list when the operation has no workbooks.
    fn workbook_fields(&self, operation_code: &str) -> Result<Vec<Workbook>, SourceError>;
}

impl<T: CatalogSource + ?Sized> CatalogSource for &T {
    fn existing_field_catalog(
        &self,
        operation_code: &str,
    ) -> Result<Option<Vec<DatabaseField>>, SourceError> {
        (**self).existing_field_catalog(operation_code)
    }
}

impl<T: WorkbookSource + ?Sized> WorkbookSource for &T {
    fn workbook_fields(&self, operation_code: &str) -> Result<Vec<Workbook>, SourceError> {
        (**self).workbook_fields(operation_code)
    }
}
