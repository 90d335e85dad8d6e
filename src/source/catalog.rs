use std::{
    fs::File,
    io::{BufReader, ErrorKind},
    path::{Path, PathBuf},
};

use log::{debug, warn};
use serde::Deserialize;

use super::{CatalogSource, SourceError};
use crate::field::{DatabaseField, RawRecord};

pub const CATALOG_FILE_NAME: &str = "field-data.json";

#[derive(Debug, Deserialize)]
struct CatalogDocument {
    #[serde(default)]
    fields: Vec<RawRecord>,
}

/// Reads `<root>/<operation>/field-data.json` documents.
#[derive(Debug, Clone)]
pub struct JsonCatalogSource {
    root: PathBuf,
}

impl JsonCatalogSource {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn catalog_path(&self, operation_code: &str) -> PathBuf {
        self.root.join(operation_code).join(CATALOG_FILE_NAME)
    }
}

impl CatalogSource for JsonCatalogSource {
    fn existing_field_catalog(
        &self,
        operation_code: &str,
    ) -> Result<Option<Vec<DatabaseField>>, SourceError> {
        let path = self.catalog_path(operation_code);
        let file = match File::open(&path) {
            Ok(file) => file,
            Err(err) if err.kind() == ErrorKind::NotFound => {
                debug!("No field catalog at {path:?}");
                return Ok(None);
            }
            Err(source) => return Err(SourceError::Io { path, source }),
        };
        let document: CatalogDocument = serde_json::from_reader(BufReader::new(file))
            .map_err(|source| SourceError::Json {
                path: path.clone(),
                source,
            })?;

        let total = document.fields.len();
        let fields: Vec<DatabaseField> = document
            .fields
            .iter()
            .filter_map(DatabaseField::from_record)
            .collect();
        if fields.len() < total {
            warn!(
                "Dropped {} catalog record(s) without an API name in {:?}",
                total - fields.len(),
                path
            );
        }
        debug!("Loaded {} catalog field(s) from {:?}", fields.len(), path);
        Ok(Some(fields))
    }
}
