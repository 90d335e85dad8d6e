//! Run configuration, stored as YAML.
//!
//! ```yaml
//! catalog_root: data/field-catalogs
//! workbook_root: data/workbooks
//! output_dir: out
//! input_encoding: big5
//! delimiter: ","
//! write_outputs: true
//! ```

use std::{
    fs::File,
    io::BufReader,
    path::{Path, PathBuf},
};

use anyhow::{Context, Result, ensure};
use encoding_rs::Encoding;
use serde::{Deserialize, Serialize};

use crate::io_utils;

fn default_write_outputs() -> bool {
    true
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MergeConfig {
    /// Directory holding `<CODE>/field-data.json` database catalogs.
    pub catalog_root: PathBuf,
    /// Directory holding `<MODULE>/<CODE>/<WORKBOOK>/` sheet exports.
    pub workbook_root: PathBuf,
    pub output_dir: PathBuf,
    /// Encoding label of the sheet exports. UTF-8 when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub input_encoding: Option<String>,
    /// Sheet delimiter. When absent, `.tsv` files use tabs and everything else commas.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub delimiter: Option<char>,
    #[serde(default = "default_write_outputs")]
    pub write_outputs: bool,
}

impl MergeConfig {
    pub fn new(
        catalog_root: impl Into<PathBuf>,
        workbook_root: impl Into<PathBuf>,
        output_dir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            catalog_root: catalog_root.into(),
            workbook_root: workbook_root.into(),
            output_dir: output_dir.into(),
            input_encoding: None,
            delimiter: None,
            write_outputs: default_write_outputs(),
        }
    }

    pub fn load(path: &Path) -> Result<Self> {
        let file = File::open(path).with_context(|| format!("Opening config file {path:?}"))?;
        let config: MergeConfig = serde_yaml::from_reader(BufReader::new(file))
            .with_context(|| format!("Parsing config YAML {path:?}"))?;
        config.validate()?;
        Ok(config)
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        self.validate()?;
        let file = File::create(path).with_context(|| format!("Creating config file {path:?}"))?;
        serde_yaml::to_writer(file, self).context("Writing config YAML")
    }

    pub fn validate(&self) -> Result<()> {
        self.encoding()?;
        self.delimiter_byte()?;
        Ok(())
    }

    pub fn encoding(&self) -> Result<&'static Encoding> {
        io_utils::resolve_encoding(self.input_encoding.as_deref())
    }

    pub fn delimiter_byte(&self) -> Result<Option<u8>> {
        let Some(ch) = self.delimiter else {
            return Ok(None);
        };
        ensure!(ch.is_ascii(), "Delimiter '{ch}' must be a single ASCII character");
        Ok(Some(ch as u8))
    }

    pub fn operation_output_dir(&self, operation_code: &str) -> PathBuf {
        self.output_dir.join(operation_code)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn minimal_yaml_uses_defaults() {
        let config: MergeConfig = serde_yaml::from_str(
            "catalog_root: catalogs\nworkbook_root: workbooks\noutput_dir: out\n",
        )
        .expect("parse config");
        assert!(config.write_outputs);
        assert_eq!(config.input_encoding, None);
        assert_eq!(config.delimiter_byte().unwrap(), None);
        assert_eq!(config.encoding().unwrap().name(), "UTF-8");
    }

    #[test]
    fn save_then_load_preserves_settings() {
        let dir = tempdir().expect("temp dir");
        let path = dir.path().join("merge.yml");
        let mut config = MergeConfig::new("catalogs", "workbooks", "out");
        config.input_encoding = Some("big5".to_string());
        config.delimiter = Some(';');
        config.write_outputs = false;
        config.save(&path).expect("save config");

        let loaded = MergeConfig::load(&path).expect("load config");
        assert_eq!(loaded, config);
        assert_eq!(loaded.delimiter_byte().unwrap(), Some(b';'));
        assert_eq!(loaded.encoding().unwrap().name(), "Big5");
    }

    #[test]
    fn load_rejects_unknown_encoding() {
        let dir = tempdir().expect("temp dir");
        let path = dir.path().join("merge.yml");
        std::fs::write(
            &path,
            "catalog_root: c\nworkbook_root: w\noutput_dir: o\ninput_encoding: klingon\n",
        )
        .unwrap();
        let err = MergeConfig::load(&path).unwrap_err();
        assert!(err.to_string().contains("klingon"));
    }

    #[test]
    fn non_ascii_delimiter_is_rejected() {
        let mut config = MergeConfig::new("c", "w", "o");
        config.delimiter = Some('，');
        assert!(config.delimiter_byte().is_err());
    }
}
