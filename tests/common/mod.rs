#![allow(dead_code)]

use std::fs;
use std::path::{Path, PathBuf};

use erp_field_merge::MergeConfig;
use tempfile::{TempDir, tempdir};

const COMMON_SHEETS: [&str; 4] = ["01-cover.csv", "02-history.csv", "03-codes.csv", "04-errors.csv"];
const API_SHEET_COLUMNS: usize = 16;

/// One `MF` row of an API sheet.
#[derive(Debug, Clone, Default)]
pub struct SheetField {
    pub api_name: String,
    pub data_type: String,
    pub required: String,
    pub description: String,
    pub example: String,
    pub remark: String,
}

impl SheetField {
    pub fn new(api_name: &str, data_type: &str) -> Self {
        Self {
            api_name: api_name.to_string(),
            data_type: data_type.to_string(),
            required: "N".to_string(),
            ..Self::default()
        }
    }

    pub fn required(mut self) -> Self {
        self.required = "Y".to_string();
        self
    }

    pub fn description(mut self, description: &str) -> Self {
        self.description = description.to_string();
        self
    }

    pub fn column(mut self, table_column: &str) -> Self {
        self.remark = format!("欄位代號:{table_column}");
        self
    }

    fn row(&self) -> Vec<String> {
        let mut row = vec![String::new(); API_SHEET_COLUMNS];
        row[1] = "MF".to_string();
        row[4] = self.api_name.clone();
        row[5] = self.data_type.clone();
        row[6] = self.required.clone();
        row[11] = self.description.clone();
        row[14] = self.example.clone();
        row[15] = self.remark.clone();
        row
    }
}

/// Scratch directory helper that cleans up files automatically on drop.
pub struct TestWorkspace {
    temp_dir: TempDir,
}

impl TestWorkspace {
    /// Creates a fresh scratch directory for the current test case.
    pub fn new() -> Self {
        Self {
            temp_dir: tempdir().expect("temp dir"),
        }
    }

    /// Returns the root path for all files owned by this workspace.
    pub fn path(&self) -> &Path {
        self.temp_dir.path()
    }

    pub fn catalog_root(&self) -> PathBuf {
        self.path().join("catalogs")
    }

    pub fn workbook_root(&self) -> PathBuf {
        self.path().join("workbooks")
    }

    pub fn output_dir(&self) -> PathBuf {
        self.path().join("out")
    }

    pub fn config(&self) -> MergeConfig {
        MergeConfig::new(self.catalog_root(), self.workbook_root(), self.output_dir())
    }

    /// Writes `contents` into a file under the workspace, creating parent directories.
    pub fn write(&self, name: &str, contents: &str) -> PathBuf {
        let path = self.path().join(name);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).expect("create parent dirs");
        }
        fs::write(&path, contents).expect("write temp file contents");
        path
    }

    /// Writes a database catalog document holding `records` (JSON objects).
    pub fn write_catalog(&self, operation_code: &str, records: &[&str]) -> PathBuf {
        let document = format!(
            "{{\"operation_code\":\"{operation_code}\",\"fields\":[{}]}}",
            records.join(",")
        );
        self.write(
            &format!("catalogs/{operation_code}/field-data.json"),
            &document,
        )
    }

    /// Writes a five-sheet workbook whose API sheet lists `fields`.
    pub fn write_workbook(
        &self,
        module: &str,
        operation_code: &str,
        workbook: &str,
        fields: &[SheetField],
    ) -> PathBuf {
        let dir = self
            .workbook_root()
            .join(module)
            .join(operation_code)
            .join(workbook);
        fs::create_dir_all(&dir).expect("create workbook dir");
        for name in COMMON_SHEETS {
            fs::write(dir.join(name), format!("{name}\nshared,content\n")).expect("common sheet");
        }

        let mut rows: Vec<Vec<String>> = vec![
            vec![workbook.to_string()],
            vec!["服務名稱".to_string(), "服務版本".to_string()],
            vec![workbook.to_string(), "1.0".to_string()],
        ];
        let mut header = vec![String::new(); API_SHEET_COLUMNS];
        header[1] = "類型".to_string();
        header[4] = "欄位名稱".to_string();
        header[5] = "資料型態".to_string();
        header[6] = "必要".to_string();
        rows.push(header);
        rows.extend(fields.iter().map(SheetField::row));

        let mut writer = csv::WriterBuilder::new()
            .flexible(true)
            .from_path(dir.join("05-api.csv"))
            .expect("api sheet");
        for row in rows {
            writer.write_record(&row).expect("write api row");
        }
        writer.flush().expect("flush api sheet");
        dir
    }
}
