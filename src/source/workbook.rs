//! Workbooks exported sheet-by-sheet as delimited text.
//!
//! Expected layout under the workbook root:
//!
//! ```text
//! <root>/<MODULE>/<OPERATION>/<WORKBOOK>/01-<sheet>.csv
//!                                       /02-<sheet>.csv
//!                                       ...
//!                                       /05-<api sheet>.csv
//! ```
//!
//! Sheets are ordered by file name. The first four are common sheets shared
//! by every workbook and are loaded once into a [`CommonSheetCache`] owned by
//! the caller; the fifth sheet describes the API and is where fields come from.

use std::{
    cell::OnceCell,
    fs,
    io::ErrorKind,
    path::{Path, PathBuf},
};

use encoding_rs::Encoding;
use itertools::Itertools;
use log::{debug, warn};
use serde::Serialize;

use super::{ServiceInfo, SourceError, Workbook, WorkbookSource};
use crate::{
    field::{SpreadsheetField, column_from_remark, parse_required},
    io_utils,
};

pub const COMMON_SHEET_COUNT: usize = 4;
const API_SHEET_INDEX: usize = 4;

const HEADER_KEYWORDS: &[&str] = &["欄位名稱", "欄位", "參數名稱", "名稱", "資料型態", "必要"];
const FIELD_ROW_MARKER: &str = "MF";

const ROW_TYPE_COLUMN: usize = 1;
const API_NAME_COLUMN: usize = 4;
const DATA_TYPE_COLUMN: usize = 5;
const REQUIRED_COLUMN: usize = 6;
const DESCRIPTION_COLUMN: usize = 11;
const EXAMPLE_COLUMN: usize = 14;
const REMARK_COLUMN: usize = 15;

const DEFAULT_SERVICE_VERSION: &str = "1.0";

pub type SheetRows = Vec<Vec<String>>;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Sheet {
    pub name: String,
    pub rows: SheetRows,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CommonSheets {
    pub sheets: Vec<Sheet>,
}

impl CommonSheets {
    pub fn sheet(&self, name: &str) -> Option<&Sheet> {
        self.sheets.iter().find(|sheet| sheet.name == name)
    }
}

/// Holds the common sheets for the lifetime of one run.
///
/// Create one per batch and lend it to the reader; dropping it discards the
/// cached sheets.
#[derive(Debug, Default)]
pub struct CommonSheetCache {
    common: OnceCell<CommonSheets>,
}

impl CommonSheetCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self) -> Option<&CommonSheets> {
        self.common.get()
    }

    pub fn is_loaded(&self) -> bool {
        self.common.get().is_some()
    }

    fn get_or_try_load<F>(&self, load: F) -> Result<&CommonSheets, SourceError>
    where
        F: FnOnce() -> Result<CommonSheets, SourceError>,
    {
        if let Some(common) = self.common.get() {
            return Ok(common);
        }
        let loaded = load()?;
        Ok(self.common.get_or_init(|| loaded))
    }
}

pub struct CsvWorkbookReader<'c> {
    root: PathBuf,
    encoding: &'static Encoding,
    delimiter: Option<u8>,
    cache: &'c CommonSheetCache,
}

impl<'c> CsvWorkbookReader<'c> {
    pub fn new(
        root: impl Into<PathBuf>,
        encoding: &'static Encoding,
        delimiter: Option<u8>,
        cache: &'c CommonSheetCache,
    ) -> Self {
        Self {
            root: root.into(),
            encoding,
            delimiter,
            cache,
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn common_sheets(&self) -> Option<&CommonSheets> {
        self.cache.get()
    }

    /// Every operation code that has at least one workbook directory, sorted.
    pub fn scan_operations(&self) -> Result<Vec<String>, SourceError> {
        let mut codes = Vec::new();
        for module_dir in list_dirs(&self.root)? {
            for operation_dir in list_dirs(&module_dir)? {
                if !list_dirs(&operation_dir)?.is_empty() {
                    codes.push(dir_name(&operation_dir));
                }
            }
        }
        Ok(codes.into_iter().sorted().dedup().collect())
    }

    fn workbook_dirs(&self, operation_code: &str) -> Result<Vec<(String, PathBuf)>, SourceError> {
        let mut found = Vec::new();
        for module_dir in list_dirs(&self.root)? {
            let operation_dir = module_dir.join(operation_code);
            if !operation_dir.is_dir() {
                continue;
            }
            let module = dir_name(&module_dir);
            for workbook_dir in list_dirs(&operation_dir)? {
                found.push((module.clone(), workbook_dir));
            }
        }
        Ok(found)
    }

    fn sheet_files(&self, workbook_dir: &Path) -> Result<Vec<PathBuf>, SourceError> {
        let entries = fs::read_dir(workbook_dir).map_err(|source| SourceError::Io {
            path: workbook_dir.to_path_buf(),
            source,
        })?;
        let mut files = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|source| SourceError::Io {
                path: workbook_dir.to_path_buf(),
                source,
            })?;
            let path = entry.path();
            let is_sheet = path
                .extension()
                .and_then(|ext| ext.to_str())
                .is_some_and(|ext| {
                    ext.eq_ignore_ascii_case("csv") || ext.eq_ignore_ascii_case("tsv")
                });
            if path.is_file() && is_sheet {
                files.push(path);
            }
        }
        files.sort();
        Ok(files)
    }

    fn read_sheet(&self, path: &Path) -> Result<Sheet, SourceError> {
        let delimiter = io_utils::resolve_sheet_delimiter(path, self.delimiter);
        let mut reader =
            io_utils::open_sheet_reader_from_path(path, delimiter).map_err(|source| {
                SourceError::Io {
                    path: path.to_path_buf(),
                    source,
                }
            })?;
        let mut rows = Vec::new();
        for record in reader.byte_records() {
            let record = record.map_err(|source| SourceError::Csv {
                path: path.to_path_buf(),
                source,
            })?;
            let decoded = io_utils::decode_record(&record, self.encoding).ok_or_else(|| {
                SourceError::Decode {
                    path: path.to_path_buf(),
                    encoding: self.encoding.name().to_string(),
                }
            })?;
            rows.push(decoded);
        }
        Ok(Sheet {
            name: sheet_name(path),
            rows,
        })
    }

    /// Reads one workbook directory. `Ok(None)` when it has no API sheet.
    pub fn read_workbook(
        &self,
        module: &str,
        operation_code: &str,
        workbook_dir: &Path,
    ) -> Result<Option<Workbook>, SourceError> {
        let sheet_files = self.sheet_files(workbook_dir)?;
        let api_name = dir_name(workbook_dir);

        if !sheet_files.is_empty() {
            self.cache.get_or_try_load(|| {
                let sheets = sheet_files
                    .iter()
                    .take(COMMON_SHEET_COUNT)
                    .map(|path| self.read_sheet(path))
                    .collect::<Result<Vec<_>, _>>()?;
                debug!(
                    "Cached {} common sheet(s) from {:?}",
                    sheets.len(),
                    workbook_dir
                );
                Ok(CommonSheets { sheets })
            })?;
        }

        let Some(api_sheet_path) = sheet_files.get(API_SHEET_INDEX) else {
            warn!(
                "Workbook {:?} has {} sheet(s); the API sheet is missing",
                workbook_dir,
                sheet_files.len()
            );
            return Ok(None);
        };
        let api_sheet = self.read_sheet(api_sheet_path)?;

        let fields = extract_fields(&api_sheet.rows);
        if fields.is_empty() {
            warn!("No field rows found in {:?}", api_sheet_path);
        }
        let (header_fields, detail_fields) = group_fields(&fields);
        Ok(Some(Workbook {
            operation_code: operation_code.to_string(),
            method_type: method_type(&api_name),
            api_name,
            module: module.to_string(),
            service_info: extract_service_info(&api_sheet.rows),
            fields,
            header_fields,
            detail_fields,
        }))
    }
}

impl WorkbookSource for CsvWorkbookReader<'_> {
    fn workbook_fields(&self, operation_code: &str) -> Result<Vec<Workbook>, SourceError> {
        let mut workbooks = Vec::new();
        for (module, workbook_dir) in self.workbook_dirs(operation_code)? {
            if let Some(workbook) = self.read_workbook(&module, operation_code, &workbook_dir)? {
                debug!(
                    "Read {} field(s) from workbook {}",
                    workbook.fields.len(),
                    workbook.api_name
                );
                workbooks.push(workbook);
            }
        }
        Ok(workbooks)
    }
}

/// Sorted sub-directories of `path`; a missing directory has none.
fn list_dirs(path: &Path) -> Result<Vec<PathBuf>, SourceError> {
    let entries = match fs::read_dir(path) {
        Ok(entries) => entries,
        Err(err) if err.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
        Err(source) => {
            return Err(SourceError::Io {
                path: path.to_path_buf(),
                source,
            });
        }
    };
    let mut dirs = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|source| SourceError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let entry_path = entry.path();
        if entry_path.is_dir() {
            dirs.push(entry_path);
        }
    }
    dirs.sort();
    Ok(dirs)
}

fn dir_name(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default()
}

/// `05-wf.oapi.payable.csv` → `wf.oapi.payable`.
fn sheet_name(path: &Path) -> String {
    let stem = path
        .file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
        .unwrap_or_default();
    match stem.split_once('-') {
        Some((prefix, rest))
            if !prefix.is_empty() && prefix.chars().all(|c| c.is_ascii_digit()) =>
        {
            rest.to_string()
        }
        _ => stem,
    }
}

fn cell(row: &[String], index: usize) -> &str {
    row.get(index).map(|value| value.trim()).unwrap_or("")
}

fn non_empty(value: &str) -> Option<String> {
    if value.is_empty() {
        None
    } else {
        Some(value.to_string())
    }
}

/// Extracts `MF` field rows that follow the sheet's header row.
pub fn extract_fields(rows: &[Vec<String>]) -> Vec<SpreadsheetField> {
    let Some(header_index) = rows.iter().position(|row| {
        row.iter()
            .any(|value| HEADER_KEYWORDS.iter().any(|keyword| value.contains(keyword)))
    }) else {
        warn!("Unable to locate the field header row");
        return Vec::new();
    };

    rows[header_index + 1..]
        .iter()
        .filter(|row| cell(row, ROW_TYPE_COLUMN) == FIELD_ROW_MARKER)
        .filter_map(|row| {
            let api_name = cell(row, API_NAME_COLUMN);
            if api_name.is_empty() {
                return None;
            }
            let remark = cell(row, REMARK_COLUMN);
            Some(SpreadsheetField {
                api_name: api_name.to_string(),
                db_column: column_from_remark(remark).unwrap_or_default(),
                data_type: cell(row, DATA_TYPE_COLUMN).to_string(),
                required: parse_required(cell(row, REQUIRED_COLUMN)),
                description: cell(row, DESCRIPTION_COLUMN).to_string(),
                validation: None,
                example: non_empty(cell(row, EXAMPLE_COLUMN)),
                remark: non_empty(remark),
            })
        })
        .collect()
}

/// Reads the service block: labels on the second row, values on the third.
pub fn extract_service_info(rows: &[Vec<String>]) -> Option<ServiceInfo> {
    let (labels, values) = match rows {
        [_, labels, values, ..] => (labels, values),
        _ => return None,
    };
    let value_for = |keyword: &str| {
        labels
            .iter()
            .position(|label| label.contains(keyword))
            .map(|index| cell(values, index).to_string())
    };
    Some(ServiceInfo {
        service_name: value_for("服務名稱").unwrap_or_default(),
        description_zh_tw: value_for("服務說明(繁體)").unwrap_or_default(),
        description_zh_cn: value_for("服務說明(簡體)").unwrap_or_default(),
        description_en: value_for("服務說明(英文)").unwrap_or_default(),
        service_version: value_for("服務版本")
            .unwrap_or_else(|| DEFAULT_SERVICE_VERSION.to_string()),
        call_mode: value_for("調用模式").unwrap_or_default(),
        page_mode: value_for("分頁模式").unwrap_or_default(),
    })
}

/// `wf.oapi.payable.doc.data.query.get` → `query`.
pub fn method_type(workbook_name: &str) -> String {
    let mut parts = workbook_name.rsplit('.');
    let last = parts.next().unwrap_or_default();
    match (parts.next(), last) {
        (Some(previous @ ("query" | "read")), "get") => previous.to_string(),
        (Some("query"), "get_Parameter") => "query_parameter".to_string(),
        _ => last.to_string(),
    }
}

/// Splits fields into header (單頭) and detail (單身) groups.
pub fn group_fields(
    fields: &[SpreadsheetField],
) -> (Vec<SpreadsheetField>, Vec<SpreadsheetField>) {
    fields.iter().cloned().partition(|field| {
        let is_detail = field.api_name.contains("detail")
            || field.api_name.contains("body")
            || field
                .remark
                .as_deref()
                .is_some_and(|remark| remark.contains("單身"));
        !is_detail
    })
}
