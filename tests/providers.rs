mod common;

use std::fs;

use common::{SheetField, TestWorkspace};
use encoding_rs::{Encoding, UTF_8};
use erp_field_merge::{
    CatalogSource, SourceError, WorkbookSource,
    source::{
        catalog::JsonCatalogSource,
        workbook::{CommonSheetCache, CsvWorkbookReader},
    },
};

#[test]
fn workbook_fields_come_from_the_api_sheet() {
    let workspace = TestWorkspace::new();
    workspace.write_workbook(
        "ACP",
        "ACPI02",
        "wf.oapi.payable.doc.data.create",
        &[
            SheetField::new("voucher_no", "string")
                .required()
                .description("單據號碼")
                .column("ACPTA.TA001"),
            SheetField::new("detail_amount", "number").column("ACPTB.TB019"),
            SheetField::new("  ", "string"),
        ],
    );

    let cache = CommonSheetCache::new();
    let reader = CsvWorkbookReader::new(workspace.workbook_root(), UTF_8, None, &cache);
    let workbooks = reader.workbook_fields("ACPI02").expect("read workbooks");

    assert_eq!(workbooks.len(), 1);
    let workbook = &workbooks[0];
    assert_eq!(workbook.module, "ACP");
    assert_eq!(workbook.method_type, "create");
    assert_eq!(workbook.fields.len(), 2);
    let voucher = &workbook.fields[0];
    assert_eq!(voucher.api_name, "voucher_no");
    assert_eq!(voucher.db_column, "ACPTA.TA001");
    assert!(voucher.required);
    assert_eq!(voucher.description, "單據號碼");
    assert_eq!(workbook.header_fields.len(), 1);
    assert_eq!(workbook.detail_fields.len(), 1);
    let service = workbook.service_info.as_ref().expect("service block");
    assert_eq!(service.service_name, "wf.oapi.payable.doc.data.create");
    assert_eq!(service.service_version, "1.0");
}

#[test]
fn common_sheets_are_cached_once_per_cache() {
    let workspace = TestWorkspace::new();
    workspace.write_workbook("ACP", "ACPI02", "wf.oapi.a.create", &[SheetField::new("a", "string")]);
    workspace.write_workbook("ACP", "ACPI03", "wf.oapi.b.create", &[SheetField::new("b", "string")]);

    let cache = CommonSheetCache::new();
    assert!(!cache.is_loaded());
    let reader = CsvWorkbookReader::new(workspace.workbook_root(), UTF_8, None, &cache);
    reader.workbook_fields("ACPI02").expect("first operation");
    assert!(cache.is_loaded());

    // Later workbooks reuse the first workbook's common sheets even if theirs change.
    let second_cover = workspace
        .workbook_root()
        .join("ACP/ACPI03/wf.oapi.b.create/01-cover.csv");
    fs::write(&second_cover, "changed\n").expect("rewrite cover");
    reader.workbook_fields("ACPI03").expect("second operation");

    let common = reader.common_sheets().expect("cached sheets");
    assert_eq!(common.sheets.len(), 4);
    let cover = common.sheet("cover").expect("cover sheet");
    assert_eq!(cover.rows[0][0], "01-cover.csv");

    let fresh = CommonSheetCache::new();
    assert!(!fresh.is_loaded());
}

#[test]
fn workbooks_without_an_api_sheet_are_ignored() {
    let workspace = TestWorkspace::new();
    let dir = workspace.write_workbook("INV", "INVI11", "wf.oapi.item.get", &[]);
    fs::remove_file(dir.join("05-api.csv")).expect("drop api sheet");

    let cache = CommonSheetCache::new();
    let reader = CsvWorkbookReader::new(workspace.workbook_root(), UTF_8, None, &cache);
    assert!(reader.workbook_fields("INVI11").expect("read").is_empty());
}

#[test]
fn scan_lists_operations_across_modules() {
    let workspace = TestWorkspace::new();
    workspace.write_workbook("INV", "INVI11", "wf.oapi.item.get", &[]);
    workspace.write_workbook("ACP", "ACPI02", "wf.oapi.a.create", &[]);
    workspace.write_workbook("ACP", "ACPI02", "wf.oapi.a.update", &[]);
    fs::create_dir_all(workspace.workbook_root().join("ACP/EMPTY")).expect("empty op dir");

    let cache = CommonSheetCache::new();
    let reader = CsvWorkbookReader::new(workspace.workbook_root(), UTF_8, None, &cache);
    assert_eq!(
        reader.scan_operations().expect("scan"),
        vec!["ACPI02".to_string(), "INVI11".to_string()]
    );
    assert_eq!(reader.workbook_fields("ACPI02").expect("read").len(), 2);
}

#[test]
fn missing_workbook_root_has_no_operations() {
    let workspace = TestWorkspace::new();
    let cache = CommonSheetCache::new();
    let reader = CsvWorkbookReader::new(workspace.path().join("absent"), UTF_8, None, &cache);
    assert!(reader.scan_operations().expect("scan").is_empty());
    assert!(reader.workbook_fields("ACPI02").expect("read").is_empty());
}

#[test]
fn big5_sheets_decode_with_configured_encoding() {
    let workspace = TestWorkspace::new();
    let dir = workspace.write_workbook("ACP", "ACPI02", "wf.oapi.a.create", &[]);
    let big5 = Encoding::for_label(b"big5").expect("big5");
    let text = ",,,,欄位名稱,資料型態,必要\n,MF,,,voucher_no,string,Y,,,,,單據號碼\n";
    let (encoded, _, _) = big5.encode(text);
    for name in ["01-cover.csv", "02-history.csv", "03-codes.csv", "04-errors.csv"] {
        fs::write(dir.join(name), "plain,ascii\n").expect("common sheet");
    }
    fs::write(dir.join("05-api.csv"), &encoded[..]).expect("big5 api sheet");

    let cache = CommonSheetCache::new();
    let reader = CsvWorkbookReader::new(workspace.workbook_root(), big5, None, &cache);
    let workbooks = reader.workbook_fields("ACPI02").expect("decode big5");
    assert_eq!(workbooks[0].fields[0].description, "單據號碼");

    let utf8_cache = CommonSheetCache::new();
    let utf8_reader = CsvWorkbookReader::new(workspace.workbook_root(), UTF_8, None, &utf8_cache);
    let err = utf8_reader.workbook_fields("ACPI02").unwrap_err();
    assert!(matches!(err, SourceError::Decode { .. }));
}

#[test]
fn catalog_accepts_camel_case_records() {
    let workspace = TestWorkspace::new();
    workspace.write_catalog(
        "ACPI02",
        &[
            r#"{"apiName":"voucher_no","dbColumn":"TA001","dataType":"varchar","maxLength":"20","description":null}"#,
            r#"{"apiName":null}"#,
        ],
    );
    let source = JsonCatalogSource::new(workspace.catalog_root());
    let fields = source
        .existing_field_catalog("ACPI02")
        .expect("read catalog")
        .expect("catalog present");
    assert_eq!(fields.len(), 1);
    assert_eq!(fields[0].db_column, "TA001");
    assert_eq!(fields[0].max_length, Some(20));
    assert_eq!(fields[0].description, "");
    assert!(source.existing_field_catalog("ACPI99").expect("read").is_none());
}
