use std::time::Instant;

use anyhow::{Context, Result};
use chrono::Utc;
use log::info;

use crate::{
    batch::{BatchAnalysisResult, BatchAnalyzer},
    config::MergeConfig,
    merge::MergeResult,
    output,
    source::{
        catalog::JsonCatalogSource,
        workbook::{CommonSheetCache, CsvWorkbookReader},
    },
};

/// Analyzes `operation_codes` with the file-backed providers described by
/// `config`, writing artifacts when `config.write_outputs` is set.
///
/// An empty code list analyzes every operation found under the workbook root.
/// The common-sheet cache lives for this call only.
pub fn run_batch<S: AsRef<str>>(
    config: &MergeConfig,
    operation_codes: &[S],
) -> Result<BatchAnalysisResult> {
    let started = Instant::now();
    let encoding = config.encoding()?;
    let delimiter = config.delimiter_byte()?;
    let cache = CommonSheetCache::new();
    let reader = CsvWorkbookReader::new(&config.workbook_root, encoding, delimiter, &cache);
    let catalog = JsonCatalogSource::new(&config.catalog_root);

    let codes: Vec<String> = if operation_codes.is_empty() {
        let scanned = reader
            .scan_operations()
            .with_context(|| format!("Scanning workbooks under {:?}", config.workbook_root))?;
        info!(
            "Discovered {} operation(s) under {:?}",
            scanned.len(),
            config.workbook_root
        );
        scanned
    } else {
        operation_codes
            .iter()
            .map(|code| code.as_ref().to_string())
            .collect()
    };

    let analyzer = BatchAnalyzer::new(catalog, &reader);
    let mut merged: Vec<MergeResult> = Vec::new();
    let result = analyzer.analyze_batch_with(&codes, |outcome| {
        if config.write_outputs
            && let Some(merge_result) = &outcome.merge_result
        {
            merged.push(merge_result.clone());
        }
    });

    if config.write_outputs {
        let generated_at = Utc::now();
        for merge_result in &merged {
            let dir = config.operation_output_dir(&merge_result.operation_code);
            output::write_operation_outputs(&dir, merge_result, generated_at).with_context(
                || format!("Writing outputs for {}", merge_result.operation_code),
            )?;
        }
        output::write_batch_analysis(&config.output_dir, &result)?;
    }

    info!(
        "Processed {} operation(s) in {:.2?}",
        result.analyzed,
        started.elapsed()
    );
    Ok(result)
}
