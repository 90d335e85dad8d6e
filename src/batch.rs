//! Runs alignment, merge and classification over many operations.
//!
//! Operations are analyzed one at a time in input order. Nothing is shared
//! between them except the two source providers, and a failing provider only
//! turns the affected operation into a skip result.

use std::collections::BTreeMap;

use log::{debug, info, warn};
use serde::{Deserialize, Serialize};

use crate::{
    merge::{self, MergeResult},
    risk::{self, OperationAnalysis, OperationContext, Recommendation, RiskLevel, SkipReason},
    source::{CatalogSource, SourceError, WorkbookSource},
};

pub const UNKNOWN_MODULE: &str = "OTHER";

/// Module prefix of an operation code: its leading run of ASCII letters.
pub fn module_prefix(operation_code: &str) -> &str {
    let end = operation_code
        .char_indices()
        .find(|(_, ch)| !ch.is_ascii_alphabetic())
        .map(|(index, _)| index)
        .unwrap_or(operation_code.len());
    if end == 0 {
        UNKNOWN_MODULE
    } else {
        &operation_code[..end]
    }
}

/// Analysis of one operation plus the merged catalog it was derived from.
#[derive(Debug, Clone)]
pub struct OperationOutcome {
    pub analysis: OperationAnalysis,
    /// `None` when the operation was skipped.
    pub merge_result: Option<MergeResult>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchSummary {
    pub by_module: BTreeMap<String, usize>,
    pub by_risk: BTreeMap<RiskLevel, usize>,
    pub by_recommendation: BTreeMap<Recommendation, usize>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchAnalysisResult {
    pub total_operations: usize,
    pub analyzed: usize,
    pub can_auto_merge: usize,
    pub need_manual_review: usize,
    pub skipped: usize,
    pub operations: Vec<OperationAnalysis>,
    pub summary: BatchSummary,
}

impl BatchAnalysisResult {
    pub fn from_operations(total_operations: usize, operations: Vec<OperationAnalysis>) -> Self {
        let mut summary = BatchSummary {
            by_module: BTreeMap::new(),
            by_risk: RiskLevel::ALL.iter().map(|risk| (*risk, 0)).collect(),
            by_recommendation: Recommendation::ALL
                .iter()
                .map(|recommendation| (*recommendation, 0))
                .collect(),
        };
        for analysis in &operations {
            *summary
                .by_module
                .entry(module_prefix(&analysis.operation_code).to_string())
                .or_insert(0) += 1;
            *summary.by_risk.entry(analysis.merge_risk).or_insert(0) += 1;
            *summary
                .by_recommendation
                .entry(analysis.recommendation)
                .or_insert(0) += 1;
        }
        let count = |recommendation: Recommendation| {
            summary
                .by_recommendation
                .get(&recommendation)
                .copied()
                .unwrap_or(0)
        };
        Self {
            total_operations,
            analyzed: operations.len(),
            can_auto_merge: count(Recommendation::AutoMerge),
            need_manual_review: count(Recommendation::ManualReview),
            skipped: count(Recommendation::Skip),
            operations,
            summary,
        }
    }
}

pub struct BatchAnalyzer<C, W> {
    catalog: C,
    workbooks: W,
}

impl<C, W> BatchAnalyzer<C, W>
where
    C: CatalogSource,
    W: WorkbookSource,
{
    pub fn new(catalog: C, workbooks: W) -> Self {
        Self { catalog, workbooks }
    }

    pub fn analyze_operation(&self, operation_code: &str) -> OperationAnalysis {
        self.evaluate_operation(operation_code).analysis
    }

    /// Reads both sources, merges and classifies. Never fails: missing sources
    /// and provider faults become skip results.
    pub fn evaluate_operation(&self, operation_code: &str) -> OperationOutcome {
        info!("Analyzing {operation_code}");
        match self.try_evaluate(operation_code) {
            Ok(outcome) => outcome,
            Err(err) => {
                warn!("Skipping {operation_code}: {err}");
                let context = OperationContext {
                    operation_code: operation_code.to_string(),
                    ..OperationContext::default()
                };
                OperationOutcome {
                    analysis: OperationAnalysis::skipped(
                        &context,
                        SkipReason::SourceFault {
                            message: err.to_string(),
                        },
                    ),
                    merge_result: None,
                }
            }
        }
    }

    fn try_evaluate(&self, operation_code: &str) -> Result<OperationOutcome, SourceError> {
        let workbooks = self.workbooks.workbook_fields(operation_code)?;
        if workbooks.is_empty() {
            // An unreadable catalog still exists; the missing spreadsheet is what gets reported.
            let has_database = match self.catalog.existing_field_catalog(operation_code) {
                Ok(catalog) => catalog.is_some(),
                Err(err) => {
                    debug!("Ignoring catalog error for {operation_code}: {err}");
                    true
                }
            };
            let context = OperationContext {
                operation_code: operation_code.to_string(),
                has_database,
                ..OperationContext::default()
            };
            return Ok(Self::skip(&context, SkipReason::MissingSpreadsheet));
        }

        let catalog = self.catalog.existing_field_catalog(operation_code)?;
        let context = OperationContext {
            operation_code: operation_code.to_string(),
            has_excel: true,
            has_database: catalog.is_some(),
            excel_file_count: workbooks.len(),
        };
        let Some(database_fields) = catalog else {
            return Ok(Self::skip(&context, SkipReason::MissingDatabase));
        };

        let merge_result = merge::merge_operation(operation_code, &database_fields, &workbooks);
        debug!(
            "{operation_code}: {} field(s), {} new, {} updated, {} with conflicts",
            merge_result.total_fields,
            merge_result.new_fields,
            merge_result.updated_fields,
            merge_result.conflicting_fields
        );
        let analysis = risk::classify(&context, &merge_result.fields);
        Ok(OperationOutcome {
            analysis,
            merge_result: Some(merge_result),
        })
    }

    fn skip(context: &OperationContext, reason: SkipReason) -> OperationOutcome {
        info!("Skipping {}: {reason}", context.operation_code);
        OperationOutcome {
            analysis: OperationAnalysis::skipped(context, reason),
            merge_result: None,
        }
    }

    pub fn analyze_batch<S: AsRef<str>>(&self, operation_codes: &[S]) -> BatchAnalysisResult {
        self.analyze_batch_with(operation_codes, |_| {})
    }

    /// Like [`Self::analyze_batch`], handing every outcome to `inspect` as it is produced.
    pub fn analyze_batch_with<S, F>(&self, operation_codes: &[S], mut inspect: F) -> BatchAnalysisResult
    where
        S: AsRef<str>,
        F: FnMut(&OperationOutcome),
    {
        let total = operation_codes.len();
        info!("Starting batch analysis of {total} operation(s)");
        let mut operations = Vec::with_capacity(total);
        for (index, code) in operation_codes.iter().enumerate() {
            let outcome = self.evaluate_operation(code.as_ref());
            inspect(&outcome);
            operations.push(outcome.analysis);
            let done = index + 1;
            info!("Progress: {done}/{total} ({}%)", done * 100 / total);
        }
        let result = BatchAnalysisResult::from_operations(total, operations);
        info!(
            "Batch complete: {} auto-merge, {} manual review, {} skipped",
            result.can_auto_merge, result.need_manual_review, result.skipped
        );
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn module_prefix_takes_leading_letters() {
        assert_eq!(module_prefix("ACPI02"), "ACPI");
        assert_eq!(module_prefix("INV11A"), "INV");
        assert_eq!(module_prefix("COPMI"), "COPMI");
        assert_eq!(module_prefix("123"), UNKNOWN_MODULE);
        assert_eq!(module_prefix(""), UNKNOWN_MODULE);
    }

    #[test]
    fn empty_batch_has_zero_filled_tallies() {
        let result = BatchAnalysisResult::from_operations(0, Vec::new());
        assert_eq!(result.analyzed, 0);
        assert_eq!(result.summary.by_risk.len(), 3);
        assert!(result.summary.by_risk.values().all(|count| *count == 0));
        assert_eq!(result.summary.by_recommendation.len(), 3);
        assert!(result.summary.by_module.is_empty());
    }

    #[test]
    fn summary_serializes_with_label_keys() {
        let result = BatchAnalysisResult::from_operations(0, Vec::new());
        let json = serde_json::to_value(&result.summary).unwrap();
        assert_eq!(json["by_risk"]["medium"], 0);
        assert_eq!(json["by_recommendation"]["manual-review"], 0);
    }
}
