//! Conflict taxonomy, risk level and recommended action for one operation.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::merge::{FieldAttribute, MergedField};

pub const MAX_CONFLICT_EXAMPLES: usize = 3;
/// Operations with more conflicts than this are high risk regardless of kind.
pub const HIGH_RISK_CONFLICT_TOTAL: usize = 10;
pub const DIVERSE_KIND_COUNT: usize = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Severity {
    Low,
    Medium,
    High,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ConflictKind {
    DataType,
    RequiredStatus,
    ColumnMapping,
    Description,
    Other,
}

impl ConflictKind {
    pub fn for_attribute(attribute: FieldAttribute) -> Self {
        match attribute {
            FieldAttribute::DbColumn => ConflictKind::ColumnMapping,
            FieldAttribute::DataType => ConflictKind::DataType,
            FieldAttribute::Description => ConflictKind::Description,
            FieldAttribute::Required => ConflictKind::RequiredStatus,
            _ => ConflictKind::Other,
        }
    }

    pub fn severity(self) -> Severity {
        match self {
            ConflictKind::DataType | ConflictKind::ColumnMapping => Severity::High,
            ConflictKind::RequiredStatus | ConflictKind::Other => Severity::Medium,
            ConflictKind::Description => Severity::Low,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RiskLevel {
    Low,
    Medium,
    High,
}

impl RiskLevel {
    pub const ALL: [RiskLevel; 3] = [RiskLevel::Low, RiskLevel::Medium, RiskLevel::High];
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Recommendation {
    AutoMerge,
    ManualReview,
    Skip,
}

impl Recommendation {
    pub const ALL: [Recommendation; 3] = [
        Recommendation::AutoMerge,
        Recommendation::ManualReview,
        Recommendation::Skip,
    ];
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum SkipReason {
    MissingSpreadsheet,
    MissingDatabase,
    SourceFault { message: String },
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SkipReason::MissingSpreadsheet => f.write_str("missing spreadsheet source"),
            SkipReason::MissingDatabase => f.write_str("missing database source"),
            SkipReason::SourceFault { message } => write!(f, "source fault: {message}"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConflictSummary {
    pub kind: ConflictKind,
    pub count: usize,
    pub severity: Severity,
    pub examples: Vec<String>,
}

/// What the caller knows about an operation before classification.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct OperationContext {
    pub operation_code: String,
    pub has_excel: bool,
    pub has_database: bool,
    pub excel_file_count: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OperationAnalysis {
    pub operation_code: String,
    pub has_excel: bool,
    pub has_database: bool,
    pub excel_file_count: usize,
    pub field_count: usize,
    pub conflict_count: usize,
    pub conflict_types: Vec<ConflictSummary>,
    pub can_auto_merge: bool,
    pub merge_risk: RiskLevel,
    pub recommendation: Recommendation,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub skip_reason: Option<SkipReason>,
}

impl OperationAnalysis {
    /// Terminal state for an operation that could not be analyzed.
    pub fn skipped(context: &OperationContext, reason: SkipReason) -> Self {
        Self {
            operation_code: context.operation_code.clone(),
            has_excel: context.has_excel,
            has_database: context.has_database,
            excel_file_count: context.excel_file_count,
            field_count: 0,
            conflict_count: 0,
            conflict_types: Vec::new(),
            can_auto_merge: false,
            merge_risk: RiskLevel::High,
            recommendation: Recommendation::Skip,
            skip_reason: Some(reason),
        }
    }

    pub fn is_skipped(&self) -> bool {
        self.recommendation == Recommendation::Skip
    }
}

/// Groups every conflict by kind, in the order kinds are first seen.
pub fn summarize_conflicts(fields: &[MergedField]) -> Vec<ConflictSummary> {
    let mut summaries: Vec<ConflictSummary> = Vec::new();
    for field in fields {
        for conflict in &field.conflicts {
            let kind = ConflictKind::for_attribute(conflict.attribute);
            let index = match summaries.iter().position(|summary| summary.kind == kind) {
                Some(index) => index,
                None => {
                    summaries.push(ConflictSummary {
                        kind,
                        count: 0,
                        severity: kind.severity(),
                        examples: Vec::new(),
                    });
                    summaries.len() - 1
                }
            };
            let summary = &mut summaries[index];
            summary.count += 1;
            if summary.examples.len() < MAX_CONFLICT_EXAMPLES {
                summary.examples.push(format!(
                    "{}: {} → {}",
                    field.api_name, conflict.database_value, conflict.spreadsheet_value
                ));
            }
        }
    }
    summaries
}

pub fn assess_risk(summaries: &[ConflictSummary]) -> RiskLevel {
    if summaries.is_empty() {
        return RiskLevel::Low;
    }
    if summaries
        .iter()
        .any(|summary| summary.severity == Severity::High)
    {
        return RiskLevel::High;
    }
    let total: usize = summaries.iter().map(|summary| summary.count).sum();
    if total > HIGH_RISK_CONFLICT_TOTAL {
        return RiskLevel::High;
    }
    if summaries.len() > DIVERSE_KIND_COUNT {
        return RiskLevel::Medium;
    }
    // Textual drift only.
    if summaries
        .iter()
        .all(|summary| summary.severity == Severity::Low)
    {
        return RiskLevel::Low;
    }
    RiskLevel::Medium
}

pub fn recommend(risk: RiskLevel, summaries: &[ConflictSummary]) -> Recommendation {
    match (risk, summaries) {
        (RiskLevel::Low, []) => Recommendation::AutoMerge,
        (RiskLevel::Low, [only]) if only.kind == ConflictKind::Description => {
            Recommendation::AutoMerge
        }
        _ => Recommendation::ManualReview,
    }
}

/// Classifies an operation whose sources were both present.
pub fn classify(context: &OperationContext, fields: &[MergedField]) -> OperationAnalysis {
    let conflict_types = summarize_conflicts(fields);
    let merge_risk = assess_risk(&conflict_types);
    let recommendation = recommend(merge_risk, &conflict_types);
    let conflict_count: usize = conflict_types.iter().map(|summary| summary.count).sum();
    OperationAnalysis {
        operation_code: context.operation_code.clone(),
        has_excel: context.has_excel,
        has_database: context.has_database,
        excel_file_count: context.excel_file_count,
        field_count: fields.len(),
        conflict_count,
        can_auto_merge: conflict_count == 0,
        conflict_types,
        merge_risk,
        recommendation,
        skip_reason: None,
    }
}
