//! Reconciles per-operation ERP API field catalogs drawn from a legacy
//! database export and from spreadsheet workbooks.
//!
//! Each operation's two field lists are aligned by normalized API name,
//! merged attribute by attribute with recorded conflicts, and classified
//! into a risk tier with an auto-merge / manual-review / skip recommendation.
//! [`pipeline::run_batch`] drives the whole flow from a [`config::MergeConfig`].

pub mod align;
pub mod batch;
pub mod config;
pub mod field;
pub mod io_utils;
pub mod merge;
pub mod output;
pub mod pipeline;
pub mod risk;
pub mod source;

use std::{env, sync::OnceLock};

use log::LevelFilter;

pub use batch::{BatchAnalysisResult, BatchAnalyzer, OperationOutcome};
pub use config::MergeConfig;
pub use merge::{MergeResult, MergedField};
pub use risk::{OperationAnalysis, Recommendation, RiskLevel};
pub use source::{CatalogSource, SourceError, WorkbookSource};

static LOGGER: OnceLock<()> = OnceLock::new();

/// Installs the `env_logger` backend once. Without `RUST_LOG`, this crate logs at `info`.
pub fn init_logging() {
    LOGGER.get_or_init(|| {
        let mut builder = env_logger::Builder::from_env(env_logger::Env::default());
        if env::var("RUST_LOG").is_err() {
            builder.filter_module("erp_field_merge", LevelFilter::Info);
        }
        let _ = builder.format_timestamp_millis().try_init();
    });
}
