// 🚚 Pipeline Driver - Load → Validate → Enrich → Aggregate → Persist
//
// Load is the only stage allowed to abort on bad data. Validate only
// annotates, Enrich degrades instead of failing, Aggregate is pure, and
// Persist propagates I/O errors.

use crate::aggregation::{aggregate, write_aggregates, AggregateRow};
use crate::artifact::sha256_file;
use crate::config::PipelineConfig;
use crate::enrichment::{enrich, Enrichment};
use crate::error::Result;
use crate::ledger::{load_ledger, ExpenseRecord};
use crate::registry::{source_for, RegistrySource};
use crate::validator::is_valid_cnpj;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::path::PathBuf;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Stage {
    Load,
    Validate,
    Enrich,
    Aggregate,
    Persist,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum EnrichmentStatus {
    Enriched { registry_operators: usize, matched_records: usize },
    Degraded { reason: String },
}

/// Summary of one run, optionally written as JSON
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub run_id: String,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub ledger_source: String,
    pub records_loaded: usize,
    pub invalid_identifiers: usize,
    pub enrichment: EnrichmentStatus,
    pub groups: usize,
    pub output_path: PathBuf,
    pub output_sha256: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub snapshot_path: Option<PathBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub snapshot_sha256: Option<String>,
}

/// Flag each record; returns how many identifiers failed the checksum
pub fn validate_records(records: &mut [ExpenseRecord]) -> usize {
    for record in records.iter_mut() {
        record.cnpj_valid = is_valid_cnpj(&record.identifier);
    }
    records.iter().filter(|r| !r.cnpj_valid).count()
}

pub struct Pipeline {
    config: PipelineConfig,
    source: Box<dyn RegistrySource>,
}

impl Pipeline {
    /// Registry source chosen from the configured location
    pub fn new(config: PipelineConfig) -> Self {
        let source = source_for(&config.registry, config.fetch_timeout());
        Pipeline { config, source }
    }

    /// Registry supplied by the caller; `config.registry` is ignored
    pub fn with_source(config: PipelineConfig, source: Box<dyn RegistrySource>) -> Self {
        Pipeline { config, source }
    }

    pub fn run(&self) -> Result<RunReport> {
        let run_id = uuid::Uuid::new_v4().to_string();
        let started_at = Utc::now();
        let span = tracing::info_span!("pipeline", %run_id);
        let _guard = span.enter();

        // Load
        tracing::info!(stage = ?Stage::Load, "locating ledger");
        let source = self.config.locator().locate()?;
        let mut records = load_ledger(&source)?;
        tracing::info!(stage = ?Stage::Load, source = %source.describe(), records = records.len(), "ledger loaded");

        // Validate
        let invalid = validate_records(&mut records);
        if invalid > 0 {
            tracing::warn!(stage = ?Stage::Validate, invalid, "records with checksum-invalid CNPJ");
        }

        // Enrich
        let snapshot_path = self.config.snapshot_path();
        let enrichment = enrich(&records, self.source.as_ref(), Some(&snapshot_path));
        let status = match &enrichment {
            Enrichment::Enriched { registry_size, matched, .. } => EnrichmentStatus::Enriched {
                registry_operators: *registry_size,
                matched_records: *matched,
            },
            Enrichment::Degraded { reason, .. } => {
                tracing::warn!(stage = ?Stage::Enrich, %reason, "continuing without registry data");
                EnrichmentStatus::Degraded { reason: reason.clone() }
            }
        };
        let snapshot_written = !enrichment.is_degraded();

        // Aggregate
        let rows: Vec<AggregateRow> = aggregate(enrichment.records(), self.config.stddev);
        tracing::info!(stage = ?Stage::Aggregate, groups = rows.len(), "statistics computed");

        // Persist
        write_aggregates(&self.config.output, &rows)?;
        let output_sha256 = sha256_file(&self.config.output)?;
        tracing::info!(stage = ?Stage::Persist, path = %self.config.output.display(), "aggregates written");

        let snapshot_sha256 = if snapshot_written {
            Some(sha256_file(&snapshot_path)?)
        } else {
            None
        };

        let report = RunReport {
            run_id,
            started_at,
            finished_at: Utc::now(),
            ledger_source: source.describe(),
            records_loaded: records.len(),
            invalid_identifiers: invalid,
            enrichment: status,
            groups: rows.len(),
            output_path: self.config.output.clone(),
            output_sha256,
            snapshot_path: snapshot_written.then(|| snapshot_path.clone()),
            snapshot_sha256,
        };

        if let Some(path) = &self.config.report {
            std::fs::write(path, serde_json::to_string_pretty(&report)?)?;
        }

        Ok(report)
    }
}
