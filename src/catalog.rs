// 🔎 Query Catalog - read-only view over the pipeline's artifacts
//
// Built once from the registry snapshot, the raw ledger and the aggregate
// file, then shared immutably. A refresh builds a new catalog; nothing here
// mutates after construction.

use crate::aggregation::{round2, AggregateRow};
use crate::artifact::read_rows;
use crate::error::{PipelineError, Result};
use crate::ledger::{load_ledger_file, ExpenseRecord};
use crate::registry::{read_snapshot, RegistryEntry};
use crate::validator::clean_digits;
use serde::Serialize;
use std::collections::HashMap;
use std::path::{Path, PathBuf};

pub const MAX_PAGE_LIMIT: usize = 100;

// ============================================================================
// RESPONSE TYPES
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PageMeta {
    pub page: usize,
    pub limit: usize,
    pub total_records: usize,
    pub total_pages: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct Page<T> {
    pub data: Vec<T>,
    pub meta: PageMeta,
}

/// One quarter of spending for an operator
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExpensePoint {
    pub period: String,
    pub year: String,
    pub quarter: String,
    pub amount: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RegionTotal {
    pub region: String,
    pub total_expense: f64,
}

// ============================================================================
// CATALOG
// ============================================================================

/// Artifact locations
#[derive(Debug, Clone)]
pub struct CatalogPaths {
    pub snapshot: PathBuf,
    pub ledger: PathBuf,
    pub aggregates: PathBuf,
}

#[derive(Debug, Clone, Default)]
pub struct QueryCatalog {
    operators: Vec<RegistryEntry>,
    ledger: Vec<ExpenseRecord>,
    aggregates: Vec<AggregateRow>,
}

impl QueryCatalog {
    pub fn new(
        operators: Vec<RegistryEntry>,
        ledger: Vec<ExpenseRecord>,
        aggregates: Vec<AggregateRow>,
    ) -> Self {
        QueryCatalog { operators, ledger, aggregates }
    }

    /// Load all three artifacts. A missing file loads as an empty table.
    /// An unreadable ledger only costs the expense history; an unreadable
    /// snapshot or aggregate file is an error.
    pub fn load(paths: &CatalogPaths) -> Result<Self> {
        let operators = load_or_empty(&paths.snapshot, read_snapshot)?;
        let ledger = load_or_empty(&paths.ledger, load_ledger_file).unwrap_or_else(|e| {
            tracing::warn!(path = %paths.ledger.display(), error = %e, "ledger unreadable, serving without expense history");
            Vec::new()
        });
        let aggregates = load_or_empty(&paths.aggregates, read_rows::<AggregateRow>)?;

        tracing::info!(
            operators = operators.len(),
            expenses = ledger.len(),
            aggregates = aggregates.len(),
            "query catalog loaded"
        );

        Ok(QueryCatalog::new(operators, ledger, aggregates))
    }

    pub fn has_aggregates(&self) -> bool {
        !self.aggregates.is_empty()
    }

    /// Paginated operator list, optionally filtered by a case-insensitive
    /// search over legal name and registration code
    pub fn list_operators(
        &self,
        page: usize,
        limit: usize,
        search: Option<&str>,
    ) -> Result<Page<RegistryEntry>> {
        if page < 1 {
            return Err(PipelineError::InvalidPage(format!("page must be >= 1, got {}", page)));
        }
        if limit < 1 || limit > MAX_PAGE_LIMIT {
            return Err(PipelineError::InvalidPage(format!(
                "limit must be between 1 and {}, got {}",
                MAX_PAGE_LIMIT, limit
            )));
        }

        let needle = search
            .map(|s| s.trim().to_uppercase())
            .filter(|s| !s.is_empty());

        let matching: Vec<&RegistryEntry> = self
            .operators
            .iter()
            .filter(|op| match &needle {
                Some(n) => {
                    op.legal_name.to_uppercase().contains(n.as_str())
                        || op.registration_code.to_uppercase().contains(n.as_str())
                }
                None => true,
            })
            .collect();

        let total_records = matching.len();
        let data = matching
            .into_iter()
            .skip((page - 1).saturating_mul(limit))
            .take(limit)
            .cloned()
            .collect();

        Ok(Page {
            data,
            meta: PageMeta {
                page,
                limit,
                total_records,
                total_pages: (total_records + limit - 1) / limit,
            },
        })
    }

    pub fn operator(&self, registration_code: &str) -> Option<&RegistryEntry> {
        self.operators
            .iter()
            .find(|op| op.registration_code == registration_code)
    }

    /// Expense history for an operator; `None` when the operator is unknown
    pub fn expenses(&self, registration_code: &str) -> Option<Vec<ExpensePoint>> {
        let operator = self.operator(registration_code)?;
        let target = clean_digits(&operator.identifier);

        let points = self
            .ledger
            .iter()
            .filter(|r| r.tax_id_clean == target)
            .map(|r| ExpensePoint {
                period: format!("{}T{}", r.quarter, r.year),
                year: r.year.clone(),
                quarter: r.quarter.clone(),
                amount: r.amount,
            })
            .collect();

        Some(points)
    }

    /// Regions ranked by summed aggregate totals
    pub fn top_regions(&self, n: usize) -> Vec<RegionTotal> {
        let mut totals: HashMap<&str, f64> = HashMap::new();
        for row in &self.aggregates {
            *totals.entry(row.region.as_str()).or_insert(0.0) += row.total_expense;
        }

        let mut ranked: Vec<RegionTotal> = totals
            .into_iter()
            .map(|(region, total)| RegionTotal {
                region: region.to_string(),
                total_expense: round2(total),
            })
            .collect();

        ranked.sort_by(|a, b| {
            b.total_expense
                .total_cmp(&a.total_expense)
                .then_with(|| a.region.cmp(&b.region))
        });
        ranked.truncate(n);
        ranked
    }
}

fn load_or_empty<T>(path: &Path, load: impl Fn(&Path) -> Result<Vec<T>>) -> Result<Vec<T>> {
    if !path.exists() {
        tracing::warn!(path = %path.display(), "artifact not found, serving empty table");
        return Ok(Vec::new());
    }
    load(path)
}
