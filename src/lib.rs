// ANS Operator Expense Ledger - Core Library
// Exposes all modules for use in the pipeline CLI, the query server, and tests

pub mod error;
pub mod validator;      // CNPJ checksum validation
pub mod encoding;       // UTF-8 → Latin-1 → Windows-1252 cascade
pub mod columns;        // Header alias resolution
pub mod artifact;       // `;`-separated UTF-8-with-BOM tables
pub mod ledger;         // Ledger discovery + parsing
pub mod registry;       // Operator registry (CADOP)
pub mod enrichment;     // Left join + sentinel defaults
pub mod aggregation;    // Grouped statistics
pub mod pipeline;       // Load → Validate → Enrich → Aggregate → Persist
pub mod catalog;        // Read-only query snapshot
pub mod config;
pub mod logging;

#[cfg(feature = "server")]
pub mod api;            // HTTP routes over the query catalog

// Re-export commonly used types
pub use error::{PipelineError, Result};
pub use validator::{clean_digits, is_valid_cnpj, validate};
pub use ledger::{
    load_ledger, load_ledger_file, parse_amount, parse_ledger,
    ExpenseRecord, LedgerLocator, LedgerSource,
};
pub use registry::{
    parse_registry, FileRegistrySource, HttpRegistrySource,
    Registry, RegistryEntry, RegistrySource,
};
pub use enrichment::{
    enrich, EnrichedRecord, Enrichment,
    UNKNOWN_MODALITY, UNKNOWN_REGION,
};
pub use aggregation::{aggregate, write_aggregates, AggregateRow, StdDevKind};
pub use pipeline::{validate_records, EnrichmentStatus, Pipeline, RunReport, Stage};
pub use catalog::{CatalogPaths, ExpensePoint, Page, PageMeta, QueryCatalog, RegionTotal};
pub use config::PipelineConfig;

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
