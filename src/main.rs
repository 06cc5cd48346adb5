use anyhow::{Context, Result};
use clap::Parser;

use ans_ledger::logging::init_logging;
use ans_ledger::{EnrichmentStatus, Pipeline, PipelineConfig};

/// Validate, enrich and aggregate the consolidated ANS expense ledger
#[derive(Parser)]
#[command(name = "ans-ledger", version)]
struct Cli {
    #[command(flatten)]
    config: PipelineConfig,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging("ans_ledger=info");

    println!("🧾 ANS Ledger - Transformation & Validation");
    println!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");

    let pipeline = Pipeline::new(cli.config);
    let report = pipeline
        .run()
        .context("Pipeline run failed")?;

    println!("\n📂 Ledger: {}", report.ledger_source);
    println!("✓ Loaded {} records", report.records_loaded);
    if report.invalid_identifiers > 0 {
        println!("⚠️  {} records with invalid CNPJ (kept)", report.invalid_identifiers);
    }

    match &report.enrichment {
        EnrichmentStatus::Enriched { registry_operators, matched_records } => {
            println!(
                "✓ Registry: {} operators, {} records matched",
                registry_operators, matched_records
            );
        }
        EnrichmentStatus::Degraded { reason } => {
            println!("⚠️  Registry unavailable, using defaults: {}", reason);
        }
    }

    println!("✓ {} aggregate groups", report.groups);
    println!("\n━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
    println!("🎉 Saved {}", report.output_path.display());
    println!("   sha256 {}", report.output_sha256);

    Ok(())
}
