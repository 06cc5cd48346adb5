// ANS Ledger - Query Server
// Read-only HTTP API over the pipeline's artifacts

use anyhow::{Context, Result};
use ans_ledger::aggregation::AGGREGATE_FILE_NAME;
use ans_ledger::api::router;
use ans_ledger::logging::init_logging;
use ans_ledger::{CatalogPaths, QueryCatalog};
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;

#[derive(Parser)]
#[command(name = "ans-server", version)]
struct Cli {
    /// Address to listen on
    #[arg(long, env = "ANS_BIND", default_value = "0.0.0.0:3000")]
    bind: String,

    /// Registry snapshot written by the pipeline
    #[arg(long, env = "ANS_SNAPSHOT", default_value = "data/operadoras_ativas.csv")]
    snapshot: PathBuf,

    /// Raw consolidated ledger
    #[arg(long, env = "ANS_LEDGER", default_value = "../1_Leitura_Transformacao_Dados/consolidado_despesas.csv")]
    ledger: PathBuf,

    /// Aggregate output written by the pipeline
    #[arg(long, env = "ANS_OUTPUT", default_value = AGGREGATE_FILE_NAME)]
    aggregates: PathBuf,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging("ans_ledger=info,tower_http=info");

    println!("🌐 ANS Ledger - Query Server");
    println!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");

    let paths = CatalogPaths {
        snapshot: cli.snapshot.clone(),
        ledger: cli.ledger.clone(),
        aggregates: cli.aggregates.clone(),
    };

    // CSV parsing is blocking
    let catalog = tokio::task::spawn_blocking(move || QueryCatalog::load(&paths))
        .await
        .context("Catalog loader panicked")?
        .context("Failed to load query catalog")?;

    let app = router(Arc::new(catalog));

    let listener = tokio::net::TcpListener::bind(&cli.bind)
        .await
        .with_context(|| format!("Failed to bind to {}", cli.bind))?;

    println!("\n🚀 Server running on http://{}", cli.bind);
    println!("   API: http://{}/api/operators", cli.bind);
    println!("\n   Press Ctrl+C to stop\n");

    axum::serve(listener, app)
        .await
        .context("Failed to start server")?;

    Ok(())
}
