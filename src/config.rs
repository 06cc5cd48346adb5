// ⚙️ Configuration - every path and knob settable by flag or ANS_* env var
//
// Defaults follow the project layout: ledger under ./data or
// the upstream extraction step's folder, outputs next to the binary's cwd.

use crate::aggregation::{StdDevKind, AGGREGATE_FILE_NAME};
use crate::ledger::LedgerLocator;
use crate::registry::{DEFAULT_REGISTRY_URL, SNAPSHOT_FILE_NAME};
use clap::Args;
use std::path::PathBuf;
use std::time::Duration;

pub const DEFAULT_UPSTREAM_DIR: &str = "../1_Leitura_Transformacao_Dados";

#[derive(Debug, Clone, Args)]
pub struct PipelineConfig {
    /// Local data directory (first place searched for the ledger)
    #[arg(long, env = "ANS_DATA_DIR", default_value = "data")]
    pub data_dir: PathBuf,

    /// Output directory of the extraction step (ledger CSV or zip)
    #[arg(long, env = "ANS_UPSTREAM_DIR", default_value = DEFAULT_UPSTREAM_DIR)]
    pub upstream_dir: PathBuf,

    /// Registry URL or local file path
    #[arg(long, env = "ANS_REGISTRY", default_value = DEFAULT_REGISTRY_URL)]
    pub registry: String,

    /// Registry download timeout in seconds
    #[arg(long, env = "ANS_FETCH_TIMEOUT_SECS", default_value_t = 60)]
    pub fetch_timeout_secs: u64,

    /// Aggregate output file
    #[arg(long, env = "ANS_OUTPUT", default_value = AGGREGATE_FILE_NAME)]
    pub output: PathBuf,

    /// Registry snapshot file [default: <data-dir>/operadoras_ativas.csv]
    #[arg(long, env = "ANS_SNAPSHOT")]
    pub snapshot: Option<PathBuf>,

    /// Standard deviation definition
    #[arg(long, value_enum, env = "ANS_STDDEV", default_value_t = StdDevKind::Sample)]
    pub stddev: StdDevKind,

    /// Write a JSON run report here
    #[arg(long, env = "ANS_REPORT")]
    pub report: Option<PathBuf>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        PipelineConfig {
            data_dir: PathBuf::from("data"),
            upstream_dir: PathBuf::from(DEFAULT_UPSTREAM_DIR),
            registry: DEFAULT_REGISTRY_URL.to_string(),
            fetch_timeout_secs: 60,
            output: PathBuf::from(AGGREGATE_FILE_NAME),
            snapshot: None,
            stddev: StdDevKind::Sample,
            report: None,
        }
    }
}

impl PipelineConfig {
    pub fn locator(&self) -> LedgerLocator {
        LedgerLocator::new(&self.data_dir, &self.upstream_dir)
    }

    pub fn snapshot_path(&self) -> PathBuf {
        self.snapshot
            .clone()
            .unwrap_or_else(|| self.data_dir.join(SNAPSHOT_FILE_NAME))
    }

    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_secs(self.fetch_timeout_secs)
    }
}
