// End-to-end runs of the pipeline against files on disk

use ans_ledger::aggregation::AGGREGATE_FILE_NAME;
use ans_ledger::artifact::read_rows;
use ans_ledger::ledger::LEDGER_FILE_NAME;
use ans_ledger::registry::{read_snapshot, SNAPSHOT_FILE_NAME};
use ans_ledger::{
    AggregateRow, CatalogPaths, EnrichmentStatus, Pipeline, PipelineConfig, PipelineError,
    QueryCatalog, RegistrySource,
};
use std::fs;
use std::path::Path;
use tempfile::TempDir;

const LEDGER: &str = "\u{FEFF}CNPJ;RazaoSocial;Trimestre;Ano;Valor Despesas\n\
    06.990.590/0001-23;OPERADORA A;1;2024;100,00\n\
    06.990.590/0001-23;OPERADORA A;2;2024;200,00\n\
    11.222.333/0001-81;OPERADORA B;1;2024;50,00\n\
    12.345.678/0001-00;OPERADORA C;1;2024;abc\n";

const CADOP: &str = "Registro_ANS;CNPJ;Razao_Social;Modalidade;UF\n\
    419761;06990590000123;OPERADORA A LTDA;Medicina de Grupo;SP\n\
    326305;11222333000181;OPERADORA B SA;Cooperativa Médica;PR\n\
    326305;11222333000181;DUPLICADA;Autogestão;RJ\n";

/// Registry served from memory
struct InMemoryRegistry(Vec<u8>);

impl RegistrySource for InMemoryRegistry {
    fn fetch(&self) -> ans_ledger::Result<Vec<u8>> {
        Ok(self.0.clone())
    }

    fn describe(&self) -> String {
        "in-memory".to_string()
    }
}

struct Fixture {
    dir: TempDir,
}

impl Fixture {
    fn new() -> Self {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir_all(dir.path().join("data")).unwrap();
        Fixture { dir }
    }

    fn path(&self, rel: &str) -> std::path::PathBuf {
        self.dir.path().join(rel)
    }

    fn write(&self, rel: &str, content: &str) {
        fs::write(self.path(rel), content).unwrap();
    }

    fn config(&self, registry: &Path) -> PipelineConfig {
        PipelineConfig {
            data_dir: self.path("data"),
            upstream_dir: self.path("upstream"),
            registry: registry.display().to_string(),
            output: self.path(AGGREGATE_FILE_NAME),
            report: Some(self.path("report.json")),
            ..PipelineConfig::default()
        }
    }
}

#[test]
fn test_full_run_with_registry() {
    let fx = Fixture::new();
    fx.write(&format!("data/{}", LEDGER_FILE_NAME), LEDGER);
    fx.write("cadop.csv", CADOP);

    let report = Pipeline::new(fx.config(&fx.path("cadop.csv"))).run().unwrap();

    assert_eq!(report.records_loaded, 4);
    assert_eq!(report.invalid_identifiers, 1);
    assert_eq!(
        report.enrichment,
        EnrichmentStatus::Enriched { registry_operators: 2, matched_records: 3 }
    );

    let rows: Vec<AggregateRow> = read_rows(&fx.path(AGGREGATE_FILE_NAME)).unwrap();
    assert_eq!(rows.len(), 3);
    assert_eq!(rows.iter().map(|r| r.record_count).sum::<usize>(), 4);

    let a = &rows[0];
    assert_eq!(a.legal_name, "OPERADORA A");
    assert_eq!(a.registration_code, "419761");
    assert_eq!(a.region, "SP");
    assert_eq!(a.total_expense, 300.0);
    assert_eq!(a.mean_expense, 150.0);
    assert_eq!(a.stddev_expense, 70.71);
    assert_eq!(a.record_count, 2);

    let b = &rows[1];
    assert_eq!(b.legal_name, "OPERADORA B");
    assert_eq!(b.modality, "Cooperativa Médica");
    assert_eq!(b.total_expense, 50.0);
    assert_eq!(b.stddev_expense, 0.0);

    // unmatched, unparseable amount
    let c = &rows[2];
    assert_eq!(c.region, "N/I");
    assert_eq!(c.modality, "Desconhecida");
    assert_eq!(c.total_expense, 0.0);

    let snapshot = read_snapshot(&fx.path(&format!("data/{}", SNAPSHOT_FILE_NAME))).unwrap();
    assert_eq!(snapshot.len(), 2);
    assert_eq!(snapshot[1].legal_name, "OPERADORA B SA");

    let report_json: serde_json::Value =
        serde_json::from_str(&fs::read_to_string(fx.path("report.json")).unwrap()).unwrap();
    assert_eq!(report_json["enrichment"]["status"], "enriched");
    assert_eq!(report_json["output_sha256"], report.output_sha256);
}

#[test]
fn test_registry_outage_still_produces_output() {
    let fx = Fixture::new();
    fx.write(&format!("data/{}", LEDGER_FILE_NAME), LEDGER);

    let report = Pipeline::new(fx.config(&fx.path("missing-cadop.csv"))).run().unwrap();

    assert!(matches!(report.enrichment, EnrichmentStatus::Degraded { .. }));
    assert!(report.snapshot_sha256.is_none());

    let rows: Vec<AggregateRow> = read_rows(&fx.path(AGGREGATE_FILE_NAME)).unwrap();
    assert_eq!(rows.iter().map(|r| r.record_count).sum::<usize>(), 4);
    assert!(rows.iter().all(|r| r.region == "N/I" && r.modality == "Desconhecida"));
    assert!(rows.windows(2).all(|w| w[0].total_expense >= w[1].total_expense));
    assert!(!fx.path(&format!("data/{}", SNAPSHOT_FILE_NAME)).exists());
}

#[test]
fn test_injected_registry_source_is_used() {
    let fx = Fixture::new();
    fx.write(&format!("data/{}", LEDGER_FILE_NAME), LEDGER);

    // configured location does not exist; the injected source wins
    let config = fx.config(&fx.path("missing-cadop.csv"));
    let source = Box::new(InMemoryRegistry(CADOP.as_bytes().to_vec()));
    let report = Pipeline::with_source(config, source).run().unwrap();

    assert_eq!(
        report.enrichment,
        EnrichmentStatus::Enriched { registry_operators: 2, matched_records: 3 }
    );
    let rows: Vec<AggregateRow> = read_rows(&fx.path(AGGREGATE_FILE_NAME)).unwrap();
    assert_eq!(rows[0].region, "SP");
}

#[test]
fn test_missing_ledger_is_fatal() {
    let fx = Fixture::new();
    fx.write("cadop.csv", CADOP);

    let err = Pipeline::new(fx.config(&fx.path("cadop.csv"))).run().unwrap_err();

    assert!(matches!(err, PipelineError::InputNotFound { .. }));
    assert!(!fx.path(AGGREGATE_FILE_NAME).exists());
}

#[test]
fn test_catalog_reads_pipeline_artifacts() {
    let fx = Fixture::new();
    fx.write(&format!("data/{}", LEDGER_FILE_NAME), LEDGER);
    fx.write("cadop.csv", CADOP);
    Pipeline::new(fx.config(&fx.path("cadop.csv"))).run().unwrap();

    let catalog = QueryCatalog::load(&CatalogPaths {
        snapshot: fx.path(&format!("data/{}", SNAPSHOT_FILE_NAME)),
        ledger: fx.path(&format!("data/{}", LEDGER_FILE_NAME)),
        aggregates: fx.path(AGGREGATE_FILE_NAME),
    })
    .unwrap();

    let page = catalog.list_operators(1, 10, None).unwrap();
    assert_eq!(page.meta.total_records, 2);

    let history = catalog.expenses("419761").unwrap();
    assert_eq!(history.len(), 2);
    assert_eq!(history[0].period, "1T2024");

    let top = catalog.top_regions(5);
    assert_eq!(top[0].region, "SP");
    assert_eq!(top[0].total_expense, 300.0);
}
