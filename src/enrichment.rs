// 🔗 Registry Enricher - left join of the ledger onto the operator registry
//
// Join key is the digits-only CNPJ. Every ledger row survives; unmatched rows
// carry the sentinels. Failures never escape: the caller gets
// `Enrichment::Degraded` with the reason and a sentinel-filled pass-through.

use crate::ledger::ExpenseRecord;
use crate::registry::{load_registry, write_snapshot, Registry, RegistrySource};
use serde::Serialize;
use std::path::Path;

pub const UNKNOWN_REGION: &str = "N/I";
pub const UNKNOWN_MODALITY: &str = "Desconhecida";
pub const UNKNOWN_FIELD: &str = "N/I";

// ============================================================================
// ENRICHED RECORD
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EnrichedRecord {
    pub record: ExpenseRecord,
    pub legal_name: String,
    pub registration_code: String,
    pub region: String,
    pub modality: String,
    pub matched: bool,
}

impl EnrichedRecord {
    /// Row with no registry match: ledger values where present, sentinels
    /// everywhere else
    pub fn unmatched(record: ExpenseRecord) -> Self {
        EnrichedRecord {
            legal_name: or_sentinel(&record.legal_name, UNKNOWN_FIELD),
            registration_code: or_sentinel(&record.registration_code, UNKNOWN_FIELD),
            region: UNKNOWN_REGION.to_string(),
            modality: UNKNOWN_MODALITY.to_string(),
            matched: false,
            record,
        }
    }

    fn resolve(record: ExpenseRecord, registry: &Registry) -> Self {
        let entry = match registry.get(&record.tax_id_clean) {
            Some(entry) => entry,
            None => return EnrichedRecord::unmatched(record),
        };

        // Ledger name wins; registry code wins
        let legal_name = first_non_empty(
            &[record.legal_name.as_str(), entry.legal_name.as_str()],
            UNKNOWN_FIELD,
        );
        let registration_code = first_non_empty(
            &[entry.registration_code.as_str(), record.registration_code.as_str()],
            UNKNOWN_FIELD,
        );

        EnrichedRecord {
            legal_name,
            registration_code,
            region: or_sentinel(&entry.region, UNKNOWN_REGION),
            modality: or_sentinel(&entry.modality, UNKNOWN_MODALITY),
            matched: true,
            record,
        }
    }

    pub fn amount(&self) -> f64 {
        self.record.amount
    }
}

fn or_sentinel(value: &str, sentinel: &str) -> String {
    first_non_empty(&[value], sentinel)
}

fn first_non_empty(values: &[&str], sentinel: &str) -> String {
    values
        .iter()
        .map(|v| v.trim())
        .find(|v| !v.is_empty())
        .unwrap_or(sentinel)
        .to_string()
}

// ============================================================================
// ENRICHMENT OUTCOME
// ============================================================================

#[derive(Debug, Clone)]
pub enum Enrichment {
    /// Registry fetched, snapshot written, join performed
    Enriched {
        records: Vec<EnrichedRecord>,
        registry_size: usize,
        matched: usize,
    },

    /// Registry unusable; ledger passed through with sentinel values
    Degraded {
        records: Vec<EnrichedRecord>,
        reason: String,
    },
}

impl Enrichment {
    pub fn records(&self) -> &[EnrichedRecord] {
        match self {
            Enrichment::Enriched { records, .. } | Enrichment::Degraded { records, .. } => records,
        }
    }

    pub fn into_records(self) -> Vec<EnrichedRecord> {
        match self {
            Enrichment::Enriched { records, .. } | Enrichment::Degraded { records, .. } => records,
        }
    }

    pub fn is_degraded(&self) -> bool {
        matches!(self, Enrichment::Degraded { .. })
    }

    pub fn reason(&self) -> Option<&str> {
        match self {
            Enrichment::Degraded { reason, .. } => Some(reason),
            Enrichment::Enriched { .. } => None,
        }
    }
}

// ============================================================================
// ENRICH
// ============================================================================

/// Left-join an already loaded registry onto the ledger
pub fn join(ledger: &[ExpenseRecord], registry: &Registry) -> Vec<EnrichedRecord> {
    ledger
        .iter()
        .cloned()
        .map(|record| EnrichedRecord::resolve(record, registry))
        .collect()
}

/// Sentinel-filled pass-through used when the registry is unavailable
pub fn pass_through(ledger: &[ExpenseRecord]) -> Vec<EnrichedRecord> {
    ledger.iter().cloned().map(EnrichedRecord::unmatched).collect()
}

/// Fetch the registry, persist its snapshot and join it onto the ledger.
///
/// Never fails: any fetch/decode/schema/persist error yields `Degraded`.
pub fn enrich(
    ledger: &[ExpenseRecord],
    source: &dyn RegistrySource,
    snapshot_path: Option<&Path>,
) -> Enrichment {
    let registry = match load_registry(source) {
        Ok(registry) => registry,
        Err(e) => return degrade(ledger, e.to_string()),
    };

    tracing::info!(
        operators = registry.len(),
        duplicates = registry.duplicates,
        "registry cleaned"
    );

    if let Some(path) = snapshot_path {
        if let Err(e) = write_snapshot(path, &registry) {
            return degrade(ledger, format!("snapshot {}: {}", path.display(), e));
        }
        tracing::info!(path = %path.display(), "registry snapshot written");
    }

    let records = join(ledger, &registry);
    let matched = records.iter().filter(|r| r.matched).count();

    tracing::info!(rows = records.len(), matched, "ledger joined to registry");

    Enrichment::Enriched {
        records,
        registry_size: registry.len(),
        matched,
    }
}

fn degrade(ledger: &[ExpenseRecord], reason: String) -> Enrichment {
    tracing::warn!(%reason, "enrichment degraded, using sentinel values");
    Enrichment::Degraded {
        records: pass_through(ledger),
        reason,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{PipelineError, Result};
    use crate::registry::RegistryEntry;

    struct StaticSource(&'static str);

    impl RegistrySource for StaticSource {
        fn fetch(&self) -> Result<Vec<u8>> {
            Ok(self.0.as_bytes().to_vec())
        }

        fn describe(&self) -> String {
            "static".to_string()
        }
    }

    struct Unreachable;

    impl RegistrySource for Unreachable {
        fn fetch(&self) -> Result<Vec<u8>> {
            Err(PipelineError::RegistryFetch("connection refused".to_string()))
        }

        fn describe(&self) -> String {
            "unreachable".to_string()
        }
    }

    const CADOP: &str = "REGISTRO_ANS;CNPJ;RAZAO_SOCIAL;MODALIDADE;UF\n\
        419761;06.990.590/0001-23;OPERADORA A LTDA;Medicina de Grupo;SP\n";

    fn ledger() -> Vec<ExpenseRecord> {
        vec![
            ExpenseRecord::new("06.990.590/0001-23", 100.0).with_legal_name("OPERADORA A"),
            ExpenseRecord::new("11.222.333/0001-81", 50.0),
            ExpenseRecord::new("06990590000123", 200.0),
        ]
    }

    #[test]
    fn test_left_join_keeps_every_row() {
        let outcome = enrich(&ledger(), &StaticSource(CADOP), None);

        assert!(!outcome.is_degraded());
        let records = outcome.records();
        assert_eq!(records.len(), 3);

        assert_eq!(records[0].region, "SP");
        assert_eq!(records[0].modality, "Medicina de Grupo");
        assert_eq!(records[0].registration_code, "419761");
        assert_eq!(records[0].legal_name, "OPERADORA A");
        // raw identifier untouched
        assert_eq!(records[0].record.identifier, "06.990.590/0001-23");

        assert!(!records[1].matched);
        assert_eq!(records[1].region, UNKNOWN_REGION);
        assert_eq!(records[1].modality, UNKNOWN_MODALITY);

        // registry name used when the ledger carries none
        assert_eq!(records[2].legal_name, "OPERADORA A LTDA");

        match outcome {
            Enrichment::Enriched { matched, registry_size, .. } => {
                assert_eq!(matched, 2);
                assert_eq!(registry_size, 1);
            }
            Enrichment::Degraded { .. } => unreachable!(),
        }
    }

    #[test]
    fn test_unreachable_registry_degrades() {
        for _ in 0..2 {
            let outcome = enrich(&ledger(), &Unreachable, None);

            assert!(outcome.is_degraded());
            assert!(outcome.reason().unwrap().contains("connection refused"));
            let records = outcome.into_records();
            assert_eq!(records.len(), 3);
            assert!(records
                .iter()
                .all(|r| r.region == "N/I" && r.modality == "Desconhecida"));
        }
    }

    #[test]
    fn test_empty_registry_matches_nothing() {
        let outcome = enrich(&ledger(), &StaticSource("CNPJ;REGISTRO_ANS;UF;MODALIDADE\n"), None);

        assert!(!outcome.is_degraded());
        assert!(outcome.records().iter().all(|r| !r.matched && r.region == UNKNOWN_REGION));
    }

    #[test]
    fn test_schema_drift_degrades() {
        let outcome = enrich(&ledger(), &StaticSource("CNPJ;NOME\n06990590000123;X\n"), None);

        assert!(outcome.is_degraded());
        assert!(outcome.reason().unwrap().contains("region"));
        assert_eq!(outcome.records().len(), 3);
    }

    #[test]
    fn test_snapshot_written_on_success() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("operadoras_ativas.csv");

        enrich(&ledger(), &StaticSource(CADOP), Some(&path));

        let snapshot = crate::registry::read_snapshot(&path).unwrap();
        assert_eq!(
            snapshot,
            vec![RegistryEntry {
                identifier: "06990590000123".into(),
                registration_code: "419761".into(),
                legal_name: "OPERADORA A LTDA".into(),
                region: "SP".into(),
                modality: "Medicina de Grupo".into(),
            }]
        );
    }

    #[test]
    fn test_unwritable_snapshot_degrades() {
        let dir = tempfile::tempdir().unwrap();
        // a directory where the file should go
        let path = dir.path().to_path_buf();

        let outcome = enrich(&ledger(), &StaticSource(CADOP), Some(&path));
        assert!(outcome.is_degraded());
    }
}
