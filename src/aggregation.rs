// 📊 Aggregator - per-operator expense statistics
//
// Groups enriched records by (legal name, registration code, modality,
// region) and computes total, mean, standard deviation and count, ranked by
// total descending.

use crate::artifact::write_rows;
use crate::enrichment::{EnrichedRecord, UNKNOWN_FIELD, UNKNOWN_MODALITY, UNKNOWN_REGION};
use crate::error::Result;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

pub const AGGREGATE_FILE_NAME: &str = "despesas_agregadas.csv";

/// Which standard deviation definition to report
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
pub enum StdDevKind {
    /// Divide by n - 1
    #[default]
    Sample,

    /// Divide by n
    Population,
}

/// One ranked summary row. Field order is the output column order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AggregateRow {
    pub legal_name: String,
    pub registration_code: String,
    pub modality: String,
    pub region: String,
    pub total_expense: f64,
    pub mean_expense: f64,
    pub stddev_expense: f64,
    pub record_count: usize,
}

type GroupKey = (String, String, String, String);

fn group_key(record: &EnrichedRecord) -> GroupKey {
    (
        fill(&record.legal_name, UNKNOWN_FIELD),
        fill(&record.registration_code, UNKNOWN_FIELD),
        fill(&record.modality, UNKNOWN_MODALITY),
        fill(&record.region, UNKNOWN_REGION),
    )
}

fn fill(value: &str, sentinel: &str) -> String {
    if value.trim().is_empty() {
        sentinel.to_string()
    } else {
        value.to_string()
    }
}

/// Round to 2 decimals, ties to even
pub fn round2(value: f64) -> f64 {
    (value * 100.0).round_ties_even() / 100.0
}

fn std_dev(values: &[f64], mean: f64, kind: StdDevKind) -> f64 {
    let n = values.len();
    // a single observation has no spread
    if n < 2 {
        return 0.0;
    }

    let squares: f64 = values.iter().map(|v| (v - mean).powi(2)).sum();
    let denominator = match kind {
        StdDevKind::Sample => (n - 1) as f64,
        StdDevKind::Population => n as f64,
    };
    (squares / denominator).sqrt()
}

/// Group, summarize and rank. Ties keep key order (stable sort).
pub fn aggregate(records: &[EnrichedRecord], kind: StdDevKind) -> Vec<AggregateRow> {
    let mut groups: BTreeMap<GroupKey, Vec<f64>> = BTreeMap::new();
    for record in records {
        groups.entry(group_key(record)).or_default().push(record.amount());
    }

    let mut rows: Vec<AggregateRow> = groups
        .into_iter()
        .map(|((legal_name, registration_code, modality, region), values)| {
            let total: f64 = values.iter().sum();
            let mean = total / values.len() as f64;
            let stddev = std_dev(&values, mean, kind);

            AggregateRow {
                legal_name,
                registration_code,
                modality,
                region,
                total_expense: round2(total),
                mean_expense: round2(mean),
                stddev_expense: if stddev.is_finite() { round2(stddev) } else { 0.0 },
                record_count: values.len(),
            }
        })
        .collect();

    rows.sort_by(|a, b| b.total_expense.total_cmp(&a.total_expense));
    rows
}

pub fn write_aggregates(path: &Path, rows: &[AggregateRow]) -> Result<()> {
    write_rows(path, rows)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::enrichment::pass_through;
    use crate::ledger::ExpenseRecord;

    fn record(name: &str, code: &str, amount: f64) -> EnrichedRecord {
        let mut r = EnrichedRecord::unmatched(ExpenseRecord::new("06990590000123", amount));
        r.legal_name = name.to_string();
        r.registration_code = code.to_string();
        r.modality = "Medicina de Grupo".to_string();
        r.region = "SP".to_string();
        r
    }

    #[test]
    fn test_two_operators_scenario() {
        let records = vec![
            record("OPERADORA A", "1", 100.0),
            record("OPERADORA B", "2", 50.0),
            record("OPERADORA A", "1", 200.0),
        ];

        let rows = aggregate(&records, StdDevKind::Sample);

        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].legal_name, "OPERADORA A");
        assert_eq!(rows[0].total_expense, 300.0);
        assert_eq!(rows[0].mean_expense, 150.0);
        assert_eq!(rows[0].stddev_expense, 70.71);
        assert_eq!(rows[0].record_count, 2);

        assert_eq!(rows[1].legal_name, "OPERADORA B");
        assert_eq!(rows[1].total_expense, 50.0);
        assert_eq!(rows[1].mean_expense, 50.0);
        assert_eq!(rows[1].stddev_expense, 0.0);
        assert_eq!(rows[1].record_count, 1);
    }

    #[test]
    fn test_population_stddev() {
        let records = vec![record("A", "1", 100.0), record("A", "1", 200.0)];
        let rows = aggregate(&records, StdDevKind::Population);
        assert_eq!(rows[0].stddev_expense, 50.0);
    }

    #[test]
    fn test_counts_add_up_and_order_is_non_increasing() {
        let records: Vec<EnrichedRecord> = (0..40)
            .map(|i| record(&format!("OP {}", i % 7), &(i % 3).to_string(), (i * 37 % 101) as f64 + 0.333))
            .collect();

        let rows = aggregate(&records, StdDevKind::Sample);

        let counted: usize = rows.iter().map(|r| r.record_count).sum();
        assert_eq!(counted, records.len());
        assert!(rows.windows(2).all(|w| w[0].total_expense >= w[1].total_expense));

        for row in &rows {
            let expected: f64 = records
                .iter()
                .filter(|r| r.legal_name == row.legal_name && r.registration_code == row.registration_code)
                .map(|r| r.amount())
                .sum();
            assert_eq!(row.total_expense, round2(expected));
        }
    }

    #[test]
    fn test_ties_keep_key_order() {
        let records = vec![record("ZETA", "1", 10.0), record("ALFA", "2", 10.0)];
        let rows = aggregate(&records, StdDevKind::Sample);
        assert_eq!(rows[0].legal_name, "ALFA");
        assert_eq!(rows[1].legal_name, "ZETA");
    }

    #[test]
    fn test_missing_keys_grouped_under_sentinels() {
        let ledger = vec![ExpenseRecord::new("1", 10.0), ExpenseRecord::new("2", 5.0)];
        let mut records = pass_through(&ledger);
        records[1].region = "  ".to_string();

        let rows = aggregate(&records, StdDevKind::Sample);
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].legal_name, "N/I");
        assert_eq!(rows[0].registration_code, "N/I");
        assert_eq!(rows[0].region, "N/I");
        assert_eq!(rows[0].modality, "Desconhecida");
        assert_eq!(rows[0].record_count, 2);
    }

    #[test]
    fn test_rounding() {
        assert_eq!(round2(70.710678), 70.71);
        assert_eq!(round2(0.125), 0.12);
        assert_eq!(round2(0.375), 0.38);
        assert_eq!(round2(2.0), 2.0);
    }

    #[test]
    fn test_half_cent_mean_rounds_to_even() {
        let records = vec![record("A", "1", 100.25), record("A", "1", 0.0)];
        let rows = aggregate(&records, StdDevKind::Sample);
        assert_eq!(rows[0].total_expense, 100.25);
        assert_eq!(rows[0].mean_expense, 50.12);
    }

    #[test]
    fn test_write_aggregates_header() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(AGGREGATE_FILE_NAME);
        let rows = aggregate(&[record("A", "1", 12.5)], StdDevKind::Sample);

        write_aggregates(&path, &rows).unwrap();

        let text = std::fs::read_to_string(&path).unwrap();
        let mut lines = text.trim_start_matches('\u{FEFF}').lines();
        assert_eq!(
            lines.next().unwrap(),
            "legal_name;registration_code;modality;region;total_expense;mean_expense;stddev_expense;record_count"
        );
        assert_eq!(lines.next().unwrap(), "A;1;Medicina de Grupo;SP;12.5;12.5;0.0;1");
    }
}
