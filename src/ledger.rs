// 📒 Ledger Loader - consolidated expense records per operator per quarter
//
// Discovery order: local data dir → upstream output dir → zip archive in the
// upstream dir. The first existing candidate wins; nothing found is fatal.

use crate::columns::{cell, normalize_header, resolve_columns, FieldSpec};
use crate::encoding::decode_text;
use crate::error::{PipelineError, Result};
use crate::validator::clean_digits;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};

pub const LEDGER_FILE_NAME: &str = "consolidado_despesas.csv";
pub const LEDGER_ARCHIVE_NAME: &str = "consolidado_despesas.zip";

// ============================================================================
// EXPENSE RECORD
// ============================================================================

/// One row of the ledger: one operator, one reporting quarter
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExpenseRecord {
    /// Identifier exactly as it appears in the ledger ("06.990.590/0001-23")
    pub identifier: String,

    /// Digits-only form of `identifier`, used as the registry join key
    pub tax_id_clean: String,

    /// Always finite and >= 0.0
    pub amount: f64,

    pub year: String,
    pub quarter: String,

    /// Ledger-carried metadata (may be empty)
    pub legal_name: String,
    pub registration_code: String,

    /// Set by the Validate stage
    pub cnpj_valid: bool,
}

impl ExpenseRecord {
    pub fn new(identifier: &str, amount: f64) -> Self {
        ExpenseRecord {
            identifier: identifier.to_string(),
            tax_id_clean: clean_digits(identifier),
            amount: sanitize_amount(amount),
            year: String::new(),
            quarter: String::new(),
            legal_name: String::new(),
            registration_code: String::new(),
            cnpj_valid: false,
        }
    }

    /// Builder pattern: add legal name
    pub fn with_legal_name(mut self, legal_name: &str) -> Self {
        self.legal_name = legal_name.to_string();
        self
    }

    /// Builder pattern: add registration code
    pub fn with_registration_code(mut self, code: &str) -> Self {
        self.registration_code = code.to_string();
        self
    }

    /// Builder pattern: add reporting period
    pub fn with_period(mut self, year: &str, quarter: &str) -> Self {
        self.year = year.to_string();
        self.quarter = quarter.to_string();
        self
    }
}

// ============================================================================
// AMOUNT PARSING
// ============================================================================

/// Parse a locale-ambiguous amount.
///
/// "1.234,56" → 1234.56, "292907.23" → 292907.23, garbage → 0.0
pub fn parse_amount(raw: &str) -> f64 {
    let raw = raw.trim();
    if raw.is_empty() {
        return 0.0;
    }

    let normalized = if raw.contains(',') {
        raw.replace('.', "").replace(',', ".")
    } else {
        raw.to_string()
    };

    normalized.parse::<f64>().map(sanitize_amount).unwrap_or(0.0)
}

fn sanitize_amount(value: f64) -> f64 {
    if value.is_finite() && value > 0.0 {
        value
    } else {
        0.0
    }
}

// ============================================================================
// COLUMN SPECS
// ============================================================================

const LEDGER_FIELDS: [FieldSpec; 6] = [
    FieldSpec::required("identifier", &["CNPJ"]),
    FieldSpec::required("amount", &["VALOR DESPESAS", "VALOR_DESPESAS", "VALOR"]),
    FieldSpec::optional("legal_name", &["RAZAOSOCIAL", "RAZAO_SOCIAL", "RAZAO"]),
    FieldSpec::optional("registration_code", &["REGISTROANS", "REGISTRO_ANS", "REGISTRO"]),
    FieldSpec::optional("year", &["ANO"]),
    FieldSpec::optional("quarter", &["TRIMESTRE", "TRIM"]),
];

/// Parse ledger text (`;`-separated, header row required)
pub fn parse_ledger(text: &str) -> Result<Vec<ExpenseRecord>> {
    let mut reader = csv::ReaderBuilder::new()
        .delimiter(b';')
        .has_headers(true)
        .flexible(true)
        .from_reader(text.as_bytes());

    let headers: Vec<String> = reader.headers()?.iter().map(normalize_header).collect();
    let cols = resolve_columns(&headers, &LEDGER_FIELDS).map_err(|e| {
        PipelineError::MalformedInput(format!("ledger header {:?}: {}", headers, e))
    })?;

    let mut records = Vec::new();
    for (line_num, result) in reader.records().enumerate() {
        let row = result.map_err(|e| {
            PipelineError::MalformedInput(format!("ledger line {}: {}", line_num + 2, e))
        })?;

        if row.iter().all(|f| f.trim().is_empty()) {
            continue;
        }

        let record = ExpenseRecord::new(cell(&row, cols[0]), parse_amount(cell(&row, cols[1])))
            .with_legal_name(cell(&row, cols[2]))
            .with_registration_code(cell(&row, cols[3]))
            .with_period(cell(&row, cols[4]), cell(&row, cols[5]));

        records.push(record);
    }

    Ok(records)
}

// ============================================================================
// DISCOVERY
// ============================================================================

/// Where the ledger was found
#[derive(Debug, Clone, PartialEq)]
pub enum LedgerSource {
    File(PathBuf),
    Archive { path: PathBuf, entry: String },
}

impl LedgerSource {
    pub fn describe(&self) -> String {
        match self {
            LedgerSource::File(path) => path.display().to_string(),
            LedgerSource::Archive { path, entry } => format!("{}!{}", path.display(), entry),
        }
    }
}

/// Fixed search order for the ledger input
#[derive(Debug, Clone)]
pub struct LedgerLocator {
    pub data_dir: PathBuf,
    pub upstream_dir: PathBuf,
    pub file_name: String,
    pub archive_name: String,
}

impl LedgerLocator {
    pub fn new(data_dir: impl Into<PathBuf>, upstream_dir: impl Into<PathBuf>) -> Self {
        LedgerLocator {
            data_dir: data_dir.into(),
            upstream_dir: upstream_dir.into(),
            file_name: LEDGER_FILE_NAME.to_string(),
            archive_name: LEDGER_ARCHIVE_NAME.to_string(),
        }
    }

    pub fn candidates(&self) -> Vec<PathBuf> {
        vec![
            self.data_dir.join(&self.file_name),
            self.upstream_dir.join(&self.file_name),
            self.upstream_dir.join(&self.archive_name),
        ]
    }

    pub fn locate(&self) -> Result<LedgerSource> {
        let candidates = self.candidates();

        for path in &candidates[..2] {
            if path.is_file() {
                return Ok(LedgerSource::File(path.clone()));
            }
        }

        let archive = &candidates[2];
        if archive.is_file() {
            return Ok(LedgerSource::Archive {
                path: archive.clone(),
                entry: self.file_name.clone(),
            });
        }

        Err(PipelineError::InputNotFound { candidates })
    }
}

/// Read and parse the ledger from wherever it was found
pub fn load_ledger(source: &LedgerSource) -> Result<Vec<ExpenseRecord>> {
    let bytes = match source {
        LedgerSource::File(path) => std::fs::read(path)?,
        LedgerSource::Archive { path, entry } => read_archive_entry(path, entry)?,
    };

    let (text, encoding) = decode_text(&bytes);
    tracing::debug!(source = %source.describe(), encoding = encoding.name(), "ledger decoded");

    parse_ledger(&text)
}

/// Convenience for callers that already know the file path
pub fn load_ledger_file(path: &Path) -> Result<Vec<ExpenseRecord>> {
    load_ledger(&LedgerSource::File(path.to_path_buf()))
}

fn read_archive_entry(path: &Path, entry: &str) -> Result<Vec<u8>> {
    let file = File::open(path)?;
    let mut archive = zip::ZipArchive::new(file)?;
    let mut zipped = archive.by_name(entry)?;

    let mut bytes = Vec::new();
    zipped.read_to_end(&mut bytes)?;
    Ok(bytes)
}
