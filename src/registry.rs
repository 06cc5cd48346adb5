// 🏥 Operator Registry - externally published directory of active operators
//
// Fetch → decode → resolve columns → clean identifiers → dedup (first wins).
// The cleaned registry is persisted as a snapshot for the query service.

use crate::artifact::{read_rows, write_rows};
use crate::columns::{cell, normalize_header, resolve_columns, FieldSpec};
use crate::encoding::{decode_text, TextEncoding};
use crate::error::{PipelineError, Result};
use crate::validator::clean_digits;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const DEFAULT_REGISTRY_URL: &str =
    "https://dadosabertos.ans.gov.br/FTP/PDA/operadoras_de_plano_de_saude_ativas/Relatorio_cadop.csv";

pub const SNAPSHOT_FILE_NAME: &str = "operadoras_ativas.csv";

// ============================================================================
// REGISTRY ENTRY
// ============================================================================

/// One active operator. Field order is the snapshot column order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegistryEntry {
    /// Digits-only CNPJ
    pub identifier: String,
    pub registration_code: String,
    pub legal_name: String,
    pub region: String,
    pub modality: String,
}

// ============================================================================
// REGISTRY SOURCE
// ============================================================================

/// Where the raw registry bytes come from
pub trait RegistrySource {
    fn fetch(&self) -> Result<Vec<u8>>;

    /// Human-readable location for logs
    fn describe(&self) -> String;
}

/// Download over HTTP(S) with a blocking client
pub struct HttpRegistrySource {
    url: String,
    timeout: Duration,
}

impl HttpRegistrySource {
    pub fn new(url: &str, timeout: Duration) -> Self {
        HttpRegistrySource {
            url: url.to_string(),
            timeout,
        }
    }
}

impl RegistrySource for HttpRegistrySource {
    fn fetch(&self) -> Result<Vec<u8>> {
        let client = reqwest::blocking::Client::builder()
            .timeout(self.timeout)
            .build()?;

        let resp = client.get(&self.url).send()?;
        let status = resp.status();
        if !status.is_success() {
            return Err(PipelineError::RegistryFetch(format!(
                "{} returned HTTP {}",
                self.url, status
            )));
        }

        Ok(resp.bytes()?.to_vec())
    }

    fn describe(&self) -> String {
        self.url.clone()
    }
}

/// Read a registry export already on disk
pub struct FileRegistrySource {
    path: PathBuf,
}

impl FileRegistrySource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        FileRegistrySource { path: path.into() }
    }
}

impl RegistrySource for FileRegistrySource {
    fn fetch(&self) -> Result<Vec<u8>> {
        std::fs::read(&self.path).map_err(|e| {
            PipelineError::RegistryFetch(format!("{}: {}", self.path.display(), e))
        })
    }

    fn describe(&self) -> String {
        self.path.display().to_string()
    }
}

/// Pick the source from a location string: URLs go over HTTP, anything
/// else is read from disk
pub fn source_for(location: &str, timeout: Duration) -> Box<dyn RegistrySource> {
    if location.starts_with("http://") || location.starts_with("https://") {
        Box::new(HttpRegistrySource::new(location, timeout))
    } else {
        Box::new(FileRegistrySource::new(location))
    }
}

// ============================================================================
// REGISTRY
// ============================================================================

const REGISTRY_FIELDS: [FieldSpec; 5] = [
    FieldSpec::required("identifier", &["CNPJ"]),
    FieldSpec::required(
        "registration_code",
        &["REGISTRO_ANS", "REGISTROANS", "REGISTRO_OPERADORA", "REGISTRO"],
    ),
    FieldSpec::optional("legal_name", &["RAZAO_SOCIAL", "RAZAOSOCIAL", "RAZAO"]),
    FieldSpec::required("region", &["UF"]),
    FieldSpec::required("modality", &["MODALIDADE"]),
];

/// Cleaned, deduplicated registry indexed by digits-only CNPJ
#[derive(Debug, Clone, Default)]
pub struct Registry {
    entries: Vec<RegistryEntry>,
    index: HashMap<String, usize>,

    /// Lines dropped for having more fields than the header
    pub skipped_lines: usize,

    /// Later rows discarded because their CNPJ was already seen
    pub duplicates: usize,

    pub encoding: Option<TextEncoding>,
}

impl Registry {
    /// Build from entries, keeping the first occurrence of each identifier
    pub fn from_entries(entries: Vec<RegistryEntry>) -> Self {
        let mut registry = Registry::default();
        for entry in entries {
            registry.insert(entry);
        }
        registry
    }

    fn insert(&mut self, mut entry: RegistryEntry) {
        entry.identifier = clean_digits(&entry.identifier);
        if entry.identifier.is_empty() {
            return;
        }
        if self.index.contains_key(&entry.identifier) {
            self.duplicates += 1;
            return;
        }
        self.index.insert(entry.identifier.clone(), self.entries.len());
        self.entries.push(entry);
    }

    pub fn get(&self, tax_id_clean: &str) -> Option<&RegistryEntry> {
        self.index.get(tax_id_clean).map(|&i| &self.entries[i])
    }

    pub fn entries(&self) -> &[RegistryEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Decode and parse a raw registry export
pub fn parse_registry(bytes: &[u8]) -> Result<Registry> {
    let (text, encoding) = decode_text(bytes);

    let mut reader = csv::ReaderBuilder::new()
        .delimiter(b';')
        .has_headers(true)
        .flexible(true)
        .from_reader(text.as_bytes());

    let headers: Vec<String> = reader.headers()?.iter().map(normalize_header).collect();
    let cols = resolve_columns(&headers, &REGISTRY_FIELDS)?;

    let mut registry = Registry {
        encoding: Some(encoding),
        ..Registry::default()
    };

    for result in reader.records() {
        let row = match result {
            Ok(row) if row.len() <= headers.len() => row,
            _ => {
                registry.skipped_lines += 1;
                continue;
            }
        };

        registry.insert(RegistryEntry {
            identifier: cell(&row, cols[0]).to_string(),
            registration_code: cell(&row, cols[1]).to_string(),
            legal_name: cell(&row, cols[2]).to_string(),
            region: cell(&row, cols[3]).to_string(),
            modality: cell(&row, cols[4]).to_string(),
        });
    }

    if registry.skipped_lines > 0 {
        tracing::warn!(skipped = registry.skipped_lines, "malformed registry lines skipped");
    }

    Ok(registry)
}

/// Fetch and parse in one step
pub fn load_registry(source: &dyn RegistrySource) -> Result<Registry> {
    tracing::info!(source = %source.describe(), "fetching operator registry");
    let bytes = source.fetch()?;
    parse_registry(&bytes)
}

/// Persist the cleaned snapshot consumed by the query service
pub fn write_snapshot(path: &Path, registry: &Registry) -> Result<()> {
    write_rows(path, registry.entries())
}

pub fn read_snapshot(path: &Path) -> Result<Vec<RegistryEntry>> {
    read_rows(path)
}
