// 💾 Artifact I/O - `;`-separated, UTF-8 with BOM
//
// Both persisted tables (registry snapshot, aggregates) use the same dialect
// so spreadsheet tools on Windows open them with accents intact.

use crate::encoding::decode_text;
use crate::error::Result;
use serde::de::DeserializeOwned;
use serde::Serialize;
use sha2::{Digest, Sha256};
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::Path;

const UTF8_BOM: &[u8] = b"\xEF\xBB\xBF";

/// Serialize rows with a header line; creates parent directories.
pub fn write_rows<T: Serialize>(path: &Path, rows: &[T]) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }

    let mut out = BufWriter::new(File::create(path)?);
    out.write_all(UTF8_BOM)?;

    let mut writer = csv::WriterBuilder::new()
        .delimiter(b';')
        .has_headers(true)
        .from_writer(out);

    for row in rows {
        writer.serialize(row)?;
    }
    writer.flush()?;

    Ok(())
}

/// Read rows back (header names must match the serde field names)
pub fn read_rows<T: DeserializeOwned>(path: &Path) -> Result<Vec<T>> {
    let bytes = fs::read(path)?;
    let (text, _) = decode_text(&bytes);

    let mut reader = csv::ReaderBuilder::new()
        .delimiter(b';')
        .has_headers(true)
        .from_reader(text.as_bytes());

    let mut rows = Vec::new();
    for result in reader.deserialize() {
        rows.push(result?);
    }
    Ok(rows)
}

/// Hex SHA-256 of a written artifact
pub fn sha256_file(path: &Path) -> Result<String> {
    let bytes = fs::read(path)?;
    let mut hasher = Sha256::new();
    hasher.update(&bytes);
    Ok(format!("{:x}", hasher.finalize()))
}
