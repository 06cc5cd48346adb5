// 🧭 Column Resolution - header aliases resolved once into column indexes
//
// Upstream CSVs rename headers between releases ("Registro_ANS",
// "REGISTRO OPERADORA", ...). Each logical field carries an ordered alias
// list; resolution tries exact matches first, then substring containment,
// and fails closed when a required field has no candidate.

use crate::error::{PipelineError, Result};
use crate::encoding::strip_bom;

/// A logical field and the header names accepted for it
#[derive(Debug, Clone, Copy)]
pub struct FieldSpec {
    pub name: &'static str,
    pub aliases: &'static [&'static str],
    pub required: bool,
}

impl FieldSpec {
    pub const fn required(name: &'static str, aliases: &'static [&'static str]) -> Self {
        FieldSpec { name, aliases, required: true }
    }

    pub const fn optional(name: &'static str, aliases: &'static [&'static str]) -> Self {
        FieldSpec { name, aliases, required: false }
    }
}

/// Trim, drop BOM, uppercase
pub fn normalize_header(header: &str) -> String {
    strip_bom(header.trim()).trim().to_uppercase()
}

/// Find the column index for one field among normalized headers
pub fn find_column(headers: &[String], spec: &FieldSpec) -> Option<usize> {
    spec.aliases
        .iter()
        .find_map(|alias| headers.iter().position(|h| h == alias))
        .or_else(|| {
            spec.aliases
                .iter()
                .find_map(|alias| headers.iter().position(|h| h.contains(alias)))
        })
}

/// Resolve every field at once; indexes follow the order of `specs`.
///
/// Returns `SchemaResolution` listing all unresolved required fields.
pub fn resolve_columns(headers: &[String], specs: &[FieldSpec]) -> Result<Vec<Option<usize>>> {
    let resolved: Vec<Option<usize>> = specs.iter().map(|s| find_column(headers, s)).collect();

    let missing: Vec<&'static str> = specs
        .iter()
        .zip(&resolved)
        .filter(|(spec, idx)| spec.required && idx.is_none())
        .map(|(spec, _)| spec.name)
        .collect();

    if !missing.is_empty() {
        return Err(PipelineError::SchemaResolution(missing));
    }

    Ok(resolved)
}

/// Read a cell by optional index, trimmed; absent columns read as ""
pub fn cell<'a>(record: &'a csv::StringRecord, idx: Option<usize>) -> &'a str {
    idx.and_then(|i| record.get(i)).map(str::trim).unwrap_or("")
}
