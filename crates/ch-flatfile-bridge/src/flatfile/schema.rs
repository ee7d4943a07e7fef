//! Header parsing and column type inference for delimited files.

use std::collections::HashSet;
use std::fs::File;
use std::path::Path;

use crate::core::ColumnDescriptor;
use crate::error::{BridgeError, Result};

/// Open a reader that yields every line as a record, header included.
pub(crate) fn open_reader(path: &Path, delimiter: u8) -> Result<csv::Reader<File>> {
    let file = File::open(path)?;
    Ok(csv::ReaderBuilder::new()
        .delimiter(delimiter)
        .has_headers(false)
        .from_reader(file))
}

/// Column names from the first record.
///
/// With `has_header` the record itself holds the names; otherwise columns are
/// named `column_1`, `column_2`, ...
pub(crate) fn column_names(first: &csv::StringRecord, has_header: bool) -> Result<Vec<String>> {
    if !has_header {
        return Ok((1..=first.len()).map(|i| format!("column_{}", i)).collect());
    }

    let mut seen = HashSet::new();
    let mut names = Vec::with_capacity(first.len());
    for (idx, raw) in first.iter().enumerate() {
        let name = if idx == 0 {
            raw.trim_start_matches('\u{feff}').trim()
        } else {
            raw.trim()
        };
        if name.is_empty() {
            return Err(BridgeError::Schema(format!(
                "header cell {} is blank",
                idx + 1
            )));
        }
        if !seen.insert(name.to_string()) {
            return Err(BridgeError::Schema(format!(
                "duplicate column name '{}' in header",
                name
            )));
        }
        names.push(name.to_string());
    }
    Ok(names)
}

/// Running type guess for one column.
#[derive(Debug, Clone, Copy)]
struct TypeCandidate {
    seen: bool,
    int: bool,
    float: bool,
    boolean: bool,
}

impl TypeCandidate {
    fn new() -> Self {
        Self {
            seen: false,
            int: true,
            float: true,
            boolean: true,
        }
    }

    fn update(&mut self, value: &str) {
        self.seen = true;
        if self.int && value.parse::<i64>().is_err() {
            self.int = false;
        }
        if self.float && value.parse::<f64>().is_err() {
            self.float = false;
        }
        if self.boolean && !matches!(value.to_ascii_lowercase().as_str(), "true" | "false") {
            self.boolean = false;
        }
    }

    fn decide(&self) -> &'static str {
        match self {
            TypeCandidate { seen: false, .. } => "String",
            TypeCandidate { int: true, .. } => "Int64",
            TypeCandidate { float: true, .. } => "Float64",
            TypeCandidate { boolean: true, .. } => "Bool",
            _ => "String",
        }
    }
}

/// Discover the columns of a delimited file from at most `sample_rows` data rows.
pub fn infer_schema(
    path: &Path,
    delimiter: u8,
    has_header: bool,
    sample_rows: usize,
) -> Result<Vec<ColumnDescriptor>> {
    let mut reader = open_reader(path, delimiter)?;
    let mut records = reader.records();

    let first = match records.next() {
        Some(record) => record?,
        None => return Err(BridgeError::Schema("file is empty".into())),
    };
    let names = column_names(&first, has_header)?;
    let mut candidates = vec![TypeCandidate::new(); names.len()];

    let mut sample = |record: &csv::StringRecord| {
        for (idx, field) in record.iter().enumerate().take(candidates.len()) {
            let field = field.trim();
            if !field.is_empty() {
                candidates[idx].update(field);
            }
        }
    };

    let mut processed = 0usize;
    if !has_header && sample_rows > 0 {
        sample(&first);
        processed += 1;
    }
    while processed < sample_rows {
        match records.next() {
            Some(record) => sample(&record?),
            None => break,
        }
        processed += 1;
    }

    Ok(names
        .into_iter()
        .zip(candidates)
        .map(|(name, candidate)| ColumnDescriptor::new(name, candidate.decide()))
        .collect())
}
