//! Bounded row sample of a configured source.

use serde::Serialize;
use std::collections::BTreeMap;
use tracing::debug;

use crate::core::{Connector, ReadOptions, SourceDescriptor};
use crate::error::Result;
use crate::join::JoinSpec;
use crate::selection::ColumnSelection;

/// Default number of preview rows.
pub const DEFAULT_PREVIEW_ROWS: usize = 100;

/// A tabular sample with display-string values.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Preview {
    /// Column names in selection order.
    pub columns: Vec<String>,
    /// One map per row, keyed by column name. NULL is an empty string.
    pub rows: Vec<BTreeMap<String, String>>,
}

impl Preview {
    /// Rows as vectors in column order, for tabular printing.
    pub fn rows_as_vectors(&self) -> Vec<Vec<String>> {
        self.rows
            .iter()
            .map(|row| {
                self.columns
                    .iter()
                    .map(|c| row.get(c).cloned().unwrap_or_default())
                    .collect()
            })
            .collect()
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// Fetch at most `limit` rows of the selected columns.
///
/// The bound is handed to the connector, which stops reading (or adds a SQL
/// `LIMIT`) so the source is never scanned in full. Nothing is written.
pub async fn preview(
    connector: &dyn Connector,
    source: &SourceDescriptor,
    selection: &ColumnSelection,
    join: Option<&JoinSpec>,
    limit: usize,
) -> Result<Preview> {
    let columns = selection.columns().to_vec();
    let opts = ReadOptions {
        columns: columns.clone(),
        join: join.cloned(),
        batch_size: limit.max(1),
        limit: Some(limit),
        read_ahead: 1,
    };

    let mut rx = connector.read_batches(source, opts);
    let mut rows = Vec::new();
    while let Some(batch) = rx.recv().await {
        for row in batch?.rows {
            if rows.len() >= limit {
                break;
            }
            rows.push(
                columns
                    .iter()
                    .cloned()
                    .zip(row.iter().map(|v| v.to_display()))
                    .collect::<BTreeMap<_, _>>(),
            );
        }
        if rows.len() >= limit {
            break;
        }
    }

    debug!("Preview of {} returned {} rows", source.label(), rows.len());
    Ok(Preview { columns, rows })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rows_as_vectors_follow_column_order() {
        let mut row = BTreeMap::new();
        row.insert("z".to_string(), "1".to_string());
        row.insert("a".to_string(), String::new());
        let preview = Preview {
            columns: vec!["z".to_string(), "a".to_string()],
            rows: vec![row],
        };
        assert_eq!(
            preview.rows_as_vectors(),
            vec![vec!["1".to_string(), String::new()]]
        );
        assert_eq!(preview.len(), 1);
    }
}
