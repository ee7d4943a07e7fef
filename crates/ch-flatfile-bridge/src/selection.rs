//! Column selection against a discovered schema.

use serde::Serialize;
use std::collections::HashSet;

use crate::core::ColumnDescriptor;
use crate::error::{BridgeError, Result};

/// A validated, non-empty, ordered subset of a schema's column names.
///
/// Only [`validate_selection`] and [`ColumnSelection::all`] construct one, so
/// holding a `ColumnSelection` means the check already passed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct ColumnSelection {
    columns: Vec<String>,
}

impl ColumnSelection {
    /// Select every column of the schema ("select all").
    pub fn all(descriptors: &[ColumnDescriptor]) -> Result<Self> {
        let names: Vec<&str> = descriptors.iter().map(|d| d.name.as_str()).collect();
        validate_selection(descriptors, &names)
    }

    /// Selected names, in schema order.
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    /// Always false; kept for API symmetry with `len`.
    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    /// Descriptors of the selected columns, in selection order.
    pub fn descriptors(&self, schema: &[ColumnDescriptor]) -> Vec<ColumnDescriptor> {
        self.columns
            .iter()
            .filter_map(|name| schema.iter().find(|d| &d.name == name).cloned())
            .collect()
    }
}

/// Validate a user's column choice against the loaded schema.
///
/// Returns the chosen names in the schema's order, with duplicates collapsed.
///
/// # Errors
///
/// - [`BridgeError::EmptySelection`] if `chosen` is empty
/// - [`BridgeError::UnknownColumn`] naming the first chosen column that is not
///   in `descriptors` (e.g. a stale choice after a schema refresh)
pub fn validate_selection<S: AsRef<str>>(
    descriptors: &[ColumnDescriptor],
    chosen: &[S],
) -> Result<ColumnSelection> {
    if chosen.is_empty() {
        return Err(BridgeError::EmptySelection);
    }

    let known: HashSet<&str> = descriptors.iter().map(|d| d.name.as_str()).collect();
    if let Some(unknown) = chosen.iter().find(|c| !known.contains(c.as_ref())) {
        return Err(BridgeError::UnknownColumn(unknown.as_ref().to_string()));
    }

    let wanted: HashSet<&str> = chosen.iter().map(|c| c.as_ref()).collect();
    let columns = descriptors
        .iter()
        .filter(|d| wanted.contains(d.name.as_str()))
        .map(|d| d.name.clone())
        .collect();

    Ok(ColumnSelection { columns })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn schema() -> Vec<ColumnDescriptor> {
        vec![
            ColumnDescriptor::new("id", "UInt64"),
            ColumnDescriptor::new("customer", "String"),
            ColumnDescriptor::new("amount", "Float64"),
            ColumnDescriptor::new("created_at", "DateTime"),
        ]
    }

    #[test]
    fn test_selection_keeps_schema_order() {
        let sel = validate_selection(&schema(), &["amount", "id"]).unwrap();
        assert_eq!(sel.columns(), &["id".to_string(), "amount".to_string()]);
    }

    #[test]
    fn test_every_non_empty_subset_round_trips() {
        let schema = schema();
        let names: Vec<&str> = schema.iter().map(|d| d.name.as_str()).collect();
        for mask in 1u32..(1 << names.len()) {
            let chosen: Vec<&str> = names
                .iter()
                .enumerate()
                .filter(|(i, _)| mask & (1 << i) != 0)
                .map(|(_, n)| *n)
                .collect();
            // Present the choice reversed; the result must still follow schema order.
            let reversed: Vec<&str> = chosen.iter().rev().copied().collect();
            let sel = validate_selection(&schema, &reversed).unwrap();
            assert_eq!(sel.columns(), chosen.as_slice());
        }
    }

    #[test]
    fn test_empty_selection_rejected() {
        let chosen: [&str; 0] = [];
        let err = validate_selection(&schema(), &chosen).unwrap_err();
        assert!(matches!(err, BridgeError::EmptySelection));
    }

    #[test]
    fn test_empty_selection_rejected_even_for_empty_schema() {
        let chosen: [&str; 0] = [];
        let err = validate_selection(&[], &chosen).unwrap_err();
        assert!(matches!(err, BridgeError::EmptySelection));
    }

    #[test]
    fn test_unknown_column_rejected() {
        let err = validate_selection(&schema(), &["id", "ghost"]).unwrap_err();
        match err {
            BridgeError::UnknownColumn(name) => assert_eq!(name, "ghost"),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_duplicates_collapse() {
        let sel = validate_selection(&schema(), &["id", "id", "customer"]).unwrap();
        assert_eq!(sel.len(), 2);
    }

    #[test]
    fn test_select_all() {
        let sel = ColumnSelection::all(&schema()).unwrap();
        assert_eq!(sel.len(), 4);
        assert_eq!(sel.columns()[0], "id");
        assert!(ColumnSelection::all(&[]).is_err());
    }

    #[test]
    fn test_descriptors_follow_selection() {
        let schema = schema();
        let sel = validate_selection(&schema, &["created_at", "customer"]).unwrap();
        let descs = sel.descriptors(&schema);
        assert_eq!(descs[0], ColumnDescriptor::new("customer", "String"));
        assert_eq!(descs[1], ColumnDescriptor::new("created_at", "DateTime"));
    }
}
