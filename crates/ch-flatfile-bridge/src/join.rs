//! Optional join of a database source against one auxiliary table.

use serde::Serialize;

use crate::core::identifier::validate_identifier;
use crate::core::SourceDescriptor;
use crate::error::{BridgeError, Result};

/// An auxiliary table and the predicate joining it to the primary table.
///
/// The predicate is user-authored SQL, passed to the server verbatim.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct JoinSpec {
    pub auxiliary_table: String,
    pub predicate: String,
}

/// Build a join for `source`.
///
/// # Errors
///
/// - [`BridgeError::UnsupportedOperation`] for flat-file sources, whatever the
///   other arguments are
/// - [`BridgeError::InvalidJoin`] if the table or predicate is blank, if the
///   table is not a usable identifier, or if it names the primary table
pub fn build_join(
    source: &SourceDescriptor,
    auxiliary_table: &str,
    predicate: &str,
) -> Result<JoinSpec> {
    let primary = match source {
        SourceDescriptor::FlatFile { .. } => {
            return Err(BridgeError::UnsupportedOperation(
                "joins are only available for database sources".into(),
            ));
        }
        SourceDescriptor::DatabaseTable { table, .. } => table,
    };

    let auxiliary_table = auxiliary_table.trim();
    let predicate = predicate.trim();

    if auxiliary_table.is_empty() {
        return Err(BridgeError::InvalidJoin(
            "auxiliary table is required".into(),
        ));
    }
    if predicate.is_empty() {
        return Err(BridgeError::InvalidJoin("join predicate is required".into()));
    }
    validate_identifier(auxiliary_table)
        .map_err(|e| BridgeError::InvalidJoin(format!("auxiliary table: {}", e)))?;
    if auxiliary_table == primary {
        return Err(BridgeError::InvalidJoin(format!(
            "cannot join table '{}' to itself",
            primary
        )));
    }

    Ok(JoinSpec {
        auxiliary_table: auxiliary_table.to_string(),
        predicate: predicate.to_string(),
    })
}
