//! Identifier validation and quoting for generated ClickHouse SQL.
//!
//! Table and column names cannot be bound as query parameters, so every
//! identifier that reaches a query string goes through [`quote`]:
//! 1. Validate it (non-empty, no NUL byte, bounded length)
//! 2. Escape backslashes and backticks
//! 3. Wrap it in backticks
//!
//! Join predicates are the one exception: they are user-authored SQL passed
//! through verbatim and validated by the server.

use crate::error::{BridgeError, Result};

/// Maximum identifier length accepted by the bridge.
const MAX_IDENTIFIER_LENGTH: usize = 128;

/// Validate an identifier.
///
/// Rejects empty identifiers, identifiers containing NUL bytes and identifiers
/// longer than 128 bytes.
pub fn validate_identifier(name: &str) -> Result<()> {
    if name.is_empty() {
        return Err(BridgeError::Config("Identifier cannot be empty".to_string()));
    }

    if name.contains('\0') {
        return Err(BridgeError::Config(format!(
            "Identifier contains a null byte: {:?}",
            name
        )));
    }

    if name.len() > MAX_IDENTIFIER_LENGTH {
        return Err(BridgeError::Config(format!(
            "Identifier exceeds maximum length of {} bytes (got {} bytes): {:?}",
            MAX_IDENTIFIER_LENGTH,
            name.len(),
            name
        )));
    }

    Ok(())
}

/// Quote a ClickHouse identifier with backticks.
///
/// ```ignore
/// assert_eq!(quote("orders")?, "`orders`");
/// assert_eq!(quote("odd`name")?, "`odd\\`name`");
/// ```
pub fn quote(name: &str) -> Result<String> {
    validate_identifier(name)?;
    Ok(format!(
        "`{}`",
        name.replace('\\', "\\\\").replace('`', "\\`")
    ))
}

/// Qualify a table with its database: `` `db`.`table` ``.
pub fn qualify(database: &str, table: &str) -> Result<String> {
    Ok(format!("{}.{}", quote(database)?, quote(table)?))
}
