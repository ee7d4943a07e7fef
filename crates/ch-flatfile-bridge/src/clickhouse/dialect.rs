//! ClickHouse SQL text for the statements the connector issues.
//!
//! Every identifier goes through [`quote`]; only the join predicate is
//! passed through as written.

use crate::core::identifier::{qualify, quote};
use crate::core::ColumnDescriptor;
use crate::error::Result;
use crate::join::JoinSpec;

/// Row format used for both reads and inserts.
pub const ROW_FORMAT: &str = "JSONCompactEachRow";

/// `SELECT 1`, used as the connection test.
pub fn ping_query() -> String {
    format!("SELECT 1 FORMAT {}", ROW_FORMAT)
}

pub fn list_tables_query(database: &str) -> Result<String> {
    Ok(format!(
        "SHOW TABLES FROM {} FORMAT {}",
        quote(database)?,
        ROW_FORMAT
    ))
}

pub fn describe_query(database: &str, table: &str) -> Result<String> {
    Ok(format!(
        "DESCRIBE TABLE {} FORMAT {}",
        qualify(database, table)?,
        ROW_FORMAT
    ))
}

pub fn exists_query(database: &str, table: &str) -> Result<String> {
    Ok(format!(
        "EXISTS TABLE {} FORMAT {}",
        qualify(database, table)?,
        ROW_FORMAT
    ))
}

/// Build the read query.
///
/// With a join, selected columns are qualified by the primary table name so
/// a column present in both tables still resolves to the primary one.
pub fn select_query(
    database: &str,
    table: &str,
    columns: &[String],
    join: Option<&JoinSpec>,
    limit: Option<usize>,
) -> Result<String> {
    let col_list = columns
        .iter()
        .map(|c| match join {
            Some(_) => Ok(format!("{}.{}", quote(table)?, quote(c)?)),
            None => quote(c),
        })
        .collect::<Result<Vec<_>>>()?
        .join(", ");

    let mut sql = format!("SELECT {} FROM {}", col_list, qualify(database, table)?);

    if let Some(join) = join {
        sql.push_str(&format!(
            " JOIN {} ON {}",
            qualify(database, &join.auxiliary_table)?,
            join.predicate
        ));
    }

    if let Some(limit) = limit {
        sql.push_str(&format!(" LIMIT {}", limit));
    }

    sql.push_str(&format!(" FORMAT {}", ROW_FORMAT));
    Ok(sql)
}

/// `CREATE TABLE IF NOT EXISTS` for a table built from source columns.
///
/// Plain scalar types are made `Nullable` since file cells may be empty.
pub fn create_table_query(
    database: &str,
    table: &str,
    columns: &[ColumnDescriptor],
) -> Result<String> {
    let defs = columns
        .iter()
        .map(|c| Ok(format!("{} {}", quote(&c.name)?, nullable(&c.data_type))))
        .collect::<Result<Vec<_>>>()?
        .join(", ");

    Ok(format!(
        "CREATE TABLE IF NOT EXISTS {} ({}) ENGINE = MergeTree() ORDER BY tuple()",
        qualify(database, table)?,
        defs
    ))
}

/// `INSERT` header; the rows follow in the request body.
pub fn insert_query(database: &str, table: &str, columns: &[ColumnDescriptor]) -> Result<String> {
    let col_list = columns
        .iter()
        .map(|c| quote(&c.name))
        .collect::<Result<Vec<_>>>()?
        .join(", ");

    Ok(format!(
        "INSERT INTO {} ({}) FORMAT {}",
        qualify(database, table)?,
        col_list,
        ROW_FORMAT
    ))
}

fn nullable(data_type: &str) -> String {
    const WRAPPED: [&str; 5] = ["Nullable(", "LowCardinality(", "Array(", "Map(", "Tuple("];
    if WRAPPED.iter().any(|p| data_type.starts_with(p)) {
        data_type.to_string()
    } else {
        format!("Nullable({})", data_type)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cols(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_select_query_plain() {
        let sql = select_query("shop", "orders", &cols(&["id", "amount"]), None, None).unwrap();
        assert_eq!(
            sql,
            "SELECT `id`, `amount` FROM `shop`.`orders` FORMAT JSONCompactEachRow"
        );
    }

    #[test]
    fn test_select_query_with_limit() {
        let sql = select_query("shop", "orders", &cols(&["id"]), None, Some(100)).unwrap();
        assert!(sql.ends_with("LIMIT 100 FORMAT JSONCompactEachRow"));
    }

    #[test]
    fn test_select_query_with_join() {
        let join = JoinSpec {
            auxiliary_table: "customers".to_string(),
            predicate: "orders.cid = customers.id".to_string(),
        };
        let sql =
            select_query("shop", "orders", &cols(&["id", "cid"]), Some(&join), Some(5)).unwrap();
        assert_eq!(
            sql,
            "SELECT `orders`.`id`, `orders`.`cid` FROM `shop`.`orders` \
             JOIN `shop`.`customers` ON orders.cid = customers.id LIMIT 5 \
             FORMAT JSONCompactEachRow"
        );
    }

    #[test]
    fn test_create_table_query() {
        let columns = vec![
            ColumnDescriptor::new("name", "String"),
            ColumnDescriptor::new("age", "Int64"),
            ColumnDescriptor::new("tags", "Array(String)"),
        ];
        let sql = create_table_query("default", "people", &columns).unwrap();
        assert_eq!(
            sql,
            "CREATE TABLE IF NOT EXISTS `default`.`people` \
             (`name` Nullable(String), `age` Nullable(Int64), `tags` Array(String)) \
             ENGINE = MergeTree() ORDER BY tuple()"
        );
    }

    #[test]
    fn test_insert_query() {
        let columns = vec![ColumnDescriptor::new("a", "String")];
        assert_eq!(
            insert_query("db", "t", &columns).unwrap(),
            "INSERT INTO `db`.`t` (`a`) FORMAT JSONCompactEachRow"
        );
    }

    #[test]
    fn test_catalog_queries() {
        assert_eq!(ping_query(), "SELECT 1 FORMAT JSONCompactEachRow");
        assert_eq!(
            list_tables_query("db").unwrap(),
            "SHOW TABLES FROM `db` FORMAT JSONCompactEachRow"
        );
        assert_eq!(
            describe_query("db", "t").unwrap(),
            "DESCRIBE TABLE `db`.`t` FORMAT JSONCompactEachRow"
        );
        assert!(exists_query("db", "").is_err());
    }
}
