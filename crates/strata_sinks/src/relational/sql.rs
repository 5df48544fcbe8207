//! Statement text for table creation, staging and merge.
//!
//! Written once in the PostgreSQL dialect; SQLite accepts the same text.

use strata_db::quote_ident;
use strata_schema::ColumnType;

fn column_defs(columns: &[(String, ColumnType)]) -> String {
    columns
        .iter()
        .map(|(name, ty)| format!("{} {}", quote_ident(name), ty.as_sql()))
        .collect::<Vec<_>>()
        .join(", ")
}

fn column_list(columns: &[(String, ColumnType)], alias: Option<&str>) -> String {
    columns
        .iter()
        .map(|(name, _)| match alias {
            Some(alias) => format!("{}.{}", alias, quote_ident(name)),
            None => quote_ident(name),
        })
        .collect::<Vec<_>>()
        .join(", ")
}

fn key_join(keys: &[String]) -> String {
    keys.iter()
        .map(|key| format!("s.{} = t.{}", quote_ident(key), quote_ident(key)))
        .collect::<Vec<_>>()
        .join(" AND ")
}

/// `target` is already quoted.
pub(crate) fn create_table(target: &str, columns: &[(String, ColumnType)], keys: &[String]) -> String {
    let mut defs = column_defs(columns);
    if !keys.is_empty() {
        let key_cols = keys.iter().map(|k| quote_ident(k)).collect::<Vec<_>>().join(", ");
        defs.push_str(&format!(", PRIMARY KEY ({})", key_cols));
    }
    format!("CREATE TABLE {} ({})", target, defs)
}

/// Staging relations are session-scoped and never carry constraints.
pub(crate) fn create_staging(staging: &str, columns: &[(String, ColumnType)]) -> String {
    format!(
        "CREATE TEMP TABLE {} ({})",
        quote_ident(staging),
        column_defs(columns)
    )
}

pub(crate) fn drop_staging(qualified_staging: &str) -> String {
    format!("DROP TABLE IF EXISTS {}", qualified_staging)
}

/// `None` when every column is a key column.
pub(crate) fn merge_update(
    target: &str,
    staging: &str,
    columns: &[(String, ColumnType)],
    keys: &[String],
) -> Option<String> {
    let assignments = columns
        .iter()
        .filter(|(name, _)| !keys.contains(name))
        .map(|(name, _)| format!("{} = s.{}", quote_ident(name), quote_ident(name)))
        .collect::<Vec<_>>();
    if assignments.is_empty() {
        return None;
    }
    Some(format!(
        "UPDATE {} AS t SET {} FROM {} AS s WHERE {}",
        target,
        assignments.join(", "),
        staging,
        key_join(keys)
    ))
}

pub(crate) fn merge_insert(
    target: &str,
    staging: &str,
    columns: &[(String, ColumnType)],
    keys: &[String],
) -> String {
    let missing = keys
        .iter()
        .map(|key| format!("t.{} IS NULL", quote_ident(key)))
        .collect::<Vec<_>>()
        .join(" AND ");
    format!(
        "INSERT INTO {} ({}) SELECT {} FROM {} AS s LEFT OUTER JOIN {} AS t ON {} WHERE {}",
        target,
        column_list(columns, None),
        column_list(columns, Some("s")),
        staging,
        target,
        key_join(keys),
        missing
    )
}

pub(crate) fn blind_insert(target: &str, staging: &str, columns: &[(String, ColumnType)]) -> String {
    format!(
        "INSERT INTO {} ({}) SELECT {} FROM {} AS s",
        target,
        column_list(columns, None),
        column_list(columns, Some("s")),
        staging
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn columns() -> Vec<(String, ColumnType)> {
        vec![
            ("id".to_string(), ColumnType::BigInt),
            ("name".to_string(), ColumnType::Text),
        ]
    }

    #[test]
    fn create_table_declares_primary_key() {
        let sql = create_table("\"public\".\"users\"", &columns(), &["id".to_string()]);
        assert_eq!(
            sql,
            "CREATE TABLE \"public\".\"users\" (\"id\" bigint, \"name\" character varying, \
             PRIMARY KEY (\"id\"))"
        );
        let sql = create_table("\"public\".\"users\"", &columns(), &[]);
        assert!(!sql.contains("PRIMARY KEY"));
    }

    #[test]
    fn merge_update_sets_only_non_key_columns() {
        let sql = merge_update(
            "\"public\".\"users\"",
            "\"pg_temp\".\"users_temp\"",
            &columns(),
            &["id".to_string()],
        );
        assert_eq!(
            sql.as_deref(),
            Some(
                "UPDATE \"public\".\"users\" AS t SET \"name\" = s.\"name\" \
                 FROM \"pg_temp\".\"users_temp\" AS s WHERE s.\"id\" = t.\"id\""
            )
        );
    }

    #[test]
    fn merge_update_skipped_when_all_columns_are_keys() {
        let keys = vec!["id".to_string(), "name".to_string()];
        assert!(merge_update("t", "s", &columns(), &keys).is_none());
    }

    #[test]
    fn merge_insert_anti_joins_on_every_key() {
        let keys = vec!["id".to_string(), "name".to_string()];
        let sql = merge_insert("\"ns\".\"t\"", "\"temp\".\"t_temp\"", &columns(), &keys);
        assert_eq!(
            sql,
            "INSERT INTO \"ns\".\"t\" (\"id\", \"name\") SELECT s.\"id\", s.\"name\" \
             FROM \"temp\".\"t_temp\" AS s LEFT OUTER JOIN \"ns\".\"t\" AS t \
             ON s.\"id\" = t.\"id\" AND s.\"name\" = t.\"name\" \
             WHERE t.\"id\" IS NULL AND t.\"name\" IS NULL"
        );
    }

    #[test]
    fn blind_insert_lists_columns() {
        assert_eq!(
            blind_insert("\"ns\".\"t\"", "\"temp\".\"t_temp\"", &columns()),
            "INSERT INTO \"ns\".\"t\" (\"id\", \"name\") SELECT s.\"id\", s.\"name\" \
             FROM \"temp\".\"t_temp\" AS s"
        );
    }
}
