//! Identifier quoting and SQL fingerprints for tracing.

/// Double-quote an identifier, doubling embedded quotes.
pub fn quote_ident(name: &str) -> String {
    let mut escaped = String::with_capacity(name.len() + 2);
    escaped.push('"');
    for ch in name.chars() {
        if ch == '"' {
            escaped.push('"');
        }
        escaped.push(ch);
    }
    escaped.push('"');
    escaped
}

/// Quote a dotted path segment by segment: `ns.table` becomes `"ns"."table"`.
pub fn quote_ident_path(path: &str) -> String {
    path.split('.')
        .map(quote_ident)
        .collect::<Vec<_>>()
        .join(".")
}

/// Quote a namespace-qualified name: `"namespace"."table"`.
pub fn quote_qualified(namespace: &str, name: &str) -> String {
    format!("{}.{}", quote_ident(namespace), quote_ident(name))
}

pub(crate) fn sql_op_name(sql: &str) -> &str {
    sql.split_whitespace().next().unwrap_or("unknown")
}

pub(crate) fn hash_sql(sql: &str) -> String {
    // FNV-1a 64-bit
    let mut hash: u64 = 0xcbf29ce484222325;
    for byte in sql.as_bytes() {
        hash ^= *byte as u64;
        hash = hash.wrapping_mul(0x100000001b3);
    }
    format!("{:016x}", hash)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quoting_escapes_embedded_quotes() {
        assert_eq!(quote_ident("plain"), "\"plain\"");
        assert_eq!(quote_ident("we\"ird"), "\"we\"\"ird\"");
        assert_eq!(quote_qualified("public", "users"), "\"public\".\"users\"");
        assert_eq!(quote_ident_path("pg_temp.users_temp"), "\"pg_temp\".\"users_temp\"");
    }

    #[test]
    fn sql_fingerprint_is_stable() {
        assert_eq!(hash_sql("SELECT 1"), hash_sql("SELECT 1"));
        assert_ne!(hash_sql("SELECT 1"), hash_sql("SELECT 2"));
        assert_eq!(hash_sql("SELECT 1").len(), 16);
        assert_eq!(sql_op_name("  UPDATE t SET x = 1"), "UPDATE");
        assert_eq!(sql_op_name(""), "unknown");
    }
}
