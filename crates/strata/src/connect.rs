//! Opening the target database from configuration.

use strata_db::{DbConnection, PostgresParams, Result};
use strata_protocol::ConnectionTarget;
use tracing::info;

pub fn open_connection(target: &ConnectionTarget) -> Result<DbConnection> {
    match target {
        ConnectionTarget::Url(url) => {
            info!(scheme = url.split(':').next().unwrap_or_default(), "Connecting by URL");
            DbConnection::open_from_url(url)
        }
        ConnectionTarget::Postgres {
            host,
            port,
            user,
            password,
            dbname,
        } => {
            info!(host = %host, port, "Connecting to PostgreSQL");
            DbConnection::open_postgres(&PostgresParams {
                host: host.clone(),
                port: *port,
                user: user.clone(),
                password: password.clone(),
                dbname: dbname.clone(),
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use strata_db::{BackendError, SqlExecutor};

    #[test]
    fn sqlite_url_opens() {
        let mut db = open_connection(&ConnectionTarget::Url("sqlite::memory:".to_string())).unwrap();
        let one: i64 = db.query_scalar("SELECT 1", &[]).unwrap();
        assert_eq!(one, 1);
    }

    #[test]
    fn unknown_scheme_is_not_available() {
        let err = open_connection(&ConnectionTarget::Url("mysql://x".to_string())).unwrap_err();
        assert!(matches!(err, BackendError::NotAvailable(_)));
    }
}
