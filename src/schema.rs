/*!
 * Database schema reporting
 *
 * Lists the tables of a database and the name and declared type of each
 * column. Every failure (missing file, not a database, refused connection,
 * bad credentials, backend compiled out) yields `None`; callers decide
 * whether that means "omit the section" or "warn the user".
 */

use std::path::Path;
use std::time::Duration;

use sqlx::sqlite::SqliteConnectOptions;
use sqlx::{ConnectOptions, Connection};

use crate::error::Result;
use crate::types::{DatabaseDescriptor, NetworkCredentials};
use crate::{bail, ensure};

/// Upper bound for connecting to and reading a database
pub const SCHEMA_TIMEOUT: Duration = Duration::from_secs(15);

/// Outcome of an interactive connection test
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectionTest {
    /// The structure dump
    Structure(String),
    /// The database could not be read; carries the warning to show
    Unreadable(String),
}

/// Schema report of `descriptor`, or `None` when it cannot be read
pub async fn schema_report(descriptor: &DatabaseDescriptor) -> Option<String> {
    let report = match descriptor {
        DatabaseDescriptor::Embedded { path } => sqlite_report(path).await,
        DatabaseDescriptor::Networked(credentials) => mysql_report(credentials).await,
    };
    if report.is_none() {
        log::info!("No schema available for {} database", descriptor.kind());
    }
    report
}

/// Schema report for the generation path: silently `None` for descriptors
/// a user could not have meant (no SQLite file, incomplete credentials).
pub async fn optional_schema_report(descriptor: Option<&DatabaseDescriptor>) -> Option<String> {
    match descriptor? {
        DatabaseDescriptor::Embedded { path } if !path.is_file() => None,
        DatabaseDescriptor::Networked(credentials) if !credentials.is_complete() => None,
        descriptor => schema_report(descriptor).await,
    }
}

/// Check a descriptor the way a "test connection" button does.
///
/// Incomplete input is an error; an unreachable database is a warning.
pub async fn test_connection(descriptor: &DatabaseDescriptor) -> Result<ConnectionTest> {
    match descriptor {
        DatabaseDescriptor::Embedded { path } => {
            ensure!(
                !path.as_os_str().is_empty(),
                InvalidInput,
                "select a SQLite database file"
            );
            if !path.is_file() {
                return Ok(ConnectionTest::Unreadable(format!(
                    "Could not read the SQLite database {}",
                    path.display()
                )));
            }
        }
        DatabaseDescriptor::Networked(credentials) => {
            if !credentials.is_complete() {
                bail!(
                    InvalidInput,
                    "fill in all MySQL connection fields (host, user, password, database)"
                );
            }
        }
    }

    Ok(match schema_report(descriptor).await {
        Some(report) => ConnectionTest::Structure(report),
        None => ConnectionTest::Unreadable(format!(
            "Could not connect to or read the {} database",
            descriptor.kind()
        )),
    })
}

/// Schema of a SQLite file
pub async fn sqlite_report(path: &Path) -> Option<String> {
    match tokio::time::timeout(SCHEMA_TIMEOUT, read_sqlite(path)).await {
        Ok(Ok(report)) => Some(report),
        Ok(Err(e)) => {
            log::debug!("SQLite schema of {} unavailable: {}", path.display(), e);
            None
        }
        Err(_) => {
            log::debug!("SQLite schema of {} timed out", path.display());
            None
        }
    }
}

async fn read_sqlite(path: &Path) -> std::result::Result<String, sqlx::Error> {
    let mut conn = SqliteConnectOptions::new()
        .filename(path)
        .create_if_missing(false)
        .read_only(true)
        .connect()
        .await?;

    let tables: Vec<String> =
        sqlx::query_scalar("SELECT name FROM sqlite_master WHERE type = 'table'")
            .fetch_all(&mut conn)
            .await?;

    let mut lines = vec![format!("SQLite: {}", path.display())];
    for table in tables {
        let columns: Vec<(String, String)> =
            sqlx::query_as("SELECT name, type FROM pragma_table_info(?1)")
                .bind(&table)
                .fetch_all(&mut conn)
                .await?;
        lines.push(format!("    Table: {}", table));
        for (name, declared) in columns {
            lines.push(format!("        Column: {} ({})", name, declared));
        }
    }

    conn.close().await?;
    Ok(lines.join("\n"))
}

/// Schema of a MySQL database
#[cfg(feature = "mysql")]
pub async fn mysql_report(credentials: &NetworkCredentials) -> Option<String> {
    match tokio::time::timeout(SCHEMA_TIMEOUT, read_mysql(credentials)).await {
        Ok(Ok(report)) => Some(report),
        Ok(Err(e)) => {
            log::debug!(
                "MySQL schema of {}/{} unavailable: {}",
                credentials.host,
                credentials.database,
                e
            );
            None
        }
        Err(_) => {
            log::debug!("MySQL connection to {} timed out", credentials.host);
            None
        }
    }
}

/// Schema of a MySQL database; always `None` without the `mysql` feature
#[cfg(not(feature = "mysql"))]
pub async fn mysql_report(credentials: &NetworkCredentials) -> Option<String> {
    log::warn!(
        "MySQL support not compiled in, skipping schema of {}",
        credentials.host
    );
    None
}

/// Split `host[:port]`
#[cfg_attr(not(feature = "mysql"), allow(dead_code))]
fn split_host(host: &str) -> (&str, Option<u16>) {
    match host.rsplit_once(':') {
        Some((name, port)) => match port.parse() {
            Ok(port) => (name, Some(port)),
            Err(_) => (host, None),
        },
        None => (host, None),
    }
}

#[cfg(feature = "mysql")]
async fn read_mysql(credentials: &NetworkCredentials) -> std::result::Result<String, sqlx::Error> {
    use sqlx::mysql::MySqlConnectOptions;

    let (host, port) = split_host(credentials.host.trim());
    let mut options = MySqlConnectOptions::new()
        .host(host)
        .username(&credentials.user)
        .password(&credentials.password)
        .database(&credentials.database);
    if let Some(port) = port {
        options = options.port(port);
    }
    let mut conn = options.connect().await?;

    let tables: Vec<String> = sqlx::query_scalar(
        "SELECT CAST(TABLE_NAME AS CHAR) FROM information_schema.TABLES \
         WHERE TABLE_SCHEMA = DATABASE() ORDER BY TABLE_NAME",
    )
    .fetch_all(&mut conn)
    .await?;

    let mut lines = vec![format!(
        "MySQL at {} - {}",
        credentials.host, credentials.database
    )];
    for table in tables {
        let columns: Vec<(String, String)> = sqlx::query_as(
            "SELECT CAST(COLUMN_NAME AS CHAR), CAST(COLUMN_TYPE AS CHAR) \
             FROM information_schema.COLUMNS \
             WHERE TABLE_SCHEMA = DATABASE() AND TABLE_NAME = ? ORDER BY ORDINAL_POSITION",
        )
        .bind(&table)
        .fetch_all(&mut conn)
        .await?;
        lines.push(format!("    Table: {}", table));
        for (name, declared) in columns {
            lines.push(format!("        Column: {} ({})", name, declared));
        }
    }

    conn.close().await?;
    Ok(lines.join("\n"))
}
