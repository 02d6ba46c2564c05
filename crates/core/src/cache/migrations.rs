//! Database schema migrations.
//!
//! Uses a version table to track applied migrations. Each migration is a
//! SQL batch applied at most once, in order.

use crate::Error;
use tokio_rusqlite::{Connection, params};

/// Migration list: (version, SQL).
const MIGRATIONS: &[(i64, &str)] = &[(1, include_str!("../../migrations/001_artifacts.sql"))];

/// Run any pending migrations.
///
/// Creates the `_migrations` table if needed, reads the current version,
/// and applies every newer migration inside one transaction.
///
/// # Errors
///
/// Returns an error if a migration SQL fails to execute.
pub async fn run(conn: &Connection) -> Result<(), Error> {
    conn.call(|conn| -> Result<(), Error> {
        conn.execute(
            "CREATE TABLE IF NOT EXISTS _migrations (
                version INTEGER PRIMARY KEY,
                applied_at TEXT NOT NULL
            )",
            [],
        )?;

        let current: i64 =
            conn.query_row("SELECT COALESCE(MAX(version), 0) FROM _migrations", [], |row| row.get(0))?;

        let tx = conn.transaction()?;
        for (version, sql) in MIGRATIONS.iter().filter(|(v, _)| *v > current) {
            tx.execute_batch(sql)
                .map_err(|e| Error::MigrationFailed(format!("version {version}: {e}")))?;
            tx.execute(
                "INSERT INTO _migrations (version, applied_at) VALUES (?1, ?2)",
                params![version, chrono::Utc::now().to_rfc3339()],
            )?;
            tracing::debug!(version, "applied cache migration");
        }
        tx.commit()?;

        Ok(())
    })
    .await
    .map_err(Error::from)
}
