//! Ledger schema migrations.
//!
//! The schema version lives in `PRAGMA user_version`. Each step runs in its
//! own transaction and is safe to re-run against a partially upgraded file.

use sqlx::sqlite::{SqliteConnection, SqlitePool};
use sqlx::Row;
use tracing::{debug, info};

use crate::{Error, Result};

/// Schema version written by this build.
pub const CURRENT_VERSION: i64 = 2;

/// Brings the database up to [`CURRENT_VERSION`].
///
/// # Errors
///
/// Returns an error if a step fails or the file was written by a newer build.
pub async fn run(pool: &SqlitePool) -> Result<()> {
    let found: i64 = sqlx::query_scalar("PRAGMA user_version")
        .fetch_one(pool)
        .await?;

    if found > CURRENT_VERSION {
        return Err(Error::config(format!(
            "ledger schema version {found} is newer than this build supports ({CURRENT_VERSION})"
        )));
    }

    for version in (found + 1)..=CURRENT_VERSION {
        let mut tx = pool.begin().await?;
        match version {
            1 => create_send_records(&mut tx).await?,
            2 => add_reporting_columns(&mut tx).await?,
            _ => {}
        }
        sqlx::query(&format!("PRAGMA user_version = {version}"))
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;
        info!("Ledger schema migrated to version {version}");
    }

    Ok(())
}

/// Version 1: the send table, plus any template-only history.
async fn create_send_records(conn: &mut SqliteConnection) -> Result<()> {
    sqlx::query(
        r"
        CREATE TABLE IF NOT EXISTS send_records (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            recipient_key TEXT NOT NULL,
            campaign_key TEXT NOT NULL,
            sent_at TEXT NOT NULL,
            status TEXT NOT NULL CHECK (status IN ('success', 'failed')),
            provider_message_id TEXT,
            error_detail TEXT,
            UNIQUE(recipient_key, campaign_key)
        )
        ",
    )
    .execute(&mut *conn)
    .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_send_records_sent_at ON send_records(sent_at)")
        .execute(&mut *conn)
        .await?;

    if table_exists(conn, "send_history").await? {
        import_legacy_history(conn).await?;
    }

    Ok(())
}

/// Copies rows of the old `send_history` table.
///
/// That table keyed rows by template only and could hold both a success and a
/// failure for one phone, so successes go in first and win.
async fn import_legacy_history(conn: &mut SqliteConnection) -> Result<()> {
    let successes = sqlx::query(
        r"
        INSERT OR IGNORE INTO send_records
            (recipient_key, campaign_key, sent_at, status, provider_message_id, error_detail)
        SELECT
            REPLACE(REPLACE(REPLACE(phone, '+', ''), ' ', ''), '-', ''),
            template_name,
            COALESCE(strftime('%Y-%m-%dT%H:%M:%S', sent_at) || '.000000Z', sent_at),
            'success',
            wamid,
            NULL
        FROM send_history
        WHERE status = 'success'
        ORDER BY sent_at
        ",
    )
    .execute(&mut *conn)
    .await?
    .rows_affected();

    let failures = sqlx::query(
        r"
        INSERT OR IGNORE INTO send_records
            (recipient_key, campaign_key, sent_at, status, provider_message_id, error_detail)
        SELECT
            REPLACE(REPLACE(REPLACE(phone, '+', ''), ' ', ''), '-', ''),
            template_name,
            COALESCE(strftime('%Y-%m-%dT%H:%M:%S', sent_at) || '.000000Z', sent_at),
            'failed',
            NULL,
            error
        FROM send_history
        WHERE status <> 'success'
        ORDER BY sent_at
        ",
    )
    .execute(&mut *conn)
    .await?
    .rows_affected();

    info!("Imported legacy send history: {successes} successful, {failures} failed");
    Ok(())
}

/// Version 2: reporting columns and the campaign index.
async fn add_reporting_columns(conn: &mut SqliteConnection) -> Result<()> {
    add_column_if_missing(conn, "send_records", "segment_label", "TEXT").await?;
    add_column_if_missing(conn, "send_records", "source_list_id", "INTEGER").await?;
    add_column_if_missing(conn, "send_records", "http_status", "INTEGER").await?;

    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_send_records_campaign ON send_records(campaign_key)",
    )
    .execute(&mut *conn)
    .await?;

    Ok(())
}

async fn table_exists(conn: &mut SqliteConnection, table: &str) -> Result<bool> {
    let count: i64 =
        sqlx::query_scalar("SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name = ?")
            .bind(table)
            .fetch_one(&mut *conn)
            .await?;
    Ok(count > 0)
}

async fn add_column_if_missing(
    conn: &mut SqliteConnection,
    table: &str,
    column: &str,
    definition: &str,
) -> Result<()> {
    let rows = sqlx::query(&format!("PRAGMA table_info({table})"))
        .fetch_all(&mut *conn)
        .await?;

    if rows.iter().any(|row| row.get::<String, _>("name") == column) {
        debug!("Column {table}.{column} already present");
        return Ok(());
    }

    sqlx::query(&format!("ALTER TABLE {table} ADD COLUMN {column} {definition}"))
        .execute(&mut *conn)
        .await?;
    debug!("Added column {table}.{column}");
    Ok(())
}
