//! Send ledger storage.

use std::path::Path;

use chrono::{DateTime, Local, NaiveDate, NaiveTime, TimeZone, Utc};
use sqlx::Row;
use sqlx::sqlite::{SqlitePool, SqlitePoolOptions, SqliteRow};
use tracing::debug;

use super::migrations;
use super::model::{CampaignKey, SendRecord, SendStatus, StatusCounts, format_timestamp};
use crate::{Error, PhoneNumber, Result};

/// Durable record of every send attempt.
///
/// The pair (recipient, campaign) is unique across all time; that constraint
/// is what keeps concurrent runs from double-sending.
#[derive(Debug, Clone)]
pub struct SendLedger {
    pool: SqlitePool,
}

impl SendLedger {
    /// Opens (or creates) the ledger at `path` and migrates it.
    ///
    /// # Errors
    ///
    /// Returns an error if the database connection fails or a migration fails.
    pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent)?;
        }

        let url = format!("sqlite:{}?mode=rwc", path.display());
        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect(&url)
            .await?;

        migrations::run(&pool).await?;
        debug!("Opened send ledger at {}", path.display());
        Ok(Self { pool })
    }

    /// Create an in-memory ledger for testing.
    ///
    /// # Errors
    ///
    /// Returns an error if the database connection fails or schema creation fails.
    pub async fn in_memory() -> Result<Self> {
        // The database lives as long as its single connection.
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect("sqlite::memory:")
            .await?;

        migrations::run(&pool).await?;
        Ok(Self { pool })
    }

    /// Returns true if any attempt, successful or not, exists for the pair.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub async fn has_been_sent(
        &self,
        recipient: &PhoneNumber,
        campaign: &CampaignKey,
    ) -> Result<bool> {
        let found: Option<i64> = sqlx::query_scalar(
            "SELECT 1 FROM send_records WHERE recipient_key = ? AND campaign_key = ? LIMIT 1",
        )
        .bind(recipient.as_str())
        .bind(campaign.as_str())
        .fetch_optional(&self.pool)
        .await?;

        Ok(found.is_some())
    }

    /// Appends one attempt.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ConstraintViolation`] if the pair is already recorded,
    /// or a database error if the insert fails otherwise.
    pub async fn record(&self, record: &SendRecord) -> Result<()> {
        let result = sqlx::query(
            r"
            INSERT INTO send_records
                (recipient_key, campaign_key, sent_at, status, provider_message_id,
                 error_detail, segment_label, source_list_id, http_status)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
            ",
        )
        .bind(record.recipient_key.as_str())
        .bind(record.campaign_key.as_str())
        .bind(format_timestamp(record.sent_at))
        .bind(record.status.as_str())
        .bind(&record.provider_message_id)
        .bind(&record.error_detail)
        .bind(&record.segment_label)
        .bind(record.source_list_id)
        .bind(record.http_status.map(i64::from))
        .execute(&self.pool)
        .await;

        match result {
            Ok(_) => {
                debug!(
                    "Recorded {} send to {} for {}",
                    record.status,
                    record.recipient_key.masked(),
                    record.campaign_key
                );
                Ok(())
            }
            Err(sqlx::Error::Database(db_err)) if db_err.is_unique_violation() => {
                Err(Error::ConstraintViolation {
                    recipient: record.recipient_key.masked(),
                    campaign: record.campaign_key.to_string(),
                })
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Number of attempts (successful or failed) on a local calendar day.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub async fn count_sent_on(&self, date: NaiveDate) -> Result<u32> {
        let (start, end) = day_bounds(date);
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM send_records WHERE sent_at >= ? AND sent_at < ?",
        )
        .bind(start)
        .bind(end)
        .fetch_one(&self.pool)
        .await?;

        Ok(to_count(count))
    }

    /// Attempts per status on a local calendar day.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub async fn count_by_status_on(&self, date: NaiveDate) -> Result<StatusCounts> {
        let (start, end) = day_bounds(date);
        let rows = sqlx::query(
            r"
            SELECT status, COUNT(*) AS n
            FROM send_records
            WHERE sent_at >= ? AND sent_at < ?
            GROUP BY status
            ",
        )
        .bind(start)
        .bind(end)
        .fetch_all(&self.pool)
        .await?;

        let mut counts = StatusCounts::default();
        for row in &rows {
            let n = to_count(row.get::<i64, _>("n"));
            match row.get::<String, _>("status").parse::<SendStatus>() {
                Ok(SendStatus::Success) => counts.success += n,
                Ok(SendStatus::Failed) => counts.failed += n,
                Err(_) => {}
            }
            counts.total += n;
        }
        Ok(counts)
    }

    /// Attempts per status today.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub async fn count_today_by_status(&self) -> Result<StatusCounts> {
        self.count_by_status_on(Local::now().date_naive()).await
    }

    /// Failed attempts on a day grouped by HTTP status, most frequent first.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub async fn failure_codes_on(&self, date: NaiveDate) -> Result<Vec<(Option<u16>, u32)>> {
        let (start, end) = day_bounds(date);
        let rows = sqlx::query(
            r"
            SELECT http_status, COUNT(*) AS n
            FROM send_records
            WHERE status = 'failed' AND sent_at >= ? AND sent_at < ?
            GROUP BY http_status
            ORDER BY n DESC, http_status ASC
            ",
        )
        .bind(start)
        .bind(end)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .iter()
            .map(|row| {
                let code = row
                    .get::<Option<i64>, _>("http_status")
                    .and_then(|c| u16::try_from(c).ok());
                (code, to_count(row.get::<i64, _>("n")))
            })
            .collect())
    }

    /// Most recent attempts, newest first.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub async fn recent(&self, limit: u32) -> Result<Vec<SendRecord>> {
        let rows = sqlx::query(
            r"
            SELECT recipient_key, campaign_key, sent_at, status, provider_message_id,
                   error_detail, segment_label, source_list_id, http_status
            FROM send_records
            ORDER BY sent_at DESC, id DESC
            LIMIT ?
            ",
        )
        .bind(i64::from(limit))
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.iter().filter_map(row_to_record).collect())
    }

    /// Total number of recorded attempts.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub async fn count_all(&self) -> Result<u64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM send_records")
            .fetch_one(&self.pool)
            .await?;
        Ok(u64::try_from(count).unwrap_or(0))
    }
}

fn row_to_record(row: &SqliteRow) -> Option<SendRecord> {
    let sent_at: String = row.get("sent_at");
    let sent_at = DateTime::parse_from_rfc3339(&sent_at)
        .ok()?
        .with_timezone(&Utc);
    let status = row.get::<String, _>("status").parse().ok()?;

    Some(SendRecord {
        recipient_key: PhoneNumber::from_canonical(row.get("recipient_key")),
        campaign_key: CampaignKey::from(row.get::<String, _>("campaign_key").as_str()),
        segment_label: row.get("segment_label"),
        source_list_id: row.get("source_list_id"),
        sent_at,
        status,
        provider_message_id: row.get("provider_message_id"),
        error_detail: row.get("error_detail"),
        http_status: row
            .get::<Option<i64>, _>("http_status")
            .and_then(|c| u16::try_from(c).ok()),
    })
}

/// Stored-timestamp bounds `[start, end)` of a local calendar day.
fn day_bounds(date: NaiveDate) -> (String, String) {
    let next = date.succ_opt().unwrap_or(NaiveDate::MAX);
    (
        format_timestamp(local_midnight(date)),
        format_timestamp(local_midnight(next)),
    )
}

fn local_midnight(date: NaiveDate) -> DateTime<Utc> {
    let naive = date.and_time(NaiveTime::MIN);
    Local
        .from_local_datetime(&naive)
        .earliest()
        .map_or_else(|| naive.and_utc(), |local| local.with_timezone(&Utc))
}

fn to_count(n: i64) -> u32 {
    u32::try_from(n).unwrap_or(u32::MAX)
}
