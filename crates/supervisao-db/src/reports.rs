//! Report queue operations.
//!
//! This module provides operations for the `reports` table, which holds
//! supervision reports from submission until they are filed or fail.
//!
//! Terminal writes only apply while a report is still `pending`, so a
//! processing attempt can write at most one terminal status.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use sqlx::{Pool, Row, Sqlite};
use supervisao_core::{ReportId, ReportRecord, ReportStatus, Timestamp};
use uuid::Uuid;

const SELECT_COLUMNS: &str =
    "SELECT id, owner_id, status, fields, error_message, created_at, processed_at FROM reports";

/// Insert a report record as-is.
///
/// # Errors
/// Returns `sqlx::Error` if the insert fails (including a duplicate ID).
pub async fn insert_report(pool: &Pool<Sqlite>, record: &ReportRecord) -> Result<(), sqlx::Error> {
    let fields = serde_json::to_string(&record.fields)
        .map_err(|e| sqlx::Error::Protocol(format!("failed to encode report fields: {e}")))?;

    sqlx::query(
        "INSERT INTO reports (id, owner_id, status, fields, error_message, created_at, processed_at)
         VALUES (?, ?, ?, ?, ?, ?, ?)",
    )
    .bind(record.id.as_str())
    .bind(&record.owner_id)
    .bind(record.status.as_str())
    .bind(fields)
    .bind(&record.error_message)
    .bind(record.created_at.to_rfc3339())
    .bind(record.processed_at.map(|ts| ts.to_rfc3339()))
    .execute(pool)
    .await?;

    Ok(())
}

/// Queue a new pending report with a generated ID.
///
/// # Errors
/// Returns `sqlx::Error` if the insert fails.
pub async fn create_report(
    pool: &Pool<Sqlite>,
    owner_id: &str,
    fields: Map<String, Value>,
) -> Result<ReportRecord, sqlx::Error> {
    let id = ReportId::new(format!("report_{}", Uuid::new_v4()))
        .map_err(|e| sqlx::Error::Protocol(e.to_string()))?;
    let record = ReportRecord::pending(id, owner_id, fields);
    insert_report(pool, &record).await?;
    Ok(record)
}

/// Get a report by its ID.
///
/// # Errors
/// Returns `sqlx::Error` if the query fails or a stored value cannot be decoded.
pub async fn get_by_id(pool: &Pool<Sqlite>, id: &ReportId) -> Result<Option<ReportRecord>, sqlx::Error> {
    let row = sqlx::query(&format!("{SELECT_COLUMNS} WHERE id = ?"))
        .bind(id.as_str())
        .fetch_optional(pool)
        .await?;

    row.map(parse_report_row).transpose()
}

/// A pending row whose stored values could not be decoded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UndecodableReport {
    /// Raw `id` column, possibly blank
    pub id: String,
    /// Why decoding failed
    pub reason: String,
}

/// Pending rows, split into decoded reports and rows that failed to decode.
#[derive(Debug, Default)]
pub struct PendingReports {
    /// Decoded reports, oldest first
    pub reports: Vec<ReportRecord>,
    /// Rows that could not be turned into a `ReportRecord`
    pub undecodable: Vec<UndecodableReport>,
}

/// List all pending reports, oldest first.
///
/// Each row is decoded on its own, so one malformed row never hides the rest.
///
/// # Errors
/// Returns `sqlx::Error` if the query itself fails.
pub async fn list_pending(pool: &Pool<Sqlite>) -> Result<PendingReports, sqlx::Error> {
    let rows = sqlx::query(&format!(
        "{SELECT_COLUMNS} WHERE status = 'pending' ORDER BY created_at ASC, id ASC"
    ))
    .fetch_all(pool)
    .await?;

    let mut pending = PendingReports::default();
    for row in rows {
        let raw_id = row
            .try_get::<Option<String>, _>("id")
            .ok()
            .flatten()
            .unwrap_or_default();

        match parse_report_row(row) {
            Ok(record) => pending.reports.push(record),
            Err(e) => pending.undecodable.push(UndecodableReport {
                id: raw_id,
                reason: e.to_string(),
            }),
        }
    }

    Ok(pending)
}

/// Mark a pending report as filed.
///
/// Returns `false` when the report is missing or no longer pending.
///
/// # Errors
/// Returns `sqlx::Error` if the update fails.
pub async fn mark_completed(
    pool: &Pool<Sqlite>,
    id: &ReportId,
    processed_at: Timestamp,
) -> Result<bool, sqlx::Error> {
    let result = sqlx::query(
        "UPDATE reports
         SET status = 'completed', error_message = NULL, processed_at = ?
         WHERE id = ? AND status = 'pending'",
    )
    .bind(processed_at.to_rfc3339())
    .bind(id.as_str())
    .execute(pool)
    .await?;

    Ok(result.rows_affected() == 1)
}

/// Mark a pending report as failed with a human-readable message.
///
/// Returns `false` when the report is missing or no longer pending.
///
/// # Errors
/// Returns `sqlx::Error` if the update fails.
pub async fn mark_failed(
    pool: &Pool<Sqlite>,
    id: &ReportId,
    error_message: &str,
    processed_at: Timestamp,
) -> Result<bool, sqlx::Error> {
    set_failed(pool, id.as_str(), error_message, processed_at).await
}

/// Mark a pending row that could not be decoded as failed.
///
/// Returns `false` when the row is no longer pending.
///
/// # Errors
/// Returns `sqlx::Error` if the update fails.
pub async fn mark_undecodable_failed(
    pool: &Pool<Sqlite>,
    report: &UndecodableReport,
    error_message: &str,
    processed_at: Timestamp,
) -> Result<bool, sqlx::Error> {
    set_failed(pool, &report.id, error_message, processed_at).await
}

async fn set_failed(
    pool: &Pool<Sqlite>,
    id: &str,
    error_message: &str,
    processed_at: Timestamp,
) -> Result<bool, sqlx::Error> {
    let result = sqlx::query(
        "UPDATE reports
         SET status = 'failed', error_message = ?, processed_at = ?
         WHERE id = ? AND status = 'pending'",
    )
    .bind(error_message)
    .bind(processed_at.to_rfc3339())
    .bind(id)
    .execute(pool)
    .await?;

    Ok(result.rows_affected() == 1)
}

/// Put a failed or completed report back in the queue.
///
/// Clears the error message and processing time. Returns `false` when the
/// report does not exist or is already pending.
///
/// # Errors
/// Returns `sqlx::Error` if the update fails.
pub async fn reset_to_pending(pool: &Pool<Sqlite>, id: &ReportId) -> Result<bool, sqlx::Error> {
    let result = sqlx::query(
        "UPDATE reports
         SET status = 'pending', error_message = NULL, processed_at = NULL
         WHERE id = ? AND status != 'pending'",
    )
    .bind(id.as_str())
    .execute(pool)
    .await?;

    Ok(result.rows_affected() == 1)
}

/// Number of reports in each status.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusCounts {
    /// Reports waiting to be filed
    pub pending: i64,
    /// Reports filed successfully
    pub completed: i64,
    /// Reports that failed
    pub failed: i64,
}

/// Count reports by status.
///
/// # Errors
/// Returns `sqlx::Error` if the query fails.
pub async fn count_by_status(pool: &Pool<Sqlite>) -> Result<StatusCounts, sqlx::Error> {
    let row = sqlx::query(
        "SELECT
            COALESCE(SUM(CASE WHEN status = 'pending' THEN 1 ELSE 0 END), 0) AS pending,
            COALESCE(SUM(CASE WHEN status = 'completed' THEN 1 ELSE 0 END), 0) AS completed,
            COALESCE(SUM(CASE WHEN status = 'failed' THEN 1 ELSE 0 END), 0) AS failed
         FROM reports",
    )
    .fetch_one(pool)
    .await?;

    Ok(StatusCounts {
        pending: row.get("pending"),
        completed: row.get("completed"),
        failed: row.get("failed"),
    })
}

/// Parse a database row into a `ReportRecord`.
fn parse_report_row(row: sqlx::sqlite::SqliteRow) -> Result<ReportRecord, sqlx::Error> {
    let id: String = row.try_get("id")?;
    let id = ReportId::new(id).map_err(|e| sqlx::Error::Decode(Box::new(e)))?;

    let status_str: String = row.try_get("status")?;
    let status: ReportStatus = status_str
        .parse()
        .map_err(|e| sqlx::Error::Decode(Box::new(e)))?;

    let fields_str: String = row.try_get("fields")?;
    let fields: Map<String, Value> =
        serde_json::from_str(&fields_str).map_err(|e| sqlx::Error::Decode(Box::new(e)))?;

    let created_at_str: String = row.try_get("created_at")?;
    let created_at =
        Timestamp::from_rfc3339(&created_at_str).map_err(|e| sqlx::Error::Decode(Box::new(e)))?;

    let processed_at = row
        .try_get::<Option<String>, _>("processed_at")
        .ok()
        .flatten()
        .and_then(|s| Timestamp::from_rfc3339(&s).ok());

    Ok(ReportRecord {
        id,
        owner_id: row.try_get("owner_id")?,
        status,
        fields,
        error_message: row.try_get("error_message").ok().flatten(),
        created_at,
        processed_at,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Database;
    use serde_json::json;

    async fn setup_test_db() -> Database {
        let db = Database::new(crate::MEMORY_PATH)
            .await
            .expect("create database");
        db.run_migrations().await.expect("run migrations");
        db
    }

    fn fields(value: Value) -> Map<String, Value> {
        match value {
            Value::Object(map) => map,
            other => panic!("expected object, got {other}"),
        }
    }

    #[tokio::test]
    async fn test_create_and_get_report() {
        let db = setup_test_db().await;

        let created = create_report(
            db.pool(),
            "U1",
            fields(json!({"medico-nome": "Maria", "ciente": true})),
        )
        .await
        .expect("create report");

        assert!(created.id.as_str().starts_with("report_"));
        assert_eq!(created.status, ReportStatus::Pending);

        let loaded = get_by_id(db.pool(), &created.id)
            .await
            .expect("get by id")
            .expect("report exists");
        assert_eq!(loaded.owner_id, "U1");
        assert_eq!(loaded.fields.get("ciente"), Some(&json!(true)));
        assert!(loaded.error_message.is_none());
        assert!(loaded.processed_at.is_none());
    }

    #[tokio::test]
    async fn test_fields_keep_insertion_order() {
        let db = setup_test_db().await;

        let created = create_report(
            db.pool(),
            "U1",
            fields(json!({"zeta": "1", "alfa": "2", "meio": "3"})),
        )
        .await
        .expect("create report");

        let loaded = get_by_id(db.pool(), &created.id)
            .await
            .expect("get by id")
            .expect("report exists");
        let keys: Vec<&str> = loaded.fields.keys().map(String::as_str).collect();
        assert_eq!(keys, vec!["zeta", "alfa", "meio"]);
    }

    #[tokio::test]
    async fn test_list_pending_oldest_first() {
        let db = setup_test_db().await;

        let first = create_report(db.pool(), "U1", Map::new())
            .await
            .expect("create first");
        tokio::time::sleep(tokio::time::Duration::from_millis(10)).await;
        let second = create_report(db.pool(), "U2", Map::new())
            .await
            .expect("create second");
        tokio::time::sleep(tokio::time::Duration::from_millis(10)).await;
        let third = create_report(db.pool(), "U3", Map::new())
            .await
            .expect("create third");

        mark_completed(db.pool(), &second.id, Timestamp::now())
            .await
            .expect("complete second");

        let pending = list_pending(db.pool()).await.expect("list pending");
        let ids: Vec<&ReportId> = pending.reports.iter().map(|r| &r.id).collect();
        assert_eq!(ids, vec![&first.id, &third.id]);
        assert!(pending.undecodable.is_empty());
    }

    #[tokio::test]
    async fn test_list_pending_isolates_malformed_rows() {
        let db = setup_test_db().await;
        let good = create_report(db.pool(), "U1", Map::new())
            .await
            .expect("create report");
        sqlx::query(
            "INSERT INTO reports (id, owner_id, status, fields, created_at)
             VALUES ('report_bad_fields', 'U1', 'pending', '[1,2]', ?),
                    ('report_bad_time', 'U1', 'pending', '{}', 'yesterday')",
        )
        .bind(Timestamp::now().to_rfc3339())
        .execute(db.pool())
        .await
        .expect("insert malformed rows");

        let pending = list_pending(db.pool()).await.expect("list pending");

        assert_eq!(pending.reports.len(), 1);
        assert_eq!(pending.reports[0].id, good.id);
        let mut bad: Vec<&str> = pending.undecodable.iter().map(|r| r.id.as_str()).collect();
        bad.sort_unstable();
        assert_eq!(bad, vec!["report_bad_fields", "report_bad_time"]);
        assert!(pending.undecodable.iter().all(|r| !r.reason.is_empty()));
    }

    #[tokio::test]
    async fn test_mark_undecodable_failed_once() {
        let db = setup_test_db().await;
        sqlx::query(
            "INSERT INTO reports (id, owner_id, status, fields, created_at)
             VALUES ('', 'U1', 'pending', '{}', ?)",
        )
        .bind(Timestamp::now().to_rfc3339())
        .execute(db.pool())
        .await
        .expect("insert blank-id row");

        let pending = list_pending(db.pool()).await.expect("list pending");
        assert_eq!(pending.undecodable.len(), 1);
        let bad = &pending.undecodable[0];
        assert_eq!(bad.id, "");

        assert!(mark_undecodable_failed(db.pool(), bad, "INTERNAL_ERROR: blank id", Timestamp::now())
            .await
            .expect("first write"));
        assert!(!mark_undecodable_failed(db.pool(), bad, "INTERNAL_ERROR: again", Timestamp::now())
            .await
            .expect("second write"));

        let pending = list_pending(db.pool()).await.expect("list pending");
        assert!(pending.undecodable.is_empty());
        let counts = count_by_status(db.pool()).await.expect("count");
        assert_eq!(counts.failed, 1);
    }

    #[tokio::test]
    async fn test_mark_completed_once() {
        let db = setup_test_db().await;
        let report = create_report(db.pool(), "U1", Map::new())
            .await
            .expect("create report");

        assert!(mark_completed(db.pool(), &report.id, Timestamp::now())
            .await
            .expect("first terminal write"));

        // A second terminal write for the same episode is not applied
        assert!(!mark_failed(db.pool(), &report.id, "late failure", Timestamp::now())
            .await
            .expect("second terminal write"));

        let loaded = get_by_id(db.pool(), &report.id)
            .await
            .expect("get by id")
            .expect("report exists");
        assert_eq!(loaded.status, ReportStatus::Completed);
        assert!(loaded.processed_at.is_some());
        assert!(loaded.error_message.is_none());
    }

    #[tokio::test]
    async fn test_mark_failed_with_message() {
        let db = setup_test_db().await;
        let report = create_report(db.pool(), "U1", Map::new())
            .await
            .expect("create report");

        assert!(mark_failed(
            db.pool(),
            &report.id,
            "AUTHENTICATION_FAILED: still on login page",
            Timestamp::now()
        )
        .await
        .expect("mark failed"));

        let loaded = get_by_id(db.pool(), &report.id)
            .await
            .expect("get by id")
            .expect("report exists");
        assert_eq!(loaded.status, ReportStatus::Failed);
        assert_eq!(
            loaded.error_message.as_deref(),
            Some("AUTHENTICATION_FAILED: still on login page")
        );
    }

    #[tokio::test]
    async fn test_terminal_write_on_missing_report() {
        let db = setup_test_db().await;
        let missing = ReportId::new("report_missing").unwrap();

        assert!(!mark_completed(db.pool(), &missing, Timestamp::now())
            .await
            .expect("update runs"));
    }

    #[tokio::test]
    async fn test_reset_to_pending_clears_outcome() {
        let db = setup_test_db().await;
        let report = create_report(db.pool(), "U1", Map::new())
            .await
            .expect("create report");

        // Already pending: nothing to reset
        assert!(!reset_to_pending(db.pool(), &report.id).await.expect("reset"));

        mark_failed(db.pool(), &report.id, "SUBMIT_ERROR: boom", Timestamp::now())
            .await
            .expect("mark failed");
        assert!(reset_to_pending(db.pool(), &report.id).await.expect("reset"));

        let loaded = get_by_id(db.pool(), &report.id)
            .await
            .expect("get by id")
            .expect("report exists");
        assert_eq!(loaded.status, ReportStatus::Pending);
        assert!(loaded.error_message.is_none());
        assert!(loaded.processed_at.is_none());
    }

    #[tokio::test]
    async fn test_count_by_status() {
        let db = setup_test_db().await;
        assert_eq!(
            count_by_status(db.pool()).await.expect("count"),
            StatusCounts::default()
        );

        let a = create_report(db.pool(), "U1", Map::new()).await.expect("a");
        let b = create_report(db.pool(), "U1", Map::new()).await.expect("b");
        create_report(db.pool(), "U1", Map::new()).await.expect("c");

        mark_completed(db.pool(), &a.id, Timestamp::now())
            .await
            .expect("complete");
        mark_failed(db.pool(), &b.id, "x", Timestamp::now())
            .await
            .expect("fail");

        assert_eq!(
            count_by_status(db.pool()).await.expect("count"),
            StatusCounts {
                pending: 1,
                completed: 1,
                failed: 1
            }
        );
    }
}
