//! SQLite-backed queue source, report store and credential store.

use crate::credentials::{CredentialStore, StoredCredentials};
use crate::error::{FilingError, Result};
use crate::processor::{ReportStore, StatusWrite};
use crate::queue::{QueueEvent, QueueSource, Subscription};
use sqlx::{Pool, Sqlite};
use std::collections::HashSet;
use std::time::Duration;
use supervisao_core::{OwnerId, ReportId, ReportRecord, Timestamp};
use supervisao_db::{credentials, reports, DatabaseError, UndecodableReport};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

/// Buffered events between the poller and the listener.
const EVENT_BUFFER: usize = 64;

/// Tracks which reports have already been announced.
///
/// A report is announced when it enters the pending set. Once it leaves the
/// set it is forgotten, so a report reset to pending later is announced again.
#[derive(Debug, Default)]
pub struct PendingTracker {
    seen: HashSet<ReportId>,
}

impl PendingTracker {
    /// Create an empty tracker; the first observation announces everything.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Record the current pending set and return the newly added reports,
    /// keeping the input order.
    pub fn observe(&mut self, pending: Vec<ReportRecord>) -> Vec<ReportRecord> {
        let current: HashSet<&ReportId> = pending.iter().map(|r| &r.id).collect();
        self.seen.retain(|id| current.contains(id));

        pending
            .into_iter()
            .filter(|record| self.seen.insert(record.id.clone()))
            .collect()
    }
}

/// Polls the `reports` table and announces newly pending reports.
#[derive(Debug, Clone)]
pub struct SqliteQueueSource {
    pool: Pool<Sqlite>,
    poll_interval: Duration,
}

impl SqliteQueueSource {
    /// Create a source polling every `poll_interval`.
    #[must_use]
    pub fn new(pool: Pool<Sqlite>, poll_interval: Duration) -> Self {
        Self {
            pool,
            poll_interval,
        }
    }
}

#[async_trait::async_trait]
impl QueueSource for SqliteQueueSource {
    async fn subscribe(&self) -> Result<Subscription> {
        let (tx, rx) = mpsc::channel(EVENT_BUFFER);
        let cancel = CancellationToken::new();
        let pool = self.pool.clone();
        let poll_interval = self.poll_interval;
        let stop = cancel.clone();

        tokio::spawn(async move {
            let mut tracker = PendingTracker::new();
            let mut ticker = tokio::time::interval(poll_interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

            loop {
                tokio::select! {
                    () = stop.cancelled() => break,
                    _ = ticker.tick() => {}
                }

                let events: Vec<QueueEvent> = match reports::list_pending(&pool).await {
                    Ok(pending) => {
                        for report in &pending.undecodable {
                            reject_undecodable(&pool, report).await;
                        }
                        tracker
                            .observe(pending.reports)
                            .into_iter()
                            .map(QueueEvent::ReportAdded)
                            .collect()
                    }
                    Err(e) => vec![QueueEvent::Error(format!("failed to poll pending reports: {e}"))],
                };

                for event in events {
                    if tx.send(event).await.is_err() {
                        tracing::debug!("queue subscriber gone, stopping poller");
                        return;
                    }
                }
            }

            tracing::debug!("queue poller stopped");
        });

        tracing::info!(interval = ?self.poll_interval, "polling pending reports");
        Ok(Subscription::new(rx, cancel))
    }
}

/// Fail a pending row that cannot be decoded into a report.
///
/// The write is guarded like any terminal write, so a row is failed once and
/// then leaves the pending set.
async fn reject_undecodable(pool: &Pool<Sqlite>, report: &UndecodableReport) {
    let error = FilingError::InternalError(format!("undecodable report row: {}", report.reason));
    tracing::error!(report_id = %report.id, "pending report cannot be decoded: {}", report.reason);

    match reports::mark_undecodable_failed(pool, report, &error.failure_message(), Timestamp::now())
        .await
    {
        Ok(true) => {}
        Ok(false) => {
            tracing::warn!(report_id = %report.id, "report no longer pending, status not overwritten");
        }
        Err(e) => {
            tracing::error!(report_id = %report.id, "failed to mark undecodable report: {}", e);
        }
    }
}

/// Writes terminal statuses to the `reports` table.
#[derive(Debug, Clone)]
pub struct SqliteReportStore {
    pool: Pool<Sqlite>,
}

impl SqliteReportStore {
    /// Create a store over `pool`.
    #[must_use]
    pub fn new(pool: Pool<Sqlite>) -> Self {
        Self { pool }
    }
}

fn status_write(applied: bool) -> StatusWrite {
    if applied {
        StatusWrite::Applied
    } else {
        StatusWrite::AlreadyTerminal
    }
}

#[async_trait::async_trait]
impl ReportStore for SqliteReportStore {
    async fn mark_completed(&self, id: &ReportId, processed_at: Timestamp) -> Result<StatusWrite> {
        let applied = reports::mark_completed(&self.pool, id, processed_at)
            .await
            .map_err(DatabaseError::from)?;
        Ok(status_write(applied))
    }

    async fn mark_failed(
        &self,
        id: &ReportId,
        error_message: &str,
        processed_at: Timestamp,
    ) -> Result<StatusWrite> {
        let applied = reports::mark_failed(&self.pool, id, error_message, processed_at)
            .await
            .map_err(DatabaseError::from)?;
        Ok(status_write(applied))
    }
}

/// Reads portal credentials from the `supervisor_credentials` table.
#[derive(Debug, Clone)]
pub struct SqliteCredentialStore {
    pool: Pool<Sqlite>,
}

impl SqliteCredentialStore {
    /// Create a store over `pool`.
    #[must_use]
    pub fn new(pool: Pool<Sqlite>) -> Self {
        Self { pool }
    }
}

#[async_trait::async_trait]
impl CredentialStore for SqliteCredentialStore {
    async fn fetch(&self, owner_id: &OwnerId) -> Result<Option<StoredCredentials>> {
        let entry = credentials::get_credentials(&self.pool, owner_id)
            .await
            .map_err(DatabaseError::from)?;

        Ok(entry.map(|entry| StoredCredentials {
            login_name: entry.login_name,
            encoded_secret: entry.encoded_secret,
        }))
    }
}
