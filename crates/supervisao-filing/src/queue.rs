//! Pending-report subscription and dispatch.

use crate::error::Result;
use crate::processor::ReportProcessor;
use std::collections::HashSet;
use std::sync::{Arc, Mutex, PoisonError};
use supervisao_core::{ReportId, ReportRecord};
use tokio::sync::{mpsc, Semaphore};
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;

/// Event observed on the pending-report source.
#[derive(Debug, Clone, PartialEq)]
pub enum QueueEvent {
    /// A report newly entered the pending set
    ReportAdded(ReportRecord),
    /// The source hit a recoverable error
    Error(String),
}

/// Live stream of [`QueueEvent`]s. Dropping it unsubscribes.
#[derive(Debug)]
pub struct Subscription {
    events: mpsc::Receiver<QueueEvent>,
    cancel: CancellationToken,
}

impl Subscription {
    /// Wrap a channel fed by a source task that stops when `cancel` fires.
    #[must_use]
    pub fn new(events: mpsc::Receiver<QueueEvent>, cancel: CancellationToken) -> Self {
        Self { events, cancel }
    }

    /// Next event, or `None` once the source has stopped.
    pub async fn next(&mut self) -> Option<QueueEvent> {
        self.events.recv().await
    }

    /// Stop the source.
    pub fn unsubscribe(self) {
        self.cancel.cancel();
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

/// Source of pending reports.
#[async_trait::async_trait]
pub trait QueueSource: Send + Sync {
    /// Start observing the pending set.
    async fn subscribe(&self) -> Result<Subscription>;
}

/// Removes a report from the in-flight set when its task ends, panics included.
struct InFlightGuard {
    id: ReportId,
    in_flight: Arc<Mutex<HashSet<ReportId>>>,
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        self.in_flight
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&self.id);
    }
}

/// Subscribes to a [`QueueSource`] and hands each added report to the processor.
///
/// At most `max_concurrent` reports are processed at once, and a report id
/// is never processed by two tasks at the same time.
pub struct QueueListener {
    source: Arc<dyn QueueSource>,
    processor: Arc<ReportProcessor>,
    semaphore: Arc<Semaphore>,
    in_flight: Arc<Mutex<HashSet<ReportId>>>,
}

impl QueueListener {
    /// Create a listener with room for `max_concurrent` reports at a time.
    pub fn new(
        source: Arc<dyn QueueSource>,
        processor: Arc<ReportProcessor>,
        max_concurrent: usize,
    ) -> Self {
        Self {
            source,
            processor,
            semaphore: Arc::new(Semaphore::new(max_concurrent.max(1))),
            in_flight: Arc::new(Mutex::new(HashSet::new())),
        }
    }

    /// Consume queue events until `cancel` fires or the source closes, then
    /// wait for reports already being processed.
    ///
    /// # Errors
    /// Returns `FilingError::Queue` if the initial subscription fails.
    pub async fn run(&self, cancel: CancellationToken) -> Result<()> {
        let mut subscription = self.source.subscribe().await?;
        let mut tasks = JoinSet::new();

        tracing::info!("queue listener started");

        loop {
            tokio::select! {
                () = cancel.cancelled() => {
                    tracing::info!("queue listener stopping");
                    break;
                }
                event = subscription.next() => match event {
                    Some(QueueEvent::ReportAdded(record)) => self.dispatch(record, &mut tasks),
                    Some(QueueEvent::Error(message)) => {
                        tracing::warn!("queue subscription error: {}", message);
                    }
                    None => {
                        tracing::info!("queue subscription closed");
                        break;
                    }
                },
                Some(joined) = tasks.join_next(), if !tasks.is_empty() => log_task_end(joined),
            }
        }

        subscription.unsubscribe();

        if !tasks.is_empty() {
            tracing::info!(in_flight = tasks.len(), "waiting for in-flight reports");
        }
        while let Some(joined) = tasks.join_next().await {
            log_task_end(joined);
        }

        tracing::info!("queue listener stopped");
        Ok(())
    }

    /// Spawn processing for one report unless it is already in flight.
    fn dispatch(&self, record: ReportRecord, tasks: &mut JoinSet<()>) {
        let claimed = self
            .in_flight
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(record.id.clone());
        if !claimed {
            tracing::warn!(report_id = %record.id, "report already in flight, ignoring duplicate");
            return;
        }

        let guard = InFlightGuard {
            id: record.id.clone(),
            in_flight: Arc::clone(&self.in_flight),
        };
        let semaphore = Arc::clone(&self.semaphore);
        let processor = Arc::clone(&self.processor);

        tasks.spawn(async move {
            let _guard = guard;
            let Ok(_permit) = semaphore.acquire_owned().await else {
                tracing::error!(report_id = %record.id, "worker pool closed, report not processed");
                return;
            };
            processor.process(&record).await;
        });
    }

    /// Number of reports currently claimed by a task.
    #[must_use]
    pub fn in_flight(&self) -> usize {
        self.in_flight
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}

fn log_task_end(joined: std::result::Result<(), tokio::task::JoinError>) {
    if let Err(e) = joined {
        tracing::error!("report task ended abnormally: {}", e);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_subscription_drop_cancels_source() {
        let (tx, rx) = mpsc::channel(4);
        let cancel = CancellationToken::new();
        let subscription = Subscription::new(rx, cancel.clone());

        tx.send(QueueEvent::Error("boom".to_string()))
            .await
            .expect("send");
        drop(subscription);

        assert!(cancel.is_cancelled());
    }

    #[tokio::test]
    async fn test_subscription_yields_events_in_order() {
        let (tx, rx) = mpsc::channel(4);
        let mut subscription = Subscription::new(rx, CancellationToken::new());

        tx.send(QueueEvent::Error("a".to_string())).await.unwrap();
        tx.send(QueueEvent::Error("b".to_string())).await.unwrap();
        drop(tx);

        assert_eq!(subscription.next().await, Some(QueueEvent::Error("a".to_string())));
        assert_eq!(subscription.next().await, Some(QueueEvent::Error("b".to_string())));
        assert_eq!(subscription.next().await, None);
    }
}
