//! End-to-end processing of one report.
//!
//! A report moves through
//! `Received -> CredentialsResolving -> SessionOpening -> LoggingIn -> Filling -> Submitting`
//! and ends in exactly one terminal status write, `Completed` or `Failed`.
//! Errors never escape [`ReportProcessor::process`].

use crate::credentials::CredentialResolver;
use crate::error::{FailureReason, FilingError, Result};
use crate::filler::{is_fillable, FieldFiller, FillOutcome};
use crate::mapping::FieldMapping;
use crate::retry::retry_with_backoff;
use crate::session::PortalSession;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use supervisao_browser::PageLauncher;
use supervisao_core::{ReportId, ReportRecord, Timestamp};

/// Result of a guarded terminal status write.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusWrite {
    /// The report left `pending`
    Applied,
    /// The report was no longer pending; nothing changed
    AlreadyTerminal,
}

/// Where terminal report statuses are written.
#[async_trait::async_trait]
pub trait ReportStore: Send + Sync {
    /// Mark a pending report as filed.
    async fn mark_completed(&self, id: &ReportId, processed_at: Timestamp) -> Result<StatusWrite>;

    /// Mark a pending report as failed.
    async fn mark_failed(
        &self,
        id: &ReportId,
        error_message: &str,
        processed_at: Timestamp,
    ) -> Result<StatusWrite>;
}

/// Processing stage of a report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProcessingStage {
    /// Dispatched by the listener
    Received,
    /// Looking up and decoding the owner's credentials
    CredentialsResolving,
    /// Launching the browser
    SessionOpening,
    /// Logging into the portal
    LoggingIn,
    /// Filling report fields
    Filling,
    /// Clicking the form's submit control
    Submitting,
    /// Filed
    Completed,
    /// Gave up
    Failed,
}

impl fmt::Display for ProcessingStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Received => "received",
            Self::CredentialsResolving => "credentials_resolving",
            Self::SessionOpening => "session_opening",
            Self::LoggingIn => "logging_in",
            Self::Filling => "filling",
            Self::Submitting => "submitting",
            Self::Completed => "completed",
            Self::Failed => "failed",
        };
        f.write_str(name)
    }
}

/// Outcome of processing one report.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProcessOutcome {
    /// Form submitted
    Completed,

    /// Processing stopped
    Failed {
        /// Stage the failure happened in
        stage: ProcessingStage,
        /// Failure classification
        reason: FailureReason,
        /// Message written to the report
        message: String,
    },
}

impl ProcessOutcome {
    /// Check if the outcome is successful
    #[must_use]
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Completed)
    }

    /// Failure reason, if the report failed
    #[must_use]
    pub fn failure_reason(&self) -> Option<FailureReason> {
        match self {
            Self::Completed => None,
            Self::Failed { reason, .. } => Some(*reason),
        }
    }
}

/// Tunables for [`ReportProcessor`].
#[derive(Debug, Clone)]
pub struct ProcessorSettings {
    /// Bound on the post-login navigation wait
    pub navigation_timeout: Duration,
    /// Attempts for each terminal status write
    pub status_write_attempts: u32,
    /// First backoff delay between status write attempts
    pub status_write_backoff: Duration,
}

impl Default for ProcessorSettings {
    fn default() -> Self {
        Self {
            navigation_timeout: Duration::from_secs(30),
            status_write_attempts: 3,
            status_write_backoff: Duration::from_millis(500),
        }
    }
}

/// Drives one report from credentials to a terminal status.
pub struct ReportProcessor {
    resolver: CredentialResolver,
    launcher: Arc<dyn PageLauncher>,
    mapping: Arc<FieldMapping>,
    store: Arc<dyn ReportStore>,
    filler: FieldFiller,
    settings: ProcessorSettings,
}

impl ReportProcessor {
    /// Create a processor from its collaborators.
    pub fn new(
        resolver: CredentialResolver,
        launcher: Arc<dyn PageLauncher>,
        mapping: Arc<FieldMapping>,
        store: Arc<dyn ReportStore>,
        settings: ProcessorSettings,
    ) -> Self {
        Self {
            resolver,
            launcher,
            mapping,
            store,
            filler: FieldFiller::new(),
            settings,
        }
    }

    /// Process one pending report and write its terminal status.
    ///
    /// Never fails: every error becomes a `Failed` outcome on the report.
    pub async fn process(&self, record: &ReportRecord) -> ProcessOutcome {
        tracing::info!(report_id = %record.id, owner_id = %record.owner_id, "report received");

        let mut stage = ProcessingStage::Received;
        let outcome = match self.run(record, &mut stage).await {
            Ok(()) => {
                tracing::info!(report_id = %record.id, "report submitted");
                ProcessOutcome::Completed
            }
            Err(e) => {
                tracing::error!(report_id = %record.id, stage = %stage, "report failed: {}", e);
                ProcessOutcome::Failed {
                    stage,
                    reason: e.reason(),
                    message: e.failure_message(),
                }
            }
        };

        self.write_status(&record.id, &outcome).await;
        outcome
    }

    async fn run(&self, record: &ReportRecord, stage: &mut ProcessingStage) -> Result<()> {
        advance(stage, ProcessingStage::CredentialsResolving, &record.id);
        let owner = record
            .owner()
            .ok_or_else(|| FilingError::CredentialsMissing {
                owner_id: "(unset)".to_string(),
            })?;
        let credentials = self.resolver.resolve(&owner).await?;

        advance(stage, ProcessingStage::SessionOpening, &record.id);
        let mut session = PortalSession::open(
            self.launcher.as_ref(),
            Arc::clone(&self.mapping),
            self.settings.navigation_timeout,
        )
        .await?;

        let result = async {
            advance(stage, ProcessingStage::LoggingIn, &record.id);
            session.login(&credentials).await?;
            drop(credentials);
            session.navigate_to_form().await?;

            advance(stage, ProcessingStage::Filling, &record.id);
            self.fill_fields(&session, record).await?;

            advance(stage, ProcessingStage::Submitting, &record.id);
            session.submit().await
        }
        .await;

        if let Err(e) = session.close().await {
            tracing::warn!(report_id = %record.id, "{}", e);
        }

        result
    }

    /// Fill every mapped, non-empty field in the record's own key order.
    async fn fill_fields(&self, session: &PortalSession, record: &ReportRecord) -> Result<()> {
        let page = session.page()?;
        let mut filled = 0usize;

        for (key, value) in &record.fields {
            let Some(locator) = self.mapping.locator(key) else {
                continue;
            };
            if !is_fillable(value) {
                tracing::debug!(report_id = %record.id, field = %key, "empty value, not filling");
                continue;
            }

            if let FillOutcome::Filled(_) = self.filler.fill(page, key, locator, value).await? {
                filled += 1;
            }
        }

        tracing::debug!(report_id = %record.id, filled, "finished filling fields");
        Ok(())
    }

    async fn write_status(&self, id: &ReportId, outcome: &ProcessOutcome) {
        let processed_at = Timestamp::now();
        let attempts = self.settings.status_write_attempts;
        let backoff = self.settings.status_write_backoff;

        let written = match outcome {
            ProcessOutcome::Completed => {
                retry_with_backoff(
                    || self.store.mark_completed(id, processed_at),
                    attempts,
                    backoff,
                )
                .await
            }
            ProcessOutcome::Failed { message, .. } => {
                retry_with_backoff(
                    || self.store.mark_failed(id, message, processed_at),
                    attempts,
                    backoff,
                )
                .await
            }
        };

        match written {
            Ok(StatusWrite::Applied) => {
                tracing::debug!(report_id = %id, "terminal status written");
            }
            Ok(StatusWrite::AlreadyTerminal) => {
                tracing::warn!(report_id = %id, "report no longer pending, status not overwritten");
            }
            Err(e) => {
                tracing::error!(report_id = %id, "failed to write terminal status: {}", e);
            }
        }
    }
}

fn advance(stage: &mut ProcessingStage, next: ProcessingStage, id: &ReportId) {
    tracing::debug!(report_id = %id, from = %stage, to = %next, "stage transition");
    *stage = next;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_outcome_helpers() {
        assert!(ProcessOutcome::Completed.is_success());
        assert_eq!(ProcessOutcome::Completed.failure_reason(), None);

        let failed = ProcessOutcome::Failed {
            stage: ProcessingStage::Submitting,
            reason: FailureReason::SubmitError,
            message: "SUBMIT_ERROR: failed to click submit".to_string(),
        };
        assert!(!failed.is_success());
        assert_eq!(failed.failure_reason(), Some(FailureReason::SubmitError));
    }

    #[test]
    fn test_stage_display() {
        assert_eq!(ProcessingStage::LoggingIn.to_string(), "logging_in");
        assert_eq!(ProcessingStage::CredentialsResolving.to_string(), "credentials_resolving");
    }
}
