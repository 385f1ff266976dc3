//! Supervisao Filing - the report-filing automation engine.
//!
//! Watches the pending-report queue and files each report into the
//! government portal through a headless browser.
//!
//! # Flow
//!
//! [`QueueListener`] observes newly pending reports and hands each one to
//! [`ReportProcessor`], which
//!
//! 1. resolves the owner's credentials with [`CredentialResolver`],
//! 2. opens a [`PortalSession`] (one browser per report) and logs in,
//! 3. fills every mapped, non-empty field with [`FieldFiller`],
//! 4. submits the form and writes one terminal status back to the queue.
//!
//! Collaborators sit behind traits ([`QueueSource`], [`CredentialStore`],
//! [`ReportStore`], [`supervisao_browser::PageLauncher`]) so the engine can run
//! against fakes; the [`sqlite`] module provides the production adapters.

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]

pub mod credentials;
pub mod error;
pub mod filler;
pub mod mapping;
pub mod processor;
pub mod queue;
pub mod retry;
pub mod session;
pub mod sqlite;

pub use credentials::{CredentialResolver, CredentialStore, PortalCredentials, StoredCredentials};
pub use error::{FailureReason, FilingError, Result};
pub use filler::{FieldFiller, FillOutcome};
pub use mapping::FieldMapping;
pub use processor::{
    ProcessOutcome, ProcessingStage, ProcessorSettings, ReportProcessor, ReportStore, StatusWrite,
};
pub use queue::{QueueEvent, QueueListener, QueueSource, Subscription};
pub use session::PortalSession;
pub use sqlite::{SqliteCredentialStore, SqliteQueueSource, SqliteReportStore};
