//! Job scheduling for Conflux
//!
//! This crate provides:
//! - Job / JobKind: deferred work against components
//! - JobQueue: the submission seam, with an in-memory LocalJobQueue
//! - CdcStatus: injected change-data-capture state
//! - EventQueue: per-destination event buffering and merging

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod cdc;
pub mod dispatch;
pub mod error;
pub mod job;
pub mod queue;

pub use cdc::{CdcFlag, CdcStatus};
pub use dispatch::{EventBatch, EventQueue};
pub use error::{JobError, Result};
pub use job::{Job, JobKind, JobStatus};
pub use queue::{JobHandler, JobQueue, LocalJobQueue, RunSummary};
