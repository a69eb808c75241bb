//! Incremental collection runs
//!
//! A `Collector` ties a `RecordSource`, an `AttachmentResolver` and a
//! `RecordStore` together. Runs are resumable: anything already stored is
//! skipped before its body is fetched, so an interrupted run picks up where
//! it stopped.

mod cancel;
mod collector;
mod options;

pub use cancel::CancellationToken;
pub use collector::{CollectError, CollectResult, Collector};
pub use options::{CollectReport, ConsultationOptions, ResponseOptions};
