//! Collection orchestrator
//!
//! Walks a `RecordSource` listing, skips keys the store already holds,
//! fetches and stores the rest one at a time. Per-record fetch failures are
//! logged and counted; store conflicts and configuration errors end the run.

use super::cancel::CancellationToken;
use super::options::{CollectReport, ConsultationOptions, ResponseOptions};
use crate::record::{ConsultationSlug, ResponseKey, ResponseRecord};
use crate::similarity::{add_components, ClusterConfig, ConfigError};
use crate::source::{extension_for, guess_mime, pdf_supported, AttachmentResolver, ListingEntry, RecordSource};
use crate::storage::{OpenStore, PutOutcome, RecordStore, SqliteStore, StorageError};
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info, warn};

/// Errors that end a collection run
#[derive(Debug, Error)]
pub enum CollectError {
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Invalid configuration: {0}")]
    Config(#[from] ConfigError),

    #[error("No {0} directory configured")]
    MissingDirectory(&'static str),

    #[error("IO error at {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Result type for collection runs
pub type CollectResult<T> = Result<T, CollectError>;

fn io_error(path: &Path) -> impl FnOnce(std::io::Error) -> CollectError + '_ {
    move |source| CollectError::Io {
        path: path.to_path_buf(),
        source,
    }
}

/// Drives a source into a store
pub struct Collector {
    store: Arc<dyn RecordStore>,
    source: Arc<dyn RecordSource>,
    resolver: Arc<dyn AttachmentResolver>,
    attachments_dir: Option<PathBuf>,
    html_dir: Option<PathBuf>,
    cancel: CancellationToken,
}

impl Collector {
    pub fn new(
        store: Arc<dyn RecordStore>,
        source: Arc<dyn RecordSource>,
        resolver: Arc<dyn AttachmentResolver>,
    ) -> Self {
        Self {
            store,
            source,
            resolver,
            attachments_dir: None,
            html_dir: None,
            cancel: CancellationToken::new(),
        }
    }

    /// Collector over the SQLite store at `store_location` (created if absent)
    ///
    /// Attachments and archived pages go to `attachments/` and `html/`
    /// beside the database unless overridden.
    pub fn open(
        store_location: impl AsRef<Path>,
        source: Arc<dyn RecordSource>,
        resolver: Arc<dyn AttachmentResolver>,
    ) -> CollectResult<Self> {
        let store_location = store_location.as_ref();
        let store = SqliteStore::open(store_location)?;
        let beside = store_location.parent().unwrap_or_else(|| Path::new(""));
        Ok(Self::new(Arc::new(store), source, resolver)
            .with_attachments_dir(beside.join("attachments"))
            .with_html_dir(beside.join("html")))
    }

    /// Where downloaded attachments are written
    pub fn with_attachments_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.attachments_dir = Some(dir.into());
        self
    }

    /// Where raw consultation pages are archived
    pub fn with_html_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.html_dir = Some(dir.into());
        self
    }

    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    pub fn store(&self) -> &Arc<dyn RecordStore> {
        &self.store
    }

    // === Consultations ===

    /// Store every listed consultation not stored yet
    pub async fn collect_consultations(&self, options: &ConsultationOptions) -> CollectResult<CollectReport> {
        let html_dir = match (options.save_html, &self.html_dir) {
            (true, Some(dir)) => {
                tokio::fs::create_dir_all(dir).await.map_err(io_error(dir))?;
                Some(dir.as_path())
            }
            (true, None) => return Err(CollectError::MissingDirectory("html")),
            (false, _) => None,
        };

        info!("Collecting consultations");
        let mut report = CollectReport::new();
        let mut cursor: Option<String> = None;

        'listing: loop {
            if self.stop_requested(&mut report) {
                break;
            }
            let page = match self.source.list_consultations(cursor.as_deref()).await {
                Ok(page) => page,
                Err(e) => {
                    warn!(cursor = ?cursor, error = %e, "Consultation listing failed; ending this run");
                    report.listing_complete = false;
                    break;
                }
            };
            report.listed += page.entries.len();

            for entry in &page.entries {
                if self.stop_requested(&mut report) {
                    break 'listing;
                }
                let slug = ConsultationSlug::new(entry.key.as_str());
                if self.store.contains_consultation(&slug)? {
                    debug!(slug = %slug, "Already stored");
                    report.skipped += 1;
                    continue;
                }

                let fetched = match self.source.fetch_consultation(entry).await {
                    Ok(fetched) => fetched,
                    Err(e) => {
                        warn!(slug = %slug, error = %e, "Could not fetch consultation");
                        report.failed += 1;
                        continue;
                    }
                };

                let mut record = fetched.record;
                record.slug = slug.clone();
                if let Some(dir) = html_dir {
                    let file_name = format!("{}.html", slug);
                    let path = dir.join(&file_name);
                    tokio::fs::write(&path, fetched.body.as_bytes()).await.map_err(io_error(&path))?;
                    record.html_file = Some(file_name);
                }

                self.store.put_consultation(&record)?;
                debug!(slug = %slug, responses = record.response_count, "Stored consultation");
                report.fetched += 1;
            }

            match page.next {
                Some(next) => cursor = Some(next),
                None => break,
            }
        }

        info!(report = %report, "Consultation run finished");
        Ok(report)
    }

    // === Responses ===

    /// Store every listed response of `slug` not stored yet, then recluster
    pub async fn collect_responses(
        &self,
        slug: &ConsultationSlug,
        options: &ResponseOptions,
    ) -> CollectResult<CollectReport> {
        match (options.download_attachments, &self.attachments_dir) {
            (true, Some(dir)) => tokio::fs::create_dir_all(dir).await.map_err(io_error(dir))?,
            (true, None) => return Err(CollectError::MissingDirectory("attachments")),
            (false, _) => {}
        }
        if options.extract_attachment_text && !pdf_supported() {
            warn!("Built without the pdf feature; PDF attachments will yield no text");
        }

        info!(slug = %slug, "Collecting responses");
        let mut report = CollectReport::new();
        let mut cursor: Option<String> = None;

        'listing: loop {
            if self.stop_requested(&mut report) {
                break;
            }
            let page = match self.source.list_responses(slug, cursor.as_deref()).await {
                Ok(page) => page,
                Err(e) => {
                    warn!(slug = %slug, cursor = ?cursor, error = %e, "Response listing failed; ending this run");
                    report.listing_complete = false;
                    break;
                }
            };
            report.listed += page.entries.len();

            for entry in &page.entries {
                if self.stop_requested(&mut report) {
                    break 'listing;
                }
                self.collect_response(slug, entry, options, &mut report).await?;
            }

            match page.next {
                Some(next) => cursor = Some(next),
                None => break,
            }
        }

        if options.detect_components && !report.cancelled {
            report.components = Some(self.recluster(slug, &options.cluster)?);
        }

        info!(slug = %slug, report = %report, "Response run finished");
        Ok(report)
    }

    async fn collect_response(
        &self,
        slug: &ConsultationSlug,
        entry: &ListingEntry,
        options: &ResponseOptions,
        report: &mut CollectReport,
    ) -> CollectResult<()> {
        let key = ResponseKey::new(slug.clone(), entry.key.as_str());
        if self.store.contains_response(&key)? {
            debug!(key = %key, "Already stored");
            report.skipped += 1;
            if options.needs_attachments() {
                self.complete_attachments(&key, options, report).await?;
            }
            return Ok(());
        }

        let mut record = match self.source.fetch_response(slug, entry).await {
            Ok(record) => record,
            Err(e) => {
                warn!(key = %key, error = %e, "Could not fetch response");
                report.failed += 1;
                return Ok(());
            }
        };
        record.consultation_slug = key.consultation.clone();
        record.response_id = key.response_id.clone();
        if !options.include_author_name {
            record.author_name = None;
        }

        if options.needs_attachments() && !record.attachment_refs.is_empty() {
            self.resolve_attachments(&mut record, options, report).await?;
        }

        self.store.put_response(&record)?;
        debug!(key = %key, attachments = record.attachment_refs.len(), "Stored response");
        report.fetched += 1;
        Ok(())
    }

    /// Retry the attachments of a stored response that an earlier run could
    /// not resolve
    async fn complete_attachments(
        &self,
        key: &ResponseKey,
        options: &ResponseOptions,
        report: &mut CollectReport,
    ) -> CollectResult<()> {
        let Some(mut record) = self.store.load_response(key)? else {
            return Ok(());
        };
        if !attachments_pending(&record, options) {
            return Ok(());
        }

        debug!(key = %key, "Retrying unresolved attachments");
        self.resolve_attachments(&mut record, options, report).await?;
        if self.store.put_response(&record)? == PutOutcome::Merged {
            info!(key = %key, "Completed attachments of stored response");
        }
        Ok(())
    }

    /// Download, save and read the attachments of a record
    ///
    /// A failed download is logged and leaves that attachment without a
    /// local file or text; the response itself is still stored and the
    /// attachment is retried on the next run.
    async fn resolve_attachments(
        &self,
        record: &mut ResponseRecord,
        options: &ResponseOptions,
        report: &mut CollectReport,
    ) -> CollectResult<()> {
        let save_dir = if options.download_attachments {
            self.attachments_dir.as_deref()
        } else {
            None
        };
        let mut texts: Vec<String> = Vec::new();

        for attachment in record.attachment_refs.iter_mut() {
            let url_mime = guess_mime(&attachment.url);
            let target = save_dir.map(|dir| {
                dir.join(format!("{}.{}", attachment.attachment_id(), extension_for(url_mime)))
            });

            let (bytes, mime) = match &target {
                Some(path) if path.exists() => {
                    debug!(path = %path.display(), "Reusing downloaded attachment");
                    let bytes = if options.extract_attachment_text {
                        tokio::fs::read(path).await.map_err(io_error(path))?
                    } else {
                        Vec::new()
                    };
                    (bytes, url_mime.or_else(|| guess_mime(&path.to_string_lossy())).map(str::to_string))
                }
                _ => match self.resolver.fetch(&attachment.url).await {
                    Ok(fetched) => {
                        if let Some(path) = &target {
                            tokio::fs::write(path, &fetched.bytes).await.map_err(io_error(path))?;
                            report.attachments_saved += 1;
                        }
                        let mime = fetched.content_type.or_else(|| url_mime.map(str::to_string));
                        (fetched.bytes, mime)
                    }
                    Err(e) => {
                        warn!(url = %attachment.url, error = %e, "Could not download attachment");
                        report.attachment_failures += 1;
                        continue;
                    }
                },
            };

            if let Some(path) = &target {
                attachment.local_path = Some(path.display().to_string());
            }

            if options.extract_attachment_text {
                match self.resolver.extract_text(&bytes, mime.as_deref()) {
                    Some(text) => texts.push(text),
                    None => debug!(url = %attachment.url, mime = ?mime, "No text extracted from attachment"),
                }
            }
        }

        if !texts.is_empty() {
            record.text_attachment = Some(texts.join("\n\n"));
        }
        Ok(())
    }

    // === Clustering ===

    /// Recluster the stored responses of `slug` and write labels back
    ///
    /// Returns the number of components. Equivalent to calling
    /// `add_components` on the reloaded records.
    pub fn recluster(&self, slug: &ConsultationSlug, config: &ClusterConfig) -> CollectResult<usize> {
        let records = self.store.load_responses(slug)?;
        let labeled = add_components(records, config);

        // One transaction, so an interrupted run never mixes old and new labels
        let updated = self.store.put_responses(&labeled)?;

        let components: BTreeSet<_> = labeled.iter().filter_map(|r| r.component).collect();
        info!(
            slug = %slug,
            responses = labeled.len(),
            components = components.len(),
            updated,
            "Clustered responses"
        );
        Ok(components.len())
    }

    fn stop_requested(&self, report: &mut CollectReport) -> bool {
        if self.cancel.is_cancelled() {
            if !report.cancelled {
                info!("Cancellation requested; stopping after committed records");
            }
            report.cancelled = true;
        }
        report.cancelled
    }
}

/// Whether a stored response still lacks attachment files or text
///
/// With downloads on, every attachment must have a local file. Without
/// them, only a missing `text_attachment` counts.
fn attachments_pending(record: &ResponseRecord, options: &ResponseOptions) -> bool {
    if record.attachment_refs.is_empty() {
        return false;
    }
    if options.download_attachments {
        record.attachment_refs.iter().any(|a| a.local_path.is_none())
    } else {
        options.extract_attachment_text && record.text_attachment.is_none()
    }
}
