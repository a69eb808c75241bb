//! Run options and run reports

use crate::similarity::ClusterConfig;
use serde::Serialize;

/// Options for `Collector::collect_consultations`
#[derive(Debug, Clone, Default)]
pub struct ConsultationOptions {
    /// Archive each newly fetched consultation page under the html directory
    pub save_html: bool,
}

/// Options for `Collector::collect_responses`
#[derive(Debug, Clone)]
pub struct ResponseOptions {
    /// Keep the respondent's name (dropped by default)
    pub include_author_name: bool,
    /// Save attachment files under the attachments directory
    pub download_attachments: bool,
    /// Fill `text_attachment` from the attachments
    pub extract_attachment_text: bool,
    /// Recluster the consultation once the listing is exhausted
    pub detect_components: bool,
    pub cluster: ClusterConfig,
}

impl ResponseOptions {
    /// Whether attachment bytes are needed at all
    pub(crate) fn needs_attachments(&self) -> bool {
        self.download_attachments || self.extract_attachment_text
    }
}

impl Default for ResponseOptions {
    fn default() -> Self {
        Self {
            include_author_name: false,
            download_attachments: true,
            extract_attachment_text: true,
            detect_components: true,
            cluster: ClusterConfig::default(),
        }
    }
}

/// What one collection run did
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CollectReport {
    /// Entries seen on listing pages
    pub listed: usize,
    /// Records fetched and stored this run
    pub fetched: usize,
    /// Entries already in the store
    pub skipped: usize,
    /// Entries whose fetch failed; retried on the next run
    pub failed: usize,
    pub attachments_saved: usize,
    pub attachment_failures: usize,
    /// False when a listing page could not be fetched
    pub listing_complete: bool,
    pub cancelled: bool,
    /// Number of components after clustering, when it ran
    pub components: Option<usize>,
}

impl CollectReport {
    pub fn new() -> Self {
        Self {
            listed: 0,
            fetched: 0,
            skipped: 0,
            failed: 0,
            attachments_saved: 0,
            attachment_failures: 0,
            listing_complete: true,
            cancelled: false,
            components: None,
        }
    }
}

impl Default for CollectReport {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for CollectReport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} listed, {} fetched, {} skipped, {} failed",
            self.listed, self.fetched, self.skipped, self.failed
        )?;
        if self.attachments_saved > 0 || self.attachment_failures > 0 {
            write!(
                f,
                ", attachments {} saved / {} failed",
                self.attachments_saved, self.attachment_failures
            )?;
        }
        if let Some(components) = self.components {
            write!(f, ", {} components", components)?;
        }
        if !self.listing_complete {
            write!(f, " (listing incomplete)")?;
        }
        if self.cancelled {
            write!(f, " (cancelled)")?;
        }
        Ok(())
    }
}
