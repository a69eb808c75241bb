//! Record source and attachment resolver contracts

use super::extract;
use crate::record::{ConsultationRecord, ConsultationSlug, ResponseRecord};
use async_trait::async_trait;
use thiserror::Error;

/// Failure fetching or parsing one page or file
///
/// Always scoped to a single record or listing page; the collector logs it,
/// skips the key and carries on.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("HTTP {status} for {url}")]
    Status { url: String, status: u16 },

    #[error("Could not parse {url}: {reason}")]
    Parse { url: String, reason: String },

    #[error("Invalid URL: {0}")]
    Url(#[from] url::ParseError),

    #[error("Source unavailable: {0}")]
    Unavailable(String),
}

/// Result type for fetch operations
pub type FetchResult<T> = Result<T, FetchError>;

/// One item of a listing: the natural key plus where its body lives
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListingEntry {
    pub key: String,
    pub url: String,
}

impl ListingEntry {
    pub fn new(key: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            url: url.into(),
        }
    }
}

/// A page of listing entries
#[derive(Debug, Clone, Default)]
pub struct ListingPage {
    pub entries: Vec<ListingEntry>,
    /// Opaque cursor for the following page; `None` ends the listing
    pub next: Option<String>,
}

/// A consultation together with the raw page it was parsed from
#[derive(Debug, Clone)]
pub struct FetchedConsultation {
    pub record: ConsultationRecord,
    pub body: String,
}

/// Downloaded attachment bytes
#[derive(Debug, Clone)]
pub struct FetchedAttachment {
    pub bytes: Vec<u8>,
    /// Content type reported by the server, if any
    pub content_type: Option<String>,
}

/// Produces consultations and responses from the portal
///
/// Listing is split from fetching so callers can skip stored keys before
/// paying for the body.
#[async_trait]
pub trait RecordSource: Send + Sync {
    /// A page of the consultation listing; `cursor` is `None` for the first page
    async fn list_consultations(&self, cursor: Option<&str>) -> FetchResult<ListingPage>;

    /// Fetch the metadata of one listed consultation
    async fn fetch_consultation(&self, entry: &ListingEntry) -> FetchResult<FetchedConsultation>;

    /// A page of the response listing of one consultation
    async fn list_responses(&self, slug: &ConsultationSlug, cursor: Option<&str>) -> FetchResult<ListingPage>;

    /// Fetch one listed response, including attachment references
    async fn fetch_response(&self, slug: &ConsultationSlug, entry: &ListingEntry) -> FetchResult<ResponseRecord>;
}

/// Downloads attachments and turns them into text
#[async_trait]
pub trait AttachmentResolver: Send + Sync {
    /// Download the attachment at `url`
    async fn fetch(&self, url: &str) -> FetchResult<FetchedAttachment>;

    /// Text of an attachment, or `None` when the format is unsupported
    fn extract_text(&self, bytes: &[u8], mime_hint: Option<&str>) -> Option<String> {
        extract::extract_text(bytes, mime_hint)
    }
}
