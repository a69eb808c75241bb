//! HTTP access to the consultation portal

use super::parse::{self, PageIssue};
use super::traits::{
    AttachmentResolver, FetchError, FetchResult, FetchedAttachment, FetchedConsultation, ListingEntry,
    ListingPage, RecordSource,
};
use crate::record::{ConsultationSlug, ResponseRecord};
use async_trait::async_trait;
use std::time::Duration;
use tracing::debug;
use url::Url;

/// Portal the collector talks to by default
pub const DEFAULT_BASE_URL: &str = "https://www.internetconsultatie.nl";

/// User agent sent with every request unless configured otherwise
pub const DEFAULT_USER_AGENT: &str = concat!("consultatie/", env!("CARGO_PKG_VERSION"));

fn build_client(timeout: Duration, user_agent: &str) -> FetchResult<reqwest::Client> {
    let client = reqwest::Client::builder()
        .timeout(timeout)
        .user_agent(user_agent)
        .redirect(reqwest::redirect::Policy::limited(5))
        .build()?;
    Ok(client)
}

async fn get(client: &reqwest::Client, url: &str) -> FetchResult<reqwest::Response> {
    let response = client.get(url).send().await?;
    let status = response.status();
    if !status.is_success() {
        return Err(FetchError::Status {
            url: url.to_string(),
            status: status.as_u16(),
        });
    }
    Ok(response)
}

fn parse_error(url: &str, issue: PageIssue) -> FetchError {
    FetchError::Parse {
        url: url.to_string(),
        reason: issue.to_string(),
    }
}

/// `RecordSource` backed by the live portal
///
/// Listing cursors are URLs for the consultation listing and page numbers
/// for response listings.
pub struct PortalSource {
    client: reqwest::Client,
    base: Url,
    request_delay: Duration,
}

impl PortalSource {
    pub fn new(base_url: &str, timeout: Duration, user_agent: &str) -> FetchResult<Self> {
        Ok(Self {
            client: build_client(timeout, user_agent)?,
            base: Url::parse(base_url)?,
            request_delay: Duration::ZERO,
        })
    }

    /// Pause before every request
    pub fn with_request_delay(mut self, delay: Duration) -> Self {
        self.request_delay = delay;
        self
    }

    async fn fetch_html(&self, url: &str) -> FetchResult<String> {
        if !self.request_delay.is_zero() {
            tokio::time::sleep(self.request_delay).await;
        }
        debug!(url, "GET");
        let body = get(&self.client, url).await?.text().await?;
        Ok(body)
    }

    fn listing_url(&self, path: &str) -> FetchResult<String> {
        Ok(self.base.join(path)?.to_string())
    }
}

#[async_trait]
impl RecordSource for PortalSource {
    async fn list_consultations(&self, cursor: Option<&str>) -> FetchResult<ListingPage> {
        let url = match cursor {
            Some(next) => next.to_string(),
            None => self.listing_url("/geslotenconsultaties")?,
        };
        let html = self.fetch_html(&url).await?;

        let entries = parse::result_links(&html, &self.base)
            .into_iter()
            .filter_map(|link| parse::slug_from_url(&link).map(|slug| ListingEntry::new(slug.as_str(), link)))
            .collect();
        Ok(ListingPage {
            entries,
            next: parse::next_link(&html, &self.base),
        })
    }

    async fn fetch_consultation(&self, entry: &ListingEntry) -> FetchResult<FetchedConsultation> {
        let html = self.fetch_html(&entry.url).await?;
        let slug = ConsultationSlug::new(entry.key.as_str());
        let record = parse::parse_consultation(&html, &entry.url, &slug).map_err(|issue| parse_error(&entry.url, issue))?;
        Ok(FetchedConsultation { record, body: html })
    }

    async fn list_responses(&self, slug: &ConsultationSlug, cursor: Option<&str>) -> FetchResult<ListingPage> {
        let page: u32 = match cursor {
            Some(raw) => raw.parse().map_err(|_| FetchError::Parse {
                url: self.base.to_string(),
                reason: format!("bad page cursor {:?}", raw),
            })?,
            None => 1,
        };
        let url = self.listing_url(&format!("/{}/reacties/datum/{}", slug, page))?;
        let html = self.fetch_html(&url).await?;

        let entries = parse::result_links(&html, &self.base)
            .into_iter()
            .filter_map(|link| parse::response_id_from_url(&link).map(|id| ListingEntry::new(id, link)))
            .collect();
        let last_page = parse::max_page(&html).unwrap_or(page);
        Ok(ListingPage {
            entries,
            next: (page < last_page).then(|| (page + 1).to_string()),
        })
    }

    async fn fetch_response(&self, slug: &ConsultationSlug, entry: &ListingEntry) -> FetchResult<ResponseRecord> {
        let html = self.fetch_html(&entry.url).await?;
        parse::parse_response(&html, &entry.url, slug, &entry.key).map_err(|issue| parse_error(&entry.url, issue))
    }
}

/// `AttachmentResolver` downloading over HTTP
pub struct HttpAttachmentResolver {
    client: reqwest::Client,
}

impl HttpAttachmentResolver {
    pub fn new(timeout: Duration, user_agent: &str) -> FetchResult<Self> {
        Ok(Self {
            client: build_client(timeout, user_agent)?,
        })
    }
}

#[async_trait]
impl AttachmentResolver for HttpAttachmentResolver {
    async fn fetch(&self, url: &str) -> FetchResult<FetchedAttachment> {
        debug!(url, "Downloading attachment");
        let response = get(&self.client, url).await?;
        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .map(str::to_string);
        let bytes = response.bytes().await?.to_vec();
        Ok(FetchedAttachment { bytes, content_type })
    }
}
