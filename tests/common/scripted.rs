//! Scripted collaborators for collection tests
//!
//! `ScriptedSource` serves fixed consultations and responses in pages and
//! records every fetch; it can fail chosen keys, fail a listing page, trip a
//! cancellation token after a number of fetches, and refuse to fetch keys a
//! store already holds. `ScriptedResolver` serves attachment bytes by URL.

use async_trait::async_trait;
use consultatie::source::{FetchResult, FetchedAttachment, FetchedConsultation};
use consultatie::{
    AttachmentResolver, CancellationToken, ConsultationRecord, ConsultationSlug, FetchError, ListingEntry,
    ListingPage, RecordSource, RecordStore, ResponseKey, ResponseRecord,
};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

pub struct ScriptedSource {
    consultations: Vec<ConsultationRecord>,
    responses: BTreeMap<ConsultationSlug, Vec<ResponseRecord>>,
    page_size: usize,
    failing_keys: Mutex<HashSet<String>>,
    failing_listing_page: Option<usize>,
    guard: Option<Arc<dyn RecordStore>>,
    cancel_after: Option<(usize, CancellationToken)>,
    fetched: Mutex<Vec<String>>,
    refetch_attempts: AtomicUsize,
}

impl Default for ScriptedSource {
    fn default() -> Self {
        Self::new()
    }
}

impl ScriptedSource {
    pub fn new() -> Self {
        Self {
            consultations: Vec::new(),
            responses: BTreeMap::new(),
            page_size: 2,
            failing_keys: Mutex::new(HashSet::new()),
            failing_listing_page: None,
            guard: None,
            cancel_after: None,
            fetched: Mutex::new(Vec::new()),
            refetch_attempts: AtomicUsize::new(0),
        }
    }

    pub fn with_consultation(mut self, record: ConsultationRecord) -> Self {
        self.consultations.push(record);
        self
    }

    pub fn with_response(mut self, record: ResponseRecord) -> Self {
        self.responses
            .entry(record.consultation_slug.clone())
            .or_default()
            .push(record);
        self
    }

    pub fn with_responses(self, records: impl IntoIterator<Item = ResponseRecord>) -> Self {
        records.into_iter().fold(self, |source, record| source.with_response(record))
    }

    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size.max(1);
        self
    }

    /// Fetching `key` (a slug, or `slug/response_id`) fails until `heal` is called
    pub fn failing_on(self, key: &str) -> Self {
        self.failing_keys.lock().unwrap().insert(key.to_string());
        self
    }

    pub fn heal(&self, key: &str) {
        self.failing_keys.lock().unwrap().remove(key);
    }

    /// Listing page `page` (0-based) errors
    pub fn failing_listing_page(mut self, page: usize) -> Self {
        self.failing_listing_page = Some(page);
        self
    }

    /// Error (and count) whenever asked to fetch a key `store` already holds
    pub fn guarded_by(mut self, store: Arc<dyn RecordStore>) -> Self {
        self.guard = Some(store);
        self
    }

    /// Trip `token` once `fetches` records have been fetched
    pub fn cancelling_after(mut self, fetches: usize, token: CancellationToken) -> Self {
        self.cancel_after = Some((fetches, token));
        self
    }

    /// Keys fetched so far, in order
    pub fn fetched_keys(&self) -> Vec<String> {
        self.fetched.lock().unwrap().clone()
    }

    pub fn refetch_attempts(&self) -> usize {
        self.refetch_attempts.load(Ordering::SeqCst)
    }

    fn page_of(&self, entries: Vec<ListingEntry>, cursor: Option<&str>) -> FetchResult<ListingPage> {
        let page: usize = cursor.map(|c| c.parse().unwrap()).unwrap_or(0);
        if self.failing_listing_page == Some(page) {
            return Err(FetchError::Unavailable(format!("listing page {}", page)));
        }
        let total = entries.len();
        let start = page * self.page_size;
        let entries: Vec<ListingEntry> = entries.into_iter().skip(start).take(self.page_size).collect();
        Ok(ListingPage {
            entries,
            next: (start + self.page_size < total).then(|| (page + 1).to_string()),
        })
    }

    fn check_fetch(&self, key: &str) -> FetchResult<()> {
        if self.failing_keys.lock().unwrap().contains(key) {
            return Err(FetchError::Unavailable(format!("scripted failure for {}", key)));
        }
        self.fetched.lock().unwrap().push(key.to_string());
        if let Some((limit, token)) = &self.cancel_after {
            if self.fetched.lock().unwrap().len() >= *limit {
                token.cancel();
            }
        }
        Ok(())
    }
}

#[async_trait]
impl RecordSource for ScriptedSource {
    async fn list_consultations(&self, cursor: Option<&str>) -> FetchResult<ListingPage> {
        let entries: Vec<ListingEntry> = self
            .consultations
            .iter()
            .map(|c| ListingEntry::new(c.slug.as_str(), format!("https://portal.test/{}", c.slug)))
            .collect();
        self.page_of(entries, cursor)
    }

    async fn fetch_consultation(&self, entry: &ListingEntry) -> FetchResult<FetchedConsultation> {
        let slug = ConsultationSlug::new(entry.key.as_str());
        if let Some(store) = &self.guard {
            if store.contains_consultation(&slug).unwrap() {
                self.refetch_attempts.fetch_add(1, Ordering::SeqCst);
                return Err(FetchError::Unavailable(format!("{} is already stored", slug)));
            }
        }
        self.check_fetch(&entry.key)?;
        let record = self
            .consultations
            .iter()
            .find(|c| c.slug == slug)
            .cloned()
            .ok_or_else(|| FetchError::Unavailable(format!("unknown consultation {}", slug)))?;
        let body = format!("<html><body><h1>{}</h1></body></html>", record.title);
        Ok(FetchedConsultation { record, body })
    }

    async fn list_responses(&self, slug: &ConsultationSlug, cursor: Option<&str>) -> FetchResult<ListingPage> {
        let entries: Vec<ListingEntry> = self
            .responses
            .get(slug)
            .map(|records| {
                records
                    .iter()
                    .map(|r| {
                        ListingEntry::new(
                            r.response_id.as_str(),
                            format!("https://portal.test/{}/reactie/{}", slug, r.response_id),
                        )
                    })
                    .collect()
            })
            .unwrap_or_default();
        self.page_of(entries, cursor)
    }

    async fn fetch_response(&self, slug: &ConsultationSlug, entry: &ListingEntry) -> FetchResult<ResponseRecord> {
        let key = ResponseKey::new(slug.clone(), entry.key.as_str());
        if let Some(store) = &self.guard {
            if store.contains_response(&key).unwrap() {
                self.refetch_attempts.fetch_add(1, Ordering::SeqCst);
                return Err(FetchError::Unavailable(format!("{} is already stored", key)));
            }
        }
        self.check_fetch(&key.to_string())?;
        self.responses
            .get(slug)
            .and_then(|records| records.iter().find(|r| r.response_id == entry.key))
            .cloned()
            .ok_or_else(|| FetchError::Unavailable(format!("unknown response {}", key)))
    }
}

#[derive(Default)]
pub struct ScriptedResolver {
    files: HashMap<String, FetchedAttachment>,
    downloads: Mutex<Vec<String>>,
}

impl ScriptedResolver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_file(mut self, url: &str, bytes: &[u8], content_type: Option<&str>) -> Self {
        self.files.insert(
            url.to_string(),
            FetchedAttachment {
                bytes: bytes.to_vec(),
                content_type: content_type.map(str::to_string),
            },
        );
        self
    }

    /// URLs downloaded so far, in order
    pub fn downloads(&self) -> Vec<String> {
        self.downloads.lock().unwrap().clone()
    }
}

#[async_trait]
impl AttachmentResolver for ScriptedResolver {
    async fn fetch(&self, url: &str) -> FetchResult<FetchedAttachment> {
        self.downloads.lock().unwrap().push(url.to_string());
        self.files.get(url).cloned().ok_or_else(|| FetchError::Status {
            url: url.to_string(),
            status: 404,
        })
    }
}
