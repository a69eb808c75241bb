//! Consultation metadata snapshot

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// Natural key of a consultation: the first path segment of its portal URL
///
/// Serializes as a plain string (e.g. "wetgevingsagenda-2024").
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ConsultationSlug(String);

impl ConsultationSlug {
    pub fn new(slug: impl Into<String>) -> Self {
        Self(slug.into())
    }

    /// Get the inner string value
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for ConsultationSlug {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for ConsultationSlug {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for ConsultationSlug {
    fn from(s: String) -> Self {
        Self(s)
    }
}

/// Metadata of one consultation, captured once when first observed
///
/// Everything except `html_file` is a snapshot and never changes after the
/// record is stored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConsultationRecord {
    /// Unique key
    pub slug: ConsultationSlug,
    /// Page the metadata was read from
    pub url: String,
    pub title: String,
    /// Responsible ministry or agency
    pub organisation: Option<String>,
    #[serde(default)]
    pub topics: BTreeSet<String>,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    /// Number of responses the portal reported at collection time
    pub response_count: u64,
    /// Whether a consultation report was published
    #[serde(default)]
    pub report_available: bool,
    /// Remaining rows of the portal's metadata table
    #[serde(default)]
    pub properties: BTreeMap<String, String>,
    /// File name of the archived raw page, if it was saved
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub html_file: Option<String>,
}

impl ConsultationRecord {
    /// Create a record with the given slug and title; everything else empty
    pub fn new(slug: impl Into<ConsultationSlug>, title: impl Into<String>) -> Self {
        Self {
            slug: slug.into(),
            url: String::new(),
            title: title.into(),
            organisation: None,
            topics: BTreeSet::new(),
            start_date: None,
            end_date: None,
            response_count: 0,
            report_available: false,
            properties: BTreeMap::new(),
            html_file: None,
        }
    }

    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.url = url.into();
        self
    }

    pub fn with_organisation(mut self, organisation: impl Into<String>) -> Self {
        self.organisation = Some(organisation.into());
        self
    }

    pub fn with_topic(mut self, topic: impl Into<String>) -> Self {
        self.topics.insert(topic.into());
        self
    }

    pub fn with_period(mut self, start: Option<NaiveDate>, end: Option<NaiveDate>) -> Self {
        self.start_date = start;
        self.end_date = end;
        self
    }

    pub fn with_response_count(mut self, count: u64) -> Self {
        self.response_count = count;
        self
    }

    /// Name of the first snapshot field that differs from `other`, if any
    pub fn immutable_mismatch(&self, other: &ConsultationRecord) -> Option<&'static str> {
        if self.slug != other.slug {
            return Some("slug");
        }
        if self.url != other.url {
            return Some("url");
        }
        if self.title != other.title {
            return Some("title");
        }
        if self.organisation != other.organisation {
            return Some("organisation");
        }
        if self.topics != other.topics {
            return Some("topics");
        }
        if self.start_date != other.start_date || self.end_date != other.end_date {
            return Some("period");
        }
        if self.response_count != other.response_count {
            return Some("response_count");
        }
        if self.report_available != other.report_available {
            return Some("report_available");
        }
        if self.properties != other.properties {
            return Some("properties");
        }
        None
    }

    /// Fold additive fields of `incoming` into this record
    ///
    /// A present value wins; an absent one never erases what is stored.
    pub fn merge_additive(&mut self, incoming: &ConsultationRecord) {
        if incoming.html_file.is_some() {
            self.html_file = incoming.html_file.clone();
        }
    }
}
