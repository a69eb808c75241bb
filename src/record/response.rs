//! Public responses and their attachments

use super::consultation::ConsultationSlug;
use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use std::collections::BTreeMap;
use url::Url;

/// Label of a near-duplicate component within one consultation
///
/// Labels only group responses; the value carries no meaning across runs.
pub type ComponentLabel = u32;

/// Global natural key of a response: consultation slug + response id
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ResponseKey {
    pub consultation: ConsultationSlug,
    pub response_id: String,
}

impl ResponseKey {
    pub fn new(consultation: impl Into<ConsultationSlug>, response_id: impl Into<String>) -> Self {
        Self {
            consultation: consultation.into(),
            response_id: response_id.into(),
        }
    }
}

impl std::fmt::Display for ResponseKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.consultation, self.response_id)
    }
}

/// A file attached to a response
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttachmentRef {
    pub url: String,
    /// Where the bytes were saved, once downloaded
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub local_path: Option<String>,
}

impl AttachmentRef {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            local_path: None,
        }
    }

    /// Identifier the portal embeds in the download URL
    ///
    /// Download links look like `.../{id}/{file-name}`, so this is the
    /// second-to-last path segment, falling back to the last one.
    pub fn attachment_id(&self) -> String {
        let segments: Vec<String> = Url::parse(&self.url)
            .ok()
            .and_then(|url| url.path_segments().map(|s| s.map(str::to_string).collect()))
            .unwrap_or_default();
        match segments.as_slice() {
            [.., id, _file] if !id.is_empty() => id.clone(),
            [.., last] if !last.is_empty() => last.clone(),
            _ => "attachment".to_string(),
        }
    }
}

/// One public response to a consultation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResponseRecord {
    pub consultation_slug: ConsultationSlug,
    /// Unique within the consultation
    pub response_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    /// Only kept when collection was asked to include names
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub author_name: Option<String>,
    pub text: String,
    /// Remaining rows of the response's metadata table (place, date, ...)
    #[serde(default)]
    pub properties: BTreeMap<String, String>,
    #[serde(default)]
    pub attachment_refs: Vec<AttachmentRef>,
    /// Text extracted from the attachments
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text_attachment: Option<String>,
    /// Set by the clusterer only
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub component: Option<ComponentLabel>,
}

impl ResponseRecord {
    pub fn new(
        consultation: impl Into<ConsultationSlug>,
        response_id: impl Into<String>,
        text: impl Into<String>,
    ) -> Self {
        Self {
            consultation_slug: consultation.into(),
            response_id: response_id.into(),
            url: None,
            author_name: None,
            text: text.into(),
            properties: BTreeMap::new(),
            attachment_refs: Vec::new(),
            text_attachment: None,
            component: None,
        }
    }

    pub fn with_author(mut self, name: impl Into<String>) -> Self {
        self.author_name = Some(name.into());
        self
    }

    pub fn with_attachment(mut self, url: impl Into<String>) -> Self {
        self.attachment_refs.push(AttachmentRef::new(url));
        self
    }

    pub fn with_text_attachment(mut self, text: impl Into<String>) -> Self {
        self.text_attachment = Some(text.into());
        self
    }

    pub fn key(&self) -> ResponseKey {
        ResponseKey::new(self.consultation_slug.clone(), self.response_id.clone())
    }

    /// Text used for similarity: the response text, followed by the
    /// attachment text when there is one
    pub fn comparison_text(&self) -> Cow<'_, str> {
        match &self.text_attachment {
            Some(extra) if !extra.trim().is_empty() => {
                Cow::Owned(format!("{}\n{}", self.text, extra))
            }
            _ => Cow::Borrowed(&self.text),
        }
    }

    /// Name of the first immutable field that differs from `other`, if any
    pub fn immutable_mismatch(&self, other: &ResponseRecord) -> Option<&'static str> {
        if self.consultation_slug != other.consultation_slug || self.response_id != other.response_id {
            return Some("key");
        }
        if self.url != other.url {
            return Some("url");
        }
        if self.author_name != other.author_name {
            return Some("author_name");
        }
        if self.text != other.text {
            return Some("text");
        }
        if self.properties != other.properties {
            return Some("properties");
        }
        let same_attachments = self.attachment_refs.len() == other.attachment_refs.len()
            && self
                .attachment_refs
                .iter()
                .zip(&other.attachment_refs)
                .all(|(a, b)| a.url == b.url);
        if !same_attachments {
            return Some("attachment_refs");
        }
        None
    }

    /// Fold additive fields of `incoming` into this record
    ///
    /// A present value wins; an absent one never erases what is stored.
    /// Callers check `immutable_mismatch` first, so attachments line up.
    pub fn merge_additive(&mut self, incoming: &ResponseRecord) {
        if incoming.text_attachment.is_some() {
            self.text_attachment = incoming.text_attachment.clone();
        }
        if incoming.component.is_some() {
            self.component = incoming.component;
        }
        for (stored, fresh) in self.attachment_refs.iter_mut().zip(&incoming.attachment_refs) {
            if fresh.local_path.is_some() {
                stored.local_path = fresh.local_path.clone();
            }
        }
    }
}
