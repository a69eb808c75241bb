//! Where records come from
//!
//! `RecordSource` lists and fetches consultations and responses;
//! `AttachmentResolver` downloads attachment files and extracts their text.
//! `PortalSource` and `HttpAttachmentResolver` implement both against the
//! live portal; tests substitute scripted implementations.

mod extract;
pub mod parse;
mod portal;
mod traits;

pub use extract::{extension_for, extract_text, guess_mime, pdf_supported};
pub use portal::{HttpAttachmentResolver, PortalSource, DEFAULT_BASE_URL, DEFAULT_USER_AGENT};
pub use traits::{
    AttachmentResolver, FetchError, FetchResult, FetchedAttachment, FetchedConsultation, ListingEntry, ListingPage,
    RecordSource,
};
