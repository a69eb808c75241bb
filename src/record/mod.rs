//! Core record shapes collected from the consultation portal

mod consultation;
mod response;


pub use consultation::{ConsultationRecord, ConsultationSlug};
pub use response::{AttachmentRef, ComponentLabel, ResponseKey, ResponseRecord};
