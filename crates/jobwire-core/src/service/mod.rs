//! External capabilities used by campaign runs.
//!
//! The run controller only talks to a [`ContactSource`] and a
//! [`MessagingProvider`]; the Brevo and WhatsApp clients are plugged in
//! through the adapters in this module.

pub mod brevo;
pub mod whatsapp;

use std::future::Future;

use serde::Serialize;

use crate::{PhoneNumber, Result};

pub use brevo::BrevoContactSource;
pub use whatsapp::WhatsAppProvider;

/// A contact list as reported by the contact source.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SegmentInfo {
    /// Source list id.
    pub id: i64,
    /// List name.
    pub name: String,
    /// Members in the list.
    pub member_count: u64,
}

/// One member of a contact list, before eligibility filtering.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SegmentMember {
    /// Phone number as stored in the source, if any.
    pub recipient_key_raw: Option<String>,
    /// Source-side identifier for logs.
    pub display_id: String,
    /// Contact opted out of messages.
    pub opted_out: bool,
    /// Contact is blacklisted.
    pub blacklisted: bool,
}

/// Provider acknowledgement of a sent message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Delivery {
    /// Provider message id.
    pub message_id: String,
    /// HTTP status of the accepting response.
    pub http_status: u16,
}

/// A send that the provider did not accept.
///
/// This is a per-recipient outcome, never a run error.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{detail}")]
pub struct ProviderError {
    /// HTTP status, when a response was received.
    pub http_status: Option<u16>,
    /// Failure description.
    pub detail: String,
}

impl ProviderError {
    /// Creates a provider error.
    #[must_use]
    pub fn new(http_status: Option<u16>, detail: impl Into<String>) -> Self {
        Self {
            http_status,
            detail: detail.into(),
        }
    }
}

/// Source of contact lists.
pub trait ContactSource: Send + Sync {
    /// Returns true if the source is reachable with the configured credentials.
    fn verify(&self) -> impl Future<Output = bool> + Send;

    /// Lists every contact list.
    fn list_segments(&self) -> impl Future<Output = Result<Vec<SegmentInfo>>> + Send;

    /// Fetches the members of one list.
    fn get_segment_members(
        &self,
        segment_id: i64,
    ) -> impl Future<Output = Result<Vec<SegmentMember>>> + Send;
}

/// Sender of template messages.
pub trait MessagingProvider: Send + Sync {
    /// Returns true if the provider accepts the configured credentials.
    fn verify(&self) -> impl Future<Output = bool> + Send;

    /// Sends one template message.
    fn send_template(
        &self,
        to: &PhoneNumber,
        template_name: &str,
        variables: &[String],
        image_url: Option<&str>,
    ) -> impl Future<Output = std::result::Result<Delivery, ProviderError>> + Send;
}
