//! Send ledger data models.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, SecondsFormat, Utc};
use serde::Serialize;

use crate::PhoneNumber;

/// Outcome of a recorded attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SendStatus {
    /// Provider accepted the message.
    Success,
    /// Provider rejected the message or the call failed.
    Failed,
}

impl SendStatus {
    /// Returns the stored representation.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Success => "success",
            Self::Failed => "failed",
        }
    }
}

impl FromStr for SendStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "success" => Ok(Self::Success),
            "failed" => Ok(Self::Failed),
            other => Err(format!("unknown send status '{other}'")),
        }
    }
}

impl fmt::Display for SendStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Identifies one campaign: the campaign id joined with the template name.
///
/// Without a campaign id the key is the template name alone, which is also
/// how template-only history imported from older databases is keyed.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct CampaignKey(String);

impl CampaignKey {
    /// Builds the key for a campaign id and template.
    #[must_use]
    pub fn new(campaign_id: Option<&str>, template_name: &str) -> Self {
        match campaign_id.map(str::trim).filter(|id| !id.is_empty()) {
            Some(id) => Self(format!("{id}:{template_name}")),
            None => Self(template_name.to_string()),
        }
    }

    /// Returns the key as stored.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CampaignKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for CampaignKey {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

/// One send attempt. Written once, never edited.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SendRecord {
    /// Canonical recipient phone number.
    pub recipient_key: PhoneNumber,
    /// Campaign the attempt belongs to.
    pub campaign_key: CampaignKey,
    /// Reporting tag (experience level or segment name).
    pub segment_label: Option<String>,
    /// Contact-source list the recipient came from.
    pub source_list_id: Option<i64>,
    /// When the attempt was made.
    pub sent_at: DateTime<Utc>,
    /// Attempt outcome.
    pub status: SendStatus,
    /// Provider message id, on success.
    pub provider_message_id: Option<String>,
    /// Failure detail, on failure.
    pub error_detail: Option<String>,
    /// HTTP status returned by the provider, when known.
    pub http_status: Option<u16>,
}

impl SendRecord {
    /// Creates a successful attempt stamped now.
    #[must_use]
    pub fn success(
        recipient_key: PhoneNumber,
        campaign_key: CampaignKey,
        message_id: impl Into<String>,
        http_status: Option<u16>,
    ) -> Self {
        Self {
            recipient_key,
            campaign_key,
            segment_label: None,
            source_list_id: None,
            sent_at: Utc::now(),
            status: SendStatus::Success,
            provider_message_id: Some(message_id.into()),
            error_detail: None,
            http_status,
        }
    }

    /// Creates a failed attempt stamped now.
    #[must_use]
    pub fn failed(
        recipient_key: PhoneNumber,
        campaign_key: CampaignKey,
        detail: impl Into<String>,
        http_status: Option<u16>,
    ) -> Self {
        Self {
            recipient_key,
            campaign_key,
            segment_label: None,
            source_list_id: None,
            sent_at: Utc::now(),
            status: SendStatus::Failed,
            provider_message_id: None,
            error_detail: Some(detail.into()),
            http_status,
        }
    }

    /// Tags the record with the segment it came from.
    #[must_use]
    pub fn with_source(mut self, segment_label: Option<String>, source_list_id: Option<i64>) -> Self {
        self.segment_label = segment_label;
        self.source_list_id = source_list_id;
        self
    }

    /// Overrides the attempt timestamp.
    #[must_use]
    pub const fn at(mut self, sent_at: DateTime<Utc>) -> Self {
        self.sent_at = sent_at;
        self
    }
}

/// Attempts per status for a period.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct StatusCounts {
    /// Successful attempts.
    pub success: u32,
    /// Failed attempts.
    pub failed: u32,
    /// All attempts.
    pub total: u32,
}

/// Formats a timestamp the way the ledger stores it.
///
/// Fixed-width microseconds with a `Z` suffix keep lexical and chronological
/// order identical.
pub(crate) fn format_timestamp(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Micros, true)
}
