//! Serializable results of campaign operations.

use std::fmt;

use chrono::NaiveDate;
use jobwire_whatsapp::MessagePayload;
use serde::Serialize;

use super::eligibility::SkipCounts;
use super::governor::DenyReason;
use super::runner::RunMode;
use crate::ledger::SendLedger;
use crate::{Error, Result};

/// Why a run stopped before exhausting its candidates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum HaltReason {
    /// Nobody was eligible.
    NoEligibleRecipients,
    /// Daily budget exhausted.
    DailyLimitReached,
    /// Too many consecutive failures.
    ErrorSpike,
    /// Stop signal received.
    Cancelled,
    /// The contact source failed mid-run.
    SourceError,
    /// The ledger could not be read or written mid-run.
    LedgerError,
}

impl HaltReason {
    /// Maps an error raised while sending to the reason the run ends with.
    #[must_use]
    pub const fn for_error(error: &Error) -> Self {
        match error {
            Error::Database(_) | Error::ConstraintViolation { .. } => Self::LedgerError,
            _ => Self::SourceError,
        }
    }

    /// Returns true if the run was cut short by a failure rather than a limit.
    #[must_use]
    pub const fn is_aborted(self) -> bool {
        matches!(self, Self::SourceError | Self::LedgerError)
    }
}

impl From<DenyReason> for HaltReason {
    fn from(reason: DenyReason) -> Self {
        match reason {
            DenyReason::DailyLimitReached => Self::DailyLimitReached,
            DenyReason::ErrorSpike => Self::ErrorSpike,
        }
    }
}

impl fmt::Display for HaltReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NoEligibleRecipients => f.write_str("no eligible recipients"),
            Self::DailyLimitReached => f.write_str("daily limit reached"),
            Self::ErrorSpike => f.write_str("error spike"),
            Self::Cancelled => f.write_str("cancelled"),
            Self::SourceError => f.write_str("contact source error"),
            Self::LedgerError => f.write_str("ledger error"),
        }
    }
}

/// Outcome of one run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RunReport {
    /// Live or dry run.
    pub mode: RunMode,
    /// Campaign id, if one was given.
    pub campaign_id: Option<String>,
    /// Provider calls made (or that would have been made).
    pub attempted: u32,
    /// Calls accepted.
    pub succeeded: u32,
    /// Calls failed, including sends the ledger refused to record.
    pub failed: u32,
    /// Members passed over during resolution.
    pub skipped: SkipCounts,
    /// Set when the run stopped early.
    pub halted_reason: Option<HaltReason>,
    /// Error that aborted the run, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl RunReport {
    /// Returns true if the run went through every candidate.
    #[must_use]
    pub const fn completed(&self) -> bool {
        self.halted_reason.is_none()
    }

    /// Returns true if a source or ledger failure ended the run.
    #[must_use]
    pub fn aborted(&self) -> bool {
        self.halted_reason.is_some_and(HaltReason::is_aborted)
    }
}

/// Dry-run figures for one segment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SegmentDryRun {
    /// Segment name.
    pub segment_name: String,
    /// Reporting label.
    pub segment_label: String,
    /// Source list id.
    pub list_id: i64,
    /// Campaign key the segment's sends would use.
    pub campaign_key: String,
    /// Eligible recipients in this segment.
    pub eligible_count: u32,
    /// First few recipients, masked.
    pub sample: Vec<String>,
}

/// Eligibility preview without sending.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DryRunReport {
    /// Per-segment figures, in run order.
    pub per_segment: Vec<SegmentDryRun>,
    /// Eligible recipients across all segments.
    pub total_eligible: u32,
    /// Daily budget left.
    pub remaining_budget: u32,
    /// Sends a live run would make now.
    pub would_send_count: u32,
    /// Members passed over.
    pub skipped: SkipCounts,
}

/// Attempt count for one HTTP status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ErrorCodeCount {
    /// HTTP status, when the provider answered.
    pub http_status: Option<u16>,
    /// Failed attempts with that status.
    pub count: u32,
}

/// Send totals for one day.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DailySummary {
    /// Local calendar day.
    pub date: NaiveDate,
    /// Successful attempts.
    pub success: u32,
    /// Failed attempts.
    pub failed: u32,
    /// All attempts.
    pub total: u32,
    /// Configured daily limit.
    pub limit: u32,
    /// Attempts still allowed.
    pub remaining: u32,
    /// Failures grouped by HTTP status.
    pub error_codes: Vec<ErrorCodeCount>,
}

impl DailySummary {
    /// Reads the totals for `date` from the ledger.
    ///
    /// # Errors
    ///
    /// Returns an error if a ledger query fails.
    pub async fn collect(ledger: &SendLedger, date: NaiveDate, limit: u32) -> Result<Self> {
        let counts = ledger.count_by_status_on(date).await?;
        let error_codes = ledger
            .failure_codes_on(date)
            .await?
            .into_iter()
            .map(|(http_status, count)| ErrorCodeCount { http_status, count })
            .collect();

        Ok(Self {
            date,
            success: counts.success,
            failed: counts.failed,
            total: counts.total,
            limit,
            remaining: limit.saturating_sub(counts.total),
            error_codes,
        })
    }
}

/// Preflight result.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ValidationReport {
    /// Contact source answered with the configured credentials.
    pub contact_source_ok: bool,
    /// Messaging provider answered with the configured credentials.
    pub messaging_provider_ok: bool,
    /// Configuration findings.
    pub messages: Vec<String>,
}

impl ValidationReport {
    /// Returns true if both services answered and nothing was found.
    #[must_use]
    pub fn is_ok(&self) -> bool {
        self.contact_source_ok && self.messaging_provider_ok && self.messages.is_empty()
    }
}

/// One message a send would produce.
#[derive(Debug, Clone, Serialize)]
pub struct SimulatedMessage {
    /// Source-side contact id.
    pub display_id: String,
    /// Masked recipient.
    pub recipient: String,
    /// Reporting label.
    pub segment_label: String,
    /// Campaign key.
    pub campaign_key: String,
    /// Endpoint the request would go to.
    pub url: String,
    /// Exact request body.
    pub payload: MessagePayload,
}

/// Payload preview without calling the API.
#[derive(Debug, Clone, Serialize)]
pub struct SimulationReport {
    /// Previewed messages.
    pub messages: Vec<SimulatedMessage>,
    /// Candidates a send would attempt.
    pub would_attempt: u32,
}
