//! # jobwire-core
//!
//! Send-orchestration core for `jobwire`.
//!
//! This crate provides:
//! - **Send ledger** - `SQLite` record of every attempt, unique per recipient
//!   and campaign
//! - **Eligibility** - segment selection, consent filtering and ledger-based
//!   exclusion
//! - **Governor** - daily cap, inter-message delay and error-spike breaker
//! - **Campaign runs** - dry runs, simulations, live sends and daily summaries
//! - **Configuration** - TOML settings, environment overrides and keyring
//!   secrets
//! - **Services** - Brevo and WhatsApp adapters behind capability traits

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![forbid(unsafe_code)]

pub mod campaign;
pub mod config;
mod error;
pub mod ledger;
mod phone;
pub mod service;

pub use campaign::{
    CampaignRunner, DailySummary, DryRunReport, HaltReason, Phase, RunMode, RunReport,
    RunRequest, SegmentSelector, SimulationReport, ValidationReport,
};
pub use config::credentials;
pub use config::{
    CredentialError, CredentialResult, Environment, Secret, SegmentConfig, Settings,
    ValidationError, ValidationResult, validate_settings,
};
pub use error::{Error, Result};
pub use ledger::{CampaignKey, SendLedger, SendRecord, SendStatus, StatusCounts};
pub use phone::{PhoneError, PhoneNumber, mask_phone};
pub use service::{
    BrevoContactSource, ContactSource, Delivery, MessagingProvider, ProviderError, SegmentInfo,
    SegmentMember, WhatsAppProvider,
};
