//! Persistent send ledger.
//!
//! One row per (recipient, campaign) attempt; the source of truth for
//! deduplication and daily volume.

pub mod migrations;
mod model;
mod repository;

pub use model::{CampaignKey, SendRecord, SendStatus, StatusCounts};
pub use repository::SendLedger;
