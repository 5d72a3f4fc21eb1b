//! Campaign runs.
//!
//! Eligibility resolution, the rate and safety governor, and the run
//! controller that ties them to the ledger and the external services.

pub mod eligibility;
pub mod governor;
mod report;
mod runner;

pub use eligibility::{
    Candidate, Candidates, EligibilityResolver, SegmentPlan, SegmentSelector, SkipCounts,
};
pub use governor::{DenyReason, Gate, Governor, GovernorConfig, Outcome, RunState};
pub use report::{
    DailySummary, DryRunReport, ErrorCodeCount, HaltReason, RunReport, SegmentDryRun,
    SimulatedMessage, SimulationReport, ValidationReport,
};
pub use runner::{CampaignRunner, Phase, RunMode, RunRequest};
