//! Human-readable output for each command.

use jobwire_core::campaign::{
    DryRunReport, RunReport, SimulationReport, SkipCounts, ValidationReport,
};
use jobwire_core::{DailySummary, SegmentConfig, SegmentInfo, SendRecord};
use serde::Serialize;

/// Contact lists next to the configured segments.
#[derive(Debug, Serialize)]
pub struct SegmentsView {
    pub lists: Vec<SegmentInfo>,
    pub configured: Vec<SegmentConfig>,
}

/// One ledger row with the recipient masked.
#[derive(Debug, Serialize)]
pub struct HistoryEntry {
    pub sent_at: String,
    pub recipient: String,
    pub campaign_key: String,
    pub status: String,
    pub segment_label: Option<String>,
    pub http_status: Option<u16>,
    pub detail: Option<String>,
}

impl From<&SendRecord> for HistoryEntry {
    fn from(record: &SendRecord) -> Self {
        Self {
            sent_at: record.sent_at.format("%Y-%m-%d %H:%M:%S UTC").to_string(),
            recipient: record.recipient_key.masked(),
            campaign_key: record.campaign_key.to_string(),
            status: record.status.to_string(),
            segment_label: record.segment_label.clone(),
            http_status: record.http_status,
            detail: record
                .provider_message_id
                .clone()
                .or_else(|| record.error_detail.clone()),
        }
    }
}

fn ok_mark(ok: bool) -> &'static str {
    if ok { "ok" } else { "FAILED" }
}

pub fn validation(report: &ValidationReport) {
    println!("Contact source:     {}", ok_mark(report.contact_source_ok));
    println!("Messaging provider: {}", ok_mark(report.messaging_provider_ok));
    if report.messages.is_empty() {
        println!("Configuration:      ok");
    } else {
        println!("Configuration:");
        for message in &report.messages {
            println!("  - {message}");
        }
    }
}

pub fn segments(view: &SegmentsView) {
    println!("Contact lists:");
    for list in &view.lists {
        println!("  {:>6}  {:<40} {:>7} contacts", list.id, list.name, list.member_count);
    }

    println!();
    println!("Configured segments:");
    if view.configured.is_empty() {
        println!("  (none)");
    }
    for segment in &view.configured {
        let list = segment
            .list_id
            .map_or_else(|| "no list".to_string(), |id| format!("list {id}"));
        let known = segment
            .list_id
            .is_some_and(|id| view.lists.iter().any(|l| l.id == id));
        println!(
            "  {:<20} {:<12} {:<10} priority {:<3} {}{}",
            segment.name,
            segment.label(),
            segment.category.as_deref().unwrap_or("-"),
            segment.priority,
            list,
            if known { "" } else { " (missing)" }
        );
    }
}

fn skipped(counts: &SkipCounts) {
    println!(
        "Skipped: {} opted out, {} blacklisted, {} invalid phone, {} already sent, {} duplicate",
        counts.opted_out,
        counts.blacklisted,
        counts.invalid_phone,
        counts.already_sent,
        counts.duplicate
    );
}

pub fn dry_run(report: &DryRunReport) {
    for segment in &report.per_segment {
        println!(
            "{} [{}] list {} ({}): {} eligible",
            segment.segment_name,
            segment.segment_label,
            segment.list_id,
            segment.campaign_key,
            segment.eligible_count
        );
        for sample in &segment.sample {
            println!("    {sample}");
        }
    }
    println!();
    println!("Total eligible:   {}", report.total_eligible);
    println!("Remaining today:  {}", report.remaining_budget);
    println!("Would send now:   {}", report.would_send_count);
    skipped(&report.skipped);
}

pub fn simulation(report: &SimulationReport) {
    for message in &report.messages {
        println!(
            "{} ({}) [{}] {}",
            message.display_id, message.recipient, message.segment_label, message.campaign_key
        );
        println!("POST {}", message.url);
        match serde_json::to_string_pretty(&message.payload) {
            Ok(body) => println!("{body}"),
            Err(e) => println!("(payload not printable: {e})"),
        }
        println!();
    }
    println!(
        "A send would attempt {} message(s); {} shown.",
        report.would_attempt,
        report.messages.len()
    );
}

pub fn run(report: &RunReport) {
    if let Some(campaign) = &report.campaign_id {
        println!("Campaign:  {campaign}");
    }
    println!("Attempted: {}", report.attempted);
    println!("Succeeded: {}", report.succeeded);
    println!("Failed:    {}", report.failed);
    skipped(&report.skipped);
    match report.halted_reason {
        Some(reason) => println!("Halted:    {reason}"),
        None => println!("Completed"),
    }
    if let Some(error) = &report.error {
        println!("Error:     {error}");
    }
}

pub fn summary(summary: &DailySummary) {
    println!("{}", summary.date);
    println!("  success:   {}", summary.success);
    println!("  failed:    {}", summary.failed);
    println!("  total:     {} of {}", summary.total, summary.limit);
    println!("  remaining: {}", summary.remaining);
    for code in &summary.error_codes {
        let status = code
            .http_status
            .map_or_else(|| "no response".to_string(), |s| s.to_string());
        println!("  {status}: {}", code.count);
    }
}

pub fn history(entries: &[HistoryEntry]) {
    if entries.is_empty() {
        println!("No sends recorded.");
    }
    for entry in entries {
        println!(
            "{}  {:<7} {:<10} {:<24} {}",
            entry.sent_at,
            entry.status,
            entry.recipient,
            entry.campaign_key,
            entry.detail.as_deref().unwrap_or("")
        );
    }
}
