//! End-to-end campaign runs against an in-memory ledger and fake services.

#![allow(clippy::unwrap_used)]

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::Local;
use jobwire_core::campaign::{GovernorConfig, RunState};
use jobwire_core::{
    CampaignKey, CampaignRunner, ContactSource, Delivery, Environment, Error, HaltReason,
    MessagingProvider, Phase, PhoneNumber, ProviderError, Result, RunRequest, SegmentConfig,
    SegmentInfo, SegmentMember, SegmentSelector, SendLedger, SendRecord, SendStatus, Settings,
};
use tokio::sync::watch;
use tokio_test::{assert_err, assert_ok};

// ----------------------------------------------------------------------------
// Fakes
// ----------------------------------------------------------------------------

#[derive(Clone, Default)]
struct FakeContacts {
    lists: HashMap<i64, Vec<SegmentMember>>,
    unavailable: HashSet<i64>,
}

impl FakeContacts {
    fn with_list(mut self, id: i64, phones: &[&str]) -> Self {
        let members = phones
            .iter()
            .enumerate()
            .map(|(i, phone)| member(&format!("{id}-{i}"), phone))
            .collect();
        self.lists.insert(id, members);
        self
    }

    fn with_member(mut self, id: i64, member: SegmentMember) -> Self {
        self.lists.entry(id).or_default().push(member);
        self
    }

    /// Member fetches for this list fail.
    fn with_unavailable(mut self, id: i64) -> Self {
        self.unavailable.insert(id);
        self
    }
}

fn member(display_id: &str, phone: &str) -> SegmentMember {
    SegmentMember {
        recipient_key_raw: Some(phone.to_string()),
        display_id: display_id.to_string(),
        opted_out: false,
        blacklisted: false,
    }
}

impl ContactSource for FakeContacts {
    async fn verify(&self) -> bool {
        true
    }

    async fn list_segments(&self) -> Result<Vec<SegmentInfo>> {
        let mut lists: Vec<_> = self
            .lists
            .iter()
            .map(|(id, members)| SegmentInfo {
                id: *id,
                name: format!("list-{id}"),
                member_count: members.len() as u64,
            })
            .collect();
        lists.sort_by_key(|l| l.id);
        Ok(lists)
    }

    async fn get_segment_members(&self, segment_id: i64) -> Result<Vec<SegmentMember>> {
        if self.unavailable.contains(&segment_id) {
            return Err(Error::config("brevo 503"));
        }
        Ok(self.lists.get(&segment_id).cloned().unwrap_or_default())
    }
}

#[derive(Clone, Copy)]
enum Behavior {
    Succeed,
    Fail,
    /// Another run records the same send while the call is in flight.
    RaceLedger,
}

#[derive(Clone)]
struct FakeProvider {
    behavior: Behavior,
    calls: Arc<Mutex<Vec<String>>>,
    ledger: Option<SendLedger>,
    campaign: Option<CampaignKey>,
}

impl FakeProvider {
    fn new(behavior: Behavior) -> Self {
        Self {
            behavior,
            calls: Arc::new(Mutex::new(Vec::new())),
            ledger: None,
            campaign: None,
        }
    }

    fn racing(ledger: SendLedger, campaign: CampaignKey) -> Self {
        Self {
            ledger: Some(ledger),
            campaign: Some(campaign),
            ..Self::new(Behavior::RaceLedger)
        }
    }

    fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }
}

impl MessagingProvider for FakeProvider {
    async fn verify(&self) -> bool {
        true
    }

    async fn send_template(
        &self,
        to: &PhoneNumber,
        template_name: &str,
        _variables: &[String],
        _image_url: Option<&str>,
    ) -> std::result::Result<Delivery, ProviderError> {
        let n = {
            let mut calls = self.calls.lock().unwrap();
            calls.push(format!("{to}:{template_name}"));
            calls.len()
        };

        match self.behavior {
            Behavior::Succeed => Ok(Delivery {
                message_id: format!("wamid.{n}"),
                http_status: 200,
            }),
            Behavior::Fail => Err(ProviderError::new(Some(503), "service unavailable")),
            Behavior::RaceLedger => {
                let (Some(ledger), Some(campaign)) = (&self.ledger, &self.campaign) else {
                    unreachable!()
                };
                ledger
                    .record(&SendRecord::success(
                        to.clone(),
                        campaign.clone(),
                        "wamid.other-run",
                        Some(200),
                    ))
                    .await
                    .unwrap();
                Ok(Delivery {
                    message_id: format!("wamid.{n}"),
                    http_status: 200,
                })
            }
        }
    }
}

// ----------------------------------------------------------------------------
// Fixtures
// ----------------------------------------------------------------------------

fn phones(count: usize) -> Vec<String> {
    (1..=count).map(|i| format!("1555000{i:04}")).collect()
}

fn settings() -> Settings {
    let mut settings = Settings::default();
    settings.whatsapp.phone_number_id = "1098765".to_string();
    settings.whatsapp.template_name = "job_alert".to_string();
    settings.whatsapp.token = Some("EAAG-test".to_string());
    settings.brevo.api_key = Some("xkeysib-test".to_string());
    settings.segments = vec![SegmentConfig::new("engineers", 1).with_experience("senior")];
    settings
}

fn governor(daily_limit: u32) -> GovernorConfig {
    GovernorConfig {
        daily_limit,
        send_delay: Duration::ZERO,
        error_spike_threshold: 3,
    }
}

fn contacts(count: usize) -> FakeContacts {
    let list = phones(count);
    let refs: Vec<&str> = list.iter().map(String::as_str).collect();
    FakeContacts::default().with_list(1, &refs)
}

/// A stop channel nobody will ever set.
fn no_stop() -> watch::Receiver<bool> {
    watch::channel(false).1
}

async fn runner(
    settings: Settings,
    contacts: FakeContacts,
    provider: FakeProvider,
    daily_limit: u32,
) -> CampaignRunner<FakeContacts, FakeProvider> {
    let ledger = SendLedger::in_memory().await.unwrap();
    CampaignRunner::new(settings, ledger, contacts, provider).with_governor(governor(daily_limit))
}

fn request(campaign_id: &str) -> RunRequest {
    RunRequest::new(SegmentSelector::All).with_campaign_id(campaign_id)
}

// ----------------------------------------------------------------------------
// Properties
// ----------------------------------------------------------------------------

#[tokio::test]
async fn same_campaign_is_never_sent_twice() {
    let provider = FakeProvider::new(Behavior::Succeed);
    let mut runner = runner(settings(), contacts(4), provider.clone(), 100).await;

    let first = runner.send(&request("jan"), no_stop()).await.unwrap();
    assert_eq!(first.attempted, 4);
    assert!(first.completed());
    assert_eq!(runner.phase(), Phase::Completed);

    let second = runner.send(&request("jan"), no_stop()).await.unwrap();
    assert_eq!(second.attempted, 0);
    assert_eq!(
        second.halted_reason,
        Some(HaltReason::NoEligibleRecipients)
    );
    assert_eq!(second.skipped.already_sent, 4);

    assert_eq!(provider.calls().len(), 4);
    assert_eq!(runner.ledger().count_all().await.unwrap(), 4);
}

#[tokio::test]
async fn distinct_campaigns_reach_same_recipient() {
    let provider = FakeProvider::new(Behavior::Succeed);
    let mut runner = runner(settings(), contacts(1), provider.clone(), 100).await;

    runner.send(&request("jan"), no_stop()).await.unwrap();
    runner.send(&request("feb"), no_stop()).await.unwrap();

    let recipient = PhoneNumber::parse(&phones(1)[0]).unwrap();
    let ledger = runner.ledger();
    assert_eq!(ledger.count_all().await.unwrap(), 2);
    for campaign in ["jan", "feb"] {
        assert!(
            ledger
                .has_been_sent(&recipient, &CampaignKey::new(Some(campaign), "job_alert"))
                .await
                .unwrap()
        );
    }
}

#[tokio::test]
async fn daily_cap_counts_earlier_sends() {
    let (limit, earlier) = (6_u32, 2_usize);
    let provider = FakeProvider::new(Behavior::Succeed);
    let mut runner = runner(settings(), contacts(9), provider.clone(), limit).await;

    // Earlier sends today, to other recipients and another campaign.
    for (i, phone) in phones(earlier).iter().enumerate() {
        let record = if i % 2 == 0 {
            SendRecord::success(
                PhoneNumber::parse(phone).unwrap(),
                CampaignKey::new(Some("old"), "job_alert"),
                "wamid.old",
                Some(200),
            )
        } else {
            SendRecord::failed(
                PhoneNumber::parse(phone).unwrap(),
                CampaignKey::new(Some("old"), "job_alert"),
                "rejected",
                Some(400),
            )
        };
        runner.ledger().record(&record).await.unwrap();
    }

    let report = runner.send(&request("jan"), no_stop()).await.unwrap();

    assert_eq!(report.attempted, limit - 2);
    assert_eq!(report.halted_reason, Some(HaltReason::DailyLimitReached));
    assert_eq!(provider.calls().len(), 4);
    assert_eq!(
        runner.phase(),
        Phase::Halted(HaltReason::DailyLimitReached)
    );
}

#[tokio::test]
async fn error_spike_halts_after_threshold() {
    let provider = FakeProvider::new(Behavior::Fail);
    let mut runner = runner(settings(), contacts(8), provider.clone(), 100).await;

    let report = runner.send(&request("jan"), no_stop()).await.unwrap();

    assert_eq!(report.attempted, 3);
    assert_eq!(report.failed, 3);
    assert_eq!(report.halted_reason, Some(HaltReason::ErrorSpike));
    assert_eq!(provider.calls().len(), 3);

    let records = runner.ledger().recent(10).await.unwrap();
    assert_eq!(records.len(), 3);
    assert!(records.iter().all(|r| r.status == SendStatus::Failed));
    assert!(records.iter().all(|r| r.http_status == Some(503)));

    // The untouched candidates are still eligible.
    let preview = runner
        .dry_run(&SegmentSelector::All, Some("jan"), None, None)
        .await
        .unwrap();
    assert_eq!(preview.total_eligible, 5);
}

#[tokio::test]
async fn dry_run_has_no_side_effects() {
    let provider = FakeProvider::new(Behavior::Succeed);
    let mut runner = runner(settings(), contacts(7), provider.clone(), 3).await;
    runner
        .ledger()
        .record(&SendRecord::success(
            PhoneNumber::parse(&phones(1)[0]).unwrap(),
            CampaignKey::new(Some("jan"), "job_alert"),
            "wamid.0",
            Some(200),
        ))
        .await
        .unwrap();
    let before = runner.ledger().recent(100).await.unwrap();

    let preview = runner
        .dry_run(&SegmentSelector::All, Some("jan"), None, None)
        .await
        .unwrap();
    assert_eq!(preview.total_eligible, 6);
    assert_eq!(preview.remaining_budget, 2);
    assert_eq!(preview.would_send_count, 2);
    assert_eq!(preview.per_segment.len(), 1);
    assert_eq!(preview.per_segment[0].segment_label, "senior");
    assert_eq!(preview.per_segment[0].sample.len(), 5);

    let report = runner
        .send(&request("jan").dry_run(), no_stop())
        .await
        .unwrap();
    assert_eq!(report.attempted, 2);
    assert_eq!(report.halted_reason, Some(HaltReason::DailyLimitReached));

    assert!(provider.calls().is_empty());
    assert_eq!(runner.ledger().recent(100).await.unwrap(), before);
}

#[tokio::test]
async fn three_of_five_scenario() {
    let provider = FakeProvider::new(Behavior::Succeed);
    let mut runner = runner(settings(), contacts(5), provider, 3).await;

    let report = runner.send(&request("jan"), no_stop()).await.unwrap();

    assert_eq!(report.attempted, 3);
    assert_eq!(report.succeeded, 3);
    assert_eq!(report.failed, 0);
    assert_eq!(report.halted_reason, Some(HaltReason::DailyLimitReached));

    let json = serde_json::to_value(&report).unwrap();
    assert_eq!(json["halted_reason"], "daily_limit_reached");

    let records = runner.ledger().recent(10).await.unwrap();
    assert_eq!(records.len(), 3);
    assert!(records.iter().all(|r| r.status == SendStatus::Success));
    assert!(records.iter().all(|r| r.segment_label.as_deref() == Some("senior")));
    assert!(records.iter().all(|r| r.source_list_id == Some(1)));
}

#[tokio::test]
async fn opted_out_contacts_are_excluded() {
    let opted_out = SegmentMember {
        opted_out: true,
        ..member("opt", "15559999999")
    };
    let blacklisted = SegmentMember {
        blacklisted: true,
        ..member("black", "15558888888")
    };
    let contacts = contacts(2)
        .with_member(1, opted_out)
        .with_member(1, blacklisted);
    let provider = FakeProvider::new(Behavior::Succeed);
    let mut runner = runner(settings(), contacts, provider.clone(), 100).await;

    let preview = runner
        .dry_run(&SegmentSelector::All, Some("jan"), None, None)
        .await
        .unwrap();
    assert_eq!(preview.total_eligible, 2);
    assert!(
        preview.per_segment[0]
            .sample
            .iter()
            .all(|s| !s.starts_with("opt") && !s.starts_with("black"))
    );
    assert_eq!(preview.skipped.opted_out, 1);
    assert_eq!(preview.skipped.blacklisted, 1);

    runner.send(&request("jan"), no_stop()).await.unwrap();
    assert!(
        provider
            .calls()
            .iter()
            .all(|c| !c.starts_with("15559999999") && !c.starts_with("15558888888"))
    );
}

#[tokio::test]
async fn production_requires_confirmation() {
    let mut settings = settings();
    settings.environment = Environment::Prod;
    let provider = FakeProvider::new(Behavior::Succeed);
    let mut runner = runner(settings, contacts(3), provider.clone(), 100).await;

    let err = assert_err!(runner.send(&request("jan"), no_stop()).await);
    assert!(matches!(err, Error::Config(_)));

    let unnamed = RunRequest::new(SegmentSelector::All).confirmed();
    let err = assert_err!(runner.send(&unnamed, no_stop()).await);
    assert!(matches!(err, Error::Config(_)));

    assert!(provider.calls().is_empty());
    assert_eq!(runner.ledger().count_all().await.unwrap(), 0);

    // Dry runs are allowed, confirmed live runs go through.
    assert_ok!(runner.send(&request("jan").dry_run(), no_stop()).await);
    let report = assert_ok!(runner.send(&request("jan").confirmed(), no_stop()).await);
    assert_eq!(report.succeeded, 3);
}

#[test]
fn production_gate_needs_no_services() {
    let mut prod = settings();
    prod.environment = Environment::Prod;

    assert_err!(request("jan").ensure_permitted(&prod));
    assert_err!(RunRequest::new(SegmentSelector::All).confirmed().ensure_permitted(&prod));
    assert_err!(request("  ").confirmed().ensure_permitted(&prod));
    assert_ok!(request("jan").confirmed().ensure_permitted(&prod));
    assert_ok!(request("jan").dry_run().ensure_permitted(&prod));
    assert_ok!(RunRequest::new(SegmentSelector::All).ensure_permitted(&settings()));
}

// ----------------------------------------------------------------------------
// Run controller behavior
// ----------------------------------------------------------------------------

#[tokio::test]
async fn concurrent_record_counts_as_failure_and_run_continues() {
    let ledger = SendLedger::in_memory().await.unwrap();
    let campaign = CampaignKey::new(Some("jan"), "job_alert");
    let provider = FakeProvider::racing(ledger.clone(), campaign);
    let mut runner = CampaignRunner::new(settings(), ledger, contacts(2), provider.clone())
        .with_governor(governor(100));

    let report = runner.send(&request("jan"), no_stop()).await.unwrap();

    assert_eq!(report.attempted, 2);
    assert_eq!(report.failed, 2);
    assert!(report.completed());
    assert_eq!(provider.calls().len(), 2);
    assert_eq!(runner.ledger().count_all().await.unwrap(), 2);
}

#[tokio::test]
async fn stop_before_start_cancels() {
    let provider = FakeProvider::new(Behavior::Succeed);
    let mut runner = runner(settings(), contacts(3), provider.clone(), 100).await;
    let (tx, rx) = watch::channel(true);

    let report = runner.send(&request("jan"), rx).await.unwrap();
    drop(tx);

    assert_eq!(report.halted_reason, Some(HaltReason::Cancelled));
    assert_eq!(report.attempted, 0);
    assert!(provider.calls().is_empty());
}

#[tokio::test]
async fn stop_during_delay_cancels() {
    let provider = FakeProvider::new(Behavior::Succeed);
    let ledger = SendLedger::in_memory().await.unwrap();
    let mut runner = CampaignRunner::new(settings(), ledger.clone(), contacts(3), provider)
        .with_governor(GovernorConfig {
            send_delay: Duration::from_secs(60),
            ..governor(100)
        });
    let (tx, rx) = watch::channel(false);

    // Stop once the first send is on record, while the runner waits.
    tokio::spawn(async move {
        while ledger.count_all().await.unwrap() == 0 {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        tx.send(true).unwrap();
    });

    let report = tokio::time::timeout(
        Duration::from_secs(10),
        runner.send(&request("jan"), rx),
    )
    .await
    .expect("stop should interrupt the delay")
    .unwrap();

    assert_eq!(report.halted_reason, Some(HaltReason::Cancelled));
    assert_eq!(report.attempted, 1);
    assert_eq!(runner.ledger().count_all().await.unwrap(), 1);
}

#[tokio::test]
async fn no_delay_after_final_candidate() {
    let provider = FakeProvider::new(Behavior::Succeed);
    let ledger = SendLedger::in_memory().await.unwrap();
    let mut runner = CampaignRunner::new(settings(), ledger, contacts(2), provider)
        .with_governor(GovernorConfig {
            send_delay: Duration::from_secs(1),
            ..governor(100)
        });

    let started = std::time::Instant::now();
    let report = runner.send(&request("jan"), no_stop()).await.unwrap();
    let elapsed = started.elapsed();

    assert_eq!(report.attempted, 2);
    assert!(elapsed >= Duration::from_secs(1));
    assert!(elapsed < Duration::from_secs(2));
}

#[tokio::test]
async fn segments_run_in_priority_order_with_template_overrides() {
    let mut settings = settings();
    settings.segments = vec![
        SegmentConfig::new("juniors", 2)
            .with_experience("junior")
            .with_priority(5),
        SegmentConfig::new("seniors", 1)
            .with_experience("senior")
            .with_priority(1)
            .with_template("senior_alert"),
    ];
    let contacts = FakeContacts::default()
        .with_list(1, &["15550000001"])
        .with_list(2, &["15550000002", "15550000001"]);
    let provider = FakeProvider::new(Behavior::Succeed);
    let mut runner = runner(settings, contacts, provider.clone(), 100).await;

    let report = runner.send(&request("q3"), no_stop()).await.unwrap();

    assert_eq!(report.attempted, 2);
    assert_eq!(report.skipped.duplicate, 1);
    assert_eq!(
        provider.calls(),
        ["15550000001:senior_alert", "15550000002:job_alert"]
    );

    let juniors_only = RunRequest::new(SegmentSelector::All)
        .with_campaign_id("q4")
        .with_experience("JUNIOR");
    runner.send(&juniors_only, no_stop()).await.unwrap();
    assert_eq!(provider.calls().len(), 4);
    assert_eq!(provider.calls()[2], "15550000002:job_alert");
}

#[tokio::test]
async fn source_failure_mid_run_keeps_partial_counts() {
    let mut settings = settings();
    settings.segments = vec![
        SegmentConfig::new("seniors", 1).with_priority(1),
        SegmentConfig::new("juniors", 2).with_priority(2),
    ];
    let contacts = FakeContacts::default()
        .with_list(1, &["15550000001", "15550000002"])
        .with_unavailable(2);
    let provider = FakeProvider::new(Behavior::Succeed);
    let mut runner = runner(settings, contacts, provider.clone(), 100).await;

    let report = assert_ok!(runner.send(&request("jan"), no_stop()).await);

    assert_eq!(report.attempted, 2);
    assert_eq!(report.succeeded, 2);
    assert_eq!(report.halted_reason, Some(HaltReason::SourceError));
    assert!(report.aborted());
    assert!(report.error.as_deref().unwrap().contains("503"));
    assert_eq!(runner.phase(), Phase::Halted(HaltReason::SourceError));
    assert_eq!(provider.calls().len(), 2);
    assert_eq!(runner.ledger().count_all().await.unwrap(), 2);

    let json = serde_json::to_value(&report).unwrap();
    assert_eq!(json["halted_reason"], "source_error");
}

#[tokio::test]
async fn source_failure_before_first_send_halts_without_attempts() {
    let contacts = FakeContacts::default().with_unavailable(1);
    let provider = FakeProvider::new(Behavior::Succeed);
    let mut runner = runner(settings(), contacts, provider.clone(), 100).await;

    let report = assert_ok!(runner.send(&request("jan"), no_stop()).await);

    assert_eq!(report.attempted, 0);
    assert_eq!(report.halted_reason, Some(HaltReason::SourceError));
    assert_eq!(runner.phase(), Phase::Halted(HaltReason::SourceError));
    assert!(provider.calls().is_empty());
}

#[test]
fn errors_map_to_abort_reasons() {
    let duplicate = Error::ConstraintViolation {
        recipient: "1555***0001".to_string(),
        campaign: "jan:job_alert".to_string(),
    };
    assert_eq!(HaltReason::for_error(&duplicate), HaltReason::LedgerError);
    assert_eq!(
        HaltReason::for_error(&Error::config("brevo 503")),
        HaltReason::SourceError
    );
    assert!(HaltReason::LedgerError.is_aborted());
    assert!(!HaltReason::Cancelled.is_aborted());
}

#[tokio::test]
async fn unknown_segment_is_configuration_error() {
    let provider = FakeProvider::new(Behavior::Succeed);
    let mut runner = runner(settings(), contacts(2), provider.clone(), 100).await;

    let req = RunRequest::new(SegmentSelector::Named("designers".into())).with_campaign_id("jan");
    let err = assert_err!(runner.send(&req, no_stop()).await);

    assert!(matches!(err, Error::Config(_)));
    assert!(provider.calls().is_empty());
}

// ----------------------------------------------------------------------------
// Reporting operations
// ----------------------------------------------------------------------------

#[tokio::test]
async fn daily_summary_breaks_down_failures() {
    let provider = FakeProvider::new(Behavior::Fail);
    let mut runner = runner(settings(), contacts(5), provider, 10).await;
    runner
        .ledger()
        .record(&SendRecord::success(
            PhoneNumber::parse("15551110000").unwrap(),
            CampaignKey::new(Some("old"), "job_alert"),
            "wamid.0",
            Some(200),
        ))
        .await
        .unwrap();

    runner.send(&request("jan"), no_stop()).await.unwrap();
    let summary = runner.daily_summary(None).await.unwrap();

    assert_eq!(summary.date, Local::now().date_naive());
    assert_eq!(summary.success, 1);
    assert_eq!(summary.failed, 3);
    assert_eq!(summary.total, 4);
    assert_eq!(summary.limit, 10);
    assert_eq!(summary.remaining, 6);
    assert_eq!(summary.error_codes.len(), 1);
    assert_eq!(summary.error_codes[0].http_status, Some(503));
    assert_eq!(summary.error_codes[0].count, 3);

    let yesterday = Local::now().date_naive().pred_opt().unwrap();
    assert_eq!(runner.daily_summary(Some(yesterday)).await.unwrap().total, 0);
}

#[tokio::test]
async fn validate_reports_missing_lists_and_settings() {
    let mut settings = settings();
    settings.segments.push(SegmentConfig::new("ghost", 42));
    settings.brevo.api_key = Some("xkeysib-your-dummy-key-here".to_string());
    let provider = FakeProvider::new(Behavior::Succeed);
    let runner = runner(settings, contacts(1), provider, 100).await;

    let report = runner.validate().await;

    assert!(report.contact_source_ok);
    assert!(report.messaging_provider_ok);
    assert!(!report.is_ok());
    assert!(report.messages.iter().any(|m| m.starts_with("brevo.api_key")));
    assert!(report.messages.iter().any(|m| m.contains("list 42")));
}

#[tokio::test]
async fn simulate_builds_payloads_without_sending() {
    let mut settings = settings();
    settings.whatsapp.image_url = Some("https://cdn.example.com/banner.png".to_string());
    let provider = FakeProvider::new(Behavior::Succeed);
    let runner = runner(settings, contacts(8), provider.clone(), 100).await;

    let req = request("jan").with_variables(vec!["Backend Engineer".to_string()]);
    let sim = runner.simulate(&req).await.unwrap();

    assert_eq!(sim.would_attempt, 5);
    assert_eq!(sim.messages.len(), 3);
    assert_eq!(
        sim.messages[0].url,
        "https://graph.facebook.com/v21.0/1098765/messages"
    );
    assert_eq!(sim.messages[0].campaign_key, "jan:job_alert");

    let payload = serde_json::to_value(&sim.messages[0].payload).unwrap();
    assert_eq!(payload["to"], phones(1)[0].as_str());
    assert_eq!(payload["template"]["name"], "job_alert");
    assert_eq!(
        payload["template"]["components"][0]["parameters"][0]["image"]["link"],
        "https://cdn.example.com/banner.png"
    );
    assert_eq!(
        payload["template"]["components"][1]["parameters"][0]["text"],
        "Backend Engineer"
    );

    assert!(provider.calls().is_empty());
    assert_eq!(runner.ledger().count_all().await.unwrap(), 0);
}

#[test]
fn run_state_starts_clean() {
    let state = RunState::new(7);
    assert_eq!(state.remaining, 7);
    assert_eq!(state.attempted + state.succeeded + state.failed, 0);
    assert_eq!(state.consecutive_failures, 0);
}
