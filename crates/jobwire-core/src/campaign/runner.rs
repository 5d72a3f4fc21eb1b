//! Campaign run controller.
//!
//! One run walks `Idle -> Resolving -> Sending` and ends `Completed` or
//! `Halted`. Sends are strictly sequential: the provider call and the ledger
//! write both finish before the next candidate is considered.

use std::fmt;

use chrono::{Local, NaiveDate};
use jobwire_whatsapp::TemplateMessage;
use serde::Serialize;
use tokio::sync::watch;
use tracing::{error, info, warn};

use super::eligibility::{Candidate, Candidates, EligibilityResolver, SegmentSelector};
use super::governor::{Gate, Governor, GovernorConfig, Outcome, RunState};
use super::report::{
    DailySummary, DryRunReport, HaltReason, RunReport, SegmentDryRun,
    SimulatedMessage, SimulationReport, ValidationReport,
};
use crate::config::{Settings, validate_settings};
use crate::ledger::{SendLedger, SendRecord};
use crate::service::{BrevoContactSource, ContactSource, MessagingProvider, WhatsAppProvider};
use crate::{Error, Result};

/// Recipients listed per segment in a dry run.
const DRY_RUN_SAMPLE: usize = 5;

/// Candidates resolved by a simulation when no limit is given.
const SIMULATE_DEFAULT_LIMIT: usize = 5;

/// Payloads rendered by a simulation.
const SIMULATE_PREVIEW: usize = 3;

/// Whether a run talks to the provider.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RunMode {
    /// Send and record.
    #[default]
    Live,
    /// Walk the same steps without sending, recording or waiting.
    DryRun,
}

/// Where a run is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// Not running.
    Idle,
    /// Computing budget and candidates.
    Resolving,
    /// Sending to candidates.
    Sending,
    /// Stopped early.
    Halted(HaltReason),
    /// Went through every candidate.
    Completed,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Idle => f.write_str("idle"),
            Self::Resolving => f.write_str("resolving"),
            Self::Sending => f.write_str("sending"),
            Self::Halted(reason) => write!(f, "halted ({reason})"),
            Self::Completed => f.write_str("completed"),
        }
    }
}

/// Parameters of one run.
#[derive(Debug, Clone, Default)]
pub struct RunRequest {
    /// Segments to target.
    pub selector: SegmentSelector,
    /// Campaign id, combined with the template into the campaign key.
    pub campaign_id: Option<String>,
    /// Template body parameters.
    pub variables: Vec<String>,
    /// Experience filter; `None` or `"all"` keeps every segment.
    pub experience: Option<String>,
    /// Cap on candidates for this run.
    pub limit: Option<usize>,
    /// Operator confirmation, required for live production runs.
    pub confirm: bool,
    /// Live or dry run.
    pub mode: RunMode,
}

impl RunRequest {
    /// Creates a live, unconfirmed request.
    #[must_use]
    pub fn new(selector: SegmentSelector) -> Self {
        Self {
            selector,
            ..Self::default()
        }
    }

    /// Sets the campaign id.
    #[must_use]
    pub fn with_campaign_id(mut self, campaign_id: impl Into<String>) -> Self {
        self.campaign_id = Some(campaign_id.into());
        self
    }

    /// Sets the template body parameters.
    #[must_use]
    pub fn with_variables(mut self, variables: Vec<String>) -> Self {
        self.variables = variables;
        self
    }

    /// Sets the experience filter.
    #[must_use]
    pub fn with_experience(mut self, experience: impl Into<String>) -> Self {
        self.experience = Some(experience.into());
        self
    }

    /// Caps the number of candidates.
    #[must_use]
    pub const fn with_limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Marks the request as confirmed by the operator.
    #[must_use]
    pub const fn confirmed(mut self) -> Self {
        self.confirm = true;
        self
    }

    /// Switches to dry-run mode.
    #[must_use]
    pub const fn dry_run(mut self) -> Self {
        self.mode = RunMode::DryRun;
        self
    }

    /// Campaign id, if one was given and is not blank.
    #[must_use]
    pub fn campaign_id(&self) -> Option<&str> {
        self.campaign_id
            .as_deref()
            .map(str::trim)
            .filter(|id| !id.is_empty())
    }

    /// Checks that the request may run against these settings. Live
    /// production runs need an operator confirmation and a campaign id.
    ///
    /// # Errors
    ///
    /// Returns a configuration error naming the missing requirement.
    pub fn ensure_permitted(&self, settings: &Settings) -> Result<()> {
        if settings.is_production() && self.mode == RunMode::Live {
            if !self.confirm {
                return Err(Error::config(
                    "production sends require explicit confirmation",
                ));
            }
            if self.campaign_id().is_none() {
                return Err(Error::config("production sends require a campaign id"));
            }
        }
        Ok(())
    }
}

/// Orchestrates campaign runs against a contact source and a messaging
/// provider.
pub struct CampaignRunner<C, P> {
    settings: Settings,
    governor: Governor,
    ledger: SendLedger,
    contacts: C,
    provider: P,
    phase: Phase,
}

impl CampaignRunner<BrevoContactSource, WhatsAppProvider> {
    /// Opens the ledger and builds the Brevo and WhatsApp adapters from
    /// settings.
    ///
    /// # Errors
    ///
    /// Returns an error if a credential is missing, a client cannot be built,
    /// or the ledger cannot be opened.
    pub async fn connect(settings: Settings) -> Result<Self> {
        let contacts = BrevoContactSource::from_settings(&settings.brevo)?;
        let provider = WhatsAppProvider::from_settings(&settings.whatsapp, &settings.limits)?;
        let ledger = SendLedger::open(settings.database_path()).await?;
        Ok(Self::new(settings, ledger, contacts, provider))
    }
}

impl<C: ContactSource, P: MessagingProvider> CampaignRunner<C, P> {
    /// Creates a runner. Limits come from `settings.limits`.
    #[must_use]
    pub fn new(settings: Settings, ledger: SendLedger, contacts: C, provider: P) -> Self {
        let governor = Governor::new(GovernorConfig::from(&settings.limits));
        Self {
            settings,
            governor,
            ledger,
            contacts,
            provider,
            phase: Phase::Idle,
        }
    }

    /// Replaces the governor limits.
    #[must_use]
    pub fn with_governor(mut self, config: GovernorConfig) -> Self {
        self.governor = Governor::new(config);
        self
    }

    /// Phase of the last (or current) run.
    #[must_use]
    pub const fn phase(&self) -> Phase {
        self.phase
    }

    /// Settings in use.
    #[must_use]
    pub const fn settings(&self) -> &Settings {
        &self.settings
    }

    /// The send ledger.
    #[must_use]
    pub const fn ledger(&self) -> &SendLedger {
        &self.ledger
    }

    /// Checks configuration and both external services.
    pub async fn validate(&self) -> ValidationReport {
        let mut messages: Vec<String> = match validate_settings(&self.settings) {
            Ok(()) => Vec::new(),
            Err(errors) => errors
                .iter()
                .map(|e| format!("{}: {}", e.field(), e.message()))
                .collect(),
        };

        let contact_source_ok = self.contacts.verify().await;
        let messaging_provider_ok = self.provider.verify().await;

        if contact_source_ok {
            match self.contacts.list_segments().await {
                Ok(lists) => {
                    for segment in &self.settings.segments {
                        if let Some(id) = segment.list_id
                            && !lists.iter().any(|l| l.id == id)
                        {
                            messages.push(format!(
                                "segments.list_id: list {id} for segment '{}' does not exist",
                                segment.name
                            ));
                        }
                    }
                }
                Err(e) => messages.push(format!("Could not list contact lists: {e}")),
            }
        }

        ValidationReport {
            contact_source_ok,
            messaging_provider_ok,
            messages,
        }
    }

    /// Previews who a run would reach, per segment, without sending.
    ///
    /// # Errors
    ///
    /// Returns an error if the selection is not configured or a service fails.
    pub async fn dry_run(
        &self,
        selector: &SegmentSelector,
        campaign_id: Option<&str>,
        experience: Option<&str>,
        limit: Option<usize>,
    ) -> Result<DryRunReport> {
        let resolver = EligibilityResolver::new(&self.settings, &self.contacts, &self.ledger);
        let plan = resolver.plan(selector, campaign_id, experience)?;

        let mut per_segment: Vec<SegmentDryRun> = plan
            .iter()
            .map(|p| SegmentDryRun {
                segment_name: p.segment.name.clone(),
                segment_label: p.label().to_string(),
                list_id: p.list_id,
                campaign_key: p.campaign_key.to_string(),
                eligible_count: 0,
                sample: Vec::new(),
            })
            .collect();

        let mut candidates = resolver.candidates(plan, limit);
        let mut total_eligible = 0_u32;
        while let Some(candidate) = candidates.next().await? {
            total_eligible += 1;
            if let Some(entry) = per_segment
                .iter_mut()
                .find(|s| s.segment_name == candidate.segment_name)
            {
                entry.eligible_count += 1;
                if entry.sample.len() < DRY_RUN_SAMPLE {
                    entry.sample.push(format!(
                        "{} ({})",
                        candidate.display_id,
                        candidate.recipient_key.masked()
                    ));
                }
            }
        }

        let sent_today = self.ledger.count_sent_on(today()).await?;
        let remaining_budget = self.governor.remaining_budget(sent_today);
        info!("Dry run: {total_eligible} eligible, {remaining_budget} left today");

        Ok(DryRunReport {
            per_segment,
            total_eligible,
            remaining_budget,
            would_send_count: total_eligible.min(remaining_budget),
            skipped: candidates.skipped(),
        })
    }

    /// Builds the request bodies the first candidates would receive.
    ///
    /// # Errors
    ///
    /// Returns an error if the selection is not configured or a service fails.
    pub async fn simulate(&self, request: &RunRequest) -> Result<SimulationReport> {
        let resolver = EligibilityResolver::new(&self.settings, &self.contacts, &self.ledger);
        let mut candidates = resolver.resolve(
            &request.selector,
            request.campaign_id(),
            request.experience.as_deref(),
            Some(request.limit.unwrap_or(SIMULATE_DEFAULT_LIMIT)),
        )?;

        let url = self.messages_url();
        let whatsapp = &self.settings.whatsapp;
        let mut messages = Vec::new();
        let mut would_attempt = 0_u32;

        while let Some(candidate) = candidates.next().await? {
            would_attempt += 1;
            if messages.len() >= SIMULATE_PREVIEW {
                continue;
            }

            let mut message = TemplateMessage::new(
                candidate.recipient_key.as_str(),
                &candidate.template_name,
                &whatsapp.language_code,
            )
            .with_body_parameters(request.variables.iter().cloned());
            if let Some(image) = &whatsapp.image_url {
                message = message.with_header_image(image);
            }

            messages.push(SimulatedMessage {
                display_id: candidate.display_id,
                recipient: candidate.recipient_key.masked(),
                segment_label: candidate.segment_label,
                campaign_key: candidate.campaign_key.to_string(),
                url: url.clone(),
                payload: message.to_payload(),
            });
        }

        Ok(SimulationReport {
            messages,
            would_attempt,
        })
    }

    /// Send totals for a day (today by default).
    ///
    /// # Errors
    ///
    /// Returns an error if the ledger query fails.
    pub async fn daily_summary(&self, date: Option<NaiveDate>) -> Result<DailySummary> {
        let date = date.unwrap_or_else(today);
        DailySummary::collect(&self.ledger, date, self.governor.config().daily_limit).await
    }

    /// Runs a campaign.
    ///
    /// Setting the `stop` channel to `true` halts the run at the next
    /// candidate or during the inter-message delay.
    ///
    /// # Errors
    ///
    /// Returns a configuration error for an unconfirmed production run or an
    /// unknown selection, and a ledger error if the daily count cannot be
    /// read. Once resolution starts, contact-source and ledger failures end
    /// the run as [`HaltReason::SourceError`] or [`HaltReason::LedgerError`]
    /// with the counts so far. Provider failures are counted, not returned.
    pub async fn send(
        &mut self,
        request: &RunRequest,
        mut stop: watch::Receiver<bool>,
    ) -> Result<RunReport> {
        let Self {
            settings,
            governor,
            ledger,
            contacts,
            provider,
            phase,
        } = self;

        transition(phase, Phase::Idle);
        request.ensure_permitted(settings)?;
        let campaign_id = request.campaign_id();

        transition(phase, Phase::Resolving);
        let sent_today = ledger
            .count_sent_on(today())
            .await
            .inspect_err(|_| transition(phase, Phase::Idle))?;
        let mut state = governor.start(sent_today);
        info!(
            "Run for {} ({:?}): {} of {} daily sends left",
            request.selector,
            request.mode,
            state.remaining,
            governor.config().daily_limit
        );

        let resolver = EligibilityResolver::new(&*settings, &*contacts, &*ledger);
        let mut candidates = resolver
            .resolve(
                &request.selector,
                campaign_id,
                request.experience.as_deref(),
                request.limit,
            )
            .inspect_err(|_| transition(phase, Phase::Idle))?;

        // From here on a failure ends the run with the counts gathered so far.
        let mut failure: Option<String> = None;
        let mut abort = |e: Error| {
            error!("Run aborted: {e}");
            let reason = HaltReason::for_error(&e);
            failure = Some(e.to_string());
            Some(reason)
        };

        let halted = match candidates.peek().await.map(|first| first.is_some()) {
            Ok(false) => Some(HaltReason::NoEligibleRecipients),
            Err(e) => abort(e),
            Ok(true) => {
                transition(phase, Phase::Sending);
                let image_url = settings.whatsapp.image_url.as_deref();
                let delay = governor.inter_message_delay();

                loop {
                    if *stop.borrow() {
                        break Some(HaltReason::Cancelled);
                    }
                    let candidate = match candidates.next().await {
                        Ok(Some(candidate)) => candidate,
                        Ok(None) => break None,
                        Err(e) => break abort(e),
                    };
                    if let Gate::Deny(reason) = governor.before_send(&mut state) {
                        break Some(reason.into());
                    }

                    let (outcome, recorded) = match request.mode {
                        RunMode::DryRun => {
                            info!(
                                "Would send {} to {} ({})",
                                candidate.template_name,
                                candidate.recipient_key.masked(),
                                candidate.segment_label
                            );
                            (Outcome::Success, Ok(()))
                        }
                        RunMode::Live => {
                            deliver(
                                &*provider,
                                &*ledger,
                                &candidate,
                                &request.variables,
                                image_url,
                            )
                            .await
                        }
                    };
                    governor.after_send(&mut state, outcome);
                    if let Err(e) = recorded {
                        break abort(e);
                    }

                    if request.mode == RunMode::Live
                        && !delay.is_zero()
                        && governor.check(&state).is_none()
                    {
                        match candidates.peek().await.map(|next| next.is_some()) {
                            Ok(true) => {
                                tokio::select! {
                                    () = tokio::time::sleep(delay) => {}
                                    () = stopped(&mut stop) => break Some(HaltReason::Cancelled),
                                }
                            }
                            Ok(false) => {}
                            Err(e) => break abort(e),
                        }
                    }
                }
            }
        };

        match halted {
            Some(reason) => {
                warn!("Run halted: {reason}");
                transition(phase, Phase::Halted(reason));
            }
            None => transition(phase, Phase::Completed),
        }

        let mut report = build_report(request, &state, &candidates, halted);
        report.error = failure;
        info!(
            "Run finished: {} attempted, {} succeeded, {} failed",
            report.attempted, report.succeeded, report.failed
        );
        Ok(report)
    }

    fn messages_url(&self) -> String {
        let whatsapp = &self.settings.whatsapp;
        let base = whatsapp
            .api_base
            .as_deref()
            .unwrap_or(jobwire_whatsapp::DEFAULT_API_BASE)
            .trim_end_matches('/');
        format!(
            "{base}/{}/{}/messages",
            whatsapp.api_version, whatsapp.phone_number_id
        )
    }
}

/// Sends to one candidate and records the attempt. The outcome counts even
/// when the ledger write fails.
async fn deliver<P: MessagingProvider>(
    provider: &P,
    ledger: &SendLedger,
    candidate: &Candidate,
    variables: &[String],
    image_url: Option<&str>,
) -> (Outcome, Result<()>) {
    let masked = candidate.recipient_key.masked();
    info!(
        "Sending {} to {masked} ({})",
        candidate.template_name, candidate.segment_label
    );

    let (record, outcome) = match provider
        .send_template(
            &candidate.recipient_key,
            &candidate.template_name,
            variables,
            image_url,
        )
        .await
    {
        Ok(delivery) => {
            info!("Sent to {masked}: {}", delivery.message_id);
            (
                SendRecord::success(
                    candidate.recipient_key.clone(),
                    candidate.campaign_key.clone(),
                    delivery.message_id,
                    Some(delivery.http_status),
                ),
                Outcome::Success,
            )
        }
        Err(e) => {
            warn!("Send to {masked} failed: {e}");
            (
                SendRecord::failed(
                    candidate.recipient_key.clone(),
                    candidate.campaign_key.clone(),
                    e.detail,
                    e.http_status,
                ),
                Outcome::Failure,
            )
        }
    };
    let record = record.with_source(
        Some(candidate.segment_label.clone()),
        Some(candidate.source_list_id),
    );

    match ledger.record(&record).await {
        Ok(()) => (outcome, Ok(())),
        Err(Error::ConstraintViolation { recipient, campaign }) => {
            warn!("Send to {recipient} for {campaign} was already recorded; counting it as failed");
            (Outcome::Failure, Ok(()))
        }
        Err(e) => {
            error!("Could not record send to {masked}: {e}");
            (outcome, Err(e))
        }
    }
}

fn build_report<C: ContactSource>(
    request: &RunRequest,
    state: &RunState,
    candidates: &Candidates<'_, C>,
    halted_reason: Option<HaltReason>,
) -> RunReport {
    RunReport {
        mode: request.mode,
        campaign_id: request.campaign_id().map(str::to_string),
        attempted: state.attempted,
        succeeded: state.succeeded,
        failed: state.failed,
        skipped: candidates.skipped(),
        halted_reason,
        error: None,
    }
}

fn transition(phase: &mut Phase, next: Phase) {
    if *phase != next {
        info!("Run phase: {phase} -> {next}");
    }
    *phase = next;
}

/// Resolves once the stop flag is set. Never resolves if the sender is gone.
async fn stopped(stop: &mut watch::Receiver<bool>) {
    if stop.wait_for(|stopped| *stopped).await.is_err() {
        std::future::pending::<()>().await;
    }
}

fn today() -> NaiveDate {
    Local::now().date_naive()
}
