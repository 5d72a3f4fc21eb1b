//! jobwire - WhatsApp job alerts for Brevo contact lists.
//!
//! Every command loads settings the same way: `--config`, else
//! `./jobwire.toml`, else the user config directory, then `JOBWIRE_*`
//! environment overrides, then keyring secrets.

mod render;

use std::io::{self, BufRead};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use chrono::{Local, NaiveDate};
use clap::{Args, Parser, Subcommand, ValueEnum};
use jobwire_core::{
    BrevoContactSource, CampaignRunner, ContactSource, DailySummary, RunRequest, Secret,
    SegmentSelector, SendLedger, Settings, ValidationReport, WhatsAppProvider, credentials,
    validate_settings,
};
use serde::Serialize;
use tokio::sync::watch;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::render::{HistoryEntry, SegmentsView};

#[derive(Debug, Parser)]
#[command(
    name = "jobwire",
    version,
    about = "Send WhatsApp job alerts to Brevo contact lists, at most once per campaign"
)]
struct Cli {
    /// Configuration file.
    #[arg(long, global = true, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Log at debug level.
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Print results as JSON.
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Check configuration and both external services.
    Validate,
    /// List contact lists and configured segments.
    Segments,
    /// Show who a run would reach, without sending.
    DryRun(Target),
    /// Print the request bodies the first recipients would receive.
    Simulate {
        #[command(flatten)]
        target: Target,
        /// Template body parameter, repeatable, in order.
        #[arg(long = "var", value_name = "TEXT")]
        variables: Vec<String>,
    },
    /// Send a campaign.
    Send {
        #[command(flatten)]
        target: Target,
        /// Template body parameter, repeatable, in order.
        #[arg(long = "var", value_name = "TEXT")]
        variables: Vec<String>,
        /// Confirm a production run.
        #[arg(long)]
        confirm: bool,
        /// Walk the run without sending or recording.
        #[arg(long)]
        dry_run: bool,
        /// Skip the preflight validation.
        #[arg(long)]
        skip_validate: bool,
    },
    /// Show send totals for a day.
    Summary {
        /// Day to report (YYYY-MM-DD), today by default.
        #[arg(long)]
        date: Option<NaiveDate>,
    },
    /// Show the latest send attempts.
    History {
        /// Attempts to show.
        #[arg(long, default_value_t = 20)]
        limit: u32,
    },
    /// Manage secrets in the system keyring.
    Credentials {
        #[command(subcommand)]
        action: CredentialAction,
    },
}

/// Which segments and campaign a run targets.
#[derive(Debug, Args)]
struct Target {
    /// Segment name.
    #[arg(long, conflicts_with = "category")]
    segment: Option<String>,
    /// Every segment in a category.
    #[arg(long)]
    category: Option<String>,
    /// Campaign id; sends are unique per recipient, campaign and template.
    #[arg(long)]
    campaign: Option<String>,
    /// Experience filter ("all" keeps every segment).
    #[arg(long)]
    experience: Option<String>,
    /// Maximum recipients.
    #[arg(long)]
    limit: Option<usize>,
}

impl Target {
    fn selector(&self) -> SegmentSelector {
        match (&self.segment, &self.category) {
            (Some(name), _) => SegmentSelector::Named(name.clone()),
            (None, Some(category)) => SegmentSelector::Category(category.clone()),
            (None, None) => SegmentSelector::All,
        }
    }

    fn request(&self) -> RunRequest {
        let mut request = RunRequest::new(self.selector());
        if let Some(campaign) = &self.campaign {
            request = request.with_campaign_id(campaign);
        }
        if let Some(experience) = &self.experience {
            request = request.with_experience(experience);
        }
        if let Some(limit) = self.limit {
            request = request.with_limit(limit);
        }
        request
    }
}

#[derive(Debug, Subcommand)]
enum CredentialAction {
    /// Store a secret. Reads it from stdin when no value is given.
    Set {
        /// Secret to store.
        secret: SecretArg,
        /// Secret value.
        value: Option<String>,
    },
    /// Remove a stored secret.
    Delete {
        /// Secret to remove.
        secret: SecretArg,
    },
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum SecretArg {
    /// WhatsApp Cloud API access token.
    WhatsappToken,
    /// Brevo API key.
    BrevoApiKey,
}

impl From<SecretArg> for Secret {
    fn from(arg: SecretArg) -> Self {
        match arg {
            SecretArg::WhatsappToken => Self::WhatsAppToken,
            SecretArg::BrevoApiKey => Self::BrevoApiKey,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let config = cli.config.as_deref();
    let json = cli.json;
    match cli.command {
        Command::Validate => validate(load_settings(config)?, json).await,
        Command::Segments => segments(&load_settings(config)?, json).await,
        Command::DryRun(target) => {
            let runner = connect(load_settings(config)?).await?;
            let report = runner
                .dry_run(
                    &target.selector(),
                    target.campaign.as_deref(),
                    target.experience.as_deref(),
                    target.limit,
                )
                .await?;
            emit(json, &report, render::dry_run)
        }
        Command::Simulate { target, variables } => {
            let runner = connect(load_settings(config)?).await?;
            let request = target.request().with_variables(variables);
            let report = runner.simulate(&request).await?;
            emit(json, &report, render::simulation)
        }
        Command::Send {
            target,
            variables,
            confirm,
            dry_run,
            skip_validate,
        } => {
            let mut request = target.request().with_variables(variables);
            if confirm {
                request = request.confirmed();
            }
            if dry_run {
                request = request.dry_run();
            }
            let preflight = !dry_run && !skip_validate;
            send(load_settings(config)?, &request, preflight, json).await
        }
        Command::Summary { date } => {
            let settings = load_settings(config)?;
            let ledger = SendLedger::open(settings.database_path()).await?;
            let date = date.unwrap_or_else(|| Local::now().date_naive());
            let summary = DailySummary::collect(&ledger, date, settings.limits.daily_limit).await?;
            emit(json, &summary, render::summary)
        }
        Command::History { limit } => {
            let settings = load_settings(config)?;
            let ledger = SendLedger::open(settings.database_path()).await?;
            let entries: Vec<HistoryEntry> = ledger
                .recent(limit)
                .await?
                .iter()
                .map(HistoryEntry::from)
                .collect();
            emit(json, &entries, |entries| render::history(entries))
        }
        Command::Credentials { action } => manage_credentials(&action),
    }
}

fn load_settings(path: Option<&Path>) -> Result<Settings> {
    let mut settings = Settings::load(path).context("Failed to load settings")?;
    settings.resolve_secrets();
    info!("Environment: {}", settings.environment);
    Ok(settings)
}

fn init_tracing(verbose: bool) {
    let default_filter = if verbose {
        "jobwire=debug,jobwire_core=debug,jobwire_whatsapp=debug,jobwire_brevo=debug"
    } else {
        "jobwire=info,jobwire_core=info"
    };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_filter.into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(io::stderr))
        .init();
}

async fn connect(
    settings: Settings,
) -> Result<CampaignRunner<BrevoContactSource, WhatsAppProvider>> {
    CampaignRunner::connect(settings)
        .await
        .context("Failed to set up services (run `jobwire validate` for details)")
}

async fn validate(settings: Settings, json: bool) -> Result<()> {
    let report = match CampaignRunner::connect(settings.clone()).await {
        Ok(runner) => runner.validate().await,
        Err(e) => {
            warn!("Could not set up services: {e}");
            let mut messages = vec![e.to_string()];
            if let Err(errors) = validate_settings(&settings) {
                messages.extend(
                    errors
                        .iter()
                        .map(|err| format!("{}: {}", err.field(), err.message())),
                );
            }
            ValidationReport {
                contact_source_ok: false,
                messaging_provider_ok: false,
                messages,
            }
        }
    };

    emit(json, &report, render::validation)?;
    if !report.is_ok() {
        bail!("Validation failed");
    }
    Ok(())
}

async fn segments(settings: &Settings, json: bool) -> Result<()> {
    let source = BrevoContactSource::from_settings(&settings.brevo)?;
    let lists = source
        .list_segments()
        .await
        .context("Failed to list contact lists")?;

    let view = SegmentsView {
        lists,
        configured: settings.segments.clone(),
    };
    emit(json, &view, render::segments)
}

async fn send(settings: Settings, request: &RunRequest, preflight: bool, json: bool) -> Result<()> {
    request.ensure_permitted(&settings)?;
    let mut runner = connect(settings).await?;

    if preflight {
        let report = runner.validate().await;
        if !report.is_ok() {
            emit(json, &report, render::validation)?;
            bail!("Preflight validation failed; fix the findings above or pass --skip-validate");
        }
    }

    let (stop_tx, stop_rx) = watch::channel(false);
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupted; stopping after the current message");
            let _ = stop_tx.send(true);
        }
    });

    let report = runner.send(request, stop_rx).await?;
    emit(json, &report, render::run)?;
    if let Some(error) = report.error.as_deref().filter(|_| report.aborted()) {
        bail!("Run aborted after {} attempts: {error}", report.attempted);
    }
    Ok(())
}

fn manage_credentials(action: &CredentialAction) -> Result<()> {
    match action {
        CredentialAction::Set { secret, value } => {
            let secret = Secret::from(*secret);
            let value = match value {
                Some(value) => value.clone(),
                None => read_secret_line(secret)?,
            };
            if value.trim().is_empty() {
                bail!("Refusing to store an empty {}", secret.label());
            }
            credentials::store_secret(secret, value.trim())?;
            println!("Stored {} in the system keyring", secret.label());
        }
        CredentialAction::Delete { secret } => {
            let secret = Secret::from(*secret);
            credentials::delete_secret(secret)?;
            println!("Removed {} from the system keyring", secret.label());
        }
    }
    Ok(())
}

fn read_secret_line(secret: Secret) -> Result<String> {
    eprintln!("Enter {}:", secret.label());
    let mut line = String::new();
    io::stdin()
        .lock()
        .read_line(&mut line)
        .context("Failed to read from stdin")?;
    Ok(line)
}

/// Prints `value` as pretty JSON or through the human renderer.
fn emit<T: Serialize>(json: bool, value: &T, human: impl FnOnce(&T)) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(value)?);
    } else {
        human(value);
    }
    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use clap::CommandFactory;
    use jobwire_core::Environment;

    use super::*;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn send_flags_build_request() {
        let cli = Cli::parse_from([
            "jobwire",
            "send",
            "--category",
            "engineering",
            "--campaign",
            "2024-06",
            "--var",
            "Backend Engineer",
            "--var",
            "Berlin",
            "--limit",
            "10",
            "--confirm",
        ]);
        let Command::Send {
            target,
            variables,
            confirm,
            dry_run,
            ..
        } = cli.command
        else {
            panic!("expected send");
        };

        let request = target.request().with_variables(variables);
        assert_eq!(
            request.selector,
            SegmentSelector::Category("engineering".to_string())
        );
        assert_eq!(request.campaign_id(), Some("2024-06"));
        assert_eq!(request.variables, ["Backend Engineer", "Berlin"]);
        assert_eq!(request.limit, Some(10));
        assert!(confirm);
        assert!(!dry_run);
    }

    #[test]
    fn segment_and_category_conflict() {
        let result = Cli::try_parse_from([
            "jobwire", "dry-run", "--segment", "seniors", "--category", "eng",
        ]);
        assert!(result.is_err());
    }

    #[test]
    fn summary_parses_date() {
        let cli = Cli::parse_from(["jobwire", "--json", "summary", "--date", "2024-06-12"]);
        assert!(cli.json);
        let Command::Summary { date } = cli.command else {
            panic!("expected summary");
        };
        assert_eq!(date, NaiveDate::from_ymd_opt(2024, 6, 12));
    }

    #[tokio::test]
    async fn unconfirmed_production_send_is_refused_before_connecting() {
        let settings = Settings {
            environment: Environment::Prod,
            ..Settings::default()
        };
        let request = RunRequest::new(SegmentSelector::All).with_campaign_id("2024-06");

        let err = send(settings, &request, true, false).await.unwrap_err();
        assert!(err.to_string().contains("confirmation"), "{err}");
    }
}
