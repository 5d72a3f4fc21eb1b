//! Settings model and loading.

use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use super::credentials::{self, Secret};
use crate::{Error, Result};

/// File name looked up in the working directory.
const LOCAL_CONFIG_FILE: &str = "jobwire.toml";

/// Default ledger file name.
const DATABASE_FILE: &str = "send_history.db";

/// Deployment environment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    /// Test environment; sends need no confirmation.
    #[default]
    Test,
    /// Production; live sends require confirmation and a campaign id.
    Prod,
}

impl FromStr for Environment {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "test" => Ok(Self::Test),
            "prod" | "production" => Ok(Self::Prod),
            other => Err(Error::config(format!(
                "environment must be 'test' or 'prod', got '{other}'"
            ))),
        }
    }
}

impl fmt::Display for Environment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Test => f.write_str("test"),
            Self::Prod => f.write_str("prod"),
        }
    }
}

/// Volume and pacing limits.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LimitSettings {
    /// Maximum attempts per calendar day.
    pub daily_limit: u32,
    /// Pause between consecutive sends, in seconds.
    pub send_delay_secs: f64,
    /// Consecutive failures that halt a run.
    pub error_spike_threshold: u32,
    /// Transport retries per message.
    pub max_retries: u32,
    /// Base backoff between transport retries, in seconds.
    pub retry_backoff_secs: f64,
}

impl LimitSettings {
    /// Pause between consecutive sends.
    #[must_use]
    pub fn send_delay(&self) -> Duration {
        Duration::try_from_secs_f64(self.send_delay_secs.max(0.0)).unwrap_or_default()
    }

    /// Base backoff between transport retries.
    #[must_use]
    pub fn retry_backoff(&self) -> Duration {
        Duration::try_from_secs_f64(self.retry_backoff_secs.max(0.0)).unwrap_or_default()
    }
}

impl Default for LimitSettings {
    fn default() -> Self {
        Self {
            daily_limit: 100,
            send_delay_secs: 5.0,
            error_spike_threshold: 3,
            max_retries: 2,
            retry_backoff_secs: 5.0,
        }
    }
}

/// WhatsApp Cloud API settings.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct WhatsAppSettings {
    /// Sending phone number id.
    pub phone_number_id: String,
    /// Business account id (informational).
    pub business_account_id: Option<String>,
    /// Graph API version.
    pub api_version: String,
    /// Graph API base URL override.
    pub api_base: Option<String>,
    /// Default template name.
    pub template_name: String,
    /// Template language code.
    pub language_code: String,
    /// Header image URL.
    pub image_url: Option<String>,
    /// Access token. Prefer the environment or the keyring.
    pub token: Option<String>,
}

impl Default for WhatsAppSettings {
    fn default() -> Self {
        Self {
            phone_number_id: String::new(),
            business_account_id: None,
            api_version: jobwire_whatsapp::DEFAULT_API_VERSION.to_string(),
            api_base: None,
            template_name: String::new(),
            language_code: "en".to_string(),
            image_url: None,
            token: None,
        }
    }
}

/// Brevo settings.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct BrevoSettings {
    /// API key. Prefer the environment or the keyring.
    pub api_key: Option<String>,
    /// API base URL override.
    #[serde(alias = "base_url")]
    pub api_base: Option<String>,
    /// Attribute holding the phone number.
    pub phone_attribute: String,
    /// Attribute flagging a custom opt-out.
    pub opt_out_attribute: String,
    /// Contacts per page.
    pub page_size: u32,
    /// Page cap per list.
    pub max_pages: u32,
}

impl Default for BrevoSettings {
    fn default() -> Self {
        Self {
            api_key: None,
            api_base: None,
            phone_attribute: "SMS".to_string(),
            opt_out_attribute: "OPT_OUT".to_string(),
            page_size: 100,
            max_pages: 50,
        }
    }
}

/// A targetable segment backed by a contact list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SegmentConfig {
    /// Unique segment name.
    pub name: String,
    /// Contact-source list id.
    #[serde(default)]
    pub list_id: Option<i64>,
    /// Category (CRM folder) grouping segments.
    #[serde(default)]
    pub category: Option<String>,
    /// Experience level of the segment's audience.
    #[serde(default)]
    pub experience: Option<String>,
    /// Lower runs first.
    #[serde(default)]
    pub priority: i32,
    /// Template override for this segment.
    #[serde(default)]
    pub template_name: Option<String>,
}

impl SegmentConfig {
    /// Creates a segment with just a name and list id.
    #[must_use]
    pub fn new(name: impl Into<String>, list_id: i64) -> Self {
        Self {
            name: name.into(),
            list_id: Some(list_id),
            category: None,
            experience: None,
            priority: 0,
            template_name: None,
        }
    }

    /// Sets the experience level.
    #[must_use]
    pub fn with_experience(mut self, experience: impl Into<String>) -> Self {
        self.experience = Some(experience.into());
        self
    }

    /// Sets the category.
    #[must_use]
    pub fn with_category(mut self, category: impl Into<String>) -> Self {
        self.category = Some(category.into());
        self
    }

    /// Sets the priority.
    #[must_use]
    pub const fn with_priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }

    /// Sets the template override.
    #[must_use]
    pub fn with_template(mut self, template: impl Into<String>) -> Self {
        self.template_name = Some(template.into());
        self
    }

    /// Label recorded with each send: the experience level, else the name.
    #[must_use]
    pub fn label(&self) -> &str {
        self.experience.as_deref().unwrap_or(&self.name)
    }
}

/// Application settings.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Deployment environment.
    pub environment: Environment,
    /// Ledger database path.
    pub database_path: Option<PathBuf>,
    /// Volume and pacing limits.
    pub limits: LimitSettings,
    /// WhatsApp settings.
    pub whatsapp: WhatsAppSettings,
    /// Brevo settings.
    pub brevo: BrevoSettings,
    /// Segments, in declaration order.
    pub segments: Vec<SegmentConfig>,
}

impl Settings {
    /// Loads settings from a file and the environment.
    ///
    /// With an explicit `path` the file must exist. Otherwise `./jobwire.toml`
    /// and then the user config directory are tried, falling back to
    /// defaults.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed, or an
    /// environment override is malformed.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut settings = match path {
            Some(path) => Self::from_file(path)?,
            None => match default_config_paths().into_iter().find(|p| p.exists()) {
                Some(found) => Self::from_file(&found)?,
                None => {
                    info!("No config file found. Using defaults.");
                    Self::default()
                }
            },
        };

        settings.apply_overrides(|name| std::env::var(name).ok())?;
        Ok(settings)
    }

    /// Reads settings from a TOML file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn from_file(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path)?;
        info!("Loaded config from {}", path.display());
        Self::from_toml_str(&text)
    }

    /// Parses settings from TOML text.
    ///
    /// # Errors
    ///
    /// Returns an error if the text is not valid settings TOML.
    pub fn from_toml_str(text: &str) -> Result<Self> {
        Ok(toml::from_str(text)?)
    }

    /// Applies `JOBWIRE_*` overrides obtained through `lookup`.
    ///
    /// # Errors
    ///
    /// Returns an error if an override has an invalid value.
    pub fn apply_overrides<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        let lookup = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

        if let Some(env) = lookup("JOBWIRE_ENV") {
            self.environment = env.parse()?;
        }
        if let Some(token) = lookup(Secret::WhatsAppToken.env_var()) {
            self.whatsapp.token = Some(token);
        }
        if let Some(key) = lookup(Secret::BrevoApiKey.env_var()) {
            self.brevo.api_key = Some(key);
        }
        if let Some(limit) = lookup("JOBWIRE_DAILY_LIMIT") {
            self.limits.daily_limit = limit.trim().parse().map_err(|_| {
                Error::config(format!("JOBWIRE_DAILY_LIMIT must be a number, got '{limit}'"))
            })?;
        }
        if let Some(path) = lookup("JOBWIRE_DATABASE") {
            self.database_path = Some(PathBuf::from(path));
        }

        Ok(())
    }

    /// Fills secrets still missing from the system keyring.
    ///
    /// Keyring failures are logged and leave the secret unset.
    pub fn resolve_secrets(&mut self) {
        if self.whatsapp.token.is_none() {
            self.whatsapp.token = keyring_secret(Secret::WhatsAppToken);
        }
        if self.brevo.api_key.is_none() {
            self.brevo.api_key = keyring_secret(Secret::BrevoApiKey);
        }
    }

    /// Returns true when running against production.
    #[must_use]
    pub fn is_production(&self) -> bool {
        self.environment == Environment::Prod
    }

    /// Ledger database path.
    #[must_use]
    pub fn database_path(&self) -> PathBuf {
        self.database_path.clone().unwrap_or_else(|| {
            dirs::data_dir().map_or_else(
                || PathBuf::from(DATABASE_FILE),
                |dir| dir.join("jobwire").join(DATABASE_FILE),
            )
        })
    }

    /// Looks up a segment by name (case-insensitive).
    #[must_use]
    pub fn segment(&self, name: &str) -> Option<&SegmentConfig> {
        self.segments
            .iter()
            .find(|s| s.name.eq_ignore_ascii_case(name))
    }

    /// Template used for a segment.
    #[must_use]
    pub fn template_for<'a>(&'a self, segment: &'a SegmentConfig) -> &'a str {
        segment
            .template_name
            .as_deref()
            .unwrap_or(&self.whatsapp.template_name)
    }
}

fn keyring_secret(secret: Secret) -> Option<String> {
    match credentials::load_secret(secret) {
        Ok(value) => value,
        Err(e) => {
            warn!("Could not read {} from keyring: {e}", secret.label());
            None
        }
    }
}

fn default_config_paths() -> Vec<PathBuf> {
    let mut paths = vec![PathBuf::from(LOCAL_CONFIG_FILE)];
    if let Some(dir) = dirs::config_dir() {
        paths.push(dir.join("jobwire").join("config.toml"));
    }
    paths
}
