//! WhatsApp Cloud API client.

use std::time::Duration;

use reqwest::Client as HttpClient;
use tracing::{debug, info, warn};
use url::Url;

use crate::error::{Error, Result};
use crate::message::TemplateMessage;
use crate::response::{ErrorResponse, MessagesResponse, PhoneNumberInfo, SentMessage};

/// Default Graph API endpoint.
pub const DEFAULT_API_BASE: &str = "https://graph.facebook.com/";

/// Default Graph API version.
pub const DEFAULT_API_VERSION: &str = "v21.0";

/// Bounded retry with exponential backoff.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Retries after the first attempt.
    pub max_retries: u32,
    /// Wait before the first retry; doubled for each further retry.
    pub backoff: Duration,
}

impl RetryPolicy {
    /// A policy that never retries.
    #[must_use]
    pub const fn none() -> Self {
        Self {
            max_retries: 0,
            backoff: Duration::ZERO,
        }
    }

    /// Wait before retry number `retry` (1-based).
    #[must_use]
    pub fn backoff_for(&self, retry: u32) -> Duration {
        let factor = 1_u32 << retry.saturating_sub(1).min(16);
        self.backoff.saturating_mul(factor)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 2,
            backoff: Duration::from_secs(5),
        }
    }
}

/// Client configuration.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Graph API base URL.
    pub api_base: Url,
    /// Graph API version segment (e.g. `v21.0`).
    pub api_version: String,
    /// Sending phone number id.
    pub phone_number_id: String,
    /// System user access token.
    pub access_token: String,
    /// Retry policy for sends.
    pub retry: RetryPolicy,
    /// Per-request timeout.
    pub timeout: Duration,
}

impl ClientConfig {
    /// Creates a configuration against the public Graph API.
    ///
    /// # Errors
    ///
    /// Returns an error if the default base URL cannot be parsed.
    pub fn new(
        phone_number_id: impl Into<String>,
        access_token: impl Into<String>,
    ) -> Result<Self> {
        Ok(Self {
            api_base: Url::parse(DEFAULT_API_BASE)?,
            api_version: DEFAULT_API_VERSION.to_string(),
            phone_number_id: phone_number_id.into(),
            access_token: access_token.into(),
            retry: RetryPolicy::default(),
            timeout: Duration::from_secs(30),
        })
    }

    /// Sets the API base URL.
    ///
    /// # Errors
    ///
    /// Returns an error if the URL is invalid.
    pub fn with_api_base(mut self, base: impl AsRef<str>) -> Result<Self> {
        let mut base = base.as_ref().to_string();
        if !base.ends_with('/') {
            base.push('/');
        }
        self.api_base = Url::parse(&base)?;
        Ok(self)
    }

    /// Sets the API version.
    #[must_use]
    pub fn with_api_version(mut self, version: impl Into<String>) -> Self {
        self.api_version = version.into();
        self
    }

    /// Sets the retry policy.
    #[must_use]
    pub const fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Sets the per-request timeout.
    #[must_use]
    pub const fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

/// WhatsApp Cloud API client.
#[derive(Debug, Clone)]
pub struct Client {
    config: ClientConfig,
    http_client: HttpClient,
}

impl Client {
    /// Creates a new client.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is incomplete or the HTTP
    /// client cannot be built.
    pub fn new(config: ClientConfig) -> Result<Self> {
        if config.phone_number_id.trim().is_empty() {
            return Err(Error::InvalidConfig("phone number id is empty".into()));
        }
        if config.access_token.trim().is_empty() {
            return Err(Error::InvalidConfig("access token is empty".into()));
        }

        let http_client = HttpClient::builder().timeout(config.timeout).build()?;
        Ok(Self {
            config,
            http_client,
        })
    }

    /// Returns the client configuration.
    #[must_use]
    pub const fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// URL of the `/messages` endpoint.
    ///
    /// # Errors
    ///
    /// Returns an error if the URL cannot be built.
    pub fn messages_url(&self) -> Result<Url> {
        Ok(self.config.api_base.join(&format!(
            "{}/{}/messages",
            self.config.api_version, self.config.phone_number_id
        ))?)
    }

    fn phone_number_url(&self) -> Result<Url> {
        Ok(self.config.api_base.join(&format!(
            "{}/{}",
            self.config.api_version, self.config.phone_number_id
        ))?)
    }

    /// Sends a template message, retrying transient failures.
    ///
    /// # Errors
    ///
    /// Returns the last error once retries are exhausted, or the first
    /// permanent error.
    pub async fn send_template(&self, message: &TemplateMessage) -> Result<SentMessage> {
        let url = self.messages_url()?;
        let mut retry = 0;

        loop {
            if retry > 0 {
                let wait = self.config.retry.backoff_for(retry);
                info!(
                    "Retrying template '{}' (attempt {}), waiting {:?}",
                    message.template_name,
                    retry + 1,
                    wait
                );
                tokio::time::sleep(wait).await;
            }

            match self.post_template(url.clone(), message).await {
                Ok(sent) => return Ok(sent),
                Err(err) if err.is_retryable() && retry < self.config.retry.max_retries => {
                    warn!("Transient send failure: {err}");
                    retry += 1;
                }
                Err(err) => return Err(err),
            }
        }
    }

    async fn post_template(&self, url: Url, message: &TemplateMessage) -> Result<SentMessage> {
        let response = self
            .http_client
            .post(url)
            .bearer_auth(&self.config.access_token)
            .json(&message.to_payload())
            .send()
            .await?;

        let status = response.status().as_u16();
        if !response.status().is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ErrorResponse::into_error(status, &body));
        }

        let body: MessagesResponse = response.json().await?;
        let sent = SentMessage::from_response(body, status)?;
        debug!("Accepted message {}", sent.message_id);
        Ok(sent)
    }

    /// Checks that the token can read the configured phone number.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails or the API rejects it.
    pub async fn verify_connection(&self) -> Result<PhoneNumberInfo> {
        let response = self
            .http_client
            .get(self.phone_number_url()?)
            .bearer_auth(&self.config.access_token)
            .send()
            .await?;

        let status = response.status().as_u16();
        if !response.status().is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ErrorResponse::into_error(status, &body));
        }

        response.json().await.map_err(Into::into)
    }
}
