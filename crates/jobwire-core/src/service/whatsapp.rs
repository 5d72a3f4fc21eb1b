//! WhatsApp-backed messaging provider.

use jobwire_whatsapp::{Client, ClientConfig, RetryPolicy, TemplateMessage};
use tracing::{error, info, warn};

use super::{Delivery, MessagingProvider, ProviderError};
use crate::config::{LimitSettings, WhatsAppSettings};
use crate::{Error, PhoneNumber, Result};

/// Messaging provider sending through the WhatsApp Cloud API.
#[derive(Debug, Clone)]
pub struct WhatsAppProvider {
    client: Client,
    language_code: String,
}

impl WhatsAppProvider {
    /// Builds a provider from settings.
    ///
    /// # Errors
    ///
    /// Returns an error if the token or phone number id is missing, or the
    /// client cannot be built.
    pub fn from_settings(settings: &WhatsAppSettings, limits: &LimitSettings) -> Result<Self> {
        let token = settings
            .token
            .as_deref()
            .filter(|t| !t.trim().is_empty())
            .ok_or_else(|| Error::config("WhatsApp access token is not configured"))?;

        let mut config = ClientConfig::new(&settings.phone_number_id, token)?
            .with_api_version(&settings.api_version)
            .with_retry(RetryPolicy {
                max_retries: limits.max_retries,
                backoff: limits.retry_backoff(),
            });
        if let Some(base) = &settings.api_base {
            config = config.with_api_base(base)?;
        }

        Ok(Self::new(Client::new(config)?, &settings.language_code))
    }

    /// Wraps an existing client.
    #[must_use]
    pub fn new(client: Client, language_code: impl Into<String>) -> Self {
        Self {
            client,
            language_code: language_code.into(),
        }
    }
}

impl MessagingProvider for WhatsAppProvider {
    async fn verify(&self) -> bool {
        match self.client.verify_connection().await {
            Ok(info) => {
                info!(
                    "WhatsApp connection verified for {}",
                    info.display_phone_number.as_deref().unwrap_or(&info.id)
                );
                true
            }
            Err(e) => {
                error!("WhatsApp connection failed: {e}");
                false
            }
        }
    }

    async fn send_template(
        &self,
        to: &PhoneNumber,
        template_name: &str,
        variables: &[String],
        image_url: Option<&str>,
    ) -> std::result::Result<Delivery, ProviderError> {
        let mut message = TemplateMessage::new(to.as_str(), template_name, &self.language_code)
            .with_body_parameters(variables.iter().cloned());
        if let Some(url) = image_url {
            message = message.with_header_image(url);
        }

        match self.client.send_template(&message).await {
            Ok(sent) => Ok(Delivery {
                message_id: sent.message_id,
                http_status: sent.http_status,
            }),
            Err(e) => {
                warn!("WhatsApp send to {} failed: {e}", to.masked());
                Err(ProviderError::new(e.status(), e.to_string()))
            }
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_token_is_config_error() {
        let settings = WhatsAppSettings {
            phone_number_id: "1098765".to_string(),
            ..WhatsAppSettings::default()
        };
        let err = WhatsAppProvider::from_settings(&settings, &LimitSettings::default()).unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn test_from_settings() {
        let settings = WhatsAppSettings {
            phone_number_id: "1098765".to_string(),
            token: Some("EAAG-token".to_string()),
            api_base: Some("http://127.0.0.1:9".to_string()),
            ..WhatsAppSettings::default()
        };
        let limits = LimitSettings {
            max_retries: 0,
            ..LimitSettings::default()
        };
        let provider = WhatsAppProvider::from_settings(&settings, &limits).unwrap();
        assert_eq!(provider.language_code, "en");
    }
}
