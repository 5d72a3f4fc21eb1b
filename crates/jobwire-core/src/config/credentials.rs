//! Secure credential storage using system keyring.
//!
//! API secrets (the WhatsApp access token and the Brevo API key) can be kept
//! out of configuration files by storing them in the platform's native
//! credential storage:
//! - Linux: Secret Service (GNOME Keyring, `KWallet`)
//! - macOS: Keychain
//! - Windows: Credential Manager

use keyring::Entry;
use tracing::{debug, warn};

/// Service name used for keyring entries.
const SERVICE_NAME: &str = "jobwire";

/// Error type for credential operations.
#[derive(Debug, thiserror::Error)]
pub enum CredentialError {
    /// Failed to access keyring.
    #[error("Keyring error: {0}")]
    Keyring(#[from] keyring::Error),
}

/// Result type for credential operations.
pub type CredentialResult<T> = std::result::Result<T, CredentialError>;

/// Secrets jobwire knows how to store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Secret {
    /// WhatsApp Cloud API system user access token.
    WhatsAppToken,
    /// Brevo API key.
    BrevoApiKey,
}

impl Secret {
    /// Keyring entry name.
    #[must_use]
    pub const fn key(self) -> &'static str {
        match self {
            Self::WhatsAppToken => "jobwire_whatsapp_token",
            Self::BrevoApiKey => "jobwire_brevo_api_key",
        }
    }

    /// Environment variable that overrides the stored value.
    #[must_use]
    pub const fn env_var(self) -> &'static str {
        match self {
            Self::WhatsAppToken => "JOBWIRE_WHATSAPP_TOKEN",
            Self::BrevoApiKey => "JOBWIRE_BREVO_API_KEY",
        }
    }

    /// Human-readable name.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::WhatsAppToken => "WhatsApp access token",
            Self::BrevoApiKey => "Brevo API key",
        }
    }
}

/// Stores a secret in the system keyring.
///
/// # Errors
///
/// Returns an error if the keyring operation fails.
pub fn store_secret(secret: Secret, value: &str) -> CredentialResult<()> {
    let entry = Entry::new(SERVICE_NAME, secret.key())?;
    entry.set_password(value)?;
    debug!("Stored {} in keyring", secret.label());
    Ok(())
}

/// Retrieves a secret from the system keyring.
///
/// # Errors
///
/// Returns an error if the keyring operation fails.
pub fn load_secret(secret: Secret) -> CredentialResult<Option<String>> {
    let entry = Entry::new(SERVICE_NAME, secret.key())?;
    match entry.get_password() {
        Ok(value) => Ok(Some(value)),
        Err(keyring::Error::NoEntry) => {
            debug!("No {} found in keyring", secret.label());
            Ok(None)
        }
        Err(e) => Err(e.into()),
    }
}

/// Deletes a secret from the system keyring.
///
/// A missing entry is not an error.
///
/// # Errors
///
/// Returns an error if the keyring operation fails.
pub fn delete_secret(secret: Secret) -> CredentialResult<()> {
    let entry = Entry::new(SERVICE_NAME, secret.key())?;
    match entry.delete_credential() {
        Ok(()) => debug!("Deleted {} from keyring", secret.label()),
        Err(keyring::Error::NoEntry) => {
            debug!("No {} to delete", secret.label());
        }
        Err(e) => {
            warn!("Failed to delete {}: {e}", secret.label());
            return Err(e.into());
        }
    }
    Ok(())
}
