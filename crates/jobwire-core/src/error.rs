//! Error types for the core library.

use thiserror::Error;

/// Errors that can occur in core operations.
#[derive(Debug, Error)]
pub enum Error {
    /// Contact source (Brevo) operation failed.
    #[error("Brevo error: {0}")]
    Brevo(#[from] jobwire_brevo::Error),

    /// Messaging provider client could not be set up.
    #[error("WhatsApp error: {0}")]
    WhatsApp(#[from] jobwire_whatsapp::Error),

    /// Database operation failed.
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// The ledger already holds a record for this recipient and campaign.
    #[error("Send already recorded for {recipient} in campaign {campaign}")]
    ConstraintViolation {
        /// Masked recipient key.
        recipient: String,
        /// Campaign key.
        campaign: String,
    },

    /// Serialization/deserialization error.
    #[error("Serialization error: {0}")]
    Serde(#[from] serde_json::Error),

    /// Configuration file could not be parsed.
    #[error("Config parse error: {0}")]
    ConfigParse(#[from] toml::de::Error),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Missing or malformed settings; fatal before any recipient is touched.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Credential storage error.
    #[error("Credential error: {0}")]
    Credential(#[from] crate::config::credentials::CredentialError),
}

impl Error {
    /// Creates a configuration error.
    #[must_use]
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }
}

/// Result type alias using our Error type.
pub type Result<T> = std::result::Result<T, Error>;
