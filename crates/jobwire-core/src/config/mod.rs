//! Configuration module.
//!
//! Provides settings loading, secret storage, and validation.

pub mod credentials;
mod model;
mod validation;

pub use credentials::{CredentialError, CredentialResult, Secret};
pub use model::{
    BrevoSettings, Environment, LimitSettings, SegmentConfig, Settings, WhatsAppSettings,
};
pub use validation::{ValidationError, ValidationResult, validate_settings};
