//! Settings validation.

use std::collections::HashSet;

use url::Url;

use super::model::Settings;

/// Placeholder values shipped in example configuration files.
const PLACEHOLDER_SECRETS: &[&str] = &[
    "input_your_token_here",
    "xkeysib-your-dummy-key-here",
    "your_token_here",
    "changeme",
];

/// Validation finding for application settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    /// WhatsApp access token is not set.
    MissingWhatsAppToken,
    /// WhatsApp access token is still the example placeholder.
    PlaceholderWhatsAppToken,
    /// WhatsApp phone number id is empty.
    MissingPhoneNumberId,
    /// No template configured for a segment that needs one.
    MissingTemplate,
    /// Brevo API key is not set.
    MissingBrevoApiKey,
    /// Brevo API key is still the example placeholder.
    PlaceholderBrevoApiKey,
    /// No segments configured.
    NoSegments,
    /// Segment has no list id.
    SegmentWithoutList(String),
    /// Segment name used more than once.
    DuplicateSegment(String),
    /// Daily limit is zero.
    ZeroDailyLimit,
    /// Send delay is negative or not a number.
    InvalidSendDelay,
    /// Header image URL is not an http(s) URL.
    InvalidImageUrl,
}

impl ValidationError {
    /// Get human-readable error message.
    #[must_use]
    pub fn message(&self) -> String {
        match self {
            Self::MissingWhatsAppToken => "WhatsApp access token is required".to_string(),
            Self::PlaceholderWhatsAppToken => {
                "WhatsApp access token is still the example placeholder".to_string()
            }
            Self::MissingPhoneNumberId => "WhatsApp phone number id is required".to_string(),
            Self::MissingTemplate => "A WhatsApp template name is required".to_string(),
            Self::MissingBrevoApiKey => "Brevo API key is required".to_string(),
            Self::PlaceholderBrevoApiKey => {
                "Brevo API key is still the example placeholder".to_string()
            }
            Self::NoSegments => "At least one segment must be configured".to_string(),
            Self::SegmentWithoutList(name) => format!("Segment '{name}' has no list_id"),
            Self::DuplicateSegment(name) => format!("Segment '{name}' is defined more than once"),
            Self::ZeroDailyLimit => "Daily limit must be greater than zero".to_string(),
            Self::InvalidSendDelay => "Send delay must be a non-negative number".to_string(),
            Self::InvalidImageUrl => "Header image URL must be an http(s) URL".to_string(),
        }
    }

    /// Get the field name this error relates to.
    #[must_use]
    pub const fn field(&self) -> &'static str {
        match self {
            Self::MissingWhatsAppToken | Self::PlaceholderWhatsAppToken => "whatsapp.token",
            Self::MissingPhoneNumberId => "whatsapp.phone_number_id",
            Self::MissingTemplate => "whatsapp.template_name",
            Self::MissingBrevoApiKey | Self::PlaceholderBrevoApiKey => "brevo.api_key",
            Self::NoSegments | Self::DuplicateSegment(_) => "segments",
            Self::SegmentWithoutList(_) => "segments.list_id",
            Self::ZeroDailyLimit => "limits.daily_limit",
            Self::InvalidSendDelay => "limits.send_delay_secs",
            Self::InvalidImageUrl => "whatsapp.image_url",
        }
    }
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message())
    }
}

impl std::error::Error for ValidationError {}

/// Result of validating settings.
pub type ValidationResult = Result<(), Vec<ValidationError>>;

/// Validate application settings.
///
/// Returns `Ok(())` if valid, or `Err(Vec<ValidationError>)` with all findings.
///
/// # Errors
///
/// Returns a vector of `ValidationError` if anything is missing or malformed.
pub fn validate_settings(settings: &Settings) -> ValidationResult {
    let mut errors = Vec::new();

    // WhatsApp
    match settings.whatsapp.token.as_deref().map(str::trim) {
        None | Some("") => errors.push(ValidationError::MissingWhatsAppToken),
        Some(token) if is_placeholder(token) => {
            errors.push(ValidationError::PlaceholderWhatsAppToken);
        }
        Some(_) => {}
    }
    if settings.whatsapp.phone_number_id.trim().is_empty() {
        errors.push(ValidationError::MissingPhoneNumberId);
    }
    let default_template_missing = settings.whatsapp.template_name.trim().is_empty();
    if default_template_missing
        && (settings.segments.is_empty()
            || settings.segments.iter().any(|s| s.template_name.is_none()))
    {
        errors.push(ValidationError::MissingTemplate);
    }
    if let Some(image) = &settings.whatsapp.image_url
        && !is_http_url(image)
    {
        errors.push(ValidationError::InvalidImageUrl);
    }

    // Brevo
    match settings.brevo.api_key.as_deref().map(str::trim) {
        None | Some("") => errors.push(ValidationError::MissingBrevoApiKey),
        Some(key) if is_placeholder(key) => errors.push(ValidationError::PlaceholderBrevoApiKey),
        Some(_) => {}
    }

    // Segments
    if settings.segments.is_empty() {
        errors.push(ValidationError::NoSegments);
    }
    let mut seen = HashSet::new();
    for segment in &settings.segments {
        if !seen.insert(segment.name.to_lowercase()) {
            errors.push(ValidationError::DuplicateSegment(segment.name.clone()));
        }
        if segment.list_id.is_none() {
            errors.push(ValidationError::SegmentWithoutList(segment.name.clone()));
        }
    }

    // Limits
    if settings.limits.daily_limit == 0 {
        errors.push(ValidationError::ZeroDailyLimit);
    }
    let delay = settings.limits.send_delay_secs;
    if !delay.is_finite() || delay < 0.0 {
        errors.push(ValidationError::InvalidSendDelay);
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

fn is_placeholder(value: &str) -> bool {
    PLACEHOLDER_SECRETS
        .iter()
        .any(|p| value.eq_ignore_ascii_case(p))
}

fn is_http_url(value: &str) -> bool {
    Url::parse(value).is_ok_and(|url| matches!(url.scheme(), "http" | "https"))
}
