//! Graph API response bodies.

use serde::Deserialize;

use crate::error::Error;

/// Successful response of `POST /{phone-number-id}/messages`.
#[derive(Debug, Clone, Deserialize)]
pub struct MessagesResponse {
    /// Resolved contacts.
    #[serde(default)]
    pub contacts: Vec<ResponseContact>,
    /// Accepted messages.
    #[serde(default)]
    pub messages: Vec<ResponseMessage>,
}

/// Contact entry of a messages response.
#[derive(Debug, Clone, Deserialize)]
pub struct ResponseContact {
    /// Number as sent.
    #[serde(default)]
    pub input: String,
    /// WhatsApp id of the recipient.
    pub wa_id: Option<String>,
}

/// Message entry of a messages response.
#[derive(Debug, Clone, Deserialize)]
pub struct ResponseMessage {
    /// Message id (`wamid.…`).
    pub id: String,
}

/// A message accepted by the API.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SentMessage {
    /// Message id (`wamid.…`).
    pub message_id: String,
    /// WhatsApp id of the recipient, when reported.
    pub wa_id: Option<String>,
    /// HTTP status of the accepting response.
    pub http_status: u16,
}

impl SentMessage {
    /// Builds a sent message from a response body.
    ///
    /// # Errors
    ///
    /// Returns an error if the response carries no message id.
    pub fn from_response(response: MessagesResponse, http_status: u16) -> Result<Self, Error> {
        let message_id = response
            .messages
            .into_iter()
            .next()
            .map(|m| m.id)
            .ok_or_else(|| Error::InvalidResponse("response contained no message id".into()))?;

        Ok(Self {
            message_id,
            wa_id: response.contacts.into_iter().find_map(|c| c.wa_id),
            http_status,
        })
    }
}

/// Phone number details returned by `GET /{phone-number-id}`.
#[derive(Debug, Clone, Deserialize)]
pub struct PhoneNumberInfo {
    /// Phone number id.
    pub id: String,
    /// Number as displayed to recipients.
    pub display_phone_number: Option<String>,
    /// Verified business name.
    pub verified_name: Option<String>,
}

/// Error envelope returned by the Graph API.
#[derive(Debug, Clone, Deserialize)]
pub struct ErrorResponse {
    /// Error details.
    pub error: ErrorDetail,
}

/// Error details.
#[derive(Debug, Clone, Deserialize)]
pub struct ErrorDetail {
    /// Human-readable message.
    #[serde(default)]
    pub message: String,
    /// Error type (e.g. `OAuthException`).
    #[serde(rename = "type", default)]
    pub kind: Option<String>,
    /// Numeric error code.
    pub code: Option<i64>,
}

impl ErrorResponse {
    /// Converts an error body into an [`Error`].
    ///
    /// Bodies that are not a Graph API error envelope are kept verbatim.
    #[must_use]
    pub fn into_error(status: u16, body: &str) -> Error {
        match serde_json::from_str::<Self>(body) {
            Ok(parsed) => Error::Api {
                status,
                code: parsed.error.code,
                message: parsed.error.message,
            },
            Err(_) => Error::Api {
                status,
                code: None,
                message: if body.trim().is_empty() {
                    format!("HTTP {status}")
                } else {
                    body.trim().to_string()
                },
            },
        }
    }
}
