//! Template message payloads.
//!
//! WhatsApp only delivers business-initiated messages through pre-approved
//! templates. A template is addressed by name and language, and its
//! placeholders are filled through components: an optional media header and
//! an ordered list of body text parameters.

use serde::Serialize;

/// A template message to send to one recipient.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TemplateMessage {
    /// Recipient phone number, digits only with country code.
    pub to: String,
    /// Approved template name.
    pub template_name: String,
    /// Template language code (e.g. `en`, `en_US`).
    pub language_code: String,
    /// Header image URL, if the template has an image header.
    pub header_image: Option<String>,
    /// Body placeholder values, in order (`{{1}}`, `{{2}}`, ...).
    pub body_parameters: Vec<String>,
}

impl TemplateMessage {
    /// Creates a new template message without components.
    #[must_use]
    pub fn new(
        to: impl Into<String>,
        template_name: impl Into<String>,
        language_code: impl Into<String>,
    ) -> Self {
        Self {
            to: to.into(),
            template_name: template_name.into(),
            language_code: language_code.into(),
            header_image: None,
            body_parameters: Vec::new(),
        }
    }

    /// Sets the header image.
    #[must_use]
    pub fn with_header_image(mut self, url: impl Into<String>) -> Self {
        self.header_image = Some(url.into());
        self
    }

    /// Adds a body parameter.
    #[must_use]
    pub fn body_parameter(mut self, value: impl Into<String>) -> Self {
        self.body_parameters.push(value.into());
        self
    }

    /// Replaces all body parameters.
    #[must_use]
    pub fn with_body_parameters<I, S>(mut self, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.body_parameters = values.into_iter().map(Into::into).collect();
        self
    }

    /// Builds the JSON request body for the `/messages` endpoint.
    #[must_use]
    pub fn to_payload(&self) -> MessagePayload {
        let mut components = Vec::new();

        if let Some(link) = &self.header_image {
            components.push(Component::Header {
                parameters: vec![Parameter::Image {
                    image: MediaLink { link: link.clone() },
                }],
            });
        }

        if !self.body_parameters.is_empty() {
            components.push(Component::Body {
                parameters: self
                    .body_parameters
                    .iter()
                    .map(|text| Parameter::Text { text: text.clone() })
                    .collect(),
            });
        }

        MessagePayload {
            messaging_product: "whatsapp",
            recipient_type: "individual",
            to: self.to.clone(),
            kind: "template",
            template: TemplatePayload {
                name: self.template_name.clone(),
                language: Language {
                    code: self.language_code.clone(),
                },
                components,
            },
        }
    }
}

/// Request body of a template send.
#[derive(Debug, Clone, Serialize)]
pub struct MessagePayload {
    messaging_product: &'static str,
    recipient_type: &'static str,
    to: String,
    #[serde(rename = "type")]
    kind: &'static str,
    template: TemplatePayload,
}

#[derive(Debug, Clone, Serialize)]
struct TemplatePayload {
    name: String,
    language: Language,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    components: Vec<Component>,
}

#[derive(Debug, Clone, Serialize)]
struct Language {
    code: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
enum Component {
    Header { parameters: Vec<Parameter> },
    Body { parameters: Vec<Parameter> },
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
enum Parameter {
    Image { image: MediaLink },
    Text { text: String },
}

#[derive(Debug, Clone, Serialize)]
struct MediaLink {
    link: String,
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_minimal_payload_has_no_components() {
        let payload = TemplateMessage::new("15551234567", "job_alert", "en").to_payload();
        let value = serde_json::to_value(&payload).unwrap();

        assert_eq!(
            value,
            json!({
                "messaging_product": "whatsapp",
                "recipient_type": "individual",
                "to": "15551234567",
                "type": "template",
                "template": {
                    "name": "job_alert",
                    "language": { "code": "en" }
                }
            })
        );
    }

    #[test]
    fn test_header_image_and_body_parameters() {
        let message = TemplateMessage::new("919876543210", "job_alert", "en_US")
            .with_header_image("https://cdn.example.com/banner.png")
            .body_parameter("Backend Engineer")
            .body_parameter("Acme");
        let value = serde_json::to_value(message.to_payload()).unwrap();

        let components = &value["template"]["components"];
        assert_eq!(components[0]["type"], "header");
        assert_eq!(components[0]["parameters"][0]["type"], "image");
        assert_eq!(
            components[0]["parameters"][0]["image"]["link"],
            "https://cdn.example.com/banner.png"
        );
        assert_eq!(components[1]["type"], "body");
        assert_eq!(components[1]["parameters"][0]["text"], "Backend Engineer");
        assert_eq!(components[1]["parameters"][1]["type"], "text");
        assert_eq!(components[1]["parameters"][1]["text"], "Acme");
    }

    #[test]
    fn test_with_body_parameters_replaces() {
        let message = TemplateMessage::new("15551234567", "t", "en")
            .body_parameter("old")
            .with_body_parameters(["a", "b"]);
        assert_eq!(message.body_parameters, vec!["a", "b"]);
    }
}
