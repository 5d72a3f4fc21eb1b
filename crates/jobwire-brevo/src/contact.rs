//! Contact, list and folder models.

use serde::Deserialize;
use serde_json::{Map, Value};

/// Attributes tried, in order, when the configured phone attribute is empty.
const PHONE_FALLBACK_ATTRIBUTES: [&str; 3] = ["SMS", "WHATSAPP", "MOBILE"];

/// A Brevo contact.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Contact {
    /// Contact id.
    pub id: i64,
    /// Email address, if any.
    #[serde(default)]
    pub email: Option<String>,
    /// Contact is blacklisted for email campaigns.
    #[serde(default)]
    pub email_blacklisted: bool,
    /// Contact is blacklisted for SMS campaigns.
    #[serde(default)]
    pub sms_blacklisted: bool,
    /// Custom attributes (`SMS`, `FIRSTNAME`, opt-out flags, ...).
    #[serde(default)]
    pub attributes: Map<String, Value>,
    /// Lists the contact belongs to.
    #[serde(default)]
    pub list_ids: Vec<i64>,
    /// Lists the contact unsubscribed from.
    #[serde(default)]
    pub list_unsubscribed: Vec<i64>,
    /// Top-level mobile number, outside the attributes.
    #[serde(default)]
    pub mobile: Option<Value>,
    /// Top-level SMS number, outside the attributes.
    #[serde(default)]
    pub sms: Option<Value>,
}

impl Contact {
    /// Returns an attribute as text.
    ///
    /// Numbers are rendered in decimal; empty strings count as missing.
    #[must_use]
    pub fn attribute_text(&self, name: &str) -> Option<String> {
        self.attributes.get(name).and_then(value_text)
    }

    /// Returns an attribute as a flag.
    ///
    /// Accepts booleans, non-zero numbers and the strings `true`, `yes`, `1`.
    #[must_use]
    pub fn attribute_flag(&self, name: &str) -> bool {
        match self.attributes.get(name) {
            Some(Value::Bool(b)) => *b,
            Some(Value::Number(n)) => n.as_f64().is_some_and(|v| v != 0.0),
            Some(Value::String(s)) => {
                matches!(s.trim().to_lowercase().as_str(), "true" | "yes" | "1")
            }
            _ => false,
        }
    }

    /// Returns the raw phone number.
    ///
    /// Tries `attribute` first, then the top-level `mobile` and `sms`
    /// fields, then the usual phone attributes.
    #[must_use]
    pub fn phone(&self, attribute: &str) -> Option<String> {
        self.attribute_text(attribute)
            .or_else(|| self.mobile.as_ref().and_then(value_text))
            .or_else(|| self.sms.as_ref().and_then(value_text))
            .or_else(|| {
                PHONE_FALLBACK_ATTRIBUTES
                    .iter()
                    .find_map(|name| self.attribute_text(name))
            })
    }

    /// Returns true if the contact is blacklisted on any channel.
    #[must_use]
    pub const fn is_blacklisted(&self) -> bool {
        self.email_blacklisted || self.sms_blacklisted
    }

    /// Returns true if the contact unsubscribed from `list_id`.
    #[must_use]
    pub fn is_unsubscribed_from(&self, list_id: i64) -> bool {
        self.list_unsubscribed.contains(&list_id)
    }
}

fn value_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// One page of contacts.
#[derive(Debug, Clone, Deserialize)]
pub struct ContactPage {
    /// Contacts on this page.
    #[serde(default)]
    pub contacts: Vec<Contact>,
    /// Total contacts matching the query.
    #[serde(default)]
    pub count: u64,
}

/// A contact list.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContactList {
    /// List id.
    pub id: i64,
    /// List name.
    pub name: String,
    /// Subscribers in the list.
    #[serde(default)]
    pub total_subscribers: u64,
    /// Blacklisted members of the list.
    #[serde(default)]
    pub total_blacklisted: u64,
    /// Folder the list lives in.
    #[serde(default)]
    pub folder_id: Option<i64>,
}

/// One page of lists.
#[derive(Debug, Clone, Deserialize)]
pub struct ListPage {
    /// Lists on this page.
    #[serde(default)]
    pub lists: Vec<ContactList>,
    /// Total lists.
    #[serde(default)]
    pub count: u64,
}

/// A folder of lists.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Folder {
    /// Folder id.
    pub id: i64,
    /// Folder name.
    pub name: String,
    /// Subscribers across the folder's lists.
    #[serde(default)]
    pub total_subscribers: u64,
}

/// One page of folders.
#[derive(Debug, Clone, Deserialize)]
pub struct FolderPage {
    /// Folders on this page.
    #[serde(default)]
    pub folders: Vec<Folder>,
    /// Total folders.
    #[serde(default)]
    pub count: u64,
}

/// Account details returned by `GET /account`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Account {
    /// Account email.
    #[serde(default)]
    pub email: String,
    /// Company name.
    #[serde(default)]
    pub company_name: Option<String>,
}
