//! # jobwire-whatsapp
//!
//! Client for the WhatsApp Cloud API (Meta Graph API), limited to what a
//! campaign sender needs:
//!
//! - **Template messages**: approved templates with an image header and
//!   ordered body parameters
//! - **Bounded retries**: exponential backoff for throttling, server errors
//!   and transport failures; client errors fail immediately
//! - **Connection check**: verifies the token against the phone number id
//!
//! ## Example
//!
//! ```ignore
//! use jobwire_whatsapp::{Client, ClientConfig, TemplateMessage};
//!
//! let client = Client::new(ClientConfig::new("1234567890", "EAAG...")?)?;
//! let message = TemplateMessage::new("15551234567", "job_alert", "en")
//!     .with_header_image("https://cdn.example.com/banner.png")
//!     .body_parameter("Backend Engineer");
//! let sent = client.send_template(&message).await?;
//! println!("wamid: {}", sent.message_id);
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![forbid(unsafe_code)]

mod client;
mod error;
pub mod message;
pub mod response;

pub use client::{Client, ClientConfig, DEFAULT_API_BASE, DEFAULT_API_VERSION, RetryPolicy};
pub use error::{Error, Result};
pub use message::{MessagePayload, TemplateMessage};
pub use response::{PhoneNumberInfo, SentMessage};
