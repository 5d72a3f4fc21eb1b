//! Brevo-backed contact source.

use jobwire_brevo::{Client, Contact, Paging};
use tracing::{debug, error, info};

use super::{ContactSource, SegmentInfo, SegmentMember};
use crate::config::BrevoSettings;
use crate::{Error, Result};

/// Contact source reading Brevo contact lists.
#[derive(Debug, Clone)]
pub struct BrevoContactSource {
    client: Client,
    phone_attribute: String,
    opt_out_attribute: String,
    paging: Paging,
}

impl BrevoContactSource {
    /// Builds a source from settings.
    ///
    /// # Errors
    ///
    /// Returns an error if no API key is configured or the client cannot be built.
    pub fn from_settings(settings: &BrevoSettings) -> Result<Self> {
        let api_key = settings
            .api_key
            .as_deref()
            .filter(|k| !k.trim().is_empty())
            .ok_or_else(|| Error::config("Brevo API key is not configured"))?;

        let client = match &settings.api_base {
            Some(base) => Client::with_api_base(api_key, base)?,
            None => Client::new(api_key)?,
        };

        Ok(Self::new(client, settings))
    }

    /// Wraps an existing client.
    #[must_use]
    pub fn new(client: Client, settings: &BrevoSettings) -> Self {
        Self {
            client,
            phone_attribute: settings.phone_attribute.clone(),
            opt_out_attribute: settings.opt_out_attribute.clone(),
            paging: Paging {
                page_size: settings.page_size,
                max_pages: settings.max_pages,
            },
        }
    }

    fn to_member(&self, contact: &Contact, list_id: i64) -> SegmentMember {
        SegmentMember {
            recipient_key_raw: contact.phone(&self.phone_attribute),
            display_id: contact.id.to_string(),
            opted_out: contact.attribute_flag(&self.opt_out_attribute)
                || contact.is_unsubscribed_from(list_id),
            blacklisted: contact.is_blacklisted(),
        }
    }
}

impl ContactSource for BrevoContactSource {
    async fn verify(&self) -> bool {
        match self.client.account().await {
            Ok(account) => {
                info!("Brevo connection verified for {}", account.email);
                true
            }
            Err(e) => {
                error!("Brevo connection failed: {e}");
                false
            }
        }
    }

    async fn list_segments(&self) -> Result<Vec<SegmentInfo>> {
        let lists = self.client.lists().await?;
        Ok(lists
            .into_iter()
            .map(|list| SegmentInfo {
                id: list.id,
                name: list.name,
                member_count: list.total_subscribers,
            })
            .collect())
    }

    async fn get_segment_members(&self, segment_id: i64) -> Result<Vec<SegmentMember>> {
        let contacts = self.client.list_contacts(segment_id, self.paging).await?;
        debug!("Fetched {} contacts from list {segment_id}", contacts.len());
        Ok(contacts
            .iter()
            .map(|contact| self.to_member(contact, segment_id))
            .collect())
    }
}
