//! Brevo REST client.

use std::time::Duration;

use reqwest::Client as HttpClient;
use serde::Deserialize;
use serde::de::DeserializeOwned;
use tracing::debug;
use url::Url;

use crate::contact::{Account, Contact, ContactList, ContactPage, Folder, FolderPage, ListPage};
use crate::error::{Error, Result};

/// Default API endpoint.
pub const DEFAULT_API_BASE: &str = "https://api.brevo.com/v3/";

/// Largest page Brevo serves for list and folder enumeration.
const LIST_PAGE_SIZE: u32 = 50;

/// Limits applied when walking paginated contact results.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Paging {
    /// Contacts per request.
    pub page_size: u32,
    /// Upper bound on requests for a single list.
    pub max_pages: u32,
}

impl Default for Paging {
    fn default() -> Self {
        Self {
            page_size: 100,
            max_pages: 50,
        }
    }
}

/// Error body returned by Brevo.
#[derive(Debug, Deserialize)]
struct ErrorBody {
    #[serde(default)]
    code: Option<String>,
    #[serde(default)]
    message: String,
}

/// Brevo API client.
#[derive(Debug, Clone)]
pub struct Client {
    api_base: Url,
    api_key: String,
    http_client: HttpClient,
}

impl Client {
    /// Creates a client against the public API.
    ///
    /// # Errors
    ///
    /// Returns an error if the key is empty or the HTTP client cannot be built.
    pub fn new(api_key: impl Into<String>) -> Result<Self> {
        Self::with_api_base(api_key, DEFAULT_API_BASE)
    }

    /// Creates a client against a custom endpoint.
    ///
    /// # Errors
    ///
    /// Returns an error if the key is empty, the URL is invalid or the HTTP
    /// client cannot be built.
    pub fn with_api_base(api_key: impl Into<String>, base: impl AsRef<str>) -> Result<Self> {
        let api_key = api_key.into();
        if api_key.trim().is_empty() {
            return Err(Error::InvalidConfig("API key is empty".into()));
        }

        let mut base = base.as_ref().to_string();
        if !base.ends_with('/') {
            base.push('/');
        }

        let http_client = HttpClient::builder()
            .timeout(Duration::from_secs(30))
            .build()?;

        Ok(Self {
            api_base: Url::parse(&base)?,
            api_key,
            http_client,
        })
    }

    async fn get<T: DeserializeOwned>(&self, path: &str, query: &[(&str, String)]) -> Result<T> {
        let url = self.api_base.join(path)?;
        let response = self
            .http_client
            .get(url)
            .header("api-key", &self.api_key)
            .header("accept", "application/json")
            .query(query)
            .send()
            .await?;

        let status = response.status().as_u16();
        if !response.status().is_success() {
            let body = response.text().await.unwrap_or_default();
            let (code, message) = match serde_json::from_str::<ErrorBody>(&body) {
                Ok(parsed) => (parsed.code, parsed.message),
                Err(_) => (None, body.trim().to_string()),
            };
            return Err(Error::Api {
                status,
                code,
                message,
            });
        }

        response.json().await.map_err(Into::into)
    }

    /// Fetches the account behind the API key.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails or the key is rejected.
    pub async fn account(&self) -> Result<Account> {
        self.get("account", &[]).await
    }

    /// Lists every contact list in the account.
    ///
    /// # Errors
    ///
    /// Returns an error if any page request fails.
    pub async fn lists(&self) -> Result<Vec<ContactList>> {
        let mut lists = Vec::new();
        let mut offset = 0_u64;

        loop {
            let page: ListPage = self
                .get(
                    "contacts/lists",
                    &[
                        ("limit", LIST_PAGE_SIZE.to_string()),
                        ("offset", offset.to_string()),
                    ],
                )
                .await?;
            let fetched = page.lists.len();
            lists.extend(page.lists);

            if fetched < LIST_PAGE_SIZE as usize || lists.len() as u64 >= page.count {
                break;
            }
            offset += fetched as u64;
        }

        Ok(lists)
    }

    /// Lists every folder in the account.
    ///
    /// # Errors
    ///
    /// Returns an error if any page request fails.
    pub async fn folders(&self) -> Result<Vec<Folder>> {
        let mut folders = Vec::new();
        let mut offset = 0_u64;

        loop {
            let page: FolderPage = self
                .get(
                    "contacts/folders",
                    &[
                        ("limit", LIST_PAGE_SIZE.to_string()),
                        ("offset", offset.to_string()),
                    ],
                )
                .await?;
            let fetched = page.folders.len();
            folders.extend(page.folders);

            if fetched < LIST_PAGE_SIZE as usize || folders.len() as u64 >= page.count {
                break;
            }
            offset += fetched as u64;
        }

        Ok(folders)
    }

    /// Lists the contact lists inside a folder.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails.
    pub async fn folder_lists(&self, folder_id: i64) -> Result<Vec<ContactList>> {
        let page: ListPage = self
            .get(
                &format!("contacts/folders/{folder_id}/lists"),
                &[("limit", LIST_PAGE_SIZE.to_string())],
            )
            .await?;
        Ok(page.lists)
    }

    /// Fetches one page of a list's contacts.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails.
    pub async fn list_contacts_page(
        &self,
        list_id: i64,
        limit: u32,
        offset: u64,
    ) -> Result<ContactPage> {
        self.get(
            &format!("contacts/lists/{list_id}/contacts"),
            &[
                ("limit", limit.to_string()),
                ("offset", offset.to_string()),
                ("sort", "desc".to_string()),
            ],
        )
        .await
    }

    /// Fetches all contacts of a list, bounded by `paging.max_pages`.
    ///
    /// # Errors
    ///
    /// Returns an error if any page request fails.
    pub async fn list_contacts(&self, list_id: i64, paging: Paging) -> Result<Vec<Contact>> {
        let mut contacts = Vec::new();
        let mut offset = 0_u64;

        for page_number in 1..=paging.max_pages {
            let page = self
                .list_contacts_page(list_id, paging.page_size, offset)
                .await?;
            let fetched = page.contacts.len();
            debug!(
                "List {list_id} page {page_number}: {fetched} contacts (offset {offset})"
            );
            contacts.extend(page.contacts);

            if fetched < paging.page_size as usize {
                break;
            }
            offset += fetched as u64;
        }

        Ok(contacts)
    }
}
