//! Smartview discovery against the AirSaas API.
//!
//! Smartviews are saved project filters; the workflow scopes a report to
//! one of them. Listing follows the API's cursor pagination up to a page
//! cap, dedupes by id (a view can move between pages while we paginate)
//! and sorts by name for stable display.

use std::collections::HashSet;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::Client;
use serde::Deserialize;
use tracing::{debug, info};

use crate::errors::ServiceError;

pub const DEFAULT_PAGE_SIZE: u32 = 20;

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Smartview {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub display: Option<String>,
    #[serde(default)]
    pub view_category: Option<String>,
    #[serde(default)]
    pub private: bool,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
}

/// One page of the paginated listing; `next` is an absolute URL for the
/// following page, absent on the last one.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SmartviewPage {
    #[serde(default)]
    pub results: Vec<Smartview>,
    #[serde(default)]
    pub next: Option<String>,
    #[serde(default)]
    pub count: Option<u64>,
}

#[async_trait]
pub trait SmartviewSource: Send + Sync {
    /// Fetch one page; `cursor` is the `next` URL from the prior page,
    /// `None` for the first.
    async fn fetch_page(&self, cursor: Option<&str>) -> Result<SmartviewPage, ServiceError>;
}

/// Walk the paginated listing and return the merged, deduplicated set,
/// sorted by name. `max_pages` bounds how far we follow cursors; 0 means
/// unlimited.
pub async fn list_smartviews(
    source: &dyn SmartviewSource,
    max_pages: u32,
) -> Result<Vec<Smartview>, ServiceError> {
    let mut views: Vec<Smartview> = Vec::new();
    let mut seen: HashSet<String> = HashSet::new();
    let mut cursor: Option<String> = None;
    let mut pages = 0u32;

    loop {
        let page = source.fetch_page(cursor.as_deref()).await?;
        pages += 1;
        debug!(page = pages, fetched = page.results.len(), "smartview page fetched");
        for view in page.results {
            if seen.insert(view.id.clone()) {
                views.push(view);
            }
        }
        match page.next {
            Some(next) if max_pages == 0 || pages < max_pages => cursor = Some(next),
            Some(_) => {
                info!(pages, max_pages, "stopping smartview listing at the page cap");
                break;
            }
            None => break,
        }
    }

    views.sort_by(|a, b| a.name.cmp(&b.name));
    Ok(views)
}

/// HTTP implementation of [`SmartviewSource`].
pub struct HttpSmartviewSource {
    client: Client,
    base_url: String,
    api_key: String,
}

impl HttpSmartviewSource {
    pub fn new(base_url: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.into(),
            api_key: api_key.into(),
        }
    }

    fn first_page_url(&self) -> String {
        format!(
            "{}/smart_views/?type=project&page_size={}",
            self.base_url.trim_end_matches('/'),
            DEFAULT_PAGE_SIZE
        )
    }
}

#[async_trait]
impl SmartviewSource for HttpSmartviewSource {
    async fn fetch_page(&self, cursor: Option<&str>) -> Result<SmartviewPage, ServiceError> {
        let url = match cursor {
            Some(next) => next.to_string(),
            None => self.first_page_url(),
        };

        let response = self
            .client
            .get(&url)
            .header("Authorization", format!("Api-Key {}", self.api_key))
            .send()
            .await
            .map_err(|err| ServiceError::Transport {
                endpoint: "smart_views".to_string(),
                message: err.to_string(),
            })?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(ServiceError::Status {
                endpoint: "smart_views".to_string(),
                status: status.as_u16(),
                message,
            });
        }

        response
            .json::<SmartviewPage>()
            .await
            .map_err(|err| ServiceError::Malformed {
                endpoint: "smart_views".to_string(),
                message: err.to_string(),
            })
    }
}
