//! Projection of the registry into what the host draws: a list of items
//! and a detail panel for the selected one.

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::registry::Registry;
use crate::types::{WebhookRecord, WebhookStatus};

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct WebhookListItem {
    pub id: String,
    pub name: String,
    pub url: String,
    pub description: String,
    pub created: DateTime<Utc>,
    pub status: WebhookStatus,
    pub selected: bool,
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct WebhookDetail {
    pub id: String,
    pub name: String,
    pub url: String,
    pub description: String,
    pub created: DateTime<Utc>,
    pub last_tested: Option<DateTime<Utc>>,
    pub status: WebhookStatus,
}

impl From<&WebhookRecord> for WebhookDetail {
    fn from(record: &WebhookRecord) -> Self {
        Self {
            id: record.id.clone(),
            name: record.name.clone(),
            url: record.url.clone(),
            description: record.description.clone(),
            created: record.created,
            last_tested: record.last_tested,
            status: record.status,
        }
    }
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct WebhookView {
    /// True when the "library is empty" placeholder should show.
    pub empty: bool,
    pub items: Vec<WebhookListItem>,
    pub selected: Option<WebhookDetail>,
}

pub fn render(registry: &Registry) -> WebhookView {
    let selected_id = registry.selected().map(|w| w.id.as_str());
    let items = registry
        .list()
        .iter()
        .map(|w| WebhookListItem {
            id: w.id.clone(),
            name: w.name.clone(),
            url: w.url.clone(),
            description: w.description.clone(),
            created: w.created,
            status: w.status,
            selected: Some(w.id.as_str()) == selected_id,
        })
        .collect::<Vec<_>>();

    WebhookView {
        empty: items.is_empty(),
        items,
        selected: registry.selected().map(WebhookDetail::from),
    }
}
