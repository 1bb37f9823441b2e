use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Description stored when the caller leaves it blank.
pub const DEFAULT_DESCRIPTION: &str = "No description provided";

/// Message carried in every test payload.
pub const TEST_MESSAGE: &str = "This is a test webhook from Webhook Management System";

/// Result of the most recent test-send for a webhook.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum WebhookStatus {
    #[default]
    Untested,
    Tested,
    Error,
}

impl fmt::Display for WebhookStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Untested => write!(f, "untested"),
            Self::Tested => write!(f, "tested"),
            Self::Error => write!(f, "error"),
        }
    }
}

/// A stored webhook configuration.
///
/// Field names on the wire and on disk are camelCase (`lastTested`).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct WebhookRecord {
    pub id: String,
    pub name: String,
    pub url: String,
    pub description: String,
    pub created: DateTime<Utc>,
    pub last_tested: Option<DateTime<Utc>>,
    pub status: WebhookStatus,
}

/// User-editable fields of a webhook, as submitted through the form.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct WebhookDraft {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub description: String,
}

impl WebhookDraft {
    pub fn new(
        name: impl Into<String>,
        url: impl Into<String>,
        description: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            url: url.into(),
            description: description.into(),
        }
    }
}

impl From<&WebhookRecord> for WebhookDraft {
    fn from(record: &WebhookRecord) -> Self {
        Self {
            name: record.name.clone(),
            url: record.url.clone(),
            description: record.description.clone(),
        }
    }
}

/// JSON body a transport would POST to the webhook URL.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TestPayload {
    pub test: bool,
    pub timestamp: DateTime<Utc>,
    pub message: String,
    pub webhook_name: String,
}

/// Everything a transport needs to perform one test-send.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TestRequest {
    pub webhook_id: String,
    pub url: String,
    pub payload: TestPayload,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_uses_camel_case_field_names() {
        let record = WebhookRecord {
            id: "wh_1".to_string(),
            name: "Discord".to_string(),
            url: "https://discord.com/x".to_string(),
            description: DEFAULT_DESCRIPTION.to_string(),
            created: "2026-02-18T12:00:00Z".parse().unwrap(),
            last_tested: None,
            status: WebhookStatus::Untested,
        };
        let json = serde_json::to_value(&record).unwrap();
        assert!(json.get("lastTested").is_some());
        assert!(json["lastTested"].is_null());
        assert_eq!(json["status"], "untested");
        assert!(json.get("last_tested").is_none());
    }

    #[test]
    fn test_status_display_matches_wire_literal() {
        for status in [
            WebhookStatus::Untested,
            WebhookStatus::Tested,
            WebhookStatus::Error,
        ] {
            let wire = serde_json::to_value(status).unwrap();
            assert_eq!(wire, status.to_string());
        }
    }

    #[test]
    fn test_draft_from_record_copies_editable_fields() {
        let record = WebhookRecord {
            id: "wh_1".to_string(),
            name: "Slack".to_string(),
            url: "https://hooks.slack.com/x".to_string(),
            description: "team".to_string(),
            created: Utc::now(),
            last_tested: Some(Utc::now()),
            status: WebhookStatus::Tested,
        };
        let draft = WebhookDraft::from(&record);
        assert_eq!(draft, WebhookDraft::new("Slack", "https://hooks.slack.com/x", "team"));
    }

    #[test]
    fn test_draft_missing_fields_default_to_empty() {
        let draft: WebhookDraft = serde_json::from_str(r#"{"name":"A"}"#).unwrap();
        assert_eq!(draft.name, "A");
        assert!(draft.url.is_empty());
        assert!(draft.description.is_empty());
    }
}
