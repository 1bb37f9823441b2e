use serde::Deserialize;
use serde_json::Value;
use std::path::PathBuf;
use std::time::Duration;

use crate::registry::WEBHOOKS_KEY;

/// Settings sent by the host in the `initialize` request.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct ManagerConfig {
    pub data_dir: PathBuf,
    /// Storage slot holding the webhook list.
    pub storage_key: String,
    pub test_delay_ms: u64,
    pub notification_ttl_ms: u64,
    /// Write the demonstration webhooks when the list is empty.
    pub seed_samples: bool,
}

impl Default for ManagerConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("."),
            storage_key: WEBHOOKS_KEY.to_string(),
            test_delay_ms: 1500,
            notification_ttl_ms: 5000,
            seed_samples: true,
        }
    }
}

impl ManagerConfig {
    /// Read the config from `initialize` params. Missing or null params
    /// give the defaults.
    pub fn from_params(params: &Value) -> Result<Self, String> {
        if params.is_null() {
            return Ok(Self::default());
        }
        serde_json::from_value(params.clone()).map_err(|e| format!("invalid initialize params: {e}"))
    }

    pub fn test_delay(&self) -> Duration {
        Duration::from_millis(self.test_delay_ms)
    }

    pub fn notification_ttl(&self) -> Duration {
        Duration::from_millis(self.notification_ttl_ms)
    }
}
