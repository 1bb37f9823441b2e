use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{watch, RwLock};

use crate::config::ManagerConfig;
use crate::notify::{Notice, Notification, NotificationCenter};
use crate::registry::Registry;
use crate::storage::FileStore;
use crate::transport::{SimulatedTransport, Transport};

/// State shared between the request loop and deferred test tasks.
/// `None` until the host sends `initialize`.
pub type SharedState = Arc<RwLock<Option<AppState>>>;

pub fn new_shared_state() -> SharedState {
    Arc::new(RwLock::new(None))
}

/// Event queued for the host, published before the next request is handled.
#[derive(Debug, Clone)]
pub struct HostEvent {
    pub event_type: String,
    pub subject: String,
    pub data: Value,
}

/// Cancellation handle for an in-flight test-send.
struct PendingTest {
    ticket: u64,
    cancel: watch::Sender<bool>,
}

pub struct AppState {
    pub config: ManagerConfig,
    pub registry: Registry,
    pub notifications: NotificationCenter,
    pub transport: Arc<dyn Transport>,
    /// In-flight tests keyed by webhook id.
    pending_tests: HashMap<String, PendingTest>,
    next_ticket: u64,
    pending_events: Vec<HostEvent>,
}

impl AppState {
    pub fn new(config: ManagerConfig, registry: Registry, transport: Arc<dyn Transport>) -> Self {
        let notifications = NotificationCenter::new(config.notification_ttl());
        Self {
            config,
            registry,
            notifications,
            transport,
            pending_tests: HashMap::new(),
            next_ticket: 1,
            pending_events: Vec::new(),
        }
    }

    /// Open the on-disk registry described by `config`.
    ///
    /// A slot that fails to load is logged and treated as empty.
    pub fn initialize(config: ManagerConfig) -> Self {
        let store = FileStore::new(config.data_dir.clone());
        let mut registry = Registry::with_key(Box::new(store), config.storage_key.clone());

        if let Err(e) = registry.load() {
            tracing::warn!(error = %e, data_dir = %config.data_dir.display(), "failed to load webhooks, starting empty");
        }
        if config.seed_samples {
            if let Err(e) = registry.seed_samples_if_empty() {
                tracing::warn!(error = %e, "failed to seed sample webhooks");
            }
        }

        let transport = Arc::new(SimulatedTransport::new(config.test_delay()));
        tracing::info!(
            data_dir = %config.data_dir.display(),
            webhooks = registry.len(),
            "webhook manager initialized"
        );
        Self::new(config, registry, transport)
    }

    pub fn notify(&mut self, notice: Notice) -> Notification {
        self.notifications.push(notice)
    }

    /// Track a new test for `webhook_id`, cancelling any earlier one.
    pub fn register_test(&mut self, webhook_id: &str) -> (u64, watch::Receiver<bool>) {
        self.cancel_test(webhook_id);
        let ticket = self.next_ticket;
        self.next_ticket += 1;
        let (cancel, cancel_rx) = watch::channel(false);
        self.pending_tests
            .insert(webhook_id.to_string(), PendingTest { ticket, cancel });
        (ticket, cancel_rx)
    }

    /// Stop the in-flight test for `webhook_id`, if any.
    pub fn cancel_test(&mut self, webhook_id: &str) -> bool {
        match self.pending_tests.remove(webhook_id) {
            Some(pending) => {
                let _ = pending.cancel.send(true);
                tracing::debug!(webhook_id, ticket = pending.ticket, "pending test cancelled");
                true
            }
            None => false,
        }
    }

    /// Release the slot held by `ticket`. False if the test was cancelled
    /// or superseded in the meantime.
    pub fn finish_test(&mut self, webhook_id: &str, ticket: u64) -> bool {
        match self.pending_tests.get(webhook_id) {
            Some(pending) if pending.ticket == ticket => {
                self.pending_tests.remove(webhook_id);
                true
            }
            _ => false,
        }
    }

    pub fn cancel_all_tests(&mut self) {
        for (_, pending) in self.pending_tests.drain() {
            let _ = pending.cancel.send(true);
        }
    }

    pub fn pending_test_count(&self) -> usize {
        self.pending_tests.len()
    }

    pub fn publish(&mut self, event: HostEvent) {
        self.pending_events.push(event);
    }

    pub fn take_events(&mut self) -> Vec<HostEvent> {
        std::mem::take(&mut self.pending_events)
    }
}
