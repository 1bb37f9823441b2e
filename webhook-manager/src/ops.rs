//! Request dispatch and one handler per operation.
//!
//! Handlers translate wire input into registry calls and describe the
//! outcome as data plus a notice. The dispatcher turns every outcome,
//! including errors, into a notification.

use serde_json::{json, Value};

use crate::config::ManagerConfig;
use crate::error::{RegistryError, Result};
use crate::notify::Notice;
use crate::registry::Confirmation;
use crate::rpc::{
    self, err_response, ok_response, result_response, JsonRpcRequest, JsonRpcResponse,
};
use crate::state::{AppState, HostEvent, SharedState};
use crate::transport::{describe_request, DeliveryReport, TestOutcome};
use crate::types::{TestRequest, WebhookDraft};
use crate::view;

/// Event type published when a deferred test finishes.
pub const WEBHOOK_TESTED_EVENT: &str = "webhook.tested";

/// Successful handler outcome.
pub struct Reply {
    pub data: Value,
    pub notice: Option<Notice>,
}

impl Reply {
    fn data(data: Value) -> Self {
        Self { data, notice: None }
    }

    fn with_notice(data: Value, notice: Notice) -> Self {
        Self {
            data,
            notice: Some(notice),
        }
    }
}

type OpResult = Result<Reply>;

// ─── Dispatch ────────────────────────────────────────────────────────────────

pub async fn handle_request(req: &JsonRpcRequest, state: &SharedState) -> JsonRpcResponse {
    match req.method.as_str() {
        "initialize" => handle_initialize(req, state).await,
        "shutdown" => handle_shutdown(req, state).await,
        "execute" => handle_execute(req, state).await,
        m if m.starts_with("resources.") => handle_resources(req, state).await,
        _ => err_response(
            req.id.clone(),
            rpc::METHOD_NOT_FOUND,
            format!("Unknown method: {}", req.method),
        ),
    }
}

async fn handle_initialize(req: &JsonRpcRequest, state: &SharedState) -> JsonRpcResponse {
    let config = match ManagerConfig::from_params(&req.params) {
        Ok(c) => c,
        Err(msg) => return err_response(req.id.clone(), rpc::INVALID_PARAMS, msg),
    };

    let app_state = AppState::initialize(config);
    let mut guard = state.write().await;
    if let Some(previous) = guard.as_mut() {
        previous.cancel_all_tests();
    }
    *guard = Some(app_state);

    result_response(req.id.clone(), json!({ "ready": true }))
}

async fn handle_shutdown(req: &JsonRpcRequest, state: &SharedState) -> JsonRpcResponse {
    let mut guard = state.write().await;
    if let Some(st) = guard.as_mut() {
        st.cancel_all_tests();
        tracing::info!(webhooks = st.registry.len(), "webhook manager shutting down");
    }
    result_response(req.id.clone(), json!({}))
}

async fn handle_execute(req: &JsonRpcRequest, state: &SharedState) -> JsonRpcResponse {
    let operation = req
        .params
        .get("operation")
        .and_then(|v| v.as_str())
        .unwrap_or("");
    let input = req
        .params
        .get("input")
        .cloned()
        .unwrap_or(Value::Object(Default::default()));

    let mut guard = state.write().await;
    let Some(st) = guard.as_mut() else {
        return not_initialized(req);
    };

    let result = match operation {
        "list_webhooks" => op_list_webhooks(st),
        "create_webhook" => op_create_webhook(&input, st),
        "select_webhook" => op_select_webhook(&input, st),
        "begin_edit" => op_begin_edit(&input, st),
        "update_webhook" => op_update_webhook(&input, st),
        "delete_webhook" => op_delete_webhook(&input, st),
        "test_webhook" => op_test_webhook(&input, st, state),
        "refresh_library" => op_refresh_library(st),
        "get_view" => op_get_view(st),
        "list_notifications" => op_list_notifications(st),
        "get_status" => op_get_status(st),
        _ => {
            return err_response(
                req.id.clone(),
                rpc::OPERATION_FAILED,
                format!("Unknown operation: {operation}"),
            )
        }
    };

    match result {
        Ok(reply) => {
            let message = reply.notice.map(|n| st.notify(n).text);
            ok_response(req.id.clone(), reply.data, message)
        }
        Err(e) => fail(req, st, operation, e),
    }
}

async fn handle_resources(req: &JsonRpcRequest, state: &SharedState) -> JsonRpcResponse {
    let resource_method = req.method.strip_prefix("resources.").unwrap_or("");
    let resource_type = req
        .params
        .get("resource_type")
        .and_then(|v| v.as_str())
        .unwrap_or("");

    if resource_type != "webhooks" {
        return err_response(
            req.id.clone(),
            rpc::INVALID_PARAMS,
            format!("Unknown resource type: {resource_type}"),
        );
    }

    let mut guard = state.write().await;
    let Some(st) = guard.as_mut() else {
        return not_initialized(req);
    };

    let id = req.params.get("id").and_then(|v| v.as_str()).unwrap_or("");
    let data = req
        .params
        .get("data")
        .cloned()
        .unwrap_or(Value::Object(Default::default()));

    let result = match resource_method {
        "list" => resource_list(st),
        "get" => resource_get(id, st),
        "create" => op_create_webhook(&data, st),
        "update" => resource_update(id, &data, st),
        "delete" => resource_delete(id, &data, st),
        _ => {
            return err_response(
                req.id.clone(),
                rpc::OPERATION_FAILED,
                format!("Unknown resource method: {resource_method}"),
            )
        }
    };

    match result {
        Ok(reply) => {
            if let Some(notice) = reply.notice {
                st.notify(notice);
            }
            result_response(req.id.clone(), reply.data)
        }
        Err(e) => fail(req, st, &req.method, e),
    }
}

fn fail(req: &JsonRpcRequest, st: &mut AppState, operation: &str, e: RegistryError) -> JsonRpcResponse {
    tracing::warn!(operation, error = %e, "operation failed");
    st.notify(Notice::error(e.to_string()));
    err_response(req.id.clone(), e.code(), e.to_string())
}

fn not_initialized(req: &JsonRpcRequest) -> JsonRpcResponse {
    err_response(
        req.id.clone(),
        rpc::NOT_INITIALIZED,
        "Extension not initialized. Send 'initialize' first.".into(),
    )
}

/// Collect queued host events as `event.publish` requests.
pub async fn drain_pending_events(state: &SharedState) -> Vec<Value> {
    static NEXT_ID: std::sync::atomic::AtomicU64 = std::sync::atomic::AtomicU64::new(20000);

    let events = {
        let mut guard = state.write().await;
        match guard.as_mut() {
            Some(st) => st.take_events(),
            None => return Vec::new(),
        }
    };

    events
        .into_iter()
        .map(|event| {
            let call_id = NEXT_ID.fetch_add(1, std::sync::atomic::Ordering::Relaxed);
            rpc::event_publish(call_id, &event.event_type, &event.subject, event.data)
        })
        .collect()
}

// ─── Operations ──────────────────────────────────────────────────────────────

fn op_list_webhooks(st: &AppState) -> OpResult {
    let items = serde_json::to_value(st.registry.list())?;
    Ok(Reply::data(json!({
        "webhooks": items,
        "count": st.registry.len(),
    })))
}

fn op_create_webhook(input: &Value, st: &mut AppState) -> OpResult {
    let record = st.registry.create(draft_from(input))?;
    let notice = Notice::success(format!("Webhook \"{}\" saved successfully!", record.name));
    Ok(Reply::with_notice(serde_json::to_value(&record)?, notice))
}

fn op_select_webhook(input: &Value, st: &mut AppState) -> OpResult {
    let id = required_str(input, "webhook_id")?;
    let record = st.registry.select(id)?;
    let notice = Notice::info(format!("Selected webhook: {}", record.name));
    Ok(Reply::with_notice(serde_json::to_value(record)?, notice))
}

fn op_begin_edit(input: &Value, st: &mut AppState) -> OpResult {
    let id = required_str(input, "webhook_id")?;
    let draft = st.registry.begin_edit(id)?;
    st.cancel_test(id);
    Ok(Reply::with_notice(
        json!({ "draft": draft }),
        Notice::info("Webhook loaded for editing. Update the fields and click Save."),
    ))
}

fn op_update_webhook(input: &Value, st: &mut AppState) -> OpResult {
    let id = required_str(input, "webhook_id")?;
    apply_update(id, draft_from(input), st)
}

/// Shared by `update_webhook` and `resources.update`. A test still running
/// against the old URL must not mark the new one as tested.
fn apply_update(id: &str, draft: WebhookDraft, st: &mut AppState) -> OpResult {
    let previous_url = st.registry.get(id).map(|record| record.url.clone());
    let record = st.registry.update(id, draft)?;
    if previous_url.as_deref() != Some(record.url.as_str()) && st.cancel_test(id) {
        tracing::info!(webhook_id = %id, "URL changed, cancelled pending test");
    }
    let notice = Notice::success(format!("Webhook \"{}\" updated successfully!", record.name));
    Ok(Reply::with_notice(serde_json::to_value(&record)?, notice))
}

fn op_delete_webhook(input: &Value, st: &mut AppState) -> OpResult {
    let id = required_str(input, "webhook_id")?;
    let confirmation = Confirmation::from(
        input
            .get("confirmed")
            .and_then(|v| v.as_bool())
            .unwrap_or(false),
    );

    match st.registry.delete(id, confirmation)? {
        Some(removed) => {
            st.cancel_test(id);
            Ok(Reply::with_notice(
                json!({ "deleted": true, "webhook": removed }),
                Notice::success(format!("Webhook \"{}\" deleted successfully!", removed.name)),
            ))
        }
        None => Ok(Reply::data(json!({ "deleted": false }))),
    }
}

/// Start a deferred test-send for the selected webhook.
///
/// The reply only carries the opening transcript. The result is recorded
/// by a background task and published as a `webhook.tested` event.
fn op_test_webhook(input: &Value, st: &mut AppState, state: &SharedState) -> OpResult {
    let id = required_str(input, "webhook_id")?;
    let request = st.registry.begin_test(id)?;
    let transcript = describe_request(&request);
    let (ticket, mut cancel_rx) = st.register_test(id);

    let transport = st.transport.clone();
    let shared = state.clone();
    let task_request = request.clone();
    tokio::spawn(async move {
        let delivery = tokio::select! {
            result = transport.deliver(&task_request) => result,
            _ = cancel_rx.changed() => {
                tracing::debug!(webhook_id = %task_request.webhook_id, ticket, "test cancelled before completion");
                return;
            }
        };

        let mut guard = shared.write().await;
        if let Some(st) = guard.as_mut() {
            complete_test(st, &task_request, ticket, delivery);
        }
    });

    let notice = Notice::info(format!("Testing webhook \"{}\"...", request.payload.webhook_name));
    Ok(Reply::with_notice(
        json!({
            "webhook_id": request.webhook_id,
            "status": "pending",
            "payload": request.payload,
            "transcript": transcript,
        }),
        notice,
    ))
}

/// Record a finished delivery, unless the test was cancelled or the
/// webhook disappeared while it ran.
fn complete_test(
    st: &mut AppState,
    request: &TestRequest,
    ticket: u64,
    delivery: Result<DeliveryReport>,
) {
    let id = request.webhook_id.as_str();
    if !st.finish_test(id, ticket) {
        tracing::debug!(webhook_id = %id, ticket, "discarding superseded test result");
        return;
    }

    let outcome = TestOutcome::from_delivery(&delivery);
    let mut transcript = Vec::new();
    match delivery {
        Ok(report) => transcript.extend(report.transcript),
        Err(e) => transcript.push(format!("Error: {e}")),
    }

    let record = match st.registry.record_test_outcome(id, &outcome) {
        Ok(record) => record,
        Err(RegistryError::NotFound(_)) => {
            tracing::debug!(webhook_id = %id, "webhook removed during test, discarding result");
            return;
        }
        Err(e) => {
            tracing::warn!(webhook_id = %id, error = %e, "failed to record test result");
            st.notify(Notice::error(format!("Webhook test failed! {e}")));
            return;
        }
    };

    let notice = if outcome.is_success() {
        Notice::success("Webhook test completed!")
    } else {
        Notice::error("Webhook test failed!")
    };
    st.notify(notice);
    st.publish(HostEvent {
        event_type: WEBHOOK_TESTED_EVENT.to_string(),
        subject: id.to_string(),
        data: json!({
            "webhook": record,
            "outcome": outcome,
            "transcript": transcript,
        }),
    });
}

fn op_refresh_library(st: &mut AppState) -> OpResult {
    st.registry.reload()?;
    let view = view::render(&st.registry);
    Ok(Reply::with_notice(
        serde_json::to_value(view)?,
        Notice::info("Webhook library refreshed!"),
    ))
}

fn op_get_view(st: &AppState) -> OpResult {
    Ok(Reply::data(serde_json::to_value(view::render(&st.registry))?))
}

fn op_list_notifications(st: &mut AppState) -> OpResult {
    let active = st.notifications.active();
    Ok(Reply::data(json!({ "notifications": active })))
}

fn op_get_status(st: &AppState) -> OpResult {
    Ok(Reply::data(json!({
        "data_dir": st.config.data_dir.display().to_string(),
        "webhook_count": st.registry.len(),
        "selected": st.registry.selected_id(),
        "pending_tests": st.pending_test_count(),
    })))
}

// ─── Resource CRUD ───────────────────────────────────────────────────────────

fn resource_list(st: &AppState) -> OpResult {
    let items = serde_json::to_value(st.registry.list())?;
    Ok(Reply::data(json!({ "items": items, "total": st.registry.len() })))
}

fn resource_get(id: &str, st: &AppState) -> OpResult {
    match st.registry.get(id) {
        Some(record) => Ok(Reply::data(serde_json::to_value(record)?)),
        None => Err(RegistryError::NotFound(id.to_string())),
    }
}

/// Partial update: fields missing from `data` keep their current value.
fn resource_update(id: &str, data: &Value, st: &mut AppState) -> OpResult {
    let current = st
        .registry
        .get(id)
        .ok_or_else(|| RegistryError::NotFound(id.to_string()))?;
    let field = |key: &str, fallback: &str| -> String {
        data.get(key)
            .and_then(|v| v.as_str())
            .unwrap_or(fallback)
            .to_string()
    };
    let draft = WebhookDraft {
        name: field("name", current.name.as_str()),
        url: field("url", current.url.as_str()),
        description: field("description", current.description.as_str()),
    };

    apply_update(id, draft, st)
}

/// Deleting through the resource API applies the same confirmation rule as
/// `delete_webhook`. Only a confirmed delete moves the selection.
fn resource_delete(id: &str, data: &Value, st: &mut AppState) -> OpResult {
    let confirmed = data
        .get("confirmed")
        .and_then(|v| v.as_bool())
        .unwrap_or(false);
    if !confirmed {
        if st.registry.get(id).is_none() {
            return Err(RegistryError::NotFound(id.to_string()));
        }
        return Ok(Reply::data(json!({ "deleted": false })));
    }

    st.registry.select(id)?;
    let mut input = data.clone();
    if let Value::Object(map) = &mut input {
        map.insert("webhook_id".to_string(), Value::String(id.to_string()));
    } else {
        input = json!({ "webhook_id": id });
    }
    op_delete_webhook(&input, st)
}

// ─── Input helpers ───────────────────────────────────────────────────────────

fn required_str<'a>(input: &'a Value, field: &'static str) -> Result<&'a str> {
    input
        .get(field)
        .and_then(|v| v.as_str())
        .filter(|s| !s.trim().is_empty())
        .ok_or(RegistryError::Validation { field })
}

fn draft_from(input: &Value) -> WebhookDraft {
    let field = |key: &str| {
        input
            .get(key)
            .and_then(|v| v.as_str())
            .unwrap_or("")
            .to_string()
    };
    WebhookDraft {
        name: field("name"),
        url: field("url"),
        description: field("description"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::notify::NotificationLevel;
    use crate::registry::Registry;
    use crate::storage::{KeyValueStore, MemoryStore};
    use crate::transport::SimulatedTransport;
    use crate::types::WebhookStatus;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;
    use std::time::Duration;

    /// Memory store whose writes start failing once `failing` is set.
    struct FlakyStore {
        inner: MemoryStore,
        failing: Arc<AtomicBool>,
    }

    impl KeyValueStore for FlakyStore {
        fn get(&self, key: &str) -> Result<Option<String>> {
            self.inner.get(key)
        }

        fn set(&mut self, key: &str, value: &str) -> Result<()> {
            if self.failing.load(Ordering::SeqCst) {
                return Err(RegistryError::Storage("disk full".to_string()));
            }
            self.inner.set(key, value)
        }
    }

    fn app_state(failing: Arc<AtomicBool>) -> AppState {
        let store = FlakyStore {
            inner: MemoryStore::new(),
            failing,
        };
        AppState::new(
            ManagerConfig::default(),
            Registry::new(Box::new(store)),
            Arc::new(SimulatedTransport::new(Duration::ZERO)),
        )
    }

    fn delivered() -> Result<DeliveryReport> {
        Ok(DeliveryReport {
            status_code: 200,
            latency_ms: 0,
            transcript: vec!["Response: 200 OK".to_string()],
        })
    }

    /// Create and select one webhook, then start a test against it.
    fn start_test(st: &mut AppState) -> (TestRequest, u64) {
        let id = st
            .registry
            .create(WebhookDraft::new("A", "https://a.example", ""))
            .unwrap()
            .id;
        st.registry.select(&id).unwrap();
        let request = st.registry.begin_test(&id).unwrap();
        let (ticket, _cancel) = st.register_test(&id);
        (request, ticket)
    }

    #[test]
    fn test_failed_result_write_is_reported() {
        let failing = Arc::new(AtomicBool::new(false));
        let mut st = app_state(failing.clone());
        let (request, ticket) = start_test(&mut st);

        failing.store(true, Ordering::SeqCst);
        complete_test(&mut st, &request, ticket, delivered());

        let active = st.notifications.active();
        let last = active.last().unwrap();
        assert_eq!(last.level, NotificationLevel::Error);
        assert_eq!(last.text, "Webhook test failed! storage error: disk full");
        assert_eq!(
            st.registry.get(&request.webhook_id).unwrap().status,
            WebhookStatus::Untested
        );
        assert!(st.take_events().is_empty());
    }

    #[test]
    fn test_result_for_removed_webhook_is_dropped_quietly() {
        let mut st = app_state(Arc::new(AtomicBool::new(false)));
        let (request, ticket) = start_test(&mut st);
        st.registry
            .delete(&request.webhook_id, Confirmation::Confirmed)
            .unwrap();

        complete_test(&mut st, &request, ticket, delivered());

        assert!(st.notifications.active().is_empty());
        assert!(st.take_events().is_empty());
    }

    #[test]
    fn test_stale_result_after_url_change_is_discarded() {
        let mut st = app_state(Arc::new(AtomicBool::new(false)));
        let (request, ticket) = start_test(&mut st);
        let id = request.webhook_id.clone();

        let input = json!({ "webhook_id": id, "name": "A", "url": "https://b.example" });
        op_update_webhook(&input, &mut st).unwrap();
        assert_eq!(st.pending_test_count(), 0);

        complete_test(&mut st, &request, ticket, delivered());
        assert_eq!(
            st.registry.get(&id).unwrap().status,
            WebhookStatus::Untested
        );
        assert!(st.take_events().is_empty());
    }

    #[test]
    fn test_declined_resource_delete_leaves_selection() {
        let mut st = app_state(Arc::new(AtomicBool::new(false)));
        let a = st
            .registry
            .create(WebhookDraft::new("A", "u", ""))
            .unwrap()
            .id;
        let b = st
            .registry
            .create(WebhookDraft::new("B", "u", ""))
            .unwrap()
            .id;
        st.registry.select(&a).unwrap();

        let reply = resource_delete(&b, &json!({ "confirmed": false }), &mut st).unwrap();
        assert_eq!(reply.data["deleted"], false);
        assert_eq!(st.registry.selected_id(), Some(a.as_str()));

        let reply = resource_delete(&b, &json!({ "confirmed": true }), &mut st).unwrap();
        assert_eq!(reply.data["deleted"], true);
        assert_eq!(st.registry.len(), 1);
    }
}
