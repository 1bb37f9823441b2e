//! JSON-RPC 2.0 wire types for the host pipe.

use serde::{Deserialize, Serialize};
use serde_json::Value;

pub const PARSE_ERROR: i64 = -32700;
pub const METHOD_NOT_FOUND: i64 = -32601;
pub const INVALID_PARAMS: i64 = -32602;
pub const NOT_INITIALIZED: i64 = -32002;
pub const OPERATION_FAILED: i64 = -32000;

#[derive(Debug, Deserialize)]
pub struct JsonRpcRequest {
    #[allow(dead_code)]
    jsonrpc: String,
    pub method: String,
    #[serde(default)]
    pub params: Value,
    pub id: Value,
}

#[derive(Debug, Serialize)]
pub struct JsonRpcResponse {
    pub jsonrpc: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<JsonRpcError>,
    pub id: Value,
}

#[derive(Debug, Serialize)]
pub struct JsonRpcError {
    pub code: i64,
    pub message: String,
}

/// Reply for `execute`: the host shows `message` as a notification.
pub fn ok_response(id: Value, data: Value, message: Option<String>) -> JsonRpcResponse {
    JsonRpcResponse {
        jsonrpc: "2.0",
        result: Some(serde_json::json!({
            "success": true,
            "data": data,
            "message": message
        })),
        error: None,
        id,
    }
}

/// Reply carrying `result` as-is.
pub fn result_response(id: Value, result: Value) -> JsonRpcResponse {
    JsonRpcResponse {
        jsonrpc: "2.0",
        result: Some(result),
        error: None,
        id,
    }
}

pub fn err_response(id: Value, code: i64, message: String) -> JsonRpcResponse {
    JsonRpcResponse {
        jsonrpc: "2.0",
        result: None,
        error: Some(JsonRpcError { code, message }),
        id,
    }
}

/// Outbound `event.publish` request sent to the host.
pub fn event_publish(call_id: u64, event_type: &str, subject: &str, data: Value) -> Value {
    serde_json::json!({
        "jsonrpc": "2.0",
        "method": "event.publish",
        "params": {
            "type": event_type,
            "subject": subject,
            "data": data,
        },
        "id": call_id,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_ok_response_shape() {
        let resp = ok_response(json!(7), json!({ "count": 0 }), Some("done".into()));
        let wire = serde_json::to_value(&resp).unwrap();
        assert_eq!(wire["jsonrpc"], "2.0");
        assert_eq!(wire["id"], 7);
        assert_eq!(wire["result"]["success"], true);
        assert_eq!(wire["result"]["message"], "done");
        assert!(wire.get("error").is_none());
    }

    #[test]
    fn test_err_response_omits_result() {
        let resp = err_response(json!("a"), METHOD_NOT_FOUND, "Unknown method: x".into());
        let wire = serde_json::to_value(&resp).unwrap();
        assert!(wire.get("result").is_none());
        assert_eq!(wire["error"]["code"], -32601);
    }

    #[test]
    fn test_request_params_default_to_null() {
        let req: JsonRpcRequest =
            serde_json::from_str(r#"{"jsonrpc":"2.0","method":"shutdown","id":1}"#).unwrap();
        assert!(req.params.is_null());
        assert_eq!(req.method, "shutdown");
    }
}
