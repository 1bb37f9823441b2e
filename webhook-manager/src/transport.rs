//! Test-send transports.
//!
//! A transport takes a [`TestRequest`] and reports what the endpoint
//! answered. Only a simulated transport ships; it never opens a socket.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};

use crate::error::{RegistryError, Result};
use crate::types::TestRequest;

/// Delay used by the simulated transport unless configured otherwise.
pub const DEFAULT_SIMULATED_DELAY: Duration = Duration::from_millis(1500);

/// What a transport observed for one delivery.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeliveryReport {
    pub status_code: u16,
    pub latency_ms: u64,
    /// Human-readable lines describing the exchange.
    pub transcript: Vec<String>,
}

impl DeliveryReport {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status_code)
    }
}

/// Outcome fed into the registry's status transition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum TestOutcome {
    Delivered { status_code: u16 },
    Failed { reason: String },
}

impl TestOutcome {
    pub fn from_delivery(result: &Result<DeliveryReport>) -> Self {
        match result {
            Ok(report) if report.is_success() => Self::Delivered {
                status_code: report.status_code,
            },
            Ok(report) => Self::Failed {
                reason: format!("endpoint returned HTTP {}", report.status_code),
            },
            Err(e) => Self::Failed {
                reason: e.to_string(),
            },
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Self::Delivered { .. })
    }
}

#[async_trait]
pub trait Transport: Send + Sync {
    /// Deliver the test payload. `Err` means the request never completed.
    async fn deliver(&self, request: &TestRequest) -> Result<DeliveryReport>;
}

/// Opening lines of a test transcript, written before delivery starts.
pub fn describe_request(request: &TestRequest) -> Vec<String> {
    let payload = serde_json::to_string_pretty(&request.payload).unwrap_or_default();
    vec![
        "Testing webhook...".to_string(),
        format!("Sending test payload to: {}", request.url),
        format!("Payload: {payload}"),
        String::new(),
        "Note: this is a simulated test; no request leaves this process.".to_string(),
        "A real transport would:".to_string(),
        "1. Send a POST request to the webhook URL".to_string(),
        "2. Include the test payload as JSON".to_string(),
        "3. Report the response status and any errors".to_string(),
    ]
}

/// Waits a fixed delay, then answers with a fixed status code.
#[derive(Debug, Clone)]
pub struct SimulatedTransport {
    delay: Duration,
    status_code: u16,
}

impl SimulatedTransport {
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            status_code: 200,
        }
    }

    pub fn with_status(mut self, status_code: u16) -> Self {
        self.status_code = status_code;
        self
    }
}

impl Default for SimulatedTransport {
    fn default() -> Self {
        Self::new(DEFAULT_SIMULATED_DELAY)
    }
}

#[async_trait]
impl Transport for SimulatedTransport {
    async fn deliver(&self, request: &TestRequest) -> Result<DeliveryReport> {
        if request.url.trim().is_empty() {
            return Err(RegistryError::Transport("webhook has no URL".into()));
        }

        let start = Instant::now();
        tokio::time::sleep(self.delay).await;

        let mut transcript = vec![format!(
            "Simulated Response: {} {}",
            self.status_code,
            reason_phrase(self.status_code)
        )];
        if (200..300).contains(&self.status_code) {
            transcript.push("Test completed successfully!".to_string());
        } else {
            transcript.push("Test failed.".to_string());
        }

        tracing::debug!(
            webhook_id = %request.webhook_id,
            status = self.status_code,
            "simulated delivery finished"
        );

        Ok(DeliveryReport {
            status_code: self.status_code,
            latency_ms: start.elapsed().as_millis() as u64,
            transcript,
        })
    }
}

fn reason_phrase(status_code: u16) -> &'static str {
    match status_code {
        200 => "OK",
        201 => "Created",
        202 => "Accepted",
        204 => "No Content",
        400 => "Bad Request",
        401 => "Unauthorized",
        404 => "Not Found",
        500 => "Internal Server Error",
        502 => "Bad Gateway",
        503 => "Service Unavailable",
        _ => "",
    }
}
