use serde_json::Value;
use std::io::{self, BufRead, Write};
use tracing_subscriber::EnvFilter;
use webhook_manager::ops;
use webhook_manager::rpc::{self, err_response, JsonRpcRequest, JsonRpcResponse};
use webhook_manager::state;

#[tokio::main]
async fn main() {
    init_tracing();

    let state = state::new_shared_state();
    let handle = tokio::runtime::Handle::current();

    // Stdin loop on a blocking thread to avoid blocking the async runtime.
    let result = tokio::task::spawn_blocking(move || {
        let stdin = io::stdin();
        let stdout = io::stdout();
        let mut out = stdout.lock();
        let mut line = String::new();

        loop {
            line.clear();
            match stdin.lock().read_line(&mut line) {
                Ok(0) | Err(_) => break,
                _ => {}
            }

            let trimmed = line.trim();
            if trimmed.is_empty() {
                continue;
            }

            let request: JsonRpcRequest = match serde_json::from_str(trimmed) {
                Ok(r) => r,
                Err(e) => {
                    let resp = err_response(
                        Value::Number(0.into()),
                        rpc::PARSE_ERROR,
                        format!("Parse error: {e}"),
                    );
                    emit_line(&mut out, &resp);
                    continue;
                }
            };

            // Finished tests are published while the host is waiting on us.
            if request.method == "execute" || request.method.starts_with("resources.") {
                let events = handle.block_on(ops::drain_pending_events(&state));
                for event in events {
                    publish_event(&mut out, &stdin, &event);
                }
            }

            let is_shutdown = request.method == "shutdown";
            let response = handle.block_on(ops::handle_request(&request, &state));
            emit_line(&mut out, &response);

            if is_shutdown {
                break;
            }
        }
    })
    .await;

    if let Err(e) = result {
        tracing::error!(error = %e, "request loop panicked");
    }
}

/// Logs go to stderr; stdout carries the protocol.
fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .with_target(false)
        .init();
}

fn emit_line(out: &mut impl Write, resp: &JsonRpcResponse) {
    match serde_json::to_string(resp) {
        Ok(line) => {
            let _ = writeln!(out, "{line}");
            let _ = out.flush();
        }
        Err(e) => tracing::error!(error = %e, "failed to serialize response"),
    }
}

fn publish_event(out: &mut impl Write, stdin: &io::Stdin, event: &Value) {
    let _ = writeln!(out, "{event}");
    let _ = out.flush();

    // Read back the host's acknowledgement to keep the protocol in sync.
    let mut ack = String::new();
    if let Err(e) = stdin.lock().read_line(&mut ack) {
        tracing::warn!(error = %e, "failed to read event acknowledgement");
    }
}
