//! Webhook manager extension.
//!
//! Keeps a named list of webhook configurations in a single key-value slot,
//! lets the host create, select, edit, delete and test them, and reports
//! every outcome as a transient notification. The host talks to the
//! extension over newline-delimited JSON-RPC on stdin/stdout.

pub mod config;
pub mod error;
pub mod notify;
pub mod ops;
pub mod registry;
pub mod rpc;
pub mod state;
pub mod storage;
pub mod transport;
pub mod types;
pub mod view;

pub use error::{RegistryError, Result};
pub use registry::{Confirmation, Registry, TestRun};
pub use types::{WebhookDraft, WebhookRecord, WebhookStatus};
