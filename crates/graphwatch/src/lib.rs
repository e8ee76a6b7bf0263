//! # Graphwatch Node Framework
//!
//! This crate provides the building blocks shared by Graphwatch nodes: the
//! per-invocation [`Context`], typed credentials, durable poll state, and the
//! [`ExecutionItem`] shape that every node emits.
//!
//! ## Defining a Node
//!
//! Nodes are async functions with the signature:
//!
//! ```ignore
//! async fn my_node(ctx: &Context, input: MyInput) -> Result<MyOutput> {
//!     // ...
//! }
//! ```
//!
//! Trigger nodes return `Result<Option<Vec<ExecutionItem>>>`, where `None`
//! means "nothing happened this cycle".
//!
//! The `Result` type is re-exported from `anyhow` and expands to `Result<T,
//! anyhow::Error>`.
//!
//! ## Context
//!
//! The `Context` parameter provides access to:
//! - `request_id()`, `instance_id()` - Invocation metadata
//! - `mode()` - Whether the host is polling or a user asked for a manual run
//! - `credential(name)` - Host-configured credentials
//! - `poll_state()` - Per-instance state that survives between poll cycles
//!
//! ## Credentials
//!
//! Define credentials using the `define_credential!` macro:
//!
//! ```ignore
//! use graphwatch::define_credential;
//!
//! define_credential! {
//!     /// API key for the service.
//!     ApiKey("api_key") {
//!         /// API key for authentication
//!         key: String,
//!         /// Optional endpoint override
//!         endpoint: Option<String>,
//!     }
//! }
//!
//! async fn my_node(ctx: &Context, input: MyInput) -> Result<MyOutput> {
//!     let api_key = ApiKey::get(ctx)?;
//!     Ok(MyOutput { /* use api_key.key */ })
//! }
//! ```
//!
//! Fields typed `Option<String>` are optional; every other field is required.

mod context;
mod credential;
mod item;
mod state;

pub use anyhow::{self, Result, bail, ensure};
pub use context::{Context, ExecutionMode};
pub use credential::{CredentialError, CredentialFieldSchema};
pub use item::{BinaryData, ExecutionItem};
pub use state::{
    InMemoryPollStateStore, InstanceLeases, PollLease, PollState, PollStateStore, StateError,
};
// Full schemars re-export required because JsonSchema derive macro generates
// code referencing `schemars::*` paths directly.
pub use schemars;
pub use schemars::JsonSchema;
pub use tracing::{Level, debug, error, info, span, trace, warn};

#[doc(hidden)]
pub mod __private {
    pub use crate::credential::CredentialField;
}
