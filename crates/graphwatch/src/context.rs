//! Context for node invocations.

use std::{collections::HashMap, fmt, sync::Arc};

use serde::{Deserialize, Serialize, de::DeserializeOwned};

use crate::{
    credential::CredentialError,
    item::ExecutionItem,
    state::{InMemoryPollStateStore, InstanceLeases, PollState, PollStateStore},
};

/// Why the host invoked a node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ExecutionMode {
    /// Scheduled invocation from the polling loop.
    #[default]
    Trigger,
    /// A user asked for a one-off preview run.
    Manual,
}

/// Provides access to invocation metadata, credentials and poll state.
///
/// Contexts are cheap to clone: the state store and lease table are shared,
/// so every clone made for the same instance sees the same state.
#[derive(Clone)]
pub struct Context {
    request_id: String,
    instance_id: String,
    mode: ExecutionMode,
    continue_on_fail: bool,
    credentials: HashMap<String, HashMap<String, String>>,
    state_store: Arc<dyn PollStateStore>,
    leases: Arc<InstanceLeases>,
}

impl fmt::Debug for Context {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Context")
            .field("request_id", &self.request_id)
            .field("instance_id", &self.instance_id)
            .field("mode", &self.mode)
            .field("continue_on_fail", &self.continue_on_fail)
            .field("credentials", &self.credentials.keys().collect::<Vec<_>>())
            .finish_non_exhaustive()
    }
}

impl Context {
    /// Creates an empty context with an in-memory state store, useful for
    /// testing.
    #[must_use]
    pub fn empty() -> Self {
        Self::with_metadata("", "")
    }

    /// Creates a context with the specified metadata.
    #[must_use]
    pub fn with_metadata(request_id: &str, instance_id: &str) -> Self {
        Self {
            request_id: request_id.to_string(),
            instance_id: instance_id.to_string(),
            mode: ExecutionMode::default(),
            continue_on_fail: false,
            credentials: HashMap::new(),
            state_store: Arc::new(InMemoryPollStateStore::new()),
            leases: Arc::new(InstanceLeases::new()),
        }
    }

    /// Host-generated identifier for correlating logs of one invocation.
    #[must_use]
    pub fn request_id(&self) -> &str {
        &self.request_id
    }

    /// Identifier of the configured node instance; poll state is keyed by it.
    #[must_use]
    pub fn instance_id(&self) -> &str {
        &self.instance_id
    }

    #[must_use]
    pub fn mode(&self) -> ExecutionMode {
        self.mode
    }

    /// Whether a failed item should be recorded instead of aborting the run.
    #[must_use]
    pub fn continue_on_fail(&self) -> bool {
        self.continue_on_fail
    }

    /// Retrieves a credential by name, deserializing into the requested type.
    ///
    /// # Errors
    ///
    /// Returns [`CredentialError::NotFound`] if the credential doesn't exist,
    /// or [`CredentialError::DeserializationError`] if deserialization fails.
    pub fn credential<T: DeserializeOwned>(&self, name: &str) -> Result<T, CredentialError> {
        let cred_map = self
            .credentials
            .get(name)
            .ok_or_else(|| CredentialError::NotFound(name.to_string()))?;

        serde_json::to_value(cred_map)
            .and_then(serde_json::from_value)
            .map_err(|e| CredentialError::DeserializationError(e.to_string()))
    }

    /// Returns the poll state handle for this context's instance.
    #[must_use]
    pub fn poll_state(&self) -> PollState<'_> {
        PollState {
            instance_id: &self.instance_id,
            store: self.state_store.as_ref(),
            leases: &self.leases,
        }
    }

    /// Turns an operation failure into a recorded error item when
    /// continue-on-fail is enabled, or hands the error back otherwise.
    ///
    /// # Errors
    ///
    /// Returns `error` unchanged when continue-on-fail is disabled.
    pub fn recover(&self, error: anyhow::Error) -> anyhow::Result<ExecutionItem> {
        if self.continue_on_fail {
            Ok(ExecutionItem::failed(&error))
        } else {
            Err(error)
        }
    }

    /// Adds a credential.
    #[must_use]
    pub fn with_credential(mut self, name: &str, values: HashMap<String, String>) -> Self {
        self.credentials.insert(name.to_string(), values);
        self
    }

    #[must_use]
    pub fn with_request_id(mut self, request_id: &str) -> Self {
        self.request_id = request_id.to_string();
        self
    }

    #[must_use]
    pub fn with_mode(mut self, mode: ExecutionMode) -> Self {
        self.mode = mode;
        self
    }

    #[must_use]
    pub fn with_continue_on_fail(mut self, continue_on_fail: bool) -> Self {
        self.continue_on_fail = continue_on_fail;
        self
    }

    /// Replaces the state store, e.g. with a file-backed one.
    #[must_use]
    pub fn with_state_store(mut self, store: Arc<dyn PollStateStore>) -> Self {
        self.state_store = store;
        self
    }

    /// Shares a lease table with other contexts of the same host.
    #[must_use]
    pub fn with_leases(mut self, leases: Arc<InstanceLeases>) -> Self {
        self.leases = leases;
        self
    }
}
