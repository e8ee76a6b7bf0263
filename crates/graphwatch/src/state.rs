//! Durable per-instance state for polling triggers.
//!
//! Each trigger instance owns one JSON document that survives between poll
//! cycles. The document is read at the start of a cycle and replaced at the
//! end; nodes never merge partial updates into it.
//!
//! # Concurrency Model
//!
//! Two cycles of the same instance must never interleave, otherwise both
//! would diff against the same snapshot and emit the same change twice. A
//! cycle therefore takes a [`PollLease`] from [`InstanceLeases`] before it
//! touches the store. A second cycle that tries to lease the same instance
//! fails immediately with [`StateError::PollInFlight`] instead of queueing.

use std::{
    collections::{HashMap, HashSet},
    sync::{Mutex, RwLock},
};

use async_trait::async_trait;
use serde::{Serialize, de::DeserializeOwned};
use serde_json::Value as JsonValue;
use thiserror::Error;
use tracing::{debug, instrument};

/// Errors that can occur while reading or writing poll state.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum StateError {
    /// Another poll cycle for the same instance still holds the lease.
    #[error("a poll for instance '{0}' is already in flight")]
    PollInFlight(String),
    /// Underlying storage backend error.
    #[error("storage error: {0}")]
    Storage(String),
    /// The stored document could not be converted to or from the node's type.
    #[error("failed to convert poll state: {0}")]
    Serialization(#[from] serde_json::Error),
    /// Internal lock poisoned, indicating concurrent access failure.
    #[error("lock poisoned")]
    LockPoisoned,
}

/// Async storage interface for per-instance poll state.
///
/// Implementations must be thread-safe (`Send + Sync`) since every trigger
/// instance runs on its own task. `save` replaces the whole document.
#[async_trait]
pub trait PollStateStore: std::fmt::Debug + Send + Sync {
    /// Load the state for an instance, or `None` if it has never been saved.
    async fn load(&self, instance_id: &str) -> Result<Option<JsonValue>, StateError>;

    /// Replace the state for an instance.
    async fn save(&self, instance_id: &str, state: &JsonValue) -> Result<(), StateError>;
}

/// In-memory implementation of [`PollStateStore`].
///
/// Useful for tests and single-shot runs. State is lost when the process
/// exits.
#[derive(Debug, Default)]
pub struct InMemoryPollStateStore {
    states: RwLock<HashMap<String, JsonValue>>,
}

impl InMemoryPollStateStore {
    /// Create a new empty in-memory state store.
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl PollStateStore for InMemoryPollStateStore {
    #[instrument(skip(self), fields(instance_id = %instance_id))]
    async fn load(&self, instance_id: &str) -> Result<Option<JsonValue>, StateError> {
        let map = self.states.read().map_err(|_| StateError::LockPoisoned)?;
        Ok(map.get(instance_id).cloned())
    }

    #[instrument(skip(self, state), fields(instance_id = %instance_id))]
    async fn save(&self, instance_id: &str, state: &JsonValue) -> Result<(), StateError> {
        let mut map = self.states.write().map_err(|_| StateError::LockPoisoned)?;
        map.insert(instance_id.to_string(), state.clone());
        Ok(())
    }
}

/// Tracks which instances currently have a poll cycle running.
///
/// Shared between all contexts the host creates, so that a slow cycle and the
/// next scheduled tick for the same instance see each other.
#[derive(Debug, Default)]
pub struct InstanceLeases {
    held: Mutex<HashSet<String>>,
}

impl InstanceLeases {
    pub fn new() -> Self {
        Self::default()
    }

    /// Takes the lease for `instance_id` without waiting.
    ///
    /// # Errors
    ///
    /// Returns [`StateError::PollInFlight`] if another cycle holds the lease.
    pub fn try_acquire(&self, instance_id: &str) -> Result<PollLease<'_>, StateError> {
        let mut held = self.held.lock().map_err(|_| StateError::LockPoisoned)?;
        if !held.insert(instance_id.to_string()) {
            return Err(StateError::PollInFlight(instance_id.to_string()));
        }
        debug!(instance_id, "acquired poll lease");
        Ok(PollLease {
            leases: self,
            instance_id: instance_id.to_string(),
        })
    }

    /// Returns true if a cycle for `instance_id` is running.
    pub fn is_held(&self, instance_id: &str) -> bool {
        self.held
            .lock()
            .is_ok_and(|held| held.contains(instance_id))
    }
}

/// RAII guard that releases an instance's lease when dropped.
#[derive(Debug)]
pub struct PollLease<'a> {
    leases: &'a InstanceLeases,
    instance_id: String,
}

impl Drop for PollLease<'_> {
    fn drop(&mut self) {
        if let Ok(mut held) = self.leases.held.lock() {
            held.remove(&self.instance_id);
        }
    }
}

/// Typed view of one instance's poll state, obtained from
/// [`Context::poll_state`](crate::Context::poll_state).
#[derive(Debug, Clone, Copy)]
pub struct PollState<'a> {
    pub(crate) instance_id: &'a str,
    pub(crate) store: &'a dyn PollStateStore,
    pub(crate) leases: &'a InstanceLeases,
}

impl<'a> PollState<'a> {
    /// The instance this state belongs to.
    pub fn instance_id(&self) -> &'a str {
        self.instance_id
    }

    /// Takes the exclusive lease for this instance.
    ///
    /// # Errors
    ///
    /// Returns [`StateError::PollInFlight`] if a cycle is already running.
    pub fn acquire(&self) -> Result<PollLease<'a>, StateError> {
        self.leases.try_acquire(self.instance_id)
    }

    /// Loads and deserializes the stored state.
    ///
    /// # Errors
    ///
    /// Returns an error if the store fails or the stored document does not
    /// match `T`.
    pub async fn load<T: DeserializeOwned>(&self) -> Result<Option<T>, StateError> {
        match self.store.load(self.instance_id).await? {
            Some(value) => Ok(Some(serde_json::from_value(value)?)),
            None => Ok(None),
        }
    }

    /// Serializes `state` and replaces the stored document.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization or the store fails.
    pub async fn save<T: Serialize + Sync>(&self, state: &T) -> Result<(), StateError> {
        let value = serde_json::to_value(state)?;
        self.store.save(self.instance_id, &value).await
    }
}
