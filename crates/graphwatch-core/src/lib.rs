//! Host-side infrastructure for Graphwatch.
//!
//! # Key Components
//!
//! - **Configuration**: [`Config`] describes the trigger instances to run,
//!   [`CredentialsConfig`] holds the secrets they authenticate with. Both are
//!   located with the same resolution algorithm, see [`ConfigFile::resolve`].
//! - **State**: [`FileStateStore`] persists each trigger instance's poll
//!   snapshot so a restart does not re-announce every file.

mod config;
mod store;

pub use config::{
    Config, ConfigError, ConfigFile, ConfigKind, CredentialsConfig, TriggerConfig,
    resolve_env_value,
};
pub use store::FileStateStore;
