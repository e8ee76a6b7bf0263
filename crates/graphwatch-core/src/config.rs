//! Unified configuration system for Graphwatch.
//!
//! # Configuration Types
//!
//! - **Config**: The project configuration from `graphwatch.toml` listing the
//!   trigger instances to run and where their state lives
//! - **`CredentialsConfig`**: Secrets from
//!   `~/.config/graphwatch/credentials.toml`
//!
//! # Resolution Algorithm
//!
//! All configuration files use the same resolution algorithm:
//!
//! 1. Environment variable override
//! 2. Current directory (project config only)
//! 3. Parent directories, walking up to the filesystem root (project config
//!    only)
//! 4. XDG config directory (credentials only)
//!
//! # Example
//!
//! ```rust,ignore
//! use graphwatch_core::Config;
//!
//! match Config::load_resolved()? {
//!     Some((path, config)) => {
//!         println!("{} defines {} triggers", path.display(), config.triggers.len());
//!     }
//!     None => println!("No graphwatch.toml found"),
//! }
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

use std::{
    collections::{HashMap, HashSet},
    fs,
    path::{Path, PathBuf},
};

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value as JsonValue};

const PROJECT_FILE_NAME: &str = "graphwatch.toml";
const CREDENTIALS_FILE_NAME: &str = "credentials.toml";
const PROJECT_ENV_VAR: &str = "GRAPHWATCH_CONFIG_PATH";
const CREDENTIALS_ENV_VAR: &str = "GRAPHWATCH_CREDENTIALS_PATH";
const DEFAULT_STATE_DIR: &str = ".graphwatch/state";

/// Unified configuration file type for all Graphwatch config files.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum ConfigFile {
    /// Project configuration from `graphwatch.toml`.
    Project(Config),

    /// Credentials configuration from `credentials.toml`.
    Credentials(CredentialsConfig),
}

/// Configuration type discriminator for resolution.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigKind {
    /// Project configuration (`graphwatch.toml`).
    Project,

    /// Credentials configuration (`credentials.toml`).
    Credentials,
}

/// Errors that can occur during configuration resolution or loading.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum ConfigError {
    /// I/O error when reading a config file.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// TOML parsing error when a config file is malformed.
    #[error("failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),

    /// Config file not found.
    #[error("config file not found: {0}")]
    NotFound(PathBuf),

    /// Project config error.
    #[error("project config error: {0}")]
    Project(String),

    /// Credentials config error.
    #[error("credentials error: {0}")]
    Credentials(String),
}

impl ConfigFile {
    /// Finds the path of a configuration file without loading it.
    ///
    /// The resolution order is:
    /// 1. Environment variable override (`GRAPHWATCH_CONFIG_PATH` or
    ///    `GRAPHWATCH_CREDENTIALS_PATH`)
    /// 2. Current directory
    /// 3. Parent directories (walking up to filesystem root)
    /// 4. XDG config directory (`~/.config/graphwatch/`)
    ///
    /// Steps 2 and 3 apply to project config only, step 4 to credentials
    /// only. An override that points at a missing file falls through to the
    /// remaining steps.
    ///
    /// # Errors
    ///
    /// Returns `Err(ConfigError::Io)` if the current directory cannot be
    /// determined.
    pub fn locate(kind: ConfigKind) -> Result<Option<PathBuf>, ConfigError> {
        // Step 1: Environment variable override
        if let Some(path) = env_override(kind)
            && path.exists()
        {
            return Ok(Some(path));
        }

        // Steps 2 and 3: current directory, then its ancestors
        if kind == ConfigKind::Project {
            let current = std::env::current_dir()?;
            for dir in current.ancestors() {
                let path = dir.join(PROJECT_FILE_NAME);
                if path.exists() {
                    return Ok(Some(path));
                }
            }
        }

        // Step 4: XDG config directory
        if let Some(path) = xdg_config_path(kind)
            && path.exists()
        {
            return Ok(Some(path));
        }

        Ok(None)
    }

    /// Resolves and loads a configuration file.
    ///
    /// Returns `Ok(None)` when no file exists; missing files are not errors.
    ///
    /// # Errors
    ///
    /// Returns `Err(ConfigError)` if a found file cannot be read or parsed.
    pub fn resolve(kind: ConfigKind) -> Result<Option<(PathBuf, Self)>, ConfigError> {
        match Self::locate(kind)? {
            Some(path) => {
                let config = load_config_from_path(&path, kind)?;
                Ok(Some((path, config)))
            }
            None => Ok(None),
        }
    }

    /// Loads a configuration file from an explicit path.
    ///
    /// The config kind is inferred from the file name.
    ///
    /// # Errors
    ///
    /// Returns `Err(ConfigError)` if:
    /// - The file cannot be read
    /// - The file cannot be parsed as TOML
    /// - The file name is not a recognized config file type
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let kind = infer_kind_from_path(path)?;
        load_config_from_path(path, kind)
    }

    /// Converts this config file into a project config, if applicable.
    pub fn into_project(self) -> Option<Config> {
        match self {
            ConfigFile::Project(config) => Some(config),
            ConfigFile::Credentials(_) => None,
        }
    }

    /// Converts this config file into a credentials config, if applicable.
    pub fn into_credentials(self) -> Option<CredentialsConfig> {
        match self {
            ConfigFile::Credentials(config) => Some(config),
            ConfigFile::Project(_) => None,
        }
    }
}

/// Project configuration from `graphwatch.toml`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Directory holding per-instance poll snapshots.
    ///
    /// Relative paths are resolved against the directory containing the
    /// config file. Defaults to `.graphwatch/state`.
    #[serde(default)]
    pub state_dir: Option<PathBuf>,

    /// Trigger instances to run.
    #[serde(default)]
    pub triggers: Vec<TriggerConfig>,
}

impl Config {
    /// Loads, parses and validates a project config file.
    ///
    /// # Errors
    ///
    /// Returns `Err(ConfigError)` if:
    /// - The file cannot be read (returns `NotFound` variant)
    /// - The file cannot be parsed as TOML
    /// - Two triggers share a name
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let contents =
            fs::read_to_string(path).map_err(|_e| ConfigError::NotFound(path.to_path_buf()))?;

        let config: Config = toml::from_str(&contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Loads project config using the unified resolution algorithm, returning
    /// the path it was found at.
    ///
    /// # Errors
    ///
    /// Returns `Err(ConfigError)` if a found config file cannot be read,
    /// parsed or validated.
    pub fn load_resolved() -> Result<Option<(PathBuf, Self)>, ConfigError> {
        Ok(ConfigFile::resolve(ConfigKind::Project)?
            .and_then(|(path, file)| file.into_project().map(|config| (path, config))))
    }

    /// Creates an empty config with no triggers.
    #[must_use]
    pub fn empty() -> Self {
        Self::default()
    }

    /// Returns an iterator over only the enabled triggers in the config.
    #[must_use = "iterator should be consumed to access enabled triggers"]
    pub fn enabled_triggers(&self) -> impl Iterator<Item = &TriggerConfig> {
        self.triggers.iter().filter(|t| t.enabled)
    }

    /// Resolves the state directory for a config loaded from `config_path`.
    pub fn state_dir(&self, config_path: &Path) -> PathBuf {
        let root_dir = config_path.parent().unwrap_or_else(|| Path::new("."));
        let state_dir = self
            .state_dir
            .clone()
            .unwrap_or_else(|| PathBuf::from(DEFAULT_STATE_DIR));
        if state_dir.is_absolute() {
            state_dir
        } else {
            root_dir.join(state_dir)
        }
    }

    fn validate(&self) -> Result<(), ConfigError> {
        let mut seen = HashSet::new();
        for trigger in &self.triggers {
            if trigger.name.trim().is_empty() {
                return Err(ConfigError::Project(
                    "trigger name must not be empty".to_string(),
                ));
            }
            if !seen.insert(trigger.name.as_str()) {
                return Err(ConfigError::Project(format!(
                    "duplicate trigger name: {}",
                    trigger.name
                )));
            }
        }
        Ok(())
    }
}

/// Configuration for a single trigger instance.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TriggerConfig {
    /// Unique instance name; poll state is keyed by it.
    pub name: String,

    /// Section of `credentials.toml` the trigger authenticates with.
    #[serde(default = "default_credential")]
    pub credential: String,

    /// Whether the trigger is enabled.
    ///
    /// Disabled triggers are defined in the config but never polled.
    #[serde(default = "default_enabled")]
    pub enabled: bool,

    /// Node options, passed through to the trigger as JSON.
    #[serde(default)]
    pub options: Map<String, JsonValue>,
}

fn default_enabled() -> bool {
    true
}

fn default_credential() -> String {
    "sharepoint".to_string()
}

/// Credentials configuration from `credentials.toml`.
///
/// Each top-level table is one credential, keyed by name:
///
/// ```toml
/// [sharepoint]
/// tenant_id = "..."
/// client_secret = "env:SHAREPOINT_CLIENT_SECRET"
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CredentialsConfig {
    /// Map of credential name -> credential fields.
    #[serde(flatten)]
    pub credentials: HashMap<String, HashMap<String, String>>,
}

impl CredentialsConfig {
    /// Loads credentials from an explicit path.
    ///
    /// # Errors
    ///
    /// Returns `Err(ConfigError)` if the file cannot be read or parsed.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let contents =
            fs::read_to_string(path).map_err(|_e| ConfigError::NotFound(path.to_path_buf()))?;
        Ok(toml::from_str(&contents)?)
    }

    /// Loads credentials from the default location using unified resolution.
    ///
    /// # Errors
    ///
    /// Returns `Err(ConfigError)` if a found file cannot be read or parsed.
    pub fn load_resolved() -> Result<Option<Self>, ConfigError> {
        match ConfigFile::resolve(ConfigKind::Credentials)? {
            Some((_, config)) => Ok(config.into_credentials()),
            None => Ok(None),
        }
    }

    /// Replaces every `env:VAR` value with the contents of `VAR`.
    ///
    /// # Errors
    ///
    /// Returns `Err(ConfigError::Credentials)` naming the first variable that
    /// is not set.
    pub fn resolve_env(self) -> Result<HashMap<String, HashMap<String, String>>, ConfigError> {
        self.credentials
            .into_iter()
            .map(|(name, values)| {
                let values = values
                    .into_iter()
                    .map(|(key, value)| Ok((key, resolve_env_value(&value)?)))
                    .collect::<Result<HashMap<_, _>, ConfigError>>()?;
                Ok((name, values))
            })
            .collect()
    }
}

/// Resolves an `env:VAR` indirection, returning other values unchanged.
///
/// # Errors
///
/// Returns `Err(ConfigError::Credentials)` if the variable is not set.
pub fn resolve_env_value(value: &str) -> Result<String, ConfigError> {
    if let Some(var_name) = value.strip_prefix("env:") {
        std::env::var(var_name).map_err(|_| {
            ConfigError::Credentials(format!("environment variable not found: {var_name}"))
        })
    } else {
        Ok(value.to_string())
    }
}

// ===== Resolution helpers =====

/// Gets environment variable override for a config kind.
fn env_override(kind: ConfigKind) -> Option<PathBuf> {
    let var = match kind {
        ConfigKind::Project => PROJECT_ENV_VAR,
        ConfigKind::Credentials => CREDENTIALS_ENV_VAR,
    };
    std::env::var(var).ok().map(PathBuf::from)
}

/// Gets the XDG config directory path for a config kind.
fn xdg_config_path(kind: ConfigKind) -> Option<PathBuf> {
    let config_dir = dirs::config_dir()?;
    let graphwatch_dir = config_dir.join("graphwatch");

    match kind {
        ConfigKind::Credentials => Some(graphwatch_dir.join(CREDENTIALS_FILE_NAME)),
        ConfigKind::Project => None, // Project config is not in XDG
    }
}

/// Loads a config from a specific path with the given kind.
fn load_config_from_path(path: &Path, kind: ConfigKind) -> Result<ConfigFile, ConfigError> {
    match kind {
        ConfigKind::Project => Config::load(path).map(ConfigFile::Project),
        ConfigKind::Credentials => CredentialsConfig::load(path).map(ConfigFile::Credentials),
    }
}

/// Infers the config kind from a file path.
fn infer_kind_from_path(path: &Path) -> Result<ConfigKind, ConfigError> {
    let file_name = path
        .file_name()
        .and_then(|n| n.to_str())
        .ok_or_else(|| ConfigError::NotFound(path.to_path_buf()))?;

    match file_name {
        PROJECT_FILE_NAME => Ok(ConfigKind::Project),
        CREDENTIALS_FILE_NAME => Ok(ConfigKind::Credentials),
        _ => Err(ConfigError::Project(format!(
            "Unknown config file type: {file_name}"
        ))),
    }
}
