use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::env;
use std::path::{Path, PathBuf};

/// Environment variable that overrides the storage key.
pub const STORAGE_KEY_ENV: &str = "STRATA_STORAGE_KEY";

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StrataConfig {
    #[serde(default)]
    pub storage: StorageConfig,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Key the serialized history is stored under.
    #[serde(default = "default_storage_key")]
    pub key: String,
    /// Directory of the file store, relative to the project root.
    #[serde(default = "default_storage_dir")]
    pub dir: PathBuf,
    #[serde(default = "default_lock_timeout_ms")]
    pub lock_timeout_ms: u64,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            key: default_storage_key(),
            dir: default_storage_dir(),
            lock_timeout_ms: default_lock_timeout_ms(),
        }
    }
}

/// User-level overrides. Every field is optional and only replaces the
/// project value when set.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserConfig {
    #[serde(default)]
    pub storage_key: Option<String>,
    #[serde(default)]
    pub lock_timeout_ms: Option<u64>,
}

/// Read `.strata/config.toml` under `project_root`, or defaults if absent.
///
/// # Errors
///
/// Returns an error if the file exists but cannot be read or parsed.
pub fn load_project_config(project_root: &Path) -> Result<StrataConfig> {
    let path = project_root.join(".strata/config.toml");
    if !path.exists() {
        return Ok(StrataConfig::default());
    }

    let content = std::fs::read_to_string(&path)
        .with_context(|| format!("Failed to read {}", path.display()))?;

    toml::from_str::<StrataConfig>(&content)
        .with_context(|| format!("Failed to parse {}", path.display()))
}

/// # Errors
///
/// Returns an error if the user config exists but cannot be read or parsed.
pub fn load_user_config() -> Result<UserConfig> {
    let Some(config_dir) = dirs::config_dir() else {
        return Ok(UserConfig::default());
    };
    load_user_config_from(&config_dir.join("strata/config.toml"))
}

fn load_user_config_from(path: &Path) -> Result<UserConfig> {
    if !path.exists() {
        return Ok(UserConfig::default());
    }

    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;

    toml::from_str::<UserConfig>(&content)
        .with_context(|| format!("Failed to parse {}", path.display()))
}

/// Project config, then user overrides, then the environment.
///
/// # Errors
///
/// Propagates read and parse failures from either config file.
pub fn resolve_config(project_root: &Path) -> Result<StrataConfig> {
    let project = load_project_config(project_root)?;
    let user = load_user_config()?;
    Ok(apply_overrides(
        project,
        &user,
        env::var(STORAGE_KEY_ENV).ok(),
    ))
}

fn apply_overrides(
    mut config: StrataConfig,
    user: &UserConfig,
    env_key: Option<String>,
) -> StrataConfig {
    if let Some(key) = &user.storage_key {
        config.storage.key.clone_from(key);
    }
    if let Some(timeout) = user.lock_timeout_ms {
        config.storage.lock_timeout_ms = timeout;
    }
    if let Some(key) = env_key.filter(|k| !k.trim().is_empty()) {
        config.storage.key = key;
    }
    config
}

fn default_storage_key() -> String {
    "strata.history".to_string()
}

fn default_storage_dir() -> PathBuf {
    PathBuf::from(".strata/store")
}

const fn default_lock_timeout_ms() -> u64 {
    1_000
}
