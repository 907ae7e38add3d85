//! Configuration discovery and loading
//!
//! This module handles the configuration discovery hierarchy:
//! 1. Current directory: ./vts.toml or ./.vts/config.toml
//! 2. User config: ~/.vts/config.toml
//! 3. System config: /etc/vts/config.toml
//! 4. Built-in defaults
//!
//! Scheduler credentials may also come from `VTS_API_KEY` and
//! `VTS_WORKSPACE_ID`, which take precedence over file values.

use crate::{
    compose::EmailConfig, env, remote::SchedulerConfig, sync::SyncConfig, vault::VaultConfig,
};
use serde::{Deserialize, Serialize};
use std::env as std_env;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, info, warn};

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to access {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid configuration in {path:?}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("Failed to serialize configuration: {0}")]
    Serialize(#[from] toml::ser::Error),

    #[error("Could not determine home directory")]
    NoHomeDir,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub vault: VaultConfig,
    #[serde(default)]
    pub scheduler: SchedulerConfig,
    #[serde(default)]
    pub sync: SyncConfig,
    #[serde(default)]
    pub email: EmailConfig,
}

impl AppConfig {
    /// Load from TOML file
    pub fn from_toml_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        toml::from_str(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Save to TOML file
    pub fn to_toml_file<P: AsRef<Path>>(&self, path: P) -> Result<(), ConfigError> {
        let path = path.as_ref();
        let content = toml::to_string_pretty(self)?;
        fs::write(path, content).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Apply `VTS_*` overrides from the process environment.
    pub fn apply_env_overrides(&mut self) {
        self.apply_overrides_from(|name| std_env::var(name).ok());
    }

    /// Apply overrides using `lookup` to resolve variable names.
    ///
    /// Empty values are ignored.
    pub fn apply_overrides_from<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let value = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

        if let Some(api_key) = value(env::vars::API_KEY) {
            debug!("Using scheduler API key from {}", env::vars::API_KEY);
            self.scheduler.api_key = api_key;
        }
        if let Some(workspace_id) = value(env::vars::WORKSPACE_ID) {
            debug!("Using workspace id from {}", env::vars::WORKSPACE_ID);
            self.scheduler.workspace_id = workspace_id;
        }
    }

    /// Resolve the vault root: explicit override, then config, then the
    /// current directory.
    pub fn vault_root(&self, override_root: Option<&Path>) -> PathBuf {
        override_root
            .map(Path::to_path_buf)
            .or_else(|| self.vault.root.clone())
            .unwrap_or_else(|| std_env::current_dir().unwrap_or_else(|_| PathBuf::from(".")))
    }

    /// Outbox directory for rendered messages, defaulting under the vault's
    /// `.vts` directory.
    pub fn outbox_dir(&self, vault_root: &Path) -> PathBuf {
        self.email
            .outbox_dir
            .clone()
            .unwrap_or_else(|| env::outbox_dir_path(vault_root))
    }
}

/// Configuration discovery system
pub struct ConfigDiscovery;

impl ConfigDiscovery {
    /// Load `explicit` if given, otherwise the first file of the discovery
    /// hierarchy, otherwise defaults. Environment overrides are applied last.
    pub fn discover_config(explicit: Option<&Path>) -> Result<AppConfig, ConfigError> {
        let mut config = match explicit {
            Some(path) => {
                info!("Loading configuration override from: {:?}", path);
                AppConfig::from_toml_file(path)?
            }
            None => match Self::find_config_file() {
                Some(config_path) => {
                    info!("Loading configuration from: {:?}", config_path);
                    AppConfig::from_toml_file(config_path)?
                }
                None => {
                    info!("No configuration file found, using defaults");
                    AppConfig::default()
                }
            },
        };

        config.apply_env_overrides();
        Ok(config)
    }

    /// Find configuration file using discovery hierarchy
    pub fn find_config_file() -> Option<PathBuf> {
        Self::get_config_candidates()
            .into_iter()
            .inspect(|candidate| debug!("Checking for config file: {:?}", candidate))
            .find(|candidate| candidate.is_file())
    }

    /// Get list of configuration file candidates in priority order
    fn get_config_candidates() -> Vec<PathBuf> {
        let mut candidates = Vec::new();

        if let Ok(current_dir) = std_env::current_dir() {
            candidates.push(env::local_toml_file_path(&current_dir));
            candidates.push(env::local_config_file_path(&current_dir));
        }

        if let Some(home_dir) = Self::get_home_dir() {
            candidates.push(env::user_config_file_path(&home_dir));
        }

        #[cfg(unix)]
        candidates.push(PathBuf::from(env::SYSTEM_CONFIG_FILE_PATH));

        #[cfg(windows)]
        if let Ok(program_data) = std_env::var("PROGRAMDATA") {
            candidates.push(
                PathBuf::from(program_data)
                    .join("vts")
                    .join(env::CONFIG_FILE_NAME),
            );
        }

        candidates
    }

    fn get_home_dir() -> Option<PathBuf> {
        std_env::var(env::vars::HOME)
            .ok()
            .or_else(|| std_env::var("USERPROFILE").ok())
            .map(PathBuf::from)
    }

    /// Create a default config file in the user's home directory
    pub fn create_default_user_config() -> Result<PathBuf, ConfigError> {
        let home_dir = Self::get_home_dir().ok_or(ConfigError::NoHomeDir)?;

        let config_dir = env::user_config_dir_path(&home_dir);
        let config_path = env::user_config_file_path(&home_dir);

        if !config_dir.exists() {
            fs::create_dir_all(&config_dir).map_err(|source| ConfigError::Io {
                path: config_dir.clone(),
                source,
            })?;
            info!("Created configuration directory: {:?}", config_dir);
        }

        if !config_path.exists() {
            AppConfig::default().to_toml_file(&config_path)?;
            info!("Created default configuration file: {:?}", config_path);
        } else {
            warn!("Configuration file already exists: {:?}", config_path);
        }

        Ok(config_path)
    }

    /// Show configuration discovery information for debugging
    pub fn show_discovery_info() {
        println!("Configuration Discovery Hierarchy:");
        println!();

        for (i, candidate) in Self::get_config_candidates().iter().enumerate() {
            let status = if candidate.exists() {
                if candidate.is_file() {
                    "✓ EXISTS"
                } else {
                    "✗ NOT A FILE"
                }
            } else {
                "✗ NOT FOUND"
            };

            println!("  {}. {:?} - {}", i + 1, candidate, status);
        }

        println!();
        match Self::find_config_file() {
            Some(found) => println!("Active configuration: {:?}", found),
            None => println!("Active configuration: Built-in defaults"),
        }

        for name in [env::vars::API_KEY, env::vars::WORKSPACE_ID] {
            let state = match std_env::var(name) {
                Ok(value) if !value.trim().is_empty() => "set",
                _ => "not set",
            };
            println!("  ${} - {}", name, state);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sync::{ConflictStrategy, SyncDirection};
    use tempfile::TempDir;

    #[test]
    fn test_partial_toml_uses_defaults() {
        let config: AppConfig = toml::from_str(
            r##"
[vault]
root = "/notes"
global_task_filter = "#task"

[sync]
conflict_strategy = "vault_wins"
direction = "to_remote"
"##,
        )
        .unwrap();

        assert_eq!(config.vault.root, Some(PathBuf::from("/notes")));
        assert_eq!(config.vault.filter.global_task_filter, "#task");
        assert_eq!(config.vault.task_file_patterns, vec!["**/*.md"]);
        assert_eq!(config.vault.inbox_file, "Tasks.md");
        assert_eq!(config.sync.conflict_strategy, ConflictStrategy::VaultWins);
        assert_eq!(config.sync.direction, SyncDirection::ToRemote);
        assert_eq!(config.sync.debounce_ms, 500);
        assert_eq!(config.scheduler.timeout_secs, 30);
        assert_eq!(
            config.sync.priority_to_remote.translate("A").as_deref(),
            Some("HIGH")
        );
    }

    #[test]
    fn test_config_file_operations() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("vts.toml");

        let mut original = AppConfig::default();
        original.email.to = "inbox@scheduler.example".to_string();
        original.scheduler.workspace_id = "ws-1".to_string();
        original.to_toml_file(&config_path).unwrap();

        let loaded = AppConfig::from_toml_file(&config_path).unwrap();
        assert_eq!(loaded, original);
    }

    #[test]
    fn test_invalid_toml_reports_path() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("broken.toml");
        fs::write(&config_path, "[sync]\nconflict_strategy = \"sometimes\"\n").unwrap();

        let err = AppConfig::from_toml_file(&config_path).unwrap_err();
        assert!(matches!(err, ConfigError::Parse { ref path, .. } if *path == config_path));
    }

    #[test]
    fn test_overrides_replace_credentials() {
        let mut config = AppConfig::default();
        config.scheduler.api_key = "from-file".to_string();
        config.scheduler.workspace_id = "ws-file".to_string();

        config.apply_overrides_from(|name| match name {
            "VTS_API_KEY" => Some("from-env".to_string()),
            "VTS_WORKSPACE_ID" => Some("  ".to_string()),
            _ => None,
        });

        assert_eq!(config.scheduler.api_key, "from-env");
        assert_eq!(config.scheduler.workspace_id, "ws-file");
    }

    #[test]
    fn test_vault_root_and_outbox_resolution() {
        let mut config = AppConfig::default();
        config.vault.root = Some(PathBuf::from("/notes"));

        assert_eq!(config.vault_root(None), PathBuf::from("/notes"));
        assert_eq!(
            config.vault_root(Some(Path::new("/other"))),
            PathBuf::from("/other")
        );
        assert_eq!(
            config.outbox_dir(Path::new("/notes")),
            PathBuf::from("/notes/.vts/outbox")
        );
    }

    #[test]
    fn test_config_candidates() {
        let candidates = ConfigDiscovery::get_config_candidates();

        assert!(!candidates.is_empty());
        assert!(candidates[0].file_name().unwrap() == "vts.toml");
    }
}
