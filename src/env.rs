//! Environment constants and path utilities for vault task sync.
//!
//! This module centralizes the hardcoded directory, file and variable names
//! used throughout the application.

use std::path::{Path, PathBuf};

/// Application directory name (hidden directory like .git, .obsidian)
pub const VTS_DIR_NAME: &str = ".vts";

/// Configuration file name inside a `.vts` directory
pub const CONFIG_FILE_NAME: &str = "config.toml";

/// Stand-alone configuration file name in the working directory
pub const LOCAL_CONFIG_FILE_NAME: &str = "vts.toml";

/// System-wide configuration file
pub const SYSTEM_CONFIG_FILE_PATH: &str = "/etc/vts/config.toml";

/// Persisted sync state file name
pub const STATE_FILE_NAME: &str = "state.json";

/// Default directory for rendered outbound messages
pub const OUTBOX_DIR_NAME: &str = "outbox";

/// Extension of files the vault enumerates
pub const MARKDOWN_EXTENSION: &str = "md";

/// Environment variables consulted on top of the configuration file
pub mod vars {
    pub const API_KEY: &str = "VTS_API_KEY";
    pub const WORKSPACE_ID: &str = "VTS_WORKSPACE_ID";
    pub const HOME: &str = "HOME";
}

/// Default `tracing` filter directive for the binary
pub const DEFAULT_LOG_FILTER: &str = "vault_task_sync=info,vts=info";

/// Build the `.vts` directory path from a vault root
pub fn vts_dir_path(vault_root: &Path) -> PathBuf {
    vault_root.join(VTS_DIR_NAME)
}

/// Build the sync state file path from a vault root
pub fn state_file_path(vault_root: &Path) -> PathBuf {
    vts_dir_path(vault_root).join(STATE_FILE_NAME)
}

/// Build the default outbox directory path from a vault root
pub fn outbox_dir_path(vault_root: &Path) -> PathBuf {
    vts_dir_path(vault_root).join(OUTBOX_DIR_NAME)
}

/// Build config directory path in user's home directory
pub fn user_config_dir_path(home_dir: &Path) -> PathBuf {
    home_dir.join(VTS_DIR_NAME)
}

/// Build config file path in user's home directory
pub fn user_config_file_path(home_dir: &Path) -> PathBuf {
    user_config_dir_path(home_dir).join(CONFIG_FILE_NAME)
}

/// Build local config file path in current directory
pub fn local_config_file_path(current_dir: &Path) -> PathBuf {
    current_dir.join(VTS_DIR_NAME).join(CONFIG_FILE_NAME)
}

/// Build the stand-alone `vts.toml` path in current directory
pub fn local_toml_file_path(current_dir: &Path) -> PathBuf {
    current_dir.join(LOCAL_CONFIG_FILE_NAME)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_path_construction() {
        let vault = Path::new("/test/vault");

        assert_eq!(vts_dir_path(vault), Path::new("/test/vault/.vts"));
        assert_eq!(
            state_file_path(vault),
            Path::new("/test/vault/.vts/state.json")
        );
        assert_eq!(
            outbox_dir_path(vault),
            Path::new("/test/vault/.vts/outbox")
        );
    }

    #[test]
    fn test_config_paths() {
        let home = Path::new("/home/user");
        let current = Path::new("/current/dir");

        assert_eq!(
            user_config_file_path(home),
            Path::new("/home/user/.vts/config.toml")
        );
        assert_eq!(
            local_config_file_path(current),
            Path::new("/current/dir/.vts/config.toml")
        );
        assert_eq!(
            local_toml_file_path(current),
            Path::new("/current/dir/vts.toml")
        );
    }
}
