//! Runner configuration
//!
//! Engine knobs (pattern, forks, timeout, verbosity), inventory group,
//! privilege escalation and SSH argument strings. Loaded from a YAML file
//! resolved via `OPSBRIDGE_RUNNER_CONFIG` (default `runner.yaml`); a missing
//! or broken file degrades to defaults with a warning so the control plane
//! still comes up. The escalation password never touches the YAML file: it
//! lives in the OS keychain.

use std::env;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::engine::SshArgv;
use crate::inventory::DEFAULT_GROUP;

const CONFIG_PATH_ENV: &str = "OPSBRIDGE_RUNNER_CONFIG";
const DEFAULT_CONFIG_PATH: &str = "runner.yaml";
const KEYRING_SERVICE: &str = "opsbridge-runner";
const KEYRING_USER: &str = "become-password";

/// Configuration faults surfaced by save/credential operations
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("bad ssh argument string: {0}")]
    SshArgs(#[from] shell_words::ParseError),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("yaml error: {0}")]
    Yaml(#[from] serde_yaml::Error),
    #[error("keychain error: {0}")]
    Keychain(#[from] keyring::Error),
}

/// Privilege escalation settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EscalationConfig {
    pub enabled: bool,
    pub method: String,
    pub user: String,
    /// Keep the password in the OS keychain and load it on startup
    pub store_credentials: bool,
    #[serde(skip)]
    pub cached_password: Option<String>,
}

impl Default for EscalationConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            method: "sudo".to_string(),
            user: "root".to_string(),
            store_credentials: false,
            cached_password: None,
        }
    }
}

/// Raw SSH argument strings, split into argv lists on demand
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SshConfig {
    pub common_args: Option<String>,
    pub extra_args: Option<String>,
    pub sftp_extra_args: Option<String>,
    pub scp_extra_args: Option<String>,
}

impl SshConfig {
    /// Shell-split every configured argument string
    pub fn to_argv(&self) -> Result<SshArgv, ConfigError> {
        Ok(SshArgv {
            common: split_args(&self.common_args)?,
            extra: split_args(&self.extra_args)?,
            sftp: split_args(&self.sftp_extra_args)?,
            scp: split_args(&self.scp_extra_args)?,
        })
    }
}

fn split_args(raw: &Option<String>) -> Result<Vec<String>, ConfigError> {
    match raw {
        Some(raw) => Ok(shell_words::split(raw)?),
        None => Ok(Vec::new()),
    }
}

/// Runner configuration, one per control-plane process
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RunnerConfig {
    /// Host pattern for module runs
    pub pattern: String,
    /// Group name used when rendering inventories
    pub inventory_group: String,
    pub forks: Option<u32>,
    pub timeout_secs: Option<u64>,
    pub verbosity: u8,
    #[serde(rename = "become")]
    pub escalation: EscalationConfig,
    pub ssh: SshConfig,
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            pattern: "all".to_string(),
            inventory_group: DEFAULT_GROUP.to_string(),
            forks: None,
            timeout_secs: None,
            verbosity: 0,
            escalation: EscalationConfig::default(),
            ssh: SshConfig::default(),
        }
    }
}

impl RunnerConfig {
    /// Resolved config file location
    pub fn config_path() -> PathBuf {
        env::var(CONFIG_PATH_ENV)
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from(DEFAULT_CONFIG_PATH))
    }

    /// Load from the resolved path, degrading to defaults on any problem
    pub async fn load() -> Self {
        Self::load_from(&Self::config_path()).await
    }

    /// Load from an explicit path, degrading to defaults on any problem
    pub async fn load_from(path: &Path) -> Self {
        let mut config = match tokio::fs::read_to_string(path).await {
            Ok(raw) => match serde_yaml::from_str::<Self>(&raw) {
                Ok(config) => {
                    info!("runner config loaded from {}", path.display());
                    config
                }
                Err(e) => {
                    warn!(
                        "runner config at {} is invalid ({}), using defaults",
                        path.display(),
                        e
                    );
                    Self::default()
                }
            },
            Err(_) => {
                info!("no runner config at {}, using defaults", path.display());
                Self::default()
            }
        };
        if config.escalation.store_credentials && config.escalation.cached_password.is_none() {
            config.escalation.cached_password = Self::load_password().ok();
        }
        config
    }

    /// Persist the non-secret portion to the resolved path
    pub async fn save(&self) -> Result<(), ConfigError> {
        self.save_to(&Self::config_path()).await
    }

    /// Persist the non-secret portion to an explicit path
    pub async fn save_to(&self, path: &Path) -> Result<(), ConfigError> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await?;
            }
        }
        let raw = serde_yaml::to_string(self)?;
        tokio::fs::write(path, raw).await?;
        info!("runner config saved to {}", path.display());
        Ok(())
    }

    /// Read the escalation password from the OS keychain
    pub fn load_password() -> Result<String, ConfigError> {
        let entry = keyring::Entry::new(KEYRING_SERVICE, KEYRING_USER)?;
        Ok(entry.get_password()?)
    }

    /// Store the escalation password in the OS keychain
    pub fn save_password(password: &str) -> Result<(), ConfigError> {
        let entry = keyring::Entry::new(KEYRING_SERVICE, KEYRING_USER)?;
        entry.set_password(password)?;
        info!("escalation password stored in OS keychain");
        Ok(())
    }

    /// Remove the escalation password from the OS keychain
    pub fn delete_password() -> Result<(), ConfigError> {
        let entry = keyring::Entry::new(KEYRING_SERVICE, KEYRING_USER)?;
        entry.delete_credential()?;
        info!("escalation password removed from OS keychain");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = RunnerConfig::default();
        assert_eq!(config.pattern, "all");
        assert_eq!(config.inventory_group, "module");
        assert!(config.escalation.enabled);
        assert_eq!(config.escalation.method, "sudo");
        assert_eq!(config.escalation.user, "root");
        assert!(config.forks.is_none());
        assert_eq!(config.verbosity, 0);
    }

    #[test]
    fn test_partial_yaml_fills_defaults() {
        let config: RunnerConfig =
            serde_yaml::from_str("pattern: webservers\nforks: 10\n").unwrap();
        assert_eq!(config.pattern, "webservers");
        assert_eq!(config.forks, Some(10));
        assert_eq!(config.inventory_group, "module");
        assert!(config.escalation.enabled);
    }

    #[test]
    fn test_become_block_round_trips() {
        let yaml = "become:\n  enabled: false\n  user: admin\n";
        let config: RunnerConfig = serde_yaml::from_str(yaml).unwrap();
        assert!(!config.escalation.enabled);
        assert_eq!(config.escalation.user, "admin");
        assert_eq!(config.escalation.method, "sudo");
    }

    #[test]
    fn test_ssh_args_splitting() {
        let ssh = SshConfig {
            common_args: Some(
                "-o StrictHostKeyChecking=no -o 'ProxyCommand=ssh -W %h:%p jump'".to_string(),
            ),
            ..Default::default()
        };
        let argv = ssh.to_argv().unwrap();
        assert_eq!(argv.common.len(), 4);
        assert_eq!(argv.common[3], "ProxyCommand=ssh -W %h:%p jump");
        assert!(argv.extra.is_empty());
    }

    #[test]
    fn test_unbalanced_quote_is_an_error() {
        let ssh = SshConfig {
            extra_args: Some("-o 'broken".to_string()),
            ..Default::default()
        };
        assert!(matches!(ssh.to_argv(), Err(ConfigError::SshArgs(_))));
    }

    #[tokio::test]
    async fn test_missing_file_degrades_to_defaults() {
        let config = RunnerConfig::load_from(Path::new("/nonexistent/runner.yaml")).await;
        assert_eq!(config.pattern, "all");
    }

    #[tokio::test]
    async fn test_save_and_reload_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("runner.yaml");

        let mut config = RunnerConfig::default();
        config.pattern = "db-tier".to_string();
        config.verbosity = 2;
        config.escalation.cached_password = Some("never-on-disk".to_string());
        config.save_to(&path).await.unwrap();

        let raw = tokio::fs::read_to_string(&path).await.unwrap();
        assert!(!raw.contains("never-on-disk"));

        let reloaded = RunnerConfig::load_from(&path).await;
        assert_eq!(reloaded.pattern, "db-tier");
        assert_eq!(reloaded.verbosity, 2);
        assert!(reloaded.escalation.cached_password.is_none());
    }
}
