use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::constants::{
    CONFIG_PATH_ENV, DEFAULT_CONFIG_FILE, DEFAULT_POLL_INTERVAL_SECONDS,
    DEFAULT_REQUEST_TIMEOUT_SECONDS, EXHIBITOR_PORT, MESOS_MASTER_PORT,
};

pub fn default_config_path() -> PathBuf {
    if let Ok(path) = std::env::var(CONFIG_PATH_ENV) {
        let trimmed = path.trim();
        if !trimmed.is_empty() {
            return PathBuf::from(trimmed);
        }
    }
    std::env::current_dir()
        .map(|dir| dir.join(DEFAULT_CONFIG_FILE))
        .unwrap_or_else(|_| PathBuf::from(DEFAULT_CONFIG_FILE))
}

pub fn resolve_config_path(path: Option<PathBuf>) -> PathBuf {
    path.unwrap_or_else(default_config_path)
}

fn default_poll_interval_seconds() -> u64 {
    DEFAULT_POLL_INTERVAL_SECONDS
}

fn default_request_timeout_seconds() -> u64 {
    DEFAULT_REQUEST_TIMEOUT_SECONDS
}

fn default_exhibitor_port() -> u16 {
    EXHIBITOR_PORT
}

fn default_mesos_master_port() -> u16 {
    MESOS_MASTER_PORT
}

/// Cluster endpoint, credentials and the buffer file used for each resource kind.
///
/// Keys are upper-case in the file (`DCOS_IP`, `TOKEN`, `ACLS_FILE`, ...). Every path key is
/// required so a run never discovers a missing destination halfway through.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub struct BackupConfig {
    pub dcos_ip: String,
    pub token: String,
    pub acls_file: PathBuf,
    pub acls_permissions_file: PathBuf,
    pub groups_file: PathBuf,
    pub groups_users_file: PathBuf,
    pub users_file: PathBuf,
    pub users_groups_file: PathBuf,
    pub agents_file: PathBuf,
    pub jobs_file: PathBuf,
    pub ldap_file: PathBuf,
    pub service_groups_file: PathBuf,
    pub service_groups_mom_file: PathBuf,
    pub apps_file: PathBuf,
    pub apps_mom_file: PathBuf,
    #[serde(default)]
    pub default_user_password: Option<String>,
    #[serde(default = "default_poll_interval_seconds")]
    pub poll_interval_seconds: u64,
    #[serde(default = "default_request_timeout_seconds")]
    pub request_timeout_seconds: u64,
    #[serde(default = "default_exhibitor_port")]
    pub exhibitor_port: u16,
    #[serde(default = "default_mesos_master_port")]
    pub mesos_master_port: u16,
}

impl BackupConfig {
    /// Base URL of the cluster. `DCOS_IP` may carry its own scheme; plain hosts get `http://`.
    pub fn base_url(&self) -> String {
        let host = self.dcos_ip.trim().trim_end_matches('/');
        if host.contains("://") {
            host.to_string()
        } else {
            format!("http://{host}")
        }
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_seconds)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_seconds)
    }
}

pub fn load_config(path: &Path) -> Result<BackupConfig> {
    if !path.exists() {
        bail!(
            "Configuration not found at {}. Create it before running dcosctl.",
            path.display()
        );
    }
    let contents = fs::read_to_string(path)
        .with_context(|| format!("Failed to read config at {}", path.display()))?;
    let mut config: BackupConfig = serde_json::from_str(&contents)
        .with_context(|| format!("Failed to parse config at {}", path.display()))?;

    if config.dcos_ip.trim().is_empty() {
        bail!("DCOS_IP is empty in {}", path.display());
    }
    if config.token.trim().is_empty() {
        bail!("TOKEN is empty in {}", path.display());
    }
    // A zero interval would turn the health wait into a busy loop against the API.
    if config.poll_interval_seconds == 0 {
        config.poll_interval_seconds = default_poll_interval_seconds();
    }
    if config.request_timeout_seconds == 0 {
        config.request_timeout_seconds = default_request_timeout_seconds();
    }
    if let Some(password) = &config.default_user_password {
        if password.trim().is_empty() {
            config.default_user_password = None;
        }
    }
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn full_config() -> serde_json::Value {
        json!({
            "DCOS_IP": "10.0.0.5",
            "TOKEN": "abc",
            "ACLS_FILE": "acls.json",
            "ACLS_PERMISSIONS_FILE": "acls_permissions.json",
            "GROUPS_FILE": "groups.json",
            "GROUPS_USERS_FILE": "groups_users.json",
            "USERS_FILE": "users.json",
            "USERS_GROUPS_FILE": "users_groups.json",
            "AGENTS_FILE": "agents.json",
            "JOBS_FILE": "jobs.json",
            "LDAP_FILE": "ldap.json",
            "SERVICE_GROUPS_FILE": "service_groups.json",
            "SERVICE_GROUPS_MOM_FILE": "service_groups_mom.json",
            "APPS_FILE": "apps.json",
            "APPS_MOM_FILE": "apps_mom.json"
        })
    }

    fn write(dir: &Path, value: &serde_json::Value) -> PathBuf {
        let path = dir.join(".config.json");
        fs::write(&path, value.to_string()).unwrap();
        path
    }

    #[test]
    fn loads_complete_config_with_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = write(dir.path(), &full_config());

        let config = load_config(&path).unwrap();
        assert_eq!(config.dcos_ip, "10.0.0.5");
        assert_eq!(config.acls_file, PathBuf::from("acls.json"));
        assert_eq!(config.poll_interval_seconds, DEFAULT_POLL_INTERVAL_SECONDS);
        assert_eq!(config.exhibitor_port, EXHIBITOR_PORT);
        assert_eq!(config.mesos_master_port, MESOS_MASTER_PORT);
        assert_eq!(config.default_user_password, None);
        assert_eq!(config.base_url(), "http://10.0.0.5");
    }

    #[test]
    fn missing_required_key_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let mut value = full_config();
        value.as_object_mut().unwrap().remove("JOBS_FILE");
        let path = write(dir.path(), &value);

        let err = load_config(&path).unwrap_err();
        let message = format!("{err:#}");
        assert!(message.contains("JOBS_FILE"), "unexpected error: {message}");
    }

    #[test]
    fn missing_file_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        assert!(load_config(&dir.path().join("nope.json")).is_err());
    }

    #[test]
    fn empty_token_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let mut value = full_config();
        value["TOKEN"] = json!("  ");
        let path = write(dir.path(), &value);
        assert!(load_config(&path).is_err());
    }

    #[test]
    fn zero_intervals_fall_back_to_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let mut value = full_config();
        value["POLL_INTERVAL_SECONDS"] = json!(0);
        value["REQUEST_TIMEOUT_SECONDS"] = json!(0);
        value["EXHIBITOR_PORT"] = json!(18181);
        let path = write(dir.path(), &value);

        let config = load_config(&path).unwrap();
        assert_eq!(config.poll_interval_seconds, DEFAULT_POLL_INTERVAL_SECONDS);
        assert_eq!(config.request_timeout_seconds, DEFAULT_REQUEST_TIMEOUT_SECONDS);
        assert_eq!(config.exhibitor_port, 18181);
    }

    #[test]
    fn base_url_keeps_explicit_scheme() {
        let dir = tempfile::tempdir().unwrap();
        let mut value = full_config();
        value["DCOS_IP"] = json!("https://master.example/");
        value["DEFAULT_USER_PASSWORD"] = json!("");
        let path = write(dir.path(), &value);

        let config = load_config(&path).unwrap();
        assert_eq!(config.base_url(), "https://master.example");
        assert_eq!(config.default_user_password, None);
    }
}
