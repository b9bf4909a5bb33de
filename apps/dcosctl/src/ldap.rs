use anyhow::{bail, Result};
use reqwest::{Method, StatusCode};
use serde_json::{json, Value};

use crate::client::DcosClient;
use crate::config::BackupConfig;
use crate::constants::IAM_API;
use crate::utils::{read_buffer, write_raw};

fn ldap_config_path() -> String {
    format!("{IAM_API}/ldap/config")
}

pub fn get_ldap(client: &DcosClient, config: &BackupConfig) -> Result<()> {
    let response = match client.get(&ldap_config_path()) {
        Ok(response) => response,
        Err(err) => {
            tracing::error!(error = %format!("{err:#}"), "GET LDAP failed");
            return Ok(());
        }
    };
    // 404 is how the IAM API says no directory is configured.
    if response.status == StatusCode::NOT_FOUND {
        tracing::info!("no LDAP directory configured; nothing to save");
        return Ok(());
    }
    if !response.is_success() {
        tracing::error!(status = %response.status, body = %response.body.trim(), "GET LDAP failed");
        return Ok(());
    }
    if let Err(err) = response.json::<Value>() {
        tracing::error!(error = %format!("{err:#}"), "GET LDAP returned invalid JSON");
        return Ok(());
    }
    tracing::info!(status = %response.status, "GET LDAP");
    write_raw(&config.ldap_file, &response.body)
}

pub fn post_ldap(client: &DcosClient, config: &BackupConfig) -> Result<()> {
    let ldap: Value = read_buffer(&config.ldap_file, "LDAP")?;
    client.apply(Method::PUT, &ldap_config_path(), Some(&ldap), "LDAP");
    Ok(())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DirectoryEntry {
    User,
    Group,
}

impl DirectoryEntry {
    fn endpoint(self) -> &'static str {
        match self {
            Self::User => "importuser",
            Self::Group => "importgroup",
        }
    }

    fn body(self, name: &str) -> Value {
        match self {
            Self::User => json!({ "username": name }),
            Self::Group => json!({ "groupname": name }),
        }
    }

    fn as_str(self) -> &'static str {
        match self {
            Self::User => "User",
            Self::Group => "Group",
        }
    }
}

/// Import one user or group from the configured directory. A failing connection test is
/// logged but does not stop the import attempt.
pub fn import(client: &DcosClient, kind: DirectoryEntry, name: &str) -> Result<()> {
    let name = name.trim();
    if name.is_empty() {
        bail!("{} name to import must not be empty", kind.as_str());
    }
    tracing::info!(name, "importing LDAP {}", kind.as_str());

    client.apply(
        Method::POST,
        &format!("{}/test", ldap_config_path()),
        None,
        "TEST LDAP connection",
    );
    client.apply(
        Method::POST,
        &format!("{IAM_API}/ldap/{}", kind.endpoint()),
        Some(&kind.body(name)),
        &format!("IMPORT LDAP {} {name}", kind.as_str()),
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{test_config, MockApi};

    #[test]
    fn unconfigured_directory_writes_no_file() {
        let api = MockApi::new();
        api.respond("GET", "/acs/api/v1/ldap/config", 404, r#"{"code":"ERR_LDAP_CONFIG_NOT_AVAILABLE"}"#);
        let dir = tempfile::tempdir().unwrap();
        let config = test_config(dir.path(), &api.serve());

        get_ldap(&DcosClient::new(&config).unwrap(), &config).unwrap();
        assert!(!config.ldap_file.exists());
        assert_eq!(api.requests().len(), 1);
    }

    #[test]
    fn config_round_trips_to_target() {
        let ldap = json!({"host": "ldap.example", "port": 636, "enforce-starttls": true, "dntemplate": "uid=%(username)s,ou=users,dc=example"});
        let source = MockApi::new();
        source.respond_json("GET", "/acs/api/v1/ldap/config", 200, &ldap);
        let dir = tempfile::tempdir().unwrap();
        let config = test_config(dir.path(), &source.serve());
        get_ldap(&DcosClient::new(&config).unwrap(), &config).unwrap();

        let target = MockApi::new();
        target.respond("PUT", "/acs/api/v1/ldap/config", 200, "{}");
        let mut target_config = config.clone();
        target_config.dcos_ip = target.serve();
        post_ldap(&DcosClient::new(&target_config).unwrap(), &target_config).unwrap();

        let puts = target.requests_to("PUT", "/acs/api/v1/ldap/config");
        assert_eq!(puts.len(), 1);
        assert_eq!(puts[0].json(), ldap);
    }

    #[test]
    fn import_continues_after_failed_connection_test() {
        let api = MockApi::new();
        api.respond("POST", "/acs/api/v1/ldap/config/test", 400, "bad bind");
        api.respond("POST", "/acs/api/v1/ldap/importgroup", 201, "");
        let dir = tempfile::tempdir().unwrap();
        let config = test_config(dir.path(), &api.serve());

        import(&DcosClient::new(&config).unwrap(), DirectoryEntry::Group, "ops").unwrap();
        let imports = api.requests_to("POST", "/acs/api/v1/ldap/importgroup");
        assert_eq!(imports.len(), 1);
        assert_eq!(imports[0].json(), json!({"groupname": "ops"}));
    }

    #[test]
    fn empty_name_is_rejected_before_any_request() {
        let api = MockApi::new();
        let dir = tempfile::tempdir().unwrap();
        let config = test_config(dir.path(), &api.serve());
        assert!(import(&DcosClient::new(&config).unwrap(), DirectoryEntry::User, " ").is_err());
        assert!(api.requests().is_empty());
    }
}
