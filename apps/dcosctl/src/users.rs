use anyhow::Result;
use reqwest::Method;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::client::{escape_id, ArrayEnvelope, DcosClient};
use crate::config::BackupConfig;
use crate::constants::IAM_API;
use crate::utils::{read_buffer, write_json, write_raw};

/// Older clusters omit the remote/service flags; both default to `false`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserSummary {
    pub uid: String,
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub is_remote: bool,
    #[serde(default)]
    pub is_service: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GroupRef {
    pub gid: String,
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub description: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Membership {
    #[serde(default)]
    pub membershipurl: String,
    pub group: GroupRef,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserRecord {
    pub uid: String,
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub is_remote: bool,
    #[serde(default)]
    pub is_service: bool,
    #[serde(default)]
    pub groups: Vec<Membership>,
}

fn user_path(uid: &str) -> String {
    format!("{IAM_API}/users/{}", escape_id(uid))
}

fn memberships(client: &DcosClient, uid: &str) -> Vec<Membership> {
    let path = format!("{}/groups", user_path(uid));
    let Some(fetched) = client.fetch(&path, &format!("User Groups {uid}")) else {
        return Vec::new();
    };
    match fetched.parse::<ArrayEnvelope<Membership>>() {
        Ok(envelope) => envelope.array,
        Err(err) => {
            tracing::error!(uid, error = %err, "user memberships are malformed");
            Vec::new()
        }
    }
}

fn collect_user(client: &DcosClient, user: UserSummary) -> UserRecord {
    // Remote users' memberships live in the directory, not in the cluster.
    let groups = if user.is_remote {
        Vec::new()
    } else {
        memberships(client, &user.uid)
    };
    UserRecord {
        uid: user.uid,
        url: user.url,
        description: user.description,
        is_remote: user.is_remote,
        is_service: user.is_service,
        groups,
    }
}

pub fn get_users(client: &DcosClient, config: &BackupConfig) -> Result<()> {
    let Some(fetched) = client.fetch(&format!("{IAM_API}/users"), "Users") else {
        return Ok(());
    };
    write_raw(&config.users_file, &fetched.body)?;

    let users: ArrayEnvelope<UserSummary> = match fetched.parse() {
        Ok(users) => users,
        Err(err) => {
            tracing::error!(error = %err, "user list is malformed; memberships not saved");
            return Ok(());
        }
    };
    let records = users
        .array
        .into_iter()
        .map(|user| collect_user(client, user))
        .collect::<Vec<_>>();
    tracing::info!(count = records.len(), "GET Users: done");
    write_json(&config.users_groups_file, &ArrayEnvelope { array: records })
}

fn creation_body(user: &UserRecord, default_password: Option<&str>) -> Option<Value> {
    if user.is_service {
        return None;
    }
    if user.is_remote {
        return Some(json!({ "description": user.description }));
    }
    default_password.map(|password| {
        json!({
            "description": user.description,
            "password": password,
        })
    })
}

/// Recreate saved users and their group memberships.
///
/// Local users get `DEFAULT_USER_PASSWORD` since passwords are never exported. Service accounts
/// are skipped: their private keys cannot be recovered from the cluster.
pub fn post_users(client: &DcosClient, config: &BackupConfig) -> Result<()> {
    let users: ArrayEnvelope<UserRecord> = read_buffer(&config.users_groups_file, "Users")?;
    let default_password = config.default_user_password.as_deref();

    for (index, user) in users.array.iter().enumerate() {
        let Some(body) = creation_body(user, default_password) else {
            tracing::warn!(
                uid = %user.uid,
                service = user.is_service,
                "skipping user: no credentials to recreate it with"
            );
            continue;
        };
        let what = format!("User {index} {}", user.uid);
        if !client
            .apply(Method::PUT, &user_path(&user.uid), Some(&body), &what)
            .is_present()
        {
            continue;
        }

        for membership in &user.groups {
            let path = format!(
                "{IAM_API}/groups/{}/users/{}",
                escape_id(&membership.group.gid),
                escape_id(&user.uid)
            );
            let what = format!("Membership {} in {}", user.uid, membership.group.gid);
            client.apply(Method::PUT, &path, None, &what);
        }
    }
    tracing::info!(count = users.array.len(), "PUT Users: done");
    Ok(())
}
