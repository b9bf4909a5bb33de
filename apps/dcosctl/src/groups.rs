use anyhow::Result;
use reqwest::Method;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::client::{escape_id, ArrayEnvelope, DcosClient};
use crate::config::BackupConfig;
use crate::constants::IAM_API;
use crate::utils::{read_buffer, write_json, write_raw};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GroupSummary {
    pub gid: String,
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub description: String,
}

/// A group with its member users and its permissions, both as returned by the IAM API.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GroupRecord {
    pub gid: String,
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub users: Vec<Value>,
    #[serde(default)]
    pub permissions: Vec<Value>,
}

fn group_path(gid: &str) -> String {
    format!("{IAM_API}/groups/{}", escape_id(gid))
}

fn fetch_array(client: &DcosClient, path: &str, what: &str) -> Option<Vec<Value>> {
    let fetched = client.fetch(path, what)?;
    match fetched.parse::<ArrayEnvelope<Value>>() {
        Ok(envelope) => Some(envelope.array),
        Err(err) => {
            tracing::error!(error = %err, "{what} is malformed");
            None
        }
    }
}

fn collect_group(client: &DcosClient, group: GroupSummary) -> GroupRecord {
    let base = group_path(&group.gid);
    let mut record = GroupRecord {
        gid: group.gid,
        url: group.url,
        description: group.description,
        users: Vec::new(),
        permissions: Vec::new(),
    };
    // Permissions are only worth asking for once the group itself answered.
    let Some(users) = fetch_array(client, &format!("{base}/users"), "Group Memberships") else {
        return record;
    };
    record.users = users;
    if let Some(permissions) =
        fetch_array(client, &format!("{base}/permissions"), "Group Permissions")
    {
        record.permissions = permissions;
    }
    record
}

pub fn get_groups(client: &DcosClient, config: &BackupConfig) -> Result<()> {
    let Some(fetched) = client.fetch(&format!("{IAM_API}/groups"), "Groups") else {
        return Ok(());
    };
    write_raw(&config.groups_file, &fetched.body)?;

    let groups: ArrayEnvelope<GroupSummary> = match fetched.parse() {
        Ok(groups) => groups,
        Err(err) => {
            tracing::error!(error = %err, "group list is malformed; memberships not saved");
            return Ok(());
        }
    };
    let records = groups
        .array
        .into_iter()
        .map(|group| collect_group(client, group))
        .collect::<Vec<_>>();
    tracing::info!(count = records.len(), "GET Groups: done");
    write_json(&config.groups_users_file, &ArrayEnvelope { array: records })
}

/// Recreate every saved group. Memberships are restored with the users, grants with the ACLs.
pub fn post_groups(client: &DcosClient, config: &BackupConfig) -> Result<()> {
    let groups: ArrayEnvelope<GroupRecord> = read_buffer(&config.groups_users_file, "Groups")?;
    for (index, group) in groups.array.iter().enumerate() {
        let body = json!({ "description": group.description });
        let what = format!("Group {index} {}", group.gid);
        client.apply(Method::PUT, &group_path(&group.gid), Some(&body), &what);
    }
    tracing::info!(count = groups.array.len(), "PUT Groups: done");
    Ok(())
}
