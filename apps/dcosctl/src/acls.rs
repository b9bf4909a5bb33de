use anyhow::Result;
use reqwest::Method;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};

use crate::client::{escape_id, ArrayEnvelope, DcosClient};
use crate::config::BackupConfig;
use crate::constants::IAM_API;
use crate::utils::{read_buffer, write_json, write_raw};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AclSummary {
    pub rid: String,
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub description: String,
}

/// A granted action. `value` holds the action resource fetched during backup.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Action {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<Value>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserGrant {
    pub uid: String,
    #[serde(default)]
    pub actions: Vec<Action>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GroupGrant {
    pub gid: String,
    #[serde(default)]
    pub actions: Vec<Action>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, Default, Deserialize)]
struct Permissions {
    #[serde(default)]
    users: Vec<UserGrant>,
    #[serde(default)]
    groups: Vec<GroupGrant>,
}

/// An ACL with every user and group grant and the value of each granted action.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AclRecord {
    pub rid: String,
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub users: Vec<UserGrant>,
    #[serde(default)]
    pub groups: Vec<GroupGrant>,
}

fn acl_path(rid: &str) -> String {
    format!("{IAM_API}/acls/{}", escape_id(rid))
}

fn action_value(client: &DcosClient, path: &str, what: &str) -> Option<Value> {
    client.fetch(path, what).map(|fetched| fetched.json)
}

fn collect_acl(client: &DcosClient, acl: AclSummary) -> AclRecord {
    let mut record = AclRecord {
        rid: acl.rid,
        url: acl.url,
        description: acl.description,
        users: Vec::new(),
        groups: Vec::new(),
    };

    let base = acl_path(&record.rid);
    let Some(fetched) = client.fetch(&format!("{base}/permissions"), "ACL/Permission List")
    else {
        return record;
    };
    let permissions: Permissions = match fetched.parse() {
        Ok(permissions) => permissions,
        Err(err) => {
            tracing::error!(rid = %record.rid, error = %err, "ACL permissions are malformed");
            return record;
        }
    };

    for mut user in permissions.users {
        for action in &mut user.actions {
            let path = format!("{base}/users/{}/{}", escape_id(&user.uid), escape_id(&action.name));
            action.value = action_value(client, &path, "ACL/User/Action");
        }
        record.users.push(user);
    }
    for mut group in permissions.groups {
        for action in &mut group.actions {
            let path = format!("{base}/groups/{}/{}", escape_id(&group.gid), escape_id(&action.name));
            action.value = action_value(client, &path, "ACL/Group/Action");
        }
        record.groups.push(group);
    }
    record
}

/// Save the ACL list verbatim, then every ACL enriched with its permissions and action values.
pub fn get_acls(client: &DcosClient, config: &BackupConfig) -> Result<()> {
    let Some(fetched) = client.fetch(&format!("{IAM_API}/acls"), "ACLs") else {
        return Ok(());
    };
    write_raw(&config.acls_file, &fetched.body)?;

    let acls: ArrayEnvelope<AclSummary> = match fetched.parse() {
        Ok(acls) => acls,
        Err(err) => {
            tracing::error!(error = %err, "ACL list is malformed; permissions not saved");
            return Ok(());
        }
    };

    let records = acls
        .array
        .into_iter()
        .map(|acl| collect_acl(client, acl))
        .collect::<Vec<_>>();
    tracing::info!(count = records.len(), "GET ACLs: done");
    write_json(&config.acls_permissions_file, &ArrayEnvelope { array: records })
}

/// Recreate every saved ACL and re-grant each saved action.
pub fn post_acls(client: &DcosClient, config: &BackupConfig) -> Result<()> {
    let acls: ArrayEnvelope<AclRecord> = read_buffer(&config.acls_permissions_file, "ACLs")?;

    for (index, acl) in acls.array.iter().enumerate() {
        let base = acl_path(&acl.rid);
        let body = json!({ "description": acl.description });
        let what = format!("ACL {index} {}", acl.rid);
        if !client.apply(Method::PUT, &base, Some(&body), &what).is_present() {
            continue;
        }

        for user in &acl.users {
            for action in &user.actions {
                let path = format!("{base}/users/{}/{}", escape_id(&user.uid), escape_id(&action.name));
                let what = format!("ACL {} user {} action {}", acl.rid, user.uid, action.name);
                client.apply(Method::PUT, &path, None, &what);
            }
        }
        for group in &acl.groups {
            for action in &group.actions {
                let path = format!("{base}/groups/{}/{}", escape_id(&group.gid), escape_id(&action.name));
                let what = format!("ACL {} group {} action {}", acl.rid, group.gid, action.name);
                client.apply(Method::PUT, &path, None, &what);
            }
        }
    }
    tracing::info!(count = acls.array.len(), "PUT ACLs: done");
    Ok(())
}
