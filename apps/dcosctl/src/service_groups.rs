use anyhow::Result;
use reqwest::Method;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::path::Path;

use crate::client::DcosClient;
use crate::config::BackupConfig;
use crate::constants::{MARATHON_API, MOM_PACKAGE_NAME, SERVICE_NAME_LABEL};
use crate::health::{is_package, label, wait_for_mom_instances};
use crate::tree::{print_leaves, strip_app, strip_group, GroupNode};
use crate::utils::{read_buffer, write_json, write_raw};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AppList {
    #[serde(default)]
    pub apps: Vec<Value>,
}

/// A Marathon-on-Marathon instance: its own app definition on the root Marathon plus the group
/// tree it serves.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MomGroupEntry {
    #[serde(rename = "DCOS_SERVICE_NAME")]
    pub service_name: String,
    pub app: Value,
    pub groups: GroupNode,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MomAppEntry {
    #[serde(rename = "DCOS_SERVICE_NAME")]
    pub service_name: String,
    pub app: Value,
    pub apps: AppList,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MomGroups {
    #[serde(default)]
    pub mom_groups: Vec<MomGroupEntry>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MomApps {
    #[serde(default)]
    pub mom_apps: Vec<MomAppEntry>,
}

/// API root of a MoM instance, proxied by the cluster under `/service/<name>`.
fn mom_api(service_name: &str) -> String {
    format!("/service/{service_name}/v2")
}

fn fetch_parsed<T: DeserializeOwned>(client: &DcosClient, path: &str, what: &str) -> Option<T> {
    let fetched = client.fetch(path, what)?;
    match fetched.parse() {
        Ok(value) => Some(value),
        Err(err) => {
            tracing::error!(error = %err, "{what} is malformed");
            None
        }
    }
}

fn collect_moms(client: &DcosClient, apps: &AppList) -> (MomGroups, MomApps) {
    let mut groups = MomGroups::default();
    let mut mom_apps = MomApps::default();

    for mom in apps.apps.iter().filter(|app| is_package(app, MOM_PACKAGE_NAME)) {
        let Some(name) = label(mom, SERVICE_NAME_LABEL) else {
            tracing::warn!(app = ?mom.get("id"), "MoM instance has no service name label");
            continue;
        };
        let api = mom_api(name);
        if let Some(tree) = fetch_parsed::<GroupNode>(
            client,
            &format!("{api}/groups"),
            &format!("MoM Service Groups {name}"),
        ) {
            groups.mom_groups.push(MomGroupEntry {
                service_name: name.to_string(),
                app: mom.clone(),
                groups: tree,
            });
        }
        if let Some(list) =
            fetch_parsed::<AppList>(client, &format!("{api}/apps"), &format!("MoM Apps {name}"))
        {
            mom_apps.mom_apps.push(MomAppEntry {
                service_name: name.to_string(),
                app: mom.clone(),
                apps: list,
            });
        }
    }
    (groups, mom_apps)
}

/// Save the root group tree, every app, and the trees and apps of each MoM instance.
pub fn get_service_groups(client: &DcosClient, config: &BackupConfig) -> Result<()> {
    if let Some(fetched) = client.fetch(&format!("{MARATHON_API}/groups"), "Service Groups") {
        write_raw(&config.service_groups_file, &fetched.body)?;
        match fetched.parse::<GroupNode>() {
            Ok(root) => {
                print_leaves(&root, "Service Group");
            }
            Err(err) => tracing::error!(error = %err, "service group tree is malformed"),
        }
    }

    let Some(fetched) = client.fetch(&format!("{MARATHON_API}/apps"), "Apps") else {
        return Ok(());
    };
    write_raw(&config.apps_file, &fetched.body)?;
    let apps: AppList = match fetched.parse() {
        Ok(apps) => apps,
        Err(err) => {
            tracing::error!(error = %err, "app list is malformed; MoM instances not saved");
            return Ok(());
        }
    };

    let (mom_groups, mom_apps) = collect_moms(client, &apps);
    write_json(&config.service_groups_mom_file, &mom_groups)?;
    write_json(&config.apps_mom_file, &mom_apps)?;

    for entry in &mom_groups.mom_groups {
        print_leaves(
            &entry.groups,
            &format!("Service Group {}", entry.service_name),
        );
    }
    tracing::info!(
        mom_instances = mom_groups.mom_groups.len(),
        "GET Service Groups: done"
    );
    Ok(())
}

fn post_groups(client: &DcosClient, api_root: &str, groups: &[GroupNode], what: &str) {
    let path = format!("{api_root}/groups");
    for (index, group) in groups.iter().enumerate() {
        let mut group = group.clone();
        strip_group(&mut group);
        let body = match serde_json::to_value(&group) {
            Ok(body) => body,
            Err(err) => {
                tracing::error!(id = %group.id, error = %err, "cannot encode {what}");
                continue;
            }
        };
        client.apply(Method::POST, &path, Some(&body), &format!("{what} {index} {}", group.id));
    }
}

fn post_apps(client: &DcosClient, api_root: &str, apps: &[Value], what: &str) {
    let path = format!("{api_root}/apps");
    for (index, app) in apps.iter().enumerate() {
        let mut app = app.clone();
        strip_app(&mut app);
        let id = app.get("id").and_then(Value::as_str).unwrap_or("?").to_string();
        client.apply(Method::POST, &path, Some(&app), &format!("{what} {index} {id}"));
    }
}

fn read_optional<T: DeserializeOwned>(path: &Path, what: &str) -> Result<Option<T>> {
    if !path.is_file() {
        tracing::warn!(path = %path.display(), "no {what} saved; skipping");
        return Ok(None);
    }
    read_buffer(path, what).map(Some)
}

/// A MoM instance to bring back, merged from the root app list and both MoM buffers. Either
/// buffer may lack an instance when its fetch failed during backup.
#[derive(Debug, Default)]
struct MomInstance<'a> {
    service_name: &'a str,
    /// Created by the root app restore already.
    in_app_list: bool,
    app: Option<&'a Value>,
    groups: Option<&'a GroupNode>,
    apps: Option<&'a AppList>,
}

fn instance_named<'a, 'b>(
    instances: &'b mut Vec<MomInstance<'a>>,
    service_name: &'a str,
) -> &'b mut MomInstance<'a> {
    let position = match instances
        .iter()
        .position(|instance| instance.service_name == service_name)
    {
        Some(position) => position,
        None => {
            instances.push(MomInstance {
                service_name,
                ..MomInstance::default()
            });
            instances.len() - 1
        }
    };
    &mut instances[position]
}

fn mom_instances<'a>(
    apps: &'a AppList,
    mom_groups: &'a MomGroups,
    mom_apps: &'a MomApps,
) -> Vec<MomInstance<'a>> {
    let mut instances = Vec::new();
    for app in apps.apps.iter().filter(|app| is_package(app, MOM_PACKAGE_NAME)) {
        if let Some(name) = label(app, SERVICE_NAME_LABEL) {
            instance_named(&mut instances, name).in_app_list = true;
        }
    }
    for entry in &mom_groups.mom_groups {
        let instance = instance_named(&mut instances, &entry.service_name);
        if instance.app.is_none() {
            instance.app = Some(&entry.app);
        }
        instance.groups = Some(&entry.groups);
    }
    for entry in &mom_apps.mom_apps {
        let instance = instance_named(&mut instances, &entry.service_name);
        if instance.app.is_none() {
            instance.app = Some(&entry.app);
        }
        instance.apps = Some(&entry.apps);
    }
    instances
}

/// Restore the root group tree and apps, then bring up each MoM instance, wait until all of
/// them are healthy, and restore their own trees and apps.
pub fn post_service_groups(client: &DcosClient, config: &BackupConfig) -> Result<()> {
    let root: GroupNode = read_buffer(&config.service_groups_file, "Service Groups")?;
    let apps: AppList = read_buffer(&config.apps_file, "Apps")?;
    let mom_groups: MomGroups =
        read_optional(&config.service_groups_mom_file, "MoM Service Groups")?.unwrap_or_default();
    let mom_apps: MomApps = read_optional(&config.apps_mom_file, "MoM Apps")?.unwrap_or_default();

    // `/` always exists; only its children are created.
    post_groups(client, MARATHON_API, root.children(), "Service Group");
    post_apps(client, MARATHON_API, &apps.apps, "App");

    let instances = mom_instances(&apps, &mom_groups, &mom_apps);
    if instances.is_empty() {
        tracing::info!("POST Service Groups and Apps: done");
        return Ok(());
    }

    for (index, instance) in instances.iter().enumerate() {
        if instance.in_app_list {
            continue;
        }
        let Some(app) = instance.app else {
            continue;
        };
        let mut app = app.clone();
        strip_app(&mut app);
        client.apply(
            Method::POST,
            &format!("{MARATHON_API}/apps"),
            Some(&app),
            &format!("MoM Instance {index} {}", instance.service_name),
        );
    }

    // Every instance must be up before anything is posted through its own API.
    let expected = instances.len();
    let polls = wait_for_mom_instances(client, expected, config.poll_interval());
    tracing::info!(
        polls,
        "all {expected} MoM instances are healthy; waiting a grace period for them to start"
    );
    std::thread::sleep(config.poll_interval());

    for instance in &instances {
        let api = mom_api(instance.service_name);
        if let Some(groups) = instance.groups {
            post_groups(
                client,
                &api,
                groups.children(),
                &format!("MoM Service Group {}", instance.service_name),
            );
        }
        if let Some(apps) = instance.apps {
            post_apps(
                client,
                &api,
                &apps.apps,
                &format!("MoM App {}", instance.service_name),
            );
        }
    }
    tracing::info!(mom_instances = expected, "POST Service Groups and Apps: done");
    Ok(())
}
