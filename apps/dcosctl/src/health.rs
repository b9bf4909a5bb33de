use serde_json::Value;
use std::time::Duration;

use crate::client::DcosClient;
use crate::constants::{MARATHON_API, MOM_PACKAGE_NAME, PACKAGE_NAME_LABEL};

pub fn label<'a>(app: &'a Value, name: &str) -> Option<&'a str> {
    app.get("labels")?.get(name)?.as_str()
}

pub fn is_package(app: &Value, package: &str) -> bool {
    label(app, PACKAGE_NAME_LABEL) == Some(package)
}

pub fn tasks_healthy(app: &Value) -> u64 {
    app.get("tasksHealthy").and_then(Value::as_u64).unwrap_or(0)
}

/// Number of apps installed from `package` that report at least one healthy task.
pub fn healthy_instances(apps: &[Value], package: &str) -> usize {
    apps.iter()
        .filter(|app| is_package(app, package))
        .filter(|app| tasks_healthy(app) > 0)
        .count()
}

/// Block until `poll` reports exactly `expected` healthy instances, sleeping `interval` between
/// attempts. A poll that yields nothing counts as zero healthy. There is no upper bound.
///
/// Returns the number of polls issued.
pub fn wait_for_healthy<F>(mut poll: F, package: &str, expected: usize, interval: Duration) -> usize
where
    F: FnMut() -> Option<Vec<Value>>,
{
    let mut polls = 0;
    loop {
        polls += 1;
        let healthy = poll()
            .map(|apps| healthy_instances(&apps, package))
            .unwrap_or(0);
        tracing::info!(
            healthy,
            expected,
            poll = polls,
            "waiting for {package} instances to report healthy"
        );
        if healthy == expected {
            return polls;
        }
        std::thread::sleep(interval);
    }
}

/// The current Marathon app list, or `None` if it could not be read.
pub fn marathon_apps(client: &DcosClient, api_root: &str) -> Option<Vec<Value>> {
    let fetched = client.fetch(&format!("{api_root}/apps"), "Apps")?;
    match fetched.json.get("apps").and_then(Value::as_array) {
        Some(apps) => Some(apps.clone()),
        None => {
            tracing::error!("GET Apps: response has no `apps` list");
            None
        }
    }
}

/// Wait until `expected` Marathon-on-Marathon instances are healthy on the root Marathon.
pub fn wait_for_mom_instances(client: &DcosClient, expected: usize, interval: Duration) -> usize {
    wait_for_healthy(
        || marathon_apps(client, MARATHON_API),
        MOM_PACKAGE_NAME,
        expected,
        interval,
    )
}
