use anyhow::{bail, Context, Result};
use serde::Deserialize;
use serde_json::{json, Map, Value};

use crate::client::DcosClient;
use crate::config::BackupConfig;
use crate::constants::{
    EXHIBITOR_STATUS, MESOS_METRICS, REGISTRAR_RECOVERED_METRIC, SYSTEM_HEALTH_REPORT,
};

#[derive(Debug, Clone, Deserialize)]
pub struct ExhibitorNode {
    #[serde(default)]
    pub hostname: String,
    #[serde(default, rename = "isLeader")]
    pub is_leader: bool,
    #[serde(default)]
    pub description: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Quorum {
    pub serving: usize,
    pub leaders: usize,
}

impl Quorum {
    pub fn from_nodes(nodes: &[ExhibitorNode]) -> Self {
        Self {
            serving: nodes
                .iter()
                .filter(|node| node.description == "serving")
                .count(),
            leaders: nodes.iter().filter(|node| node.is_leader).count(),
        }
    }

    pub fn is_healthy(self, expected_masters: usize) -> bool {
        self.serving == expected_masters && self.leaders == 1
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegistrarState {
    Recovered,
    NotRecovered,
    Missing,
}

pub fn registrar_state(metrics: &Value) -> RegistrarState {
    match metrics.get(REGISTRAR_RECOVERED_METRIC).and_then(Value::as_f64) {
        Some(value) if value == 1.0 => RegistrarState::Recovered,
        Some(_) => RegistrarState::NotRecovered,
        None => RegistrarState::Missing,
    }
}

fn unit_health(unit: &Map<String, Value>) -> i64 {
    unit.get("Health").and_then(Value::as_i64).unwrap_or(0)
}

/// One line per unit; nonzero health means unhealthy, in which case each node is listed too.
pub fn health_report_lines(report: &Value) -> Vec<String> {
    let Some(units) = report.get("Units").and_then(Value::as_object) else {
        return Vec::new();
    };
    let mut lines = Vec::new();
    for (key, unit) in units {
        let Some(unit) = unit.as_object() else {
            continue;
        };
        let name = unit.get("UnitName").and_then(Value::as_str).unwrap_or(key);
        let health = unit_health(unit);
        lines.push(format!("Name: {name:48} State: {health}"));
        if health == 0 {
            continue;
        }
        let nodes = unit.get("Nodes").and_then(Value::as_array);
        for node in nodes.into_iter().flatten() {
            let ip = node.get("IP").and_then(Value::as_str).unwrap_or("?");
            let node_health = node.get("Health").and_then(Value::as_i64).unwrap_or(0);
            lines.push(format!("Name: {name:48} IP: {ip:16} State: {node_health}"));
        }
    }
    lines
}

fn print_output(key: &str, value: &Value) {
    println!("\n**OUTPUT:\n{}", json!({ key: value }));
}

fn check_quorum(client: &DcosClient, port: u16, expected_masters: usize) -> Result<()> {
    let url = client.port_url(port, EXHIBITOR_STATUS)?;
    let response = client
        .get_url(url)
        .context("Could not connect to exhibitor")?;
    if !response.is_success() {
        bail!("Could not get exhibitor status: {}", response.status);
    }
    let raw: Value = response.json()?;
    print_output("exhibitor_status", &raw);

    let nodes: Vec<ExhibitorNode> =
        serde_json::from_value(raw).context("exhibitor status is not a node list")?;
    for node in &nodes {
        tracing::debug!(
            hostname = %node.hostname,
            leader = node.is_leader,
            state = %node.description,
            "exhibitor node"
        );
    }
    let quorum = Quorum::from_nodes(&nodes);
    if !quorum.is_healthy(expected_masters) {
        bail!(
            "Expected {expected_masters} servers and 1 leader, got {} servers and {} leaders",
            quorum.serving,
            quorum.leaders
        );
    }
    tracing::info!(
        serving = quorum.serving,
        leaders = quorum.leaders,
        "server/leader check OK"
    );
    Ok(())
}

fn check_registrar(client: &DcosClient, port: u16) {
    let url = match client.port_url(port, MESOS_METRICS) {
        Ok(url) => url,
        Err(err) => {
            tracing::error!(error = %format!("{err:#}"), "GET Metrics failed");
            return;
        }
    };
    let metrics = match client.get_url(url) {
        Ok(response) if response.is_success() => response.json::<Value>(),
        Ok(response) => {
            tracing::error!(status = %response.status, "GET Metrics failed");
            return;
        }
        Err(err) => {
            tracing::error!(error = %format!("{err:#}"), "GET Metrics failed");
            return;
        }
    };
    let metrics = match metrics {
        Ok(metrics) => metrics,
        Err(err) => {
            tracing::error!(error = %format!("{err:#}"), "GET Metrics returned invalid JSON");
            return;
        }
    };
    print_output("metrics", &metrics);
    match registrar_state(&metrics) {
        RegistrarState::Recovered => tracing::info!("log recovered check OK"),
        RegistrarState::NotRecovered => tracing::error!(
            value = ?metrics.get(REGISTRAR_RECOVERED_METRIC),
            "registrar log NOT recovered"
        ),
        RegistrarState::Missing => tracing::error!("registrar log metric not found in response"),
    }
}

fn check_health_report(client: &DcosClient) {
    let Some(fetched) = client.fetch(SYSTEM_HEALTH_REPORT, "Health Report") else {
        return;
    };
    print_output("health_report", &fetched.json);
    for line in health_report_lines(&fetched.json) {
        println!("{line}");
    }
}

/// Verify the ZooKeeper quorum matches `expected_masters` (fatal when it does not), then report
/// the Mesos registrar state and the cluster health report.
pub fn get_masters(
    client: &DcosClient,
    config: &BackupConfig,
    expected_masters: usize,
) -> Result<()> {
    tracing::info!(expected_masters, "expected cluster size");
    check_quorum(client, config.exhibitor_port, expected_masters)?;
    check_registrar(client, config.mesos_master_port);
    check_health_report(client);
    tracing::info!("GET Masters: done");
    Ok(())
}
