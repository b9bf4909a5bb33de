use anyhow::Result;
use serde::Deserialize;
use serde_json::{Map, Value};

use crate::client::DcosClient;
use crate::config::BackupConfig;
use crate::constants::MESOS_AGENTS;
use crate::utils::write_raw;

#[derive(Debug, Clone, Deserialize)]
pub struct Agent {
    pub hostname: String,
    #[serde(default)]
    pub active: bool,
    #[serde(default)]
    pub reserved_resources: Map<String, Value>,
}

impl Agent {
    /// Public agents carry resources reserved for the public role.
    pub fn is_public(&self) -> bool {
        !self.reserved_resources.is_empty()
    }
}

#[derive(Debug, Clone, Deserialize)]
struct AgentList {
    #[serde(default)]
    slaves: Vec<Agent>,
}

pub fn report_lines(agents: &[Agent]) -> Vec<String> {
    let rule = "=".repeat(42);
    let (active, inactive): (Vec<&Agent>, Vec<&Agent>) =
        agents.iter().partition(|agent| agent.active);

    let mut lines = vec![format!("TOTAL agents: {}", agents.len()), rule.clone()];
    lines.push(format!("ACTIVE agents: {}", active.len()));
    lines.push(rule.clone());
    for (index, agent) in active.iter().enumerate() {
        let role = if agent.is_public() { "*Public*" } else { "Private " };
        lines.push(format!("{role} Agent #{index}: {}", agent.hostname));
    }
    lines.push(rule.clone());
    lines.push(format!("INACTIVE agents: {}", inactive.len()));
    lines.push(rule);
    for (index, agent) in inactive.iter().enumerate() {
        lines.push(format!("Agent #{index}: {}", agent.hostname));
    }
    lines
}

pub fn get_agents(client: &DcosClient, config: &BackupConfig) -> Result<()> {
    let Some(fetched) = client.fetch(MESOS_AGENTS, "Agents") else {
        return Ok(());
    };
    write_raw(&config.agents_file, &fetched.body)?;

    match fetched.parse::<AgentList>() {
        Ok(list) => {
            for line in report_lines(&list.slaves) {
                println!("{line}");
            }
        }
        Err(err) => tracing::error!(error = %err, "agent list is malformed"),
    }
    Ok(())
}
