mod acls;
mod agents;
mod cli;
mod client;
mod config;
mod constants;
mod groups;
mod health;
mod jobs;
mod ldap;
mod masters;
mod service_groups;
#[cfg(test)]
mod test_support;
mod tree;
mod users;
mod utils;

use anyhow::Result;
use clap::Parser;

use crate::cli::{Cli, Commands};
use crate::client::DcosClient;
use crate::config::{load_config, resolve_config_path};
use crate::ldap::DirectoryEntry;

fn init_tracing() -> Result<()> {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "info,dcosctl=info".into());
    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init()
        .map_err(|err| anyhow::anyhow!(err.to_string()))?;
    Ok(())
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing()?;

    let config_path = resolve_config_path(cli.config);
    let config = load_config(&config_path)?;
    tracing::debug!(path = %config_path.display(), cluster = %config.base_url(), "loaded config");
    let client = DcosClient::new(&config)?;

    match cli.command {
        Commands::GetAcls => acls::get_acls(&client, &config),
        Commands::GetGroups => groups::get_groups(&client, &config),
        Commands::GetUsers => users::get_users(&client, &config),
        Commands::GetAgents => agents::get_agents(&client, &config),
        Commands::GetJobs => jobs::get_jobs(&client, &config),
        Commands::GetLdap => ldap::get_ldap(&client, &config),
        Commands::GetServiceGroups => service_groups::get_service_groups(&client, &config),
        Commands::GetMasters(args) => masters::get_masters(&client, &config, args.expected_masters),
        Commands::PostAcls => acls::post_acls(&client, &config),
        Commands::PostGroups => groups::post_groups(&client, &config),
        Commands::PostUsers => users::post_users(&client, &config),
        Commands::PostJobs => jobs::post_jobs(&client, &config),
        Commands::PostLdap => ldap::post_ldap(&client, &config),
        Commands::PostServiceGroups => service_groups::post_service_groups(&client, &config),
        Commands::ImportLdapUser(args) => ldap::import(&client, DirectoryEntry::User, &args.name),
        Commands::ImportLdapGroup(args) => ldap::import(&client, DirectoryEntry::Group, &args.name),
    }
}
