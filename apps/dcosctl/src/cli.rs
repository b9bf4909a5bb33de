use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(
    name = "dcosctl",
    version,
    about = "Back up and restore DC/OS cluster configuration through the admin API"
)]
pub struct Cli {
    /// Path to the JSON config file (default: $DCOSCTL_CONFIG or ./.config.json)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Save ACLs with their permissions and action values
    GetAcls,
    /// Save groups with their members and permissions
    GetGroups,
    /// Save users with their group memberships
    GetUsers,
    /// Save and summarize the Mesos agent list
    GetAgents,
    /// Save Metronome job definitions
    GetJobs,
    /// Save the LDAP directory configuration
    GetLdap,
    /// Save the Marathon service-group tree, apps and Marathon-on-Marathon instances
    GetServiceGroups,
    /// Check ZooKeeper quorum, registrar recovery and the cluster health report
    GetMasters(GetMastersArgs),
    /// Restore ACLs and their user/group grants
    PostAcls,
    /// Restore groups
    PostGroups,
    /// Restore users and their group memberships
    PostUsers,
    /// Restore Metronome jobs
    PostJobs,
    /// Restore the LDAP directory configuration
    PostLdap,
    /// Restore service groups, apps and Marathon-on-Marathon instances
    PostServiceGroups,
    /// Import one user from the configured LDAP directory
    ImportLdapUser(ImportLdapArgs),
    /// Import one group from the configured LDAP directory
    ImportLdapGroup(ImportLdapArgs),
}

#[derive(Args)]
pub struct GetMastersArgs {
    /// Number of masters the cluster should have
    pub expected_masters: usize,
}

#[derive(Args)]
pub struct ImportLdapArgs {
    pub name: String,
}
