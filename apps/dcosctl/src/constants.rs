pub const DEFAULT_CONFIG_FILE: &str = ".config.json";
pub const CONFIG_PATH_ENV: &str = "DCOSCTL_CONFIG";

pub const DEFAULT_POLL_INTERVAL_SECONDS: u64 = 10;
pub const DEFAULT_REQUEST_TIMEOUT_SECONDS: u64 = 30;

pub const IAM_API: &str = "/acs/api/v1";
pub const MARATHON_API: &str = "/marathon/v2";
pub const METRONOME_JOBS: &str = "/metronome/v1/jobs";
pub const MESOS_AGENTS: &str = "/mesos/slaves";
pub const SYSTEM_HEALTH_REPORT: &str = "/system/health/v1/report";

pub const EXHIBITOR_PORT: u16 = 8181;
pub const EXHIBITOR_STATUS: &str = "/exhibitor/v1/cluster/status";
pub const MESOS_MASTER_PORT: u16 = 5050;
pub const MESOS_METRICS: &str = "/metrics/snapshot";
pub const REGISTRAR_RECOVERED_METRIC: &str = "registrar/log/recovered";

pub const PACKAGE_NAME_LABEL: &str = "DCOS_PACKAGE_NAME";
pub const SERVICE_NAME_LABEL: &str = "DCOS_SERVICE_NAME";
pub const MOM_PACKAGE_NAME: &str = "marathon";

/// Fields Marathon rejects (or recomputes) when a group is POSTed back.
/// Apps are restored separately, so they are dropped from the group payload too.
pub const GROUP_REJECTED_FIELDS: &[&str] = &["version", "apps"];

/// Server-assigned app fields that must not be replayed on creation.
pub const APP_REJECTED_FIELDS: &[&str] = &[
    "version",
    "versionInfo",
    "tasksStaged",
    "tasksRunning",
    "tasksHealthy",
    "tasksUnhealthy",
    "deployments",
    "lastTaskFailure",
    "tasks",
    "taskStats",
    "readinessCheckResults",
];
