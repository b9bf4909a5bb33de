use anyhow::Result;
use reqwest::Method;
use serde_json::Value;

use crate::client::{DcosClient, WriteOutcome};
use crate::config::BackupConfig;
use crate::constants::METRONOME_JOBS;
use crate::utils::{read_buffer, write_raw};

/// Save the Metronome job list (a JSON array of job definitions) verbatim.
pub fn get_jobs(client: &DcosClient, config: &BackupConfig) -> Result<()> {
    let Some(fetched) = client.fetch(METRONOME_JOBS, "Jobs") else {
        return Ok(());
    };
    write_raw(&config.jobs_file, &fetched.body)?;
    let count = fetched.json.as_array().map(Vec::len).unwrap_or(0);
    tracing::info!(count, "GET Jobs: done");
    Ok(())
}

/// Replay each saved job definition. Jobs that already exist are updated in place.
pub fn post_jobs(client: &DcosClient, config: &BackupConfig) -> Result<()> {
    let jobs: Vec<Value> = read_buffer(&config.jobs_file, "Jobs")?;

    for (index, job) in jobs.iter().enumerate() {
        let Some(id) = job.get("id").and_then(Value::as_str) else {
            tracing::error!(index, "skipping job without an id");
            continue;
        };
        let what = format!("Job {index} {id}");
        if client.apply(Method::POST, METRONOME_JOBS, Some(job), &what) == WriteOutcome::Conflict {
            client.apply(Method::PUT, &format!("{METRONOME_JOBS}/{id}"), Some(job), &what);
        }
    }
    tracing::info!(count = jobs.len(), "POST Jobs: done");
    Ok(())
}
