use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use serde::Serialize;
use tokio::time::{Duration, sleep};
use tracing::{info, warn};

use questgen_core::domain::{PreferenceId, UserId, UserRecord};
use questgen_core::impls::{CannedGenerator, InMemoryRecordStore};
use questgen_core::observability::{StateCounts, init_tracing};
use questgen_core::{JobStatusResponse, JobSystem, QuestgenConfig};

/// Submit question-generation jobs against an in-memory demo store and
/// poll them until they finish.
#[derive(Debug, Parser)]
#[command(name = "questgen", version, about)]
struct Cli {
    /// Preference ids to generate questions for (default: every seeded preference).
    preference_ids: Vec<i64>,

    /// Config file; defaults apply when it does not exist.
    #[arg(long, default_value = "questgen.toml")]
    config: PathBuf,

    /// Override the configured worker count.
    #[arg(long)]
    workers: Option<usize>,

    /// Context passed with every job instead of the owner's profile.
    #[arg(long)]
    context: Option<String>,

    /// Simulated generator latency per call.
    #[arg(long, default_value_t = 200)]
    latency_ms: u64,

    /// Make the first N generator calls fail.
    #[arg(long, default_value_t = 0)]
    fail_first: u32,

    /// Emit logs as JSON.
    #[arg(long, default_value_t = false)]
    json_logs: bool,
}

#[derive(Debug, Serialize)]
struct Summary {
    submitted: usize,
    rejected: Vec<Rejected>,
    counts: StateCounts,
}

#[derive(Debug, Serialize)]
struct Rejected {
    preference_id: i64,
    error: String,
}

fn demo_users() -> Vec<UserRecord> {
    let user = |name: &str, age, gender: &str, location: &str| UserRecord {
        id: UserId(0),
        name: name.into(),
        age,
        gender: gender.into(),
        location: location.into(),
        driving_style: None,
        fuel_preference: None,
        budget_sensitivity: None,
        risk_tolerance: None,
    };
    vec![
        UserRecord {
            driving_style: Some("relaxed".into()),
            fuel_preference: Some("hybrid".into()),
            ..user("Aiko", 34, "female", "Sapporo")
        },
        UserRecord {
            budget_sensitivity: Some("high".into()),
            ..user("Marco", 27, "male", "Turin")
        },
        UserRecord {
            risk_tolerance: Some("low".into()),
            ..user("Lena", 52, "female", "Graz")
        },
    ]
}

/// Seed one preference per demo user and return their ids.
fn seed(records: &InMemoryRecordStore) -> Vec<PreferenceId> {
    demo_users()
        .into_iter()
        .map(|u| {
            let user_id = records.add_user(u);
            records.add_preference(user_id)
        })
        .collect()
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.json_logs);

    let mut config = QuestgenConfig::load(&cli.config)
        .with_context(|| format!("loading {}", cli.config.display()))?;
    if let Some(workers) = cli.workers {
        config.workers = workers;
        config.validate()?;
    }

    let records = Arc::new(InMemoryRecordStore::new());
    let seeded = seed(&records);
    let generator = Arc::new(
        CannedGenerator::new()
            .with_latency(Duration::from_millis(cli.latency_ms))
            .with_failures(cli.fail_first),
    );

    let system = JobSystem::start(&config, records.clone(), generator)?;

    let targets: Vec<i64> = if cli.preference_ids.is_empty() {
        seeded.iter().map(|id| id.get()).collect()
    } else {
        cli.preference_ids.clone()
    };

    let mut handles = Vec::new();
    let mut rejected = Vec::new();
    for preference_id in targets {
        match system.api().submit_job(preference_id, cli.context.clone()).await {
            Ok(handle) => handles.push(handle),
            Err(e) => {
                warn!(preference_id, kind = ?e.kind(), error = %e, "submission rejected");
                rejected.push(Rejected {
                    preference_id,
                    error: e.to_string(),
                });
            }
        }
    }
    info!(submitted = handles.len(), rejected = rejected.len(), "waiting for jobs");

    // 全ジョブが SUCCESS / FAILURE になるまでポーリング
    let finals: Vec<JobStatusResponse> = loop {
        let statuses = handles
            .iter()
            .map(|h| system.api().get_job_status(h))
            .collect::<Result<Vec<_>, _>>()?;
        if statuses.iter().all(|s| s.state.is_terminal()) {
            break statuses;
        }
        sleep(Duration::from_millis(50)).await;
    };

    for status in &finals {
        println!("{}", serde_json::to_string_pretty(status)?);
    }
    let summary = Summary {
        submitted: handles.len(),
        rejected,
        counts: system.api().counts(),
    };
    println!("{}", serde_json::to_string_pretty(&summary)?);

    system.shutdown().await;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn parses_ids_and_flags() {
        let cli = Cli::parse_from(["questgen", "--fail-first", "2", "--latency-ms", "0", "1", "3"]);
        assert_eq!(cli.preference_ids, vec![1, 3]);
        assert_eq!(cli.fail_first, 2);
        assert_eq!(cli.latency_ms, 0);
        assert_eq!(cli.config, PathBuf::from("questgen.toml"));
        assert!(!cli.json_logs);
    }

    #[test]
    fn seeds_one_preference_per_user() {
        let records = InMemoryRecordStore::new();
        let ids = seed(&records);
        assert_eq!(ids.len(), demo_users().len());
    }
}
