//! Command handlers.
//!
//! Handlers print plain-text results to stdout and return errors to the
//! caller, which reports them on stderr.

use crate::app::AppContext;
use crate::cli::{Command, ConfigCommand, DlqCommand, WorkerCommand};
use jobctl_config::ConfigStore;
use jobctl_core::{Job, JobId, JobState, JobctlResult};
use jobctl_jobs::{
    install_signal_handlers, EnqueueRequest, JobQueue, LaunchMode, ShellRunner, ShutdownFlag,
    Worker, WorkerConfig,
};
use serde_json::Value;
use std::sync::Arc;
use tracing::info;

/// Runs one parsed command.
pub async fn execute(command: Command, ctx: &AppContext) -> JobctlResult<()> {
    match command {
        Command::Enqueue { job } => enqueue(ctx, &job).await,
        Command::Worker { command } => match command {
            WorkerCommand::Start { count, foreground } => {
                worker_start(ctx, count, foreground).await
            }
            WorkerCommand::Stop => worker_stop(ctx).await,
            WorkerCommand::Status => worker_status(ctx).await,
            WorkerCommand::Run => worker_run(ctx).await,
        },
        Command::Status => status(ctx).await,
        Command::List { state } => list(ctx, state).await,
        Command::Info { id } => job_info(ctx, &id).await,
        Command::Dlq { command } => match command {
            DlqCommand::List => dlq_list(ctx).await,
            DlqCommand::Retry { id } => dlq_retry(ctx, &id).await,
            DlqCommand::Remove { id } => dlq_remove(ctx, &id).await,
        },
        Command::Config { command } => config(ctx, command).await,
    }
}

async fn with_queue<T, F, Fut>(ctx: &AppContext, f: F) -> JobctlResult<T>
where
    F: FnOnce(JobQueue) -> Fut,
    Fut: std::future::Future<Output = JobctlResult<T>>,
{
    let queue = ctx.queue().await?;
    let store = Arc::clone(queue.store());
    let result = f(queue).await;
    store.close().await;
    result
}

async fn enqueue(ctx: &AppContext, json: &str) -> JobctlResult<()> {
    let request = EnqueueRequest::from_json(json)?;
    let job = with_queue(ctx, |queue| async move { queue.enqueue(request).await }).await?;
    println!("Job {} enqueued", job.id);
    Ok(())
}

async fn worker_start(ctx: &AppContext, count: usize, foreground: bool) -> JobctlResult<()> {
    // Migrate once here so the children never race to create the schema.
    ctx.open_store().await?.close().await;

    let pool = ctx.worker_pool()?;
    if !foreground {
        let pids = pool.start(count, LaunchMode::Background).await?;
        println!("Started {} worker(s): {}", pids.len(), join_pids(&pids));
        println!("Run 'jobctl worker status' to check them, 'jobctl worker stop' to stop them");
        return Ok(());
    }

    println!("Starting {count} worker(s) in foreground (Ctrl+C to stop)...");
    // Children share our process group and get the same Ctrl+C; keep
    // waiting for them instead of exiting first.
    let ctrl_c = tokio::spawn(async {
        while tokio::signal::ctrl_c().await.is_ok() {
            info!("Ctrl+C received, waiting for workers to finish their current job");
        }
    });
    let result = pool.start(count, LaunchMode::Foreground).await;
    ctrl_c.abort();

    let pids = result?;
    println!("{} worker(s) exited", pids.len());
    Ok(())
}

async fn worker_stop(ctx: &AppContext) -> JobctlResult<()> {
    let report = ctx.worker_pool()?.stop().await?;
    if report.signalled.is_empty() && report.missing.is_empty() {
        println!("No workers running");
        return Ok(());
    }
    if !report.signalled.is_empty() {
        println!(
            "Sent stop signal to {} worker(s): {}",
            report.signalled.len(),
            join_pids(&report.signalled)
        );
    }
    if !report.missing.is_empty() {
        println!("Already exited: {}", join_pids(&report.missing));
    }
    Ok(())
}

async fn worker_status(ctx: &AppContext) -> JobctlResult<()> {
    let status = ctx.worker_pool()?.status().await?;
    println!("Active workers: {}", status.active_count);
    if !status.pids.is_empty() {
        println!("PIDs: {}", join_pids(&status.pids));
    }
    Ok(())
}

async fn worker_run(ctx: &AppContext) -> JobctlResult<()> {
    let store = ctx.open_store().await?;
    let config = WorkerConfig::try_from(ctx.settings())?;

    let shutdown = ShutdownFlag::new();
    let signals = install_signal_handlers(shutdown.clone());

    let worker = Worker::new(store, Arc::new(ShellRunner::default()), config)
        .with_shutdown(shutdown);
    worker.run().await;

    signals.abort();
    Ok(())
}

async fn status(ctx: &AppContext) -> JobctlResult<()> {
    let counts = with_queue(ctx, |queue| async move { queue.count_by_state().await }).await?;
    let workers = ctx.worker_pool()?.status().await?;

    println!("Active workers: {}", workers.active_count);
    if !workers.pids.is_empty() {
        println!("Worker PIDs: {}", join_pids(&workers.pids));
    }
    println!();
    println!("Jobs:");
    for (state, count) in counts.iter() {
        println!("  {:<12}{count}", state.as_str());
    }
    println!("  {:<12}{}", "total", counts.total());
    Ok(())
}

async fn list(ctx: &AppContext, state: Option<JobState>) -> JobctlResult<()> {
    let jobs = with_queue(ctx, |queue| async move { queue.list(state).await }).await?;
    if jobs.is_empty() {
        match state {
            Some(state) => println!("No jobs found with state {state}"),
            None => println!("No jobs found"),
        }
        return Ok(());
    }

    for job in &jobs {
        println!("{}", summary_line(job));
    }
    println!("Total: {} job(s)", jobs.len());
    Ok(())
}

async fn job_info(ctx: &AppContext, id: &str) -> JobctlResult<()> {
    let id = JobId::from(id);
    let job = with_queue(ctx, |queue| async move { queue.get(&id).await }).await?;
    println!("{}", serde_json::to_string_pretty(&job)?);
    Ok(())
}

async fn dlq_list(ctx: &AppContext) -> JobctlResult<()> {
    let jobs = with_queue(ctx, |queue| async move { queue.dead_letters().await }).await?;
    if jobs.is_empty() {
        println!("No jobs in dead letter queue");
        return Ok(());
    }

    for job in &jobs {
        let error = job.error.as_deref().unwrap_or("").lines().next().unwrap_or("");
        println!("{}  error: {error}", summary_line(job));
    }
    println!("Total: {} job(s) in dead letter queue", jobs.len());
    Ok(())
}

async fn dlq_retry(ctx: &AppContext, id: &str) -> JobctlResult<()> {
    let id = JobId::from(id);
    let job = with_queue(ctx, |queue| async move { queue.retry_dead(&id).await }).await?;
    println!("Job {} moved from dead letter queue to pending", job.id);
    Ok(())
}

async fn dlq_remove(ctx: &AppContext, id: &str) -> JobctlResult<()> {
    let id = JobId::from(id);
    let job = with_queue(ctx, |queue| async move { queue.remove_dead(&id).await }).await?;
    println!("Job {} removed from dead letter queue", job.id);
    Ok(())
}

async fn config(ctx: &AppContext, command: ConfigCommand) -> JobctlResult<()> {
    let mut store = ConfigStore::open(ctx.config_path()).await?;
    match command {
        ConfigCommand::Get { key } => println!("{}", plain(&store.get(key))),
        ConfigCommand::Set { key, value } => {
            let value = store.set(key, &value).await?;
            println!("Configuration updated: {key} = {}", plain(&value));
        }
        ConfigCommand::Show => {
            for (key, value) in store.entries() {
                println!("{key} = {}", plain(&value));
            }
        }
    }
    Ok(())
}

fn summary_line(job: &Job) -> String {
    format!(
        "{}  {:<10}  attempts {}/{}  {}  {}",
        job.id,
        job.state.as_str(),
        job.attempts,
        job.max_retries.saturating_add(1),
        job.created_at.format("%Y-%m-%d %H:%M:%S"),
        job.command
    )
}

/// Strings print without JSON quotes.
fn plain(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn join_pids(pids: &[u32]) -> String {
    pids.iter()
        .map(u32::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    #[test]
    fn test_summary_line() {
        let created = Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap();
        let job = Job::new(JobId::from("job-1"), "sleep 2", 3, created);
        assert_eq!(
            summary_line(&job),
            "job-1  pending     attempts 0/4  2024-05-01 12:00:00  sleep 2"
        );
    }

    #[test]
    fn test_plain_values() {
        assert_eq!(plain(&Value::from("jobctl.db")), "jobctl.db");
        assert_eq!(plain(&Value::from(3)), "3");
        assert_eq!(plain(&Value::Null), "null");
    }

    #[test]
    fn test_join_pids() {
        assert_eq!(join_pids(&[]), "");
        assert_eq!(join_pids(&[10, 20]), "10, 20");
    }
}
