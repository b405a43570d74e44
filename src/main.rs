use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use csubatch::config::EngineConfig;
use csubatch::engine::Engine;
use csubatch::loader::load_job_file;
use csubatch::policy::Policy;
use csubatch::shell::Shell;
use csubatch::shutdown::install_shutdown_handler;

#[derive(Parser, Debug)]
#[command(name = "csubatch")]
#[command(about = "An interactive batch job scheduler with a simulated CPU")]
struct Args {
    /// Initial scheduling policy: fcfs, sjf or priority
    #[arg(long, default_value = "fcfs")]
    policy: String,

    /// CPU time slice in simulated seconds (omit for no slicing)
    #[arg(long)]
    time_slice: Option<u64>,

    /// Scheduler re-sort tick in milliseconds
    #[arg(long, default_value = "500")]
    scheduler_tick_ms: u64,

    /// Dispatcher idle backoff in milliseconds
    #[arg(long, default_value = "100")]
    dispatcher_idle_ms: u64,

    /// Job file to load before entering the shell
    #[arg(long)]
    load: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .init();

    let args = Args::parse();

    let policy: Policy = args.policy.parse()?;
    let mut config = EngineConfig::default()
        .with_policy(policy)
        .with_scheduler_tick(Duration::from_millis(args.scheduler_tick_ms))
        .with_dispatcher_idle(Duration::from_millis(args.dispatcher_idle_ms));
    if let Some(slice) = args.time_slice {
        if slice == 0 {
            return Err("time slice must be positive".into());
        }
        config = config.with_cpu_time_slice(slice);
    }

    tracing::info!(
        policy = %policy,
        time_slice = ?args.time_slice,
        "Starting csubatch"
    );

    let engine = Arc::new(Engine::new(config));
    engine.start();

    if let Some(path) = &args.load {
        let report = load_job_file(path, &engine).await?;
        println!(
            "Loaded {} jobs from {} ({} skipped).",
            report.added,
            path.display(),
            report.skipped
        );
    }

    let shutdown_token = install_shutdown_handler();
    Shell::new(engine.clone()).run(shutdown_token).await;

    engine.shutdown().await;
    Ok(())
}
