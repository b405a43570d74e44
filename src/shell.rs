use std::fmt::Write as _;
use std::sync::Arc;

use tokio::io::{AsyncBufReadExt, BufReader};
use tokio_util::sync::CancellationToken;

use crate::engine::Engine;
use crate::loader::load_job_file;
use crate::policy::Policy;

const HELP: &str = "\
Commands:
  run <name> <cpu_time> <priority>   submit a job (cpu_time in simulated seconds)
  list                               show pending jobs and the running job
  fcfs | sjf | priority              switch the scheduling policy
  load <file>                        submit jobs from a plain-text job file
  stats                              show performance metrics
  help                               show this help
  quit                               exit";

/// One parsed console command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Run {
        name: String,
        cpu_time: u64,
        priority: u32,
    },
    List,
    SetPolicy(Policy),
    Load(String),
    Stats,
    Help,
    Quit,
}

impl Command {
    /// Parse a console line. Returns `Ok(None)` for a blank line and a
    /// user-facing message for anything malformed.
    pub fn parse(line: &str) -> Result<Option<Command>, String> {
        let parts: Vec<&str> = line.split_whitespace().collect();
        let Some(&keyword) = parts.first() else {
            return Ok(None);
        };

        match keyword.to_ascii_lowercase().as_str() {
            "run" => {
                if parts.len() != 4 {
                    return Err("Usage: run <name> <cpu_time> <priority>".to_string());
                }
                let cpu_time: u64 = parts[2]
                    .parse()
                    .map_err(|_| "CPU time must be a non-negative integer".to_string())?;
                let priority: u32 = parts[3]
                    .parse()
                    .map_err(|_| "Priority must be a non-negative integer".to_string())?;
                Ok(Some(Command::Run {
                    name: parts[1].to_string(),
                    cpu_time,
                    priority,
                }))
            }
            "list" => Ok(Some(Command::List)),
            "fcfs" => Ok(Some(Command::SetPolicy(Policy::Fcfs))),
            "sjf" => Ok(Some(Command::SetPolicy(Policy::Sjf))),
            "priority" => Ok(Some(Command::SetPolicy(Policy::Priority))),
            "load" => {
                if parts.len() != 2 {
                    return Err("Usage: load <file>".to_string());
                }
                Ok(Some(Command::Load(parts[1].to_string())))
            }
            "stats" => Ok(Some(Command::Stats)),
            "help" => Ok(Some(Command::Help)),
            "quit" | "exit" => Ok(Some(Command::Quit)),
            other => Err(format!("Unknown command: {other} (try 'help')")),
        }
    }
}

/// Interactive console over the engine's submission surface.
pub struct Shell {
    engine: Arc<Engine>,
}

impl Shell {
    pub fn new(engine: Arc<Engine>) -> Self {
        Self { engine }
    }

    /// Read commands from stdin until `quit`, EOF or cancellation.
    pub async fn run(&self, cancel: CancellationToken) {
        let stdin = BufReader::new(tokio::io::stdin());
        let mut lines = stdin.lines();

        println!("CSUbatch ready. Type 'help' for the command list.");
        loop {
            let line = tokio::select! {
                _ = cancel.cancelled() => break,
                line = lines.next_line() => line,
            };
            let line = match line {
                Ok(Some(line)) => line,
                Ok(None) => break,
                Err(e) => {
                    tracing::error!(error = %e, "Failed to read from stdin");
                    break;
                }
            };

            match Command::parse(&line) {
                Ok(None) => {}
                Ok(Some(Command::Quit)) => break,
                Ok(Some(command)) => println!("{}", self.execute(command).await),
                Err(message) => println!("{message}"),
            }
        }
    }

    /// Execute one command and render its output.
    pub async fn execute(&self, command: Command) -> String {
        match command {
            Command::Run {
                name,
                cpu_time,
                priority,
            } => match self.engine.submit(&name, cpu_time, priority).await {
                Ok(_) => {
                    let listing = self.engine.list().await;
                    format!(
                        "Job {name} added to queue.\n\
                         Total number of jobs in the queue: {}\n\
                         Scheduling policy: {}.",
                        listing.total(),
                        listing.policy
                    )
                }
                Err(e) => format!("Error: {e}"),
            },
            Command::List => self.render_listing().await,
            Command::SetPolicy(policy) => {
                let previous = self.engine.set_policy(policy).await;
                if previous == policy {
                    format!("Scheduling policy is already {policy}.")
                } else {
                    format!("Scheduling policy switched from {previous} to {policy}.")
                }
            }
            Command::Load(path) => match load_job_file(&path, &self.engine).await {
                Ok(report) => format!(
                    "Loaded {} jobs from {path} ({} skipped).",
                    report.added, report.skipped
                ),
                Err(e) => format!("Error loading {path}: {e}"),
            },
            Command::Stats => self.render_stats(),
            Command::Help => HELP.to_string(),
            Command::Quit => String::new(),
        }
    }

    async fn render_listing(&self) -> String {
        let listing = self.engine.list().await;
        let mut out = String::new();
        let _ = writeln!(
            out,
            "Total number of jobs in the queue: {}",
            listing.total()
        );
        let _ = writeln!(out, "Scheduling policy: {}.", listing.policy);
        let _ = writeln!(
            out,
            "{:<12} {:>8} {:>4} {:>12} {:>12}",
            "Name", "CPU_Time", "Pri", "Arrival_time", "Status"
        );
        if let Some(running) = &listing.running {
            let _ = writeln!(
                out,
                "{:<12} {:>8} {:>4} {:>12} {:>12}",
                running.name,
                running.cpu_time,
                running.priority,
                running.arrival_time.format("%H:%M:%S").to_string(),
                running.status.to_string()
            );
        }
        for job in &listing.pending {
            let _ = writeln!(
                out,
                "{:<12} {:>8} {:>4} {:>12} {:>12}",
                job.name,
                job.cpu_time,
                job.priority,
                job.arrival_time.format("%H:%M:%S").to_string(),
                job.status.to_string()
            );
        }
        out.trim_end().to_string()
    }

    fn render_stats(&self) -> String {
        let metrics = self.engine.metrics();
        let mut out = String::new();
        let _ = writeln!(out, "Total jobs submitted: {}", metrics.total_submitted());
        let _ = writeln!(out, "Total jobs completed: {}", metrics.total_completed());
        let _ = writeln!(
            out,
            "Average turnaround time: {:.3} s",
            metrics.avg_turnaround_millis() / 1000.0
        );
        let _ = writeln!(
            out,
            "Average waiting time: {:.3} s",
            metrics.avg_waiting_millis() / 1000.0
        );
        let _ = writeln!(
            out,
            "Average CPU time: {:.3} s",
            metrics.avg_cpu_millis() / 1000.0
        );
        let _ = write!(out, "Throughput: {:.3} jobs/s", metrics.throughput());
        out
    }
}
