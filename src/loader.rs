use std::path::Path;

use crate::engine::Engine;
use crate::error::Result;

/// Outcome of loading a job file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoadReport {
    pub added: usize,
    pub skipped: usize,
}

/// Load jobs from a plain-text job list and submit them to the engine.
///
/// Format: one `name cpu_time priority` triple per line, whitespace
/// separated. Blank lines and lines starting with `#` are skipped. A
/// malformed or rejected line is skipped with a warning; loading continues.
pub async fn load_job_file(path: impl AsRef<Path>, engine: &Engine) -> Result<LoadReport> {
    let path = path.as_ref();
    let contents = tokio::fs::read_to_string(path).await?;
    tracing::info!(file = %path.display(), "Loading jobs from file");

    let mut report = LoadReport {
        added: 0,
        skipped: 0,
    };

    for (index, raw_line) in contents.lines().enumerate() {
        let line_number = index + 1;
        let line = raw_line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        let fields: Vec<&str> = line.split_whitespace().collect();
        if fields.len() < 3 {
            tracing::warn!(line = line_number, "Job line has too few fields, skipping");
            report.skipped += 1;
            continue;
        }

        let name = fields[0];
        let (cpu_time, priority) = match (fields[1].parse::<u64>(), fields[2].parse::<u32>()) {
            (Ok(cpu_time), Ok(priority)) => (cpu_time, priority),
            _ => {
                tracing::warn!(
                    line = line_number,
                    job = name,
                    "CPU time and priority must be non-negative integers, skipping"
                );
                report.skipped += 1;
                continue;
            }
        };

        match engine.submit(name, cpu_time, priority).await {
            Ok(_) => report.added += 1,
            Err(e) => {
                tracing::warn!(line = line_number, job = name, error = %e, "Job rejected, skipping");
                report.skipped += 1;
            }
        }
    }

    tracing::info!(
        file = %path.display(),
        added = report.added,
        skipped = report.skipped,
        "Job file loaded"
    );
    Ok(report)
}
