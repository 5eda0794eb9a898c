// src/summary.rs

//! Post-run aggregation over the cascade log and job directories.

use std::collections::BTreeMap;
use std::fmt::Write as _;
use std::fs;
use std::path::{Path, PathBuf};

use tracing::{debug, info};

use crate::errors::Result;
use crate::exec::shared::{LogRecord, MessageType, LOG_FILE_NAME};
use crate::jobs::JobPlan;

/// Directory, inside the result directory, that summaries are written to.
pub const SUMMARY_DIR: &str = "summary";

/// Parse every record of `{result_dir}/cascade_log.jsonl`. Blank lines are
/// skipped.
pub fn read_log(result_dir: &Path) -> Result<Vec<LogRecord>> {
    let path = result_dir.join(LOG_FILE_NAME);
    let text = fs::read_to_string(&path)?;

    let mut records = Vec::new();
    for line in text.lines().filter(|l| !l.trim().is_empty()) {
        records.push(serde_json::from_str(line)?);
    }
    debug!(path = %path.display(), records = records.len(), "read cascade log");
    Ok(records)
}

/// Messages of one type grouped by job name, job names in sorted order and
/// messages in log order.
pub fn messages_by_job(records: &[LogRecord], message_type: MessageType) -> BTreeMap<String, Vec<String>> {
    let mut grouped: BTreeMap<String, Vec<String>> = BTreeMap::new();
    for record in records.iter().filter(|r| r.message_type == message_type) {
        grouped
            .entry(record.job_name.clone())
            .or_default()
            .push(record.message.clone());
    }
    grouped
}

/// Write `{result_dir}/summary/{message_type}`: for every job with messages
/// of that type, the job name followed by its messages, one block per job
/// separated by a blank line.
pub fn write_summary(result_dir: &Path, message_type: MessageType, records: &[LogRecord]) -> Result<PathBuf> {
    let grouped = messages_by_job(records, message_type);

    let mut text = String::new();
    for (i, (job_name, messages)) in grouped.iter().enumerate() {
        if i > 0 {
            text.push('\n');
        }
        let _ = writeln!(text, "{job_name}");
        for message in messages {
            let _ = writeln!(text, "{message}");
        }
    }

    let dir = result_dir.join(SUMMARY_DIR);
    fs::create_dir_all(&dir)?;
    let path = dir.join(message_type.as_str());
    fs::write(&path, text)?;

    info!(
        path = %path.display(),
        jobs = grouped.len(),
        message_type = %message_type,
        "wrote summary"
    );
    Ok(path)
}

/// Paths of `file_name` inside each job's directory, in job order, for the
/// jobs where that file exists.
pub fn existing_job_files(plan: &JobPlan, file_name: &str) -> Vec<PathBuf> {
    (0..plan.len())
        .filter_map(|job_id| plan.directory(job_id))
        .map(|dir| dir.join(file_name))
        .filter(|path| path.is_file())
        .collect()
}
