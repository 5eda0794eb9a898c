// src/exec/shared.rs

//! Shared cascade log, the one resource all jobs append to.
//!
//! Records are JSON lines in `{result_dir}/cascade_log.jsonl`:
//!
//! ```text
//! {"unix_time":1700000000,"job_name":"n1.male","message_type":"begin","message":"fit started"}
//! ```

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;
use tracing::debug;

/// File name of the cascade log inside the result directory.
pub const LOG_FILE_NAME: &str = "cascade_log.jsonl";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageType {
    Begin,
    Done,
    Error,
    Warning,
    Resume,
}

impl MessageType {
    pub fn as_str(&self) -> &'static str {
        match self {
            MessageType::Begin => "begin",
            MessageType::Done => "done",
            MessageType::Error => "error",
            MessageType::Warning => "warning",
            MessageType::Resume => "resume",
        }
    }
}

impl fmt::Display for MessageType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MessageType {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "begin" => Ok(MessageType::Begin),
            "done" => Ok(MessageType::Done),
            "error" => Ok(MessageType::Error),
            "warning" => Ok(MessageType::Warning),
            "resume" => Ok(MessageType::Resume),
            other => Err(format!("invalid message type: {other}")),
        }
    }
}

/// One line of the cascade log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogRecord {
    pub unix_time: i64,
    pub job_name: String,
    pub message_type: MessageType,
    pub message: String,
}

impl LogRecord {
    pub fn with_now(
        job_name: impl Into<String>,
        message_type: MessageType,
        message: impl Into<String>,
    ) -> Self {
        Self {
            unix_time: Utc::now().timestamp(),
            job_name: job_name.into(),
            message_type,
            message: message.into(),
        }
    }
}

/// Append-only writer for the cascade log.
#[derive(Debug)]
pub struct CascadeLog {
    path: PathBuf,
    records_written: usize,
}

impl CascadeLog {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            records_written: 0,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub async fn append(&mut self, record: &LogRecord) -> Result<()> {
        let mut line = serde_json::to_string(record)?;
        line.push('\n');

        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent)
                    .await
                    .with_context(|| format!("creating {}", parent.display()))?;
            }
        }

        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await
            .with_context(|| format!("opening cascade log {}", self.path.display()))?;
        file.write_all(line.as_bytes()).await?;
        file.flush().await?;

        self.records_written += 1;
        Ok(())
    }
}

/// Handle to the cascade log shared by all running jobs.
///
/// Appends are serialized by the mutex, so concurrent jobs never interleave
/// partial records.
#[derive(Debug, Clone)]
pub struct SharedState(Arc<Mutex<CascadeLog>>);

impl SharedState {
    pub fn new(log: CascadeLog) -> Self {
        Self(Arc::new(Mutex::new(log)))
    }

    /// Log at `{result_dir}/cascade_log.jsonl`.
    pub fn for_result_dir(result_dir: &Path) -> Self {
        Self::new(CascadeLog::new(result_dir.join(LOG_FILE_NAME)))
    }

    pub async fn log_path(&self) -> PathBuf {
        self.0.lock().await.path().to_path_buf()
    }

    pub async fn records_written(&self) -> usize {
        self.0.lock().await.records_written
    }

    pub async fn append(
        &self,
        job_name: &str,
        message_type: MessageType,
        message: impl Into<String>,
    ) -> Result<()> {
        let record = LogRecord::with_now(job_name, message_type, message);
        let mut guard = self.0.lock().await;
        guard.append(&record).await?;
        debug!(job = %job_name, message_type = %message_type, "appended cascade log record");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn record_serializes_with_lowercase_type() {
        let record = LogRecord {
            unix_time: 10,
            job_name: "n1.male".into(),
            message_type: MessageType::Begin,
            message: "fit started".into(),
        };
        let json = serde_json::to_string(&record).unwrap();
        assert_eq!(
            json,
            r#"{"unix_time":10,"job_name":"n1.male","message_type":"begin","message":"fit started"}"#
        );
    }

    #[test]
    fn message_type_parses_case_insensitively() {
        assert_eq!("Warning".parse::<MessageType>(), Ok(MessageType::Warning));
        assert!("later".parse::<MessageType>().is_err());
    }

    #[tokio::test]
    async fn concurrent_appends_produce_whole_lines() {
        let dir = tempfile::tempdir().unwrap();
        let shared = SharedState::for_result_dir(dir.path());

        let mut handles = Vec::new();
        for i in 0..16 {
            let shared = shared.clone();
            handles.push(tokio::spawn(async move {
                shared
                    .append(&format!("job{i}"), MessageType::Done, "x".repeat(512))
                    .await
            }));
        }
        for h in handles {
            h.await.unwrap().unwrap();
        }

        assert_eq!(shared.records_written().await, 16);
        let log_path = shared.log_path().await;
        assert_eq!(log_path, dir.path().join(LOG_FILE_NAME));
        let text = std::fs::read_to_string(log_path).unwrap();
        let records: Vec<LogRecord> = text
            .lines()
            .map(|l| serde_json::from_str(l).unwrap())
            .collect();
        assert_eq!(records.len(), 16);
    }
}
