// src/exec/engine.rs

//! The fitting-engine collaborator.

use std::path::Path;
use std::process::Stdio;

use anyhow::{bail, Context, Result};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::Command;
use tracing::{debug, info};

use crate::exec::BoxFuture;
use crate::types::EngineStep;

/// Runs one engine step against a working database, mutating it in place.
pub trait FitEngine: Send + Sync {
    fn run_step<'a>(&'a self, database: &'a Path, step: &'a EngineStep) -> BoxFuture<'a, Result<()>>;
}

/// Invokes an external engine program as `{program} {database} {action} {args...}`.
#[derive(Debug, Clone)]
pub struct CommandFitEngine {
    program: String,
}

impl CommandFitEngine {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
        }
    }

    pub fn program(&self) -> &str {
        &self.program
    }

    async fn run(&self, database: &Path, step: &EngineStep) -> Result<()> {
        info!(
            program = %self.program,
            database = %database.display(),
            step = %step,
            "starting engine process"
        );

        let mut cmd = Command::new(&self.program);
        cmd.arg(database)
            .arg(step.action.as_str())
            .args(&step.args)
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let mut child = cmd
            .spawn()
            .with_context(|| format!("spawning '{}' for step '{step}'", self.program))?;

        // Always consume both pipes so buffers don't fill; log at debug.
        let mut readers = Vec::new();
        if let Some(stdout) = child.stdout.take() {
            let label = database.display().to_string();
            readers.push(tokio::spawn(async move {
                let mut lines = BufReader::new(stdout).lines();
                while let Ok(Some(line)) = lines.next_line().await {
                    debug!(database = %label, "stdout: {}", line);
                }
            }));
        }
        if let Some(stderr) = child.stderr.take() {
            let label = database.display().to_string();
            readers.push(tokio::spawn(async move {
                let mut lines = BufReader::new(stderr).lines();
                while let Ok(Some(line)) = lines.next_line().await {
                    debug!(database = %label, "stderr: {}", line);
                }
            }));
        }

        let status = child
            .wait()
            .await
            .with_context(|| format!("waiting for '{}' ({step})", self.program))?;
        for reader in readers {
            let _ = reader.await;
        }

        if !status.success() {
            bail!(
                "'{} {} {step}' exited with code {}",
                self.program,
                database.display(),
                status.code().unwrap_or(-1)
            );
        }
        Ok(())
    }
}

impl FitEngine for CommandFitEngine {
    fn run_step<'a>(&'a self, database: &'a Path, step: &'a EngineStep) -> BoxFuture<'a, Result<()>> {
        Box::pin(self.run(database, step))
    }
}
