// src/exec/job_runner.rs

//! Individual job runner.

use std::path::Path;
use std::sync::Arc;

use anyhow::{anyhow, bail, Context, Result};
use tokio::sync::mpsc;
use tokio::task::JoinError;
use tracing::{error, info, warn};

use crate::dag::{ChildDatabase, ScheduledJob};
use crate::engine::{JobOutcome, RuntimeEvent};
use crate::exec::backend::JobResources;
use crate::exec::shared::MessageType;

/// Run a single job and emit exactly one `JobCompleted` event for it.
///
/// Any error, including a panic inside the engine or deriver, is recorded in
/// the cascade log and reported as `JobOutcome::Failed`; it never aborts
/// sibling jobs.
pub async fn run_job(
    job: ScheduledJob,
    resources: Arc<JobResources>,
    runtime_tx: mpsc::Sender<RuntimeEvent>,
) {
    let worker = {
        let job = job.clone();
        let resources = Arc::clone(&resources);
        tokio::spawn(async move { run_job_inner(&job, &resources).await })
    };
    let result = match worker.await {
        Ok(result) => result,
        Err(join_err) => Err(anyhow!("job task {}", describe_join_error(join_err))),
    };

    let outcome = match result {
        Ok(()) => JobOutcome::Success,
        Err(err) => {
            let detail = format!("{err:#}");
            error!(
                job = %job.name,
                job_id = job.job_id,
                database = %job.database.display(),
                error = %detail,
                "job failed"
            );
            if let Err(log_err) = resources
                .shared
                .append(&job.name, MessageType::Error, detail.clone())
                .await
            {
                warn!(job = %job.name, error = %log_err, "could not record job failure");
            }
            JobOutcome::Failed(detail)
        }
    };

    if runtime_tx
        .send(RuntimeEvent::JobCompleted {
            job_id: job.job_id,
            outcome,
        })
        .await
        .is_err()
    {
        warn!(job = %job.name, "runtime is gone; dropping completion event");
    }
}

fn describe_join_error(err: JoinError) -> String {
    if !err.is_panic() {
        return "was cancelled".to_string();
    }
    let payload = err.into_panic();
    let message = payload
        .downcast_ref::<&str>()
        .map(|s| s.to_string())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "unknown panic payload".to_string());
    format!("panicked: {message}")
}

async fn run_job_inner(job: &ScheduledJob, resources: &JobResources) -> Result<()> {
    let exists = tokio::fs::try_exists(&job.database)
        .await
        .with_context(|| format!("checking {}", job.database.display()))?;
    if !exists {
        bail!("working database {} does not exist", job.database.display());
    }

    let begin = match &job.split_reference {
        Some(reference) => format!("fit {} with split reference {}", job.name, reference.name),
        None => format!("fit {}", job.name),
    };
    resources.shared.append(&job.name, MessageType::Begin, begin).await?;

    info!(job = %job.name, database = %job.database.display(), "running engine steps");
    for step in &resources.steps {
        resources
            .engine
            .run_step(&job.database, step)
            .await
            .with_context(|| format!("engine step '{step}' failed for job '{}'", job.name))?;
    }

    derive_children(&job.database, &job.children, resources).await?;

    resources
        .shared
        .append(&job.name, MessageType::Done, format!("{} children derived", job.children.len()))
        .await?;
    info!(job = %job.name, children = job.children.len(), "job done");
    Ok(())
}

/// Create every child's directory and derive their databases from `parent`.
pub async fn derive_children(
    parent: &Path,
    children: &[ChildDatabase],
    resources: &JobResources,
) -> Result<()> {
    if children.is_empty() {
        return Ok(());
    }

    for child in children {
        tokio::fs::create_dir_all(&child.directory)
            .await
            .with_context(|| format!("creating {}", child.directory.display()))?;
    }

    resources
        .deriver
        .derive_children(parent, children)
        .await
        .with_context(|| format!("deriving child databases from {}", parent.display()))
}
