use std::collections::HashSet;
use std::future::Future;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::pin::Pin;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::sync::mpsc;

use cascade::dag::{ChildDatabase, ScheduledJob};
use cascade::engine::{JobOutcome, RuntimeEvent};
use cascade::errors::Result;
use cascade::exec::{BoxFuture, DatabaseDeriver, FitEngine, JobBackend};
use cascade::types::EngineStep;

/// One recorded engine invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineCall {
    pub database: PathBuf,
    pub step: String,
}

#[derive(Default)]
struct FakeEngineState {
    calls: Mutex<Vec<EngineCall>>,
    failing: Mutex<HashSet<PathBuf>>,
    panicking: Mutex<HashSet<PathBuf>>,
    active: Mutex<HashSet<PathBuf>>,
    running: AtomicUsize,
    max_running: AtomicUsize,
    shared_path_conflicts: AtomicUsize,
}

/// A fake fitting engine that:
/// - records every step it was asked to run
/// - appends the step to the database file, so derived children inherit
///   their parent's history
/// - fails (or panics) for configured databases
/// - tracks how many databases were being fit at once.
#[derive(Clone, Default)]
pub struct FakeEngine {
    state: Arc<FakeEngineState>,
    delay: Duration,
}

impl FakeEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sleep this long inside every step, to let jobs overlap.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn fail_for(self, database: impl AsRef<Path>) -> Self {
        self.state
            .failing
            .lock()
            .unwrap()
            .insert(database.as_ref().to_path_buf());
        self
    }

    /// Panic instead of returning an error when fitting `database`.
    pub fn panic_for(self, database: impl AsRef<Path>) -> Self {
        self.state
            .panicking
            .lock()
            .unwrap()
            .insert(database.as_ref().to_path_buf());
        self
    }

    pub fn calls(&self) -> Vec<EngineCall> {
        self.state.calls.lock().unwrap().clone()
    }

    /// Databases in the order their first step ran.
    pub fn databases(&self) -> Vec<PathBuf> {
        let mut seen = HashSet::new();
        self.calls()
            .into_iter()
            .filter(|c| seen.insert(c.database.clone()))
            .map(|c| c.database)
            .collect()
    }

    pub fn max_concurrent(&self) -> usize {
        self.state.max_running.load(Ordering::SeqCst)
    }

    /// How often a step started on a database another step was still using.
    pub fn shared_path_conflicts(&self) -> usize {
        self.state.shared_path_conflicts.load(Ordering::SeqCst)
    }

    fn enter(&self, database: &Path) {
        let running = self.state.running.fetch_add(1, Ordering::SeqCst) + 1;
        self.state.max_running.fetch_max(running, Ordering::SeqCst);
        if !self.state.active.lock().unwrap().insert(database.to_path_buf()) {
            self.state.shared_path_conflicts.fetch_add(1, Ordering::SeqCst);
        }
    }

    fn leave(&self, database: &Path) {
        self.state.active.lock().unwrap().remove(database);
        self.state.running.fetch_sub(1, Ordering::SeqCst);
    }
}

impl FitEngine for FakeEngine {
    fn run_step<'a>(&'a self, database: &'a Path, step: &'a EngineStep) -> BoxFuture<'a, anyhow::Result<()>> {
        Box::pin(async move {
            self.enter(database);
            self.state.calls.lock().unwrap().push(EngineCall {
                database: database.to_path_buf(),
                step: step.to_string(),
            });

            if !self.delay.is_zero() {
                tokio::time::sleep(self.delay).await;
            }

            if self.state.panicking.lock().unwrap().contains(database) {
                self.leave(database);
                panic!("fake engine panic for {}", database.display());
            }

            let result = if self.state.failing.lock().unwrap().contains(database) {
                Err(anyhow::anyhow!("fake engine failure for {}", database.display()))
            } else {
                std::fs::OpenOptions::new()
                    .append(true)
                    .open(database)
                    .and_then(|mut f| writeln!(f, "{step}"))
                    .map_err(anyhow::Error::from)
            };

            self.leave(database);
            result
        })
    }
}

/// One recorded derivation call.
#[derive(Debug, Clone, PartialEq)]
pub struct DeriveCall {
    pub parent: PathBuf,
    pub children: Vec<ChildDatabase>,
}

/// A fake deriver that records each call and copies the parent database
/// into every child.
#[derive(Clone, Default)]
pub struct FakeDeriver {
    calls: Arc<Mutex<Vec<DeriveCall>>>,
}

impl FakeDeriver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn calls(&self) -> Vec<DeriveCall> {
        self.calls.lock().unwrap().clone()
    }
}

impl DatabaseDeriver for FakeDeriver {
    fn derive_children<'a>(
        &'a self,
        parent: &'a Path,
        children: &'a [ChildDatabase],
    ) -> BoxFuture<'a, anyhow::Result<()>> {
        Box::pin(async move {
            self.calls.lock().unwrap().push(DeriveCall {
                parent: parent.to_path_buf(),
                children: children.to_vec(),
            });
            for child in children {
                std::fs::copy(parent, &child.database)?;
            }
            Ok(())
        })
    }
}

/// A backend that never touches the filesystem:
/// - records the names of dispatched jobs, batch by batch
/// - immediately reports each job as succeeded, or failed if its name was
///   registered with [`RecordingBackend::fail_job`].
pub struct RecordingBackend {
    runtime_tx: mpsc::Sender<RuntimeEvent>,
    dispatched: Arc<Mutex<Vec<Vec<String>>>>,
    failing: HashSet<String>,
}

impl RecordingBackend {
    pub fn new(
        runtime_tx: mpsc::Sender<RuntimeEvent>,
        dispatched: Arc<Mutex<Vec<Vec<String>>>>,
    ) -> Self {
        Self {
            runtime_tx,
            dispatched,
            failing: HashSet::new(),
        }
    }

    pub fn fail_job(mut self, name: &str) -> Self {
        self.failing.insert(name.to_string());
        self
    }
}

impl JobBackend for RecordingBackend {
    fn dispatch_jobs(
        &mut self,
        jobs: Vec<ScheduledJob>,
    ) -> Pin<Box<dyn Future<Output = Result<()>> + Send + '_>> {
        let tx = self.runtime_tx.clone();
        let dispatched = Arc::clone(&self.dispatched);
        let failing = self.failing.clone();

        Box::pin(async move {
            {
                let mut guard = dispatched.lock().unwrap();
                guard.push(jobs.iter().map(|j| j.name.clone()).collect());
            }

            for job in jobs {
                let outcome = if failing.contains(&job.name) {
                    JobOutcome::Failed(format!("{} failed", job.name))
                } else {
                    JobOutcome::Success
                };
                tx.send(RuntimeEvent::JobCompleted {
                    job_id: job.job_id,
                    outcome,
                })
                .await
                .map_err(anyhow::Error::from)?;
            }
            Ok(())
        })
    }
}
