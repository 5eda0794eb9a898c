use tracing::{debug, info, warn};

use crate::dag::job_info::{JobInfo, JobRunState, RunState, ScheduledJob};
use crate::dag::scheduler_step::SchedulerStep;
use crate::dag::state_manager::{ReadOnlyStateManager, StateManager};
use crate::engine::JobOutcome;
use crate::errors::{CascadeError, Result};
use crate::jobs::JobPlan;
use crate::types::JobId;

/// Scheduler holds the immutable job tree plus mutable per-run state.
///
/// It is responsible for:
/// - remembering which jobs are part of the current run
/// - releasing a job's children once it is done
/// - blocking the descendants of a failed job
///
/// It does not enforce the worker limit; the engine core decides which
/// `Ready` jobs are dispatched and calls [`Scheduler::mark_running`].
#[derive(Debug)]
pub struct Scheduler {
    jobs: Vec<JobInfo>,
    start_job_id: Option<JobId>,
    active: bool,
}

impl Scheduler {
    pub fn from_plan(plan: &JobPlan) -> Self {
        Self {
            jobs: JobInfo::from_plan(plan),
            start_job_id: None,
            active: false,
        }
    }

    pub fn len(&self) -> usize {
        self.jobs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.jobs.is_empty()
    }

    /// Returns `true` if there is currently no active run.
    pub fn is_idle(&self) -> bool {
        !self.active
    }

    pub fn start_job_id(&self) -> Option<JobId> {
        self.start_job_id
    }

    pub fn job(&self, job_id: JobId) -> Option<&JobInfo> {
        self.jobs.get(job_id)
    }

    /// Read-only view of the given job's run state.
    pub fn run_state_of(&self, job_id: JobId) -> Option<JobRunState> {
        let info = self.jobs.get(job_id)?;
        Some(info.run_state.into())
    }

    /// Jobs participating in the current (or last) run.
    pub fn jobs_in_current_run(&self) -> Vec<JobId> {
        self.jobs
            .iter()
            .filter(|info| info.run_state.is_some())
            .map(|info| info.job_id)
            .collect()
    }

    /// Jobs currently in `state`, in ascending id order.
    pub fn jobs_in_state(&self, state: JobRunState) -> Vec<JobId> {
        let run_state = match state {
            JobRunState::NotInRun => {
                return self
                    .jobs
                    .iter()
                    .filter(|info| info.run_state.is_none())
                    .map(|info| info.job_id)
                    .collect();
            }
            JobRunState::Pending => RunState::Pending,
            JobRunState::Ready => RunState::Ready,
            JobRunState::Running => RunState::Running,
            JobRunState::Done => RunState::Done,
            JobRunState::Failed => RunState::Failed,
            JobRunState::Blocked => RunState::Blocked,
        };
        ReadOnlyStateManager::new(&self.jobs).in_state(run_state)
    }

    /// Whether the parent of `job_id` is done for the current run.
    ///
    /// Returns `None` if the job is unknown.
    pub fn parent_satisfied(&self, job_id: JobId) -> Option<bool> {
        let info = self.jobs.get(job_id)?;
        Some(ReadOnlyStateManager::new(&self.jobs).parent_satisfied(info))
    }

    /// Start a run at `start_job_id`: the job and its descendants become
    /// `Pending`, everything else stays out of the run.
    ///
    /// With `skip_start_job` the start job is treated as already done and its
    /// children are released immediately.
    pub fn start_run(&mut self, start_job_id: JobId, skip_start_job: bool) -> Result<SchedulerStep> {
        if start_job_id >= self.jobs.len() {
            return Err(CascadeError::config(format!(
                "start job {start_job_id} is outside the job table of {} jobs",
                self.jobs.len()
            )));
        }

        for info in &mut self.jobs {
            info.run_state = None;
            info.failure = None;
        }
        self.start_job_id = Some(start_job_id);
        self.active = true;

        let mut manager = StateManager::new(&mut self.jobs);
        manager.mark_subtree_pending(start_job_id);

        let start = &mut self.jobs[start_job_id];
        let newly_ready = if skip_start_job {
            info!(job = %start.name, "start job already fit; releasing its children");
            start.run_state = Some(RunState::Done);
            StateManager::new(&mut self.jobs).collect_new_ready_jobs(start_job_id)
        } else {
            debug!(job = %start.name, "start job ready");
            start.run_state = Some(RunState::Ready);
            vec![start_job_id]
        };

        let run_just_finished = self.maybe_finish_run();
        Ok(SchedulerStep {
            newly_ready,
            run_just_finished,
            ..SchedulerStep::default()
        })
    }

    /// Move a `Ready` job to `Running`, returning what the backend needs.
    pub fn mark_running(&mut self, job_id: JobId) -> Option<ScheduledJob> {
        StateManager::new(&mut self.jobs).mark_running(job_id)
    }

    /// Handle completion of a job with a concrete outcome (production API).
    pub fn handle_completion(&mut self, job_id: JobId, outcome: JobOutcome) -> Vec<JobId> {
        self.completion_step_internal(job_id, outcome).newly_ready
    }

    /// Manual-step variant of `handle_completion` that returns a rich [`SchedulerStep`].
    pub fn step_completion(&mut self, job_id: JobId, outcome: JobOutcome) -> SchedulerStep {
        self.completion_step_internal(job_id, outcome)
    }

    /// Failure detail recorded for a failed job.
    pub fn failure_of(&self, job_id: JobId) -> Option<&str> {
        self.jobs.get(job_id)?.failure.as_deref()
    }

    /// Determine whether all participating jobs are terminal and mark the run
    /// as finished if so.
    ///
    /// Returns `true` if this call transitioned the scheduler to idle.
    fn maybe_finish_run(&mut self) -> bool {
        if !self.active {
            return false;
        }

        if ReadOnlyStateManager::new(&self.jobs).all_jobs_terminal() {
            info!(
                start_job_id = self.start_job_id,
                "scheduler: all jobs terminal; marking run as finished"
            );
            self.active = false;
            true
        } else {
            false
        }
    }

    fn completion_step_internal(&mut self, job_id: JobId, outcome: JobOutcome) -> SchedulerStep {
        if !self.active {
            warn!(job_id, "completion with no active run; ignoring");
            return SchedulerStep::default();
        }

        let mut step = SchedulerStep::default();

        match self.jobs.get_mut(job_id) {
            Some(info) if info.run_state == Some(RunState::Running) => match outcome {
                JobOutcome::Success => {
                    info.run_state = Some(RunState::Done);
                    debug!(job = %info.name, "job completed successfully");
                    step.newly_ready =
                        StateManager::new(&mut self.jobs).collect_new_ready_jobs(job_id);
                }
                JobOutcome::Failed(detail) => {
                    warn!(
                        job = %info.name,
                        detail = %detail,
                        "job failed; blocking its descendants"
                    );
                    info.run_state = Some(RunState::Failed);
                    info.failure = Some(detail);
                    step.newly_failed.push(job_id);
                    step.newly_blocked =
                        StateManager::new(&mut self.jobs).mark_descendants_blocked(job_id);
                }
            },
            Some(info) => {
                warn!(
                    job = %info.name,
                    state = ?info.run_state,
                    "completion for a job that is not running; ignoring"
                );
            }
            None => {
                warn!(job_id, "completion for unknown job; ignoring");
            }
        }

        step.run_just_finished = self.maybe_finish_run();
        step
    }
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use super::*;
    use crate::hierarchy::{CascadeSetup, Region, RegionTable, SplitReferenceTable, SplitSet};

    // n0 -> {n1, n2}, n1 -> {n3, n4}
    fn plan() -> JobPlan {
        let parents = [None, Some(0), Some(0), Some(1), Some(1)];
        let rows = parents
            .iter()
            .enumerate()
            .map(|(id, parent)| Region { id, name: format!("n{id}"), parent: *parent })
            .collect();
        let setup = CascadeSetup {
            regions: RegionTable::new(rows).unwrap(),
            split_references: SplitReferenceTable::default(),
            split_set: SplitSet::default(),
            root_id: 0,
            root_split_reference_id: None,
            goals: vec![2, 3, 4],
            result_dir: PathBuf::from("/results"),
            database_file: "dismod.db".into(),
            max_workers: 1,
            engine_program: "dismod_at".into(),
            engine_steps: Vec::new(),
        };
        JobPlan::for_cascade(&setup).unwrap()
    }

    fn run_to_running(s: &mut Scheduler, ids: &[JobId]) {
        for &id in ids {
            assert!(s.mark_running(id).is_some(), "job {id} should dispatch");
        }
    }

    #[test]
    fn start_releases_only_the_start_job() {
        let mut s = Scheduler::from_plan(&plan());
        let step = s.start_run(0, false).unwrap();
        assert_eq!(step.newly_ready, vec![0]);
        assert_eq!(s.run_state_of(0), Some(JobRunState::Ready));
        assert_eq!(s.jobs_in_state(JobRunState::Pending), vec![1, 2, 3, 4]);
    }

    #[test]
    fn children_become_ready_when_parent_is_done() {
        let mut s = Scheduler::from_plan(&plan());
        s.start_run(0, false).unwrap();
        run_to_running(&mut s, &[0]);

        let step = s.step_completion(0, JobOutcome::Success);
        assert_eq!(step.newly_ready, vec![1, 2]);
        assert_eq!(s.parent_satisfied(3), Some(false));

        run_to_running(&mut s, &[1]);
        assert_eq!(s.handle_completion(1, JobOutcome::Success), vec![3, 4]);
        assert_eq!(s.parent_satisfied(3), Some(true));
    }

    #[test]
    fn failure_blocks_descendants_but_not_siblings() {
        let mut s = Scheduler::from_plan(&plan());
        s.start_run(0, false).unwrap();
        run_to_running(&mut s, &[0]);
        s.step_completion(0, JobOutcome::Success);
        run_to_running(&mut s, &[1, 2]);

        let step = s.step_completion(1, JobOutcome::Failed("boom".into()));
        assert_eq!(step.newly_failed, vec![1]);
        assert_eq!(step.newly_blocked, vec![3, 4]);
        assert!(!step.run_just_finished);
        assert_eq!(s.failure_of(1), Some("boom"));

        let step = s.step_completion(2, JobOutcome::Success);
        assert!(step.run_just_finished);
        assert!(s.is_idle());
        assert_eq!(s.jobs_in_state(JobRunState::Done), vec![0, 2]);
    }

    #[test]
    fn skipping_the_start_job_releases_its_children() {
        let mut s = Scheduler::from_plan(&plan());
        let step = s.start_run(1, true).unwrap();
        assert_eq!(step.newly_ready, vec![3, 4]);
        assert_eq!(s.run_state_of(1), Some(JobRunState::Done));
        assert_eq!(s.run_state_of(0), Some(JobRunState::NotInRun));
        assert_eq!(s.run_state_of(2), Some(JobRunState::NotInRun));
        assert_eq!(s.jobs_in_current_run(), vec![1, 3, 4]);
    }

    #[test]
    fn skipping_a_leaf_start_job_finishes_immediately() {
        let mut s = Scheduler::from_plan(&plan());
        let step = s.start_run(4, true).unwrap();
        assert!(step.newly_ready.is_empty());
        assert!(step.run_just_finished);
    }

    #[test]
    fn out_of_range_start_is_rejected() {
        let mut s = Scheduler::from_plan(&plan());
        assert!(matches!(s.start_run(99, false), Err(CascadeError::ConfigError(_))));
    }

    #[test]
    fn pending_job_cannot_be_dispatched() {
        let mut s = Scheduler::from_plan(&plan());
        s.start_run(0, false).unwrap();
        assert!(s.mark_running(1).is_none());
    }

    #[test]
    fn completion_for_idle_job_is_ignored() {
        let mut s = Scheduler::from_plan(&plan());
        s.start_run(0, false).unwrap();
        let step = s.step_completion(3, JobOutcome::Success);
        assert_eq!(step, SchedulerStep::default());
        assert_eq!(s.run_state_of(3), Some(JobRunState::Pending));
    }

    #[test]
    fn scheduled_job_carries_child_databases() {
        let mut s = Scheduler::from_plan(&plan());
        s.start_run(0, false).unwrap();
        let job = s.mark_running(0).unwrap();
        assert_eq!(job.database, PathBuf::from("/results/n0/dismod.db"));
        let names: Vec<_> = job.children.iter().map(|c| c.job_name.as_str()).collect();
        assert_eq!(names, vec!["n1", "n2"]);
        assert_eq!(job.children[0].database, PathBuf::from("/results/n0/n1/dismod.db"));
    }
}
