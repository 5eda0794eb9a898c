// tests/property_invariants.rs

use std::collections::{BTreeMap, HashSet};
use std::path::PathBuf;

use proptest::prelude::*;

use cascade::dag::{JobRunState, ScheduledJob, Scheduler};
use cascade::engine::{CoreCommand, CoreRuntime, JobOutcome, RunOptions, RuntimeEvent};
use cascade::hierarchy::CascadeSetup;
use cascade::jobs::{JobPlan, JobTable, JobTableBuilder, PathResolver};
use cascade::resume::{resume_plan, ResumePoint};
use cascade::types::JobId;
use cascade_test_utils::builders::CascadeConfigBuilder;

/// A random region tree: region `i` has parent `parents[i - 1] < i`.
#[derive(Debug, Clone)]
struct TreeCase {
    parents: Vec<usize>,
    goals: Vec<usize>,
    split_nodes: Vec<usize>,
    root_reference: bool,
}

impl TreeCase {
    fn setup(&self) -> CascadeSetup {
        let mut builder = CascadeConfigBuilder::new("n0").result_dir("/results");
        for (idx, parent) in self.parents.iter().enumerate() {
            builder = builder.child(&format!("n{parent}"), &format!("n{}", idx + 1));
        }
        for goal in &self.goals {
            builder = builder.goal(&format!("n{goal}"));
        }
        if !self.split_nodes.is_empty() {
            builder = builder.split_references(
                self.root_reference.then_some("both"),
                &["female", "both", "male"],
            );
            for node in &self.split_nodes {
                builder = builder.split_at(&format!("n{node}"));
            }
        }
        builder.setup()
    }
}

fn tree_case_strategy(max_regions: usize) -> impl Strategy<Value = TreeCase> {
    (1..=max_regions).prop_flat_map(|n| {
        (
            proptest::collection::vec(any::<usize>(), n - 1),
            proptest::collection::vec(0..n, 1..4),
            proptest::collection::vec(0..n, 0..3),
            any::<bool>(),
        )
            .prop_map(|(raw, goals, split_nodes, root_reference)| TreeCase {
                // Sanitize: only allow parents with a smaller index.
                parents: raw.iter().enumerate().map(|(i, r)| r % (i + 1)).collect(),
                goals,
                split_nodes,
                root_reference,
            })
    })
}

fn is_ancestor_or_self(setup: &CascadeSetup, ancestor: usize, node: usize) -> bool {
    setup.regions.path_from(ancestor, node).is_some()
}

fn strict_ancestors(table: &JobTable, job_id: JobId) -> Vec<JobId> {
    let mut out = Vec::new();
    let mut current = table.parent_of(job_id);
    while let Some(parent) = current {
        out.push(parent);
        current = table.parent_of(parent);
    }
    out
}

proptest! {
    #[test]
    fn child_ranges_partition_the_table(case in tree_case_strategy(12)) {
        let setup = case.setup();
        let table = JobTableBuilder::from_setup(&setup).unwrap().build_full().unwrap();

        prop_assert_eq!(table.get(0).unwrap().fit_node_id, setup.root_id);

        let mut seen = vec![0usize; table.len()];
        for job in table.iter() {
            prop_assert!(job.start_child_job_id <= job.end_child_job_id);
            for child in job.child_range() {
                prop_assert!(child > job.job_id, "child {} precedes parent {}", child, job.job_id);
                seen[child] += 1;
            }
        }
        prop_assert_eq!(seen[0], 0);
        prop_assert!(seen[1..].iter().all(|&count| count == 1));
    }

    #[test]
    fn children_are_pruned_children_or_split_fan_out(case in tree_case_strategy(12)) {
        let setup = case.setup();
        let table = JobTableBuilder::from_setup(&setup).unwrap().build_full().unwrap();

        for job in table.iter() {
            for child_id in job.child_range() {
                let child = table.get(child_id).unwrap();
                let is_region_child = setup.regions.parent(child.fit_node_id) == Some(job.fit_node_id)
                    && child.split_reference_id == job.split_reference_id;
                let is_fan_out = child.fit_node_id == job.fit_node_id
                    && setup.split_set.contains(job.fit_node_id)
                    && child.split_reference_id != job.split_reference_id;
                prop_assert!(is_region_child || is_fan_out, "{} -> {}", job.job_name, child.job_name);
            }
        }
    }

    #[test]
    fn goals_are_covered_and_nothing_else(case in tree_case_strategy(12)) {
        let setup = case.setup();
        let table = JobTableBuilder::from_setup(&setup).unwrap().build_full().unwrap();

        let fit: HashSet<usize> = table.iter().map(|j| j.fit_node_id).collect();
        for goal in &setup.goals {
            prop_assert!(fit.contains(goal), "goal n{} has no job", goal);
        }
        for node in &fit {
            prop_assert!(
                setup.goals.iter().any(|&g| is_ancestor_or_self(&setup, *node, g)),
                "n{} is not on a goal path", node
            );
        }
    }

    #[test]
    fn building_is_deterministic(case in tree_case_strategy(12)) {
        let setup = case.setup();
        let builder = JobTableBuilder::from_setup(&setup).unwrap();
        prop_assert_eq!(builder.build_full().unwrap(), builder.build_full().unwrap());
    }

    #[test]
    fn paths_are_pure_injective_and_invertible(case in tree_case_strategy(12)) {
        let setup = case.setup();
        let plan = JobPlan::for_cascade(&setup).unwrap();
        let resolver = PathResolver::new(&setup);

        let unique: HashSet<PathBuf> = (0..plan.len())
            .map(|id| plan.database(id).unwrap().to_path_buf())
            .collect();
        prop_assert_eq!(unique.len(), plan.len());

        for job in plan.table().iter() {
            let again = resolver.resolve(job.fit_node_id, job.split_reference_id).unwrap();
            prop_assert_eq!(plan.relative_dir(job.job_id).unwrap(), again.as_path());
            let located = resolver.locate(plan.database(job.job_id).unwrap()).unwrap();
            prop_assert_eq!(located, (job.fit_node_id, job.split_reference_id));
        }
    }

    #[test]
    fn resume_tables_equal_full_subtrees(case in tree_case_strategy(10)) {
        let setup = case.setup();
        let full = JobPlan::for_cascade(&setup).unwrap();

        // name -> (database, child names)
        let shape = |plan: &JobPlan, ids: Vec<JobId>| -> BTreeMap<String, (PathBuf, Vec<String>)> {
            ids.into_iter()
                .map(|id| {
                    let job = plan.job(id).unwrap();
                    let mut children: Vec<String> = job
                        .child_range()
                        .map(|c| plan.job(c).unwrap().job_name.clone())
                        .collect();
                    children.sort();
                    (job.job_name.clone(), (plan.database(id).unwrap().to_path_buf(), children))
                })
                .collect()
        };

        for job in full.table().iter() {
            let point = ResumePoint::database(full.database(job.job_id).unwrap());
            let resumed = resume_plan(&setup, &point).unwrap();
            prop_assert_eq!(
                shape(&resumed, (0..resumed.len()).collect()),
                shape(&full, full.table().subtree(job.job_id))
            );
        }
    }

    #[test]
    fn resume_accepts_exactly_the_jobs_of_the_full_table(case in tree_case_strategy(10)) {
        let setup = case.setup();
        let full = JobTableBuilder::from_setup(&setup).unwrap().build_full().unwrap();

        let mut splits: Vec<Option<&str>> = vec![None];
        splits.extend(setup.split_references.iter().map(|r| Some(r.name.as_str())));

        for region in setup.regions.iter() {
            for split in &splits {
                let point = match split {
                    Some(name) => ResumePoint::split(region.name.clone(), *name),
                    None => ResumePoint::region(region.name.clone()),
                };
                let (node, split_id) = point.resolve(&setup).unwrap();
                let is_job = full.find(node, split_id).is_some();
                prop_assert_eq!(resume_plan(&setup, &point).is_ok(), is_job, "{:?}", point);
            }
        }
    }

    #[test]
    fn scheduler_respects_order_limit_and_failures(
        case in tree_case_strategy(10),
        worker_limit in 1usize..4,
        picks in proptest::collection::vec(any::<usize>(), 64),
        failing in proptest::collection::vec(any::<usize>(), 0..3),
    ) {
        let setup = case.setup();
        let plan = JobPlan::for_cascade(&setup).unwrap();
        let table = plan.table().clone();
        let failing: HashSet<JobId> = failing.iter().map(|f| f % plan.len()).collect();

        let mut core = CoreRuntime::new(Scheduler::from_plan(&plan), RunOptions::with_workers(worker_limit));
        let mut step = core.start().unwrap();
        let mut running: Vec<ScheduledJob> = Vec::new();
        let mut k = 0;

        loop {
            for command in step.commands {
                if let CoreCommand::DispatchJobs(jobs) = command {
                    for job in jobs {
                        if let Some(parent) = table.parent_of(job.job_id) {
                            prop_assert_eq!(core.run_state_of(parent), Some(JobRunState::Done));
                        }
                        prop_assert!(running.iter().all(|r| r.database != job.database));
                        running.push(job);
                    }
                }
            }
            prop_assert!(running.len() <= worker_limit);
            if !step.keep_running {
                break;
            }

            prop_assert!(!running.is_empty(), "run stalled with nothing running");
            let job = running.remove(picks[k % picks.len()] % running.len());
            k += 1;
            let outcome = if failing.contains(&job.job_id) {
                JobOutcome::Failed("injected".into())
            } else {
                JobOutcome::Success
            };
            step = core.step(RuntimeEvent::JobCompleted { job_id: job.job_id, outcome });
        }

        prop_assert!(running.is_empty());
        let report = core.report();
        let failed: HashSet<JobId> = report.failures.iter().map(|f| f.job_id).collect();
        for job_id in 0..plan.len() {
            let blocked_by_ancestor = strict_ancestors(&table, job_id)
                .iter()
                .any(|a| failed.contains(a));
            if blocked_by_ancestor {
                prop_assert!(report.blocked.contains(&job_id));
            } else if failing.contains(&job_id) {
                prop_assert!(failed.contains(&job_id));
            } else {
                prop_assert!(report.completed.contains(&job_id));
            }
        }
    }
}
