// tests/cascade_run.rs

use std::error::Error;
use std::time::Duration;

use cascade::exec::MessageType;
use cascade::jobs::JobPlan;
use cascade::run_cascade;
use cascade::summary::{existing_job_files, messages_by_job, read_log, write_summary};
use cascade::types::FitAction;
use cascade_test_utils::builders::{split_tree, three_region_tree, CascadeConfigBuilder};
use cascade_test_utils::fakes::{FakeDeriver, FakeEngine};
use cascade_test_utils::{fake_resources, init_tracing, seed_root_database, with_timeout};

type TestResult = Result<(), Box<dyn Error>>;

const ROOT_HISTORY: &str = "seed\nfit both\nsample asymptotic both 20\npredict sample\n";

#[tokio::test]
async fn whole_cascade_runs_engine_and_derives_children() -> TestResult {
    init_tracing();
    let dir = tempfile::tempdir()?;
    let setup = three_region_tree().result_dir(dir.path()).max_workers(2).setup();
    seed_root_database(&setup);

    let engine = FakeEngine::new();
    let deriver = FakeDeriver::new();
    let report = with_timeout(run_cascade(&setup, fake_resources(&setup, &engine, &deriver))).await?;

    assert!(report.is_success());
    assert_eq!(report.completed, vec![0, 1, 2]);

    let root_db = dir.path().join("n0/dismod.db");
    assert_eq!(engine.calls().len(), 9);
    assert_eq!(engine.databases()[0], root_db);

    // Leaves have no children, so only the root derives.
    let derives = deriver.calls();
    assert_eq!(derives.len(), 1);
    assert_eq!(derives[0].parent, root_db);
    let children: Vec<_> = derives[0].children.iter().map(|c| c.job_name.as_str()).collect();
    assert_eq!(children, vec!["n1", "n2"]);

    let leaf = std::fs::read_to_string(dir.path().join("n0/n1/dismod.db"))?;
    assert_eq!(leaf, format!("{ROOT_HISTORY}fit both\nsample asymptotic both 20\npredict sample\n"));

    let records = read_log(dir.path())?;
    assert_eq!(records.len(), 6);
    assert_eq!(records[0].job_name, "n0");
    assert_eq!(records[0].message_type, MessageType::Begin);
    assert_eq!(records[1].message_type, MessageType::Done);
    Ok(())
}

#[tokio::test]
async fn configured_engine_steps_replace_the_defaults() -> TestResult {
    init_tracing();
    let dir = tempfile::tempdir()?;
    let setup = three_region_tree()
        .result_dir(dir.path())
        .engine_step(FitAction::Init, &[])
        .engine_step(FitAction::Fit, &["fixed"])
        .setup();
    seed_root_database(&setup);

    let engine = FakeEngine::new();
    let deriver = FakeDeriver::new();
    with_timeout(run_cascade(&setup, fake_resources(&setup, &engine, &deriver))).await?;

    let steps: Vec<String> = engine.calls().into_iter().map(|c| c.step).collect();
    assert_eq!(steps.len(), 6);
    assert_eq!(&steps[..2], &["init".to_string(), "fit fixed".to_string()]);
    Ok(())
}

#[tokio::test]
async fn split_children_get_their_reference() -> TestResult {
    init_tracing();
    let dir = tempfile::tempdir()?;
    let setup = split_tree().result_dir(dir.path()).max_workers(3).setup();
    seed_root_database(&setup);

    let engine = FakeEngine::new();
    let deriver = FakeDeriver::new();
    let report = with_timeout(run_cascade(&setup, fake_resources(&setup, &engine, &deriver))).await?;
    assert_eq!(report.completed.len(), 7);

    let root_derive = deriver
        .calls()
        .into_iter()
        .find(|c| c.parent == dir.path().join("n0/dismod.db"))
        .expect("root derived its children");
    let refs: Vec<_> = root_derive
        .children
        .iter()
        .map(|c| c.split_reference.as_ref().map(|r| r.name.clone()))
        .collect();
    assert_eq!(refs, vec![Some("female".to_string()), Some("male".to_string())]);

    assert!(dir.path().join("n0/male/n2/dismod.db").is_file());
    Ok(())
}

#[tokio::test]
async fn running_jobs_respect_worker_limit_and_disjoint_paths() -> TestResult {
    init_tracing();
    let dir = tempfile::tempdir()?;
    let mut builder = CascadeConfigBuilder::new("root").result_dir(dir.path()).max_workers(2);
    for i in 0..6 {
        let name = format!("c{i}");
        builder = builder.child("root", &name).goal(&name);
    }
    let setup = builder.setup();
    seed_root_database(&setup);

    let engine = FakeEngine::new().with_delay(Duration::from_millis(20));
    let deriver = FakeDeriver::new();
    let report = with_timeout(run_cascade(&setup, fake_resources(&setup, &engine, &deriver))).await?;

    assert_eq!(report.completed.len(), 7);
    assert!(engine.max_concurrent() <= 2, "max concurrent {}", engine.max_concurrent());
    assert_eq!(engine.shared_path_conflicts(), 0);
    Ok(())
}

#[tokio::test]
async fn failed_job_blocks_descendants_and_is_logged() -> TestResult {
    init_tracing();
    let dir = tempfile::tempdir()?;
    let setup = CascadeConfigBuilder::new("n0")
        .child("n0", "n1")
        .child("n0", "n2")
        .child("n1", "n3")
        .goal("n2")
        .goal("n3")
        .result_dir(dir.path())
        .max_workers(2)
        .setup();
    seed_root_database(&setup);

    let failing_db = dir.path().join("n0/n1/dismod.db");
    let engine = FakeEngine::new().fail_for(&failing_db);
    let deriver = FakeDeriver::new();
    let report = with_timeout(run_cascade(&setup, fake_resources(&setup, &engine, &deriver))).await?;

    let plan = JobPlan::for_cascade(&setup)?;
    let name_of = |id: usize| plan.job(id).unwrap().job_name.clone();

    assert_eq!(report.failures.len(), 1);
    assert_eq!(report.failures[0].job_name, "n1");
    assert_eq!(report.failures[0].database, failing_db);
    assert!(report.failures[0].detail.contains("fake engine failure"));
    assert_eq!(report.blocked.iter().map(|&id| name_of(id)).collect::<Vec<_>>(), vec!["n3"]);
    assert!(report.completed.iter().any(|&id| name_of(id) == "n2"));
    assert!(!dir.path().join("n0/n1/n3/dismod.db").exists());

    let records = read_log(dir.path())?;
    let summary = write_summary(dir.path(), MessageType::Error, &records)?;
    let text = std::fs::read_to_string(summary)?;
    assert!(text.starts_with("n1\n"));
    assert!(text.contains("fake engine failure"));
    Ok(())
}

#[tokio::test]
async fn panicking_engine_fails_the_job_instead_of_stalling() -> TestResult {
    init_tracing();
    let dir = tempfile::tempdir()?;
    let setup = CascadeConfigBuilder::new("n0")
        .child("n0", "n1")
        .child("n0", "n2")
        .child("n1", "n3")
        .goal("n2")
        .goal("n3")
        .result_dir(dir.path())
        .max_workers(2)
        .setup();
    seed_root_database(&setup);

    let panicking_db = dir.path().join("n0/n1/dismod.db");
    let engine = FakeEngine::new().panic_for(&panicking_db);
    let deriver = FakeDeriver::new();
    let report = with_timeout(run_cascade(&setup, fake_resources(&setup, &engine, &deriver))).await?;

    let plan = JobPlan::for_cascade(&setup)?;
    let name_of = |id: usize| plan.job(id).unwrap().job_name.clone();

    assert_eq!(report.failures.len(), 1);
    assert_eq!(report.failures[0].job_name, "n1");
    assert!(report.failures[0].detail.contains("panicked"), "{}", report.failures[0].detail);
    assert!(report.failures[0].detail.contains("fake engine panic"));
    assert_eq!(report.blocked.iter().map(|&id| name_of(id)).collect::<Vec<_>>(), vec!["n3"]);
    assert!(report.completed.iter().any(|&id| name_of(id) == "n2"));

    let errors = messages_by_job(&read_log(dir.path())?, MessageType::Error);
    assert!(errors["n1"][0].contains("fake engine panic"));
    Ok(())
}

#[tokio::test]
async fn missing_root_database_fails_the_root_job() -> TestResult {
    init_tracing();
    let dir = tempfile::tempdir()?;
    let setup = three_region_tree().result_dir(dir.path()).setup();

    let engine = FakeEngine::new();
    let deriver = FakeDeriver::new();
    let report = with_timeout(run_cascade(&setup, fake_resources(&setup, &engine, &deriver))).await?;

    assert_eq!(report.failures.len(), 1);
    assert!(report.failures[0].detail.contains("does not exist"));
    assert_eq!(report.blocked, vec![1, 2]);
    assert!(engine.calls().is_empty());
    Ok(())
}

#[tokio::test]
async fn aggregation_finds_files_in_job_order() -> TestResult {
    init_tracing();
    let dir = tempfile::tempdir()?;
    let setup = three_region_tree().result_dir(dir.path()).setup();
    seed_root_database(&setup);

    let engine = FakeEngine::new();
    let deriver = FakeDeriver::new();
    with_timeout(run_cascade(&setup, fake_resources(&setup, &engine, &deriver))).await?;

    std::fs::write(dir.path().join("n0/n2/predict.csv"), "p\n")?;
    std::fs::write(dir.path().join("n0/predict.csv"), "p\n")?;

    let plan = JobPlan::for_cascade(&setup)?;
    assert_eq!(
        existing_job_files(&plan, "predict.csv"),
        vec![dir.path().join("n0/predict.csv"), dir.path().join("n0/n2/predict.csv")]
    );
    assert_eq!(existing_job_files(&plan, "dismod.db").len(), 3);
    Ok(())
}
