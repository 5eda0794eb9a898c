pub mod builders;
pub mod fakes;

use std::path::Path;
use std::sync::{Arc, Once};

use cascade::exec::{JobResources, SharedState};
use cascade::hierarchy::CascadeSetup;
use cascade::jobs::PathResolver;
use tracing_subscriber::{fmt, EnvFilter};

use crate::fakes::{FakeDeriver, FakeEngine};

static INIT: Once = Once::new();

/// Initialise tracing for tests.
///
/// - Uses `with_test_writer()`, so logs are captured per-test.
/// - The Rust test harness only prints captured output for **failing** tests
///   (unless you run with `-- --nocapture`).
///
/// Enable levels with e.g.:
/// `CASCADE_LOG=debug cargo test`
pub fn init_tracing() {
    INIT.call_once(|| {
        let filter = EnvFilter::try_from_env("CASCADE_LOG").unwrap_or_else(|_| EnvFilter::new("info"));

        fmt()
            .with_env_filter(filter)
            .with_test_writer() // print only for failing tests unless --nocapture
            .with_target(true)
            .init();
    });
}

/// Run a future with a 10-second timeout.
#[allow(dead_code)]
pub async fn with_timeout<F, T>(f: F) -> T
where
    F: std::future::Future<Output = T>,
{
    tokio::time::timeout(std::time::Duration::from_secs(10), f)
        .await
        .expect("Test timed out after 10 seconds")
}

/// Create the root job's directory and an initial working database in it.
pub fn seed_root_database(setup: &CascadeSetup) -> std::path::PathBuf {
    let resolver = PathResolver::new(setup);
    let relative = resolver
        .resolve(setup.root_id, setup.root_split_reference_id)
        .expect("root job path");
    let database = resolver.database_path(&relative);
    seed_database(&database);
    database
}

/// Write an initial working database at `path`, creating its directory.
pub fn seed_database(path: &Path) {
    std::fs::create_dir_all(path.parent().expect("database has a parent directory"))
        .expect("create job directory");
    std::fs::write(path, "seed\n").expect("write seed database");
}

/// Resources wired to the given fakes and the setup's result directory.
pub fn fake_resources(setup: &CascadeSetup, engine: &FakeEngine, deriver: &FakeDeriver) -> JobResources {
    JobResources::new(
        Arc::new(engine.clone()),
        Arc::new(deriver.clone()),
        SharedState::for_result_dir(&setup.result_dir),
        setup.engine_steps.clone(),
    )
}
