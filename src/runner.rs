//! Concurrent test orchestration
//!
//! The run proceeds in two hard phases: every (test id, side) query across
//! every specification file is submitted to a bounded worker pool before
//! any result is awaited, then every outcome is collected and correlated
//! back by key. Query executions are network-bound and independent, so the
//! submit-all barrier maximizes overlap across the whole tree.
//!
//! A failed execution is captured into its test case's slot as data and
//! never aborts sibling work. The pool offers no timeout; bounding a hung
//! query is the backend's responsibility.

use std::collections::{BTreeSet, HashMap};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tokio::sync::Semaphore;
use tokio::task::JoinSet;

use crate::artifact;
use crate::client::{self, QueryClient};
use crate::compare;
use crate::error::{TdsqlError, TdsqlResult};
use crate::report::{ReportBuilder, TestReport};
use crate::spec::{self, ResolvedTree};
use crate::testcase::{Side, SqlOutcome};

/// Clients keyed by the `database` value they serve
pub type ClientRegistry = HashMap<String, Arc<dyn QueryClient>>;

/// Resolve the tree under `root` and run every discovered test case
pub async fn run(root: &Path) -> TdsqlResult<TestReport> {
    let tree = spec::resolve_tree(root)?;
    let registry = build_registry(&tree)?;
    execute(tree, registry).await
}

/// Like [`run`], but with a caller-supplied client registry. This is the
/// seam tests use to plug a scripted backend.
pub async fn run_with_clients(root: &Path, registry: ClientRegistry) -> TdsqlResult<TestReport> {
    let tree = spec::resolve_tree(root)?;
    execute(tree, registry).await
}

/// Build one client per distinct `database` value in the tree
pub fn build_registry(tree: &ResolvedTree) -> TdsqlResult<ClientRegistry> {
    let mut registry = ClientRegistry::new();
    for unit in &tree.units {
        if !registry.contains_key(&unit.config.database) {
            let client = client::get_client(&unit.config)?;
            registry.insert(unit.config.database.clone(), client);
        }
    }
    Ok(registry)
}

async fn execute(mut tree: ResolvedTree, registry: ClientRegistry) -> TdsqlResult<TestReport> {
    // result directories first, deduplicated across spec files sharing one
    let spec_dirs: BTreeSet<PathBuf> = tree
        .units
        .iter()
        .map(|u| parent_dir(&u.path))
        .collect();
    for dir in &spec_dirs {
        artifact::make_result_dir(dir)?;
    }

    // phase (a): submit every unit of work before awaiting anything
    let max_threads = tree.root_config().max_threads;
    let semaphore = Arc::new(Semaphore::new(max_threads));
    let mut join_set: JoinSet<((u32, Side), SqlOutcome)> = JoinSet::new();

    for unit in &tree.units {
        let client = registry
            .get(&unit.config.database)
            .cloned()
            .ok_or_else(|| TdsqlError::Internal {
                message: format!("no client registered for `{}`", unit.config.database),
            })?;

        for test in &unit.test_cases {
            for side in [Side::Actual, Side::Expected] {
                let client = client.clone();
                let semaphore = semaphore.clone();
                let sql = test.sql_for(side).to_string();
                let key = (test.id, side);

                join_set.spawn(async move {
                    let _permit = semaphore.acquire().await.unwrap();
                    log::debug!("executing test {} ({})", key.0, side.as_str());
                    let outcome = match client.select(&sql).await {
                        Ok(table) => SqlOutcome::Table(table),
                        Err(TdsqlError::Query { message }) => SqlOutcome::Failed(message),
                        Err(other) => SqlOutcome::Failed(other.to_string()),
                    };
                    (key, outcome)
                });
            }
        }
    }

    // phase (b): drain the pool; each key is written exactly once
    let mut outcomes: HashMap<(u32, Side), SqlOutcome> = HashMap::new();
    while let Some(joined) = join_set.join_next().await {
        match joined {
            Ok((key, outcome)) => {
                outcomes.insert(key, outcome);
            }
            Err(e) => {
                // the slot stays empty and the comparator reports the
                // invariant violation for the affected test
                log::error!("task join error: {}", e);
            }
        }
    }

    // correlate outcomes into slots and persist artifacts, sequentially
    // per specification file
    for unit in &mut tree.units {
        let result_dir = parent_dir(&unit.path).join(artifact::RESULT_DIR_NAME);
        for test in &mut unit.test_cases {
            for side in [Side::Actual, Side::Expected] {
                if let Some(outcome) = outcomes.remove(&(test.id, side)) {
                    if unit.config.save_result {
                        if let SqlOutcome::Table(table) = &outcome {
                            artifact::save_result(&result_dir, test, side, table)?;
                        }
                    }
                    *test.slot_mut(side) = Some(outcome);
                }
            }
        }
    }

    // compare every test case; assertion failures are collected, anything
    // else is a hard failure
    let mut builder = ReportBuilder::new();
    for unit in &mut tree.units {
        let config = unit.config.clone();
        for test in &mut unit.test_cases {
            let name = test.display_name();
            let id = test.id;
            match compare::compare(test, &config) {
                Ok(()) => builder.add_pass(&name, id),
                Err(TdsqlError::Assertion { message }) => {
                    log::error!("{}", message);
                    builder.add_failure(&name, id, &message);
                }
                Err(other) => return Err(other),
            }
        }
    }

    let report = builder.generate();
    log::info!(
        "{} tests passed, {} tests failed",
        report.summary.passed,
        report.summary.failed
    );
    Ok(report)
}

fn parent_dir(path: &Path) -> PathBuf {
    path.parent()
        .map(Path::to_path_buf)
        .unwrap_or_else(|| PathBuf::from("."))
}
