//! Test case model
//!
//! A test case pairs a derived "actual" query with a literal "expected"
//! query. The two result slots are written exactly once by the orchestrator
//! and read exactly once by the comparator; a failed execution is carried as
//! data, not as an error that would cross the concurrency boundary.

use std::path::PathBuf;

use crate::table::QueryTable;

/// Which side of a test case a query execution belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Side {
    Actual,
    Expected,
}

impl Side {
    pub fn as_str(&self) -> &'static str {
        match self {
            Side::Actual => "actual",
            Side::Expected => "expected",
        }
    }
}

/// Outcome of one query execution: a result set, or the backend's
/// diagnostic for a failed query
#[derive(Debug, Clone)]
pub enum SqlOutcome {
    Table(QueryTable),
    Failed(String),
}

/// One declared regression test
#[derive(Debug)]
pub struct TestCase {
    /// Run-wide unique id, assigned monotonically at discovery
    pub id: u32,

    /// The SQL file the actual query was derived from
    pub sql_path: PathBuf,

    /// Actual query, with directive substitutions already applied
    pub actual_sql: String,

    /// Literal golden query
    pub expected_sql: String,

    /// Result slot for the actual side, populated by the orchestrator
    pub actual_result: Option<SqlOutcome>,

    /// Result slot for the expected side, populated by the orchestrator
    pub expected_result: Option<SqlOutcome>,
}

impl TestCase {
    pub fn new(id: u32, sql_path: PathBuf, actual_sql: String, expected_sql: String) -> Self {
        Self {
            id,
            sql_path,
            actual_sql,
            expected_sql,
            actual_result: None,
            expected_result: None,
        }
    }

    /// `{sql-stem}_{id}`, the per-test context used in failure messages and
    /// artifact names
    pub fn display_name(&self) -> String {
        let stem = self
            .sql_path
            .file_stem()
            .map(|s| s.to_string_lossy().to_string())
            .unwrap_or_else(|| self.sql_path.display().to_string());
        format!("{}_{}", stem, self.id)
    }

    pub fn sql_for(&self, side: Side) -> &str {
        match side {
            Side::Actual => &self.actual_sql,
            Side::Expected => &self.expected_sql,
        }
    }

    pub fn slot_mut(&mut self, side: Side) -> &mut Option<SqlOutcome> {
        match side {
            Side::Actual => &mut self.actual_result,
            Side::Expected => &mut self.expected_result,
        }
    }
}
