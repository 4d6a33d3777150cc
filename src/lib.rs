//! # tdsql
//!
//! A regression-testing harness for analytical SQL. Each test case pairs an
//! "actual" query, derived from a SQL file with directive substitutions
//! applied, with a literal "expected" query; the harness executes both and
//! asserts the result sets are equivalent under a configurable tolerance
//! policy. Refactor a CTE or swap a join strategy, then prove the output
//! did not change.
//!
//! # Architecture
//!
//! ```text
//! ┌────────────────────────────────────────────────────────────┐
//! │                         Run Flow                           │
//! ├────────────────────────────────────────────────────────────┤
//! │  1. Resolve the specification tree (source links, globs,   │
//! │     config inheritance, cycle detection)                   │
//! │  2. Derive each actual query via the directive engine      │
//! │  3. Submit every (test, side) query to the worker pool     │
//! │  4. Collect all outcomes, persist result artifacts         │
//! │  5. Compare actual vs expected per test case               │
//! │  6. Report pass/fail summary                               │
//! └────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Usage
//!
//! ```bash
//! # run the suite rooted at ./tdsql.yaml
//! tdsql
//!
//! # run an explicit root, JSON report
//! tdsql path/to/suite.yaml --output json
//! ```

pub mod artifact;
pub mod client;
pub mod compare;
pub mod config;
pub mod error;
pub mod expr;
pub mod report;
pub mod runner;
pub mod spec;
pub mod table;
pub mod template;
pub mod testcase;

// Re-export main types for convenience
pub use client::QueryClient;
pub use config::TestConfig;
pub use error::{TdsqlError, TdsqlResult};
pub use report::{OutputFormat, TestReport};
pub use runner::{run, run_with_clients, ClientRegistry};
pub use spec::{resolve_tree, ResolvedTree, SpecUnit};
pub use table::{CellValue, QueryTable};
pub use testcase::{Side, SqlOutcome, TestCase};
