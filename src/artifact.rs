//! Result artifacts
//!
//! Every specification file owns a sibling `.tdsql_log/` directory. The
//! directory is cleared and recreated at the start of a run and carries a
//! `.gitignore` marker so artifacts never land in version control. Each
//! query side that returned a table is persisted as
//! `{sql-stem}_{id}_{side}.csv`.

use std::fs;
use std::path::{Path, PathBuf};

use crate::error::{TdsqlError, TdsqlResult};
use crate::table::QueryTable;
use crate::testcase::{Side, TestCase};

/// Name of the per-spec-file result directory
pub const RESULT_DIR_NAME: &str = ".tdsql_log";

const GITIGNORE_CONTENT: &str = "# created by tdsql\n*\n";

/// Clear and recreate the result directory next to a specification file,
/// with its version-control marker
pub fn make_result_dir(spec_dir: &Path) -> TdsqlResult<PathBuf> {
    let result_dir = spec_dir.join(RESULT_DIR_NAME);
    if result_dir.exists() {
        fs::remove_dir_all(&result_dir).map_err(|e| io_error(e, &result_dir))?;
    }
    fs::create_dir_all(&result_dir).map_err(|e| io_error(e, &result_dir))?;

    let marker = result_dir.join(".gitignore");
    fs::write(&marker, GITIGNORE_CONTENT).map_err(|e| io_error(e, &marker))?;

    Ok(result_dir)
}

/// Persist one side's result set as a delimited artifact
pub fn save_result(
    result_dir: &Path,
    test: &TestCase,
    side: Side,
    table: &QueryTable,
) -> TdsqlResult<()> {
    let file = result_dir.join(format!("{}_{}.csv", test.display_name(), side.as_str()));
    fs::write(&file, table.to_csv()).map_err(|e| io_error(e, &file))
}

fn io_error(e: std::io::Error, path: &Path) -> TdsqlError {
    TdsqlError::Io {
        message: e.to_string(),
        path: path.display().to_string(),
    }
}
