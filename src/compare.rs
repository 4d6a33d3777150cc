//! Tolerant tabular comparison
//!
//! Evaluates one test case once both result slots are populated. Checks run
//! in a fixed order and the first failure wins: captured query errors,
//! column alignment, cell-by-cell values over the overlapping rows, then
//! row counts. Floating-point cells pass inside
//! `expected*(1-tol) <= actual <= expected*(1+tol)` — the interval is
//! anchored on the expected value and inclusive on both ends.

use crate::config::TestConfig;
use crate::error::{TdsqlError, TdsqlResult};
use crate::table::{CellValue, QueryTable};
use crate::testcase::{SqlOutcome, TestCase};

/// Compare a test case's actual and expected results, consuming both slots
pub fn compare(test: &mut TestCase, config: &TestConfig) -> TdsqlResult<()> {
    let name = test.display_name();

    let actual = test.actual_result.take().ok_or_else(|| TdsqlError::Internal {
        message: format!("{}: actual result slot was never populated", name),
    })?;
    let expected = test
        .expected_result
        .take()
        .ok_or_else(|| TdsqlError::Internal {
            message: format!("{}: expected result slot was never populated", name),
        })?;

    let mut actual = match actual {
        SqlOutcome::Table(t) => t,
        SqlOutcome::Failed(diagnostic) => {
            return Err(assertion(format!(
                "{}: invalid query\n{}\n{}",
                name, test.actual_sql, diagnostic
            )));
        }
    };
    let mut expected = match expected {
        SqlOutcome::Table(t) => t,
        SqlOutcome::Failed(diagnostic) => {
            return Err(assertion(format!(
                "{}: invalid query\n{}\n{}",
                name, test.expected_sql, diagnostic
            )));
        }
    };

    if config.auto_sort {
        actual.sort_rows();
        expected.sort_rows();
    }

    check_columns(&name, &actual, &expected, config)?;
    check_cells(&name, &actual, &expected, config)?;
    check_row_counts(&name, &actual, &expected)?;

    Ok(())
}

fn check_columns(
    name: &str,
    actual: &QueryTable,
    expected: &QueryTable,
    config: &TestConfig,
) -> TdsqlResult<()> {
    if config.ignore_column_name {
        if actual.column_count() != expected.column_count() {
            return Err(assertion(format!(
                "{}: number of columns does not match\nactual: {}, expected: {}",
                name,
                actual.column_count(),
                expected.column_count()
            )));
        }
        return Ok(());
    }

    let actual_only: Vec<&String> = actual
        .columns()
        .iter()
        .filter(|c| expected.column_index(c).is_none())
        .collect();
    let expected_only: Vec<&String> = expected
        .columns()
        .iter()
        .filter(|c| actual.column_index(c).is_none())
        .collect();

    if !actual_only.is_empty() {
        return Err(assertion(format!(
            "{}: {} only exists in actual result",
            name,
            format_name_set(&actual_only)
        )));
    }
    if !expected_only.is_empty() {
        return Err(assertion(format!(
            "{}: {} only exists in expected result",
            name,
            format_name_set(&expected_only)
        )));
    }
    Ok(())
}

fn check_cells(
    name: &str,
    actual: &QueryTable,
    expected: &QueryTable,
    config: &TestConfig,
) -> TdsqlResult<()> {
    let overlap = actual.row_count().min(expected.row_count());

    for i in 0..overlap {
        if config.ignore_column_name {
            for c in 0..actual.column_count() {
                let a = &actual.rows()[i][c];
                let e = &expected.rows()[i][c];
                if !cells_equal(a, e, config.acceptable_error) {
                    return Err(assertion(format!(
                        "{}: value does not match at line: {}, column: {}\nactual: {}, expected: {}",
                        name,
                        i + 1,
                        c + 1,
                        a,
                        e
                    )));
                }
            }
        } else {
            for (c, column) in actual.columns().iter().enumerate() {
                // the column-set check already guaranteed the lookup succeeds
                let ec = expected.column_index(column).ok_or_else(|| {
                    TdsqlError::Internal {
                        message: format!("{}: column `{}` vanished between checks", name, column),
                    }
                })?;
                let a = &actual.rows()[i][c];
                let e = &expected.rows()[i][ec];
                if !cells_equal(a, e, config.acceptable_error) {
                    return Err(assertion(format!(
                        "{}: value does not match at line: {}, column: {}\nactual: {}, expected: {}",
                        name,
                        i + 1,
                        column,
                        a,
                        e
                    )));
                }
            }
        }
    }
    Ok(())
}

fn check_row_counts(name: &str, actual: &QueryTable, expected: &QueryTable) -> TdsqlResult<()> {
    if actual.row_count() > expected.row_count() {
        return Err(assertion(format!(
            "{}: actual result is longer than expected result",
            name
        )));
    }
    if actual.row_count() < expected.row_count() {
        return Err(assertion(format!(
            "{}: expected result is longer than actual result",
            name
        )));
    }
    Ok(())
}

/// Two cells match iff both are null; or their runtime types agree and the
/// values are equal, with the tolerance interval applied to float pairs
fn cells_equal(actual: &CellValue, expected: &CellValue, tolerance: f64) -> bool {
    if actual.is_null() || expected.is_null() {
        return actual.is_null() && expected.is_null();
    }
    if actual.type_name() != expected.type_name() {
        return false;
    }
    if let (CellValue::Float(a), CellValue::Float(e)) = (actual, expected) {
        let lo = e * (1.0 - tolerance);
        let hi = e * (1.0 + tolerance);
        return lo <= *a && *a <= hi;
    }
    actual == expected
}

fn format_name_set(names: &[&String]) -> String {
    let mut sorted: Vec<&str> = names.iter().map(|s| s.as_str()).collect();
    sorted.sort_unstable();
    let quoted: Vec<String> = sorted.iter().map(|n| format!("'{}'", n)).collect();
    format!("{{{}}}", quoted.join(", "))
}

fn assertion(message: String) -> TdsqlError {
    TdsqlError::Assertion { message }
}
