//! Test configuration schema and resolution
//!
//! Every specification file resolves to one immutable `TestConfig`. A child
//! file inherits its parent's resolved configuration as defaults and may
//! override any field. Scalar values are coerced through a fixed ladder:
//! use the native type as-is, else attempt a direct conversion, else
//! evaluate the value as a restricted arithmetic expression (see `expr`).

use serde_yaml::{Mapping, Value};

use crate::error::{TdsqlError, TdsqlResult};
use crate::expr;

/// Default billing cap: 1 GiB scanned
pub const DEFAULT_MAX_BYTES_BILLED: i64 = 1024 * 1024 * 1024;

/// Default row cap per query
pub const DEFAULT_MAX_RESULTS: i64 = 1000;

/// Default fractional tolerance for floating-point cells
pub const DEFAULT_ACCEPTABLE_ERROR: f64 = 0.05;

/// Default worker pool size
pub const DEFAULT_MAX_THREADS: usize = 8;

/// Resolved configuration for one specification file
#[derive(Debug, Clone, PartialEq)]
pub struct TestConfig {
    /// Backend selector (closed set, see `client::get_client`)
    pub database: String,

    /// Upper bound on bytes scanned per query
    pub max_bytes_billed: i64,

    /// Upper bound on rows fetched per query
    pub max_results: i64,

    /// Sort both result sets before comparing
    pub auto_sort: bool,

    /// Fractional tolerance for floating-point cells, anchored on the
    /// expected value
    pub acceptable_error: f64,

    /// Compare column counts instead of column names
    pub ignore_column_name: bool,

    /// Persist result artifacts under the spec file's log directory
    pub save_result: bool,

    /// Worker pool size for query execution
    pub max_threads: usize,
}

impl TestConfig {
    /// Resolve a configuration from a parsed YAML mapping, inheriting any
    /// field the mapping does not set from `parent` (or from the fixed
    /// defaults at the root).
    pub fn from_mapping(
        mapping: &Mapping,
        parent: Option<&TestConfig>,
        path: &str,
    ) -> TdsqlResult<TestConfig> {
        let database = match lookup(mapping, "database") {
            Some(value) => coerce_string(value).map_err(|e| contextualize(e, "database", path))?,
            None => match parent {
                Some(p) => p.database.clone(),
                None => {
                    return Err(TdsqlError::invalid_at("`database` is required", path));
                }
            },
        };

        let max_bytes_billed = resolve_field(
            mapping,
            "max_bytes_billed",
            parent.map(|p| p.max_bytes_billed),
            DEFAULT_MAX_BYTES_BILLED,
            coerce_i64,
            path,
        )?;
        let max_results = resolve_field(
            mapping,
            "max_results",
            parent.map(|p| p.max_results),
            DEFAULT_MAX_RESULTS,
            coerce_i64,
            path,
        )?;
        let auto_sort = resolve_field(
            mapping,
            "auto_sort",
            parent.map(|p| p.auto_sort),
            true,
            coerce_bool,
            path,
        )?;
        let acceptable_error = resolve_field(
            mapping,
            "acceptable_error",
            parent.map(|p| p.acceptable_error),
            DEFAULT_ACCEPTABLE_ERROR,
            coerce_f64,
            path,
        )?;
        let ignore_column_name = resolve_field(
            mapping,
            "ignore_column_name",
            parent.map(|p| p.ignore_column_name),
            false,
            coerce_bool,
            path,
        )?;
        let save_result = resolve_field(
            mapping,
            "save_result",
            parent.map(|p| p.save_result),
            true,
            coerce_bool,
            path,
        )?;
        let max_threads = resolve_field(
            mapping,
            "max_threads",
            parent.map(|p| p.max_threads),
            DEFAULT_MAX_THREADS,
            coerce_usize,
            path,
        )?;

        if max_threads == 0 {
            return Err(TdsqlError::invalid_at("`max_threads` must be at least 1", path));
        }

        Ok(TestConfig {
            database,
            max_bytes_billed,
            max_results,
            auto_sort,
            acceptable_error,
            ignore_column_name,
            save_result,
            max_threads,
        })
    }
}

fn lookup<'a>(mapping: &'a Mapping, key: &str) -> Option<&'a Value> {
    let value = mapping.get(&Value::String(key.to_string()))?;
    // an explicit `key:` with no value reads as null, treat it as unset
    if value.is_null() {
        None
    } else {
        Some(value)
    }
}

fn resolve_field<T, F>(
    mapping: &Mapping,
    key: &str,
    inherited: Option<T>,
    default: T,
    coerce: F,
    path: &str,
) -> TdsqlResult<T>
where
    F: Fn(&Value) -> TdsqlResult<T>,
{
    match lookup(mapping, key) {
        Some(value) => coerce(value).map_err(|e| contextualize(e, key, path)),
        None => Ok(inherited.unwrap_or(default)),
    }
}

fn contextualize(err: TdsqlError, key: &str, path: &str) -> TdsqlError {
    match err {
        TdsqlError::InvalidInput { message, .. } => {
            TdsqlError::invalid_at(format!("field `{}`: {}", key, message), path)
        }
        other => other,
    }
}

fn coerce_string(value: &Value) -> TdsqlResult<String> {
    match value {
        Value::String(s) => Ok(s.clone()),
        Value::Number(n) => Ok(n.to_string()),
        Value::Bool(b) => Ok(b.to_string()),
        other => Err(TdsqlError::invalid(format!(
            "expected a string, got {:?}",
            other
        ))),
    }
}

fn coerce_i64(value: &Value) -> TdsqlResult<i64> {
    match value {
        Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                Ok(i)
            } else if let Some(f) = n.as_f64() {
                Ok(f as i64)
            } else {
                Err(TdsqlError::invalid(format!("`{:?}` is out of range", n)))
            }
        }
        Value::String(s) => match s.trim().parse::<i64>() {
            Ok(i) => Ok(i),
            Err(_) => expr::eval(s),
        },
        other => Err(TdsqlError::invalid(format!(
            "expected an integer, got {:?}",
            other
        ))),
    }
}

fn coerce_f64(value: &Value) -> TdsqlResult<f64> {
    match value {
        Value::Number(n) => n
            .as_f64()
            .ok_or_else(|| TdsqlError::invalid(format!("`{:?}` is out of range", n))),
        Value::String(s) => match s.trim().parse::<f64>() {
            Ok(f) => Ok(f),
            Err(_) => expr::eval(s).map(|i| i as f64),
        },
        other => Err(TdsqlError::invalid(format!(
            "expected a number, got {:?}",
            other
        ))),
    }
}

fn coerce_bool(value: &Value) -> TdsqlResult<bool> {
    match value {
        Value::Bool(b) => Ok(*b),
        Value::String(s) => match s.trim().to_lowercase().as_str() {
            "true" => Ok(true),
            "false" => Ok(false),
            other => Err(TdsqlError::invalid(format!(
                "expected a boolean, got `{}`",
                other
            ))),
        },
        other => Err(TdsqlError::invalid(format!(
            "expected a boolean, got {:?}",
            other
        ))),
    }
}

fn coerce_usize(value: &Value) -> TdsqlResult<usize> {
    let i = coerce_i64(value)?;
    usize::try_from(i).map_err(|_| TdsqlError::invalid(format!("`{}` must not be negative", i)))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mapping(yaml: &str) -> Mapping {
        let value: Value = serde_yaml::from_str(yaml).unwrap();
        match value {
            Value::Mapping(m) => m,
            other => panic!("expected a mapping, got {:?}", other),
        }
    }

    #[test]
    fn test_minimum_config_uses_defaults() {
        let config = TestConfig::from_mapping(&mapping("database: bigquery"), None, "t").unwrap();
        assert_eq!(config.database, "bigquery");
        assert_eq!(config.max_bytes_billed, DEFAULT_MAX_BYTES_BILLED);
        assert_eq!(config.max_results, DEFAULT_MAX_RESULTS);
        assert!(config.auto_sort);
        assert_eq!(config.acceptable_error, DEFAULT_ACCEPTABLE_ERROR);
        assert!(!config.ignore_column_name);
        assert!(config.save_result);
        assert_eq!(config.max_threads, DEFAULT_MAX_THREADS);
    }

    #[test]
    fn test_arithmetic_coercion() {
        let config = TestConfig::from_mapping(
            &mapping("database: bigquery\nmax_bytes_billed: '1024 ** 3'"),
            None,
            "t",
        )
        .unwrap();
        assert_eq!(config.max_bytes_billed, 1024_i64.pow(3));
    }

    #[test]
    fn test_string_parse_before_expression() {
        let config = TestConfig::from_mapping(
            &mapping("database: bigquery\nmax_results: '500'"),
            None,
            "t",
        )
        .unwrap();
        assert_eq!(config.max_results, 500);
    }

    #[test]
    fn test_float_field_accepts_scientific_notation() {
        let config = TestConfig::from_mapping(
            &mapping("database: bigquery\nacceptable_error: 1.0e-3"),
            None,
            "t",
        )
        .unwrap();
        assert!((config.acceptable_error - 0.001).abs() < 1e-12);
    }

    #[test]
    fn test_inheritance_overrides_and_defaults() {
        let parent = TestConfig::from_mapping(
            &mapping("database: foo\nmax_bytes_billed: 0"),
            None,
            "parent",
        )
        .unwrap();
        let child = TestConfig::from_mapping(
            &mapping("database: bigquery"),
            Some(&parent),
            "child",
        )
        .unwrap();
        assert_eq!(child.database, "bigquery");
        assert_eq!(child.max_bytes_billed, 0);
    }

    #[test]
    fn test_child_without_database_inherits() {
        let parent =
            TestConfig::from_mapping(&mapping("database: bigquery"), None, "parent").unwrap();
        let child =
            TestConfig::from_mapping(&mapping("auto_sort: false"), Some(&parent), "child").unwrap();
        assert_eq!(child.database, "bigquery");
        assert!(!child.auto_sort);
    }

    #[test]
    fn test_missing_database_at_root_is_fatal() {
        let err = TestConfig::from_mapping(&mapping("auto_sort: true"), None, "t").unwrap_err();
        assert!(err.to_string().contains("`database` is required"));
    }

    #[test]
    fn test_bad_expression_is_invalid_input() {
        let err = TestConfig::from_mapping(
            &mapping("database: bigquery\nmax_results: 'import os'"),
            None,
            "t",
        )
        .unwrap_err();
        assert!(err.to_string().contains("max_results"));
    }
}
