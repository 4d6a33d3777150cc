//! Specification-tree resolution tests
//!
//! Fixture trees are written into a TempDir; every test asserts on the
//! canonicalized paths the resolver returns.

use std::fs;
use std::path::{Path, PathBuf};

use tempfile::TempDir;

use tdsql::spec::resolve_tree;
use tdsql::TdsqlError;

/// Write a fixture file, creating parent directories as needed
fn write(dir: &Path, rel: &str, content: &str) {
    let path = dir.join(rel);
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).unwrap();
    }
    fs::write(path, content).unwrap();
}

fn canonical(dir: &Path, rel: &str) -> PathBuf {
    fs::canonicalize(dir.join(rel)).unwrap()
}

#[test]
fn test_single_file_tree() {
    let dir = TempDir::new().unwrap();
    write(dir.path(), "tdsql.yaml", "database: bigquery\n");

    let tree = resolve_tree(&dir.path().join("tdsql.yaml")).unwrap();
    assert_eq!(tree.units.len(), 1);
    assert_eq!(tree.units[0].path, canonical(dir.path(), "tdsql.yaml"));
    assert_eq!(tree.root_config().database, "bigquery");
}

#[test]
fn test_nested_sources_and_lists() {
    let dir = TempDir::new().unwrap();
    write(
        dir.path(),
        "tdsql.yaml",
        "database: bigquery\nsource: ./childs/child1.yaml\n",
    );
    write(
        dir.path(),
        "childs/child1.yaml",
        "source:\n  - ./child2.yaml\n  - child3.yml\n",
    );
    write(dir.path(), "childs/child2.yaml", "source:\n");
    write(dir.path(), "childs/child3.yml", "max_results: 5\n");

    let tree = resolve_tree(&dir.path().join("tdsql.yaml")).unwrap();
    let paths: Vec<&PathBuf> = tree.units.iter().map(|u| &u.path).collect();
    assert_eq!(
        paths,
        vec![
            &canonical(dir.path(), "tdsql.yaml"),
            &canonical(dir.path(), "childs/child1.yaml"),
            &canonical(dir.path(), "childs/child2.yaml"),
            &canonical(dir.path(), "childs/child3.yml"),
        ]
    );
}

#[test]
fn test_glob_source_excludes_self() {
    let dir = TempDir::new().unwrap();
    write(dir.path(), "tdsql.yaml", "database: bigquery\nsource: '*.yaml'\n");
    write(dir.path(), "child1.yaml", "max_results: 1\n");
    write(dir.path(), "child2.yaml", "max_results: 2\n");

    let tree = resolve_tree(&dir.path().join("tdsql.yaml")).unwrap();
    let mut paths: Vec<&PathBuf> = tree.units.iter().map(|u| &u.path).collect();
    paths.sort();
    let mut expected = vec![
        canonical(dir.path(), "tdsql.yaml"),
        canonical(dir.path(), "child1.yaml"),
        canonical(dir.path(), "child2.yaml"),
    ];
    expected.sort();
    assert_eq!(paths, expected.iter().collect::<Vec<_>>());
}

#[test]
fn test_diamond_is_deduplicated() {
    let dir = TempDir::new().unwrap();
    write(
        dir.path(),
        "tdsql.yaml",
        "database: bigquery\nsource:\n  - ./a.yaml\n  - ./b.yaml\n",
    );
    write(dir.path(), "a.yaml", "source: ./shared.yaml\n");
    write(dir.path(), "b.yaml", "source: ./shared.yaml\n");
    write(dir.path(), "shared.yaml", "max_results: 10\n");

    let tree = resolve_tree(&dir.path().join("tdsql.yaml")).unwrap();
    assert_eq!(tree.units.len(), 4);
    let shared = canonical(dir.path(), "shared.yaml");
    let count = tree.units.iter().filter(|u| u.path == shared).count();
    assert_eq!(count, 1);
}

#[test]
fn test_cycle_is_fatal() {
    let dir = TempDir::new().unwrap();
    write(
        dir.path(),
        "tdsql.yaml",
        "database: bigquery\nsource: ./childs/child1.yaml\n",
    );
    write(dir.path(), "childs/child1.yaml", "source: ../tdsql.yaml\n");

    let err = resolve_tree(&dir.path().join("tdsql.yaml")).unwrap_err();
    assert!(err.to_string().contains("detected circular reference"));
}

#[test]
fn test_missing_source_is_fatal() {
    let dir = TempDir::new().unwrap();
    write(
        dir.path(),
        "tdsql.yaml",
        "database: bigquery\nsource: ./nope.yaml\n",
    );

    let err = resolve_tree(&dir.path().join("tdsql.yaml")).unwrap_err();
    assert!(matches!(err, TdsqlError::InvalidInput { .. }));
}

#[test]
fn test_config_inheritance_down_the_tree() {
    let dir = TempDir::new().unwrap();
    write(
        dir.path(),
        "tdsql.yaml",
        "database: bigquery\nmax_bytes_billed: '1024 ** 2'\nsource: ./child.yaml\n",
    );
    write(dir.path(), "child.yaml", "auto_sort: false\n");

    let tree = resolve_tree(&dir.path().join("tdsql.yaml")).unwrap();
    let child = tree.get(&canonical(dir.path(), "child.yaml")).unwrap();
    assert_eq!(child.config.database, "bigquery");
    assert_eq!(child.config.max_bytes_billed, 1024 * 1024);
    assert!(!child.config.auto_sort);
    assert!(tree.root_config().auto_sort);
}

#[test]
fn test_ids_are_monotonic_across_files() {
    let dir = TempDir::new().unwrap();
    write(dir.path(), "q.sql", "SELECT 1\n");
    write(
        dir.path(),
        "tdsql.yaml",
        "database: bigquery\nsource: ./child.yaml\ntests:\n  - filepath: ./q.sql\n    expected: SELECT 1\n  - filepath: ./q.sql\n    expected: SELECT 2\n",
    );
    write(
        dir.path(),
        "child.yaml",
        "tests:\n  - filepath: ./q.sql\n    expected: SELECT 3\n",
    );

    let tree = resolve_tree(&dir.path().join("tdsql.yaml")).unwrap();
    let ids: Vec<u32> = tree
        .units
        .iter()
        .flat_map(|u| u.test_cases.iter().map(|t| t.id))
        .collect();
    assert_eq!(ids, vec![1, 2, 3]);
    assert_eq!(tree.test_count(), 3);
}

#[test]
fn test_replace_map_applied_at_discovery() {
    let dir = TempDir::new().unwrap();
    write(dir.path(), "q.sql", "SELECT 1 AS col -- tdsql-line: seed\n");
    write(
        dir.path(),
        "tdsql.yaml",
        "database: bigquery\ntests:\n  - filepath: ./q.sql\n    replace:\n      seed: SELECT 2 AS col\n    expected: SELECT 2 AS col\n",
    );

    let tree = resolve_tree(&dir.path().join("tdsql.yaml")).unwrap();
    let test = &tree.units[0].test_cases[0];
    assert_eq!(test.actual_sql, "SELECT 2 AS col\n");
    assert_eq!(test.expected_sql, "SELECT 2 AS col");
}

#[test]
fn test_directive_violation_aborts_resolution() {
    let dir = TempDir::new().unwrap();
    write(dir.path(), "q.sql", "SELECT 1\n");
    write(
        dir.path(),
        "tdsql.yaml",
        "database: bigquery\ntests:\n  - filepath: ./q.sql\n    replace:\n      ghost: SELECT 2\n    expected: SELECT 2\n",
    );

    let err = resolve_tree(&dir.path().join("tdsql.yaml")).unwrap_err();
    assert!(err.to_string().contains("`ghost` does not appear"));
}

#[test]
fn test_unknown_keys_are_ignored() {
    let dir = TempDir::new().unwrap();
    write(
        dir.path(),
        "tdsql.yaml",
        "database: bigquery\nsource: ./child.yml\n",
    );
    write(dir.path(), "child.yml", "foo: bar\n");

    let tree = resolve_tree(&dir.path().join("tdsql.yaml")).unwrap();
    assert_eq!(tree.units.len(), 2);
}
