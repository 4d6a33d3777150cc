//! Specification-tree resolution
//!
//! A run starts from one root YAML file. Each file may link further files
//! through `source` (a scalar, a list, or glob patterns), forming a
//! directed graph that is walked depth-first. The recursion keeps the
//! active ancestor stack rather than a single visited set: a path that
//! recurs on its own ancestor chain is a fatal cycle, while a diamond
//! (the same descendant reachable twice) is deduplicated and resolved once.
//!
//! Test-case ids are handed out by a counter threaded through the walk, so
//! they are unique and monotonic across the whole tree.

use std::collections::{HashMap, HashSet};
use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use serde_yaml::{Mapping, Value};

use crate::config::TestConfig;
use crate::error::{TdsqlError, TdsqlResult};
use crate::template;
use crate::testcase::TestCase;

/// One declared test in a specification file
#[derive(Debug, Deserialize)]
struct TestEntry {
    filepath: String,
    #[serde(default)]
    replace: HashMap<String, String>,
    expected: String,
}

/// A resolved specification file: its configuration and its test cases
#[derive(Debug)]
pub struct SpecUnit {
    pub path: PathBuf,
    pub config: TestConfig,
    pub test_cases: Vec<TestCase>,
}

/// The full resolved tree, in discovery (preorder) order, root first
#[derive(Debug)]
pub struct ResolvedTree {
    pub units: Vec<SpecUnit>,
}

impl ResolvedTree {
    /// Configuration of the root specification file
    pub fn root_config(&self) -> &TestConfig {
        &self.units[0].config
    }

    pub fn get(&self, path: &Path) -> Option<&SpecUnit> {
        self.units.iter().find(|u| u.path == path)
    }

    pub fn test_count(&self) -> usize {
        self.units.iter().map(|u| u.test_cases.len()).sum()
    }
}

/// Resolve every specification file reachable from `root`
pub fn resolve_tree(root: &Path) -> TdsqlResult<ResolvedTree> {
    let root = canonicalize(root)?;
    let mut walker = Walker {
        stack: Vec::new(),
        resolved: HashSet::new(),
        units: Vec::new(),
        next_id: 1,
    };
    walker.visit(&root, None)?;
    Ok(ResolvedTree {
        units: walker.units,
    })
}

struct Walker {
    /// Paths currently being visited, root-down
    stack: Vec<PathBuf>,
    /// Paths already fully resolved (diamond dedup)
    resolved: HashSet<PathBuf>,
    units: Vec<SpecUnit>,
    next_id: u32,
}

impl Walker {
    fn visit(&mut self, path: &PathBuf, parent: Option<&TestConfig>) -> TdsqlResult<()> {
        if self.stack.contains(path) {
            return Err(TdsqlError::invalid_at(
                "detected circular reference",
                path.display().to_string(),
            ));
        }
        if self.resolved.contains(path) {
            return Ok(());
        }

        let display = path.display().to_string();
        let content = fs::read_to_string(path).map_err(|e| TdsqlError::Io {
            message: e.to_string(),
            path: display.clone(),
        })?;
        let value: Value = serde_yaml::from_str(&content)
            .map_err(|e| TdsqlError::invalid_at(e.to_string(), display.clone()))?;
        let mapping = match value {
            Value::Mapping(m) => m,
            Value::Null => Mapping::new(),
            other => {
                return Err(TdsqlError::invalid_at(
                    format!("expected a mapping at the top level, got {:?}", other),
                    display,
                ));
            }
        };

        let dir = path
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from("."));

        let config = TestConfig::from_mapping(&mapping, parent, &display)?;
        let test_cases = self.parse_tests(&mapping, &dir, &display)?;
        let children = resolve_sources(&mapping, &dir, path, &display)?;

        self.units.push(SpecUnit {
            path: path.clone(),
            config: config.clone(),
            test_cases,
        });

        self.stack.push(path.clone());
        for child in &children {
            self.visit(child, Some(&config))?;
        }
        self.stack.pop();
        self.resolved.insert(path.clone());

        Ok(())
    }

    fn parse_tests(
        &mut self,
        mapping: &Mapping,
        dir: &Path,
        display: &str,
    ) -> TdsqlResult<Vec<TestCase>> {
        let Some(value) = lookup(mapping, "tests") else {
            return Ok(Vec::new());
        };
        let entries: Vec<TestEntry> = serde_yaml::from_value(value.clone())
            .map_err(|e| TdsqlError::invalid_at(format!("`tests`: {}", e), display.to_string()))?;

        let mut cases = Vec::with_capacity(entries.len());
        for entry in entries {
            let sql_path = dir.join(&entry.filepath);
            // directive violations surface here, before any query executes
            let actual_sql = template::apply(&sql_path, &entry.replace)?;
            let id = self.next_id;
            self.next_id += 1;
            cases.push(TestCase::new(id, sql_path, actual_sql, entry.expected));
        }
        Ok(cases)
    }
}

/// Resolve the `source` key into canonical child paths
fn resolve_sources(
    mapping: &Mapping,
    dir: &Path,
    current: &Path,
    display: &str,
) -> TdsqlResult<Vec<PathBuf>> {
    let Some(value) = lookup(mapping, "source") else {
        return Ok(Vec::new());
    };

    let entries: Vec<String> = match value {
        Value::String(s) => vec![s.clone()],
        Value::Sequence(seq) => {
            let mut v = Vec::with_capacity(seq.len());
            for item in seq {
                match item {
                    Value::String(s) => v.push(s.clone()),
                    other => {
                        return Err(TdsqlError::invalid_at(
                            format!("`source` entries must be strings, got {:?}", other),
                            display.to_string(),
                        ));
                    }
                }
            }
            v
        }
        other => {
            return Err(TdsqlError::invalid_at(
                format!("`source` must be a string or a list, got {:?}", other),
                display.to_string(),
            ));
        }
    };

    let mut children = Vec::new();
    for entry in entries {
        if entry.contains('*') || entry.contains('?') {
            // a glob that matches nothing contributes no children; the
            // containing file never sources itself through its own glob
            for matched in expand_glob(dir, &entry)? {
                if matched.as_path() != current {
                    children.push(matched);
                }
            }
        } else {
            children.push(canonicalize(&dir.join(&entry))?);
        }
    }
    Ok(children)
}

/// Expand a glob pattern against the directory it names, sorted for
/// deterministic traversal
fn expand_glob(dir: &Path, pattern: &str) -> TdsqlResult<Vec<PathBuf>> {
    let full = dir.join(pattern);
    let parent = full.parent().map(Path::to_path_buf).unwrap_or_else(|| dir.to_path_buf());
    let Some(file_pattern) = full.file_name().map(|n| n.to_string_lossy().to_string()) else {
        return Err(TdsqlError::invalid(format!("invalid glob pattern `{}`", pattern)));
    };

    let mut matches = Vec::new();
    if let Ok(entries) = fs::read_dir(&parent) {
        for entry in entries.flatten() {
            let entry_path = entry.path();
            if !entry_path.is_file() {
                continue;
            }
            if let Some(name) = entry_path.file_name() {
                if wildcard_match(&file_pattern, &name.to_string_lossy()) {
                    matches.push(canonicalize(&entry_path)?);
                }
            }
        }
    }
    matches.sort();
    Ok(matches)
}

/// Simple wildcard matching: `*` spans any run of characters, `?` exactly
/// one
fn wildcard_match(pattern: &str, name: &str) -> bool {
    let p: Vec<char> = pattern.chars().collect();
    let n: Vec<char> = name.chars().collect();

    fn rec(p: &[char], n: &[char]) -> bool {
        match (p.first(), n.first()) {
            (None, None) => true,
            (Some('*'), _) => rec(&p[1..], n) || (!n.is_empty() && rec(p, &n[1..])),
            (Some('?'), Some(_)) => rec(&p[1..], &n[1..]),
            (Some(a), Some(b)) if a == b => rec(&p[1..], &n[1..]),
            _ => false,
        }
    }
    rec(&p, &n)
}

fn canonicalize(path: &Path) -> TdsqlResult<PathBuf> {
    fs::canonicalize(path).map_err(|e| {
        TdsqlError::invalid_at(
            format!("cannot resolve `{}`: {}", path.display(), e),
            path.display().to_string(),
        )
    })
}

fn lookup<'a>(mapping: &'a Mapping, key: &str) -> Option<&'a Value> {
    let value = mapping.get(&Value::String(key.to_string()))?;
    if value.is_null() {
        None
    } else {
        Some(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wildcard_match() {
        assert!(wildcard_match("*.yaml", "child.yaml"));
        assert!(wildcard_match("child?.yml", "child1.yml"));
        assert!(wildcard_match("*", "anything"));
        assert!(!wildcard_match("*.yaml", "child.yml"));
        assert!(!wildcard_match("child?.yml", "child12.yml"));
    }
}
