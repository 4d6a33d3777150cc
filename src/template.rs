//! Directive engine for SQL source substitution
//!
//! SQL files under test carry comment markers that name replaceable spans:
//!
//! ```sql
//! SELECT 1 AS one -- tdsql-line: seed
//! -- tdsql-start: cte
//! WITH data AS (SELECT * FROM mart.orders)
//! -- tdsql-end: cte
//! ```
//!
//! A test case's `replace` mapping swaps each labelled span for literal
//! text. A mapping key may also be a line number (or `N,M,...` set), which
//! collapses exactly those lines into one replacement unit. Markers whose
//! label is absent from the mapping pass through untouched, so a file with
//! an empty mapping reproduces itself byte for byte.
//!
//! Inside replacement text the reserved line `-- tdsql-line: this` expands
//! to the unit's original lines; no other label is allowed there.

use std::collections::HashMap;
use std::fs;
use std::path::Path;

use crate::error::{TdsqlError, TdsqlResult};

const LINE_MARKER: &str = "-- tdsql-line:";
const START_MARKER: &str = "-- tdsql-start:";
const END_MARKER: &str = "-- tdsql-end:";

/// Reserved label referring to the replaced lines themselves
const THIS_LABEL: &str = "this";

#[derive(Debug, Clone, Copy, PartialEq)]
enum MarkerKind {
    Line,
    Start,
    End,
}

/// A replacement unit discovered during the scan: a label and the 1-based
/// source lines it covers
#[derive(Debug)]
struct Unit {
    label: String,
    lines: Vec<usize>,
}

/// Apply a replacement mapping to a SQL file
pub fn apply(sql_path: &Path, replace: &HashMap<String, String>) -> TdsqlResult<String> {
    let content = fs::read_to_string(sql_path).map_err(|e| TdsqlError::Io {
        message: e.to_string(),
        path: sql_path.display().to_string(),
    })?;
    apply_text(&content, replace).map_err(|e| match e {
        TdsqlError::InvalidInput { message, .. } => {
            TdsqlError::invalid_at(message, sql_path.display().to_string())
        }
        other => other,
    })
}

/// Apply a replacement mapping to SQL source text
pub fn apply_text(content: &str, replace: &HashMap<String, String>) -> TdsqlResult<String> {
    let trailing_newline = content.ends_with('\n');
    let lines: Vec<&str> = {
        let mut v: Vec<&str> = content.split('\n').collect();
        if trailing_newline {
            v.pop();
        }
        v
    };

    let mut units = scan_markers(&lines)?;

    // mapping keys that never matched a marker must be numeric addresses
    let mut keys: Vec<&String> = replace.keys().collect();
    keys.sort();
    for key in keys {
        if units.iter().any(|u| &u.label == key) {
            continue;
        }
        match parse_numeric_label(key, lines.len()) {
            Some(numbered) => units.push(Unit {
                label: key.clone(),
                lines: numbered,
            }),
            None => {
                return Err(TdsqlError::invalid(format!("`{}` does not appear", key)));
            }
        }
    }

    // overlap is only an error between units that are actually triggered
    let triggered: Vec<&Unit> = {
        let mut t: Vec<&Unit> = units
            .iter()
            .filter(|u| replace.contains_key(&u.label))
            .collect();
        t.sort_by_key(|u| u.lines[0]);
        t
    };

    let mut owner: HashMap<usize, &Unit> = HashMap::new();
    for unit in &triggered {
        for line in &unit.lines {
            if owner.insert(*line, *unit).is_some() {
                return Err(TdsqlError::invalid(format!(
                    "cannot replace line {} twice",
                    line
                )));
            }
        }
    }

    // rebuild the file: a triggered unit's first line carries the rendered
    // replacement, its remaining lines are dropped, everything else passes
    // through verbatim
    let mut out: Vec<String> = Vec::with_capacity(lines.len());
    for (idx, line) in lines.iter().enumerate() {
        let line_number = idx + 1;
        match owner.get(&line_number) {
            Some(unit) if unit.lines[0] == line_number => {
                let replacement = &replace[&unit.label];
                out.push(render_replacement(replacement, &unit.lines, &lines)?);
            }
            Some(_) => {} // interior line of a triggered unit
            None => out.push((*line).to_string()),
        }
    }

    let mut result = out.join("\n");
    if trailing_newline {
        result.push('\n');
    }
    Ok(result)
}

/// One forward scan over the source, collecting replacement units and
/// enforcing the structural rules
fn scan_markers(lines: &[&str]) -> TdsqlResult<Vec<Unit>> {
    let mut units: Vec<Unit> = Vec::new();
    // label -> declaration line, for duplicate detection
    let mut declared: HashMap<String, usize> = HashMap::new();
    // label -> start line of a still-open block, in open order
    let mut open: Vec<(String, usize)> = Vec::new();

    for (idx, line) in lines.iter().enumerate() {
        let line_number = idx + 1;
        let Some((kind, label)) = parse_marker(line) else {
            continue;
        };

        match kind {
            MarkerKind::Line => {
                if declared.insert(label.clone(), line_number).is_some() {
                    return Err(TdsqlError::invalid(format!(
                        "`{}` appear twice at line {}",
                        label, line_number
                    )));
                }
                units.push(Unit {
                    label,
                    lines: vec![line_number],
                });
            }
            MarkerKind::Start => {
                if declared.insert(label.clone(), line_number).is_some() {
                    return Err(TdsqlError::invalid(format!(
                        "`{}` appear twice at line {}",
                        label, line_number
                    )));
                }
                open.push((label, line_number));
            }
            MarkerKind::End => {
                match open.iter().position(|(l, _)| *l == label) {
                    Some(pos) => {
                        let (label, start_line) = open.remove(pos);
                        units.push(Unit {
                            label,
                            lines: (start_line..=line_number).collect(),
                        });
                    }
                    None => {
                        return Err(TdsqlError::invalid(format!(
                            "`{}` has not started but ends at line {}",
                            label, line_number
                        )));
                    }
                }
            }
        }
    }

    if let Some((label, start_line)) = open.first() {
        return Err(TdsqlError::invalid(format!(
            "`{}` started at line {} but it does not end",
            label, start_line
        )));
    }

    Ok(units)
}

/// Recognize a directive marker in a trailing or standalone comment
fn parse_marker(line: &str) -> Option<(MarkerKind, String)> {
    for (marker, kind) in [
        (START_MARKER, MarkerKind::Start),
        (END_MARKER, MarkerKind::End),
        (LINE_MARKER, MarkerKind::Line),
    ] {
        if let Some(pos) = line.find(marker) {
            let label = line[pos + marker.len()..].trim();
            if label.is_empty() {
                return None;
            }
            return Some((kind, label.to_string()));
        }
    }
    None
}

/// Accept `N` or `N,M,...` as a line-number label, deduplicated and sorted
fn parse_numeric_label(label: &str, line_count: usize) -> Option<Vec<usize>> {
    let mut numbers: Vec<usize> = Vec::new();
    for part in label.split(',') {
        let n = part.trim().parse::<usize>().ok()?;
        if n == 0 || n > line_count {
            return None;
        }
        if !numbers.contains(&n) {
            numbers.push(n);
        }
    }
    if numbers.is_empty() {
        return None;
    }
    numbers.sort_unstable();
    Some(numbers)
}

/// Render replacement text, expanding the reserved `-- tdsql-line: this`
/// marker to the unit's original lines
fn render_replacement(
    replacement: &str,
    unit_lines: &[usize],
    source: &[&str],
) -> TdsqlResult<String> {
    let mut rendered: Vec<String> = Vec::new();
    for line in replacement.trim_end_matches('\n').split('\n') {
        match parse_marker(line) {
            Some((MarkerKind::Line, label)) if label == THIS_LABEL => {
                for n in unit_lines {
                    rendered.push(source[n - 1].to_string());
                }
            }
            Some((MarkerKind::Line, label)) => {
                return Err(TdsqlError::invalid(format!(
                    "only `-- tdsql-line: this` is allowed but got `{}`",
                    label
                )));
            }
            _ => rendered.push(line.to_string()),
        }
    }
    Ok(rendered.join("\n"))
}
