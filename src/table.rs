//! Tabular result data model
//!
//! A `QueryTable` is what a backend hands back for one `SELECT`: an ordered
//! list of column names and an ordered list of rows. Cells are typed
//! (`CellValue`); the comparator and the auto-sort both work on this model
//! rather than on backend-specific result objects.

use std::cmp::Ordering;
use std::fmt;

use chrono::{NaiveDate, NaiveDateTime};

use crate::error::{TdsqlError, TdsqlResult};

/// A single typed cell in a query result
#[derive(Debug, Clone, PartialEq)]
pub enum CellValue {
    /// SQL NULL
    Null,
    /// Boolean value (true/false)
    Boolean(bool),
    /// 64-bit signed integer
    Integer(i64),
    /// 64-bit floating point number
    Float(f64),
    /// UTF-8 string
    String(String),
    /// Date (YYYY-MM-DD)
    Date(NaiveDate),
    /// Timestamp (YYYY-MM-DD HH:MM:SS[.nnn])
    Timestamp(NaiveDateTime),
}

impl fmt::Display for CellValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CellValue::Null => write!(f, "NULL"),
            CellValue::Boolean(b) => write!(f, "{}", b),
            CellValue::Integer(i) => write!(f, "{}", i),
            CellValue::Float(v) => write!(f, "{}", v),
            CellValue::String(s) => write!(f, "{}", s),
            CellValue::Date(d) => write!(f, "{}", d),
            CellValue::Timestamp(t) => write!(f, "{}", t),
        }
    }
}

impl CellValue {
    /// Runtime type name, used in diagnostics
    pub fn type_name(&self) -> &'static str {
        match self {
            CellValue::Null => "null",
            CellValue::Boolean(_) => "boolean",
            CellValue::Integer(_) => "integer",
            CellValue::Float(_) => "float",
            CellValue::String(_) => "string",
            CellValue::Date(_) => "date",
            CellValue::Timestamp(_) => "timestamp",
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, CellValue::Null)
    }

    /// Variant rank for cross-type ordering. Integer and Float share the
    /// numeric rank so mixed numeric columns still sort deterministically.
    fn rank(&self) -> u8 {
        match self {
            CellValue::Null => 0,
            CellValue::Boolean(_) => 1,
            CellValue::Integer(_) => 2,
            CellValue::Float(_) => 2,
            CellValue::String(_) => 3,
            CellValue::Date(_) => 4,
            CellValue::Timestamp(_) => 5,
        }
    }

    /// Total ordering over cells: variant rank first, then the value.
    /// This backs the auto-sort normalization; it is not the equality the
    /// comparator uses (tolerance lives there, not here).
    pub fn total_cmp(&self, other: &CellValue) -> Ordering {
        let by_rank = self.rank().cmp(&other.rank());
        if by_rank != Ordering::Equal {
            return by_rank;
        }

        match (self, other) {
            (CellValue::Null, CellValue::Null) => Ordering::Equal,
            (CellValue::Boolean(a), CellValue::Boolean(b)) => a.cmp(b),
            (CellValue::Integer(a), CellValue::Integer(b)) => a.cmp(b),
            (CellValue::String(a), CellValue::String(b)) => a.cmp(b),
            (CellValue::Date(a), CellValue::Date(b)) => a.cmp(b),
            (CellValue::Timestamp(a), CellValue::Timestamp(b)) => a.cmp(b),
            // Mixed numeric pair, compare as f64
            (a, b) => {
                let (x, y) = (a.as_f64(), b.as_f64());
                x.partial_cmp(&y).unwrap_or(Ordering::Equal)
            }
        }
    }

    fn as_f64(&self) -> f64 {
        match self {
            CellValue::Integer(i) => *i as f64,
            CellValue::Float(f) => *f,
            _ => f64::NAN,
        }
    }

    /// Encode one cell for a delimited artifact file. Nulls are empty
    /// fields; strings are quoted when they contain commas, quotes, or
    /// newlines.
    pub fn to_csv_field(&self) -> String {
        match self {
            CellValue::Null => String::new(),
            CellValue::String(s) => {
                if s.contains(',') || s.contains('"') || s.contains('\n') {
                    format!("\"{}\"", s.replace('"', "\"\""))
                } else {
                    s.clone()
                }
            }
            other => other.to_string(),
        }
    }
}

/// An immutable query result: ordered named columns and ordered rows
#[derive(Debug, Clone, PartialEq)]
pub struct QueryTable {
    columns: Vec<String>,
    rows: Vec<Vec<CellValue>>,
}

impl QueryTable {
    /// Build a table, checking that every row is as wide as the header
    pub fn new(columns: Vec<String>, rows: Vec<Vec<CellValue>>) -> TdsqlResult<Self> {
        for (i, row) in rows.iter().enumerate() {
            if row.len() != columns.len() {
                return Err(TdsqlError::Internal {
                    message: format!(
                        "row {} has {} cells but the table has {} columns",
                        i + 1,
                        row.len(),
                        columns.len()
                    ),
                });
            }
        }
        Ok(Self { columns, rows })
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn rows(&self) -> &[Vec<CellValue>] {
        &self.rows
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    pub fn column_count(&self) -> usize {
        self.columns.len()
    }

    /// Position of a named column, if present
    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }

    /// Stable-sort rows by the full ordered tuple of column values,
    /// ascending. Removes dependence on warehouse-determined row order
    /// without requiring a declared sort key.
    pub fn sort_rows(&mut self) {
        self.rows.sort_by(|a, b| {
            for (x, y) in a.iter().zip(b.iter()) {
                match x.total_cmp(y) {
                    Ordering::Equal => continue,
                    other => return other,
                }
            }
            Ordering::Equal
        });
    }

    /// Render the whole table as delimited text (header + rows)
    pub fn to_csv(&self) -> String {
        let mut out = String::new();
        out.push_str(&self.columns.join(","));
        out.push('\n');
        for row in &self.rows {
            let fields: Vec<String> = row.iter().map(|c| c.to_csv_field()).collect();
            out.push_str(&fields.join(","));
            out.push('\n');
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table(columns: &[&str], rows: Vec<Vec<CellValue>>) -> QueryTable {
        QueryTable::new(columns.iter().map(|c| c.to_string()).collect(), rows).unwrap()
    }

    #[test]
    fn test_sort_rows_full_tuple() {
        let mut t = table(
            &["a", "b"],
            vec![
                vec![CellValue::Integer(2), CellValue::String("x".into())],
                vec![CellValue::Integer(1), CellValue::String("z".into())],
                vec![CellValue::Integer(1), CellValue::String("a".into())],
            ],
        );
        t.sort_rows();
        assert_eq!(t.rows()[0][0], CellValue::Integer(1));
        assert_eq!(t.rows()[0][1], CellValue::String("a".into()));
        assert_eq!(t.rows()[1][1], CellValue::String("z".into()));
        assert_eq!(t.rows()[2][0], CellValue::Integer(2));
    }

    #[test]
    fn test_mixed_numeric_ordering() {
        assert_eq!(
            CellValue::Integer(1).total_cmp(&CellValue::Float(1.5)),
            Ordering::Less
        );
        assert_eq!(
            CellValue::Float(2.0).total_cmp(&CellValue::Integer(1)),
            Ordering::Greater
        );
    }

    #[test]
    fn test_nulls_sort_first() {
        assert_eq!(
            CellValue::Null.total_cmp(&CellValue::Integer(-100)),
            Ordering::Less
        );
    }

    #[test]
    fn test_ragged_row_rejected() {
        let err = QueryTable::new(
            vec!["a".to_string(), "b".to_string()],
            vec![vec![CellValue::Integer(1)]],
        );
        assert!(err.is_err());
    }

    #[test]
    fn test_csv_quoting() {
        let t = table(
            &["name", "score"],
            vec![vec![
                CellValue::String("Washington, D.C.".into()),
                CellValue::Float(10.5),
            ]],
        );
        assert_eq!(t.to_csv(), "name,score\n\"Washington, D.C.\",10.5\n");
    }

    #[test]
    fn test_csv_null_is_empty_field() {
        let t = table(
            &["a", "b"],
            vec![vec![CellValue::Null, CellValue::Integer(3)]],
        );
        assert_eq!(t.to_csv(), "a,b\n,3\n");
    }
}
