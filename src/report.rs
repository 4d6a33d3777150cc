//! Run report generation
//!
//! Collects one outcome per test case and renders the run summary as
//! human-readable text or machine-readable JSON.

use std::io::Write;

use serde::{Deserialize, Serialize};

/// Complete report for one run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TestReport {
    /// Start time (ISO 8601)
    pub start_time: String,

    /// End time (ISO 8601)
    pub end_time: String,

    /// Summary statistics
    pub summary: RunSummary,

    /// Per-test outcomes
    pub cases: Vec<CaseOutcome>,
}

/// Summary statistics
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunSummary {
    pub total: usize,
    pub passed: usize,
    pub failed: usize,
}

/// Outcome of a single test case
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CaseOutcome {
    /// `{sql-stem}_{id}` identifier
    pub name: String,

    /// Test case id
    pub id: u32,

    pub passed: bool,

    /// Failure message if the case failed
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failure: Option<String>,
}

/// Report builder accumulating outcomes during a run
pub struct ReportBuilder {
    start_time: chrono::DateTime<chrono::Utc>,
    cases: Vec<CaseOutcome>,
}

impl ReportBuilder {
    pub fn new() -> Self {
        Self {
            start_time: chrono::Utc::now(),
            cases: Vec::new(),
        }
    }

    pub fn add_pass(&mut self, name: &str, id: u32) {
        self.cases.push(CaseOutcome {
            name: name.to_string(),
            id,
            passed: true,
            failure: None,
        });
    }

    pub fn add_failure(&mut self, name: &str, id: u32, message: &str) {
        self.cases.push(CaseOutcome {
            name: name.to_string(),
            id,
            passed: false,
            failure: Some(message.to_string()),
        });
    }

    pub fn generate(self) -> TestReport {
        let end_time = chrono::Utc::now();
        let passed = self.cases.iter().filter(|c| c.passed).count();
        let total = self.cases.len();
        TestReport {
            start_time: self.start_time.to_rfc3339(),
            end_time: end_time.to_rfc3339(),
            summary: RunSummary {
                total,
                passed,
                failed: total - passed,
            },
            cases: self.cases,
        }
    }
}

impl Default for ReportBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Output format for reports
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum OutputFormat {
    Text,
    Json,
}

impl std::str::FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "text" => Ok(OutputFormat::Text),
            "json" => Ok(OutputFormat::Json),
            _ => Err(format!("Unknown output format: {}", s)),
        }
    }
}

/// Write report to output
pub fn write_report(
    report: &TestReport,
    format: OutputFormat,
    writer: &mut dyn Write,
) -> std::io::Result<()> {
    match format {
        OutputFormat::Text => write_text_report(report, writer),
        OutputFormat::Json => write_json_report(report, writer),
    }
}

fn write_text_report(report: &TestReport, writer: &mut dyn Write) -> std::io::Result<()> {
    for case in &report.cases {
        if case.passed {
            writeln!(writer, "PASS {}", case.name)?;
        } else {
            writeln!(writer, "FAIL {}", case.name)?;
            if let Some(ref failure) = case.failure {
                for line in failure.lines() {
                    writeln!(writer, "     {}", line)?;
                }
            }
        }
    }
    writeln!(writer)?;
    writeln!(
        writer,
        "{} tests passed, {} tests failed",
        report.summary.passed, report.summary.failed
    )?;
    Ok(())
}

fn write_json_report(report: &TestReport, writer: &mut dyn Write) -> std::io::Result<()> {
    let json = serde_json::to_string_pretty(report)
        .map_err(|e| std::io::Error::new(std::io::ErrorKind::Other, e))?;
    writeln!(writer, "{}", json)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_summary_tallies() {
        let mut builder = ReportBuilder::new();
        builder.add_pass("a_1", 1);
        builder.add_failure("b_2", 2, "b_2: actual result is longer than expected result");
        let report = builder.generate();

        assert_eq!(report.summary.total, 2);
        assert_eq!(report.summary.passed, 1);
        assert_eq!(report.summary.failed, 1);
    }

    #[test]
    fn test_text_report_lists_failures() {
        let mut builder = ReportBuilder::new();
        builder.add_failure("q_1", 1, "q_1: invalid query\nSELECT foo\nno such column");
        let report = builder.generate();

        let mut out = Vec::new();
        write_report(&report, OutputFormat::Text, &mut out).unwrap();
        let text = String::from_utf8(out).unwrap();

        assert!(text.contains("FAIL q_1"));
        assert!(text.contains("no such column"));
        assert!(text.contains("0 tests passed, 1 tests failed"));
    }

    #[test]
    fn test_json_report_round_trips() {
        let mut builder = ReportBuilder::new();
        builder.add_pass("q_1", 1);
        let report = builder.generate();

        let mut out = Vec::new();
        write_report(&report, OutputFormat::Json, &mut out).unwrap();
        let parsed: TestReport = serde_json::from_slice(&out).unwrap();
        assert_eq!(parsed.summary.passed, 1);
    }
}
