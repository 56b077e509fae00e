//! Scenario results and the run report.

use crate::error::HarnessError;
use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use std::fmt::Write as _;
use std::path::Path;

/// Outcome of one scenario.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TestResult {
    pub name: String,
    pub passed: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// When the scenario finished.
    pub timestamp: DateTime<Utc>,
}

impl TestResult {
    #[must_use]
    pub fn passed(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            passed: true,
            error: None,
            timestamp: Utc::now(),
        }
    }

    #[must_use]
    pub fn failed(name: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            passed: false,
            error: Some(error.into()),
            timestamp: Utc::now(),
        }
    }
}

/// A failed scenario's name and error text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FailedScenario {
    pub test: String,
    pub error: String,
}

/// Totals over a run.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Summary {
    pub total: usize,
    pub passed: usize,
    pub failed: usize,
    pub errors: Vec<FailedScenario>,
    /// Percentage of scenarios that passed; 0 for an empty run.
    pub success_rate: f64,
}

impl Summary {
    /// Aggregates results.
    #[must_use]
    pub fn from_results(results: &[TestResult]) -> Self {
        let total = results.len();
        let passed = results.iter().filter(|r| r.passed).count();
        let errors = results
            .iter()
            .filter(|r| !r.passed)
            .map(|r| FailedScenario {
                test: r.name.clone(),
                error: r.error.clone().unwrap_or_default(),
            })
            .collect();
        #[allow(clippy::cast_precision_loss)]
        let success_rate = if total == 0 {
            0.0
        } else {
            passed as f64 * 100.0 / total as f64
        };

        Self {
            total,
            passed,
            failed: total - passed,
            errors,
            success_rate,
        }
    }
}

/// Everything a run produced.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Report {
    /// When the run started.
    pub timestamp: DateTime<Utc>,
    pub tests: Vec<TestResult>,
    pub summary: Summary,
}

impl Report {
    #[must_use]
    pub fn new(timestamp: DateTime<Utc>, tests: Vec<TestResult>) -> Self {
        let summary = Summary::from_results(&tests);
        Self {
            timestamp,
            tests,
            summary,
        }
    }

    /// Returns true if every scenario passed.
    #[must_use]
    pub fn all_passed(&self) -> bool {
        self.summary.failed == 0
    }

    /// Renders the human-readable report.
    #[must_use]
    pub fn render(&self) -> String {
        let mut out = String::new();
        let rule = "=".repeat(60);
        let _ = writeln!(out, "{rule}");
        let _ = writeln!(
            out,
            "SMOKE TEST REPORT {}",
            self.timestamp.to_rfc3339_opts(SecondsFormat::Secs, true)
        );
        let _ = writeln!(out, "{rule}");

        for test in &self.tests {
            let status = if test.passed { "PASSED" } else { "FAILED" };
            let _ = writeln!(out, "[{status}] {}", test.name);
            if let Some(error) = &test.error {
                let _ = writeln!(out, "         {error}");
            }
        }

        let _ = writeln!(out);
        let _ = writeln!(out, "Total:        {}", self.summary.total);
        let _ = writeln!(out, "Passed:       {}", self.summary.passed);
        let _ = writeln!(out, "Failed:       {}", self.summary.failed);
        let _ = writeln!(out, "Success rate: {:.1}%", self.summary.success_rate);
        out
    }

    /// Serializes the report as pretty JSON.
    ///
    /// # Errors
    ///
    /// Returns [`HarnessError::ReportEncode`] if serialization fails.
    pub fn to_json(&self) -> Result<String, HarnessError> {
        serde_json::to_string_pretty(self).map_err(|e| HarnessError::ReportEncode {
            reason: e.to_string(),
        })
    }

    /// Writes the JSON report to `path`.
    ///
    /// # Errors
    ///
    /// Returns [`HarnessError`] if encoding or writing fails.
    pub async fn write_json(&self, path: impl AsRef<Path>) -> Result<(), HarnessError> {
        let path = path.as_ref();
        let json = self.to_json()?;
        tokio::fs::write(path, json)
            .await
            .map_err(|e| HarnessError::ReportWrite {
                path: path.to_path_buf(),
                reason: e.to_string(),
            })
    }
}
