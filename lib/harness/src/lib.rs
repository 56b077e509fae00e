//! Verification harness for switchboard.
//!
//! Registers named async scenarios, runs all of them regardless of earlier
//! failures, and aggregates the outcomes into a [`Report`] that renders for
//! a console and serializes as JSON.

pub mod error;
pub mod harness;
pub mod report;
pub mod scenarios;

pub use error::HarnessError;
pub use harness::{Harness, Scenario, ScenarioResult};
pub use report::{FailedScenario, Report, Summary, TestResult};
