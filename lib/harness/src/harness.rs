//! The scenario runner.

use crate::report::{Report, TestResult};
use chrono::Utc;
use futures::FutureExt;
use futures::future::BoxFuture;
use std::any::Any;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::time::Duration;
use tracing::{info, warn};

/// What a scenario returns; the error's text is recorded on failure.
pub type ScenarioResult<T = ()> = Result<T, Box<dyn std::error::Error + Send + Sync>>;

type ScenarioFn = Box<dyn Fn() -> BoxFuture<'static, ScenarioResult> + Send + Sync>;

const DEFAULT_SCENARIO_TIMEOUT: Duration = Duration::from_secs(120);

/// A named async check.
pub struct Scenario {
    name: String,
    run: ScenarioFn,
}

impl std::fmt::Debug for Scenario {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Scenario").field("name", &self.name).finish_non_exhaustive()
    }
}

impl Scenario {
    pub fn new<F, Fut>(name: impl Into<String>, run: F) -> Self
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ScenarioResult> + Send + 'static,
    {
        Self {
            name: name.into(),
            run: Box::new(move || run().boxed()),
        }
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }
}

/// Runs every registered scenario, in order, and reports on all of them.
///
/// A failing, panicking or hung scenario is recorded and the run moves on.
#[derive(Debug)]
pub struct Harness {
    scenarios: Vec<Scenario>,
    scenario_timeout: Duration,
}

impl Default for Harness {
    fn default() -> Self {
        Self {
            scenarios: Vec::new(),
            scenario_timeout: DEFAULT_SCENARIO_TIMEOUT,
        }
    }
}

impl Harness {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Bounds each scenario's run time.
    #[must_use]
    pub fn with_scenario_timeout(mut self, timeout: Duration) -> Self {
        self.scenario_timeout = timeout;
        self
    }

    /// Registers a scenario from a name and an async closure.
    pub fn register<F, Fut>(&mut self, name: impl Into<String>, run: F) -> &mut Self
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ScenarioResult> + Send + 'static,
    {
        self.add(Scenario::new(name, run))
    }

    /// Registers a prepared scenario.
    pub fn add(&mut self, scenario: Scenario) -> &mut Self {
        self.scenarios.push(scenario);
        self
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.scenarios.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.scenarios.is_empty()
    }

    /// Runs every scenario and aggregates the results.
    pub async fn run_all(&self) -> Report {
        let started = Utc::now();
        let mut results = Vec::with_capacity(self.scenarios.len());

        for scenario in &self.scenarios {
            info!(scenario = %scenario.name, "running scenario");
            let run = AssertUnwindSafe((scenario.run)()).catch_unwind();
            let result = match tokio::time::timeout(self.scenario_timeout, run).await {
                Ok(Ok(Ok(()))) => TestResult::passed(&scenario.name),
                Ok(Ok(Err(err))) => TestResult::failed(&scenario.name, err.to_string()),
                Ok(Err(panic)) => {
                    TestResult::failed(&scenario.name, format!("panicked: {}", panic_text(&*panic)))
                }
                Err(_) => TestResult::failed(
                    &scenario.name,
                    format!("timed out after {:?}", self.scenario_timeout),
                ),
            };

            match &result.error {
                None => info!(scenario = %scenario.name, "scenario passed"),
                Some(error) => warn!(scenario = %scenario.name, %error, "scenario failed"),
            }
            results.push(result);
        }

        Report::new(started, results)
    }
}

fn panic_text(panic: &(dyn Any + Send)) -> &str {
    panic
        .downcast_ref::<&str>()
        .copied()
        .or_else(|| panic.downcast_ref::<String>().map(String::as_str))
        .unwrap_or("unknown panic")
}
