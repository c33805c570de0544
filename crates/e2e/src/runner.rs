//! Scenario runner: one browser session per scenario, strictly sequential

use std::path::PathBuf;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, warn};

use crate::config::RunnerConfig;
use crate::driver::{BrowserDriver, BrowserLauncher, FrameRef, LoadState, WaitUntil};
use crate::error::{E2eError, E2eResult};
use crate::locator::Locator;
use crate::scenario::{Scenario, ScrollAmount, ScrollUnit, Step, Viewport};
use crate::target;

/// How a single step ended
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum StepOutcome {
    Completed,
    /// A best-effort wait failed and was ignored
    Tolerated { reason: String },
    Failed { reason: String },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StepRecord {
    pub index: usize,
    pub label: String,
    pub duration_ms: u64,
    pub outcome: StepOutcome,
}

/// Where a scenario stopped
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailurePhase {
    Launch,
    Open,
    Step,
    Assertion,
}

/// Result of running a single scenario
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScenarioResult {
    pub name: String,
    pub id: Option<String>,
    pub success: bool,
    pub started_at: DateTime<Utc>,
    pub duration_ms: u64,
    pub steps: Vec<StepRecord>,
    pub error: Option<String>,
    pub phase: Option<FailurePhase>,
    pub screenshot: Option<PathBuf>,
}

/// Result of running a list of scenarios
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SuiteResult {
    pub total: usize,
    pub passed: usize,
    pub failed: usize,
    pub started_at: DateTime<Utc>,
    pub duration_ms: u64,
    pub results: Vec<ScenarioResult>,
}

impl SuiteResult {
    pub fn success(&self) -> bool {
        self.failed == 0
    }
}

/// Executes scenarios against the application under test
pub struct ScenarioRunner {
    config: RunnerConfig,
    launcher: Box<dyn BrowserLauncher>,
}

impl ScenarioRunner {
    pub fn new<L: BrowserLauncher + 'static>(config: RunnerConfig, launcher: L) -> Self {
        Self {
            config,
            launcher: Box::new(launcher),
        }
    }

    /// Run scenarios one after another. A failing scenario never stops the suite.
    pub async fn run_all(&self, scenarios: &[Scenario]) -> SuiteResult {
        let started_at = Utc::now();
        let start = Instant::now();
        let mut results = Vec::with_capacity(scenarios.len());

        info!("Running {} scenario(s) against {}", scenarios.len(), self.config.target.base_url);

        for scenario in scenarios {
            let result = self.run_scenario(scenario).await;
            if result.success {
                info!("✓ {} ({} ms)", scenario.display_name(), result.duration_ms);
            } else {
                error!(
                    "✗ {} - {}",
                    scenario.display_name(),
                    result.error.as_deref().unwrap_or("unknown error")
                );
            }
            results.push(result);
        }

        let passed = results.iter().filter(|r| r.success).count();
        let failed = results.len() - passed;
        let duration_ms = start.elapsed().as_millis() as u64;

        info!("Scenario results: {} passed, {} failed ({} ms)", passed, failed, duration_ms);

        SuiteResult {
            total: results.len(),
            passed,
            failed,
            started_at,
            duration_ms,
            results,
        }
    }

    /// Run one scenario in its own browser session
    pub async fn run_scenario(&self, scenario: &Scenario) -> ScenarioResult {
        let started_at = Utc::now();
        let start = Instant::now();
        let session = &self.config.session;
        let viewport = scenario.viewport.unwrap_or(Viewport {
            width: session.viewport_width,
            height: session.viewport_height,
        });

        debug!("Running scenario: {}", scenario.display_name());

        let mut driver = match self.launcher.launch(session, viewport).await {
            Ok(driver) => driver,
            Err(e) => {
                return ScenarioResult {
                    name: scenario.name.clone(),
                    id: scenario.id.clone(),
                    success: false,
                    started_at,
                    duration_ms: start.elapsed().as_millis() as u64,
                    steps: Vec::new(),
                    error: Some(e.to_string()),
                    phase: Some(FailurePhase::Launch),
                    screenshot: None,
                };
            }
        };

        let mut records = Vec::new();
        let outcome = self.drive(scenario, driver.as_mut(), &mut records).await;

        let mut screenshot = None;
        match &outcome {
            Ok(()) => {
                let linger = scenario.linger_ms.unwrap_or(session.linger_ms);
                if linger > 0 {
                    tokio::time::sleep(Duration::from_millis(linger)).await;
                }
            }
            Err(_) if session.capture_failure_screenshot => {
                let path = self
                    .config
                    .screenshot_dir()
                    .join(screenshot_file_name(&scenario.name));
                match driver.screenshot(&path).await {
                    Ok(()) => screenshot = Some(path),
                    Err(e) => warn!("Failure screenshot for {} not saved: {}", scenario.name, e),
                }
            }
            Err(_) => {}
        }

        if let Err(e) = driver.close().await {
            warn!("Closing session for {} failed: {}", scenario.name, e);
        }

        let (error, phase) = match outcome {
            Ok(()) => (None, None),
            Err((phase, e)) => (Some(e.to_string()), Some(phase)),
        };

        ScenarioResult {
            name: scenario.name.clone(),
            id: scenario.id.clone(),
            success: error.is_none(),
            started_at,
            duration_ms: start.elapsed().as_millis() as u64,
            steps: records,
            error,
            phase,
            screenshot,
        }
    }

    async fn drive(
        &self,
        scenario: &Scenario,
        driver: &mut dyn BrowserDriver,
        records: &mut Vec<StepRecord>,
    ) -> Result<(), (FailurePhase, E2eError)> {
        let session = &self.config.session;

        let url = target::resolve(&self.config.target.base_url, &scenario.start_path)
            .map_err(|e| (FailurePhase::Open, e))?;
        let t = Instant::now();
        if let Err(e) = driver
            .goto(&url, WaitUntil::Commit, Duration::from_millis(session.navigation_timeout_ms))
            .await
        {
            push_record(records, format!("open:{}", url), t, failed(&e));
            return Err((
                FailurePhase::Open,
                E2eError::StepFailed {
                    step: format!("open:{}", url),
                    reason: e.to_string(),
                },
            ));
        }
        push_record(records, format!("open:{}", url), t, StepOutcome::Completed);

        let t = Instant::now();
        let outcome = settle(driver, LoadState::DomContentLoaded, session.settle_timeout()).await;
        push_record(records, "settle:domcontentloaded".to_string(), t, outcome);

        let total = scenario.steps.len();
        for (i, step) in scenario.steps.iter().enumerate() {
            let label = step.label();
            info!("[{}/{}] {}", i + 1, total, label);

            let t = Instant::now();
            match self.execute_step(driver, step).await {
                Ok(outcome) => push_record(records, label, t, outcome),
                Err(e) => {
                    push_record(records, label.clone(), t, failed(&e));
                    return Err((
                        FailurePhase::Step,
                        E2eError::StepFailed {
                            step: label,
                            reason: e.to_string(),
                        },
                    ));
                }
            }
        }

        self.check_expectations(scenario, driver, records)
            .await
            .map_err(|e| (FailurePhase::Assertion, e))
    }

    async fn execute_step(&self, driver: &mut dyn BrowserDriver, step: &Step) -> E2eResult<StepOutcome> {
        let session = &self.config.session;

        match step {
            Step::Click { locator, delay_ms, timeout_ms, .. } => {
                pre_action_delay(driver, delay_ms.unwrap_or(session.step_delay_ms)).await?;
                driver
                    .click(locator, Duration::from_millis(timeout_ms.unwrap_or(session.action_timeout_ms)))
                    .await?;
            }
            Step::Fill { locator, value, delay_ms, timeout_ms, .. } => {
                pre_action_delay(driver, delay_ms.unwrap_or(session.step_delay_ms)).await?;
                driver
                    .fill(
                        locator,
                        value,
                        Duration::from_millis(timeout_ms.unwrap_or(session.action_timeout_ms)),
                    )
                    .await?;
            }
            Step::Scroll { delta_x, delta_y } => {
                let dy = match delta_y {
                    ScrollAmount::Pixels(px) => *px,
                    ScrollAmount::Unit(ScrollUnit::Viewport) => driver.viewport_height().await?,
                };
                driver.scroll(*delta_x, dy).await?;
            }
            Step::Goto { url, timeout_ms, pause_ms } => {
                let url = target::resolve(&self.config.target.base_url, url)?;
                driver
                    .goto(
                        &url,
                        WaitUntil::Load,
                        Duration::from_millis(timeout_ms.unwrap_or(session.navigation_timeout_ms)),
                    )
                    .await?;
                let pause = pause_ms.unwrap_or(session.goto_pause_ms);
                if pause > 0 {
                    tokio::time::sleep(Duration::from_millis(pause)).await;
                }
            }
            Step::Pause { ms } => {
                tokio::time::sleep(Duration::from_millis(*ms)).await;
            }
            Step::Settle { state, timeout_ms } => {
                let bound = timeout_ms
                    .map(Duration::from_millis)
                    .unwrap_or_else(|| session.settle_timeout());
                return Ok(settle(driver, *state, bound).await);
            }
        }

        Ok(StepOutcome::Completed)
    }

    async fn check_expectations(
        &self,
        scenario: &Scenario,
        driver: &mut dyn BrowserDriver,
        records: &mut Vec<StepRecord>,
    ) -> E2eResult<()> {
        let expect = &scenario.expect;
        let timeout_ms = expect.timeout_ms.unwrap_or(self.config.session.expect_timeout_ms);
        for text in &expect.visible {
            let label = format!("expect:{}", text);
            let t = Instant::now();
            let visible = driver
                .expect_visible(&Locator::text(text), Duration::from_millis(timeout_ms))
                .await;

            match visible {
                Ok(true) => push_record(records, label, t, StepOutcome::Completed),
                Ok(false) => {
                    let reason = format!("'{}' was not visible within {} ms", text, timeout_ms);
                    push_record(records, label, t, StepOutcome::Failed { reason: reason.clone() });
                    let message = expect.failure_message.clone().unwrap_or(reason);
                    return Err(E2eError::AssertionFailed(message));
                }
                Err(e) => {
                    push_record(records, label.clone(), t, failed(&e));
                    return Err(E2eError::StepFailed {
                        step: label,
                        reason: e.to_string(),
                    });
                }
            }
        }

        Ok(())
    }

    /// Write suite results as pretty JSON
    pub fn write_results(&self, results: &SuiteResult) -> E2eResult<PathBuf> {
        std::fs::create_dir_all(&self.config.output_dir)?;

        let path = self.config.results_path();
        let json = serde_json::to_string_pretty(results)?;
        std::fs::write(&path, json)?;

        info!("Results written to: {}", path.display());
        Ok(path)
    }
}

/// Best-effort wait on the page and every frame. Errors are swallowed.
async fn settle(driver: &mut dyn BrowserDriver, state: LoadState, bound: Duration) -> StepOutcome {
    let mut ignored = Vec::new();

    if let Err(e) = driver.wait_for_load_state(FrameRef::Page, state, bound).await {
        debug!("Ignoring page load-state wait failure: {}", e);
        ignored.push(format!("page: {}", e));
    }

    match driver.frame_count().await {
        Ok(count) => {
            for i in 0..count {
                if let Err(e) = driver.wait_for_load_state(FrameRef::Frame(i), state, bound).await {
                    debug!("Ignoring frame {} load-state wait failure: {}", i, e);
                    ignored.push(format!("frame {}: {}", i, e));
                }
            }
        }
        Err(e) => {
            debug!("Ignoring frame enumeration failure: {}", e);
            ignored.push(format!("frames: {}", e));
        }
    }

    if ignored.is_empty() {
        StepOutcome::Completed
    } else {
        StepOutcome::Tolerated {
            reason: ignored.join("; "),
        }
    }
}

async fn pre_action_delay(driver: &mut dyn BrowserDriver, ms: u64) -> E2eResult<()> {
    if ms > 0 {
        driver.wait_for_timeout(Duration::from_millis(ms)).await?;
    }
    Ok(())
}

/// Append a record; indexes follow execution order starting at the open
fn push_record(records: &mut Vec<StepRecord>, label: String, started: Instant, outcome: StepOutcome) {
    records.push(StepRecord {
        index: records.len(),
        label,
        duration_ms: started.elapsed().as_millis() as u64,
        outcome,
    });
}

/// Screenshot file name for a scenario, flattened to a single path component
fn screenshot_file_name(name: &str) -> String {
    let stem: String = name
        .chars()
        .map(|c| if c.is_alphanumeric() || matches!(c, '-' | '_' | '.') { c } else { '_' })
        .collect();
    let stem = stem.trim_start_matches('.');
    if stem.is_empty() {
        "scenario.png".to_string()
    } else {
        format!("{}.png", stem)
    }
}

fn failed(e: &E2eError) -> StepOutcome {
    StepOutcome::Failed {
        reason: e.to_string(),
    }
}
