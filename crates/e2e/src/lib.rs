//! AnestEasy E2E Scenario Harness
//!
//! This crate drives scripted user journeys against the AnestEasy web
//! application:
//! - Loads declarative YAML scenarios (one journey per file)
//! - Opens one Playwright browser session per scenario through a Node bridge
//! - Runs the steps in order with fixed delays and bounded timeouts
//! - Checks the final visible texts and always tears the session down
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                 ScenarioRunner (Rust, tokio)                │
//! ├─────────────────────────────────────────────────────────────┤
//! │  run_all(&[Scenario]) -> SuiteResult     (sequential)       │
//! │  run_scenario(&Scenario) -> ScenarioResult                  │
//! │    ├── launcher.launch() -> Box<dyn BrowserDriver>          │
//! │    ├── open start_path (commit) + best-effort settle        │
//! │    ├── steps: click | fill | scroll | goto | pause | settle │
//! │    ├── expect.visible (first failure is terminal)           │
//! │    └── driver.close()                    (always)           │
//! ├─────────────────────────────────────────────────────────────┤
//! │  PlaywrightDriver ── JSON lines over stdio ── node bridge.js│
//! └─────────────────────────────────────────────────────────────┘
//! ```

pub mod config;
pub mod driver;
pub mod error;
pub mod locator;
pub mod playwright;
pub mod runner;
pub mod scenario;
pub mod target;

pub use config::RunnerConfig;
pub use error::{E2eError, E2eResult};
pub use locator::Locator;
pub use runner::{ScenarioResult, ScenarioRunner, SuiteResult};
pub use scenario::{Scenario, Step};
