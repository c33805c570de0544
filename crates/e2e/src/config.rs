//! Runner configuration

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::E2eResult;

/// Top-level runner configuration, normally read from `anesteasy-e2e.toml`
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RunnerConfig {
    /// Directory holding the scenario YAML files
    pub scenarios_dir: PathBuf,

    /// Output directory for results and failure screenshots
    pub output_dir: PathBuf,

    /// Browser session settings
    pub session: SessionConfig,

    /// Application under test
    pub target: TargetConfig,
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            scenarios_dir: PathBuf::from("scenarios"),
            output_dir: PathBuf::from("test-results"),
            session: SessionConfig::default(),
            target: TargetConfig::default(),
        }
    }
}

impl RunnerConfig {
    /// Load configuration from file, falling back to defaults when it is absent
    pub fn load(path: &Path) -> E2eResult<Self> {
        if path.exists() {
            let content = std::fs::read_to_string(path)?;
            let config: Self = toml::from_str(&content)?;
            Ok(config)
        } else {
            Ok(Self::default())
        }
    }

    /// Save configuration to file
    pub fn save(&self, path: &Path) -> E2eResult<()> {
        let content = toml::to_string_pretty(self)
            .map_err(|e| crate::E2eError::Config(e.to_string()))?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, content)?;
        Ok(())
    }

    pub fn screenshot_dir(&self) -> PathBuf {
        self.output_dir.join("screenshots")
    }

    pub fn results_path(&self) -> PathBuf {
        self.output_dir.join("results.json")
    }
}

/// Browser session settings shared by every scenario
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Node executable used to host the Playwright bridge
    pub node_binary: PathBuf,

    /// Directory whose `node_modules` provides the `playwright` package
    pub node_workdir: PathBuf,

    pub browser: BrowserKind,

    pub headless: bool,

    /// Browser launch arguments. Empty means the engine defaults
    /// (`CHROMIUM_ARGS` for Chromium, none for Firefox and WebKit).
    pub launch_args: Vec<String>,

    pub viewport_width: u32,
    pub viewport_height: u32,

    /// How long the bridge may take to start the browser
    pub launch_timeout_ms: u64,

    /// Default timeout applied to every context operation
    pub default_timeout_ms: u64,

    /// Timeout of the opening navigation and of `goto` steps
    pub navigation_timeout_ms: u64,

    /// Bound on best-effort load-state waits
    pub settle_timeout_ms: u64,

    /// Fixed delay before each click or fill
    pub step_delay_ms: u64,

    /// Timeout of a single click or fill
    pub action_timeout_ms: u64,

    /// Pause after a `goto` step
    pub goto_pause_ms: u64,

    /// Per-text timeout of the final visibility checks
    pub expect_timeout_ms: u64,

    /// How long a passing session stays open before teardown
    pub linger_ms: u64,

    /// Save a full-page screenshot when a scenario fails
    pub capture_failure_screenshot: bool,

    /// Extra time granted to the bridge on top of each operation's own timeout
    pub bridge_grace_ms: u64,
}

/// Launch flags the scenarios were recorded with. Chromium only.
pub const CHROMIUM_ARGS: [&str; 4] = [
    "--window-size=1280,720",
    "--disable-dev-shm-usage",
    "--ipc=host",
    "--single-process",
];

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            node_binary: PathBuf::from("node"),
            node_workdir: PathBuf::from("."),
            browser: BrowserKind::Chromium,
            headless: true,
            launch_args: Vec::new(),
            viewport_width: 1280,
            viewport_height: 720,
            launch_timeout_ms: 30_000,
            default_timeout_ms: 5000,
            navigation_timeout_ms: 10_000,
            settle_timeout_ms: 3000,
            step_delay_ms: 3000,
            action_timeout_ms: 5000,
            goto_pause_ms: 3000,
            expect_timeout_ms: 30_000,
            linger_ms: 5000,
            capture_failure_screenshot: true,
            bridge_grace_ms: 5000,
        }
    }
}

impl SessionConfig {
    /// Arguments handed to `browserType.launch`
    pub fn browser_args(&self) -> Vec<String> {
        if !self.launch_args.is_empty() {
            return self.launch_args.clone();
        }
        match self.browser {
            BrowserKind::Chromium => CHROMIUM_ARGS.iter().map(|a| a.to_string()).collect(),
            BrowserKind::Firefox | BrowserKind::Webkit => Vec::new(),
        }
    }

    pub fn launch_timeout(&self) -> Duration {
        Duration::from_millis(self.launch_timeout_ms)
    }

    pub fn settle_timeout(&self) -> Duration {
        Duration::from_millis(self.settle_timeout_ms)
    }

    pub fn bridge_grace(&self) -> Duration {
        Duration::from_millis(self.bridge_grace_ms)
    }
}

/// Playwright browser engine
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BrowserKind {
    #[default]
    Chromium,
    Firefox,
    Webkit,
}

impl BrowserKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            BrowserKind::Chromium => "chromium",
            BrowserKind::Firefox => "firefox",
            BrowserKind::Webkit => "webkit",
        }
    }
}

impl std::str::FromStr for BrowserKind {
    type Err = crate::E2eError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "chromium" | "chrome" => Ok(BrowserKind::Chromium),
            "firefox" => Ok(BrowserKind::Firefox),
            "webkit" => Ok(BrowserKind::Webkit),
            other => Err(crate::E2eError::Config(format!("unknown browser: {}", other))),
        }
    }
}

/// Location of the application under test
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TargetConfig {
    pub base_url: String,

    /// Probe the base URL before running scenarios
    pub probe: bool,

    /// Give up probing after this long
    pub probe_timeout_ms: u64,
}

impl Default for TargetConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:3000".to_string(),
            probe: true,
            probe_timeout_ms: 30_000,
        }
    }
}
