//! Declarative YAML scenario files

use std::collections::HashSet;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::driver::LoadState;
use crate::error::{E2eError, E2eResult};
use crate::locator::Locator;

/// One scripted user journey, parsed from YAML
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Scenario {
    /// External test-case id (e.g. `TC004`)
    #[serde(default)]
    pub id: Option<String>,

    /// Unique name for this scenario
    pub name: String,

    #[serde(default)]
    pub title: String,

    #[serde(default)]
    pub description: String,

    /// Tags for filtering
    #[serde(default)]
    pub tags: Vec<String>,

    /// Path opened when the session starts, relative to the base URL
    #[serde(default = "default_start_path")]
    pub start_path: String,

    /// Viewport override for this scenario
    #[serde(default)]
    pub viewport: Option<Viewport>,

    /// Steps to execute in order
    pub steps: Vec<Step>,

    /// Final visibility checks
    pub expect: Expectation,

    /// Overrides the configured linger after a pass
    #[serde(default)]
    pub linger_ms: Option<u64>,
}

fn default_start_path() -> String {
    "/".to_string()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Viewport {
    pub width: u32,
    pub height: u32,
}

/// A single step in a scenario
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum Step {
    /// Click an element
    Click {
        locator: Locator,
        #[serde(default)]
        note: Option<String>,
        #[serde(default)]
        delay_ms: Option<u64>,
        #[serde(default)]
        timeout_ms: Option<u64>,
    },

    /// Replace the content of an input field
    Fill {
        locator: Locator,
        value: String,
        #[serde(default)]
        note: Option<String>,
        #[serde(default)]
        delay_ms: Option<u64>,
        #[serde(default)]
        timeout_ms: Option<u64>,
    },

    /// Turn the mouse wheel
    Scroll {
        #[serde(default)]
        delta_x: i64,
        delta_y: ScrollAmount,
    },

    /// Navigate to a URL (relative to the base URL)
    Goto {
        url: String,
        #[serde(default)]
        timeout_ms: Option<u64>,
        #[serde(default)]
        pause_ms: Option<u64>,
    },

    /// Wait a fixed amount of time
    Pause { ms: u64 },

    /// Best-effort wait for the page and its frames to reach a load state
    Settle {
        #[serde(default)]
        state: LoadState,
        #[serde(default)]
        timeout_ms: Option<u64>,
    },
}

/// Vertical scroll distance: a pixel count or one viewport height
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ScrollAmount {
    Pixels(i64),
    Unit(ScrollUnit),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScrollUnit {
    Viewport,
}

/// Texts that must be visible once the steps are done
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Expectation {
    pub visible: Vec<String>,

    /// Per-text timeout; falls back to the session default
    #[serde(default)]
    pub timeout_ms: Option<u64>,

    /// Reported instead of the generated message when a check fails
    #[serde(default)]
    pub failure_message: Option<String>,
}

impl Step {
    /// Short label used in logs and step records
    pub fn label(&self) -> String {
        match self {
            Step::Click { locator, note, .. } => match note {
                Some(note) => format!("click:{} ({})", locator, note),
                None => format!("click:{}", locator),
            },
            Step::Fill { locator, note, .. } => match note {
                Some(note) => format!("fill:{} ({})", locator, note),
                None => format!("fill:{}", locator),
            },
            Step::Scroll { delta_y, .. } => match delta_y {
                ScrollAmount::Pixels(px) => format!("scroll:{}px", px),
                ScrollAmount::Unit(ScrollUnit::Viewport) => "scroll:viewport".to_string(),
            },
            Step::Goto { url, .. } => format!("goto:{}", url),
            Step::Pause { ms } => format!("pause:{}ms", ms),
            Step::Settle { state, .. } => format!("settle:{}", state.as_str()),
        }
    }
}

impl Scenario {
    /// Parse a scenario from a YAML string
    pub fn from_yaml(yaml: &str) -> E2eResult<Self> {
        let scenario: Self = serde_yaml::from_str(yaml)?;
        scenario.validate()?;
        Ok(scenario)
    }

    /// Parse a scenario from a YAML file
    pub fn from_file(path: &Path) -> E2eResult<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml(&content).map_err(|e| match e {
            E2eError::Yaml(inner) => {
                E2eError::ScenarioParse(format!("{}: {}", path.display(), inner))
            }
            other => other,
        })
    }

    /// Load all scenarios below a directory, ordered by file path
    pub fn load_all(dir: &Path) -> E2eResult<Vec<Self>> {
        if !dir.is_dir() {
            return Err(E2eError::ScenarioParse(format!(
                "scenario directory not found: {}",
                dir.display()
            )));
        }

        let mut scenarios = Vec::new();
        let mut seen = HashSet::new();

        for entry in walkdir::WalkDir::new(dir)
            .sort_by_file_name()
            .into_iter()
            .filter_map(|e| e.ok())
            .filter(|e| {
                e.path()
                    .extension()
                    .map(|ext| ext == "yaml" || ext == "yml")
                    .unwrap_or(false)
            })
        {
            let scenario = Self::from_file(entry.path())?;
            if !seen.insert(scenario.name.clone()) {
                return Err(E2eError::InvalidScenario {
                    name: scenario.name,
                    reason: format!("duplicate name in {}", entry.path().display()),
                });
            }
            scenarios.push(scenario);
        }

        Ok(scenarios)
    }

    /// Filter scenarios by tag
    pub fn filter_by_tag<'a>(scenarios: &'a [Self], tag: &str) -> Vec<&'a Self> {
        scenarios
            .iter()
            .filter(|s| s.tags.iter().any(|t| t == tag))
            .collect()
    }

    /// Find a scenario by name or by external id
    pub fn find<'a>(scenarios: &'a [Self], key: &str) -> Option<&'a Self> {
        scenarios
            .iter()
            .find(|s| s.name == key || s.id.as_deref() == Some(key))
    }

    /// Structural checks that serde cannot express
    pub fn validate(&self) -> E2eResult<()> {
        let invalid = |reason: &str| E2eError::InvalidScenario {
            name: self.name.clone(),
            reason: reason.to_string(),
        };

        if self.name.trim().is_empty() {
            return Err(invalid("name is empty"));
        }
        if self.steps.is_empty() {
            return Err(invalid("no steps"));
        }
        if self.expect.visible.is_empty() {
            return Err(invalid("expect.visible lists no text"));
        }
        if self.expect.visible.iter().any(|t| t.trim().is_empty()) {
            return Err(invalid("expect.visible contains an empty text"));
        }
        if let Some(vp) = self.viewport {
            if vp.width == 0 || vp.height == 0 {
                return Err(invalid("viewport dimensions must be positive"));
            }
        }
        for (i, step) in self.steps.iter().enumerate() {
            if let Step::Goto { url, .. } = step {
                if url.trim().is_empty() {
                    return Err(invalid(&format!("step {} has an empty url", i + 1)));
                }
            }
        }

        Ok(())
    }

    /// Name shown to humans: `TC004 dashboard-data-rendering`
    pub fn display_name(&self) -> String {
        match &self.id {
            Some(id) => format!("{} {}", id, self.name),
            None => self.name.clone(),
        }
    }
}
