//! Browser driver seam
//!
//! The runner only talks to these traits. The Playwright bridge implements
//! them for real sessions; tests substitute a scripted fake.

use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::config::SessionConfig;
use crate::error::E2eResult;
use crate::locator::Locator;
use crate::scenario::Viewport;

/// Page load milestone, mirrors Playwright's `waitForLoadState`
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LoadState {
    #[default]
    Load,
    DomContentLoaded,
    NetworkIdle,
}

impl LoadState {
    pub fn as_str(&self) -> &'static str {
        match self {
            LoadState::Load => "load",
            LoadState::DomContentLoaded => "domcontentloaded",
            LoadState::NetworkIdle => "networkidle",
        }
    }
}

/// When a navigation counts as finished
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WaitUntil {
    Commit,
    DomContentLoaded,
    #[default]
    Load,
    NetworkIdle,
}

impl WaitUntil {
    pub fn as_str(&self) -> &'static str {
        match self {
            WaitUntil::Commit => "commit",
            WaitUntil::DomContentLoaded => "domcontentloaded",
            WaitUntil::Load => "load",
            WaitUntil::NetworkIdle => "networkidle",
        }
    }
}

/// Which frame a load-state wait applies to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameRef {
    Page,
    Frame(usize),
}

/// One exclusive browser session.
///
/// Element operations act on the most recently opened page of the session,
/// so a click that opens a new tab moves subsequent steps onto it.
#[async_trait]
pub trait BrowserDriver: Send {
    async fn goto(&mut self, url: &str, wait_until: WaitUntil, timeout: Duration) -> E2eResult<()>;

    async fn frame_count(&mut self) -> E2eResult<usize>;

    async fn wait_for_load_state(
        &mut self,
        frame: FrameRef,
        state: LoadState,
        timeout: Duration,
    ) -> E2eResult<()>;

    async fn click(&mut self, locator: &Locator, timeout: Duration) -> E2eResult<()>;

    async fn fill(&mut self, locator: &Locator, value: &str, timeout: Duration) -> E2eResult<()>;

    async fn scroll(&mut self, delta_x: i64, delta_y: i64) -> E2eResult<()>;

    /// `window.innerHeight` of the current page
    async fn viewport_height(&mut self) -> E2eResult<i64>;

    async fn wait_for_timeout(&mut self, duration: Duration) -> E2eResult<()>;

    /// Resolve to `Ok(false)` when the element is not visible within `timeout`
    async fn expect_visible(&mut self, locator: &Locator, timeout: Duration) -> E2eResult<bool>;

    async fn screenshot(&mut self, path: &Path) -> E2eResult<()>;

    /// Close context and browser, release the process
    async fn close(&mut self) -> E2eResult<()>;
}

/// Opens a fresh browser session per scenario
#[async_trait]
pub trait BrowserLauncher: Send + Sync {
    async fn launch(
        &self,
        config: &SessionConfig,
        viewport: Viewport,
    ) -> E2eResult<Box<dyn BrowserDriver>>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_load_state_names() {
        assert_eq!(LoadState::DomContentLoaded.as_str(), "domcontentloaded");
        let parsed: LoadState = serde_yaml::from_str("networkidle").unwrap();
        assert_eq!(parsed, LoadState::NetworkIdle);
        assert_eq!(LoadState::default(), LoadState::Load);
    }

    #[test]
    fn test_wait_until_serializes_lowercase() {
        let json = serde_json::to_string(&WaitUntil::Commit).unwrap();
        assert_eq!(json, "\"commit\"");
    }
}
