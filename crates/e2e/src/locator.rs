//! Element locators in Playwright selector syntax

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{E2eError, E2eResult};

/// Selector engine understood by Playwright
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SelectorEngine {
    Xpath,
    Text,
    Css,
}

impl SelectorEngine {
    fn prefix(&self) -> &'static str {
        match self {
            SelectorEngine::Xpath => "xpath",
            SelectorEngine::Text => "text",
            SelectorEngine::Css => "css",
        }
    }
}

/// A positional reference to one UI element.
///
/// Scenario files write locators as plain strings (`xpath=html/body/div[2]/...`).
/// The `nth` index picks one match out of several and defaults to the first.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Locator {
    pub engine: SelectorEngine,
    pub query: String,
    pub nth: usize,
}

impl Locator {
    /// Parse a locator string.
    ///
    /// Accepted forms:
    /// - `xpath=...`, `text=...`, `css=...`
    /// - bare XPath starting with `/` or `html/`
    /// - anything else is treated as CSS
    ///
    /// A trailing `>> nth=N` selects the N-th match.
    pub fn parse(raw: &str) -> E2eResult<Self> {
        let raw = raw.trim();
        if raw.is_empty() {
            return Err(E2eError::InvalidLocator("empty locator".to_string()));
        }

        let (body, nth) = split_nth(raw)?;

        let (engine, query) = if let Some(rest) = body.strip_prefix("xpath=") {
            (SelectorEngine::Xpath, rest)
        } else if let Some(rest) = body.strip_prefix("text=") {
            (SelectorEngine::Text, rest)
        } else if let Some(rest) = body.strip_prefix("css=") {
            (SelectorEngine::Css, rest)
        } else if body.starts_with('/') || body.starts_with("html/") {
            (SelectorEngine::Xpath, body)
        } else {
            (SelectorEngine::Css, body)
        };

        let query = query.trim();
        if query.is_empty() {
            return Err(E2eError::InvalidLocator(format!("'{}' has no query", raw)));
        }

        Ok(Self {
            engine,
            query: query.to_string(),
            nth,
        })
    }

    /// Locator matching visible text, as used by the final assertions
    pub fn text(text: &str) -> Self {
        Self {
            engine: SelectorEngine::Text,
            query: text.to_string(),
            nth: 0,
        }
    }

    /// Selector string handed to Playwright (without the nth suffix)
    pub fn selector(&self) -> String {
        format!("{}={}", self.engine.prefix(), self.query)
    }
}

fn split_nth(raw: &str) -> E2eResult<(&str, usize)> {
    match raw.rsplit_once(">>") {
        Some((body, tail)) if tail.trim().starts_with("nth=") => {
            let n = tail.trim()["nth=".len()..]
                .parse::<usize>()
                .map_err(|_| E2eError::InvalidLocator(format!("bad nth index in '{}'", raw)))?;
            Ok((body.trim_end(), n))
        }
        _ => Ok((raw, 0)),
    }
}

impl fmt::Display for Locator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.nth == 0 {
            write!(f, "{}", self.selector())
        } else {
            write!(f, "{} >> nth={}", self.selector(), self.nth)
        }
    }
}

impl FromStr for Locator {
    type Err = E2eError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for Locator {
    type Error = E2eError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<Locator> for String {
    fn from(locator: Locator) -> Self {
        locator.to_string()
    }
}
