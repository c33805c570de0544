//! Playwright browser automation through a Node bridge process
//!
//! Each session spawns `node bridge.js`, which launches one browser, one
//! context and one page, then serves newline-delimited JSON requests on
//! stdin. The Rust side owns sequencing and timeouts; the bridge only
//! translates requests into Playwright calls.

use std::path::Path;
use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use regex::Regex;
use serde::Deserialize;
use serde_json::{json, Value};
use tempfile::TempDir;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::process::{Child, ChildStdin, ChildStdout, Command};
use tokio::time::timeout;
use tracing::{debug, info, trace, warn};

use crate::config::SessionConfig;
use crate::driver::{BrowserDriver, BrowserLauncher, FrameRef, LoadState, WaitUntil};
use crate::error::{E2eError, E2eResult};
use crate::locator::Locator;
use crate::scenario::Viewport;

/// Bridge script, written to a temp dir at launch
pub const BRIDGE_SCRIPT: &str = include_str!("bridge.js");

#[derive(Debug, Deserialize)]
struct BridgeResponse {
    id: Option<u64>,
    ok: bool,
    #[serde(default)]
    value: Value,
    #[serde(default)]
    error: Option<String>,
}

#[derive(Debug, Deserialize)]
struct BridgeReady {
    ready: bool,
    #[serde(default)]
    version: Option<String>,
    #[serde(default)]
    error: Option<String>,
}

/// JSON-line request/response client over any byte stream pair
pub struct BridgeClient<R, W> {
    reader: R,
    writer: W,
    next_id: u64,
}

impl<R, W> BridgeClient<R, W>
where
    R: AsyncBufRead + Unpin + Send,
    W: AsyncWrite + Unpin + Send,
{
    pub fn new(reader: R, writer: W) -> Self {
        Self {
            reader,
            writer,
            next_id: 1,
        }
    }

    /// Wait for the bridge's ready line and return the Playwright version
    pub async fn wait_ready(&mut self, deadline: Duration) -> E2eResult<String> {
        let line = timeout(deadline, self.read_line())
            .await
            .map_err(|_| E2eError::BridgeTimeout {
                op: "launch".to_string(),
                after_ms: deadline.as_millis() as u64,
            })??;

        let ready: BridgeReady = serde_json::from_str(&line)
            .map_err(|e| E2eError::Bridge(format!("Invalid ready line '{}': {}", line.trim(), e)))?;

        if !ready.ready {
            return Err(E2eError::Bridge(format!(
                "Browser launch failed: {}",
                ready.error.unwrap_or_else(|| "unknown error".to_string())
            )));
        }

        Ok(ready.version.unwrap_or_default())
    }

    /// Send one request and wait for its response
    pub async fn request(&mut self, op: &str, args: Value, deadline: Duration) -> E2eResult<Value> {
        let id = self.next_id;
        self.next_id += 1;

        let mut message = match args {
            Value::Object(map) => map,
            Value::Null => serde_json::Map::new(),
            other => {
                return Err(E2eError::Bridge(format!(
                    "Request arguments must be an object, got {}",
                    other
                )))
            }
        };
        message.insert("id".to_string(), json!(id));
        message.insert("op".to_string(), json!(op));

        let line = serde_json::to_string(&Value::Object(message))?;
        trace!("bridge request: {}", line);

        self.writer.write_all(line.as_bytes()).await?;
        self.writer.write_all(b"\n").await?;
        self.writer.flush().await?;

        timeout(deadline, self.read_response(id))
            .await
            .map_err(|_| E2eError::BridgeTimeout {
                op: op.to_string(),
                after_ms: deadline.as_millis() as u64,
            })?
    }

    async fn read_response(&mut self, id: u64) -> E2eResult<Value> {
        loop {
            let line = self.read_line().await?;
            trace!("bridge response: {}", line.trim());

            let response: BridgeResponse = match serde_json::from_str(&line) {
                Ok(r) => r,
                Err(_) => {
                    // Stray console output from page scripts
                    debug!("Ignoring non-protocol bridge output: {}", line.trim());
                    continue;
                }
            };

            if response.id != Some(id) {
                warn!("Discarding bridge response for id {:?} while waiting for {}", response.id, id);
                continue;
            }

            if response.ok {
                return Ok(response.value);
            }
            return Err(E2eError::Bridge(
                response.error.unwrap_or_else(|| "unknown bridge error".to_string()),
            ));
        }
    }

    async fn read_line(&mut self) -> E2eResult<String> {
        let mut line = String::new();
        let n = self.reader.read_line(&mut line).await?;
        if n == 0 {
            return Err(E2eError::Bridge("Bridge process closed its output".to_string()));
        }
        Ok(line)
    }
}

/// Launches Playwright bridge sessions
#[derive(Debug, Clone, Default)]
pub struct PlaywrightLauncher;

impl PlaywrightLauncher {
    pub fn new() -> Self {
        Self
    }

    /// Check that node and the playwright package are available, returning the version
    pub async fn check_installed(config: &SessionConfig) -> E2eResult<String> {
        let output = Command::new(&config.node_binary)
            .arg("-e")
            .arg("console.log(require(require.resolve('playwright/package.json', { paths: [process.cwd()] })).version)")
            .current_dir(&config.node_workdir)
            .stdin(Stdio::null())
            .output()
            .await;

        match output {
            Ok(out) if out.status.success() => {
                let stdout = String::from_utf8_lossy(&out.stdout);
                parse_version(&stdout).ok_or(E2eError::PlaywrightNotFound)
            }
            _ => Err(E2eError::PlaywrightNotFound),
        }
    }
}

fn parse_version(output: &str) -> Option<String> {
    let re = Regex::new(r"(\d+\.\d+\.\d+(?:-[0-9A-Za-z.-]+)?)").ok()?;
    re.captures(output).map(|c| c[1].to_string())
}

#[async_trait]
impl BrowserLauncher for PlaywrightLauncher {
    async fn launch(
        &self,
        config: &SessionConfig,
        viewport: Viewport,
    ) -> E2eResult<Box<dyn BrowserDriver>> {
        let driver = PlaywrightDriver::spawn(config, viewport).await?;
        Ok(Box::new(driver))
    }
}

/// One live Playwright session
pub struct PlaywrightDriver {
    client: BridgeClient<BufReader<ChildStdout>, ChildStdin>,
    child: Child,
    grace: Duration,
    closed: bool,
    // Keeps the bridge script on disk for the life of the process
    _script_dir: TempDir,
}

impl PlaywrightDriver {
    /// Spawn the bridge and wait until the browser is up
    pub async fn spawn(config: &SessionConfig, viewport: Viewport) -> E2eResult<Self> {
        let script_dir = tempfile::tempdir()?;
        let script_path = script_dir.path().join("bridge.js");
        std::fs::write(&script_path, BRIDGE_SCRIPT)?;

        let options = json!({
            "browser": config.browser.as_str(),
            "headless": config.headless,
            "args": config.browser_args(),
            "viewport": { "width": viewport.width, "height": viewport.height },
            "default_timeout": config.default_timeout_ms,
        });

        debug!("Spawning Playwright bridge: {}", script_path.display());

        let mut child = Command::new(&config.node_binary)
            .arg(&script_path)
            .arg(options.to_string())
            .current_dir(&config.node_workdir)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| match e.kind() {
                std::io::ErrorKind::NotFound => E2eError::PlaywrightNotFound,
                _ => E2eError::Bridge(format!(
                    "Failed to spawn {}: {}",
                    config.node_binary.display(),
                    e
                )),
            })?;

        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| E2eError::Bridge("Bridge stdin unavailable".to_string()))?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| E2eError::Bridge("Bridge stdout unavailable".to_string()))?;

        if let Some(stderr) = child.stderr.take() {
            tokio::spawn(async move {
                let mut lines = BufReader::new(stderr).lines();
                while let Ok(Some(line)) = lines.next_line().await {
                    debug!(target: "bridge", "{}", line);
                }
            });
        }

        let mut client = BridgeClient::new(BufReader::new(stdout), stdin);
        let version = match client.wait_ready(config.launch_timeout()).await {
            Ok(v) => v,
            Err(e) => {
                let _ = child.kill().await;
                return Err(e);
            }
        };

        info!(
            "Playwright {} session ready ({} {}x{}, headless={})",
            version,
            config.browser.as_str(),
            viewport.width,
            viewport.height,
            config.headless
        );

        Ok(Self {
            client,
            child,
            grace: config.bridge_grace(),
            closed: false,
            _script_dir: script_dir,
        })
    }

    /// OS pid of the bridge process, `None` once it has been reaped
    pub fn id(&self) -> Option<u32> {
        self.child.id()
    }

    async fn call(&mut self, op: &str, args: Value, op_timeout: Duration) -> E2eResult<Value> {
        if self.closed {
            return Err(E2eError::Bridge(format!("'{}' on a closed session", op)));
        }
        self.client.request(op, args, op_timeout + self.grace).await
    }

    /// SIGTERM the bridge, then kill it if it lingers
    async fn terminate(&mut self) {
        #[cfg(unix)]
        {
            use nix::sys::signal::{kill, Signal};
            use nix::unistd::Pid;

            if let Some(pid) = self.child.id() {
                let _ = kill(Pid::from_raw(pid as i32), Signal::SIGTERM);
            }
        }

        if timeout(self.grace, self.child.wait()).await.is_err() {
            warn!("Bridge did not exit after SIGTERM, killing it");
            let _ = self.child.kill().await;
        }
    }
}

fn millis(d: Duration) -> u64 {
    d.as_millis() as u64
}

#[async_trait]
impl BrowserDriver for PlaywrightDriver {
    async fn goto(&mut self, url: &str, wait_until: WaitUntil, op_timeout: Duration) -> E2eResult<()> {
        let args = json!({ "url": url, "wait_until": wait_until.as_str(), "timeout": millis(op_timeout) });
        self.call("goto", args, op_timeout).await.map(|_| ())
    }

    async fn frame_count(&mut self) -> E2eResult<usize> {
        let value = self.call("frame_count", Value::Null, Duration::ZERO).await?;
        value
            .as_u64()
            .map(|n| n as usize)
            .ok_or_else(|| E2eError::Bridge(format!("frame_count returned {}", value)))
    }

    async fn wait_for_load_state(
        &mut self,
        frame: FrameRef,
        state: LoadState,
        op_timeout: Duration,
    ) -> E2eResult<()> {
        let frame = match frame {
            FrameRef::Page => Value::Null,
            FrameRef::Frame(i) => json!(i),
        };
        let args = json!({ "frame": frame, "state": state.as_str(), "timeout": millis(op_timeout) });
        self.call("wait_for_load_state", args, op_timeout).await.map(|_| ())
    }

    async fn click(&mut self, locator: &Locator, op_timeout: Duration) -> E2eResult<()> {
        let args = json!({
            "selector": locator.selector(),
            "nth": locator.nth,
            "timeout": millis(op_timeout),
        });
        self.call("click", args, op_timeout).await.map(|_| ())
    }

    async fn fill(&mut self, locator: &Locator, value: &str, op_timeout: Duration) -> E2eResult<()> {
        let args = json!({
            "selector": locator.selector(),
            "nth": locator.nth,
            "value": value,
            "timeout": millis(op_timeout),
        });
        self.call("fill", args, op_timeout).await.map(|_| ())
    }

    async fn scroll(&mut self, delta_x: i64, delta_y: i64) -> E2eResult<()> {
        let args = json!({ "delta_x": delta_x, "delta_y": delta_y });
        self.call("scroll", args, Duration::ZERO).await.map(|_| ())
    }

    async fn viewport_height(&mut self) -> E2eResult<i64> {
        let value = self.call("viewport_height", Value::Null, Duration::ZERO).await?;
        value
            .as_i64()
            .ok_or_else(|| E2eError::Bridge(format!("viewport_height returned {}", value)))
    }

    async fn wait_for_timeout(&mut self, duration: Duration) -> E2eResult<()> {
        let args = json!({ "ms": millis(duration) });
        self.call("wait_for_timeout", args, duration).await.map(|_| ())
    }

    async fn expect_visible(&mut self, locator: &Locator, op_timeout: Duration) -> E2eResult<bool> {
        let args = json!({
            "selector": locator.selector(),
            "nth": locator.nth,
            "timeout": millis(op_timeout),
        });
        let value = self.call("expect_visible", args, op_timeout).await?;
        Ok(value.as_bool().unwrap_or(false))
    }

    async fn screenshot(&mut self, path: &Path) -> E2eResult<()> {
        // The bridge runs in node_workdir; relative paths must stay relative to us
        let path = std::path::absolute(path)?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let args = json!({ "path": path.to_string_lossy() });
        self.call("screenshot", args, self.grace).await.map(|_| ())
    }

    async fn close(&mut self) -> E2eResult<()> {
        if self.closed {
            return Ok(());
        }

        let result = self.client.request("close", Value::Null, self.grace * 2).await;
        self.closed = true;
        self.terminate().await;

        debug!("Playwright session closed");
        result.map(|_| ())
    }
}
