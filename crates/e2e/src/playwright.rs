//! Playwright browser automation
//!
//! A [`PlaywrightSession`] owns one `node` process running the bridge script
//! in `js/bridge.js`, which holds a single browser, context and page for the
//! lifetime of a test case. Requests and responses are newline-delimited
//! JSON; responses are matched to requests by id so several requests can be
//! in flight at once.

use async_trait::async_trait;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::process::{Child, ChildStdin, Command as TokioCommand};
use tokio::sync::oneshot;
use tracing::{debug, info, warn};

use crate::driver::{Driver, FrameInfo, LoadState, Locator, WaitState};
use crate::error::{E2eError, E2eResult};

const BRIDGE_SCRIPT: &str = include_str!("js/bridge.js");

/// Extra time the Rust side allows on top of an operation's own bound
const RESPONSE_GRACE: Duration = Duration::from_secs(5);

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Browser {
    #[default]
    Chromium,
    Firefox,
    Webkit,
}

impl Browser {
    pub fn as_str(&self) -> &'static str {
        match self {
            Browser::Chromium => "chromium",
            Browser::Firefox => "firefox",
            Browser::Webkit => "webkit",
        }
    }
}

impl std::str::FromStr for Browser {
    type Err = E2eError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "chromium" | "chrome" => Ok(Browser::Chromium),
            "firefox" => Ok(Browser::Firefox),
            "webkit" => Ok(Browser::Webkit),
            other => Err(E2eError::Config(format!("unknown browser '{}'", other))),
        }
    }
}

/// Configuration for Playwright
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PlaywrightConfig {
    pub browser: Browser,
    pub headless: bool,
    pub viewport_width: u32,
    pub viewport_height: u32,
    pub ignore_https_errors: bool,

    /// Directory whose `node_modules` provides `playwright`
    pub node_project_dir: PathBuf,

    /// Playwright's own default for operations without an explicit bound
    pub default_timeout_ms: u64,

    /// How long the browser may take to launch
    pub startup_timeout_ms: u64,
}

impl Default for PlaywrightConfig {
    fn default() -> Self {
        Self {
            browser: Browser::Chromium,
            headless: true,
            viewport_width: 1280,
            viewport_height: 720,
            ignore_https_errors: true,
            node_project_dir: PathBuf::from("."),
            default_timeout_ms: 5_000,
            startup_timeout_ms: 30_000,
        }
    }
}

#[derive(Debug, Deserialize)]
struct BridgeResponse {
    id: u64,
    ok: bool,
    #[serde(default)]
    result: Value,
    #[serde(default)]
    error: Option<BridgeError>,
}

#[derive(Debug, Deserialize)]
struct BridgeError {
    kind: String,
    message: String,
}

impl BridgeError {
    fn into_error(self, op: &str) -> E2eError {
        let message = format!("{}: {}", op, self.message);
        match self.kind.as_str() {
            "timeout" => E2eError::Timeout(message),
            "detached" => E2eError::FrameDetached(message),
            _ => E2eError::Driver(message),
        }
    }
}

type Pending = Arc<Mutex<HashMap<u64, oneshot::Sender<BridgeResponse>>>>;

/// A live browser page driven through the bridge process
pub struct PlaywrightSession {
    child: tokio::sync::Mutex<Child>,
    stdin: tokio::sync::Mutex<ChildStdin>,
    pending: Pending,
    next_id: AtomicU64,
    default_timeout: Duration,
}

impl PlaywrightSession {
    /// Launch a browser and wait until its page is ready
    pub async fn launch(config: &PlaywrightConfig) -> E2eResult<Self> {
        check_playwright_installed(&config.node_project_dir).await?;

        let bridge_config = json!({
            "browser": config.browser.as_str(),
            "headless": config.headless,
            "viewport_width": config.viewport_width,
            "viewport_height": config.viewport_height,
            "ignore_https_errors": config.ignore_https_errors,
            "default_timeout_ms": config.default_timeout_ms,
        });

        info!(
            "Launching {} ({})",
            config.browser.as_str(),
            if config.headless { "headless" } else { "headed" }
        );

        let mut child = TokioCommand::new("node")
            .arg("-e")
            .arg(BRIDGE_SCRIPT)
            .env("CHECKOUT_BRIDGE_CONFIG", bridge_config.to_string())
            .current_dir(&config.node_project_dir)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| E2eError::BridgeStartup(format!("failed to spawn node: {}", e)))?;

        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| E2eError::BridgeStartup("bridge stdin unavailable".to_string()))?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| E2eError::BridgeStartup("bridge stdout unavailable".to_string()))?;

        if let Some(stderr) = child.stderr.take() {
            tokio::spawn(async move {
                let mut lines = BufReader::new(stderr).lines();
                while let Ok(Some(line)) = lines.next_line().await {
                    debug!(target: "playwright_bridge", "{}", line);
                }
            });
        }

        let pending: Pending = Arc::new(Mutex::new(HashMap::new()));
        let (ready_tx, ready_rx) = oneshot::channel();
        pending.lock().insert(0, ready_tx);

        let reader_pending = pending.clone();
        tokio::spawn(async move {
            let mut lines = BufReader::new(stdout).lines();
            while let Ok(Some(line)) = lines.next_line().await {
                match serde_json::from_str::<BridgeResponse>(&line) {
                    Ok(response) => {
                        if let Some(tx) = reader_pending.lock().remove(&response.id) {
                            let _ = tx.send(response);
                        }
                    }
                    Err(e) => warn!("Unparseable bridge output ({}): {}", e, line),
                }
            }
            // Dropping the senders fails every outstanding request
            reader_pending.lock().clear();
        });

        let startup = Duration::from_millis(config.startup_timeout_ms);
        let ready = match tokio::time::timeout(startup, ready_rx).await {
            Ok(Ok(response)) => response,
            Ok(Err(_)) => {
                return Err(E2eError::BridgeStartup("bridge exited during startup".to_string()))
            }
            Err(_) => {
                return Err(E2eError::BridgeStartup(format!(
                    "browser not ready after {:?}",
                    startup
                )))
            }
        };
        if !ready.ok {
            let reason = ready
                .error
                .map(|e| e.message)
                .unwrap_or_else(|| "unknown error".to_string());
            return Err(E2eError::BridgeStartup(reason));
        }

        Ok(Self {
            child: tokio::sync::Mutex::new(child),
            stdin: tokio::sync::Mutex::new(stdin),
            pending,
            next_id: AtomicU64::new(1),
            default_timeout: Duration::from_millis(config.default_timeout_ms),
        })
    }

    /// Send one request and wait for its response
    async fn request(&self, op: &str, args: Value, bound: Option<Duration>) -> E2eResult<Value> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let (tx, rx) = oneshot::channel();
        self.pending.lock().insert(id, tx);

        let line = format!("{}\n", json!({ "id": id, "op": op, "args": args }));
        {
            let mut stdin = self.stdin.lock().await;
            let written = async {
                stdin.write_all(line.as_bytes()).await?;
                stdin.flush().await
            }
            .await;
            if let Err(e) = written {
                self.pending.lock().remove(&id);
                return Err(E2eError::Driver(format!("{}: bridge write failed: {}", op, e)));
            }
        }

        let bound = bound.unwrap_or(self.default_timeout) + RESPONSE_GRACE;
        match tokio::time::timeout(bound, rx).await {
            Ok(Ok(response)) if response.ok => Ok(response.result),
            Ok(Ok(response)) => Err(response
                .error
                .map(|e| e.into_error(op))
                .unwrap_or_else(|| E2eError::Driver(format!("{}: failed without detail", op)))),
            Ok(Err(_)) => Err(E2eError::Driver(format!("{}: bridge exited", op))),
            Err(_) => {
                self.pending.lock().remove(&id);
                Err(E2eError::Timeout(format!("{}: no bridge response within {:?}", op, bound)))
            }
        }
    }

    async fn locator_request(&self, op: &str, locator: &Locator, mut extra: Value, bound: Option<Duration>) -> E2eResult<Value> {
        extra["locator"] = serde_json::to_value(locator)?;
        self.request(op, extra, bound).await
    }

    /// Close the browser and stop the bridge process
    pub async fn shutdown(&self) -> E2eResult<()> {
        if let Err(e) = self.request("close", json!({}), Some(Duration::from_secs(5))).await {
            debug!("Bridge close request failed: {}", e);
        }

        let mut child = self.child.lock().await;
        if let Ok(Some(_)) = child.try_wait() {
            return Ok(());
        }

        #[cfg(unix)]
        {
            use nix::sys::signal::{kill, Signal};
            use nix::unistd::Pid;

            if let Some(pid) = child.id() {
                if kill(Pid::from_raw(pid as i32), Signal::SIGTERM).is_ok() {
                    tokio::time::sleep(Duration::from_millis(500)).await;
                }
            }
        }

        let _ = child.kill().await;
        Ok(())
    }
}

/// Verify Playwright resolves from the project directory
async fn check_playwright_installed(project_dir: &Path) -> E2eResult<()> {
    let status = TokioCommand::new("npx")
        .args(["playwright", "--version"])
        .current_dir(project_dir)
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .await;

    match status {
        Ok(status) if status.success() => Ok(()),
        _ => Err(E2eError::PlaywrightNotFound),
    }
}

fn as_bool(value: Value, op: &str) -> E2eResult<bool> {
    value
        .as_bool()
        .ok_or_else(|| E2eError::Driver(format!("{}: expected boolean, got {}", op, value)))
}

fn as_opt_string(value: Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s),
        _ => None,
    }
}

#[async_trait]
impl Driver for PlaywrightSession {
    async fn goto(&self, url: &str) -> E2eResult<()> {
        debug!("goto {}", url);
        self.request("goto", json!({ "url": url }), Some(Duration::from_secs(30)))
            .await
            .map(|_| ())
    }

    async fn current_url(&self) -> E2eResult<String> {
        let value = self.request("url", json!({}), None).await?;
        as_opt_string(value).ok_or_else(|| E2eError::Driver("url: expected string".to_string()))
    }

    async fn wait_for(&self, locator: &Locator, state: WaitState, timeout: Duration) -> E2eResult<()> {
        let args = json!({ "state": state.as_str(), "timeout": timeout.as_millis() as u64 });
        self.locator_request("wait_for", locator, args, Some(timeout))
            .await
            .map(|_| ())
    }

    async fn is_visible(&self, locator: &Locator) -> E2eResult<bool> {
        let value = self.locator_request("is_visible", locator, json!({}), None).await?;
        as_bool(value, "is_visible")
    }

    async fn is_enabled(&self, locator: &Locator) -> E2eResult<bool> {
        let value = self.locator_request("is_enabled", locator, json!({}), None).await?;
        as_bool(value, "is_enabled")
    }

    async fn is_checked(&self, locator: &Locator) -> E2eResult<bool> {
        let value = self.locator_request("is_checked", locator, json!({}), None).await?;
        as_bool(value, "is_checked")
    }

    async fn count(&self, locator: &Locator) -> E2eResult<usize> {
        let value = self.locator_request("count", locator, json!({}), None).await?;
        value
            .as_u64()
            .map(|n| n as usize)
            .ok_or_else(|| E2eError::Driver(format!("count: expected number, got {}", value)))
    }

    async fn click(&self, locator: &Locator, timeout: Duration) -> E2eResult<()> {
        debug!("click {}", locator);
        let args = json!({ "timeout": timeout.as_millis() as u64 });
        self.locator_request("click", locator, args, Some(timeout))
            .await
            .map(|_| ())
    }

    async fn dom_click(&self, locator: &Locator) -> E2eResult<()> {
        debug!("dom click {}", locator);
        self.locator_request("dom_click", locator, json!({}), None)
            .await
            .map(|_| ())
    }

    async fn fill(&self, locator: &Locator, value: &str) -> E2eResult<()> {
        self.locator_request("fill", locator, json!({ "value": value }), None)
            .await
            .map(|_| ())
    }

    async fn type_text(&self, locator: &Locator, text: &str) -> E2eResult<()> {
        self.locator_request("type", locator, json!({ "text": text }), None)
            .await
            .map(|_| ())
    }

    async fn press(&self, locator: &Locator, key: &str) -> E2eResult<()> {
        self.locator_request("press", locator, json!({ "key": key }), None)
            .await
            .map(|_| ())
    }

    async fn select_option(&self, locator: &Locator, value: &str) -> E2eResult<()> {
        self.locator_request("select", locator, json!({ "value": value }), None)
            .await
            .map(|_| ())
    }

    async fn set_checked(&self, locator: &Locator, checked: bool) -> E2eResult<()> {
        self.locator_request("set_checked", locator, json!({ "checked": checked }), None)
            .await
            .map(|_| ())
    }

    async fn text_content(&self, locator: &Locator) -> E2eResult<Option<String>> {
        let value = self.locator_request("text_content", locator, json!({}), None).await?;
        Ok(as_opt_string(value))
    }

    async fn all_text_contents(&self, locator: &Locator) -> E2eResult<Vec<String>> {
        let value = self.locator_request("all_text_contents", locator, json!({}), None).await?;
        Ok(serde_json::from_value(value)?)
    }

    async fn get_attribute(&self, locator: &Locator, name: &str) -> E2eResult<Option<String>> {
        let value = self
            .locator_request("get_attribute", locator, json!({ "name": name }), None)
            .await?;
        Ok(as_opt_string(value))
    }

    async fn wait_for_url(&self, pattern: &str, timeout: Duration) -> E2eResult<()> {
        let args = json!({ "pattern": pattern, "timeout": timeout.as_millis() as u64 });
        self.request("wait_for_url", args, Some(timeout)).await.map(|_| ())
    }

    async fn wait_for_navigation(&self, timeout: Duration) -> E2eResult<()> {
        let args = json!({ "timeout": timeout.as_millis() as u64 });
        self.request("wait_for_navigation", args, Some(timeout))
            .await
            .map(|_| ())
    }

    async fn wait_for_load_state(&self, state: LoadState, timeout: Duration) -> E2eResult<()> {
        let args = json!({ "state": state.as_str(), "timeout": timeout.as_millis() as u64 });
        self.request("wait_for_load_state", args, Some(timeout))
            .await
            .map(|_| ())
    }

    async fn frames(&self) -> E2eResult<Vec<FrameInfo>> {
        let value = self.request("frames", json!({}), None).await?;
        Ok(serde_json::from_value(value)?)
    }

    async fn screenshot(&self, path: &Path, full_page: bool) -> E2eResult<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let args = json!({ "path": path.to_string_lossy(), "full_page": full_page });
        self.request("screenshot", args, Some(Duration::from_secs(30)))
            .await
            .map(|_| ())
    }

    async fn close(&self) -> E2eResult<()> {
        self.shutdown().await
    }
}
