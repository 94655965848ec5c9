//! Chromium DevTools engine.
//!
//! Launches a managed browser bound to a persistent profile directory (so
//! login state survives across invocations), discovers the page target over
//! the `/json` HTTP endpoints and drives it through the DevTools WebSocket.
//! Element work goes through `Runtime.evaluate` with `returnByValue`, which
//! keeps the engine independent of any particular DOM protocol surface.

use std::collections::HashMap;
use std::env;
use std::path::PathBuf;
use std::process::Stdio;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt};
use serde::Deserialize;
use serde_json::{json, Value};
use tokio::process::{Child, Command};
use tokio::sync::{mpsc, oneshot, Mutex};
use tokio::task::JoinHandle;
use tokio_tungstenite::{connect_async, tungstenite::Message};
use tracing::debug;

use crate::engine::{BrowserEngine, LinkInfo, PageInfo};
use crate::errors::AutomationError;
use crate::selector::Selector;

const COMMAND_TIMEOUT: Duration = Duration::from_secs(10);
const LAUNCH_POLL_INTERVAL: Duration = Duration::from_millis(250);
const LAUNCH_DEADLINE: Duration = Duration::from_secs(20);
const IDLE_POLL_INTERVAL: Duration = Duration::from_millis(250);
const IDLE_QUIET_PERIOD: Duration = Duration::from_millis(500);

/// Launch options for the managed Chromium instance.
#[derive(Debug, Clone)]
pub struct CdpConfig {
    pub binary: Option<PathBuf>,
    pub profile_dir: PathBuf,
    pub debug_port: u16,
    pub headless: bool,
}

impl CdpConfig {
    pub fn with_profile(profile_dir: impl Into<PathBuf>) -> Self {
        Self {
            binary: None,
            profile_dir: profile_dir.into(),
            debug_port: 9222,
            headless: false,
        }
    }
}

/// Locates a Chromium-flavored binary: explicit override first, then PATH.
fn resolve_binary(config: &CdpConfig) -> Result<PathBuf, AutomationError> {
    if let Some(binary) = &config.binary {
        return Ok(binary.clone());
    }
    if let Some(from_env) = env::var_os("SCRIBE_BROWSER") {
        let path = PathBuf::from(from_env);
        if !path.as_os_str().is_empty() {
            return Ok(path);
        }
    }
    let candidates = [
        "google-chrome",
        "google-chrome-stable",
        "chromium",
        "chromium-browser",
        "msedge",
    ];
    let path_var = env::var_os("PATH").unwrap_or_default();
    for dir in env::split_paths(&path_var) {
        for name in candidates {
            let candidate = dir.join(name);
            if candidate.is_file() {
                return Ok(candidate);
            }
        }
    }
    Err(AutomationError::SessionUnavailable(
        "no Chromium-flavored browser found on PATH; set SCRIBE_BROWSER".to_string(),
    ))
}

#[derive(Debug, Deserialize)]
struct TargetInfo {
    id: String,
    #[serde(default)]
    title: String,
    #[serde(default)]
    url: String,
    #[serde(rename = "type", default)]
    kind: String,
    #[serde(rename = "webSocketDebuggerUrl")]
    websocket_url: Option<String>,
}

#[derive(Debug, Deserialize)]
struct CdpMessage {
    id: Option<u64>,
    result: Option<Value>,
    error: Option<CdpErrorBody>,
    method: Option<String>,
}

#[derive(Debug, Deserialize)]
struct CdpErrorBody {
    code: i64,
    message: String,
}

type Pending = std::sync::Arc<Mutex<HashMap<u64, oneshot::Sender<Result<Value, String>>>>>;

struct WsHandle {
    sender: mpsc::UnboundedSender<Message>,
    pending: Pending,
    _writer: JoinHandle<()>,
    _reader: JoinHandle<()>,
}

/// The production `BrowserEngine`: one managed browser process, one attached
/// page target.
pub struct CdpEngine {
    http: reqwest::Client,
    base_url: String,
    next_id: AtomicU64,
    ws: Mutex<Option<WsHandle>>,
    child: Mutex<Option<Child>>,
    closed: AtomicBool,
}

impl CdpEngine {
    /// Launches the browser and attaches to a page target. Start failure is
    /// reported as `SessionUnavailable`, not retried here.
    pub async fn launch(config: CdpConfig) -> Result<Self, AutomationError> {
        let binary = resolve_binary(&config)?;
        let mut command = Command::new(&binary);
        command
            .arg(format!("--remote-debugging-port={}", config.debug_port))
            .arg(format!("--user-data-dir={}", config.profile_dir.display()))
            .arg("--no-first-run")
            .arg("--no-default-browser-check")
            .arg("--disable-blink-features=AutomationControlled")
            .arg("about:blank")
            .stdout(Stdio::null())
            .stderr(Stdio::null());
        if config.headless {
            command.arg("--headless=new");
        }
        let child = command.spawn().map_err(|e| {
            AutomationError::SessionUnavailable(format!(
                "failed to start {}: {e}",
                binary.display()
            ))
        })?;

        let engine = Self {
            http: reqwest::Client::new(),
            base_url: format!("http://127.0.0.1:{}", config.debug_port),
            next_id: AtomicU64::new(1),
            ws: Mutex::new(None),
            child: Mutex::new(Some(child)),
            closed: AtomicBool::new(false),
        };

        engine.await_devtools().await?;
        let target = engine.pick_page_target().await?;
        engine.attach(&target).await?;
        debug!(url = %target.url, "attached to page target");
        Ok(engine)
    }

    /// Polls the version endpoint until DevTools answers or the launch
    /// deadline elapses.
    async fn await_devtools(&self) -> Result<(), AutomationError> {
        let deadline = tokio::time::Instant::now() + LAUNCH_DEADLINE;
        loop {
            let probe = self
                .http
                .get(format!("{}/json/version", self.base_url))
                .send()
                .await;
            if let Ok(response) = probe {
                if response.status().is_success() {
                    return Ok(());
                }
            }
            if tokio::time::Instant::now() >= deadline {
                let _ = self.kill_child().await;
                return Err(AutomationError::SessionUnavailable(format!(
                    "DevTools endpoint never came up within {LAUNCH_DEADLINE:?}"
                )));
            }
            tokio::time::sleep(LAUNCH_POLL_INTERVAL).await;
        }
    }

    async fn list_targets(&self) -> Result<Vec<TargetInfo>, AutomationError> {
        let response = self
            .http
            .get(format!("{}/json", self.base_url))
            .send()
            .await
            .map_err(|e| AutomationError::EngineError(format!("target list failed: {e}")))?;
        response
            .json::<Vec<TargetInfo>>()
            .await
            .map_err(|e| AutomationError::EngineError(format!("target list unparseable: {e}")))
    }

    async fn pick_page_target(&self) -> Result<TargetInfo, AutomationError> {
        let targets = self.list_targets().await?;
        if let Some(page) = targets.into_iter().find(|t| t.kind == "page") {
            return Ok(page);
        }
        // Newer Chromium wants PUT for /json/new
        let response = self
            .http
            .put(format!("{}/json/new?about:blank", self.base_url))
            .send()
            .await
            .map_err(|e| AutomationError::EngineError(format!("could not open a page: {e}")))?;
        response
            .json::<TargetInfo>()
            .await
            .map_err(|e| AutomationError::EngineError(format!("new page unparseable: {e}")))
    }

    async fn attach(&self, target: &TargetInfo) -> Result<(), AutomationError> {
        let ws_url = target.websocket_url.as_deref().ok_or_else(|| {
            AutomationError::SessionUnavailable(
                "page target has no WebSocket debugger URL; is another client attached?"
                    .to_string(),
            )
        })?;
        let (stream, _) = connect_async(ws_url).await.map_err(|e| {
            AutomationError::SessionUnavailable(format!("DevTools WebSocket connect failed: {e}"))
        })?;
        let (mut sink, mut source) = stream.split();

        let (sender, mut outbound) = mpsc::unbounded_channel::<Message>();
        let writer = tokio::spawn(async move {
            while let Some(message) = outbound.recv().await {
                if sink.send(message).await.is_err() {
                    break;
                }
            }
        });

        let pending: Pending = std::sync::Arc::new(Mutex::new(HashMap::new()));
        let pending_for_reader = pending.clone();
        let reader = tokio::spawn(async move {
            while let Some(next) = source.next().await {
                let text = match next {
                    Ok(Message::Text(text)) => text,
                    Ok(_) => continue,
                    Err(e) => {
                        debug!(error = %e, "DevTools WebSocket closed");
                        break;
                    }
                };
                let message: CdpMessage = match serde_json::from_str(&text) {
                    Ok(m) => m,
                    Err(e) => {
                        debug!(error = %e, "unparseable DevTools frame");
                        continue;
                    }
                };
                match message.id {
                    Some(id) => {
                        if let Some(waiter) = pending_for_reader.lock().await.remove(&id) {
                            let outcome = match message.error {
                                Some(err) => Err(format!("{} (code {})", err.message, err.code)),
                                None => Ok(message.result.unwrap_or(Value::Null)),
                            };
                            let _ = waiter.send(outcome);
                        }
                    }
                    None => {
                        if let Some(method) = message.method {
                            debug!(%method, "DevTools event");
                        }
                    }
                }
            }
        });

        let mut guard = self.ws.lock().await;
        *guard = Some(WsHandle {
            sender,
            pending,
            _writer: writer,
            _reader: reader,
        });
        Ok(())
    }

    async fn command(&self, method: &str, params: Value) -> Result<Value, AutomationError> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(AutomationError::SessionUnavailable(
                "engine already closed".to_string(),
            ));
        }
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let (tx, rx) = oneshot::channel();
        let pending = {
            let guard = self.ws.lock().await;
            let ws = guard.as_ref().ok_or_else(|| {
                AutomationError::SessionUnavailable("no page target attached".to_string())
            })?;
            ws.pending.lock().await.insert(id, tx);
            let frame = json!({ "id": id, "method": method, "params": params });
            ws.sender
                .send(Message::Text(frame.to_string()))
                .map_err(|e| AutomationError::EngineError(format!("command channel closed: {e}")))?;
            ws.pending.clone()
        };
        match tokio::time::timeout(COMMAND_TIMEOUT, rx).await {
            Ok(Ok(Ok(value))) => Ok(value),
            Ok(Ok(Err(message))) => Err(AutomationError::EngineError(format!("{method}: {message}"))),
            Ok(Err(_)) => Err(AutomationError::EngineError(format!(
                "{method}: response channel dropped"
            ))),
            Err(_) => {
                pending.lock().await.remove(&id);
                Err(AutomationError::Timeout(format!(
                    "{method} did not answer within {COMMAND_TIMEOUT:?}"
                )))
            }
        }
    }

    /// Evaluates an expression in the page and returns its value.
    async fn eval(&self, expression: &str) -> Result<Value, AutomationError> {
        let result = self
            .command(
                "Runtime.evaluate",
                json!({
                    "expression": expression,
                    "returnByValue": true,
                    "awaitPromise": true,
                }),
            )
            .await?;
        if let Some(details) = result.get("exceptionDetails") {
            let description = details
                .pointer("/exception/description")
                .and_then(Value::as_str)
                .unwrap_or("unknown script exception");
            return Err(AutomationError::EngineError(format!(
                "script threw: {description}"
            )));
        }
        Ok(result.pointer("/result/value").cloned().unwrap_or(Value::Null))
    }

    async fn eval_string(&self, expression: &str) -> Result<String, AutomationError> {
        Ok(self
            .eval(expression)
            .await?
            .as_str()
            .unwrap_or_default()
            .to_string())
    }

    async fn kill_child(&self) -> Result<(), AutomationError> {
        if let Some(mut child) = self.child.lock().await.take() {
            if let Err(e) = child.kill().await {
                debug!(error = %e, "browser process kill reported an error");
            }
        }
        Ok(())
    }
}

#[async_trait]
impl BrowserEngine for CdpEngine {
    async fn navigate(&self, url: &str) -> Result<(), AutomationError> {
        self.command("Page.navigate", json!({ "url": url })).await?;
        Ok(())
    }

    async fn current_url(&self) -> Result<String, AutomationError> {
        self.eval_string("location.href").await
    }

    async fn title(&self) -> Result<String, AutomationError> {
        self.eval_string("document.title").await
    }

    async fn content(&self) -> Result<String, AutomationError> {
        self.eval_string("document.documentElement.outerHTML").await
    }

    async fn open_pages(&self) -> Result<Vec<PageInfo>, AutomationError> {
        let targets = self.list_targets().await?;
        Ok(targets
            .into_iter()
            .filter(|t| t.kind == "page")
            .map(|t| PageInfo {
                id: t.id,
                url: t.url,
                title: if t.title.is_empty() { None } else { Some(t.title) },
            })
            .collect())
    }

    async fn page_title(&self, page_id: &str) -> Result<String, AutomationError> {
        let targets = self.list_targets().await?;
        targets
            .into_iter()
            .find(|t| t.id == page_id)
            .map(|t| t.title)
            .ok_or_else(|| {
                AutomationError::ElementNotFound(format!("no open page with id {page_id}"))
            })
    }

    async fn count(&self, selector: &Selector) -> Result<usize, AutomationError> {
        let value = self
            .eval(&format!("({}).length", selector.to_js_array()))
            .await?;
        Ok(value.as_u64().unwrap_or(0) as usize)
    }

    async fn click(&self, selector: &Selector) -> Result<(), AutomationError> {
        let script = format!(
            "(() => {{ const m = {}; if (!m.length) return false; m[0].click(); return true; }})()",
            selector.to_js_array()
        );
        match self.eval(&script).await?.as_bool() {
            Some(true) => Ok(()),
            _ => Err(AutomationError::ElementNotFound(format!(
                "nothing to click for {selector}"
            ))),
        }
    }

    async fn fill(&self, selector: &Selector, text: &str) -> Result<(), AutomationError> {
        let literal = serde_json::to_string(text)
            .map_err(|e| AutomationError::InvalidArgument(format!("unencodable text: {e}")))?;
        let script = format!(
            "(() => {{ const m = {}; if (!m.length) return false; const el = m[0]; el.focus(); \
             if ('value' in el) {{ el.value = {literal}; }} else {{ el.textContent = {literal}; }} \
             el.dispatchEvent(new Event('input', {{ bubbles: true }})); \
             el.dispatchEvent(new Event('change', {{ bubbles: true }})); return true; }})()",
            selector.to_js_array()
        );
        match self.eval(&script).await?.as_bool() {
            Some(true) => Ok(()),
            _ => Err(AutomationError::ElementNotFound(format!(
                "nothing to fill for {selector}"
            ))),
        }
    }

    async fn text_of(&self, selector: &Selector) -> Result<String, AutomationError> {
        let script = format!(
            "(() => {{ const m = {}; return m.length ? (m[0].textContent || '') : null; }})()",
            selector.to_js_array()
        );
        match self.eval(&script).await? {
            Value::String(text) => Ok(text),
            _ => Err(AutomationError::ElementNotFound(format!(
                "no text source for {selector}"
            ))),
        }
    }

    async fn collect_links(&self, selector: &Selector) -> Result<Vec<LinkInfo>, AutomationError> {
        let script = format!(
            "({}).map(e => {{ const a = e.closest ? (e.closest('a') || e) : e; \
             return {{ href: e.getAttribute('href') || (a.getAttribute ? a.getAttribute('href') : null), \
             text: (e.textContent || '').trim() }}; }})",
            selector.to_js_array()
        );
        let value = self.eval(&script).await?;
        serde_json::from_value(value)
            .map_err(|e| AutomationError::EngineError(format!("link scan unparseable: {e}")))
    }

    async fn wait_for_idle(&self, timeout: Duration) -> Result<(), AutomationError> {
        // Plain CDP has no networkidle signal; a bounded readyState poll
        // followed by a short quiet period is the working equivalent.
        let deadline = tokio::time::Instant::now() + timeout;
        loop {
            let state = self.eval_string("document.readyState").await?;
            if state == "complete" {
                tokio::time::sleep(IDLE_QUIET_PERIOD).await;
                return Ok(());
            }
            if tokio::time::Instant::now() >= deadline {
                return Err(AutomationError::Timeout(format!(
                    "page never settled within {timeout:?}"
                )));
            }
            tokio::time::sleep(IDLE_POLL_INTERVAL).await;
        }
    }

    async fn close(&self) -> Result<(), AutomationError> {
        if self.closed.swap(true, Ordering::SeqCst) {
            return Ok(());
        }
        // Best effort: ask the browser to shut down cleanly, then make sure.
        let graceful = {
            let guard = self.ws.lock().await;
            if let Some(ws) = guard.as_ref() {
                let frame = json!({ "id": self.next_id.fetch_add(1, Ordering::SeqCst), "method": "Browser.close", "params": {} });
                ws.sender.send(Message::Text(frame.to_string())).is_ok()
            } else {
                false
            }
        };
        if graceful {
            tokio::time::sleep(Duration::from_millis(200)).await;
        }
        self.ws.lock().await.take();
        self.kill_child().await?;
        Ok(())
    }
}
