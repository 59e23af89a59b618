//! Playwright page driving
//!
//! Steps are compiled into a single script, executed with `node`, and the
//! process output is parsed back. Interception rules registered on the
//! handle are emitted into the script preamble as `page.route` handlers
//! with the same semantics as native dispatch: Playwright consults the
//! most recently registered handler first, and every handler failure ends
//! in `route.continue()`.

use std::collections::HashMap;
use std::path::PathBuf;
use std::process::{Command, Stdio};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tokio::process::Command as TokioCommand;
use tracing::{debug, warn};

use crate::config::HarnessConfig;
use crate::error::{HarnessError, HarnessResult};
use crate::pattern::RoutePattern;
use crate::route::{FieldOverwrite, InterceptMode, RouteTable};

const CAPTURE_PREFIX: &str = "@@capture ";
const STEP_PREFIX: &str = "@@step ";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Browser {
    #[default]
    Chromium,
    Firefox,
    Webkit,
}

impl Browser {
    fn as_str(&self) -> &'static str {
        match self {
            Browser::Chromium => "chromium",
            Browser::Firefox => "firefox",
            Browser::Webkit => "webkit",
        }
    }
}

/// One browser interaction
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum PageStep {
    /// Open `base_url` + `path`
    Navigate { path: String },

    /// Click the element carrying the given text
    ClickText {
        text: String,
        #[serde(default)]
        nth: Option<usize>,
    },

    /// Click an element located by ARIA role and accessible name
    ClickRole {
        role: String,
        name: String,
        #[serde(default)]
        nth: Option<usize>,
    },

    /// Fill an input located by ARIA role and accessible name
    FillRole {
        role: String,
        name: String,
        value: String,
    },

    /// Send a key press to the focused element
    Press { key: String },

    /// Wait until the nth element matching `selector` contains `contains`
    ExpectText {
        selector: String,
        contains: String,
        #[serde(default)]
        nth: usize,
    },

    /// Wait until the nth element no longer contains `contains` (or is gone)
    ExpectNoText {
        selector: String,
        contains: String,
        #[serde(default)]
        nth: usize,
    },

    /// Block until a response matching `pattern` arrives; optionally record
    /// its status and body under `capture` for the caller
    WaitResponse {
        pattern: String,
        #[serde(default = "default_response_timeout")]
        timeout_ms: u64,
        #[serde(default)]
        capture: Option<String>,
    },

    Sleep { ms: u64 },

    Screenshot { name: String },
}

fn default_response_timeout() -> u64 {
    5000
}

/// A response body recorded by a `wait_response` step
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CapturedResponse {
    pub status: u16,
    pub body: String,
}

impl CapturedResponse {
    pub fn json(&self) -> HarnessResult<Value> {
        Ok(serde_json::from_str(&self.body)?)
    }
}

/// One completed step, as reported by the running script
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StepReport {
    pub name: String,
    pub duration_ms: u64,
}

/// Outcome of a successful script run
#[derive(Debug, Clone, Default)]
pub struct PageRun {
    pub duration_ms: u64,

    /// Steps that ran to completion, in execution order
    pub steps: Vec<StepReport>,

    /// Captured responses keyed by capture name
    pub captures: HashMap<String, CapturedResponse>,
}

#[derive(Deserialize)]
struct CaptureLine {
    name: String,
    status: u16,
    body: String,
}

#[derive(Deserialize)]
struct StepLine {
    name: String,
    ms: u64,
}

#[derive(Deserialize)]
struct ScriptFailure {
    error: Option<String>,
    step: Option<String>,
}

/// Configuration for a driven page
#[derive(Debug, Clone)]
pub struct PageConfig {
    pub base_url: String,
    pub screenshot_dir: PathBuf,
    pub viewport_width: u32,
    pub viewport_height: u32,
    pub browser: Browser,
    pub headless: bool,
    pub script_timeout: Duration,
    pub log_network: bool,
}

impl Default for PageConfig {
    fn default() -> Self {
        Self {
            base_url: "https://conduit.bondaracademy.com".to_string(),
            screenshot_dir: PathBuf::from("test-results/screenshots"),
            viewport_width: 1280,
            viewport_height: 720,
            browser: Browser::Chromium,
            headless: true,
            script_timeout: Duration::from_secs(90),
            log_network: false,
        }
    }
}

impl PageConfig {
    pub fn from_config(config: &HarnessConfig) -> Self {
        Self {
            base_url: config.app_origin(),
            script_timeout: config.script_timeout(),
            log_network: config.log_network,
            ..Self::default()
        }
    }
}

/// A page plus everything that has to be in place before it loads:
/// interception rules, a storage state to seed the context with, and
/// where to save the state afterwards.
pub struct PageHandle {
    config: PageConfig,
    routes: RouteTable,
    storage_in: Option<PathBuf>,
    storage_out: Option<PathBuf>,
}

impl PageHandle {
    pub fn new(mut config: PageConfig) -> Self {
        // The script runs from a scratch directory; caller-relative paths
        // must be pinned before they are embedded in it.
        config.screenshot_dir = absolutize(config.screenshot_dir);
        Self {
            config,
            routes: RouteTable::new(),
            storage_in: None,
            storage_out: None,
        }
    }

    /// Register interception rules for every page this handle opens.
    pub fn with_routes(mut self, routes: RouteTable) -> Self {
        self.routes = routes;
        self
    }

    /// Seed the browser context from a saved storage-state snapshot.
    pub fn load_storage_state(mut self, path: impl Into<PathBuf>) -> Self {
        self.storage_in = Some(absolutize(path.into()));
        self
    }

    /// Save the context's storage state to `path` after the steps finish.
    pub fn save_storage_state(mut self, path: impl Into<PathBuf>) -> Self {
        self.storage_out = Some(absolutize(path.into()));
        self
    }

    /// Check that the Playwright npm package is available.
    pub fn check_runner_installed() -> HarnessResult<()> {
        let status = Command::new("npx")
            .args(["playwright", "--version"])
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status();

        match status {
            Ok(status) if status.success() => Ok(()),
            _ => Err(HarnessError::RunnerNotFound),
        }
    }

    /// Compile the steps into a complete Playwright script.
    pub fn build_script(&self, steps: &[PageStep]) -> String {
        let mut script = String::new();

        let storage_state = match &self.storage_in {
            Some(path) => format!(
                ",\n    storageState: {}",
                js_str(&path.to_string_lossy())
            ),
            None => String::new(),
        };

        script.push_str(&format!(
            r#"const {{ chromium, firefox, webkit }} = require('playwright');

(async () => {{
  const browser = await {browser}.launch({{ headless: {headless} }});
  const context = await browser.newContext({{
    viewport: {{ width: {width}, height: {height} }}{storage_state}
  }});
  const page = await context.newPage();
  const baseUrl = {base_url};
"#,
            browser = self.config.browser.as_str(),
            headless = self.config.headless,
            width = self.config.viewport_width,
            height = self.config.viewport_height,
            base_url = js_str(&self.config.base_url),
        ));

        if self.config.log_network {
            script.push_str(
                r#"
  page.on('request', (request) => console.log(`>> ${request.method()} ${request.url()}`));
  page.on('response', (response) => console.log(`<< ${response.status()} ${response.url()}`));
"#,
            );
        }

        for (i, rule) in self.routes.rules().iter().enumerate() {
            script.push_str(&self.route_to_js(i, &rule.pattern, &rule.mode));
        }

        script.push_str("\n  let currentStep = null;\n  let stepStarted = Date.now();\n  try {\n");

        for (i, step) in steps.iter().enumerate() {
            let name = step_name(step);
            script.push_str(&format!("\n    // Step {}: {}\n", i + 1, name));
            script.push_str(&format!(
                "    currentStep = {};\n    stepStarted = Date.now();\n",
                js_str(&name)
            ));
            script.push_str(&self.step_to_js(step, i));
            script.push('\n');
            script.push_str(&format!(
                "    console.log('{STEP_PREFIX}' + JSON.stringify({{ name: currentStep, ms: Date.now() - stepStarted }}));\n"
            ));
        }

        if let Some(path) = &self.storage_out {
            script.push_str(&format!(
                "\n    await context.storageState({{ path: {} }});\n",
                js_str(&path.to_string_lossy())
            ));
        }

        script.push_str(
            r#"
    console.log(JSON.stringify({ success: true }));
  } catch (error) {
    console.error(JSON.stringify({ success: false, error: error.message, step: currentStep, stack: error.stack }));
    process.exit(1);
  } finally {
    await browser.close();
  }
})();
"#,
        );

        script
    }

    /// Emit one `page.route` registration. Registration order is preserved
    /// so the browser applies the same last-registered-wins precedence as
    /// `RouteTable::matching`.
    fn route_to_js(&self, index: usize, pattern: &RoutePattern, mode: &InterceptMode) -> String {
        let body = match mode {
            InterceptMode::Mock { status, body } => {
                let literal = match serde_json::to_string(body) {
                    Ok(literal) => literal,
                    Err(e) => {
                        // An unregistrable mock degrades to passthrough,
                        // same as a handler that fails at run time.
                        warn!("skipping mock for {}: {}", pattern, e);
                        return String::new();
                    }
                };
                format!(
                    r#"      await route.fulfill({{ status: {status}, body: JSON.stringify({literal}) }});"#
                )
            }
            InterceptMode::Transform { overwrites } => {
                let mut lines = vec![
                    "      const response = await route.fetch();".to_string(),
                    "      let body = await response.json();".to_string(),
                ];
                for (j, overwrite) in overwrites.iter().enumerate() {
                    lines.push(overwrite_to_js(index, j, overwrite));
                }
                lines.push(
                    "      await route.fulfill({ status: response.status(), body: JSON.stringify(body) });"
                        .to_string(),
                );
                lines.join("\n")
            }
        };

        format!(
            r#"
  await page.route({pattern}, async (route) => {{
    try {{
{body}
    }} catch (error) {{
      console.error('route handler failed: ' + error.message);
      await route.continue();
    }}
  }});
"#,
            pattern = js_str(pattern.as_str()),
        )
    }

    fn step_to_js(&self, step: &PageStep, index: usize) -> String {
        match step {
            PageStep::Navigate { path } => {
                format!("    await page.goto(baseUrl + {});", js_str(path))
            }
            PageStep::ClickText { text, nth } => {
                format!(
                    "    await page.getByText({}){}.click();",
                    js_str(text),
                    nth_suffix(*nth)
                )
            }
            PageStep::ClickRole { role, name, nth } => {
                format!(
                    "    await page.getByRole({}, {{ name: {} }}){}.click();",
                    js_str(role),
                    js_str(name),
                    nth_suffix(*nth)
                )
            }
            PageStep::FillRole { role, name, value } => {
                format!(
                    "    await page.getByRole({}, {{ name: {} }}).fill({});",
                    js_str(role),
                    js_str(name),
                    js_str(value)
                )
            }
            PageStep::Press { key } => {
                format!("    await page.keyboard.press({});", js_str(key))
            }
            PageStep::ExpectText {
                selector,
                contains,
                nth,
            } => expect_text_js(selector, contains, *nth, true),
            PageStep::ExpectNoText {
                selector,
                contains,
                nth,
            } => expect_text_js(selector, contains, *nth, false),
            PageStep::WaitResponse {
                pattern,
                timeout_ms,
                capture,
            } => {
                let mut js = format!(
                    "    const response_{index} = await page.waitForResponse({}, {{ timeout: {timeout_ms} }});",
                    js_str(pattern)
                );
                if let Some(name) = capture {
                    js.push_str(&format!(
                        "\n    console.log('{CAPTURE_PREFIX}' + JSON.stringify({{ name: {}, status: response_{index}.status(), body: await response_{index}.text() }}));",
                        js_str(name)
                    ));
                }
                js
            }
            PageStep::Sleep { ms } => format!("    await page.waitForTimeout({ms});"),
            PageStep::Screenshot { name } => {
                let path = self.config.screenshot_dir.join(format!("{name}.png"));
                format!(
                    "    await page.screenshot({{ path: {}, fullPage: false }});",
                    js_str(&path.to_string_lossy())
                )
            }
        }
    }

    /// Run the steps in one browser context and parse the output.
    pub async fn run(&self, steps: &[PageStep]) -> HarnessResult<PageRun> {
        Self::check_runner_installed()?;
        std::fs::create_dir_all(&self.config.screenshot_dir)?;

        let script = self.build_script(steps);
        let temp_dir = tempfile::tempdir()?;
        let script_path = temp_dir.path().join("page.js");
        std::fs::write(&script_path, &script)?;

        debug!("running page script {}", script_path.display());
        let start = std::time::Instant::now();

        let output = TokioCommand::new("node")
            .arg(&script_path)
            .current_dir(temp_dir.path())
            .env("NODE_PATH", node_path())
            .kill_on_drop(true)
            .output();
        let output = match tokio::time::timeout(self.config.script_timeout, output).await {
            Ok(output) => output?,
            Err(_) => {
                return Err(HarnessError::Timeout(format!(
                    "browser script exceeded {} ms",
                    self.config.script_timeout.as_millis()
                )));
            }
        };

        let stdout = String::from_utf8_lossy(&output.stdout);
        let stderr = String::from_utf8_lossy(&output.stderr);

        if !output.status.success() {
            return Err(classify_failure(&stdout, &stderr));
        }

        let mut captures = HashMap::new();
        let mut step_reports = Vec::new();
        for line in stdout.lines() {
            if line.starts_with(">>") || line.starts_with("<<") {
                debug!("{}", line);
                continue;
            }
            if let Some(payload) = line.strip_prefix(STEP_PREFIX) {
                match serde_json::from_str::<StepLine>(payload) {
                    Ok(step) => step_reports.push(StepReport {
                        name: step.name,
                        duration_ms: step.ms,
                    }),
                    Err(e) => warn!("discarding malformed step line: {}", e),
                }
                continue;
            }
            let Some(payload) = line.strip_prefix(CAPTURE_PREFIX) else {
                continue;
            };
            match serde_json::from_str::<CaptureLine>(payload) {
                Ok(capture) => {
                    captures.insert(
                        capture.name,
                        CapturedResponse {
                            status: capture.status,
                            body: capture.body,
                        },
                    );
                }
                Err(e) => warn!("discarding malformed capture line: {}", e),
            }
        }

        Ok(PageRun {
            duration_ms: start.elapsed().as_millis() as u64,
            steps: step_reports,
            captures,
        })
    }
}

/// Map a failed script to the error the failure actually represents. The
/// script reports assertions and Playwright reports wait timeouts through
/// the same channel, a JSON line on stderr. When the report names the
/// step that was executing, the label is folded into the message.
fn classify_failure(stdout: &str, stderr: &str) -> HarnessError {
    let reported = stderr
        .lines()
        .filter_map(|line| serde_json::from_str::<ScriptFailure>(line.trim()).ok())
        .filter_map(|failure| {
            let ScriptFailure { error, step } = failure;
            error.map(|message| (message, step))
        })
        .next_back();

    match reported {
        Some((message, step)) => {
            let message = match step {
                Some(step) => format!("{message} (step {step})"),
                None => message,
            };
            if message.starts_with("assertion failed") {
                HarnessError::AssertionFailed(message)
            } else if message.contains("Timeout") {
                HarnessError::Timeout(message)
            } else {
                HarnessError::Browser(message)
            }
        }
        None => HarnessError::Browser(format!(
            "script failed without a report\nstdout: {stdout}\nstderr: {stderr}"
        )),
    }
}

fn step_name(step: &PageStep) -> String {
    match step {
        PageStep::Navigate { path } => format!("navigate:{path}"),
        PageStep::ClickText { text, .. } => format!("click_text:{text}"),
        PageStep::ClickRole { role, name, .. } => format!("click_role:{role}:{name}"),
        PageStep::FillRole { role, name, .. } => format!("fill_role:{role}:{name}"),
        PageStep::Press { key } => format!("press:{key}"),
        PageStep::ExpectText { selector, .. } => format!("expect_text:{selector}"),
        PageStep::ExpectNoText { selector, .. } => format!("expect_no_text:{selector}"),
        PageStep::WaitResponse { pattern, .. } => format!("wait_response:{pattern}"),
        PageStep::Sleep { ms } => format!("sleep:{ms}ms"),
        PageStep::Screenshot { name } => format!("screenshot:{name}"),
    }
}

/// Embed a Rust string as a JS string literal. JSON string encoding is
/// valid JS source, so this is injection-safe for quotes and newlines.
fn js_str(value: &str) -> String {
    // serializing a plain string cannot fail
    serde_json::to_string(value).unwrap_or_else(|_| "null".to_string())
}

fn nth_suffix(nth: Option<usize>) -> String {
    match nth {
        Some(n) => format!(".nth({n})"),
        None => String::new(),
    }
}

fn absolutize(path: PathBuf) -> PathBuf {
    if path.is_absolute() {
        return path;
    }
    match std::env::current_dir() {
        Ok(cwd) => cwd.join(path),
        Err(_) => path,
    }
}

/// A local `npm install playwright` lives in the caller's node_modules;
/// the script itself runs from a scratch directory, so node needs the
/// explicit search path.
fn node_path() -> std::ffi::OsString {
    let local = std::env::current_dir()
        .map(|cwd| cwd.join("node_modules"))
        .unwrap_or_else(|_| PathBuf::from("node_modules"));
    match std::env::var_os("NODE_PATH") {
        Some(existing) if !existing.is_empty() => {
            let mut combined = local.into_os_string();
            combined.push(":");
            combined.push(existing);
            combined
        }
        _ => local.into_os_string(),
    }
}

/// Text assertions poll the DOM rather than sampling it once, so a page
/// that renders after a mocked response settles still passes. A wait that
/// never settles is rethrown as an assertion failure with the expectation
/// in the message.
fn expect_text_js(selector: &str, contains: &str, nth: usize, should_contain: bool) -> String {
    let check = if should_contain {
        "el && el.textContent.includes(arg.needle)"
    } else {
        "!el || !el.textContent.includes(arg.needle)"
    };
    let polarity = if should_contain { "contain" } else { "not contain" };
    let arg = json!({ "sel": selector, "nth": nth, "needle": contains });
    format!(
        r#"    try {{
      await page.waitForFunction((arg) => {{
        const el = document.querySelectorAll(arg.sel)[arg.nth];
        return {check};
      }}, {arg}, {{ timeout: 5000 }});
    }} catch (e) {{
      throw new Error('assertion failed: expected ' + {sel} + ' to {polarity} ' + {needle});
    }}"#,
        sel = js_str(selector),
        needle = js_str(contains),
    )
}

fn overwrite_to_js(rule_index: usize, overwrite_index: usize, overwrite: &FieldOverwrite) -> String {
    let value = match serde_json::to_string(&overwrite.value) {
        Ok(value) => value,
        Err(_) => "null".to_string(),
    };

    // A non-empty pointer without a leading slash resolves to nothing
    // under native dispatch; the browser handler must fail the same way
    // instead of guessing at a path.
    if !overwrite.pointer.is_empty() && !overwrite.pointer.starts_with('/') {
        return format!(
            "      throw new Error('no value at pointer ' + {});",
            js_str(&overwrite.pointer)
        );
    }

    let segments = pointer_segments(&overwrite.pointer);
    let (last, parents) = match segments.split_last() {
        Some(split) => split,
        // an empty pointer addresses the whole document
        None => return format!("      body = {value};"),
    };

    let target = format!("target_{rule_index}_{overwrite_index}");
    let mut path = "body".to_string();
    for parent in parents {
        path.push_str(&format!("[{}]", js_str(parent)));
    }

    // The final segment must already exist; plain assignment would grow
    // the document instead of failing like native dispatch does.
    format!(
        r#"      const {target} = {path};
      if (!({seg} in {target})) throw new Error('no value at pointer ' + {pointer});
      {target}[{seg}] = {value};"#,
        seg = js_str(last),
        pointer = js_str(&overwrite.pointer),
    )
}

/// Split a JSON pointer into unescaped segments. `""` addresses the root.
fn pointer_segments(pointer: &str) -> Vec<String> {
    if pointer.is_empty() {
        return Vec::new();
    }
    pointer
        .split('/')
        .skip(1)
        .map(|segment| segment.replace("~1", "/").replace("~0", "~"))
        .collect()
}
