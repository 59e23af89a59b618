//! Request interception and response mutation
//!
//! A `RouteTable` holds an explicit ordered list of rules. Matching scans
//! the list in reverse, so the most recently registered rule wins and the
//! precedence guarantee is a property of the data structure rather than of
//! registration side effects. Exactly one rule resolves an intercepted
//! request; there is no chaining between rules.
//!
//! Every way a handler can fail (fixture serialization, the upstream
//! fetch, an overwrite that finds nothing at its pointer) degrades to
//! `Disposition::Passthrough`. A broken rule must never hang or fail the
//! surrounding scenario; the request simply reaches its real destination.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, warn};

use crate::error::{HarnessError, HarnessResult};
use crate::pattern::RoutePattern;

/// A single targeted mutation of a response body
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldOverwrite {
    /// JSON pointer to the value to replace, e.g. `/articles/0/title`
    pub pointer: String,

    /// Replacement value
    pub value: Value,
}

impl FieldOverwrite {
    pub fn new(pointer: impl Into<String>, value: Value) -> Self {
        Self {
            pointer: pointer.into(),
            value,
        }
    }

    /// Replace the value at the pointer. The location must already exist:
    /// overwrites change field values, they never grow the document, so a
    /// dangling pointer is a handler failure.
    pub fn apply(&self, body: &mut Value) -> HarnessResult<()> {
        match body.pointer_mut(&self.pointer) {
            Some(slot) => {
                *slot = self.value.clone();
                Ok(())
            }
            None => Err(HarnessError::Interception(format!(
                "no value at pointer {}",
                self.pointer
            ))),
        }
    }
}

/// What a matching rule does with the request
#[derive(Debug, Clone)]
pub enum InterceptMode {
    /// Respond immediately with a fixed status and the fixture body; the
    /// upstream origin is never contacted
    Mock { status: u16, body: Value },

    /// Forward the request, await the real response, overwrite the listed
    /// fields and respond with the original status and the mutated body
    Transform { overwrites: Vec<FieldOverwrite> },
}

/// A registered (pattern, mode) pair
#[derive(Debug, Clone)]
pub struct RouteRule {
    pub pattern: RoutePattern,
    pub mode: InterceptMode,
}

/// An outgoing request as seen by the interceptor
#[derive(Debug, Clone)]
pub struct OutgoingRequest {
    pub method: reqwest::Method,
    pub url: String,
    pub headers: reqwest::header::HeaderMap,
    pub body: Option<Vec<u8>>,
}

impl OutgoingRequest {
    pub fn get(url: impl Into<String>) -> Self {
        Self {
            method: reqwest::Method::GET,
            url: url.into(),
            headers: reqwest::header::HeaderMap::new(),
            body: None,
        }
    }
}

/// A response synthesized by an interception rule
#[derive(Debug, Clone, PartialEq)]
pub struct SyntheticResponse {
    pub status: u16,
    /// Serialized JSON body
    pub body: String,
}

/// Outcome of dispatching one request against the table.
///
/// The fallback path is a first-class branch: callers decide what
/// "passthrough" means for their transport (send the request for real,
/// `route.continue()` in a browser context) rather than unwinding.
#[derive(Debug)]
pub enum Disposition {
    /// A rule produced a response; deliver it without contacting upstream
    /// any further
    Fulfill(SyntheticResponse),

    /// No rule matched, or the matching rule failed; let the request
    /// proceed unmodified
    Passthrough,
}

impl Disposition {
    pub fn is_fulfill(&self) -> bool {
        matches!(self, Disposition::Fulfill(_))
    }
}

/// Ordered interception rules for one page or test case
#[derive(Debug, Clone, Default)]
pub struct RouteTable {
    rules: Vec<RouteRule>,
}

impl RouteTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a rule. Later registrations shadow earlier ones for URLs
    /// both match.
    pub fn intercept(&mut self, pattern: &str, mode: InterceptMode) -> HarnessResult<()> {
        let pattern = RoutePattern::new(pattern)?;
        self.rules.push(RouteRule { pattern, mode });
        Ok(())
    }

    /// Rules in registration order, for compilation into a browser script
    pub fn rules(&self) -> &[RouteRule] {
        &self.rules
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// The rule that handles `url`: the last registered match
    pub fn matching(&self, url: &str) -> Option<&RouteRule> {
        self.rules.iter().rev().find(|r| r.pattern.matches(url))
    }

    /// Resolve a request to a disposition. A failing handler is logged and
    /// swallowed; earlier matching rules are not consulted (no chaining),
    /// the request falls through to its real destination instead.
    pub async fn dispatch(
        &self,
        http: &reqwest::Client,
        request: &OutgoingRequest,
    ) -> Disposition {
        let Some(rule) = self.matching(&request.url) else {
            return Disposition::Passthrough;
        };

        match rule.resolve(http, request).await {
            Ok(response) => {
                debug!(
                    "intercepted {} {} via {} -> {}",
                    request.method, request.url, rule.pattern, response.status
                );
                Disposition::Fulfill(response)
            }
            Err(e) => {
                warn!(
                    "interception failed for {} ({}), passing request through: {}",
                    request.url, rule.pattern, e
                );
                Disposition::Passthrough
            }
        }
    }
}

impl RouteRule {
    async fn resolve(
        &self,
        http: &reqwest::Client,
        request: &OutgoingRequest,
    ) -> HarnessResult<SyntheticResponse> {
        match &self.mode {
            InterceptMode::Mock { status, body } => {
                let body = serde_json::to_string(body).map_err(|e| {
                    HarnessError::Interception(format!("fixture serialization failed: {e}"))
                })?;
                Ok(SyntheticResponse {
                    status: *status,
                    body,
                })
            }
            InterceptMode::Transform { overwrites } => {
                let mut upstream = http
                    .request(request.method.clone(), &request.url)
                    .headers(request.headers.clone());
                if let Some(body) = &request.body {
                    upstream = upstream.body(body.clone());
                }
                let response = upstream.send().await.map_err(|e| {
                    HarnessError::Interception(format!("upstream fetch failed: {e}"))
                })?;

                let status = response.status().as_u16();
                let mut body: Value = response.json().await.map_err(|e| {
                    HarnessError::Interception(format!("upstream body is not JSON: {e}"))
                })?;
                for overwrite in overwrites {
                    overwrite.apply(&mut body)?;
                }
                let body = serde_json::to_string(&body).map_err(|e| {
                    HarnessError::Interception(format!("mutated body serialization failed: {e}"))
                })?;

                Ok(SyntheticResponse { status, body })
            }
        }
    }
}
