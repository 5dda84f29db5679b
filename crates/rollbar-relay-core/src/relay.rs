//! The classifier: turns lifecycle notifications into client reports.
//!
//! [`Relay`] decides which notifications are reportable, applies the
//! configured `pre_error`, `filter` and `sanitize` hooks, normalizes the
//! request and hands the result to the [`ReportClient`]. It is the capability
//! bundle exposed to application code as well: the `handle_*` and
//! `report_message*` operations report on demand.
//!
//! Nothing here returns an error or blocks on delivery. Reporting is strictly
//! best-effort.

use crate::client::{log_callback, ReportCallback, ReportClient};
use crate::config::RelayConfig;
use crate::context::{RequestContext, RequestInfo};
use crate::event::{InternalEvent, LogEvent};
use crate::level::Level;
use crate::panic_hook::PanicHook;
use crate::payload::{Payload, ReportedError, ResponseCandidate};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Error event classifier and formatter.
pub struct Relay {
    config: Arc<RelayConfig>,
    client: Arc<dyn ReportClient>,
    enabled: bool,
    panic_hook: Option<PanicHook>,
    stopped: AtomicBool,
}

impl Relay {
    /// Create a relay reporting through `client`.
    ///
    /// Whether anything is reported is decided here, once, from the access
    /// token.
    pub fn new(config: RelayConfig, client: Arc<dyn ReportClient>) -> Self {
        let enabled = config.is_enabled();
        if !enabled {
            tracing::debug!("No access token configured, error reporting disabled");
        }

        Self {
            config: Arc::new(config),
            client,
            enabled,
            panic_hook: None,
            stopped: AtomicBool::new(false),
        }
    }

    pub(crate) fn with_panic_hook(mut self, hook: PanicHook) -> Self {
        self.panic_hook = Some(hook);
        self
    }

    /// The reporting client
    pub fn client(&self) -> &Arc<dyn ReportClient> {
        &self.client
    }

    /// The configuration
    pub fn config(&self) -> &RelayConfig {
        &self.config
    }

    /// Whether reporting is enabled
    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Whether a panic hook is installed and active
    pub fn handles_panics(&self) -> bool {
        self.panic_hook.as_ref().map(PanicHook::is_active).unwrap_or(false)
    }

    fn active(&self) -> bool {
        self.enabled && !self.stopped.load(Ordering::Acquire)
    }

    /// Filter, sanitize and send one error. Returns whether it was sent.
    fn dispatch_error(
        &self,
        err: &ReportedError,
        context: Option<RequestContext>,
        extra: Option<serde_json::Value>,
        callback: ReportCallback,
    ) -> bool {
        if !self.config.should_report(err) {
            tracing::debug!(error = %err, "Error filtered out, not reporting");
            return false;
        }

        let payload = self.config.sanitize_error(err);
        self.client.report_error(payload, context, extra, callback);
        true
    }

    /// Pre-response hook.
    ///
    /// Applies `pre_error`, then reports the response as an error if it
    /// carries the boom marker, along with its output.
    pub fn on_pre_response(&self, request: Option<&dyn RequestInfo>, response: &ResponseCandidate) {
        if !self.active() {
            return;
        }

        let candidate = self.config.apply_pre_error(response.clone());
        let Some(err) = candidate.boom() else {
            return;
        };

        let output = err
            .output
            .as_ref()
            .and_then(|o| serde_json::to_value(o).ok());
        let context = RequestContext::from_request(request);
        self.dispatch_error(err, context, output, log_callback());
    }

    /// Request-internal diagnostic hook.
    ///
    /// Only request state failures (tagged both `error` and `state`) are
    /// reported, as warnings.
    pub fn on_request_internal(&self, request: Option<&dyn RequestInfo>, event: &InternalEvent) {
        if !self.active() || !event.is_state_error() {
            return;
        }

        let payload = if self.config.structured_internal_events {
            serde_json::to_value(event).map(Payload::Json)
        } else {
            serde_json::to_string(event).map(Payload::Text)
        };
        let payload = match payload {
            Ok(payload) => payload,
            Err(e) => {
                tracing::warn!(error = %e, "Failed to serialize internal event");
                return;
            }
        };

        let context = RequestContext::from_request(request);
        self.client.report_warning(payload, context, log_callback());
    }

    /// Unhandled request error hook
    pub fn on_request_error(&self, request: Option<&dyn RequestInfo>, error: &ReportedError) {
        if !self.active() {
            return;
        }

        let context = RequestContext::from_request(request);
        self.dispatch_error(error, context, None, log_callback());
    }

    /// Generic log hook.
    ///
    /// Events tagged with the error tag report their error; otherwise events
    /// tagged with the message tag report their message.
    pub fn on_log(&self, event: &LogEvent, request: Option<&dyn RequestInfo>) {
        if !self.active() {
            return;
        }

        if event.tags.has(&self.config.error_tag) {
            match event.error {
                Some(ref err) => {
                    let context = RequestContext::from_request(request);
                    self.dispatch_error(err, context, event.data.clone(), log_callback());
                }
                None => tracing::debug!("Error log event without an error, ignoring"),
            }
        } else if event.tags.has(&self.config.message_tag) {
            match event.message {
                Some(ref message) => {
                    let context = RequestContext::from_request(request);
                    self.client.report_message(
                        message.clone(),
                        event.level.unwrap_or(Level::DEFAULT_MESSAGE),
                        context,
                        event.data.clone(),
                        log_callback(),
                    );
                }
                None => tracing::debug!("Message log event without a message, ignoring"),
            }
        }
    }

    /// Report an error on demand. `done` runs once the report is dispatched.
    pub fn handle_error(
        &self,
        err: &ReportedError,
        request: Option<&dyn RequestInfo>,
        done: impl FnOnce(),
    ) {
        self.error_with_data(err, None, request);
        done();
    }

    /// Report an error with extra payload data. `done` runs once the report
    /// is dispatched.
    pub fn handle_error_with_payload_data(
        &self,
        err: &ReportedError,
        opts: serde_json::Value,
        request: Option<&dyn RequestInfo>,
        done: impl FnOnce(),
    ) {
        self.error_with_data(err, Some(opts), request);
        done();
    }

    /// Report a message on demand. `done` runs once the report is dispatched.
    pub fn report_message(
        &self,
        message: impl Into<String>,
        level: Level,
        request: Option<&dyn RequestInfo>,
        done: impl FnOnce(),
    ) {
        self.message_with_data(message.into(), level, None, request);
        done();
    }

    /// Report a message with extra payload data. `done` runs once the report
    /// is dispatched.
    pub fn report_message_with_payload_data(
        &self,
        message: impl Into<String>,
        opts: serde_json::Value,
        request: Option<&dyn RequestInfo>,
        done: impl FnOnce(),
    ) {
        let level = opts
            .get("level")
            .and_then(|l| l.as_str())
            .and_then(|l| l.parse().ok())
            .unwrap_or(Level::DEFAULT_MESSAGE);
        self.message_with_data(message.into(), level, Some(opts), request);
        done();
    }

    fn error_with_data(
        &self,
        err: &ReportedError,
        opts: Option<serde_json::Value>,
        request: Option<&dyn RequestInfo>,
    ) {
        if !self.active() {
            return;
        }
        let context = RequestContext::from_request(request);
        self.dispatch_error(err, context, opts, log_callback());
    }

    fn message_with_data(
        &self,
        message: String,
        level: Level,
        opts: Option<serde_json::Value>,
        request: Option<&dyn RequestInfo>,
    ) {
        if !self.active() {
            return;
        }
        let context = RequestContext::from_request(request);
        self.client
            .report_message(message, level, context, opts, log_callback());
    }

    /// Stop reporting, remove the panic hook and flush the client.
    ///
    /// Idempotent.
    pub fn shutdown(&self) {
        if self.stopped.swap(true, Ordering::AcqRel) {
            return;
        }

        if let Some(ref hook) = self.panic_hook {
            hook.uninstall();
        }
        self.client.shutdown();
        tracing::debug!("Relay shut down");
    }
}

impl std::fmt::Debug for Relay {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Relay")
            .field("config", &self.config)
            .field("enabled", &self.enabled)
            .field("stopped", &self.stopped.load(Ordering::Acquire))
            .finish()
    }
}
