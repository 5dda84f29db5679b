use rollbar_relay_core::{
    InternalEvent, LifecycleEventSource, LogEvent, LogHook, PreResponseHook, Relay,
    ReportedError, RequestErrorHook, RequestInfo, RequestInternalHook, ResponseCandidate,
    StopHook,
};
use std::collections::HashMap;
use std::sync::Arc;

/// A lifecycle host driven by hand.
///
/// Records every subscription and fires hooks on demand, without any HTTP
/// stack in between.
#[derive(Default)]
pub struct MockLifecycle {
    pre_response: Vec<PreResponseHook>,
    request_internal: Vec<RequestInternalHook>,
    request_error: Vec<RequestErrorHook>,
    log: Vec<LogHook>,
    stop: Vec<StopHook>,
    exposed: HashMap<&'static str, Arc<Relay>>,
}

/// Number of hooks subscribed per lifecycle event.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct HookCounts {
    pub pre_response: usize,
    pub request_internal: usize,
    pub request_error: usize,
    pub log: usize,
    pub stop: usize,
}

impl MockLifecycle {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fire the pre-response hooks
    pub fn pre_response(&self, request: Option<&dyn RequestInfo>, response: &ResponseCandidate) {
        for hook in &self.pre_response {
            hook(request, response);
        }
    }

    /// Fire the request-internal hooks
    pub fn request_internal(&self, request: Option<&dyn RequestInfo>, event: &InternalEvent) {
        for hook in &self.request_internal {
            hook(request, event);
        }
    }

    /// Fire the request-error hooks
    pub fn request_error(&self, request: Option<&dyn RequestInfo>, error: &ReportedError) {
        for hook in &self.request_error {
            hook(request, error);
        }
    }

    /// Fire the log hooks
    pub fn log(&self, event: &LogEvent, request: Option<&dyn RequestInfo>) {
        for hook in &self.log {
            hook(event, request);
        }
    }

    /// Fire the stop hooks
    pub fn stop(&self) {
        for hook in &self.stop {
            hook();
        }
    }

    /// The relay exposed under `name`
    pub fn exposed(&self, name: &str) -> Option<Arc<Relay>> {
        self.exposed.get(name).cloned()
    }

    pub fn hook_counts(&self) -> HookCounts {
        HookCounts {
            pre_response: self.pre_response.len(),
            request_internal: self.request_internal.len(),
            request_error: self.request_error.len(),
            log: self.log.len(),
            stop: self.stop.len(),
        }
    }
}

impl LifecycleEventSource for MockLifecycle {
    fn on_pre_response(&mut self, hook: PreResponseHook) {
        self.pre_response.push(hook);
    }

    fn on_request_internal(&mut self, hook: RequestInternalHook) {
        self.request_internal.push(hook);
    }

    fn on_request_error(&mut self, hook: RequestErrorHook) {
        self.request_error.push(hook);
    }

    fn on_log(&mut self, hook: LogHook) {
        self.log.push(hook);
    }

    fn on_stop(&mut self, hook: StopHook) {
        self.stop.push(hook);
    }

    fn expose(&mut self, name: &'static str, relay: Arc<Relay>) {
        self.exposed.insert(name, relay);
    }
}
