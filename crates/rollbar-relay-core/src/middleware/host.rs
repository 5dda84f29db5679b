use super::layer::RelayLayer;
use super::state::{self, CookieDefinition, CookieEncoding, StateFailure};
use crate::context::RequestInfo;
use crate::event::{InternalEvent, LogEvent};
use crate::lifecycle::{
    LifecycleEventSource, LogHook, PreResponseHook, RequestErrorHook, RequestInternalHook,
    StopHook,
};
use crate::payload::{ReportedError, ResponseCandidate};
use crate::relay::Relay;
use http::HeaderMap;
use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

#[derive(Clone, Default)]
struct Hooks {
    pre_response: Vec<PreResponseHook>,
    request_internal: Vec<RequestInternalHook>,
    request_error: Vec<RequestErrorHook>,
    log: Vec<LogHook>,
    stop: Vec<StopHook>,
}

/// What a [`RelayLayer`] needs at request time.
pub(crate) struct Shared {
    hooks: Hooks,
    cookies: Vec<CookieDefinition>,
}

impl Shared {
    pub(crate) fn validate_state(&self, headers: &HeaderMap) -> Vec<StateFailure> {
        state::validate(&self.cookies, headers)
    }

    pub(crate) fn pre_response(
        &self,
        request: Option<&dyn RequestInfo>,
        response: &ResponseCandidate,
    ) {
        for hook in &self.hooks.pre_response {
            hook(request, response);
        }
    }

    pub(crate) fn request_internal(
        &self,
        request: Option<&dyn RequestInfo>,
        event: &InternalEvent,
    ) {
        for hook in &self.hooks.request_internal {
            hook(request, event);
        }
    }

    pub(crate) fn request_error(&self, request: Option<&dyn RequestInfo>, error: &ReportedError) {
        for hook in &self.hooks.request_error {
            hook(request, error);
        }
    }
}

/// A lifecycle host for tower HTTP services.
///
/// Plugins subscribe through [`LifecycleEventSource`]; [`layer`](Self::layer)
/// then turns the subscriptions into a tower layer. Log events and shutdown
/// are raised directly through [`emit_log`](Self::emit_log) and
/// [`stop`](Self::stop).
///
/// ```ignore
/// let mut lifecycle = HttpLifecycle::new()
///     .declare_cookie("session", CookieEncoding::Base64Json);
/// let relay = RollbarPlugin::new(config).register_local(&mut lifecycle);
///
/// let svc = tower::ServiceBuilder::new()
///     .layer(lifecycle.layer())
///     .service(handler);
/// ```
#[derive(Default)]
pub struct HttpLifecycle {
    hooks: Hooks,
    cookies: Vec<CookieDefinition>,
    exposed: HashMap<&'static str, Arc<Relay>>,
    stopped: AtomicBool,
}

impl HttpLifecycle {
    pub fn new() -> Self {
        Self::default()
    }

    /// Declare a cookie whose value is validated on every request.
    pub fn declare_cookie(mut self, name: impl Into<String>, encoding: CookieEncoding) -> Self {
        self.cookies.push(CookieDefinition {
            name: name.into(),
            encoding,
        });
        self
    }

    /// Build a tower layer from the current subscriptions.
    ///
    /// Hooks subscribed after this call are not seen by the returned layer.
    pub fn layer(&self) -> RelayLayer {
        RelayLayer {
            shared: Arc::new(Shared {
                hooks: self.hooks.clone(),
                cookies: self.cookies.clone(),
            }),
        }
    }

    /// Raise a generic log event
    pub fn emit_log(&self, event: &LogEvent, request: Option<&dyn RequestInfo>) {
        for hook in &self.hooks.log {
            hook(event, request);
        }
    }

    /// Run the stop hooks. Only the first call has an effect.
    pub fn stop(&self) {
        if self.stopped.swap(true, Ordering::AcqRel) {
            return;
        }
        tracing::debug!(hooks = self.hooks.stop.len(), "Stopping lifecycle");
        for hook in &self.hooks.stop {
            hook();
        }
    }

    /// The relay a plugin exposed under `name`
    pub fn exposed(&self, name: &str) -> Option<Arc<Relay>> {
        self.exposed.get(name).cloned()
    }
}

impl LifecycleEventSource for HttpLifecycle {
    fn on_pre_response(&mut self, hook: PreResponseHook) {
        self.hooks.pre_response.push(hook);
    }

    fn on_request_internal(&mut self, hook: RequestInternalHook) {
        self.hooks.request_internal.push(hook);
    }

    fn on_request_error(&mut self, hook: RequestErrorHook) {
        self.hooks.request_error.push(hook);
    }

    fn on_log(&mut self, hook: LogHook) {
        self.hooks.log.push(hook);
    }

    fn on_stop(&mut self, hook: StopHook) {
        self.hooks.stop.push(hook);
    }

    fn expose(&mut self, name: &'static str, relay: Arc<Relay>) {
        if self.exposed.insert(name, relay).is_some() {
            tracing::warn!(name, "Replacing previously exposed relay");
        }
    }
}

impl fmt::Debug for HttpLifecycle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HttpLifecycle")
            .field("cookies", &self.cookies)
            .field("exposed", &self.exposed.keys().collect::<Vec<_>>())
            .field("stopped", &self.stopped.load(Ordering::Relaxed))
            .finish_non_exhaustive()
    }
}
