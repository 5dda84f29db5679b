//! Host lifecycle integration.
//!
//! A host framework exposes its request lifecycle through
//! [`LifecycleEventSource`]: one subscription point per event kind, plus a
//! place to expose the relay to application code. [`RollbarPlugin`] wires a
//! [`Relay`] into any such source.
//!
//! # Example
//!
//! ```ignore
//! use rollbar_relay_core::{HttpLifecycle, RelayConfig, RollbarPlugin};
//!
//! let mut lifecycle = HttpLifecycle::new();
//! let relay = RollbarPlugin::new(RelayConfig::from_env()?).register_local(&mut lifecycle);
//!
//! let service = tower::ServiceBuilder::new()
//!     .layer(lifecycle.layer())
//!     .service(app);
//! ```

use crate::client::{local_client, ClientFactory, ReportClient};
use crate::config::RelayConfig;
use crate::context::RequestInfo;
use crate::event::{InternalEvent, LogEvent};
use crate::panic_hook::PanicHook;
use crate::payload::{ReportedError, ResponseCandidate};
use crate::relay::Relay;
use std::sync::Arc;

/// Hook run before a response is sent
pub type PreResponseHook = Arc<dyn Fn(Option<&dyn RequestInfo>, &ResponseCandidate) + Send + Sync>;

/// Hook run for request-scoped internal diagnostics
pub type RequestInternalHook = Arc<dyn Fn(Option<&dyn RequestInfo>, &InternalEvent) + Send + Sync>;

/// Hook run for unhandled request errors
pub type RequestErrorHook = Arc<dyn Fn(Option<&dyn RequestInfo>, &ReportedError) + Send + Sync>;

/// Hook run for generic log events
pub type LogHook = Arc<dyn Fn(&LogEvent, Option<&dyn RequestInfo>) + Send + Sync>;

/// Hook run when the server stops
pub type StopHook = Arc<dyn Fn() + Send + Sync>;

/// Subscription points a host framework offers to plugins.
pub trait LifecycleEventSource {
    /// Subscribe to responses about to be sent
    fn on_pre_response(&mut self, hook: PreResponseHook);

    /// Subscribe to request-scoped internal diagnostics
    fn on_request_internal(&mut self, hook: RequestInternalHook);

    /// Subscribe to unhandled request errors
    fn on_request_error(&mut self, hook: RequestErrorHook);

    /// Subscribe to generic log events
    fn on_log(&mut self, hook: LogHook);

    /// Subscribe to server shutdown
    fn on_stop(&mut self, hook: StopHook);

    /// Make the relay reachable by application code under `name`
    fn expose(&mut self, name: &'static str, relay: Arc<Relay>);
}

/// Registers a [`Relay`] with a host lifecycle.
#[derive(Debug, Clone)]
pub struct RollbarPlugin {
    config: RelayConfig,
}

impl RollbarPlugin {
    /// Name the relay is exposed under
    pub const NAME: &'static str = "rollbar-relay";

    pub fn new(config: RelayConfig) -> Self {
        Self { config }
    }

    /// Register with `source`, building the client through `factory`.
    ///
    /// The factory is always called, with `enabled` set from the access
    /// token; a disabled relay never calls the client it returns. The panic
    /// hook is only installed for an enabled relay and is removed again when
    /// the source stops.
    pub fn register<S, F>(self, source: &mut S, factory: F) -> Arc<Relay>
    where
        S: LifecycleEventSource + ?Sized,
        F: ClientFactory,
    {
        let options = self.config.client_options();
        let client: Arc<dyn ReportClient> = factory.initialize(&options);

        let mut relay = Relay::new(self.config, client.clone());
        if options.enabled && options.handle_uncaught_exceptions {
            client.install_uncaught_exception_handler(options.exit_on_uncaught_exception);
            relay = relay.with_panic_hook(PanicHook::install(
                client,
                options.exit_on_uncaught_exception,
            ));
        }
        let relay = Arc::new(relay);

        let r = relay.clone();
        let pre_response: PreResponseHook =
            Arc::new(move |request, response| r.on_pre_response(request, response));
        source.on_pre_response(pre_response);

        let r = relay.clone();
        let request_internal: RequestInternalHook =
            Arc::new(move |request, event| r.on_request_internal(request, event));
        source.on_request_internal(request_internal);

        let r = relay.clone();
        let request_error: RequestErrorHook =
            Arc::new(move |request, error| r.on_request_error(request, error));
        source.on_request_error(request_error);

        let r = relay.clone();
        let log: LogHook = Arc::new(move |event, request| r.on_log(event, request));
        source.on_log(log);

        let r = relay.clone();
        let stop: StopHook = Arc::new(move || r.shutdown());
        source.on_stop(stop);

        source.expose(Self::NAME, relay.clone());

        tracing::info!(
            environment = %options.environment,
            enabled = options.enabled,
            handle_uncaught_exceptions = options.handle_uncaught_exceptions,
            "Registered {}",
            Self::NAME
        );

        relay
    }

    /// Register with a local client, see [`local_client`]
    pub fn register_local<S>(self, source: &mut S) -> Arc<Relay>
    where
        S: LifecycleEventSource + ?Sized,
    {
        self.register(source, local_client)
    }
}
