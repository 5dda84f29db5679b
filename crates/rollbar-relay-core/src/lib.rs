//! # rollbar-relay core
//!
//! Classifies web server lifecycle events into error, warning and message
//! reports and hands them to a reporting client.
//!
//! This crate is not meant to be used directly. Use `rollbar-relay` instead.

mod client;
mod config;
mod context;
mod error;
mod event;
mod level;
mod lifecycle;
pub mod middleware;
mod panic_hook;
mod payload;
mod relay;

// Public API
pub use client::{
    local_client, log_callback, log_result, ClientFactory, ClientOptions, DisabledClient,
    ReportCallback, ReportClient, TracingClient, TransportError, TransportResponse, OCCURRENCE_URL,
};
pub use config::{
    ClientSettings, FilterHook, PreErrorHook, RelayConfig, SanitizeHook, APP_ENV_VAR, ENV_PREFIX,
};
pub use context::{MatchedRoute, RemoteAddr, RequestContext, RequestInfo, RouteInfo};
pub use error::{RelayError, Result};
pub use event::{
    ClassifiedEvent, EventKind, InternalEvent, LogEvent, Tags, TAG_ERROR, TAG_ROLLBAR_ERROR,
    TAG_ROLLBAR_MESSAGE, TAG_STATE,
};
pub use level::Level;
pub use lifecycle::{
    LifecycleEventSource, LogHook, PreResponseHook, RequestErrorHook, RequestInternalHook,
    RollbarPlugin, StopHook,
};
pub use middleware::{CookieEncoding, HttpLifecycle, RelayLayer, RelayService};
pub use panic_hook::PanicHook;
pub use payload::{ErrorOutput, OutputPayload, Payload, ReportedError, ResponseCandidate};
pub use relay::Relay;
