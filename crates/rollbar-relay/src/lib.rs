//! # rollbar-relay
//!
//! Relays the lifecycle of a web server to a Rollbar reporting client:
//! unhandled handler errors, error responses carrying the boom marker,
//! request state parsing failures, explicitly tagged log events and
//! panics.
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use rollbar_relay::prelude::*;
//!
//! rollbar_relay::init_tracing();
//!
//! let mut lifecycle = HttpLifecycle::new()
//!     .declare_cookie("session", CookieEncoding::Base64Json);
//! let relay = RollbarPlugin::new(RelayConfig::from_env()?)
//!     .register_local(&mut lifecycle);
//!
//! let service = tower::ServiceBuilder::new()
//!     .layer(lifecycle.layer())
//!     .service(app);
//!
//! // Report from application code
//! relay.report_message("cache warmed", Level::Info, None, || {});
//! ```
//!
//! ## Configuration
//!
//! [`RelayConfig::from_env`] loads a `.env` file if present and reads
//! `ROLLBAR_*` variables:
//!
//! - `ROLLBAR_ACCESS_TOKEN` - reporting is disabled without it
//! - `ROLLBAR_ENVIRONMENT` - falls back to `APP_ENV`, then `development`
//! - `ROLLBAR_HANDLE_UNCAUGHT_EXCEPTIONS` - install the panic hook
//! - `ROLLBAR_EXIT_ON_UNCAUGHT_EXCEPTION` - also exit after a panic
//!
//! ## Optional Features
//!
//! - `testing` - re-exports `rollbar-relay-testing` as [`testing`]

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

// Re-export core functionality
pub use rollbar_relay_core::*;

#[cfg(feature = "testing")]
pub use rollbar_relay_testing as testing;

/// Install a `fmt` subscriber filtered by `RUST_LOG`.
///
/// Falls back to `info,rollbar_relay=debug`. Does nothing if a global
/// subscriber is already set.
pub fn init_tracing() {
    let _ = tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,rollbar_relay=debug")),
        )
        .with(tracing_subscriber::fmt::layer())
        .try_init();
}

/// Prelude module - import everything you need with `use rollbar_relay::prelude::*`
pub mod prelude {
    pub use rollbar_relay_core::{
        // Client
        local_client,
        log_callback,
        ClientFactory,
        ClientOptions,
        DisabledClient,
        ReportCallback,
        ReportClient,
        TracingClient,
        TransportError,
        TransportResponse,
        // Configuration
        ClientSettings,
        RelayConfig,
        // Events and payloads
        ClassifiedEvent,
        EventKind,
        InternalEvent,
        Level,
        LogEvent,
        Payload,
        ReportedError,
        ResponseCandidate,
        Tags,
        TAG_ERROR,
        TAG_ROLLBAR_ERROR,
        TAG_ROLLBAR_MESSAGE,
        TAG_STATE,
        // Request context
        MatchedRoute,
        RemoteAddr,
        RequestContext,
        RequestInfo,
        // Lifecycle
        CookieEncoding,
        HttpLifecycle,
        LifecycleEventSource,
        RelayLayer,
        Relay,
        RollbarPlugin,
        // Errors
        RelayError,
        Result,
    };

    pub use serde_json::json;
    pub use tracing::{debug, error, info, trace, warn};
}
