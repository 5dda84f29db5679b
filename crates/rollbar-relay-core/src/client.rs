//! The reporting client capability.
//!
//! The relay never talks to the network itself. It hands classified events to
//! a [`ReportClient`] together with a [`ReportCallback`], and the client owns
//! delivery. Swap in any implementation, including a recording double in
//! tests.

use crate::context::RequestContext;
use crate::event::ClassifiedEvent;
use crate::level::Level;
use crate::payload::Payload;
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::Arc;

/// Base URL of occurrence links logged after a successful delivery.
pub const OCCURRENCE_URL: &str = "https://rollbar.com/occurrence/uuid/?uuid=";

/// Error returned by a client when delivery fails.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TransportError {
    /// Network-level failure.
    #[error("Network error: {0}")]
    Network(String),

    /// The access token was rejected.
    #[error("Access token rejected")]
    Unauthorized,

    /// The project is over its rate limit.
    #[error("Rate limited")]
    RateLimited,

    /// The service answered with an error.
    #[error("Rejected with status {status}: {message}")]
    Rejected { status: u16, message: String },

    /// The client has been shut down.
    #[error("Client is shut down")]
    Closed,
}

/// Successful delivery acknowledgement.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct TransportResponse {
    /// Occurrence identifier assigned by the service
    pub uuid: Option<String>,
}

impl TransportResponse {
    pub fn with_uuid(uuid: impl Into<String>) -> Self {
        Self {
            uuid: Some(uuid.into()),
        }
    }
}

/// Completion callback for a single report.
///
/// Receives the transport result and the request payload that was sent, if
/// the client got as far as building one.
pub type ReportCallback = Box<
    dyn FnOnce(Result<TransportResponse, TransportError>, Option<serde_json::Value>)
        + Send
        + 'static,
>;

/// An error-reporting client.
pub trait ReportClient: Send + Sync + 'static {
    /// Deliver a classified event.
    ///
    /// Must not block on delivery. The callback is invoked once, whenever the
    /// outcome is known.
    fn report(&self, event: ClassifiedEvent, callback: ReportCallback);

    /// Whether this client delivers anything at all
    fn is_enabled(&self) -> bool;

    /// Report an error
    fn report_error(
        &self,
        payload: Payload,
        context: Option<RequestContext>,
        extra: Option<serde_json::Value>,
        callback: ReportCallback,
    ) {
        self.report(ClassifiedEvent::error(payload, context).with_extra(extra), callback);
    }

    /// Report a warning
    fn report_warning(
        &self,
        message: Payload,
        context: Option<RequestContext>,
        callback: ReportCallback,
    ) {
        self.report(ClassifiedEvent::warning(message, context), callback);
    }

    /// Report a message at the given level
    fn report_message(
        &self,
        message: String,
        level: Level,
        context: Option<RequestContext>,
        extra: Option<serde_json::Value>,
        callback: ReportCallback,
    ) {
        self.report(
            ClassifiedEvent::message(message, level, context).with_extra(extra),
            callback,
        );
    }

    /// Hook into process-wide crash reporting.
    ///
    /// The relay installs its own panic hook; clients with a native mechanism
    /// may override this.
    fn install_uncaught_exception_handler(&self, _exit_on_uncaught: bool) {}

    /// Flush pending reports and stop accepting new ones
    fn shutdown(&self) {}
}

/// Options a client is initialized with.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ClientOptions {
    pub access_token: Option<String>,
    pub environment: String,
    pub enabled: bool,
    pub handle_uncaught_exceptions: bool,
    pub exit_on_uncaught_exception: bool,
    /// Options the relay does not interpret, passed through unchanged
    #[serde(flatten)]
    pub extra: BTreeMap<String, serde_json::Value>,
}

/// Builds the client when the relay is registered.
pub trait ClientFactory {
    fn initialize(self, options: &ClientOptions) -> Arc<dyn ReportClient>;
}

impl<F> ClientFactory for F
where
    F: FnOnce(&ClientOptions) -> Arc<dyn ReportClient>,
{
    fn initialize(self, options: &ClientOptions) -> Arc<dyn ReportClient> {
        self(options)
    }
}

/// Client used when no access token is configured. Reports nothing.
#[derive(Debug, Clone, Copy, Default)]
pub struct DisabledClient;

impl ReportClient for DisabledClient {
    fn report(&self, event: ClassifiedEvent, _callback: ReportCallback) {
        tracing::trace!(kind = ?event.kind, "Reporting disabled, dropping event");
    }

    fn is_enabled(&self) -> bool {
        false
    }
}

/// Client that writes every report to the local `tracing` subscriber.
///
/// Each report is acknowledged with a fresh uuid, so the occurrence-link
/// logging path is exercised without a remote service.
#[derive(Debug, Clone, Default)]
pub struct TracingClient {
    environment: String,
}

impl TracingClient {
    pub fn new(options: &ClientOptions) -> Self {
        Self {
            environment: options.environment.clone(),
        }
    }
}

impl ReportClient for TracingClient {
    fn report(&self, event: ClassifiedEvent, callback: ReportCallback) {
        let sent = match serde_json::to_value(&event) {
            Ok(value) => value,
            Err(e) => {
                callback(Err(TransportError::Network(e.to_string())), None);
                return;
            }
        };

        tracing::info!(
            environment = %self.environment,
            kind = ?event.kind,
            level = %event.level,
            url = event.context.as_ref().map(|c| c.url.as_str()).unwrap_or(""),
            payload = %sent["payload"],
            "Report"
        );

        callback(
            Ok(TransportResponse::with_uuid(uuid::Uuid::new_v4().to_string())),
            Some(sent),
        );
    }

    fn is_enabled(&self) -> bool {
        true
    }
}

/// Factory for setups without a remote client: a [`TracingClient`] when
/// reporting is enabled, a [`DisabledClient`] otherwise.
pub fn local_client(options: &ClientOptions) -> Arc<dyn ReportClient> {
    if options.enabled {
        Arc::new(TracingClient::new(options))
    } else {
        Arc::new(DisabledClient)
    }
}

/// Default completion callback: logs the transport outcome.
///
/// A failed delivery is logged and dropped. A delivery acknowledged with an
/// occurrence uuid logs a link to the occurrence.
pub fn log_result(
    result: Result<TransportResponse, TransportError>,
    _sent: Option<serde_json::Value>,
) {
    match result {
        Err(e) => {
            tracing::error!(error = %e, "Failed to deliver report");
        }
        Ok(TransportResponse { uuid: Some(uuid) }) => {
            tracing::info!(uuid = %uuid, "[Rollbar] link: {}{}", OCCURRENCE_URL, uuid);
        }
        Ok(_) => {}
    }
}

/// [`log_result`] as a boxed [`ReportCallback`]
pub fn log_callback() -> ReportCallback {
    Box::new(log_result)
}
