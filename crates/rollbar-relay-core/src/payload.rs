//! Error-like objects and the payloads handed to the reporting client.
//!
//! A [`ReportedError`] is what the classifier reasons about: it carries the
//! boom marker (`is_boom`) and, for boom errors, the [`ErrorOutput`] that a
//! server would render for it. A [`Payload`] is what actually reaches the
//! client, which after `sanitize` may no longer be the error at all.

use bytes::Bytes;
use http::{header, HeaderValue, StatusCode};
use http_body_util::Full;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Message a 5xx boom shows in its output instead of the real one.
const INTERNAL_MESSAGE: &str = "An internal server error occurred";

/// An error-like object, optionally carrying the boom marker.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportedError {
    /// Human-readable error message
    pub message: String,
    /// Type name of the originating error, when known
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_type: Option<String>,
    /// Boom marker: the error describes an HTTP error response
    pub is_boom: bool,
    /// HTTP rendering of a boom error
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output: Option<ErrorOutput>,
    /// Messages of the error's source chain, outermost first
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub chain: Vec<String>,
    /// Arbitrary data attached by the application
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<serde_json::Value>,
}

/// The response a boom error renders to.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorOutput {
    pub status_code: u16,
    pub payload: OutputPayload,
    #[serde(default)]
    pub headers: BTreeMap<String, String>,
}

/// JSON body of a boom response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OutputPayload {
    pub status_code: u16,
    pub error: String,
    pub message: String,
}

impl ErrorOutput {
    fn for_status(status: StatusCode, message: &str) -> Self {
        let shown = if status.is_server_error() {
            INTERNAL_MESSAGE.to_string()
        } else {
            message.to_string()
        };

        Self {
            status_code: status.as_u16(),
            payload: OutputPayload {
                status_code: status.as_u16(),
                error: status.canonical_reason().unwrap_or("Unknown").to_string(),
                message: shown,
            },
            headers: BTreeMap::new(),
        }
    }
}

impl ReportedError {
    /// Create a plain (non-boom) error
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            error_type: None,
            is_boom: false,
            output: None,
            chain: Vec::new(),
            data: None,
        }
    }

    /// Create a boom error for the given status.
    ///
    /// Statuses below 400 are not error responses and are coerced to 500.
    pub fn boom(status: StatusCode, message: impl Into<String>) -> Self {
        Self::new(message).boomify(status)
    }

    /// Create a 400 Bad Request boom
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::boom(StatusCode::BAD_REQUEST, message)
    }

    /// Create a 401 Unauthorized boom
    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::boom(StatusCode::UNAUTHORIZED, message)
    }

    /// Create a 403 Forbidden boom
    pub fn forbidden(message: impl Into<String>) -> Self {
        Self::boom(StatusCode::FORBIDDEN, message)
    }

    /// Create a 404 Not Found boom
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::boom(StatusCode::NOT_FOUND, message)
    }

    /// Create a 500 Internal Server Error boom
    pub fn internal(message: impl Into<String>) -> Self {
        Self::boom(StatusCode::INTERNAL_SERVER_ERROR, message)
    }

    /// Capture a Rust error, including its source chain.
    pub fn from_error<E>(err: &E) -> Self
    where
        E: std::error::Error + ?Sized,
    {
        let type_name = std::any::type_name::<E>();
        let mut reported = Self::new(err.to_string());
        if !type_name.starts_with("dyn ") {
            reported.error_type = Some(type_name.to_string());
        }

        let mut source = err.source();
        while let Some(inner) = source {
            reported.chain.push(inner.to_string());
            source = inner.source();
        }
        reported
    }

    /// Turn this error into a boom for `status`, keeping its message.
    pub fn boomify(mut self, status: StatusCode) -> Self {
        let status = if status.is_client_error() || status.is_server_error() {
            status
        } else {
            StatusCode::INTERNAL_SERVER_ERROR
        };
        self.output = Some(ErrorOutput::for_status(status, &self.message));
        self.is_boom = true;
        self
    }

    /// Attach application data
    pub fn with_data(mut self, data: serde_json::Value) -> Self {
        self.data = Some(data);
        self
    }

    /// Status code of a boom error
    pub fn status_code(&self) -> Option<u16> {
        self.output.as_ref().map(|o| o.status_code)
    }

    /// Render a boom error as an HTTP response.
    ///
    /// The error itself is stored in the response extensions, which is how
    /// [`RelayService`](crate::middleware::RelayService) recognises error
    /// responses on their way out. A non-boom error is boomified to 500 first.
    pub fn into_response<B>(self) -> http::Response<B>
    where
        B: From<Bytes>,
    {
        let err = if self.is_boom && self.output.is_some() {
            self
        } else {
            self.boomify(StatusCode::INTERNAL_SERVER_ERROR)
        };

        let (status, body) = match err.output {
            Some(ref output) => (
                StatusCode::from_u16(output.status_code)
                    .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR),
                serde_json::to_vec(&output.payload).unwrap_or_default(),
            ),
            None => (StatusCode::INTERNAL_SERVER_ERROR, Vec::new()),
        };

        let mut response = http::Response::new(B::from(Bytes::from(body)));
        *response.status_mut() = status;
        response.headers_mut().insert(
            header::CONTENT_TYPE,
            HeaderValue::from_static("application/json"),
        );
        response.extensions_mut().insert(err);
        response
    }

    /// [`into_response`](Self::into_response) with a `Full<Bytes>` body
    pub fn into_http_response(self) -> http::Response<Full<Bytes>> {
        self.into_response()
    }
}

impl fmt::Display for ReportedError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.status_code() {
            Some(code) => write!(f, "{} ({})", self.message, code),
            None => f.write_str(&self.message),
        }
    }
}

impl std::error::Error for ReportedError {}

/// What the reporting client is handed.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Payload {
    /// An error object
    Error(ReportedError),
    /// A plain message, such as a serialized internal event or a sanitized
    /// replacement
    Text(String),
    /// Structured data
    Json(serde_json::Value),
}

impl Payload {
    /// The error object, if this payload still is one
    pub fn as_error(&self) -> Option<&ReportedError> {
        match self {
            Payload::Error(err) => Some(err),
            _ => None,
        }
    }

    /// The message text, if this payload is a plain message
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Payload::Text(text) => Some(text),
            _ => None,
        }
    }

    /// Whether this payload is an error carrying the boom marker
    pub fn is_boom(&self) -> bool {
        self.as_error().map(|e| e.is_boom).unwrap_or(false)
    }
}

impl From<ReportedError> for Payload {
    fn from(err: ReportedError) -> Self {
        Payload::Error(err)
    }
}

impl From<String> for Payload {
    fn from(text: String) -> Self {
        Payload::Text(text)
    }
}

impl From<&str> for Payload {
    fn from(text: &str) -> Self {
        Payload::Text(text.to_string())
    }
}

impl From<serde_json::Value> for Payload {
    fn from(value: serde_json::Value) -> Self {
        Payload::Json(value)
    }
}

/// The response the host is about to send, as seen by the pre-response hook.
#[derive(Debug, Clone, PartialEq)]
pub enum ResponseCandidate {
    /// A regular response
    Success { status: u16 },
    /// An error-like response
    Error(ReportedError),
}

impl ResponseCandidate {
    /// The error behind this response, if it carries the boom marker
    pub fn boom(&self) -> Option<&ReportedError> {
        match self {
            ResponseCandidate::Error(err) if err.is_boom => Some(err),
            _ => None,
        }
    }

    /// Status code the response is sent with
    pub fn status(&self) -> u16 {
        match self {
            ResponseCandidate::Success { status } => *status,
            ResponseCandidate::Error(err) => err.status_code().unwrap_or(500),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, thiserror::Error)]
    #[error("query failed")]
    struct QueryError {
        #[source]
        source: std::io::Error,
    }

    #[test]
    fn test_client_boom_keeps_message() {
        let err = ReportedError::bad_request("Unsupported parameter");
        assert!(err.is_boom);
        let output = err.output.as_ref().unwrap();
        assert_eq!(output.status_code, 400);
        assert_eq!(output.payload.error, "Bad Request");
        assert_eq!(output.payload.message, "Unsupported parameter");
    }

    #[test]
    fn test_server_boom_hides_message() {
        let err = ReportedError::internal("db password rejected");
        assert_eq!(err.message, "db password rejected");
        assert_eq!(
            err.output.unwrap().payload.message,
            "An internal server error occurred"
        );
    }

    #[test]
    fn test_boomify_coerces_success_status() {
        let err = ReportedError::new("odd").boomify(StatusCode::OK);
        assert_eq!(err.status_code(), Some(500));
    }

    #[test]
    fn test_from_error_captures_chain() {
        let err = QueryError {
            source: std::io::Error::new(std::io::ErrorKind::Other, "connection reset"),
        };
        let reported = ReportedError::from_error(&err);

        assert_eq!(reported.message, "query failed");
        assert_eq!(reported.chain, vec!["connection reset".to_string()]);
        assert!(reported.error_type.unwrap().ends_with("QueryError"));
        assert!(!reported.is_boom);
    }

    #[test]
    fn test_into_http_response_carries_marker() {
        let response = ReportedError::not_found("Not Found").into_http_response();

        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        let marker = response.extensions().get::<ReportedError>().unwrap();
        assert!(marker.is_boom);
        assert_eq!(marker.status_code(), Some(404));
    }

    #[test]
    fn test_payload_serializes_untagged() {
        let text = serde_json::to_value(Payload::from("foobar")).unwrap();
        assert_eq!(text, serde_json::json!("foobar"));

        let err = serde_json::to_value(Payload::from(ReportedError::new("boom"))).unwrap();
        assert_eq!(err["message"], "boom");
        assert_eq!(err["isBoom"], false);
    }

    #[test]
    fn test_candidate_boom_requires_marker() {
        let plain = ResponseCandidate::Error(ReportedError::new("plain"));
        assert!(plain.boom().is_none());
        assert_eq!(plain.status(), 500);

        let boom = ResponseCandidate::Error(ReportedError::unauthorized("no"));
        assert_eq!(boom.boom().unwrap().status_code(), Some(401));
        assert!(ResponseCandidate::Success { status: 200 }.boom().is_none());
    }
}
