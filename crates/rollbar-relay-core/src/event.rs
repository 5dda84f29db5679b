//! Lifecycle event shapes and the classified events sent to the client.

use crate::context::RequestContext;
use crate::level::Level;
use crate::payload::{Payload, ReportedError};
use serde::ser::SerializeSeq;
use serde::{Serialize, Serializer};
use std::collections::BTreeMap;
use std::time::{SystemTime, UNIX_EPOCH};

/// Tag set on internal events raised for failures.
pub const TAG_ERROR: &str = "error";

/// Tag set on internal events raised while parsing request state (cookies).
pub const TAG_STATE: &str = "state";

/// Log tag asking for the event's error to be reported.
pub const TAG_ROLLBAR_ERROR: &str = "rollbarError";

/// Log tag asking for the event's message to be reported.
pub const TAG_ROLLBAR_MESSAGE: &str = "rollbarMessage";

/// Tag set attached to host events.
///
/// Only tags mapped to `true` count as present.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Tags(BTreeMap<String, bool>);

impl Tags {
    /// Create an empty tag set
    pub fn new() -> Self {
        Self::default()
    }

    /// Set a tag
    pub fn with(mut self, tag: impl Into<String>) -> Self {
        self.0.insert(tag.into(), true);
        self
    }

    /// Set a tag to an explicit value
    pub fn insert(&mut self, tag: impl Into<String>, value: bool) {
        self.0.insert(tag.into(), value);
    }

    /// Check whether a tag is present
    pub fn has(&self, tag: &str) -> bool {
        self.0.get(tag).copied().unwrap_or(false)
    }

    /// Iterate over present tags
    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.iter().filter(|(_, v)| **v).map(|(k, _)| k.as_str())
    }
}

impl<S: Into<String>> FromIterator<S> for Tags {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        Self(iter.into_iter().map(|t| (t.into(), true)).collect())
    }
}

impl From<&[&str]> for Tags {
    fn from(tags: &[&str]) -> Self {
        tags.iter().copied().collect()
    }
}

impl Serialize for Tags {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let present: Vec<&str> = self.iter().collect();
        let mut seq = serializer.serialize_seq(Some(present.len()))?;
        for tag in present {
            seq.serialize_element(tag)?;
        }
        seq.end()
    }
}

fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}

/// A request-scoped diagnostic event raised by the host.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct InternalEvent {
    pub tags: Tags,
    pub data: serde_json::Value,
    pub timestamp: u64,
}

impl InternalEvent {
    /// Create an event stamped with the current time
    pub fn new(tags: impl Into<Tags>, data: serde_json::Value) -> Self {
        Self {
            tags: tags.into(),
            data,
            timestamp: now_millis(),
        }
    }

    /// Whether this event describes a request state parsing failure
    pub fn is_state_error(&self) -> bool {
        self.tags.has(TAG_ERROR) && self.tags.has(TAG_STATE)
    }
}

/// A generic log event raised by the host or the application.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LogEvent {
    pub tags: Tags,
    pub error: Option<ReportedError>,
    pub message: Option<String>,
    pub level: Option<Level>,
    pub data: Option<serde_json::Value>,
}

impl LogEvent {
    /// Create a log event with the given tags
    pub fn new(tags: impl Into<Tags>) -> Self {
        Self {
            tags: tags.into(),
            ..Default::default()
        }
    }

    /// Attach an error
    pub fn with_error(mut self, error: ReportedError) -> Self {
        self.error = Some(error);
        self
    }

    /// Attach a message
    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    /// Set the message level
    pub fn with_level(mut self, level: Level) -> Self {
        self.level = Some(level);
        self
    }

    /// Attach extra data
    pub fn with_data(mut self, data: serde_json::Value) -> Self {
        self.data = Some(data);
        self
    }
}

/// Report operation a classified event maps to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum EventKind {
    Error,
    Warning,
    Message,
}

/// A lifecycle notification after classification, ready for the client.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ClassifiedEvent {
    pub kind: EventKind,
    pub payload: Payload,
    pub level: Level,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub context: Option<RequestContext>,
    /// Boom output or caller-supplied payload data
    #[serde(skip_serializing_if = "Option::is_none")]
    pub extra: Option<serde_json::Value>,
}

impl ClassifiedEvent {
    /// Create an error event
    pub fn error(payload: Payload, context: Option<RequestContext>) -> Self {
        Self {
            kind: EventKind::Error,
            payload,
            level: Level::Error,
            context,
            extra: None,
        }
    }

    /// Create a warning event
    pub fn warning(payload: Payload, context: Option<RequestContext>) -> Self {
        Self {
            kind: EventKind::Warning,
            payload,
            level: Level::DEFAULT_WARNING,
            context,
            extra: None,
        }
    }

    /// Create a message event
    pub fn message(
        message: impl Into<String>,
        level: Level,
        context: Option<RequestContext>,
    ) -> Self {
        Self {
            kind: EventKind::Message,
            payload: Payload::Text(message.into()),
            level,
            context,
            extra: None,
        }
    }

    /// Attach extra data
    pub fn with_extra(mut self, extra: Option<serde_json::Value>) -> Self {
        self.extra = extra;
        self
    }

    /// Override the level
    pub fn with_level(mut self, level: Level) -> Self {
        self.level = level;
        self
    }
}
