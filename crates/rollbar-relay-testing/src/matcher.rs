use rollbar_relay_core::{ClassifiedEvent, EventKind, Level, Payload};

/// Matcher for reported events
#[derive(Debug, Clone, Default)]
pub struct EventMatcher {
    pub(crate) kind: Option<EventKind>,
    pub(crate) level: Option<Level>,
    pub(crate) boom: Option<bool>,
    pub(crate) status: Option<u16>,
    pub(crate) text: Option<String>,
    pub(crate) message: Option<String>,
    pub(crate) route: Option<String>,
}

impl EventMatcher {
    /// Create a new matcher
    pub fn new() -> Self {
        Self::default()
    }

    /// Match error reports
    pub fn error() -> Self {
        Self::new().kind(EventKind::Error)
    }

    /// Match warning reports
    pub fn warning() -> Self {
        Self::new().kind(EventKind::Warning)
    }

    /// Match message reports
    pub fn message() -> Self {
        Self::new().kind(EventKind::Message)
    }

    /// Match a specific report kind
    pub fn kind(mut self, kind: EventKind) -> Self {
        self.kind = Some(kind);
        self
    }

    /// Match a specific level
    pub fn level(mut self, level: Level) -> Self {
        self.level = Some(level);
        self
    }

    /// Match on the boom marker of an error payload
    pub fn boom(mut self, boom: bool) -> Self {
        self.boom = Some(boom);
        self
    }

    /// Match the status code of a boom payload
    pub fn status(mut self, status: u16) -> Self {
        self.status = Some(status);
        self
    }

    /// Match an exact text payload
    pub fn text(mut self, text: impl Into<String>) -> Self {
        self.text = Some(text.into());
        self
    }

    /// Match the message of an error payload
    pub fn error_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    /// Match the route pattern in the request context
    pub fn route(mut self, route: impl Into<String>) -> Self {
        self.route = Some(route.into());
        self
    }

    /// Check if the matcher matches an event
    pub fn matches(&self, event: &ClassifiedEvent) -> bool {
        if let Some(kind) = self.kind {
            if event.kind != kind {
                return false;
            }
        }

        if let Some(level) = self.level {
            if event.level != level {
                return false;
            }
        }

        if let Some(boom) = self.boom {
            if event.payload.is_boom() != boom {
                return false;
            }
        }

        if let Some(status) = self.status {
            let actual = event.payload.as_error().and_then(|e| e.status_code());
            if actual != Some(status) {
                return false;
            }
        }

        if let Some(ref text) = self.text {
            if event.payload.as_text() != Some(text.as_str()) {
                return false;
            }
        }

        if let Some(ref message) = self.message {
            match event.payload {
                Payload::Error(ref err) if &err.message == message => {}
                _ => return false,
            }
        }

        if let Some(ref route) = self.route {
            let actual = event
                .context
                .as_ref()
                .and_then(|c| c.route.path.as_deref());
            if actual != Some(route.as_str()) {
                return false;
            }
        }

        true
    }
}

#[cfg(test)]
mod property_tests {
    use super::*;
    use proptest::prelude::*;
    use rollbar_relay_core::ReportedError;

    fn kind_strategy() -> impl Strategy<Value = EventKind> {
        prop_oneof![
            Just(EventKind::Error),
            Just(EventKind::Warning),
            Just(EventKind::Message),
        ]
    }

    fn status_strategy() -> impl Strategy<Value = u16> {
        prop_oneof![400u16..452, 500u16..512]
    }

    fn event(kind: EventKind, payload: Payload) -> ClassifiedEvent {
        let mut event = ClassifiedEvent::warning(payload, None);
        event.kind = kind;
        event
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(100))]

        /// An empty matcher matches every event
        #[test]
        fn prop_empty_matcher_matches_all(
            kind in kind_strategy(),
            text in "[a-zA-Z0-9 ]{0,40}",
        ) {
            let event = event(kind, Payload::from(text));
            prop_assert!(EventMatcher::new().matches(&event));
        }

        /// Kind matching accepts only the same kind
        #[test]
        fn prop_kind_matcher_correctness(
            target in kind_strategy(),
            other in kind_strategy(),
        ) {
            let matcher = EventMatcher::new().kind(target);
            let mut event = event(target, Payload::from("x"));
            prop_assert!(matcher.matches(&event));

            event.kind = other;
            prop_assert_eq!(matcher.matches(&event), target == other);
        }

        /// Status matching needs a boom with that exact status
        #[test]
        fn prop_status_matcher_correctness(
            target in status_strategy(),
            other in status_strategy(),
        ) {
            let boom = ReportedError::boom(
                http::StatusCode::from_u16(other).unwrap(),
                "boom",
            );
            let event = ClassifiedEvent::error(Payload::from(boom), None);

            let matcher = EventMatcher::error().boom(true).status(target);
            prop_assert_eq!(matcher.matches(&event), target == other);
            prop_assert!(!EventMatcher::error().boom(false).matches(&event));
        }
    }
}
