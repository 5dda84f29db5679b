use super::expectation::{Expectation, Reply, Times};
use super::matcher::EventMatcher;
use rollbar_relay_core::{
    ClassifiedEvent, ClientFactory, ClientOptions, EventKind, ReportCallback, ReportClient,
    TransportResponse,
};
use std::sync::{Arc, Mutex};

#[derive(Debug, Default)]
struct ClientState {
    events: Vec<ClassifiedEvent>,
    outcomes: Vec<Option<serde_json::Value>>,
    expectations: Vec<Expectation>,
    reply: Reply,
    options: Option<ClientOptions>,
    uncaught_handler: Option<bool>,
    shutdowns: usize,
}

/// A [`ReportClient`] that records every report.
///
/// Clones share their recordings, so one handle can be given to the relay and
/// another kept for assertions.
///
/// ```ignore
/// let client = RecordingClient::new();
/// let mut lifecycle = MockLifecycle::new();
/// RollbarPlugin::new(config).register(&mut lifecycle, client.factory());
///
/// client.expect(EventMatcher::error().boom(true).status(404)).once();
/// lifecycle.pre_response(None, &candidate);
/// client.verify();
/// ```
#[derive(Debug, Clone, Default)]
pub struct RecordingClient {
    state: Arc<Mutex<ClientState>>,
}

impl RecordingClient {
    pub fn new() -> Self {
        Self::default()
    }

    /// Answer reports with `reply` from now on
    pub fn reply(&self, reply: Reply) -> &Self {
        self.state.lock().unwrap().reply = reply;
        self
    }

    /// A factory handing this client to the relay and recording its options
    pub fn factory(&self) -> impl ClientFactory {
        let client = self.clone();
        move |options: &ClientOptions| -> Arc<dyn ReportClient> {
            client.state.lock().unwrap().options = Some(options.clone());
            Arc::new(client)
        }
    }

    /// Options the relay initialized the client with
    pub fn options(&self) -> Option<ClientOptions> {
        self.state.lock().unwrap().options.clone()
    }

    /// Every reported event, in order
    pub fn events(&self) -> Vec<ClassifiedEvent> {
        self.state.lock().unwrap().events.clone()
    }

    /// Total number of reports
    pub fn count(&self) -> usize {
        self.state.lock().unwrap().events.len()
    }

    /// Number of reports of the given kind
    pub fn count_kind(&self, kind: EventKind) -> usize {
        self.state
            .lock()
            .unwrap()
            .events
            .iter()
            .filter(|e| e.kind == kind)
            .count()
    }

    /// Number of error reports
    pub fn errors(&self) -> usize {
        self.count_kind(EventKind::Error)
    }

    /// Number of warning reports
    pub fn warnings(&self) -> usize {
        self.count_kind(EventKind::Warning)
    }

    /// Number of message reports
    pub fn messages(&self) -> usize {
        self.count_kind(EventKind::Message)
    }

    /// Reported events matching `matcher`
    pub fn matching(&self, matcher: &EventMatcher) -> Vec<ClassifiedEvent> {
        self.state
            .lock()
            .unwrap()
            .events
            .iter()
            .filter(|e| matcher.matches(e))
            .cloned()
            .collect()
    }

    /// Payloads handed to completion callbacks, one per answered report
    pub fn sent(&self) -> Vec<Option<serde_json::Value>> {
        self.state.lock().unwrap().outcomes.clone()
    }

    /// The `exit_on_uncaught` flag the uncaught handler was installed with
    pub fn uncaught_handler(&self) -> Option<bool> {
        self.state.lock().unwrap().uncaught_handler
    }

    /// How often the client was shut down
    pub fn shutdowns(&self) -> usize {
        self.state.lock().unwrap().shutdowns
    }

    /// Add an expectation
    pub fn expect(&self, matcher: EventMatcher) -> ExpectationBuilder {
        ExpectationBuilder {
            state: self.state.clone(),
            expectation: Some(Expectation::new(matcher)),
        }
    }

    /// Verify that all expectations were met
    pub fn verify(&self) {
        let state = self.state.lock().unwrap();
        for exp in &state.expectations {
            exp.verify();
        }
    }
}

impl ReportClient for RecordingClient {
    fn report(&self, event: ClassifiedEvent, callback: ReportCallback) {
        let reply = {
            let mut state = self.state.lock().unwrap();
            for exp in state.expectations.iter_mut() {
                if exp.matcher.matches(&event) {
                    exp.call_count += 1;
                }
            }
            tracing::trace!(kind = ?event.kind, "Recorded report");
            state.events.push(event.clone());
            let index = state.events.len();
            match state.reply {
                Reply::Acknowledge => {
                    Reply::Respond(TransportResponse::with_uuid(format!("recorded-{index}")))
                }
                ref other => other.clone(),
            }
        };

        // The callback may report again, so the lock is released first
        let sent = serde_json::to_value(&event).ok();
        match reply {
            Reply::Respond(response) => {
                self.state.lock().unwrap().outcomes.push(sent.clone());
                callback(Ok(response), sent);
            }
            Reply::Fail(error) => {
                self.state.lock().unwrap().outcomes.push(sent.clone());
                callback(Err(error), sent);
            }
            Reply::Acknowledge | Reply::Silent => {}
        }
    }

    fn is_enabled(&self) -> bool {
        true
    }

    fn install_uncaught_exception_handler(&self, exit_on_uncaught: bool) {
        self.state.lock().unwrap().uncaught_handler = Some(exit_on_uncaught);
    }

    fn shutdown(&self) {
        self.state.lock().unwrap().shutdowns += 1;
    }
}

pub struct ExpectationBuilder {
    state: Arc<Mutex<ClientState>>,
    expectation: Option<Expectation>,
}

impl ExpectationBuilder {
    pub fn times(mut self, n: usize) -> Self {
        if let Some(exp) = self.expectation.as_mut() {
            exp.times = Times::Exactly(n);
        }
        self
    }

    pub fn once(mut self) -> Self {
        if let Some(exp) = self.expectation.as_mut() {
            exp.times = Times::Once;
        }
        self
    }

    pub fn at_least_once(mut self) -> Self {
        if let Some(exp) = self.expectation.as_mut() {
            exp.times = Times::AtLeast(1);
        }
        self
    }

    pub fn at_most(mut self, n: usize) -> Self {
        if let Some(exp) = self.expectation.as_mut() {
            exp.times = Times::AtMost(n);
        }
        self
    }

    pub fn any(mut self) -> Self {
        if let Some(exp) = self.expectation.as_mut() {
            exp.times = Times::Any;
        }
        self
    }

    pub fn never(mut self) -> Self {
        if let Some(exp) = self.expectation.as_mut() {
            exp.times = Times::Exactly(0);
        }
        self
    }
}

impl Drop for ExpectationBuilder {
    fn drop(&mut self) {
        if let Some(exp) = self.expectation.take() {
            if let Ok(mut state) = self.state.lock() {
                state.expectations.push(exp);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rollbar_relay_core::{Payload, ReportedError, TransportError};

    fn report(client: &RecordingClient, event: ClassifiedEvent) -> Arc<Mutex<Vec<bool>>> {
        let results = Arc::new(Mutex::new(Vec::new()));
        let seen = results.clone();
        client.report(
            event,
            Box::new(move |result, _| seen.lock().unwrap().push(result.is_ok())),
        );
        results
    }

    #[test]
    fn test_records_and_acknowledges() {
        let client = RecordingClient::new();
        let results = report(&client, ClassifiedEvent::warning(Payload::from("w"), None));

        assert_eq!(client.warnings(), 1);
        assert_eq!(client.errors(), 0);
        assert_eq!(*results.lock().unwrap(), vec![true]);
        assert_eq!(client.sent()[0].as_ref().unwrap()["payload"], "w");
    }

    #[test]
    fn test_configured_failure_reaches_callback() {
        let client = RecordingClient::new();
        client.reply(Reply::Fail(TransportError::RateLimited));
        let results = report(&client, ClassifiedEvent::error(Payload::from("e"), None));

        assert_eq!(*results.lock().unwrap(), vec![false]);
    }

    #[test]
    fn test_silent_reply_never_calls_back() {
        let client = RecordingClient::new();
        client.reply(Reply::Silent);
        let results = report(&client, ClassifiedEvent::error(Payload::from("e"), None));

        assert!(results.lock().unwrap().is_empty());
        assert_eq!(client.count(), 1);
    }

    #[test]
    fn test_expectations_verify() {
        let client = RecordingClient::new();
        client.expect(EventMatcher::error().boom(true)).once();
        client.expect(EventMatcher::warning()).never();

        let boom = ReportedError::not_found("gone");
        report(&client, ClassifiedEvent::error(Payload::from(boom), None));

        client.verify();
    }

    #[test]
    fn test_bounded_and_unbounded_expectations() {
        let client = RecordingClient::new();
        client.expect(EventMatcher::warning()).at_most(1);
        client.expect(EventMatcher::message()).at_most(1);
        client.expect(EventMatcher::error()).any();

        report(&client, ClassifiedEvent::warning(Payload::from("w"), None));
        for _ in 0..3 {
            report(&client, ClassifiedEvent::error(Payload::from("e"), None));
        }

        client.verify();
    }

    #[test]
    #[should_panic(expected = "expected at most 1 reports")]
    fn test_exceeded_upper_bound_panics() {
        let client = RecordingClient::new();
        client.expect(EventMatcher::error()).at_most(1);
        report(&client, ClassifiedEvent::error(Payload::from("a"), None));
        report(&client, ClassifiedEvent::error(Payload::from("b"), None));
        client.verify();
    }

    #[test]
    #[should_panic(expected = "expected 1 report")]
    fn test_unmet_expectation_panics() {
        let client = RecordingClient::new();
        client.expect(EventMatcher::message()).once();
        client.verify();
    }

    #[test]
    fn test_factory_records_options() {
        let client = RecordingClient::new();
        let options = ClientOptions {
            environment: "staging".into(),
            ..Default::default()
        };
        let reporting = client.factory().initialize(&options);
        reporting.install_uncaught_exception_handler(true);
        reporting.shutdown();

        assert_eq!(client.options().unwrap().environment, "staging");
        assert_eq!(client.uncaught_handler(), Some(true));
        assert_eq!(client.shutdowns(), 1);
    }
}
