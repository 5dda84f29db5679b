use super::matcher::EventMatcher;
use rollbar_relay_core::{TransportError, TransportResponse};

/// An expectation for reported events
#[derive(Debug, Clone)]
pub struct Expectation {
    pub(crate) matcher: EventMatcher,
    pub(crate) times: Times,
    pub(crate) call_count: usize,
}

impl Expectation {
    /// Create a new expectation, matched exactly once by default
    pub fn new(matcher: EventMatcher) -> Self {
        Self {
            matcher,
            times: Times::Once,
            call_count: 0,
        }
    }

    /// Check the observed count, panicking with the matcher on mismatch
    pub(crate) fn verify(&self) {
        match self.times {
            Times::Once => assert_eq!(
                self.call_count, 1,
                "Expectation {:?} expected 1 report, got {}",
                self.matcher, self.call_count
            ),
            Times::Exactly(n) => assert_eq!(
                self.call_count, n,
                "Expectation {:?} expected {} reports, got {}",
                self.matcher, n, self.call_count
            ),
            Times::AtLeast(n) => assert!(
                self.call_count >= n,
                "Expectation {:?} expected at least {} reports, got {}",
                self.matcher,
                n,
                self.call_count
            ),
            Times::AtMost(n) => assert!(
                self.call_count <= n,
                "Expectation {:?} expected at most {} reports, got {}",
                self.matcher,
                n,
                self.call_count
            ),
            Times::Any => {}
        }
    }
}

/// Define how many times an expectation should be matched
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Times {
    Once,
    Exactly(usize),
    AtLeast(usize),
    AtMost(usize),
    Any,
}

/// How a [`RecordingClient`](crate::RecordingClient) answers a report.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Reply {
    /// Acknowledge with a fresh occurrence uuid
    #[default]
    Acknowledge,
    /// Acknowledge with the given response
    Respond(TransportResponse),
    /// Fail delivery
    Fail(TransportError),
    /// Never call back
    Silent,
}

impl Reply {
    /// Acknowledge with a fixed occurrence uuid
    pub fn uuid(uuid: impl Into<String>) -> Self {
        Reply::Respond(TransportResponse::with_uuid(uuid))
    }
}
