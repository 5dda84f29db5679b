//! Testing utilities for rollbar-relay
//!
//! # Recording client
//!
//! [`RecordingClient`] stands in for a real reporting client and records
//! every classified event. Expectations built from an [`EventMatcher`] are
//! checked with [`RecordingClient::verify`].
//!
//! # Mock lifecycle
//!
//! [`MockLifecycle`] is a lifecycle host whose hooks are fired by hand.

pub mod client;
pub mod expectation;
pub mod lifecycle;
pub mod matcher;

pub use client::{ExpectationBuilder, RecordingClient};
pub use expectation::{Expectation, Reply, Times};
pub use lifecycle::{HookCounts, MockLifecycle};
pub use matcher::EventMatcher;
