//! Configuration for the relay.
//!
//! This module provides the [`RelayConfig`] builder, the serde-friendly
//! [`ClientSettings`] for option maps, and environment loading.
//!
//! # Example
//!
//! ```ignore
//! use rollbar_relay_core::{RelayConfig, ReportedError};
//!
//! let config = RelayConfig::new()
//!     .access_token("90bdff07d44a4984aea0d0684bb6c142")
//!     .environment("production")
//!     .filter(|err: &ReportedError| err.status_code() != Some(404))
//!     .sanitize(|_err: &ReportedError| "request failed".into());
//! ```

use crate::client::ClientOptions;
use crate::error::Result;
use crate::event::{TAG_ROLLBAR_ERROR, TAG_ROLLBAR_MESSAGE};
use crate::payload::{Payload, ReportedError, ResponseCandidate};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

/// Environment variable consulted for the default environment name.
pub const APP_ENV_VAR: &str = "APP_ENV";

/// Prefix of the variables read by [`RelayConfig::from_env`].
pub const ENV_PREFIX: &str = "ROLLBAR_";

/// Transform applied to a response before it is classified.
pub type PreErrorHook = Arc<dyn Fn(ResponseCandidate) -> ResponseCandidate + Send + Sync>;

/// Predicate deciding whether an error is reported at all.
pub type FilterHook = Arc<dyn Fn(&ReportedError) -> bool + Send + Sync>;

/// Transform producing the payload actually handed to the client.
pub type SanitizeHook = Arc<dyn Fn(&ReportedError) -> Payload + Send + Sync>;

/// Plain-data client settings, as found in an options map.
///
/// Keys other than the four recognized ones are collected in `extra` and
/// passed to the client untouched.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClientSettings {
    #[serde(default)]
    pub access_token: Option<String>,
    #[serde(default)]
    pub environment: Option<String>,
    #[serde(default)]
    pub handle_uncaught_exceptions: Option<bool>,
    #[serde(default)]
    pub exit_on_uncaught_exception: Option<bool>,
    #[serde(flatten)]
    pub extra: BTreeMap<String, serde_json::Value>,
}

#[derive(Debug, Deserialize)]
struct EnvSettings {
    access_token: Option<String>,
    environment: Option<String>,
    handle_uncaught_exceptions: Option<bool>,
    exit_on_uncaught_exception: Option<bool>,
}

fn default_environment() -> String {
    std::env::var(APP_ENV_VAR)
        .ok()
        .filter(|v| !v.trim().is_empty())
        .unwrap_or_else(|| "development".to_string())
}

/// Relay configuration.
///
/// Built once at server start and shared read-only afterwards.
#[derive(Clone)]
pub struct RelayConfig {
    pub(crate) access_token: Option<String>,
    pub(crate) environment: String,
    pub(crate) handle_uncaught_exceptions: bool,
    pub(crate) exit_on_uncaught_exception: bool,
    pub(crate) extra: BTreeMap<String, serde_json::Value>,
    pub(crate) pre_error: Option<PreErrorHook>,
    pub(crate) filter: Option<FilterHook>,
    pub(crate) sanitize: Option<SanitizeHook>,
    pub(crate) structured_internal_events: bool,
    pub(crate) error_tag: String,
    pub(crate) message_tag: String,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self::new()
    }
}

impl RelayConfig {
    /// Create a configuration with default values.
    ///
    /// Defaults:
    /// - No access token (reporting disabled)
    /// - Environment from `APP_ENV`, else "development"
    /// - Uncaught panics not handled
    /// - No pre-error, filter or sanitize hooks
    /// - Internal events reported as JSON strings
    /// - Log tags `rollbarError` / `rollbarMessage`
    pub fn new() -> Self {
        Self {
            access_token: None,
            environment: default_environment(),
            handle_uncaught_exceptions: false,
            exit_on_uncaught_exception: false,
            extra: BTreeMap::new(),
            pre_error: None,
            filter: None,
            sanitize: None,
            structured_internal_events: false,
            error_tag: TAG_ROLLBAR_ERROR.to_string(),
            message_tag: TAG_ROLLBAR_MESSAGE.to_string(),
        }
    }

    /// Build a configuration from an options map.
    pub fn from_settings(settings: ClientSettings) -> Self {
        let mut config = Self::new();
        config.access_token = settings.access_token;
        if let Some(environment) = settings.environment {
            config.environment = environment;
        }
        config.handle_uncaught_exceptions = settings.handle_uncaught_exceptions.unwrap_or(false);
        config.exit_on_uncaught_exception = settings.exit_on_uncaught_exception.unwrap_or(false);
        config.extra = settings.extra;
        config
    }

    /// Build a configuration from `ROLLBAR_*` environment variables.
    ///
    /// Loads `.env` first if present. Reads `ROLLBAR_ACCESS_TOKEN`,
    /// `ROLLBAR_ENVIRONMENT`, `ROLLBAR_HANDLE_UNCAUGHT_EXCEPTIONS` and
    /// `ROLLBAR_EXIT_ON_UNCAUGHT_EXCEPTION`. A missing token is not an error;
    /// the relay is simply disabled.
    pub fn from_env() -> Result<Self> {
        if let Err(e) = dotenvy::dotenv() {
            if !e.not_found() {
                tracing::warn!(error = %e, "Failed to load .env file");
            }
        }

        let env: EnvSettings = envy::prefixed(ENV_PREFIX).from_env()?;
        Ok(Self::from_settings(ClientSettings {
            access_token: env.access_token,
            environment: env.environment,
            handle_uncaught_exceptions: env.handle_uncaught_exceptions,
            exit_on_uncaught_exception: env.exit_on_uncaught_exception,
            extra: BTreeMap::new(),
        }))
    }

    /// Set the access token
    pub fn access_token(mut self, token: impl Into<String>) -> Self {
        self.access_token = Some(token.into());
        self
    }

    /// Set the environment name
    pub fn environment(mut self, environment: impl Into<String>) -> Self {
        self.environment = environment.into();
        self
    }

    /// Report panics through the client
    pub fn handle_uncaught_exceptions(mut self, handle: bool) -> Self {
        self.handle_uncaught_exceptions = handle;
        self
    }

    /// Exit the process after reporting a panic.
    ///
    /// Implies panic reporting. The panic hook runs before unwinding, so
    /// this also exits on panics that would have been recovered, such as
    /// one raised inside a spawned tokio task or under `catch_unwind`.
    pub fn exit_on_uncaught_exception(mut self, exit: bool) -> Self {
        self.exit_on_uncaught_exception = exit;
        self
    }

    /// Pass an option through to the client initializer
    pub fn option(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.extra.insert(key.into(), value);
        self
    }

    /// Transform responses before they are classified
    pub fn pre_error<F>(mut self, hook: F) -> Self
    where
        F: Fn(ResponseCandidate) -> ResponseCandidate + Send + Sync + 'static,
    {
        self.pre_error = Some(Arc::new(hook));
        self
    }

    /// Decide per error whether it is reported
    pub fn filter<F>(mut self, hook: F) -> Self
    where
        F: Fn(&ReportedError) -> bool + Send + Sync + 'static,
    {
        self.filter = Some(Arc::new(hook));
        self
    }

    /// Replace the payload handed to the client for each reported error
    pub fn sanitize<F>(mut self, hook: F) -> Self
    where
        F: Fn(&ReportedError) -> Payload + Send + Sync + 'static,
    {
        self.sanitize = Some(Arc::new(hook));
        self
    }

    /// Report internal events as structured JSON rather than a JSON string
    pub fn structured_internal_events(mut self, structured: bool) -> Self {
        self.structured_internal_events = structured;
        self
    }

    /// Log tag that requests error reporting
    pub fn error_tag(mut self, tag: impl Into<String>) -> Self {
        self.error_tag = tag.into();
        self
    }

    /// Log tag that requests message reporting
    pub fn message_tag(mut self, tag: impl Into<String>) -> Self {
        self.message_tag = tag.into();
        self
    }

    /// Whether a usable access token is configured
    pub fn is_enabled(&self) -> bool {
        self.access_token
            .as_deref()
            .map(|t| !t.trim().is_empty())
            .unwrap_or(false)
    }

    /// Whether a panic hook should be installed
    pub fn handles_uncaught(&self) -> bool {
        self.handle_uncaught_exceptions || self.exit_on_uncaught_exception
    }

    /// Get the environment name
    pub fn environment_name(&self) -> &str {
        &self.environment
    }

    /// Options the client is initialized with
    pub fn client_options(&self) -> ClientOptions {
        ClientOptions {
            access_token: self.access_token.clone(),
            environment: self.environment.clone(),
            enabled: self.is_enabled(),
            handle_uncaught_exceptions: self.handles_uncaught(),
            exit_on_uncaught_exception: self.exit_on_uncaught_exception,
            extra: self.extra.clone(),
        }
    }

    pub(crate) fn apply_pre_error(&self, candidate: ResponseCandidate) -> ResponseCandidate {
        match self.pre_error {
            Some(ref hook) => hook(candidate),
            None => candidate,
        }
    }

    pub(crate) fn should_report(&self, err: &ReportedError) -> bool {
        match self.filter {
            Some(ref hook) => hook(err),
            None => true,
        }
    }

    pub(crate) fn sanitize_error(&self, err: &ReportedError) -> Payload {
        match self.sanitize {
            Some(ref hook) => hook(err),
            None => Payload::Error(err.clone()),
        }
    }
}

impl fmt::Debug for RelayConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RelayConfig")
            .field("access_token", &self.access_token.as_ref().map(|_| "[REDACTED]"))
            .field("environment", &self.environment)
            .field("handle_uncaught_exceptions", &self.handle_uncaught_exceptions)
            .field("exit_on_uncaught_exception", &self.exit_on_uncaught_exception)
            .field("extra", &self.extra)
            .field("pre_error", &self.pre_error.is_some())
            .field("filter", &self.filter.is_some())
            .field("sanitize", &self.sanitize.is_some())
            .field("structured_internal_events", &self.structured_internal_events)
            .field("error_tag", &self.error_tag)
            .field("message_tag", &self.message_tag)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use serial_test::serial;

    #[test]
    fn test_blank_token_disables() {
        assert!(!RelayConfig::new().is_enabled());
        assert!(!RelayConfig::new().access_token("").is_enabled());
        assert!(!RelayConfig::new().access_token("   ").is_enabled());
        assert!(RelayConfig::new().access_token("abc").is_enabled());
    }

    #[test]
    fn test_settings_pass_unknown_keys_through() {
        let settings: ClientSettings = serde_json::from_value(json!({
            "accessToken": "abc",
            "environment": "staging",
            "handleUncaughtExceptions": true,
            "codeVersion": "1.4.2",
            "captureIp": false
        }))
        .unwrap();
        let config = RelayConfig::from_settings(settings);
        let options = config.client_options();

        assert!(options.enabled);
        assert_eq!(options.environment, "staging");
        assert!(options.handle_uncaught_exceptions);
        assert_eq!(options.extra.get("codeVersion"), Some(&json!("1.4.2")));
        assert_eq!(options.extra.get("captureIp"), Some(&json!(false)));
        assert!(!options.extra.contains_key("accessToken"));
    }

    #[test]
    fn test_exit_implies_handling() {
        let config = RelayConfig::new().exit_on_uncaught_exception(true);
        assert!(config.handles_uncaught());
        assert!(config.client_options().exit_on_uncaught_exception);
    }

    #[test]
    fn test_default_hooks_are_identity() {
        let config = RelayConfig::new();
        let err = ReportedError::not_found("gone");

        assert!(config.should_report(&err));
        assert_eq!(config.sanitize_error(&err), Payload::Error(err.clone()));
        let candidate = ResponseCandidate::Success { status: 200 };
        assert_eq!(config.apply_pre_error(candidate.clone()), candidate);
    }

    #[test]
    fn test_debug_redacts_token() {
        let config = RelayConfig::new().access_token("secret-token");
        let debug = format!("{:?}", config);
        assert!(!debug.contains("secret-token"));
        assert!(debug.contains("[REDACTED]"));
    }

    #[test]
    #[serial]
    fn test_from_env() {
        std::env::set_var("ROLLBAR_ACCESS_TOKEN", "env-token");
        std::env::set_var("ROLLBAR_ENVIRONMENT", "qa");
        std::env::set_var("ROLLBAR_HANDLE_UNCAUGHT_EXCEPTIONS", "true");

        let config = RelayConfig::from_env().unwrap();

        std::env::remove_var("ROLLBAR_ACCESS_TOKEN");
        std::env::remove_var("ROLLBAR_ENVIRONMENT");
        std::env::remove_var("ROLLBAR_HANDLE_UNCAUGHT_EXCEPTIONS");

        assert!(config.is_enabled());
        assert_eq!(config.environment_name(), "qa");
        assert!(config.handles_uncaught());
    }

    #[test]
    #[serial]
    fn test_environment_defaults_from_app_env() {
        std::env::set_var(APP_ENV_VAR, "production");
        let config = RelayConfig::new();
        std::env::remove_var(APP_ENV_VAR);

        assert_eq!(config.environment_name(), "production");
        assert_eq!(RelayConfig::new().environment_name(), "development");
    }
}
