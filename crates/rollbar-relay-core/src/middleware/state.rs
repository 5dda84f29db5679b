//! Cookie state validation.
//!
//! Every `Cookie` header is parsed before the request reaches the handler.
//! A header that does not parse, or a declared cookie whose value does not
//! decode, produces an [`InternalEvent`] tagged `state` and `error`.

use crate::event::{InternalEvent, TAG_ERROR, TAG_STATE};
use base64::engine::general_purpose::{STANDARD, URL_SAFE_NO_PAD};
use base64::Engine;
use cookie::Cookie;
use http::header::COOKIE;
use http::HeaderMap;
use serde_json::json;

/// How the value of a declared cookie is encoded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CookieEncoding {
    /// Opaque value, only the header syntax is checked
    #[default]
    Plain,
    /// Base64 bytes
    Base64,
    /// Base64-encoded JSON document
    Base64Json,
}

#[derive(Debug, Clone)]
pub(crate) struct CookieDefinition {
    pub(crate) name: String,
    pub(crate) encoding: CookieEncoding,
}

/// A cookie that failed validation.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct StateFailure {
    pub(crate) name: Option<String>,
    pub(crate) reason: String,
}

impl StateFailure {
    pub(crate) fn into_event(self) -> InternalEvent {
        InternalEvent::new(
            &[TAG_STATE, TAG_ERROR][..],
            json!({
                "name": self.name,
                "reason": self.reason,
            }),
        )
    }
}

fn decode(value: &str) -> Result<Vec<u8>, base64::DecodeError> {
    STANDARD
        .decode(value)
        .or_else(|_| URL_SAFE_NO_PAD.decode(value))
}

fn check_value(encoding: CookieEncoding, value: &str) -> Result<(), String> {
    match encoding {
        CookieEncoding::Plain => Ok(()),
        CookieEncoding::Base64 => decode(value).map(|_| ()).map_err(|e| e.to_string()),
        CookieEncoding::Base64Json => {
            let bytes = decode(value).map_err(|e| e.to_string())?;
            serde_json::from_slice::<serde_json::Value>(&bytes)
                .map(|_| ())
                .map_err(|e| format!("Invalid JSON: {e}"))
        }
    }
}

/// Validate the `Cookie` headers of a request against the declared cookies.
pub(crate) fn validate(definitions: &[CookieDefinition], headers: &HeaderMap) -> Vec<StateFailure> {
    let mut failures = Vec::new();

    for header in headers.get_all(COOKIE) {
        let raw = match header.to_str() {
            Ok(raw) => raw,
            Err(e) => {
                failures.push(StateFailure {
                    name: None,
                    reason: format!("Invalid cookie header: {e}"),
                });
                continue;
            }
        };

        for parsed in Cookie::split_parse(raw) {
            let cookie = match parsed {
                Ok(cookie) => cookie,
                Err(e) => {
                    failures.push(StateFailure {
                        name: None,
                        reason: format!("Invalid cookie header: {e}"),
                    });
                    continue;
                }
            };

            let name = cookie.name().trim();
            let Some(definition) = definitions.iter().find(|d| d.name == name) else {
                continue;
            };

            if let Err(reason) = check_value(definition.encoding, cookie.value().trim()) {
                failures.push(StateFailure {
                    name: Some(definition.name.clone()),
                    reason: format!("Invalid cookie value: {reason}"),
                });
            }
        }
    }

    failures
}

#[cfg(test)]
mod tests {
    use super::*;
    use http::HeaderValue;

    fn session(encoding: CookieEncoding) -> Vec<CookieDefinition> {
        vec![CookieDefinition {
            name: "session".to_string(),
            encoding,
        }]
    }

    fn headers(value: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(COOKIE, HeaderValue::from_str(value).unwrap());
        headers
    }

    #[test]
    fn test_undecodable_json_cookie_fails() {
        let failures = validate(
            &session(CookieEncoding::Base64Json),
            &headers("PHPSESSID=298zf09hf012fh2; session=u32t4o3tb3gg43; _gat=1;"),
        );

        assert_eq!(failures.len(), 1);
        assert_eq!(failures[0].name.as_deref(), Some("session"));

        let event = failures[0].clone().into_event();
        assert!(event.is_state_error());
        assert_eq!(event.data["name"], "session");
    }

    #[test]
    fn test_valid_json_cookie_passes() {
        let value = STANDARD.encode(br#"{"user":42}"#);
        let failures = validate(
            &session(CookieEncoding::Base64Json),
            &headers(&format!("session={value}")),
        );
        assert!(failures.is_empty());
    }

    #[test]
    fn test_undeclared_cookies_are_not_decoded() {
        let failures = validate(&[], &headers("session=u32t4o3tb3gg43; _gat=1"));
        assert!(failures.is_empty());
    }

    #[test]
    fn test_plain_cookie_only_checks_syntax() {
        let failures = validate(
            &session(CookieEncoding::Plain),
            &headers("session=u32t4o3tb3gg43"),
        );
        assert!(failures.is_empty());
    }

    #[test]
    fn test_nameless_pair_is_a_header_failure() {
        let failures = validate(&[], &headers("=novalue"));

        assert_eq!(failures.len(), 1);
        assert!(failures[0].name.is_none());
        assert!(failures[0].reason.starts_with("Invalid cookie header"));
    }
}
