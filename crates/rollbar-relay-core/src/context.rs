//! Request normalization.
//!
//! Every report that belongs to a request carries a [`RequestContext`], a flat
//! snapshot of the request taken once when the event is classified. Hosts
//! expose their request type through [`RequestInfo`].

use http::request::Parts;
use http::{Extensions, HeaderMap, Method, Uri};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::net::{IpAddr, SocketAddr};

/// Peer address of the connection, stored in request extensions by the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RemoteAddr(pub SocketAddr);

/// Route pattern the request was matched against, stored in request
/// extensions by the host router.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MatchedRoute(pub String);

impl MatchedRoute {
    pub fn new(path: impl Into<String>) -> Self {
        Self(path.into())
    }
}

/// Read access to the parts of a request that go into a report.
pub trait RequestInfo {
    /// Client address
    fn remote_address(&self) -> Option<String>;

    /// Request headers, by lowercase name
    fn headers(&self) -> BTreeMap<String, String>;

    /// Path of the request URL
    fn url_path(&self) -> &str;

    /// HTTP method
    fn method(&self) -> &str;

    /// Transport protocol, e.g. `http` or `https`
    fn protocol(&self) -> &str;

    /// Matched route pattern
    fn route_path(&self) -> Option<&str>;
}

/// Matched route as reported.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RouteInfo {
    pub path: Option<String>,
}

/// Normalized request metadata attached to a report.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestContext {
    pub ip: Option<String>,
    pub headers: BTreeMap<String, String>,
    pub url: String,
    pub method: String,
    pub protocol: String,
    pub route: RouteInfo,
}

impl RequestContext {
    /// Normalize a host request.
    ///
    /// An absent request yields no context; the report still goes out without
    /// one.
    pub fn from_request(request: Option<&dyn RequestInfo>) -> Option<Self> {
        let request = request?;
        Some(Self {
            ip: request.remote_address(),
            headers: request.headers(),
            url: request.url_path().to_string(),
            method: request.method().to_string(),
            protocol: request.protocol().to_string(),
            route: RouteInfo {
                path: request.route_path().map(str::to_string),
            },
        })
    }
}

impl RequestInfo for RequestContext {
    fn remote_address(&self) -> Option<String> {
        self.ip.clone()
    }

    fn headers(&self) -> BTreeMap<String, String> {
        self.headers.clone()
    }

    fn url_path(&self) -> &str {
        &self.url
    }

    fn method(&self) -> &str {
        &self.method
    }

    fn protocol(&self) -> &str {
        &self.protocol
    }

    fn route_path(&self) -> Option<&str> {
        self.route.path.as_deref()
    }
}

fn remote_address(extensions: &Extensions, headers: &HeaderMap) -> Option<String> {
    if let Some(RemoteAddr(addr)) = extensions.get::<RemoteAddr>() {
        return Some(addr.ip().to_string());
    }

    // Behind a proxy the first forwarded hop is the client
    headers
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .map(str::trim)
        .filter(|ip| ip.parse::<IpAddr>().is_ok())
        .map(str::to_string)
}

fn header_map(headers: &HeaderMap) -> BTreeMap<String, String> {
    headers
        .iter()
        .filter_map(|(name, value)| {
            value
                .to_str()
                .ok()
                .map(|v| (name.as_str().to_string(), v.to_string()))
        })
        .collect()
}

fn protocol(uri: &Uri) -> &str {
    uri.scheme_str().unwrap_or("http")
}

fn route_path(extensions: &Extensions) -> Option<&str> {
    extensions.get::<MatchedRoute>().map(|r| r.0.as_str())
}

impl<B> RequestInfo for http::Request<B> {
    fn remote_address(&self) -> Option<String> {
        remote_address(self.extensions(), self.headers())
    }

    fn headers(&self) -> BTreeMap<String, String> {
        header_map(self.headers())
    }

    fn url_path(&self) -> &str {
        self.uri().path()
    }

    fn method(&self) -> &str {
        Method::as_str(self.method())
    }

    fn protocol(&self) -> &str {
        protocol(self.uri())
    }

    fn route_path(&self) -> Option<&str> {
        route_path(self.extensions())
    }
}

impl RequestInfo for Parts {
    fn remote_address(&self) -> Option<String> {
        remote_address(&self.extensions, &self.headers)
    }

    fn headers(&self) -> BTreeMap<String, String> {
        header_map(&self.headers)
    }

    fn url_path(&self) -> &str {
        self.uri.path()
    }

    fn method(&self) -> &str {
        self.method.as_str()
    }

    fn protocol(&self) -> &str {
        protocol(&self.uri)
    }

    fn route_path(&self) -> Option<&str> {
        route_path(&self.extensions)
    }
}
