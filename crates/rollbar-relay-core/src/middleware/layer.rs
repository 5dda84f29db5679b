//! Tower layer that drives the request lifecycle hooks.

use super::host::Shared;
use crate::context::{RequestContext, RequestInfo};
use crate::payload::{ReportedError, ResponseCandidate};
use bytes::Bytes;
use futures_util::future::BoxFuture;
use std::sync::Arc;
use std::task::{Context, Poll};
use tower::Layer;
use tower_service::Service;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Layer produced by [`HttpLifecycle::layer`](super::HttpLifecycle::layer).
///
/// Holds a snapshot of the hooks subscribed at the time it was built.
#[derive(Clone)]
pub struct RelayLayer {
    pub(crate) shared: Arc<Shared>,
}

impl<S> Layer<S> for RelayLayer {
    type Service = RelayService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        RelayService {
            inner,
            shared: self.shared.clone(),
        }
    }
}

/// Service wrapping an HTTP handler with the lifecycle hooks.
///
/// - Cookie state failures fire the request-internal hooks before the
///   handler runs.
/// - Every response fires the pre-response hooks. A response carrying a
///   [`ReportedError`] extension is seen as an error response.
/// - A handler error fires the request-error hooks, then is rendered as a
///   500 boom response. The service itself never fails a call.
#[derive(Clone)]
pub struct RelayService<S> {
    inner: S,
    shared: Arc<Shared>,
}

fn info(context: &Option<RequestContext>) -> Option<&dyn RequestInfo> {
    context.as_ref().map(|c| c as &dyn RequestInfo)
}

impl<S, ReqBody, ResBody> Service<http::Request<ReqBody>> for RelayService<S>
where
    S: Service<http::Request<ReqBody>, Response = http::Response<ResBody>>
        + Clone
        + Send
        + 'static,
    S::Error: Into<BoxError>,
    S::Future: Send + 'static,
    ReqBody: Send + 'static,
    ResBody: From<Bytes> + Send + 'static,
{
    type Response = http::Response<ResBody>;
    type Error = S::Error;
    type Future = BoxFuture<'static, Result<Self::Response, Self::Error>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, req: http::Request<ReqBody>) -> Self::Future {
        // The readied service goes into the future, a fresh clone stays behind
        let clone = self.inner.clone();
        let mut inner = std::mem::replace(&mut self.inner, clone);
        let shared = self.shared.clone();

        let context = RequestContext::from_request(Some(&req));
        for failure in shared.validate_state(req.headers()) {
            tracing::debug!(reason = %failure.reason, "Cookie state rejected");
            shared.request_internal(info(&context), &failure.into_event());
        }

        Box::pin(async move {
            match inner.call(req).await {
                Ok(response) => {
                    let candidate = match response.extensions().get::<ReportedError>() {
                        Some(err) => ResponseCandidate::Error(err.clone()),
                        None => ResponseCandidate::Success {
                            status: response.status().as_u16(),
                        },
                    };
                    shared.pre_response(info(&context), &candidate);
                    Ok(response)
                }
                Err(e) => {
                    let e: BoxError = e.into();
                    let err = ReportedError::from_error(&*e);
                    tracing::debug!(error = %err, "Handler failed");
                    shared.request_error(info(&context), &err);

                    let boom = err.boomify(http::StatusCode::INTERNAL_SERVER_ERROR);
                    shared.pre_response(info(&context), &ResponseCandidate::Error(boom.clone()));
                    Ok(boom.into_response())
                }
            }
        })
    }
}
