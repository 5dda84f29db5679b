//! Tower integration.
//!
//! [`HttpLifecycle`] is a [`LifecycleEventSource`](crate::LifecycleEventSource)
//! for plain tower HTTP services, and [`RelayLayer`] is the layer it hands out.

mod host;
mod layer;
mod state;

pub use host::HttpLifecycle;
pub use layer::{RelayLayer, RelayService};
pub use state::CookieEncoding;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::{ClientOptions, ReportCallback, ReportClient};
    use crate::config::RelayConfig;
    use crate::context::MatchedRoute;
    use crate::event::{ClassifiedEvent, EventKind, LogEvent, TAG_ROLLBAR_ERROR};
    use crate::lifecycle::RollbarPlugin;
    use crate::payload::{Payload, ReportedError};
    use bytes::Bytes;
    use http::{Request, Response, StatusCode};
    use http_body_util::Full;
    use std::convert::Infallible;
    use std::sync::{Arc, Mutex};
    use tower::{service_fn, Layer, ServiceExt};

    #[derive(Default)]
    struct Recorder {
        events: Mutex<Vec<ClassifiedEvent>>,
    }

    impl Recorder {
        fn events(&self) -> Vec<ClassifiedEvent> {
            self.events.lock().unwrap().clone()
        }
    }

    impl ReportClient for Recorder {
        fn report(&self, event: ClassifiedEvent, _callback: ReportCallback) {
            self.events.lock().unwrap().push(event);
        }

        fn is_enabled(&self) -> bool {
            true
        }
    }

    fn setup(config: RelayConfig, lifecycle: HttpLifecycle) -> (HttpLifecycle, Arc<Recorder>) {
        let mut lifecycle = lifecycle;
        let recorder = Arc::new(Recorder::default());
        let client = recorder.clone();
        RollbarPlugin::new(config).register(
            &mut lifecycle,
            move |_: &ClientOptions| -> Arc<dyn ReportClient> { client },
        );
        (lifecycle, recorder)
    }

    fn enabled() -> RelayConfig {
        RelayConfig::new().access_token("abc")
    }

    async fn ok(_req: Request<Full<Bytes>>) -> Result<Response<Full<Bytes>>, Infallible> {
        Ok(Response::new(Full::from("ok")))
    }

    async fn not_found(_req: Request<Full<Bytes>>) -> Result<Response<Full<Bytes>>, Infallible> {
        Ok(ReportedError::not_found("Not Found").into_http_response())
    }

    async fn fails(_req: Request<Full<Bytes>>) -> Result<Response<Full<Bytes>>, std::io::Error> {
        Err(std::io::Error::new(std::io::ErrorKind::Other, "disk on fire"))
    }

    fn get(path: &str) -> Request<Full<Bytes>> {
        Request::get(path).body(Full::new(Bytes::new())).unwrap()
    }

    #[tokio::test]
    async fn test_success_is_not_reported() {
        let (lifecycle, recorder) = setup(enabled(), HttpLifecycle::new());
        let svc = lifecycle.layer().layer(service_fn(ok));

        let response = svc.oneshot(get("/")).await.unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert!(recorder.events().is_empty());
    }

    #[tokio::test]
    async fn test_boom_response_is_reported_with_context() {
        let (lifecycle, recorder) = setup(enabled(), HttpLifecycle::new());
        let svc = lifecycle.layer().layer(service_fn(not_found));

        let mut req = get("/missing?x=1");
        req.extensions_mut().insert(MatchedRoute::new("/missing"));
        let response = svc.oneshot(req).await.unwrap();

        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        let events = recorder.events();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].kind, EventKind::Error);
        assert!(events[0].payload.is_boom());
        assert_eq!(events[0].extra.as_ref().unwrap()["statusCode"], 404);

        let context = events[0].context.as_ref().unwrap();
        assert_eq!(context.url, "/missing");
        assert_eq!(context.method, "GET");
        assert_eq!(context.route.path.as_deref(), Some("/missing"));
    }

    #[tokio::test]
    async fn test_handler_error_becomes_500() {
        let (lifecycle, recorder) = setup(enabled(), HttpLifecycle::new());
        let svc = lifecycle.layer().layer(service_fn(fails));

        let response = svc.oneshot(get("/")).await.unwrap();

        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let events = recorder.events();
        assert_eq!(events.len(), 2);
        assert!(events.iter().all(|e| e.kind == EventKind::Error));
        assert_eq!(events.iter().filter(|e| e.payload.is_boom()).count(), 1);
        assert_eq!(
            events[0].payload.as_error().unwrap().message,
            "disk on fire"
        );
    }

    #[tokio::test]
    async fn test_malformed_cookie_warns() {
        let lifecycle = HttpLifecycle::new().declare_cookie("session", CookieEncoding::Base64Json);
        let (lifecycle, recorder) = setup(enabled(), lifecycle);
        let svc = lifecycle.layer().layer(service_fn(ok));

        let req = Request::get("/")
            .header(
                "cookie",
                "PHPSESSID=298zf09hf012fh2; session=u32t4o3tb3gg43; _gat=1;",
            )
            .body(Full::new(Bytes::new()))
            .unwrap();
        let response = svc.oneshot(req).await.unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let events = recorder.events();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].kind, EventKind::Warning);
        assert!(matches!(events[0].payload, Payload::Text(_)));
    }

    #[tokio::test]
    async fn test_disabled_relay_reports_nothing() {
        let lifecycle = HttpLifecycle::new().declare_cookie("session", CookieEncoding::Base64Json);
        let (lifecycle, recorder) = setup(RelayConfig::new(), lifecycle);

        let svc = lifecycle.layer().layer(service_fn(fails));
        svc.oneshot(get("/")).await.unwrap();
        let svc = lifecycle.layer().layer(service_fn(not_found));
        svc.oneshot(get("/")).await.unwrap();

        assert!(recorder.events().is_empty());
    }

    #[test]
    fn test_emit_log_and_stop() {
        let (lifecycle, recorder) = setup(enabled(), HttpLifecycle::new());
        let relay = lifecycle.exposed(RollbarPlugin::NAME).unwrap();
        assert!(relay.is_enabled());

        let event =
            LogEvent::new(&[TAG_ROLLBAR_ERROR][..]).with_error(ReportedError::new("logged"));
        lifecycle.emit_log(&event, None);
        lifecycle.stop();
        lifecycle.stop();
        lifecycle.emit_log(&event, None);

        assert_eq!(recorder.events().len(), 1);
    }
}
