use bodispatch::config::AppConfig;
use bodispatch::handler::HandlerRegistry;
use bodispatch::middleware::{MetricsMiddleware, Middleware, TracingMiddleware};
use bodispatch::render::Response;
use bodispatch::request::{RawParameters, RequestContext};
use bodispatch::routes::HandlerId;
use bodispatch::{AppService, AppServiceBuilder};
use http::Method;
use std::sync::{Arc, Mutex};
use std::time::Duration;

mod common;
use common::objects::{Faq, Ledger};

/// Answers `/health` itself and strips compression from every response.
#[derive(Default)]
struct Gate {
    seen: Mutex<Vec<(String, u16)>>,
}

impl Middleware for Gate {
    fn before(&self, req: &RequestContext) -> Option<Response> {
        (req.path == "/health").then(|| Response::empty(204, req.format.as_str()))
    }

    fn after(&self, req: &RequestContext, res: &mut Response, _latency: Duration) {
        res.deflate = false;
        self.seen.lock().unwrap().push((req.path.clone(), res.status));
    }
}

fn service(gate: Arc<Gate>, metrics: Arc<MetricsMiddleware>) -> AppService {
    let mut handlers = HandlerRegistry::new();
    handlers.register_default::<Faq>(HandlerId::new("/", "Faq"));
    handlers.register_default::<Ledger>(HandlerId::new("/", "Ledger"));
    AppServiceBuilder::new(AppConfig::default())
        .handlers(handlers)
        .middleware(Arc::new(TracingMiddleware))
        .middleware(metrics as Arc<dyn Middleware>)
        .middleware(gate as Arc<dyn Middleware>)
        .build()
        .unwrap()
}

#[test]
fn test_hooks_see_every_response() {
    let gate = Arc::new(Gate::default());
    let metrics = Arc::new(MetricsMiddleware::new());
    let svc = service(Arc::clone(&gate), Arc::clone(&metrics));

    let raw = RawParameters::default().with_accept_encoding("deflate");
    let ok = svc.handle(Method::GET, "/faq/", raw.clone());
    assert_eq!(ok.status, 200);
    assert!(!ok.deflate);

    let health = svc.handle(Method::GET, "/health", raw.clone());
    assert_eq!(health.status, 204);
    assert_eq!(health.body, None);

    let denied = svc.handle(Method::GET, "/ledger/denied", raw);
    assert_eq!(denied.status, 403);

    assert_eq!(
        *gate.seen.lock().unwrap(),
        vec![
            ("/faq/".to_string(), 200),
            ("/health".to_string(), 204),
            ("/ledger/denied".to_string(), 403),
        ]
    );
    let snap = metrics.snapshot();
    assert_eq!(snap.requests, 3);
    assert_eq!(snap.by_class, [0, 2, 0, 1, 0]);
}

#[test]
fn test_concurrent_requests_share_one_service() {
    let gate = Arc::new(Gate::default());
    let metrics = Arc::new(MetricsMiddleware::new());
    let svc = Arc::new(service(gate, Arc::clone(&metrics)));

    let threads: Vec<_> = (0..8)
        .map(|i| {
            let svc = Arc::clone(&svc);
            std::thread::spawn(move || {
                let target = format!("/faq/show?id={i}");
                let resp = svc.handle(Method::GET, &target, RawParameters::default());
                assert_eq!(resp.status, 200);
                assert_eq!(resp.body, Some(format!(r#"{{"id":"{i}"}}"#)));
            })
        })
        .collect();
    for t in threads {
        t.join().unwrap();
    }
    assert_eq!(metrics.request_count(), 8);
}
