//! Cross-cutting request hooks.
//!
//! A [`Middleware`] sees the request context before resolution and the rendered response
//! afterwards. [`TracingMiddleware`] logs request start and completion; [`MetricsMiddleware`]
//! counts requests, latency and responses per status class.

mod core;
mod metrics;
mod tracing;

pub use core::Middleware;
pub use metrics::{MetricsMiddleware, MetricsSnapshot};
pub use tracing::TracingMiddleware;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::Response;
    use crate::request::{RawParameters, RequestContext};
    use http::Method;
    use std::time::Duration;

    #[test]
    fn test_metrics_count_by_status_class() {
        let m = MetricsMiddleware::new();
        let req = RequestContext::new(Method::GET, "/faq/", RawParameters::default());
        for (status, micros) in [(200, 10), (404, 20), (500, 30), (412, 40)] {
            assert!(m.before(&req).is_none());
            let mut res = Response::empty(status, "json");
            m.after(&req, &mut res, Duration::from_micros(micros));
        }
        assert_eq!(m.request_count(), 4);
        assert_eq!(m.status_class_count(2), 1);
        assert_eq!(m.status_class_count(4), 2);
        assert_eq!(m.status_class_count(5), 1);
        assert_eq!(m.status_class_count(9), 0);
        assert_eq!(m.average_latency(), Duration::from_micros(25));
        let snap = m.snapshot();
        assert_eq!(snap.by_class, [0, 1, 0, 2, 1]);
        assert_eq!(snap.average_latency_us, 25);
    }

    #[test]
    fn test_average_latency_starts_at_zero() {
        assert_eq!(MetricsMiddleware::new().average_latency(), Duration::ZERO);
    }

    #[test]
    fn test_tracing_never_short_circuits() {
        let req = RequestContext::new(Method::POST, "/user/create", RawParameters::default());
        let mw = TracingMiddleware;
        assert!(mw.before(&req).is_none());
        let mut res = Response::empty(503, "json");
        mw.after(&req, &mut res, Duration::from_millis(1));
        assert_eq!(res.status, 503);
    }
}
