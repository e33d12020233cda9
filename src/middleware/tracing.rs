use std::time::Duration;

use tracing::{debug, info, warn};

use super::Middleware;
use crate::render::Response;
use crate::request::RequestContext;

/// Logs one event when a request starts and one when its response is ready.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingMiddleware;

impl Middleware for TracingMiddleware {
    fn before(&self, req: &RequestContext) -> Option<Response> {
        debug!(
            request_id = %req.request_id,
            method = %req.method,
            path = %req.path,
            format = %req.format,
            "Request started"
        );
        None
    }

    fn after(&self, req: &RequestContext, res: &mut Response, latency: Duration) {
        let duration_us = latency.as_micros() as u64;
        if res.status >= 500 {
            warn!(
                request_id = %req.request_id,
                method = %req.method,
                path = %req.path,
                status = res.status,
                duration_us,
                "Request failed"
            );
        } else {
            info!(
                request_id = %req.request_id,
                method = %req.method,
                path = %req.path,
                status = res.status,
                duration_us,
                "Request completed"
            );
        }
    }
}
