use std::time::Duration;

use crate::render::Response;
use crate::request::RequestContext;

/// Hook around [`AppService::handle`](crate::service::AppService::handle).
///
/// `before` runs in registration order and may answer the request itself; `after` runs for
/// every response, short-circuited ones included.
pub trait Middleware: Send + Sync {
    fn before(&self, _req: &RequestContext) -> Option<Response> {
        None
    }
    fn after(&self, _req: &RequestContext, _res: &mut Response, _latency: Duration) {}
}
