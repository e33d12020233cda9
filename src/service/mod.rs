//! # Service Module
//!
//! The outward entry point: [`AppService::handle`] turns `(method, target, raw parameters)`
//! into a rendered [`Response`](crate::render::Response) for the transport layer.
//!
//! ## Request flow
//!
//! 1. Build the [`RequestContext`](crate::request::RequestContext) (parameter merge, format
//!    suffix, `deflate` flag) and run the middleware `before` hooks.
//! 2. Resolve the route; an empty path segment is a 404.
//! 3. Create the handler from the registry; an unregistered identity is a 404.
//! 4. Load the form schema of the canonical URI and, with `validate_forms`, apply it.
//! 5. Dispatch under the [`TransactionOrchestrator`](crate::transaction::TransactionOrchestrator).
//! 6. Classify the outcome, render by format and status, run the `after` hooks.
//!
//! ```rust
//! use bodispatch::config::AppConfig;
//! use bodispatch::dispatcher::StepOutput;
//! use bodispatch::handler::{ActionTable, BusinessObject, Exchange, HandlerError, HandlerRegistry};
//! use bodispatch::request::RawParameters;
//! use bodispatch::routes::HandlerId;
//! use bodispatch::service::AppServiceBuilder;
//! use http::Method;
//! use serde_json::{json, Value};
//!
//! #[derive(Default)]
//! struct Faq;
//!
//! impl Faq {
//!     fn index_get(&mut self, ex: &mut Exchange, _: &[Value]) -> Result<StepOutput, HandlerError> {
//!         ex.set_payload(json!(["Why?"]));
//!         Ok(StepOutput::done())
//!     }
//! }
//!
//! impl BusinessObject for Faq {
//!     fn actions(table: &mut ActionTable<Self>) {
//!         table.on("indexGet", Self::index_get);
//!     }
//! }
//!
//! let mut handlers = HandlerRegistry::new();
//! handlers.register_default::<Faq>(HandlerId::new("/", "Faq"));
//! let service = AppServiceBuilder::new(AppConfig::default())
//!     .handlers(handlers)
//!     .build()
//!     .unwrap();
//!
//! let response = service.handle(Method::GET, "/faq/", RawParameters::default());
//! assert_eq!(response.status, 200);
//! assert_eq!(response.body.as_deref(), Some(r#"["Why?"]"#));
//! ```

mod app;
mod builder;

pub use app::AppService;
pub use builder::AppServiceBuilder;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{AppConfig, DataSourceConfig};
    use crate::middleware::{MetricsMiddleware, Middleware};
    use crate::render::Response;
    use crate::request::{RawParameters, RequestContext};
    use http::Method;
    use std::sync::Arc;

    struct Maintenance;

    impl Middleware for Maintenance {
        fn before(&self, req: &RequestContext) -> Option<Response> {
            (req.path == "/down").then(|| Response::empty(503, req.format.as_str()))
        }
    }

    #[test]
    fn test_unregistered_handler_is_404() {
        let service = AppServiceBuilder::new(AppConfig::default()).build().unwrap();
        let resp = service.handle(Method::GET, "/faq/", RawParameters::default());
        assert_eq!(resp.status, 404);
        assert_eq!(resp.body, None);
        assert_eq!(resp.content_type, "application/json");
    }

    #[test]
    fn test_empty_segment_is_404() {
        let service = AppServiceBuilder::new(AppConfig::default()).build().unwrap();
        let resp = service.handle(Method::GET, "/faq//index", RawParameters::default());
        assert_eq!(resp.status, 404);
    }

    #[test]
    fn test_middleware_short_circuit_still_runs_after_hooks() {
        let metrics = Arc::new(MetricsMiddleware::new());
        let service = AppServiceBuilder::new(AppConfig::default())
            .middleware(Arc::clone(&metrics) as Arc<dyn Middleware>)
            .middleware(Arc::new(Maintenance))
            .build()
            .unwrap();
        let resp = service.handle(Method::GET, "/down,xml", RawParameters::default());
        assert_eq!(resp.status, 503);
        assert_eq!(resp.content_type, "application/xml");
        let resp = service.handle(Method::GET, "/up/", RawParameters::default());
        assert_eq!(resp.status, 404);
        assert_eq!(metrics.request_count(), 2);
        assert_eq!(metrics.status_class_count(5), 1);
        assert_eq!(metrics.status_class_count(4), 1);
    }

    #[test]
    fn test_unknown_connector_kind_fails_build() {
        let mut config = AppConfig::default();
        config
            .data_sources
            .insert("main".into(), DataSourceConfig::new("postgres"));
        let err = AppServiceBuilder::new(config).build().unwrap_err();
        assert!(err.to_string().contains("postgres"));
    }
}
