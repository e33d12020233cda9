use http::Method;
use std::fmt;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info};

use crate::aop::AopPlanLoader;
use crate::classify::{Classified, ErrorClassifier, Outcome};
use crate::config::AppConfig;
use crate::datasource::{DataSourceRegistry, DataSources};
use crate::form::{FieldValidator, FormSchemaLoader};
use crate::handler::{Exchange, HandlerError, HandlerRegistry};
use crate::middleware::Middleware;
use crate::render::{Response, ResponseRenderer};
use crate::request::{RawParameters, RequestContext};
use crate::router::RouteResolver;
use crate::transaction::TransactionOrchestrator;

/// The dispatch core behind one application.
///
/// Built once by [`AppServiceBuilder`](super::AppServiceBuilder) and shared by reference; every
/// call to [`handle`](AppService::handle) is independent and request-local.
pub struct AppService {
    pub(super) config: AppConfig,
    pub(super) resolver: RouteResolver,
    pub(super) handlers: Arc<HandlerRegistry>,
    pub(super) forms: Arc<dyn FormSchemaLoader>,
    pub(super) plans: Arc<dyn AopPlanLoader>,
    pub(super) validator: Arc<FieldValidator>,
    pub(super) data_sources: Arc<DataSourceRegistry>,
    pub(super) orchestrator: TransactionOrchestrator,
    pub(super) classifier: ErrorClassifier,
    pub(super) renderer: ResponseRenderer,
    pub(super) middleware: Vec<Arc<dyn Middleware>>,
}

impl fmt::Debug for AppService {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AppService")
            .field("handlers", &self.handlers)
            .field("data_sources", &self.data_sources)
            .field("middleware", &self.middleware.len())
            .finish_non_exhaustive()
    }
}

impl AppService {
    /// Handle one request: `target` is the request path with optional `,format` suffix and
    /// query string.
    pub fn handle(&self, method: Method, target: &str, raw: RawParameters) -> Response {
        let start = Instant::now();
        let request = RequestContext::new(method, target, raw);

        for (i, mw) in self.middleware.iter().enumerate() {
            if let Some(mut response) = mw.before(&request) {
                debug!(request_id = %request.request_id, middleware = i, "Request answered by middleware");
                self.run_after(&request, &mut response, start);
                return response;
            }
        }

        let format = request.format.clone();
        let accept_deflate = request.accept_encoding;
        let (request, classified) = self.process(request);
        let mut response = self.renderer.render(
            &format,
            classified.status,
            classified.body.as_ref(),
            accept_deflate,
        );
        self.run_after(&request, &mut response, start);
        response
    }

    fn run_after(&self, request: &RequestContext, response: &mut Response, start: Instant) {
        let latency = start.elapsed();
        for mw in &self.middleware {
            mw.after(request, response, latency);
        }
    }

    /// Resolve, create, dispatch and classify. Hands the request back for the `after` hooks.
    fn process(&self, request: RequestContext) -> (RequestContext, Classified) {
        let request_id = request.request_id;

        let route = match self.resolver.resolve(&request.method, &request.path) {
            Ok(resolution) => resolution.into_route(),
            Err(e) => {
                let classified = self.classifier.classify(request_id, Outcome::routing_miss(e.to_string()));
                return (request, classified);
            }
        };

        let Some(mut handler) = self.handlers.create(&route.handler) else {
            let reason = format!("no handler registered as {}", route.handler);
            return (request, self.classifier.classify(request_id, Outcome::routing_miss(reason)));
        };
        info!(
            request_id = %request_id,
            handler = %route.handler,
            action = %route.action,
            uri = %route.uri,
            "Handler created"
        );

        let form = match self.forms.load(&route.uri, &request.method) {
            Ok(form) => form,
            Err(e) => {
                let outcome = Outcome::Failure {
                    error: HandlerError::from(e.context(format!("form schema for {}", route.uri))),
                    handler_status: 200,
                };
                return (request, self.classifier.classify(request_id, outcome));
            }
        };

        let mut exchange = Exchange::new(
            request,
            route,
            DataSources::new(Arc::clone(&self.data_sources)),
        )
        .with_form(form, Arc::clone(&self.validator));

        let outcome = match self.precheck(&mut exchange) {
            Err(error) => Outcome::Failure {
                error,
                handler_status: exchange.status(),
            },
            Ok(()) => self.orchestrator.execute(handler.as_mut(), &mut exchange),
        };

        let (request, ..) = exchange.into_parts();
        (request, self.classifier.classify(request_id, outcome))
    }

    fn precheck(&self, exchange: &mut Exchange) -> Result<(), HandlerError> {
        if self.config.validate_forms {
            exchange.check_parameters()?;
        }
        Ok(())
    }

    #[must_use]
    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    #[must_use]
    pub fn resolver(&self) -> &RouteResolver {
        &self.resolver
    }

    #[must_use]
    pub fn handlers(&self) -> &HandlerRegistry {
        &self.handlers
    }

    #[must_use]
    pub fn renderer(&self) -> &ResponseRenderer {
        &self.renderer
    }

    /// Forget cached form schemas and aspect plans.
    pub fn clear_caches(&self) {
        self.forms.clear_cache();
        self.plans.clear_cache();
    }

    /// Watch the configured route file; the table is swapped and loader caches are cleared
    /// on change. `None` when no route file is configured.
    pub fn watch_routes(&self) -> anyhow::Result<Option<notify::RecommendedWatcher>> {
        let Some(path) = self.config.routes_file.as_ref() else {
            return Ok(None);
        };
        let forms = Arc::clone(&self.forms);
        let plans = Arc::clone(&self.plans);
        let watcher = crate::hot_reload::watch_routes(path, self.resolver.table_handle(), move |_| {
            forms.clear_cache();
            plans.clear_cache();
        })?;
        Ok(Some(watcher))
    }
}
