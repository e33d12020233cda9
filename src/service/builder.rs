use anyhow::Context;
use std::sync::Arc;
use tracing::info;

use super::app::AppService;
use crate::aop::{AopPlanLoader, FileAopLoader, MemoryAopLoader};
use crate::classify::ErrorClassifier;
use crate::config::AppConfig;
use crate::datasource::{Connector, DataSourceRegistry, MemoryConnector};
use crate::dispatcher::DispatchPipeline;
use crate::form::{FieldValidator, FileFormLoader, FormSchemaLoader, MemoryFormLoader};
use crate::handler::HandlerRegistry;
use crate::logging::{ErrorLog, TracingErrorLog};
use crate::middleware::Middleware;
use crate::render::ResponseRenderer;
use crate::router::{RouteResolver, RouteTable};
use crate::transaction::TransactionOrchestrator;

/// Assembles an [`AppService`] from an [`AppConfig`] plus the parts code must supply:
/// handlers, connectors, middleware and optionally replacement loaders.
///
/// Anything not supplied is derived from the configuration: the route table from
/// `routes_file`, file loaders from `aop_dir`/`form_dir`, templates from `view_dir`. The
/// `memory` connector is always available.
pub struct AppServiceBuilder {
    config: AppConfig,
    handlers: HandlerRegistry,
    connectors: Vec<(String, Arc<dyn Connector>)>,
    middleware: Vec<Arc<dyn Middleware>>,
    error_log: Option<Arc<dyn ErrorLog>>,
    forms: Option<Arc<dyn FormSchemaLoader>>,
    plans: Option<Arc<dyn AopPlanLoader>>,
    routes: Option<RouteTable>,
}

impl AppServiceBuilder {
    #[must_use]
    pub fn new(config: AppConfig) -> Self {
        Self {
            config,
            handlers: HandlerRegistry::new(),
            connectors: Vec::new(),
            middleware: Vec::new(),
            error_log: None,
            forms: None,
            plans: None,
            routes: None,
        }
    }

    #[must_use]
    pub fn handlers(mut self, handlers: HandlerRegistry) -> Self {
        self.handlers = handlers;
        self
    }

    /// Register the connector for data sources of `kind`.
    #[must_use]
    pub fn connector(mut self, kind: &str, connector: Arc<dyn Connector>) -> Self {
        self.connectors.push((kind.to_string(), connector));
        self
    }

    #[must_use]
    pub fn middleware(mut self, middleware: Arc<dyn Middleware>) -> Self {
        self.middleware.push(middleware);
        self
    }

    #[must_use]
    pub fn error_log(mut self, log: Arc<dyn ErrorLog>) -> Self {
        self.error_log = Some(log);
        self
    }

    #[must_use]
    pub fn form_loader(mut self, loader: Arc<dyn FormSchemaLoader>) -> Self {
        self.forms = Some(loader);
        self
    }

    #[must_use]
    pub fn aop_loader(mut self, loader: Arc<dyn AopPlanLoader>) -> Self {
        self.plans = Some(loader);
        self
    }

    /// Use `table` instead of loading `routes_file`.
    #[must_use]
    pub fn route_table(mut self, table: RouteTable) -> Self {
        self.routes = Some(table);
        self
    }

    pub fn build(self) -> anyhow::Result<AppService> {
        let config = self.config;

        let table = match (self.routes, &config.routes_file) {
            (Some(table), _) => table,
            (None, Some(path)) => RouteTable::from_file(path)?,
            (None, None) => RouteTable::empty(),
        };
        let resolver = RouteResolver::new(table)
            .with_default(config.default_handler.clone(), &config.default_action);

        let forms: Arc<dyn FormSchemaLoader> = match (self.forms, &config.form_dir) {
            (Some(loader), _) => loader,
            (None, Some(dir)) => {
                Arc::new(FileFormLoader::new(dir).with_capacity(config.loader_cache_size))
            }
            (None, None) => Arc::new(MemoryFormLoader::new()),
        };
        let plans: Arc<dyn AopPlanLoader> = match (self.plans, &config.aop_dir) {
            (Some(loader), _) => loader,
            (None, Some(dir)) => {
                Arc::new(FileAopLoader::new(dir).with_capacity(config.loader_cache_size))
            }
            (None, None) => Arc::new(MemoryAopLoader::new()),
        };

        let mut registry = DataSourceRegistry::new()
            .with_connector(MemoryConnector::KIND, Arc::new(MemoryConnector::new()));
        for (kind, connector) in self.connectors {
            registry = registry.with_connector(&kind, connector);
        }
        let registry = registry.with_sources(&config.data_sources);
        if let Some((name, kind)) = registry.unresolved().into_iter().next() {
            anyhow::bail!("data source '{name}' uses kind '{kind}' but no connector is registered for it");
        }

        let renderer = match &config.view_dir {
            Some(dir) => ResponseRenderer::with_view_dir(dir)
                .with_context(|| format!("failed to load view templates from {}", dir.display()))?,
            None => ResponseRenderer::new(),
        };

        let error_log = self
            .error_log
            .unwrap_or_else(|| Arc::new(TracingErrorLog) as Arc<dyn ErrorLog>);
        let orchestrator = TransactionOrchestrator::new(DispatchPipeline::new(Arc::clone(&plans)));

        info!(
            handlers = self.handlers.len(),
            data_sources = registry.source_names().len(),
            formats = ?renderer.formats(),
            validate_forms = config.validate_forms,
            "Application service built"
        );

        Ok(AppService {
            config,
            resolver,
            handlers: Arc::new(self.handlers),
            forms,
            plans,
            validator: Arc::new(FieldValidator::new()),
            data_sources: Arc::new(registry),
            orchestrator,
            classifier: ErrorClassifier::new(error_log),
            renderer,
            middleware: self.middleware,
        })
    }
}
