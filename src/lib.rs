//! # bodispatch
//!
//! **bodispatch** is the request-dispatch core of a business-object web framework: it turns an
//! HTTP method and path into a handler, runs the handler's action (optionally as an ordered
//! aspect plan) inside per-request data-source transactions, classifies the result and renders
//! it in the requested format.
//!
//! ## Overview
//!
//! The HTTP transport is not part of this crate. A server hands each request to
//! [`service::AppService::handle`] and writes back the returned [`render::Response`].
//!
//! ## Architecture
//!
//! - **[`request`]** - Request context: parameter merge, `,format` suffix, request ids
//! - **[`routes`]** - Route descriptors and the route file format (YAML, JSON, TOML)
//! - **[`router`]** - Hybrid resolver: static table, segment trie with arity matching, naming convention
//! - **[`handler`]** - Business objects, action tables, the handler registry and [`handler::Exchange`]
//! - **[`form`]** - Field schemas, the field validator and schema loaders
//! - **[`aop`]** - Aspect plans: ordered step lists per canonical URI and method
//! - **[`dispatcher`]** - Aspect or action dispatch with early break
//! - **[`datasource`]** - Lazily opened, transactional data-source handles
//! - **[`transaction`]** - Commit, rollback and close around one dispatch
//! - **[`classify`]** - Outcome to status/body mapping and technical error logging
//! - **[`render`]** - Format-specific body templates, content types and reason phrases
//! - **[`middleware`]** - Tracing and metrics hooks around each request
//! - **[`hot_reload`]** - Route file watching with atomic table swaps
//! - **[`config`]**, **[`logging`]**, **[`cli`]** - Process setup and tooling
//!
//! ### Request Handling Flow
//!
//! ```mermaid
//! sequenceDiagram
//!     participant Server as HTTP transport
//!     participant Service as AppService
//!     participant Router as RouteResolver
//!     participant Registry as HandlerRegistry
//!     participant Tx as TransactionOrchestrator
//!     participant Pipeline as DispatchPipeline
//!     participant Classifier as ErrorClassifier
//!     participant Renderer as ResponseRenderer
//!
//!     Server->>Service: handle(GET, "/account/user/5,xml", raw)
//!     Service->>Router: resolve(GET, "/account/user/5")
//!     Router-->>Service: /account/User::show {id: "5"}
//!     Service->>Registry: create(/account/User)
//!     alt Not registered
//!         Service-->>Server: 404
//!     end
//!     Service->>Tx: execute(handler, exchange)
//!     Tx->>Pipeline: run
//!     Pipeline->>Pipeline: aspect steps or showGet
//!     alt Success
//!         Tx->>Tx: commit all, close all
//!     else Error or panic
//!         Tx->>Tx: rollback all, close all
//!     end
//!     Tx-->>Service: Outcome
//!     Service->>Classifier: classify(outcome)
//!     Classifier-->>Service: status + body
//!     Service->>Renderer: render(xml, status, body)
//!     Renderer-->>Server: Response
//! ```
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use bodispatch::config::load_config;
//! use bodispatch::handler::HandlerRegistry;
//! use bodispatch::service::AppServiceBuilder;
//!
//! let mut handlers = HandlerRegistry::new();
//! handlers.register_default::<Faq>(HandlerId::new("/", "Faq"));
//!
//! let service = AppServiceBuilder::new(load_config("app.yaml")?)
//!     .handlers(handlers)
//!     .build()?;
//! let response = service.handle(Method::GET, "/faq/", RawParameters::default());
//! ```

pub mod aop;
pub mod cache;
pub mod classify;
pub mod cli;
pub mod config;
pub mod datasource;
pub mod dispatcher;
pub mod form;
pub mod handler;
pub mod hot_reload;
pub mod ids;
pub mod logging;
pub mod middleware;
pub mod render;
pub mod request;
pub mod router;
pub mod routes;
pub mod service;
pub mod transaction;

pub use config::{load_config, AppConfig};
pub use ids::RequestId;
pub use render::Response;
pub use service::{AppService, AppServiceBuilder};
