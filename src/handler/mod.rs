//! # Handler Module
//!
//! Business-object handlers and the registry that instantiates them.
//!
//! ## Overview
//!
//! A business object is ordinary Rust state implementing [`BusinessObject`]. Instead of looking
//! methods up by name at runtime, each type publishes an [`ActionTable`] mapping method names to
//! function pointers once, when it is registered:
//!
//! - `<action><Method>` entries (`createUserPost`, `indexGet`) serve single-action dispatch;
//! - any other name can be referenced by an aspect plan step.
//!
//! [`HandlerRegistry`] maps a [`HandlerId`](crate::routes::HandlerId) to a constructor and plays
//! the role of the handler factory: an identity with no registration is a 404.
//!
//! Every method receives the request's [`Exchange`]: merged parameters, canonical URI, form
//! schema, lazily opened data sources, and the status/payload outputs. Failures are
//! [`HandlerError`]s carrying an intrinsic code.

mod error;
mod exchange;
mod registry;

pub use error::HandlerError;
pub use exchange::Exchange;
pub use registry::{ActionFn, ActionTable, BusinessObject, Handler, HandlerRegistry};

#[cfg(test)]
mod tests {
    use super::*;
    use crate::datasource::DataSources;
    use crate::dispatcher::StepOutput;
    use crate::request::{RawParameters, RequestContext};
    use crate::router::{RouteResolver, RouteTable};
    use crate::routes::HandlerId;
    use http::Method;
    use serde_json::{json, Value};

    struct Counter {
        start: i64,
    }

    impl Counter {
        fn index_get(&mut self, ex: &mut Exchange, _: &[Value]) -> Result<StepOutput, HandlerError> {
            self.start += 1;
            ex.set_payload(json!(self.start));
            Ok(StepOutput::done())
        }

        fn add(&mut self, _: &mut Exchange, args: &[Value]) -> Result<StepOutput, HandlerError> {
            let n = args.first().and_then(Value::as_i64).unwrap_or(1);
            self.start += n;
            Ok(StepOutput::next(json!(self.start)))
        }
    }

    impl BusinessObject for Counter {
        fn actions(table: &mut ActionTable<Self>) {
            table.on("indexGet", Self::index_get).on("add", Self::add);
        }
    }

    fn exchange(path: &str) -> Exchange {
        let resolver = RouteResolver::new(RouteTable::empty());
        let route = resolver.resolve(&Method::GET, path).unwrap().into_route();
        let request = RequestContext::new(Method::GET, path, RawParameters::default());
        Exchange::new(request, route, DataSources::default())
    }

    #[test]
    fn test_registry_creates_fresh_instances() {
        let mut registry = HandlerRegistry::new();
        registry.register(HandlerId::new("/", "Counter"), || Counter { start: 10 });
        assert!(registry.contains(&HandlerId::new("/", "Counter")));
        assert!(registry.create(&HandlerId::new("/", "Missing")).is_none());

        let mut handler = registry.create(&HandlerId::new("/", "Counter")).unwrap();
        assert_eq!(handler.methods(), vec!["add", "indexGet"]);
        assert!(handler.has_method("indexGet"));
        assert!(!handler.has_method("indexPost"));

        let mut ex = exchange("/counter/");
        handler.call("indexGet", &mut ex, &[]).unwrap().unwrap();
        assert_eq!(ex.payload(), Some(&json!(11)));

        let out = handler.call("add", &mut ex, &[json!(5)]).unwrap().unwrap();
        assert_eq!(out.value, json!(16));
        assert!(handler.call("nope", &mut ex, &[]).is_none());

        // each create starts from the constructor again
        let mut again = registry.create(&HandlerId::new("/", "Counter")).unwrap();
        let out = again.call("add", &mut ex, &[]).unwrap().unwrap();
        assert_eq!(out.value, json!(11));
    }

    #[test]
    fn test_exchange_merges_route_parameters() {
        let mut b = RouteTable::builder();
        b.add_dynamic(
            Method::GET,
            "/user",
            crate::routes::RouteDescriptor::new(HandlerId::new("/", "User"), "show")
                .with_parameters(["id"]),
        )
        .unwrap();
        let route = RouteResolver::new(b.build())
            .resolve(&Method::GET, "/user/7")
            .unwrap()
            .into_route();
        let request = RequestContext::new(Method::GET, "/user/7?id=1&x=2", RawParameters::default());
        let ex = Exchange::new(request, route, DataSources::default());
        assert_eq!(ex.param_str("id"), Some("7"));
        assert_eq!(ex.param_str("x"), Some("2"));
        assert_eq!(ex.uri(), "/user");
        assert_eq!(ex.status(), 200);
    }

    #[test]
    fn test_step_results_keyed_by_method() {
        let mut ex = exchange("/a/b");
        ex.record_result("load", json!(1));
        ex.record_result("save", json!(2));
        ex.record_result("load", json!(3));
        assert_eq!(ex.results().len(), 2);
        assert_eq!(ex.step_result("load"), Some(&json!(3)));
        assert_eq!(ex.results()[0].0, "load");
    }

    #[test]
    fn test_check_parameters_without_schema_is_noop() {
        let mut ex = exchange("/a/b");
        assert!(ex.check_parameters().is_ok());
    }
}
