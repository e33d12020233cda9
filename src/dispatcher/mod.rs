//! # Dispatcher Module
//!
//! Runs a resolved handler for one request.
//!
//! ## Mode selection
//!
//! 1. **Aspect plan** - if the plan loader has a plan for the canonical URI and request
//!    method, its steps run in order. Each step's [`StepOutput`] value is recorded under the
//!    step's method name, and a [`Flow::Break`] skips the remaining steps. A present but empty
//!    plan still counts as handled.
//! 2. **Action** - otherwise the `<action><Method>` method (`createUser` + `POST` →
//!    `createUserPost`) runs without arguments and reports through the exchange's status and
//!    payload.
//! 3. Otherwise the request is not handled ([`Dispatched::NoAction`], 404).
//!
//! Handler errors abort dispatch and propagate to the
//! [`TransactionOrchestrator`](crate::transaction::TransactionOrchestrator).

mod core;

pub use core::{action_method_name, DispatchMode, DispatchPipeline, Dispatched, Flow, StepOutput};

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aop::{AopPlan, AopStep, MemoryAopLoader};
    use crate::datasource::DataSources;
    use crate::handler::{ActionTable, BusinessObject, Exchange, HandlerError, HandlerRegistry};
    use crate::request::{RawParameters, RequestContext};
    use crate::router::{RouteResolver, RouteTable};
    use crate::routes::HandlerId;
    use http::Method;
    use serde_json::{json, Value};
    use std::sync::Arc;

    #[derive(Default)]
    struct User {
        calls: Vec<&'static str>,
    }

    impl User {
        fn validate(&mut self, _: &mut Exchange, _: &[Value]) -> Result<StepOutput, HandlerError> {
            self.calls.push("validate");
            Ok(StepOutput::next(json!("ok")))
        }

        fn save(&mut self, ex: &mut Exchange, args: &[Value]) -> Result<StepOutput, HandlerError> {
            self.calls.push("save");
            ex.set_payload(json!({"saved": args}));
            Ok(StepOutput::stop(json!(args.len())))
        }

        fn notify(&mut self, _: &mut Exchange, _: &[Value]) -> Result<StepOutput, HandlerError> {
            self.calls.push("notify");
            Ok(StepOutput::next(json!(true)))
        }

        fn fail(&mut self, _: &mut Exchange, _: &[Value]) -> Result<StepOutput, HandlerError> {
            Err(HandlerError::conflict("duplicate"))
        }

        fn create_user_post(&mut self, ex: &mut Exchange, _: &[Value]) -> Result<StepOutput, HandlerError> {
            ex.set_status(201);
            Ok(StepOutput::done())
        }
    }

    impl BusinessObject for User {
        fn actions(table: &mut ActionTable<Self>) {
            table
                .on("validate", Self::validate)
                .on("save", Self::save)
                .on("notify", Self::notify)
                .on("fail", Self::fail)
                .on("createUserPost", Self::create_user_post);
        }
    }

    fn exchange(method: Method, path: &str) -> Exchange {
        let route = RouteResolver::new(RouteTable::empty())
            .resolve(&method, path)
            .unwrap()
            .into_route();
        let request = RequestContext::new(method, path, RawParameters::default());
        Exchange::new(request, route, DataSources::default())
    }

    fn handler() -> Box<dyn crate::handler::Handler> {
        let mut registry = HandlerRegistry::new();
        registry.register_default::<User>(HandlerId::new("/", "User"));
        registry.create(&HandlerId::new("/", "User")).unwrap()
    }

    #[test]
    fn test_break_skips_remaining_steps() {
        let plans = MemoryAopLoader::new().with(
            "/user/create",
            &Method::POST,
            AopPlan::new(vec![
                AopStep::new("validate"),
                AopStep::new("save").with_arguments(vec![json!("a"), json!(2)]),
                AopStep::new("notify"),
            ]),
        );
        let pipeline = DispatchPipeline::new(Arc::new(plans));
        let mut h = handler();
        let mut ex = exchange(Method::POST, "/user/create");

        let dispatched = pipeline.run(h.as_mut(), &mut ex).unwrap();
        assert_eq!(
            dispatched,
            Dispatched::Handled(DispatchMode::Aspect {
                planned: 3,
                executed: 2
            })
        );
        let names: Vec<&str> = ex.results().iter().map(|(n, _)| n.as_str()).collect();
        assert_eq!(names, vec!["validate", "save"]);
        assert_eq!(ex.step_result("save"), Some(&json!(2)));
        assert_eq!(ex.payload(), Some(&json!({"saved": ["a", 2]})));
    }

    #[test]
    fn test_empty_plan_counts_as_handled() {
        let plans = MemoryAopLoader::new().with("/user/create", &Method::POST, AopPlan::default());
        let pipeline = DispatchPipeline::new(Arc::new(plans));
        let mut ex = exchange(Method::POST, "/user/create");
        let dispatched = pipeline.run(handler().as_mut(), &mut ex).unwrap();
        assert_eq!(
            dispatched,
            Dispatched::Handled(DispatchMode::Aspect {
                planned: 0,
                executed: 0
            })
        );
    }

    #[test]
    fn test_action_method_when_no_plan() {
        let pipeline = DispatchPipeline::new(Arc::new(MemoryAopLoader::new()));
        let mut ex = exchange(Method::POST, "/user/create-user");
        let dispatched = pipeline.run(handler().as_mut(), &mut ex).unwrap();
        assert_eq!(
            dispatched,
            Dispatched::Handled(DispatchMode::Action {
                method: "createUserPost".into()
            })
        );
        assert_eq!(ex.status(), 201);
    }

    #[test]
    fn test_missing_action_method() {
        let pipeline = DispatchPipeline::new(Arc::new(MemoryAopLoader::new()));
        let mut ex = exchange(Method::GET, "/user/create-user");
        let dispatched = pipeline.run(handler().as_mut(), &mut ex).unwrap();
        assert_eq!(
            dispatched,
            Dispatched::NoAction {
                method: "createUserGet".into()
            }
        );
    }

    #[test]
    fn test_step_error_aborts_plan() {
        let plans = MemoryAopLoader::new().with(
            "/user/create",
            &Method::POST,
            AopPlan::new(vec![AopStep::new("fail"), AopStep::new("notify")]),
        );
        let pipeline = DispatchPipeline::new(Arc::new(plans));
        let mut ex = exchange(Method::POST, "/user/create");
        let err = pipeline.run(handler().as_mut(), &mut ex).unwrap_err();
        assert_eq!(err.code(), 409);
        assert!(ex.results().is_empty());
    }

    #[test]
    fn test_unknown_step_is_technical() {
        let plans = MemoryAopLoader::new().with(
            "/user/create",
            &Method::POST,
            AopPlan::new(vec![AopStep::new("missing")]),
        );
        let pipeline = DispatchPipeline::new(Arc::new(plans));
        let mut ex = exchange(Method::POST, "/user/create");
        let err = pipeline.run(handler().as_mut(), &mut ex).unwrap_err();
        assert_eq!(err.code(), 0);
    }

    #[test]
    fn test_method_name() {
        assert_eq!(action_method_name("createUser", &Method::POST), "createUserPost");
        assert_eq!(action_method_name("index", &Method::GET), "indexGet");
        assert_eq!(action_method_name("index", &Method::DELETE), "indexDelete");
    }
}
