//! Dispatch pipeline - chooses between aspect-plan execution and single-action execution.

use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info};

use crate::aop::AopPlanLoader;
use crate::handler::{Exchange, Handler, HandlerError};
use crate::router::upper_camel;

/// Whether an aspect plan keeps going after a step.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Flow {
    #[default]
    Continue,
    Break,
}

/// Return value of a handler method plus its control signal.
#[derive(Debug, Clone, PartialEq)]
pub struct StepOutput {
    pub value: Value,
    pub flow: Flow,
}

impl StepOutput {
    /// Continue with the next step, recording `value`.
    #[must_use]
    pub fn next(value: Value) -> Self {
        Self {
            value,
            flow: Flow::Continue,
        }
    }

    /// Record `value` and skip the remaining steps.
    #[must_use]
    pub fn stop(value: Value) -> Self {
        Self {
            value,
            flow: Flow::Break,
        }
    }

    /// Nothing to record; continue.
    #[must_use]
    pub fn done() -> Self {
        Self::next(Value::Null)
    }
}

/// How a request was handled.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum DispatchMode {
    /// An aspect plan ran `executed` of its `planned` steps
    Aspect { planned: usize, executed: usize },
    /// The `<action><Method>` method ran
    Action { method: String },
}

/// Result of [`DispatchPipeline::run`] when no handler error was raised.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Dispatched {
    Handled(DispatchMode),
    /// Neither a plan nor the `<action><Method>` method exists (404)
    NoAction { method: String },
}

/// Name of the single-action method: `createUser` + `POST` → `createUserPost`.
#[must_use]
pub fn action_method_name(action: &str, method: &http::Method) -> String {
    format!("{action}{}", upper_camel(&method.as_str().to_ascii_lowercase()))
}

/// Runs a handler for one request.
///
/// Errors raised by a step abort the remaining steps and are returned unchanged; committing,
/// rolling back and classifying them is the caller's job.
#[derive(Clone)]
pub struct DispatchPipeline {
    plans: Arc<dyn AopPlanLoader>,
}

impl DispatchPipeline {
    #[must_use]
    pub fn new(plans: Arc<dyn AopPlanLoader>) -> Self {
        Self { plans }
    }

    pub fn run(
        &self,
        handler: &mut dyn Handler,
        exchange: &mut Exchange,
    ) -> Result<Dispatched, HandlerError> {
        let method = exchange.request().method.clone();
        let uri = exchange.uri().to_string();
        let request_id = exchange.request().request_id;

        if let Some(plan) = self.plans.load(&uri, &method)? {
            debug!(
                request_id = %request_id,
                handler = %handler.id(),
                uri = %uri,
                steps = plan.steps.len(),
                "Dispatch mode selected: aspect plan"
            );
            let mut executed = 0;
            for step in &plan.steps {
                let start = Instant::now();
                let output = handler
                    .call(&step.name, exchange, step.arguments())
                    .ok_or_else(|| {
                        HandlerError::technical(format!(
                            "aspect step '{}' is not a method of {}",
                            step.name,
                            handler.id()
                        ))
                    })??;
                executed += 1;
                debug!(
                    request_id = %request_id,
                    step = %step.name,
                    flow = ?output.flow,
                    duration_us = start.elapsed().as_micros() as u64,
                    "Aspect step executed"
                );
                exchange.record_result(&step.name, output.value);
                if output.flow == Flow::Break {
                    info!(
                        request_id = %request_id,
                        step = %step.name,
                        skipped = plan.steps.len() - executed,
                        "Aspect plan stopped early"
                    );
                    break;
                }
            }
            return Ok(Dispatched::Handled(DispatchMode::Aspect {
                planned: plan.steps.len(),
                executed,
            }));
        }

        let action_method = action_method_name(&exchange.route().action, &method);
        if !handler.has_method(&action_method) {
            debug!(
                request_id = %request_id,
                handler = %handler.id(),
                method = %action_method,
                "No aspect plan and no action method"
            );
            return Ok(Dispatched::NoAction {
                method: action_method,
            });
        }

        debug!(
            request_id = %request_id,
            handler = %handler.id(),
            method = %action_method,
            "Dispatch mode selected: action"
        );
        if let Some(result) = handler.call(&action_method, exchange, &[]) {
            result?;
        }
        Ok(Dispatched::Handled(DispatchMode::Action {
            method: action_method,
        }))
    }
}
