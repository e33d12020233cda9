//! Transactional scope around dispatch.
//!
//! Data sources are opened lazily by the handler, each beginning a transaction on open.
//! After dispatch the orchestrator commits every open source when dispatch succeeded, rolls
//! every one back when it failed, and closes all of them exactly once in both cases. Close
//! failures are logged and never change the outcome.

use std::panic::{self, AssertUnwindSafe};
use std::time::Instant;
use tracing::{debug, error, info};

use crate::classify::Outcome;
use crate::dispatcher::{DispatchPipeline, Dispatched};
use crate::handler::{Exchange, Handler, HandlerError};

#[derive(Clone)]
pub struct TransactionOrchestrator {
    pipeline: DispatchPipeline,
}

impl TransactionOrchestrator {
    #[must_use]
    pub fn new(pipeline: DispatchPipeline) -> Self {
        Self { pipeline }
    }

    #[must_use]
    pub fn pipeline(&self) -> &DispatchPipeline {
        &self.pipeline
    }

    /// Dispatch `handler` and settle every data source the exchange opened.
    ///
    /// A panic inside the handler is caught and becomes a technical error. A commit failure
    /// rolls back whatever is still in a transaction and turns the outcome into a failure.
    pub fn execute(&self, handler: &mut dyn Handler, exchange: &mut Exchange) -> Outcome {
        let request_id = exchange.request().request_id;
        let start = Instant::now();

        let dispatched = panic::catch_unwind(AssertUnwindSafe(|| self.pipeline.run(handler, exchange)))
            .unwrap_or_else(|payload| Err(HandlerError::from_panic(payload.as_ref())));

        let outcome = match dispatched {
            Ok(Dispatched::Handled(mode)) => match exchange.data_sources_mut().commit_all() {
                Ok(()) => {
                    if !exchange.data_sources().is_empty() {
                        info!(
                            request_id = %request_id,
                            sources = exchange.data_sources().len(),
                            "Transactions committed"
                        );
                    }
                    debug!(request_id = %request_id, mode = ?mode, "Dispatch succeeded");
                    Outcome::Success {
                        status: exchange.status(),
                        body: exchange.take_payload(),
                    }
                }
                Err(e) => {
                    error!(request_id = %request_id, error = %e, "Commit failed; rolling back");
                    self.rollback(exchange);
                    Outcome::Failure {
                        error: HandlerError::from(e),
                        handler_status: exchange.status(),
                    }
                }
            },
            Ok(Dispatched::NoAction { method }) => {
                self.rollback(exchange);
                Outcome::routing_miss(format!(
                    "{} has no method {method}",
                    exchange.handler_id()
                ))
            }
            Err(e) => {
                self.rollback(exchange);
                Outcome::Failure {
                    error: e,
                    handler_status: exchange.status(),
                }
            }
        };

        let closed = exchange.data_sources_mut().close_all();
        debug!(
            request_id = %request_id,
            closed,
            duration_us = start.elapsed().as_micros() as u64,
            "Data sources released"
        );
        outcome
    }

    fn rollback(&self, exchange: &mut Exchange) {
        let request_id = exchange.request().request_id;
        if exchange.data_sources().is_empty() {
            return;
        }
        let failures = exchange.data_sources_mut().rollback_all();
        for e in &failures {
            error!(request_id = %request_id, data_source = %e.name(), error = %e, "Rollback failed");
        }
        info!(
            request_id = %request_id,
            sources = exchange.data_sources().len(),
            failed = failures.len(),
            "Transactions rolled back"
        );
    }
}
