//! Outcome classification: maps the terminal result of one request to a status and body.
//!
//! | Outcome | Status | Body | Logged |
//! |---|---|---|---|
//! | success | handler status (default 200) | handler payload | no |
//! | routing miss | 404 | none | no |
//! | business error (code `1..=499`) | the code | payload, else message | no |
//! | technical error (code 0 or `500..`) | handler status if not 200, else 500 | none | message + trace |

use serde::Serialize;
use serde_json::Value;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, info};

use crate::handler::HandlerError;
use crate::ids::RequestId;
use crate::logging::{ErrorLog, TracingErrorLog};

/// Terminal value of one request, before classification.
#[derive(Debug)]
pub enum Outcome {
    Success {
        status: u16,
        body: Option<Value>,
    },
    /// Dispatch or commit failed; `handler_status` is what the handler had set by then
    Failure {
        error: HandlerError,
        handler_status: u16,
    },
    /// No route, no handler or no action
    RoutingMiss { reason: String },
}

impl Outcome {
    #[must_use]
    pub fn routing_miss(reason: impl Into<String>) -> Self {
        Outcome::RoutingMiss {
            reason: reason.into(),
        }
    }

    #[must_use]
    pub fn is_success(&self) -> bool {
        matches!(self, Outcome::Success { .. })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    RoutingMiss,
    Business,
    Technical,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ErrorKind::RoutingMiss => "routing_miss",
            ErrorKind::Business => "business",
            ErrorKind::Technical => "technical",
        })
    }
}

/// Final status and body handed to the renderer.
#[derive(Debug, Clone, PartialEq)]
pub struct Classified {
    pub status: u16,
    pub body: Option<Value>,
    /// `None` on success
    pub kind: Option<ErrorKind>,
}

#[derive(Clone)]
pub struct ErrorClassifier {
    log: Arc<dyn ErrorLog>,
}

impl fmt::Debug for ErrorClassifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ErrorClassifier").finish_non_exhaustive()
    }
}

impl Default for ErrorClassifier {
    fn default() -> Self {
        Self::new(Arc::new(TracingErrorLog))
    }
}

impl ErrorClassifier {
    #[must_use]
    pub fn new(log: Arc<dyn ErrorLog>) -> Self {
        Self { log }
    }

    pub fn classify(&self, request_id: RequestId, outcome: Outcome) -> Classified {
        match outcome {
            Outcome::Success { status, body } => Classified {
                status,
                body,
                kind: None,
            },
            Outcome::RoutingMiss { reason } => {
                debug!(request_id = %request_id, reason = %reason, "Routing miss");
                Classified {
                    status: 404,
                    body: None,
                    kind: Some(ErrorKind::RoutingMiss),
                }
            }
            Outcome::Failure {
                error,
                handler_status,
            } if error.is_business() => {
                info!(
                    request_id = %request_id,
                    status = error.code(),
                    handler_status,
                    "Business error"
                );
                Classified {
                    status: error.code(),
                    body: Some(error.body()),
                    kind: Some(ErrorKind::Business),
                }
            }
            Outcome::Failure {
                error,
                handler_status,
            } => {
                self.log.log(request_id, error.message(), error.trace());
                let status = if handler_status == 200 {
                    500
                } else {
                    handler_status
                };
                Classified {
                    status,
                    body: None,
                    kind: Some(ErrorKind::Technical),
                }
            }
        }
    }
}
