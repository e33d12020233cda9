use serde_json::Value;
use std::backtrace::Backtrace;
use std::fmt;

use crate::datasource::DataSourceError;
use crate::form::FormDataError;

/// Error raised by a handler action, carrying an intrinsic status code.
///
/// Codes `1..=499` are business errors surfaced to the caller; `0` and `500..` are technical
/// errors that get logged with their trace. See [`ErrorClassifier`](crate::classify::ErrorClassifier).
#[derive(Debug)]
pub struct HandlerError {
    code: u16,
    message: String,
    payload: Option<Value>,
    trace: String,
}

impl HandlerError {
    /// Error with an explicit code. Technical codes capture a backtrace.
    #[must_use]
    pub fn with_code(code: u16, message: impl Into<String>) -> Self {
        let trace = if is_business_code(code) {
            String::new()
        } else {
            Backtrace::force_capture().to_string()
        };
        Self {
            code,
            message: message.into(),
            payload: None,
            trace,
        }
    }

    /// Unexpected failure without a code.
    #[must_use]
    pub fn technical(message: impl Into<String>) -> Self {
        Self::with_code(0, message)
    }

    #[must_use]
    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::with_code(401, message)
    }

    #[must_use]
    pub fn forbidden(message: impl Into<String>) -> Self {
        Self::with_code(403, message)
    }

    #[must_use]
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::with_code(404, message)
    }

    #[must_use]
    pub fn conflict(message: impl Into<String>) -> Self {
        Self::with_code(409, message)
    }

    /// Form validation failure: code 412 with the `{fieldId, type, message, label}` payload.
    #[must_use]
    pub fn precondition_failed(error: FormDataError) -> Self {
        Self::with_code(412, error.to_string()).with_payload(error.to_payload())
    }

    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::with_code(500, message)
    }

    #[must_use]
    pub fn not_implemented(message: impl Into<String>) -> Self {
        Self::with_code(501, message)
    }

    #[must_use]
    pub fn service_unavailable(message: impl Into<String>) -> Self {
        Self::with_code(503, message)
    }

    /// Technical error built from a caught panic payload.
    #[must_use]
    pub fn from_panic(payload: &(dyn std::any::Any + Send)) -> Self {
        let detail = payload
            .downcast_ref::<&str>()
            .map(|s| (*s).to_string())
            .or_else(|| payload.downcast_ref::<String>().cloned())
            .unwrap_or_else(|| "non-string panic payload".to_string());
        Self::technical(format!("handler panicked: {detail}"))
    }

    /// Structured body rendered instead of the message.
    #[must_use]
    pub fn with_payload(mut self, payload: Value) -> Self {
        self.payload = Some(payload);
        self
    }

    #[must_use]
    pub fn code(&self) -> u16 {
        self.code
    }

    #[must_use]
    pub fn message(&self) -> &str {
        &self.message
    }

    #[must_use]
    pub fn payload(&self) -> Option<&Value> {
        self.payload.as_ref()
    }

    #[must_use]
    pub fn trace(&self) -> &str {
        &self.trace
    }

    /// Whether the code is a user-facing business code (`1..=499`).
    #[must_use]
    pub fn is_business(&self) -> bool {
        is_business_code(self.code)
    }

    /// Body surfaced for a business error: the payload, else the message.
    #[must_use]
    pub fn body(&self) -> Value {
        self.payload
            .clone()
            .unwrap_or_else(|| Value::String(self.message.clone()))
    }
}

fn is_business_code(code: u16) -> bool {
    (1..500).contains(&code)
}

impl fmt::Display for HandlerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.code, self.message)
    }
}

impl std::error::Error for HandlerError {}

impl From<FormDataError> for HandlerError {
    fn from(error: FormDataError) -> Self {
        Self::precondition_failed(error)
    }
}

impl From<DataSourceError> for HandlerError {
    fn from(error: DataSourceError) -> Self {
        Self::technical(error.to_string())
    }
}

impl From<anyhow::Error> for HandlerError {
    fn from(error: anyhow::Error) -> Self {
        let chain: Vec<String> = error.chain().skip(1).map(ToString::to_string).collect();
        let mut e = Self::technical(error.to_string());
        if !chain.is_empty() {
            e.trace = format!("caused by: {}\n{}", chain.join("\ncaused by: "), e.trace);
        }
        e
    }
}
