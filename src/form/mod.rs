//! # Form Module
//!
//! Form schemas and the field validator applied to request parameters.
//!
//! A form schema is attached to a canonical URI and a request method. It lists field rules
//! (required, length bounds, format, select options, number bounds and defaults) that
//! [`FieldValidator`] enforces while normalising values in place: strings are trimmed, defaults
//! filled in, numbers coerced. The first violation becomes a [`FormDataError`], which the
//! dispatch core reports as a 412 business error carrying `{fieldId, type, message, label}`.

mod loader;
mod schema;
mod validator;

pub(crate) use loader::documents_under;
pub use loader::{FileFormLoader, FormSchemaLoader, MemoryFormLoader};
pub use schema::{Constraint, FieldKind, FieldRule, FieldSchema};
pub use validator::{FieldValidator, FormDataError, Violation};
