use serde_json::Value;
use std::sync::Arc;

use super::error::HandlerError;
use crate::datasource::{Connection, DataSources};
use crate::form::{FieldSchema, FieldValidator};
use crate::request::{Parameters, RequestContext};
use crate::router::ResolvedRoute;
use crate::routes::HandlerId;

/// Per-request working set handed to every handler action.
///
/// Holds the request with its merged parameters, the resolved route, the form schema of the
/// canonical URI, the lazily opened data sources and the two outputs the dispatch core reads
/// back: `status` (default 200) and `payload`.
#[derive(Debug)]
pub struct Exchange {
    request: RequestContext,
    route: ResolvedRoute,
    form: Option<Arc<FieldSchema>>,
    validator: Arc<FieldValidator>,
    status: u16,
    payload: Option<Value>,
    results: Vec<(String, Value)>,
    data_sources: DataSources,
}

impl Exchange {
    /// Route parameters are merged over the request parameters.
    #[must_use]
    pub fn new(mut request: RequestContext, route: ResolvedRoute, data_sources: DataSources) -> Self {
        request
            .parameters_mut()
            .extend(route.parameters.iter().map(|(k, v)| (k.clone(), v.clone())));
        Self {
            request,
            route,
            form: None,
            validator: Arc::new(FieldValidator::new()),
            status: 200,
            payload: None,
            results: Vec::new(),
            data_sources,
        }
    }

    #[must_use]
    pub fn with_form(mut self, form: Option<Arc<FieldSchema>>, validator: Arc<FieldValidator>) -> Self {
        self.form = form;
        self.validator = validator;
        self
    }

    #[must_use]
    pub fn request(&self) -> &RequestContext {
        &self.request
    }

    #[must_use]
    pub fn route(&self) -> &ResolvedRoute {
        &self.route
    }

    #[must_use]
    pub fn handler_id(&self) -> &HandlerId {
        &self.route.handler
    }

    /// Canonical URI of the resolved route.
    #[must_use]
    pub fn uri(&self) -> &str {
        &self.route.uri
    }

    #[must_use]
    pub fn parameters(&self) -> &Parameters {
        self.request.parameters()
    }

    pub fn parameters_mut(&mut self) -> &mut Parameters {
        self.request.parameters_mut()
    }

    #[must_use]
    pub fn param(&self, name: &str) -> Option<&Value> {
        self.request.parameters().get(name)
    }

    #[must_use]
    pub fn param_str(&self, name: &str) -> Option<&str> {
        self.request.param_str(name)
    }

    #[must_use]
    pub fn form(&self) -> Option<&FieldSchema> {
        self.form.as_deref()
    }

    /// Validate and normalise the parameters against the form schema, if there is one.
    pub fn check_parameters(&mut self) -> Result<(), HandlerError> {
        let Some(form) = self.form.clone() else {
            return Ok(());
        };
        self.validator
            .validate(self.request.parameters_mut(), &form)
            .map_err(HandlerError::from)
    }

    #[must_use]
    pub fn status(&self) -> u16 {
        self.status
    }

    pub fn set_status(&mut self, status: u16) {
        self.status = status;
    }

    #[must_use]
    pub fn payload(&self) -> Option<&Value> {
        self.payload.as_ref()
    }

    pub fn set_payload(&mut self, payload: Value) {
        self.payload = Some(payload);
    }

    pub fn take_payload(&mut self) -> Option<Value> {
        self.payload.take()
    }

    /// Aspect step results, in execution order, keyed by method name.
    #[must_use]
    pub fn results(&self) -> &[(String, Value)] {
        &self.results
    }

    /// Result of an earlier aspect step.
    #[must_use]
    pub fn step_result(&self, method: &str) -> Option<&Value> {
        self.results
            .iter()
            .rev()
            .find(|(name, _)| name == method)
            .map(|(_, v)| v)
    }

    /// Record a step result; a repeated method name replaces the earlier value.
    pub(crate) fn record_result(&mut self, method: &str, value: Value) {
        match self.results.iter_mut().find(|(name, _)| name == method) {
            Some(slot) => slot.1 = value,
            None => self.results.push((method.to_string(), value)),
        }
    }

    /// Typed connection of a data source, opened (with a transaction) on first use.
    pub fn data_source<C: Connection>(&mut self, name: &str) -> Result<&mut C, HandlerError> {
        self.data_sources.get::<C>(name).map_err(HandlerError::from)
    }

    #[must_use]
    pub fn data_sources(&self) -> &DataSources {
        &self.data_sources
    }

    pub fn data_sources_mut(&mut self) -> &mut DataSources {
        &mut self.data_sources
    }

    /// Give up the request-scoped parts once dispatch is over.
    #[must_use]
    pub fn into_parts(self) -> (RequestContext, u16, Option<Value>, Vec<(String, Value)>) {
        (self.request, self.status, self.payload, self.results)
    }
}
