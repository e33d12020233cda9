use serde_json::Value;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use tracing::debug;

use super::error::HandlerError;
use super::exchange::Exchange;
use crate::dispatcher::StepOutput;
use crate::routes::HandlerId;

/// Signature of a handler method: receiver, request working set, step arguments.
pub type ActionFn<B> = fn(&mut B, &mut Exchange, &[Value]) -> Result<StepOutput, HandlerError>;

/// Method-name table of one business-object type, built once at registration.
pub struct ActionTable<B> {
    actions: HashMap<&'static str, ActionFn<B>>,
}

impl<B> Default for ActionTable<B> {
    fn default() -> Self {
        Self {
            actions: HashMap::new(),
        }
    }
}

impl<B> ActionTable<B> {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Publish `f` under `name` (`createUserPost`, `checkParameters`, ...).
    pub fn on(&mut self, name: &'static str, f: ActionFn<B>) -> &mut Self {
        self.actions.insert(name, f);
        self
    }

    #[must_use]
    pub fn get(&self, name: &str) -> Option<ActionFn<B>> {
        self.actions.get(name).copied()
    }

    #[must_use]
    pub fn names(&self) -> Vec<&'static str> {
        let mut names: Vec<&'static str> = self.actions.keys().copied().collect();
        names.sort_unstable();
        names
    }
}

/// A business object: plain Rust state plus the methods it publishes.
///
/// ```rust
/// use bodispatch::dispatcher::StepOutput;
/// use bodispatch::handler::{ActionTable, BusinessObject, Exchange, HandlerError};
/// use serde_json::{json, Value};
///
/// #[derive(Default)]
/// struct Faq;
///
/// impl Faq {
///     fn index_get(&mut self, ex: &mut Exchange, _: &[Value]) -> Result<StepOutput, HandlerError> {
///         ex.set_payload(json!(["What is this?"]));
///         Ok(StepOutput::done())
///     }
/// }
///
/// impl BusinessObject for Faq {
///     fn actions(table: &mut ActionTable<Self>) {
///         table.on("indexGet", Self::index_get);
///     }
/// }
/// ```
pub trait BusinessObject: Send + 'static {
    fn actions(table: &mut ActionTable<Self>)
    where
        Self: Sized;
}

/// A handler instance bound to one request.
pub trait Handler: Send {
    fn id(&self) -> &HandlerId;

    fn has_method(&self, name: &str) -> bool;

    /// Invoke a published method; `None` when no such method exists.
    fn call(
        &mut self,
        name: &str,
        exchange: &mut Exchange,
        args: &[Value],
    ) -> Option<Result<StepOutput, HandlerError>>;

    fn methods(&self) -> Vec<&'static str>;
}

struct BoundHandler<B> {
    id: HandlerId,
    object: B,
    actions: Arc<ActionTable<B>>,
}

impl<B: BusinessObject> Handler for BoundHandler<B> {
    fn id(&self) -> &HandlerId {
        &self.id
    }

    fn has_method(&self, name: &str) -> bool {
        self.actions.get(name).is_some()
    }

    fn call(
        &mut self,
        name: &str,
        exchange: &mut Exchange,
        args: &[Value],
    ) -> Option<Result<StepOutput, HandlerError>> {
        let f = self.actions.get(name)?;
        Some(f(&mut self.object, exchange, args))
    }

    fn methods(&self) -> Vec<&'static str> {
        self.actions.names()
    }
}

type Factory = Arc<dyn Fn() -> Box<dyn Handler> + Send + Sync>;

/// Explicit handler registry: identity to constructor, filled at startup.
#[derive(Clone, Default)]
pub struct HandlerRegistry {
    factories: HashMap<HandlerId, Factory>,
}

impl fmt::Debug for HandlerRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HandlerRegistry")
            .field("handlers", &self.ids())
            .finish()
    }
}

impl HandlerRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a business object under `id` with its constructor.
    pub fn register<B, F>(&mut self, id: HandlerId, constructor: F) -> &mut Self
    where
        B: BusinessObject,
        F: Fn() -> B + Send + Sync + 'static,
    {
        let mut table = ActionTable::new();
        B::actions(&mut table);
        let actions = Arc::new(table);
        let bound_id = id.clone();
        debug!(handler = %id, methods = ?actions.names(), "Handler registered");
        let factory: Factory = Arc::new(move || {
            Box::new(BoundHandler {
                id: bound_id.clone(),
                object: constructor(),
                actions: Arc::clone(&actions),
            }) as Box<dyn Handler>
        });
        self.factories.insert(id, factory);
        self
    }

    /// Register a `Default`-constructible business object.
    pub fn register_default<B>(&mut self, id: HandlerId) -> &mut Self
    where
        B: BusinessObject + Default,
    {
        self.register(id, B::default)
    }

    /// Instantiate the handler for `id`; `None` when nothing is registered (404).
    #[must_use]
    pub fn create(&self, id: &HandlerId) -> Option<Box<dyn Handler>> {
        self.factories.get(id).map(|factory| factory())
    }

    #[must_use]
    pub fn contains(&self, id: &HandlerId) -> bool {
        self.factories.contains_key(id)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.factories.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.factories.is_empty()
    }

    #[must_use]
    pub fn ids(&self) -> Vec<&HandlerId> {
        let mut ids: Vec<&HandlerId> = self.factories.keys().collect();
        ids.sort();
        ids
    }
}
