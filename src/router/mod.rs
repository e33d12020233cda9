//! # Router Module
//!
//! Route resolution for the dispatch core: turns a request method and path into a
//! [`ResolvedRoute`] naming the business-object handler, its action, the canonical URI and the
//! parameters the route contributes.
//!
//! ## Architecture
//!
//! The router uses a two-level table:
//!
//! 1. **Exact table** - `(method, path)` keys mapping to redirects or handler descriptors.
//!    Exact entries always win.
//! 2. **Segment trie** - per-method trie of literal prefix segments whose nodes carry an arity
//!    table. A request binds its trailing unconsumed segments to the parameter names of the
//!    descriptor registered for exactly that count.
//!
//! Requests matching neither are resolved by **naming convention** from the path itself; the
//! handler registry decides later whether such a handler exists.
//!
//! ## Example
//!
//! ```rust
//! use bodispatch::router::{RouteResolver, RouteTable};
//! use bodispatch::routes::{HandlerId, RouteDescriptor};
//! use http::Method;
//!
//! let mut builder = RouteTable::builder();
//! builder
//!     .add_dynamic(
//!         Method::GET,
//!         "/user",
//!         RouteDescriptor::new(HandlerId::new("/account/", "User"), "show").with_parameters(["id"]),
//!     )
//!     .unwrap();
//! let resolver = RouteResolver::new(builder.build());
//!
//! let route = resolver.resolve(&Method::GET, "/user/42").unwrap().into_route();
//! assert_eq!(route.handler.to_string(), "/account/User");
//! assert_eq!(route.parameters["id"], "42");
//!
//! let route = resolver.resolve(&Method::GET, "/faq/").unwrap().into_route();
//! assert_eq!(route.handler.name, "Faq");
//! assert_eq!(route.action, "index");
//! ```
//!
//! ## Concurrency
//!
//! [`RouteTable`] is immutable once built. [`RouteResolver`] reads it through an
//! `arc_swap::ArcSwap`, so a hot reload replaces the whole table without blocking readers.

mod core;
mod table;
mod trie;

pub use core::{
    lower_camel, upper_camel, Resolution, ResolvedRoute, RouteResolver, RouteSource, RoutingError,
};
pub use table::{RouteTable, RouteTableBuilder};
pub use trie::{ParamVec, SegmentTrie, MAX_INLINE_PARAMS};
