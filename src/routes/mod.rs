//! # Routes Module
//!
//! Route descriptors and the on-disk route file format.
//!
//! A route file is a YAML, JSON or TOML document with a `routes` list. Each entry is one of:
//!
//! - a **redirect**: `{ method: GET, path: /old-faq, redirect: /faq/ }`
//! - a **static handler entry**: `{ method: GET, path: /about, handler: { name: Page, action: about } }`
//! - a **dynamic entry**, binding trailing segments to names:
//!   `{ method: GET, path: /user, parameters: [id], handler: { name: User, action: show } }`
//!
//! The [`router`](crate::router) module compiles these definitions into a
//! [`RouteTable`](crate::router::RouteTable).

mod load;
mod types;

pub use load::*;
pub use types::*;
