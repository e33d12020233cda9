//! # CLI Module
//!
//! Command-line tooling for inspecting an application configuration.
//!
//! ## Commands
//!
//! ### `routes`
//!
//! List the route table named by the configuration:
//!
//! ```bash
//! bodispatch routes --config app.yaml
//! ```
//!
//! ### `resolve`
//!
//! Resolve one request path and print handler, action, canonical URI and bound parameters:
//!
//! ```bash
//! bodispatch resolve --config app.yaml --method GET --path /user/5
//! ```
//!
//! ### `check`
//!
//! Load the configuration, route table, aspect plans, form schemas and view templates, and
//! fail on the first file that does not parse:
//!
//! ```bash
//! bodispatch check --config app.yaml
//! ```
//!
//! Every command accepts the configuration through `BODISPATCH_CONFIG` instead of `--config`.

mod commands;


pub use commands::{execute, run_cli, Cli, Commands};
