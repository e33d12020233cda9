use anyhow::Context;
use clap::{Parser, Subcommand};
use http::Method;
use serde_json::json;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::info;

use crate::aop::FileAopLoader;
use crate::config::{load_config, resolve_config_path, AppConfig};
use crate::datasource::{DataSourceRegistry, MemoryConnector};
use crate::form::FileFormLoader;
use crate::render::ResponseRenderer;
use crate::request::split_format_suffix;
use crate::router::{RouteResolver, RouteTable};

/// Command-line interface for bodispatch
///
/// Inspects and checks an application configuration without serving requests.
#[derive(Debug, Parser)]
#[command(name = "bodispatch")]
#[command(about = "Business-object dispatch tooling", long_about = None)]
pub struct Cli {
    /// The subcommand to execute
    #[command(subcommand)]
    pub command: Commands,
}

/// Available CLI commands
#[derive(Debug, Subcommand)]
pub enum Commands {
    /// List the static and dynamic entries of the route table
    Routes {
        /// Configuration file (YAML, TOML or JSON); falls back to BODISPATCH_CONFIG
        #[arg(short, long)]
        config: Option<PathBuf>,
    },
    /// Resolve one request path and print the resolution as JSON
    Resolve {
        /// Configuration file (YAML, TOML or JSON); falls back to BODISPATCH_CONFIG
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// HTTP method of the request
        #[arg(short, long, default_value = "GET")]
        method: String,

        /// Request path, optionally with a `,format` suffix and query string
        #[arg(short, long)]
        path: String,
    },
    /// Load the configuration, route table, aspect plans, form schemas and view templates
    Check {
        /// Configuration file (YAML, TOML or JSON); falls back to BODISPATCH_CONFIG
        #[arg(short, long)]
        config: Option<PathBuf>,
    },
}

/// Parse the process arguments and execute the command, writing to stdout.
///
/// # Errors
///
/// Returns an error if the configuration or any file it names cannot be loaded.
pub fn run_cli() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let stdout = std::io::stdout();
    let mut out = stdout.lock();
    execute(&cli, &mut out)
}

/// Execute `cli`, writing the command's report to `out`.
pub fn execute<W: Write>(cli: &Cli, out: &mut W) -> anyhow::Result<()> {
    match &cli.command {
        Commands::Routes { config } => {
            let config = open_config(config.as_deref())?;
            let table = route_table(&config)?;
            for line in table.dump() {
                writeln!(out, "{line}")?;
            }
            writeln!(
                out,
                "{} static, {} dynamic",
                table.static_len(),
                table.dynamic_len()
            )?;
        }
        Commands::Resolve {
            config,
            method,
            path,
        } => {
            let config = open_config(config.as_deref())?;
            let method = Method::from_bytes(method.to_ascii_uppercase().as_bytes())
                .with_context(|| format!("invalid HTTP method '{method}'"))?;
            let resolver = RouteResolver::new(route_table(&config)?)
                .with_default(config.default_handler.clone(), &config.default_action);
            let bare = path.split('?').next().unwrap_or_default();
            let (_, format) = split_format_suffix(bare);
            let report = match resolver.resolve(&method, path) {
                Ok(resolution) => json!({
                    "method": method.as_str(),
                    "path": path,
                    "format": format.unwrap_or("json"),
                    "convention": resolution.is_convention(),
                    "route": resolution.route(),
                }),
                Err(e) => json!({
                    "method": method.as_str(),
                    "path": path,
                    "error": e.to_string(),
                }),
            };
            writeln!(out, "{}", serde_json::to_string_pretty(&report)?)?;
        }
        Commands::Check { config } => {
            let config = open_config(config.as_deref())?;
            let table = route_table(&config)?;
            writeln!(
                out,
                "routes: {} static, {} dynamic",
                table.static_len(),
                table.dynamic_len()
            )?;
            if let Some(dir) = &config.aop_dir {
                let n = FileAopLoader::new(dir).check_all()?;
                writeln!(out, "aspect plans: {n} documents")?;
            }
            if let Some(dir) = &config.form_dir {
                let n = FileFormLoader::new(dir).check_all()?;
                writeln!(out, "form schemas: {n} documents")?;
            }
            if let Some(dir) = &config.view_dir {
                let renderer = ResponseRenderer::with_view_dir(dir)?;
                writeln!(out, "formats: {}", renderer.formats().join(", "))?;
            }
            let registry = DataSourceRegistry::new()
                .with_connector(MemoryConnector::KIND, Arc::new(MemoryConnector::new()))
                .with_sources(&config.data_sources);
            for (name, kind) in registry.unresolved() {
                writeln!(out, "data source '{name}': kind '{kind}' needs an application connector")?;
            }
            writeln!(out, "ok")?;
            info!("Configuration check passed");
        }
    }
    Ok(())
}

fn open_config(explicit: Option<&Path>) -> anyhow::Result<AppConfig> {
    let path = resolve_config_path(explicit.map(Path::to_path_buf))?;
    load_config(&path)
}

fn route_table(config: &AppConfig) -> anyhow::Result<RouteTable> {
    match &config.routes_file {
        Some(path) => RouteTable::from_file(path),
        None => Ok(RouteTable::empty()),
    }
}
