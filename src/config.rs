//! # Application Configuration
//!
//! [`AppConfig`] is built once at process start and handed to
//! [`AppServiceBuilder`](crate::service::AppServiceBuilder) by reference; nothing reads global
//! state at request time.
//!
//! ## File format
//!
//! YAML, TOML or JSON, chosen by extension:
//!
//! ```yaml
//! default_handler: { path: /, name: Index }
//! default_action: index
//! routes_file: routes.yaml
//! aop_dir: aop
//! form_dir: form
//! view_dir: view
//! validate_forms: true
//! hot_reload: false
//! loader_cache_size: 1024
//! data_sources:
//!   main: { kind: memory }
//!   audit: { kind: memory, options: { fail_on: [close] } }
//! ```
//!
//! Relative paths are resolved against the directory holding the configuration file.
//!
//! ## Environment Variables
//!
//! ### `BODISPATCH_CONFIG`
//!
//! Path of the configuration file used by the CLI when `--config` is not given.

use anyhow::Context;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::env;
use std::path::{Path, PathBuf};

use crate::routes::{DocFormat, HandlerId};

/// Environment variable naming the configuration file.
pub const CONFIG_ENV: &str = "BODISPATCH_CONFIG";

/// One named data source: connector kind plus connector-specific options.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DataSourceConfig {
    pub kind: String,
    #[serde(default)]
    pub options: BTreeMap<String, Value>,
}

impl DataSourceConfig {
    #[must_use]
    pub fn new(kind: &str) -> Self {
        Self {
            kind: kind.to_string(),
            options: BTreeMap::new(),
        }
    }

    #[must_use]
    pub fn with_option(mut self, key: &str, value: Value) -> Self {
        self.options.insert(key.to_string(), value);
        self
    }
}

/// Process-wide settings of the dispatch core.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Handler serving `/` and single-segment convention paths
    pub default_handler: HandlerId,
    pub default_action: String,
    pub routes_file: Option<PathBuf>,
    pub aop_dir: Option<PathBuf>,
    pub form_dir: Option<PathBuf>,
    /// Directory of `<format>.body.j2` templates overriding the built-in ones
    pub view_dir: Option<PathBuf>,
    pub data_sources: BTreeMap<String, DataSourceConfig>,
    /// Apply the form schema before dispatch instead of leaving it to the handler
    pub validate_forms: bool,
    /// Watch `routes_file` and swap the table on change
    pub hot_reload: bool,
    /// Entries kept by each file-backed form and aspect plan loader
    pub loader_cache_size: usize,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            default_handler: HandlerId::default(),
            default_action: "index".to_string(),
            routes_file: None,
            aop_dir: None,
            form_dir: None,
            view_dir: None,
            data_sources: BTreeMap::new(),
            validate_forms: false,
            hot_reload: false,
            loader_cache_size: crate::cache::DEFAULT_CAPACITY,
        }
    }
}

impl AppConfig {
    /// Resolve relative paths against `base`.
    #[must_use]
    pub fn rebase(mut self, base: &Path) -> Self {
        for slot in [
            &mut self.routes_file,
            &mut self.aop_dir,
            &mut self.form_dir,
            &mut self.view_dir,
        ] {
            if let Some(p) = slot.as_mut() {
                if p.is_relative() {
                    *p = base.join(&*p);
                }
            }
        }
        self.default_handler = HandlerId::new(&self.default_handler.path, &self.default_handler.name);
        self
    }
}

/// Load a configuration file (`.yaml`/`.yml`, `.toml` or `.json`).
pub fn load_config<P: AsRef<Path>>(path: P) -> anyhow::Result<AppConfig> {
    let path = path.as_ref();
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read config file {}", path.display()))?;
    let config: AppConfig = if content.trim().is_empty() {
        AppConfig::default()
    } else {
        DocFormat::from_path(path)
            .parse(&content)
            .with_context(|| format!("failed to parse config file {}", path.display()))?
    };
    let base = path.parent().unwrap_or_else(|| Path::new("."));
    Ok(config.rebase(base))
}

/// Configuration file named by `explicit`, else by `BODISPATCH_CONFIG`.
pub fn resolve_config_path(explicit: Option<PathBuf>) -> anyhow::Result<PathBuf> {
    explicit
        .or_else(|| env::var_os(CONFIG_ENV).map(PathBuf::from))
        .ok_or_else(|| anyhow::anyhow!("no configuration file given (use --config or {CONFIG_ENV})"))
}
