use super::types::{RouteDef, RouteFile};
use anyhow::Context;
use std::path::Path;

/// Serialisation of a route or configuration document, chosen by file extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocFormat {
    Yaml,
    Json,
    Toml,
}

impl DocFormat {
    /// `.yaml`/`.yml` → YAML, `.toml` → TOML, anything else → JSON.
    #[must_use]
    pub fn from_path(path: &Path) -> Self {
        match path
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_ascii_lowercase)
            .as_deref()
        {
            Some("yaml" | "yml") => DocFormat::Yaml,
            Some("toml") => DocFormat::Toml,
            _ => DocFormat::Json,
        }
    }

    /// Deserialize `content` in this format.
    pub fn parse<T: serde::de::DeserializeOwned>(self, content: &str) -> anyhow::Result<T> {
        Ok(match self {
            DocFormat::Yaml => serde_yaml::from_str(content)?,
            DocFormat::Json => serde_json::from_str(content)?,
            DocFormat::Toml => toml::from_str(content)?,
        })
    }
}

/// Extensions tried, in order, when a document is looked up by stem.
pub const DOC_EXTENSIONS: [&str; 4] = ["yaml", "yml", "json", "toml"];

/// First existing `<stem>.<ext>` for the supported extensions.
#[must_use]
pub fn find_document(stem: &Path) -> Option<std::path::PathBuf> {
    let base = stem.as_os_str().to_string_lossy();
    DOC_EXTENSIONS
        .iter()
        .map(|ext| std::path::PathBuf::from(format!("{base}.{ext}")))
        .find(|candidate| candidate.is_file())
}

/// Read and parse any supported document from disk.
pub fn read_document<T: serde::de::DeserializeOwned>(path: &Path) -> anyhow::Result<T> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    DocFormat::from_path(path)
        .parse(&content)
        .with_context(|| format!("failed to parse {}", path.display()))
}

/// Read a route file from disk.
pub fn load_routes<P: AsRef<Path>>(file_path: P) -> anyhow::Result<Vec<RouteDef>> {
    let path = file_path.as_ref();
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read route file {}", path.display()))?;
    load_routes_from_str(&content, DocFormat::from_path(path))
        .with_context(|| format!("failed to parse route file {}", path.display()))
}

/// Parse route definitions from an in-memory document.
pub fn load_routes_from_str(content: &str, format: DocFormat) -> anyhow::Result<Vec<RouteDef>> {
    if content.trim().is_empty() {
        return Ok(Vec::new());
    }
    let file: RouteFile = format.parse(content)?;
    for def in &file.routes {
        validate_def(def)?;
    }
    Ok(file.routes)
}

fn validate_def(def: &RouteDef) -> anyhow::Result<()> {
    def.http_method()?;
    if !def.path.starts_with('/') {
        anyhow::bail!("route path must start with '/': {}", def.path);
    }
    match (&def.redirect, &def.handler) {
        (Some(_), Some(_)) => anyhow::bail!(
            "route {} {} declares both a redirect and a handler",
            def.method,
            def.path
        ),
        (None, None) => anyhow::bail!(
            "route {} {} declares neither a redirect nor a handler",
            def.method,
            def.path
        ),
        (Some(_), None) if def.is_dynamic() => anyhow::bail!(
            "route {} {}: a redirect cannot bind parameters",
            def.method,
            def.path
        ),
        _ => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_yaml_routes() {
        let yaml = r#"
routes:
  - { method: GET, path: /old-faq, redirect: /faq/ }
  - { method: GET, path: /about, handler: { name: Page, action: about }, uri: "/page/about?lang=en" }
"#;
        let defs = load_routes_from_str(yaml, DocFormat::Yaml).unwrap();
        assert_eq!(defs.len(), 2);
        assert_eq!(defs[0].redirect.as_deref(), Some("/faq/"));
    }

    #[test]
    fn test_toml_routes() {
        let text = r#"
[[routes]]
method = "post"
path = "/user"
parameters = ["id"]
handler = { name = "User", action = "update" }
"#;
        let defs = load_routes_from_str(text, DocFormat::Toml).unwrap();
        assert!(defs[0].is_dynamic());
    }

    #[test]
    fn test_rejects_ambiguous_entry() {
        let yaml = "routes:\n  - { method: GET, path: /x, redirect: /y, handler: { name: X } }\n";
        assert!(load_routes_from_str(yaml, DocFormat::Yaml).is_err());
        let yaml = "routes:\n  - { method: GET, path: /x }\n";
        assert!(load_routes_from_str(yaml, DocFormat::Yaml).is_err());
    }

    #[test]
    fn test_empty_document() {
        assert!(load_routes_from_str("  ", DocFormat::Json).unwrap().is_empty());
    }
}
