//
//  config.rs
//  routegraph
//
//  Created by hak (tharun)
//

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::warn;

use crate::error::Result;

/// File name looked up at the project root.
pub const CONFIG_FILE: &str = "routegraph.toml";

/// Top-level routegraph configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RouteGraphConfig {
    #[serde(default)]
    pub project: ProjectConfig,
    #[serde(default)]
    pub discovery: DiscoveryConfig,
    #[serde(default)]
    pub monitor: MonitorConfig,
    #[serde(default)]
    pub codegen: CodegenConfig,
}

/// Which files are analysed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProjectConfig {
    /// Project root, relative to the config file's directory.
    #[serde(default = "default_root")]
    pub root: String,
    /// Watch locations relative to the root. Empty means `src` if it
    /// exists, else the root itself.
    #[serde(default)]
    pub include: Vec<String>,
    #[serde(default = "default_extensions")]
    pub extensions: Vec<String>,
    /// Directory names skipped on top of the built-in ignore list.
    #[serde(default)]
    pub ignore: Vec<String>,
}

/// How routers and their registrations are recognised.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiscoveryConfig {
    /// Type names of router instances. `Hono` also matches `Hono<Env>`.
    #[serde(default = "default_router_types")]
    pub router_types: Vec<String>,
    #[serde(default = "default_http_methods")]
    pub http_methods: Vec<String>,
    #[serde(default = "default_base_url_methods")]
    pub base_url_methods: Vec<String>,
}

/// Incremental monitor timing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MonitorConfig {
    /// Delay before a re-analysis, re-armed on every change.
    #[serde(default = "default_debounce_ms")]
    pub debounce_ms: u64,
    /// Coalescing window for raw file-system events.
    #[serde(default = "default_watch_debounce_ms")]
    pub watch_debounce_ms: u64,
    #[serde(default = "default_true")]
    pub auto_update: bool,
}

/// Source reconstruction options.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CodegenConfig {
    /// Prefix every section with a `// id:` comment.
    #[serde(default)]
    pub include_ids: bool,
}

fn default_root() -> String {
    ".".to_string()
}

fn default_extensions() -> Vec<String> {
    ["ts", "tsx", "mts", "cts", "js", "jsx", "mjs", "cjs"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}

fn default_router_types() -> Vec<String> {
    vec!["Hono".to_string(), "OpenAPIHono".to_string()]
}

fn default_http_methods() -> Vec<String> {
    ["get", "post", "put", "delete", "patch", "options"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}

fn default_base_url_methods() -> Vec<String> {
    vec!["baseUrl".to_string()]
}

fn default_debounce_ms() -> u64 {
    50
}

fn default_watch_debounce_ms() -> u64 {
    100
}

fn default_true() -> bool {
    true
}

impl Default for ProjectConfig {
    fn default() -> Self {
        Self {
            root: default_root(),
            include: Vec::new(),
            extensions: default_extensions(),
            ignore: Vec::new(),
        }
    }
}

impl Default for DiscoveryConfig {
    fn default() -> Self {
        Self {
            router_types: default_router_types(),
            http_methods: default_http_methods(),
            base_url_methods: default_base_url_methods(),
        }
    }
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            debounce_ms: default_debounce_ms(),
            watch_debounce_ms: default_watch_debounce_ms(),
            auto_update: default_true(),
        }
    }
}

impl DiscoveryConfig {
    /// First configured router type accepted by `matches`.
    pub fn router_type_for(&self, matches: impl Fn(&str) -> bool) -> Option<&str> {
        self.router_types
            .iter()
            .map(|t| t.as_str())
            .find(|t| matches(t))
    }

    pub fn is_http_method(&self, name: &str) -> bool {
        self.http_methods.iter().any(|m| m == name)
    }

    pub fn is_base_url_method(&self, name: &str) -> bool {
        self.base_url_methods.iter().any(|m| m == name)
    }
}

impl RouteGraphConfig {
    /// Load config from a TOML file, falling back to defaults.
    pub fn load(path: &Path) -> Self {
        if !path.exists() {
            return Self::default();
        }
        Self::try_load(path).unwrap_or_else(|e| {
            warn!(path = %path.display(), error = %e, "invalid config, using defaults");
            Self::default()
        })
    }

    /// Strict variant of [`load`](Self::load): unreadable or malformed
    /// files are errors.
    pub fn try_load(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        Ok(toml::from_str(&contents)?)
    }

    /// `routegraph.toml` in `dir`, or defaults.
    pub fn load_from_dir(dir: &Path) -> Self {
        Self::load(&dir.join(CONFIG_FILE))
    }

    /// Resolve the project root relative to the config directory.
    pub fn resolve_root(&self, config_dir: &Path) -> PathBuf {
        config_dir.join(&self.project.root)
    }

    /// Directories to scan and watch under `root`.
    pub fn watch_locations(&self, root: &Path) -> Vec<PathBuf> {
        if !self.project.include.is_empty() {
            return self.project.include.iter().map(|p| root.join(p)).collect();
        }
        let src = root.join("src");
        if src.is_dir() {
            vec![src]
        } else {
            vec![root.to_path_buf()]
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn test_defaults_when_missing() {
        let dir = tempdir().unwrap();
        let config = RouteGraphConfig::load_from_dir(dir.path());
        assert_eq!(config.discovery.router_types, vec!["Hono", "OpenAPIHono"]);
        assert_eq!(config.monitor.debounce_ms, 50);
        assert!(config.monitor.auto_update);
        assert!(!config.codegen.include_ids);
        assert_eq!(config.watch_locations(dir.path()), vec![dir.path().to_path_buf()]);
    }

    #[test]
    fn test_partial_file_keeps_other_defaults() {
        let dir = tempdir().unwrap();
        fs::create_dir(dir.path().join("src")).unwrap();
        fs::write(
            dir.path().join(CONFIG_FILE),
            "[discovery]\nrouter_types = [\"Router\"]\n\n[codegen]\ninclude_ids = true\n",
        )
        .unwrap();

        let config = RouteGraphConfig::load_from_dir(dir.path());
        assert_eq!(config.discovery.router_types, vec!["Router"]);
        assert_eq!(config.discovery.http_methods.len(), 6);
        assert!(config.codegen.include_ids);
        assert_eq!(config.watch_locations(dir.path()), vec![dir.path().join("src")]);
    }

    #[test]
    fn test_invalid_file_falls_back() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join(CONFIG_FILE), "[monitor\ndebounce_ms = ").unwrap();
        let config = RouteGraphConfig::load_from_dir(dir.path());
        assert_eq!(config.monitor.debounce_ms, 50);

        let err = RouteGraphConfig::try_load(&dir.path().join(CONFIG_FILE)).unwrap_err();
        assert!(matches!(err, crate::error::RouteGraphError::Config(_)));
        assert!(matches!(
            RouteGraphConfig::try_load(&dir.path().join("missing.toml")),
            Err(crate::error::RouteGraphError::Io(_))
        ));
    }
}
