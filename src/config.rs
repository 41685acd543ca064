//! Configuration module for symdex.
//!
//! This module provides a layered configuration system that supports:
//! - Default values
//! - TOML configuration file (`.symdex/settings.toml`)
//! - Environment variable overrides
//! - CLI argument overrides (applied by the binary)
//!
//! # Environment Variables
//!
//! Environment variables must be prefixed with `SYMDEX_` and use double
//! underscores to separate nested levels:
//! - `SYMDEX_INDEXING__THREADS=8` sets `indexing.threads`
//! - `SYMDEX_PACKAGES__MANAGER=npm` sets `packages.manager`
//! - `SYMDEX_PROJECT__VERSION=1.2.0` sets `project.version`

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

use crate::indexing::FailurePolicy;
use crate::symbol::{Ecosystem, NameNormalization};

const CONFIG_DIR: &str = ".symdex";

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct Settings {
    /// Version of the configuration schema
    #[serde(default = "default_version")]
    pub version: u32,

    /// Workspace root directory (where .symdex is located)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub workspace_root: Option<PathBuf>,

    #[serde(default)]
    pub project: ProjectConfig,

    #[serde(default)]
    pub indexing: IndexingConfig,

    #[serde(default)]
    pub packages: PackagesConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Identity of the indexed project. Unset fields are detected at run time.
#[derive(Debug, Deserialize, Serialize, Clone, Default)]
pub struct ProjectConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,

    /// Project root directory (defaults to workspace root)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub root: Option<PathBuf>,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct IndexingConfig {
    /// Number of naming threads
    #[serde(default = "default_threads")]
    pub threads: usize,

    /// Directory holding analyzer output (`*.json`, one per source file)
    #[serde(default = "default_analysis_dir")]
    pub analysis_dir: PathBuf,

    /// Where the finished index is written
    #[serde(default = "default_output")]
    pub output: PathBuf,

    #[serde(default)]
    pub failure_policy: FailurePolicy,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct PackagesConfig {
    /// SCIP scheme prefix of global symbols
    #[serde(default = "default_scheme")]
    pub scheme: String,

    /// Package manager field of global symbols
    #[serde(default = "default_manager")]
    pub manager: String,

    /// How package names are rewritten in root symbols
    #[serde(default = "default_normalization")]
    pub normalization: NameNormalization,

    /// Cached environment to use instead of querying pip
    #[serde(skip_serializing_if = "Option::is_none")]
    pub environment: Option<PathBuf>,

    /// Where `symdex environment` writes caches
    #[serde(default = "default_cache_dir")]
    pub cache_dir: PathBuf,

    #[serde(default = "default_pip_command")]
    pub pip_command: String,

    /// Package names per `pip show` invocation
    #[serde(default = "default_pip_batch_size")]
    pub pip_batch_size: usize,
}

/// Logging configuration.
///
/// Controls log verbosity globally and per-module.
/// `RUST_LOG` environment variable takes precedence when set.
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct LoggingConfig {
    /// Default log level: "error", "warn", "info", "debug", "trace"
    #[serde(default = "default_log_level")]
    pub default: String,

    /// Per-module overrides, e.g. `symdex::indexing = "debug"`
    #[serde(default)]
    pub modules: HashMap<String, String>,
}

// Default value functions
fn default_version() -> u32 {
    1
}
fn default_threads() -> usize {
    num_cpus::get().saturating_sub(1).max(1)
}
fn default_analysis_dir() -> PathBuf {
    PathBuf::from(".symdex/analysis")
}
fn default_output() -> PathBuf {
    PathBuf::from("index.scip")
}
fn default_scheme() -> String {
    Ecosystem::python().scheme
}
fn default_manager() -> String {
    "pypi".to_string()
}
fn default_normalization() -> NameNormalization {
    Ecosystem::python().normalization
}
fn default_cache_dir() -> PathBuf {
    PathBuf::from(".symdex/cache")
}
fn default_pip_command() -> String {
    "pip".to_string()
}
fn default_pip_batch_size() -> usize {
    256
}
fn default_log_level() -> String {
    "warn".to_string()
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            version: default_version(),
            workspace_root: None,
            project: ProjectConfig::default(),
            indexing: IndexingConfig::default(),
            packages: PackagesConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

impl Default for IndexingConfig {
    fn default() -> Self {
        Self {
            threads: default_threads(),
            analysis_dir: default_analysis_dir(),
            output: default_output(),
            failure_policy: FailurePolicy::default(),
        }
    }
}

impl Default for PackagesConfig {
    fn default() -> Self {
        Self {
            scheme: default_scheme(),
            manager: default_manager(),
            normalization: default_normalization(),
            environment: None,
            cache_dir: default_cache_dir(),
            pip_command: default_pip_command(),
            pip_batch_size: default_pip_batch_size(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            default: default_log_level(),
            modules: HashMap::new(),
        }
    }
}

impl Settings {
    /// Load configuration from all sources
    pub fn load() -> Result<Self, Box<figment::Error>> {
        // Try to find the workspace root by looking for .symdex directory
        let config_path = Self::find_workspace_config()
            .unwrap_or_else(|| PathBuf::from(CONFIG_DIR).join("settings.toml"));

        Self::figment(&config_path)
            .extract()
            .map_err(Box::new)
            .map(|mut settings: Settings| {
                // If workspace_root is not set in config, detect it
                if settings.workspace_root.is_none() {
                    settings.workspace_root = Self::workspace_root();
                }
                settings
            })
    }

    /// Load configuration from a specific file
    pub fn load_from(path: impl AsRef<Path>) -> Result<Self, Box<figment::Error>> {
        Self::figment(path.as_ref()).extract().map_err(Box::new)
    }

    fn figment(config_path: &Path) -> Figment {
        Figment::new()
            // Start with defaults
            .merge(Serialized::defaults(Settings::default()))
            // Layer in config file if it exists
            .merge(Toml::file(config_path))
            // Double underscore (__) separates nested levels,
            // single underscore (_) remains as is within field names
            .merge(Env::prefixed("SYMDEX_").map(|key| {
                key.as_str()
                    .to_lowercase()
                    .replace("__", ".")
                    .into()
            }))
    }

    /// Find the workspace config by looking for .symdex directory
    /// Searches from current directory up to root
    fn find_workspace_config() -> Option<PathBuf> {
        Self::workspace_root().map(|root| root.join(CONFIG_DIR).join("settings.toml"))
    }

    /// Get the workspace root directory (where .symdex is located)
    pub fn workspace_root() -> Option<PathBuf> {
        let current = std::env::current_dir().ok()?;

        current
            .ancestors()
            .find(|ancestor| ancestor.join(CONFIG_DIR).is_dir())
            .map(Path::to_path_buf)
    }

    /// Root of the project being indexed
    pub fn project_root(&self) -> PathBuf {
        self.project
            .root
            .clone()
            .or_else(|| self.workspace_root.clone())
            .unwrap_or_else(|| PathBuf::from("."))
    }

    /// Naming conventions for global symbols
    pub fn ecosystem(&self) -> Ecosystem {
        Ecosystem {
            scheme: self.packages.scheme.clone(),
            normalization: self.packages.normalization,
        }
    }

    /// Save current configuration to file
    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), Box<dyn std::error::Error>> {
        let parent = path.as_ref().parent().ok_or("Invalid path")?;
        std::fs::create_dir_all(parent)?;

        let toml_string = toml::to_string_pretty(self)?;
        std::fs::write(path, toml_string)?;

        Ok(())
    }

    /// Create a default settings file in the current directory
    pub fn init_config_file(force: bool) -> Result<PathBuf, Box<dyn std::error::Error>> {
        let config_path = PathBuf::from(CONFIG_DIR).join("settings.toml");

        if !force && config_path.exists() {
            return Err("Configuration file already exists. Use --force to overwrite".into());
        }

        let mut settings = Settings::default();
        if let Ok(current_dir) = std::env::current_dir() {
            settings.workspace_root = Some(current_dir);
        }

        settings.save(&config_path)?;
        Ok(config_path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_default_settings() {
        let settings = Settings::default();
        assert_eq!(settings.version, 1);
        assert!(settings.indexing.threads > 0);
        assert_eq!(settings.indexing.failure_policy, FailurePolicy::Continue);
        assert_eq!(settings.packages.manager, "pypi");
        assert_eq!(settings.packages.pip_batch_size, 256);
        assert_eq!(settings.ecosystem(), Ecosystem::python());
        assert_eq!(settings.logging.default, "warn");
    }

    #[test]
    fn test_load_from_toml() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("settings.toml");

        let toml_content = r#"
version = 2

[project]
name = "snapshot-util"
version = "0.1"

[indexing]
threads = 4
failure_policy = "abort"

[packages]
scheme = "scip-typescript"
manager = "npm"
normalization = { rule = "verbatim" }
environment = "/tmp/env.json"

[logging.modules]
"symdex::indexing" = "debug"
"#;

        fs::write(&config_path, toml_content).unwrap();

        let settings = Settings::load_from(&config_path).unwrap();
        assert_eq!(settings.version, 2);
        assert_eq!(settings.project.name.as_deref(), Some("snapshot-util"));
        assert_eq!(settings.project.version.as_deref(), Some("0.1"));
        assert_eq!(settings.indexing.threads, 4);
        assert_eq!(settings.indexing.failure_policy, FailurePolicy::Abort);
        assert_eq!(settings.ecosystem(), Ecosystem::typescript());
        assert_eq!(settings.packages.manager, "npm");
        assert_eq!(
            settings.packages.environment,
            Some(PathBuf::from("/tmp/env.json"))
        );
        assert_eq!(settings.logging.modules["symdex::indexing"], "debug");
    }

    #[test]
    fn test_save_settings() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("nested").join("settings.toml");

        let mut settings = Settings::default();
        settings.indexing.threads = 2;
        settings.packages.manager = "conda".to_string();

        settings.save(&config_path).unwrap();

        let loaded = Settings::load_from(&config_path).unwrap();
        assert_eq!(loaded.indexing.threads, 2);
        assert_eq!(loaded.packages.manager, "conda");
        assert_eq!(loaded.ecosystem(), Ecosystem::python());
    }

    #[test]
    fn test_partial_config() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("settings.toml");

        // Only specify a few settings
        let toml_content = r#"
[indexing]
threads = 16
"#;

        fs::write(&config_path, toml_content).unwrap();

        let settings = Settings::load_from(&config_path).unwrap();

        // Modified values
        assert_eq!(settings.indexing.threads, 16);

        // Default values should still be present
        assert_eq!(settings.version, 1);
        assert_eq!(settings.indexing.output, PathBuf::from("index.scip"));
        assert_eq!(settings.packages.scheme, "scip-python");
        assert!(settings.project.name.is_none());
    }

    #[test]
    fn test_project_root_precedence() {
        let mut settings = Settings::default();
        assert_eq!(settings.project_root(), PathBuf::from("."));

        settings.workspace_root = Some(PathBuf::from("/work"));
        assert_eq!(settings.project_root(), PathBuf::from("/work"));

        settings.project.root = Some(PathBuf::from("/work/src"));
        assert_eq!(settings.project_root(), PathBuf::from("/work/src"));
    }

    #[test]
    fn test_layered_config() {
        let temp_dir = TempDir::new().unwrap();
        let original_dir = std::env::current_dir().unwrap();
        std::env::set_current_dir(&temp_dir).unwrap();

        // Create config directory
        let config_dir = temp_dir.path().join(".symdex");
        fs::create_dir_all(&config_dir).unwrap();

        let toml_content = r#"
[indexing]
threads = 8

[packages]
pip_command = "pip3"
"#;
        fs::write(config_dir.join("settings.toml"), toml_content).unwrap();

        // Set environment variables that should override config file
        unsafe {
            std::env::set_var("SYMDEX_PACKAGES__PIP_COMMAND", "python3 -m pip");
            std::env::set_var("SYMDEX_LOGGING__DEFAULT", "debug");
        }

        let settings = Settings::load().unwrap();

        // Environment variable should override config file
        assert_eq!(settings.packages.pip_command, "python3 -m pip");
        // Config file value should be used when no env var
        assert_eq!(settings.indexing.threads, 8);
        // Env var adds new value not in config
        assert_eq!(settings.logging.default, "debug");
        assert!(settings.workspace_root.is_some());

        // Clean up
        unsafe {
            std::env::remove_var("SYMDEX_PACKAGES__PIP_COMMAND");
            std::env::remove_var("SYMDEX_LOGGING__DEFAULT");
        }
        std::env::set_current_dir(original_dir).unwrap();
    }
}
