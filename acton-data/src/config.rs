//! Configuration management using Figment
//!
//! Configuration is loaded from multiple sources with the following precedence (highest to lowest):
//! 1. Environment variables (prefix: `ACTON_`, nested keys separated by `__`)
//! 2. Current working directory: ./config.toml
//! 3. XDG config directory: ~/.config/acton-data/{service_name}/config.toml
//! 4. System directory: /etc/acton-data/{service_name}/config.toml
//! 5. Default values
//!
//! # Example
//!
//! ```toml
//! [service]
//! name = "inventory"
//! log_level = "debug"
//!
//! [repository]
//! default_page_size = 50
//! max_page_size = 200
//! page_base = 1
//! default_actor = "inventory-service"
//! ```
//!
//! `ACTON_REPOSITORY__MAX_PAGE_SIZE=500` overrides `repository.max_page_size`.

use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::Result;
use crate::repository::PageRequest;

const XDG_PREFIX: &str = "acton-data";

/// Main configuration structure
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    /// Service configuration
    pub service: ServiceConfig,

    /// Repository defaults
    #[serde(default)]
    pub repository: RepositoryConfig,
}

/// Service-level configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceConfig {
    /// Service name
    pub name: String,

    /// Log level or `EnvFilter` directive (e.g. `info,acton_data=debug`)
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Environment (dev, staging, production)
    #[serde(default = "default_environment")]
    pub environment: String,
}

/// Defaults applied by the generic repository
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepositoryConfig {
    /// Page size used when a caller does not pick one
    #[serde(default = "default_page_size")]
    pub default_page_size: usize,

    /// Upper bound for caller-chosen page sizes
    #[serde(default = "default_max_page_size")]
    pub max_page_size: usize,

    /// Index of the first page (0 or 1)
    #[serde(default)]
    pub page_base: usize,

    /// Recorded as `deleted_by` when a soft delete names no actor
    #[serde(default = "default_actor")]
    pub default_actor: String,
}

impl RepositoryConfig {
    /// Page request using the configured base and size limits
    ///
    /// `size` falls back to `default_page_size` and is capped at
    /// `max_page_size`.
    ///
    /// # Example
    ///
    /// ```rust
    /// use acton_data::config::RepositoryConfig;
    ///
    /// let config = RepositoryConfig::default();
    /// let request = config.page_request(0, Some(10_000));
    /// assert_eq!(request.size, config.max_page_size);
    /// ```
    #[must_use]
    pub fn page_request(&self, index: usize, size: Option<usize>) -> PageRequest {
        let size = size
            .unwrap_or(self.default_page_size)
            .min(self.max_page_size.max(1));
        PageRequest::new(index, size).with_from(self.page_base)
    }

    /// First page with the default size
    #[must_use]
    pub fn first_page(&self) -> PageRequest {
        self.page_request(self.page_base, None)
    }
}

impl Default for RepositoryConfig {
    fn default() -> Self {
        Self {
            default_page_size: default_page_size(),
            max_page_size: default_max_page_size(),
            page_base: 0,
            default_actor: default_actor(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_environment() -> String {
    "dev".to_string()
}

fn default_page_size() -> usize {
    20
}

fn default_max_page_size() -> usize {
    100
}

fn default_actor() -> String {
    "system".to_string()
}

impl Config {
    /// Load configuration from all sources
    ///
    /// Searches for config files in this order (first found is used):
    /// 1. Current working directory: ./config.toml
    /// 2. XDG config directory: ~/.config/acton-data/{service_name}/config.toml
    /// 3. System directory: /etc/acton-data/{service_name}/config.toml
    ///
    /// Environment variables (ACTON_ prefix) override all file-based configs.
    pub fn load() -> Result<Self> {
        // Try to infer service name from binary name or use default
        let service_name = std::env::current_exe()
            .ok()
            .and_then(|p| p.file_stem().map(|s| s.to_string_lossy().into_owned()))
            .unwrap_or_else(|| XDG_PREFIX.to_string());

        Self::load_for_service(&service_name)
    }

    /// Load configuration for a specific service name
    pub fn load_for_service(service_name: &str) -> Result<Self> {
        let config_paths = Self::find_config_paths(service_name);

        tracing::debug!("Searching for config files in order:");
        for path in &config_paths {
            tracing::debug!("  - {}", path.display());
        }

        let mut defaults = Config::default();
        defaults.service.name = service_name.to_string();
        let mut figment = Figment::new().merge(Serialized::defaults(defaults));

        // Lowest priority first so that higher priority files override
        for path in config_paths.iter().rev() {
            if path.exists() {
                tracing::info!("Loading configuration from: {}", path.display());
                figment = figment.merge(Toml::file(path));
            }
        }

        figment = figment.merge(Env::prefixed("ACTON_").split("__"));

        let config = figment.extract()?;
        Ok(config)
    }

    /// Load configuration from a specific file
    ///
    /// This bypasses XDG directories and loads directly from the given path.
    /// Environment variables still override the file.
    pub fn load_from(path: impl AsRef<Path>) -> Result<Self> {
        let config = Figment::new()
            .merge(Serialized::defaults(Config::default()))
            .merge(Toml::file(path.as_ref()))
            .merge(Env::prefixed("ACTON_").split("__"))
            .extract()?;

        Ok(config)
    }

    /// Find all possible config file paths for a service
    ///
    /// Returns paths in priority order (highest first).
    fn find_config_paths(service_name: &str) -> Vec<PathBuf> {
        let mut paths = vec![PathBuf::from("config.toml")];

        let xdg_dirs = xdg::BaseDirectories::with_prefix(XDG_PREFIX);
        let config_file_path = Path::new(service_name).join("config.toml");
        if let Some(path) = xdg_dirs.find_config_file(&config_file_path) {
            paths.push(path);
        }

        paths.push(
            PathBuf::from("/etc")
                .join(XDG_PREFIX)
                .join(service_name)
                .join("config.toml"),
        );

        paths
    }

    /// Create the config directory structure for a service
    ///
    /// Creates ~/.config/acton-data/{service_name}/ if it doesn't exist
    pub fn create_config_dir(service_name: &str) -> Result<PathBuf> {
        let xdg_dirs = xdg::BaseDirectories::with_prefix(XDG_PREFIX);
        let config_file_path = Path::new(service_name).join("config.toml");

        let config_path = xdg_dirs.place_config_file(&config_file_path)?;

        Ok(config_path
            .parent()
            .ok_or_else(|| crate::error::Error::Internal("Invalid config path".to_string()))?
            .to_path_buf())
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            service: ServiceConfig {
                name: XDG_PREFIX.to_string(),
                log_level: default_log_level(),
                environment: default_environment(),
            },
            repository: RepositoryConfig::default(),
        }
    }
}
