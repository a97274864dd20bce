//! Configuration loader using figment.
//!
//! # Feature Flags
//!
//! - `toml-config` *(default)*: enables TOML configuration files (`tether.toml`, `config.toml`)
//! - `yaml-config`: enables YAML configuration files (`tether.yaml`, `tether.yml`, etc.)
//!
//! # Configuration Priority (lowest to highest)
//!
//! 1. Built-in defaults
//! 2. Programmatic merges ([`ConfigLoader::merge`])
//! 3. Main config file (`tether.toml`)
//! 4. Profile variant of that file (`tether.{profile}.toml`)
//! 5. Environment variables (`TETHER_*`)
//!
//! # Environment Variable Mapping
//!
//! Environment variables use the `TETHER_` prefix with `__` as separator:
//!
//! - `TETHER_LOGGING__LEVEL=debug` → `logging.level = "debug"`
//! - `TETHER_ROUTER__SILENCE_WARNINGS=true` → `router.silence_warnings = true`
//!
//! # Example
//!
//! ```rust,ignore
//! use tether_runtime::config::ConfigLoader;
//!
//! let config = ConfigLoader::new()
//!     .profile("production")
//!     .load()?;
//! ```

use std::path::{Path, PathBuf};

use figment::Figment;
#[cfg(any(feature = "yaml-config", feature = "toml-config"))]
use figment::providers::Format;
#[cfg(feature = "toml-config")]
use figment::providers::Toml;
#[cfg(feature = "yaml-config")]
use figment::providers::Yaml;
use figment::providers::{Env, Serialized};
use tracing::{debug, info, trace, warn};

use super::error::{ConfigError, ConfigResult};
use super::schema::TetherConfig;

/// Configuration profile for environment-specific settings.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum Profile {
    #[default]
    Development,
    Production,
    Custom(String),
}

impl Profile {
    pub fn as_str(&self) -> &str {
        match self {
            Self::Development => "development",
            Self::Production => "production",
            Self::Custom(name) => name,
        }
    }

    /// Parses a profile name; `prod` and `dev` are accepted as short forms.
    pub fn parse(name: &str) -> Self {
        match name.to_lowercase().as_str() {
            "production" | "prod" => Self::Production,
            "development" | "dev" => Self::Development,
            other => Self::Custom(other.to_string()),
        }
    }

    /// Reads `TETHER_PROFILE`, defaulting to development.
    pub fn from_env() -> Self {
        std::env::var("TETHER_PROFILE")
            .map(|p| Self::parse(&p))
            .unwrap_or_default()
    }
}

impl std::fmt::Display for Profile {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Builds a [`TetherConfig`] from defaults, files and the environment.
pub struct ConfigLoader {
    overrides: Figment,
    profile: Profile,
    search_paths: Vec<PathBuf>,
    file: Option<PathBuf>,
    env: bool,
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}

impl ConfigLoader {
    pub fn new() -> Self {
        Self {
            overrides: Figment::new(),
            profile: Profile::from_env(),
            search_paths: Vec::new(),
            file: None,
            env: true,
        }
    }

    pub fn profile(mut self, profile: impl AsRef<str>) -> Self {
        self.profile = Profile::parse(profile.as_ref());
        self
    }

    /// Adds a directory to look for configuration files in. Without any, the
    /// working directory and the user config directory are searched.
    pub fn search_path(mut self, dir: impl AsRef<Path>) -> Self {
        self.search_paths.push(dir.as_ref().to_path_buf());
        self
    }

    /// Loads exactly this file instead of searching. It must exist.
    pub fn file(mut self, path: impl AsRef<Path>) -> Self {
        self.file = Some(path.as_ref().to_path_buf());
        self
    }

    /// Ignores `TETHER_*` environment variables.
    pub fn without_env(mut self) -> Self {
        self.env = false;
        self
    }

    /// Layers `config` over the built-in defaults, below files and env.
    pub fn merge(mut self, config: TetherConfig) -> Self {
        self.overrides = self.overrides.merge(Serialized::defaults(config));
        self
    }

    pub fn load(self) -> ConfigResult<TetherConfig> {
        let profile = self.profile.clone();
        let config: TetherConfig = self
            .into_figment()?
            .extract()
            .map_err(|e| ConfigError::ParseError(format!("Failed to extract configuration: {e}")))?;

        debug!(
            profile = %profile,
            logging_level = %config.logging.level,
            silence_warnings = config.router.silence_warnings,
            "Configuration loaded"
        );
        Ok(config)
    }

    fn into_figment(self) -> ConfigResult<Figment> {
        let files = match &self.file {
            Some(path) if !path.exists() => return Err(ConfigError::FileNotFound(path.clone())),
            Some(path) => vec![path.clone()],
            None => self.discover(),
        };
        if files.is_empty() {
            warn!("No configuration file found, using defaults");
        }

        let mut figment = Figment::from(Serialized::defaults(TetherConfig::default())).merge(self.overrides);
        for path in &files {
            info!(path = %path.display(), "Loading configuration file");
            figment = merge_file(figment, path)?;
        }

        if self.env {
            trace!("Reading TETHER_* environment variables");
            figment = figment.merge(Env::prefixed("TETHER_").split("__"));
        }
        Ok(figment)
    }

    /// The first known file name present in a search directory, followed by
    /// its profile variant (`tether.production.toml`) when that exists too.
    fn discover(&self) -> Vec<PathBuf> {
        for dir in self.search_dirs() {
            for name in file_names() {
                let base = dir.join(name);
                let variant = profile_variant(&base, &self.profile).filter(|p| p.exists());
                let found: Vec<PathBuf> = [Some(base).filter(|p| p.exists()), variant]
                    .into_iter()
                    .flatten()
                    .collect();
                if !found.is_empty() {
                    return found;
                }
            }
        }
        Vec::new()
    }

    fn search_dirs(&self) -> Vec<PathBuf> {
        if !self.search_paths.is_empty() {
            return self.search_paths.clone();
        }
        std::env::current_dir()
            .into_iter()
            .chain(dirs::config_dir().map(|dir| dir.join("tether")))
            .collect()
    }
}

/// File names searched for, per enabled format.
#[cfg_attr(not(any(feature = "toml-config", feature = "yaml-config")), allow(unused_mut))]
fn file_names() -> Vec<&'static str> {
    let mut names = Vec::new();
    #[cfg(feature = "toml-config")]
    names.extend(["tether.toml", "config.toml"]);
    #[cfg(feature = "yaml-config")]
    names.extend(["tether.yaml", "tether.yml", "config.yaml", "config.yml"]);
    names
}

fn profile_variant(base: &Path, profile: &Profile) -> Option<PathBuf> {
    let stem = base.file_stem()?.to_str()?;
    let ext = base.extension()?.to_str()?;
    Some(base.with_file_name(format!("{stem}.{profile}.{ext}")))
}

/// Merges one file, choosing the provider by extension.
#[cfg_attr(not(any(feature = "toml-config", feature = "yaml-config")), allow(unused_variables))]
fn merge_file(figment: Figment, path: &Path) -> ConfigResult<Figment> {
    match path.extension().and_then(|e| e.to_str()).unwrap_or("") {
        #[cfg(feature = "toml-config")]
        "toml" => Ok(figment.merge(Toml::file(path))),
        #[cfg(feature = "yaml-config")]
        "yaml" | "yml" => Ok(figment.merge(Yaml::file(path))),
        ext => Err(ConfigError::ParseError(format!(
            "Unsupported or disabled configuration file format: .{ext}"
        ))),
    }
}

/// Loads configuration from the default locations.
pub fn load_config() -> ConfigResult<TetherConfig> {
    ConfigLoader::new().load()
}

/// Loads configuration from one file, with environment overrides.
pub fn load_config_from_file(path: impl AsRef<Path>) -> ConfigResult<TetherConfig> {
    ConfigLoader::new().file(path).load()
}

// =============================================================================
// Tests
// =============================================================================
