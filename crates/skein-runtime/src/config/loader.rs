//! Configuration loader using figment.
//!
//! # Feature Flags
//!
//! - `toml-config` *(default)*: enables TOML configuration files (`skein.toml`)
//! - `yaml-config`: enables YAML configuration files (`skein.yaml`, `skein.yml`)
//!
//! # Configuration Priority (lowest to highest)
//!
//! 1. Built-in defaults
//! 2. Programmatic defaults ([`ConfigLoader::merge`], [`ConfigLoader::home`])
//! 3. Profile-specific config file (`skein.{profile}.toml`)
//! 4. Main config file (`skein.toml`)
//! 5. Environment variables (`SKEIN_*`)
//!
//! # Environment Variable Mapping
//!
//! Environment variables are mapped using the `SKEIN_` prefix with `__` as separator:
//!
//! - `SKEIN_LOGGING__LEVEL=debug` → `logging.level = "debug"`
//! - `SKEIN_AGENT__DUMP_ENHANCED_DIR=/tmp/dump` → `agent.dump_enhanced_dir = "/tmp/dump"`
//! - `SKEIN_PLUGIN__CONFIG__HTTP__TRACE_HEADERS=true` → `plugin.config.http.trace_headers = true`
//!
//! # Example
//!
//! ```rust,ignore
//! use skein_runtime::config::ConfigLoader;
//!
//! // Agent home holds skein.toml and the plugin mounts
//! let config = ConfigLoader::new().home("/opt/skein").load()?;
//!
//! // Explicit file, no environment overrides
//! let config = ConfigLoader::new()
//!     .file("./conf/skein.toml")
//!     .without_env()
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
use super::schema::SkeinConfig;

/// Prefix of environment variables overriding configuration keys.
pub const ENV_PREFIX: &str = "SKEIN_";

/// Environment variable selecting the configuration profile.
pub const PROFILE_ENV: &str = "SKEIN_PROFILE";

/// Configuration profile for environment-specific settings.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum Profile {
    /// Development profile (default).
    #[default]
    Development,
    /// Production profile.
    Production,
    /// Custom profile name.
    Custom(String),
}

impl Profile {
    /// Returns the profile name as a string.
    pub fn as_str(&self) -> &str {
        match self {
            Self::Development => "development",
            Self::Production => "production",
            Self::Custom(name) => name,
        }
    }

    /// Parses a profile name; unknown names become [`Profile::Custom`].
    pub fn parse(name: &str) -> Self {
        match name.to_lowercase().as_str() {
            "production" | "prod" => Self::Production,
            "development" | "dev" => Self::Development,
            other => Self::Custom(other.to_string()),
        }
    }

    /// Creates a profile from `SKEIN_PROFILE` or defaults to Development.
    pub fn from_env() -> Self {
        std::env::var(PROFILE_ENV)
            .map(|p| Self::parse(&p))
            .unwrap_or_default()
    }
}

impl std::fmt::Display for Profile {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Configuration loader with figment-based multi-source support.
pub struct ConfigLoader {
    /// Programmatic layers merged over the built-in defaults.
    figment: Figment,
    profile: Profile,
    search_paths: Vec<PathBuf>,
    load_env: bool,
    /// Specific config file to load (overrides search).
    config_file: Option<PathBuf>,
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}

impl ConfigLoader {
    /// Creates a new configuration loader with defaults.
    pub fn new() -> Self {
        Self {
            figment: Figment::new(),
            profile: Profile::from_env(),
            search_paths: Vec::new(),
            load_env: true,
            config_file: None,
        }
    }

    /// Sets the configuration profile.
    pub fn profile(mut self, profile: impl Into<String>) -> Self {
        self.profile = Profile::parse(&profile.into());
        self
    }

    /// Uses `home` as the agent home and searches it for config files.
    pub fn home<P: AsRef<Path>>(mut self, home: P) -> Self {
        let home = home.as_ref().to_path_buf();
        self.figment = self
            .figment
            .merge(Serialized::default("agent.home", &home));
        self.search_path(home)
    }

    /// Adds a search path for configuration files.
    pub fn search_path<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.search_paths.push(path.as_ref().to_path_buf());
        self
    }

    /// Adds current directory to search paths.
    pub fn with_current_dir(self) -> Self {
        if let Ok(cwd) = std::env::current_dir() {
            self.search_path(cwd)
        } else {
            self
        }
    }

    /// Adds user config directory to search paths.
    pub fn with_user_config_dir(self) -> Self {
        if let Some(config_dir) = dirs::config_dir() {
            self.search_path(config_dir.join("skein"))
        } else {
            self
        }
    }

    /// Sets a specific configuration file to load.
    pub fn file<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.config_file = Some(path.as_ref().to_path_buf());
        self
    }

    /// Enables loading environment variables (default: true).
    pub fn with_env(mut self) -> Self {
        self.load_env = true;
        self
    }

    /// Disables loading environment variables.
    pub fn without_env(mut self) -> Self {
        self.load_env = false;
        self
    }

    /// Merges additional configuration programmatically.
    pub fn merge(mut self, config: SkeinConfig) -> Self {
        self.figment = self.figment.merge(Serialized::defaults(config));
        self
    }

    /// Loads and returns the configuration.
    pub fn load(self) -> ConfigResult<SkeinConfig> {
        let profile = self.profile.clone();
        let figment = self.build_figment()?;

        let config: SkeinConfig = figment.extract().map_err(|e| {
            ConfigError::ParseError(format!("Failed to extract configuration: {e}"))
        })?;

        debug!(
            profile = %profile,
            enabled = config.agent.enabled,
            mounts = ?config.plugin.mount,
            logging_level = %config.logging.level,
            "Configuration loaded successfully"
        );

        Ok(config)
    }

    fn build_figment(mut self) -> ConfigResult<Figment> {
        let mut figment = Figment::from(Serialized::defaults(SkeinConfig::default()));

        let user_figment = std::mem::take(&mut self.figment);
        figment = figment.merge(user_figment);

        if let Some(path) = &self.config_file {
            if path.exists() {
                info!(path = %path.display(), "Loading configuration file");
                figment = Self::merge_config_file(figment, path)?;
            } else {
                return Err(ConfigError::FileNotFound(path.clone()));
            }
        } else {
            figment = self.load_config_files(figment);
        }

        if self.load_env {
            trace!(prefix = ENV_PREFIX, "Loading environment variables");
            figment = figment.merge(
                Env::prefixed(ENV_PREFIX)
                    .ignore(&["PROFILE"])
                    .split("__")
                    .map(|key| key.as_str().replace("__", ".").into()),
            );
        }

        Ok(figment)
    }

    /// Merges a single config file into the figment, dispatching on file extension.
    fn merge_config_file(figment: Figment, path: &Path) -> ConfigResult<Figment> {
        let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("");
        match ext {
            #[cfg(feature = "toml-config")]
            "toml" => Ok(figment.merge(Toml::file(path))),
            #[cfg(feature = "yaml-config")]
            "yaml" | "yml" => Ok(figment.merge(Yaml::file(path))),
            _ => Err(ConfigError::ParseError(format!(
                "Unsupported or disabled configuration file format: .{ext}"
            ))),
        }
    }

    fn resolve_search_paths(&self) -> Vec<PathBuf> {
        if self.search_paths.is_empty() {
            let mut paths = Vec::new();
            if let Ok(cwd) = std::env::current_dir() {
                paths.push(cwd);
            }
            if let Some(config_dir) = dirs::config_dir() {
                paths.push(config_dir.join("skein"));
            }
            paths
        } else {
            self.search_paths.clone()
        }
    }

    /// Searches one file format over `search_paths × base_names`.
    ///
    /// A profile-specific variant is merged before its base file; the first
    /// base file found ends the search.
    #[cfg(any(feature = "toml-config", feature = "yaml-config"))]
    fn load_format_files<F>(
        &self,
        mut figment: Figment,
        search_paths: &[PathBuf],
        base_names: &[&str],
        merge_fn: F,
    ) -> (Figment, bool)
    where
        F: Fn(Figment, &Path) -> Figment,
    {
        for search_path in search_paths {
            for base_name in base_names {
                if let Some((stem, ext)) = base_name.rsplit_once('.') {
                    let profile_path =
                        search_path.join(format!("{}.{}.{}", stem, self.profile.as_str(), ext));
                    if profile_path.exists() {
                        debug!(path = %profile_path.display(), "Loading profile-specific config");
                        figment = merge_fn(figment, &profile_path);
                    }

                    let base_path = search_path.join(base_name);
                    if base_path.exists() {
                        info!(path = %base_path.display(), "Loading configuration file");
                        figment = merge_fn(figment, &base_path);
                        return (figment, true);
                    }
                }
            }
        }
        (figment, false)
    }

    fn load_config_files(&self, mut figment: Figment) -> Figment {
        let search_paths = self.resolve_search_paths();
        let mut found = false;

        #[cfg(feature = "toml-config")]
        {
            let (f, ok) = self.load_format_files(figment, &search_paths, &["skein.toml"], |fig, path| {
                fig.merge(Toml::file(path))
            });
            figment = f;
            found |= ok;
        }

        #[cfg(feature = "yaml-config")]
        {
            let (f, ok) = self.load_format_files(
                figment,
                &search_paths,
                &["skein.yaml", "skein.yml"],
                |fig, path| fig.merge(Yaml::file(path)),
            );
            figment = f;
            found |= ok;
        }

        if !found {
            warn!("No configuration file found, using defaults");
        }
        figment
    }
}

/// Loads configuration from the default locations.
pub fn load_config() -> ConfigResult<SkeinConfig> {
    ConfigLoader::new().load()
}

/// Loads configuration from `path`, with environment overrides.
pub fn load_config_from_file<P: AsRef<Path>>(path: P) -> ConfigResult<SkeinConfig> {
    ConfigLoader::new().file(path).load()
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::LogLevel;

    #[test]
    fn test_default_config() {
        let dir = tempfile::tempdir().unwrap();
        let config = ConfigLoader::new()
            .search_path(dir.path())
            .without_env()
            .load()
            .unwrap();

        assert_eq!(config.logging.level.as_str(), "info");
        assert_eq!(config.plugin.mount, ["plugins", "activations"]);
        assert!(config.agent.dump_enhanced_dir.is_none());
    }

    #[test]
    fn test_home_sets_agent_home() {
        let dir = tempfile::tempdir().unwrap();
        let config = ConfigLoader::new().home(dir.path()).without_env().load().unwrap();
        assert_eq!(config.agent.home.as_deref(), Some(dir.path()));
        assert_eq!(config.mount_paths()[0], dir.path().join("plugins"));
    }

    #[cfg(feature = "toml-config")]
    #[test]
    fn test_toml_file_in_home() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("skein.toml"),
            r#"
[agent]
ignore_prefixes = ["org.internal."]

[plugin]
exclude = ["jdbc"]

[plugin.config.http]
trace_headers = true

[logging]
level = "warn"
"#,
        )
        .unwrap();

        let config = ConfigLoader::new().home(dir.path()).without_env().load().unwrap();
        assert_eq!(config.agent.ignore_prefixes, ["org.internal."]);
        assert_eq!(config.plugin.exclude, ["jdbc"]);
        assert_eq!(config.plugin.config["http"]["trace_headers"], true);
        assert_eq!(config.logging.level, LogLevel::Warn);
        assert_eq!(config.agent.home.as_deref(), Some(dir.path()));
    }

    #[cfg(feature = "toml-config")]
    #[test]
    fn test_profile_file_is_merged_under_base() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("skein.toml"), "[logging]\nlevel = \"warn\"\n").unwrap();
        std::fs::write(
            dir.path().join("skein.staging.toml"),
            "[logging]\nlevel = \"debug\"\n\n[plugin]\nexclude = [\"grpc\"]\n",
        )
        .unwrap();

        let config = ConfigLoader::new()
            .profile("staging")
            .search_path(dir.path())
            .without_env()
            .load()
            .unwrap();
        assert_eq!(config.logging.level, LogLevel::Warn);
        assert_eq!(config.plugin.exclude, ["grpc"]);
    }

    #[test]
    fn test_missing_explicit_file() {
        let err = ConfigLoader::new()
            .file("/nonexistent/skein.toml")
            .without_env()
            .load()
            .err()
            .unwrap();
        assert!(matches!(err, ConfigError::FileNotFound(_)));
    }

    #[test]
    fn test_unsupported_extension() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("skein.ini");
        std::fs::write(&path, "level=debug").unwrap();
        let err = ConfigLoader::new().file(&path).without_env().load().err().unwrap();
        assert!(matches!(err, ConfigError::ParseError(_)));
    }

    #[test]
    fn test_env_overrides() {
        let dir = tempfile::tempdir().unwrap();
        // SAFETY: these variables are read by this test only and removed right after
        unsafe {
            std::env::set_var("SKEIN_AGENT__DUMP_ENHANCED_DIR", "/tmp/skein-dump");
            std::env::set_var("SKEIN_PLUGIN__CONFIG__REDIS__DB", "3");
        }
        let config = ConfigLoader::new().search_path(dir.path()).load();
        unsafe {
            std::env::remove_var("SKEIN_AGENT__DUMP_ENHANCED_DIR");
            std::env::remove_var("SKEIN_PLUGIN__CONFIG__REDIS__DB");
        }

        let config = config.unwrap();
        assert_eq!(
            config.agent.dump_enhanced_dir.as_deref(),
            Some(Path::new("/tmp/skein-dump"))
        );
        assert_eq!(config.plugin.config["redis"]["db"], 3);
    }

    #[test]
    fn test_profile_parse() {
        assert_eq!(Profile::parse("prod"), Profile::Production);
        assert_eq!(Profile::parse("Development"), Profile::Development);
        assert_eq!(Profile::parse("staging"), Profile::Custom("staging".into()));
    }

    #[test]
    fn test_profile_from_env() {
        // SAFETY: This test is single-threaded and we clean up immediately after
        unsafe {
            std::env::set_var(PROFILE_ENV, "production");
        }
        let profile = Profile::from_env();
        unsafe {
            std::env::remove_var(PROFILE_ENV);
        }
        assert_eq!(profile, Profile::Production);
    }
}
