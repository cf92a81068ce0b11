//! Configuration schema definitions.

use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use skein_framework::{DEFAULT_DECLARATIONS, DEFAULT_MANIFEST};

/// Root configuration structure.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct SkeinConfig {
    /// Agent-wide settings.
    #[serde(default)]
    pub agent: AgentConfig,

    /// Plugin discovery settings and per-plugin configuration sections.
    #[serde(default)]
    pub plugin: PluginConfig,

    /// Logging settings.
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl SkeinConfig {
    /// Absolute mount directories, in search order.
    ///
    /// Relative mounts are resolved against the agent home.
    pub fn mount_paths(&self) -> Vec<PathBuf> {
        let home = self.agent.home_dir();
        self.plugin
            .mount
            .iter()
            .map(|mount| {
                let mount = Path::new(mount);
                if mount.is_absolute() {
                    mount.to_path_buf()
                } else {
                    home.join(mount)
                }
            })
            .collect()
    }
}

// =============================================================================
// Agent
// =============================================================================

/// Agent-wide settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentConfig {
    /// Whether the agent attaches at all.
    #[serde(default = "default_enabled")]
    pub enabled: bool,

    /// Agent home directory; mounts are resolved against it.
    ///
    /// Defaults to the current directory.
    #[serde(default)]
    pub home: Option<PathBuf>,

    /// Extra unit name prefixes never handed to plugins.
    #[serde(default)]
    pub ignore_prefixes: Vec<String>,

    /// Directory receiving a copy of every enhanced unit image.
    #[serde(default)]
    pub dump_enhanced_dir: Option<PathBuf>,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            enabled: default_enabled(),
            home: None,
            ignore_prefixes: Vec::new(),
            dump_enhanced_dir: None,
        }
    }
}

impl AgentConfig {
    /// The configured home, or the current directory.
    pub fn home_dir(&self) -> PathBuf {
        match &self.home {
            Some(home) => home.clone(),
            None => std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")),
        }
    }
}

fn default_enabled() -> bool {
    true
}

// =============================================================================
// Plugins
// =============================================================================

/// Plugin discovery settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PluginConfig {
    /// Mount directories holding plugin archives, searched in order.
    #[serde(default = "default_mount")]
    pub mount: Vec<String>,

    /// Manifest resource name inside archives.
    #[serde(default = "default_manifest")]
    pub manifest: String,

    /// Structured declaration resource name inside archives.
    #[serde(default = "default_declarations")]
    pub declarations: String,

    /// Plugin names to leave out.
    #[serde(default)]
    pub exclude: Vec<String>,

    /// Configuration sections handed to plugins, keyed by root.
    ///
    /// A root such as `http.client` is looked up as a key first, then as a
    /// path into nested tables.
    #[serde(default)]
    pub config: BTreeMap<String, serde_json::Value>,
}

impl Default for PluginConfig {
    fn default() -> Self {
        Self {
            mount: default_mount(),
            manifest: default_manifest(),
            declarations: default_declarations(),
            exclude: Vec::new(),
            config: BTreeMap::new(),
        }
    }
}

fn default_mount() -> Vec<String> {
    vec!["plugins".to_string(), "activations".to_string()]
}

fn default_manifest() -> String {
    DEFAULT_MANIFEST.to_string()
}

fn default_declarations() -> String {
    DEFAULT_DECLARATIONS.to_string()
}

// =============================================================================
// Logging
// =============================================================================

/// Logging settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Global log level.
    #[serde(default)]
    pub level: LogLevel,

    /// Output format.
    #[serde(default)]
    pub format: LogFormat,

    /// Output destination.
    #[serde(default)]
    pub output: LogOutput,

    /// Span lifecycle events to log.
    #[serde(default)]
    pub span_events: SpanEventConfig,

    /// Include thread ids.
    #[serde(default)]
    pub thread_ids: bool,

    /// Include source file and line.
    #[serde(default)]
    pub file_location: bool,

    /// Log file, required when `output = "file"`.
    #[serde(default)]
    pub file_path: Option<PathBuf>,

    /// Log file rotation.
    #[serde(default)]
    pub rotation: LogRotation,

    /// Per-module levels, e.g. `skein_loader = "debug"`.
    #[serde(default)]
    pub filters: BTreeMap<String, LogLevel>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: LogLevel::default(),
            format: LogFormat::default(),
            output: LogOutput::default(),
            span_events: SpanEventConfig::default(),
            thread_ids: false,
            file_location: false,
            file_path: None,
            rotation: LogRotation::default(),
            filters: BTreeMap::new(),
        }
    }
}

/// Log level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Trace,
    Debug,
    #[default]
    Info,
    Warn,
    Error,
}

impl LogLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Trace => "trace",
            Self::Debug => "debug",
            Self::Info => "info",
            Self::Warn => "warn",
            Self::Error => "error",
        }
    }

    pub fn to_tracing_level(self) -> tracing::Level {
        match self {
            Self::Trace => tracing::Level::TRACE,
            Self::Debug => tracing::Level::DEBUG,
            Self::Info => tracing::Level::INFO,
            Self::Warn => tracing::Level::WARN,
            Self::Error => tracing::Level::ERROR,
        }
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Compact,
    Full,
    Pretty,
    #[cfg(feature = "json-log")]
    Json,
}

/// Log output destination.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogOutput {
    #[default]
    Stdout,
    Stderr,
    File,
}

/// Log file rotation period.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogRotation {
    #[default]
    Never,
    Hourly,
    Daily,
}

/// Which span lifecycle events are logged.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SpanEventConfig {
    #[serde(default)]
    pub new: bool,
    #[serde(default)]
    pub enter: bool,
    #[serde(default)]
    pub exit: bool,
    #[serde(default)]
    pub close: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = SkeinConfig::default();
        assert!(config.agent.enabled);
        assert_eq!(config.plugin.mount, ["plugins", "activations"]);
        assert_eq!(config.plugin.manifest, DEFAULT_MANIFEST);
        assert_eq!(config.plugin.declarations, DEFAULT_DECLARATIONS);
        assert_eq!(config.logging.level, LogLevel::Info);
    }

    #[test]
    fn test_mount_paths_resolve_against_home() {
        let mut config = SkeinConfig::default();
        config.agent.home = Some(PathBuf::from("/opt/skein"));
        config.plugin.mount = vec!["plugins".into(), "/srv/extra".into()];
        assert_eq!(
            config.mount_paths(),
            [PathBuf::from("/opt/skein/plugins"), PathBuf::from("/srv/extra")]
        );
    }

    #[test]
    fn test_deserialize_partial_sections() {
        let config: SkeinConfig = serde_json::from_str(
            r#"{
                "agent": {"ignore_prefixes": ["org.internal."]},
                "plugin": {"exclude": ["jdbc"], "config": {"http": {"trace_headers": true}}},
                "logging": {"level": "debug", "filters": {"skein_loader": "trace"}}
            }"#,
        )
        .unwrap();
        assert!(config.agent.enabled);
        assert_eq!(config.agent.ignore_prefixes, ["org.internal."]);
        assert_eq!(config.plugin.mount, ["plugins", "activations"]);
        assert_eq!(config.plugin.exclude, ["jdbc"]);
        assert_eq!(config.plugin.config["http"]["trace_headers"], true);
        assert_eq!(config.logging.level, LogLevel::Debug);
        assert_eq!(config.logging.filters["skein_loader"], LogLevel::Trace);
    }
}
