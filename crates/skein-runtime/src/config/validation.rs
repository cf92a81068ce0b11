//! Configuration validation utilities.

use std::collections::HashSet;

use super::error::{ConfigError, ConfigResult};
use super::schema::{AgentConfig, LogOutput, LoggingConfig, PluginConfig, SkeinConfig};

/// Validates the entire configuration.
pub fn validate_config(config: &SkeinConfig) -> ConfigResult<()> {
    validate_agent_config(&config.agent)?;
    validate_plugin_config(&config.plugin)?;
    validate_logging_config(&config.logging)?;
    Ok(())
}

fn validate_agent_config(agent: &AgentConfig) -> ConfigResult<()> {
    if let Some(home) = &agent.home
        && home.exists()
        && !home.is_dir()
    {
        return Err(ConfigError::validation(format!(
            "Agent home is not a directory: {}",
            home.display()
        )));
    }

    if agent.ignore_prefixes.iter().any(|p| p.trim().is_empty()) {
        return Err(ConfigError::validation("Ignore prefixes cannot be empty"));
    }

    if let Some(dir) = &agent.dump_enhanced_dir
        && dir.exists()
        && !dir.is_dir()
    {
        return Err(ConfigError::validation(format!(
            "Enhanced unit dump path is not a directory: {}",
            dir.display()
        )));
    }

    Ok(())
}

fn validate_plugin_config(plugin: &PluginConfig) -> ConfigResult<()> {
    if plugin.mount.is_empty() {
        return Err(ConfigError::missing_field("plugin.mount"));
    }

    let mut seen = HashSet::new();
    for mount in &plugin.mount {
        if mount.trim().is_empty() {
            return Err(ConfigError::validation("Plugin mount cannot be empty"));
        }
        if !seen.insert(mount.as_str()) {
            return Err(ConfigError::DuplicateMount(mount.clone()));
        }
    }

    if plugin.manifest.trim().is_empty() {
        return Err(ConfigError::missing_field("plugin.manifest"));
    }
    if plugin.declarations.trim().is_empty() {
        return Err(ConfigError::missing_field("plugin.declarations"));
    }

    if plugin.exclude.iter().any(|name| name.trim().is_empty()) {
        return Err(ConfigError::validation("Excluded plugin names cannot be empty"));
    }

    for (root, section) in &plugin.config {
        if root.trim().is_empty() {
            return Err(ConfigError::validation("Plugin config root cannot be empty"));
        }
        if !section.is_object() {
            return Err(ConfigError::invalid_section(root, "expected a table"));
        }
    }

    Ok(())
}

fn validate_logging_config(logging: &LoggingConfig) -> ConfigResult<()> {
    if logging.output == LogOutput::File && logging.file_path.is_none() {
        return Err(ConfigError::missing_field("logging.file_path"));
    }

    if logging.filters.keys().any(|module| module.trim().is_empty()) {
        return Err(ConfigError::validation("Log filter module cannot be empty"));
    }

    Ok(())
}
