use super::types::*;
use regex::{Captures, Regex};
use std::collections::{BTreeSet, HashSet};
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse YAML: {0}")]
    YamlParse(#[from] serde_yaml::Error),

    #[error("validation failed:\n{}", .0.join("\n"))]
    ValidationList(Vec<String>),

    #[error("validation failed: {0}")]
    Validation(String),
}

/// Load, expand, and validate the config document. Any failure here is
/// fatal: no worker may spawn on a config that did not fully validate.
pub fn load_config(path: &Path) -> Result<Config, ConfigError> {
    let raw = std::fs::read_to_string(path).map_err(|e| {
        ConfigError::Io(std::io::Error::new(
            e.kind(),
            format!("failed to read config file '{}': {}", path.display(), e),
        ))
    })?;

    let expanded = expand_env_refs(&raw)?;

    let mut config: Config = serde_yaml::from_str(&expanded).map_err(|e| {
        ConfigError::Io(std::io::Error::new(
            std::io::ErrorKind::InvalidData,
            format!("in file '{}': {}", path.display(), e),
        ))
    })?;

    for file in &mut config.files {
        file.path = expand_home(&file.path);
    }

    validate_config(&config)?;

    Ok(config)
}

/// Substitute every `$env{VAR}` reference in a single pass over the raw
/// document, before YAML parsing. References to unset variables are
/// collected and reported together; a document never half-expands.
fn expand_env_refs(document: &str) -> Result<String, ConfigError> {
    let re = Regex::new(r"\$env\{([A-Za-z_][A-Za-z0-9_]*)\}").unwrap();
    let mut missing = BTreeSet::new();

    let expanded = re.replace_all(document, |caps: &Captures| {
        let name = &caps[1];
        match std::env::var(name) {
            Ok(value) => value,
            Err(_) => {
                missing.insert(name.to_string());
                String::new()
            }
        }
    });

    if missing.is_empty() {
        Ok(expanded.into_owned())
    } else {
        Err(ConfigError::Validation(format!(
            "environment variables are not set: {}",
            missing.into_iter().collect::<Vec<_>>().join(", ")
        )))
    }
}

/// Expand a leading `~` path component to the user's home directory.
/// Anything else (`~user`, mid-path tildes) is left untouched.
pub fn expand_home(path: &Path) -> PathBuf {
    let Ok(rest) = path.strip_prefix("~") else {
        return path.to_path_buf();
    };
    match dirs::home_dir() {
        Some(home) if rest.as_os_str().is_empty() => home,
        Some(home) => home.join(rest),
        None => path.to_path_buf(),
    }
}

/// Validates the whole document, collecting every problem rather than
/// stopping at the first. Unknown output references are caught here so the
/// dispatch table lookup can never fail at runtime.
pub fn validate_config(config: &Config) -> Result<(), ConfigError> {
    let mut errors = Vec::new();

    let mut sink_names = HashSet::new();
    for sink in &config.sinks {
        if sink.name.is_empty() {
            errors.push("sink with empty name".to_string());
            continue;
        }
        if !sink_names.insert(sink.name.as_str()) {
            errors.push(format!("duplicate sink name '{}'", sink.name));
        }
        validate_sink(sink, &mut errors);
    }

    for file in &config.files {
        for output in &file.outputs {
            if !sink_names.contains(output.as_str()) {
                errors.push(format!(
                    "file '{}' references unknown sink '{}'",
                    file.path.display(),
                    output
                ));
            }
        }
    }

    for rotation in &config.rotations {
        if rotation.files.is_empty() {
            errors.push("rotation with no file patterns".to_string());
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(ConfigError::ValidationList(errors))
    }
}

/// Mandatory connection parameters are checked up front so a sink never
/// silently runs without them.
fn validate_sink(sink: &SinkSpec, errors: &mut Vec<String>) {
    match &sink.kind {
        SinkKind::Publisher {
            endpoint,
            topic,
            auth_token,
        } => {
            if endpoint.is_empty() {
                errors.push(format!("publisher sink '{}' missing endpoint", sink.name));
            }
            if topic.is_empty() {
                errors.push(format!("publisher sink '{}' missing topic", sink.name));
            }
            if auth_token.is_empty() {
                errors.push(format!("publisher sink '{}' missing auth_token", sink.name));
            }
        }
        SinkKind::Warehouse {
            endpoint, project, ..
        } => {
            if endpoint.is_empty() {
                errors.push(format!("warehouse sink '{}' missing endpoint", sink.name));
            }
            if project.is_empty() {
                errors.push(format!("warehouse sink '{}' missing project", sink.name));
            }
        }
        SinkKind::Indexer { hosts, index } => {
            if hosts.is_empty() {
                errors.push(format!("indexer sink '{}' has no hosts", sink.name));
            }
            if index.is_empty() {
                errors.push(format!("indexer sink '{}' missing index", sink.name));
            }
        }
        SinkKind::Logger { .. } | SinkKind::Disabled => {}
    }
}
