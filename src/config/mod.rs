pub mod parse;
pub mod types;

pub use parse::{load_config, ConfigError};
pub use types::Config;

use std::path::{Path, PathBuf};

/// Locate the config file. An explicit path always wins; otherwise the
/// first standard location that exists is used:
/// `~/.config/fling/config.yml`, then `/etc/fling/config.yml`.
pub fn resolve_config_path(explicit: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit {
        return Some(parse::expand_home(path));
    }

    let mut candidates: Vec<PathBuf> = Vec::new();
    if let Some(home) = dirs::home_dir() {
        candidates.push(home.join(".config/fling/config.yml"));
    }
    candidates.push(PathBuf::from("/etc/fling/config.yml"));

    candidates.into_iter().find(|candidate| candidate.exists())
}
