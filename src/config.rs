// config.rs

use std::path::PathBuf;
use tracing::warn;

const DEFAULT_PROMPT: &str = "$ ";

/// Startup settings taken from the environment.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ShellConfig {
    pub histfile: Option<PathBuf>,
    pub histfile_size: Option<usize>,
    pub prompt: String,
}

impl Default for ShellConfig {
    fn default() -> Self {
        Self {
            histfile: None,
            histfile_size: None,
            prompt: DEFAULT_PROMPT.to_string(),
        }
    }
}

impl ShellConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the config from any variable source.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let histfile = lookup("HISTFILE")
            .filter(|s| !s.trim().is_empty())
            .map(PathBuf::from);
        let histfile_size = lookup("HISTFILESIZE").and_then(|raw| match raw.trim().parse() {
            Ok(n) => Some(n),
            Err(_) => {
                warn!(value = %raw, "ignoring unparsable HISTFILESIZE");
                None
            }
        });
        let prompt = lookup("PS1").unwrap_or_else(|| DEFAULT_PROMPT.to_string());
        Self { histfile, histfile_size, prompt }
    }
}
