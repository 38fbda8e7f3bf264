//! Configuration loading for Errata.
//!
//! ```toml
//! [diagnostics]
//! debounce_ms = 1000
//!
//! [log]
//! filter = "errata_provider=debug,info"
//! ```

use std::path::{Path, PathBuf};
use std::{env, fs};

use errata_provider::ProviderConfig;
use serde::Deserialize;

#[derive(Debug, Default, Deserialize)]
pub struct ErrataConfig {
    /// Provider tuning. Missing keys take the provider defaults.
    pub diagnostics: Option<ProviderConfig>,
    pub log: Option<LogConfig>,
}

#[derive(Debug, Default, Deserialize)]
pub struct LogConfig {
    /// `tracing` filter directive. `${VAR}` references are expanded.
    pub filter: Option<String>,
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config at {}: {source}", path.display())]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to parse config at {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },
}

impl ConfigError {
    #[must_use]
    pub fn path(&self) -> &Path {
        match self {
            ConfigError::Read { path, .. } | ConfigError::Parse { path, .. } => path,
        }
    }
}

/// Replace `${VAR}` with the variable's value (empty when unset).
///
/// An unclosed `${` is kept verbatim.
#[must_use]
pub fn expand_env_vars(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    let mut rest = value;

    while let Some(open) = rest.find("${") {
        out.push_str(&rest[..open]);
        let after = &rest[open + 2..];
        let Some(close) = after.find('}') else {
            out.push_str(&rest[open..]);
            return out;
        };
        let var = &after[..close];
        if !var.is_empty() {
            out.push_str(&env::var(var).unwrap_or_default());
        }
        rest = &after[close + 1..];
    }

    out.push_str(rest);
    out
}

impl ErrataConfig {
    /// Load `~/.errata/config.toml`. `Ok(None)` when there is no file.
    pub fn load() -> Result<Option<Self>, ConfigError> {
        let Some(path) = config_path() else {
            return Ok(None);
        };
        Self::load_from(&path)
    }

    pub fn load_from(path: &Path) -> Result<Option<Self>, ConfigError> {
        if !path.exists() {
            return Ok(None);
        }

        let content = match fs::read_to_string(path) {
            Ok(content) => content,
            Err(err) => {
                tracing::warn!("Failed to read config at {:?}: {}", path, err);
                return Err(ConfigError::Read {
                    path: path.to_path_buf(),
                    source: err,
                });
            }
        };

        match Self::parse(&content) {
            Ok(config) => Ok(Some(config)),
            Err(err) => {
                tracing::warn!("Failed to parse config at {:?}: {}", path, err);
                Err(ConfigError::Parse {
                    path: path.to_path_buf(),
                    source: err,
                })
            }
        }
    }

    pub fn parse(content: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(content)
    }

    #[must_use]
    pub fn path() -> Option<PathBuf> {
        config_path()
    }

    #[must_use]
    pub fn provider_config(&self) -> ProviderConfig {
        self.diagnostics.clone().unwrap_or_default()
    }

    /// The configured log filter, env-expanded. Blank counts as unset.
    #[must_use]
    pub fn log_filter(&self) -> Option<String> {
        let raw = self.log.as_ref()?.filter.as_deref()?;
        let expanded = expand_env_vars(raw);
        let trimmed = expanded.trim();
        (!trimmed.is_empty()).then(|| trimmed.to_string())
    }
}

fn config_path() -> Option<PathBuf> {
    dirs::home_dir().map(|home| home.join(".errata").join("config.toml"))
}
