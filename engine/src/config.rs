use std::env;
use std::path::PathBuf;
use std::time::Duration;

use serde::Deserialize;
use thiserror::Error;

use wrangle_gateway::{GatewayConfig, GatewayConfigError};
use wrangle_types::UiOptions;

/// Environment variable that overrides `backend.base_url`.
pub const API_URL_ENV: &str = "WRANGLE_API_URL";

pub const DEFAULT_PAGE_SIZE: usize = 50;

/// On-disk configuration (`~/.wrangle/config.toml`). Every field is optional.
#[derive(Debug, Default, Deserialize)]
pub struct WrangleConfig {
    pub backend: Option<BackendConfig>,
    pub app: Option<AppConfig>,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config at {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse config at {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
    #[error(transparent)]
    BaseUrl(#[from] GatewayConfigError),
}

impl ConfigError {
    #[must_use]
    pub fn path(&self) -> Option<&PathBuf> {
        match self {
            ConfigError::Read { path, .. } | ConfigError::Parse { path, .. } => Some(path),
            ConfigError::BaseUrl(_) => None,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct BackendConfig {
    /// Base URL of the suggestion backend, including the `/api` prefix.
    pub base_url: Option<String>,
    pub connect_timeout_secs: Option<u64>,
    pub request_timeout_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
pub struct AppConfig {
    /// Use ASCII-only glyphs for markers and spinners.
    #[serde(default)]
    pub ascii_only: bool,
    /// Enable a high-contrast color palette.
    #[serde(default)]
    pub high_contrast: bool,
    /// Directory that receives exported CSV files and scripts.
    pub export_dir: Option<String>,
    /// Data preview rows per page.
    pub page_size: Option<usize>,
}

/// Fully resolved runtime settings.
#[derive(Debug, Clone)]
pub struct Settings {
    pub gateway: GatewayConfig,
    pub ui: UiOptions,
    pub export_dir: PathBuf,
    pub page_size: usize,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            gateway: GatewayConfig::default(),
            ui: UiOptions::default(),
            export_dir: PathBuf::from("."),
            page_size: DEFAULT_PAGE_SIZE,
        }
    }
}

/// Replace `${VAR}` references with the variable's value (empty when unset).
#[must_use]
pub fn expand_env_vars(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    let mut rest = value;

    while let Some(start) = rest.find("${") {
        let Some(end_rel) = rest[start + 2..].find('}') else {
            break;
        };
        out.push_str(&rest[..start]);
        let var = &rest[start + 2..start + 2 + end_rel];
        if !var.is_empty() {
            out.push_str(&env::var(var).unwrap_or_default());
        }
        rest = &rest[start + 2 + end_rel + 1..];
    }
    out.push_str(rest);
    out
}

impl WrangleConfig {
    pub fn load() -> Result<Option<Self>, ConfigError> {
        let Some(path) = config_path() else {
            return Ok(None);
        };
        Self::load_from(path)
    }

    pub fn load_from(path: PathBuf) -> Result<Option<Self>, ConfigError> {
        if !path.exists() {
            return Ok(None);
        }

        let content = match std::fs::read_to_string(&path) {
            Ok(content) => content,
            Err(err) => {
                tracing::warn!("Failed to read config at {:?}: {}", path, err);
                return Err(ConfigError::Read { path, source: err });
            }
        };

        match toml::from_str(&content) {
            Ok(config) => Ok(Some(config)),
            Err(err) => {
                tracing::warn!("Failed to parse config at {:?}: {}", path, err);
                Err(ConfigError::Parse { path, source: err })
            }
        }
    }

    /// Resolve into [`Settings`], applying `url_override` (from [`API_URL_ENV`]) last.
    pub fn resolve(&self, url_override: Option<&str>) -> Result<Settings, ConfigError> {
        let backend = self.backend.as_ref();
        let app = self.app.as_ref();

        let base_url = url_override
            .map(str::to_string)
            .filter(|url| !url.trim().is_empty())
            .or_else(|| {
                backend
                    .and_then(|b| b.base_url.as_deref())
                    .map(expand_env_vars)
            });
        let mut gateway = match base_url {
            Some(url) => GatewayConfig::new(&url)?,
            None => GatewayConfig::default(),
        };
        if let Some(secs) = backend.and_then(|b| b.connect_timeout_secs) {
            gateway = gateway.with_connect_timeout(Duration::from_secs(secs.max(1)));
        }
        if let Some(secs) = backend.and_then(|b| b.request_timeout_secs) {
            gateway = gateway.with_request_timeout(Duration::from_secs(secs.max(1)));
        }

        let export_dir = app
            .and_then(|a| a.export_dir.as_deref())
            .map(expand_env_vars)
            .filter(|dir| !dir.trim().is_empty())
            .map_or_else(|| PathBuf::from("."), PathBuf::from);

        Ok(Settings {
            gateway,
            ui: UiOptions {
                ascii_only: app.is_some_and(|a| a.ascii_only),
                high_contrast: app.is_some_and(|a| a.high_contrast),
            },
            export_dir,
            page_size: app
                .and_then(|a| a.page_size)
                .unwrap_or(DEFAULT_PAGE_SIZE)
                .max(1),
        })
    }

    #[must_use]
    pub fn path() -> Option<PathBuf> {
        config_path()
    }
}

#[must_use]
pub fn config_path() -> Option<PathBuf> {
    dirs::home_dir().map(|home| home.join(".wrangle").join("config.toml"))
}
