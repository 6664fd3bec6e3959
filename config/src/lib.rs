//! Settings file loading.
//!
//! Reverie reads `~/.config/reverie/config.toml` (overridable via the
//! `REVERIE_CONFIG` environment variable):
//!
//! ```toml
//! [app]
//! provider = "doubao"          # or "zhipu"
//! output_dir = "~/Pictures/Reverie"
//!
//! [api_keys]
//! doubao = "..."
//! zhipu = "..."
//!
//! [zhipu]
//! watermark = true
//!
//! [generation]
//! width = 1024
//! height = 1024
//! count = 1
//! ```
//!
//! `DOUBAO_API_KEY` / `ZHIPU_API_KEY` environment variables take precedence
//! over file keys.

use std::path::PathBuf;
use std::{env, fs};

use serde::Deserialize;
use thiserror::Error;

const fn default_true() -> bool {
    true
}

const fn default_dimension() -> u32 {
    1024
}

const fn default_count() -> u32 {
    1
}

#[derive(Debug, Default, Deserialize)]
pub struct ReverieConfig {
    pub app: Option<AppConfig>,
    pub api_keys: Option<ApiKeys>,
    pub zhipu: Option<ZhipuConfig>,
    pub generation: Option<GenerationDefaults>,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config at {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse config at {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
}

impl ConfigError {
    #[must_use]
    pub fn path(&self) -> &PathBuf {
        match self {
            ConfigError::Read { path, .. } | ConfigError::Parse { path, .. } => path,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct AppConfig {
    /// Provider name: "doubao" (default) or "zhipu".
    pub provider: Option<String>,
    /// Where generated images are written. Relative paths are resolved
    /// against the user's pictures directory.
    pub output_dir: Option<PathBuf>,
}

#[derive(Default, Deserialize)]
pub struct ApiKeys {
    pub doubao: Option<String>,
    pub zhipu: Option<String>,
}

// Manual Debug impl to prevent leaking API keys in logs.
impl std::fmt::Debug for ApiKeys {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        fn mask(opt: Option<&String>) -> &'static str {
            if opt.is_some() { "[REDACTED]" } else { "None" }
        }
        f.debug_struct("ApiKeys")
            .field("doubao", &mask(self.doubao.as_ref()))
            .field("zhipu", &mask(self.zhipu.as_ref()))
            .finish()
    }
}

#[derive(Debug, Deserialize)]
pub struct ZhipuConfig {
    /// Ask the backend to watermark outputs. Default: true.
    #[serde(default = "default_true")]
    pub watermark: bool,
}

impl Default for ZhipuConfig {
    fn default() -> Self {
        Self { watermark: true }
    }
}

#[derive(Debug, Deserialize)]
pub struct GenerationDefaults {
    #[serde(default = "default_dimension")]
    pub width: u32,
    #[serde(default = "default_dimension")]
    pub height: u32,
    #[serde(default = "default_count")]
    pub count: u32,
}

impl Default for GenerationDefaults {
    fn default() -> Self {
        Self {
            width: 1024,
            height: 1024,
            count: 1,
        }
    }
}

impl ReverieConfig {
    /// Load from the default location; a missing file yields defaults.
    pub fn load() -> Result<Self, ConfigError> {
        match config_path() {
            Some(path) if path.exists() => Self::load_from(&path),
            _ => Ok(Self::default()),
        }
    }

    pub fn load_from(path: &PathBuf) -> Result<Self, ConfigError> {
        let raw = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.clone(),
            source,
        })?;
        toml::from_str(&raw).map_err(|source| ConfigError::Parse {
            path: path.clone(),
            source,
        })
    }

    /// API key for the named provider; env var wins over the file.
    #[must_use]
    pub fn api_key(&self, provider: &str) -> Option<String> {
        let env_var = match provider {
            "doubao" => "DOUBAO_API_KEY",
            "zhipu" => "ZHIPU_API_KEY",
            _ => return None,
        };
        if let Ok(key) = env::var(env_var)
            && !key.trim().is_empty()
        {
            return Some(key);
        }
        let keys = self.api_keys.as_ref()?;
        match provider {
            "doubao" => keys.doubao.clone(),
            "zhipu" => keys.zhipu.clone(),
            _ => None,
        }
    }

    /// Resolved output directory; relative paths land under the user's
    /// pictures directory, defaulting to `Reverie/Outputs`.
    #[must_use]
    pub fn output_dir(&self) -> PathBuf {
        let configured = self
            .app
            .as_ref()
            .and_then(|app| app.output_dir.clone())
            .unwrap_or_else(|| PathBuf::from("Reverie/Outputs"));
        if configured.is_absolute() {
            return configured;
        }
        dirs::picture_dir()
            .or_else(dirs::home_dir)
            .map(|base| base.join(&configured))
            .unwrap_or(configured)
    }
}

/// The config file path, honoring the `REVERIE_CONFIG` override.
#[must_use]
pub fn config_path() -> Option<PathBuf> {
    if let Ok(path) = env::var("REVERIE_CONFIG")
        && !path.trim().is_empty()
    {
        return Some(PathBuf::from(path));
    }
    dirs::config_dir().map(|dir| dir.join("reverie").join("config.toml"))
}
