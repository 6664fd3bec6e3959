//! Image-generation provider clients with unified dispatch.
//!
//! # Architecture
//!
//! The crate is organized around a provider dispatch pattern:
//!
//! - [`generate`] - Unified entry point that dispatches to provider-specific implementations
//! - [`doubao`] - Volcengine Ark Doubao client (Seedream image generation)
//! - [`zhipu`] - Zhipu BigModel client (GLM image generation)
//!
//! Both providers take a [`reverie_types::GenerateRequest`], POST a
//! provider-shaped JSON body, download every image URL the response lists,
//! and return the saved file paths.
//!
//! # Configuration
//!
//! Use [`ProviderConfig`] to bundle the provider choice, API key, output
//! directory, and provider-specific flags. `endpoint_override` exists so
//! tests can point a provider at a local mock server; production callers
//! leave it empty and get the canonical endpoint.
//!
//! # Error Handling
//!
//! All failures surface as [`ProviderError`]. Non-2xx responses carry the
//! response body verbatim - provider error payloads are the most useful
//! diagnostic the user gets.

pub mod doubao;
pub mod zhipu;

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;
use std::time::Duration;

use base64::Engine as _;
use base64::prelude::BASE64_STANDARD;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use reverie_types::GenerateRequest;

pub use reverie_types;

/// Canonical Doubao (Volcengine Ark) image-generation endpoint.
pub const DOUBAO_IMAGES_API_URL: &str =
    "https://ark.cn-beijing.volces.com/api/v3/images/generations";
/// Canonical Zhipu (BigModel) image-generation endpoint.
pub const ZHIPU_IMAGES_API_URL: &str =
    "https://open.bigmodel.cn/api/paas/v4/images/generations";

const CONNECT_TIMEOUT_SECS: u64 = 30;

/// Largest reference image accepted for inline base64 attachment.
const MAX_REFERENCE_IMAGE_BYTES: u64 = 10 * 1024 * 1024;

/// Which image-generation backend to call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    #[default]
    Doubao,
    Zhipu,
}

impl ProviderKind {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Doubao => "doubao",
            Self::Zhipu => "zhipu",
        }
    }

    #[must_use]
    pub const fn display_name(self) -> &'static str {
        match self {
            Self::Doubao => "Doubao (Seedream)",
            Self::Zhipu => "Zhipu (GLM)",
        }
    }

    /// Environment variable consulted for this provider's API key.
    #[must_use]
    pub const fn env_var(self) -> &'static str {
        match self {
            Self::Doubao => "DOUBAO_API_KEY",
            Self::Zhipu => "ZHIPU_API_KEY",
        }
    }

    #[must_use]
    pub const fn endpoint(self) -> &'static str {
        match self {
            Self::Doubao => DOUBAO_IMAGES_API_URL,
            Self::Zhipu => ZHIPU_IMAGES_API_URL,
        }
    }
}

impl fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for ProviderKind {
    type Err = UnknownProviderError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "doubao" => Ok(Self::Doubao),
            "zhipu" => Ok(Self::Zhipu),
            other => Err(UnknownProviderError(other.to_string())),
        }
    }
}

#[derive(Debug, Error)]
#[error("unknown provider {0:?} (expected \"doubao\" or \"zhipu\")")]
pub struct UnknownProviderError(pub String);

#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("{provider} API key not configured; set {env_var} or add it to the config file")]
    MissingApiKey {
        provider: &'static str,
        env_var: &'static str,
    },
    #[error("{provider} API error ({status}): {body}")]
    Api {
        provider: &'static str,
        status: u16,
        body: String,
    },
    #[error("{provider} response missing image data")]
    MalformedResponse { provider: &'static str },
    #[error("request to {provider} failed: {source}")]
    Http {
        provider: &'static str,
        #[source]
        source: reqwest::Error,
    },
    #[error("failed to download generated image: {0}")]
    Download(#[source] reqwest::Error),
    #[error("failed to save generated image to {path}: {source}")]
    Save {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("cannot attach reference image {path}: {reason}")]
    ReferenceImage { path: PathBuf, reason: String },
}

/// Everything the dispatchers need besides the request itself.
#[derive(Debug, Clone)]
pub struct ProviderConfig {
    pub kind: ProviderKind,
    pub api_key: Option<String>,
    pub output_dir: PathBuf,
    /// Zhipu-only: ask the backend to watermark outputs.
    pub zhipu_watermark: bool,
    /// Test seam: overrides the canonical endpoint when set.
    pub endpoint_override: Option<String>,
}

impl ProviderConfig {
    #[must_use]
    pub fn new(kind: ProviderKind, api_key: Option<String>, output_dir: PathBuf) -> Self {
        Self {
            kind,
            api_key,
            output_dir,
            zhipu_watermark: true,
            endpoint_override: None,
        }
    }

    #[must_use]
    pub fn endpoint(&self) -> &str {
        self.endpoint_override
            .as_deref()
            .unwrap_or_else(|| self.kind.endpoint())
    }

    pub(crate) fn require_api_key(&self) -> Result<&str, ProviderError> {
        self.api_key
            .as_deref()
            .filter(|key| !key.trim().is_empty())
            .ok_or(ProviderError::MissingApiKey {
                provider: self.kind.as_str(),
                env_var: self.kind.env_var(),
            })
    }
}

/// Shared hardened HTTP client for production calls.
pub fn http_client() -> &'static reqwest::Client {
    static CLIENT: OnceLock<reqwest::Client> = OnceLock::new();
    CLIENT.get_or_init(|| {
        reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(CONNECT_TIMEOUT_SECS))
            .redirect(reqwest::redirect::Policy::none())
            .build()
            .unwrap_or_else(|e| {
                tracing::error!("Failed to build HTTP client: {e}. Falling back to defaults.");
                reqwest::Client::new()
            })
    })
}

/// Run one generation request against the configured provider.
///
/// Returns the paths of the downloaded output images, in response order.
pub async fn generate(
    config: &ProviderConfig,
    request: &GenerateRequest,
) -> Result<Vec<PathBuf>, ProviderError> {
    generate_with_client(http_client(), config, request).await
}

/// [`generate`] with an explicit client; tests pass a plain client pointed
/// at a mock server.
pub async fn generate_with_client(
    client: &reqwest::Client,
    config: &ProviderConfig,
    request: &GenerateRequest,
) -> Result<Vec<PathBuf>, ProviderError> {
    match config.kind {
        ProviderKind::Doubao => doubao::generate(client, config, request).await,
        ProviderKind::Zhipu => zhipu::generate(client, config, request).await,
    }
}

/// Extract the `data[].url` entries every provider response carries.
pub(crate) fn extract_image_urls(
    payload: &serde_json::Value,
    provider: &'static str,
) -> Result<Vec<String>, ProviderError> {
    let urls: Vec<String> = payload
        .get("data")
        .and_then(serde_json::Value::as_array)
        .ok_or(ProviderError::MalformedResponse { provider })?
        .iter()
        .filter_map(|item| item.get("url").and_then(serde_json::Value::as_str))
        .map(ToString::to_string)
        .collect();
    if urls.is_empty() {
        return Err(ProviderError::MalformedResponse { provider });
    }
    Ok(urls)
}

/// Download each URL and save it under the output directory as
/// `<provider>_<millis>_<index>.png`.
pub(crate) async fn download_and_save(
    client: &reqwest::Client,
    urls: &[String],
    output_dir: &Path,
    provider: &'static str,
) -> Result<Vec<PathBuf>, ProviderError> {
    if !output_dir.exists() {
        tokio::fs::create_dir_all(output_dir)
            .await
            .map_err(|source| ProviderError::Save {
                path: output_dir.to_path_buf(),
                source,
            })?;
    }

    let timestamp = chrono::Utc::now().timestamp_millis();
    let mut saved = Vec::with_capacity(urls.len());
    for (i, url) in urls.iter().enumerate() {
        let bytes = client
            .get(url)
            .send()
            .await
            .and_then(reqwest::Response::error_for_status)
            .map_err(ProviderError::Download)?
            .bytes()
            .await
            .map_err(ProviderError::Download)?;

        let path = output_dir.join(format!("{provider}_{timestamp}_{i}.png"));
        tokio::fs::write(&path, &bytes)
            .await
            .map_err(|source| ProviderError::Save {
                path: path.clone(),
                source,
            })?;
        tracing::info!(path = %path.display(), "Saved generated image");
        saved.push(path);
    }
    Ok(saved)
}

/// POST a JSON body with bearer auth and return the parsed response payload.
pub(crate) async fn post_json(
    client: &reqwest::Client,
    endpoint: &str,
    api_key: &str,
    body: &serde_json::Value,
    provider: &'static str,
) -> Result<serde_json::Value, ProviderError> {
    let response = client
        .post(endpoint)
        .header("Authorization", format!("Bearer {api_key}"))
        .json(body)
        .send()
        .await
        .map_err(|source| ProviderError::Http { provider, source })?;

    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(ProviderError::Api {
            provider,
            status: status.as_u16(),
            body,
        });
    }

    response
        .json()
        .await
        .map_err(|source| ProviderError::Http { provider, source })
}

fn mime_type_for(path: &Path) -> Option<&'static str> {
    let ext = path.extension()?.to_str()?.to_ascii_lowercase();
    match ext.as_str() {
        "jpg" | "jpeg" => Some("image/jpeg"),
        "png" => Some("image/png"),
        "webp" => Some("image/webp"),
        "gif" => Some("image/gif"),
        _ => None,
    }
}

/// Encode a reference image as a `data:` URI for inline attachment.
pub(crate) async fn image_to_data_uri(path: &Path) -> Result<String, ProviderError> {
    let mime = mime_type_for(path).ok_or_else(|| ProviderError::ReferenceImage {
        path: path.to_path_buf(),
        reason: "unsupported file extension".to_string(),
    })?;

    let metadata = tokio::fs::metadata(path)
        .await
        .map_err(|e| ProviderError::ReferenceImage {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;
    if metadata.len() > MAX_REFERENCE_IMAGE_BYTES {
        return Err(ProviderError::ReferenceImage {
            path: path.to_path_buf(),
            reason: format!(
                "too large: {:.2}MB (max 10MB)",
                metadata.len() as f64 / (1024.0 * 1024.0)
            ),
        });
    }

    let bytes = tokio::fs::read(path)
        .await
        .map_err(|e| ProviderError::ReferenceImage {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;
    Ok(format!("data:{mime};base64,{}", BASE64_STANDARD.encode(&bytes)))
}
