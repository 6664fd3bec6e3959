//! Generation dispatch: the seams the app calls through, and the
//! Idle/Generating state machine.
//!
//! Both seams are object-safe traits returning boxed futures so the app can
//! hold them behind `Arc<dyn …>` and tests can inject doubles without
//! touching the network or the disk.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use futures_util::future::BoxFuture;
use thiserror::Error;
use tokio::sync::oneshot;

use reverie_providers::ProviderConfig;
use reverie_types::GenerateRequest;

/// The external image-generation backend.
pub trait ImageGenerator: Send + Sync {
    fn generate<'a>(
        &'a self,
        request: &'a GenerateRequest,
    ) -> BoxFuture<'a, Result<Vec<PathBuf>, anyhow::Error>>;
}

/// File existence checks for pre-dispatch validation.
pub trait FileProbe: Send + Sync {
    fn exists<'a>(&'a self, path: &'a Path) -> BoxFuture<'a, bool>;
}

/// [`FileProbe`] backed by the real filesystem.
#[derive(Debug, Clone, Copy, Default)]
pub struct TokioFileProbe;

impl FileProbe for TokioFileProbe {
    fn exists<'a>(&'a self, path: &'a Path) -> BoxFuture<'a, bool> {
        Box::pin(async move { tokio::fs::try_exists(path).await.unwrap_or(false) })
    }
}

/// [`ImageGenerator`] backed by the configured HTTP provider.
#[derive(Debug, Clone)]
pub struct ProviderGenerator {
    config: ProviderConfig,
}

impl ProviderGenerator {
    #[must_use]
    pub fn new(config: ProviderConfig) -> Self {
        Self { config }
    }
}

impl ImageGenerator for ProviderGenerator {
    fn generate<'a>(
        &'a self,
        request: &'a GenerateRequest,
    ) -> BoxFuture<'a, Result<Vec<PathBuf>, anyhow::Error>> {
        Box::pin(async move {
            let paths = reverie_providers::generate(&self.config, request)
                .await
                .map_err(anyhow::Error::new)?;
            Ok(paths)
        })
    }
}

#[derive(Debug, Error)]
pub enum GenerateError {
    /// A request is already in flight; the new call is refused outright
    /// rather than racing the first one.
    #[error("a generation request is already in progress")]
    AlreadyGenerating,
    #[error(transparent)]
    Failed(#[from] anyhow::Error),
}

/// Outcome of a generation attempt that was allowed to start.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GenerateOutcome {
    /// The resolved prompt was empty; nothing was dispatched and no state
    /// changed.
    EmptyPrompt,
    /// The provider returned these output images.
    Generated(Vec<PathBuf>),
}

/// In-flight generation state. `Generating` owns the channel the spawned
/// task reports through.
#[derive(Debug, Default)]
pub(crate) enum GenerationState {
    #[default]
    Idle,
    Generating(oneshot::Receiver<Result<Vec<PathBuf>, GenerateError>>),
}

impl GenerationState {
    pub(crate) fn is_generating(&self) -> bool {
        matches!(self, Self::Generating(_))
    }
}

/// Validate attachments and call the provider. Runs inside the spawned
/// generation task, off the UI loop.
pub(crate) async fn dispatch(
    mut resolved: crate::resolver::ResolvedPrompt,
    negative_prompt: Option<String>,
    width: u32,
    height: u32,
    count: u32,
    generator: Arc<dyn ImageGenerator>,
    probe: Arc<dyn FileProbe>,
) -> Result<Vec<PathBuf>, GenerateError> {
    resolved.retain_existing(probe.as_ref()).await;

    let paths = resolved.referenced_image_paths().to_vec();
    let mapping = resolved.image_mapping().clone();
    let request = GenerateRequest {
        prompt: resolved.serialized_prompt().to_string(),
        negative_prompt: negative_prompt.filter(|p| !p.is_empty()),
        width,
        height,
        count,
        reference_images: if paths.is_empty() { None } else { Some(paths) },
        image_mapping: if mapping.is_empty() { None } else { Some(mapping) },
    };

    let images = generator.generate(&request).await?;
    Ok(images)
}
