//! Zhipu (BigModel) GLM image-generation client.
//!
//! Zhipu is text-to-image only; reference images in the request are ignored
//! (with a log line, so the silent drop is at least visible in traces).

use std::path::PathBuf;

use serde_json::json;

use reverie_types::GenerateRequest;

use crate::{ProviderConfig, ProviderError, download_and_save, extract_image_urls, post_json};

const PROVIDER: &str = "zhipu";

const MODEL: &str = "glm-image";

pub(crate) async fn generate(
    client: &reqwest::Client,
    config: &ProviderConfig,
    request: &GenerateRequest,
) -> Result<Vec<PathBuf>, ProviderError> {
    let api_key = config.require_api_key()?;

    if request
        .reference_images
        .as_deref()
        .is_some_and(|paths| !paths.is_empty())
    {
        tracing::warn!("Zhipu does not support reference images; ignoring them");
    }

    let body = build_request_body(request, config.zhipu_watermark);
    tracing::debug!(count = request.count, size = %request.size_string(), "Dispatching Zhipu generation");

    let payload = post_json(client, config.endpoint(), api_key, &body, PROVIDER).await?;
    let urls = extract_image_urls(&payload, PROVIDER)?;
    download_and_save(client, &urls, &config.output_dir, PROVIDER).await
}

fn build_request_body(request: &GenerateRequest, watermark_enabled: bool) -> serde_json::Value {
    let mut body = json!({
        "model": MODEL,
        "prompt": request.prompt,
        "size": request.size_string(),
        "watermark_enabled": watermark_enabled,
    });

    if let Some(negative) = request.negative_prompt.as_deref() {
        body["negative_prompt"] = json!(negative);
    }

    body
}

#[cfg(test)]
mod tests {
    use super::build_request_body;
    use reverie_types::GenerateRequest;

    #[test]
    fn watermark_flag_comes_from_settings() {
        let request = GenerateRequest {
            prompt: "poster art".to_string(),
            negative_prompt: None,
            width: 512,
            height: 512,
            count: 1,
            reference_images: None,
            image_mapping: None,
        };
        let body = build_request_body(&request, false);
        assert_eq!(body["watermark_enabled"], false);
        assert_eq!(body["model"], "glm-image");
        assert_eq!(body["size"], "512x512");
    }
}
