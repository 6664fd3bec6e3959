//! Doubao (Volcengine Ark) Seedream image-generation client.
//!
//! Doubao accepts reference images inline as base64 data URIs: a single
//! image is sent as a bare string under `"image"`, several as an array.

use std::path::PathBuf;

use serde_json::json;

use reverie_types::GenerateRequest;

use crate::{
    ProviderConfig, ProviderError, download_and_save, extract_image_urls, image_to_data_uri,
    post_json,
};

const PROVIDER: &str = "doubao";

/// Recommended Seedream model per the Ark image-generation docs.
const MODEL: &str = "doubao-seedream-4-5-251128";

pub(crate) async fn generate(
    client: &reqwest::Client,
    config: &ProviderConfig,
    request: &GenerateRequest,
) -> Result<Vec<PathBuf>, ProviderError> {
    let api_key = config.require_api_key()?;

    let mut reference_uris = Vec::new();
    if let Some(paths) = request.reference_images.as_deref() {
        for path in paths {
            reference_uris.push(image_to_data_uri(path).await?);
        }
    }

    let body = build_request_body(request, &reference_uris);
    tracing::debug!(count = request.count, size = %request.size_string(), "Dispatching Doubao generation");

    let payload = post_json(client, config.endpoint(), api_key, &body, PROVIDER).await?;
    let urls = extract_image_urls(&payload, PROVIDER)?;
    download_and_save(client, &urls, &config.output_dir, PROVIDER).await
}

fn build_request_body(request: &GenerateRequest, reference_uris: &[String]) -> serde_json::Value {
    let mut body = json!({
        "model": MODEL,
        "prompt": request.prompt,
        "sequential_image_generation": if request.count > 1 { "auto" } else { "disabled" },
        "response_format": "url",
        "size": request.size_string(),
        "stream": false,
        "watermark": false,
    });

    if let Some(negative) = request.negative_prompt.as_deref() {
        body["negative_prompt"] = json!(negative);
    }

    match reference_uris {
        [] => {}
        [single] => body["image"] = json!(single),
        many => body["image"] = json!(many),
    }

    body
}

#[cfg(test)]
mod tests {
    use super::build_request_body;
    use reverie_types::GenerateRequest;

    fn request(count: u32) -> GenerateRequest {
        GenerateRequest {
            prompt: "a misty forest".to_string(),
            negative_prompt: None,
            width: 1024,
            height: 768,
            count,
            reference_images: None,
            image_mapping: None,
        }
    }

    #[test]
    fn single_image_request_disables_sequential_generation() {
        let body = build_request_body(&request(1), &[]);
        assert_eq!(body["sequential_image_generation"], "disabled");
        assert_eq!(body["size"], "1024x768");
        assert_eq!(body["watermark"], false);
        assert!(body.get("image").is_none());
    }

    #[test]
    fn multi_image_request_enables_sequential_generation() {
        let body = build_request_body(&request(3), &[]);
        assert_eq!(body["sequential_image_generation"], "auto");
    }

    #[test]
    fn one_reference_is_a_bare_string_many_are_an_array() {
        let one = build_request_body(&request(1), &["data:image/png;base64,AA==".to_string()]);
        assert!(one["image"].is_string());

        let uris = vec![
            "data:image/png;base64,AA==".to_string(),
            "data:image/png;base64,BB==".to_string(),
        ];
        let many = build_request_body(&request(1), &uris);
        assert_eq!(many["image"].as_array().map(Vec::len), Some(2));
    }

    #[test]
    fn negative_prompt_is_forwarded_when_present() {
        let mut req = request(1);
        req.negative_prompt = Some("blurry, low-res".to_string());
        let body = build_request_body(&req, &[]);
        assert_eq!(body["negative_prompt"], "blurry, low-res");

        let body = build_request_body(&request(1), &[]);
        assert!(body.get("negative_prompt").is_none());
    }
}
