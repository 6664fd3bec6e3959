//! End-to-end provider tests against a local mock server.

use std::path::PathBuf;

use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use reverie_providers::{
    ProviderConfig, ProviderError, ProviderKind, generate_with_client,
};
use reverie_types::GenerateRequest;

fn request() -> GenerateRequest {
    GenerateRequest {
        prompt: "a lighthouse at dusk".to_string(),
        negative_prompt: None,
        width: 1024,
        height: 1024,
        count: 1,
        reference_images: None,
        image_mapping: None,
    }
}

fn config(kind: ProviderKind, server: &MockServer, output_dir: PathBuf) -> ProviderConfig {
    let mut config = ProviderConfig::new(kind, Some("test-key".to_string()), output_dir);
    config.endpoint_override = Some(format!("{}/images/generations", server.uri()));
    config
}

#[tokio::test]
async fn doubao_generation_downloads_and_saves_images() {
    let server = MockServer::start().await;
    let out = tempfile::tempdir().unwrap();

    Mock::given(method("POST"))
        .and(path("/images/generations"))
        .and(header("Authorization", "Bearer test-key"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "data": [
                {"url": format!("{}/img/0", server.uri())},
                {"url": format!("{}/img/1", server.uri())}
            ]
        })))
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/img/0"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(b"png-bytes-0".to_vec()))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/img/1"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(b"png-bytes-1".to_vec()))
        .mount(&server)
        .await;

    let client = reqwest::Client::new();
    let saved = generate_with_client(
        &client,
        &config(ProviderKind::Doubao, &server, out.path().to_path_buf()),
        &request(),
    )
    .await
    .unwrap();

    assert_eq!(saved.len(), 2);
    for (i, path) in saved.iter().enumerate() {
        let name = path.file_name().unwrap().to_string_lossy();
        assert!(name.starts_with("doubao_"), "unexpected name {name}");
        assert!(name.ends_with(&format!("_{i}.png")));
        let bytes = std::fs::read(path).unwrap();
        assert_eq!(bytes, format!("png-bytes-{i}").as_bytes());
    }
}

#[tokio::test]
async fn zhipu_generation_saves_with_provider_prefix() {
    let server = MockServer::start().await;
    let out = tempfile::tempdir().unwrap();

    Mock::given(method("POST"))
        .and(path("/images/generations"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "data": [{"url": format!("{}/img", server.uri())}]
        })))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/img"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(b"glm".to_vec()))
        .mount(&server)
        .await;

    let client = reqwest::Client::new();
    let saved = generate_with_client(
        &client,
        &config(ProviderKind::Zhipu, &server, out.path().to_path_buf()),
        &request(),
    )
    .await
    .unwrap();

    assert_eq!(saved.len(), 1);
    assert!(
        saved[0]
            .file_name()
            .unwrap()
            .to_string_lossy()
            .starts_with("zhipu_")
    );
}

#[tokio::test]
async fn api_error_carries_status_and_body() {
    let server = MockServer::start().await;
    let out = tempfile::tempdir().unwrap();

    Mock::given(method("POST"))
        .and(path("/images/generations"))
        .respond_with(ResponseTemplate::new(429).set_body_string("quota exhausted"))
        .mount(&server)
        .await;

    let client = reqwest::Client::new();
    let err = generate_with_client(
        &client,
        &config(ProviderKind::Doubao, &server, out.path().to_path_buf()),
        &request(),
    )
    .await
    .unwrap_err();

    match err {
        ProviderError::Api {
            provider,
            status,
            body,
        } => {
            assert_eq!(provider, "doubao");
            assert_eq!(status, 429);
            assert_eq!(body, "quota exhausted");
        }
        other => panic!("expected Api error, got {other:?}"),
    }
}

#[tokio::test]
async fn missing_api_key_fails_before_any_request() {
    let server = MockServer::start().await;
    let out = tempfile::tempdir().unwrap();

    let mut config = config(ProviderKind::Doubao, &server, out.path().to_path_buf());
    config.api_key = None;

    let client = reqwest::Client::new();
    let err = generate_with_client(&client, &config, &request())
        .await
        .unwrap_err();
    assert!(matches!(err, ProviderError::MissingApiKey { .. }));
    assert_eq!(server.received_requests().await.unwrap().len(), 0);
}
