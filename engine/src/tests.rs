//! App-level tests: composer, picker, and generation wired together with
//! injected doubles for the generator and filesystem.

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use futures_util::future::BoxFuture;

use crate::{
    App, AppOptions, ChipLabel, FileProbe, GenerateError, GenerateOutcome, GenerateRequest,
    ImageGenerator, ImageSource, ReferenceImageRegistry, ResourceRegistry, Segment,
};

/// Generator double that records every request and answers with fixed
/// output paths (or an error).
#[derive(Default)]
struct RecordingGenerator {
    requests: Mutex<Vec<GenerateRequest>>,
    fail: bool,
    block_on: Option<tokio::sync::Semaphore>,
}

impl RecordingGenerator {
    fn requests(&self) -> Vec<GenerateRequest> {
        self.requests.lock().unwrap().clone()
    }
}

impl ImageGenerator for RecordingGenerator {
    fn generate<'a>(
        &'a self,
        request: &'a GenerateRequest,
    ) -> BoxFuture<'a, Result<Vec<PathBuf>, anyhow::Error>> {
        Box::pin(async move {
            self.requests.lock().unwrap().push(request.clone());
            if let Some(gate) = &self.block_on {
                let _permit = gate.acquire().await;
            }
            if self.fail {
                anyhow::bail!("backend exploded");
            }
            Ok(vec![PathBuf::from("/out/result_0.png")])
        })
    }
}

/// Probe double: everything exists except the listed paths.
#[derive(Default)]
struct MissingPathsProbe(Vec<PathBuf>);

impl FileProbe for MissingPathsProbe {
    fn exists<'a>(&'a self, path: &'a Path) -> BoxFuture<'a, bool> {
        Box::pin(async move { !self.0.iter().any(|p| p == path) })
    }
}

fn app_with(
    images: ReferenceImageRegistry,
    resources: ResourceRegistry,
    generator: Arc<RecordingGenerator>,
    probe: Arc<dyn FileProbe>,
) -> App {
    App::new(images, resources, generator, probe, AppOptions::default())
}

fn plain_app() -> (App, Arc<RecordingGenerator>) {
    let generator = Arc::new(RecordingGenerator::default());
    let app = app_with(
        ReferenceImageRegistry::new(),
        ResourceRegistry::new(),
        Arc::clone(&generator),
        Arc::new(MissingPathsProbe::default()),
    );
    (app, generator)
}

fn type_str(app: &mut App, text: &str) {
    for c in text.chars() {
        app.compose_char(c);
    }
}

// ----------------------------------------------------------------------
// Composer + picker
// ----------------------------------------------------------------------

#[tokio::test]
async fn typing_at_opens_picker_and_selection_inserts_chip() {
    let mut images = ReferenceImageRegistry::new();
    images.import(PathBuf::from("/tmp/Cat.png"), ImageSource::Studio);
    images.import(PathBuf::from("/tmp/Castle.png"), ImageSource::Studio);
    images.import(PathBuf::from("/tmp/Dog.png"), ImageSource::Studio);
    let generator = Arc::new(RecordingGenerator::default());
    let mut app = app_with(
        images,
        ResourceRegistry::new(),
        generator,
        Arc::new(MissingPathsProbe::default()),
    );

    type_str(&mut app, "draw @ca");
    assert!(app.mention_open());
    let picker = app.mention_picker().unwrap();
    let labels: Vec<&str> = picker.filtered().iter().map(|c| c.label.as_str()).collect();
    assert_eq!(labels, vec!["Cat", "Castle"]);

    app.mention_move_down();
    app.mention_confirm();

    assert!(!app.mention_open());
    let segments = app.buffer().segments();
    assert_eq!(segments.len(), 3);
    assert!(matches!(segments[1], Segment::Image(_)));
    // The chip resolves to the picked image.
    assert_eq!(
        app.chip_label(&segments[1]),
        Some(ChipLabel::Resolved("Castle".to_string()))
    );
    // Document mirrors the surface: text, image reference, trailing NBSP.
    let doc = app.document();
    assert_eq!(doc.nodes().len(), 3);
    assert_eq!(doc.plain_text(), "draw \u{a0}");
}

#[tokio::test]
async fn picker_closes_when_query_spans_a_newline() {
    let mut images = ReferenceImageRegistry::new();
    images.import(PathBuf::from("/tmp/cat.png"), ImageSource::Studio);
    let generator = Arc::new(RecordingGenerator::default());
    let mut app = app_with(
        images,
        ResourceRegistry::new(),
        generator,
        Arc::new(MissingPathsProbe::default()),
    );

    type_str(&mut app, "@c");
    assert!(app.mention_open());
    app.compose_newline();
    assert!(!app.mention_open());
}

#[tokio::test]
async fn confirm_with_no_match_keeps_picker_open() {
    let mut images = ReferenceImageRegistry::new();
    images.import(PathBuf::from("/tmp/cat.png"), ImageSource::Studio);
    let generator = Arc::new(RecordingGenerator::default());
    let mut app = app_with(
        images,
        ResourceRegistry::new(),
        generator,
        Arc::new(MissingPathsProbe::default()),
    );

    type_str(&mut app, "@zzz");
    assert!(app.mention_open());
    app.mention_confirm();
    assert!(app.mention_open());
    assert!(!app.buffer().has_chips());
}

#[tokio::test]
async fn unresolved_chip_renders_with_fallback_label() {
    let (mut app, _) = plain_app();
    app.set_document(crate::PromptDocument::from_nodes(vec![
        crate::ContentNode::image("ghost"),
    ]));
    let segments = app.buffer().segments();
    let label = app.chip_label(&segments[0]).unwrap();
    assert!(!label.is_resolved());
    assert_eq!(label.text(), "Unknown Image");
}

#[tokio::test]
async fn external_echo_does_not_move_cursor() {
    let (mut app, _) = plain_app();
    type_str(&mut app, "stars");
    app.compose_move_left();
    let cursor = app.buffer().cursor();

    // The app's own document echoing back leaves the surface alone.
    let echo = app.document().clone();
    app.set_document(echo);
    assert_eq!(app.buffer().cursor(), cursor);
}

#[tokio::test]
async fn load_resource_replaces_composer_content() {
    let mut resources = ResourceRegistry::new();
    let id = resources
        .create(
            "neon",
            None,
            r#"[{"type":"text","value":"neon city"}]"#,
            vec![],
        )
        .unwrap();
    let generator = Arc::new(RecordingGenerator::default());
    let mut app = app_with(
        ReferenceImageRegistry::new(),
        resources,
        generator,
        Arc::new(MissingPathsProbe::default()),
    );

    type_str(&mut app, "old draft");
    assert!(app.load_resource(&id));
    assert_eq!(app.buffer().plain_text(), "neon city");
    assert_eq!(app.document().plain_text(), "neon city");
}

// ----------------------------------------------------------------------
// Generation
// ----------------------------------------------------------------------

#[tokio::test]
async fn empty_document_generate_is_a_no_op() {
    let (mut app, generator) = plain_app();
    let outcome = app.generate().await.unwrap();
    assert_eq!(outcome, GenerateOutcome::EmptyPrompt);
    assert!(!app.is_generating());
    assert!(generator.requests().is_empty());
    assert!(app.generated_images().is_empty());
}

#[tokio::test]
async fn generate_sends_resolved_prompt_and_attachments() {
    let mut images = ReferenceImageRegistry::new();
    let cat = images.import(PathBuf::from("/tmp/cat.png"), ImageSource::Studio);
    let generator = Arc::new(RecordingGenerator::default());
    let mut app = app_with(
        images,
        ResourceRegistry::new(),
        Arc::clone(&generator),
        Arc::new(MissingPathsProbe::default()),
    );

    app.set_document(crate::PromptDocument::from_nodes(vec![
        crate::ContentNode::text("draw a "),
        crate::ContentNode::ImageReference(cat),
    ]));
    app.negative_mut().set_text("blurry");
    app.set_size(512, 768);
    app.set_count(2);

    let outcome = app.generate().await.unwrap();
    assert_eq!(
        outcome,
        GenerateOutcome::Generated(vec![PathBuf::from("/out/result_0.png")])
    );
    assert!(!app.is_generating());
    assert_eq!(app.generated_images(), &[PathBuf::from("/out/result_0.png")]);

    let requests = generator.requests();
    assert_eq!(requests.len(), 1);
    let request = &requests[0];
    assert_eq!(request.prompt, "draw a 图片文件[cat]");
    assert_eq!(request.negative_prompt.as_deref(), Some("blurry"));
    assert_eq!((request.width, request.height, request.count), (512, 768, 2));
    assert_eq!(
        request.reference_images.as_deref(),
        Some([PathBuf::from("/tmp/cat.png")].as_slice())
    );
    assert_eq!(
        request
            .image_mapping
            .as_ref()
            .and_then(|m| m.get("cat")),
        Some(&PathBuf::from("/tmp/cat.png"))
    );
}

#[tokio::test]
async fn stale_paths_are_dropped_before_dispatch() {
    let mut images = ReferenceImageRegistry::new();
    let cat = images.import(PathBuf::from("/tmp/cat.png"), ImageSource::Studio);
    let gone = images.import(PathBuf::from("/tmp/gone.png"), ImageSource::Studio);
    let generator = Arc::new(RecordingGenerator::default());
    let mut app = app_with(
        images,
        ResourceRegistry::new(),
        Arc::clone(&generator),
        Arc::new(MissingPathsProbe(vec![PathBuf::from("/tmp/gone.png")])),
    );

    app.set_document(crate::PromptDocument::from_nodes(vec![
        crate::ContentNode::ImageReference(cat),
        crate::ContentNode::ImageReference(gone),
    ]));

    app.generate().await.unwrap();
    let request = &generator.requests()[0];
    // The marker for the stale file stays in the text; only the attachment
    // list and mapping shrink.
    assert!(request.prompt.contains("图片文件[gone]"));
    assert_eq!(
        request.reference_images.as_deref(),
        Some([PathBuf::from("/tmp/cat.png")].as_slice())
    );
    assert!(!request.image_mapping.as_ref().unwrap().contains_key("gone"));
}

#[tokio::test]
async fn generator_failure_resets_state_and_propagates() {
    let generator = Arc::new(RecordingGenerator {
        fail: true,
        ..RecordingGenerator::default()
    });
    let mut app = app_with(
        ReferenceImageRegistry::new(),
        ResourceRegistry::new(),
        Arc::clone(&generator),
        Arc::new(MissingPathsProbe::default()),
    );
    type_str(&mut app, "doomed prompt");

    let err = app.generate().await.unwrap_err();
    assert!(matches!(err, GenerateError::Failed(_)));
    assert!(!app.is_generating());
    assert!(app.generated_images().is_empty());
}

#[tokio::test]
async fn reentrant_generate_fails_fast() {
    let generator = Arc::new(RecordingGenerator {
        // Zero permits: the generator parks until the semaphore is closed.
        block_on: Some(tokio::sync::Semaphore::new(0)),
        ..RecordingGenerator::default()
    });
    let mut app = app_with(
        ReferenceImageRegistry::new(),
        ResourceRegistry::new(),
        Arc::clone(&generator),
        Arc::new(MissingPathsProbe::default()),
    );
    type_str(&mut app, "slow prompt");

    assert!(app.begin_generation().unwrap());
    assert!(app.is_generating());
    let err = app.begin_generation().unwrap_err();
    assert!(matches!(err, GenerateError::AlreadyGenerating));

    generator.block_on.as_ref().unwrap().close();
    loop {
        if let Some(result) = app.poll_generation() {
            result.unwrap();
            break;
        }
        tokio::time::sleep(std::time::Duration::from_millis(5)).await;
    }
    assert!(!app.is_generating());
}

#[tokio::test]
async fn update_resource_applies_only_provided_fields() {
    let mut resources = ResourceRegistry::new();
    let id = resources
        .create("neon", Some("old".to_string()), "glow", vec![])
        .unwrap();
    let generator = Arc::new(RecordingGenerator::default());
    let mut app = app_with(
        ReferenceImageRegistry::new(),
        resources,
        generator,
        Arc::new(MissingPathsProbe::default()),
    );

    let changed = app
        .update_resource(&id, Some("neon v2".to_string()), None, None, None)
        .unwrap();
    assert!(changed);
    let resource = app.resources().get(&id).unwrap();
    assert_eq!(resource.name(), "neon v2");
    assert_eq!(resource.description(), Some("old"));
    assert_eq!(resource.prompt_template(), "glow");
}

#[tokio::test]
async fn legacy_prompt_is_sent_verbatim_when_document_is_empty() {
    let (mut app, generator) = plain_app();
    app.set_prompt("legacy words");
    app.generate().await.unwrap();
    assert_eq!(generator.requests()[0].prompt, "legacy words");
    assert!(generator.requests()[0].reference_images.is_none());
}
