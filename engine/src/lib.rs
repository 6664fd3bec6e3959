//! Core state machine for Reverie - prompt composition and resolution.
//!
//! This crate contains the [`App`] state machine without TUI dependencies:
//! the composer buffer and its mention picker, the image/resource
//! registries, the prompt resolver, and the generation state machine. The
//! TUI renders this state and feeds events back in; the binary wires in the
//! provider-backed generator and the real filesystem probe.

use std::path::PathBuf;
use std::sync::Arc;

use tokio::sync::oneshot;

mod buffer;
mod generation;
mod line;
mod mention;
mod persistence;
mod picker;
mod registry;
mod resolver;

pub use buffer::{MentionSpan, PromptBuffer, Segment};
pub use generation::{
    FileProbe, GenerateError, GenerateOutcome, ImageGenerator, ProviderGenerator, TokioFileProbe,
};
pub use line::LineInput;
pub use mention::MentionSignal;
pub use persistence::{default_library_path, load_resources, save_resources};
pub use picker::{CandidateDetail, CandidateTarget, MentionCandidate, MentionPicker};
pub use registry::{ReferenceImageRegistry, ResourceRegistry};
pub use resolver::{PromptResolver, ResolvedPrompt};

pub use reverie_providers::{ProviderConfig, ProviderKind};
pub use reverie_types::{
    ContentNode, GenerateRequest, ImageId, ImageSource, PromptDocument, ReferenceImage, Resource,
    ResourceId, TooManyImagesError, truncate_with_ellipsis,
};

use generation::GenerationState;

/// Which surface keyboard input currently lands on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum InputMode {
    #[default]
    Compose,
    Negative,
    Library,
    Gallery,
}

impl InputMode {
    #[must_use]
    pub const fn next(self) -> Self {
        match self {
            Self::Compose => Self::Negative,
            Self::Negative => Self::Library,
            Self::Library => Self::Gallery,
            Self::Gallery => Self::Compose,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusKind {
    Info,
    Warning,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusMessage {
    pub kind: StatusKind,
    pub text: String,
}

/// Display form of a chip: the referenced entity's name, or a fallback when
/// the id no longer resolves (unresolved chips render, they don't error).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChipLabel {
    Resolved(String),
    Unresolved(String),
}

impl ChipLabel {
    #[must_use]
    pub fn text(&self) -> &str {
        match self {
            Self::Resolved(text) | Self::Unresolved(text) => text,
        }
    }

    #[must_use]
    pub fn is_resolved(&self) -> bool {
        matches!(self, Self::Resolved(_))
    }
}

/// An open mention picker plus the span it will replace on selection.
#[derive(Debug, Clone)]
struct MentionSession {
    picker: MentionPicker,
    span: MentionSpan,
}

/// Startup parameters the binary reads from config.
#[derive(Debug, Clone)]
pub struct AppOptions {
    pub provider_name: String,
    pub width: u32,
    pub height: u32,
    pub count: u32,
    pub library_path: Option<PathBuf>,
}

impl Default for AppOptions {
    fn default() -> Self {
        Self {
            provider_name: "doubao".to_string(),
            width: 1024,
            height: 1024,
            count: 1,
            library_path: None,
        }
    }
}

pub struct App {
    // Prompt state. `document` is canonical; `buffer` is the derived
    // editable surface; `legacy_prompt` backs documents persisted before
    // prompts were structured.
    document: PromptDocument,
    legacy_prompt: String,
    buffer: PromptBuffer,
    mention: Option<MentionSession>,
    negative: LineInput,

    width: u32,
    height: u32,
    count: u32,

    state: GenerationState,
    generated_images: Vec<PathBuf>,

    images: ReferenceImageRegistry,
    resources: ResourceRegistry,
    library_path: Option<PathBuf>,

    generator: Arc<dyn ImageGenerator>,
    probe: Arc<dyn FileProbe>,

    mode: InputMode,
    gallery_selected: usize,
    library_selected: usize,
    status: Option<StatusMessage>,
    provider_name: String,
    should_quit: bool,
}

impl App {
    #[must_use]
    pub fn new(
        images: ReferenceImageRegistry,
        resources: ResourceRegistry,
        generator: Arc<dyn ImageGenerator>,
        probe: Arc<dyn FileProbe>,
        options: AppOptions,
    ) -> Self {
        Self {
            document: PromptDocument::new(),
            legacy_prompt: String::new(),
            buffer: PromptBuffer::new(),
            mention: None,
            negative: LineInput::default(),
            width: options.width,
            height: options.height,
            count: options.count,
            state: GenerationState::Idle,
            generated_images: Vec::new(),
            images,
            resources,
            library_path: options.library_path,
            generator,
            probe,
            mode: InputMode::Compose,
            gallery_selected: 0,
            library_selected: 0,
            status: None,
            provider_name: options.provider_name,
            should_quit: false,
        }
    }

    // ------------------------------------------------------------------
    // Shell state
    // ------------------------------------------------------------------

    #[must_use]
    pub fn mode(&self) -> InputMode {
        self.mode
    }

    pub fn focus_next(&mut self) {
        self.mention = None;
        self.mode = self.mode.next();
    }

    pub fn focus_compose(&mut self) {
        self.mode = InputMode::Compose;
    }

    pub fn request_quit(&mut self) {
        self.should_quit = true;
    }

    #[must_use]
    pub fn should_quit(&self) -> bool {
        self.should_quit
    }

    #[must_use]
    pub fn provider_name(&self) -> &str {
        &self.provider_name
    }

    #[must_use]
    pub fn status(&self) -> Option<&StatusMessage> {
        self.status.as_ref()
    }

    pub fn set_status_info(&mut self, text: impl Into<String>) {
        self.status = Some(StatusMessage {
            kind: StatusKind::Info,
            text: text.into(),
        });
    }

    pub fn set_status_warning(&mut self, text: impl Into<String>) {
        self.status = Some(StatusMessage {
            kind: StatusKind::Warning,
            text: text.into(),
        });
    }

    pub fn set_status_error(&mut self, text: impl Into<String>) {
        self.status = Some(StatusMessage {
            kind: StatusKind::Error,
            text: text.into(),
        });
    }

    // ------------------------------------------------------------------
    // Composer
    // ------------------------------------------------------------------

    #[must_use]
    pub fn buffer(&self) -> &PromptBuffer {
        &self.buffer
    }

    #[must_use]
    pub fn document(&self) -> &PromptDocument {
        &self.document
    }

    #[must_use]
    pub fn negative(&self) -> &LineInput {
        &self.negative
    }

    pub fn negative_mut(&mut self) -> &mut LineInput {
        &mut self.negative
    }

    pub fn compose_char(&mut self, c: char) {
        self.buffer.enter_char(c);
        self.after_edit();
    }

    pub fn compose_text(&mut self, text: &str) {
        self.buffer.enter_text(text);
        self.after_edit();
    }

    pub fn compose_newline(&mut self) {
        self.buffer.enter_newline();
        self.after_edit();
    }

    pub fn compose_backspace(&mut self) {
        self.buffer.delete_backward();
        self.after_edit();
    }

    pub fn compose_delete_forward(&mut self) {
        self.buffer.delete_forward();
        self.after_edit();
    }

    pub fn compose_delete_word(&mut self) {
        self.buffer.delete_word_backwards();
        self.after_edit();
    }

    pub fn compose_clear(&mut self) {
        self.buffer.clear();
        self.after_edit();
    }

    pub fn compose_move_left(&mut self) {
        self.buffer.move_cursor_left();
    }

    pub fn compose_move_right(&mut self) {
        self.buffer.move_cursor_right();
    }

    pub fn compose_move_home(&mut self) {
        self.buffer.reset_cursor();
    }

    pub fn compose_move_end(&mut self) {
        self.buffer.move_cursor_end();
    }

    /// Mention detection, then re-parse. The re-parsed document is synced
    /// straight back as a self-originated update: the buffer consumes the
    /// flag on that echo, so the surface (and cursor) stay untouched, while
    /// a later genuinely-external document change still rebuilds.
    fn after_edit(&mut self) {
        match mention::detect(&self.buffer) {
            MentionSignal::Open { query, span } => {
                if let Some(session) = &mut self.mention {
                    session.span = span;
                    session.picker.set_filter(&query);
                } else {
                    let candidates = self.mention_candidates();
                    self.mention = Some(MentionSession {
                        picker: MentionPicker::new(candidates, query),
                        span,
                    });
                }
            }
            MentionSignal::Close => self.mention = None,
        }
        self.legacy_prompt.clear();
        self.document = self.buffer.to_document();
        self.buffer.mark_self_update();
        self.buffer.sync_document(&self.document);
    }

    /// Replace the document from outside the composer (resource load,
    /// programmatic edit). The surface reconciles per its skip policy.
    pub fn set_document(&mut self, document: PromptDocument) {
        self.buffer.sync_document(&document);
        self.document = document;
    }

    /// Legacy plain-prompt setter; only consulted while the document is
    /// empty.
    pub fn set_prompt(&mut self, prompt: impl Into<String>) {
        self.legacy_prompt = prompt.into();
    }

    /// Load a resource's template into the composer.
    pub fn load_resource(&mut self, id: &ResourceId) -> bool {
        let Some(resource) = self.resources.get(id) else {
            return false;
        };
        let document = PromptDocument::parse(resource.prompt_template());
        self.legacy_prompt.clear();
        self.set_document(document);
        true
    }

    #[must_use]
    pub fn chip_label(&self, segment: &Segment) -> Option<ChipLabel> {
        match segment {
            Segment::Text(_) => None,
            Segment::Image(id) => Some(match self.images.get(id) {
                Some(image) => ChipLabel::Resolved(image.display_name().to_string()),
                None => ChipLabel::Unresolved("Unknown Image".to_string()),
            }),
            Segment::Resource(id) => Some(match self.resources.get(id) {
                Some(resource) => ChipLabel::Resolved(resource.name().to_string()),
                None => ChipLabel::Unresolved("Unknown Resource".to_string()),
            }),
        }
    }

    // ------------------------------------------------------------------
    // Mention picker
    // ------------------------------------------------------------------

    #[must_use]
    pub fn mention_open(&self) -> bool {
        self.mention.is_some()
    }

    #[must_use]
    pub fn mention_picker(&self) -> Option<&MentionPicker> {
        self.mention.as_ref().map(|session| &session.picker)
    }

    pub fn mention_move_up(&mut self) {
        if let Some(session) = &mut self.mention {
            session.picker.move_up();
        }
    }

    pub fn mention_move_down(&mut self) {
        if let Some(session) = &mut self.mention {
            session.picker.move_down();
        }
    }

    pub fn mention_close(&mut self) {
        self.mention = None;
    }

    /// Insert the highlighted candidate as a chip. With nothing highlighted
    /// (empty filtered list) the picker stays open and nothing changes.
    pub fn mention_confirm(&mut self) {
        let Some(session) = &self.mention else {
            return;
        };
        let Some(candidate) = session.picker.selected_candidate() else {
            return;
        };
        let chip = match &candidate.target {
            CandidateTarget::Image(id) => Segment::Image(id.clone()),
            CandidateTarget::Resource(id) => Segment::Resource(id.clone()),
        };
        let span = session.span;

        self.buffer.insert_mention(span, chip);
        self.mention = None;
        self.legacy_prompt.clear();
        self.document = self.buffer.to_document();
        self.buffer.mark_self_update();
        self.buffer.sync_document(&self.document);
    }

    /// Everything mentionable right now: images first, then resources, in
    /// registry order.
    fn mention_candidates(&self) -> Vec<MentionCandidate> {
        let mut candidates = Vec::with_capacity(self.images.len() + self.resources.len());
        for image in self.images.iter() {
            candidates.push(MentionCandidate {
                target: CandidateTarget::Image(image.id().clone()),
                label: image.display_name().to_string(),
                detail: CandidateDetail::Image {
                    has_thumbnail: image.thumbnail().is_some(),
                },
            });
        }
        for resource in self.resources.iter() {
            let preview = PromptDocument::parse(resource.prompt_template()).plain_text();
            candidates.push(MentionCandidate {
                target: CandidateTarget::Resource(resource.id().clone()),
                label: resource.name().to_string(),
                detail: CandidateDetail::Resource {
                    image_count: resource.images().len(),
                    preview: truncate_with_ellipsis(preview.trim(), 40),
                },
            });
        }
        candidates
    }

    // ------------------------------------------------------------------
    // Registries
    // ------------------------------------------------------------------

    #[must_use]
    pub fn images(&self) -> &ReferenceImageRegistry {
        &self.images
    }

    #[must_use]
    pub fn resources(&self) -> &ResourceRegistry {
        &self.resources
    }

    pub fn add_reference_image(&mut self, path: PathBuf) -> ImageId {
        self.images.import(path, ImageSource::Studio)
    }

    pub fn remove_reference_image(&mut self, id: &ImageId) -> bool {
        self.images.remove(id)
    }

    pub fn rename_reference_image(&mut self, id: &ImageId, name: impl Into<String>) -> bool {
        self.images.rename(id, name)
    }

    pub fn create_resource(
        &mut self,
        name: impl Into<String>,
        description: Option<String>,
        prompt_template: impl Into<String>,
        images: Vec<PathBuf>,
    ) -> Result<ResourceId, TooManyImagesError> {
        let id = self
            .resources
            .create(name, description, prompt_template, images)?;
        self.save_library();
        Ok(id)
    }

    /// Apply a partial update; `None` fields keep their current value.
    pub fn update_resource(
        &mut self,
        id: &ResourceId,
        name: Option<String>,
        description: Option<String>,
        prompt_template: Option<String>,
        images: Option<Vec<PathBuf>>,
    ) -> Result<bool, TooManyImagesError> {
        let now = chrono::Utc::now();
        let Some(resource) = self.resources.get_mut(id) else {
            return Ok(false);
        };
        if let Some(name) = name {
            resource.set_name(name, now);
        }
        if let Some(description) = description {
            resource.set_description(Some(description), now);
        }
        if let Some(prompt_template) = prompt_template {
            resource.set_prompt_template(prompt_template, now);
        }
        if let Some(images) = images {
            resource.set_images(images, now)?;
        }
        self.save_library();
        Ok(true)
    }

    pub fn delete_resource(&mut self, id: &ResourceId) -> bool {
        let deleted = self.resources.delete(id);
        if deleted {
            self.save_library();
            self.library_selected = self.library_selected.min(self.resources.len().saturating_sub(1));
        }
        deleted
    }

    fn save_library(&self) {
        let Some(path) = &self.library_path else {
            return;
        };
        if let Err(e) = save_resources(path, self.resources.snapshot()) {
            tracing::warn!("Failed to save resource library: {e:#}");
        }
    }

    // ------------------------------------------------------------------
    // Library / gallery browsing
    // ------------------------------------------------------------------

    #[must_use]
    pub fn library_selected(&self) -> usize {
        self.library_selected
    }

    pub fn library_move_up(&mut self) {
        self.library_selected = self.library_selected.saturating_sub(1);
    }

    pub fn library_move_down(&mut self) {
        if self.library_selected + 1 < self.resources.len() {
            self.library_selected += 1;
        }
    }

    /// Load the highlighted resource into the composer.
    pub fn library_activate(&mut self) {
        let Some(resource) = self.resources.iter().nth(self.library_selected) else {
            return;
        };
        let id = resource.id().clone();
        let name = resource.name().to_string();
        if self.load_resource(&id) {
            self.mode = InputMode::Compose;
            self.set_status_info(format!("Loaded resource \"{name}\""));
        }
    }

    #[must_use]
    pub fn gallery_selected(&self) -> usize {
        self.gallery_selected
    }

    pub fn gallery_move_up(&mut self) {
        self.gallery_selected = self.gallery_selected.saturating_sub(1);
    }

    pub fn gallery_move_down(&mut self) {
        if self.gallery_selected + 1 < self.generated_images.len() {
            self.gallery_selected += 1;
        }
    }

    // ------------------------------------------------------------------
    // Generation
    // ------------------------------------------------------------------

    #[must_use]
    pub fn is_generating(&self) -> bool {
        self.state.is_generating()
    }

    #[must_use]
    pub fn generated_images(&self) -> &[PathBuf] {
        &self.generated_images
    }

    #[must_use]
    pub fn size(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    pub fn set_size(&mut self, width: u32, height: u32) {
        self.width = width;
        self.height = height;
    }

    #[must_use]
    pub fn count(&self) -> u32 {
        self.count
    }

    pub fn set_count(&mut self, count: u32) {
        self.count = count.max(1);
    }

    /// Resolve the current prompt; pure and deterministic.
    #[must_use]
    pub fn resolve_prompt(&self) -> ResolvedPrompt {
        let resolver = PromptResolver::new(&self.images, &self.resources);
        let legacy = (!self.legacy_prompt.is_empty()).then_some(self.legacy_prompt.as_str());
        resolver.resolve(&self.document, legacy)
    }

    /// Start a generation task.
    ///
    /// Fails fast with [`GenerateError::AlreadyGenerating`] while a request
    /// is in flight. Returns `Ok(false)` - a pure no-op, no state change -
    /// when the resolved prompt is empty.
    pub fn begin_generation(&mut self) -> Result<bool, GenerateError> {
        if self.state.is_generating() {
            return Err(GenerateError::AlreadyGenerating);
        }

        let resolved = self.resolve_prompt();
        if resolved.is_prompt_empty() {
            return Ok(false);
        }

        let (tx, rx) = oneshot::channel();
        let generator = Arc::clone(&self.generator);
        let probe = Arc::clone(&self.probe);
        let negative = {
            let text = self.negative.text().trim().to_string();
            (!text.is_empty()).then_some(text)
        };
        let (width, height, count) = (self.width, self.height, self.count);

        tokio::spawn(async move {
            let result =
                generation::dispatch(resolved, negative, width, height, count, generator, probe)
                    .await;
            let _ = tx.send(result);
        });

        self.state = GenerationState::Generating(rx);
        Ok(true)
    }

    /// Drain a finished generation task, if any. Returns the number of
    /// images on success; provider errors come back to the caller with the
    /// generating flag already reset.
    pub fn poll_generation(&mut self) -> Option<Result<usize, GenerateError>> {
        let GenerationState::Generating(rx) = &mut self.state else {
            return None;
        };
        match rx.try_recv() {
            Ok(result) => {
                self.state = GenerationState::Idle;
                match result {
                    Ok(images) => {
                        let n = images.len();
                        self.generated_images = images;
                        self.gallery_selected = 0;
                        Some(Ok(n))
                    }
                    Err(e) => Some(Err(e)),
                }
            }
            Err(oneshot::error::TryRecvError::Empty) => None,
            Err(oneshot::error::TryRecvError::Closed) => {
                self.state = GenerationState::Idle;
                Some(Err(GenerateError::Failed(anyhow::anyhow!(
                    "generation task ended without reporting a result"
                ))))
            }
        }
    }

    /// Run one generation to completion. The async form of
    /// [`Self::begin_generation`] + [`Self::poll_generation`].
    pub async fn generate(&mut self) -> Result<GenerateOutcome, GenerateError> {
        if !self.begin_generation()? {
            return Ok(GenerateOutcome::EmptyPrompt);
        }
        let state = std::mem::take(&mut self.state);
        let GenerationState::Generating(rx) = state else {
            return Ok(GenerateOutcome::EmptyPrompt);
        };
        let images = rx
            .await
            .map_err(|_| anyhow::anyhow!("generation task ended without reporting a result"))
            .map_err(GenerateError::Failed)??;
        self.generated_images = images.clone();
        self.gallery_selected = 0;
        Ok(GenerateOutcome::Generated(images))
    }

    /// Enter-to-generate from the composer.
    pub fn submit(&mut self) {
        match self.begin_generation() {
            Ok(true) => {
                self.set_status_info(format!("Generating with {}…", self.provider_name));
            }
            Ok(false) => {}
            Err(e) => self.set_status_warning(e.to_string()),
        }
    }
}

#[cfg(test)]
mod tests;
