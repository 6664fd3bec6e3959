//! Reverie binary - terminal session management and the frame loop.
//!
//! The binary bridges `reverie_engine` (application state) and
//! `reverie_tui` (rendering): it owns the terminal with RAII cleanup, pumps
//! crossterm events into the app at a fixed cadence, and drains finished
//! generation tasks between frames.

use std::fs::OpenOptions;
use std::io::{Stdout, stdout};
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::{Context, Result};
use crossterm::event::{
    DisableBracketedPaste, EnableBracketedPaste, Event, KeyEventKind, poll, read,
};
use crossterm::execute;
use crossterm::terminal::{
    EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode,
};
use ratatui::Terminal;
use ratatui::backend::CrosstermBackend;
use tracing_subscriber::layer::SubscriberExt as _;
use tracing_subscriber::util::SubscriberInitExt as _;
use tracing_subscriber::{EnvFilter, fmt};

use reverie_config::ReverieConfig;
use reverie_engine::{
    App, AppOptions, InputMode, ProviderConfig, ProviderGenerator, ProviderKind,
    ReferenceImageRegistry, ResourceRegistry, TokioFileProbe, default_library_path,
    load_resources,
};
use reverie_tui::{Palette, draw, handle_key};

const FRAME_BUDGET: Duration = Duration::from_millis(16);

fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new("info"))
        .unwrap_or_else(|_| EnvFilter::new("warn"));

    let log_path = dirs::data_dir().map(|dir| dir.join("reverie").join("reverie.log"));
    let log_file = log_path.as_ref().and_then(|path| {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).ok()?;
        }
        OpenOptions::new().create(true).append(true).open(path).ok()
    });

    match log_file {
        Some(file) => {
            tracing_subscriber::registry()
                .with(fmt::layer().with_ansi(false).with_writer(Mutex::new(file)))
                .with(env_filter)
                .init();
            if let Some(path) = log_path {
                tracing::info!(path = %path.display(), "Logging initialized");
            }
        }
        // No log file means no logs - writing to stdout would corrupt the TUI.
        None => tracing_subscriber::registry().with(env_filter).init(),
    }
}

/// RAII terminal session: raw mode + alternate screen, restored on drop
/// even when the frame loop errors out.
struct TerminalSession {
    terminal: Terminal<CrosstermBackend<Stdout>>,
}

impl TerminalSession {
    fn new() -> Result<Self> {
        enable_raw_mode().context("failed to enable raw mode")?;
        let mut out = stdout();
        execute!(out, EnterAlternateScreen, EnableBracketedPaste)
            .context("failed to enter alternate screen")?;
        let terminal = Terminal::new(CrosstermBackend::new(out))
            .context("failed to initialize terminal")?;
        Ok(Self { terminal })
    }
}

impl Drop for TerminalSession {
    fn drop(&mut self) {
        let _ = disable_raw_mode();
        let _ = execute!(stdout(), DisableBracketedPaste, LeaveAlternateScreen);
    }
}

fn build_app(config: &ReverieConfig) -> Result<App> {
    let provider: ProviderKind = config
        .app
        .as_ref()
        .and_then(|app| app.provider.as_deref())
        .unwrap_or("doubao")
        .parse()?;

    let mut provider_config = ProviderConfig::new(
        provider,
        config.api_key(provider.as_str()),
        config.output_dir(),
    );
    provider_config.zhipu_watermark = config.zhipu.as_ref().is_none_or(|z| z.watermark);

    let library_path = default_library_path();
    let resources = match &library_path {
        Some(path) => ResourceRegistry::from_resources(
            load_resources(path).context("resource library is unreadable")?,
        ),
        None => ResourceRegistry::new(),
    };

    let generation = config.generation.as_ref();
    let options = AppOptions {
        provider_name: provider.display_name().to_string(),
        width: generation.map_or(1024, |g| g.width),
        height: generation.map_or(1024, |g| g.height),
        count: generation.map_or(1, |g| g.count),
        library_path,
    };

    let mut app = App::new(
        ReferenceImageRegistry::new(),
        resources,
        Arc::new(ProviderGenerator::new(provider_config)),
        Arc::new(TokioFileProbe),
        options,
    );

    // Positional arguments are reference images to preload.
    for arg in std::env::args().skip(1) {
        let path = PathBuf::from(&arg);
        if path.is_file() {
            let absolute = path.canonicalize().unwrap_or(path);
            app.add_reference_image(absolute);
        } else {
            tracing::warn!(%arg, "Skipping argument: not a file");
        }
    }

    Ok(app)
}

fn normalize_line_endings(text: &str) -> String {
    text.replace("\r\n", "\n").replace('\r', "\n")
}

fn run(session: &mut TerminalSession, app: &mut App) -> Result<()> {
    let palette = Palette::default();

    loop {
        session.terminal.draw(|frame| draw(frame, app, &palette))?;

        if poll(FRAME_BUDGET)? {
            loop {
                match read()? {
                    Event::Key(key) if !matches!(key.kind, KeyEventKind::Release) => {
                        handle_key(app, key);
                    }
                    Event::Paste(text) => {
                        let normalized = normalize_line_endings(&text);
                        match app.mode() {
                            InputMode::Compose => app.compose_text(&normalized),
                            InputMode::Negative => {
                                for c in normalized.chars().filter(|c| *c != '\n') {
                                    app.negative_mut().enter_char(c);
                                }
                            }
                            InputMode::Library | InputMode::Gallery => {}
                        }
                    }
                    _ => {}
                }
                if !poll(Duration::ZERO)? {
                    break;
                }
            }
        }

        if let Some(result) = app.poll_generation() {
            match result {
                Ok(n) => app.set_status_info(format!("Generated {n} image(s)")),
                Err(e) => app.set_status_error(format!("Generation failed: {e}")),
            }
        }

        if app.should_quit() {
            return Ok(());
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();

    let config = match ReverieConfig::load() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Config error at {}: {e}", e.path().display());
            std::process::exit(1);
        }
    };

    let mut app = build_app(&config)?;
    let mut session = TerminalSession::new()?;
    let result = run(&mut session, &mut app);
    drop(session);
    result
}
