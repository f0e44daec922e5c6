//! # Overlay CLI
//!
//! Headless driver for overlay editing sessions. The latest snapshot is kept
//! in a state directory between invocations, so single commands compose:
//!
//! ```text
//! overlay upload photo.png
//! overlay add-text "Summer Sale"
//! overlay export out.png
//! ```
//!
//! History lives for one process. `overlay script steps.json` runs a list of
//! steps, undo and redo included, in a single session.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand};
use overlay_core::{
    EditorConfig, FileSlot, NudgeDirection, Session, SnapshotSlot, Viewport, DEFAULT_STORAGE_KEY,
};
use overlay_renderer::{
    decode_png, ExportConfig, FontCatalog, FontConfig, FontSource, PngExporter, RemoteResources,
    DEFAULT_FONT_LIST_URL,
};
use serde::Deserialize;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Command-line arguments.
#[derive(Parser, Debug)]
#[command(name = "overlay")]
#[command(about = "Compose text over an image and export it at native resolution")]
#[command(version)]
struct CliArgs {
    /// Directory holding the persisted session
    #[arg(long, env = "OVERLAY_STATE_DIR", default_value = ".overlay")]
    state_dir: PathBuf,

    /// URL of the remote font family list
    #[arg(long, env = "OVERLAY_FONT_LIST_URL", default_value = DEFAULT_FONT_LIST_URL)]
    font_list_url: String,

    /// Size of the square viewport uploads are fitted into
    #[arg(long, default_value = "540")]
    viewport: f64,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Upload a PNG as the canvas background
    Upload {
        /// PNG file
        path: PathBuf,
    },
    /// Add a text layer, optionally with content
    AddText {
        /// Text content
        content: Option<String>,
    },
    /// Set the canvas background colour
    Background {
        /// Hex colour, e.g. #202020
        color: String,
    },
    /// Print the history of the current session
    History,
    /// Clear the canvas and the persisted session
    Reset,
    /// Export the canvas as PNG at the uploaded image's resolution
    Export {
        /// Output file
        #[arg(default_value = overlay_renderer::EXPORT_FILE_NAME)]
        out: PathBuf,
        /// Render text with remote fonts only, ignoring installed system fonts
        #[arg(long)]
        no_system_fonts: bool,
    },
    /// List the remote font families
    Fonts,
    /// Run a JSON list of steps in one session
    Script {
        /// JSON file with an array of steps
        path: PathBuf,
    },
}

/// One step of a script.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "op", rename_all = "kebab-case")]
enum Step {
    Upload {
        path: PathBuf,
    },
    AddText {
        #[serde(default)]
        content: Option<String>,
    },
    Background {
        color: String,
    },
    Nudge {
        direction: NudgeDirection,
        #[serde(default)]
        coarse: bool,
    },
    Duplicate,
    Delete,
    Undo,
    Redo,
    JumpTo {
        index: usize,
    },
    Export {
        path: PathBuf,
    },
}

/// Initialize structured tracing with optional JSON format.
///
/// Set `RUST_LOG` to control log levels (default: info,overlay_core=debug,overlay_renderer=debug).
/// Set `RUST_LOG_FORMAT=json` for JSON output.
fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,overlay_core=debug,overlay_renderer=debug"));

    let fmt_layer = tracing_subscriber::fmt::layer()
        .with_target(true)
        .with_writer(std::io::stderr);

    if std::env::var("RUST_LOG_FORMAT").as_deref() == Ok("json") {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt_layer.json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt_layer)
            .init();
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();

    let args = CliArgs::parse();
    let viewport = Viewport {
        width: args.viewport,
        height: args.viewport,
    };
    let loader = Arc::new(RemoteResources::new(FontConfig {
        list_url: args.font_list_url.clone(),
        ..FontConfig::default()
    }));
    let slot: Arc<dyn SnapshotSlot> = Arc::new(
        FileSlot::new(&args.state_dir, DEFAULT_STORAGE_KEY)
            .with_context(|| format!("cannot use state directory {}", args.state_dir.display()))?,
    );

    let mut session = Session::open(EditorConfig::default(), loader.clone(), slot).await;
    tracing::debug!("Opened {:?}", session);

    match args.command {
        Command::Upload { path } => upload(&mut session, &path, viewport).await?,
        Command::AddText { content } => add_text(&mut session, content)?,
        Command::Background { color } => session.set_background_color(color),
        Command::History => print_history(&session),
        Command::Reset => {
            session.reset();
            println!("Canvas reset");
        }
        Command::Export {
            out,
            no_system_fonts,
        } => {
            let config = ExportConfig {
                load_system_fonts: !no_system_fonts,
                ..ExportConfig::default()
            };
            export(&session, loader.fonts(), config, &out).await?;
        }
        Command::Fonts => {
            let families = loader.fonts().families().await;
            println!("{} remote font families", families.len());
            for family in families {
                println!("  {family}");
            }
        }
        Command::Script { path } => {
            let raw = std::fs::read_to_string(&path)
                .with_context(|| format!("cannot read script {}", path.display()))?;
            let steps: Vec<Step> = serde_json::from_str(&raw)
                .with_context(|| format!("malformed script {}", path.display()))?;
            run_script(&mut session, loader.fonts(), &steps, viewport).await?;
            print_history(&session);
        }
    }

    Ok(())
}

async fn upload(session: &mut Session, path: &Path, viewport: Viewport) -> anyhow::Result<()> {
    let bytes =
        std::fs::read(path).with_context(|| format!("cannot read image {}", path.display()))?;
    let image = decode_png(&bytes)?;
    let original = session.upload_image(image.into(), viewport).await?;
    let (width, height) = original.display_size();
    println!(
        "Uploaded {}x{} image, shown at {width}x{height}",
        original.width, original.height
    );
    Ok(())
}

fn add_text(session: &mut Session, content: Option<String>) -> anyhow::Result<()> {
    let id = session.add_text();
    if let Some(content) = content {
        session.set_text(id, content)?;
    }
    println!("Added text layer {id}");
    Ok(())
}

/// Fetch the remote families the scene uses, then export with their font
/// files.
async fn export(
    session: &Session,
    fonts: &FontCatalog,
    config: ExportConfig,
    out: &Path,
) -> anyhow::Result<()> {
    for family in session.scene().font_families() {
        match fonts.load(&family).await {
            Ok(FontSource::Local) => {
                tracing::debug!("Font {family} is expected to be installed");
            }
            Ok(_) => {}
            Err(e) => {
                tracing::warn!("Font {family} unavailable, exporting with a fallback: {e}");
            }
        }
    }
    let exporter = PngExporter::new(config).with_font_data(fonts.font_data());
    let artifact = exporter.export(session.scene(), session.original_image().as_ref())?;
    std::fs::write(out, &artifact.bytes)
        .with_context(|| format!("cannot write {}", out.display()))?;
    println!(
        "Exported {}x{} PNG to {}",
        artifact.width,
        artifact.height,
        out.display()
    );
    Ok(())
}

fn print_history(session: &Session) {
    for entry in session.history_entries() {
        let marker = if entry.is_current { "*" } else { " " };
        println!("{marker} {:>2}  {}", entry.index, entry.label);
    }
    for family in session.font_fallbacks() {
        println!("font {family} unavailable, rendered with a fallback");
    }
}

async fn run_script(
    session: &mut Session,
    fonts: &FontCatalog,
    steps: &[Step],
    viewport: Viewport,
) -> anyhow::Result<()> {
    for (n, step) in steps.iter().enumerate() {
        tracing::debug!("Step {n}: {step:?}");
        match step {
            Step::Upload { path } => upload(session, path, viewport).await?,
            Step::AddText { content } => add_text(session, content.clone())?,
            Step::Background { color } => session.set_background_color(color.clone()),
            Step::Nudge { direction, coarse } => session.nudge(*direction, *coarse)?,
            Step::Duplicate => {
                session.duplicate_selected()?;
            }
            Step::Delete => {
                session.delete_selected()?;
            }
            Step::Undo => {
                if !session.undo().await? {
                    tracing::warn!("Step {n}: nothing to undo");
                }
            }
            Step::Redo => {
                if !session.redo().await? {
                    tracing::warn!("Step {n}: nothing to redo");
                }
            }
            Step::JumpTo { index } => {
                session.jump_to(*index).await?;
            }
            Step::Export { path } => {
                export(session, fonts, ExportConfig::default(), path).await?;
            }
        }
    }
    Ok(())
}
