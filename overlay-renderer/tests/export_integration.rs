//! End-to-end: upload a PNG, edit, export at native resolution.

#![cfg(feature = "export")]

use std::sync::Arc;

use overlay_core::{EditorConfig, MemorySlot, OriginalImageRef, Session, Viewport};
use overlay_renderer::{
    decode_png, is_png, native_scene, png_dimensions, ExportConfig, FontConfig, PngExporter,
    RemoteResources, RenderError, EXPORT_FILE_NAME,
};

fn png_bytes(width: u32, height: u32) -> Vec<u8> {
    let img = image::RgbaImage::from_pixel(width, height, image::Rgba([30, 90, 160, 255]));
    let mut buf = std::io::Cursor::new(Vec::new());
    img.write_to(&mut buf, image::ImageFormat::Png)
        .expect("encode png");
    buf.into_inner()
}

/// Loader whose font list is unreachable, so every family counts as local.
fn offline_loader() -> Arc<RemoteResources> {
    Arc::new(RemoteResources::new(FontConfig {
        list_url: "http://127.0.0.1:9/fonts.json".to_string(),
        ..FontConfig::default()
    }))
}

fn exporter() -> PngExporter {
    PngExporter::with_defaults()
}

/// Family name of some installed system font.
fn installed_family() -> Option<String> {
    let mut db = usvg::fontdb::Database::new();
    db.load_system_fonts();
    let name = db
        .faces()
        .find_map(|face| face.families.first().map(|(name, _)| name.clone()));
    name
}

fn caption_scene(layers: Vec<overlay_core::Layer>) -> (overlay_core::Scene, OriginalImageRef) {
    let scene =
        overlay_core::Scene::from_parts(200.0, 100.0, "#ffffff".to_string(), None, layers);
    let original = OriginalImageRef {
        width: 200,
        height: 100,
        scale: 1.0,
    };
    (scene, original)
}

async fn session_with_upload(width: u32, height: u32) -> Session {
    let mut session = Session::open(
        EditorConfig::default(),
        offline_loader(),
        Arc::new(MemorySlot::new()),
    )
    .await;
    let upload = decode_png(&png_bytes(width, height)).expect("decode");
    session
        .upload_image(
            upload.into(),
            Viewport {
                width: 540.0,
                height: 540.0,
            },
        )
        .await
        .expect("upload");
    session
}

#[tokio::test]
async fn test_export_is_native_resolution() {
    let mut session = session_with_upload(800, 400).await;
    let original = session.original_image().expect("original");
    assert!((original.scale - 0.625).abs() < 1e-12);
    assert!((session.scene().width - 500.0).abs() < 1e-9);

    session.add_text();
    let artifact = exporter()
        .export(session.scene(), session.original_image().as_ref())
        .expect("export");

    assert_eq!(artifact.file_name, EXPORT_FILE_NAME);
    assert!(is_png(&artifact.bytes));
    assert_eq!((artifact.width, artifact.height), (800, 400));
    assert_eq!(png_dimensions(&artifact.bytes).expect("dims"), (800, 400));
}

#[tokio::test]
async fn test_export_does_not_touch_the_session() {
    let mut session = session_with_upload(600, 300).await;
    let id = session.add_text();
    let scene = session.scene().clone();
    let entries = session.history_entries();

    exporter()
        .export(session.scene(), session.original_image().as_ref())
        .expect("export");

    assert_eq!(session.scene(), &scene);
    assert_eq!(session.history_entries(), entries);
    assert!(session.store().get(id).is_some());
}

#[tokio::test]
async fn test_export_without_upload_is_rejected() {
    let mut session = Session::open(
        EditorConfig::default(),
        offline_loader(),
        Arc::new(MemorySlot::new()),
    )
    .await;
    session.add_text();

    let result = exporter().export(session.scene(), session.original_image().as_ref());
    assert!(matches!(result, Err(RenderError::Precondition(_))));
}

#[tokio::test]
async fn test_export_after_undo_to_upload() {
    let mut session = session_with_upload(400, 400).await;
    session.add_text();
    assert!(session.undo().await.expect("undo"));
    assert!(session.store().layers().is_empty());

    let artifact = exporter()
        .export(session.scene(), session.original_image().as_ref())
        .expect("export");
    assert_eq!((artifact.width, artifact.height), (400, 400));
}

#[test]
fn test_default_export_renders_text() {
    use overlay_core::{Layer, TextStyle};

    assert!(ExportConfig::default().load_system_fonts);
    let Some(family) = installed_family() else {
        eprintln!("no system fonts installed; text cannot be rasterized here");
        return;
    };

    let text = Layer::text(
        "HELLO WORLD",
        TextStyle {
            font_family: family,
            font_size: 24.0,
            ..TextStyle::default()
        },
    )
    .with_position(10.0, 30.0);
    let (with_text, original) = caption_scene(vec![text]);
    let (empty, _) = caption_scene(Vec::new());

    let text_png = exporter().export(&with_text, Some(&original)).expect("export");
    let empty_png = exporter().export(&empty, Some(&original)).expect("export");
    assert_ne!(text_png.bytes, empty_png.bytes);

    let pixels = image::load_from_memory(&text_png.bytes)
        .expect("decode")
        .to_rgba8();
    let inked = pixels
        .pixels()
        .filter(|p| p.0[0] < 128 && p.0[3] > 0)
        .count();
    assert!(inked > 0, "black text leaves dark pixels on white");
}

#[test]
fn test_text_is_dropped_without_any_fonts() {
    use overlay_core::{Layer, TextStyle};

    let text = Layer::text("HELLO WORLD", TextStyle::default()).with_position(10.0, 30.0);
    let (with_text, original) = caption_scene(vec![text]);
    let (empty, _) = caption_scene(Vec::new());
    let bare = PngExporter::new(ExportConfig {
        load_system_fonts: false,
        ..ExportConfig::default()
    });

    let text_png = bare.export(&with_text, Some(&original)).expect("export");
    let empty_png = bare.export(&empty, Some(&original)).expect("export");
    assert_eq!(text_png.bytes, empty_png.bytes);
}

#[test]
fn test_native_rescale_matches_display_ratio() {
    use overlay_core::{Layer, Scene, TextStyle};

    let text = Layer::text(
        "Caption",
        TextStyle {
            font_size: 24.0,
            ..TextStyle::default()
        },
    )
    .with_position(100.0, 50.0);
    let scene = Scene::from_parts(500.0, 250.0, "#f0f0f0".to_string(), None, vec![text]);
    let original = OriginalImageRef {
        width: 2000,
        height: 1000,
        scale: 0.25,
    };

    let native = native_scene(&scene, Some(&original)).expect("native");
    let layer = &native.layers()[0];
    assert!((layer.transform.x - 400.0).abs() < 1e-9);
    assert!((layer.transform.y - 200.0).abs() < 1e-9);
    let style = &layer.as_text().expect("text").style;
    assert!((style.font_size - 96.0).abs() < 1e-9);
}
