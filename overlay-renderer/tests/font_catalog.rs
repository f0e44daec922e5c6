//! Remote font catalog behaviour against a mock font server.

use std::sync::Arc;

use overlay_core::{
    capture, restore, EditorError, Layer, ResourceLoader, Scene, TextStyle,
};
use overlay_renderer::{FontCatalog, FontConfig, FontSource, RenderError, RemoteResources};
use serde_json::json;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn config_for(server: &MockServer) -> FontConfig {
    FontConfig {
        list_url: format!("{}/fonts.json", server.uri()),
        stylesheet_base: format!("{}/css2", server.uri()),
        ..FontConfig::default()
    }
}

const FONT_BYTES: &[u8] = b"\x00\x01\x00\x00lobster";

fn stylesheet_for(server: &MockServer) -> String {
    format!(
        "@font-face {{ font-family: 'Lobster'; font-weight: 400; \
         src: url({}/files/lobster-400.ttf) format('truetype'); }}",
        server.uri()
    )
}

fn lobster_scene() -> Scene {
    let style = TextStyle {
        font_family: "Lobster".to_string(),
        ..TextStyle::default()
    };
    Scene::from_parts(
        300.0,
        200.0,
        "#f0f0f0".to_string(),
        None,
        vec![Layer::text("Hi", style)],
    )
}

async fn mount_stylesheet(server: &MockServer, css: &str) {
    Mock::given(method("GET"))
        .and(path("/css2"))
        .and(query_param("display", "swap"))
        .respond_with(ResponseTemplate::new(200).set_body_string(css))
        .mount(server)
        .await;
}

async fn mount_list(server: &MockServer, families: serde_json::Value) {
    Mock::given(method("GET"))
        .and(path("/fonts.json"))
        .respond_with(ResponseTemplate::new(200).set_body_json(families))
        .expect(1)
        .mount(server)
        .await;
}

#[tokio::test]
#[cfg_attr(
    target_os = "macos",
    ignore = "wiremock/reqwest system-configuration issue on macOS"
)]
async fn test_font_list_is_fetched_once() {
    let server = MockServer::start().await;
    mount_list(&server, json!(["Lobster", "Pacifico"])).await;

    let catalog = FontCatalog::new(config_for(&server));
    assert_eq!(catalog.families().await.len(), 2);
    assert!(catalog.families().await.contains("Pacifico"));
    // expect(1) is verified when the server drops
}

#[tokio::test]
#[cfg_attr(
    target_os = "macos",
    ignore = "wiremock/reqwest system-configuration issue on macOS"
)]
async fn test_unlisted_family_is_local() {
    let server = MockServer::start().await;
    mount_list(&server, json!(["Lobster"])).await;

    let catalog = FontCatalog::new(config_for(&server));
    let source = catalog.load("Arial").await.expect("load");
    assert_eq!(source, FontSource::Local);
    assert!(!catalog.is_loaded("Arial"));
}

#[tokio::test]
#[cfg_attr(
    target_os = "macos",
    ignore = "wiremock/reqwest system-configuration issue on macOS"
)]
async fn test_remote_family_fonts_loaded_once() {
    let server = MockServer::start().await;
    mount_list(&server, json!({"font_metadata_list": [{"name": "Lobster"}]})).await;
    mount_stylesheet(&server, &stylesheet_for(&server)).await;
    Mock::given(method("GET"))
        .and(path("/files/lobster-400.ttf"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(FONT_BYTES.to_vec()))
        .expect(1)
        .mount(&server)
        .await;

    let catalog = FontCatalog::new(config_for(&server));
    assert!(catalog.font_data().is_empty());
    assert_eq!(catalog.load("Lobster").await.expect("first"), FontSource::Remote);
    assert_eq!(catalog.load("Lobster").await.expect("second"), FontSource::Cached);
    assert!(catalog.is_loaded("Lobster"));

    let fonts = catalog.font_data();
    assert_eq!(fonts.len(), 1);
    assert_eq!(fonts[0].as_slice(), FONT_BYTES);
}

#[tokio::test]
#[cfg_attr(
    target_os = "macos",
    ignore = "wiremock/reqwest system-configuration issue on macOS"
)]
async fn test_missing_font_file_is_an_error() {
    let server = MockServer::start().await;
    mount_list(&server, json!(["Lobster"])).await;
    mount_stylesheet(&server, &stylesheet_for(&server)).await;
    Mock::given(method("GET"))
        .and(path("/files/lobster-400.ttf"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let catalog = FontCatalog::new(config_for(&server));
    assert!(matches!(
        catalog.load("Lobster").await,
        Err(RenderError::Resource(_))
    ));
    assert!(!catalog.is_loaded("Lobster"));
    assert!(catalog.font_data().is_empty());
}

#[tokio::test]
#[cfg_attr(
    target_os = "macos",
    ignore = "wiremock/reqwest system-configuration issue on macOS"
)]
async fn test_stylesheet_without_font_files_falls_back_during_restore() {
    let server = MockServer::start().await;
    mount_list(&server, json!(["Lobster"])).await;
    mount_stylesheet(&server, "@font-face { font-family: 'Lobster'; }").await;

    let loader = RemoteResources::with_catalog(Arc::new(FontCatalog::new(config_for(&server))));
    let restored = restore(&capture(&lobster_scene(), "Add Text"), &loader)
        .await
        .expect("font failures do not fail a restore");
    assert_eq!(restored.font_fallbacks, vec!["Lobster".to_string()]);
    assert!(loader.fonts().font_data().is_empty());
}

#[tokio::test]
#[cfg_attr(
    target_os = "macos",
    ignore = "wiremock/reqwest system-configuration issue on macOS"
)]
async fn test_failed_font_list_means_all_local() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/fonts.json"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let catalog = FontCatalog::new(config_for(&server));
    assert!(catalog.families().await.is_empty());
    assert_eq!(catalog.load("Lobster").await.expect("load"), FontSource::Local);
}

#[tokio::test]
#[cfg_attr(
    target_os = "macos",
    ignore = "wiremock/reqwest system-configuration issue on macOS"
)]
async fn test_missing_stylesheet_is_an_error() {
    let server = MockServer::start().await;
    mount_list(&server, json!(["Lobster"])).await;
    Mock::given(method("GET"))
        .and(path("/css2"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let catalog = FontCatalog::new(config_for(&server));
    assert!(matches!(
        catalog.load("Lobster").await,
        Err(RenderError::Resource(_))
    ));
    assert!(!catalog.is_loaded("Lobster"));
}

#[tokio::test]
#[cfg_attr(
    target_os = "macos",
    ignore = "wiremock/reqwest system-configuration issue on macOS"
)]
async fn test_missing_stylesheet_falls_back_during_restore() {
    let server = MockServer::start().await;
    mount_list(&server, json!(["Lobster"])).await;
    Mock::given(method("GET"))
        .and(path("/css2"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let loader = RemoteResources::with_catalog(Arc::new(FontCatalog::new(config_for(&server))));
    let err = loader.load_font("Lobster").await;
    assert!(matches!(err, Err(EditorError::ResourceLoad(_))));

    let scene = lobster_scene();
    let restored = restore(&capture(&scene, "Add Text"), &loader)
        .await
        .expect("font failures do not fail a restore");
    assert_eq!(restored.scene, scene);
    assert_eq!(restored.font_fallbacks, vec!["Lobster".to_string()]);
}
