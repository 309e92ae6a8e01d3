//! Batch pipeline over an in-memory loader.

use camatlas::config::LocationConfig;
use camatlas::{EngineConfig, LoadMode, MemoryLoader, OutputMode, Pipeline, RecordStore, RunStats};

const CAM_URL: &str = "https://cams.example.com/en/countries/vietnam/da-nang/dragon-bridge/";
const SPA_URL: &str = "https://cams.example.com/en/countries/vietnam/hue/citadel/";
const BARE_URL: &str = "https://cams.example.com/en/countries/laos/vientiane/square/";

fn config() -> EngineConfig {
    let mut config = EngineConfig {
        location: LocationConfig {
            path_pattern: "/{lang}/countries/{country}/{city}".to_string(),
        },
        ..Default::default()
    };
    config.pipeline.delay_ms = 0;
    config
}

fn cam_page() -> String {
    format!(
        r#"<html><head><title>Dragon Bridge | Cams</title>
        <meta name="description" content="Live view of the Dragon Bridge"></head>
        <body>
        <nav class="breadcrumb">
          <a href="/en/countries/vietnam/" title="Vietnam">Vietnam</a>
          <a href="/en/countries/vietnam/da-nang/" title="Da Nang">Da Nang</a>
        </nav>
        <h1 class="page-heading">Dragon Bridge</h1>
        <iframe src="https://www.youtube.com/embed/abc123"></iframe>
        <div id="mapContainer" data-lat="16.0614" data-lng="108.2274" data-zoom="15"></div>
        <p>{}</p>
        </body></html>"#,
        "Live camera overlooking the river. ".repeat(40)
    )
}

const SPA_SHELL: &str = r#"<html><head><title></title>
    <script src="/_next/static/chunks/main.js"></script></head>
    <body><div id="__next"></div><noscript>Enable JavaScript</noscript></body></html>"#;

const SPA_RENDERED: &str = r#"<html><head><title>Citadel</title></head>
    <body><h1 class="page-heading">Imperial Citadel</h1>
    <iframe src="https://www.youtube.com/embed/hue777"></iframe></body></html>"#;

fn loader() -> MemoryLoader {
    MemoryLoader::new()
        .with_page(CAM_URL, &cam_page())
        .with_page(SPA_URL, SPA_SHELL)
        .with_rendered(SPA_URL, SPA_RENDERED)
        .with_page(BARE_URL, "<html><head><title>Square</title></head><body></body></html>")
}

#[tokio::test]
async fn process_resolves_and_stores_record() {
    let dir = tempfile::TempDir::new().unwrap();
    let store = RecordStore::open(dir.path(), "");
    let pipeline = Pipeline::new(&config(), loader(), store).unwrap();

    // Locale rewrite and `@` stripping happen before loading.
    let raw = "@https://cams.example.com/vi/countries/vietnam/da-nang/dragon-bridge/";
    let outcome = pipeline.process(raw).await.unwrap();

    assert_eq!(outcome.url, CAM_URL);
    assert_eq!(outcome.load_mode, LoadMode::Static);
    assert!(!outcome.assessment.needs_rendering);
    assert_eq!(outcome.record.title, "Dragon Bridge");
    assert_eq!(outcome.record.country, "Vietnam");
    assert_eq!(outcome.record.city, "Da Nang");
    assert_eq!(outcome.record.embed_url, "https://www.youtube.com/embed/abc123");
    assert_eq!(outcome.record.content_url, "https://www.youtube.com/watch?v=abc123");
    assert_eq!(outcome.record.coordinates.unwrap().zoom, Some(15));
    assert!(outcome.merge.unwrap().appended);

    let stored = pipeline.store().load("Vietnam");
    assert_eq!(stored.len(), 1);
    assert_eq!(stored[0]["city"], "Da Nang");
}

#[tokio::test]
async fn client_rendered_page_gets_rendered_pass() {
    let dir = tempfile::TempDir::new().unwrap();
    let pipeline = Pipeline::new(&config(), loader(), RecordStore::open(dir.path(), "")).unwrap();

    let outcome = pipeline.process(SPA_URL).await.unwrap();
    assert!(outcome.assessment.needs_rendering);
    assert_eq!(outcome.load_mode, LoadMode::Rendered);
    assert_eq!(outcome.record.title, "Imperial Citadel");
    assert_eq!(outcome.record.city, "Hue");
    assert!(outcome.persistable);
}

#[tokio::test]
async fn run_counts_every_outcome_and_is_idempotent() {
    let dir = tempfile::TempDir::new().unwrap();
    let mut config = config();
    config.pipeline.output_mode = OutputMode::Full;
    config.pipeline.file_suffix = "_full".to_string();
    let store = RecordStore::open(dir.path(), &config.pipeline.file_suffix);
    let pipeline = Pipeline::new(&config, loader(), store).unwrap();

    let urls: Vec<String> = [
        CAM_URL,
        BARE_URL,
        "not a url",
        "https://cams.example.com/en/countries/vietnam/missing/",
        SPA_URL,
    ]
    .iter()
    .map(|s| s.to_string())
    .collect();

    let stats = pipeline.run(&urls).await;
    assert_eq!(
        stats,
        RunStats {
            total: 5,
            saved: 2,
            duplicates: 0,
            incomplete: 1,
            failed: 2,
        }
    );

    let path = dir.path().join("Vietnam_full.json");
    let first = std::fs::read_to_string(&path).unwrap();
    let entries: Vec<serde_json::Value> = serde_json::from_str(&first).unwrap();
    assert_eq!(entries.len(), 2);
    assert_eq!(entries[0]["url"], CAM_URL);
    assert!(!dir.path().join("Laos_full.json").exists());

    let again = pipeline.run(&urls[..1]).await;
    assert_eq!(again.duplicates, 1);
    assert_eq!(std::fs::read_to_string(&path).unwrap(), first);
}
