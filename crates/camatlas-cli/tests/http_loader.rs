//! HttpLoader against a local mock server.

use camatlas::{DocumentLoader, LoadMode};
use camatlas_cli::HttpLoader;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

#[tokio::test]
async fn follows_redirects_and_reports_final_url() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/vi/cam"))
        .respond_with(
            ResponseTemplate::new(302).insert_header("Location", format!("{}/en/cam", server.uri())),
        )
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/en/cam"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<title>Cam</title>"))
        .mount(&server)
        .await;

    let loader = HttpLoader::new(5_000).unwrap();
    let page = loader
        .load(&format!("{}/vi/cam", server.uri()), LoadMode::Static)
        .await
        .unwrap();
    assert_eq!(page.final_url, format!("{}/en/cam", server.uri()));
    assert!(page.html.contains("Cam"));
    assert_eq!(page.mode, LoadMode::Static);
}

#[tokio::test]
async fn retries_server_errors() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/flaky"))
        .respond_with(ResponseTemplate::new(503))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/flaky"))
        .respond_with(ResponseTemplate::new(200).set_body_string("ok"))
        .mount(&server)
        .await;

    let loader = HttpLoader::new(5_000).unwrap();
    let page = loader
        .load(&format!("{}/flaky", server.uri()), LoadMode::Rendered)
        .await
        .unwrap();
    assert_eq!(page.html, "ok");
    // Plain HTTP never renders.
    assert_eq!(page.mode, LoadMode::Static);
}

#[tokio::test]
async fn client_errors_fail_the_load() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/gone"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let loader = HttpLoader::new(5_000).unwrap();
    let err = loader
        .load(&format!("{}/gone", server.uri()), LoadMode::Static)
        .await
        .unwrap_err();
    assert!(err.to_string().contains("404"));
}
