//! Satellite registry reload while the router is serving

use axum::body::Body;
use axum::http::StatusCode;
use std::io::Write;
use tower::ServiceExt;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use satellite_hub::hub::server::reload_satellites;
use satellite_hub::hub::HubServer;

use super::fixtures::*;

#[tokio::test]
async fn test_reload_switches_satellites_for_running_router() {
    let old = MockServer::start().await;
    let new = MockServer::start().await;
    for server in [&old, &new] {
        Mock::given(method("GET"))
            .and(path("/api/resources"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json(SAMPLE_POD_LIST_JSON)))
            .mount(server)
            .await;
    }

    let server = HubServer::from_config(&config(vec![satellite("old", &old, None)])).unwrap();
    let router = server.build_router();

    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(
        file,
        "[[satellites]]\nname = \"new\"\naddress = \"{}\"",
        new.uri()
    )
    .unwrap();

    let generation = reload_satellites(&server.state().registry, file.path()).unwrap();
    assert_eq!(generation, 1);

    let response = router
        .clone()
        .oneshot(authenticated("GET", "/api/resources?satellite=new", Body::empty()))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let response = router
        .clone()
        .oneshot(authenticated("GET", "/api/resources?satellite=old", Body::empty()))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let response = router
        .oneshot(anonymous("GET", "/api/satellites"))
        .await
        .unwrap();
    let body = body_json(response).await;
    assert_eq!(body["data"]["generation"], 1);
    assert_eq!(body["data"]["satellites"], serde_json::json!(["new"]));
}

#[tokio::test]
async fn test_health_reports_satellite_count() {
    let sat = MockServer::start().await;
    let router = hub(vec![satellite("dev", &sat, None), satellite("stage", &sat, None)]);

    let response = router
        .oneshot(anonymous("GET", "/api/health"))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["success"], true);
    assert_eq!(body["data"]["status"], "healthy");
    assert_eq!(body["data"]["satellites"], 2);
}

#[tokio::test]
async fn test_metrics_endpoint() {
    satellite_hub::metrics::init_metrics();
    let router = hub(Vec::new());

    // Generate at least one proxy sample
    let _ = router
        .clone()
        .oneshot(authenticated("GET", "/api/resources?satellite=prod", Body::empty()))
        .await
        .unwrap();

    let response = router.oneshot(anonymous("GET", "/metrics")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let text = String::from_utf8(body_bytes(response).await.to_vec()).unwrap();
    assert!(text.contains("satellite_hub_proxy_requests_total"));
}
