//! HTTP API tests
//!
//! Drives the full router with in-process requests: JSON endpoints, the
//! uniform response shape, error bodies, and artifact serving.

use std::fs;
use std::path::Path;

use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use axum::Router;
use glassbox::http_server::{HttpServer, ServerConfig};
use serde_json::{json, Value};
use tempfile::TempDir;
use tower::ServiceExt;

// =============================================================================
// Fixtures
// =============================================================================

fn write_model(root: &Path, id: &str, info: &str, model: Option<&str>, data: Option<&str>) {
    let dir = root.join(id);
    fs::create_dir_all(&dir).unwrap();
    fs::write(dir.join("info.json"), info).unwrap();
    if let Some(model) = model {
        fs::write(dir.join("model.json"), model).unwrap();
    }
    if let Some(data) = data {
        fs::write(dir.join("data.json"), data).unwrap();
    }
}

fn router(temp: &TempDir) -> Router {
    let models = temp.path().join("models");
    fs::create_dir_all(&models).unwrap();

    write_model(
        &models,
        "iris",
        r#"{"backend": "estimator", "output_names": ["setosa", "versicolor", "virginica"]}"#,
        Some(
            r#"{
                "estimator": "linear",
                "coefficients": [
                    [0.4, 0.1, -0.5],
                    [0.8, 0.2, -1.0],
                    [-1.2, 0.1, 1.1],
                    [-1.0, -0.2, 1.2]
                ],
                "intercepts": [0.5, 0.8, -1.3],
                "task": {"classification": {"classes": 3}}
            }"#,
        ),
        Some(
            r#"{
                "columns": ["a", "b", "c", "d", "species"],
                "rows": [
                    [5.1, 3.5, 1.4, 0.2, 0.0],
                    [6.4, 3.2, 4.5, 1.5, 1.0],
                    [6.3, 3.3, 6.0, 2.5, 2.0]
                ]
            }"#,
        ),
    );
    // Descriptor-only entry: no artifact stored, requests must supply a URL
    write_model(&models, "url-only", r#"{"backend": "estimator"}"#, None, None);

    let config = ServerConfig {
        model_dir: models,
        artifact_dir: temp.path().join("artifacts"),
        public_base: Some("http://localhost:8090/artifacts".to_string()),
        ..ServerConfig::default()
    };
    HttpServer::with_config(config).router()
}

async fn get(router: &Router, uri: &str) -> (StatusCode, Vec<u8>) {
    let response = router
        .clone()
        .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
        .await
        .unwrap();
    let status = response.status();
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    (status, body.to_vec())
}

async fn post_json(router: &Router, uri: &str, body: Value) -> (StatusCode, Value) {
    let response = router
        .clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri(uri)
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
        )
        .await
        .unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    (status, serde_json::from_slice(&bytes).unwrap())
}

// =============================================================================
// Tests
// =============================================================================

#[tokio::test]
async fn test_health_check() {
    let temp = TempDir::new().unwrap();
    let router = router(&temp);
    let (status, body) = get(&router, "/health").await;
    assert_eq!(status, StatusCode::OK);
    let body: Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(body["status"], "ok");
}

#[tokio::test]
async fn test_discovery_documents_served_on_get() {
    let temp = TempDir::new().unwrap();
    let router = router(&temp);
    for uri in [
        "/tabular/shap-kernel",
        "/tabular/shap-tree",
        "/tabular/counterfactual-schema",
        "/images/counterfactual",
    ] {
        let (status, body) = get(&router, uri).await;
        assert_eq!(status, StatusCode::OK, "GET {} failed", uri);
        let body: Value = serde_json::from_slice(&body).unwrap();
        assert!(body["_method_description"].as_str().is_some());
    }
}

#[tokio::test]
async fn test_shap_kernel_response_shape_and_artifact() {
    let temp = TempDir::new().unwrap();
    let router = router(&temp);

    let (status, body) = post_json(
        &router,
        "/tabular/shap-kernel",
        json!({"id": "iris", "instance": [5.1, 3.5, 1.4, 0.2]}),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let explanation = body["explanation"].as_array().unwrap();
    assert_eq!(explanation.len(), 4);

    // The plot URL resolves through the artifact route
    let png_url = body["plot_png"].as_str().unwrap();
    let name = png_url.rsplit('/').next().unwrap();
    let (status, bytes) = get(&router, &format!("/artifacts/{}", name)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(&bytes[1..4], b"PNG");
}

#[tokio::test]
async fn test_missing_model_and_url_fails_with_no_result_fields() {
    let temp = TempDir::new().unwrap();
    let router = router(&temp);

    let (status, body) = post_json(
        &router,
        "/tabular/shap-kernel",
        json!({"id": "url-only", "instance": [1.0, 2.0]}),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].as_str().unwrap().contains("must be provided"));
    assert!(body.get("plot_png").is_none());
    assert!(body.get("explanation").is_none());
}

#[tokio::test]
async fn test_unknown_model_is_not_found() {
    let temp = TempDir::new().unwrap();
    let router = router(&temp);

    let (status, body) = post_json(
        &router,
        "/tabular/shap-kernel",
        json!({"id": "nope", "instance": [1.0]}),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert!(body["error"].as_str().unwrap().contains("nope"));
}

#[tokio::test]
async fn test_out_of_range_output_index_is_bad_request() {
    let temp = TempDir::new().unwrap();
    let router = router(&temp);

    let (status, body) = post_json(
        &router,
        "/tabular/shap-kernel",
        json!({
            "id": "iris",
            "instance": [5.1, 3.5, 1.4, 0.2],
            "params": {"output_index": 3}
        }),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].as_str().unwrap().contains("out of range"));
}

#[tokio::test]
async fn test_missing_artifact_is_not_found() {
    let temp = TempDir::new().unwrap();
    let router = router(&temp);
    let (status, _) = get(&router, "/artifacts/never-made.png").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}
