//! Remote prediction oracle tests
//!
//! A stub scoring endpoint stands in for the external model server; the
//! oracle's wire contract and failure behavior are exercised against it.

use axum::{routing::post, Json, Router};
use glassbox::backend::{BackendError, PredictionOracle, RemoteOracle};
use glassbox::explain::{shap_kernel, RenderPlan, ShapParams};
use ndarray::{arr1, arr2};
use serde_json::{json, Value};
use std::net::SocketAddr;

async fn spawn_stub(router: Router) -> SocketAddr {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });
    addr
}

/// Scoring stub honoring the wire contract: one `[0.2, 0.8]` row per input
async fn fixed_predict(Json(body): Json<Value>) -> Json<Value> {
    let inputs = body["inputs"].as_str().unwrap_or("[]");
    let parsed: Value = serde_json::from_str(inputs).unwrap_or(json!([]));
    let n = parsed.as_array().map(Vec::len).unwrap_or(0);
    Json(Value::Array((0..n).map(|_| json!([0.2, 0.8])).collect()))
}

async fn broken_predict() -> &'static str {
    "service temporarily confused"
}

async fn short_predict() -> Json<Value> {
    Json(json!([[0.5, 0.5]]))
}

#[tokio::test]
async fn test_remote_round_trip_preserves_rows_and_order() {
    let addr = spawn_stub(Router::new().route("/predict", post(fixed_predict))).await;
    let url = format!("http://{}/predict", addr);

    let out = tokio::task::spawn_blocking(move || {
        let oracle = RemoteOracle::new(url).unwrap();
        let batch = arr2(&[[5.1, 3.5, 1.4, 0.2], [1.0, 1.0, 1.0, 1.0]]).into_dyn();
        oracle.predict(&batch)
    })
    .await
    .unwrap()
    .unwrap();

    assert_eq!(out.shape(), &[2, 2]);
    assert_eq!(out[[0, 1]], 0.8);
    assert_eq!(out[[1, 0]], 0.2);
}

#[tokio::test]
async fn test_non_json_response_is_transport_error() {
    let addr = spawn_stub(Router::new().route("/predict", post(broken_predict))).await;
    let url = format!("http://{}/predict", addr);

    let err = tokio::task::spawn_blocking(move || {
        let oracle = RemoteOracle::new(url).unwrap();
        oracle.predict(&arr2(&[[1.0]]).into_dyn())
    })
    .await
    .unwrap()
    .unwrap_err();

    match err {
        BackendError::Transport(message) => {
            assert!(message.contains("not valid JSON"));
        }
        other => panic!("expected a transport error, got {:?}", other),
    }
}

#[tokio::test]
async fn test_row_count_mismatch_is_transport_error() {
    // The stub always answers with one row, whatever the batch size
    let addr = spawn_stub(Router::new().route("/predict", post(short_predict))).await;
    let url = format!("http://{}/predict", addr);

    let err = tokio::task::spawn_blocking(move || {
        let oracle = RemoteOracle::new(url).unwrap();
        oracle.predict(&arr2(&[[1.0], [2.0], [3.0]]).into_dyn())
    })
    .await
    .unwrap()
    .unwrap_err();

    assert!(matches!(err, BackendError::Transport(_)));
}

#[tokio::test]
async fn test_attribution_baseline_uses_output_index_column() {
    // A remote model answering [[0.2, 0.8]]: with the default output index 1,
    // the selected baseline must be column 1, i.e. 0.8
    let addr = spawn_stub(Router::new().route("/predict", post(fixed_predict))).await;
    let url = format!("http://{}/predict", addr);

    let result = tokio::task::spawn_blocking(move || {
        let oracle = RemoteOracle::new(url).unwrap();
        let reference = arr2(&[[0.0, 0.0], [1.0, 1.0]]);
        let instance = arr1(&[0.5, 0.5]);
        shap_kernel::orchestrate(&oracle, &reference, &instance, &ShapParams::default())
    })
    .await
    .unwrap()
    .unwrap();

    match result.render {
        RenderPlan::Attribution { expected, .. } => assert_eq!(expected, 0.8),
        other => panic!("unexpected render plan: {:?}", other),
    }
}
