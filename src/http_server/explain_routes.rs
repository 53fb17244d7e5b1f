//! # Explanation HTTP Routes
//!
//! Thin request-parsing wrappers around the explanation service. Handlers
//! validate the request, run the blocking explanation pipeline on a worker
//! thread, and return the service's response body verbatim. GET on each
//! endpoint serves its static method documentation.

use std::sync::Arc;

use axum::{
    extract::{DefaultBodyLimit, Multipart, Path, State},
    http::{header, StatusCode},
    routing::{get, post},
    Json, Router,
};
use serde::Serialize;
use serde_json::{json, Value};

use crate::explain::{
    CounterfactualImageRequest, ExplainError, ExplainService, SchemaCounterfactualRequest,
    ShapKernelRequest, ShapTreeRequest,
};
use crate::observability::Logger;
use crate::render;

// ==================
// Shared State
// ==================

/// State shared across handlers: the request-scoped explanation service
pub struct AppState {
    pub service: ExplainService,
}

impl AppState {
    pub fn new(service: ExplainService) -> Self {
        Self { service }
    }
}

// ==================
// Error Responses
// ==================

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub code: u16,
}

type HandlerError = (StatusCode, Json<ErrorResponse>);

fn explain_error(path: &'static str, err: ExplainError) -> HandlerError {
    let code = err.status_code();
    let message = err.to_string();
    Logger::error(
        "request.failed",
        &[("path", path), ("cause", &message)],
    );
    (
        StatusCode::from_u16(code).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR),
        Json(ErrorResponse {
            error: message,
            code,
        }),
    )
}

fn bad_request(message: impl Into<String>) -> HandlerError {
    (
        StatusCode::BAD_REQUEST,
        Json(ErrorResponse {
            error: message.into(),
            code: 400,
        }),
    )
}

fn worker_failed() -> HandlerError {
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(ErrorResponse {
            error: "explanation worker failed".to_string(),
            code: 500,
        }),
    )
}

// ==================
// Routes
// ==================

/// Create the explanation routes
pub fn explain_routes(state: Arc<AppState>) -> Router {
    Router::new()
        .route(
            "/images/counterfactual",
            post(counterfactual_image_handler).get(counterfactual_image_docs),
        )
        .route(
            "/tabular/shap-kernel",
            post(shap_kernel_handler).get(shap_kernel_docs),
        )
        .route(
            "/tabular/shap-tree",
            post(shap_tree_handler).get(shap_tree_docs),
        )
        .route(
            "/tabular/counterfactual-schema",
            post(schema_counterfactual_handler).get(schema_counterfactual_docs),
        )
        .route("/artifacts/:name", get(artifact_handler))
        .layer(DefaultBodyLimit::max(16 * 1024 * 1024))
        .with_state(state)
}

/// Health check routes
pub fn health_routes() -> Router {
    Router::new().route("/health", get(health_handler))
}

async fn health_handler() -> Json<Value> {
    Json(json!({"status": "ok"}))
}

// ==================
// Explanation Handlers
// ==================

async fn shap_kernel_handler(
    State(state): State<Arc<AppState>>,
    Json(request): Json<ShapKernelRequest>,
) -> Result<Json<Value>, HandlerError> {
    const PATH: &str = "/tabular/shap-kernel";
    Logger::info("explain.request", &[("path", PATH), ("id", &request.id)]);
    let body = tokio::task::spawn_blocking(move || state.service.shap_kernel(&request, PATH))
        .await
        .map_err(|_| worker_failed())?
        .map_err(|e| explain_error(PATH, e))?;
    Ok(Json(body))
}

async fn shap_tree_handler(
    State(state): State<Arc<AppState>>,
    Json(request): Json<ShapTreeRequest>,
) -> Result<Json<Value>, HandlerError> {
    const PATH: &str = "/tabular/shap-tree";
    Logger::info("explain.request", &[("path", PATH), ("id", &request.id)]);
    let body = tokio::task::spawn_blocking(move || state.service.shap_tree(&request, PATH))
        .await
        .map_err(|_| worker_failed())?
        .map_err(|e| explain_error(PATH, e))?;
    Ok(Json(body))
}

async fn schema_counterfactual_handler(
    State(state): State<Arc<AppState>>,
    Json(request): Json<SchemaCounterfactualRequest>,
) -> Result<Json<Value>, HandlerError> {
    const PATH: &str = "/tabular/counterfactual-schema";
    Logger::info("explain.request", &[("path", PATH), ("id", &request.id)]);
    let body =
        tokio::task::spawn_blocking(move || state.service.schema_counterfactuals(&request, PATH))
            .await
            .map_err(|_| worker_failed())?
            .map_err(|e| explain_error(PATH, e))?;
    Ok(Json(body))
}

async fn counterfactual_image_handler(
    State(state): State<Arc<AppState>>,
    mut multipart: Multipart,
) -> Result<Json<Value>, HandlerError> {
    const PATH: &str = "/images/counterfactual";

    let mut request = CounterfactualImageRequest::default();
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| bad_request(format!("invalid multipart body: {}", e)))?
    {
        let name = field.name().map(str::to_string);
        match name.as_deref() {
            Some("id") => {
                request.id = field
                    .text()
                    .await
                    .map_err(|e| bad_request(format!("invalid 'id' field: {}", e)))?;
            }
            Some("url") => {
                let url = field
                    .text()
                    .await
                    .map_err(|e| bad_request(format!("invalid 'url' field: {}", e)))?;
                if !url.is_empty() {
                    request.url = Some(url);
                }
            }
            Some("params") => {
                let text = field
                    .text()
                    .await
                    .map_err(|e| bad_request(format!("invalid 'params' field: {}", e)))?;
                request.params = serde_json::from_str(&text)
                    .map_err(|e| bad_request(format!("invalid 'params' JSON: {}", e)))?;
            }
            Some("image") => {
                let bytes = field
                    .bytes()
                    .await
                    .map_err(|e| bad_request(format!("invalid 'image' field: {}", e)))?;
                let tensor = render::decode_image(&bytes)
                    .map_err(|e| bad_request(format!("could not decode image file: {}", e)))?;
                request.image = Some(tensor);
            }
            _ => {}
        }
    }
    if request.id.is_empty() {
        return Err(bad_request("the 'id' field is required"));
    }

    Logger::info("explain.request", &[("path", PATH), ("id", &request.id)]);
    let body =
        tokio::task::spawn_blocking(move || state.service.counterfactual_image(&request, PATH))
            .await
            .map_err(|_| worker_failed())?
            .map_err(|e| explain_error(PATH, e))?;
    Ok(Json(body))
}

// ==================
// Artifact Handler
// ==================

async fn artifact_handler(
    State(state): State<Arc<AppState>>,
    Path(name): Path<String>,
) -> Result<impl axum::response::IntoResponse, HandlerError> {
    let (mime, data) = state.service.artifacts().fetch(&name).map_err(|e| {
        let code = e.status_code();
        (
            StatusCode::from_u16(code).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR),
            Json(ErrorResponse {
                error: e.to_string(),
                code,
            }),
        )
    })?;
    Ok(([(header::CONTENT_TYPE, mime.content_type())], data))
}

// ==================
// Method Documentation
// ==================

async fn shap_kernel_docs() -> Json<Value> {
    Json(json!({
        "_method_description": "Displays the contribution of each attribute to an individual \
            prediction, based on Shapley values. Accepts the 'id' of a stored model, the \
            'instance' to explain, an optional prediction 'url', and an optional 'params' object.",
        "id": "Identifier of the ML model that was stored locally.",
        "instance": "Array with the feature values of an instance, without the target value.",
        "url": "External URL of the prediction function, used when no model artifact is stored. \
            Must accept a POST with a batch of N instances and return N outputs in order.",
        "params": {
            "output_index": "(Optional) Index of the class to explain. Ignored for regression \
                models. Defaults to 1.",
            "plot_type": "(Optional) One of 'bar', 'decision', 'force', 'waterfall'. Defaults \
                to 'waterfall'.",
            "samples": "(Optional) Feature permutations sampled by the estimator."
        }
    }))
}

async fn shap_tree_docs() -> Json<Value> {
    Json(json!({
        "_method_description": "Displays per-attribute contributions over the model's whole \
            reference dataset, for tree-structured estimators only. Accepts the 'id' of a \
            stored model and an optional 'params' object.",
        "id": "Identifier of the ML model that was stored locally.",
        "params": {
            "output_index": "(Optional) Index of the class to explain. Ignored for regression \
                models. Defaults to 1.",
            "samples": "(Optional) Feature permutations sampled per dataset row."
        }
    }))
}

async fn counterfactual_image_docs() -> Json<Value> {
    Json(json!({
        "_method_description": "Finds an image as similar as possible to the original but \
            predicted into a different class. Accepts multipart fields: 'id', optional 'url', \
            optional 'params' JSON, and optionally the 'image' file to explain.",
        "id": "Identifier of the ML model that was stored locally.",
        "url": "External URL of the prediction function, used when no model artifact is stored.",
        "image": "Image file to explain. Recommended for black-and-white or RGB-encoded images; \
            otherwise pass the matrix in params.",
        "params": {
            "image": "Matrix representing the image. Ignored if an image file was uploaded.",
            "target_class": "'other', 'same', or an integer class index for the counterfactual.",
            "target_proba": "Float from 0 to 1: target probability for the counterfactual."
        }
    }))
}

async fn schema_counterfactual_docs() -> Json<Value> {
    Json(json!({
        "_method_description": "Generates counterfactuals without any training data; requires \
            the feature format and ranges declared in the model metadata. Graph-backed models \
            only. Accepts the 'id', the 'instance', and an optional 'params' object.",
        "id": "Identifier of the ML model that was stored locally.",
        "instance": "Array with the feature values of an instance, optionally including the \
            target value.",
        "params": {
            "desired_class": "(Optional) Index of the desired counterfactual class, or \
                'opposite' for binary classification. Defaults to class 1.",
            "features_to_vary": "(Optional) 'all' or a list of feature names. Defaults to all.",
            "num_cfs": "(Optional) Counterfactuals generated per instance. Defaults to 3.",
            "method": "(Optional) 'random' or 'genetic'. Defaults to 'random'.",
            "type_and_precision": "(Optional) Object keyed by continuous feature name: 'int', \
                or ['float', precision]."
        },
        "params_example": {
            "features_to_vary": "all",
            "desired_class": 0,
            "num_cfs": 3,
            "method": "random",
            "type_and_precision": {"Height": ["float", 1], "Weight": "int"}
        }
    }))
}
