//! HTTP request handlers

use std::sync::Arc;

use axum::{
    extract::{Multipart, State},
    Json,
};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::info;

use crate::normalize::TrainingResponse;
use crate::service::TrainCommand;
use crate::task::TaskKind;

use super::error::{Result, ServerError};
use super::state::AppState;

pub const NO_FILE_MESSAGE: &str = "No dataset file provided. Please upload a CSV or Excel file.";

pub async fn root() -> Json<Value> {
    Json(serde_json::json!({
        "message": "Welcome to AutoML Agent API",
    }))
}

pub async fn health_check() -> Json<Value> {
    Json(serde_json::json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

fn non_empty(value: String) -> Option<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

/// Train from a multipart upload
pub async fn train(
    State(state): State<Arc<AppState>>,
    mut multipart: Multipart,
) -> Result<Json<TrainingResponse>> {
    let bad_request = |e: axum::extract::multipart::MultipartError| ServerError::BadRequest(e.to_string());

    let mut prompt = None;
    let mut file = None;
    let mut command = TrainCommand::default();

    while let Some(field) = multipart.next_field().await.map_err(bad_request)? {
        let name = field.name().unwrap_or_default().to_string();
        match name.as_str() {
            "file" => {
                let file_name = field.file_name().unwrap_or_default().to_string();
                let bytes = field.bytes().await.map_err(bad_request)?;
                if !file_name.is_empty() {
                    file = Some((file_name, bytes.to_vec()));
                }
            }
            "prompt" => prompt = Some(field.text().await.map_err(bad_request)?),
            "target_column" => command.target_column = non_empty(field.text().await.map_err(bad_request)?),
            "task_type" => command.task_type = non_empty(field.text().await.map_err(bad_request)?),
            "metric" => command.metric = non_empty(field.text().await.map_err(bad_request)?),
            _ => {}
        }
    }

    command.prompt = prompt.ok_or_else(|| ServerError::BadRequest("Missing required field: prompt".to_string()))?;
    let (file_name, bytes) = file.ok_or_else(|| ServerError::BadRequest(NO_FILE_MESSAGE.to_string()))?;

    info!(
        file = %file_name,
        size_bytes = bytes.len(),
        target_column = ?command.target_column,
        "Received training request"
    );
    command.file_name = file_name;
    command.bytes = bytes;

    let response = state.service.train(command).await?;
    Ok(Json(response))
}

#[derive(Debug, Deserialize)]
pub struct PredictRequest {
    pub model_name: String,
    pub features: Map<String, Value>,
}

#[derive(Debug, Serialize)]
pub struct ModelInfo {
    pub model_name: String,
    pub model_type: TaskKind,
    pub features_used: Vec<String>,
}

#[derive(Debug, Serialize)]
pub struct PredictResponse {
    pub prediction: Value,
    pub prediction_probabilities: Option<std::collections::BTreeMap<String, f64>>,
    pub model_info: ModelInfo,
}

pub async fn predict(
    State(state): State<Arc<AppState>>,
    Json(request): Json<PredictRequest>,
) -> Result<Json<PredictResponse>> {
    let outcome = state.service.predict(&request.model_name, request.features).await?;

    Ok(Json(PredictResponse {
        prediction: outcome.prediction,
        prediction_probabilities: outcome.probabilities,
        model_info: ModelInfo {
            model_name: request.model_name,
            model_type: outcome.model_type,
            features_used: outcome.features_used,
        },
    }))
}

pub async fn list_models(State(state): State<Arc<AppState>>) -> Result<Json<Value>> {
    let models = state.service.list_models()?;
    Ok(Json(serde_json::json!({ "models": models })))
}
