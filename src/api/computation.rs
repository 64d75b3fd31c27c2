use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use serde::Serialize;
use uuid::Uuid;

use crate::domain::{ComputationKind, StudyError};
use crate::orchestrator::{AppState, CompletionEvent};

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RunResponse {
    pub result_id: Uuid,
}

pub async fn run_computation(
    State(st): State<AppState>,
    Path((study_id, root_network_id, node_id, kind)): Path<(Uuid, Uuid, Uuid, ComputationKind)>,
    body: Option<Json<serde_json::Value>>,
) -> Result<impl IntoResponse, StudyError> {
    let parameters = body.map(|Json(value)| value);
    let result_id = st
        .orchestrator
        .run_computation(study_id, root_network_id, node_id, kind, parameters)
        .await?;
    Ok((StatusCode::OK, Json(RunResponse { result_id })))
}

pub async fn stop_computation(
    State(st): State<AppState>,
    Path((study_id, root_network_id, node_id, kind)): Path<(Uuid, Uuid, Uuid, ComputationKind)>,
) -> Result<impl IntoResponse, StudyError> {
    st.orchestrator
        .stop_computation(study_id, root_network_id, node_id, kind)
        .await?;
    Ok(StatusCode::OK)
}

pub async fn computation_status(
    State(st): State<AppState>,
    Path((study_id, root_network_id, node_id, kind)): Path<(Uuid, Uuid, Uuid, ComputationKind)>,
) -> Result<impl IntoResponse, StudyError> {
    let status = st
        .orchestrator
        .computation_status(study_id, root_network_id, node_id, kind)
        .await?;
    match status {
        Some(status) => Ok((StatusCode::OK, Json(status)).into_response()),
        None => Ok(StatusCode::NO_CONTENT.into_response()),
    }
}

pub async fn computation_result(
    State(st): State<AppState>,
    Path((study_id, root_network_id, node_id, kind)): Path<(Uuid, Uuid, Uuid, ComputationKind)>,
) -> Result<impl IntoResponse, StudyError> {
    let result = st
        .orchestrator
        .computation_result(study_id, root_network_id, node_id, kind)
        .await?;
    match result {
        Some(value) => Ok((StatusCode::OK, Json(value)).into_response()),
        // the run is still in flight
        None => Ok(StatusCode::NO_CONTENT.into_response()),
    }
}

pub async fn delete_computation_result(
    State(st): State<AppState>,
    Path((study_id, root_network_id, node_id, kind)): Path<(Uuid, Uuid, Uuid, ComputationKind)>,
) -> Result<impl IntoResponse, StudyError> {
    st.orchestrator
        .delete_computation_result(study_id, root_network_id, node_id, kind)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

/// POST /computations/results - completion callback from analysis services.
/// Queued to the consumer task; the request returns immediately.
pub async fn notify_completion(
    State(st): State<AppState>,
    Json(event): Json<CompletionEvent>,
) -> Result<impl IntoResponse, StudyError> {
    st.completions
        .send(event)
        .await
        .map_err(|_| StudyError::Internal("completion consumer is gone".to_string()))?;
    Ok(StatusCode::ACCEPTED)
}
