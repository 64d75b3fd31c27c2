use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use uuid::Uuid;

use crate::domain::StudyError;
use crate::orchestrator::AppState;

pub async fn build_node(
    State(st): State<AppState>,
    Path((study_id, root_network_id, node_id)): Path<(Uuid, Uuid, Uuid)>,
) -> Result<impl IntoResponse, StudyError> {
    st.orchestrator
        .build_node(study_id, root_network_id, node_id)
        .await?;
    Ok(StatusCode::OK)
}

pub async fn unbuild_node(
    State(st): State<AppState>,
    Path((study_id, root_network_id, node_id)): Path<(Uuid, Uuid, Uuid)>,
) -> Result<impl IntoResponse, StudyError> {
    st.orchestrator
        .unbuild_node(study_id, root_network_id, node_id)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

/// GET .../build-info - the full matrix cell for one (node, root network).
pub async fn build_info(
    State(st): State<AppState>,
    Path((study_id, root_network_id, node_id)): Path<(Uuid, Uuid, Uuid)>,
) -> Result<impl IntoResponse, StudyError> {
    let cell = st
        .orchestrator
        .node_build_info(study_id, root_network_id, node_id)
        .await?;
    Ok(Json(cell))
}
