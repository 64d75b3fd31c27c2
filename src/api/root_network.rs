use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use serde::Deserialize;
use uuid::Uuid;

use crate::domain::StudyError;
use crate::orchestrator::AppState;

#[cfg_attr(feature = "swagger", derive(utoipa::ToSchema))]
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateRootNetworkRequest {
    pub name: String,
    pub tag: String,
    pub network_id: Uuid,
}

pub async fn list_root_networks(
    State(st): State<AppState>,
    Path(study_id): Path<Uuid>,
) -> Result<impl IntoResponse, StudyError> {
    Ok(Json(st.orchestrator.studies.root_networks(study_id).await?))
}

pub async fn create_root_network(
    State(st): State<AppState>,
    Path(study_id): Path<Uuid>,
    Json(req): Json<CreateRootNetworkRequest>,
) -> Result<impl IntoResponse, StudyError> {
    let root_network = st
        .orchestrator
        .add_root_network(study_id, req.name, req.tag, req.network_id)
        .await?;
    Ok((StatusCode::OK, Json(root_network)))
}

pub async fn delete_root_network(
    State(st): State<AppState>,
    Path((study_id, root_network_id)): Path<(Uuid, Uuid)>,
) -> Result<impl IntoResponse, StudyError> {
    st.orchestrator
        .remove_root_network(study_id, root_network_id)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}
