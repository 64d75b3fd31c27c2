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
pub struct CreateStudyRequest {
    pub name: String,
    /// Network/case reference for the first root network.
    pub network_id: Uuid,
    #[serde(default = "default_root_network_name")]
    pub root_network_name: String,
    #[serde(default = "default_root_network_tag")]
    pub root_network_tag: String,
}

fn default_root_network_name() -> String {
    "main".to_string()
}

fn default_root_network_tag() -> String {
    "M".to_string()
}

pub async fn create_study(
    State(st): State<AppState>,
    Json(req): Json<CreateStudyRequest>,
) -> Result<impl IntoResponse, StudyError> {
    let study = st
        .orchestrator
        .create_study(
            req.name,
            req.root_network_name,
            req.root_network_tag,
            req.network_id,
        )
        .await?;
    Ok((StatusCode::OK, Json(study)))
}

pub async fn list_studies(State(st): State<AppState>) -> impl IntoResponse {
    Json(st.orchestrator.studies.list().await)
}

pub async fn get_study(
    State(st): State<AppState>,
    Path(study_id): Path<Uuid>,
) -> Result<impl IntoResponse, StudyError> {
    Ok(Json(st.orchestrator.studies.study(study_id).await?))
}

pub async fn delete_study(
    State(st): State<AppState>,
    Path(study_id): Path<Uuid>,
) -> Result<impl IntoResponse, StudyError> {
    st.orchestrator.delete_study(study_id).await?;
    Ok(StatusCode::NO_CONTENT)
}
