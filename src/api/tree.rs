use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use serde::Deserialize;
use uuid::Uuid;

use crate::domain::{InsertMode, NodeType, StudyError};
use crate::orchestrator::AppState;

#[cfg_attr(feature = "swagger", derive(utoipa::ToSchema))]
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateNodeRequest {
    pub name: String,
    #[serde(default = "default_node_type")]
    pub node_type: NodeType,
}

fn default_node_type() -> NodeType {
    NodeType::Construction
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InsertQuery {
    #[serde(default = "default_insert_mode")]
    pub mode: InsertMode,
}

fn default_insert_mode() -> InsertMode {
    InsertMode::Child
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DuplicateNodeQuery {
    pub node_to_copy: Uuid,
    pub reference_node: Uuid,
    #[serde(default = "default_insert_mode")]
    pub insert_mode: InsertMode,
    pub source_study: Option<Uuid>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MoveNodeQuery {
    pub reference_node: Uuid,
    #[serde(default = "default_insert_mode")]
    pub insert_mode: InsertMode,
    /// Accepted for API symmetry with duplication; a value different from
    /// the target study is rejected.
    pub source_study: Option<Uuid>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MoveSubtreeQuery {
    pub reference_node: Uuid,
    pub source_study: Option<Uuid>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DuplicateSubtreeQuery {
    pub reference_node: Uuid,
    pub source_study: Option<Uuid>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeleteNodesQuery {
    /// Comma-separated node ids.
    pub ids: String,
    #[serde(default)]
    pub delete_children: bool,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StashQuery {
    #[serde(default)]
    pub stash_children: bool,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RestoreQuery {
    /// Comma-separated stashed node ids.
    pub ids: String,
    pub anchor_node: Uuid,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RenameRequest {
    pub name: String,
}

fn parse_ids(raw: &str) -> Result<Vec<Uuid>, StudyError> {
    raw.split(',')
        .filter(|s| !s.is_empty())
        .map(|s| {
            s.trim()
                .parse()
                .map_err(|_| StudyError::not_found(format!("node {s}")))
        })
        .collect()
}

pub async fn get_tree(
    State(st): State<AppState>,
    Path(study_id): Path<Uuid>,
) -> Result<impl IntoResponse, StudyError> {
    st.orchestrator.studies.study(study_id).await?;
    Ok(Json(st.orchestrator.tree.tree_view(study_id).await?))
}

/// POST /studies/:study_id/tree/nodes/:node_id?mode=
pub async fn create_node(
    State(st): State<AppState>,
    Path((study_id, reference)): Path<(Uuid, Uuid)>,
    Query(q): Query<InsertQuery>,
    Json(req): Json<CreateNodeRequest>,
) -> Result<impl IntoResponse, StudyError> {
    let node = st
        .orchestrator
        .create_node(study_id, reference, q.mode, req.name, req.node_type)
        .await?;
    Ok((StatusCode::OK, Json(node)))
}

/// POST /studies/:study_id/tree/nodes?nodeToCopy=&referenceNode=&insertMode=
pub async fn duplicate_node(
    State(st): State<AppState>,
    Path(study_id): Path<Uuid>,
    Query(q): Query<DuplicateNodeQuery>,
) -> Result<impl IntoResponse, StudyError> {
    let node = st
        .orchestrator
        .duplicate_node(
            study_id,
            q.source_study,
            q.node_to_copy,
            q.reference_node,
            q.insert_mode,
        )
        .await?;
    Ok((StatusCode::OK, Json(node)))
}

pub async fn move_node(
    State(st): State<AppState>,
    Path((study_id, node_id)): Path<(Uuid, Uuid)>,
    Query(q): Query<MoveNodeQuery>,
) -> Result<impl IntoResponse, StudyError> {
    st.orchestrator
        .move_node(study_id, q.source_study, node_id, q.reference_node, q.insert_mode)
        .await?;
    Ok(StatusCode::OK)
}

pub async fn move_subtree(
    State(st): State<AppState>,
    Path((study_id, node_id)): Path<(Uuid, Uuid)>,
    Query(q): Query<MoveSubtreeQuery>,
) -> Result<impl IntoResponse, StudyError> {
    st.orchestrator
        .move_subtree(study_id, q.source_study, node_id, q.reference_node)
        .await?;
    Ok(StatusCode::OK)
}

pub async fn duplicate_subtree(
    State(st): State<AppState>,
    Path((study_id, node_id)): Path<(Uuid, Uuid)>,
    Query(q): Query<DuplicateSubtreeQuery>,
) -> Result<impl IntoResponse, StudyError> {
    let node = st
        .orchestrator
        .duplicate_subtree(study_id, q.source_study, node_id, q.reference_node)
        .await?;
    Ok((StatusCode::OK, Json(node)))
}

pub async fn delete_nodes(
    State(st): State<AppState>,
    Path(study_id): Path<Uuid>,
    Query(q): Query<DeleteNodesQuery>,
) -> Result<impl IntoResponse, StudyError> {
    let ids = parse_ids(&q.ids)?;
    st.orchestrator
        .delete_nodes(study_id, &ids, q.delete_children)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn stash_node(
    State(st): State<AppState>,
    Path((study_id, node_id)): Path<(Uuid, Uuid)>,
    Query(q): Query<StashQuery>,
) -> Result<impl IntoResponse, StudyError> {
    st.orchestrator
        .stash_node(study_id, node_id, q.stash_children)
        .await?;
    Ok(StatusCode::OK)
}

pub async fn restore_nodes(
    State(st): State<AppState>,
    Path(study_id): Path<Uuid>,
    Query(q): Query<RestoreQuery>,
) -> Result<impl IntoResponse, StudyError> {
    let ids = parse_ids(&q.ids)?;
    st.orchestrator
        .restore_nodes(study_id, &ids, q.anchor_node)
        .await?;
    Ok(StatusCode::OK)
}

pub async fn stashed_nodes(
    State(st): State<AppState>,
    Path(study_id): Path<Uuid>,
) -> Result<impl IntoResponse, StudyError> {
    Ok(Json(st.orchestrator.tree.stashed_nodes(study_id).await?))
}

pub async fn rename_node(
    State(st): State<AppState>,
    Path((study_id, node_id)): Path<(Uuid, Uuid)>,
    Json(req): Json<RenameRequest>,
) -> Result<impl IntoResponse, StudyError> {
    st.orchestrator
        .rename_node(study_id, node_id, req.name)
        .await?;
    Ok(StatusCode::OK)
}

/// POST /studies/:study_id/nodes/:node_id/modifications - content edit;
/// triggers the invalidation cascade on the node and its descendants.
pub async fn create_modification(
    State(st): State<AppState>,
    Path((study_id, node_id)): Path<(Uuid, Uuid)>,
    Json(payload): Json<serde_json::Value>,
) -> Result<impl IntoResponse, StudyError> {
    st.orchestrator
        .create_modification(study_id, node_id, payload)
        .await?;
    Ok(StatusCode::OK)
}
