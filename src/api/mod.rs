#[cfg(feature = "swagger")]
pub mod openapi;

pub mod build;
pub mod computation;
pub mod error;
pub mod health;
pub mod root_network;
pub mod studies;
pub mod tree;

use axum::routing::{delete, get, post, put};
use axum::Router;
use std::time::Duration;
use tower::ServiceBuilder;
use tower_http::{timeout::TimeoutLayer, trace::TraceLayer};

use crate::{config::Config, orchestrator::AppState};

pub fn router(state: AppState, cfg: &Config) -> Router {
    let mut router = Router::new().nest("/api/v1", v1_router(state));

    if cfg.server.enable_cors {
        use tower_http::cors::{AllowOrigin, CorsLayer};
        let cors = CorsLayer::new()
            .allow_origin(AllowOrigin::exact("http://localhost:3000".parse().unwrap()))
            .allow_methods([
                axum::http::Method::GET,
                axum::http::Method::POST,
                axum::http::Method::PUT,
                axum::http::Method::DELETE,
            ])
            .allow_headers([
                axum::http::header::AUTHORIZATION,
                axum::http::header::CONTENT_TYPE,
            ]);
        router = router.layer(cors);
    }

    router
        .layer(
            ServiceBuilder::new()
                .layer(axum::extract::DefaultBodyLimit::max(1024 * 1024))
                .layer(TimeoutLayer::new(Duration::from_secs(
                    cfg.server.request_timeout_secs,
                ))),
        )
        .layer(TraceLayer::new_for_http())
}

pub fn v1_router(state: AppState) -> Router {
    Router::new()
        .route("/healthz", get(health::healthz))
        .route(
            "/studies",
            post(studies::create_study).get(studies::list_studies),
        )
        .route(
            "/studies/:study_id",
            get(studies::get_study).delete(studies::delete_study),
        )
        .route("/studies/:study_id/tree", get(tree::get_tree))
        .route(
            "/studies/:study_id/tree/nodes",
            post(tree::duplicate_node).delete(tree::delete_nodes),
        )
        .route("/studies/:study_id/tree/nodes/:node_id", post(tree::create_node))
        .route("/studies/:study_id/tree/nodes/:node_id/move", post(tree::move_node))
        .route("/studies/:study_id/tree/nodes/:node_id/name", put(tree::rename_node))
        .route("/studies/:study_id/tree/nodes/:node_id/stash", post(tree::stash_node))
        .route("/studies/:study_id/tree/nodes/restore", post(tree::restore_nodes))
        .route("/studies/:study_id/tree/stash", get(tree::stashed_nodes))
        .route(
            "/studies/:study_id/tree/subtrees/:node_id/move",
            post(tree::move_subtree),
        )
        .route(
            "/studies/:study_id/tree/subtrees/:node_id/duplicate",
            post(tree::duplicate_subtree),
        )
        .route(
            "/studies/:study_id/nodes/:node_id/modifications",
            post(tree::create_modification),
        )
        .route(
            "/studies/:study_id/root-networks",
            get(root_network::list_root_networks).post(root_network::create_root_network),
        )
        .route(
            "/studies/:study_id/root-networks/:root_network_id",
            delete(root_network::delete_root_network),
        )
        .route(
            "/studies/:study_id/root-networks/:root_network_id/nodes/:node_id/build",
            post(build::build_node).delete(build::unbuild_node),
        )
        .route(
            "/studies/:study_id/root-networks/:root_network_id/nodes/:node_id/build-info",
            get(build::build_info),
        )
        .route(
            "/studies/:study_id/root-networks/:root_network_id/nodes/:node_id/computations/:kind/run",
            post(computation::run_computation),
        )
        .route(
            "/studies/:study_id/root-networks/:root_network_id/nodes/:node_id/computations/:kind/stop",
            put(computation::stop_computation),
        )
        .route(
            "/studies/:study_id/root-networks/:root_network_id/nodes/:node_id/computations/:kind/status",
            get(computation::computation_status),
        )
        .route(
            "/studies/:study_id/root-networks/:root_network_id/nodes/:node_id/computations/:kind/result",
            get(computation::computation_result).delete(computation::delete_computation_result),
        )
        .route("/computations/results", post(computation::notify_completion))
        .with_state(state)
}

#[cfg(feature = "swagger")]
pub fn with_swagger(app: Router) -> Router {
    use crate::api::openapi::ApiDoc;
    use utoipa::OpenApi;
    use utoipa_swagger_ui::SwaggerUi;
    app.merge(SwaggerUi::new("/swagger-ui").url("/api-doc/openapi.json", ApiDoc::openapi()))
}
