//! End-to-end tests against the HTTP surface, driven through the router with
//! in-process collaborators.

use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use axum::Router;
use http_body_util::BodyExt;
use serde_json::{json, Value};
use std::time::Duration;
use tower::ServiceExt;
use uuid::Uuid;

use network_study_server::api;
use network_study_server::config::{Config, RemotesConfig, ServerConfig};
use network_study_server::orchestrator::{self, AppState};

fn test_config() -> Config {
    Config {
        server: ServerConfig {
            host: "127.0.0.1".into(),
            port: 0,
            request_timeout_secs: 5,
            enable_cors: false,
        },
        remotes: RemotesConfig {
            provider: "local".into(),
            modification_url: "http://localhost:9001".into(),
            analysis_url: "http://localhost:9002".into(),
            report_url: "http://localhost:9003".into(),
            http_timeout_seconds: 1,
        },
    }
}

async fn test_app() -> Router {
    let cfg = test_config();
    let (state, completion_rx) = AppState::new(cfg.clone()).await.unwrap();
    orchestrator::spawn_completion_consumer(state.clone(), completion_rx);
    api::router(state, &cfg)
}

async fn send(app: &Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let body = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, body)
}

fn post_json(uri: &str, body: Value) -> Request<Body> {
    Request::post(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn get(uri: &str) -> Request<Body> {
    Request::get(uri).body(Body::empty()).unwrap()
}

async fn create_study(app: &Router) -> (Uuid, Uuid, Uuid) {
    let (status, study) = send(
        app,
        post_json(
            "/api/v1/studies",
            json!({"name": "case", "networkId": Uuid::new_v4()}),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let study_id: Uuid = study["id"].as_str().unwrap().parse().unwrap();
    let root_id: Uuid = study["rootNodeId"].as_str().unwrap().parse().unwrap();

    let (status, networks) = send(app, get(&format!("/api/v1/studies/{study_id}/root-networks"))).await;
    assert_eq!(status, StatusCode::OK);
    let rn_id: Uuid = networks[0]["id"].as_str().unwrap().parse().unwrap();
    (study_id, root_id, rn_id)
}

async fn create_node(app: &Router, study_id: Uuid, reference: Uuid, name: &str) -> Uuid {
    let (status, node) = send(
        app,
        post_json(
            &format!("/api/v1/studies/{study_id}/tree/nodes/{reference}?mode=CHILD"),
            json!({"name": name}),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    node["id"].as_str().unwrap().parse().unwrap()
}

#[tokio::test]
async fn healthz_responds() {
    let app = test_app().await;
    let (status, _) = send(&app, get("/api/v1/healthz")).await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn study_lifecycle_and_tree_shape() {
    let app = test_app().await;
    let (study_id, root_id, _) = create_study(&app).await;

    let n1 = create_node(&app, study_id, root_id, "n1").await;
    let n2 = create_node(&app, study_id, n1, "n2").await;

    let (status, tree) = send(&app, get(&format!("/api/v1/studies/{study_id}/tree"))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(tree["id"].as_str().unwrap(), root_id.to_string());
    assert_eq!(tree["children"][0]["id"].as_str().unwrap(), n1.to_string());
    assert_eq!(
        tree["children"][0]["children"][0]["id"].as_str().unwrap(),
        n2.to_string()
    );

    let (status, _) = send(
        &app,
        Request::delete(format!("/api/v1/studies/{study_id}"))
            .body(Body::empty())
            .unwrap(),
    )
    .await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (status, body) = send(&app, get(&format!("/api/v1/studies/{study_id}/tree"))).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], json!("NotFound"));
}

#[tokio::test]
async fn root_node_rejects_modifications_with_403() {
    let app = test_app().await;
    let (study_id, root_id, _) = create_study(&app).await;

    let (status, body) = send(
        &app,
        post_json(
            &format!("/api/v1/studies/{study_id}/nodes/{root_id}/modifications"),
            json!({"type": "switch"}),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["error"], json!("Forbidden"));
}

#[tokio::test]
async fn build_run_and_stale_result_flow() {
    let app = test_app().await;
    let (study_id, root_id, rn_id) = create_study(&app).await;
    let node = create_node(&app, study_id, root_id, "n1").await;

    let base = format!("/api/v1/studies/{study_id}/root-networks/{rn_id}/nodes/{node}");

    let (status, _) = send(&app, post_json(&format!("{base}/build"), json!({}))).await;
    assert_eq!(status, StatusCode::OK);
    let (status, info) = send(&app, get(&format!("{base}/build-info"))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(info["buildStatus"], json!("BUILT"));

    let (status, run) = send(&app, post_json(&format!("{base}/computations/load-flow/run"), json!({}))).await;
    assert_eq!(status, StatusCode::OK);
    let result_id: Uuid = run["resultId"].as_str().unwrap().parse().unwrap();

    // still in flight: status RUNNING, result 204
    let (status, body) = send(&app, get(&format!("{base}/computations/load-flow/status"))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!("RUNNING"));
    let (status, _) = send(&app, get(&format!("{base}/computations/load-flow/result"))).await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    // a second run on the same cell is refused while the first is in flight
    let (status, body) = send(&app, post_json(&format!("{base}/computations/load-flow/run"), json!({}))).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"], json!("ComputationRunning"));

    // completion callback settles the handle through the consumer task
    let (status, _) = send(
        &app,
        post_json(
            "/api/v1/computations/results",
            json!({
                "studyId": study_id,
                "nodeId": node,
                "rootNetworkId": rn_id,
                "kind": "load-flow",
                "resultId": result_id,
                "status": "SUCCEEDED",
            }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::ACCEPTED);

    let mut settled = json!(null);
    for _ in 0..50 {
        let (status, body) = send(&app, get(&format!("{base}/computations/load-flow/status"))).await;
        assert_eq!(status, StatusCode::OK);
        if body == json!("SUCCEEDED") {
            settled = body;
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    assert_eq!(settled, json!("SUCCEEDED"));

    let (status, result) = send(&app, get(&format!("{base}/computations/load-flow/result"))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(result["resultId"], json!(result_id));

    // a content edit invalidates the node and discards the result
    let (status, _) = send(
        &app,
        post_json(
            &format!("/api/v1/studies/{study_id}/nodes/{node}/modifications"),
            json!({"type": "switch"}),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let (status, info) = send(&app, get(&format!("{base}/build-info"))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(info["buildStatus"], json!("NOT_BUILT"));
    let (status, _) = send(&app, get(&format!("{base}/computations/load-flow/status"))).await;
    assert_eq!(status, StatusCode::NO_CONTENT);
}

#[tokio::test]
async fn run_on_unbuilt_node_is_forbidden() {
    let app = test_app().await;
    let (study_id, root_id, rn_id) = create_study(&app).await;
    let node = create_node(&app, study_id, root_id, "n1").await;

    let (status, body) = send(
        &app,
        post_json(
            &format!(
                "/api/v1/studies/{study_id}/root-networks/{rn_id}/nodes/{node}/computations/security-analysis/run"
            ),
            json!({}),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["error"], json!("Forbidden"));
}

#[tokio::test]
async fn unknown_study_yields_404_with_error_body() {
    let app = test_app().await;
    let missing = Uuid::new_v4();
    let (status, body) = send(&app, get(&format!("/api/v1/studies/{missing}"))).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], json!("NotFound"));
    assert!(body["message"].as_str().is_some());
}

#[tokio::test]
async fn move_node_across_branches() {
    let app = test_app().await;
    let (study_id, root_id, _) = create_study(&app).await;
    let n1 = create_node(&app, study_id, root_id, "n1").await;
    let n2 = create_node(&app, study_id, root_id, "n2").await;

    let (status, _) = send(
        &app,
        post_json(
            &format!(
                "/api/v1/studies/{study_id}/tree/nodes/{n1}/move?referenceNode={n2}&insertMode=CHILD"
            ),
            json!({}),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (_, tree) = send(&app, get(&format!("/api/v1/studies/{study_id}/tree"))).await;
    assert_eq!(tree["children"][0]["id"].as_str().unwrap(), n2.to_string());
    assert_eq!(
        tree["children"][0]["children"][0]["id"].as_str().unwrap(),
        n1.to_string()
    );

    // moving under the root's BEFORE slot is refused
    let (status, _) = send(
        &app,
        post_json(
            &format!(
                "/api/v1/studies/{study_id}/tree/nodes/{n1}/move?referenceNode={root_id}&insertMode=BEFORE"
            ),
            json!({}),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn delete_last_root_network_is_refused() {
    let app = test_app().await;
    let (study_id, _, rn_id) = create_study(&app).await;

    let (status, body) = send(
        &app,
        Request::delete(format!("/api/v1/studies/{study_id}/root-networks/{rn_id}"))
            .body(Body::empty())
            .unwrap(),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["error"], json!("Forbidden"));
}
