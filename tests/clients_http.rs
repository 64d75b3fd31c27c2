//! HTTP client tests against mock remote services.

use std::time::Duration;
use uuid::Uuid;
use wiremock::matchers::{body_json_string, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use network_study_server::clients::{
    AnalysisService, BuildRequest, HttpAnalysisService, HttpModificationService, ModificationService,
    RunRequest,
};
use network_study_server::domain::ComputationKind;

const TIMEOUT: Duration = Duration::from_secs(2);

#[tokio::test]
async fn build_variant_posts_the_chain_and_reads_the_variant_back() {
    let server = MockServer::start().await;
    let request = BuildRequest {
        network_id: Uuid::new_v4(),
        modification_group_ids: vec![Uuid::new_v4(), Uuid::new_v4()],
        target_variant_id: "variant_x".to_string(),
    };
    Mock::given(method("POST"))
        .and(path("/api/v1/networks/build"))
        .and(body_json_string(serde_json::to_string(&request).unwrap()))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(serde_json::json!({"variantId": "variant_x"})),
        )
        .expect(1)
        .mount(&server)
        .await;

    let svc = HttpModificationService::new(server.uri(), TIMEOUT).unwrap();
    let variant = svc.build_variant(&request).await.unwrap();
    assert_eq!(variant, "variant_x");
}

#[tokio::test]
async fn build_variant_maps_a_5xx_to_an_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/v1/networks/build"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let svc = HttpModificationService::new(server.uri(), TIMEOUT).unwrap();
    let err = svc
        .build_variant(&BuildRequest {
            network_id: Uuid::new_v4(),
            modification_group_ids: vec![],
            target_variant_id: "v".to_string(),
        })
        .await
        .unwrap_err();
    assert!(err.to_string().contains("build rejected"));
}

#[tokio::test]
async fn modification_count_treats_an_unknown_group_as_empty() {
    let server = MockServer::start().await;
    let known = Uuid::new_v4();
    let unknown = Uuid::new_v4();
    Mock::given(method("GET"))
        .and(path(format!("/api/v1/groups/{known}/modifications/count")))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"count": 3})))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path(format!("/api/v1/groups/{unknown}/modifications/count")))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let svc = HttpModificationService::new(server.uri(), TIMEOUT).unwrap();
    assert_eq!(svc.modification_count(known).await.unwrap(), 3);
    assert_eq!(svc.modification_count(unknown).await.unwrap(), 0);
}

#[tokio::test]
async fn duplicate_group_returns_the_new_group_id() {
    let server = MockServer::start().await;
    let source = Uuid::new_v4();
    let copy = Uuid::new_v4();
    Mock::given(method("POST"))
        .and(path(format!("/api/v1/groups/{source}/duplicate")))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(serde_json::json!({"groupId": copy})),
        )
        .expect(1)
        .mount(&server)
        .await;

    let svc = HttpModificationService::new(server.uri(), TIMEOUT).unwrap();
    assert_eq!(svc.duplicate_group(source).await.unwrap(), copy);
}

#[tokio::test]
async fn run_targets_the_kind_scoped_service() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/v1/security-analysis/runs"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;

    let svc = HttpAnalysisService::new(server.uri(), TIMEOUT).unwrap();
    svc.run(
        ComputationKind::SecurityAnalysis,
        &RunRequest {
            result_id: Uuid::new_v4(),
            network_id: Uuid::new_v4(),
            variant_id: Some("variant_x".to_string()),
            report_id: Uuid::new_v4(),
            parameters: None,
        },
    )
    .await
    .unwrap();
}

#[tokio::test]
async fn result_lifecycle_uses_the_result_id_path() {
    let server = MockServer::start().await;
    let result_id = Uuid::new_v4();
    Mock::given(method("GET"))
        .and(path(format!("/api/v1/load-flow/results/{result_id}")))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(serde_json::json!({"converged": true})),
        )
        .mount(&server)
        .await;
    Mock::given(method("PUT"))
        .and(path(format!("/api/v1/load-flow/results/{result_id}/stop")))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("DELETE"))
        .and(path(format!("/api/v1/load-flow/results/{result_id}")))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&server)
        .await;

    let svc = HttpAnalysisService::new(server.uri(), TIMEOUT).unwrap();
    let body = svc
        .result(ComputationKind::LoadFlow, result_id)
        .await
        .unwrap();
    assert_eq!(body["converged"], serde_json::json!(true));
    svc.stop(ComputationKind::LoadFlow, result_id).await.unwrap();
    svc.delete_result(ComputationKind::LoadFlow, result_id)
        .await
        .unwrap();
}

#[tokio::test]
async fn unreachable_service_surfaces_a_request_error() {
    // nothing listens on this port
    let svc = HttpAnalysisService::new(
        "http://127.0.0.1:1".to_string(),
        Duration::from_millis(200),
    )
    .unwrap();
    let err = svc
        .stop(ComputationKind::LoadFlow, Uuid::new_v4())
        .await
        .unwrap_err();
    assert!(err.to_string().contains("stop request failed"));
}
