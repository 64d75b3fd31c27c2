use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use uuid::Uuid;

use crate::domain::ComputationKind;

/// Request dispatched to an analysis service.
///
/// The result id is allocated by this server before dispatch so the RUNNING
/// placeholder and the eventual completion event share one key.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunRequest {
    pub result_id: Uuid,
    pub network_id: Uuid,
    pub variant_id: Option<String>,
    pub report_id: Uuid,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parameters: Option<serde_json::Value>,
}

/// One analysis collaborator per computation kind, all sharing the same
/// lifecycle surface. The kind parameter selects the remote service.
#[async_trait]
pub trait AnalysisService: Send + Sync {
    async fn run(&self, kind: ComputationKind, request: &RunRequest) -> Result<()>;

    /// Best-effort cancellation; completion still arrives as an event.
    async fn stop(&self, kind: ComputationKind, result_id: Uuid) -> Result<()>;

    async fn result(&self, kind: ComputationKind, result_id: Uuid) -> Result<serde_json::Value>;

    async fn delete_result(&self, kind: ComputationKind, result_id: Uuid) -> Result<()>;
}

#[derive(Clone)]
pub struct HttpAnalysisService {
    base_url: String,
    client: reqwest::Client,
}

impl HttpAnalysisService {
    pub fn new(base_url: String, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            client,
        })
    }

    fn url(&self, kind: ComputationKind, path: &str) -> String {
        format!("{}/api/v1/{kind}{path}", self.base_url)
    }
}

#[async_trait]
impl AnalysisService for HttpAnalysisService {
    async fn run(&self, kind: ComputationKind, request: &RunRequest) -> Result<()> {
        self.client
            .post(self.url(kind, "/runs"))
            .json(request)
            .send()
            .await
            .with_context(|| format!("{kind} run request failed"))?
            .error_for_status()
            .with_context(|| format!("{kind} run rejected"))?;
        Ok(())
    }

    async fn stop(&self, kind: ComputationKind, result_id: Uuid) -> Result<()> {
        self.client
            .put(self.url(kind, &format!("/results/{result_id}/stop")))
            .send()
            .await
            .with_context(|| format!("{kind} stop request failed"))?
            .error_for_status()
            .with_context(|| format!("{kind} stop rejected"))?;
        Ok(())
    }

    async fn result(&self, kind: ComputationKind, result_id: Uuid) -> Result<serde_json::Value> {
        let resp = self
            .client
            .get(self.url(kind, &format!("/results/{result_id}")))
            .send()
            .await
            .with_context(|| format!("{kind} result request failed"))?
            .error_for_status()
            .with_context(|| format!("{kind} result rejected"))?;
        resp.json()
            .await
            .with_context(|| format!("{kind} result unreadable"))
    }

    async fn delete_result(&self, kind: ComputationKind, result_id: Uuid) -> Result<()> {
        self.client
            .delete(self.url(kind, &format!("/results/{result_id}")))
            .send()
            .await
            .with_context(|| format!("{kind} result deletion request failed"))?
            .error_for_status()
            .with_context(|| format!("{kind} result deletion rejected"))?;
        Ok(())
    }
}
