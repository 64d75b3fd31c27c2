use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, USER_AGENT};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use uuid::Uuid;

/// Request to materialize a node's modification chain into a working variant.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BuildRequest {
    pub network_id: Uuid,
    /// Modification group ids from the root (exclusive) down to the target
    /// node (inclusive), in application order.
    pub modification_group_ids: Vec<Uuid>,
    /// Variant the application should write into.
    pub target_variant_id: String,
}

/// Modification-Application collaborator: owns modification group content and
/// applies chains of groups onto network variants.
#[async_trait]
pub trait ModificationService: Send + Sync {
    /// Apply the chain and return the variant id actually written.
    async fn build_variant(&self, request: &BuildRequest) -> Result<String>;

    /// Append one modification to a group.
    async fn create_modification(&self, group_id: Uuid, payload: &serde_json::Value)
        -> Result<()>;

    /// Copy a whole group, returning the id of the copy.
    async fn duplicate_group(&self, source_group_id: Uuid) -> Result<Uuid>;

    async fn delete_group(&self, group_id: Uuid) -> Result<()>;

    /// Number of modifications in a group. Groups unknown to the service
    /// count as empty.
    async fn modification_count(&self, group_id: Uuid) -> Result<usize>;
}

#[derive(Clone)]
pub struct HttpModificationService {
    base_url: String,
    client: reqwest::Client,
}

impl HttpModificationService {
    pub fn new(base_url: String, timeout: Duration) -> Result<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(
            USER_AGENT,
            HeaderValue::from_static("network-study-server/0.2"),
        );
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .default_headers(headers)
            .build()?;
        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            client,
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}/api/v1{}", self.base_url, path)
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct BuildResponse {
    variant_id: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GroupIdResponse {
    group_id: Uuid,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CountResponse {
    count: usize,
}

#[async_trait]
impl ModificationService for HttpModificationService {
    async fn build_variant(&self, request: &BuildRequest) -> Result<String> {
        let resp = self
            .client
            .post(self.url("/networks/build"))
            .json(request)
            .send()
            .await
            .context("build request failed")?
            .error_for_status()
            .context("build rejected")?;
        let body: BuildResponse = resp.json().await.context("build response unreadable")?;
        Ok(body.variant_id)
    }

    async fn create_modification(
        &self,
        group_id: Uuid,
        payload: &serde_json::Value,
    ) -> Result<()> {
        self.client
            .post(self.url(&format!("/groups/{group_id}/modifications")))
            .json(payload)
            .send()
            .await
            .context("create modification request failed")?
            .error_for_status()
            .context("create modification rejected")?;
        Ok(())
    }

    async fn duplicate_group(&self, source_group_id: Uuid) -> Result<Uuid> {
        let resp = self
            .client
            .post(self.url(&format!("/groups/{source_group_id}/duplicate")))
            .send()
            .await
            .context("duplicate group request failed")?
            .error_for_status()
            .context("duplicate group rejected")?;
        let body: GroupIdResponse = resp
            .json()
            .await
            .context("duplicate group response unreadable")?;
        Ok(body.group_id)
    }

    async fn delete_group(&self, group_id: Uuid) -> Result<()> {
        self.client
            .delete(self.url(&format!("/groups/{group_id}")))
            .send()
            .await
            .context("delete group request failed")?
            .error_for_status()
            .context("delete group rejected")?;
        Ok(())
    }

    async fn modification_count(&self, group_id: Uuid) -> Result<usize> {
        let resp = self
            .client
            .get(self.url(&format!("/groups/{group_id}/modifications/count")))
            .send()
            .await
            .context("modification count request failed")?;
        if resp.status() == reqwest::StatusCode::NOT_FOUND {
            return Ok(0);
        }
        let body: CountResponse = resp
            .error_for_status()
            .context("modification count rejected")?
            .json()
            .await
            .context("modification count response unreadable")?;
        Ok(body.count)
    }
}
