use anyhow::{Context, Result};
use async_trait::async_trait;
use std::time::Duration;
use uuid::Uuid;

/// Report collaborator: one audit report per tree node.
#[async_trait]
pub trait ReportService: Send + Sync {
    async fn create_report(&self, report_id: Uuid) -> Result<()>;

    /// Copy a report for a duplicated node, returning the id of the copy.
    async fn duplicate_report(&self, source_report_id: Uuid) -> Result<Uuid>;

    async fn delete_report(&self, report_id: Uuid) -> Result<()>;
}

#[derive(Clone)]
pub struct HttpReportService {
    base_url: String,
    client: reqwest::Client,
}

impl HttpReportService {
    pub fn new(base_url: String, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            client,
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}/api/v1{}", self.base_url, path)
    }
}

#[async_trait]
impl ReportService for HttpReportService {
    async fn create_report(&self, report_id: Uuid) -> Result<()> {
        self.client
            .post(self.url(&format!("/reports/{report_id}")))
            .send()
            .await
            .context("create report request failed")?
            .error_for_status()
            .context("create report rejected")?;
        Ok(())
    }

    async fn duplicate_report(&self, source_report_id: Uuid) -> Result<Uuid> {
        let new_id = Uuid::new_v4();
        self.client
            .post(self.url(&format!("/reports/{source_report_id}/duplicate/{new_id}")))
            .send()
            .await
            .context("duplicate report request failed")?
            .error_for_status()
            .context("duplicate report rejected")?;
        Ok(new_id)
    }

    async fn delete_report(&self, report_id: Uuid) -> Result<()> {
        self.client
            .delete(self.url(&format!("/reports/{report_id}")))
            .send()
            .await
            .context("delete report request failed")?
            .error_for_status()
            .context("delete report rejected")?;
        Ok(())
    }
}
