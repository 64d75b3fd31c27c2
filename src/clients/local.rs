//! In-process collaborators, selected with `remotes.provider = "local"`.
//!
//! They keep just enough state to exercise the orchestration logic without
//! the remote fleet: modification groups are counters, analyses complete only
//! when a completion event is injected, reports are a set of ids.

use anyhow::{bail, Result};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::{HashMap, HashSet};
use uuid::Uuid;

use super::{AnalysisService, BuildRequest, ModificationService, ReportService, RunRequest};
use crate::domain::ComputationKind;

#[derive(Default)]
pub struct LocalModificationService {
    groups: Mutex<HashMap<Uuid, usize>>,
    /// When set, build_variant fails; lets tests drive the upstream-failure
    /// paths.
    fail_builds: Mutex<bool>,
    /// Same for create_modification.
    fail_modifications: Mutex<bool>,
}

impl LocalModificationService {
    pub fn set_count(&self, group_id: Uuid, count: usize) {
        self.groups.lock().insert(group_id, count);
    }

    pub fn fail_builds(&self, fail: bool) {
        *self.fail_builds.lock() = fail;
    }

    pub fn fail_modifications(&self, fail: bool) {
        *self.fail_modifications.lock() = fail;
    }
}

#[async_trait]
impl ModificationService for LocalModificationService {
    async fn build_variant(&self, request: &BuildRequest) -> Result<String> {
        if *self.fail_builds.lock() {
            bail!("modification application unavailable");
        }
        Ok(request.target_variant_id.clone())
    }

    async fn create_modification(
        &self,
        group_id: Uuid,
        _payload: &serde_json::Value,
    ) -> Result<()> {
        if *self.fail_modifications.lock() {
            bail!("modification service unavailable");
        }
        *self.groups.lock().entry(group_id).or_insert(0) += 1;
        Ok(())
    }

    async fn duplicate_group(&self, source_group_id: Uuid) -> Result<Uuid> {
        let new_id = Uuid::new_v4();
        let mut groups = self.groups.lock();
        let count = groups.get(&source_group_id).copied().unwrap_or(0);
        groups.insert(new_id, count);
        Ok(new_id)
    }

    async fn delete_group(&self, group_id: Uuid) -> Result<()> {
        self.groups.lock().remove(&group_id);
        Ok(())
    }

    async fn modification_count(&self, group_id: Uuid) -> Result<usize> {
        Ok(self.groups.lock().get(&group_id).copied().unwrap_or(0))
    }
}

#[derive(Default)]
pub struct LocalAnalysisService {
    dispatched: Mutex<Vec<(ComputationKind, Uuid)>>,
    stopped: Mutex<Vec<(ComputationKind, Uuid)>>,
    deleted: Mutex<Vec<(ComputationKind, Uuid)>>,
    fail_runs: Mutex<bool>,
    fail_deletes: Mutex<bool>,
}

impl LocalAnalysisService {
    pub fn fail_runs(&self, fail: bool) {
        *self.fail_runs.lock() = fail;
    }

    pub fn fail_deletes(&self, fail: bool) {
        *self.fail_deletes.lock() = fail;
    }

    pub fn dispatched(&self) -> Vec<(ComputationKind, Uuid)> {
        self.dispatched.lock().clone()
    }

    pub fn stopped(&self) -> Vec<(ComputationKind, Uuid)> {
        self.stopped.lock().clone()
    }

    pub fn deleted(&self) -> Vec<(ComputationKind, Uuid)> {
        self.deleted.lock().clone()
    }
}

#[async_trait]
impl AnalysisService for LocalAnalysisService {
    async fn run(&self, kind: ComputationKind, request: &RunRequest) -> Result<()> {
        if *self.fail_runs.lock() {
            bail!("{kind} service unavailable");
        }
        self.dispatched.lock().push((kind, request.result_id));
        Ok(())
    }

    async fn stop(&self, kind: ComputationKind, result_id: Uuid) -> Result<()> {
        self.stopped.lock().push((kind, result_id));
        Ok(())
    }

    async fn result(&self, kind: ComputationKind, result_id: Uuid) -> Result<serde_json::Value> {
        Ok(serde_json::json!({
            "kind": kind.to_string(),
            "resultId": result_id,
        }))
    }

    async fn delete_result(&self, kind: ComputationKind, result_id: Uuid) -> Result<()> {
        if *self.fail_deletes.lock() {
            bail!("{kind} result deletion unavailable");
        }
        self.deleted.lock().push((kind, result_id));
        Ok(())
    }
}

#[derive(Default)]
pub struct LocalReportService {
    reports: Mutex<HashSet<Uuid>>,
}

impl LocalReportService {
    pub fn contains(&self, report_id: Uuid) -> bool {
        self.reports.lock().contains(&report_id)
    }
}

#[async_trait]
impl ReportService for LocalReportService {
    async fn create_report(&self, report_id: Uuid) -> Result<()> {
        self.reports.lock().insert(report_id);
        Ok(())
    }

    async fn duplicate_report(&self, _source_report_id: Uuid) -> Result<Uuid> {
        let new_id = Uuid::new_v4();
        self.reports.lock().insert(new_id);
        Ok(new_id)
    }

    async fn delete_report(&self, report_id: Uuid) -> Result<()> {
        self.reports.lock().remove(&report_id);
        Ok(())
    }
}
