use std::collections::HashMap;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::domain::{RootNetwork, Study, StudyError};

#[derive(Debug)]
struct StudyEntry {
    study: Study,
    root_networks: Vec<RootNetwork>,
}

/// Studies and their attached root networks.
#[derive(Default)]
pub struct StudyStore {
    inner: RwLock<HashMap<Uuid, StudyEntry>>,
}

impl StudyStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn insert(&self, study: Study, first_root_network: RootNetwork) {
        let mut studies = self.inner.write().await;
        studies.insert(
            study.id,
            StudyEntry {
                study,
                root_networks: vec![first_root_network],
            },
        );
    }

    pub async fn study(&self, study_id: Uuid) -> Result<Study, StudyError> {
        let studies = self.inner.read().await;
        studies
            .get(&study_id)
            .map(|e| e.study.clone())
            .ok_or_else(|| StudyError::not_found(format!("study {study_id}")))
    }

    pub async fn list(&self) -> Vec<Study> {
        let studies = self.inner.read().await;
        studies.values().map(|e| e.study.clone()).collect()
    }

    pub async fn remove(&self, study_id: Uuid) -> Result<(Study, Vec<RootNetwork>), StudyError> {
        let mut studies = self.inner.write().await;
        studies
            .remove(&study_id)
            .map(|e| (e.study, e.root_networks))
            .ok_or_else(|| StudyError::not_found(format!("study {study_id}")))
    }

    pub async fn root_networks(&self, study_id: Uuid) -> Result<Vec<RootNetwork>, StudyError> {
        let studies = self.inner.read().await;
        studies
            .get(&study_id)
            .map(|e| e.root_networks.clone())
            .ok_or_else(|| StudyError::not_found(format!("study {study_id}")))
    }

    pub async fn root_network_ids(&self, study_id: Uuid) -> Result<Vec<Uuid>, StudyError> {
        Ok(self
            .root_networks(study_id)
            .await?
            .into_iter()
            .map(|rn| rn.id)
            .collect())
    }

    pub async fn root_network(
        &self,
        study_id: Uuid,
        root_network_id: Uuid,
    ) -> Result<RootNetwork, StudyError> {
        self.root_networks(study_id)
            .await?
            .into_iter()
            .find(|rn| rn.id == root_network_id)
            .ok_or_else(|| StudyError::not_found(format!("root network {root_network_id}")))
    }

    pub async fn add_root_network(
        &self,
        study_id: Uuid,
        root_network: RootNetwork,
    ) -> Result<(), StudyError> {
        let mut studies = self.inner.write().await;
        let entry = studies
            .get_mut(&study_id)
            .ok_or_else(|| StudyError::not_found(format!("study {study_id}")))?;
        entry.root_networks.push(root_network);
        Ok(())
    }

    /// Root networks are deleted independently of nodes, but a study always
    /// keeps at least one.
    pub async fn remove_root_network(
        &self,
        study_id: Uuid,
        root_network_id: Uuid,
    ) -> Result<RootNetwork, StudyError> {
        let mut studies = self.inner.write().await;
        let entry = studies
            .get_mut(&study_id)
            .ok_or_else(|| StudyError::not_found(format!("study {study_id}")))?;
        if entry.root_networks.len() == 1 {
            return Err(StudyError::forbidden(
                "cannot remove the last root network of a study",
            ));
        }
        let idx = entry
            .root_networks
            .iter()
            .position(|rn| rn.id == root_network_id)
            .ok_or_else(|| StudyError::not_found(format!("root network {root_network_id}")))?;
        Ok(entry.root_networks.remove(idx))
    }
}
