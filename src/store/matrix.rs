use std::collections::HashMap;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::domain::{
    BuildStatus, ComputationKind, ComputationStatus, NodeRootNetworkInfo, ResultHandle, StudyError,
};

/// Build-Status Matrix: one cell per (node, root network) pair, created when
/// either side appears and destroyed when either side goes away.
#[derive(Default)]
pub struct MatrixStore {
    cells: RwLock<HashMap<(Uuid, Uuid), NodeRootNetworkInfo>>,
}

impl MatrixStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Cells for a freshly created node, one per existing root network.
    pub async fn add_node(&self, node_id: Uuid, root_network_ids: &[Uuid]) {
        let mut cells = self.cells.write().await;
        for rn in root_network_ids {
            cells
                .entry((node_id, *rn))
                .or_insert_with(|| NodeRootNetworkInfo::new(node_id, *rn));
        }
    }

    /// Cells for a freshly attached root network, one per existing node.
    pub async fn add_root_network(&self, root_network_id: Uuid, node_ids: &[Uuid]) {
        let mut cells = self.cells.write().await;
        for node in node_ids {
            cells
                .entry((*node, root_network_id))
                .or_insert_with(|| NodeRootNetworkInfo::new(*node, root_network_id));
        }
    }

    /// Drop every cell of the given nodes, returning them so lingering remote
    /// results can be cleaned up.
    pub async fn remove_nodes(&self, node_ids: &[Uuid]) -> Vec<NodeRootNetworkInfo> {
        let mut cells = self.cells.write().await;
        let keys: Vec<_> = cells
            .keys()
            .filter(|(node, _)| node_ids.contains(node))
            .copied()
            .collect();
        keys.into_iter()
            .filter_map(|key| cells.remove(&key))
            .collect()
    }

    /// Drop every cell of a root network, returning them for cleanup.
    pub async fn remove_root_network(&self, root_network_id: Uuid) -> Vec<NodeRootNetworkInfo> {
        let mut cells = self.cells.write().await;
        let keys: Vec<_> = cells
            .keys()
            .filter(|(_, rn)| *rn == root_network_id)
            .copied()
            .collect();
        keys.into_iter()
            .filter_map(|key| cells.remove(&key))
            .collect()
    }

    pub async fn cell(
        &self,
        node_id: Uuid,
        root_network_id: Uuid,
    ) -> Result<NodeRootNetworkInfo, StudyError> {
        let cells = self.cells.read().await;
        cells
            .get(&(node_id, root_network_id))
            .cloned()
            .ok_or_else(|| {
                StudyError::not_found(format!(
                    "no build info for node {node_id} under root network {root_network_id}"
                ))
            })
    }

    pub async fn build_status(
        &self,
        node_id: Uuid,
        root_network_id: Uuid,
    ) -> Result<BuildStatus, StudyError> {
        Ok(self.cell(node_id, root_network_id).await?.build_status)
    }

    pub async fn set_built(
        &self,
        node_id: Uuid,
        root_network_id: Uuid,
        variant_id: String,
    ) -> Result<(), StudyError> {
        let mut cells = self.cells.write().await;
        let cell = cell_mut(&mut cells, node_id, root_network_id)?;
        cell.build_status = BuildStatus::Built;
        cell.working_variant_id = Some(variant_id);
        Ok(())
    }

    /// Invalidate one cell and hand back its drained result handles.
    pub async fn reset_cell(
        &self,
        node_id: Uuid,
        root_network_id: Uuid,
    ) -> Result<Vec<(ComputationKind, ResultHandle)>, StudyError> {
        let mut cells = self.cells.write().await;
        Ok(cell_mut(&mut cells, node_id, root_network_id)?.reset())
    }

    pub async fn result_handle(
        &self,
        node_id: Uuid,
        root_network_id: Uuid,
        kind: ComputationKind,
    ) -> Result<Option<ResultHandle>, StudyError> {
        Ok(self
            .cell(node_id, root_network_id)
            .await?
            .results
            .get(&kind)
            .copied())
    }

    /// Store a handle, returning the one it replaced.
    pub async fn put_result(
        &self,
        node_id: Uuid,
        root_network_id: Uuid,
        kind: ComputationKind,
        handle: ResultHandle,
    ) -> Result<Option<ResultHandle>, StudyError> {
        let mut cells = self.cells.write().await;
        Ok(cell_mut(&mut cells, node_id, root_network_id)?
            .results
            .insert(kind, handle))
    }

    /// Remove a handle only if it still carries the given result id. Used by
    /// the dispatch-failure rollback so it cannot clobber a handle some
    /// concurrent completion already replaced.
    pub async fn take_result_if(
        &self,
        node_id: Uuid,
        root_network_id: Uuid,
        kind: ComputationKind,
        result_id: Uuid,
    ) -> Result<Option<ResultHandle>, StudyError> {
        let mut cells = self.cells.write().await;
        let cell = cell_mut(&mut cells, node_id, root_network_id)?;
        if cell.results.get(&kind).map(|h| h.result_id) == Some(result_id) {
            Ok(cell.results.remove(&kind))
        } else {
            Ok(None)
        }
    }

    pub async fn take_result(
        &self,
        node_id: Uuid,
        root_network_id: Uuid,
        kind: ComputationKind,
    ) -> Result<Option<ResultHandle>, StudyError> {
        let mut cells = self.cells.write().await;
        Ok(cell_mut(&mut cells, node_id, root_network_id)?
            .results
            .remove(&kind))
    }

    /// Apply a completion event. Only a RUNNING handle with the matching
    /// result id is updated; anything else means the event is stale and is
    /// ignored by the caller.
    pub async fn complete_result(
        &self,
        node_id: Uuid,
        root_network_id: Uuid,
        kind: ComputationKind,
        result_id: Uuid,
        status: ComputationStatus,
    ) -> Result<bool, StudyError> {
        let mut cells = self.cells.write().await;
        let cell = cell_mut(&mut cells, node_id, root_network_id)?;
        match cell.results.get_mut(&kind) {
            Some(handle) if handle.result_id == result_id && handle.is_running() => {
                handle.status = status;
                Ok(true)
            }
            _ => Ok(false),
        }
    }
}

fn cell_mut<'a>(
    cells: &'a mut HashMap<(Uuid, Uuid), NodeRootNetworkInfo>,
    node_id: Uuid,
    root_network_id: Uuid,
) -> Result<&'a mut NodeRootNetworkInfo, StudyError> {
    cells.get_mut(&(node_id, root_network_id)).ok_or_else(|| {
        StudyError::not_found(format!(
            "no build info for node {node_id} under root network {root_network_id}"
        ))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn one_cell_per_pair_created_and_removed_with_either_side() {
        let store = MatrixStore::new();
        let (n1, n2) = (Uuid::new_v4(), Uuid::new_v4());
        let (rn1, rn2) = (Uuid::new_v4(), Uuid::new_v4());

        store.add_node(n1, &[rn1]).await;
        store.add_root_network(rn2, &[n1]).await;
        store.add_node(n2, &[rn1, rn2]).await;

        // re-adding must not duplicate or reset
        store.set_built(n1, rn1, "v".into()).await.unwrap();
        store.add_node(n1, &[rn1, rn2]).await;
        assert!(store.cell(n1, rn1).await.unwrap().is_built());

        let dropped = store.remove_root_network(rn2).await;
        assert_eq!(dropped.len(), 2);
        assert!(store.cell(n1, rn2).await.is_err());

        let dropped = store.remove_nodes(&[n1]).await;
        assert_eq!(dropped.len(), 1);
        assert!(store.cell(n1, rn1).await.is_err());
        assert!(store.cell(n2, rn1).await.is_ok());
    }

    #[tokio::test]
    async fn completion_is_keyed_by_result_id() {
        let store = MatrixStore::new();
        let (node, rn) = (Uuid::new_v4(), Uuid::new_v4());
        store.add_node(node, &[rn]).await;

        let result_id = Uuid::new_v4();
        store
            .put_result(node, rn, ComputationKind::LoadFlow, ResultHandle::running(result_id))
            .await
            .unwrap();

        // stale event for another run id is refused
        let applied = store
            .complete_result(
                node,
                rn,
                ComputationKind::LoadFlow,
                Uuid::new_v4(),
                ComputationStatus::Succeeded,
            )
            .await
            .unwrap();
        assert!(!applied);

        let applied = store
            .complete_result(
                node,
                rn,
                ComputationKind::LoadFlow,
                result_id,
                ComputationStatus::Succeeded,
            )
            .await
            .unwrap();
        assert!(applied);

        // a second completion for the same id is idempotent
        let applied = store
            .complete_result(
                node,
                rn,
                ComputationKind::LoadFlow,
                result_id,
                ComputationStatus::Failed,
            )
            .await
            .unwrap();
        assert!(!applied);
    }

    #[tokio::test]
    async fn rollback_only_removes_its_own_placeholder() {
        let store = MatrixStore::new();
        let (node, rn) = (Uuid::new_v4(), Uuid::new_v4());
        store.add_node(node, &[rn]).await;

        let kind = ComputationKind::SecurityAnalysis;
        let first = Uuid::new_v4();
        store
            .put_result(node, rn, kind, ResultHandle::running(first))
            .await
            .unwrap();

        // someone else already replaced the handle
        let second = Uuid::new_v4();
        store
            .put_result(node, rn, kind, ResultHandle::running(second))
            .await
            .unwrap();

        assert!(store
            .take_result_if(node, rn, kind, first)
            .await
            .unwrap()
            .is_none());
        assert!(store
            .take_result_if(node, rn, kind, second)
            .await
            .unwrap()
            .is_some());
    }
}
