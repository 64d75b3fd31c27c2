//! Invalidation Cascade: resets matrix cells after a structural or content
//! change and discards the remote results they pointed at. Remote deletions
//! are best-effort; a failure is logged and never aborts the cascade.

use strum::IntoEnumIterator;
use tracing::warn;
use uuid::Uuid;

use super::StudyOrchestrator;
use crate::clients::StudyEvent;
use crate::domain::{ComputationKind, NodeRootNetworkInfo, StudyError};

impl StudyOrchestrator {
    /// Invalidate the given nodes under every root network of the study.
    pub(crate) async fn invalidate_nodes(
        &self,
        study_id: Uuid,
        node_ids: &[Uuid],
    ) -> Result<(), StudyError> {
        let root_networks = self.studies.root_network_ids(study_id).await?;
        self.invalidate_cells(study_id, node_ids, &root_networks)
            .await
    }

    /// Invalidate the (node, root network) product. Idempotent: resetting an
    /// already NOT_BUILT cell drains nothing and changes nothing.
    pub(crate) async fn invalidate_cells(
        &self,
        study_id: Uuid,
        node_ids: &[Uuid],
        root_network_ids: &[Uuid],
    ) -> Result<(), StudyError> {
        for node_id in node_ids {
            for root_network_id in root_network_ids {
                let drained = match self.matrix.reset_cell(*node_id, *root_network_id).await {
                    Ok(drained) => drained,
                    // the cell may be gone already (concurrent node removal)
                    Err(StudyError::NotFound(_)) => continue,
                    Err(other) => return Err(other),
                };
                for (kind, handle) in drained {
                    if let Err(error) =
                        self.analysis.delete_result(kind, handle.result_id).await
                    {
                        warn!(%error, %kind, result = %handle.result_id,
                            "stale result deletion failed");
                    }
                }
                for kind in ComputationKind::iter() {
                    self.notifications
                        .publish(StudyEvent::ComputationStatusChanged {
                            study_id,
                            node_id: *node_id,
                            root_network_id: *root_network_id,
                            kind,
                            status: None,
                        });
                }
                self.notifications.publish(StudyEvent::BuildStatusChanged {
                    study_id,
                    node_id: *node_id,
                    root_network_id: *root_network_id,
                });
            }
        }
        self.notifications
            .publish(StudyEvent::TreeChanged { study_id });
        Ok(())
    }

    /// Request deletion of every remote result still referenced by cells
    /// that have just been dropped from the matrix.
    pub(crate) async fn discard_cells(&self, cells: Vec<NodeRootNetworkInfo>) {
        for cell in cells {
            for (kind, handle) in cell.results {
                if let Err(error) = self.analysis.delete_result(kind, handle.result_id).await {
                    warn!(%error, %kind, result = %handle.result_id,
                        "orphaned result deletion failed");
                }
            }
        }
    }
}
