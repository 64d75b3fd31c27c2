//! Build coordination and the computation lifecycle shared by every
//! computation kind.

use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use uuid::Uuid;

use super::StudyOrchestrator;
use crate::clients::{BuildRequest, RunRequest, StudyEvent};
use crate::domain::{
    ComputationKind, ComputationStatus, NodeInfo, NodeRootNetworkInfo, ResultHandle, StudyError,
};

/// Asynchronous completion message from an analysis service, delivered on
/// the consumer task rather than a request task.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompletionEvent {
    pub study_id: Uuid,
    pub node_id: Uuid,
    pub root_network_id: Uuid,
    pub kind: ComputationKind,
    pub result_id: Uuid,
    pub status: ComputationStatus,
}

impl StudyOrchestrator {
    /// Materialize the node's modification chain into a working variant for
    /// one root network, then mark the cell BUILT.
    pub async fn build_node(
        &self,
        study_id: Uuid,
        root_network_id: Uuid,
        node_id: Uuid,
    ) -> Result<(), StudyError> {
        let root_network = self.studies.root_network(study_id, root_network_id).await?;
        let node = self.tree.node(study_id, node_id).await?;
        if node.is_root() {
            return Err(StudyError::forbidden(
                "the root node represents the raw network and is never built",
            ));
        }
        if node.stashed {
            return Err(StudyError::forbidden("cannot build a stashed node"));
        }
        self.matrix.cell(node_id, root_network_id).await?;

        // chain from the first node under the root down to the target
        let mut chain: Vec<Uuid> = Vec::new();
        for ancestor_id in self.tree.ancestor_ids(study_id, node_id).await? {
            let ancestor = self.tree.node(study_id, ancestor_id).await?;
            if !ancestor.is_root() {
                chain.push(ancestor.modification_group_id);
            }
        }
        chain.reverse();
        chain.push(node.modification_group_id);

        let request = BuildRequest {
            network_id: root_network.network_id,
            modification_group_ids: chain,
            target_variant_id: format!("variant_{node_id}_{root_network_id}"),
        };
        let variant_id = self
            .modifications
            .build_variant(&request)
            .await
            .map_err(|e| StudyError::Upstream(e.to_string()))?;
        self.matrix
            .set_built(node_id, root_network_id, variant_id)
            .await?;
        info!(node = %node_id, root_network = %root_network_id, "node built");
        self.notifications.publish(StudyEvent::BuildStatusChanged {
            study_id,
            node_id,
            root_network_id,
        });
        Ok(())
    }

    /// Invalidate one node's cell under one root network.
    pub async fn unbuild_node(
        &self,
        study_id: Uuid,
        root_network_id: Uuid,
        node_id: Uuid,
    ) -> Result<(), StudyError> {
        self.studies.root_network(study_id, root_network_id).await?;
        self.tree.node(study_id, node_id).await?;
        self.matrix.cell(node_id, root_network_id).await?;
        self.invalidate_cells(study_id, &[node_id], &[root_network_id])
            .await
    }

    pub async fn node_build_info(
        &self,
        study_id: Uuid,
        root_network_id: Uuid,
        node_id: Uuid,
    ) -> Result<NodeRootNetworkInfo, StudyError> {
        self.studies.root_network(study_id, root_network_id).await?;
        self.tree.node(study_id, node_id).await?;
        self.matrix.cell(node_id, root_network_id).await
    }

    /// Dispatch a computation on a (node, root network) cell.
    ///
    /// The RUNNING placeholder is written before the remote dispatch; if the
    /// dispatch fails the placeholder is removed again, but only while it
    /// still carries our result id, so a racing completion cannot be lost.
    pub async fn run_computation(
        &self,
        study_id: Uuid,
        root_network_id: Uuid,
        node_id: Uuid,
        kind: ComputationKind,
        parameters: Option<serde_json::Value>,
    ) -> Result<Uuid, StudyError> {
        let root_network = self.studies.root_network(study_id, root_network_id).await?;
        let node = self.tree.node(study_id, node_id).await?;
        if node.stashed {
            return Err(StudyError::forbidden(
                "cannot run a computation on a read-only node",
            ));
        }
        let cell = self.matrix.cell(node_id, root_network_id).await?;

        if let Some(previous) = cell.results.get(&kind) {
            if previous.is_running() {
                return Err(StudyError::ComputationRunning(format!(
                    "{kind} is already running on node {node_id}"
                )));
            }
            // stale result from an earlier run: discard it first
            if let Err(error) = self.analysis.delete_result(kind, previous.result_id).await {
                warn!(%error, %kind, result = %previous.result_id,
                    "previous result deletion failed");
            }
            self.matrix
                .take_result(node_id, root_network_id, kind)
                .await?;
        }

        if !self.is_runnable(study_id, root_network_id, &node).await? {
            return Err(StudyError::forbidden(format!(
                "node {node_id} is not built under root network {root_network_id}"
            )));
        }

        let result_id = Uuid::new_v4();
        self.matrix
            .put_result(
                node_id,
                root_network_id,
                kind,
                ResultHandle::running(result_id),
            )
            .await?;
        self.notifications
            .publish(StudyEvent::ComputationStatusChanged {
                study_id,
                node_id,
                root_network_id,
                kind,
                status: Some(ComputationStatus::Running),
            });

        let request = RunRequest {
            result_id,
            network_id: root_network.network_id,
            variant_id: self
                .working_variant(study_id, root_network_id, &node)
                .await?,
            report_id: node.report_id,
            parameters,
        };
        if let Err(error) = self.analysis.run(kind, &request).await {
            // roll back the placeholder; it points at a run that never started
            let _ = self
                .matrix
                .take_result_if(node_id, root_network_id, kind, result_id)
                .await;
            self.notifications
                .publish(StudyEvent::ComputationStatusChanged {
                    study_id,
                    node_id,
                    root_network_id,
                    kind,
                    status: None,
                });
            return Err(StudyError::Upstream(error.to_string()));
        }
        Ok(result_id)
    }

    /// Best-effort remote cancellation. The cell stays RUNNING until the
    /// service reports completion through the event channel.
    pub async fn stop_computation(
        &self,
        study_id: Uuid,
        root_network_id: Uuid,
        node_id: Uuid,
        kind: ComputationKind,
    ) -> Result<(), StudyError> {
        self.studies.root_network(study_id, root_network_id).await?;
        self.tree.node(study_id, node_id).await?;
        let handle = self
            .matrix
            .result_handle(node_id, root_network_id, kind)
            .await?
            .ok_or_else(|| StudyError::not_found(format!("no {kind} run on node {node_id}")))?;
        if !handle.is_running() {
            return Ok(());
        }
        if let Err(error) = self.analysis.stop(kind, handle.result_id).await {
            warn!(%error, %kind, result = %handle.result_id, "stop request failed");
        }
        Ok(())
    }

    pub async fn computation_status(
        &self,
        study_id: Uuid,
        root_network_id: Uuid,
        node_id: Uuid,
        kind: ComputationKind,
    ) -> Result<Option<ComputationStatus>, StudyError> {
        self.studies.root_network(study_id, root_network_id).await?;
        self.tree.node(study_id, node_id).await?;
        Ok(self
            .matrix
            .result_handle(node_id, root_network_id, kind)
            .await?
            .map(|handle| handle.status))
    }

    /// Fetch the remote result for a completed computation. `Ok(None)` means
    /// the run is still in flight.
    pub async fn computation_result(
        &self,
        study_id: Uuid,
        root_network_id: Uuid,
        node_id: Uuid,
        kind: ComputationKind,
    ) -> Result<Option<serde_json::Value>, StudyError> {
        self.studies.root_network(study_id, root_network_id).await?;
        self.tree.node(study_id, node_id).await?;
        let handle = self
            .matrix
            .result_handle(node_id, root_network_id, kind)
            .await?
            .ok_or_else(|| StudyError::not_found(format!("no {kind} result on node {node_id}")))?;
        if handle.is_running() {
            return Ok(None);
        }
        let result = self
            .analysis
            .result(kind, handle.result_id)
            .await
            .map_err(|e| StudyError::Upstream(e.to_string()))?;
        Ok(Some(result))
    }

    /// Drop a result handle and request remote deletion.
    pub async fn delete_computation_result(
        &self,
        study_id: Uuid,
        root_network_id: Uuid,
        node_id: Uuid,
        kind: ComputationKind,
    ) -> Result<(), StudyError> {
        self.studies.root_network(study_id, root_network_id).await?;
        self.tree.node(study_id, node_id).await?;
        if let Some(handle) = self
            .matrix
            .take_result(node_id, root_network_id, kind)
            .await?
        {
            if let Err(error) = self.analysis.delete_result(kind, handle.result_id).await {
                warn!(%error, %kind, result = %handle.result_id, "result deletion failed");
            }
            self.notifications
                .publish(StudyEvent::ComputationStatusChanged {
                    study_id,
                    node_id,
                    root_network_id,
                    kind,
                    status: None,
                });
        }
        Ok(())
    }

    /// Apply an inbound completion event. Idempotent and keyed by result id:
    /// an event that no longer matches the cell's handle is stale and is
    /// dropped with a warning.
    pub async fn apply_completion(&self, event: &CompletionEvent) -> Result<(), StudyError> {
        if event.status == ComputationStatus::Running {
            warn!(result = %event.result_id, "ignoring RUNNING completion event");
            return Ok(());
        }
        let applied = self
            .matrix
            .complete_result(
                event.node_id,
                event.root_network_id,
                event.kind,
                event.result_id,
                event.status,
            )
            .await?;
        if applied {
            info!(result = %event.result_id, kind = %event.kind, status = %event.status,
                "computation completed");
            self.notifications
                .publish(StudyEvent::ComputationStatusChanged {
                    study_id: event.study_id,
                    node_id: event.node_id,
                    root_network_id: event.root_network_id,
                    kind: event.kind,
                    status: Some(event.status),
                });
        } else {
            warn!(result = %event.result_id, kind = %event.kind,
                "stale completion event ignored");
        }
        Ok(())
    }

    /// A computation may target a node that is built, is the root, or has a
    /// built ancestor under the root network.
    async fn is_runnable(
        &self,
        study_id: Uuid,
        root_network_id: Uuid,
        node: &NodeInfo,
    ) -> Result<bool, StudyError> {
        if node.is_root() {
            return Ok(true);
        }
        if self.matrix.cell(node.id, root_network_id).await?.is_built() {
            return Ok(true);
        }
        for ancestor_id in self.tree.ancestor_ids(study_id, node.id).await? {
            let ancestor = self.tree.node(study_id, ancestor_id).await?;
            if ancestor.is_root() {
                continue;
            }
            if self
                .matrix
                .cell(ancestor_id, root_network_id)
                .await?
                .is_built()
            {
                return Ok(true);
            }
        }
        Ok(false)
    }

    /// Variant a computation should read: the node's own when built,
    /// otherwise the nearest built ancestor's, otherwise the base variant.
    async fn working_variant(
        &self,
        study_id: Uuid,
        root_network_id: Uuid,
        node: &NodeInfo,
    ) -> Result<Option<String>, StudyError> {
        if node.is_root() {
            return Ok(None);
        }
        let cell = self.matrix.cell(node.id, root_network_id).await?;
        if cell.is_built() {
            return Ok(cell.working_variant_id);
        }
        for ancestor_id in self.tree.ancestor_ids(study_id, node.id).await? {
            if let Ok(cell) = self.matrix.cell(ancestor_id, root_network_id).await {
                if cell.is_built() {
                    return Ok(cell.working_variant_id);
                }
            }
        }
        Ok(None)
    }
}
