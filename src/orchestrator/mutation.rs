//! Structural Mutation Engine: tree-shape operations, each one wrapped in a
//! subtree lock and preceded by the invalidation cascade it requires.

use tracing::{info, warn};
use uuid::Uuid;

use super::StudyOrchestrator;
use crate::clients::StudyEvent;
use crate::domain::{InsertMode, NodeInfo, NodeType, StudyError};

impl StudyOrchestrator {
    /// Create an empty node relative to `reference`. An empty modification
    /// group contributes nothing to any chain, so no invalidation is needed
    /// even for interposing inserts.
    pub async fn create_node(
        &self,
        study_id: Uuid,
        reference: Uuid,
        mode: InsertMode,
        name: String,
        node_type: NodeType,
    ) -> Result<NodeInfo, StudyError> {
        self.studies.study(study_id).await?;
        self.tree.node(study_id, reference).await?;
        let _guard = self
            .locks
            .acquire(self.tree.subtree_ids(study_id, reference).await?)?;

        let node = NodeInfo::new(study_id, None, name, node_type);
        if let Err(error) = self.reports.create_report(node.report_id).await {
            warn!(%error, node = %node.id, "report creation failed");
        }
        let node = self
            .tree
            .insert_node(study_id, node, reference, mode)
            .await?;
        let root_networks = self.studies.root_network_ids(study_id).await?;
        self.matrix.add_node(node.id, &root_networks).await;
        self.notifications
            .publish(StudyEvent::TreeChanged { study_id });
        Ok(node)
    }

    /// Append a modification to a node's group, then invalidate the node and
    /// all its descendants under every root network.
    pub async fn create_modification(
        &self,
        study_id: Uuid,
        node_id: Uuid,
        payload: serde_json::Value,
    ) -> Result<(), StudyError> {
        self.studies.study(study_id).await?;
        let node = self.tree.node(study_id, node_id).await?;
        if node.is_read_only() {
            return Err(StudyError::forbidden("node does not accept modifications"));
        }
        let subtree = self.tree.subtree_ids(study_id, node_id).await?;
        let _guard = self.locks.acquire(subtree.clone())?;

        self.modifications
            .create_modification(node.modification_group_id, &payload)
            .await
            .map_err(|e| StudyError::Upstream(e.to_string()))?;
        self.invalidate_nodes(study_id, &subtree).await?;
        Ok(())
    }

    /// Move a single node; its children stay behind. The origin and
    /// destination branches are invalidated when (and only when) the moved
    /// node actually carries modifications.
    pub async fn move_node(
        &self,
        study_id: Uuid,
        source_study_id: Option<Uuid>,
        node_id: Uuid,
        reference: Uuid,
        mode: InsertMode,
    ) -> Result<(), StudyError> {
        if source_study_id.is_some_and(|source| source != study_id) {
            return Err(StudyError::forbidden("cannot move a node across studies"));
        }
        self.studies.study(study_id).await?;
        let node = self.tree.node(study_id, node_id).await?;
        let reference_node = self.tree.node(study_id, reference).await?;
        self.check_move(&node, &reference_node, study_id, mode).await?;

        let origin_subtree = self.tree.subtree_ids(study_id, node_id).await?;
        let destination_subtree = self.tree.subtree_ids(study_id, reference).await?;
        let mut lock_ids = origin_subtree.clone();
        lock_ids.extend(
            destination_subtree
                .iter()
                .filter(|id| !origin_subtree.contains(id)),
        );
        let _guard = self.locks.acquire(lock_ids)?;

        let has_modifications = self.has_modifications(&node).await;
        let affected = if has_modifications {
            // origin branch: former descendants lose the node's content;
            // destination branch: everything below the insertion point gains it
            let mut affected: Vec<Uuid> = origin_subtree;
            match mode {
                InsertMode::Before => affected.extend(destination_subtree),
                InsertMode::After => affected
                    .extend(destination_subtree.iter().filter(|id| **id != reference)),
                InsertMode::Child => {}
            }
            affected.sort_unstable();
            affected.dedup();
            affected
        } else {
            // no modification content moved, only the node's own chain changed
            vec![node_id]
        };
        self.invalidate_nodes(study_id, &affected).await?;

        self.tree.move_node(study_id, node_id, reference, mode).await?;
        info!(node = %node_id, %study_id, "node moved");
        Ok(())
    }

    /// Move a node with its whole subtree under `reference`. The moved
    /// subtree's ancestry changes, so all of it is invalidated.
    pub async fn move_subtree(
        &self,
        study_id: Uuid,
        source_study_id: Option<Uuid>,
        node_id: Uuid,
        reference: Uuid,
    ) -> Result<(), StudyError> {
        if source_study_id.is_some_and(|source| source != study_id) {
            return Err(StudyError::forbidden(
                "cannot move a subtree across studies",
            ));
        }
        self.studies.study(study_id).await?;
        let node = self.tree.node(study_id, node_id).await?;
        let reference_node = self.tree.node(study_id, reference).await?;
        self.check_move(&node, &reference_node, study_id, InsertMode::Child)
            .await?;

        let moved_subtree = self.tree.subtree_ids(study_id, node_id).await?;
        let mut lock_ids = moved_subtree.clone();
        lock_ids.extend(
            self.tree
                .subtree_ids(study_id, reference)
                .await?
                .into_iter()
                .filter(|id| !moved_subtree.contains(id)),
        );
        let _guard = self.locks.acquire(lock_ids)?;

        self.invalidate_nodes(study_id, &moved_subtree).await?;
        self.tree.move_subtree(study_id, node_id, reference).await?;
        info!(node = %node_id, %study_id, "subtree moved");
        Ok(())
    }

    /// Copy a node (possibly from another study) next to `reference`,
    /// duplicating its modification group and report.
    pub async fn duplicate_node(
        &self,
        study_id: Uuid,
        source_study_id: Option<Uuid>,
        source_node_id: Uuid,
        reference: Uuid,
        mode: InsertMode,
    ) -> Result<NodeInfo, StudyError> {
        let source_study_id = source_study_id.unwrap_or(study_id);
        self.studies.study(study_id).await?;
        if source_study_id != study_id {
            self.studies.study(source_study_id).await?;
        }
        let source = self.tree.node(source_study_id, source_node_id).await?;
        if source.is_root() {
            return Err(StudyError::forbidden("cannot duplicate the root node"));
        }
        self.tree.node(study_id, reference).await?;
        let destination_subtree = self.tree.subtree_ids(study_id, reference).await?;
        let _guard = self.locks.acquire(destination_subtree.clone())?;

        let new_group = self
            .modifications
            .duplicate_group(source.modification_group_id)
            .await
            .map_err(|e| StudyError::Upstream(e.to_string()))?;
        let new_report = match self.reports.duplicate_report(source.report_id).await {
            Ok(id) => id,
            Err(error) => {
                warn!(%error, "report duplication failed");
                Uuid::new_v4()
            }
        };

        if self.has_modifications(&source).await {
            let affected: Vec<Uuid> = match mode {
                InsertMode::Before => destination_subtree,
                InsertMode::After => destination_subtree
                    .into_iter()
                    .filter(|id| *id != reference)
                    .collect(),
                InsertMode::Child => Vec::new(),
            };
            self.invalidate_nodes(study_id, &affected).await?;
        }

        let mut node = NodeInfo::new(study_id, None, source.name.clone(), source.node_type);
        node.modification_group_id = new_group;
        node.report_id = new_report;
        let node = self
            .tree
            .insert_node(study_id, node, reference, mode)
            .await?;
        let root_networks = self.studies.root_network_ids(study_id).await?;
        self.matrix.add_node(node.id, &root_networks).await;
        self.notifications
            .publish(StudyEvent::TreeChanged { study_id });
        Ok(node)
    }

    /// Copy a whole subtree (possibly from another study) as a new child of
    /// `reference`. Appended as a leaf subtree, so nothing below it exists to
    /// invalidate.
    pub async fn duplicate_subtree(
        &self,
        study_id: Uuid,
        source_study_id: Option<Uuid>,
        source_node_id: Uuid,
        reference: Uuid,
    ) -> Result<NodeInfo, StudyError> {
        let source_study_id = source_study_id.unwrap_or(study_id);
        self.studies.study(study_id).await?;
        if source_study_id != study_id {
            self.studies.study(source_study_id).await?;
        }
        let source = self.tree.node(source_study_id, source_node_id).await?;
        if source.is_root() {
            return Err(StudyError::forbidden("cannot duplicate the root node"));
        }
        self.tree.node(study_id, reference).await?;
        let _guard = self
            .locks
            .acquire(self.tree.subtree_ids(study_id, reference).await?)?;

        let root_networks = self.studies.root_network_ids(study_id).await?;
        let copied_root = self
            .copy_subtree_into(study_id, source_study_id, source_node_id, reference, &root_networks)
            .await?;
        self.notifications
            .publish(StudyEvent::TreeChanged { study_id });
        Ok(copied_root)
    }

    /// Delete nodes, each with or without its descendants. Children of a
    /// node deleted alone are spliced into its parent and lose its
    /// modifications from their chain.
    pub async fn delete_nodes(
        &self,
        study_id: Uuid,
        node_ids: &[Uuid],
        delete_children: bool,
    ) -> Result<Vec<Uuid>, StudyError> {
        self.studies.study(study_id).await?;
        let mut lock_ids = Vec::new();
        for id in node_ids {
            let node = self.tree.node(study_id, *id).await?;
            if node.is_root() {
                return Err(StudyError::forbidden("cannot delete the root node"));
            }
            for sub in self.tree.subtree_ids(study_id, *id).await? {
                if !lock_ids.contains(&sub) {
                    lock_ids.push(sub);
                }
            }
        }
        let _guard = self.locks.acquire(lock_ids)?;

        let mut all_removed = Vec::new();
        for id in node_ids {
            // an earlier id may have taken this one down with its subtree
            let node = match self.tree.node(study_id, *id).await {
                Ok(node) => node,
                Err(_) => continue,
            };
            let spliced_descendants = if delete_children {
                Vec::new()
            } else {
                self.tree.descendant_ids(study_id, *id).await?
            };
            let has_modifications = self.has_modifications(&node).await;

            let removed = self.tree.delete_node(study_id, *id, delete_children).await?;
            let removed_ids: Vec<Uuid> = removed.iter().map(|n| n.id).collect();
            let cells = self.matrix.remove_nodes(&removed_ids).await;
            self.discard_cells(cells).await;
            for removed_node in &removed {
                if let Err(error) = self
                    .modifications
                    .delete_group(removed_node.modification_group_id)
                    .await
                {
                    warn!(%error, node = %removed_node.id, "modification group deletion failed");
                }
                if let Err(error) = self.reports.delete_report(removed_node.report_id).await {
                    warn!(%error, node = %removed_node.id, "report deletion failed");
                }
            }
            if !delete_children && has_modifications {
                self.invalidate_nodes(study_id, &spliced_descendants).await?;
            }
            all_removed.extend(removed_ids);
        }
        self.notifications.publish(StudyEvent::NodesDeleted {
            study_id,
            node_ids: all_removed.clone(),
        });
        Ok(all_removed)
    }

    /// Move a node (alone or with descendants) into the stash. Its cells
    /// stay but are invalidated; spliced-up children lose its content.
    pub async fn stash_node(
        &self,
        study_id: Uuid,
        node_id: Uuid,
        stash_children: bool,
    ) -> Result<(), StudyError> {
        self.studies.study(study_id).await?;
        let node = self.tree.node(study_id, node_id).await?;
        if node.is_root() {
            return Err(StudyError::forbidden("cannot stash the root node"));
        }
        let subtree = self.tree.subtree_ids(study_id, node_id).await?;
        let _guard = self.locks.acquire(subtree.clone())?;

        let affected = if stash_children {
            subtree
        } else if self.has_modifications(&node).await {
            subtree
        } else {
            vec![node_id]
        };
        self.invalidate_nodes(study_id, &affected).await?;
        self.tree.stash_node(study_id, node_id, stash_children).await?;
        Ok(())
    }

    /// Re-attach stashed subtrees under `anchor`. Everything restored is
    /// already NOT_BUILT, so no cascade is needed.
    pub async fn restore_nodes(
        &self,
        study_id: Uuid,
        node_ids: &[Uuid],
        anchor: Uuid,
    ) -> Result<(), StudyError> {
        self.studies.study(study_id).await?;
        self.tree.node(study_id, anchor).await?;
        let _guard = self
            .locks
            .acquire(self.tree.subtree_ids(study_id, anchor).await?)?;
        for id in node_ids {
            self.tree.restore_node(study_id, *id, anchor).await?;
        }
        self.notifications
            .publish(StudyEvent::TreeChanged { study_id });
        Ok(())
    }

    pub async fn rename_node(
        &self,
        study_id: Uuid,
        node_id: Uuid,
        name: String,
    ) -> Result<(), StudyError> {
        self.studies.study(study_id).await?;
        let node = self.tree.node(study_id, node_id).await?;
        if node.is_root() {
            return Err(StudyError::forbidden("cannot rename the root node"));
        }
        self.tree.rename_node(study_id, node_id, name).await?;
        self.notifications
            .publish(StudyEvent::TreeChanged { study_id });
        Ok(())
    }

    /// Shared move validation, run before any cascade or write so a doomed
    /// move leaves everything untouched.
    async fn check_move(
        &self,
        node: &NodeInfo,
        reference: &NodeInfo,
        study_id: Uuid,
        mode: InsertMode,
    ) -> Result<(), StudyError> {
        if node.is_root() {
            return Err(StudyError::forbidden("cannot move the root node"));
        }
        if node.stashed || reference.stashed {
            return Err(StudyError::forbidden("cannot move to or from the stash"));
        }
        if reference.is_root() && mode == InsertMode::Before {
            return Err(StudyError::forbidden(
                "cannot place a node above the root node",
            ));
        }
        if reference.id == node.id
            || self
                .tree
                .subtree_ids(study_id, node.id)
                .await?
                .contains(&reference.id)
        {
            return Err(StudyError::forbidden(
                "cannot move a node into its own subtree",
            ));
        }
        Ok(())
    }

    /// Whether a node's group holds any modification. A count failure is
    /// treated as non-empty so the cascade over-invalidates rather than
    /// leaving stale results behind.
    pub(crate) async fn has_modifications(&self, node: &NodeInfo) -> bool {
        match self
            .modifications
            .modification_count(node.modification_group_id)
            .await
        {
            Ok(count) => count > 0,
            Err(error) => {
                warn!(%error, node = %node.id, "modification count failed, assuming non-empty");
                true
            }
        }
    }

    fn copy_subtree_into<'a>(
        &'a self,
        study_id: Uuid,
        source_study_id: Uuid,
        source_node_id: Uuid,
        reference: Uuid,
        root_networks: &'a [Uuid],
    ) -> std::pin::Pin<
        Box<dyn std::future::Future<Output = Result<NodeInfo, StudyError>> + Send + 'a>,
    > {
        Box::pin(async move {
            let source = self.tree.node(source_study_id, source_node_id).await?;
            let new_group = self
                .modifications
                .duplicate_group(source.modification_group_id)
                .await
                .map_err(|e| StudyError::Upstream(e.to_string()))?;
            let new_report = match self.reports.duplicate_report(source.report_id).await {
                Ok(id) => id,
                Err(error) => {
                    warn!(%error, "report duplication failed");
                    Uuid::new_v4()
                }
            };
            let mut node = NodeInfo::new(study_id, None, source.name.clone(), source.node_type);
            node.modification_group_id = new_group;
            node.report_id = new_report;
            let node = self
                .tree
                .insert_node(study_id, node, reference, InsertMode::Child)
                .await?;
            self.matrix.add_node(node.id, root_networks).await;

            for child in self.tree.child_ids(source_study_id, source_node_id).await? {
                self.copy_subtree_into(study_id, source_study_id, child, node.id, root_networks)
                    .await?;
            }
            Ok(node)
        })
    }
}
