use chrono::Utc;
use serde::Serialize;
use std::collections::HashMap;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::domain::{InsertMode, NodeInfo, NodeType, StudyError};

/// Nested view of a tree, children in sibling order.
#[derive(Debug, Clone, Serialize)]
pub struct TreeNodeView {
    #[serde(flatten)]
    pub node: NodeInfo,
    pub children: Vec<TreeNodeView>,
}

#[derive(Debug, Default)]
struct StudyTree {
    root_id: Uuid,
    nodes: HashMap<Uuid, NodeInfo>,
    /// Ordered child lists; every attached node has an entry.
    children: HashMap<Uuid, Vec<Uuid>>,
    /// Detached subtree roots living in the stash.
    stash_roots: Vec<Uuid>,
}

impl StudyTree {
    fn node(&self, id: Uuid) -> Result<&NodeInfo, StudyError> {
        self.nodes
            .get(&id)
            .ok_or_else(|| StudyError::not_found(format!("node {id}")))
    }

    fn node_mut(&mut self, id: Uuid) -> Result<&mut NodeInfo, StudyError> {
        self.nodes
            .get_mut(&id)
            .ok_or_else(|| StudyError::not_found(format!("node {id}")))
    }

    /// Node plus all descendants, depth-first, stash included.
    fn subtree_ids(&self, id: Uuid) -> Vec<Uuid> {
        let mut out = Vec::new();
        let mut stack = vec![id];
        while let Some(current) = stack.pop() {
            out.push(current);
            if let Some(kids) = self.children.get(&current) {
                stack.extend(kids.iter().copied());
            }
        }
        out
    }

    fn ancestor_ids(&self, id: Uuid) -> Vec<Uuid> {
        let mut out = Vec::new();
        let mut current = self.nodes.get(&id).and_then(|n| n.parent_id);
        while let Some(ancestor) = current {
            out.push(ancestor);
            current = self.nodes.get(&ancestor).and_then(|n| n.parent_id);
        }
        out
    }

    fn child_index(&self, parent: Uuid, child: Uuid) -> usize {
        self.children
            .get(&parent)
            .and_then(|kids| kids.iter().position(|c| *c == child))
            .unwrap_or(0)
    }

    /// Detach a single node; its children are spliced into its parent's
    /// child list at the node's former position.
    fn detach_single(&mut self, id: Uuid) {
        let parent = match self.nodes.get(&id).and_then(|n| n.parent_id) {
            Some(p) => p,
            None => return,
        };
        let grandchildren = self.children.insert(id, Vec::new()).unwrap_or_default();
        for child in &grandchildren {
            if let Some(node) = self.nodes.get_mut(child) {
                node.parent_id = Some(parent);
            }
        }
        let idx = self.child_index(parent, id);
        if let Some(kids) = self.children.get_mut(&parent) {
            kids.splice(idx..=idx, grandchildren);
        }
        if let Some(node) = self.nodes.get_mut(&id) {
            node.parent_id = None;
        }
    }

    /// Detach a node together with its whole subtree.
    fn detach_subtree(&mut self, id: Uuid) {
        if let Some(parent) = self.nodes.get(&id).and_then(|n| n.parent_id) {
            if let Some(kids) = self.children.get_mut(&parent) {
                kids.retain(|c| *c != id);
            }
        }
        if let Some(node) = self.nodes.get_mut(&id) {
            node.parent_id = None;
        }
    }

    /// Attach a detached node relative to `reference`. Placement must have
    /// been validated; the node keeps its subtree for `Child`, and must be a
    /// leaf for `Before`/`After` interposition.
    fn attach(&mut self, id: Uuid, reference: Uuid, mode: InsertMode) {
        match mode {
            InsertMode::Child => {
                self.children.entry(reference).or_default().push(id);
                if let Some(node) = self.nodes.get_mut(&id) {
                    node.parent_id = Some(reference);
                }
            }
            InsertMode::Before => {
                // reference is never the root here
                let parent = self.nodes[&reference].parent_id.unwrap();
                let idx = self.child_index(parent, reference);
                if let Some(kids) = self.children.get_mut(&parent) {
                    kids[idx] = id;
                }
                self.children.entry(id).or_default().push(reference);
                self.nodes.get_mut(&id).unwrap().parent_id = Some(parent);
                self.nodes.get_mut(&reference).unwrap().parent_id = Some(id);
            }
            InsertMode::After => {
                let former_children = self.children.insert(reference, vec![id]).unwrap_or_default();
                for child in &former_children {
                    if let Some(node) = self.nodes.get_mut(child) {
                        node.parent_id = Some(id);
                    }
                }
                self.children.insert(id, former_children);
                self.nodes.get_mut(&id).unwrap().parent_id = Some(reference);
            }
        }
    }

    fn validate_placement(&self, reference: Uuid, mode: InsertMode) -> Result<(), StudyError> {
        let node = self.node(reference)?;
        if node.stashed {
            return Err(StudyError::forbidden("reference node is stashed"));
        }
        if reference == self.root_id && mode == InsertMode::Before {
            return Err(StudyError::forbidden(
                "cannot place a node above the root node",
            ));
        }
        Ok(())
    }

    fn view(&self, id: Uuid) -> TreeNodeView {
        let children = self
            .children
            .get(&id)
            .map(|kids| kids.iter().map(|c| self.view(*c)).collect())
            .unwrap_or_default();
        TreeNodeView {
            node: self.nodes[&id].clone(),
            children,
        }
    }
}

/// Persisted node graph, one tree per study.
#[derive(Default)]
pub struct TreeStore {
    inner: RwLock<HashMap<Uuid, StudyTree>>,
}

impl TreeStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create the tree for a new study and return its root node.
    pub async fn create_tree(&self, study_id: Uuid) -> NodeInfo {
        let root = NodeInfo::new(study_id, None, "Root".to_string(), NodeType::Root);
        let mut trees = self.inner.write().await;
        let tree = StudyTree {
            root_id: root.id,
            nodes: HashMap::from([(root.id, root.clone())]),
            children: HashMap::from([(root.id, Vec::new())]),
            stash_roots: Vec::new(),
        };
        trees.insert(study_id, tree);
        root
    }

    /// Remove a study's tree entirely, returning every node it held.
    pub async fn drop_tree(&self, study_id: Uuid) -> Result<Vec<NodeInfo>, StudyError> {
        let mut trees = self.inner.write().await;
        let tree = trees
            .remove(&study_id)
            .ok_or_else(|| StudyError::not_found(format!("study {study_id}")))?;
        Ok(tree.nodes.into_values().collect())
    }

    pub async fn node(&self, study_id: Uuid, node_id: Uuid) -> Result<NodeInfo, StudyError> {
        let trees = self.inner.read().await;
        Ok(tree_ref(&trees, study_id)?.node(node_id)?.clone())
    }

    pub async fn root_id(&self, study_id: Uuid) -> Result<Uuid, StudyError> {
        let trees = self.inner.read().await;
        Ok(tree_ref(&trees, study_id)?.root_id)
    }

    pub async fn tree_view(&self, study_id: Uuid) -> Result<TreeNodeView, StudyError> {
        let trees = self.inner.read().await;
        let tree = tree_ref(&trees, study_id)?;
        Ok(tree.view(tree.root_id))
    }

    pub async fn child_ids(&self, study_id: Uuid, node_id: Uuid) -> Result<Vec<Uuid>, StudyError> {
        let trees = self.inner.read().await;
        let tree = tree_ref(&trees, study_id)?;
        tree.node(node_id)?;
        Ok(tree.children.get(&node_id).cloned().unwrap_or_default())
    }

    pub async fn all_node_ids(&self, study_id: Uuid) -> Result<Vec<Uuid>, StudyError> {
        let trees = self.inner.read().await;
        Ok(tree_ref(&trees, study_id)?.nodes.keys().copied().collect())
    }

    /// Node plus descendants.
    pub async fn subtree_ids(&self, study_id: Uuid, node_id: Uuid) -> Result<Vec<Uuid>, StudyError> {
        let trees = self.inner.read().await;
        let tree = tree_ref(&trees, study_id)?;
        tree.node(node_id)?;
        Ok(tree.subtree_ids(node_id))
    }

    /// Descendants only.
    pub async fn descendant_ids(
        &self,
        study_id: Uuid,
        node_id: Uuid,
    ) -> Result<Vec<Uuid>, StudyError> {
        let mut ids = self.subtree_ids(study_id, node_id).await?;
        ids.retain(|id| *id != node_id);
        Ok(ids)
    }

    /// Parent chain from the node (exclusive) up to the root (inclusive).
    pub async fn ancestor_ids(
        &self,
        study_id: Uuid,
        node_id: Uuid,
    ) -> Result<Vec<Uuid>, StudyError> {
        let trees = self.inner.read().await;
        let tree = tree_ref(&trees, study_id)?;
        tree.node(node_id)?;
        Ok(tree.ancestor_ids(node_id))
    }

    /// Insert a freshly created (detached) node relative to `reference`.
    pub async fn insert_node(
        &self,
        study_id: Uuid,
        node: NodeInfo,
        reference: Uuid,
        mode: InsertMode,
    ) -> Result<NodeInfo, StudyError> {
        let mut trees = self.inner.write().await;
        let tree = tree_mut(&mut trees, study_id)?;
        tree.validate_placement(reference, mode)?;
        let id = node.id;
        tree.nodes.insert(id, node);
        tree.children.entry(id).or_default();
        tree.attach(id, reference, mode);
        Ok(tree.nodes[&id].clone())
    }

    /// Move a single node; its children stay behind, spliced into its former
    /// parent.
    pub async fn move_node(
        &self,
        study_id: Uuid,
        node_id: Uuid,
        reference: Uuid,
        mode: InsertMode,
    ) -> Result<(), StudyError> {
        let mut trees = self.inner.write().await;
        let tree = tree_mut(&mut trees, study_id)?;
        let node = tree.node(node_id)?;
        if node.is_root() {
            return Err(StudyError::forbidden("cannot move the root node"));
        }
        if node.stashed {
            return Err(StudyError::forbidden("cannot move a stashed node"));
        }
        tree.validate_placement(reference, mode)?;
        if reference == node_id || tree.subtree_ids(node_id).contains(&reference) {
            return Err(StudyError::forbidden(
                "cannot move a node into its own subtree",
            ));
        }
        tree.detach_single(node_id);
        tree.attach(node_id, reference, mode);
        Ok(())
    }

    /// Move a node together with its subtree, appended as a child of
    /// `reference`.
    pub async fn move_subtree(
        &self,
        study_id: Uuid,
        node_id: Uuid,
        reference: Uuid,
    ) -> Result<(), StudyError> {
        let mut trees = self.inner.write().await;
        let tree = tree_mut(&mut trees, study_id)?;
        let node = tree.node(node_id)?;
        if node.is_root() {
            return Err(StudyError::forbidden("cannot move the root node"));
        }
        if node.stashed {
            return Err(StudyError::forbidden("cannot move a stashed subtree"));
        }
        tree.validate_placement(reference, InsertMode::Child)?;
        if reference == node_id || tree.subtree_ids(node_id).contains(&reference) {
            return Err(StudyError::forbidden(
                "cannot move a subtree into its own subtree",
            ));
        }
        tree.detach_subtree(node_id);
        tree.attach(node_id, reference, InsertMode::Child);
        Ok(())
    }

    /// Delete a node, and its descendants when `delete_children`; otherwise
    /// the children are spliced into the deleted node's parent. Returns the
    /// removed nodes.
    pub async fn delete_node(
        &self,
        study_id: Uuid,
        node_id: Uuid,
        delete_children: bool,
    ) -> Result<Vec<NodeInfo>, StudyError> {
        let mut trees = self.inner.write().await;
        let tree = tree_mut(&mut trees, study_id)?;
        if tree.node(node_id)?.is_root() {
            return Err(StudyError::forbidden("cannot delete the root node"));
        }
        let removed_ids = if delete_children {
            let ids = tree.subtree_ids(node_id);
            tree.detach_subtree(node_id);
            ids
        } else {
            tree.detach_single(node_id);
            vec![node_id]
        };
        tree.stash_roots.retain(|id| *id != node_id);
        let mut removed = Vec::with_capacity(removed_ids.len());
        for id in removed_ids {
            tree.children.remove(&id);
            if let Some(node) = tree.nodes.remove(&id) {
                removed.push(node);
            }
        }
        Ok(removed)
    }

    /// Move a node (and optionally its subtree) into the stash. Returns the
    /// stashed node ids.
    pub async fn stash_node(
        &self,
        study_id: Uuid,
        node_id: Uuid,
        stash_children: bool,
    ) -> Result<Vec<Uuid>, StudyError> {
        let mut trees = self.inner.write().await;
        let tree = tree_mut(&mut trees, study_id)?;
        let node = tree.node(node_id)?;
        if node.is_root() {
            return Err(StudyError::forbidden("cannot stash the root node"));
        }
        if node.stashed {
            return Err(StudyError::forbidden("node is already stashed"));
        }
        let stashed_ids = if stash_children {
            tree.detach_subtree(node_id);
            tree.subtree_ids(node_id)
        } else {
            tree.detach_single(node_id);
            vec![node_id]
        };
        let now = Utc::now();
        for id in &stashed_ids {
            let node = tree.node_mut(*id)?;
            node.stashed = true;
            node.stash_date = Some(now);
        }
        tree.stash_roots.push(node_id);
        Ok(stashed_ids)
    }

    /// Re-attach a stashed subtree under `anchor` as its last child.
    pub async fn restore_node(
        &self,
        study_id: Uuid,
        node_id: Uuid,
        anchor: Uuid,
    ) -> Result<Vec<Uuid>, StudyError> {
        let mut trees = self.inner.write().await;
        let tree = tree_mut(&mut trees, study_id)?;
        if !tree.stash_roots.contains(&node_id) {
            return Err(StudyError::not_found(format!("stashed node {node_id}")));
        }
        tree.validate_placement(anchor, InsertMode::Child)?;
        let restored_ids = tree.subtree_ids(node_id);
        for id in &restored_ids {
            let node = tree.node_mut(*id)?;
            node.stashed = false;
            node.stash_date = None;
        }
        tree.stash_roots.retain(|id| *id != node_id);
        tree.attach(node_id, anchor, InsertMode::Child);
        Ok(restored_ids)
    }

    pub async fn rename_node(
        &self,
        study_id: Uuid,
        node_id: Uuid,
        name: String,
    ) -> Result<(), StudyError> {
        let mut trees = self.inner.write().await;
        let tree = tree_mut(&mut trees, study_id)?;
        tree.node_mut(node_id)?.name = name;
        Ok(())
    }

    pub async fn stashed_nodes(&self, study_id: Uuid) -> Result<Vec<NodeInfo>, StudyError> {
        let trees = self.inner.read().await;
        let tree = tree_ref(&trees, study_id)?;
        Ok(tree
            .stash_roots
            .iter()
            .filter_map(|id| tree.nodes.get(id).cloned())
            .collect())
    }
}

fn tree_ref<'a>(
    trees: &'a HashMap<Uuid, StudyTree>,
    study_id: Uuid,
) -> Result<&'a StudyTree, StudyError> {
    trees
        .get(&study_id)
        .ok_or_else(|| StudyError::not_found(format!("study {study_id}")))
}

fn tree_mut<'a>(
    trees: &'a mut HashMap<Uuid, StudyTree>,
    study_id: Uuid,
) -> Result<&'a mut StudyTree, StudyError> {
    trees
        .get_mut(&study_id)
        .ok_or_else(|| StudyError::not_found(format!("study {study_id}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn tree_with_chain(store: &TreeStore) -> (Uuid, Uuid, Vec<Uuid>) {
        // root -> n0 -> n1 -> n2
        let study = Uuid::new_v4();
        let root = store.create_tree(study).await;
        let mut reference = root.id;
        let mut ids = Vec::new();
        for i in 0..3 {
            let node = NodeInfo::new(study, None, format!("N{i}"), NodeType::Construction);
            let node = store
                .insert_node(study, node, reference, InsertMode::Child)
                .await
                .unwrap();
            reference = node.id;
            ids.push(node.id);
        }
        (study, root.id, ids)
    }

    #[tokio::test]
    async fn child_insert_builds_a_chain() {
        let store = TreeStore::new();
        let (study, root, ids) = tree_with_chain(&store).await;
        assert_eq!(store.child_ids(study, root).await.unwrap(), vec![ids[0]]);
        assert_eq!(
            store.ancestor_ids(study, ids[2]).await.unwrap(),
            vec![ids[1], ids[0], root]
        );
        assert_eq!(
            store.subtree_ids(study, ids[0]).await.unwrap().len(),
            3
        );
    }

    #[tokio::test]
    async fn before_interposes_between_reference_and_parent() {
        let store = TreeStore::new();
        let (study, _root, ids) = tree_with_chain(&store).await;
        let node = NodeInfo::new(study, None, "X".into(), NodeType::Plain);
        let x = store
            .insert_node(study, node, ids[1], InsertMode::Before)
            .await
            .unwrap();
        assert_eq!(x.parent_id, Some(ids[0]));
        assert_eq!(store.child_ids(study, x.id).await.unwrap(), vec![ids[1]]);
        assert_eq!(
            store.node(study, ids[1]).await.unwrap().parent_id,
            Some(x.id)
        );
    }

    #[tokio::test]
    async fn after_adopts_former_children() {
        let store = TreeStore::new();
        let (study, _root, ids) = tree_with_chain(&store).await;
        let node = NodeInfo::new(study, None, "X".into(), NodeType::Plain);
        let x = store
            .insert_node(study, node, ids[0], InsertMode::After)
            .await
            .unwrap();
        assert_eq!(x.parent_id, Some(ids[0]));
        assert_eq!(store.child_ids(study, ids[0]).await.unwrap(), vec![x.id]);
        assert_eq!(store.child_ids(study, x.id).await.unwrap(), vec![ids[1]]);
    }

    #[tokio::test]
    async fn before_root_is_forbidden_and_changes_nothing() {
        let store = TreeStore::new();
        let (study, root, ids) = tree_with_chain(&store).await;
        let before = store.child_ids(study, root).await.unwrap();

        let node = NodeInfo::new(study, None, "X".into(), NodeType::Plain);
        let err = store
            .insert_node(study, node, root, InsertMode::Before)
            .await
            .unwrap_err();
        assert!(matches!(err, StudyError::Forbidden(_)));

        let err = store
            .move_node(study, ids[2], root, InsertMode::Before)
            .await
            .unwrap_err();
        assert!(matches!(err, StudyError::Forbidden(_)));
        assert_eq!(store.child_ids(study, root).await.unwrap(), before);
    }

    #[tokio::test]
    async fn move_into_own_subtree_is_forbidden() {
        let store = TreeStore::new();
        let (study, _root, ids) = tree_with_chain(&store).await;
        let err = store
            .move_subtree(study, ids[0], ids[2])
            .await
            .unwrap_err();
        assert!(matches!(err, StudyError::Forbidden(_)));
        let err = store
            .move_node(study, ids[0], ids[0], InsertMode::After)
            .await
            .unwrap_err();
        assert!(matches!(err, StudyError::Forbidden(_)));
    }

    #[tokio::test]
    async fn single_node_move_leaves_children_behind() {
        let store = TreeStore::new();
        let (study, root, ids) = tree_with_chain(&store).await;
        // move n0 to be a plain child of n2: n1 splices up to root
        store
            .move_node(study, ids[0], ids[2], InsertMode::Child)
            .await
            .unwrap();
        assert_eq!(store.child_ids(study, root).await.unwrap(), vec![ids[1]]);
        assert_eq!(store.child_ids(study, ids[2]).await.unwrap(), vec![ids[0]]);
        assert!(store.child_ids(study, ids[0]).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn cut_and_paste_back_restores_structure() {
        let store = TreeStore::new();
        let (study, root, ids) = tree_with_chain(&store).await;
        let original = serde_json::to_value(store.tree_view(study).await.unwrap()).unwrap();

        store
            .move_node(study, ids[1], root, InsertMode::Child)
            .await
            .unwrap();
        store
            .move_node(study, ids[1], ids[2], InsertMode::Before)
            .await
            .unwrap();

        let restored = serde_json::to_value(store.tree_view(study).await.unwrap()).unwrap();
        assert_eq!(original, restored);
    }

    #[tokio::test]
    async fn delete_without_children_splices_them_up() {
        let store = TreeStore::new();
        let (study, _root, ids) = tree_with_chain(&store).await;
        let removed = store.delete_node(study, ids[1], false).await.unwrap();
        assert_eq!(removed.len(), 1);
        assert_eq!(store.child_ids(study, ids[0]).await.unwrap(), vec![ids[2]]);
        assert_eq!(
            store.node(study, ids[2]).await.unwrap().parent_id,
            Some(ids[0])
        );
    }

    #[tokio::test]
    async fn delete_with_children_removes_the_subtree() {
        let store = TreeStore::new();
        let (study, root, ids) = tree_with_chain(&store).await;
        let removed = store.delete_node(study, ids[0], true).await.unwrap();
        assert_eq!(removed.len(), 3);
        assert!(store.child_ids(study, root).await.unwrap().is_empty());
        assert!(store.node(study, ids[2]).await.is_err());
    }

    #[tokio::test]
    async fn stash_and_restore_round_trip() {
        let store = TreeStore::new();
        let (study, root, ids) = tree_with_chain(&store).await;
        let stashed = store.stash_node(study, ids[1], true).await.unwrap();
        assert_eq!(stashed.len(), 2);
        assert!(store.child_ids(study, ids[0]).await.unwrap().is_empty());
        assert!(store.node(study, ids[1]).await.unwrap().stashed);
        assert_eq!(store.stashed_nodes(study).await.unwrap().len(), 1);

        let restored = store.restore_node(study, ids[1], root).await.unwrap();
        assert_eq!(restored.len(), 2);
        assert!(!store.node(study, ids[1]).await.unwrap().stashed);
        assert!(store
            .child_ids(study, root)
            .await
            .unwrap()
            .contains(&ids[1]));
        assert!(store.stashed_nodes(study).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn missing_study_or_node_is_not_found() {
        let store = TreeStore::new();
        let (study, _root, ids) = tree_with_chain(&store).await;
        assert!(matches!(
            store.node(Uuid::new_v4(), ids[0]).await.unwrap_err(),
            StudyError::NotFound(_)
        ));
        assert!(matches!(
            store.node(study, Uuid::new_v4()).await.unwrap_err(),
            StudyError::NotFound(_)
        ));
    }
}
