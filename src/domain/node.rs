use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Kind of a tree node.
///
/// The root node is created with the study and carries no modifications of
/// its own; it represents the raw network of every root network.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum NodeType {
    Root,
    Construction,
    Plain,
}

/// Where a node lands relative to its reference node.
///
/// `Before` interposes the node between the reference and its parent,
/// `After` interposes it between the reference and its children, `Child`
/// appends it as a new leaf child of the reference.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum InsertMode {
    Before,
    After,
    Child,
}

/// A node of the modification tree.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeInfo {
    pub id: Uuid,
    pub study_id: Uuid,
    /// `None` only for the root node.
    pub parent_id: Option<Uuid>,
    pub name: String,
    pub node_type: NodeType,
    /// Ordered modification group owned by the Modification-Application
    /// service; this server only tracks the reference.
    pub modification_group_id: Uuid,
    /// Audit report owned by the Report service, one per node.
    pub report_id: Uuid,
    pub stashed: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stash_date: Option<DateTime<Utc>>,
}

impl NodeInfo {
    pub fn new(study_id: Uuid, parent_id: Option<Uuid>, name: String, node_type: NodeType) -> Self {
        Self {
            id: Uuid::new_v4(),
            study_id,
            parent_id,
            name,
            node_type,
            modification_group_id: Uuid::new_v4(),
            report_id: Uuid::new_v4(),
            stashed: false,
            stash_date: None,
        }
    }

    pub fn is_root(&self) -> bool {
        matches!(self.node_type, NodeType::Root)
    }

    /// A node refuses content edits when it is the root or sits in the stash.
    pub fn is_read_only(&self) -> bool {
        self.is_root() || self.stashed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn root_node_is_read_only() {
        let node = NodeInfo::new(Uuid::new_v4(), None, "Root".into(), NodeType::Root);
        assert!(node.is_root());
        assert!(node.is_read_only());
    }

    #[test]
    fn stashed_node_is_read_only() {
        let mut node = NodeInfo::new(
            Uuid::new_v4(),
            Some(Uuid::new_v4()),
            "N1".into(),
            NodeType::Construction,
        );
        assert!(!node.is_read_only());
        node.stashed = true;
        assert!(node.is_read_only());
    }

    #[test]
    fn insert_mode_serializes_screaming_snake() {
        assert_eq!(
            serde_json::to_string(&InsertMode::Before).unwrap(),
            "\"BEFORE\""
        );
        assert_eq!(
            serde_json::from_str::<InsertMode>("\"CHILD\"").unwrap(),
            InsertMode::Child
        );
    }
}
