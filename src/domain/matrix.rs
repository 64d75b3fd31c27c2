use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use uuid::Uuid;

use super::{ComputationKind, ResultHandle};

/// Build state of one node under one root network.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BuildStatus {
    NotBuilt,
    Built,
}

/// Matrix cell: everything the server knows about one (node, root network)
/// pair. Exactly one cell exists per pair for as long as both exist.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeRootNetworkInfo {
    pub node_id: Uuid,
    pub root_network_id: Uuid,
    pub build_status: BuildStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub working_variant_id: Option<String>,
    pub results: HashMap<ComputationKind, ResultHandle>,
}

impl NodeRootNetworkInfo {
    pub fn new(node_id: Uuid, root_network_id: Uuid) -> Self {
        Self {
            node_id,
            root_network_id,
            build_status: BuildStatus::NotBuilt,
            working_variant_id: None,
            results: HashMap::new(),
        }
    }

    pub fn is_built(&self) -> bool {
        self.build_status == BuildStatus::Built
    }

    /// Invalidate the cell: back to NOT_BUILT, no working variant, no result
    /// handles. Returns the drained handles so the caller can request their
    /// remote deletion. Idempotent by construction.
    pub fn reset(&mut self) -> Vec<(ComputationKind, ResultHandle)> {
        self.build_status = BuildStatus::NotBuilt;
        self.working_variant_id = None;
        self.results.drain().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::ComputationStatus;

    #[test]
    fn fresh_cell_is_not_built_with_no_handles() {
        let cell = NodeRootNetworkInfo::new(Uuid::new_v4(), Uuid::new_v4());
        assert!(!cell.is_built());
        assert!(cell.working_variant_id.is_none());
        assert!(cell.results.is_empty());
    }

    #[test]
    fn reset_drains_handles_and_clears_variant() {
        let mut cell = NodeRootNetworkInfo::new(Uuid::new_v4(), Uuid::new_v4());
        cell.build_status = BuildStatus::Built;
        cell.working_variant_id = Some("variant_1".into());
        cell.results.insert(
            ComputationKind::LoadFlow,
            ResultHandle {
                result_id: Uuid::new_v4(),
                status: ComputationStatus::Succeeded,
            },
        );

        let drained = cell.reset();
        assert_eq!(drained.len(), 1);
        assert!(!cell.is_built());
        assert!(cell.working_variant_id.is_none());
        assert!(cell.results.is_empty());

        // re-resetting an already clear cell is a no-op
        assert!(cell.reset().is_empty());
    }
}
