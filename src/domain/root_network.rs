use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A network variant attached to a study. Each node's build state is tracked
/// independently per root network.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RootNetwork {
    pub id: Uuid,
    pub study_id: Uuid,
    pub name: String,
    pub tag: String,
    /// Reference to the underlying network/case held by external services.
    pub network_id: Uuid,
}

impl RootNetwork {
    pub fn new(study_id: Uuid, name: String, tag: String, network_id: Uuid) -> Self {
        Self {
            id: Uuid::new_v4(),
            study_id,
            name,
            tag,
            network_id,
        }
    }
}
