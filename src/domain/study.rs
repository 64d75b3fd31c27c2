use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Top-level container owning one modification tree and one or more root
/// networks.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Study {
    pub id: Uuid,
    pub name: String,
    pub root_node_id: Uuid,
    pub created_at: DateTime<Utc>,
}

impl Study {
    pub fn new(name: String, root_node_id: Uuid) -> Self {
        Self {
            id: Uuid::new_v4(),
            name,
            root_node_id,
            created_at: Utc::now(),
        }
    }
}
