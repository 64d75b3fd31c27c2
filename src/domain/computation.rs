use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// The computation kinds the orchestrator drives on tree nodes.
///
/// Every kind shares the same run/stop/status/result/delete lifecycle; the
/// enum is the single point parameterizing the matrix and invalidation logic.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    strum_macros::Display,
    strum_macros::EnumString,
    strum_macros::EnumIter,
)]
#[serde(rename_all = "kebab-case")]
#[strum(serialize_all = "kebab-case")]
pub enum ComputationKind {
    LoadFlow,
    SecurityAnalysis,
    SensitivityAnalysis,
    ShortCircuit,
    OneBusShortCircuit,
    VoltageInit,
    DynamicSimulation,
    DynamicSecurityAnalysis,
    StateEstimation,
    PccMin,
}

/// Lifecycle state of one computation on one matrix cell.
///
/// The absent-handle case is the implicit IDLE state; a handle only exists
/// while a computation is running or has reported completion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, strum_macros::Display)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum ComputationStatus {
    Running,
    Succeeded,
    Failed,
}

/// Handle on a remote computation result, stored in a matrix cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResultHandle {
    pub result_id: Uuid,
    pub status: ComputationStatus,
}

impl ResultHandle {
    pub fn running(result_id: Uuid) -> Self {
        Self {
            result_id,
            status: ComputationStatus::Running,
        }
    }

    pub fn is_running(&self) -> bool {
        self.status == ComputationStatus::Running
    }
}
