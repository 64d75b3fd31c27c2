use thiserror::Error;

/// Error taxonomy shared by the stores, the orchestrator and the API layer.
///
/// Every variant carries a human-readable detail string; the HTTP mapping
/// (status code and wire representation) lives in `api::error`.
#[derive(Debug, Error)]
pub enum StudyError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    /// The touched subtree already has a mutation in flight.
    #[error("Resource busy: {0}")]
    Busy(String),

    /// A run was requested on a cell whose previous run is still active.
    #[error("Computation already running: {0}")]
    ComputationRunning(String),

    #[error("Upstream service failure: {0}")]
    Upstream(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl StudyError {
    pub fn not_found(detail: impl Into<String>) -> Self {
        Self::NotFound(detail.into())
    }

    pub fn forbidden(detail: impl Into<String>) -> Self {
        Self::Forbidden(detail.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn helpers_build_the_matching_variants() {
        assert!(matches!(
            StudyError::not_found("study 42"),
            StudyError::NotFound(_)
        ));
        assert!(matches!(
            StudyError::forbidden(String::from("cannot move the root node")),
            StudyError::Forbidden(_)
        ));
    }

    #[test]
    fn detail_is_carried_into_the_message() {
        let error = StudyError::Busy("subtree containing node 7".to_string());
        assert_eq!(error.to_string(), "Resource busy: subtree containing node 7");
    }
}
