use thiserror::Error;

/// Errors reported by the host-provided workspace and git services
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ServiceError {
    #[error("Service unavailable: {0}")]
    Unavailable(String),

    #[error("Sync failed: {0}")]
    Sync(String),

    #[error("Service call failed: {0}")]
    Failed(String),
}

#[derive(Error, Debug)]
pub enum MonitorError {
    #[error("Git or workspace service is not available yet")]
    CapabilityMissing,

    #[error("Malformed modified-file list for {folder}: {reason}")]
    CacheParse { folder: String, reason: String },

    #[error("Service error: {0}")]
    Service(#[from] ServiceError),
}
