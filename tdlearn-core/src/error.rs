//! Errors in the library.
use thiserror::Error;

/// Errors in the library.
#[derive(Error, Debug)]
pub enum TdlError {
    /// Record key error.
    #[error("Record key error: {0}")]
    RecordKeyError(String),

    /// A replay buffer returned a batch of unexpected size.
    #[error("Batch size mismatch: expected {expected}, got {actual}")]
    BatchSize {
        /// Batch size requested by the agent.
        expected: usize,
        /// Number of transitions in the returned batch.
        actual: usize,
    },

    /// Update was requested on an empty trajectory.
    #[error("Trajectory is empty, record at least one step before updating")]
    EmptyTrajectory,

    /// A parameter is missing from a checkpoint or a parameter set.
    #[error("Missing tensor: {0}")]
    MissingTensor(String),
}
