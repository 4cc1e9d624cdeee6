//! Error conditions surfaced by the simulation and its collaborators

use thiserror::Error;

pub type Result<T, E = SimError> = std::result::Result<T, E>;

#[derive(Debug, Error)]
pub enum SimError {
    /// A wall tuple could not be turned into geometry. The world is left untouched.
    #[error("invalid wall geometry at index {index}: {reason}")]
    InvalidGeometry { index: usize, reason: String },

    /// The ball state stopped being finite. Only rebuilding the world recovers.
    #[error("simulation diverged at step {step}")]
    SimulationDiverged { step: u64 },

    #[error("invalid timestep {0}")]
    InvalidTimestep(f32),

    /// A settings value the world cannot be built from
    #[error("invalid setting `{field}`: {reason}")]
    InvalidSettings { field: &'static str, reason: String },

    /// Failure reported by a line source or presenter
    #[error("source error: {0}")]
    Source(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

impl SimError {
    /// Fatal conditions end the run; the world must be rebuilt
    pub fn is_fatal(&self) -> bool {
        matches!(self, SimError::SimulationDiverged { .. })
    }
}
