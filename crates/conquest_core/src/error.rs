use crate::mapgen::MapGenError;
use crate::MatchPhase;

/// Infrastructure failures. Command rejections never surface here.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum MatchError {
    #[error("map generation failed: {0}")]
    MapGeneration(#[from] MapGenError),
    #[error("match is in phase {actual:?}, expected {expected:?}")]
    InvalidPhase {
        expected: MatchPhase,
        actual: MatchPhase,
    },
    #[error("match has no contestants")]
    NotEnoughContestants,
    #[error("match has been destroyed")]
    Destroyed,
}
