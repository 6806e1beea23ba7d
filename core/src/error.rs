use thiserror::Error;

use crate::fusion::Source;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum EngineError {
    /// Invalid fusion weights, unknown metric, or out-of-range tuning value.
    #[error("configuration error: {0}")]
    Configuration(String),
    #[error("recommendation index is not initialized")]
    NotReady,
    #[error("rating {rating} from user {user_id} for recipe {recipe_id} is outside 1..=5")]
    InvalidRating {
        user_id: String,
        recipe_id: String,
        rating: i64,
    },
    #[error("corpus contains no valid recipes")]
    EmptyCorpus,
    /// Every matched ingredient was pruned from the retrieval vocabulary.
    #[error("no query ingredient is in the retrieval vocabulary")]
    OutOfVocabulary,
    #[error("vector dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },
    #[error("{scorer} scorer failed: {reason}")]
    Source { scorer: Source, reason: String },
}

pub type Result<T> = std::result::Result<T, EngineError>;
