use crate::doc::DocError;
use crate::editor::{SchemaError, TranslateError};
use crate::sync::ValidationError;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("document error: {0}")]
    Document(#[from] DocError),
    #[error("translation error: {0}")]
    Translate(#[from] TranslateError),
    #[error("schema error: {0}")]
    Schema(#[from] SchemaError),
    #[error("validation error: {0}")]
    Validation(#[from] ValidationError),
    #[error("invalid configuration: {0}")]
    Config(#[from] serde_json::Error),
}

impl Error {
    /// True when the local replica missed an update or raced one, and the
    /// host should refetch full state.
    pub fn requires_resync(&self) -> bool {
        matches!(
            self,
            Error::Document(
                DocError::SequenceGap { .. }
                    | DocError::MissingDependency { .. }
                    | DocError::OutOfRange { .. }
                    | DocError::UnknownElement(_)
            )
        )
    }
}

pub type Result<T> = std::result::Result<T, Error>;
