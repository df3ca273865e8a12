use thiserror::Error;

/// Fatal input errors. Any of these aborts a run before the search starts.
#[derive(Debug, Error)]
pub enum PlanError {
    /// Grid shape or occupant ids disagree with the level's rule table.
    #[error("invalid level configuration: {0}")]
    InvalidLevelConfiguration(String),

    /// A catalog entry is missing a required field or carries an invalid one.
    #[error("malformed catalog entry #{index}: {reason}")]
    MalformedCatalogEntry { index: usize, reason: String },

    /// A level makes available a resource the catalog does not define.
    #[error("resource {0} is not defined in the catalog")]
    UnknownResource(u32),

    #[error("level description could not be parsed: {0}")]
    LevelParse(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("could not start search workers: {0}")]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),
}

impl PlanError {
    pub(crate) fn malformed(index: usize, reason: impl Into<String>) -> Self {
        PlanError::MalformedCatalogEntry {
            index,
            reason: reason.into(),
        }
    }

    pub(crate) fn invalid_level(reason: impl Into<String>) -> Self {
        PlanError::InvalidLevelConfiguration(reason.into())
    }
}
