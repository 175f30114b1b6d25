use thiserror::Error;

#[derive(Debug, Error)]
pub enum SpecflowError {
    #[error("not initialized: run 'specflow init'")]
    NotInitialized,

    #[error("workflow not found for project: {0}")]
    WorkflowNotFound(String),

    #[error("relationship already exists: {0}")]
    DuplicateRelationship(String),

    #[error("relationship not found: {0}")]
    RelationshipNotFound(String),

    #[error("invalid project id '{0}': must be alphanumeric with '-' or '_'")]
    InvalidProjectId(String),

    #[error("invalid step {step}: {reason}")]
    InvalidStep { step: u32, reason: String },

    #[error("database error: {0}")]
    Db(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Yaml(#[from] serde_yaml::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

impl SpecflowError {
    /// True for the uniqueness violation the seeder treats as "already seeded".
    pub fn is_duplicate(&self) -> bool {
        matches!(self, SpecflowError::DuplicateRelationship(_))
    }
}

pub type Result<T> = std::result::Result<T, SpecflowError>;
